use std::sync::Arc;

use crate::{error::ParseError, node::Node};

use super::{
    blocks::{BlockParser, ParserOptions},
    context::{Diagnostic, HeadingCounter, ParseContext},
    keywords::KeywordRegistry,
};

/// Nodes and diagnostics from one assembler run.
#[derive(Debug, Clone, Default)]
pub struct Assembled {
    pub nodes: Vec<Node>,
    pub diagnostics: Vec<Diagnostic>,
    /// Counter state after the run, for threading into the next one.
    pub headings: HeadingCounter,
}

/// Single top-level pass sequencing block and list parsing over a line array.
#[derive(Debug, Clone)]
pub struct DocumentAssembler {
    parser: BlockParser,
}

impl DocumentAssembler {
    pub fn new(registry: Arc<KeywordRegistry>, options: ParserOptions) -> Self {
        Self {
            parser: BlockParser::new(registry, options),
        }
    }

    pub fn parser(&self) -> &BlockParser {
        &self.parser
    }

    /// Assembles a whole document with a fresh heading counter.
    pub fn assemble(&self, lines: &[&str]) -> Result<Assembled, ParseError> {
        self.assemble_from(lines, 0, HeadingCounter::new())
    }

    /// Assembles a slice starting `line_offset` lines into the document,
    /// continuing `headings`.
    ///
    /// Heading ids are assigned once the forest is complete, walking in
    /// document order, so nested headings are numbered where they appear.
    pub fn assemble_from(
        &self,
        lines: &[&str],
        line_offset: usize,
        headings: HeadingCounter,
    ) -> Result<Assembled, ParseError> {
        let mut ctx = ParseContext::resume(self.parser.options().strategy, line_offset, headings);
        let mut nodes = vec![];
        self.parser.parse_lines(lines, &mut ctx, &mut nodes)?;
        for node in &nodes {
            ctx.assign_heading_ids(node);
        }
        let (diagnostics, headings) = ctx.finish();
        Ok(Assembled {
            nodes,
            diagnostics,
            headings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        node::{Content, NodeKind},
        parsing::context::{DiagnosticKind, ParseStrategy},
    };
    use pretty_assertions::assert_eq;

    fn assembler() -> DocumentAssembler {
        DocumentAssembler::new(Arc::new(KeywordRegistry::default()), ParserOptions::default())
    }

    fn kinds(nodes: &[Node]) -> Vec<NodeKind> {
        nodes.iter().map(|n| n.kind.clone()).collect()
    }

    #[test]
    fn strong_block() {
        let doc = assembler().assemble(&[";;;太字", "内容", ";;;"]).unwrap();
        assert_eq!(kinds(&doc.nodes), vec![NodeKind::Strong]);
        assert_eq!(doc.nodes[0].plain_text(), "内容");
        assert!(doc.diagnostics.is_empty());
    }

    #[test]
    fn compound_block_nests_strong_em() {
        let doc = assembler().assemble(&[";;;太字+イタリック", "複合", ";;;"]).unwrap();
        let strong = &doc.nodes[0];
        assert_eq!(strong.kind, NodeKind::Strong);
        assert_eq!(strong.children()[0].kind, NodeKind::Emphasis);
        assert_eq!(strong.plain_text(), "複合");
    }

    #[test]
    fn paragraphs_join_lines_and_stop_at_blank() {
        let doc = assembler()
            .assemble(&["one", "two", "", "three", "- item"])
            .unwrap();
        assert_eq!(
            kinds(&doc.nodes),
            vec![
                NodeKind::Paragraph,
                NodeKind::Paragraph,
                NodeKind::List { ordered: false }
            ]
        );
        assert_eq!(doc.nodes[0].plain_text(), "one two");
    }

    #[test]
    fn unknown_keyword_becomes_error_with_suggestion() {
        let doc = assembler().assemble(&[";;;太時", "x", ";;;"]).unwrap();
        match &doc.nodes[0].kind {
            NodeKind::Error {
                line, suggestion, ..
            } => {
                assert_eq!(*line, Some(1));
                assert!(suggestion.as_deref().unwrap().contains("太字"));
            }
            other => panic!("expected error node, got {other:?}"),
        }
        // The body and the orphaned closer are parsed as ordinary lines.
        assert_eq!(doc.nodes[1].kind, NodeKind::Paragraph);
        assert!(doc.nodes[2].kind.is_error());
        assert_eq!(doc.diagnostics[0].kind, DiagnosticKind::UnknownKeyword);
        assert_eq!(doc.diagnostics[1].kind, DiagnosticKind::UnmatchedCloser);
    }

    #[test]
    fn unterminated_block_takes_rest_of_input() {
        let doc = assembler().assemble(&[";;;枠線", "a", "b"]).unwrap();
        assert!(doc.nodes[0].kind.is_error());
        assert_eq!(doc.nodes[1].kind, NodeKind::Box);
        assert_eq!(doc.nodes[1].plain_text(), "a\nb");
        assert_eq!(doc.diagnostics[0].kind, DiagnosticKind::UnterminatedBlock);
    }

    #[test]
    fn empty_keyword_falls_back_to_literal_paragraph() {
        let doc = assembler()
            .assemble(&[";;;id=x", "#太字#kept##", ";;;"])
            .unwrap();
        assert!(doc.nodes[0].kind.is_error());
        assert_eq!(doc.nodes[1].kind, NodeKind::Paragraph);
        assert_eq!(doc.nodes[1].content, Content::Text("#太字#kept##".into()));
    }

    #[test]
    fn toc_and_images() {
        let doc = assembler()
            .assemble(&[
                ";;;目次;;;",
                ";;;cat.png alt=猫;;;",
                ";;;画像 alt=犬",
                "dog.jpg",
                ";;;",
                ";;;bird.gif",
                "a bird",
                ";;;",
            ])
            .unwrap();
        assert_eq!(
            kinds(&doc.nodes),
            vec![NodeKind::TocMarker, NodeKind::Image, NodeKind::Image, NodeKind::Image]
        );
        let attr = |i: usize, k: &str| doc.nodes[i].attributes.get(k).cloned();
        assert_eq!(attr(1, "src").as_deref(), Some("images/cat.png"));
        assert_eq!(attr(1, "alt").as_deref(), Some("猫"));
        assert_eq!(attr(2, "src").as_deref(), Some("images/dog.jpg"));
        assert_eq!(attr(2, "alt").as_deref(), Some("犬"));
        assert_eq!(attr(3, "alt").as_deref(), Some("a bird"));
    }

    #[test]
    fn image_keyword_without_file_is_reported() {
        let doc = assembler().assemble(&[";;;画像;;;"]).unwrap();
        assert!(doc.nodes[0].kind.is_error());
        assert_eq!(doc.diagnostics[0].kind, DiagnosticKind::MissingImage);
    }

    #[test]
    fn headings_are_numbered_in_document_order() {
        let doc = assembler()
            .assemble(&[
                ";;;見出し1;;; A ;;;",
                ";;;見出し2 id=fixed;;; B ;;;",
                ";;;枠線",
                ";;;見出し2;;; C ;;;",
                ";;;",
            ])
            .unwrap();
        assert_eq!(doc.nodes[0].heading_id(), Some("heading-1"));
        assert_eq!(doc.nodes[1].heading_id(), Some("fixed"));
        assert_eq!(doc.nodes[2].children()[0].heading_id(), Some("heading-2"));
        assert_eq!(doc.headings.issued(), 2);
    }

    #[test]
    fn nested_blocks_inside_a_box() {
        let doc = assembler()
            .assemble(&[";;;枠線", "intro", ";;;太字", "inner", ";;;", "- x", ";;;"])
            .unwrap();
        assert_eq!(doc.nodes.len(), 1);
        let children = doc.nodes[0].children();
        assert_eq!(
            children.iter().map(|n| n.kind.clone()).collect::<Vec<_>>(),
            vec![
                NodeKind::Paragraph,
                NodeKind::Strong,
                NodeKind::List { ordered: false }
            ]
        );
        assert!(doc.diagnostics.is_empty());
    }

    #[test]
    fn stray_closers_terminate_with_one_diagnostic_each() {
        let lines = vec![";;;"; 10_000];
        let doc = assembler().assemble(&lines).unwrap();
        assert_eq!(doc.nodes.len(), 10_000);
        assert_eq!(doc.diagnostics.len(), 10_000);
        assert!(doc
            .diagnostics
            .iter()
            .all(|d| d.kind == DiagnosticKind::UnmatchedCloser && d.message == "unmatched closing marker"));
    }

    #[test]
    fn strict_stops_at_first_problem() {
        let assembler = DocumentAssembler::new(
            Arc::new(KeywordRegistry::default()),
            ParserOptions {
                strategy: ParseStrategy::Strict,
                ..ParserOptions::default()
            },
        );
        let err = assembler.assemble(&["ok", ";;;太時", "x", ";;;"]).unwrap_err();
        assert!(matches!(err, ParseError::MarkerSyntax { line: 2, .. }));
    }

    #[test]
    fn line_numbers_respect_offset() {
        let doc = assembler()
            .assemble_from(&[";;;"], 41, HeadingCounter::new())
            .unwrap();
        assert_eq!(doc.diagnostics[0].line, 42);
    }

    #[test]
    fn lookahead_bounds_unterminated_body() {
        let assembler = DocumentAssembler::new(
            Arc::new(KeywordRegistry::default()),
            ParserOptions {
                max_block_lookahead: 2,
                ..ParserOptions::default()
            },
        );
        let doc = assembler.assemble(&[";;;太字", "a", "b", "c"]).unwrap();
        assert_eq!(doc.nodes[1].plain_text(), "a\nb");
        assert_eq!(doc.nodes[2].plain_text(), "c");
    }
}
