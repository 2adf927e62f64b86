use std::sync::Arc;

use crate::{
    error::EngineError,
    parsing::{
        assembler::DocumentAssembler, context::HeadingCounter, keywords::KeywordRegistry,
    },
};

use super::{
    ParsedUnit,
    chunking::{ChunkPlan, Chunker},
    options::EngineOptions,
    source::{LineReader, Source},
};

/// Parses a bounded window of lines at a time on the calling thread.
///
/// One heading counter is threaded through every window, so ids match a
/// whole-document parse unless a window had to be force-cut.
pub(crate) struct SequentialRun {
    chunker: Chunker<LineReader>,
    assembler: DocumentAssembler,
    headings: HeadingCounter,
}

impl SequentialRun {
    pub fn new(
        source: &Source,
        start_line: usize,
        headings: HeadingCounter,
        registry: Arc<KeywordRegistry>,
        options: &EngineOptions,
    ) -> Result<Self, EngineError> {
        let plan = ChunkPlan::window(options)?;
        let lines = source.lines_from(start_line, options.read_batch_bytes)?;
        Ok(Self {
            chunker: Chunker::new(
                lines,
                Arc::clone(&registry),
                options.max_block_lookahead,
                plan,
                start_line,
            ),
            assembler: DocumentAssembler::new(registry, options.parser_options()),
            headings,
        })
    }

    pub fn hard_splits(&self) -> usize {
        self.chunker.hard_splits()
    }

    pub fn shrink(&mut self) {
        self.chunker.shrink();
    }

    pub fn next_unit(&mut self) -> Option<Result<ParsedUnit, EngineError>> {
        let chunk = match self.chunker.next()? {
            Ok(chunk) => chunk,
            Err(err) => return Some(Err(err)),
        };
        let lines: Vec<&str> = chunk.lines.iter().map(String::as_str).collect();
        let headings = std::mem::take(&mut self.headings);
        let assembled = match self.assembler.assemble_from(&lines, chunk.start, headings) {
            Ok(assembled) => assembled,
            Err(err) => return Some(Err(err.into())),
        };
        self.headings = assembled.headings;
        log::debug!(
            "window {}..{}: {} nodes",
            chunk.start,
            chunk.end,
            assembled.nodes.len()
        );
        Some(Ok(ParsedUnit {
            start: chunk.start,
            end: chunk.end,
            owner: None,
            nodes: assembled.nodes,
            diagnostics: assembled.diagnostics,
            failed: None,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsing::parse_str;
    use pretty_assertions::assert_eq;

    fn run(text: &str, window: usize) -> Vec<ParsedUnit> {
        let options = EngineOptions {
            window_lines: window,
            ..EngineOptions::default()
        };
        let mut run = SequentialRun::new(
            &Source::text(text),
            0,
            HeadingCounter::new(),
            Arc::new(KeywordRegistry::default()),
            &options,
        )
        .unwrap();
        std::iter::from_fn(|| run.next_unit()).map(Result::unwrap).collect()
    }

    #[test]
    fn windows_match_whole_parse() {
        let text = (0..40)
            .map(|i| format!(";;;見出し2;;; Part {i} ;;;\n;;;太字\nbody {i}\n;;;\n"))
            .collect::<Vec<_>>()
            .join("\n");
        let units = run(&text, 10);
        assert!(units.len() > 1);

        let streamed: Vec<String> = units
            .iter()
            .flat_map(|u| u.nodes.iter().map(crate::render::render))
            .collect();
        let whole: Vec<String> = parse_str(&text).nodes.iter().map(crate::render::render).collect();
        assert_eq!(streamed, whole);
    }

    #[test]
    fn diagnostics_carry_document_line_numbers() {
        let text = "a\n\nb\n\nc\n\n;;;\n";
        let units = run(text, 2);
        let lines: Vec<usize> = units
            .iter()
            .flat_map(|u| u.diagnostics.iter().map(|d| d.line))
            .collect();
        assert_eq!(lines, vec![7]);
    }

    #[test]
    fn starts_mid_document() {
        let mut run = SequentialRun::new(
            &Source::text("skip\n\nkeep"),
            2,
            HeadingCounter::new(),
            Arc::new(KeywordRegistry::default()),
            &EngineOptions::default(),
        )
        .unwrap();
        let unit = run.next_unit().unwrap().unwrap();
        assert_eq!((unit.start, unit.end), (2, 3));
        assert_eq!(unit.nodes[0].plain_text(), "keep");
        assert!(run.next_unit().is_none());
    }
}
