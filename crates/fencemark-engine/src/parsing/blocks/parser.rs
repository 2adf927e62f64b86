use std::{ops::Range, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::{
    error::ParseError,
    node::{Content, Fragment, Node, NodeKind},
    parsing::{
        context::{Diagnostic, DiagnosticKind, ParseContext, ParseStrategy},
        inline::process_inline,
        keywords::{KeywordRegistry, PhraseError, create_compound, create_single},
        lists,
        markers::{
            FenceShape, LineClassifier, LineKind, Marker, is_closing_marker, is_opening_marker,
        },
    },
};

use super::image::{image_node, is_image_filename};

/// Iterations allowed per line before the circuit breaker trips.
pub const CIRCUIT_BREAKER_FACTOR: usize = 2;

/// Default bound on how far an opener looks for its closer.
pub const DEFAULT_MAX_BLOCK_LOOKAHEAD: usize = 100_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParserOptions {
    pub strategy: ParseStrategy,
    pub max_block_lookahead: usize,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            strategy: ParseStrategy::Graceful,
            max_block_lookahead: DEFAULT_MAX_BLOCK_LOOKAHEAD,
        }
    }
}

/// Where a block's body comes from.
enum Body<'a> {
    /// Lines between the opener and its closer; `closed` is false when the
    /// closer was never found.
    Lines { range: Range<usize>, closed: bool },
    /// Text after a single-line marker's inner fence.
    Inline(Option<&'a str>),
}

/// True when an opener line starts a block that consumes lines up to a
/// closer. Invalid openers do not: they are replaced by an error node and
/// their body is parsed as ordinary lines.
pub fn opens_block(line: &str, registry: &KeywordRegistry) -> bool {
    is_opening_marker(line)
        && Marker::read(line, registry).is_some_and(|m| m.is_valid() || m.is_empty_keyword())
}

/// The block-level state machine.
///
/// ```text
/// SCANNING --opener--> BLOCK_BODY --closer/lookahead--> CLOSED
/// SCANNING --text----> PARAGRAPH_BODY --blank/list/marker--> CLOSED
/// ```
///
/// Owns no per-run state; everything mutable lives in the [`ParseContext`],
/// so one parser value can serve many runs.
#[derive(Debug, Clone)]
pub struct BlockParser {
    registry: Arc<KeywordRegistry>,
    classifier: LineClassifier,
    options: ParserOptions,
}

impl BlockParser {
    pub fn new(registry: Arc<KeywordRegistry>, options: ParserOptions) -> Self {
        Self {
            registry,
            classifier: LineClassifier,
            options,
        }
    }

    pub fn registry(&self) -> &KeywordRegistry {
        &self.registry
    }

    pub fn options(&self) -> ParserOptions {
        self.options
    }

    /// Parses `lines[ctx.cursor..]` into `out`.
    ///
    /// Every iteration must move the cursor. One that does not is forced
    /// forward a line; past [`CIRCUIT_BREAKER_FACTOR`] times the line count
    /// the run stops and the partial tree is kept.
    pub fn parse_lines(
        &self,
        lines: &[&str],
        ctx: &mut ParseContext,
        out: &mut Vec<Node>,
    ) -> Result<(), ParseError> {
        let cap = lines.len().saturating_mul(CIRCUIT_BREAKER_FACTOR).max(1);
        let mut iterations = 0usize;

        while ctx.cursor < lines.len() {
            iterations += 1;
            if iterations > cap {
                let line = ctx.line_number(ctx.cursor);
                log::error!("circuit breaker tripped at line {line} after {iterations} iterations");
                if ctx.strategy() == ParseStrategy::Strict {
                    return Err(ParseError::CircuitBreaker { line, iterations });
                }
                let diag = Diagnostic::new(
                    line,
                    DiagnosticKind::CircuitBreaker,
                    format!("parsing stopped after {iterations} iterations"),
                );
                out.push(diag.to_node());
                ctx.report(diag)?;
                break;
            }

            let before = ctx.cursor;
            self.parse_next(lines, ctx, out)?;
            if ctx.cursor <= before {
                log::warn!("no progress at line {}, forcing advance", ctx.line_number(before));
                ctx.cursor = before + 1;
            }
        }
        Ok(())
    }

    fn parse_next(
        &self,
        lines: &[&str],
        ctx: &mut ParseContext,
        out: &mut Vec<Node>,
    ) -> Result<(), ParseError> {
        let line = lines[ctx.cursor];
        match self.classifier.classify(line).kind {
            LineKind::Blank => ctx.cursor += 1,
            LineKind::Closer => {
                let diag = Diagnostic::new(
                    ctx.line_number(ctx.cursor),
                    DiagnosticKind::UnmatchedCloser,
                    "unmatched closing marker",
                )
                .with_suggestion(Some("remove it or add a `;;;keyword` line above".into()));
                self.recover(ctx, out, diag)?;
                ctx.cursor += 1;
            }
            LineKind::Opener | LineKind::SingleLine => self.parse_block_marker(lines, ctx, out)?,
            LineKind::ListItem => match lists::parse_list(lines, ctx) {
                Some(list) => out.push(list),
                None => ctx.cursor += 1,
            },
            LineKind::Text => self.parse_paragraph(lines, ctx, out),
        }
        Ok(())
    }

    /// Reports a diagnostic and embeds its error node. Fatal under strict.
    fn recover(
        &self,
        ctx: &mut ParseContext,
        out: &mut Vec<Node>,
        diag: Diagnostic,
    ) -> Result<(), ParseError> {
        let node = diag.to_node();
        ctx.report(diag)?;
        out.push(node);
        Ok(())
    }

    /// Parses the marker at `ctx.cursor` and, for openers, its body and
    /// closer. Never fails under the graceful strategy.
    pub fn parse_block_marker(
        &self,
        lines: &[&str],
        ctx: &mut ParseContext,
        out: &mut Vec<Node>,
    ) -> Result<(), ParseError> {
        let index = ctx.cursor;
        let line_no = ctx.line_number(index);
        let Some(marker) = Marker::read(lines[index], &self.registry) else {
            ctx.cursor += 1;
            return Ok(());
        };

        if marker.is_empty_keyword() {
            return self.parse_empty_keyword(lines, ctx, out, &marker);
        }

        if let Some(error) = marker.fatal_error() {
            let mut suggestion = error.suggestion();
            // An opener that opens nothing leaves its closer to the block around it.
            if let (FenceShape::Opening, Some(closer)) = (marker.shape, ctx.enclosing_closer()) {
                let hint = format!("the `;;;` on line {closer} closes the enclosing block");
                suggestion = Some(match suggestion {
                    Some(fix) => format!("{fix}; {hint}"),
                    None => hint,
                });
            }
            let diag = Diagnostic::new(line_no, diagnostic_kind(error), error.to_string())
                .with_suggestion(suggestion);
            self.recover(ctx, out, diag)?;
            ctx.cursor = index + 1;
            return Ok(());
        }

        for error in &marker.errors {
            let diag = Diagnostic::new(line_no, diagnostic_kind(error), error.to_string())
                .with_suggestion(error.suggestion());
            ctx.report(diag)?;
        }

        let (body, next) = if marker.shape == FenceShape::Opening {
            let (range, next) = self.block_extent(lines, ctx, out, index)?;
            let closed = next > range.end;
            (Body::Lines { range, closed }, next)
        } else {
            (Body::Inline(marker.inline_body.as_deref()), index + 1)
        };

        let node = self.build_block(&marker, lines, body, ctx, line_no)?;
        out.push(node);
        ctx.cursor = next;
        Ok(())
    }

    /// Body range and the index after the closer for the opener at `index`.
    ///
    /// A missing closer is reported and the rest of the input (up to the
    /// lookahead bound) becomes the body.
    fn block_extent(
        &self,
        lines: &[&str],
        ctx: &mut ParseContext,
        out: &mut Vec<Node>,
        index: usize,
    ) -> Result<(Range<usize>, usize), ParseError> {
        let start = index + 1;
        match self.find_closer(lines, start) {
            Some(closer) => Ok((start..closer, closer + 1)),
            None => {
                let end = lines
                    .len()
                    .min(start.saturating_add(self.options.max_block_lookahead));
                let diag = Diagnostic::new(
                    ctx.line_number(index),
                    DiagnosticKind::UnterminatedBlock,
                    "unterminated block: missing closing marker",
                )
                .with_suggestion(Some("add a line containing only `;;;`".into()));
                self.recover(ctx, out, diag)?;
                Ok((start..end, end))
            }
        }
    }

    /// Single forward scan for the closer matching an opener, counting
    /// nested openers. Bounded by the lookahead option.
    pub fn find_closer(&self, lines: &[&str], from: usize) -> Option<usize> {
        let end = lines
            .len()
            .min(from.saturating_add(self.options.max_block_lookahead));
        let mut depth = 0usize;
        for (i, line) in lines.iter().enumerate().take(end).skip(from) {
            if is_closing_marker(line) {
                if depth == 0 {
                    return Some(i);
                }
                depth -= 1;
            } else if opens_block(line, &self.registry) {
                depth += 1;
            }
        }
        None
    }

    /// An opener with attributes but no keyword: keep the body as literal
    /// paragraph text.
    fn parse_empty_keyword(
        &self,
        lines: &[&str],
        ctx: &mut ParseContext,
        out: &mut Vec<Node>,
        marker: &Marker,
    ) -> Result<(), ParseError> {
        let index = ctx.cursor;
        let diag = Diagnostic::new(
            ctx.line_number(index),
            DiagnosticKind::EmptyKeyword,
            "empty keyword",
        )
        .with_suggestion(Some("write a keyword right after `;;;`".into()));
        self.recover(ctx, out, diag)?;

        let (text, next) = if marker.shape == FenceShape::Opening {
            let (range, next) = self.block_extent(lines, ctx, out, index)?;
            (lines[range].join("\n"), next)
        } else {
            (marker.inline_body.clone().unwrap_or_default(), index + 1)
        };
        let text = text.trim();
        if !text.is_empty() {
            out.push(Node::new(NodeKind::Paragraph, text));
        }
        ctx.cursor = next;
        Ok(())
    }

    fn build_block(
        &self,
        marker: &Marker,
        lines: &[&str],
        body: Body<'_>,
        ctx: &mut ParseContext,
        line_no: usize,
    ) -> Result<Node, ParseError> {
        let registry = &self.registry;
        if let [keyword] = marker.keywords.as_slice() {
            if registry.is_toc(keyword) {
                return Ok(Node::new(NodeKind::TocMarker, "").with_attributes(&marker.attributes));
            }
            if registry.is_image(keyword) {
                let file = body_text(lines, &body);
                let file = file.split_whitespace().next();
                return match file {
                    Some(file) => Ok(image_node(
                        file,
                        marker.attributes.get("alt").map(String::as_str),
                        &marker.attributes,
                    )),
                    None => {
                        let diag = Diagnostic::new(
                            line_no,
                            DiagnosticKind::MissingImage,
                            "image marker without a file name",
                        )
                        .with_suggestion(Some("put the file name in the block body".into()));
                        let node = diag.to_node();
                        ctx.report(diag)?;
                        Ok(node)
                    }
                };
            }
            if is_image_filename(keyword) {
                let text = body_text(lines, &body);
                let alt = marker
                    .attributes
                    .get("alt")
                    .map(String::as_str)
                    .or(Some(text.trim()));
                return Ok(image_node(keyword, alt, &marker.attributes));
            }
        }

        let content = self.parse_body(lines, body, ctx)?;
        Ok(match marker.keywords.as_slice() {
            [keyword] => create_single(registry, keyword, content, &marker.attributes),
            keywords => create_compound(registry, keywords, content, &marker.attributes),
        })
    }

    /// Block content: inline-processed text, or a nested forest when the body
    /// holds fences or lists of its own.
    fn parse_body(
        &self,
        lines: &[&str],
        body: Body<'_>,
        ctx: &mut ParseContext,
    ) -> Result<Content, ParseError> {
        let (range, closed) = match body {
            Body::Inline(text) => return Ok(process_inline(text.unwrap_or_default())),
            Body::Lines { range, closed } => (range, closed),
        };

        let structured = lines[range.clone()].iter().any(|l| {
            matches!(
                self.classifier.classify(l).kind,
                LineKind::Opener | LineKind::SingleLine | LineKind::ListItem
            )
        });
        if !structured || !ctx.enter() {
            return Ok(process_inline(lines[range].join("\n").trim()));
        }

        let saved = ctx.cursor;
        let closer = closed.then(|| ctx.line_number(range.end));
        let enclosing = ctx.set_enclosing_closer(closer);
        ctx.cursor = range.start;
        let mut children = vec![];
        let result = self.parse_lines(&lines[..range.end], ctx, &mut children);
        ctx.leave();
        ctx.set_enclosing_closer(enclosing);
        ctx.cursor = saved;
        result?;

        Ok(Content::from_fragments(
            children.into_iter().map(Fragment::Node).collect(),
        ))
    }

    /// Joins consecutive text lines with single spaces.
    ///
    /// Stops at a blank line, list line, marker line or end of input.
    pub fn parse_paragraph(&self, lines: &[&str], ctx: &mut ParseContext, out: &mut Vec<Node>) {
        let mut parts = vec![];
        while let Some(line) = lines.get(ctx.cursor) {
            if self.classifier.classify(line).interrupts_paragraph() {
                break;
            }
            parts.push(line.trim());
            ctx.cursor += 1;
        }
        if !parts.is_empty() {
            out.push(Node::new(
                NodeKind::Paragraph,
                process_inline(&parts.join(" ")),
            ));
        }
    }
}

fn body_text(lines: &[&str], body: &Body<'_>) -> String {
    match body {
        Body::Inline(text) => text.unwrap_or_default().to_string(),
        Body::Lines { range, .. } => lines[range.clone()].join("\n"),
    }
}

fn diagnostic_kind(error: &PhraseError) -> DiagnosticKind {
    match error {
        PhraseError::EmptyKeyword => DiagnosticKind::EmptyKeyword,
        PhraseError::UnknownKeyword { .. } => DiagnosticKind::UnknownKeyword,
        PhraseError::ReservedInCompound { .. } => DiagnosticKind::InvalidCompound,
        PhraseError::InvalidAttribute { .. } => DiagnosticKind::InvalidAttribute,
    }
}
