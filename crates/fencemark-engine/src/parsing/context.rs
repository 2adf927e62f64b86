use serde::{Deserialize, Serialize};

use crate::{
    error::ParseError,
    node::{MAX_DEPTH, Node},
};

/// How parse problems are surfaced.
///
/// Both strategies share the same line classification; they differ only in
/// what happens when a diagnostic is reported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseStrategy {
    /// Embed problems as error nodes and keep going.
    #[default]
    Graceful,
    /// Stop at the first problem.
    Strict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    UnknownKeyword,
    EmptyKeyword,
    /// A reserved keyword (TOC, image) combined with others.
    InvalidCompound,
    InvalidAttribute,
    MissingImage,
    UnterminatedBlock,
    UnmatchedCloser,
    CircuitBreaker,
}

/// A recoverable problem found while parsing, with a suggested fix if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// 1-based line number in the whole document.
    pub line: usize,
    pub kind: DiagnosticKind,
    pub message: String,
    pub suggestion: Option<String>,
}

impl Diagnostic {
    pub fn new(line: usize, kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            line,
            kind,
            message: message.into(),
            suggestion: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: Option<String>) -> Self {
        self.suggestion = suggestion;
        self
    }

    /// The error node that stands in for this diagnostic in the tree.
    pub fn to_node(&self) -> Node {
        Node::error(self.message.clone(), Some(self.line), self.suggestion.clone())
    }

    pub fn into_error(self) -> ParseError {
        match self.kind {
            DiagnosticKind::UnterminatedBlock | DiagnosticKind::UnmatchedCloser => {
                ParseError::Structural {
                    line: self.line,
                    message: self.message,
                }
            }
            DiagnosticKind::CircuitBreaker => ParseError::CircuitBreaker {
                line: self.line,
                iterations: 0,
            },
            _ => ParseError::MarkerSyntax {
                line: self.line,
                message: self.message,
                suggestion: self.suggestion,
            },
        }
    }
}

/// Heading id counter owned by one parse run.
///
/// Never global: each run (or each parallel chunk) owns its own, and the
/// streaming engine threads or renumbers it explicitly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadingCounter {
    next: usize,
}

impl Default for HeadingCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadingCounter {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    pub fn next_id(&mut self) -> String {
        let id = format!("heading-{}", self.next);
        self.next += 1;
        id
    }

    /// Number of ids handed out so far.
    pub fn issued(&self) -> usize {
        self.next - 1
    }

    /// Replaces every parser-assigned heading id in `nodes`, in document
    /// order, with ids from this counter. Author-supplied ids are untouched.
    pub fn renumber(&mut self, nodes: &mut [Node]) {
        for node in nodes {
            node.walk_mut(&mut |n, _| {
                if n.has_auto_heading_id() {
                    n.take_heading_id();
                    let id = self.next_id();
                    n.assign_heading_id(id);
                }
            });
        }
    }
}

/// Mutable state for one parse run over a line slice.
#[derive(Debug)]
pub struct ParseContext {
    /// Index of the next unconsumed line in the slice being parsed.
    pub cursor: usize,
    line_offset: usize,
    strategy: ParseStrategy,
    diagnostics: Vec<Diagnostic>,
    headings: HeadingCounter,
    depth: usize,
    /// Line of the closer ending the block body being parsed.
    enclosing_closer: Option<usize>,
}

impl ParseContext {
    pub fn new(strategy: ParseStrategy) -> Self {
        Self::resume(strategy, 0, HeadingCounter::new())
    }

    /// A context for a slice that starts `line_offset` lines into the
    /// document, continuing an existing heading counter.
    pub fn resume(strategy: ParseStrategy, line_offset: usize, headings: HeadingCounter) -> Self {
        Self {
            cursor: 0,
            line_offset,
            strategy,
            diagnostics: vec![],
            headings,
            depth: 0,
            enclosing_closer: None,
        }
    }

    pub fn strategy(&self) -> ParseStrategy {
        self.strategy
    }

    /// 1-based document line number for a slice index.
    pub fn line_number(&self, index: usize) -> usize {
        self.line_offset + index + 1
    }

    /// Records a diagnostic. Under [`ParseStrategy::Strict`] this is fatal.
    pub fn report(&mut self, diagnostic: Diagnostic) -> Result<(), ParseError> {
        match self.strategy {
            ParseStrategy::Strict => Err(diagnostic.into_error()),
            ParseStrategy::Graceful => {
                log::debug!(
                    "line {}: {:?}: {}",
                    diagnostic.line,
                    diagnostic.kind,
                    diagnostic.message
                );
                self.diagnostics.push(diagnostic);
                Ok(())
            }
        }
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn next_heading_id(&mut self) -> String {
        self.headings.next_id()
    }

    /// Gives every heading in `node` (and below) an auto id if it lacks one.
    pub fn assign_heading_ids(&mut self, node: &Node) {
        node.walk(&mut |n, _| {
            if n.heading_level().is_some() && n.heading_id().is_none() {
                let id = self.headings.next_id();
                n.assign_heading_id(id);
            }
        });
    }

    /// Enters a nested parse; false once [`MAX_DEPTH`] is reached.
    pub fn enter(&mut self) -> bool {
        if self.depth >= MAX_DEPTH {
            return false;
        }
        self.depth += 1;
        true
    }

    pub fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    pub fn enclosing_closer(&self) -> Option<usize> {
        self.enclosing_closer
    }

    /// Sets the closer line for the body about to be parsed, returning the
    /// previous one for the caller to restore.
    pub fn set_enclosing_closer(&mut self, line: Option<usize>) -> Option<usize> {
        std::mem::replace(&mut self.enclosing_closer, line)
    }

    pub fn finish(self) -> (Vec<Diagnostic>, HeadingCounter) {
        (self.diagnostics, self.headings)
    }
}
