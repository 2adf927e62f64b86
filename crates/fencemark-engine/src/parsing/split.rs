use std::sync::Arc;

use super::{
    blocks::opens_block,
    keywords::KeywordRegistry,
    markers::is_closing_marker,
};

/// Tracks block structure across a line stream to find safe split points.
///
/// A cut before line `k` is safe when line `k-1` is blank and no block is
/// open at `k`. Parsing the two halves separately then gives the same nodes
/// as parsing the whole: paragraphs and lists end at blank lines, and no
/// fence pairs across the cut.
///
/// Fence pairing follows the block parser exactly, including which openers
/// count as opening a block and the lookahead bound on an unclosed one.
#[derive(Debug, Clone)]
pub struct SplitScanner {
    registry: Arc<KeywordRegistry>,
    max_lookahead: usize,
    depth: usize,
    /// Lines seen since the outermost open block started.
    open_for: usize,
    prev_blank: bool,
}

impl SplitScanner {
    pub fn new(registry: Arc<KeywordRegistry>, max_lookahead: usize) -> Self {
        Self {
            registry,
            max_lookahead,
            depth: 0,
            open_for: 0,
            prev_blank: false,
        }
    }

    /// Feeds the next line and reports whether a cut just before it is safe.
    pub fn push(&mut self, line: &str) -> bool {
        let safe = self.depth == 0 && self.prev_blank;

        if self.depth > 0 {
            self.open_for += 1;
            if self.open_for > self.max_lookahead {
                // The parser gives up on the closer here and resumes scanning.
                self.depth = 0;
                self.open_for = 0;
            }
        }

        if is_closing_marker(line) {
            self.depth = self.depth.saturating_sub(1);
        } else if opens_block(line, &self.registry) {
            if self.depth == 0 {
                self.open_for = 0;
            }
            self.depth += 1;
        }
        self.prev_blank = line.trim().is_empty();
        safe
    }

    pub fn in_block(&self) -> bool {
        self.depth > 0
    }

    /// Forgets all state, as after a forced cut.
    pub fn reset(&mut self) {
        self.depth = 0;
        self.open_for = 0;
        self.prev_blank = false;
    }
}
