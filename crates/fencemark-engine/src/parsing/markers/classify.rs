use crate::parsing::lists::{self, indent_width};

use super::fence::{Fence, FenceShape};

/// What a single line is, judged without any surrounding context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Blank,
    Opener,
    Closer,
    SingleLine,
    ListItem,
    Text,
}

/// Classification of a single line containing only local facts.
///
/// This is phase 1 of block parsing: each line is classified independently
/// and the block parser decides what to do with the sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineClass {
    pub kind: LineKind,
    /// Leading spaces, tabs counted as 4.
    pub indent: usize,
}

impl LineClass {
    /// Lines that end a running paragraph.
    pub fn interrupts_paragraph(&self) -> bool {
        !matches!(self.kind, LineKind::Text)
    }
}

/// Classifies individual lines for the block parsing phase.
#[derive(Debug, Default, Clone, Copy)]
pub struct LineClassifier;

impl LineClassifier {
    /// Fences take precedence over list markers, which take precedence over text.
    pub fn classify(&self, line: &str) -> LineClass {
        let indent = indent_width(line);
        let kind = if line.trim().is_empty() {
            LineKind::Blank
        } else if let Some(shape) = Fence::shape(line) {
            match shape {
                FenceShape::Opening => LineKind::Opener,
                FenceShape::Closing => LineKind::Closer,
                FenceShape::SingleLine => LineKind::SingleLine,
            }
        } else if lists::is_list_line(line) {
            LineKind::ListItem
        } else {
            LineKind::Text
        };
        LineClass { kind, indent }
    }
}
