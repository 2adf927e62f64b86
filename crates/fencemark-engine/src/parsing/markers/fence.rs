/// Shape of a line that carries a block fence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FenceShape {
    /// `;;;phrase` with no trailing fence.
    Opening,
    /// A line that trims to exactly `;;;`.
    Closing,
    /// `;;;phrase;;;` or `;;;phrase;;; content ;;;`.
    SingleLine,
}

/// Block fence type with owned delimiter constant.
///
/// All fence syntax knowledge lives here; the classifier and block parser
/// call these helpers and never match `;;;` themselves.
pub struct Fence;

impl Fence {
    pub const MARK: &'static str = ";;;";

    /// Shortest line that can hold a fence, one phrase character and a fence.
    const MIN_SINGLE_LINE: usize = 2 * Self::MARK.len() + 1;

    pub fn shape(line: &str) -> Option<FenceShape> {
        if is_closing_marker(line) {
            Some(FenceShape::Closing)
        } else if is_single_line_marker(line) {
            Some(FenceShape::SingleLine)
        } else if is_opening_marker(line) {
            Some(FenceShape::Opening)
        } else {
            None
        }
    }

    /// Text after the opening fence of an opener line.
    pub fn opener_phrase(line: &str) -> &str {
        line.trim()
            .strip_prefix(Self::MARK)
            .unwrap_or_default()
            .trim()
    }

    /// Splits a single-line marker into its phrase and optional content.
    ///
    /// `;;;kw;;;` gives `("kw", None)`; `;;;kw;;; body ;;;` gives
    /// `("kw", Some("body"))`.
    pub fn split_single_line(line: &str) -> Option<(&str, Option<&str>)> {
        if !is_single_line_marker(line) {
            return None;
        }
        let inner = single_line_inner(line.trim());
        match inner.split_once(Self::MARK) {
            Some((phrase, content)) => Some((phrase.trim(), Some(content.trim()))),
            None => Some((inner.trim(), None)),
        }
    }
}

/// Whether the text between fences says anything.
fn is_non_trivial(s: &str) -> bool {
    let t = s.trim();
    !t.is_empty() && !t.chars().all(|c| c == ';')
}

fn single_line_inner(trimmed: &str) -> &str {
    &trimmed[Fence::MARK.len()..trimmed.len() - Fence::MARK.len()]
}

/// True iff the line starts with the fence, has a non-trivial phrase and does
/// not also end with the fence.
pub fn is_opening_marker(line: &str) -> bool {
    let t = line.trim();
    let Some(rest) = t.strip_prefix(Fence::MARK) else {
        return false;
    };
    !t.ends_with(Fence::MARK) && is_non_trivial(rest)
}

/// True iff the trimmed line equals exactly the fence.
pub fn is_closing_marker(line: &str) -> bool {
    line.trim() == Fence::MARK
}

/// True iff the line is the self-closing form: fence, non-trivial inner text,
/// fence, with the two fences not overlapping.
pub fn is_single_line_marker(line: &str) -> bool {
    let t = line.trim();
    t.len() >= Fence::MIN_SINGLE_LINE
        && t.starts_with(Fence::MARK)
        && t.ends_with(Fence::MARK)
        && is_non_trivial(single_line_inner(t))
}

/// Any line the block parser treats as a fence.
pub fn is_marker_line(line: &str) -> bool {
    Fence::shape(line).is_some()
}
