//! # Marker Recognition
//!
//! Phase 1 of block parsing: every line is classified on its own, with no
//! look-behind. Fence syntax lives in [`fence`]; [`classify`] layers list and
//! blank detection on top.
//!
//! [`Marker`] is the parsed form of one fence line: its shape plus the
//! interpreted keyword phrase.

pub mod classify;
pub mod fence;

pub use classify::{LineClass, LineClassifier, LineKind};
pub use fence::{
    Fence, FenceShape, is_closing_marker, is_marker_line, is_opening_marker,
    is_single_line_marker,
};

use crate::node::Attributes;

use super::keywords::{KeywordRegistry, PhraseError, parse};

/// A fence line with its keyword phrase interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marker {
    pub raw: String,
    pub shape: FenceShape,
    pub keywords: Vec<String>,
    pub attributes: Attributes,
    pub errors: Vec<PhraseError>,
    /// Body of a single-line marker (`;;;kw;;; body ;;;`).
    pub inline_body: Option<String>,
}

impl Marker {
    /// Reads an opener or single-line marker. Closers and non-fence lines
    /// give `None`.
    pub fn read(line: &str, registry: &KeywordRegistry) -> Option<Self> {
        let shape = Fence::shape(line)?;
        let (phrase, inline_body) = match shape {
            FenceShape::Closing => return None,
            FenceShape::Opening => (Fence::opener_phrase(line), None),
            FenceShape::SingleLine => {
                let (phrase, body) = Fence::split_single_line(line)?;
                (phrase, body.map(str::to_string))
            }
        };
        let parsed = parse(phrase, registry);
        Some(Self {
            raw: line.to_string(),
            shape,
            keywords: parsed.keywords,
            attributes: parsed.attributes,
            errors: parsed.errors,
            inline_body,
        })
    }

    /// Invalid markers cannot produce a node and are replaced by an error.
    pub fn is_valid(&self) -> bool {
        !self.errors.iter().any(PhraseError::invalidates_marker)
    }

    pub fn is_empty_keyword(&self) -> bool {
        self.keywords.is_empty()
    }

    /// The first error that invalidates the marker.
    pub fn fatal_error(&self) -> Option<&PhraseError> {
        self.errors.iter().find(|e| e.invalidates_marker())
    }
}
