//! # Inline Kinds
//!
//! Inline-specific types that own their syntax delimiters and vocabulary.
//!
//! ## Types
//!
//! - **`InlineFence`**: `OPEN = b'#'`, `CLOSE = b"##"`
//! - **`InlineKeyword`**: the fixed keyword -> node table
//! - **`ruby`**: the `base(reading)` sub-pattern
//!
//! The parser calls these; it never hardcodes `#` or a keyword itself.

pub mod fence;
pub mod keyword;
pub mod ruby;

pub use fence::InlineFence;
pub use keyword::InlineKeyword;
