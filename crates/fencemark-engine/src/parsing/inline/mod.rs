//! # Inline Markers
//!
//! Cursor-based processing of `#keyword#content##` markers within one line.
//!
//! ## Modules
//!
//! - **`kinds`**: delimiter constants, the inline keyword table, ruby splitting
//! - **`cursor`**: `Cursor` for byte-wise scanning
//! - **`parser`**: `process_inline()` main entry point
//!
//! ## Nesting
//!
//! Exactly one marker may nest inside another. Anything deeper is left as
//! literal text, which bounds recursion no matter what the input holds.
//! Code and ruby content are raw zones.

pub mod cursor;
pub mod kinds;
pub mod parser;

pub use parser::{MAX_INLINE_NESTING, process_inline};
