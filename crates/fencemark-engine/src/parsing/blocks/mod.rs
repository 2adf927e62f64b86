//! # Block Parsing
//!
//! Phase 2 of parsing: a state machine over classified lines.
//!
//! ## Modules
//!
//! - **`parser`**: `BlockParser` with `parse_block_marker`, `parse_paragraph`
//!   and the circuit-breaker loop
//! - **`image`**: `Image` vocabulary (extensions, source prefix) and node builder
//!
//! ## Key Invariants
//!
//! - No per-line failure escapes under the graceful strategy; problems become
//!   error nodes plus diagnostics
//! - The cursor always advances, and the loop is capped at twice the line count
//! - A closer is matched by one forward scan bounded by `max_block_lookahead`

pub mod image;
pub mod parser;

pub use image::{Image, image_node, is_image_filename};
pub use parser::{BlockParser, ParserOptions, opens_block};
