//! # Keyword Interpreter
//!
//! Turns the keyword phrase after a fence into nodes.
//!
//! ## Modules
//!
//! - **`normalize`**: tolerant-syntax cleanup (full-width spaces, glued attributes)
//! - **`phrase`**: splits a phrase into keywords, attributes and errors
//! - **`registry`**: keyword -> tag mapping, overridable from configuration
//! - **`factory`**: builds single nodes and compound ancestor chains
//! - **`suggest`**: nearest-keyword suggestions by edit distance

pub mod factory;
pub mod normalize;
pub mod phrase;
pub mod registry;
pub mod suggest;

pub use factory::{create_compound, create_single};
pub use normalize::normalize;
pub use phrase::{Phrase, PhraseError, parse};
pub use registry::{CustomKeyword, KeywordOverrides, KeywordRegistry};
