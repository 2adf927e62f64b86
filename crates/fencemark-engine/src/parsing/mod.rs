//! # Parsing
//!
//! Marker-driven recursive parsing of a line stream into a node forest.
//!
//! ## Phases
//!
//! 1. **Line classification** (`markers`): each line on its own becomes a
//!    blank, opener, closer, single-line marker, list item or text line
//! 2. **Block construction** (`blocks`, `lists`): a state machine consumes
//!    classified lines, interpreting keyword phrases (`keywords`)
//! 3. **Inline processing** (`inline`): `#kw#content##` markers inside text
//!
//! ## Modules
//!
//! - **`context`**: `ParseContext`, `ParseStrategy`, diagnostics, heading counter
//! - **`assembler`**: `DocumentAssembler`, the single top-level pass
//! - **`split`**: `SplitScanner`, safe chunk boundaries for the streaming engine

pub mod assembler;
pub mod blocks;
pub mod context;
pub mod inline;
pub mod keywords;
pub mod lists;
pub mod markers;
pub mod split;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use crate::{error::ParseError, node::Node};

use assembler::DocumentAssembler;
use blocks::ParserOptions;
use context::{Diagnostic, ParseStrategy};
use keywords::KeywordRegistry;

#[derive(Debug, Clone, Default)]
pub struct ParsedDoc {
    pub nodes: Vec<Node>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Parses a whole document in one run.
pub fn parse_document(
    text: &str,
    registry: Arc<KeywordRegistry>,
    options: ParserOptions,
) -> Result<ParsedDoc, ParseError> {
    let lines: Vec<&str> = text.lines().collect();
    let assembled = DocumentAssembler::new(registry, options).assemble(&lines)?;
    Ok(ParsedDoc {
        nodes: assembled.nodes,
        diagnostics: assembled.diagnostics,
    })
}

/// Convenience: graceful parse with the default registry. Never fails.
pub fn parse_str(text: &str) -> ParsedDoc {
    let lines: Vec<&str> = text.lines().collect();
    let assembler = DocumentAssembler::new(
        Arc::new(KeywordRegistry::default()),
        ParserOptions {
            strategy: ParseStrategy::Graceful,
            ..ParserOptions::default()
        },
    );
    match assembler.assemble(&lines) {
        Ok(assembled) => ParsedDoc {
            nodes: assembled.nodes,
            diagnostics: assembled.diagnostics,
        },
        // Only strict runs return Err.
        Err(err) => ParsedDoc {
            nodes: vec![Node::error(err.to_string(), None, None)],
            diagnostics: vec![],
        },
    }
}
