//! # fencemark engine
//!
//! Parses fence-marker documents (`;;;keyword` blocks and `#keyword#text##`
//! inline markers) into a node tree, streams very large inputs through a
//! chunked worker pool, and renders HTML plus a table of contents.

pub mod error;
pub mod node;
pub mod parsing;
pub mod render;
pub mod streaming;

// Re-export key types for easier usage
pub use error::{EngineError, ParseError};
pub use node::{Attributes, Content, Fragment, MAX_DEPTH, Node, NodeKind};
pub use parsing::{
    ParsedDoc,
    blocks::ParserOptions,
    context::{Diagnostic, DiagnosticKind, ParseStrategy},
    keywords::{KeywordOverrides, KeywordRegistry},
    parse_document, parse_str,
};
pub use render::{HtmlRenderer, Toc, TocEntry, extract_toc, render, render_document, render_nodes};
pub use streaming::{
    CancellationToken, Document, DocumentStream, Engine, EngineOptions, ExecutionMode, FixedProbe,
    MemoryProbe, Progress, Source, StreamItem, StreamSummary,
};
