//! # Streaming engine
//!
//! Runs the document assembler over a [`Source`] in one of three
//! [`ExecutionMode`]s and hands the results back as a lazy, single-use
//! [`DocumentStream`].
//!
//! ## Modules
//!
//! - [`options`]: tunables and the pure mode-selection function
//! - [`source`]: in-memory or on-disk input, measured and read in batches
//! - [`chunking`]: adaptive chunk sizing and cutting at safe split points
//! - [`pool`]: named worker threads over a bounded MPMC queue
//! - [`memory`]: process memory probing and pressure levels
//! - [`progress`], [`cancel`]: progress records and cooperative cancellation
//! - [`engine`]: the public entry point and the fallback chain
//!
//! Chunks never share parser state. Output order always equals input order.

pub mod cancel;
pub mod chunking;
pub mod engine;
pub mod memory;
pub mod options;
mod parallel;
pub mod pool;
pub mod progress;
mod sequential;
pub mod source;

pub use cancel::CancellationToken;
pub use chunking::{Chunk, ChunkPlan, Chunker};
pub use engine::{Document, DocumentStream, Engine, Fallback, StreamItem, StreamSummary};
pub use memory::{FixedProbe, MemoryLevel, MemoryMonitor, MemoryProbe, SysinfoProbe};
pub use options::{EngineOptions, ExecutionMode, select_mode};
pub use progress::{Progress, ProgressObserver};
pub use source::{Source, SourceStats};

use crate::{node::Node, parsing::context::Diagnostic};

use memory::SharedMemoryLevel;

/// What a runner produces for one window or chunk.
#[derive(Debug, Clone)]
pub(crate) struct ParsedUnit {
    pub start: usize,
    pub end: usize,
    pub owner: Option<usize>,
    pub nodes: Vec<Node>,
    pub diagnostics: Vec<Diagnostic>,
    pub failed: Option<String>,
}

/// Signals every job of a run observes.
#[derive(Debug, Clone, Default)]
pub(crate) struct Controls {
    pub cancel: CancellationToken,
    pub memory: SharedMemoryLevel,
}
