use std::path::PathBuf;

/// Errors surfaced by the strict parse strategy.
///
/// The graceful strategy never returns these; it embeds the same problems as
/// error nodes and diagnostics instead.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("line {line}: {message}")]
    MarkerSyntax {
        line: usize,
        message: String,
        suggestion: Option<String>,
    },

    #[error("line {line}: {message}")]
    Structural { line: usize, message: String },

    #[error("parser made no progress at line {line} after {iterations} iterations")]
    CircuitBreaker { line: usize, iterations: usize },
}

/// Errors from the execution engine (mode selection, streaming, workers).
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("memory critical: {resident_bytes} bytes resident (limit {limit_bytes})")]
    MemoryCritical {
        resident_bytes: u64,
        limit_bytes: u64,
    },

    #[error("worker pool unavailable: {0}")]
    WorkerPool(String),

    #[error("could not plan chunks: {0}")]
    ChunkPlan(String),

    #[error("invalid engine options: {0}")]
    InvalidOptions(String),
}
