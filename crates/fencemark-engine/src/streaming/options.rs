use std::{num::NonZeroUsize, thread, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{
    error::EngineError,
    parsing::{blocks::ParserOptions, context::ParseStrategy},
};

const MIB: u64 = 1024 * 1024;
const GIB: u64 = 1024 * MIB;

/// How a document is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// One parse over the fully materialized text.
    Whole,
    /// A bounded window of lines at a time on the calling thread.
    Sequential,
    /// Chunks fanned out to a worker pool, results emitted in order.
    Parallel,
}

impl ExecutionMode {
    /// Next mode down the fallback chain.
    pub fn fallback(self) -> Option<Self> {
        match self {
            ExecutionMode::Parallel => Some(ExecutionMode::Sequential),
            ExecutionMode::Sequential => Some(ExecutionMode::Whole),
            ExecutionMode::Whole => None,
        }
    }
}

impl std::fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ExecutionMode::Whole => "whole",
            ExecutionMode::Sequential => "sequential",
            ExecutionMode::Parallel => "parallel",
        };
        f.write_str(name)
    }
}

/// Tunables for mode selection, chunking, workers and memory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    pub whole_document_max_bytes: u64,
    pub whole_document_max_lines: usize,
    /// 0 means the available parallelism.
    pub workers: usize,
    pub window_lines: usize,
    pub min_chunk_lines: usize,
    pub max_chunk_lines: usize,
    pub chunks_per_worker: usize,
    pub max_in_flight_per_worker: usize,
    pub chunk_timeout_ms: u64,
    pub memory_sample_interval_ms: u64,
    pub memory_warning_bytes: u64,
    pub memory_critical_bytes: u64,
    pub max_block_lookahead: usize,
    pub read_batch_bytes: usize,
    pub strategy: ParseStrategy,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            whole_document_max_bytes: MIB,
            whole_document_max_lines: 10_000,
            workers: 0,
            window_lines: 1_000,
            min_chunk_lines: 500,
            max_chunk_lines: 50_000,
            chunks_per_worker: 4,
            max_in_flight_per_worker: 2,
            chunk_timeout_ms: 30_000,
            memory_sample_interval_ms: 250,
            memory_warning_bytes: GIB,
            memory_critical_bytes: 2 * GIB,
            max_block_lookahead: 100_000,
            read_batch_bytes: 64 * 1024,
            strategy: ParseStrategy::Graceful,
        }
    }
}

impl EngineOptions {
    /// Rejects combinations no run could honour.
    pub fn validate(&self) -> Result<(), EngineError> {
        let invalid = |msg: &str| Err(EngineError::InvalidOptions(msg.to_string()));
        if self.read_batch_bytes == 0 {
            return invalid("read_batch_bytes must be positive");
        }
        if self.max_chunk_lines == 0 {
            return invalid("max_chunk_lines must be positive");
        }
        if self.memory_warning_bytes > self.memory_critical_bytes {
            return invalid("memory_warning_bytes exceeds memory_critical_bytes");
        }
        if self.max_block_lookahead == 0 {
            return invalid("max_block_lookahead must be positive");
        }
        Ok(())
    }

    /// Worker count with `0` resolved to the machine's parallelism.
    pub fn resolved_workers(&self) -> usize {
        if self.workers > 0 {
            return self.workers;
        }
        thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1)
    }

    pub fn parser_options(&self) -> ParserOptions {
        ParserOptions {
            strategy: self.strategy,
            max_block_lookahead: self.max_block_lookahead,
        }
    }

    pub fn chunk_timeout(&self) -> Duration {
        Duration::from_millis(self.chunk_timeout_ms)
    }

    pub fn memory_sample_interval(&self) -> Duration {
        Duration::from_millis(self.memory_sample_interval_ms)
    }
}

/// Picks the execution mode from the document's size and the worker count.
///
/// Pure: the same inputs always give the same mode.
pub fn select_mode(bytes: u64, lines: usize, workers: usize, options: &EngineOptions) -> ExecutionMode {
    if bytes <= options.whole_document_max_bytes && lines <= options.whole_document_max_lines {
        ExecutionMode::Whole
    } else if workers >= 2 {
        ExecutionMode::Parallel
    } else {
        ExecutionMode::Sequential
    }
}
