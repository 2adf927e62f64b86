use std::time::{Duration, Instant};

use serde::Serialize;

/// Snapshot of how far a stream has got.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Progress {
    /// Lines consumed so far, counting from 1.
    pub current_line: usize,
    pub total_lines: usize,
    pub percent: f64,
    /// Remaining time at the current throughput, when it can be estimated.
    pub eta_seconds: Option<f64>,
    pub lines_per_second: f64,
    /// Parallel mode only.
    pub chunks_completed: Option<usize>,
    pub chunks_total: Option<usize>,
}

/// Observer called once per emitted unit.
pub type ProgressObserver = Box<dyn FnMut(&Progress) + Send>;

/// Turns line counts into [`Progress`] records against a start instant.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    started: Instant,
    total_lines: usize,
    chunks_total: Option<usize>,
    chunks_completed: usize,
}

impl ProgressTracker {
    pub fn new(total_lines: usize) -> Self {
        Self {
            started: Instant::now(),
            total_lines,
            chunks_total: None,
            chunks_completed: 0,
        }
    }

    pub fn set_chunks_total(&mut self, total: usize) {
        self.chunks_total = Some(total);
    }

    pub fn chunk_completed(&mut self) {
        self.chunks_completed += 1;
    }

    /// Parallel counters stop being reported after a fallback.
    pub fn clear_chunks(&mut self) {
        self.chunks_total = None;
    }

    pub fn at(&self, current_line: usize) -> Progress {
        self.with_elapsed(current_line, self.started.elapsed())
    }

    fn with_elapsed(&self, current_line: usize, elapsed: Duration) -> Progress {
        let current_line = current_line.min(self.total_lines);
        let percent = if self.total_lines == 0 {
            100.0
        } else {
            current_line as f64 * 100.0 / self.total_lines as f64
        };
        let secs = elapsed.as_secs_f64();
        let lines_per_second = if secs > 0.0 {
            current_line as f64 / secs
        } else {
            0.0
        };
        let eta_seconds = (lines_per_second > 0.0)
            .then(|| (self.total_lines - current_line) as f64 / lines_per_second);

        Progress {
            current_line,
            total_lines: self.total_lines,
            percent,
            eta_seconds,
            lines_per_second,
            chunks_completed: self.chunks_total.map(|_| self.chunks_completed),
            chunks_total: self.chunks_total,
        }
    }
}
