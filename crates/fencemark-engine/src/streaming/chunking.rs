use std::sync::Arc;

use crate::{
    error::EngineError,
    parsing::{keywords::KeywordRegistry, split::SplitScanner},
};

use super::options::EngineOptions;

/// A contiguous `[start, end)` range of lines parsed as one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub id: usize,
    pub start: usize,
    pub end: usize,
    pub lines: Vec<String>,
    /// Worker that parsed the chunk, once one has.
    pub owner: Option<usize>,
    /// The chunk ends at a forced cut rather than a safe split point.
    pub hard_split: bool,
}

impl Chunk {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Chunk sizing: cut at the first safe point once `target` lines are
/// buffered, force a cut at `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPlan {
    pub target: usize,
    pub max: usize,
}

impl ChunkPlan {
    /// Sizes chunks so every worker gets about `chunks_per_worker` of them,
    /// within the configured bounds.
    pub fn adaptive(
        total_lines: usize,
        workers: usize,
        options: &EngineOptions,
    ) -> Result<Self, EngineError> {
        if workers == 0 {
            return Err(EngineError::ChunkPlan("no workers".into()));
        }
        if options.min_chunk_lines > options.max_chunk_lines {
            return Err(EngineError::ChunkPlan(format!(
                "min_chunk_lines {} exceeds max_chunk_lines {}",
                options.min_chunk_lines, options.max_chunk_lines
            )));
        }
        let slots = workers * options.chunks_per_worker.max(1);
        let target = total_lines
            .div_ceil(slots)
            .clamp(options.min_chunk_lines.max(1), options.max_chunk_lines);
        Ok(Self {
            target,
            max: options.max_chunk_lines,
        })
    }

    /// Bounded window for sequential streaming.
    pub fn window(options: &EngineOptions) -> Result<Self, EngineError> {
        if options.window_lines == 0 {
            return Err(EngineError::ChunkPlan("window_lines must be positive".into()));
        }
        Ok(Self {
            target: options.window_lines,
            max: options.max_chunk_lines.max(options.window_lines),
        })
    }
}

/// Cuts a line stream into [`Chunk`]s at safe split points.
pub struct Chunker<I> {
    lines: I,
    scanner: SplitScanner,
    plan: ChunkPlan,
    next_id: usize,
    next_line: usize,
    buffer: Vec<String>,
    /// First line of the next chunk, already fed to the scanner.
    pending: Option<String>,
    done: bool,
    hard_splits: usize,
}

impl<I> Chunker<I>
where
    I: Iterator<Item = Result<String, EngineError>>,
{
    /// `first_line` is the document line index of the first line `lines` yields.
    pub fn new(
        lines: I,
        registry: Arc<KeywordRegistry>,
        max_lookahead: usize,
        plan: ChunkPlan,
        first_line: usize,
    ) -> Self {
        Self {
            lines,
            scanner: SplitScanner::new(registry, max_lookahead),
            plan,
            next_id: 0,
            next_line: first_line,
            buffer: Vec::new(),
            pending: None,
            done: false,
            hard_splits: 0,
        }
    }

    pub fn hard_splits(&self) -> usize {
        self.hard_splits
    }

    /// Drops spare buffer capacity.
    pub fn shrink(&mut self) {
        self.buffer.shrink_to_fit();
    }

    fn emit(&mut self, hard_split: bool) -> Chunk {
        let lines = std::mem::take(&mut self.buffer);
        let start = self.next_line;
        self.next_line += lines.len();
        let id = self.next_id;
        self.next_id += 1;
        Chunk {
            id,
            start,
            end: self.next_line,
            lines,
            owner: None,
            hard_split,
        }
    }
}

impl<I> Iterator for Chunker<I>
where
    I: Iterator<Item = Result<String, EngineError>>,
{
    type Item = Result<Chunk, EngineError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if let Some(line) = self.pending.take() {
            self.buffer.push(line);
        }
        loop {
            let line = match self.lines.next() {
                Some(Ok(line)) => line,
                Some(Err(err)) => {
                    self.done = true;
                    return Some(Err(err));
                }
                None => {
                    self.done = true;
                    return (!self.buffer.is_empty()).then(|| Ok(self.emit(false)));
                }
            };

            if self.buffer.len() >= self.plan.max {
                self.hard_splits += 1;
                log::warn!(
                    "no safe split point within {} lines, forcing a cut before line {}",
                    self.plan.max,
                    self.next_line + self.buffer.len() + 1
                );
                self.scanner.reset();
                self.scanner.push(&line);
                self.pending = Some(line);
                return Some(Ok(self.emit(true)));
            }

            let safe = self.scanner.push(&line);
            if safe && self.buffer.len() >= self.plan.target {
                self.pending = Some(line);
                return Some(Ok(self.emit(false)));
            }
            self.buffer.push(line);
        }
    }
}
