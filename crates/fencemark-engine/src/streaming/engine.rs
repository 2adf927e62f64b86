use std::{fmt, sync::Arc};

use serde::Serialize;

use crate::{
    error::EngineError,
    node::Node,
    parsing::{
        assembler::DocumentAssembler, context::Diagnostic, context::HeadingCounter,
        keywords::KeywordRegistry,
    },
};

use super::{
    Controls, ParsedUnit,
    cancel::CancellationToken,
    memory::{MemoryMonitor, MemoryProbe, SysinfoProbe},
    options::{EngineOptions, ExecutionMode, select_mode},
    parallel::{ParallelRun, Step, assembler_per_chunk},
    progress::{Progress, ProgressObserver, ProgressTracker},
    sequential::SequentialRun,
    source::{Source, SourceStats},
};

/// Entry point: picks a mode for a source and streams its parse.
#[derive(Clone)]
pub struct Engine {
    options: EngineOptions,
    registry: Arc<KeywordRegistry>,
    probe: Arc<dyn MemoryProbe>,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineOptions::default())
    }
}

impl Engine {
    pub fn new(options: EngineOptions) -> Self {
        Self {
            options,
            registry: Arc::new(KeywordRegistry::default()),
            probe: Arc::new(SysinfoProbe::new()),
        }
    }

    pub fn with_registry(mut self, registry: Arc<KeywordRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_memory_probe(mut self, probe: Arc<dyn MemoryProbe>) -> Self {
        self.probe = probe;
        self
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn registry(&self) -> &Arc<KeywordRegistry> {
        &self.registry
    }

    /// Streams `source` in the mode its size calls for.
    pub fn stream(&self, source: impl Into<Source>) -> Result<DocumentStream, EngineError> {
        self.open(source.into(), None)
    }

    /// Streams `source` in `mode`, still subject to the fallback chain.
    pub fn stream_as(
        &self,
        source: impl Into<Source>,
        mode: ExecutionMode,
    ) -> Result<DocumentStream, EngineError> {
        self.open(source.into(), Some(mode))
    }

    /// Drains a stream into one [`Document`].
    pub fn parse(&self, source: impl Into<Source>) -> Result<Document, EngineError> {
        self.stream(source)?.collect_document()
    }

    pub fn parse_as(
        &self,
        source: impl Into<Source>,
        mode: ExecutionMode,
    ) -> Result<Document, EngineError> {
        self.stream_as(source, mode)?.collect_document()
    }

    fn open(&self, source: Source, mode: Option<ExecutionMode>) -> Result<DocumentStream, EngineError> {
        self.options.validate()?;
        let stats = source.measure(self.options.read_batch_bytes)?;
        let workers = self.options.resolved_workers();
        let mode = mode.unwrap_or_else(|| select_mode(stats.bytes, stats.lines, workers, &self.options));
        log::debug!(
            "{} bytes, {} lines, {workers} workers: {mode} mode",
            stats.bytes,
            stats.lines
        );

        let monitor = MemoryMonitor::new(
            Arc::clone(&self.probe),
            self.options.memory_sample_interval(),
            self.options.memory_warning_bytes,
            self.options.memory_critical_bytes,
        );
        let controls = Controls {
            cancel: CancellationToken::new(),
            memory: monitor.shared(),
        };

        let mut stream = DocumentStream {
            source,
            stats,
            options: self.options.clone(),
            registry: Arc::clone(&self.registry),
            workers,
            controls,
            monitor,
            runner: Runner::Done,
            tracker: ProgressTracker::new(stats.lines),
            observer: None,
            summary: StreamSummary::new(mode, stats.lines),
            index: 0,
            finished_hard_splits: 0,
        };
        stream.runner = stream.open_runner(mode, 0, HeadingCounter::new())?;
        Ok(stream)
    }
}

/// A mode change taken while opening or running a stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Fallback {
    pub from: ExecutionMode,
    pub to: ExecutionMode,
    pub reason: String,
}

/// How a stream ran, complete once the stream is exhausted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamSummary {
    pub initial_mode: ExecutionMode,
    /// Mode in effect at the end.
    pub mode: ExecutionMode,
    pub fallbacks: Vec<Fallback>,
    pub total_lines: usize,
    pub units: usize,
    pub failed_chunks: usize,
    pub hard_splits: usize,
    pub cancelled: bool,
}

impl StreamSummary {
    fn new(mode: ExecutionMode, total_lines: usize) -> Self {
        Self {
            initial_mode: mode,
            mode,
            fallbacks: vec![],
            total_lines,
            units: 0,
            failed_chunks: 0,
            hard_splits: 0,
            cancelled: false,
        }
    }
}

/// One emitted unit: a whole document, a sequential window or a chunk.
#[derive(Debug, Clone)]
pub struct StreamItem {
    /// Position in the stream, from 0.
    pub index: usize,
    pub mode: ExecutionMode,
    /// Zero-based `[start_line, end_line)` range of the document covered.
    pub start_line: usize,
    pub end_line: usize,
    /// Worker that parsed the unit (parallel mode).
    pub owner: Option<usize>,
    pub nodes: Vec<Node>,
    pub diagnostics: Vec<Diagnostic>,
    pub progress: Progress,
    /// Why the unit failed; its nodes are then a single error node.
    pub failed: Option<String>,
}

/// Everything a stream produced, gathered in order.
#[derive(Debug, Clone)]
pub struct Document {
    pub nodes: Vec<Node>,
    pub diagnostics: Vec<Diagnostic>,
    pub summary: StreamSummary,
}

enum Runner {
    Whole {
        start_line: usize,
        headings: HeadingCounter,
    },
    Sequential(SequentialRun),
    Parallel(ParallelRun),
    Done,
}

impl Runner {
    fn hard_splits(&self) -> usize {
        match self {
            Runner::Sequential(run) => run.hard_splits(),
            Runner::Parallel(run) => run.hard_splits(),
            Runner::Whole { .. } | Runner::Done => 0,
        }
    }
}

enum Advance {
    Unit(Option<Result<ParsedUnit, EngineError>>),
    Fallback {
        resume_line: usize,
        headings: HeadingCounter,
        reason: String,
    },
}

/// Lazy, pull-based, single-use sequence of parsed units in document order.
///
/// Each `next` drives the selected runner forward by one unit. After the
/// first `None` or `Err` the stream stays exhausted and [`summary`] is final.
///
/// [`summary`]: DocumentStream::summary
pub struct DocumentStream {
    source: Source,
    stats: SourceStats,
    options: EngineOptions,
    registry: Arc<KeywordRegistry>,
    workers: usize,
    controls: Controls,
    monitor: MemoryMonitor,
    runner: Runner,
    tracker: ProgressTracker,
    observer: Option<ProgressObserver>,
    summary: StreamSummary,
    index: usize,
    finished_hard_splits: usize,
}

impl fmt::Debug for DocumentStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentStream")
            .field("source", &self.source)
            .field("stats", &self.stats)
            .field("summary", &self.summary)
            .finish_non_exhaustive()
    }
}

impl DocumentStream {
    /// Attaches a callback run with every emitted unit's progress.
    pub fn with_progress(mut self, observer: impl FnMut(&Progress) + Send + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    /// Token that stops the stream between units when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.controls.cancel.clone()
    }

    pub fn stats(&self) -> SourceStats {
        self.stats
    }

    pub fn mode(&self) -> ExecutionMode {
        self.summary.mode
    }

    pub fn summary(&self) -> &StreamSummary {
        &self.summary
    }

    pub fn collect_document(mut self) -> Result<Document, EngineError> {
        let mut nodes = vec![];
        let mut diagnostics = vec![];
        for item in self.by_ref() {
            let item = item?;
            nodes.extend(item.nodes);
            diagnostics.extend(item.diagnostics);
        }
        Ok(Document {
            nodes,
            diagnostics,
            summary: self.summary,
        })
    }

    fn record_fallback(&mut self, from: ExecutionMode, to: ExecutionMode, reason: String) {
        log::warn!("falling back from {from} to {to}: {reason}");
        self.summary.fallbacks.push(Fallback { from, to, reason });
        self.summary.mode = to;
    }

    /// Builds the runner for `mode`, stepping down the fallback chain when a
    /// mode cannot start.
    fn open_runner(
        &mut self,
        mut mode: ExecutionMode,
        start_line: usize,
        headings: HeadingCounter,
    ) -> Result<Runner, EngineError> {
        loop {
            self.summary.mode = mode;
            let failure = match mode {
                ExecutionMode::Parallel => {
                    let parse = assembler_per_chunk(
                        Arc::clone(&self.registry),
                        self.options.parser_options(),
                    );
                    match ParallelRun::new(
                        &self.source,
                        Arc::clone(&self.registry),
                        &self.options,
                        self.workers.max(1),
                        self.stats.lines,
                        self.controls.clone(),
                        parse,
                    ) {
                        Ok(run) => {
                            log::debug!("parallel run on {} workers", run.workers());
                            self.tracker.set_chunks_total(run.chunks_total());
                            return Ok(Runner::Parallel(run));
                        }
                        Err(err @ (EngineError::WorkerPool(_) | EngineError::ChunkPlan(_))) => err,
                        Err(err) => return Err(err),
                    }
                }
                ExecutionMode::Sequential => match SequentialRun::new(
                    &self.source,
                    start_line,
                    headings.clone(),
                    Arc::clone(&self.registry),
                    &self.options,
                ) {
                    Ok(run) => return Ok(Runner::Sequential(run)),
                    Err(err @ EngineError::ChunkPlan(_)) => err,
                    Err(err) => return Err(err),
                },
                ExecutionMode::Whole => {
                    return Ok(Runner::Whole {
                        start_line,
                        headings,
                    });
                }
            };
            let Some(next) = mode.fallback() else {
                return Err(failure);
            };
            self.record_fallback(mode, next, failure.to_string());
            mode = next;
        }
    }

    fn run_whole(
        &self,
        start_line: usize,
        headings: HeadingCounter,
    ) -> Result<ParsedUnit, EngineError> {
        let text = self.source.read_all()?;
        let lines: Vec<&str> = text.lines().skip(start_line).collect();
        let assembler = DocumentAssembler::new(Arc::clone(&self.registry), self.options.parser_options());
        let assembled = assembler.assemble_from(&lines, start_line, headings)?;
        log::debug!("whole document: {} nodes", assembled.nodes.len());
        Ok(ParsedUnit {
            start: start_line,
            end: start_line + lines.len(),
            owner: None,
            nodes: assembled.nodes,
            diagnostics: assembled.diagnostics,
            failed: None,
        })
    }

    fn advance(&mut self) -> Advance {
        match &mut self.runner {
            Runner::Done => Advance::Unit(None),
            Runner::Whole { .. } => {
                let Runner::Whole {
                    start_line,
                    headings,
                } = std::mem::replace(&mut self.runner, Runner::Done)
                else {
                    return Advance::Unit(None);
                };
                Advance::Unit(Some(self.run_whole(start_line, headings)))
            }
            Runner::Sequential(run) => {
                let mut relieve = false;
                self.monitor.check(|| relieve = true);
                if relieve {
                    run.shrink();
                }
                Advance::Unit(run.next_unit())
            }
            Runner::Parallel(run) => match run.next_step(&mut self.monitor) {
                Some(Ok(Step::Unit(unit))) => {
                    self.tracker.chunk_completed();
                    self.tracker.set_chunks_total(run.chunks_total());
                    Advance::Unit(Some(Ok(unit)))
                }
                Some(Ok(Step::Fallback {
                    resume_line,
                    headings,
                    reason,
                })) => Advance::Fallback {
                    resume_line,
                    headings,
                    reason,
                },
                Some(Err(err)) => Advance::Unit(Some(Err(err))),
                None => Advance::Unit(None),
            },
        }
    }

    fn finish(&mut self) {
        let runner = std::mem::replace(&mut self.runner, Runner::Done);
        self.finished_hard_splits += runner.hard_splits();
        self.summary.hard_splits = self.finished_hard_splits;
        self.summary.cancelled = self.controls.cancel.is_cancelled();
    }

    fn emit(&mut self, unit: ParsedUnit) -> StreamItem {
        if unit.failed.is_some() {
            self.summary.failed_chunks += 1;
        }
        self.summary.units += 1;
        self.summary.hard_splits = self.finished_hard_splits + self.runner.hard_splits();

        let progress = self.tracker.at(unit.end);
        if let Some(observer) = self.observer.as_mut() {
            observer(&progress);
        }
        let index = self.index;
        self.index += 1;
        StreamItem {
            index,
            mode: self.summary.mode,
            start_line: unit.start,
            end_line: unit.end,
            owner: unit.owner,
            nodes: unit.nodes,
            diagnostics: unit.diagnostics,
            progress,
            failed: unit.failed,
        }
    }
}

impl Iterator for DocumentStream {
    type Item = Result<StreamItem, EngineError>;

    fn next(&mut self) -> Option<Self::Item> {
        if matches!(self.runner, Runner::Done) {
            return None;
        }
        // Parallel runs still hand back chunks that already finished.
        if self.controls.cancel.is_cancelled() && !matches!(self.runner, Runner::Parallel(_)) {
            log::debug!("stream cancelled after {} units", self.summary.units);
            self.finish();
            return None;
        }

        loop {
            match self.advance() {
                Advance::Unit(Some(Ok(unit))) => return Some(Ok(self.emit(unit))),
                Advance::Unit(Some(Err(err))) => {
                    self.finish();
                    return Some(Err(err));
                }
                Advance::Unit(None) => {
                    self.finish();
                    return None;
                }
                Advance::Fallback {
                    resume_line,
                    headings,
                    reason,
                } => {
                    let from = self.summary.mode;
                    self.finished_hard_splits += self.runner.hard_splits();
                    self.runner = Runner::Done;
                    self.tracker.clear_chunks();
                    self.record_fallback(from, ExecutionMode::Sequential, reason);
                    match self.open_runner(ExecutionMode::Sequential, resume_line, headings) {
                        Ok(runner) => self.runner = runner,
                        Err(err) => {
                            self.finish();
                            return Some(Err(err));
                        }
                    }
                }
            }
        }
    }
}
