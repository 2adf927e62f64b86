use std::{
    any::Any,
    collections::{BTreeMap, HashMap},
    panic::{self, AssertUnwindSafe},
    sync::Arc,
    time::{Duration, Instant},
};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};

use crate::{
    error::{EngineError, ParseError},
    node::Node,
    parsing::{
        assembler::{Assembled, DocumentAssembler},
        blocks::ParserOptions,
        context::HeadingCounter,
        keywords::KeywordRegistry,
    },
};

use super::{
    Controls, ParsedUnit,
    chunking::{Chunk, ChunkPlan, Chunker},
    memory::{MemoryLevel, MemoryMonitor},
    options::EngineOptions,
    pool::{Job, WorkerPool},
    source::{LineReader, Source},
};

/// Parses one chunk's lines starting at the given document line offset.
pub(crate) type ChunkParseFn =
    Arc<dyn Fn(&[&str], usize) -> Result<Assembled, ParseError> + Send + Sync>;

/// Builds a fresh assembler inside every job; nothing is shared between
/// chunks but the read-only registry.
pub(crate) fn assembler_per_chunk(
    registry: Arc<KeywordRegistry>,
    options: ParserOptions,
) -> ChunkParseFn {
    Arc::new(move |lines: &[&str], offset: usize| {
        DocumentAssembler::new(Arc::clone(&registry), options).assemble_from(
            lines,
            offset,
            HeadingCounter::new(),
        )
    })
}

enum Message {
    Started { id: usize, worker: usize },
    Finished { id: usize, worker: usize, outcome: Outcome },
}

enum Outcome {
    Parsed(Assembled),
    Failed(String),
    Error(ParseError),
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    start: usize,
    end: usize,
    owner: Option<usize>,
    started: Option<Instant>,
}

pub(crate) enum Step {
    Unit(ParsedUnit),
    /// Memory stayed critical: continue sequentially from `resume_line`.
    Fallback {
        resume_line: usize,
        headings: HeadingCounter,
        reason: String,
    },
}

/// Fans chunks out to a [`WorkerPool`] and hands results back in chunk order.
///
/// At most `max_outstanding` chunks are dispatched but not yet emitted.
/// Finished chunks wait in a reorder buffer until every earlier chunk has
/// been emitted. Auto heading ids are renumbered at emission.
pub(crate) struct ParallelRun {
    pool: WorkerPool,
    chunker: Chunker<LineReader>,
    parse: ChunkParseFn,
    tx: Sender<Message>,
    rx: Receiver<Message>,
    controls: Controls,
    running: HashMap<usize, Slot>,
    /// A cut chunk whose job the full queue has not taken yet.
    backlog: Option<(usize, Job)>,
    finished: BTreeMap<usize, (Slot, Outcome)>,
    next_dispatch: usize,
    next_emit: usize,
    /// First line not yet emitted.
    emit_line: usize,
    /// When chunk `next_emit` became the next one due. Its timeout runs
    /// from here until a worker picks it up.
    due_since: Instant,
    exhausted: bool,
    max_outstanding: usize,
    estimated_chunks: usize,
    timeout: Duration,
    poll: Duration,
    headings: HeadingCounter,
}

impl ParallelRun {
    pub fn new(
        source: &Source,
        registry: Arc<KeywordRegistry>,
        options: &EngineOptions,
        workers: usize,
        total_lines: usize,
        controls: Controls,
        parse: ChunkParseFn,
    ) -> Result<Self, EngineError> {
        let plan = ChunkPlan::adaptive(total_lines, workers, options)?;
        let max_outstanding = workers * options.max_in_flight_per_worker.max(1);
        let pool = WorkerPool::new(workers, max_outstanding)?;
        let lines = source.lines_from(0, options.read_batch_bytes)?;
        let (tx, rx) = unbounded();
        log::debug!(
            "parallel run: {workers} workers, target {} lines per chunk",
            plan.target
        );

        Ok(Self {
            pool,
            chunker: Chunker::new(lines, registry, options.max_block_lookahead, plan, 0),
            parse,
            tx,
            rx,
            controls,
            running: HashMap::new(),
            backlog: None,
            finished: BTreeMap::new(),
            next_dispatch: 0,
            next_emit: 0,
            emit_line: 0,
            due_since: Instant::now(),
            exhausted: false,
            max_outstanding,
            estimated_chunks: total_lines.div_ceil(plan.target).max(1),
            timeout: options.chunk_timeout(),
            poll: options
                .memory_sample_interval()
                .clamp(Duration::from_millis(1), Duration::from_millis(250)),
            headings: HeadingCounter::new(),
        })
    }

    pub fn hard_splits(&self) -> usize {
        self.chunker.hard_splits()
    }

    pub fn workers(&self) -> usize {
        self.pool.workers()
    }

    /// Exact once every chunk has been cut, an estimate before that.
    pub fn chunks_total(&self) -> usize {
        if self.exhausted {
            self.next_dispatch
        } else {
            self.estimated_chunks.max(self.next_dispatch)
        }
    }

    /// Cuts and queues chunks up to the outstanding bound. Never blocks: a job
    /// the queue cannot take waits in `backlog` for the next call.
    fn dispatch(&mut self) -> Result<(), EngineError> {
        if let Some((id, job)) = self.backlog.take() {
            // A backlogged chunk that timed out is no longer wanted.
            if self.running.contains_key(&id) {
                if let Some(job) = self.pool.try_schedule(job)? {
                    self.backlog = Some((id, job));
                    return Ok(());
                }
            }
        }

        while !self.exhausted && self.next_dispatch - self.next_emit < self.max_outstanding {
            let chunk = match self.chunker.next() {
                Some(chunk) => chunk?,
                None => {
                    self.exhausted = true;
                    break;
                }
            };
            self.running.insert(
                chunk.id,
                Slot {
                    start: chunk.start,
                    end: chunk.end,
                    owner: None,
                    started: None,
                },
            );
            self.next_dispatch += 1;
            let id = chunk.id;
            if let Some(job) = self.pool.try_schedule(self.job(chunk))? {
                self.backlog = Some((id, job));
                break;
            }
        }
        Ok(())
    }

    fn job(&self, chunk: Chunk) -> Job {
        let tx = self.tx.clone();
        let parse = Arc::clone(&self.parse);
        let controls = self.controls.clone();
        Box::new(move |worker| {
            let id = chunk.id;
            let _ = tx.send(Message::Started { id, worker });
            let outcome = if controls.cancel.is_cancelled() {
                Outcome::Failed("cancelled before start".into())
            } else if controls.memory.get() == MemoryLevel::Critical {
                Outcome::Failed("skipped under critical memory pressure".into())
            } else {
                let lines: Vec<&str> = chunk.lines.iter().map(String::as_str).collect();
                match panic::catch_unwind(AssertUnwindSafe(|| parse(lines.as_slice(), chunk.start))) {
                    Ok(Ok(assembled)) => Outcome::Parsed(assembled),
                    Ok(Err(err)) => Outcome::Error(err),
                    Err(payload) => Outcome::Failed(panic_message(payload.as_ref())),
                }
            };
            let _ = tx.send(Message::Finished { id, worker, outcome });
        })
    }

    /// Emits the next chunk in order if it has finished.
    fn pop_ready(&mut self) -> Option<Result<ParsedUnit, EngineError>> {
        let id = self.next_emit;
        let (slot, outcome) = self.finished.remove(&id)?;
        self.next_emit += 1;
        self.emit_line = slot.end;
        self.due_since = Instant::now();

        let unit = match outcome {
            Outcome::Parsed(mut assembled) => {
                self.headings.renumber(&mut assembled.nodes);
                log::debug!(
                    "chunk {id} ({}..{}) from worker {:?}: {} nodes",
                    slot.start,
                    slot.end,
                    slot.owner,
                    assembled.nodes.len()
                );
                ParsedUnit {
                    start: slot.start,
                    end: slot.end,
                    owner: slot.owner,
                    nodes: assembled.nodes,
                    diagnostics: assembled.diagnostics,
                    failed: None,
                }
            }
            Outcome::Failed(reason) => {
                log::warn!("chunk {id} ({}..{}) failed: {reason}", slot.start, slot.end);
                ParsedUnit {
                    start: slot.start,
                    end: slot.end,
                    owner: slot.owner,
                    nodes: vec![Node::error(
                        format!("chunk failed: {reason}"),
                        Some(slot.start + 1),
                        None,
                    )],
                    diagnostics: vec![],
                    failed: Some(reason),
                }
            }
            Outcome::Error(err) => return Some(Err(err.into())),
        };
        Some(Ok(unit))
    }

    /// Start of the timeout for the chunk due next: when a worker started it,
    /// or when it became due if no worker has yet.
    fn due_clock(&self) -> Option<(Instant, bool)> {
        self.running
            .get(&self.next_emit)
            .map(|slot| match slot.started {
                Some(started) => (started, true),
                None => (self.due_since, false),
            })
    }

    fn wait(&mut self) {
        let deadline = self
            .due_clock()
            .map(|(since, _)| self.timeout.saturating_sub(since.elapsed()));
        let wait = deadline.map_or(self.poll, |left| left.min(self.poll));

        match self.rx.recv_timeout(wait) {
            Ok(Message::Started { id, worker }) => {
                if let Some(slot) = self.running.get_mut(&id) {
                    slot.started = Some(Instant::now());
                    slot.owner = Some(worker);
                }
            }
            Ok(Message::Finished { id, worker, outcome }) => match self.running.remove(&id) {
                Some(mut slot) => {
                    slot.owner = Some(worker);
                    self.finished.insert(id, (slot, outcome));
                }
                None => log::debug!("late result for chunk {id} dropped"),
            },
            Err(RecvTimeoutError::Timeout) => {}
            // The run holds a sender, so the channel never disconnects.
            Err(RecvTimeoutError::Disconnected) => {}
        }

        let Some((since, started)) = self.due_clock() else {
            return;
        };
        if since.elapsed() < self.timeout {
            return;
        }
        if let Some(slot) = self.running.remove(&self.next_emit) {
            let ms = self.timeout.as_millis();
            let reason = if started {
                format!("timed out after {ms} ms")
            } else {
                format!("not started within {ms} ms")
            };
            self.finished
                .insert(self.next_emit, (slot, Outcome::Failed(reason)));
        }
    }

    /// Drives the run until the next chunk in order can be emitted.
    pub fn next_step(&mut self, monitor: &mut MemoryMonitor) -> Option<Result<Step, EngineError>> {
        loop {
            let mut relieve = false;
            let level = monitor.check(|| relieve = true);
            if relieve {
                self.chunker.shrink();
                self.max_outstanding = (self.max_outstanding / 2).max(1);
            }
            if level == MemoryLevel::Critical {
                let reason = format!(
                    "memory critical: {} bytes resident (limit {})",
                    monitor.last_bytes().unwrap_or_default(),
                    monitor.critical_bytes()
                );
                return Some(Ok(Step::Fallback {
                    resume_line: self.emit_line,
                    headings: std::mem::take(&mut self.headings),
                    reason,
                }));
            }

            let cancelled = self.controls.cancel.is_cancelled();
            if !cancelled {
                if let Err(err) = self.dispatch() {
                    return Some(Err(err));
                }
            }
            if let Some(unit) = self.pop_ready() {
                return Some(unit.map(Step::Unit));
            }
            if cancelled || (self.exhausted && self.running.is_empty()) {
                return None;
            }
            self.wait();
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        format!("worker panicked: {msg}")
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("worker panicked: {msg}")
    } else {
        "worker panicked".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        parsing::{context::ParseStrategy, parse_str},
        render::render,
        streaming::memory::{FixedProbe, MemoryProbe},
    };
    use pretty_assertions::assert_eq;
    use std::thread;

    fn options() -> EngineOptions {
        EngineOptions {
            min_chunk_lines: 1,
            max_chunk_lines: 1_000,
            memory_sample_interval_ms: 1,
            ..EngineOptions::default()
        }
    }

    fn document(parts: usize) -> String {
        (0..parts)
            .map(|i| format!(";;;見出し3;;; Section {i} ;;;\n;;;枠線\nbody {i}\n;;;\n"))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn quiet_monitor() -> MemoryMonitor {
        MemoryMonitor::new(Arc::new(FixedProbe(None)), Duration::ZERO, 10, 20)
    }

    fn start(text: &str, options: &EngineOptions, parse: Option<ChunkParseFn>) -> ParallelRun {
        let registry = Arc::new(KeywordRegistry::default());
        let parse = parse
            .unwrap_or_else(|| assembler_per_chunk(Arc::clone(&registry), options.parser_options()));
        ParallelRun::new(
            &Source::text(text),
            registry,
            options,
            4,
            text.lines().count(),
            Controls::default(),
            parse,
        )
        .unwrap()
    }

    fn drain(run: &mut ParallelRun) -> Vec<ParsedUnit> {
        let mut monitor = quiet_monitor();
        std::iter::from_fn(|| run.next_step(&mut monitor))
            .map(|step| match step.unwrap() {
                Step::Unit(unit) => unit,
                Step::Fallback { .. } => panic!("unexpected fallback"),
            })
            .collect()
    }

    #[test]
    fn emits_in_chunk_order_even_when_later_chunks_finish_first() {
        let text = document(30);
        let registry = Arc::new(KeywordRegistry::default());
        let inner = assembler_per_chunk(registry, ParserOptions::default());
        let slow_first: ChunkParseFn = Arc::new(move |lines: &[&str], offset: usize| {
            if offset == 0 {
                thread::sleep(Duration::from_millis(50));
            }
            inner(lines, offset)
        });
        let mut run = start(&text, &options(), Some(slow_first));
        let units = drain(&mut run);

        assert!(units.len() > 1);
        for pair in units.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
        let rendered: Vec<String> = units.iter().flat_map(|u| u.nodes.iter().map(render)).collect();
        let whole: Vec<String> = parse_str(&text).nodes.iter().map(render).collect();
        assert_eq!(rendered, whole);
    }

    #[test]
    fn panicking_chunk_is_marked_failed_without_stopping_siblings() {
        let text = document(10);
        let registry = Arc::new(KeywordRegistry::default());
        let inner = assembler_per_chunk(registry, ParserOptions::default());
        let boom: ChunkParseFn = Arc::new(move |lines: &[&str], offset: usize| {
            if offset == 0 {
                panic!("bad chunk");
            }
            inner(lines, offset)
        });
        let mut run = start(&text, &options(), Some(boom));
        let units = drain(&mut run);

        assert_eq!(units[0].failed.as_deref(), Some("worker panicked: bad chunk"));
        assert!(units[0].nodes[0].kind.is_error());
        assert!(units[1..].iter().all(|u| u.failed.is_none()));
        assert_eq!(units.last().map(|u| u.end), Some(text.lines().count()));
    }

    #[test]
    fn slow_chunk_times_out() {
        let text = document(8);
        let registry = Arc::new(KeywordRegistry::default());
        let inner = assembler_per_chunk(registry, ParserOptions::default());
        let stuck: ChunkParseFn = Arc::new(move |lines: &[&str], offset: usize| {
            if offset == 0 {
                thread::sleep(Duration::from_secs(2));
            }
            inner(lines, offset)
        });
        let options = EngineOptions {
            chunk_timeout_ms: 50,
            ..options()
        };
        let mut run = start(&text, &options, Some(stuck));
        let units = drain(&mut run);

        assert_eq!(units[0].failed.as_deref(), Some("timed out after 50 ms"));
        assert!(units[1..].iter().all(|u| u.failed.is_none()));
    }

    #[test]
    fn queued_chunks_time_out_when_every_worker_is_stuck() {
        let text = document(8);
        let registry = Arc::new(KeywordRegistry::default());
        let inner = assembler_per_chunk(Arc::clone(&registry), ParserOptions::default());
        let (release, stuck_until) = crossbeam_channel::bounded::<()>(0);
        let stuck: ChunkParseFn = Arc::new(move |lines: &[&str], offset: usize| {
            if offset == 0 {
                let _ = stuck_until.recv_timeout(Duration::from_secs(10));
            }
            inner(lines, offset)
        });
        let options = EngineOptions {
            chunk_timeout_ms: 50,
            ..options()
        };
        let mut run = ParallelRun::new(
            &Source::text(text.as_str()),
            registry,
            &options,
            1,
            text.lines().count(),
            Controls::default(),
            stuck,
        )
        .unwrap();
        let started = Instant::now();
        let units = drain(&mut run);
        drop(release);

        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(units.len() > 1);
        assert_eq!(units[0].failed.as_deref(), Some("timed out after 50 ms"));
        assert!(
            units[1..]
                .iter()
                .all(|u| u.failed.as_deref() == Some("not started within 50 ms"))
        );
        assert_eq!(units.last().map(|u| u.end), Some(text.lines().count()));
    }

    /// Reads high before every relief and low after it.
    struct Spiky(std::sync::atomic::AtomicUsize);

    impl MemoryProbe for Spiky {
        fn resident_bytes(&self) -> Option<u64> {
            let n = self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Some(if n % 2 == 0 { 100 } else { 1 })
        }
    }

    #[test]
    fn relieved_spikes_never_skip_chunks() {
        let text = document(30);
        let mut run = start(&text, &options(), None);
        let mut monitor =
            MemoryMonitor::new(Arc::new(Spiky(Default::default())), Duration::ZERO, 10, 20);
        let units: Vec<ParsedUnit> = std::iter::from_fn(|| run.next_step(&mut monitor))
            .map(|step| match step.unwrap() {
                Step::Unit(unit) => unit,
                Step::Fallback { .. } => panic!("relieved spike fell back"),
            })
            .collect();

        assert!(units.iter().all(|u| u.failed.is_none()));
        assert_eq!(units.last().map(|u| u.end), Some(text.lines().count()));
    }

    #[test]
    fn critical_memory_requests_fallback_at_first_unemitted_line() {
        let text = document(4);
        let mut run = start(&text, &options(), None);
        let mut monitor = MemoryMonitor::new(Arc::new(FixedProbe(Some(100))), Duration::ZERO, 10, 20);
        match run.next_step(&mut monitor) {
            Some(Ok(Step::Fallback {
                resume_line,
                headings,
                ..
            })) => {
                assert_eq!(resume_line, 0);
                assert_eq!(headings.issued(), 0);
            }
            _ => panic!("expected fallback"),
        }
    }

    #[test]
    fn headings_are_numbered_across_chunks() {
        let text = document(12);
        let mut run = start(&text, &options(), None);
        let ids: Vec<String> = drain(&mut run)
            .iter()
            .flat_map(|u| u.nodes.iter())
            .filter_map(|n| n.heading_id().map(str::to_string))
            .collect();
        let expected: Vec<String> = (1..=12).map(|i| format!("heading-{i}")).collect();
        assert_eq!(ids, expected);
    }

    #[test]
    fn strict_errors_propagate() {
        let options = EngineOptions {
            strategy: ParseStrategy::Strict,
            ..options()
        };
        let text = format!("{}\n;;;未知\nx\n;;;\n", document(3));
        let mut run = start(&text, &options, None);
        let mut monitor = quiet_monitor();
        let results: Vec<_> = std::iter::from_fn(|| run.next_step(&mut monitor)).collect();
        assert!(matches!(
            results.last(),
            Some(Err(EngineError::Parse(ParseError::MarkerSyntax { .. })))
        ));
    }

    #[test]
    fn cancelled_run_stops() {
        let text = document(20);
        let mut run = start(&text, &options(), None);
        run.controls.cancel.cancel();
        assert!(drain(&mut run).is_empty());
    }
}
