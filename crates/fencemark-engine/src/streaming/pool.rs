use std::{
    panic::{self, AssertUnwindSafe},
    thread::{self, JoinHandle},
};

use crossbeam_channel::{Sender, TrySendError, bounded};

use crate::error::EngineError;

/// A unit of work; receives the id of the worker running it.
pub type Job = Box<dyn FnOnce(usize) + Send + 'static>;

/// Fixed set of named threads pulling jobs from one bounded MPMC queue.
///
/// Dropping the pool closes the queue; workers finish their current job and
/// exit on their own. [`WorkerPool::shutdown`] also waits for them.
pub struct WorkerPool {
    tx: Option<Sender<Job>>,
    handles: Vec<JoinHandle<()>>,
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("workers", &self.handles.len())
            .finish()
    }
}

impl WorkerPool {
    pub fn new(workers: usize, queue_capacity: usize) -> Result<Self, EngineError> {
        if workers == 0 {
            return Err(EngineError::WorkerPool("zero workers requested".into()));
        }
        let (tx, rx) = bounded::<Job>(queue_capacity.max(1));

        let mut handles = Vec::with_capacity(workers);
        for id in 0..workers {
            let rx = rx.clone();
            let handle = thread::Builder::new()
                .name(format!("fencemark-worker-{id}"))
                .spawn(move || {
                    while let Ok(job) = rx.recv() {
                        if panic::catch_unwind(AssertUnwindSafe(|| job(id))).is_err() {
                            log::error!("worker {id}: job panicked");
                        }
                    }
                    log::debug!("worker {id}: queue closed, exiting");
                })
                .map_err(|err| EngineError::WorkerPool(format!("spawn worker {id}: {err}")))?;
            handles.push(handle);
        }

        Ok(Self {
            tx: Some(tx),
            handles,
        })
    }

    pub fn workers(&self) -> usize {
        self.handles.len()
    }

    /// Queues a job, blocking while the queue is full.
    pub fn schedule(&self, job: impl FnOnce(usize) + Send + 'static) -> Result<(), EngineError> {
        let tx = self
            .tx
            .as_ref()
            .ok_or_else(|| EngineError::WorkerPool("pool is shut down".into()))?;
        tx.send(Box::new(job))
            .map_err(|_| EngineError::WorkerPool("all workers have exited".into()))
    }

    /// Queues a job unless the queue is full, in which case the job is
    /// handed back.
    pub fn try_schedule(&self, job: Job) -> Result<Option<Job>, EngineError> {
        let tx = self
            .tx
            .as_ref()
            .ok_or_else(|| EngineError::WorkerPool("pool is shut down".into()))?;
        match tx.try_send(job) {
            Ok(()) => Ok(None),
            Err(TrySendError::Full(job)) => Ok(Some(job)),
            Err(TrySendError::Disconnected(_)) => {
                Err(EngineError::WorkerPool("all workers have exited".into()))
            }
        }
    }

    /// Closes the queue and joins every worker.
    pub fn shutdown(mut self) {
        self.tx = None;
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}
