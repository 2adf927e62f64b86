use std::{
    fmt,
    sync::{
        Arc, Mutex,
        atomic::{AtomicU8, Ordering},
    },
    time::{Duration, Instant},
};

use sysinfo::{Pid, System};

/// Source of the process's current memory use.
pub trait MemoryProbe: Send + Sync {
    /// Resident bytes, or `None` when the platform cannot say.
    fn resident_bytes(&self) -> Option<u64>;
}

/// Resident set size of this process, read through `sysinfo`.
pub struct SysinfoProbe {
    pid: Option<Pid>,
    system: Mutex<System>,
}

impl SysinfoProbe {
    pub fn new() -> Self {
        let pid = sysinfo::get_current_pid()
            .map_err(|err| log::warn!("memory probing disabled: {err}"))
            .ok();
        Self {
            pid,
            system: Mutex::new(System::new()),
        }
    }
}

impl Default for SysinfoProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SysinfoProbe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SysinfoProbe").field("pid", &self.pid).finish()
    }
}

impl MemoryProbe for SysinfoProbe {
    fn resident_bytes(&self) -> Option<u64> {
        let pid = self.pid?;
        let mut system = self.system.lock().ok()?;
        if !system.refresh_process(pid) {
            return None;
        }
        system.process(pid).map(|p| p.memory())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum MemoryLevel {
    Normal = 0,
    Warning = 1,
    Critical = 2,
}

impl MemoryLevel {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => MemoryLevel::Normal,
            1 => MemoryLevel::Warning,
            _ => MemoryLevel::Critical,
        }
    }
}

/// Latest memory level, readable from worker threads.
#[derive(Debug, Clone, Default)]
pub struct SharedMemoryLevel(Arc<AtomicU8>);

impl SharedMemoryLevel {
    pub fn get(&self) -> MemoryLevel {
        MemoryLevel::from_u8(self.0.load(Ordering::Acquire))
    }

    pub fn set(&self, level: MemoryLevel) {
        self.0.store(level as u8, Ordering::Release);
    }
}

/// Samples a [`MemoryProbe`] no more often than its interval and classifies
/// the result against the warning and critical thresholds.
pub struct MemoryMonitor {
    probe: Arc<dyn MemoryProbe>,
    interval: Duration,
    warning_bytes: u64,
    critical_bytes: u64,
    last_sample: Option<Instant>,
    last_bytes: Option<u64>,
    shared: SharedMemoryLevel,
}

impl fmt::Debug for MemoryMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryMonitor")
            .field("interval", &self.interval)
            .field("warning_bytes", &self.warning_bytes)
            .field("critical_bytes", &self.critical_bytes)
            .field("level", &self.shared.get())
            .finish()
    }
}

impl MemoryMonitor {
    pub fn new(
        probe: Arc<dyn MemoryProbe>,
        interval: Duration,
        warning_bytes: u64,
        critical_bytes: u64,
    ) -> Self {
        Self {
            probe,
            interval,
            warning_bytes,
            critical_bytes,
            last_sample: None,
            last_bytes: None,
            shared: SharedMemoryLevel::default(),
        }
    }

    /// Handle for workers to read the latest level.
    pub fn shared(&self) -> SharedMemoryLevel {
        self.shared.clone()
    }

    pub fn level(&self) -> MemoryLevel {
        self.shared.get()
    }

    pub fn last_bytes(&self) -> Option<u64> {
        self.last_bytes
    }

    pub fn critical_bytes(&self) -> u64 {
        self.critical_bytes
    }

    fn classify(&self, bytes: Option<u64>) -> MemoryLevel {
        match bytes {
            Some(b) if b >= self.critical_bytes => MemoryLevel::Critical,
            Some(b) if b >= self.warning_bytes => MemoryLevel::Warning,
            _ => MemoryLevel::Normal,
        }
    }

    fn sample(&mut self) -> MemoryLevel {
        self.last_sample = Some(Instant::now());
        self.last_bytes = self.probe.resident_bytes();
        self.classify(self.last_bytes)
    }

    /// Samples if the cadence allows, otherwise returns the last level.
    ///
    /// At warning or above, `relieve` runs once and the probe is read again;
    /// the level returned is the one after relief. Workers only ever see
    /// that post-relief level through [`shared`](Self::shared).
    pub fn check(&mut self, relieve: impl FnOnce()) -> MemoryLevel {
        let due = self
            .last_sample
            .is_none_or(|at| at.elapsed() >= self.interval);
        if !due {
            return self.level();
        }
        let mut level = self.sample();
        if level >= MemoryLevel::Warning {
            log::warn!(
                "memory at {:?} ({} bytes resident), releasing buffers",
                level,
                self.last_bytes.unwrap_or_default()
            );
            relieve();
            level = self.sample();
        }
        self.shared.set(level);
        level
    }
}

/// Probe returning a fixed reading; also usable to disable monitoring.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedProbe(pub Option<u64>);

impl MemoryProbe for FixedProbe {
    fn resident_bytes(&self) -> Option<u64> {
        self.0
    }
}
