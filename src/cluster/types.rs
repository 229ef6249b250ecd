//! Cluster supervision types and configuration.

use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Fallback worker count when CPU detection fails.
const FALLBACK_WORKER_COUNT: usize = 2;

/// How to start one worker process.
#[derive(Debug, Clone)]
pub struct WorkerSpec {
    /// Program to execute
    pub program: String,
    /// Command-line arguments
    pub args: Vec<String>,
    /// Extra environment variables
    pub envs: Vec<(String, String)>,
    /// stdout line (trimmed, exact match) that marks the worker ready
    pub ready_line: String,
}

impl WorkerSpec {
    /// Create a spec for the given program.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
            ready_line: "ready".to_string(),
        }
    }

    /// Set command-line arguments.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Add an environment variable.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// Set the readiness line.
    pub fn with_ready_line(mut self, line: impl Into<String>) -> Self {
        self.ready_line = line.into();
        self
    }
}

/// Cluster supervisor configuration.
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    /// Number of worker processes (default: available CPU parallelism)
    pub worker_count: usize,
    /// How long a spawned worker may take to signal ready (default: 10s)
    pub ready_timeout: Duration,
    /// How long a drained worker may take to exit during a rolling restart
    /// before the restart moves on (default: 5s)
    pub drain_timeout: Duration,
    /// Grace period for workers to exit on shutdown before they are
    /// force-killed (default: 10s)
    pub shutdown_timeout: Duration,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            worker_count: default_worker_count(),
            ready_timeout: Duration::from_secs(10),
            drain_timeout: Duration::from_secs(5),
            shutdown_timeout: Duration::from_secs(10),
        }
    }
}

impl ClusterConfig {
    /// Set the worker process count.
    pub fn with_worker_count(mut self, count: usize) -> Self {
        self.worker_count = count.max(1);
        self
    }

    /// Set the readiness timeout.
    pub fn with_ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = timeout;
        self
    }

    /// Set the rolling-restart drain timeout.
    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    /// Set the shutdown grace period.
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }
}

/// Default worker count: one process per available CPU core.
pub fn default_worker_count() -> usize {
    std::thread::available_parallelism()
        .map(|p| p.get())
        .unwrap_or(FALLBACK_WORKER_COUNT)
}

/// Per-worker lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WorkerState {
    /// Spawned, not yet signalled ready
    Starting,
    /// Serving traffic
    Ready,
    /// Told to drain; exit expected shortly
    Draining,
}

/// Supervisor lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SupervisorState {
    /// Constructed, not yet initialized
    Idle,
    /// Spawning the initial worker group
    Starting,
    /// Full worker group serving
    Steady,
    /// Replacing workers one at a time
    RollingRestart,
    /// Draining all workers
    ShuttingDown,
    /// All workers gone; supervisor finished
    Stopped,
}

/// Cluster supervision errors.
#[derive(Debug, Error)]
pub enum ClusterError {
    /// Spawning or signalling a worker process failed
    #[error("cluster I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// `initialize` called on a supervisor that already ran
    #[error("cluster is already running")]
    AlreadyRunning,

    /// Operation requires an initialized, running cluster
    #[error("cluster is not running")]
    NotRunning,

    /// A restart was requested while another restart was in progress
    #[error("a rolling restart is already in progress")]
    RestartInProgress,

    /// A worker did not signal ready in time
    #[error("worker {id} did not signal ready within {timeout:?}")]
    ReadyTimeout { id: u64, timeout: Duration },

    /// A worker exited before ever signalling ready
    #[error("worker {id} exited before signalling ready")]
    FailedToStart { id: u64 },
}

/// Read-only view of one tracked worker.
#[derive(Debug, Clone, Serialize)]
pub struct WorkerSnapshot {
    pub id: u64,
    pub pid: Option<u32>,
    pub state: WorkerState,
    /// How many crash respawns preceded this worker in its lineage
    pub generation: u64,
}

/// Snapshot of cluster supervision state.
#[derive(Debug, Clone, Serialize)]
pub struct ClusterStats {
    pub state: SupervisorState,
    /// Worker processes spawned since initialization (including respawns)
    pub spawned: u64,
    /// Crash respawns performed
    pub respawned: u64,
    /// Workers force-killed after the shutdown grace period
    pub forced_kills: u64,
    /// Currently tracked workers
    pub workers: Vec<WorkerSnapshot>,
}

impl ClusterStats {
    /// Number of workers currently in the `Ready` state.
    pub fn active_workers(&self) -> usize {
        self.workers
            .iter()
            .filter(|w| w.state == WorkerState::Ready)
            .count()
    }
}
