//! Primary-side cluster supervisor.

use crate::cluster::types::{
    ClusterConfig, ClusterError, ClusterStats, SupervisorState, WorkerSnapshot, WorkerSpec,
    WorkerState,
};
use std::collections::HashMap;
use std::process::{ExitStatus, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// How often waiters poll the worker table between change notifications.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// One tracked worker process.
struct WorkerRecord {
    id: u64,
    pid: Option<u32>,
    state: WorkerState,
    generation: u64,
}

/// Events sent from per-worker monitor tasks to the control loop.
enum ClusterEvent {
    Ready(u64),
    Exited(u64, ExitStatus),
}

struct ClusterInner {
    state: SupervisorState,
    workers: HashMap<u64, WorkerRecord>,
    next_id: u64,
}

struct ClusterShared {
    inner: Mutex<ClusterInner>,
    spawned: AtomicU64,
    respawned: AtomicU64,
    forced_kills: AtomicU64,
}

struct ControlHandles {
    events_tx: UnboundedSender<ClusterEvent>,
    cancel: CancellationToken,
}

/// Supervises a group of worker OS processes.
///
/// The supervisor spawns N workers, tracks their lifecycle
/// (`starting → ready → draining → exited`), respawns crashed workers, and
/// supports rolling restarts and graceful shutdown. Only the supervisor's
/// control loop mutates the worker table; worker monitor tasks communicate
/// through an event channel.
pub struct ClusterSupervisor {
    spec: WorkerSpec,
    config: ClusterConfig,
    shared: Arc<ClusterShared>,
    control: Mutex<Option<ControlHandles>>,
}

impl ClusterSupervisor {
    /// Create a supervisor. No processes are started until [`initialize`].
    ///
    /// [`initialize`]: ClusterSupervisor::initialize
    pub fn new(spec: WorkerSpec, config: ClusterConfig) -> Self {
        Self {
            spec,
            config,
            shared: Arc::new(ClusterShared {
                inner: Mutex::new(ClusterInner {
                    state: SupervisorState::Idle,
                    workers: HashMap::new(),
                    next_id: 0,
                }),
                spawned: AtomicU64::new(0),
                respawned: AtomicU64::new(0),
                forced_kills: AtomicU64::new(0),
            }),
            control: Mutex::new(None),
        }
    }

    /// Spawn the configured number of workers and wait for all of them to
    /// signal ready.
    pub async fn initialize(&self) -> Result<(), ClusterError> {
        {
            let mut inner = self.shared.inner.lock().unwrap();
            if inner.state != SupervisorState::Idle {
                return Err(ClusterError::AlreadyRunning);
            }
            inner.state = SupervisorState::Starting;
        }

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        tokio::spawn(control_loop(
            Arc::clone(&self.shared),
            self.spec.clone(),
            events_rx,
            events_tx.clone(),
            cancel.clone(),
        ));
        *self.control.lock().unwrap() = Some(ControlHandles {
            events_tx: events_tx.clone(),
            cancel,
        });

        let mut ids = Vec::with_capacity(self.config.worker_count);
        for _ in 0..self.config.worker_count {
            ids.push(spawn_worker(&self.shared, &self.spec, &events_tx, 0)?);
        }
        for id in ids {
            self.wait_ready(id).await?;
        }

        self.shared.inner.lock().unwrap().state = SupervisorState::Steady;
        info!(workers = self.config.worker_count, "cluster steady");
        Ok(())
    }

    /// Replace every worker one at a time, keeping at least N−1 workers
    /// serving throughout.
    ///
    /// For each current worker: spawn a replacement, wait for its ready
    /// signal, only then drain the old worker, wait for it to exit (bounded
    /// by the drain timeout), then move on.
    pub async fn graceful_restart(&self) -> Result<(), ClusterError> {
        let events_tx = {
            let control = self.control.lock().unwrap();
            control
                .as_ref()
                .ok_or(ClusterError::NotRunning)?
                .events_tx
                .clone()
        };
        {
            let mut inner = self.shared.inner.lock().unwrap();
            match inner.state {
                SupervisorState::Steady => inner.state = SupervisorState::RollingRestart,
                SupervisorState::RollingRestart => return Err(ClusterError::RestartInProgress),
                _ => return Err(ClusterError::NotRunning),
            }
        }
        info!("rolling restart started");

        let mut old_workers: Vec<(u64, Option<u32>)> = {
            let inner = self.shared.inner.lock().unwrap();
            inner.workers.values().map(|w| (w.id, w.pid)).collect()
        };
        old_workers.sort_by_key(|(id, _)| *id);

        for (old_id, old_pid) in old_workers {
            let new_id = spawn_worker(&self.shared, &self.spec, &events_tx, 0)?;
            self.wait_ready(new_id).await?;

            // Replacement is serving; now the old worker may go
            self.drain_worker(old_id, old_pid);
            if !self.wait_exited(old_id, self.config.drain_timeout).await {
                warn!(worker = old_id, "worker slow to drain during rolling restart");
            }
        }

        self.shared.inner.lock().unwrap().state = SupervisorState::Steady;
        info!("rolling restart complete");
        Ok(())
    }

    /// Drain all workers, wait up to the shutdown grace period, and
    /// force-kill anything still alive.
    pub async fn shutdown(&self) -> Result<(), ClusterError> {
        let control = self
            .control
            .lock()
            .unwrap()
            .take()
            .ok_or(ClusterError::NotRunning)?;

        self.shared.inner.lock().unwrap().state = SupervisorState::ShuttingDown;
        info!("cluster shutting down");

        let targets: Vec<(u64, Option<u32>)> = {
            let inner = self.shared.inner.lock().unwrap();
            inner.workers.values().map(|w| (w.id, w.pid)).collect()
        };
        for (id, pid) in &targets {
            self.drain_worker(*id, *pid);
        }

        let deadline = Instant::now() + self.config.shutdown_timeout;
        loop {
            if self.shared.inner.lock().unwrap().workers.is_empty() {
                break;
            }
            if Instant::now() >= deadline {
                let stragglers: Vec<(u64, Option<u32>)> = {
                    let inner = self.shared.inner.lock().unwrap();
                    inner.workers.values().map(|w| (w.id, w.pid)).collect()
                };
                for (id, pid) in stragglers {
                    warn!(
                        worker = id,
                        "worker did not exit within grace period; force killing"
                    );
                    if let Some(pid) = pid {
                        // SAFETY: sending a signal to a pid we spawned
                        unsafe {
                            libc::kill(pid as i32, libc::SIGKILL);
                        }
                    }
                    self.shared.forced_kills.fetch_add(1, Ordering::SeqCst);
                }
                // Give the exit events a moment to land, then close the book
                tokio::time::sleep(Duration::from_millis(200)).await;
                self.shared.inner.lock().unwrap().workers.clear();
                break;
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }

        control.cancel.cancel();
        self.shared.inner.lock().unwrap().state = SupervisorState::Stopped;
        info!("cluster stopped");
        Ok(())
    }

    /// Snapshot of cluster statistics, workers ordered by id.
    pub fn stats(&self) -> ClusterStats {
        let inner = self.shared.inner.lock().unwrap();
        let mut workers: Vec<WorkerSnapshot> = inner
            .workers
            .values()
            .map(|w| WorkerSnapshot {
                id: w.id,
                pid: w.pid,
                state: w.state,
                generation: w.generation,
            })
            .collect();
        workers.sort_by_key(|w| w.id);
        ClusterStats {
            state: inner.state,
            spawned: self.shared.spawned.load(Ordering::SeqCst),
            respawned: self.shared.respawned.load(Ordering::SeqCst),
            forced_kills: self.shared.forced_kills.load(Ordering::SeqCst),
            workers,
        }
    }

    /// Current supervisor state.
    pub fn state(&self) -> SupervisorState {
        self.shared.inner.lock().unwrap().state
    }

    /// Mark a worker as draining and send it SIGTERM.
    fn drain_worker(&self, id: u64, pid: Option<u32>) {
        {
            let mut inner = self.shared.inner.lock().unwrap();
            if let Some(worker) = inner.workers.get_mut(&id) {
                worker.state = WorkerState::Draining;
            }
        }
        if let Some(pid) = pid {
            debug!(worker = id, pid, "draining worker");
            // SAFETY: sending a signal to a pid we spawned
            unsafe {
                libc::kill(pid as i32, libc::SIGTERM);
            }
        }
    }

    /// Wait until the given worker reports ready.
    async fn wait_ready(&self, id: u64) -> Result<(), ClusterError> {
        let deadline = Instant::now() + self.config.ready_timeout;
        loop {
            {
                let inner = self.shared.inner.lock().unwrap();
                match inner.workers.get(&id) {
                    Some(worker) if worker.state == WorkerState::Ready => return Ok(()),
                    Some(_) => {}
                    // Exited before ever signalling ready
                    None => return Err(ClusterError::FailedToStart { id }),
                }
            }
            if Instant::now() >= deadline {
                return Err(ClusterError::ReadyTimeout {
                    id,
                    timeout: self.config.ready_timeout,
                });
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Wait until the given worker's record is gone. Returns false on
    /// timeout.
    async fn wait_exited(&self, id: u64, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if !self.shared.inner.lock().unwrap().workers.contains_key(&id) {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}

/// Spawn one worker process and its monitor tasks.
fn spawn_worker(
    shared: &Arc<ClusterShared>,
    spec: &WorkerSpec,
    events_tx: &UnboundedSender<ClusterEvent>,
    generation: u64,
) -> Result<u64, ClusterError> {
    let mut command = Command::new(&spec.program);
    command.args(&spec.args).stdout(Stdio::piped());
    for (key, value) in &spec.envs {
        command.env(key, value);
    }
    let mut child = command.spawn()?;
    let pid = child.id();

    let id = {
        let mut inner = shared.inner.lock().unwrap();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.workers.insert(
            id,
            WorkerRecord {
                id,
                pid,
                state: WorkerState::Starting,
                generation,
            },
        );
        id
    };
    shared.spawned.fetch_add(1, Ordering::SeqCst);
    info!(worker = id, pid, generation, "spawned cluster worker");

    // Readiness detection: watch stdout for the ready line
    if let Some(stdout) = child.stdout.take() {
        let ready_line = spec.ready_line.clone();
        let events = events_tx.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if line.trim() == ready_line {
                    let _ = events.send(ClusterEvent::Ready(id));
                } else {
                    debug!(worker = id, line = %line, "worker output");
                }
            }
        });
    }

    // Exit monitor
    let events = events_tx.clone();
    tokio::spawn(async move {
        match child.wait().await {
            Ok(status) => {
                let _ = events.send(ClusterEvent::Exited(id, status));
            }
            Err(err) => warn!(worker = id, error = %err, "failed to await worker exit"),
        }
    });

    Ok(id)
}

/// Control loop: the only place the worker table transitions on events.
async fn control_loop(
    shared: Arc<ClusterShared>,
    spec: WorkerSpec,
    mut events_rx: UnboundedReceiver<ClusterEvent>,
    events_tx: UnboundedSender<ClusterEvent>,
    cancel: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => break,
            event = events_rx.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };

        match event {
            ClusterEvent::Ready(id) => {
                let mut inner = shared.inner.lock().unwrap();
                if let Some(worker) = inner.workers.get_mut(&id) {
                    if worker.state == WorkerState::Starting {
                        worker.state = WorkerState::Ready;
                        info!(worker = id, "worker ready");
                    }
                }
            }
            ClusterEvent::Exited(id, status) => {
                let (respawn, generation) = {
                    let mut inner = shared.inner.lock().unwrap();
                    let generation = inner
                        .workers
                        .remove(&id)
                        .map(|w| w.generation)
                        .unwrap_or(0);
                    // Respawn only on a non-zero exit code with no signal,
                    // and never while shutting down. Signal-caused exits are
                    // deliberate terminations.
                    let crashed = matches!(status.code(), Some(code) if code != 0);
                    let shutting_down = matches!(
                        inner.state,
                        SupervisorState::ShuttingDown | SupervisorState::Stopped
                    );
                    (crashed && !shutting_down, generation)
                };

                if respawn {
                    warn!(
                        worker = id,
                        code = ?status.code(),
                        "worker crashed; respawning"
                    );
                    shared.respawned.fetch_add(1, Ordering::SeqCst);
                    if let Err(err) = spawn_worker(&shared, &spec, &events_tx, generation + 1) {
                        error!(error = %err, "failed to respawn worker");
                    }
                } else {
                    info!(worker = id, code = ?status.code(), "worker exited");
                }
            }
        }
    }
    debug!("cluster control loop stopped");
}
