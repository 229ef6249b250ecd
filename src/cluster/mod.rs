//! Multi-process cluster supervision.
//!
//! [`ClusterSupervisor`] runs in the primary process and manages a group of
//! worker OS processes started from a [`WorkerSpec`]. Each worker signals
//! readiness by printing a line on stdout. The supervisor respawns workers
//! that crash (non-zero exit, no signal), performs rolling zero-downtime
//! restarts, and drains the whole group on shutdown, force-killing anything
//! that outlives the grace period.
//!
//! The worker table is owned by the supervisor's own control loop; worker
//! processes communicate only through process exit status and stdout, never
//! shared memory.

mod supervisor;
mod types;

pub use supervisor::ClusterSupervisor;
pub use types::{
    ClusterConfig, ClusterError, ClusterStats, SupervisorState, WorkerSnapshot, WorkerSpec,
    WorkerState,
};
