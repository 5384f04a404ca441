//! Container record types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a runtime-managed container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerState {
    /// Created but never started.
    Created,
    /// Main process is running.
    Running,
    /// Main process exited; the last pid is kept for inspection.
    Stopped,
    /// Removed by the runtime.
    Destroyed,
}

impl fmt::Display for ContainerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Running => write!(f, "running"),
            Self::Stopped => write!(f, "stopped"),
            Self::Destroyed => write!(f, "destroyed"),
        }
    }
}

/// One container as tracked by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Container {
    pub id: String,
    pub state: ContainerState,
    /// Pid of the main process. Only meaningful while running or stopped.
    pub pid: i32,
    /// Time of the last control action applied to this container.
    pub last_action: Option<DateTime<Utc>>,
    /// Runtime time of the event that produced this record, if known.
    pub observed_at: Option<DateTime<Utc>>,
}

/// What the store does with a container once the runtime destroys it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EvictionPolicy {
    /// Keep destroyed containers resident. They are hidden from reports.
    #[default]
    Retain,
    /// Drop the record as soon as a `Destroyed` transition arrives.
    ///
    /// No tombstone is kept, so a timed event for the same id that arrives
    /// after the `Destroyed` one recreates the record. The Docker source
    /// reports it destroyed again on its next resync.
    EvictDestroyed,
}
