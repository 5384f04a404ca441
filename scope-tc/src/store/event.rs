//! Lifecycle events delivered by the container runtime.

use chrono::{DateTime, Utc};

use super::ContainerState;

/// A single lifecycle transition for one container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerEvent {
    pub id: String,
    pub state: ContainerState,
    /// New pid, or `None` to keep the pid already on record.
    pub pid: Option<i32>,
    /// When the runtime observed the transition. Events without a time
    /// always win; timed events older than the stored record are dropped.
    pub observed_at: Option<DateTime<Utc>>,
}

impl ContainerEvent {
    pub fn new(id: impl Into<String>, state: ContainerState) -> Self {
        Self {
            id: id.into(),
            state,
            pid: None,
            observed_at: None,
        }
    }

    pub fn with_pid(mut self, pid: i32) -> Self {
        self.pid = Some(pid);
        self
    }

    pub fn observed_at(mut self, at: DateTime<Utc>) -> Self {
        self.observed_at = Some(at);
        self
    }
}
