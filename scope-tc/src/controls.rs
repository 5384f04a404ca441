//! Control catalogue.
//!
//! The registry is built once at startup and never changes afterwards, so it
//! is shared between request handlers without any locking. Every handler has
//! the same signature: it receives the container it was bound to and returns
//! success or a [`HandlerError`].

use chrono::Utc;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::error::{HandlerError, RegistryError};
use crate::store::ContainerStore;

/// Prefix shared by the table template and every control ID.
pub const TABLE_PREFIX: &str = "plugin-name-table-";

/// Control that stamps the container with the current time.
pub const SET_TIMESTAMP_CONTROL: &str = "plugin-name-table-slow";

/// Control that clears the container's timestamp.
pub const CLEAR_CONTROL: &str = "plugin-name-table-clear";

type Handler = dyn Fn(&ControlTarget<'_>) -> Result<(), HandlerError> + Send + Sync;

/// The container a handler acts on.
pub struct ControlTarget<'a> {
    container_id: &'a str,
    pid: i32,
    store: &'a ContainerStore,
}

impl<'a> ControlTarget<'a> {
    pub fn new(container_id: &'a str, pid: i32, store: &'a ContainerStore) -> Self {
        Self {
            container_id,
            pid,
            store,
        }
    }

    pub fn container_id(&self) -> &str {
        self.container_id
    }

    /// Pid captured when the action was resolved.
    pub fn pid(&self) -> i32 {
        self.pid
    }

    /// Per-container state must be read and written through the store.
    pub fn store(&self) -> &ContainerStore {
        self.store
    }
}

/// Static descriptor of one control action.
#[derive(Clone)]
pub struct ControlSpec {
    pub id: String,
    pub human: String,
    pub icon: String,
    /// Display order, ascending.
    pub rank: i32,
    handler: Arc<Handler>,
}

impl ControlSpec {
    pub fn new<F>(
        id: impl Into<String>,
        human: impl Into<String>,
        icon: impl Into<String>,
        rank: i32,
        handler: F,
    ) -> Self
    where
        F: Fn(&ControlTarget<'_>) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        Self {
            id: id.into(),
            human: human.into(),
            icon: icon.into(),
            rank,
            handler: Arc::new(handler),
        }
    }

    pub fn invoke(&self, target: &ControlTarget<'_>) -> Result<(), HandlerError> {
        (self.handler)(target)
    }
}

impl fmt::Debug for ControlSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlSpec")
            .field("id", &self.id)
            .field("human", &self.human)
            .field("icon", &self.icon)
            .field("rank", &self.rank)
            .finish_non_exhaustive()
    }
}

/// Immutable, rank-ordered set of controls.
#[derive(Debug, Clone)]
pub struct ControlRegistry {
    specs: Arc<[ControlSpec]>,
}

impl ControlRegistry {
    /// Validate and freeze a catalogue.
    pub fn new(specs: Vec<ControlSpec>) -> Result<Self, RegistryError> {
        validate(&specs)?;
        Ok(Self::from_specs(specs))
    }

    /// The controls this plugin ships with.
    pub fn builtin() -> Self {
        Self::from_specs(builtin_specs())
    }

    fn from_specs(mut specs: Vec<ControlSpec>) -> Self {
        specs.sort_by(|a, b| a.rank.cmp(&b.rank).then_with(|| a.id.cmp(&b.id)));
        Self {
            specs: specs.into(),
        }
    }

    /// All controls, ordered by ascending rank.
    pub fn list(&self) -> &[ControlSpec] {
        &self.specs
    }

    pub fn lookup(&self, control_id: &str) -> Option<&ControlSpec> {
        self.specs.iter().find(|spec| spec.id == control_id)
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

impl Default for ControlRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

fn validate(specs: &[ControlSpec]) -> Result<(), RegistryError> {
    let mut seen = HashSet::new();
    for spec in specs {
        if spec.id.is_empty() {
            return Err(RegistryError::EmptyId);
        }
        if !seen.insert(spec.id.as_str()) {
            return Err(RegistryError::DuplicateControl(spec.id.clone()));
        }
    }
    Ok(())
}

fn builtin_specs() -> Vec<ControlSpec> {
    vec![
        ControlSpec::new(
            SET_TIMESTAMP_CONTROL,
            "Timestamp",
            "fa-bomb",
            20,
            set_timestamp,
        ),
        ControlSpec::new(
            CLEAR_CONTROL,
            "Clear traffic control settings",
            "fa-times-circle",
            24,
            clear_timestamp,
        ),
    ]
}

fn set_timestamp(target: &ControlTarget<'_>) -> Result<(), HandlerError> {
    mark(target, Some(Utc::now()))
}

fn clear_timestamp(target: &ControlTarget<'_>) -> Result<(), HandlerError> {
    mark(target, None)
}

fn mark(
    target: &ControlTarget<'_>,
    at: Option<chrono::DateTime<Utc>>,
) -> Result<(), HandlerError> {
    if target.store().set_last_action(target.container_id(), at) {
        Ok(())
    } else {
        // Evicted between resolve and run.
        Err(HandlerError::new(format!(
            "container {} (pid {}) is gone",
            target.container_id(),
            target.pid()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ContainerState;

    fn noop(_: &ControlTarget<'_>) -> Result<(), HandlerError> {
        Ok(())
    }

    #[test]
    fn builtin_catalogue_is_valid() {
        assert!(ControlRegistry::new(builtin_specs()).is_ok());
    }

    #[test]
    fn builtin_controls_share_table_prefix() {
        let registry = ControlRegistry::builtin();
        assert_eq!(registry.len(), 2);
        assert!(registry.list().iter().all(|c| c.id.starts_with(TABLE_PREFIX)));
    }

    #[test]
    fn list_is_ordered_by_rank() {
        let registry = ControlRegistry::new(vec![
            ControlSpec::new("z", "Z", "fa-z", 30, noop),
            ControlSpec::new("a", "A", "fa-a", 10, noop),
            ControlSpec::new("m", "M", "fa-m", 20, noop),
        ])
        .unwrap();

        let ids: Vec<_> = registry.list().iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "m", "z"]);
    }

    #[test]
    fn lookup_finds_by_id() {
        let registry = ControlRegistry::builtin();
        let clear = registry.lookup(CLEAR_CONTROL).unwrap();
        assert_eq!(clear.human, "Clear traffic control settings");
        assert_eq!(clear.icon, "fa-times-circle");
        assert_eq!(clear.rank, 24);
        assert!(registry.lookup("no-such-control").is_none());
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let err = ControlRegistry::new(vec![
            ControlSpec::new("dup", "A", "fa-a", 1, noop),
            ControlSpec::new("dup", "B", "fa-b", 2, noop),
        ])
        .unwrap_err();
        assert_eq!(err, RegistryError::DuplicateControl("dup".to_string()));
    }

    #[test]
    fn empty_id_is_rejected() {
        let err = ControlRegistry::new(vec![ControlSpec::new("", "A", "fa-a", 1, noop)])
            .unwrap_err();
        assert_eq!(err, RegistryError::EmptyId);
    }

    #[test]
    fn timestamp_controls_write_through_the_store() {
        let store = ContainerStore::default();
        store.upsert("c1", ContainerState::Running, 42);
        let registry = ControlRegistry::builtin();
        let target = ControlTarget::new("c1", 42, &store);

        registry
            .lookup(SET_TIMESTAMP_CONTROL)
            .unwrap()
            .invoke(&target)
            .unwrap();
        assert!(store.get("c1").unwrap().last_action.is_some());

        registry.lookup(CLEAR_CONTROL).unwrap().invoke(&target).unwrap();
        assert!(store.get("c1").unwrap().last_action.is_none());
    }

    #[test]
    fn timestamp_control_fails_for_unknown_container() {
        let store = ContainerStore::default();
        let target = ControlTarget::new("gone", 7, &store);

        let err = ControlRegistry::builtin()
            .lookup(CLEAR_CONTROL)
            .unwrap()
            .invoke(&target)
            .unwrap_err();
        assert!(err.message().contains("gone"));
    }
}
