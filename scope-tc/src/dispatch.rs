//! Control dispatch.
//!
//! Resolves a `(node ID, control ID)` pair from a control request into an
//! action bound to one container's pid. The dispatcher only reads the store;
//! whatever a handler changes, it changes through the store itself.

use tracing::{debug, info};

use crate::controls::{ControlRegistry, ControlSpec, ControlTarget};
use crate::error::{ControlError, DispatchError, HandlerError};
use crate::node_id;
use crate::store::ContainerStore;

/// A control handler bound to a container, ready to run.
#[derive(Debug)]
pub struct BoundAction {
    spec: ControlSpec,
    container_id: String,
    pid: i32,
    store: ContainerStore,
}

impl BoundAction {
    pub fn control_id(&self) -> &str {
        &self.spec.id
    }

    pub fn container_id(&self) -> &str {
        &self.container_id
    }

    /// Pid of the container at resolve time.
    pub fn pid(&self) -> i32 {
        self.pid
    }

    /// Run the handler. No retry, no rollback.
    pub fn run(self) -> Result<(), HandlerError> {
        info!(
            container_id = %self.container_id,
            pid = self.pid,
            control = %self.spec.id,
            "Running control"
        );
        let target = ControlTarget::new(&self.container_id, self.pid, &self.store);
        self.spec.invoke(&target)
    }
}

#[derive(Debug, Clone)]
pub struct ControlDispatcher {
    store: ContainerStore,
    registry: ControlRegistry,
}

impl ControlDispatcher {
    pub fn new(store: ContainerStore, registry: ControlRegistry) -> Self {
        Self { store, registry }
    }

    pub fn resolve(&self, node_id: &str, control_id: &str) -> Result<BoundAction, DispatchError> {
        let container_id = node_id::decode(node_id)?;

        let container =
            self.store
                .get(container_id)
                .ok_or_else(|| DispatchError::ContainerNotFound {
                    container_id: container_id.to_string(),
                })?;

        let spec = self
            .registry
            .lookup(control_id)
            .ok_or_else(|| DispatchError::UnknownControl {
                control_id: control_id.to_string(),
                node_id: node_id.to_string(),
            })?;

        debug!(
            container_id = %container.id,
            state = %container.state,
            control = %spec.id,
            "Resolved control"
        );

        Ok(BoundAction {
            spec: spec.clone(),
            container_id: container.id,
            pid: container.pid,
            store: self.store.clone(),
        })
    }

    /// Resolve and run in one step.
    pub fn dispatch(&self, node_id: &str, control_id: &str) -> Result<(), ControlError> {
        self.resolve(node_id, control_id)?.run()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controls::{CLEAR_CONTROL, SET_TIMESTAMP_CONTROL};
    use crate::store::ContainerState;
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::Arc;

    fn dispatcher(store: &ContainerStore) -> ControlDispatcher {
        ControlDispatcher::new(store.clone(), ControlRegistry::builtin())
    }

    #[test]
    fn resolve_binds_current_pid() {
        let store = ContainerStore::default();
        store.upsert("c1", ContainerState::Running, 42);

        let seen = Arc::new(AtomicI32::new(0));
        let recorder = seen.clone();
        let registry = ControlRegistry::new(vec![ControlSpec::new(
            CLEAR_CONTROL,
            "Clear",
            "fa-times-circle",
            24,
            move |target: &ControlTarget<'_>| {
                recorder.store(target.pid(), Ordering::SeqCst);
                Ok(())
            },
        )])
        .unwrap();
        let dispatcher = ControlDispatcher::new(store.clone(), registry);

        let action = dispatcher
            .resolve(&node_id::encode("c1"), CLEAR_CONTROL)
            .unwrap();
        assert_eq!(action.pid(), 42);
        assert_eq!(action.container_id(), "c1");
        assert_eq!(action.control_id(), CLEAR_CONTROL);

        action.run().unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 42);
    }

    #[test]
    fn resolve_missing_container() {
        let store = ContainerStore::default();
        let err = dispatcher(&store)
            .resolve(&node_id::encode("missing"), CLEAR_CONTROL)
            .unwrap_err();
        assert_eq!(
            err,
            DispatchError::ContainerNotFound {
                container_id: "missing".to_string()
            }
        );
    }

    #[test]
    fn resolve_unknown_control() {
        let store = ContainerStore::default();
        store.upsert("c1", ContainerState::Running, 42);

        let err = dispatcher(&store)
            .resolve(&node_id::encode("c1"), "no-such-control")
            .unwrap_err();
        assert!(matches!(err, DispatchError::UnknownControl { .. }));
    }

    #[test]
    fn resolve_malformed_node_id() {
        let store = ContainerStore::default();
        store.upsert("c1", ContainerState::Running, 42);

        let err = dispatcher(&store).resolve("c1", CLEAR_CONTROL).unwrap_err();
        assert!(matches!(err, DispatchError::InvalidNodeId(_)));
    }

    #[test]
    fn failed_handler_leaves_store_untouched() {
        let store = ContainerStore::default();
        store.upsert("c1", ContainerState::Stopped, 42);
        let before = store.get("c1");

        let registry = ControlRegistry::new(vec![ControlSpec::new(
            "boom",
            "Boom",
            "fa-bomb",
            1,
            |_: &ControlTarget<'_>| Err(HandlerError::new("no such process")),
        )])
        .unwrap();
        let err = ControlDispatcher::new(store.clone(), registry)
            .dispatch(&node_id::encode("c1"), "boom")
            .unwrap_err();

        assert_eq!(err.to_string(), "handler failed: no such process");
        assert_eq!(store.get("c1"), before);
    }

    #[test]
    fn dispatch_sets_and_clears_timestamp() {
        let store = ContainerStore::default();
        store.upsert("c1", ContainerState::Running, 100);
        let dispatcher = dispatcher(&store);
        let node = node_id::encode("c1");

        dispatcher.dispatch(&node, SET_TIMESTAMP_CONTROL).unwrap();
        assert!(store.get("c1").unwrap().last_action.is_some());

        dispatcher.dispatch(&node, CLEAR_CONTROL).unwrap();
        assert!(store.get("c1").unwrap().last_action.is_none());
    }
}
