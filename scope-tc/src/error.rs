//! Error types for the plugin.
//!
//! Lookup and handler failures ([`ControlError`]) are reported to the caller
//! inside a successful control response. Only [`ReportError`] and malformed
//! requests surface as HTTP errors.

use thiserror::Error;

use crate::node_id::NODE_SUFFIX;

/// A node ID could not be turned back into a container ID.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NodeIdError {
    #[error("no suffix {suffix:?} in node ID {node_id:?}", suffix = NODE_SUFFIX)]
    MalformedIdentifier { node_id: String },
}

/// A control request could not be bound to a container.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("failed to get container ID from node ID: {0}")]
    InvalidNodeId(#[from] NodeIdError),

    #[error("container {container_id} not found")]
    ContainerNotFound { container_id: String },

    #[error("unknown control ID {control_id:?} for node ID {node_id:?}")]
    UnknownControl { control_id: String, node_id: String },
}

/// A bound control action failed. The message comes from the handler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct HandlerError {
    message: String,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Any failure of a control request, as reported in the response payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControlError {
    #[error("failed to get handler: {0}")]
    Resolve(#[from] DispatchError),

    #[error("handler failed: {0}")]
    Handler(#[from] HandlerError),
}

/// The report could not be serialized.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to marshal the report: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// The control catalogue is invalid.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("control ID must not be empty")]
    EmptyId,

    #[error("duplicate control ID {0:?}")]
    DuplicateControl(String),
}
