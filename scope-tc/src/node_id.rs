//! Mapping between container IDs and report node IDs.
//!
//! A node ID is the container ID followed by [`NODE_SUFFIX`]. This module is
//! the only place that builds or parses node IDs.

use crate::error::NodeIdError;

/// Reserved suffix marking a container node. Never part of a raw container ID.
pub const NODE_SUFFIX: &str = ";<container>";

/// Node ID for a container.
pub fn encode(container_id: &str) -> String {
    format!("{container_id}{NODE_SUFFIX}")
}

/// Container ID for a node, failing if the suffix is missing.
pub fn decode(node_id: &str) -> Result<&str, NodeIdError> {
    node_id
        .strip_suffix(NODE_SUFFIX)
        .ok_or_else(|| NodeIdError::MalformedIdentifier {
            node_id: node_id.to_string(),
        })
}
