//! Report snapshots.
//!
//! A report is rebuilt from the live store on every `/report` request. The
//! wire shape follows the Scope plugin protocol: a `Container` topology and
//! a `Plugins` list holding this plugin's self-descriptor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;

use crate::config::PluginConfig;
use crate::controls::{ControlRegistry, TABLE_PREFIX};
use crate::error::ReportError;
use crate::node_id;
use crate::store::{Container, ContainerState, ContainerStore};

/// Table template ID; its prefix groups the per-node label entries.
pub const TABLE_ID: &str = "plugin-name-table";

/// Metadata key holding the time of a container's last control action.
pub const TIMESTAMP_KEY: &str = "plugin-name-timestamp";

/// Full `/report` response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Report {
    #[serde(rename = "Container")]
    pub container: Topology,
    #[serde(rename = "Plugins")]
    pub plugins: Vec<PluginSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Topology {
    pub nodes: BTreeMap<String, Node>,
    pub controls: BTreeMap<String, Control>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata_templates: BTreeMap<String, MetadataTemplate>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub table_templates: BTreeMap<String, TableTemplate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Node {
    #[serde(
        rename = "latestControls",
        default,
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub latest_controls: BTreeMap<String, ControlEntry>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub latest: BTreeMap<String, StringEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ControlEntry {
    pub timestamp: DateTime<Utc>,
    pub value: ControlData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ControlData {
    pub dead: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct StringEntry {
    pub timestamp: DateTime<Utc>,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Control {
    pub id: String,
    pub human: String,
    pub icon: String,
    pub rank: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MetadataTemplate {
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub truncate: Option<u32>,
    #[serde(rename = "dataType", default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
    pub priority: f64,
    pub from: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TableTemplate {
    pub id: String,
    pub label: String,
    pub prefix: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PluginSpec {
    pub id: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub interfaces: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_version: String,
}

impl From<&PluginConfig> for PluginSpec {
    fn from(config: &PluginConfig) -> Self {
        Self {
            id: config.id.clone(),
            label: config.label.clone(),
            description: config.description.clone(),
            interfaces: config.interfaces.clone(),
            api_version: config.api_version.clone(),
        }
    }
}

/// How a container in a given state appears in a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Visibility {
    pub included: bool,
    pub dead: bool,
}

const HIDDEN: Visibility = Visibility {
    included: false,
    dead: false,
};
const LIVE: Visibility = Visibility {
    included: true,
    dead: false,
};
const DEAD: Visibility = Visibility {
    included: true,
    dead: true,
};

/// Reportability table.
///
/// Not-yet-started and removed containers are hidden so they never show up
/// as stale nodes.
pub fn visibility(state: ContainerState) -> Visibility {
    match state {
        ContainerState::Created => HIDDEN,
        ContainerState::Running => LIVE,
        ContainerState::Stopped => DEAD,
        ContainerState::Destroyed => HIDDEN,
    }
}

/// Builds report snapshots from the store and the control catalogue.
#[derive(Debug, Clone)]
pub struct ReportBuilder {
    store: ContainerStore,
    registry: ControlRegistry,
    plugin: PluginSpec,
}

impl ReportBuilder {
    pub fn new(store: ContainerStore, registry: ControlRegistry, plugin: &PluginConfig) -> Self {
        Self {
            store,
            registry,
            plugin: plugin.into(),
        }
    }

    /// Snapshot of all reportable containers, stamped with the current time.
    pub fn build_snapshot(&self) -> Report {
        self.build_snapshot_at(Utc::now())
    }

    /// Snapshot stamped with `timestamp`.
    pub fn build_snapshot_at(&self, timestamp: DateTime<Utc>) -> Report {
        let mut nodes = BTreeMap::new();
        self.store.for_each(|container| {
            let visibility = visibility(container.state);
            if visibility.included {
                nodes.insert(
                    node_id::encode(&container.id),
                    self.node(container, visibility.dead, timestamp),
                );
            }
        });

        Report {
            container: Topology {
                nodes,
                controls: self.controls(),
                metadata_templates: metadata_templates(),
                table_templates: table_templates(),
            },
            plugins: vec![self.plugin.clone()],
        }
    }

    /// Serialized snapshot, as sent on the wire.
    pub fn raw_report(&self) -> Result<Vec<u8>, ReportError> {
        Ok(serde_json::to_vec(&self.build_snapshot())?)
    }

    fn node(&self, container: &Container, dead: bool, timestamp: DateTime<Utc>) -> Node {
        let entry = ControlEntry {
            timestamp,
            value: ControlData { dead },
        };
        let latest_controls = self
            .registry
            .list()
            .iter()
            .map(|spec| (spec.id.clone(), entry.clone()))
            .collect();

        let mut latest: BTreeMap<_, _> = [("Label A", "A"), ("Label B", "B")]
            .into_iter()
            .map(|(label, value)| {
                (
                    format!("{TABLE_PREFIX}{label}"),
                    StringEntry {
                        timestamp,
                        value: value.to_string(),
                    },
                )
            })
            .collect();
        if let Some(at) = container.last_action {
            latest.insert(
                TIMESTAMP_KEY.to_string(),
                StringEntry {
                    timestamp,
                    value: at.to_rfc3339(),
                },
            );
        }

        Node {
            latest_controls,
            latest,
        }
    }

    fn controls(&self) -> BTreeMap<String, Control> {
        self.registry
            .list()
            .iter()
            .map(|spec| {
                (
                    spec.id.clone(),
                    Control {
                        id: spec.id.clone(),
                        human: spec.human.clone(),
                        icon: spec.icon.clone(),
                        rank: spec.rank,
                    },
                )
            })
            .collect()
    }
}

fn metadata_templates() -> BTreeMap<String, MetadataTemplate> {
    BTreeMap::from([(
        TIMESTAMP_KEY.to_string(),
        MetadataTemplate {
            id: TIMESTAMP_KEY.to_string(),
            label: "Timestamp".to_string(),
            truncate: None,
            data_type: None,
            priority: 13.5,
            from: "latest".to_string(),
        },
    )])
}

fn table_templates() -> BTreeMap<String, TableTemplate> {
    BTreeMap::from([(
        TABLE_ID.to_string(),
        TableTemplate {
            id: TABLE_ID.to_string(),
            label: "Traffic Control".to_string(),
            prefix: TABLE_PREFIX.to_string(),
        },
    )])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controls::{CLEAR_CONTROL, SET_TIMESTAMP_CONTROL};
    use serde_json::Value;

    fn builder(store: &ContainerStore) -> ReportBuilder {
        ReportBuilder::new(
            store.clone(),
            ControlRegistry::builtin(),
            &PluginConfig::default(),
        )
    }

    #[test]
    fn visibility_table() {
        assert!(!visibility(ContainerState::Created).included);
        assert!(!visibility(ContainerState::Destroyed).included);
        assert_eq!(visibility(ContainerState::Running), LIVE);
        assert_eq!(visibility(ContainerState::Stopped), DEAD);
    }

    #[test]
    fn created_and_destroyed_are_excluded() {
        let store = ContainerStore::default();
        store.upsert("created", ContainerState::Created, 0);
        store.upsert("gone", ContainerState::Running, 10);
        store.upsert("gone", ContainerState::Destroyed, 10);
        store.upsert("live", ContainerState::Running, 11);

        let report = builder(&store).build_snapshot();
        let nodes: Vec<_> = report.container.nodes.keys().cloned().collect();
        assert_eq!(nodes, vec![node_id::encode("live")]);
    }

    #[test]
    fn stopped_container_has_dead_controls() {
        let store = ContainerStore::default();
        store.upsert("c1", ContainerState::Running, 100);
        store.upsert("c1", ContainerState::Stopped, 100);

        let report = builder(&store).build_snapshot();
        assert_eq!(report.container.nodes.len(), 1);

        let node = &report.container.nodes[&node_id::encode("c1")];
        assert_eq!(node.latest_controls.len(), 2);
        assert!(node.latest_controls.values().all(|e| e.value.dead));
    }

    #[test]
    fn running_container_has_live_controls_and_labels() {
        let store = ContainerStore::default();
        store.upsert("c1", ContainerState::Running, 100);

        let report = builder(&store).build_snapshot();
        let node = &report.container.nodes[&node_id::encode("c1")];

        assert!(node.latest_controls.contains_key(CLEAR_CONTROL));
        assert!(node.latest_controls.contains_key(SET_TIMESTAMP_CONTROL));
        assert!(node.latest_controls.values().all(|e| !e.value.dead));
        assert_eq!(node.latest["plugin-name-table-Label A"].value, "A");
        assert_eq!(node.latest["plugin-name-table-Label B"].value, "B");
        assert!(!node.latest.contains_key(TIMESTAMP_KEY));
    }

    #[test]
    fn last_action_is_reported() {
        let store = ContainerStore::default();
        store.upsert("c1", ContainerState::Running, 100);
        let at = Utc::now();
        store.set_last_action("c1", Some(at));

        let report = builder(&store).build_snapshot();
        let node = &report.container.nodes[&node_id::encode("c1")];
        assert_eq!(node.latest[TIMESTAMP_KEY].value, at.to_rfc3339());
    }

    #[test]
    fn entries_share_one_timestamp() {
        let store = ContainerStore::default();
        store.upsert("a", ContainerState::Running, 1);
        store.upsert("b", ContainerState::Stopped, 2);
        let ts = Utc::now();

        let report = builder(&store).build_snapshot_at(ts);
        for node in report.container.nodes.values() {
            assert!(node.latest_controls.values().all(|e| e.timestamp == ts));
            assert!(node.latest.values().all(|e| e.timestamp == ts));
        }
    }

    #[test]
    fn snapshot_is_idempotent() {
        let store = ContainerStore::default();
        store.upsert("a", ContainerState::Running, 1);
        store.upsert("b", ContainerState::Stopped, 2);
        let builder = builder(&store);
        let ts = Utc::now();

        assert_eq!(builder.build_snapshot_at(ts), builder.build_snapshot_at(ts));
    }

    #[test]
    fn static_descriptors() {
        let report = builder(&ContainerStore::default()).build_snapshot();

        let clear = &report.container.controls[CLEAR_CONTROL];
        assert_eq!(clear.icon, "fa-times-circle");
        assert_eq!(clear.rank, 24);

        let table = &report.container.table_templates[TABLE_ID];
        assert_eq!(table.label, "Traffic Control");
        assert_eq!(table.prefix, TABLE_PREFIX);

        let meta = &report.container.metadata_templates[TIMESTAMP_KEY];
        assert_eq!(meta.priority, 13.5);
        assert_eq!(meta.from, "latest");

        assert_eq!(report.plugins.len(), 1);
        assert_eq!(report.plugins[0].interfaces, vec!["reporter", "controller"]);
        assert_eq!(report.plugins[0].api_version, "1");
    }

    #[test]
    fn wire_shape() {
        let store = ContainerStore::default();
        store.upsert("c1", ContainerState::Stopped, 9);

        let raw = builder(&store).raw_report().unwrap();
        let v: Value = serde_json::from_slice(&raw).unwrap();

        let topology = &v["Container"];
        assert!(topology["nodes"].is_object());
        assert!(topology["controls"].is_object());
        assert!(topology["metadata_templates"].is_object());
        assert!(topology["table_templates"].is_object());
        assert_eq!(
            topology["nodes"]["c1;<container>"]["latestControls"][CLEAR_CONTROL]["value"]["dead"],
            true
        );
        assert_eq!(
            topology["metadata_templates"][TIMESTAMP_KEY]["dataType"],
            Value::Null
        );
        assert_eq!(v["Plugins"][0]["id"], "scope-tc");
        assert_eq!(v["Plugins"][0]["label"], "Traffic control");
    }
}
