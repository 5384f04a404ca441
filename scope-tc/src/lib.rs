pub mod config;
pub mod controls;
pub mod dispatch;
pub mod error;
pub mod ingest;
pub mod node_id;
pub mod report;
pub mod rest;
pub mod server;
pub mod store;

pub use config::PluginConfig;
pub use controls::{ControlRegistry, ControlSpec, ControlTarget};
pub use dispatch::{BoundAction, ControlDispatcher};
pub use error::{ControlError, DispatchError, HandlerError, NodeIdError, ReportError};
pub use report::{Report, ReportBuilder};
pub use store::{Container, ContainerEvent, ContainerState, ContainerStore, EvictionPolicy};
