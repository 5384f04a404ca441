//! Container state store.
//!
//! The store mirrors the lifecycle state of every container reported by the
//! runtime. It is the only mutable state shared between the ingestion task
//! and the request handlers.
//!
//! # Architecture
//!
//! ```text
//! EventSource → mpsc → run_ingester → ContainerStore::apply   // Writes
//!                                           ↑
//! /report → ReportBuilder::build_snapshot ──┤                // Snapshot reads
//! /control → ControlDispatcher::resolve ────┘                // Point reads
//! ```
//!
//! Reads never hold the lock while caller code runs: `for_each` copies the
//! table first and visits the copy.
//!
//! # Usage
//!
//! ```ignore
//! use scope_tc::store::{ContainerState, ContainerStore};
//!
//! let store = ContainerStore::default();
//! store.upsert("c1", ContainerState::Running, 4242);
//! assert_eq!(store.get("c1").map(|c| c.pid), Some(4242));
//! ```

mod container;
mod event;
mod table;

pub use container::{Container, ContainerState, EvictionPolicy};
pub use event::ContainerEvent;
pub use table::ContainerStore;
