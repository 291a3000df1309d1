//! Synchronization engine between a gNMI/OpenConfig data source and a
//! field-and-table monitoring store.
//!
//! The engine is transport-agnostic: it consumes the device through
//! the [`ocsync_api::TelemetryClient`] seam and writes converted
//! values into a [`storage::Storage`] implementation. [`collector`]
//! ties the pieces together for one data source.

pub mod capabilities;
pub mod collector;
pub mod config;
pub mod convert;
pub mod error;
pub mod mapping;
pub mod model;
pub mod params;
pub mod poll;
pub mod session;
pub mod storage;
pub mod subscribe;

pub use capabilities::CapabilitySync;
pub use collector::Collector;
pub use config::CollectorConfig;
pub use error::SyncError;
pub use mapping::{Applier, Mapping};
pub use poll::PollSync;
pub use session::{Session, SessionState};
pub use storage::{CellValue, FieldId, MemoryStorage, Row, Storage, TableId};
pub use subscribe::ConnectionStreamSync;
