//! Transport boundary for the ocsync telemetry engine.
//!
//! The wire-level gNMI transport (path encoding, RPC framing, TLS)
//! lives behind the [`TelemetryClient`] trait; this crate only defines
//! the seam and the value/capability/configuration types that cross
//! it.

pub mod client;
pub mod config;
pub mod error;
pub mod types;

// ── Primary re-exports ──────────────────────────────────────────────
pub use client::{ClientFactory, SubscribeRequest, TelemetryClient};
pub use config::DataSourceConfig;
pub use error::Error;
pub use types::{Capabilities, Encoding, ModelInfo, Path, ResponseValue, TypedValue};
