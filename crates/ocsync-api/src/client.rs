// ── Telemetry client seam ──
//
// The engine consumes the gNMI transport through this trait only.
// Implementations own RPC framing, encryption, and reconnect timeouts;
// the engine owns *when* connect/reconfigure happen and what the
// responses mean.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};

use crate::config::DataSourceConfig;
use crate::error::Error;
use crate::types::{Capabilities, Path, ResponseValue, TypedValue};

/// Subscription parameters for one logical stream.
#[derive(Debug, Clone)]
pub struct SubscribeRequest {
    /// Caller-chosen stream name, used for logging and teardown.
    pub stream: String,
    /// Sample interval; `None` means on-change delivery.
    pub interval: Option<Duration>,
    pub paths: Vec<Path>,
}

impl SubscribeRequest {
    pub fn on_change(stream: impl Into<String>, paths: Vec<Path>) -> Self {
        Self {
            stream: stream.into(),
            interval: None,
            paths,
        }
    }

    pub fn sampled(stream: impl Into<String>, interval: Duration, paths: Vec<Path>) -> Self {
        Self {
            stream: stream.into(),
            interval: Some(interval),
            paths,
        }
    }
}

/// Opaque handle to a live gNMI session.
///
/// All RPCs may fail with [`Error`]; nothing is retried internally —
/// retry is driven by the caller's next trigger cycle. Push batches
/// from [`subscribe`](Self::subscribe) are delivered on transport
/// worker tasks, in delivery order per stream.
#[async_trait]
pub trait TelemetryClient: Send + Sync {
    /// Establish the session. Bounded by the transport's own timeout.
    async fn connect(&self) -> Result<(), Error>;

    /// Apply a changed configuration to the live client, preserving
    /// in-flight subscriptions where the transport supports it.
    async fn change_configuration(&self, config: &DataSourceConfig) -> Result<(), Error>;

    /// Advertised capabilities, or `None` when the device declines to
    /// report them.
    async fn capabilities(&self) -> Result<Option<Capabilities>, Error>;

    /// On-demand read of a group of paths.
    async fn get(&self, paths: &[Path]) -> Result<Vec<ResponseValue>, Error>;

    /// Write one value to the device.
    async fn set(&self, path: &Path, value: TypedValue) -> Result<(), Error>;

    /// Open a subscription stream. Each received item is one push
    /// batch, which may interleave value payloads and sync markers.
    async fn subscribe(
        &self,
        request: SubscribeRequest,
    ) -> Result<mpsc::Receiver<Vec<ResponseValue>>, Error>;

    /// Current connectivity, as last reported by the transport.
    fn is_connected(&self) -> bool;

    /// Watch channel publishing connectivity transitions.
    fn connection_events(&self) -> watch::Receiver<bool>;
}

/// Builds a client from a connection configuration.
///
/// The session manager constructs the client lazily on first
/// acquisition; injecting the factory keeps the transport out of the
/// engine entirely.
pub trait ClientFactory: Send + Sync {
    fn build(&self, config: &DataSourceConfig) -> Result<Arc<dyn TelemetryClient>, Error>;
}

impl<F> ClientFactory for F
where
    F: Fn(&DataSourceConfig) -> Result<Arc<dyn TelemetryClient>, Error> + Send + Sync,
{
    fn build(&self, config: &DataSourceConfig) -> Result<Arc<dyn TelemetryClient>, Error> {
        self(config)
    }
}
