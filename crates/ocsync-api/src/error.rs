use thiserror::Error;

/// Top-level error type for the `ocsync-api` crate.
///
/// Covers every failure mode of the transport seam: connect,
/// reconfiguration, and the individual RPCs. `ocsync-core` maps these
/// into its own cycle-level diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Connection ──────────────────────────────────────────────────
    /// Establishing the session failed (refused, DNS failure, handshake).
    #[error("Connect failed: {reason}")]
    Connect { reason: String },

    /// Applying a changed configuration to a live client failed.
    #[error("Reconfiguration failed: {reason}")]
    Configuration { reason: String },

    /// The transport's own deadline elapsed.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// TLS handshake or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── RPCs ────────────────────────────────────────────────────────
    /// A Get/Set/Subscribe/Capabilities RPC was rejected or dropped.
    #[error("{operation} RPC failed: {message}")]
    Rpc {
        operation: &'static str,
        message: String,
    },

    /// The RPC was attempted without a live session.
    #[error("Not connected")]
    NotConnected,

    // ── Subscriptions ───────────────────────────────────────────────
    /// The device closed a subscription stream unexpectedly.
    #[error("Subscription stream {stream} closed: {reason}")]
    StreamClosed { stream: String, reason: String },
}

impl Error {
    /// Returns `true` if this is a transient error that the next
    /// trigger cycle may resolve. Nothing is retried internally.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Connect { .. }
                | Self::Timeout { .. }
                | Self::NotConnected
                | Self::StreamClosed { .. }
        )
    }

    /// Shorthand for an RPC failure.
    pub fn rpc(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Rpc {
            operation,
            message: message.into(),
        }
    }
}
