// ── Engine error types ──
//
// Cycle-level errors surfaced by the synchronizers. Transport failures
// are wrapped, not exposed raw; decode failures identify the payload
// path so sibling payloads can keep flowing.

use thiserror::Error;

use crate::storage::FieldId;

/// Unified error type for the sync engine.
///
/// Nothing here is retried internally — a failed cycle is abandoned
/// and the next periodic trigger retries from scratch. The
/// "unavailable" conversion outcome is a sentinel value, never an
/// error, and deliberately has no variant.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Connect, reconfigure, or RPC failure at the transport seam.
    #[error("Transport error: {0}")]
    Transport(#[from] ocsync_api::Error),

    /// Malformed payload on a manual-parse path. The payload is
    /// skipped; siblings in the same batch still process.
    #[error("Malformed payload at {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// A write was requested for a field the mapping does not cover.
    #[error("No path mapped for field {field}")]
    NotMapped { field: FieldId },
}

impl SyncError {
    pub fn decode(path: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Decode {
            path: path.into(),
            source,
        }
    }
}
