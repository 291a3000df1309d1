// ── Values crossing the transport seam ──
//
// Tagged raw values, response values with the sync-marker flag, and
// the capability snapshot shape advertised by the device.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Path ─────────────────────────────────────────────────────────────

/// A slash-separated telemetry path, e.g.
/// `system/openflow/controllers/controller[name='second']/connections`.
///
/// Path *encoding* belongs to the transport; the engine only compares
/// and displays paths as opaque strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Path(String);

impl Path {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Path {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ── TypedValue ───────────────────────────────────────────────────────

/// A protocol-native value as delivered by the device.
///
/// The conversion pipeline in `ocsync-core` turns these into typed
/// monitoring values; unrecognized shapes become the unavailable
/// sentinel there, never an error here.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    String(String),
    Bool(bool),
    Uint(u64),
    Int(i64),
    Float(f64),
    /// Structured payload for subtree reads and manual-parse paths.
    Json(serde_json::Value),
}

impl TypedValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::Uint(u) => Some(*u),
            Self::Int(i) => u64::try_from(*i).ok(),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Json(v) => Some(v),
            _ => None,
        }
    }

    /// Render the value the way the device would print it. Used by the
    /// rate calculators, which parse counters back out of the rendered
    /// form regardless of the tag.
    pub fn render(&self) -> String {
        match self {
            Self::String(s) => s.clone(),
            Self::Bool(b) => b.to_string(),
            Self::Uint(u) => u.to_string(),
            Self::Int(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
            Self::Json(v) => v.to_string(),
        }
    }
}

// ── ResponseValue ────────────────────────────────────────────────────

/// One element of a Get response or a subscription push batch.
///
/// A sync marker carries no path or value: it signals that all
/// currently-live server state has been delivered at least once since
/// the previous marker.
#[derive(Debug, Clone)]
pub struct ResponseValue {
    pub path: Path,
    pub value: Option<TypedValue>,
    pub timestamp: DateTime<Utc>,
    pub sync_marker: bool,
}

impl ResponseValue {
    pub fn new(path: Path, value: TypedValue, timestamp: DateTime<Utc>) -> Self {
        Self {
            path,
            value: Some(value),
            timestamp,
            sync_marker: false,
        }
    }

    pub fn sync_marker(timestamp: DateTime<Utc>) -> Self {
        Self {
            path: Path::new(""),
            value: None,
            timestamp,
            sync_marker: true,
        }
    }
}

// ── Capabilities ─────────────────────────────────────────────────────

/// Value encodings a device can advertise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumIter)]
pub enum Encoding {
    Json,
    Bytes,
    Proto,
    Ascii,
    JsonIetf,
}

/// A (name, organization, version) schema-model triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelInfo {
    pub name: String,
    pub organization: String,
    pub version: String,
}

/// The device's advertised protocol capabilities.
///
/// Ephemeral: recomputed on every capability poll and diffed against
/// stored state before anything is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capabilities {
    pub protocol_version: String,
    pub supported_encodings: Vec<Encoding>,
    pub supported_models: Vec<ModelInfo>,
}

impl Capabilities {
    pub fn supports(&self, encoding: Encoding) -> bool {
        self.supported_encodings.contains(&encoding)
    }
}
