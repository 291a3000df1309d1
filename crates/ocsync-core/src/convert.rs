// ── Value conversion pipeline ──
//
// Pure converters from protocol-native raw values to monitoring-native
// cell values. Every converter has an explicit unavailable outcome —
// a sentinel in the output type's range — and never returns an error:
// a value that cannot be interpreted must not abort its siblings.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use ocsync_api::TypedValue;

use crate::model::{AdminState, FailureMode, OperState, TransportProtocol};
use crate::storage::{CellValue, FieldId};

/// Sentinel for a value the device did not report or that failed to
/// map. Out of range for every enum ordinal in use.
pub const NOT_AVAILABLE: i64 = -1;

/// Sentinel for a reported-but-unrecognized transport token, kept
/// distinct from plain absence.
pub const INVALID: i64 = -2;

/// Magnitudes above this are nanoseconds since epoch; below, the
/// device's own tick unit. Corresponds to 2000-01-01T00:00:00Z in ns.
const EPOCH_NANOS_THRESHOLD: u64 = 946_684_800_000_000_000;

/// Text layout of the device's calendar leaves, a literal `Z` followed
/// by an explicit UTC offset (e.g. `2024-03-01T08:00:00Z+01:00`).
const CALENDAR_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ%:z";

// ── Stateless converters ─────────────────────────────────────────────

fn enum_ordinal<T>(raw: Option<&TypedValue>) -> CellValue
where
    T: FromStr + Into<i64>,
{
    raw.and_then(TypedValue::as_str)
        .and_then(|s| T::from_str(s).ok())
        .map_or(CellValue::Int(NOT_AVAILABLE), |state| {
            CellValue::Int(state.into())
        })
}

pub fn oper_state(raw: Option<&TypedValue>) -> CellValue {
    enum_ordinal::<OperState>(raw)
}

pub fn admin_state(raw: Option<&TypedValue>) -> CellValue {
    enum_ordinal::<AdminState>(raw)
}

pub fn failure_mode(raw: Option<&TypedValue>) -> CellValue {
    enum_ordinal::<FailureMode>(raw)
}

/// `TCP`/`TLS` tokens to their ordinals; anything else is the invalid
/// sentinel rather than plain unavailability.
pub fn transport_protocol(raw: Option<&str>) -> CellValue {
    raw.and_then(|s| TransportProtocol::from_str(s).ok())
        .map_or(CellValue::Int(INVALID), |t| CellValue::Int(t as i64))
}

/// Boolean to a numeric indicator; non-boolean input is unavailable.
pub fn bool_indicator(raw: Option<&TypedValue>) -> CellValue {
    raw.and_then(TypedValue::as_bool)
        .map_or(CellValue::Int(NOT_AVAILABLE), |b| {
            CellValue::Int(i64::from(b))
        })
}

/// Normalize a numeric epoch leaf to a date.
///
/// Disambiguates nanoseconds from device ticks by magnitude; absent or
/// non-numeric input yields epoch zero, not an error.
pub fn epoch_timestamp(raw: Option<&TypedValue>) -> CellValue {
    let ticks = raw.and_then(|v| {
        v.as_u64()
            .or_else(|| v.as_str().and_then(|s| s.parse().ok()))
    });
    let Some(ticks) = ticks else {
        return CellValue::Date(DateTime::UNIX_EPOCH);
    };

    let seconds = if ticks > EPOCH_NANOS_THRESHOLD {
        ticks as f64 / 1_000_000_000.0
    } else {
        ticks as f64 / 100.0
    };

    CellValue::Date(DateTime::UNIX_EPOCH + chrono::Duration::milliseconds((seconds * 1000.0) as i64))
}

/// Parse a calendar leaf in the device's text layout; unparsable input
/// yields epoch zero.
pub fn calendar_text(raw: Option<&TypedValue>) -> CellValue {
    let Some(text) = raw.and_then(TypedValue::as_str) else {
        return CellValue::Date(DateTime::UNIX_EPOCH);
    };

    DateTime::parse_from_str(text, CALENDAR_FORMAT)
        .map(|dt| CellValue::Date(dt.with_timezone(&Utc)))
        .unwrap_or(CellValue::Date(DateTime::UNIX_EPOCH))
}

// ── Converter dispatch ───────────────────────────────────────────────

/// Closed set of single-value converter kinds, referenced by the
/// mapping registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Converter {
    OperState,
    AdminState,
    FailureMode,
    TransportProtocol,
    BoolIndicator,
    EpochTimestamp,
    CalendarText,
}

impl Converter {
    pub fn apply(self, raw: Option<&TypedValue>) -> CellValue {
        match self {
            Self::OperState => oper_state(raw),
            Self::AdminState => admin_state(raw),
            Self::FailureMode => failure_mode(raw),
            Self::TransportProtocol => transport_protocol(raw.and_then(TypedValue::as_str)),
            Self::BoolIndicator => bool_indicator(raw),
            Self::EpochTimestamp => epoch_timestamp(raw),
            Self::CalendarText => calendar_text(raw),
        }
    }
}

// ── Derived (multi-field) converters ─────────────────────────────────

/// Render the connection's composite display key.
///
/// `{aux-id | "Main" when 0}-{address | "N/A"}:{port | "N/A"}`; a
/// missing aux-id falls back to the row's own primary key. Never
/// fails.
pub fn connection_display_key(
    aux_id: Option<i64>,
    address: Option<&str>,
    port: Option<i64>,
    pk: &str,
) -> String {
    let id = match aux_id {
        Some(0) => "Main".to_owned(),
        Some(n) => n.to_string(),
        None => pk.to_owned(),
    };
    let addr = match address {
        Some(a) if !a.is_empty() => a,
        _ => "N/A",
    };
    let port = match port {
        Some(p) if p != 0 => p.to_string(),
        _ => "N/A".to_owned(),
    };

    format!("{id}-{addr}:{port}")
}

/// Interface display key: the expanded interface name joined with its
/// description, or the bare primary key when no usable description.
pub fn interface_display_key(pk: &str, description: Option<&CellValue>) -> String {
    let description = description.map(ToString::to_string).unwrap_or_default();
    if description.is_empty() || description == "-1" {
        return pk.to_owned();
    }

    format!("{}/{description}", expand_interface_name(pk))
}

/// Expand well-known interface name prefixes (`eth3` → `Ethernet3`,
/// `lo0` → `loopback0`); anything else passes through untouched.
fn expand_interface_name(name: &str) -> String {
    for (tag, expanded) in [("eth", "Ethernet"), ("lo", "loopback")] {
        if let Some(rest) = name.strip_prefix(tag) {
            let numeric = !rest.is_empty()
                && rest
                    .split('/')
                    .all(|seg| !seg.is_empty() && seg.bytes().all(|b| b.is_ascii_digit()));
            if numeric {
                return format!("{expanded}{rest}");
            }
        }
    }
    name.to_owned()
}

/// Closed set of derived-column builders: each reads sibling column
/// values of the same row, plus the row's primary key.
#[derive(Debug, Clone, Copy)]
pub enum DerivedConverter {
    InterfaceKey {
        description: FieldId,
    },
}

impl DerivedConverter {
    pub fn apply(
        self,
        pk: &str,
        siblings: &std::collections::BTreeMap<FieldId, CellValue>,
    ) -> CellValue {
        match self {
            Self::InterfaceKey { description } => {
                CellValue::Text(interface_display_key(pk, siblings.get(&description)))
            }
        }
    }
}

// ── Rate calculation ─────────────────────────────────────────────────

/// One retained counter observation.
#[derive(Debug, Clone, PartialEq)]
pub struct RateSample {
    /// Counter as rendered by the device; parsed as u64 on use.
    pub value: String,
    pub timestamp: DateTime<Utc>,
}

impl RateSample {
    pub fn new(value: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            value: value.into(),
            timestamp,
        }
    }
}

/// Rate flavors: bits multiplies the octet delta by 8, errors is the
/// plain count delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateKind {
    Bits,
    Errors,
}

impl RateKind {
    fn factor(self) -> f64 {
        match self {
            Self::Bits => 8.0,
            Self::Errors => 1.0,
        }
    }

    /// Instantaneous rate between two consecutive samples.
    ///
    /// `None` (unavailable) unless the new timestamp strictly exceeds
    /// the old one, both counters parse as u64, and the counter did
    /// not decrease — wrap and reset are not distinguished from
    /// corruption.
    pub fn rate(self, previous: &RateSample, current: &RateSample) -> Option<f64> {
        if current.timestamp <= previous.timestamp {
            return None;
        }
        let new: u64 = current.value.parse().ok()?;
        let old: u64 = previous.value.parse().ok()?;
        if new < old {
            return None;
        }

        let delta_secs = (current.timestamp - previous.timestamp)
            .num_milliseconds() as f64
            / 1000.0;
        Some(self.factor() * (new - old) as f64 / delta_secs)
    }
}

/// Previous-sample retention per (counter column, row key).
///
/// The first observation of any counter has no predecessor and is
/// therefore unavailable; every observation replaces the retained
/// sample whether or not a rate could be computed.
#[derive(Default)]
pub struct RateTracker {
    samples: DashMap<(FieldId, String), RateSample>,
}

impl RateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `current` and return the rate against the previously
    /// retained sample, or the unavailable sentinel.
    pub fn observe(
        &self,
        column: FieldId,
        pk: &str,
        kind: RateKind,
        current: RateSample,
    ) -> CellValue {
        let previous = self
            .samples
            .insert((column, pk.to_owned()), current.clone());

        previous
            .and_then(|prev| kind.rate(&prev, &current))
            .map_or(CellValue::Int(NOT_AVAILABLE), CellValue::Float)
    }
}

// ── Tests ────────────────────────────────────────────────────────────
