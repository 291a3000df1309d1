// ── Path-to-storage mapping ──
//
// Declarative registry tying device paths to storage fields and table
// columns, plus the applier that routes incoming response values
// through the conversion pipeline into storage. Writes are suppressed
// when the converted value matches what was last written, so a poll
// that observes no change performs no storage writes.

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;
use ocsync_api::{Path, ResponseValue, TypedValue};
use tracing::debug;

use crate::convert::{
    self, Converter, DerivedConverter, RateKind, RateSample, RateTracker,
};
use crate::error::SyncError;
use crate::params;
use crate::storage::{CellValue, FieldId, Row, Storage, TableId};

// ── Registry types ───────────────────────────────────────────────────

/// A standalone scalar: one device path feeding one storage field.
#[derive(Debug, Clone)]
pub struct ParameterEntry {
    pub path: Path,
    pub field: FieldId,
    pub convert: Option<Converter>,
}

/// Sibling rate column fed from a counter leaf.
#[derive(Debug, Clone, Copy)]
pub struct RateColumn {
    pub kind: RateKind,
    pub target: FieldId,
}

/// One leaf of a grid row.
#[derive(Debug, Clone)]
pub struct GridColumn {
    pub leaf: &'static str,
    pub column: FieldId,
    pub convert: Option<Converter>,
    pub rate: Option<RateColumn>,
}

impl GridColumn {
    fn plain(leaf: &'static str, column: FieldId) -> Self {
        Self {
            leaf,
            column,
            convert: None,
            rate: None,
        }
    }

    fn converted(leaf: &'static str, column: FieldId, convert: Converter) -> Self {
        Self {
            leaf,
            column,
            convert: Some(convert),
            rate: None,
        }
    }

    fn counter(leaf: &'static str, column: FieldId, kind: RateKind, target: FieldId) -> Self {
        Self {
            leaf,
            column,
            convert: None,
            rate: Some(RateColumn { kind, target }),
        }
    }
}

/// Column computed from sibling cells of the same row rather than from
/// a device leaf.
#[derive(Debug, Clone, Copy)]
pub struct DerivedColumn {
    pub target: FieldId,
    pub convert: DerivedConverter,
}

/// A keyed table fed from one subtree path. The payload is an object
/// keyed by row primary key, each entry an object of leaf values.
#[derive(Debug, Clone)]
pub struct Grid {
    pub path: Path,
    pub table: TableId,
    pub key_column: FieldId,
    pub columns: Vec<GridColumn>,
    pub derived: Vec<DerivedColumn>,
}

/// The full registry for one data source.
#[derive(Debug, Clone)]
pub struct Mapping {
    pub parameters: Vec<ParameterEntry>,
    pub grids: Vec<Grid>,
}

impl Mapping {
    /// The registry covering the system scalars and the interface
    /// grid.
    #[must_use]
    pub fn standard() -> Self {
        let scalar = |path: &str, field: FieldId| ParameterEntry {
            path: Path::new(path),
            field,
            convert: None,
        };
        let converted = |path: &str, field: FieldId, convert: Converter| ParameterEntry {
            path: Path::new(path),
            field,
            convert: Some(convert),
        };

        let parameters = vec![
            converted(
                "system/state/current-datetime",
                params::SYSTEM_CURRENT_DATETIME,
                Converter::CalendarText,
            ),
            scalar("system/state/login-banner", params::SYSTEM_LOGIN_BANNER),
            scalar("system/state/motd-banner", params::SYSTEM_MOTD_BANNER),
            scalar(
                "system/openflow/agent/state/datapath-id",
                params::OPENFLOW_DATAPATH_ID,
            ),
            converted(
                "system/openflow/agent/state/failure-mode",
                params::OPENFLOW_FAILURE_MODE,
                Converter::FailureMode,
            ),
            scalar(
                "system/openflow/agent/state/backoff-interval",
                params::OPENFLOW_BACKOFF_INTERVAL,
            ),
            scalar(
                "system/openflow/agent/state/max-backoff",
                params::OPENFLOW_MAX_BACKOFF,
            ),
            scalar(
                "system/openflow/agent/state/inactivity-probe",
                params::OPENFLOW_INACTIVITY_PROBE,
            ),
        ];

        let interfaces = Grid {
            path: Path::new("interfaces/interface/state"),
            table: params::INTERFACES,
            key_column: params::IF_KEY,
            columns: vec![
                GridColumn::plain("type", params::IF_TYPE),
                GridColumn::plain("mtu", params::IF_MTU),
                GridColumn::plain("loopback-mode", params::IF_LOOPBACK_MODE),
                GridColumn::plain("description", params::IF_DESCRIPTION),
                GridColumn::converted("enabled", params::IF_ENABLED, Converter::BoolIndicator),
                GridColumn::plain("ifindex", params::IF_IFINDEX),
                GridColumn::converted(
                    "admin-status",
                    params::IF_ADMIN_STATUS,
                    Converter::AdminState,
                ),
                GridColumn::converted(
                    "oper-status",
                    params::IF_OPER_STATUS,
                    Converter::OperState,
                ),
                GridColumn::converted(
                    "last-change",
                    params::IF_LAST_CHANGE,
                    Converter::EpochTimestamp,
                ),
                GridColumn::converted("logical", params::IF_LOGICAL, Converter::BoolIndicator),
                GridColumn::counter(
                    "counters/in-octets",
                    params::IF_IN_OCTETS,
                    RateKind::Bits,
                    params::IF_IN_BIT_RATE,
                ),
                GridColumn::plain("counters/in-pkts", params::IF_IN_PKTS),
                GridColumn::plain("counters/in-discards", params::IF_IN_DISCARDS),
                GridColumn::counter(
                    "counters/in-errors",
                    params::IF_IN_ERRORS,
                    RateKind::Errors,
                    params::IF_IN_ERROR_RATE,
                ),
                GridColumn::counter(
                    "counters/out-octets",
                    params::IF_OUT_OCTETS,
                    RateKind::Bits,
                    params::IF_OUT_BIT_RATE,
                ),
                GridColumn::plain("counters/out-pkts", params::IF_OUT_PKTS),
                GridColumn::plain("counters/out-discards", params::IF_OUT_DISCARDS),
                GridColumn::counter(
                    "counters/out-errors",
                    params::IF_OUT_ERRORS,
                    RateKind::Errors,
                    params::IF_OUT_ERROR_RATE,
                ),
                GridColumn::converted(
                    "counters/last-clear",
                    params::IF_LAST_CLEAR,
                    Converter::EpochTimestamp,
                ),
            ],
            derived: vec![DerivedColumn {
                target: params::IF_DISPLAY_KEY,
                convert: DerivedConverter::InterfaceKey {
                    description: params::IF_DESCRIPTION,
                },
            }],
        };

        Self {
            parameters,
            grids: vec![interfaces],
        }
    }

    /// Device path feeding the given standalone field, if mapped.
    #[must_use]
    pub fn path_for_field(&self, field: FieldId) -> Option<&Path> {
        self.parameters
            .iter()
            .find(|entry| entry.field == field)
            .map(|entry| &entry.path)
    }

    /// Paths of all standalone parameters, in registry order.
    #[must_use]
    pub fn parameter_paths(&self) -> Vec<Path> {
        self.parameters.iter().map(|e| e.path.clone()).collect()
    }
}

// ── Applier ──────────────────────────────────────────────────────────

/// Routes response values into storage, suppressing writes whose
/// converted value matches the last one written.
pub struct Applier {
    mapping: Mapping,
    storage: Arc<dyn Storage>,
    rates: RateTracker,
    written_fields: DashMap<FieldId, CellValue>,
    written_cells: DashMap<(FieldId, String), CellValue>,
}

impl Applier {
    pub fn new(mapping: Mapping, storage: Arc<dyn Storage>) -> Self {
        Self {
            mapping,
            storage,
            rates: RateTracker::new(),
            written_fields: DashMap::new(),
            written_cells: DashMap::new(),
        }
    }

    pub fn mapping(&self) -> &Mapping {
        &self.mapping
    }

    /// Apply a whole batch; a value that fails to decode does not
    /// abort its siblings.
    pub fn apply_all(&self, values: &[ResponseValue]) {
        for value in values {
            if let Err(e) = self.apply(value) {
                debug!(path = %value.path, error = %e, "dropping undecodable update");
            }
        }
    }

    /// Route one response value. Unmapped paths are ignored.
    pub fn apply(&self, value: &ResponseValue) -> Result<(), SyncError> {
        if let Some(entry) = self
            .mapping
            .parameters
            .iter()
            .find(|entry| entry.path == value.path)
        {
            self.apply_parameter(entry, value);
            return Ok(());
        }

        if let Some(grid) = self
            .mapping
            .grids
            .iter()
            .find(|grid| grid.path == value.path)
        {
            return self.apply_grid(grid, value);
        }

        debug!(path = %value.path, "no mapping for path");
        Ok(())
    }

    fn apply_parameter(&self, entry: &ParameterEntry, value: &ResponseValue) {
        let cell = match entry.convert {
            Some(converter) => converter.apply(value.value.as_ref()),
            None => raw_cell(value.value.as_ref()),
        };

        if self.field_changed(entry.field, &cell) {
            self.storage.set_field(entry.field, cell);
        }
    }

    fn apply_grid(&self, grid: &Grid, value: &ResponseValue) -> Result<(), SyncError> {
        let Some(TypedValue::Json(payload)) = &value.value else {
            // deletion or a shape we cannot use for rows
            return Ok(());
        };
        let entries: BTreeMap<String, BTreeMap<String, serde_json::Value>> =
            serde_json::from_value(payload.clone())
                .map_err(|e| SyncError::decode(value.path.as_str(), e))?;

        let mut rows = Vec::with_capacity(entries.len());
        for (pk, leaves) in &entries {
            let mut cells = BTreeMap::new();
            cells.insert(grid.key_column, CellValue::text(pk.clone()));
            for column in &grid.columns {
                let raw = leaves.get(column.leaf).map(json_value);
                let cell = match column.convert {
                    Some(converter) => converter.apply(raw.as_ref()),
                    None => raw_cell(raw.as_ref()),
                };

                if let (Some(rate), Some(raw)) = (column.rate, raw.as_ref()) {
                    let sample = RateSample::new(raw.render(), value.timestamp);
                    let computed = self.rates.observe(rate.target, pk, rate.kind, sample);
                    cells.insert(rate.target, computed);
                }
                cells.insert(column.column, cell);
            }
            for derived in &grid.derived {
                cells.insert(derived.target, derived.convert.apply(pk, &cells));
            }

            let changed: BTreeMap<FieldId, CellValue> = cells
                .into_iter()
                .filter(|(column, cell)| self.cell_changed(*column, pk, cell))
                .collect();
            if !changed.is_empty() {
                rows.push(Row {
                    key: pk.clone(),
                    cells: changed,
                });
            }
        }

        if !rows.is_empty() {
            self.storage.upsert_rows(grid.table, rows);
        }
        Ok(())
    }

    fn field_changed(&self, field: FieldId, cell: &CellValue) -> bool {
        match self.written_fields.insert(field, cell.clone()) {
            Some(previous) => previous != *cell,
            None => true,
        }
    }

    fn cell_changed(&self, column: FieldId, pk: &str, cell: &CellValue) -> bool {
        match self
            .written_cells
            .insert((column, pk.to_owned()), cell.clone())
        {
            Some(previous) => previous != *cell,
            None => true,
        }
    }
}

/// Pass-through projection for leaves without a dedicated converter.
fn raw_cell(raw: Option<&TypedValue>) -> CellValue {
    match raw {
        Some(TypedValue::String(s)) => CellValue::text(s.clone()),
        Some(TypedValue::Bool(b)) => CellValue::Int(i64::from(*b)),
        Some(TypedValue::Uint(u)) => i64::try_from(*u)
            .map_or_else(|_| CellValue::text(u.to_string()), CellValue::Int),
        Some(TypedValue::Int(i)) => CellValue::Int(*i),
        Some(TypedValue::Float(f)) => CellValue::Float(*f),
        Some(TypedValue::Json(j)) => CellValue::text(j.to_string()),
        None => CellValue::Int(convert::NOT_AVAILABLE),
    }
}

/// Lift a JSON leaf back into a typed value for conversion.
fn json_value(value: &serde_json::Value) -> TypedValue {
    match value {
        serde_json::Value::String(s) => TypedValue::String(s.clone()),
        serde_json::Value::Bool(b) => TypedValue::Bool(*b),
        serde_json::Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                TypedValue::Uint(u)
            } else if let Some(i) = n.as_i64() {
                TypedValue::Int(i)
            } else {
                TypedValue::Float(n.as_f64().unwrap_or_default())
            }
        }
        other => TypedValue::Json(other.clone()),
    }
}

// ── Tests ────────────────────────────────────────────────────────────
