// ── Monitoring-backend boundary ──
//
// Scalar fields and row-oriented tables, consumed through the
// `Storage` trait. The engine never talks to a concrete backend;
// `MemoryStorage` is the in-process implementation used by tests and
// embedders that keep state local.

use std::collections::BTreeMap;
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

// ── Identifiers ──────────────────────────────────────────────────────

/// Stable identifier of one scalar field or table column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldId(pub u32);

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable identifier of one table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableId(pub u32);

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── CellValue ────────────────────────────────────────────────────────

/// A monitoring-native value held in a field or table cell.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Int(i64),
    Float(f64),
    Date(DateTime<Utc>),
}

impl CellValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Date(d) => write!(f, "{}", d.to_rfc3339()),
        }
    }
}

// ── Row ──────────────────────────────────────────────────────────────

/// One table row: a stable string key plus typed cells by column.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub key: String,
    pub cells: BTreeMap<FieldId, CellValue>,
}

impl Row {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            cells: BTreeMap::new(),
        }
    }

    pub fn with_cell(mut self, column: FieldId, value: CellValue) -> Self {
        self.cells.insert(column, value);
        self
    }

    pub fn set_cell(&mut self, column: FieldId, value: CellValue) {
        self.cells.insert(column, value);
    }

    pub fn cell(&self, column: FieldId) -> Option<&CellValue> {
        self.cells.get(&column)
    }
}

// ── Storage trait ────────────────────────────────────────────────────

/// The parameter/table API exposed by the monitoring backend.
///
/// All operations are in-process and non-blocking — no network I/O is
/// permitted behind this trait, so callers may hold short mutexes
/// across these calls.
pub trait Storage: Send + Sync {
    fn set_field(&self, id: FieldId, value: CellValue);

    /// Batched scalar write; logically related fields are applied
    /// atomically with respect to readers.
    fn set_fields(&self, writes: &[(FieldId, CellValue)]);

    fn read_field(&self, id: FieldId) -> Option<CellValue>;

    /// Full-replace: discards all prior rows and installs the new set.
    fn replace_rows(&self, table: TableId, rows: Vec<Row>);

    /// Upsert: inserts new rows and merges cells into existing ones.
    /// Never deletes rows or cells; callers may send partial rows.
    fn upsert_rows(&self, table: TableId, rows: Vec<Row>);

    fn delete_rows(&self, table: TableId, keys: &[String]);

    /// Values of one column across all rows, in unspecified order.
    /// Rows without the column are skipped.
    fn read_column(&self, table: TableId, column: FieldId) -> Vec<CellValue>;
}

// ── MemoryStorage ────────────────────────────────────────────────────

/// Concurrent in-memory backend.
///
/// Fields live in a `DashMap`; each table keeps its rows in a
/// `DashMap` and rebuilds a snapshot broadcast through a `watch`
/// channel on every mutation, so consumers can observe table changes
/// reactively.
#[derive(Default)]
pub struct MemoryStorage {
    fields: DashMap<FieldId, CellValue>,
    tables: DashMap<TableId, Arc<TableState>>,
}

struct TableState {
    rows: DashMap<String, Row>,
    snapshot: watch::Sender<Arc<Vec<Row>>>,
}

impl TableState {
    fn new() -> Self {
        let (snapshot, _) = watch::channel(Arc::new(Vec::new()));
        Self {
            rows: DashMap::new(),
            snapshot,
        }
    }

    /// Collect all rows into a snapshot vec, ordered by key for
    /// deterministic observation, and broadcast it.
    fn rebuild_snapshot(&self) {
        let mut rows: Vec<Row> = self.rows.iter().map(|r| r.value().clone()).collect();
        rows.sort_by(|a, b| a.key.cmp(&b.key));
        self.snapshot.send_modify(|snap| *snap = Arc::new(rows));
    }
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self, id: TableId) -> Arc<TableState> {
        self.tables
            .entry(id)
            .or_insert_with(|| Arc::new(TableState::new()))
            .clone()
    }

    /// Current snapshot of a table, keyed order.
    pub fn rows_snapshot(&self, table: TableId) -> Arc<Vec<Row>> {
        self.table(table).snapshot.borrow().clone()
    }

    pub fn row_count(&self, table: TableId) -> usize {
        self.table(table).rows.len()
    }

    /// Subscribe to table snapshot changes.
    pub fn subscribe_rows(&self, table: TableId) -> RowStream {
        RowStream::new(self.table(table).snapshot.subscribe())
    }
}

impl Storage for MemoryStorage {
    fn set_field(&self, id: FieldId, value: CellValue) {
        self.fields.insert(id, value);
    }

    fn set_fields(&self, writes: &[(FieldId, CellValue)]) {
        for (id, value) in writes {
            self.fields.insert(*id, value.clone());
        }
    }

    fn read_field(&self, id: FieldId) -> Option<CellValue> {
        self.fields.get(&id).map(|v| v.clone())
    }

    fn replace_rows(&self, table: TableId, rows: Vec<Row>) {
        let state = self.table(table);
        state.rows.clear();
        for row in rows {
            state.rows.insert(row.key.clone(), row);
        }
        state.rebuild_snapshot();
    }

    fn upsert_rows(&self, table: TableId, rows: Vec<Row>) {
        if rows.is_empty() {
            return;
        }
        let state = self.table(table);
        for row in rows {
            if let Some(mut existing) = state.rows.get_mut(&row.key) {
                for (column, value) in row.cells {
                    existing.set_cell(column, value);
                }
            } else {
                state.rows.insert(row.key.clone(), row);
            }
        }
        state.rebuild_snapshot();
    }

    fn delete_rows(&self, table: TableId, keys: &[String]) {
        if keys.is_empty() {
            return;
        }
        let state = self.table(table);
        for key in keys {
            state.rows.remove(key);
        }
        state.rebuild_snapshot();
    }

    fn read_column(&self, table: TableId, column: FieldId) -> Vec<CellValue> {
        let state = self.table(table);
        state
            .rows
            .iter()
            .filter_map(|r| r.value().cell(column).cloned())
            .collect()
    }
}

// ── RowStream ────────────────────────────────────────────────────────

/// A subscription to one table's snapshots.
///
/// Provides both `changed()` await-style consumption and conversion
/// into a `Stream` for combinator use.
pub struct RowStream {
    receiver: watch::Receiver<Arc<Vec<Row>>>,
}

impl RowStream {
    fn new(receiver: watch::Receiver<Arc<Vec<Row>>>) -> Self {
        Self { receiver }
    }

    /// Latest snapshot (cheap `Arc` clone).
    pub fn latest(&self) -> Arc<Vec<Row>> {
        self.receiver.borrow().clone()
    }

    /// Wait for the next change, returning the new snapshot.
    /// Returns `None` when the storage has been dropped.
    pub async fn changed(&mut self) -> Option<Arc<Vec<Row>>> {
        self.receiver.changed().await.ok()?;
        Some(self.receiver.borrow_and_update().clone())
    }

    pub fn into_stream(self) -> RowWatchStream {
        RowWatchStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` adapter backed by the table's `watch::Receiver`.
pub struct RowWatchStream {
    inner: WatchStream<Arc<Vec<Row>>>,
}

impl Stream for RowWatchStream {
    type Item = Arc<Vec<Row>>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

// ── Tests ────────────────────────────────────────────────────────────
