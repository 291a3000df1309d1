// ── Subscription synchronization ──
//
// Keeps the subscribed-connection table aligned with an on-change
// stream using mark and sweep: updates upsert rows and mark their keys
// reported, and every sync marker deletes the known keys the stream
// did not re-report since the previous marker. Known keys are seeded
// from storage on startup so rows surviving a restart are still swept
// when the device no longer reports them.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use ocsync_api::{Path, ResponseValue, TypedValue};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::SyncError;
use crate::model::{self, ConnectionsSubscription};
use crate::params::ConnectionTable;
use crate::storage::Storage;

struct StreamState {
    /// Keys currently believed to exist on the device.
    known: HashSet<String>,
    /// Keys re-reported since the last sync marker.
    reported: HashSet<String>,
}

pub struct ConnectionStreamSync {
    storage: Arc<dyn Storage>,
    table: &'static ConnectionTable,
    path: Path,
    state: Mutex<StreamState>,
}

impl ConnectionStreamSync {
    pub fn new(storage: Arc<dyn Storage>, table: &'static ConnectionTable, path: Path) -> Self {
        Self {
            storage,
            table,
            path,
            state: Mutex::new(StreamState {
                known: HashSet::new(),
                reported: HashSet::new(),
            }),
        }
    }

    /// Seed the known set from the keys already in storage, so stale
    /// rows from before a restart are swept on the first marker.
    pub fn seed_known_keys(&self) {
        let keys: HashSet<String> = self
            .storage
            .read_column(self.table.table, self.table.key)
            .into_iter()
            .filter_map(|cell| cell.as_text().map(str::to_owned))
            .collect();
        if !keys.is_empty() {
            debug!(count = keys.len(), "seeded known connection keys");
        }
        if let Ok(mut state) = self.state.lock() {
            state.known = keys;
        }
    }

    /// Consume stream batches until the channel closes or `cancel`
    /// fires.
    pub async fn run(
        &self,
        mut rx: mpsc::Receiver<Vec<ResponseValue>>,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                batch = rx.recv() => {
                    let Some(batch) = batch else {
                        info!(path = %self.path, "subscription stream closed");
                        break;
                    };
                    self.handle_batch(&batch);
                }
            }
        }
    }

    /// Apply one stream batch: upsert reported connections, then sweep
    /// if the batch carries a sync marker.
    pub fn handle_batch(&self, batch: &[ResponseValue]) {
        let mut marker = false;
        for value in batch {
            if value.sync_marker {
                marker = true;
                continue;
            }
            if value.path != self.path {
                continue;
            }
            if let Err(e) = self.apply_update(value) {
                warn!(path = %value.path, error = %e, "dropping undecodable connection update");
            }
        }

        if marker {
            self.sweep();
        }
    }

    fn apply_update(&self, value: &ResponseValue) -> Result<(), SyncError> {
        let Some(TypedValue::Json(payload)) = &value.value else {
            return Ok(());
        };
        let update: ConnectionsSubscription = serde_json::from_value(payload.clone())
            .map_err(|e| SyncError::decode(value.path.as_str(), e))?;

        let mut rows = Vec::with_capacity(update.connections.len());
        let mut keys = Vec::with_capacity(update.connections.len());
        for connection in &update.connections {
            let pk = connection.aux_id.to_string();
            let Some(state) = connection.state.as_ref().or(connection.config.as_ref()) else {
                continue;
            };
            rows.push(model::connection_row(self.table, &pk, state));
            keys.push(pk);
        }

        if !rows.is_empty() {
            self.storage.upsert_rows(self.table.table, rows);
        }
        if let Ok(mut state) = self.state.lock() {
            for key in keys {
                state.known.insert(key.clone());
                state.reported.insert(key);
            }
        }
        Ok(())
    }

    /// Delete every known key the stream did not re-report since the
    /// previous marker, then start a fresh reporting window.
    fn sweep(&self) {
        let stale: Vec<String> = {
            let Ok(mut state) = self.state.lock() else {
                return;
            };
            let stale: Vec<String> = state
                .known
                .difference(&state.reported)
                .cloned()
                .collect();
            for key in &stale {
                state.known.remove(key);
            }
            state.reported.clear();
            stale
        };

        if !stale.is_empty() {
            info!(table = %self.table.table, count = stale.len(), "sweeping stale connections");
            self.storage.delete_rows(self.table.table, &stale);
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::params;
    use crate::storage::{CellValue, MemoryStorage, Row};
    use chrono::Utc;
    use serde_json::json;

    const PATH: &str = "system/openflow/controllers/controller[name=second]/connections";

    fn sync() -> (ConnectionStreamSync, Arc<MemoryStorage>) {
        let storage = Arc::new(MemoryStorage::new());
        let sync = ConnectionStreamSync::new(
            Arc::clone(&storage) as Arc<dyn Storage>,
            &params::CONNECTIONS_SUBSCRIBED,
            Path::new(PATH),
        );
        (sync, storage)
    }

    fn update(aux_ids: &[i64]) -> ResponseValue {
        let connections: Vec<serde_json::Value> = aux_ids
            .iter()
            .map(|id| {
                json!({
                    "aux-id": id,
                    "state": {
                        "aux-id": id,
                        "address": "10.0.0.1",
                        "port": 6653,
                        "connected": true,
                        "transport": "TCP"
                    }
                })
            })
            .collect();
        ResponseValue::new(
            Path::new(PATH),
            TypedValue::Json(json!({ "openconfig-openflow:connection": connections })),
            Utc::now(),
        )
    }

    fn marker() -> ResponseValue {
        ResponseValue::sync_marker(Utc::now())
    }

    fn keys(storage: &MemoryStorage) -> Vec<String> {
        storage
            .rows_snapshot(params::CONNECTIONS_SUBSCRIBED.table)
            .iter()
            .map(|r| r.key.clone())
            .collect()
    }

    #[test]
    fn updates_upsert_rows_with_display_key() {
        let (sync, storage) = sync();
        sync.handle_batch(&[update(&[0, 3])]);

        assert_eq!(keys(&storage), vec!["0", "3"]);
        let rows = storage.rows_snapshot(params::CONNECTIONS_SUBSCRIBED.table);
        assert_eq!(
            rows[0].cell(params::CONNECTIONS_SUBSCRIBED.display_key),
            Some(&CellValue::text("Main-10.0.0.1:6653"))
        );
        assert_eq!(
            rows[1].cell(params::CONNECTIONS_SUBSCRIBED.display_key),
            Some(&CellValue::text("3-10.0.0.1:6653"))
        );
    }

    #[test]
    fn marker_sweeps_keys_not_reported_in_the_window() {
        let (sync, storage) = sync();
        sync.handle_batch(&[update(&[0, 1, 2]), marker()]);
        assert_eq!(keys(&storage), vec!["0", "1", "2"]);

        // next window only re-reports 0 and 2
        sync.handle_batch(&[update(&[0, 2]), marker()]);
        assert_eq!(keys(&storage), vec!["0", "2"]);
    }

    #[test]
    fn marker_without_updates_sweeps_everything() {
        let (sync, storage) = sync();
        sync.handle_batch(&[update(&[0, 1]), marker()]);
        sync.handle_batch(&[marker()]);
        assert!(keys(&storage).is_empty());
    }

    #[test]
    fn no_sweep_without_marker() {
        let (sync, storage) = sync();
        sync.handle_batch(&[update(&[0, 1]), marker()]);
        sync.handle_batch(&[update(&[0])]);
        // key 1 survives until the next marker closes the window
        assert_eq!(keys(&storage), vec!["0", "1"]);

        sync.handle_batch(&[marker()]);
        assert_eq!(keys(&storage), vec!["0"]);
    }

    #[test]
    fn seeded_keys_are_swept_on_first_marker() {
        let (sync, storage) = sync();
        // a row left over from before a restart
        let leftover = Row::new("9").with_cell(
            params::CONNECTIONS_SUBSCRIBED.key,
            CellValue::text("9"),
        );
        storage.replace_rows(params::CONNECTIONS_SUBSCRIBED.table, vec![leftover]);

        sync.seed_known_keys();
        sync.handle_batch(&[update(&[0]), marker()]);
        assert_eq!(keys(&storage), vec!["0"]);
    }

    #[test]
    fn updates_for_other_paths_are_ignored() {
        let (sync, storage) = sync();
        let stray = ResponseValue::new(
            Path::new("interfaces/interface/state"),
            TypedValue::Json(json!({})),
            Utc::now(),
        );
        sync.handle_batch(&[stray]);
        assert!(keys(&storage).is_empty());
    }
}
