// ── Poll synchronization ──
//
// On-demand reads: the standalone parameter sweep, the positional
// controller-connection snapshot, and single writable-value round
// trips. Each cycle is idempotent against unchanged device state via
// the applier's write suppression; the connection snapshot replaces
// its table wholesale.

use std::sync::Arc;

use ocsync_api::{Path, TelemetryClient, TypedValue};
use tracing::debug;

use crate::error::SyncError;
use crate::mapping::Applier;
use crate::model::{self, ConnectionsPoll};
use crate::params;
use crate::storage::{FieldId, Storage};

/// Subtree queried for the polled connection snapshot.
const CONNECTIONS_PATH: &str =
    "system/openflow/controllers/controller[name=main]/connections/connection";

pub struct PollSync {
    applier: Arc<Applier>,
    storage: Arc<dyn Storage>,
}

impl PollSync {
    pub fn new(applier: Arc<Applier>, storage: Arc<dyn Storage>) -> Self {
        Self { applier, storage }
    }

    /// One sweep over every mapped standalone parameter.
    pub async fn poll_parameters(&self, client: &Arc<dyn TelemetryClient>) -> Result<(), SyncError> {
        let paths = self.applier.mapping().parameter_paths();
        let values = client.get(&paths).await?;
        self.applier.apply_all(&values);
        Ok(())
    }

    /// Snapshot the controller connections and replace the polled
    /// table with whatever the device reports right now.
    pub async fn poll_connections(&self, client: &Arc<dyn TelemetryClient>) -> Result<(), SyncError> {
        let path = Path::new(CONNECTIONS_PATH);
        let values = client.get(std::slice::from_ref(&path)).await?;

        let mut rows = Vec::new();
        for value in &values {
            let Some(TypedValue::Json(payload)) = &value.value else {
                continue;
            };
            let poll: ConnectionsPoll = serde_json::from_value(payload.clone())
                .map_err(|e| SyncError::decode(value.path.as_str(), e))?;
            let Some(indexed) = poll.connection else {
                continue;
            };
            for (pk, connection) in [("0", indexed.main), ("1", indexed.second)] {
                let Some(connection) = connection else {
                    continue;
                };
                let Some(state) = connection.state.or(connection.config) else {
                    debug!(pk, "connection entry without state, skipping");
                    continue;
                };
                rows.push(model::connection_row(
                    &params::CONNECTIONS_POLLED,
                    pk,
                    &state,
                ));
            }
        }

        self.storage.replace_rows(params::CONNECTIONS_POLLED.table, rows);
        Ok(())
    }

    /// Push one value to the device and read it back so storage
    /// reflects what the device accepted rather than what was sent.
    pub async fn write_value(
        &self,
        client: &Arc<dyn TelemetryClient>,
        field: FieldId,
        value: TypedValue,
    ) -> Result<(), SyncError> {
        let path = self
            .applier
            .mapping()
            .path_for_field(field)
            .cloned()
            .ok_or(SyncError::NotMapped { field })?;

        client.set(&path, value).await?;
        let confirmed = client.get(std::slice::from_ref(&path)).await?;
        self.applier.apply_all(&confirmed);
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────────
