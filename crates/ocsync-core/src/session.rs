// ── Session management ──
//
// Owns the one client per data source and hands out a connected handle
// on demand. Connecting is single-flight: while one caller is inside
// the connect path, concurrent callers are told to come back later
// instead of queueing behind the attempt.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ocsync_api::{ClientFactory, DataSourceConfig, TelemetryClient};
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use crate::error::SyncError;
use crate::params;
use crate::storage::{CellValue, Storage};

/// Coarse lifecycle of the managed session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

struct SessionInner {
    client: Option<Arc<dyn TelemetryClient>>,
    applied: Option<DataSourceConfig>,
}

/// Clears the connecting flag on every exit path of the connect
/// attempt, including early returns on error.
struct ConnectGuard<'a>(&'a AtomicBool);

impl Drop for ConnectGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct Session {
    factory: Box<dyn ClientFactory>,
    storage: Arc<dyn Storage>,
    inner: Mutex<SessionInner>,
    connecting: AtomicBool,
    state: watch::Sender<SessionState>,
}

impl Session {
    pub fn new(factory: Box<dyn ClientFactory>, storage: Arc<dyn Storage>) -> Self {
        Self {
            factory,
            storage,
            inner: Mutex::new(SessionInner {
                client: None,
                applied: None,
            }),
            connecting: AtomicBool::new(false),
            state: watch::Sender::new(SessionState::Disconnected),
        }
    }

    /// True while a connect attempt is in flight somewhere.
    pub fn is_connecting(&self) -> bool {
        self.connecting.load(Ordering::Acquire)
    }

    /// Observe lifecycle transitions.
    pub fn state(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// The current client if one has already been built and is
    /// connected; never triggers a connect.
    pub async fn current(&self) -> Option<Arc<dyn TelemetryClient>> {
        let inner = self.inner.lock().await;
        inner
            .client
            .as_ref()
            .filter(|client| client.is_connected())
            .map(Arc::clone)
    }

    /// Hand out a connected client for `config`, connecting or
    /// reconfiguring as needed.
    ///
    /// Returns `Ok(None)` when another caller is already connecting;
    /// the caller is expected to retry on its next cycle rather than
    /// wait.
    pub async fn try_acquire(
        &self,
        config: &DataSourceConfig,
    ) -> Result<Option<Arc<dyn TelemetryClient>>, SyncError> {
        if self.connecting.swap(true, Ordering::AcqRel) {
            debug!("connect already in flight, skipping");
            return Ok(None);
        }
        let _guard = ConnectGuard(&self.connecting);

        let mut inner = self.inner.lock().await;

        let fresh = match inner.client.as_ref() {
            Some(_) => false,
            None => {
                let client = self.factory.build(config)?;
                self.watch_connectivity(&client);
                inner.client = Some(client);
                inner.applied = Some(config.clone());
                true
            }
        };
        // the arm above just filled it in
        let Some(client) = inner.client.as_ref().map(Arc::clone) else {
            return Err(SyncError::Transport(ocsync_api::Error::NotConnected));
        };

        if !fresh && inner.applied.as_ref() != Some(config) {
            info!(address = %config.address, port = config.port, "configuration drift, reconfiguring client");
            client.change_configuration(config).await?;
            inner.applied = Some(config.clone());
        }

        if !client.is_connected() {
            self.state.send_replace(SessionState::Connecting);
            if let Err(e) = client.connect().await {
                warn!(error = %e, transient = e.is_transient(), "connect failed");
                self.state.send_replace(SessionState::Disconnected);
                return Err(e.into());
            }
        }

        self.state.send_if_modified(|state| {
            if *state == SessionState::Connected {
                false
            } else {
                *state = SessionState::Connected;
                true
            }
        });
        Ok(Some(client))
    }

    /// Drop the client so the next acquire rebuilds from scratch.
    pub async fn reset(&self) {
        let mut inner = self.inner.lock().await;
        inner.client = None;
        inner.applied = None;
        self.state.send_replace(SessionState::Disconnected);
        self.storage
            .set_field(params::CONNECTION_STATE, CellValue::Int(0));
    }

    /// Mirror the client's connectivity into storage. Spawned once
    /// per built client; writes only on an actual change against the
    /// persisted value and ends when the client goes away.
    fn watch_connectivity(&self, client: &Arc<dyn TelemetryClient>) {
        let mut events = client.connection_events();
        let storage = Arc::clone(&self.storage);
        let state = self.state.clone();

        tokio::spawn(async move {
            loop {
                let connected = *events.borrow_and_update();
                let cell = CellValue::Int(i64::from(connected));
                if storage.read_field(params::CONNECTION_STATE) != Some(cell.clone()) {
                    storage.set_field(params::CONNECTION_STATE, cell);
                }
                if !connected {
                    state.send_replace(SessionState::Disconnected);
                }
                if events.changed().await.is_err() {
                    break;
                }
            }
        });
    }
}

// ── Tests ────────────────────────────────────────────────────────────
