// ── Collector ──
//
// Top-level orchestration for one data source: owns the session, the
// poll cadence, and the long-lived subscription streams. A poll tick
// that finds a connect already in flight skips its cycle instead of
// piling up behind it; individual poll groups fail independently so a
// bad subtree does not starve the others.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use ocsync_api::{ClientFactory, DataSourceConfig, Path, SubscribeRequest, TelemetryClient, TypedValue};
use secrecy::SecretString;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::capabilities::CapabilitySync;
use crate::config::CollectorConfig;
use crate::error::SyncError;
use crate::mapping::{Applier, Mapping};
use crate::params;
use crate::poll::PollSync;
use crate::session::{Session, SessionState};
use crate::storage::{CellValue, FieldId, Storage};
use crate::subscribe::ConnectionStreamSync;

/// On-change subtree feeding the subscribed-connection table.
const SUBSCRIBED_CONNECTIONS_PATH: &str =
    "system/openflow/controllers/controller[name=second]/connections";

pub struct Collector {
    config: CollectorConfig,
    storage: Arc<dyn Storage>,
    session: Arc<Session>,
    applier: Arc<Applier>,
    poll: Arc<PollSync>,
    caps: CapabilitySync,
    connections: Arc<ConnectionStreamSync>,
    connections_active: Arc<AtomicBool>,
    interfaces_active: Arc<AtomicBool>,
    datetime_active: Arc<AtomicBool>,
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Collector {
    pub fn new(
        factory: Box<dyn ClientFactory>,
        storage: Arc<dyn Storage>,
        config: CollectorConfig,
    ) -> Self {
        let applier = Arc::new(Applier::new(Mapping::standard(), Arc::clone(&storage)));
        let poll = Arc::new(PollSync::new(Arc::clone(&applier), Arc::clone(&storage)));
        let session = Arc::new(Session::new(factory, Arc::clone(&storage)));
        let caps = CapabilitySync::new(Arc::clone(&storage));
        let connections = Arc::new(ConnectionStreamSync::new(
            Arc::clone(&storage),
            &params::CONNECTIONS_SUBSCRIBED,
            Path::new(SUBSCRIBED_CONNECTIONS_PATH),
        ));

        Self {
            config,
            storage,
            session,
            applier,
            poll,
            caps,
            connections,
            connections_active: Arc::new(AtomicBool::new(false)),
            interfaces_active: Arc::new(AtomicBool::new(false)),
            datetime_active: Arc::new(AtomicBool::new(false)),
            cancel: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Spawn the poll loop. Subscriptions are established lazily on
    /// the first cycle that gets a connected client.
    pub fn start(self: Arc<Self>) {
        self.connections.seed_known_keys();

        let collector = Arc::clone(&self);
        let cancel = self.cancel.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(collector.config.poll_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    _ = ticker.tick() => collector.poll_cycle().await,
                }
            }
        });
        self.track(handle);
        info!(interval = ?self.config.poll_interval, "collector started");
    }

    /// One poll cycle: acquire, subscribe if needed, then run each
    /// poll group with its errors isolated.
    async fn poll_cycle(&self) {
        let device = self.device_config();
        let client = match self.session.try_acquire(&device).await {
            Ok(Some(client)) => client,
            Ok(None) => {
                debug!("connect in flight, skipping poll cycle");
                return;
            }
            Err(e) => {
                warn!(error = %e, "could not acquire a session");
                return;
            }
        };

        self.ensure_subscribed(&client).await;

        if let Err(e) = self.reconcile_capabilities(&client).await {
            warn!(error = %e, "capability reconciliation failed");
        }
        if let Err(e) = self.poll.poll_parameters(&client).await {
            warn!(error = %e, "parameter poll failed");
        }
        if let Err(e) = self.poll.poll_connections(&client).await {
            warn!(error = %e, "connection poll failed");
        }
    }

    /// Establish the subscription streams. Each stream carries its
    /// own active flag, so losing one is re-established on the next
    /// cycle without touching the others.
    async fn ensure_subscribed(&self, client: &Arc<dyn TelemetryClient>) {
        self.ensure_connection_stream(client).await;
        self.ensure_applied_stream(
            client,
            &self.interfaces_active,
            SubscribeRequest::sampled(
                "interface-counters",
                self.config.sample_interval,
                vec![Path::new("interfaces/interface/state")],
            ),
        )
        .await;
        self.ensure_applied_stream(
            client,
            &self.datetime_active,
            SubscribeRequest::on_change(
                "system-datetime",
                vec![Path::new("system/state/current-datetime")],
            ),
        )
        .await;
    }

    async fn ensure_connection_stream(&self, client: &Arc<dyn TelemetryClient>) {
        if self.connections_active.swap(true, Ordering::AcqRel) {
            return;
        }
        let on_change = SubscribeRequest::on_change(
            "controller-connections",
            vec![Path::new(SUBSCRIBED_CONNECTIONS_PATH)],
        );
        match client.subscribe(on_change).await {
            Ok(rx) => {
                let connections = Arc::clone(&self.connections);
                let active = Arc::clone(&self.connections_active);
                let cancel = self.cancel.child_token();
                self.track(tokio::spawn(async move {
                    connections.run(rx, cancel).await;
                    active.store(false, Ordering::Release);
                }));
            }
            Err(e) => {
                warn!(error = %e, "connection subscription failed");
                self.connections_active.store(false, Ordering::Release);
            }
        }
    }

    /// Establish a stream whose batches feed straight through the
    /// value applier.
    async fn ensure_applied_stream(
        &self,
        client: &Arc<dyn TelemetryClient>,
        active: &Arc<AtomicBool>,
        request: SubscribeRequest,
    ) {
        if active.swap(true, Ordering::AcqRel) {
            return;
        }
        let stream = request.stream.clone();
        match client.subscribe(request).await {
            Ok(mut rx) => {
                let applier = Arc::clone(&self.applier);
                let active = Arc::clone(active);
                let cancel = self.cancel.child_token();
                self.track(tokio::spawn(async move {
                    loop {
                        tokio::select! {
                            biased;
                            () = cancel.cancelled() => break,
                            batch = rx.recv() => {
                                let Some(batch) = batch else {
                                    info!(stream, "update stream closed");
                                    break;
                                };
                                applier.apply_all(&batch);
                            }
                        }
                    }
                    active.store(false, Ordering::Release);
                }));
            }
            Err(e) => {
                warn!(error = %e, stream, "subscription failed");
                active.store(false, Ordering::Release);
            }
        }
    }

    async fn reconcile_capabilities(
        &self,
        client: &Arc<dyn TelemetryClient>,
    ) -> Result<(), SyncError> {
        if let Some(caps) = client.capabilities().await? {
            self.caps.reconcile(&caps);
        }
        Ok(())
    }

    /// Push a writable value to the device through the current
    /// session.
    pub async fn write_value(&self, field: FieldId, value: TypedValue) -> Result<(), SyncError> {
        let client = self
            .session
            .current()
            .await
            .ok_or(SyncError::Transport(ocsync_api::Error::NotConnected))?;
        self.poll.write_value(&client, field, value).await
    }

    /// Force one poll cycle outside the regular cadence.
    pub async fn poll_now(&self) {
        self.poll_cycle().await;
    }

    /// Observe session lifecycle transitions.
    pub fn session_state(&self) -> tokio::sync::watch::Receiver<SessionState> {
        self.session.state()
    }

    /// Data-source settings as currently held in storage.
    fn device_config(&self) -> DataSourceConfig {
        let text = |field: FieldId| match self.storage.read_field(field) {
            Some(CellValue::Text(s)) => s,
            Some(other) => other.to_string(),
            None => String::new(),
        };
        let port = self
            .storage
            .read_field(params::DATA_SOURCE_PORT)
            .and_then(|cell| cell.as_int())
            .and_then(|p| u16::try_from(p).ok())
            .unwrap_or_else(|| DataSourceConfig::default().port);
        let certificate = match self.storage.read_field(params::CLIENT_CERTIFICATE) {
            Some(CellValue::Text(s)) if !s.is_empty() => Some(s),
            _ => None,
        };

        DataSourceConfig {
            address: text(params::DATA_SOURCE_ADDRESS),
            port,
            username: text(params::DATA_SOURCE_USERNAME),
            password: SecretString::from(text(params::DATA_SOURCE_PASSWORD)),
            client_certificate: certificate,
        }
    }

    fn track(&self, handle: JoinHandle<()>) {
        if let Ok(mut tasks) = self.tasks.lock() {
            tasks.push(handle);
        }
    }

    /// Stop every spawned task and wait for them to finish.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let handles: Vec<JoinHandle<()>> = match self.tasks.lock() {
            Ok(mut tasks) => tasks.drain(..).collect(),
            Err(_) => Vec::new(),
        };
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "collector task ended abnormally");
            }
        }
        self.session.reset().await;
        info!("collector stopped");
    }
}

// ── Tests ────────────────────────────────────────────────────────────
