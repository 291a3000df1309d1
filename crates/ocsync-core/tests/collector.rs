// End-to-end collector flow against a scripted in-process client:
// connect, capability reconciliation, parameter and connection polls,
// and the two subscription streams feeding tables.

#![allow(clippy::unwrap_used)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use ocsync_api::{
    Capabilities, DataSourceConfig, Encoding, Error, Path, ResponseValue, SubscribeRequest,
    TelemetryClient, TypedValue,
};
use ocsync_core::{params, CellValue, Collector, CollectorConfig, MemoryStorage, Storage};
use serde_json::json;
use tokio::sync::{mpsc, watch};

// ── Scripted client ──────────────────────────────────────────────────

struct MockClient {
    connected: watch::Sender<bool>,
    responses: Mutex<HashMap<String, serde_json::Value>>,
    streams: Mutex<HashMap<String, mpsc::Sender<Vec<ResponseValue>>>>,
    subscribe_count: AtomicUsize,
    caps: Option<Capabilities>,
}

impl MockClient {
    fn new(responses: HashMap<String, serde_json::Value>, caps: Option<Capabilities>) -> Self {
        Self {
            connected: watch::Sender::new(false),
            responses: Mutex::new(responses),
            streams: Mutex::new(HashMap::new()),
            subscribe_count: AtomicUsize::new(0),
            caps,
        }
    }

    /// Push one batch into a previously opened stream.
    async fn push(&self, stream: &str, batch: Vec<ResponseValue>) {
        let tx = self
            .streams
            .lock()
            .unwrap()
            .get(stream)
            .cloned()
            .unwrap_or_else(|| panic!("no stream named {stream}"));
        tx.send(batch).await.unwrap();
    }

    fn close_stream(&self, stream: &str) {
        self.streams.lock().unwrap().remove(stream);
    }
}

#[async_trait]
impl TelemetryClient for MockClient {
    async fn connect(&self) -> Result<(), Error> {
        self.connected.send_replace(true);
        Ok(())
    }

    async fn change_configuration(&self, _config: &DataSourceConfig) -> Result<(), Error> {
        Ok(())
    }

    async fn capabilities(&self) -> Result<Option<Capabilities>, Error> {
        Ok(self.caps.clone())
    }

    async fn get(&self, paths: &[Path]) -> Result<Vec<ResponseValue>, Error> {
        let responses = self.responses.lock().unwrap();
        Ok(paths
            .iter()
            .filter_map(|p| {
                responses.get(p.as_str()).map(|payload| {
                    let value = match payload {
                        serde_json::Value::String(s) => TypedValue::String(s.clone()),
                        other => TypedValue::Json(other.clone()),
                    };
                    ResponseValue::new(p.clone(), value, Utc::now())
                })
            })
            .collect())
    }

    async fn set(&self, path: &Path, value: TypedValue) -> Result<(), Error> {
        self.responses
            .lock()
            .unwrap()
            .insert(path.as_str().to_owned(), json!(value.render()));
        Ok(())
    }

    async fn subscribe(
        &self,
        request: SubscribeRequest,
    ) -> Result<mpsc::Receiver<Vec<ResponseValue>>, Error> {
        self.subscribe_count.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::channel(8);
        self.streams.lock().unwrap().insert(request.stream, tx);
        Ok(rx)
    }

    fn is_connected(&self) -> bool {
        *self.connected.borrow()
    }

    fn connection_events(&self) -> watch::Receiver<bool> {
        self.connected.subscribe()
    }
}

// ── Helpers ──────────────────────────────────────────────────────────

const SUBSCRIBED_PATH: &str =
    "system/openflow/controllers/controller[name=second]/connections";

fn scripted_responses() -> HashMap<String, serde_json::Value> {
    HashMap::from([
        (
            "system/state/login-banner".to_owned(),
            json!("authorized access only"),
        ),
        (
            "system/openflow/agent/state/failure-mode".to_owned(),
            json!("SECURE"),
        ),
        (
            "system/openflow/controllers/controller[name=main]/connections/connection"
                .to_owned(),
            json!({
                "connection": {
                    "0": {
                        "aux-id": 0,
                        "state": {
                            "aux-id": 0,
                            "address": "10.0.0.1",
                            "port": 830,
                            "connected": true,
                            "transport": "TLS"
                        }
                    }
                }
            }),
        ),
    ])
}

fn caps() -> Capabilities {
    Capabilities {
        protocol_version: "0.7.0".to_owned(),
        supported_encodings: vec![Encoding::Json],
        supported_models: Vec::new(),
    }
}

fn connection_update(aux_ids: &[i64]) -> ResponseValue {
    let connections: Vec<serde_json::Value> = aux_ids
        .iter()
        .map(|id| {
            json!({
                "aux-id": id,
                "state": {
                    "aux-id": id,
                    "address": "10.0.0.2",
                    "port": 6653,
                    "connected": true,
                    "transport": "TCP"
                }
            })
        })
        .collect();
    ResponseValue::new(
        Path::new(SUBSCRIBED_PATH),
        TypedValue::Json(json!({ "openconfig-openflow:connection": connections })),
        Utc::now(),
    )
}

fn harness(
    client: Arc<MockClient>,
) -> (Arc<Collector>, Arc<MemoryStorage>) {
    let storage = Arc::new(MemoryStorage::new());
    storage.set_field(params::DATA_SOURCE_ADDRESS, CellValue::text("10.9.9.9"));
    storage.set_field(params::DATA_SOURCE_PORT, CellValue::Int(9339));
    storage.set_field(params::DATA_SOURCE_USERNAME, CellValue::text("monitor"));
    storage.set_field(params::DATA_SOURCE_PASSWORD, CellValue::text("secret"));

    let factory = move |_config: &DataSourceConfig| -> Result<Arc<dyn TelemetryClient>, Error> {
        Ok(Arc::clone(&client) as Arc<dyn TelemetryClient>)
    };
    let collector = Arc::new(Collector::new(
        Box::new(factory),
        Arc::clone(&storage) as Arc<dyn Storage>,
        CollectorConfig::default(),
    ));
    (collector, storage)
}

/// Poll until `check` passes or the deadline expires.
async fn wait_for(mut check: impl FnMut() -> bool) {
    for _ in 0..200 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

// ── Tests ────────────────────────────────────────────────────────────

#[tokio::test]
async fn poll_cycle_fills_fields_and_tables() {
    init_tracing();
    let client = Arc::new(MockClient::new(scripted_responses(), Some(caps())));
    let (collector, storage) = harness(Arc::clone(&client));

    collector.poll_now().await;

    assert_eq!(
        storage.read_field(params::SYSTEM_LOGIN_BANNER),
        Some(CellValue::text("authorized access only"))
    );
    assert_eq!(
        storage.read_field(params::OPENFLOW_FAILURE_MODE),
        Some(CellValue::Int(1))
    );
    assert_eq!(
        storage.read_field(params::PROTOCOL_VERSION),
        Some(CellValue::text("0.7.0"))
    );
    assert_eq!(
        storage.read_field(params::ENCODING_JSON),
        Some(CellValue::Int(1))
    );

    let polled = storage.rows_snapshot(params::CONNECTIONS_POLLED.table);
    assert_eq!(polled.len(), 1);
    assert_eq!(
        polled[0].cell(params::CONNECTIONS_POLLED.display_key),
        Some(&CellValue::text("Main-10.0.0.1:830"))
    );

    collector.shutdown().await;
}

#[tokio::test]
async fn subscription_stream_upserts_and_sweeps() {
    init_tracing();
    let client = Arc::new(MockClient::new(scripted_responses(), None));
    let (collector, storage) = harness(Arc::clone(&client));

    collector.poll_now().await;

    client
        .push(
            "controller-connections",
            vec![
                connection_update(&[0, 1]),
                ResponseValue::sync_marker(Utc::now()),
            ],
        )
        .await;
    wait_for(|| storage.rows_snapshot(params::CONNECTIONS_SUBSCRIBED.table).len() == 2).await;

    // second window drops aux-id 1
    client
        .push(
            "controller-connections",
            vec![
                connection_update(&[0]),
                ResponseValue::sync_marker(Utc::now()),
            ],
        )
        .await;
    wait_for(|| {
        let rows = storage.rows_snapshot(params::CONNECTIONS_SUBSCRIBED.table);
        rows.len() == 1 && rows[0].key == "0"
    })
    .await;

    collector.shutdown().await;
}

#[tokio::test]
async fn sampled_stream_feeds_interface_rates() {
    init_tracing();
    let client = Arc::new(MockClient::new(scripted_responses(), None));
    let (collector, storage) = harness(Arc::clone(&client));

    collector.poll_now().await;

    let sample = |octets: u64, secs: i64| {
        ResponseValue::new(
            Path::new("interfaces/interface/state"),
            TypedValue::Json(json!({
                "eth0": { "oper-status": "UP", "counters/in-octets": octets }
            })),
            chrono::DateTime::from_timestamp(secs, 0).unwrap(),
        )
    };

    client.push("interface-counters", vec![sample(1000, 100)]).await;
    wait_for(|| !storage.rows_snapshot(params::INTERFACES).is_empty()).await;

    client.push("interface-counters", vec![sample(2000, 110)]).await;
    wait_for(|| {
        storage.rows_snapshot(params::INTERFACES)[0].cell(params::IF_IN_BIT_RATE)
            == Some(&CellValue::Float(800.0))
    })
    .await;

    let rows = storage.rows_snapshot(params::INTERFACES);
    assert_eq!(rows[0].cell(params::IF_OPER_STATUS), Some(&CellValue::Int(1)));

    collector.shutdown().await;
}

#[tokio::test]
async fn closed_stream_is_reestablished_on_the_next_cycle() {
    init_tracing();
    let client = Arc::new(MockClient::new(scripted_responses(), None));
    let (collector, _storage) = harness(Arc::clone(&client));

    collector.poll_now().await;
    let initial = client.subscribe_count.load(Ordering::SeqCst);
    assert_eq!(initial, 3);

    // all senders dropped: the stream tasks see closed channels
    client.close_stream("controller-connections");
    client.close_stream("interface-counters");
    client.close_stream("system-datetime");

    let mut resubscribed = false;
    for _ in 0..200 {
        collector.poll_now().await;
        if client.subscribe_count.load(Ordering::SeqCst) > initial {
            resubscribed = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(resubscribed, "stream was not re-established");

    collector.shutdown().await;
}

#[tokio::test]
async fn losing_one_stream_leaves_the_others_alone() {
    init_tracing();
    let client = Arc::new(MockClient::new(scripted_responses(), None));
    let (collector, storage) = harness(Arc::clone(&client));

    collector.poll_now().await;
    let initial = client.subscribe_count.load(Ordering::SeqCst);

    // only the sampled stream goes away
    client.close_stream("interface-counters");

    let mut resubscribed = false;
    for _ in 0..200 {
        collector.poll_now().await;
        if client.subscribe_count.load(Ordering::SeqCst) > initial {
            resubscribed = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(resubscribed, "sampled stream was not re-established");
    assert_eq!(client.subscribe_count.load(Ordering::SeqCst), initial + 1);

    // the recovered stream carries interface data again
    client
        .push(
            "interface-counters",
            vec![ResponseValue::new(
                Path::new("interfaces/interface/state"),
                TypedValue::Json(json!({ "eth0": { "oper-status": "UP" } })),
                Utc::now(),
            )],
        )
        .await;
    wait_for(|| !storage.rows_snapshot(params::INTERFACES).is_empty()).await;

    collector.shutdown().await;
}

#[tokio::test]
async fn datetime_stream_updates_the_clock_field() {
    init_tracing();
    let client = Arc::new(MockClient::new(scripted_responses(), None));
    let (collector, storage) = harness(Arc::clone(&client));

    collector.poll_now().await;

    client
        .push(
            "system-datetime",
            vec![ResponseValue::new(
                Path::new("system/state/current-datetime"),
                TypedValue::String("2024-03-01T08:00:00Z+01:00".into()),
                Utc::now(),
            )],
        )
        .await;
    wait_for(|| {
        storage.read_field(params::SYSTEM_CURRENT_DATETIME)
            == chrono::DateTime::from_timestamp(1_709_276_400, 0).map(CellValue::Date)
    })
    .await;

    collector.shutdown().await;
}

#[tokio::test]
async fn started_collector_polls_on_its_own() {
    init_tracing();
    let client = Arc::new(MockClient::new(scripted_responses(), Some(caps())));
    let (collector, storage) = harness(Arc::clone(&client));

    Arc::clone(&collector).start();
    wait_for(|| {
        storage.read_field(params::SYSTEM_LOGIN_BANNER)
            == Some(CellValue::text("authorized access only"))
    })
    .await;

    collector.shutdown().await;
}

#[tokio::test]
async fn repeated_cycles_are_idempotent() {
    init_tracing();
    let client = Arc::new(MockClient::new(scripted_responses(), Some(caps())));
    let (collector, storage) = harness(Arc::clone(&client));

    collector.poll_now().await;
    let fields_before = (
        storage.read_field(params::SYSTEM_LOGIN_BANNER),
        storage.read_field(params::PROTOCOL_VERSION),
    );
    let polled_before = storage.rows_snapshot(params::CONNECTIONS_POLLED.table);

    collector.poll_now().await;
    assert_eq!(
        fields_before,
        (
            storage.read_field(params::SYSTEM_LOGIN_BANNER),
            storage.read_field(params::PROTOCOL_VERSION),
        )
    );
    assert_eq!(
        polled_before,
        storage.rows_snapshot(params::CONNECTIONS_POLLED.table)
    );

    collector.shutdown().await;
}
