// ── Device-side records ──
//
// Typed decode targets for the manual-parse connection payloads, plus
// the closed enum vocabularies the device uses for state leaves.

use serde::Deserialize;
use strum::EnumString;

use crate::convert;
use crate::params::ConnectionTable;
use crate::storage::{CellValue, Row};

// ── State enums ──────────────────────────────────────────────────────

/// Interface operational state, ordinals as exposed on the element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum OperState {
    Up = 1,
    Down = 2,
    Testing = 3,
    Unknown = 4,
    Dormant = 5,
    NotPresent = 6,
    LowerLayerDown = 7,
}

/// Interface administrative state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum AdminState {
    Up = 1,
    Down = 2,
    Testing = 3,
}

/// OpenFlow agent failure mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureMode {
    Secure = 1,
    Standalone = 2,
}

/// Controller connection transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum TransportProtocol {
    Tcp = 1,
    Tls = 2,
}

macro_rules! ordinal {
    ($($state:ty),+ $(,)?) => {
        $(impl From<$state> for i64 {
            fn from(state: $state) -> i64 {
                state as i64
            }
        })+
    };
}

ordinal!(OperState, AdminState, FailureMode, TransportProtocol);

// ── Connection payloads ──────────────────────────────────────────────

/// Get payload for the second controller's connections: a keyed list
/// addressed by positional index rather than by key.
#[derive(Debug, Deserialize)]
pub struct ConnectionsPoll {
    #[serde(rename = "connection")]
    pub connection: Option<IndexedConnections>,
}

#[derive(Debug, Deserialize)]
pub struct IndexedConnections {
    #[serde(rename = "0")]
    pub main: Option<Connection>,
    #[serde(rename = "1")]
    pub second: Option<Connection>,
}

/// Subscription payload for the same path: a proper list.
#[derive(Debug, Deserialize)]
pub struct ConnectionsSubscription {
    #[serde(rename = "openconfig-openflow:connection")]
    pub connections: Vec<Connection>,
}

#[derive(Debug, Deserialize)]
pub struct Connection {
    #[serde(rename = "aux-id")]
    pub aux_id: i64,
    #[serde(default)]
    pub config: Option<ConnectionState>,
    #[serde(default)]
    pub state: Option<ConnectionState>,
}

/// The `state` (or `config`) container of one connection object.
#[derive(Debug, Default, Deserialize)]
pub struct ConnectionState {
    #[serde(default)]
    pub address: Option<String>,
    #[serde(rename = "aux-id", default)]
    pub aux_id: i64,
    #[serde(rename = "certificate-id", default)]
    pub certificate_id: Option<String>,
    #[serde(default)]
    pub connected: Option<bool>,
    #[serde(default)]
    pub port: i64,
    #[serde(default)]
    pub priority: i64,
    #[serde(rename = "source-interface", default)]
    pub source_interface: Option<String>,
    #[serde(default)]
    pub transport: Option<String>,
}

// ── Row projection ───────────────────────────────────────────────────

/// Project one connection state object into a table row.
///
/// Shared by the manual poll (full-replace) and the subscription
/// (upsert) paths; only the target column ids differ.
pub fn connection_row(table: &ConnectionTable, pk: &str, state: &ConnectionState) -> Row {
    let transport = convert::transport_protocol(state.transport.as_deref());
    let connected = state
        .connected
        .map_or(CellValue::Int(convert::NOT_AVAILABLE), |b| {
            CellValue::Int(i64::from(b))
        });
    let certificate = state
        .certificate_id
        .clone()
        .map_or(CellValue::Int(convert::NOT_AVAILABLE), CellValue::Text);
    let display = convert::connection_display_key(
        Some(state.aux_id),
        state.address.as_deref(),
        Some(state.port),
        pk,
    );

    Row::new(pk)
        .with_cell(table.key, CellValue::text(pk))
        .with_cell(table.aux_id, CellValue::Int(state.aux_id))
        .with_cell(table.priority, CellValue::Int(state.priority))
        .with_cell(
            table.address,
            state
                .address
                .clone()
                .map_or(CellValue::Int(convert::NOT_AVAILABLE), CellValue::Text),
        )
        .with_cell(table.port, CellValue::Int(state.port))
        .with_cell(table.transport, transport)
        .with_cell(table.certificate_id, certificate)
        .with_cell(
            table.source_interface,
            state
                .source_interface
                .clone()
                .map_or(CellValue::Int(convert::NOT_AVAILABLE), CellValue::Text),
        )
        .with_cell(table.connected, connected)
        .with_cell(table.display_key, CellValue::Text(display))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::params::CONNECTIONS_POLLED;
    use std::str::FromStr;

    #[test]
    fn enum_tokens_parse() {
        assert_eq!(OperState::from_str("UP").unwrap(), OperState::Up);
        assert_eq!(
            OperState::from_str("LOWER_LAYER_DOWN").unwrap(),
            OperState::LowerLayerDown
        );
        assert_eq!(
            OperState::from_str("NOT_PRESENT").unwrap(),
            OperState::NotPresent
        );
        assert!(OperState::from_str("up").is_err());
        assert_eq!(FailureMode::from_str("SECURE").unwrap(), FailureMode::Secure);
        assert_eq!(TransportProtocol::from_str("TLS").unwrap() as i64, 2);
    }

    #[test]
    fn poll_payload_uses_positional_keys() {
        let json = serde_json::json!({
            "connection": {
                "0": { "aux-id": 0, "state": { "address": "10.0.0.1", "aux-id": 0, "port": 6653, "priority": 1, "transport": "TCP", "connected": true } },
                "1": { "aux-id": 1, "state": { "address": "10.0.0.2", "aux-id": 1, "port": 6653, "priority": 2, "transport": "TLS", "connected": false } }
            }
        });

        let decoded: ConnectionsPoll = serde_json::from_value(json).unwrap();
        let items = decoded.connection.unwrap();
        assert_eq!(items.main.unwrap().state.unwrap().address.as_deref(), Some("10.0.0.1"));
        assert_eq!(items.second.unwrap().aux_id, 1);
    }

    #[test]
    fn subscription_payload_is_a_list() {
        let json = serde_json::json!({
            "openconfig-openflow:connection": [
                { "aux-id": 0, "state": { "address": "10.0.0.1", "port": 6653 } },
                { "aux-id": 1 }
            ]
        });

        let decoded: ConnectionsSubscription = serde_json::from_value(json).unwrap();
        assert_eq!(decoded.connections.len(), 2);
        assert!(decoded.connections[1].state.is_none());
    }

    #[test]
    fn row_projection_converts_and_derives() {
        let state = ConnectionState {
            address: Some("10.0.0.1".into()),
            aux_id: 0,
            certificate_id: None,
            connected: Some(true),
            port: 830,
            priority: 1,
            source_interface: Some("eth0".into()),
            transport: Some("TCP".into()),
        };

        let row = connection_row(&CONNECTIONS_POLLED, "0", &state);
        assert_eq!(row.key, "0");
        assert_eq!(row.cell(CONNECTIONS_POLLED.transport), Some(&CellValue::Int(1)));
        assert_eq!(row.cell(CONNECTIONS_POLLED.connected), Some(&CellValue::Int(1)));
        // absent certificate renders as the unavailable sentinel
        assert_eq!(
            row.cell(CONNECTIONS_POLLED.certificate_id),
            Some(&CellValue::Int(-1))
        );
        assert_eq!(
            row.cell(CONNECTIONS_POLLED.display_key),
            Some(&CellValue::text("Main-10.0.0.1:830"))
        );
    }
}
