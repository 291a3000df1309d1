// ── Field and table identifiers ──
//
// The monitoring backend addresses every scalar and column by a
// numeric id. These constants are the engine's contract with the
// backing element definition; the mapping module ties them to
// telemetry paths.

use crate::storage::{FieldId, TableId};

// ── Data source configuration ────────────────────────────────────────

pub const DATA_SOURCE_ADDRESS: FieldId = FieldId(10);
pub const DATA_SOURCE_PORT: FieldId = FieldId(11);
pub const DATA_SOURCE_USERNAME: FieldId = FieldId(12);
pub const DATA_SOURCE_PASSWORD: FieldId = FieldId(13);
pub const CLIENT_CERTIFICATE: FieldId = FieldId(14);

/// Persisted connectivity flag: 1 connected, 0 disconnected.
pub const CONNECTION_STATE: FieldId = FieldId(22);

// ── Capabilities ─────────────────────────────────────────────────────

pub const PROTOCOL_VERSION: FieldId = FieldId(30);
pub const ENCODING_JSON: FieldId = FieldId(31);
pub const ENCODING_BYTES: FieldId = FieldId(32);
pub const ENCODING_PROTO: FieldId = FieldId(33);
pub const ENCODING_ASCII: FieldId = FieldId(34);
pub const ENCODING_JSON_IETF: FieldId = FieldId(35);

pub const CAPABILITY_MODELS: TableId = TableId(100);
pub const MODEL_KEY: FieldId = FieldId(101);
pub const MODEL_NAME: FieldId = FieldId(102);
pub const MODEL_ORGANIZATION: FieldId = FieldId(103);
pub const MODEL_VERSION: FieldId = FieldId(104);

// ── System scalars ───────────────────────────────────────────────────

pub const SYSTEM_CURRENT_DATETIME: FieldId = FieldId(40);
pub const SYSTEM_LOGIN_BANNER: FieldId = FieldId(41);
pub const SYSTEM_MOTD_BANNER: FieldId = FieldId(42);
pub const OPENFLOW_DATAPATH_ID: FieldId = FieldId(43);
pub const OPENFLOW_FAILURE_MODE: FieldId = FieldId(44);
pub const OPENFLOW_BACKOFF_INTERVAL: FieldId = FieldId(45);
pub const OPENFLOW_MAX_BACKOFF: FieldId = FieldId(46);
pub const OPENFLOW_INACTIVITY_PROBE: FieldId = FieldId(47);

// ── Controller connection tables ─────────────────────────────────────

/// Column layout shared by the polled and subscribed connection
/// tables; the two tables differ only in ids and fill mode.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionTable {
    pub table: TableId,
    pub key: FieldId,
    pub aux_id: FieldId,
    pub priority: FieldId,
    pub address: FieldId,
    pub port: FieldId,
    pub transport: FieldId,
    pub certificate_id: FieldId,
    pub source_interface: FieldId,
    pub connected: FieldId,
    pub display_key: FieldId,
}

/// Full-replace table fed by the manual poll group.
pub const CONNECTIONS_POLLED: ConnectionTable = ConnectionTable {
    table: TableId(200),
    key: FieldId(201),
    aux_id: FieldId(202),
    priority: FieldId(203),
    address: FieldId(204),
    port: FieldId(205),
    transport: FieldId(206),
    certificate_id: FieldId(207),
    source_interface: FieldId(208),
    connected: FieldId(209),
    display_key: FieldId(210),
};

/// Mark-and-sweep table fed by the subscription stream.
pub const CONNECTIONS_SUBSCRIBED: ConnectionTable = ConnectionTable {
    table: TableId(220),
    key: FieldId(221),
    aux_id: FieldId(222),
    priority: FieldId(223),
    address: FieldId(224),
    port: FieldId(225),
    transport: FieldId(226),
    certificate_id: FieldId(227),
    source_interface: FieldId(228),
    connected: FieldId(229),
    display_key: FieldId(230),
};

// ── Interface state table ────────────────────────────────────────────

pub const INTERFACES: TableId = TableId(300);
pub const IF_KEY: FieldId = FieldId(301);
pub const IF_TYPE: FieldId = FieldId(302);
pub const IF_MTU: FieldId = FieldId(303);
pub const IF_LOOPBACK_MODE: FieldId = FieldId(304);
pub const IF_DESCRIPTION: FieldId = FieldId(305);
pub const IF_ENABLED: FieldId = FieldId(306);
pub const IF_IFINDEX: FieldId = FieldId(307);
pub const IF_ADMIN_STATUS: FieldId = FieldId(308);
pub const IF_OPER_STATUS: FieldId = FieldId(309);
pub const IF_LAST_CHANGE: FieldId = FieldId(310);
pub const IF_LOGICAL: FieldId = FieldId(311);
pub const IF_IN_OCTETS: FieldId = FieldId(312);
pub const IF_IN_PKTS: FieldId = FieldId(313);
pub const IF_IN_DISCARDS: FieldId = FieldId(314);
pub const IF_IN_ERRORS: FieldId = FieldId(315);
pub const IF_OUT_OCTETS: FieldId = FieldId(316);
pub const IF_OUT_PKTS: FieldId = FieldId(317);
pub const IF_OUT_DISCARDS: FieldId = FieldId(318);
pub const IF_OUT_ERRORS: FieldId = FieldId(319);
pub const IF_LAST_CLEAR: FieldId = FieldId(320);
pub const IF_DISPLAY_KEY: FieldId = FieldId(321);
pub const IF_IN_BIT_RATE: FieldId = FieldId(322);
pub const IF_OUT_BIT_RATE: FieldId = FieldId(323);
pub const IF_IN_ERROR_RATE: FieldId = FieldId(324);
pub const IF_OUT_ERROR_RATE: FieldId = FieldId(325);
