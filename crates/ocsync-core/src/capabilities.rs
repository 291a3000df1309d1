// ── Capability reconciliation ──
//
// Mirrors the negotiated session capabilities into storage. Scalar
// fields are diffed against what storage already holds and written in
// one batch containing only the changed ones, so a session that
// renegotiates identical capabilities performs zero field writes. The
// model table has no usable identity across renegotiations and is
// always replaced wholesale.

use std::sync::Arc;

use ocsync_api::{Capabilities, Encoding};
use strum::IntoEnumIterator;
use tracing::debug;

use crate::params;
use crate::storage::{CellValue, FieldId, Row, Storage};

fn encoding_field(encoding: Encoding) -> FieldId {
    match encoding {
        Encoding::Json => params::ENCODING_JSON,
        Encoding::Bytes => params::ENCODING_BYTES,
        Encoding::Proto => params::ENCODING_PROTO,
        Encoding::Ascii => params::ENCODING_ASCII,
        Encoding::JsonIetf => params::ENCODING_JSON_IETF,
    }
}

pub struct CapabilitySync {
    storage: Arc<dyn Storage>,
}

impl CapabilitySync {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Bring the capability fields and model table in line with
    /// `caps`.
    pub fn reconcile(&self, caps: &Capabilities) {
        let mut desired = vec![(
            params::PROTOCOL_VERSION,
            CellValue::text(caps.protocol_version.clone()),
        )];
        for encoding in Encoding::iter() {
            let supported = caps.supported_encodings.contains(&encoding);
            desired.push((encoding_field(encoding), CellValue::Int(i64::from(supported))));
        }

        let changed: Vec<(FieldId, CellValue)> = desired
            .into_iter()
            .filter(|(field, value)| self.storage.read_field(*field).as_ref() != Some(value))
            .collect();
        if changed.is_empty() {
            debug!("capabilities unchanged, no field writes");
        } else {
            self.storage.set_fields(&changed);
        }

        let rows: Vec<Row> = caps
            .supported_models
            .iter()
            .enumerate()
            .map(|(i, model)| {
                let key = (i + 1).to_string();
                Row::new(key.clone())
                    .with_cell(params::MODEL_KEY, CellValue::text(key))
                    .with_cell(params::MODEL_NAME, CellValue::text(model.name.clone()))
                    .with_cell(
                        params::MODEL_ORGANIZATION,
                        CellValue::text(model.organization.clone()),
                    )
                    .with_cell(params::MODEL_VERSION, CellValue::text(model.version.clone()))
            })
            .collect();
        self.storage.replace_rows(params::CAPABILITY_MODELS, rows);
    }
}

// ── Tests ────────────────────────────────────────────────────────────
