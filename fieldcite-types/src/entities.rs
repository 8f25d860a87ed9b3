//! Domain entity records persisted in the local store.
//!
//! These are the synchronizable entities: each carries an `is_synced` flag
//! plus `synced_at` (and `synced_url` for uploads) that only the sync engine
//! mutates, on confirmed server acknowledgment. Field names serialize in
//! camelCase — the same shape the remote API consumes.

use crate::EntityId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A traffic ticket issued in the field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub id: EntityId,
    /// Human-readable ticket number, unique per deployment.
    pub ticket_number: String,
    pub status: String,
    pub officer_id: String,
    pub station_id: String,
    pub vehicle_reg: String,
    pub offence_code: String,
    /// Fine amount in minor currency units.
    pub amount_minor: i64,
    pub issued_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub is_synced: bool,
    pub synced_at: Option<DateTime<Utc>>,
}

/// What a photo documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhotoKind {
    Evidence,
    Vehicle,
    License,
    Other,
}

impl PhotoKind {
    /// The wire name sent in upload form fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            PhotoKind::Evidence => "evidence",
            PhotoKind::Vehicle => "vehicle",
            PhotoKind::License => "license",
            PhotoKind::Other => "other",
        }
    }
}

/// A captured photo, stored locally until uploaded.
///
/// The image bytes live inside the record (base64 in the JSON body); the
/// sync engine resolves them by entity id when it replays an `upload`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoRecord {
    pub id: EntityId,
    pub ticket_id: EntityId,
    #[serde(rename = "type")]
    pub kind: PhotoKind,
    #[serde(with = "base64_bytes")]
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub width: u32,
    pub height: u32,
    pub size: u64,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub captured_at: DateTime<Utc>,
    pub is_synced: bool,
    pub synced_url: Option<String>,
    pub synced_at: Option<DateTime<Utc>>,
}

/// A payment collected against a ticket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: EntityId,
    pub ticket_id: EntityId,
    /// Receipt reference, unique per deployment.
    pub reference: String,
    pub amount_minor: i64,
    pub method: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub is_synced: bool,
    pub synced_at: Option<DateTime<Utc>>,
}

/// Serde helper: `Vec<u8>` as standard base64 in JSON.
mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
