//! Rust models matching the ledger schema.
//!
//! `MediaAsset` implements `from_row` for constructing itself from a
//! `rusqlite::Row`; queries select columns in the order of the `COLS`
//! constant in `queries::media_assets`.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use gradnet_common::{MediaAssetId, MediaTag, ResourceId, ResourceKind, UploaderId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// helpers
// ---------------------------------------------------------------------------

fn conversion_err<E>(idx: usize, e: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
}

/// Parse a UUID-based ID from a text column.
fn parse_id<T: From<Uuid>>(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<T> {
    let s: String = row.get(idx)?;
    let uuid = Uuid::parse_str(&s).map_err(|e| conversion_err(idx, e))?;
    Ok(T::from(uuid))
}

/// Parse an enum stored as snake_case text.
fn parse_enum<T: std::str::FromStr>(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<T> {
    let s: String = row.get(idx)?;
    s.parse::<T>().map_err(|_| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            format!("unrecognized value: {s}").into(),
        )
    })
}

/// Parse an RFC3339 timestamp from a text column.
fn parse_datetime(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let s: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_err(idx, e))
}

/// Parse a JSON object of string values from a text column.
fn parse_json_map(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<HashMap<String, String>> {
    let s: String = row.get(idx)?;
    serde_json::from_str(&s).map_err(|e| conversion_err(idx, e))
}

// ---------------------------------------------------------------------------
// MediaAsset
// ---------------------------------------------------------------------------

/// One attached image: a ledger row binding an external store object to a
/// domain resource under a semantic tag.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MediaAsset {
    pub id: MediaAssetId,
    /// Identifier in the external store; unique across the ledger.
    pub external_id: String,
    /// Name under which the store holds the object.
    pub filename: String,
    /// Client-supplied name at upload time.
    pub original_filename: String,
    pub mime_type: String,
    pub size_bytes: i64,
    /// Delivery URL for the original.
    pub url: String,
    /// Delivery URL for the `thumb` variant.
    pub thumbnail_url: String,
    /// Named variant → delivery URL, produced by the external store.
    pub variants: HashMap<String, String>,
    pub resource_kind: ResourceKind,
    /// Opaque reference to the owning domain entity; never joined against.
    pub resource_id: ResourceId,
    pub tag: MediaTag,
    /// Ordering key; meaningful for collection tags, 0 for singular ones.
    pub position: i64,
    pub uploader_id: UploaderId,
    /// Caller-supplied opaque key/value pairs.
    pub metadata: HashMap<String, String>,
    pub uploaded_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MediaAsset {
    pub fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: parse_id(row, 0)?,
            external_id: row.get(1)?,
            filename: row.get(2)?,
            original_filename: row.get(3)?,
            mime_type: row.get(4)?,
            size_bytes: row.get(5)?,
            url: row.get(6)?,
            thumbnail_url: row.get(7)?,
            variants: parse_json_map(row, 8)?,
            resource_kind: parse_enum(row, 9)?,
            resource_id: parse_id(row, 10)?,
            tag: parse_enum(row, 11)?,
            position: row.get(12)?,
            uploader_id: parse_id(row, 13)?,
            metadata: parse_json_map(row, 14)?,
            uploaded_at: parse_datetime(row, 15)?,
            updated_at: parse_datetime(row, 16)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::init_memory_pool;
    use crate::queries::media_assets;

    #[test]
    fn test_round_trip_through_row() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();

        let mut variants = HashMap::new();
        variants.insert("thumb".to_string(), "https://img.test/x/thumb".to_string());
        let mut metadata = HashMap::new();
        metadata.insert("caption".to_string(), "reunion".to_string());

        let asset = MediaAsset {
            id: MediaAssetId::new(),
            external_id: "ext-1".to_string(),
            filename: "x.jpg".to_string(),
            original_filename: "photo.jpg".to_string(),
            mime_type: "image/jpeg".to_string(),
            size_bytes: 1234,
            url: "https://img.test/x/original".to_string(),
            thumbnail_url: "https://img.test/x/thumb".to_string(),
            variants,
            resource_kind: ResourceKind::Post,
            resource_id: ResourceId::new(),
            tag: MediaTag::Gallery,
            position: 0,
            uploader_id: UploaderId::new(),
            metadata,
            uploaded_at: Utc::now(),
            updated_at: Utc::now(),
        };

        media_assets::insert(&conn, &asset).unwrap();
        let found = media_assets::get(&conn, asset.id).unwrap().unwrap();

        assert_eq!(found.external_id, asset.external_id);
        assert_eq!(found.variants, asset.variants);
        assert_eq!(found.metadata, asset.metadata);
        assert_eq!(found.resource_kind, ResourceKind::Post);
        assert_eq!(found.tag, MediaTag::Gallery);
        // RFC3339 text keeps sub-second precision
        assert_eq!(found.uploaded_at, asset.uploaded_at);
    }
}
