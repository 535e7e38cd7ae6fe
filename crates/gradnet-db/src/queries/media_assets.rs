//! Media ledger queries.
//!
//! All reads and writes against the `media_assets` table. Singular-tag
//! inserts go through [`upsert_singular`], which targets the partial unique
//! index created by the schema so that two racing uploads to the same
//! (resource, tag) slot serialize at the database instead of
//! double-inserting.

use std::collections::HashMap;

use chrono::Utc;
use gradnet_common::{Error, MediaAssetId, MediaTag, ResourceId, ResourceKind, Result};
use rusqlite::Connection;
use uuid::Uuid;

use crate::models::MediaAsset;

pub(crate) const COLS: &str = "id, external_id, filename, original_filename, mime_type, \
     size_bytes, url, thumbnail_url, variants, resource_kind, resource_id, tag, position, \
     uploader_id, metadata, uploaded_at, updated_at";

/// Offset added to positions in the first phase of [`set_positions`] so the
/// rewrite never transiently collides with the collection unique index.
const REORDER_OFFSET: i64 = 1 << 20;

fn db_err(e: impl std::fmt::Display) -> Error {
    Error::database(e.to_string())
}

fn json_text(map: &HashMap<String, String>) -> Result<String> {
    serde_json::to_string(map).map_err(|e| Error::internal(format!("serialize json column: {e}")))
}

/// Insert a new ledger row.
///
/// Used for collection tags; singular tags should go through
/// [`upsert_singular`] instead.
pub fn insert(conn: &Connection, asset: &MediaAsset) -> Result<()> {
    conn.execute(
        "INSERT INTO media_assets (id, external_id, filename, original_filename, mime_type,
             size_bytes, url, thumbnail_url, variants, resource_kind, resource_id, tag,
             position, uploader_id, metadata, uploaded_at, updated_at)
         VALUES (:id, :external_id, :filename, :original_filename, :mime_type,
             :size_bytes, :url, :thumbnail_url, :variants, :resource_kind, :resource_id, :tag,
             :position, :uploader_id, :metadata, :uploaded_at, :updated_at)",
        rusqlite::named_params! {
            ":id": asset.id.to_string(),
            ":external_id": &asset.external_id,
            ":filename": &asset.filename,
            ":original_filename": &asset.original_filename,
            ":mime_type": &asset.mime_type,
            ":size_bytes": asset.size_bytes,
            ":url": &asset.url,
            ":thumbnail_url": &asset.thumbnail_url,
            ":variants": json_text(&asset.variants)?,
            ":resource_kind": asset.resource_kind.to_string(),
            ":resource_id": asset.resource_id.to_string(),
            ":tag": asset.tag.to_string(),
            ":position": asset.position,
            ":uploader_id": asset.uploader_id.to_string(),
            ":metadata": json_text(&asset.metadata)?,
            ":uploaded_at": asset.uploaded_at.to_rfc3339(),
            ":updated_at": asset.updated_at.to_rfc3339(),
        },
    )
    .map_err(db_err)?;

    Ok(())
}

/// Insert a singular-tag row, replacing any existing row for the same
/// (resource_kind, resource_id, tag) slot in place.
///
/// On conflict the existing row keeps its id and every other column is
/// overwritten, so the slot never holds two rows even under concurrent
/// uploads. Returns the id of the surviving row.
pub fn upsert_singular(conn: &Connection, asset: &MediaAsset) -> Result<MediaAssetId> {
    debug_assert!(asset.tag.is_singular());

    conn.execute(
        "INSERT INTO media_assets (id, external_id, filename, original_filename, mime_type,
             size_bytes, url, thumbnail_url, variants, resource_kind, resource_id, tag,
             position, uploader_id, metadata, uploaded_at, updated_at)
         VALUES (:id, :external_id, :filename, :original_filename, :mime_type,
             :size_bytes, :url, :thumbnail_url, :variants, :resource_kind, :resource_id, :tag,
             :position, :uploader_id, :metadata, :uploaded_at, :updated_at)
         ON CONFLICT (resource_kind, resource_id, tag)
         WHERE tag IN ('profile_pic', 'banner', 'logo', 'featured_image')
         DO UPDATE SET
             external_id = excluded.external_id,
             filename = excluded.filename,
             original_filename = excluded.original_filename,
             mime_type = excluded.mime_type,
             size_bytes = excluded.size_bytes,
             url = excluded.url,
             thumbnail_url = excluded.thumbnail_url,
             variants = excluded.variants,
             position = excluded.position,
             uploader_id = excluded.uploader_id,
             metadata = excluded.metadata,
             uploaded_at = excluded.uploaded_at,
             updated_at = excluded.updated_at",
        rusqlite::named_params! {
            ":id": asset.id.to_string(),
            ":external_id": &asset.external_id,
            ":filename": &asset.filename,
            ":original_filename": &asset.original_filename,
            ":mime_type": &asset.mime_type,
            ":size_bytes": asset.size_bytes,
            ":url": &asset.url,
            ":thumbnail_url": &asset.thumbnail_url,
            ":variants": json_text(&asset.variants)?,
            ":resource_kind": asset.resource_kind.to_string(),
            ":resource_id": asset.resource_id.to_string(),
            ":tag": asset.tag.to_string(),
            ":position": asset.position,
            ":uploader_id": asset.uploader_id.to_string(),
            ":metadata": json_text(&asset.metadata)?,
            ":uploaded_at": asset.uploaded_at.to_rfc3339(),
            ":updated_at": asset.updated_at.to_rfc3339(),
        },
    )
    .map_err(db_err)?;

    // The conflict path keeps the existing row id; read back the winner.
    let id: String = conn
        .query_row(
            "SELECT id FROM media_assets
             WHERE resource_kind = ?1 AND resource_id = ?2 AND tag = ?3",
            rusqlite::params![
                asset.resource_kind.to_string(),
                asset.resource_id.to_string(),
                asset.tag.to_string(),
            ],
            |row| row.get(0),
        )
        .map_err(db_err)?;

    let uuid = Uuid::parse_str(&id).map_err(|e| Error::internal(format!("malformed id: {e}")))?;
    Ok(MediaAssetId::from(uuid))
}

/// Get a ledger row by ID.
pub fn get(conn: &Connection, id: MediaAssetId) -> Result<Option<MediaAsset>> {
    let q = format!("SELECT {COLS} FROM media_assets WHERE id = ?1");
    let result = conn.query_row(&q, [id.to_string()], MediaAsset::from_row);

    match result {
        Ok(asset) => Ok(Some(asset)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(db_err(e)),
    }
}

/// Get a ledger row by its external store identifier.
pub fn get_by_external_id(conn: &Connection, external_id: &str) -> Result<Option<MediaAsset>> {
    let q = format!("SELECT {COLS} FROM media_assets WHERE external_id = ?1");
    let result = conn.query_row(&q, [external_id], MediaAsset::from_row);

    match result {
        Ok(asset) => Ok(Some(asset)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(db_err(e)),
    }
}

/// List attachments of one resource, optionally restricted to a tag,
/// ordered by tag then position.
pub fn list_for_resource(
    conn: &Connection,
    kind: ResourceKind,
    resource_id: ResourceId,
    tag: Option<MediaTag>,
) -> Result<Vec<MediaAsset>> {
    let (q, params) = match tag {
        Some(tag) => (
            format!(
                "SELECT {COLS} FROM media_assets
                 WHERE resource_kind = ?1 AND resource_id = ?2 AND tag = ?3
                 ORDER BY position"
            ),
            vec![kind.to_string(), resource_id.to_string(), tag.to_string()],
        ),
        None => (
            format!(
                "SELECT {COLS} FROM media_assets
                 WHERE resource_kind = ?1 AND resource_id = ?2
                 ORDER BY tag, position"
            ),
            vec![kind.to_string(), resource_id.to_string()],
        ),
    };

    let mut stmt = conn.prepare(&q).map_err(db_err)?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(params), MediaAsset::from_row)
        .map_err(db_err)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(db_err)?;
    Ok(rows)
}

/// List attachments for many resources of one kind in a single query.
///
/// This is the batch-resolver workhorse: however many ids are supplied,
/// exactly one statement runs. Rows come back ordered by resource, tag,
/// position so callers can partition without re-sorting.
pub fn list_for_resources(
    conn: &Connection,
    kind: ResourceKind,
    resource_ids: &[ResourceId],
    tags: &[MediaTag],
) -> Result<Vec<MediaAsset>> {
    if resource_ids.is_empty() || tags.is_empty() {
        return Ok(Vec::new());
    }

    let id_marks = vec!["?"; resource_ids.len()].join(", ");
    let tag_marks = vec!["?"; tags.len()].join(", ");
    let q = format!(
        "SELECT {COLS} FROM media_assets
         WHERE resource_kind = ? AND resource_id IN ({id_marks}) AND tag IN ({tag_marks})
         ORDER BY resource_id, tag, position"
    );

    let params: Vec<String> = std::iter::once(kind.to_string())
        .chain(resource_ids.iter().map(|id| id.to_string()))
        .chain(tags.iter().map(|t| t.to_string()))
        .collect();

    let mut stmt = conn.prepare(&q).map_err(db_err)?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(params), MediaAsset::from_row)
        .map_err(db_err)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(db_err)?;
    Ok(rows)
}

/// List every ledger row, ordered by upload time.
///
/// Administrative use only (reconciliation sweeps); never in a request
/// path.
pub fn list_all(conn: &Connection) -> Result<Vec<MediaAsset>> {
    let q = format!("SELECT {COLS} FROM media_assets ORDER BY uploaded_at");
    let mut stmt = conn.prepare(&q).map_err(db_err)?;
    let rows = stmt
        .query_map([], MediaAsset::from_row)
        .map_err(db_err)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(db_err)?;
    Ok(rows)
}

/// Highest position currently assigned on a resource.
///
/// With `tag = Some(..)` the scope is that single tag; with `None` the
/// scope is every attachment of the resource (global positioning).
/// Returns `None` when the scope holds no rows.
pub fn max_position(
    conn: &Connection,
    kind: ResourceKind,
    resource_id: ResourceId,
    tag: Option<MediaTag>,
) -> Result<Option<i64>> {
    let result = match tag {
        Some(tag) => conn.query_row(
            "SELECT MAX(position) FROM media_assets
             WHERE resource_kind = ?1 AND resource_id = ?2 AND tag = ?3",
            rusqlite::params![kind.to_string(), resource_id.to_string(), tag.to_string()],
            |row| row.get::<_, Option<i64>>(0),
        ),
        None => conn.query_row(
            "SELECT MAX(position) FROM media_assets
             WHERE resource_kind = ?1 AND resource_id = ?2",
            rusqlite::params![kind.to_string(), resource_id.to_string()],
            |row| row.get::<_, Option<i64>>(0),
        ),
    };

    result.map_err(db_err)
}

/// Move one attachment to a new position.
pub fn update_position(conn: &Connection, id: MediaAssetId, position: i64) -> Result<()> {
    let n = conn
        .execute(
            "UPDATE media_assets SET position = ?1, updated_at = ?2 WHERE id = ?3",
            rusqlite::params![position, Utc::now().to_rfc3339(), id.to_string()],
        )
        .map_err(db_err)?;

    if n == 0 {
        return Err(Error::not_found(format!("media asset {id}")));
    }
    Ok(())
}

/// Rewrite positions for a set of attachments atomically.
///
/// Runs in a transaction and in two phases (shift out of range, then set
/// final values) so a swap never trips the collection unique index
/// mid-rewrite.
pub fn set_positions(conn: &Connection, assignments: &[(MediaAssetId, i64)]) -> Result<()> {
    if assignments.is_empty() {
        return Ok(());
    }

    let tx = conn.unchecked_transaction().map_err(db_err)?;
    let now = Utc::now().to_rfc3339();

    for (id, _) in assignments {
        let n = tx
            .execute(
                "UPDATE media_assets SET position = position + ?1 WHERE id = ?2",
                rusqlite::params![REORDER_OFFSET, id.to_string()],
            )
            .map_err(db_err)?;
        if n == 0 {
            return Err(Error::not_found(format!("media asset {id}")));
        }
    }

    for (id, position) in assignments {
        tx.execute(
            "UPDATE media_assets SET position = ?1, updated_at = ?2 WHERE id = ?3",
            rusqlite::params![position, now, id.to_string()],
        )
        .map_err(db_err)?;
    }

    tx.commit().map_err(db_err)?;
    Ok(())
}

/// Replace an attachment's opaque metadata.
pub fn update_metadata(
    conn: &Connection,
    id: MediaAssetId,
    metadata: &HashMap<String, String>,
) -> Result<()> {
    let n = conn
        .execute(
            "UPDATE media_assets SET metadata = ?1, updated_at = ?2 WHERE id = ?3",
            rusqlite::params![json_text(metadata)?, Utc::now().to_rfc3339(), id.to_string()],
        )
        .map_err(db_err)?;

    if n == 0 {
        return Err(Error::not_found(format!("media asset {id}")));
    }
    Ok(())
}

/// Delete a ledger row by ID. Returns whether a row existed.
pub fn delete(conn: &Connection, id: MediaAssetId) -> Result<bool> {
    let n = conn
        .execute("DELETE FROM media_assets WHERE id = ?1", [id.to_string()])
        .map_err(db_err)?;
    Ok(n > 0)
}

/// Total number of ledger rows.
pub fn count(conn: &Connection) -> Result<u64> {
    conn.query_row("SELECT COUNT(*) FROM media_assets", [], |row| {
        row.get::<_, i64>(0)
    })
    .map(|n| n as u64)
    .map_err(db_err)
}
