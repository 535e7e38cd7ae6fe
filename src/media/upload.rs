//! Upload orchestrator.
//!
//! Turns validated file bytes plus an attachment context into a persisted
//! ledger row, honoring per-tag cardinality and ordering policy. The store
//! and the ledger are never updated transactionally: an external upload
//! whose ledger persist fails leaves an orphaned blob, which the
//! reconciliation sweeps reclaim later.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use chrono::Utc;
use gradnet_common::{
    Error, MediaAssetId, MediaTag, ResourceId, ResourceKind, Result, TagKind, UploaderId,
};
use gradnet_db::models::MediaAsset;
use gradnet_db::pool::{get_conn, DbPool};
use gradnet_db::queries::media_assets;
use serde::Serialize;
use tracing::{debug, warn};

use super::store::{
    ImageStore, META_RESOURCE_ID, META_RESOURCE_KIND, META_TAG, META_UPLOADER, VARIANT_ORIGINAL,
    VARIANT_THUMB,
};

/// An in-memory buffered file awaiting upload.
#[derive(Debug, Clone)]
pub struct FileUpload {
    /// Client-supplied name, kept as `original_filename` on the ledger row.
    pub filename: String,
    /// Declared MIME type.
    pub content_type: String,
    pub bytes: Bytes,
}

/// Where an upload attaches: the owning resource, the semantic tag, and who
/// is uploading.
///
/// Constructing a context validates the tag against the resource kind's
/// allowed set, so policy violations fail at the boundary instead of
/// surfacing as mystery rows later.
#[derive(Debug, Clone)]
pub struct UploadContext {
    pub resource_kind: ResourceKind,
    pub resource_id: ResourceId,
    pub tag: MediaTag,
    pub uploader_id: UploaderId,
    /// Opaque caller-supplied key/value pairs, persisted on the ledger row
    /// and embedded in the external object.
    pub metadata: HashMap<String, String>,
    /// Explicit position override; computed when absent.
    pub position: Option<i64>,
}

impl UploadContext {
    pub fn new(
        resource_kind: ResourceKind,
        resource_id: ResourceId,
        tag: MediaTag,
        uploader_id: UploaderId,
    ) -> Result<Self> {
        if !resource_kind.allows(tag) {
            return Err(Error::validation(format!(
                "tag {tag} is not valid for {resource_kind} resources"
            )));
        }
        Ok(Self {
            resource_kind,
            resource_id,
            tag,
            uploader_id,
            metadata: HashMap::new(),
            position: None,
        })
    }

    pub fn with_metadata(mut self, metadata: HashMap<String, String>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn at_position(mut self, position: i64) -> Self {
        self.position = Some(position);
        self
    }
}

/// Per-upload policy knobs.
#[derive(Debug, Clone)]
pub struct UploadOptions {
    pub max_file_size: usize,
    pub allowed_mime_types: Vec<String>,
    /// Delete all existing attachments of the (resource, tag) slot before
    /// uploading.
    pub replace_existing: bool,
    /// Compute the next position across every tag of the resource instead
    /// of just the target tag, so a post's first image lands on 0 no matter
    /// which tag it carries.
    pub global_positioning: bool,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            max_file_size: 10 * 1024 * 1024,
            allowed_mime_types: super::presets::ALLOWED_IMAGE_TYPES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            replace_existing: false,
            global_positioning: false,
        }
    }
}

/// What the caller gets back for one successful upload.
#[derive(Debug, Clone, Serialize)]
pub struct UploadResult {
    pub id: MediaAssetId,
    pub url: String,
    pub thumbnail_url: String,
    pub external_id: String,
    pub filename: String,
    pub size_bytes: i64,
    pub position: i64,
}

/// One file that failed inside a batch.
#[derive(Debug, Clone, Serialize)]
pub struct FailedUpload {
    pub filename: String,
    pub error: String,
}

/// Outcome of a batch upload. The batch itself always succeeds; every file
/// carries its own result.
#[derive(Debug, Default, Serialize)]
pub struct BatchUploadOutcome {
    pub successful: Vec<UploadResult>,
    pub failed: Vec<FailedUpload>,
}

/// The upload orchestrator: coordinates the external store and the ledger.
pub struct MediaUploader {
    store: ImageStore,
    pool: DbPool,
    /// External deletes that failed during replace/cleanup flows. These are
    /// swallowed by policy; the counter is the observability channel.
    failed_external_deletes: AtomicU64,
}

impl MediaUploader {
    pub fn new(store: ImageStore, pool: DbPool) -> Self {
        Self {
            store,
            pool,
            failed_external_deletes: AtomicU64::new(0),
        }
    }

    /// Number of external deletes swallowed so far.
    pub fn failed_external_deletes(&self) -> u64 {
        self.failed_external_deletes.load(Ordering::Relaxed)
    }

    /// Upload one file and persist its ledger row.
    ///
    /// Validation happens before any I/O. If the external upload fails, no
    /// ledger row is created. If the ledger persist fails after a successful
    /// external upload, the error is surfaced and the blob is left for the
    /// orphan sweep.
    pub async fn upload_single(
        &self,
        file: FileUpload,
        context: &UploadContext,
        options: &UploadOptions,
    ) -> Result<UploadResult> {
        validate_file(&file, options)?;

        let conn = get_conn(&self.pool)?;

        if options.replace_existing {
            let existing = media_assets::list_for_resource(
                &conn,
                context.resource_kind,
                context.resource_id,
                Some(context.tag),
            )?;
            for asset in existing {
                self.delete_external_best_effort(&asset.external_id).await;
                media_assets::delete(&conn, asset.id)?;
            }
        }

        // Singular tags always sit at 0; their position is not an ordering
        // key. Collections start at 0 when replacing and append otherwise.
        let position = match context.position {
            Some(p) => p,
            None if context.tag.is_singular() || options.replace_existing => 0,
            None => {
                let scope = if options.global_positioning {
                    None
                } else {
                    Some(context.tag)
                };
                media_assets::max_position(
                    &conn,
                    context.resource_kind,
                    context.resource_id,
                    scope,
                )?
                .map_or(0, |max| max + 1)
            }
        };

        let asset_id = MediaAssetId::new();
        let stored_filename = stored_filename(asset_id, &file.filename);

        let mut object_metadata = context.metadata.clone();
        object_metadata.insert(
            META_RESOURCE_KIND.to_string(),
            context.resource_kind.to_string(),
        );
        object_metadata.insert(META_RESOURCE_ID.to_string(), context.resource_id.to_string());
        object_metadata.insert(META_TAG.to_string(), context.tag.to_string());
        object_metadata.insert(META_UPLOADER.to_string(), context.uploader_id.to_string());

        let size_bytes = file.bytes.len() as i64;
        let stored = self
            .store
            .upload(
                file.bytes.to_vec(),
                &stored_filename,
                &file.content_type,
                &object_metadata,
            )
            .await?;

        let url = stored
            .variants
            .get(VARIANT_ORIGINAL)
            .cloned()
            .unwrap_or_else(|| self.store.delivery_url(&stored.external_id, VARIANT_ORIGINAL));
        let thumbnail_url = stored
            .variants
            .get(VARIANT_THUMB)
            .cloned()
            .unwrap_or_else(|| self.store.delivery_url(&stored.external_id, VARIANT_THUMB));

        let now = Utc::now();
        let asset = MediaAsset {
            id: asset_id,
            external_id: stored.external_id.clone(),
            filename: stored_filename,
            original_filename: file.filename.clone(),
            mime_type: file.content_type.clone(),
            size_bytes,
            url: url.clone(),
            thumbnail_url: thumbnail_url.clone(),
            variants: stored.variants,
            resource_kind: context.resource_kind,
            resource_id: context.resource_id,
            tag: context.tag,
            position,
            uploader_id: context.uploader_id,
            metadata: context.metadata.clone(),
            uploaded_at: now,
            updated_at: now,
        };

        // Singular tags upsert into their unique slot so two racing uploads
        // can never leave two rows; collections append.
        let persisted_id = match context.tag.kind() {
            TagKind::Singular => media_assets::upsert_singular(&conn, &asset)?,
            TagKind::Collection => {
                media_assets::insert(&conn, &asset)?;
                asset.id
            }
        };

        debug!(
            asset = %persisted_id,
            external = %asset.external_id,
            resource = %context.resource_id,
            tag = %context.tag,
            position,
            "uploaded media asset"
        );

        Ok(UploadResult {
            id: persisted_id,
            url,
            thumbnail_url,
            external_id: asset.external_id,
            filename: file.filename,
            size_bytes,
            position,
        })
    }

    /// Upload several files sequentially, assigning consecutive positions
    /// from a start value computed once at batch start.
    ///
    /// Each file's failure is captured independently and does not abort the
    /// remaining files: N files with M failures yield exactly N−M successes
    /// at contiguous positions. Replace semantics apply to single uploads
    /// only; batches always append.
    pub async fn upload_multiple(
        &self,
        files: Vec<FileUpload>,
        context: &UploadContext,
        options: &UploadOptions,
    ) -> Result<BatchUploadOutcome> {
        let scope = if options.global_positioning {
            None
        } else {
            Some(context.tag)
        };
        let mut next_position = {
            let conn = get_conn(&self.pool)?;
            media_assets::max_position(&conn, context.resource_kind, context.resource_id, scope)?
                .map_or(0, |max| max + 1)
        };

        let item_options = UploadOptions {
            replace_existing: false,
            ..options.clone()
        };

        let mut outcome = BatchUploadOutcome::default();
        for file in files {
            let filename = file.filename.clone();
            let item_context = context.clone().at_position(next_position);
            match self.upload_single(file, &item_context, &item_options).await {
                Ok(result) => {
                    next_position += 1;
                    outcome.successful.push(result);
                }
                Err(e) => {
                    debug!(filename = %filename, error = %e, "batch item failed");
                    outcome.failed.push(FailedUpload {
                        filename,
                        error: e.to_string(),
                    });
                }
            }
        }

        Ok(outcome)
    }

    /// Delete one attachment: external object first (best effort), then the
    /// ledger row. Returns `false` when the id is unknown.
    pub async fn delete(&self, id: MediaAssetId) -> Result<bool> {
        let conn = get_conn(&self.pool)?;
        let Some(asset) = media_assets::get(&conn, id)? else {
            return Ok(false);
        };

        self.delete_external_best_effort(&asset.external_id).await;
        media_assets::delete(&conn, id)?;
        Ok(true)
    }

    /// Delete every attachment of a resource, optionally restricted to one
    /// tag. External deletes are attempted first per record and swallowed on
    /// failure; the call succeeds as long as the ledger rows, the thing
    /// callers actually observe, are gone. Returns the number of rows
    /// removed.
    pub async fn delete_by_resource(
        &self,
        kind: ResourceKind,
        resource_id: ResourceId,
        tag: Option<MediaTag>,
    ) -> Result<u64> {
        let conn = get_conn(&self.pool)?;
        let assets = media_assets::list_for_resource(&conn, kind, resource_id, tag)?;

        let mut removed = 0u64;
        for asset in assets {
            self.delete_external_best_effort(&asset.external_id).await;
            if media_assets::delete(&conn, asset.id)? {
                removed += 1;
            }
        }

        Ok(removed)
    }

    /// Rewrite a collection's ordering to match `ordered` exactly,
    /// positions 0..n.
    ///
    /// The id set must equal the collection's current membership; partial
    /// reorders are rejected rather than guessed at.
    pub async fn reorder(
        &self,
        kind: ResourceKind,
        resource_id: ResourceId,
        tag: MediaTag,
        ordered: &[MediaAssetId],
    ) -> Result<()> {
        if tag.kind() != TagKind::Collection {
            return Err(Error::validation(format!("tag {tag} is not reorderable")));
        }

        let conn = get_conn(&self.pool)?;
        let existing = media_assets::list_for_resource(&conn, kind, resource_id, Some(tag))?;

        let mut current: Vec<MediaAssetId> = existing.iter().map(|a| a.id).collect();
        let mut requested: Vec<MediaAssetId> = ordered.to_vec();
        current.sort_by_key(|id| id.to_string());
        requested.sort_by_key(|id| id.to_string());
        if current != requested {
            return Err(Error::validation(
                "reorder must list each current collection member exactly once".to_string(),
            ));
        }

        let assignments: Vec<(MediaAssetId, i64)> = ordered
            .iter()
            .enumerate()
            .map(|(idx, id)| (*id, idx as i64))
            .collect();
        media_assets::set_positions(&conn, &assignments)
    }

    /// Delete an external object, swallowing failure. Losing a stale
    /// external pointer is judged worse than blocking a legitimate upload or
    /// cleanup pass, so these paths degrade rather than fail.
    async fn delete_external_best_effort(&self, external_id: &str) {
        match self.store.delete(external_id).await {
            Ok(_) => {}
            Err(e) => {
                self.failed_external_deletes.fetch_add(1, Ordering::Relaxed);
                warn!(external = %external_id, error = %e, "external delete failed, continuing");
            }
        }
    }
}

/// Reject empty, oversized, or wrongly-typed files before any I/O.
fn validate_file(file: &FileUpload, options: &UploadOptions) -> Result<()> {
    if file.bytes.is_empty() {
        return Err(Error::validation(format!("{}: empty file", file.filename)));
    }
    if file.bytes.len() > options.max_file_size {
        return Err(Error::validation(format!(
            "{}: file size {} exceeds limit {}",
            file.filename,
            file.bytes.len(),
            options.max_file_size
        )));
    }
    if !options
        .allowed_mime_types
        .iter()
        .any(|allowed| allowed == &file.content_type)
    {
        return Err(Error::validation(format!(
            "{}: type {} is not allowed",
            file.filename, file.content_type
        )));
    }
    Ok(())
}

/// Name the object is stored under: the asset id plus the original
/// extension, so store-side names never collide and never leak
/// user-controlled strings.
fn stored_filename(id: MediaAssetId, original: &str) -> String {
    match original.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => format!("{id}.{ext}"),
        _ => id.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str, content_type: &str, len: usize) -> FileUpload {
        FileUpload {
            filename: name.to_string(),
            content_type: content_type.to_string(),
            bytes: Bytes::from(vec![0u8; len]),
        }
    }

    #[test]
    fn test_validate_rejects_empty() {
        let err = validate_file(&file("a.png", "image/png", 0), &UploadOptions::default())
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_validate_rejects_oversized() {
        let options = UploadOptions {
            max_file_size: 10,
            ..UploadOptions::default()
        };
        let err = validate_file(&file("a.png", "image/png", 11), &options).unwrap_err();
        assert!(err.is_validation());
        assert!(validate_file(&file("a.png", "image/png", 10), &options).is_ok());
    }

    #[test]
    fn test_validate_rejects_disallowed_type() {
        let err = validate_file(
            &file("payload.pdf", "application/pdf", 4),
            &UploadOptions::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("application/pdf"));
    }

    #[test]
    fn test_context_rejects_disallowed_tag() {
        let err = UploadContext::new(
            ResourceKind::UserProfile,
            ResourceId::new(),
            MediaTag::Gallery,
            UploaderId::new(),
        )
        .unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_stored_filename_keeps_extension() {
        let id = MediaAssetId::new();
        assert_eq!(stored_filename(id, "photo.JPG"), format!("{id}.JPG"));
        assert_eq!(stored_filename(id, "noext"), id.to_string());
        assert_eq!(stored_filename(id, ".hidden"), id.to_string());
    }
}
