//! Reconciliation between the external store and the ledger.
//!
//! The two are never updated transactionally, so they drift: a blob whose
//! ledger persist failed is an *orphan* (external present, local absent), a
//! ledger row whose blob was lost is *dangling* (local present, external
//! absent). Both are administrative, run-to-completion sweeps, never part
//! of a user-facing request path.
//!
//! Every sweep shares the batch discipline of the upload orchestrator: a
//! per-item failure lands in `errors` and the run continues.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use gradnet_common::{Result, UploaderId};
use gradnet_db::pool::{get_conn, DbPool};
use gradnet_db::queries::media_assets;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::store::{ExternalObject, ImageStore, META_APP, META_ENV, META_UPLOADED_AT, META_UPLOADER};

/// Page size used when walking the external store.
const SWEEP_PAGE_SIZE: u32 = 100;

/// Client-side filters over embedded object metadata.
#[derive(Debug, Clone, Default)]
pub struct MetadataFilters {
    pub uploader: Option<UploaderId>,
    pub uploaded_after: Option<DateTime<Utc>>,
    pub uploaded_before: Option<DateTime<Utc>>,
}

/// Outcome of one sweep.
#[derive(Debug, Default, Serialize)]
pub struct SweepReport {
    pub found: u64,
    pub deleted: u64,
    pub errors: Vec<String>,
}

/// Usage aggregated from external-store metadata only.
///
/// Deliberately independent of the ledger: when these numbers diverge from
/// a ledger count, that divergence is itself a reconciliation signal.
#[derive(Debug, Default, Serialize)]
pub struct UsageStats {
    pub total: u64,
    pub by_environment: HashMap<String, u64>,
    pub by_uploader: HashMap<String, u64>,
    pub by_month: HashMap<String, u64>,
}

/// Detects and repairs drift between the external store and the ledger.
pub struct Reconciler {
    store: ImageStore,
    pool: DbPool,
}

impl Reconciler {
    pub fn new(store: ImageStore, pool: DbPool) -> Self {
        Self { store, pool }
    }

    /// Walk the entire external store, pages until exhaustion.
    async fn walk_store(&self) -> Result<Vec<ExternalObject>> {
        let mut objects = Vec::new();
        let mut page = 1u32;
        loop {
            let listed = self.store.list(page, SWEEP_PAGE_SIZE).await?;
            let short_page = listed.items.len() < SWEEP_PAGE_SIZE as usize;
            objects.extend(listed.items);
            if !listed.has_more || short_page {
                break;
            }
            page += 1;
        }
        debug!(count = objects.len(), pages = page, "walked external store");
        Ok(objects)
    }

    /// Objects stamped with this application's tag and environment.
    async fn app_objects(&self) -> Result<Vec<ExternalObject>> {
        let app = self.store.app_tag().to_string();
        let env = self.store.environment().to_string();
        Ok(self
            .walk_store()
            .await?
            .into_iter()
            .filter(|o| {
                o.metadata.get(META_APP) == Some(&app) && o.metadata.get(META_ENV) == Some(&env)
            })
            .collect())
    }

    /// List this application/environment's external objects, filtered
    /// client-side on embedded metadata.
    pub async fn list_external_by_metadata(
        &self,
        filters: &MetadataFilters,
    ) -> Result<Vec<ExternalObject>> {
        Ok(self
            .app_objects()
            .await?
            .into_iter()
            .filter(|o| matches_filters(o, filters))
            .collect())
    }

    /// Find external objects with no ledger row: blobs whose persist
    /// failed, or whose row was upsert-displaced. With `dry_run` the store
    /// is only read; otherwise each orphan is deleted externally.
    pub async fn find_orphans(&self, dry_run: bool) -> Result<SweepReport> {
        let objects = self.app_objects().await?;
        let conn = get_conn(&self.pool)?;

        let mut report = SweepReport::default();
        for object in objects {
            match media_assets::get_by_external_id(&conn, &object.external_id) {
                Ok(Some(_)) => continue,
                Ok(None) => {}
                Err(e) => {
                    report
                        .errors
                        .push(format!("{}: ledger lookup failed: {e}", object.external_id));
                    continue;
                }
            }

            report.found += 1;
            if dry_run {
                continue;
            }

            match self.store.delete(&object.external_id).await {
                Ok(_) => report.deleted += 1,
                Err(e) => {
                    warn!(external = %object.external_id, error = %e, "orphan delete failed");
                    report
                        .errors
                        .push(format!("{}: delete failed: {e}", object.external_id));
                }
            }
        }

        info!(
            found = report.found,
            deleted = report.deleted,
            errors = report.errors.len(),
            dry_run,
            "orphan sweep complete"
        );
        Ok(report)
    }

    /// Purge objects uploaded strictly before `days` ago.
    ///
    /// An object uploaded exactly at the cutoff instant is retained. When a
    /// ledger row exists for a purged object it is removed as well; on an
    /// external delete failure the item is left untouched (ledger row
    /// included) so the next run retries it.
    pub async fn purge_older_than(&self, days: u32, dry_run: bool) -> Result<SweepReport> {
        self.purge_before(Utc::now() - Duration::days(days as i64), dry_run)
            .await
    }

    /// Purge objects uploaded strictly before `cutoff`.
    pub async fn purge_before(&self, cutoff: DateTime<Utc>, dry_run: bool) -> Result<SweepReport> {
        let objects = self.app_objects().await?;
        let conn = get_conn(&self.pool)?;

        let mut report = SweepReport::default();
        for object in objects {
            let Some(uploaded_at) = parse_uploaded_at(&object) else {
                debug!(external = %object.external_id, "no upload timestamp, skipping");
                continue;
            };
            if uploaded_at >= cutoff {
                continue;
            }

            report.found += 1;
            if dry_run {
                continue;
            }

            match self.store.delete(&object.external_id).await {
                Ok(_) => {}
                Err(e) => {
                    warn!(external = %object.external_id, error = %e, "purge delete failed");
                    report
                        .errors
                        .push(format!("{}: delete failed: {e}", object.external_id));
                    continue;
                }
            }

            if let Ok(Some(asset)) = media_assets::get_by_external_id(&conn, &object.external_id) {
                if let Err(e) = media_assets::delete(&conn, asset.id) {
                    report
                        .errors
                        .push(format!("{}: ledger delete failed: {e}", object.external_id));
                    continue;
                }
            }
            report.deleted += 1;
        }

        info!(
            found = report.found,
            deleted = report.deleted,
            errors = report.errors.len(),
            %cutoff,
            dry_run,
            "age purge complete"
        );
        Ok(report)
    }

    /// Find ledger rows whose external object no longer resolves, the
    /// inverse of [`find_orphans`](Self::find_orphans). With `dry_run` the
    /// ledger is only read; otherwise each stale row is removed so callers
    /// stop rendering broken images.
    pub async fn find_dangling(&self, dry_run: bool) -> Result<SweepReport> {
        let conn = get_conn(&self.pool)?;
        let assets = media_assets::list_all(&conn)?;

        let mut report = SweepReport::default();
        for asset in assets {
            match self.store.variant_urls(&asset.external_id).await {
                Ok(Some(_)) => continue,
                Ok(None) => {}
                Err(e) => {
                    report
                        .errors
                        .push(format!("{}: existence probe failed: {e}", asset.external_id));
                    continue;
                }
            }

            report.found += 1;
            if dry_run {
                continue;
            }

            match media_assets::delete(&conn, asset.id) {
                Ok(_) => report.deleted += 1,
                Err(e) => {
                    report
                        .errors
                        .push(format!("{}: ledger delete failed: {e}", asset.external_id));
                }
            }
        }

        info!(
            found = report.found,
            deleted = report.deleted,
            errors = report.errors.len(),
            dry_run,
            "dangling sweep complete"
        );
        Ok(report)
    }

    /// Aggregate usage from external metadata across every environment of
    /// this application.
    pub async fn usage_stats(&self) -> Result<UsageStats> {
        let app = self.store.app_tag().to_string();
        let objects: Vec<ExternalObject> = self
            .walk_store()
            .await?
            .into_iter()
            .filter(|o| o.metadata.get(META_APP) == Some(&app))
            .collect();

        let mut stats = UsageStats::default();
        for object in &objects {
            stats.total += 1;

            let env = object
                .metadata
                .get(META_ENV)
                .cloned()
                .unwrap_or_else(|| "unknown".to_string());
            *stats.by_environment.entry(env).or_insert(0) += 1;

            let uploader = object
                .metadata
                .get(META_UPLOADER)
                .cloned()
                .unwrap_or_else(|| "unknown".to_string());
            *stats.by_uploader.entry(uploader).or_insert(0) += 1;

            let month = parse_uploaded_at(object)
                .map(|dt| dt.format("%Y-%m").to_string())
                .unwrap_or_else(|| "unknown".to_string());
            *stats.by_month.entry(month).or_insert(0) += 1;
        }

        Ok(stats)
    }
}

fn parse_uploaded_at(object: &ExternalObject) -> Option<DateTime<Utc>> {
    object
        .metadata
        .get(META_UPLOADED_AT)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

fn matches_filters(object: &ExternalObject, filters: &MetadataFilters) -> bool {
    if let Some(uploader) = filters.uploader {
        if object.metadata.get(META_UPLOADER) != Some(&uploader.to_string()) {
            return false;
        }
    }

    if filters.uploaded_after.is_some() || filters.uploaded_before.is_some() {
        let Some(uploaded_at) = parse_uploaded_at(object) else {
            return false;
        };
        if let Some(after) = filters.uploaded_after {
            if uploaded_at < after {
                return false;
            }
        }
        if let Some(before) = filters.uploaded_before {
            if uploaded_at >= before {
                return false;
            }
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object(metadata: &[(&str, &str)]) -> ExternalObject {
        ExternalObject {
            external_id: "x".to_string(),
            metadata: metadata
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn test_parse_uploaded_at() {
        let ok = object(&[(META_UPLOADED_AT, "2026-03-01T12:00:00+00:00")]);
        assert!(parse_uploaded_at(&ok).is_some());

        let bad = object(&[(META_UPLOADED_AT, "yesterday")]);
        assert!(parse_uploaded_at(&bad).is_none());

        let missing = object(&[]);
        assert!(parse_uploaded_at(&missing).is_none());
    }

    #[test]
    fn test_filters_on_uploader() {
        let uploader = UploaderId::new();
        let matching = object(&[(META_UPLOADER, &uploader.to_string())]);
        let other = object(&[(META_UPLOADER, &UploaderId::new().to_string())]);

        let filters = MetadataFilters {
            uploader: Some(uploader),
            ..MetadataFilters::default()
        };
        assert!(matches_filters(&matching, &filters));
        assert!(!matches_filters(&other, &filters));
    }

    #[test]
    fn test_filters_on_date_bounds() {
        let at = "2026-03-01T12:00:00+00:00";
        let obj = object(&[(META_UPLOADED_AT, at)]);
        let ts: DateTime<Utc> = at.parse().unwrap();

        // after is inclusive, before is exclusive
        let filters = MetadataFilters {
            uploaded_after: Some(ts),
            ..MetadataFilters::default()
        };
        assert!(matches_filters(&obj, &filters));

        let filters = MetadataFilters {
            uploaded_before: Some(ts),
            ..MetadataFilters::default()
        };
        assert!(!matches_filters(&obj, &filters));

        // Objects without a timestamp never match dated filters
        let filters = MetadataFilters {
            uploaded_before: Some(ts),
            ..MetadataFilters::default()
        };
        assert!(!matches_filters(&object(&[]), &filters));
    }
}
