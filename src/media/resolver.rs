//! Batch media resolution.
//!
//! Eliminates N+1 query patterns when rendering lists of domain objects
//! that carry media: however many resource ids a page shows, the ledger is
//! hit once per (resource kind, tag set) combination, not once per id.

use std::collections::{HashMap, HashSet};

use gradnet_common::{MediaTag, ResourceId, ResourceKind, Result, TagKind};
use gradnet_db::models::MediaAsset;
use gradnet_db::pool::{get_conn, DbPool};
use gradnet_db::queries::media_assets;

/// One batch of resources to resolve media for.
#[derive(Debug, Clone)]
pub struct ResourceDescriptor {
    pub kind: ResourceKind,
    pub resource_ids: Vec<ResourceId>,
    pub tags: Vec<MediaTag>,
}

/// Resolved attachments, partitioned by tag cardinality.
///
/// Ids with no matching rows resolve to `None` / an empty slice, never an
/// error.
#[derive(Debug, Default)]
pub struct ResolvedMedia {
    singular: HashMap<(ResourceKind, MediaTag, ResourceId), MediaAsset>,
    collections: HashMap<(ResourceKind, MediaTag, ResourceId), Vec<MediaAsset>>,
    /// Number of ledger queries the resolution issued; exercised by tests
    /// to pin the query bound.
    pub queries_issued: usize,
}

impl ResolvedMedia {
    /// The attachment of a singular tag, if present.
    pub fn singular(
        &self,
        kind: ResourceKind,
        tag: MediaTag,
        id: ResourceId,
    ) -> Option<&MediaAsset> {
        self.singular.get(&(kind, tag, id))
    }

    /// A collection tag's attachments in ascending position order; empty
    /// for unknown ids.
    pub fn collection(&self, kind: ResourceKind, tag: MediaTag, id: ResourceId) -> &[MediaAsset] {
        self.collections
            .get(&(kind, tag, id))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Resolves attached media for many resources in a bounded number of
/// ledger queries.
pub struct MediaResolver {
    pool: DbPool,
}

impl MediaResolver {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Resolve media for every descriptor.
    ///
    /// Descriptors sharing a (kind, tag set) combination are merged into one
    /// query, so a detail view (one id) and a paginated list (many ids) have
    /// identical query-count characteristics.
    pub fn resolve(&self, descriptors: &[ResourceDescriptor]) -> Result<ResolvedMedia> {
        // Merge descriptors: (kind, normalized tag set) → id set.
        let mut groups: HashMap<(ResourceKind, Vec<MediaTag>), HashSet<ResourceId>> =
            HashMap::new();
        for descriptor in descriptors {
            if descriptor.resource_ids.is_empty() || descriptor.tags.is_empty() {
                continue;
            }
            let mut tags = descriptor.tags.clone();
            tags.sort_by_key(|t| t.to_string());
            tags.dedup();
            groups
                .entry((descriptor.kind, tags))
                .or_default()
                .extend(descriptor.resource_ids.iter().copied());
        }

        let conn = get_conn(&self.pool)?;
        let mut resolved = ResolvedMedia::default();

        for ((kind, tags), ids) in groups {
            let ids: Vec<ResourceId> = ids.into_iter().collect();
            let rows = media_assets::list_for_resources(&conn, kind, &ids, &tags)?;
            resolved.queries_issued += 1;

            for asset in rows {
                let key = (kind, asset.tag, asset.resource_id);
                match asset.tag.kind() {
                    TagKind::Singular => {
                        resolved.singular.insert(key, asset);
                    }
                    // Rows arrive ordered by position, so pushing keeps
                    // collections sorted.
                    TagKind::Collection => {
                        resolved.collections.entry(key).or_default().push(asset);
                    }
                }
            }
        }

        Ok(resolved)
    }
}
