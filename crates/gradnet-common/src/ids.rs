//! Typed ID wrappers for type safety across gradnet.
//!
//! This module provides newtype wrappers around UUIDs to prevent mixing
//! different kinds of identifiers (e.g., using an uploader's id where a
//! media asset id is expected).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a media asset (one row in the ledger).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaAssetId(Uuid);

impl MediaAssetId {
    /// Generate a new random media asset ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MediaAssetId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for MediaAssetId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<MediaAssetId> for Uuid {
    fn from(id: MediaAssetId) -> Self {
        id.0
    }
}

impl std::fmt::Display for MediaAssetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque reference to the domain entity owning an attachment.
///
/// The ledger never joins against the owning table; domain services hand the
/// id across the boundary and get it back unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(Uuid);

impl ResourceId {
    /// Generate a new random resource ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ResourceId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for ResourceId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<ResourceId> for Uuid {
    fn from(id: ResourceId) -> Self {
        id.0
    }
}

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for the account that performed an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UploaderId(Uuid);

impl UploaderId {
    /// Generate a new random uploader ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for UploaderId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for UploaderId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<UploaderId> for Uuid {
    fn from(id: UploaderId) -> Self {
        id.0
    }
}

impl std::fmt::Display for UploaderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_asset_id_creation() {
        let id1 = MediaAssetId::new();
        let id2 = MediaAssetId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_resource_id_from_uuid() {
        let uuid = Uuid::new_v4();
        let resource_id = ResourceId::from(uuid);
        let uuid_back: Uuid = resource_id.into();
        assert_eq!(uuid, uuid_back);
    }

    #[test]
    fn test_media_asset_id_serialization() {
        let id = MediaAssetId::new();
        let json = serde_json::to_string(&id).unwrap();
        let deserialized: MediaAssetId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, deserialized);
    }

    #[test]
    fn test_uploader_id_display() {
        let id = UploaderId::new();
        let display = format!("{}", id);
        assert!(!display.is_empty());
    }

    #[test]
    fn test_resource_id_ordering() {
        use std::collections::BTreeSet;
        let mut set = BTreeSet::new();
        set.insert(ResourceId::new());
        set.insert(ResourceId::new());
        assert_eq!(set.len(), 2);
    }
}
