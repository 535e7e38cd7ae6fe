//! The media attachment layer.
//!
//! Domain resources own zero-or-more images held in the external image
//! store; the ledger ([`gradnet_db`]) records which object belongs to which
//! resource, under which tag, in what order. This module is everything in
//! between:
//!
//! - [`store`]: the only client of the external provider
//! - [`upload`]: orchestration (validate, replace, position, persist)
//! - [`request`]: multipart draining for route handlers
//! - [`presets`]: per-purpose cardinality policy
//! - [`resolver`]: batch reads without N+1 queries
//! - [`reconcile`]: drift detection and repair

pub mod presets;
pub mod reconcile;
pub mod request;
pub mod resolver;
pub mod store;
pub mod upload;

pub use presets::{UploadPreset, UploadPurpose};
pub use reconcile::{MetadataFilters, Reconciler, SweepReport, UsageStats};
pub use resolver::{MediaResolver, ResolvedMedia, ResourceDescriptor};
pub use store::{ExternalObject, ExternalPage, ImageStore, StoredObject};
pub use upload::{
    BatchUploadOutcome, FailedUpload, FileUpload, MediaUploader, UploadContext, UploadOptions,
    UploadResult,
};
