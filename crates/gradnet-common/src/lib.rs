//! Gradnet-Common: Shared types, IDs, and error handling.
//!
//! This crate provides common functionality used across gradnet:
//!
//! - **Typed IDs**: Type-safe UUID wrappers for media assets, resources, and uploaders
//! - **Core Types**: Enums for resource kinds, media tags, and tag cardinality
//! - **Error Handling**: Common error type and result alias
//!
//! # Examples
//!
//! ```
//! use gradnet_common::{Error, MediaTag, ResourceId, ResourceKind, Result, TagKind};
//!
//! // Create typed IDs
//! let resource_id = ResourceId::new();
//!
//! // Tag policy is carried by the types themselves
//! assert_eq!(MediaTag::Gallery.kind(), TagKind::Collection);
//! assert!(ResourceKind::Post.allows(MediaTag::Gallery));
//!
//! // Use common error types
//! fn example() -> Result<()> {
//!     Err(Error::not_found("media asset"))
//! }
//! ```

pub mod error;
pub mod ids;
pub mod types;

pub use error::{Error, Result};
pub use ids::*;
pub use types::*;
