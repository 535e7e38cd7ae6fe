//! Gradnet-DB: The media ledger.
//!
//! SQLite schema, migrations, and query operations for the attachment
//! ledger, using rusqlite with r2d2 connection pooling.
//!
//! # Modules
//!
//! - `migrations` - Database schema migrations
//! - `pool` - Connection pool management
//! - `models` - Rust models matching the ledger schema
//! - `queries` - Database query operations
//!
//! # Example
//!
//! ```no_run
//! use gradnet_db::pool::{get_conn, init_pool};
//! use gradnet_db::queries::media_assets;
//! use gradnet_common::{MediaTag, ResourceId, ResourceKind};
//!
//! let pool = init_pool("/var/lib/gradnet/media.db").unwrap();
//! let conn = get_conn(&pool).unwrap();
//!
//! let gallery = media_assets::list_for_resource(
//!     &conn,
//!     ResourceKind::Post,
//!     ResourceId::new(),
//!     Some(MediaTag::Gallery),
//! )
//! .unwrap();
//! println!("{} images", gallery.len());
//! ```

pub mod migrations;
pub mod models;
pub mod pool;
pub mod queries;
