//! Database query modules.
//!
//! - media_assets: the media ledger (attachment rows, positions, batch reads)

pub mod media_assets;
