use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub upload: UploadLimits,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite media ledger.
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String {
    "gradnet-media.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Connection settings for the external image store.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    /// Base URL of the provider's REST API.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Base URL for delivery (CDN) links; variant URLs are templated from it.
    #[serde(default = "default_delivery_url")]
    pub delivery_url: String,

    /// API key sent as a bearer token.
    #[serde(default)]
    pub api_key: String,

    /// Application tag embedded in every uploaded object's metadata;
    /// reconciliation only touches objects carrying it.
    #[serde(default = "default_app_tag")]
    pub app_tag: String,

    /// Deployment environment embedded alongside the app tag, so staging
    /// sweeps never delete production blobs on a shared provider account.
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://api.imgvault.io".to_string()
}
fn default_delivery_url() -> String {
    "https://cdn.imgvault.io".to_string()
}
fn default_app_tag() -> String {
    "gradnet".to_string()
}
fn default_environment() -> String {
    "production".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            delivery_url: default_delivery_url(),
            api_key: String::new(),
            app_tag: default_app_tag(),
            environment: default_environment(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UploadLimits {
    /// Maximum number of files accepted in one multipart request.
    #[serde(default = "default_max_files")]
    pub max_files_per_request: usize,
}

fn default_max_files() -> usize {
    10
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_files_per_request: default_max_files(),
        }
    }
}
