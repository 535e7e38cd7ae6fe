mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    // Try default locations
    let default_paths = [
        "./config.toml",
        "./gradnet.toml",
        "~/.config/gradnet/config.toml",
        "/etc/gradnet/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path);
        }
    }

    Ok(Config::default())
}

/// Validate configuration
fn validate_config(config: &Config) -> Result<()> {
    if config.store.base_url.is_empty() {
        anyhow::bail!("store.base_url cannot be empty");
    }
    if config.store.app_tag.is_empty() {
        anyhow::bail!("store.app_tag cannot be empty");
    }
    if config.store.environment.is_empty() {
        anyhow::bail!("store.environment cannot be empty");
    }
    if config.store.api_key.is_empty() {
        tracing::warn!("store.api_key is empty; uploads to the image store will be rejected");
    }
    if config.upload.max_files_per_request == 0 {
        anyhow::bail!("upload.max_files_per_request cannot be 0");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.database.path, "gradnet-media.db");
        assert_eq!(config.store.app_tag, "gradnet");
        assert_eq!(config.store.environment, "production");
        assert_eq!(config.upload.max_files_per_request, 10);
    }

    #[test]
    fn test_load_partial_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[store]
base_url = "https://img.example.test"
api_key = "k-123"
environment = "staging"
"#
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.store.base_url, "https://img.example.test");
        assert_eq!(config.store.environment, "staging");
        // Unset sections fall back to defaults
        assert_eq!(config.database.path, "gradnet-media.db");
        assert_eq!(config.store.timeout_secs, 30);
    }

    #[test]
    fn test_validation_rejects_zero_file_limit() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[upload]
max_files_per_request = 0
"#
        )
        .unwrap();

        assert!(load_config(file.path()).is_err());
    }
}
