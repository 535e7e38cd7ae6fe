//! External image store adapter.
//!
//! The only component that speaks to the remote image-hosting provider.
//! Wraps its REST API: multipart upload with embedded metadata, delete,
//! paged listing, and delivery-URL templating for named variants.
//!
//! No retries live here; retry policy, if any, belongs to the caller.
//! Every non-success response surfaces as
//! [`Error::ExternalStore`](gradnet_common::Error::ExternalStore) carrying
//! the provider's status and body.

use std::collections::HashMap;
use std::time::Duration;

use gradnet_common::{Error, Result};
use serde::Deserialize;

use crate::config::StoreConfig;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Metadata keys the adapter always embeds in uploaded objects. Reconciliation
/// filters on these client-side, so renaming one is a breaking change against
/// already-uploaded objects.
pub const META_APP: &str = "app";
pub const META_ENV: &str = "env";
pub const META_UPLOADED_AT: &str = "uploaded_at";
pub const META_RESOURCE_KIND: &str = "resource_kind";
pub const META_RESOURCE_ID: &str = "resource_id";
pub const META_TAG: &str = "tag";
pub const META_UPLOADER: &str = "uploader_id";

/// Variant every stored object is guaranteed to expose.
pub const VARIANT_ORIGINAL: &str = "original";
/// Variant used for thumbnail delivery URLs.
pub const VARIANT_THUMB: &str = "thumb";

// ---------------------------------------------------------------------------
// Provider API response types (private)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct UploadResponse {
    id: String,
    #[serde(default)]
    variants: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ObjectResponse {
    id: String,
    #[serde(default)]
    variants: Vec<String>,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    items: Vec<ObjectResponse>,
    #[serde(default)]
    has_more: bool,
}

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Result of a successful upload.
#[derive(Debug, Clone)]
pub struct StoredObject {
    /// Identifier assigned by the store.
    pub external_id: String,
    /// Named variant → delivery URL, expanded from the store's variant list.
    pub variants: HashMap<String, String>,
}

/// One object as seen when enumerating the store.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ExternalObject {
    pub external_id: String,
    /// Metadata embedded at upload time.
    pub metadata: HashMap<String, String>,
}

/// One page of the store's object listing.
#[derive(Debug, Clone)]
pub struct ExternalPage {
    pub items: Vec<ExternalObject>,
    pub has_more: bool,
}

// ---------------------------------------------------------------------------
// Adapter
// ---------------------------------------------------------------------------

/// Client for the external image store.
#[derive(Clone)]
pub struct ImageStore {
    client: reqwest::Client,
    base_url: String,
    delivery_url: String,
    api_key: String,
    app_tag: String,
    environment: String,
}

impl ImageStore {
    /// Create a new store client from configuration.
    pub fn new(config: &StoreConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to build HTTP client with timeout: {}", e);
                reqwest::Client::new()
            });

        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            delivery_url: config.delivery_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            app_tag: config.app_tag.clone(),
            environment: config.environment.clone(),
        }
    }

    /// Application tag this client stamps into uploaded objects.
    pub fn app_tag(&self) -> &str {
        &self.app_tag
    }

    /// Environment this client stamps into uploaded objects.
    pub fn environment(&self) -> &str {
        &self.environment
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1{}", self.base_url, path)
    }

    /// Upload bytes as a new object, embedding `metadata` for later
    /// reconciliation queries.
    ///
    /// The application tag, environment, and an upload timestamp are always
    /// stamped on top of the caller's metadata; reconciliation depends on
    /// them to tell this application's objects apart on a shared provider
    /// account.
    pub async fn upload(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        mime_type: &str,
        metadata: &HashMap<String, String>,
    ) -> Result<StoredObject> {
        let mut embedded = metadata.clone();
        embedded.insert(META_APP.to_string(), self.app_tag.clone());
        embedded.insert(META_ENV.to_string(), self.environment.clone());
        embedded.insert(
            META_UPLOADED_AT.to_string(),
            chrono::Utc::now().to_rfc3339(),
        );

        let metadata_json = serde_json::to_string(&embedded)
            .map_err(|e| Error::internal(format!("serialize upload metadata: {e}")))?;

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str(mime_type)
            .map_err(|e| Error::validation(format!("invalid mime type {mime_type}: {e}")))?;
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("metadata", metadata_json);

        let response = self
            .client
            .post(self.url("/images"))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(transport_err)?;

        let uploaded: UploadResponse = parse_success(response).await?;
        let variants = self.expand_variants(&uploaded.id, &uploaded.variants);

        Ok(StoredObject {
            external_id: uploaded.id,
            variants,
        })
    }

    /// Delete an object. Returns `false` when the store no longer has it.
    pub async fn delete(&self, external_id: &str) -> Result<bool> {
        let response = self
            .client
            .delete(self.url(&format!("/images/{external_id}")))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(transport_err)?;

        let status = response.status();
        if status.is_success() {
            Ok(true)
        } else if status == reqwest::StatusCode::NOT_FOUND {
            Ok(false)
        } else {
            Err(error_from(status, response).await)
        }
    }

    /// Fetch one page of the store's object listing, metadata included.
    /// Pages are 1-based.
    pub async fn list(&self, page: u32, page_size: u32) -> Result<ExternalPage> {
        let response = self
            .client
            .get(self.url("/images"))
            .query(&[("page", page), ("per_page", page_size)])
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(transport_err)?;

        let listed: ListResponse = parse_success(response).await?;

        Ok(ExternalPage {
            items: listed
                .items
                .into_iter()
                .map(|item| ExternalObject {
                    external_id: item.id,
                    metadata: item.metadata,
                })
                .collect(),
            has_more: listed.has_more,
        })
    }

    /// Delivery URL for one variant of an object. Pure templating, no
    /// network call.
    pub fn delivery_url(&self, external_id: &str, variant: &str) -> String {
        format!("{}/{external_id}/{variant}", self.delivery_url)
    }

    /// Fetch an object's known variants and expand each to a delivery URL.
    ///
    /// Returns `None` when the object no longer exists, which doubles as
    /// the existence probe used by the dangling-local sweep.
    pub async fn variant_urls(&self, external_id: &str) -> Result<Option<HashMap<String, String>>> {
        let response = self
            .client
            .get(self.url(&format!("/images/{external_id}")))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(transport_err)?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let object: ObjectResponse = parse_success(response).await?;
        Ok(Some(self.expand_variants(&object.id, &object.variants)))
    }

    fn expand_variants(&self, external_id: &str, names: &[String]) -> HashMap<String, String> {
        names
            .iter()
            .map(|name| (name.clone(), self.delivery_url(external_id, name)))
            .collect()
    }
}

fn transport_err(e: reqwest::Error) -> Error {
    Error::internal(format!("image store request failed: {e}"))
}

async fn error_from(status: reqwest::StatusCode, response: reqwest::Response) -> Error {
    let body = response.text().await.unwrap_or_default();
    Error::external_store(status.as_u16(), body)
}

async fn parse_success<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        return Err(error_from(status, response).await);
    }

    response
        .json::<T>()
        .await
        .map_err(|e| Error::internal(format!("malformed image store response: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> ImageStore {
        ImageStore::new(&StoreConfig {
            base_url: "https://api.img.test/".to_string(),
            delivery_url: "https://cdn.img.test/".to_string(),
            api_key: "k".to_string(),
            ..StoreConfig::default()
        })
    }

    #[test]
    fn test_delivery_url_templating() {
        let store = store();
        assert_eq!(
            store.delivery_url("abc123", VARIANT_THUMB),
            "https://cdn.img.test/abc123/thumb"
        );
    }

    #[test]
    fn test_trailing_slashes_trimmed() {
        let store = store();
        assert_eq!(store.url("/images"), "https://api.img.test/v1/images");
    }

    #[test]
    fn test_expand_variants() {
        let store = store();
        let variants = store.expand_variants(
            "abc",
            &["original".to_string(), "thumb".to_string()],
        );
        assert_eq!(variants.len(), 2);
        assert_eq!(
            variants.get("original").unwrap(),
            "https://cdn.img.test/abc/original"
        );
    }
}
