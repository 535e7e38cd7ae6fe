//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`], which pairs a temp-file ledger pool with a
//! wiremock server standing in for the external image store, plus helpers
//! for seeding ledger rows and mocking the provider's API.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde_json::json;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use gradnet::config::StoreConfig;
use gradnet::media::{FileUpload, ImageStore, MediaResolver, MediaUploader, Reconciler};
use gradnet_common::{MediaAssetId, MediaTag, ResourceId, ResourceKind, UploaderId};
use gradnet_db::models::MediaAsset;
use gradnet_db::pool::{init_pool, DbPool};
use gradnet_db::queries::media_assets;

/// App tag / environment the harness's store client stamps and filters on.
pub const TEST_APP: &str = "gradnet";
pub const TEST_ENV: &str = "test";

/// Test harness wrapping a temp-file ledger and a mocked external store.
pub struct TestHarness {
    pub server: MockServer,
    pub pool: DbPool,
    pub store: ImageStore,
    _tmp: tempfile::TempDir,
}

impl TestHarness {
    pub async fn new() -> Self {
        let server = MockServer::start().await;
        let tmp = tempfile::tempdir().expect("failed to create temp dir");
        let db_path = tmp.path().join("media.db");
        let pool = init_pool(db_path.to_str().unwrap()).expect("failed to create ledger pool");

        let store = ImageStore::new(&StoreConfig {
            base_url: server.uri(),
            delivery_url: "https://cdn.test".to_string(),
            api_key: "test-key".to_string(),
            app_tag: TEST_APP.to_string(),
            environment: TEST_ENV.to_string(),
            timeout_secs: 5,
        });

        Self {
            server,
            pool,
            store,
            _tmp: tmp,
        }
    }

    pub fn uploader(&self) -> MediaUploader {
        MediaUploader::new(self.store.clone(), self.pool.clone())
    }

    pub fn resolver(&self) -> MediaResolver {
        MediaResolver::new(self.pool.clone())
    }

    pub fn reconciler(&self) -> Reconciler {
        Reconciler::new(self.store.clone(), self.pool.clone())
    }

    /// Mock successful uploads, handing out sequential external ids
    /// (`ext-1`, `ext-2`, ...).
    pub async fn mock_upload_success(&self) {
        Mock::given(method("POST"))
            .and(path("/v1/images"))
            .respond_with(SequentialUploads::default())
            .mount(&self.server)
            .await;
    }

    /// Mock every delete as successful.
    pub async fn mock_delete_success(&self) {
        Mock::given(method("DELETE"))
            .and(path_regex("^/v1/images/.+$"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&self.server)
            .await;
    }

    /// Mock deletes of one specific object as failing with a 500.
    ///
    /// Mount before [`mock_delete_success`]; wiremock picks the first
    /// matching mock.
    pub async fn mock_delete_failure(&self, external_id: &str) {
        Mock::given(method("DELETE"))
            .and(path(format!("/v1/images/{external_id}")))
            .respond_with(ResponseTemplate::new(500).set_body_string("storage backend down"))
            .mount(&self.server)
            .await;
    }

    /// Mock the listing endpoint with a single page of objects.
    pub async fn mock_list(&self, objects: Vec<serde_json::Value>) {
        Mock::given(method("GET"))
            .and(path("/v1/images"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "items": objects, "has_more": false })),
            )
            .mount(&self.server)
            .await;
    }

    /// DELETE requests the mocked store received, by external id.
    pub async fn deletes_received(&self) -> Vec<String> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.method.as_str() == "DELETE")
            .filter_map(|r| {
                r.url
                    .path()
                    .strip_prefix("/v1/images/")
                    .map(str::to_string)
            })
            .collect()
    }

    /// Insert a ledger row directly, bypassing the orchestrator.
    pub fn seed_asset(
        &self,
        kind: ResourceKind,
        resource_id: ResourceId,
        tag: MediaTag,
        position: i64,
        external_id: &str,
    ) -> MediaAsset {
        let conn = self.pool.get().unwrap();
        let now = Utc::now();
        let asset = MediaAsset {
            id: MediaAssetId::new(),
            external_id: external_id.to_string(),
            filename: format!("{external_id}.jpg"),
            original_filename: "photo.jpg".to_string(),
            mime_type: "image/jpeg".to_string(),
            size_bytes: 100,
            url: format!("https://cdn.test/{external_id}/original"),
            thumbnail_url: format!("https://cdn.test/{external_id}/thumb"),
            variants: HashMap::new(),
            resource_kind: kind,
            resource_id,
            tag,
            position,
            uploader_id: UploaderId::new(),
            metadata: HashMap::new(),
            uploaded_at: now,
            updated_at: now,
        };
        media_assets::insert(&conn, &asset).unwrap();
        asset
    }

    /// Every ledger row for one (resource, tag), ascending position.
    pub fn ledger_rows(
        &self,
        kind: ResourceKind,
        resource_id: ResourceId,
        tag: MediaTag,
    ) -> Vec<MediaAsset> {
        let conn = self.pool.get().unwrap();
        media_assets::list_for_resource(&conn, kind, resource_id, Some(tag)).unwrap()
    }

    pub fn ledger_count(&self) -> u64 {
        let conn = self.pool.get().unwrap();
        media_assets::count(&conn).unwrap()
    }
}

/// Responds to uploads with sequential external ids.
#[derive(Default)]
pub struct SequentialUploads {
    counter: AtomicU64,
}

impl Respond for SequentialUploads {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        ResponseTemplate::new(200).set_body_json(json!({
            "id": format!("ext-{n}"),
            "variants": ["original", "thumb", "small", "large"],
        }))
    }
}

/// JSON for one listed external object with standard app metadata.
pub fn external_object(
    external_id: &str,
    env: &str,
    uploader: Option<&str>,
    uploaded_at: Option<DateTime<Utc>>,
) -> serde_json::Value {
    let mut metadata = json!({
        "app": TEST_APP,
        "env": env,
    });
    if let Some(uploader) = uploader {
        metadata["uploader_id"] = json!(uploader);
    }
    if let Some(at) = uploaded_at {
        metadata["uploaded_at"] = json!(at.to_rfc3339());
    }
    json!({
        "id": external_id,
        "variants": ["original", "thumb"],
        "metadata": metadata,
    })
}

/// A small valid PNG upload.
pub fn png(name: &str) -> FileUpload {
    FileUpload {
        filename: name.to_string(),
        content_type: "image/png".to_string(),
        bytes: Bytes::from_static(b"\x89PNG\r\n\x1a\n fake png data"),
    }
}

/// A PDF upload, which no image preset allows.
pub fn pdf(name: &str) -> FileUpload {
    FileUpload {
        filename: name.to_string(),
        content_type: "application/pdf".to_string(),
        bytes: Bytes::from_static(b"%PDF-1.4 fake pdf data"),
    }
}
