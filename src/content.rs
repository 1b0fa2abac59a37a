//! Content Store - content-addressed uploads and gateway fetches
//!
//! Identifiers returned by a store are wrapped as `ipfs://<cid>`. Every
//! fetch of such a URI goes through [`resolve_http`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::hashing::sha256_hex;

pub const IPFS_SCHEME: &str = "ipfs://";
pub const DEFAULT_GATEWAY: &str = "https://nftstorage.link/ipfs/";
pub const DEFAULT_UPLOAD_ENDPOINT: &str = "https://api.nft.storage/upload";

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("Content store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Failed to fetch {url}: {reason}")]
    FetchFailed { url: String, reason: String },
}

/// Wrap a content identifier as a content URI.
pub fn to_content_uri(cid: &str) -> String {
    format!("{}{}", IPFS_SCHEME, cid)
}

/// Resolve a content URI to an HTTP-fetchable URL by substituting the
/// gateway prefix. Non-`ipfs://` input is returned unchanged.
pub fn resolve_http(uri: &str, gateway: &str) -> String {
    match uri.strip_prefix(IPFS_SCHEME) {
        Some(rest) => format!("{}{}", gateway, rest),
        None => uri.to_string(),
    }
}

/// URL the preview loads an asset from: bundled paths (leading `/`) are
/// served locally, content URIs go through the gateway.
pub fn asset_url(uri: &str, gateway: &str) -> String {
    if uri.starts_with('/') {
        uri.to_string()
    } else {
        resolve_http(uri, gateway)
    }
}

/// One file handed to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobFile {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl BlobFile {
    pub fn new(filename: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            content_type: content_type.into(),
            bytes,
        }
    }
}

/// Upload side of the content store (driven port).
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Persist `file`, returning its bare content identifier.
    async fn store_blob(&self, file: BlobFile) -> Result<String, ContentError>;
}

/// Read side: fetch and parse a JSON document from an HTTP URL.
#[async_trait]
pub trait JsonFetcher: Send + Sync {
    async fn fetch_json(&self, url: &str) -> Result<Value, ContentError>;
}

/// In-process store addressed by SHA-256 digest.
///
/// Also serves fetches for any gateway URL whose path ends in
/// `/ipfs/<cid>`, so published documents can be read back.
#[derive(Debug, Default)]
pub struct MemoryContentStore {
    blobs: Mutex<HashMap<String, BlobFile>>,
    uploads: AtomicUsize,
    fail_after: Option<usize>,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `successes` uploads, then answer every further upload with
    /// `StoreUnavailable`.
    pub fn failing_after(successes: usize) -> Self {
        Self {
            fail_after: Some(successes),
            ..Self::default()
        }
    }

    /// Number of successful uploads so far.
    pub fn upload_count(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }

    pub fn get(&self, cid: &str) -> Option<BlobFile> {
        self.blobs.lock().ok()?.get(cid).cloned()
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn store_blob(&self, file: BlobFile) -> Result<String, ContentError> {
        if let Some(limit) = self.fail_after {
            if self.uploads.load(Ordering::SeqCst) >= limit {
                return Err(ContentError::StoreUnavailable(format!(
                    "refusing upload of {}",
                    file.filename
                )));
            }
        }

        let cid = sha256_hex(&file.bytes);
        let mut blobs = self
            .blobs
            .lock()
            .map_err(|_| ContentError::StoreUnavailable("store lock poisoned".to_string()))?;
        blobs.insert(cid.clone(), file);
        self.uploads.fetch_add(1, Ordering::SeqCst);
        Ok(cid)
    }
}

#[async_trait]
impl JsonFetcher for MemoryContentStore {
    async fn fetch_json(&self, url: &str) -> Result<Value, ContentError> {
        let failed = |reason: &str| ContentError::FetchFailed {
            url: url.to_string(),
            reason: reason.to_string(),
        };
        let cid = url
            .rsplit_once("/ipfs/")
            .map(|(_, cid)| cid)
            .ok_or_else(|| failed("not a gateway URL"))?;
        let blob = self.get(cid).ok_or_else(|| failed("not found"))?;
        serde_json::from_slice(&blob.bytes).map_err(|e| failed(&e.to_string()))
    }
}

/// Fetches JSON over HTTP from a public gateway.
#[derive(Debug, Clone, Default)]
pub struct GatewayFetcher {
    client: reqwest::Client,
}

impl GatewayFetcher {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JsonFetcher for GatewayFetcher {
    async fn fetch_json(&self, url: &str) -> Result<Value, ContentError> {
        let failed = |reason: String| ContentError::FetchFailed {
            url: url.to_string(),
            reason,
        };
        debug!(%url, "gateway fetch");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?;
        if !response.status().is_success() {
            return Err(failed(format!("HTTP {}", response.status())));
        }
        response.json::<Value>().await.map_err(|e| failed(e.to_string()))
    }
}

#[derive(Deserialize)]
struct UploadResponse {
    value: UploadValue,
}

#[derive(Deserialize)]
struct UploadValue {
    cid: String,
}

/// Uploads to an nft.storage-compatible HTTP endpoint.
#[derive(Debug, Clone)]
pub struct NftStorageClient {
    client: reqwest::Client,
    endpoint: String,
    token: String,
}

impl NftStorageClient {
    pub fn new(endpoint: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            token: token.into(),
        }
    }
}

#[async_trait]
impl ContentStore for NftStorageClient {
    async fn store_blob(&self, file: BlobFile) -> Result<String, ContentError> {
        let unavailable = |e: String| ContentError::StoreUnavailable(format!("{}: {}", file.filename, e));
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .header(reqwest::header::CONTENT_TYPE, file.content_type.as_str())
            .body(file.bytes.clone())
            .send()
            .await
            .map_err(|e| unavailable(e.to_string()))?;
        if !response.status().is_success() {
            return Err(unavailable(format!("HTTP {}", response.status())));
        }
        let body: UploadResponse = response
            .json()
            .await
            .map_err(|e| unavailable(e.to_string()))?;
        debug!(filename = %file.filename, cid = %body.value.cid, "stored blob");
        Ok(body.value.cid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_content_uri_conversion() {
        assert_eq!(to_content_uri("bafy123"), "ipfs://bafy123");
    }

    #[test]
    fn test_resolve_http() {
        assert_eq!(
            resolve_http("ipfs://bafy123", DEFAULT_GATEWAY),
            "https://nftstorage.link/ipfs/bafy123"
        );
        assert_eq!(resolve_http("https://x.io/a.json", DEFAULT_GATEWAY), "https://x.io/a.json");
        assert_eq!(resolve_http("", DEFAULT_GATEWAY), "");
    }

    #[test]
    fn test_asset_url() {
        assert_eq!(asset_url("/models/hat-0.glb", DEFAULT_GATEWAY), "/models/hat-0.glb");
        assert_eq!(
            asset_url("ipfs://bafyhat", DEFAULT_GATEWAY),
            "https://nftstorage.link/ipfs/bafyhat"
        );
    }

    #[tokio::test]
    async fn test_memory_store_is_content_addressed() {
        let store = MemoryContentStore::new();
        let a = store.store_blob(BlobFile::new("a.json", "application/json", b"{}".to_vec())).await.unwrap();
        let b = store.store_blob(BlobFile::new("b.json", "application/json", b"{}".to_vec())).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(store.upload_count(), 2);

        let url = resolve_http(&to_content_uri(&a), DEFAULT_GATEWAY);
        assert_eq!(store.fetch_json(&url).await.unwrap(), json!({}));
    }

    #[tokio::test]
    async fn test_memory_store_failing_after() {
        let store = MemoryContentStore::failing_after(1);
        assert!(store.store_blob(BlobFile::new("a", "text/plain", b"a".to_vec())).await.is_ok());
        let err = store.store_blob(BlobFile::new("b", "text/plain", b"b".to_vec())).await.unwrap_err();
        assert!(matches!(err, ContentError::StoreUnavailable(_)));
        assert_eq!(store.upload_count(), 1);
    }

    #[tokio::test]
    async fn test_memory_fetch_missing_is_fetch_failed() {
        let store = MemoryContentStore::new();
        let err = store.fetch_json("https://gw.example/ipfs/nope").await.unwrap_err();
        assert!(matches!(err, ContentError::FetchFailed { .. }));
    }

    #[tokio::test]
    async fn test_gateway_fetcher() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ipfs/bafycatalog"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"categories": []})))
            .mount(&server)
            .await;

        let gateway = format!("{}/ipfs/", server.uri());
        let url = resolve_http("ipfs://bafycatalog", &gateway);
        let value = GatewayFetcher::new().fetch_json(&url).await.unwrap();
        assert_eq!(value, json!({"categories": []}));

        let missing = resolve_http("ipfs://other", &gateway);
        let err = GatewayFetcher::new().fetch_json(&missing).await.unwrap_err();
        assert!(matches!(err, ContentError::FetchFailed { .. }));
    }

    #[tokio::test]
    async fn test_nft_storage_upload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/upload"))
            .and(header("authorization", "Bearer secret"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"ok": true, "value": {"cid": "bafyimage"}})),
            )
            .mount(&server)
            .await;

        let client = NftStorageClient::new(format!("{}/upload", server.uri()), "secret");
        let cid = client
            .store_blob(BlobFile::new("x.png", "image/png", vec![1, 2, 3]))
            .await
            .unwrap();
        assert_eq!(cid, "bafyimage");

        let denied = NftStorageClient::new(format!("{}/upload", server.uri()), "wrong");
        let err = denied
            .store_blob(BlobFile::new("x.png", "image/png", vec![1]))
            .await
            .unwrap_err();
        assert!(matches!(err, ContentError::StoreUnavailable(_)));
    }
}
