//! Publication Pipeline - thumbnail, model and metadata uploads
//!
//! Steps run strictly in order and the first failure aborts the run with
//! that error unchanged. Uploads that already succeeded are left in the
//! store; a retry re-runs every step.

use std::future::Future;

use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use crate::catalog::Catalog;
use crate::content::{resolve_http, to_content_uri, BlobFile, ContentError, ContentStore, JsonFetcher};
use crate::customization::CustomizationStore;
use crate::hashing::{canonical_json, fingerprint, TraitFingerprint};
use crate::session::{Tier, User};
use crate::traits::TraitTuple;

const PNG_CONTENT_TYPE: &str = "image/png";
const GLB_CONTENT_TYPE: &str = "model/gltf-binary";
const JSON_CONTENT_TYPE: &str = "application/json";

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Content(#[from] ContentError),

    #[error("Tier {0:?} may not publish")]
    TierNotPermitted(Tier),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Number(u64),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub trait_type: String,
    pub value: AttributeValue,
}

/// NFT metadata document, field-exact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvatarMetadata {
    pub name: String,
    pub description: String,
    pub image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub animation_url: Option<String>,
    pub attributes: Vec<Attribute>,
}

impl AvatarMetadata {
    /// Assemble the document; one attribute per trait slot, canonical order.
    pub fn assemble(
        name: &str,
        description: &str,
        traits: &TraitTuple,
        image_uri: &str,
        model_uri: Option<&str>,
    ) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            image: image_uri.to_string(),
            animation_url: model_uri.map(str::to_string),
            attributes: traits
                .iter()
                .map(|(slot, value)| Attribute {
                    trait_type: slot.trait_type().to_string(),
                    value: AttributeValue::Number(u64::from(value)),
                })
                .collect(),
        }
    }
}

/// Artifacts to publish for one avatar.
#[derive(Debug, Clone)]
pub struct PublishRequest {
    pub name: String,
    pub description: String,
    pub thumbnail: Vec<u8>,
    pub model: Option<Vec<u8>>,
}

/// JSON form of a publish request with base64-encoded artifacts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishPayload {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub thumbnail_base64: String,
    #[serde(default)]
    pub model_base64: Option<String>,
}

impl PublishPayload {
    pub fn decode(self, default_description: &str) -> Result<PublishRequest, PipelineError> {
        let engine = base64::engine::general_purpose::STANDARD;
        let thumbnail = engine
            .decode(&self.thumbnail_base64)
            .map_err(|e| PipelineError::InvalidPayload(format!("thumbnail: {}", e)))?;
        let model = self
            .model_base64
            .map(|m| engine.decode(m))
            .transpose()
            .map_err(|e| PipelineError::InvalidPayload(format!("model: {}", e)))?;
        Ok(PublishRequest {
            name: self.name,
            description: self.description.unwrap_or_else(|| default_description.to_string()),
            thumbnail,
            model,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishedAvatar {
    pub id: String,
    pub published_at: DateTime<Utc>,
    pub metadata_uri: String,
    pub image_uri: String,
    #[serde(default)]
    pub model_uri: Option<String>,
    pub trait_fingerprint: TraitFingerprint,
}

pub struct PublicationPipeline<S> {
    store: S,
}

impl<S: ContentStore> PublicationPipeline<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn upload_image(&self, name: &str, bytes: Vec<u8>) -> Result<String, PipelineError> {
        let file = BlobFile::new(format!("{}-thumbnail.png", name), PNG_CONTENT_TYPE, bytes);
        let cid = self.store.store_blob(file).await?;
        Ok(to_content_uri(&cid))
    }

    pub async fn upload_model(&self, name: &str, bytes: Vec<u8>) -> Result<String, PipelineError> {
        let file = BlobFile::new(format!("{}-model.glb", name), GLB_CONTENT_TYPE, bytes);
        let cid = self.store.store_blob(file).await?;
        Ok(to_content_uri(&cid))
    }

    pub async fn upload_metadata(
        &self,
        name: &str,
        description: &str,
        traits: &TraitTuple,
        image_uri: &str,
        model_uri: Option<&str>,
    ) -> Result<String, PipelineError> {
        let metadata = AvatarMetadata::assemble(name, description, traits, image_uri, model_uri);
        let bytes = serde_json::to_vec(&metadata)?;
        let cid = self
            .store
            .store_blob(BlobFile::new("metadata.json", JSON_CONTENT_TYPE, bytes))
            .await?;
        Ok(to_content_uri(&cid))
    }

    /// Publish the catalog document. Canonical JSON keeps the identifier
    /// stable for identical catalogs.
    pub async fn upload_catalog(&self, catalog: &Catalog) -> Result<String, PipelineError> {
        let bytes = canonical_json(&catalog.document())?.into_bytes();
        let cid = self
            .store
            .store_blob(BlobFile::new("categories.json", JSON_CONTENT_TYPE, bytes))
            .await?;
        Ok(to_content_uri(&cid))
    }

    /// Run every step for `traits`. The tuple is taken by value so all
    /// steps and the fingerprint describe the same combination.
    pub async fn publish(
        &self,
        request: PublishRequest,
        traits: TraitTuple,
    ) -> Result<PublishedAvatar, PipelineError> {
        let id = Uuid::new_v4().to_string();
        let span = info_span!("publish", run = %id, name = %request.name);

        async move {
            let image_uri = self.upload_image(&request.name, request.thumbnail).await?;
            info!(%image_uri, "thumbnail uploaded");

            let model_uri = match request.model {
                Some(bytes) => {
                    let uri = self.upload_model(&request.name, bytes).await?;
                    info!(model_uri = %uri, "model uploaded");
                    Some(uri)
                }
                None => None,
            };

            let metadata_uri = self
                .upload_metadata(
                    &request.name,
                    &request.description,
                    &traits,
                    &image_uri,
                    model_uri.as_deref(),
                )
                .await?;
            let trait_fingerprint = fingerprint(&traits);
            info!(%metadata_uri, %trait_fingerprint, "metadata uploaded");

            Ok(PublishedAvatar {
                id,
                published_at: Utc::now(),
                metadata_uri,
                image_uri,
                model_uri,
                trait_fingerprint,
            })
        }
        .instrument(span)
        .await
    }

    /// Snapshot the store's traits now and publish them. The returned
    /// future no longer borrows the store, so it may change meanwhile.
    pub fn publish_customization<'a>(
        &'a self,
        request: PublishRequest,
        store: &CustomizationStore,
    ) -> impl Future<Output = Result<PublishedAvatar, PipelineError>> + 'a {
        let traits = store.traits();
        self.publish(request, traits)
    }

    /// [`publish`](Self::publish) for a user whose tier allows it.
    pub async fn publish_as(
        &self,
        user: &User,
        request: PublishRequest,
        traits: TraitTuple,
    ) -> Result<PublishedAvatar, PipelineError> {
        if !user.tier.may_publish() {
            return Err(PipelineError::TierNotPermitted(user.tier));
        }
        self.publish(request, traits).await
    }
}

/// Fetch and parse a published metadata document through the gateway.
pub async fn fetch_metadata(
    fetcher: &dyn JsonFetcher,
    metadata_uri: &str,
    gateway: &str,
) -> Result<AvatarMetadata, PipelineError> {
    let value: Value = fetcher.fetch_json(&resolve_http(metadata_uri, gateway)).await?;
    Ok(serde_json::from_value(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{MemoryContentStore, DEFAULT_GATEWAY};
    use crate::traits::TraitSlot;
    use serde_json::json;

    fn request(model: Option<Vec<u8>>) -> PublishRequest {
        PublishRequest {
            name: "Test".to_string(),
            description: "A test avatar".to_string(),
            thumbnail: vec![0x89, 0x50, 0x4E, 0x47],
            model,
        }
    }

    #[test]
    fn test_metadata_layout() {
        let traits = TraitTuple::default().with(TraitSlot::Hair, 2);
        let metadata = AvatarMetadata::assemble("A", "B", &traits, "ipfs://img", None);
        let value = serde_json::to_value(&metadata).unwrap();

        assert!(value.get("animation_url").is_none());
        assert_eq!(value["image"], "ipfs://img");
        let attributes = value["attributes"].as_array().unwrap();
        assert_eq!(attributes.len(), 13);
        assert_eq!(attributes[2], json!({"trait_type": "Face Deco", "value": 0}));
        assert_eq!(attributes[9], json!({"trait_type": "Hair", "value": 2}));

        let with_model = AvatarMetadata::assemble("A", "B", &traits, "ipfs://img", Some("ipfs://glb"));
        assert_eq!(serde_json::to_value(&with_model).unwrap()["animation_url"], "ipfs://glb");
    }

    #[tokio::test]
    async fn test_publish_without_model() {
        let pipeline = PublicationPipeline::new(MemoryContentStore::new());
        let traits = TraitTuple::default();
        let published = pipeline.publish(request(None), traits).await.unwrap();

        assert!(published.metadata_uri.starts_with("ipfs://"));
        assert_eq!(published.trait_fingerprint, fingerprint(&traits));
        assert!(published.model_uri.is_none());
        assert_eq!(pipeline.store().upload_count(), 2);

        let metadata = fetch_metadata(pipeline.store(), &published.metadata_uri, DEFAULT_GATEWAY)
            .await
            .unwrap();
        assert_eq!(metadata.image, published.image_uri);
        assert_eq!(metadata.animation_url, None);
    }

    #[tokio::test]
    async fn test_publish_with_model_sets_animation_url() {
        let pipeline = PublicationPipeline::new(MemoryContentStore::new());
        let published = pipeline
            .publish(request(Some(b"glTF".to_vec())), TraitTuple::default())
            .await
            .unwrap();
        assert_eq!(pipeline.store().upload_count(), 3);

        let metadata = fetch_metadata(pipeline.store(), &published.metadata_uri, DEFAULT_GATEWAY)
            .await
            .unwrap();
        assert_eq!(metadata.animation_url, published.model_uri);
    }

    #[tokio::test]
    async fn test_failed_step_aborts_with_store_error() {
        let pipeline = PublicationPipeline::new(MemoryContentStore::failing_after(1));
        let err = pipeline
            .publish(request(Some(b"glTF".to_vec())), TraitTuple::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Content(ContentError::StoreUnavailable(_))));
        assert_eq!(pipeline.store().upload_count(), 1);
    }

    #[tokio::test]
    async fn test_tier_gate() {
        let pipeline = PublicationPipeline::new(MemoryContentStore::new());
        let err = pipeline
            .publish_as(&User::default(), request(None), TraitTuple::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::TierNotPermitted(Tier::None)));
        assert_eq!(pipeline.store().upload_count(), 0);

        let mut user = User::default();
        user.set_wallet(Some("0xabc".to_string()));
        assert!(pipeline.publish_as(&user, request(None), TraitTuple::default()).await.is_ok());
    }

    #[tokio::test]
    async fn test_catalog_upload_is_stable() {
        let pipeline = PublicationPipeline::new(MemoryContentStore::new());
        let a = pipeline.upload_catalog(&Catalog::bundled()).await.unwrap();
        let b = pipeline.upload_catalog(&Catalog::bundled()).await.unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_payload_decode() {
        let payload = PublishPayload {
            name: "Test".to_string(),
            description: None,
            thumbnail_base64: "iVBORw==".to_string(),
            model_base64: None,
        };
        let request = payload.decode("default").unwrap();
        assert_eq!(request.thumbnail, vec![0x89, 0x50, 0x4E, 0x47]);
        assert_eq!(request.description, "default");

        let bad = PublishPayload {
            name: "Test".to_string(),
            description: None,
            thumbnail_base64: "not base64!".to_string(),
            model_base64: None,
        };
        assert!(matches!(bad.decode("d"), Err(PipelineError::InvalidPayload(_))));
    }
}
