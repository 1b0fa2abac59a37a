//! Artifact Exporter - binary glTF (GLB) container
//!
//! The renderer owns the scene graph; it hands over the glTF JSON document
//! and its binary buffer through [`SceneSource`]. This module frames them
//! as a GLB 2.0 byte stream.

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

const GLB_MAGIC: u32 = 0x4654_6C67; // "glTF"
const GLB_VERSION: u32 = 2;
const CHUNK_JSON: u32 = 0x4E4F_534A; // "JSON"
const CHUNK_BIN: u32 = 0x004E_4942; // "BIN\0"
const HEADER_LEN: usize = 12;
const CHUNK_HEADER_LEN: usize = 8;

pub type SceneError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Model export failed: {0}")]
    ExportFailed(#[source] SceneError),
}

/// Serialized scene as produced by the renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct GltfParts {
    pub json: Value,
    pub bin: Option<Vec<u8>>,
}

/// Assembled-scene handle exposed by the renderer.
pub trait SceneSource {
    fn gltf_parts(&self) -> Result<GltfParts, SceneError>;
}

/// Serialize `scene` into a GLB byte stream.
pub fn export_model(scene: &dyn SceneSource) -> Result<Vec<u8>, ExportError> {
    let parts = scene.gltf_parts().map_err(ExportError::ExportFailed)?;
    encode_glb(&parts)
}

/// Run [`export_model`] on the blocking pool. A panicking or cancelled
/// worker is reported as `ExportFailed` as well.
pub async fn export_model_task<S>(scene: Arc<S>) -> Result<Vec<u8>, ExportError>
where
    S: SceneSource + Send + Sync + 'static,
{
    tokio::task::spawn_blocking(move || export_model(scene.as_ref()))
        .await
        .map_err(|e| ExportError::ExportFailed(Box::new(e)))?
}

pub fn encode_glb(parts: &GltfParts) -> Result<Vec<u8>, ExportError> {
    let mut json = serde_json::to_vec(&parts.json).map_err(|e| ExportError::ExportFailed(Box::new(e)))?;
    pad_to_four(&mut json, b' ');

    let mut bin = parts.bin.clone();
    if let Some(bin) = bin.as_mut() {
        pad_to_four(bin, 0);
    }

    let total = HEADER_LEN
        + CHUNK_HEADER_LEN
        + json.len()
        + bin.as_ref().map_or(0, |b| CHUNK_HEADER_LEN + b.len());
    let total_u32 = u32::try_from(total)
        .map_err(|_| ExportError::ExportFailed("model exceeds 4 GiB GLB limit".into()))?;

    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(&GLB_MAGIC.to_le_bytes());
    out.extend_from_slice(&GLB_VERSION.to_le_bytes());
    out.extend_from_slice(&total_u32.to_le_bytes());
    write_chunk(&mut out, CHUNK_JSON, &json);
    if let Some(bin) = &bin {
        write_chunk(&mut out, CHUNK_BIN, bin);
    }

    debug!(bytes = out.len(), has_bin = bin.is_some(), "encoded glb");
    Ok(out)
}

fn pad_to_four(data: &mut Vec<u8>, fill: u8) {
    while data.len() % 4 != 0 {
        data.push(fill);
    }
}

fn write_chunk(out: &mut Vec<u8>, kind: u32, data: &[u8]) {
    out.extend_from_slice(&(data.len() as u32).to_le_bytes());
    out.extend_from_slice(&kind.to_le_bytes());
    out.extend_from_slice(data);
}
