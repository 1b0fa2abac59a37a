//! Catalog - categories and their selectable assets
//!
//! A catalog is loaded once, sorted by `position` and never mutated
//! afterwards. Loading validates the structure; an unreadable or invalid
//! source is `CatalogUnavailable` and callers fall back to `Catalog::bundled`.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::content::{resolve_http, JsonFetcher};
use crate::validation::Validator;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Catalog unavailable: {0}")]
    CatalogUnavailable(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub id: u32,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Ids of categories made unavailable while this asset is selected.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub locked_groups: Vec<String>,
}

impl Asset {
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            thumbnail: None,
            model: None,
            locked_groups: vec![],
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn locking(mut self, groups: &[&str]) -> Self {
        self.locked_groups = groups.iter().map(|g| g.to_string()).collect();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: String,
    pub name: String,
    pub position: i32,
    #[serde(default)]
    pub assets: Vec<Asset>,
    #[serde(default)]
    pub removable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_palette: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub starting_asset: Option<u32>,
}

impl Category {
    pub fn asset(&self, id: u32) -> Option<&Asset> {
        self.assets.iter().find(|a| a.id == id)
    }

    pub fn has_color(&self, color: &str) -> bool {
        self.color_palette
            .as_ref()
            .is_some_and(|palette| palette.iter().any(|c| c == color))
    }

    /// Asset selected when a customization is first initialized.
    pub fn default_asset(&self) -> Option<&Asset> {
        match self.starting_asset {
            Some(id) => self.asset(id).or_else(|| self.assets.first()),
            None if !self.removable => self.assets.first(),
            None => None,
        }
    }

    pub fn default_color(&self) -> Option<&String> {
        self.color_palette.as_ref().and_then(|p| p.first())
    }
}

/// Wire layout of a catalog: `{ "categories": [...] }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogDocument {
    pub categories: Vec<Category>,
}

/// Where a catalog is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogSource {
    Bundled,
    File(PathBuf),
    /// Content URI (`ipfs://...`) or plain HTTP URL.
    Uri(String),
}

/// Validated catalog, categories sorted ascending by position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    categories: Vec<Category>,
}

impl Catalog {
    pub fn from_document(document: CatalogDocument) -> Result<Self, CatalogError> {
        let mut categories = document.categories;
        categories.sort_by_key(|c| c.position);

        let result = Validator::new().validate(&categories);
        for warning in result.warnings() {
            warn!(rule = %warning.rule, category = ?warning.category, "{}", warning.message);
        }
        if !result.valid {
            return Err(CatalogError::CatalogUnavailable(result.error_summary()));
        }

        Ok(Self { categories })
    }

    pub fn from_json_str(content: &str) -> Result<Self, CatalogError> {
        let document: CatalogDocument = serde_json::from_str(content)
            .map_err(|e| CatalogError::CatalogUnavailable(format!("malformed catalog: {}", e)))?;
        Self::from_document(document)
    }

    pub fn load_from_file(path: &Path) -> Result<Self, CatalogError> {
        let content = fs::read_to_string(path).map_err(|e| {
            CatalogError::CatalogUnavailable(format!("{}: {}", path.display(), e))
        })?;
        Self::from_json_str(&content)
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    /// Look up a category by display name (the customization key).
    pub fn get(&self, name: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.name == name)
    }

    pub fn get_by_id(&self, id: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.id == id)
    }

    pub fn document(&self) -> CatalogDocument {
        CatalogDocument {
            categories: self.categories.clone(),
        }
    }

    /// Default catalog shipped with the crate, usable with no network.
    pub fn bundled() -> Self {
        let single = |id: &str, name: &str, position: i32, asset: Asset, removable: bool| Category {
            id: id.to_string(),
            name: name.to_string(),
            position,
            assets: vec![asset],
            removable,
            color_palette: None,
            starting_asset: Some(0),
        };
        let empty = |id: &str, name: &str, position: i32| Category {
            id: id.to_string(),
            name: name.to_string(),
            position,
            assets: vec![],
            removable: true,
            color_palette: None,
            starting_asset: None,
        };

        let mut skin = single("skin", "Skin", 0, Asset::new(0, "Pale"), false);
        skin.color_palette = Some(
            ["#f5c6a5", "#e8b094", "#d4956b", "#a57449", "#6b4423"]
                .iter()
                .map(|c| c.to_string())
                .collect(),
        );

        Self {
            categories: vec![
                skin,
                single("hair", "Hair", 1, Asset::new(0, "Short Blonde").with_model("/models/hair-0.glb"), false),
                single("eyes", "Eyes", 2, Asset::new(0, "Dilated").with_model("/models/eyes-0.glb"), false),
                single("brows", "Brows", 3, Asset::new(0, "Flat").with_model("/models/brows-0.glb"), false),
                single("mouth", "Mouth", 4, Asset::new(0, "Smile A").with_model("/models/mouth-0.glb"), false),
                single("hat", "Hat", 5, Asset::new(0, "Denim USA Cap").with_model("/models/hat-0.glb"), true),
                single("shirt", "Shirt", 6, Asset::new(0, "MWO Shirt").with_model("/models/shirt-0.glb"), true),
                single("glasses", "Glasses", 7, Asset::new(0, "Prescription Glasses").with_model("/models/glasses-0.glb"), true),
                empty("face", "Face", 8),
                single("faceDeco", "Face Deco", 9, Asset::new(0, "Star Heart Tattoo").with_model("/models/facedeco-0.glb"), true),
                single("neck", "Neck", 10, Asset::new(0, "Lean Neck Tattoo").with_model("/models/neck-0.glb"), true),
                empty("earrings", "Earrings", 11),
            ],
        }
    }
}

/// Load a catalog from `source`. URIs are resolved through `gateway` and
/// fetched with `fetcher`.
pub async fn load_catalog(
    source: &CatalogSource,
    fetcher: &dyn JsonFetcher,
    gateway: &str,
) -> Result<Catalog, CatalogError> {
    match source {
        CatalogSource::Bundled => Ok(Catalog::bundled()),
        CatalogSource::File(path) => Catalog::load_from_file(path),
        CatalogSource::Uri(uri) => {
            let url = resolve_http(uri, gateway);
            debug!(%uri, %url, "fetching catalog");
            let value = fetcher
                .fetch_json(&url)
                .await
                .map_err(|e| CatalogError::CatalogUnavailable(e.to_string()))?;
            let document: CatalogDocument = serde_json::from_value(value).map_err(|e| {
                CatalogError::CatalogUnavailable(format!("malformed catalog: {}", e))
            })?;
            Catalog::from_document(document)
        }
    }
}

/// Like [`load_catalog`], but any failure falls back to the bundled catalog.
pub async fn load_catalog_or_default(
    source: &CatalogSource,
    fetcher: &dyn JsonFetcher,
    gateway: &str,
) -> Catalog {
    match load_catalog(source, fetcher, gateway).await {
        Ok(catalog) => catalog,
        Err(e) => {
            warn!(error = %e, ?source, "falling back to bundled catalog");
            Catalog::bundled()
        }
    }
}
