//! Customization Store
//!
//! Owns the current mode, the category cursor, one selection record per
//! category and the derived locked groups. Every mutation validates first
//! and only then writes, so a failed call never leaves partial state.
//! Locks are recomputed inline after each successful asset change.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::catalog::{Asset, Catalog, Category};
use crate::locks::{is_locked, resolve_locks, LockedGroups};
use crate::traits::TraitTuple;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CustomizationError {
    #[error("Unknown category: {0}")]
    UnknownCategory(String),

    #[error("Asset {asset_id} is not part of category {category}")]
    InvalidSelection { category: String, asset_id: u32 },

    #[error("Color {color} is not in the palette of {category}")]
    InvalidColor { category: String, color: String },

    #[error("Category {0} cannot be left empty")]
    RemovalNotAllowed(String),

    #[error("Category {category} is locked by {}", .locked_by.join(", "))]
    CategoryLocked { category: String, locked_by: Vec<String> },

    #[error("{operation:?} is not available in {mode:?} mode")]
    ModeMismatch { mode: Mode, operation: Operation },

    #[error("Unknown character: {0}")]
    UnknownCharacter(u32),
}

/// Renderer-side material whose tint follows palette selections.
///
/// The store owns the single handle and mutates it in place.
pub trait ColorTarget {
    fn set_color(&mut self, color: &str);
}

/// Color target for headless use; discards every update.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullColorTarget;

impl ColorTarget for NullColorTarget {
    fn set_color(&mut self, _color: &str) {}
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Pick one of the bundled whole characters.
    #[default]
    Demo,
    /// Per-trait customization.
    Creator,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    SelectCharacter,
    SetAsset,
    SetColor,
}

impl Mode {
    pub fn permits(self, operation: Operation) -> bool {
        matches!(
            (self, operation),
            (Mode::Demo, Operation::SelectCharacter)
                | (Mode::Creator, Operation::SetAsset)
                | (Mode::Creator, Operation::SetColor)
        )
    }
}

/// Selection record of one category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub asset: Option<Asset>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// Category name -> selection.
pub type Customization = BTreeMap<String, Selection>;

/// A complete, pre-built character offered in demo mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DemoCharacter {
    pub id: u32,
    pub name: String,
    pub description: String,
    pub model: String,
    pub thumbnail: String,
}

pub fn bundled_characters() -> Vec<DemoCharacter> {
    vec![
        DemoCharacter {
            id: 1,
            name: "Mascot V1".to_string(),
            description: "The original".to_string(),
            model: "/models/mascot-v1.glb".to_string(),
            thumbnail: "/images/mascot-v1.png".to_string(),
        },
        DemoCharacter {
            id: 2,
            name: "Mascot V2".to_string(),
            description: "The variant".to_string(),
            model: "/models/mascot-v2.glb".to_string(),
            thumbnail: "/images/mascot-v2.png".to_string(),
        },
    ]
}

/// Initial customization derived from catalog defaults.
pub fn initial_customization(catalog: &Catalog) -> Customization {
    catalog
        .categories()
        .iter()
        .map(|category| {
            let selection = Selection {
                asset: category.default_asset().cloned(),
                color: category.default_color().cloned(),
            };
            (category.name.clone(), selection)
        })
        .collect()
}

pub struct CustomizationStore {
    catalog: Catalog,
    mode: Mode,
    current_category: Option<String>,
    customization: Customization,
    locked_groups: LockedGroups,
    color_target: Box<dyn ColorTarget + Send>,
    characters: Vec<DemoCharacter>,
    selected_character: Option<u32>,
}

impl CustomizationStore {
    /// Build the store from `catalog`, push initial palette colors to
    /// `color_target` and resolve the initial locks.
    pub fn initialize(catalog: Catalog, color_target: Box<dyn ColorTarget + Send>) -> Self {
        let customization = initial_customization(&catalog);
        let locked_groups = resolve_locks(&customization, &catalog);
        let characters = bundled_characters();

        let mut store = Self {
            current_category: catalog.categories().first().map(|c| c.name.clone()),
            selected_character: characters.first().map(|c| c.id),
            mode: Mode::default(),
            catalog,
            customization,
            locked_groups,
            color_target,
            characters,
        };

        let initial_colors: Vec<String> = store
            .catalog
            .categories()
            .iter()
            .filter_map(|c| c.default_color().cloned())
            .collect();
        for color in initial_colors {
            store.color_target.set_color(&color);
        }

        store
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn customization(&self) -> &Customization {
        &self.customization
    }

    pub fn selection(&self, category_name: &str) -> Option<&Selection> {
        self.customization.get(category_name)
    }

    pub fn locked_groups(&self) -> &LockedGroups {
        &self.locked_groups
    }

    pub fn current_category(&self) -> Option<&Category> {
        self.current_category
            .as_deref()
            .and_then(|name| self.catalog.get(name))
    }

    pub fn characters(&self) -> &[DemoCharacter] {
        &self.characters
    }

    pub fn selected_character(&self) -> Option<&DemoCharacter> {
        let id = self.selected_character?;
        self.characters.iter().find(|c| c.id == id)
    }

    /// Snapshot of the trait tuple for the current customization.
    pub fn traits(&self) -> TraitTuple {
        TraitTuple::from_customization(&self.customization)
    }

    pub fn set_mode(&mut self, mode: Mode) {
        debug!(?mode, "mode switched");
        self.mode = mode;
    }

    /// Move the category cursor. Leaves the customization untouched.
    pub fn select_category(&mut self, name: &str) -> Result<&Category, CustomizationError> {
        let category = self
            .catalog
            .get(name)
            .ok_or_else(|| CustomizationError::UnknownCategory(name.to_string()))?;
        self.current_category = Some(category.name.clone());
        Ok(category)
    }

    pub fn select_character(&mut self, id: u32) -> Result<&DemoCharacter, CustomizationError> {
        self.require(Operation::SelectCharacter)?;
        let character = self
            .characters
            .iter()
            .find(|c| c.id == id)
            .ok_or(CustomizationError::UnknownCharacter(id))?;
        self.selected_character = Some(character.id);
        Ok(character)
    }

    /// Replace the asset of one category; `None` clears it.
    pub fn set_asset(
        &mut self,
        category_name: &str,
        asset_id: Option<u32>,
    ) -> Result<&Customization, CustomizationError> {
        self.require(Operation::SetAsset)?;
        let category = self.category(category_name)?;

        let asset = match asset_id {
            Some(id) => {
                if is_locked(&self.locked_groups, &category.name) {
                    let locked_by = self.locked_groups[&category.name]
                        .iter()
                        .map(|source| format!("{} ({})", source.asset_name, source.category_name))
                        .collect();
                    return Err(CustomizationError::CategoryLocked {
                        category: category.name.clone(),
                        locked_by,
                    });
                }
                let asset = category.asset(id).ok_or_else(|| CustomizationError::InvalidSelection {
                    category: category.name.clone(),
                    asset_id: id,
                })?;
                Some(asset.clone())
            }
            None if !category.removable => {
                return Err(CustomizationError::RemovalNotAllowed(category.name.clone()));
            }
            None => None,
        };

        let name = category.name.clone();
        let color = self.customization.get(&name).and_then(|s| s.color.clone());
        debug!(category = %name, asset = ?asset.as_ref().map(|a| a.id), "asset selected");
        self.customization.insert(name, Selection { asset, color });
        self.locked_groups = resolve_locks(&self.customization, &self.catalog);
        Ok(&self.customization)
    }

    /// Pick a palette color for one category and tint the shared material.
    pub fn set_color(
        &mut self,
        category_name: &str,
        color: &str,
    ) -> Result<&Customization, CustomizationError> {
        self.require(Operation::SetColor)?;
        let category = self.category(category_name)?;
        if !category.has_color(color) {
            return Err(CustomizationError::InvalidColor {
                category: category.name.clone(),
                color: color.to_string(),
            });
        }

        let name = category.name.clone();
        let asset = self.customization.get(&name).and_then(|s| s.asset.clone());
        debug!(category = %name, %color, "color selected");
        self.customization.insert(
            name,
            Selection {
                asset,
                color: Some(color.to_string()),
            },
        );
        self.color_target.set_color(color);
        Ok(&self.customization)
    }

    fn require(&self, operation: Operation) -> Result<(), CustomizationError> {
        if self.mode.permits(operation) {
            Ok(())
        } else {
            Err(CustomizationError::ModeMismatch {
                mode: self.mode,
                operation,
            })
        }
    }

    fn category(&self, name: &str) -> Result<&Category, CustomizationError> {
        self.catalog
            .get(name)
            .ok_or_else(|| CustomizationError::UnknownCategory(name.to_string()))
    }
}
