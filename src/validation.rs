//! Catalog Validation - Rule/Policy Separation
//!
//! Rules produce structured violations.
//! Policy: any error blocks the catalog, warnings are recorded and logged.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::catalog::Category;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ViolationSeverity {
    Error,
    Warning,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationViolation {
    pub rule: String,
    pub severity: ViolationSeverity,
    pub message: String,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub violations: Vec<ValidationViolation>,
}

impl ValidationResult {
    pub fn has_errors(&self) -> bool {
        self.violations.iter().any(|v| v.severity == ViolationSeverity::Error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &ValidationViolation> {
        self.violations.iter().filter(|v| v.severity == ViolationSeverity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ValidationViolation> {
        self.violations.iter().filter(|v| v.severity == ViolationSeverity::Warning)
    }

    /// One line per error, `rule: message`.
    pub fn error_summary(&self) -> String {
        self.errors()
            .map(|v| format!("{}: {}", v.rule, v.message))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Validation rule trait - produces violations
pub trait ValidationRule {
    fn name(&self) -> &'static str;
    fn validate(&self, categories: &[Category]) -> Vec<ValidationViolation>;

    fn error(&self, category: &Category, message: String) -> ValidationViolation {
        ValidationViolation {
            rule: self.name().to_string(),
            severity: ViolationSeverity::Error,
            message,
            category: Some(category.id.clone()),
        }
    }
}

// --- Concrete Rules ---

pub struct UniquePositionRule;

impl ValidationRule for UniquePositionRule {
    fn name(&self) -> &'static str { "unique_position" }

    fn validate(&self, categories: &[Category]) -> Vec<ValidationViolation> {
        let mut seen: HashMap<i32, &str> = HashMap::new();
        let mut violations = vec![];
        for category in categories {
            if let Some(first) = seen.insert(category.position, &category.id) {
                violations.push(self.error(
                    category,
                    format!("position {} already used by '{}'", category.position, first),
                ));
            }
        }
        violations
    }
}

pub struct UniqueCategoryRule;

impl ValidationRule for UniqueCategoryRule {
    fn name(&self) -> &'static str { "unique_category" }

    fn validate(&self, categories: &[Category]) -> Vec<ValidationViolation> {
        let mut ids = HashSet::new();
        let mut names = HashSet::new();
        let mut violations = vec![];
        for category in categories {
            if !ids.insert(category.id.as_str()) {
                violations.push(self.error(category, format!("duplicate category id '{}'", category.id)));
            }
            if !names.insert(category.name.as_str()) {
                violations.push(self.error(category, format!("duplicate category name '{}'", category.name)));
            }
        }
        violations
    }
}

pub struct UniqueAssetRule;

impl ValidationRule for UniqueAssetRule {
    fn name(&self) -> &'static str { "unique_asset" }

    fn validate(&self, categories: &[Category]) -> Vec<ValidationViolation> {
        let mut violations = vec![];
        for category in categories {
            let mut ids = HashSet::new();
            for asset in &category.assets {
                if !ids.insert(asset.id) {
                    violations.push(self.error(
                        category,
                        format!("asset id {} appears more than once", asset.id),
                    ));
                }
            }
        }
        violations
    }
}

/// An asset may never lock the category it belongs to.
pub struct SelfLockRule;

impl ValidationRule for SelfLockRule {
    fn name(&self) -> &'static str { "self_lock" }

    fn validate(&self, categories: &[Category]) -> Vec<ValidationViolation> {
        categories
            .iter()
            .flat_map(|category| {
                category
                    .assets
                    .iter()
                    .filter(|asset| asset.locked_groups.iter().any(|g| *g == category.id))
                    .map(move |asset| {
                        self.error(category, format!("asset '{}' locks its own category", asset.name))
                    })
            })
            .collect()
    }
}

pub struct LockTargetRule;

impl ValidationRule for LockTargetRule {
    fn name(&self) -> &'static str { "lock_target" }

    fn validate(&self, categories: &[Category]) -> Vec<ValidationViolation> {
        let known: HashSet<&str> = categories.iter().map(|c| c.id.as_str()).collect();
        let mut violations = vec![];
        for category in categories {
            for asset in &category.assets {
                for group in &asset.locked_groups {
                    if !known.contains(group.as_str()) {
                        violations.push(ValidationViolation {
                            rule: self.name().to_string(),
                            severity: ViolationSeverity::Warning,
                            message: format!("asset '{}' locks unknown category '{}'", asset.name, group),
                            category: Some(category.id.clone()),
                        });
                    }
                }
            }
        }
        violations
    }
}

pub struct StartingAssetRule;

impl ValidationRule for StartingAssetRule {
    fn name(&self) -> &'static str { "starting_asset" }

    fn validate(&self, categories: &[Category]) -> Vec<ValidationViolation> {
        let mut violations = vec![];
        for category in categories {
            let Some(start) = category.starting_asset else { continue };
            let message = if category.assets.is_empty() {
                format!("starting asset {} set on a category without assets, left empty", start)
            } else if category.asset(start).is_none() {
                format!("starting asset {} not found, first asset is used", start)
            } else {
                continue;
            };
            violations.push(ValidationViolation {
                rule: self.name().to_string(),
                severity: ViolationSeverity::Warning,
                message,
                category: Some(category.id.clone()),
            });
        }
        violations
    }
}

pub struct PaletteRule;

impl ValidationRule for PaletteRule {
    fn name(&self) -> &'static str { "color_palette" }

    fn validate(&self, categories: &[Category]) -> Vec<ValidationViolation> {
        categories
            .iter()
            .filter(|c| c.color_palette.as_ref().is_some_and(|p| p.is_empty()))
            .map(|c| self.error(c, "color palette is empty".to_string()))
            .collect()
    }
}

/// Validator orchestrates rules and applies policy
pub struct Validator {
    rules: Vec<Box<dyn ValidationRule>>,
}

impl Validator {
    pub fn new() -> Self {
        Self {
            rules: vec![
                Box::new(UniquePositionRule),
                Box::new(UniqueCategoryRule),
                Box::new(UniqueAssetRule),
                Box::new(SelfLockRule),
                Box::new(LockTargetRule),
                Box::new(StartingAssetRule),
                Box::new(PaletteRule),
            ],
        }
    }

    pub fn validate(&self, categories: &[Category]) -> ValidationResult {
        let violations: Vec<_> = self
            .rules
            .iter()
            .flat_map(|rule| rule.validate(categories))
            .collect();
        let mut result = ValidationResult { valid: true, violations };
        result.valid = !result.has_errors();
        result
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Asset, Catalog};

    fn category(id: &str, position: i32) -> Category {
        Category {
            id: id.to_string(),
            name: id.to_uppercase(),
            position,
            assets: vec![Asset::new(0, "Default")],
            removable: false,
            color_palette: None,
            starting_asset: Some(0),
        }
    }

    #[test]
    fn test_bundled_catalog_is_valid() {
        let catalog = Catalog::bundled();
        let result = Validator::new().validate(catalog.categories());
        assert!(result.valid, "{}", result.error_summary());
        assert!(result.violations.is_empty());
    }

    #[test]
    fn test_duplicate_position_is_error() {
        let result = Validator::new().validate(&[category("a", 1), category("b", 1)]);
        assert!(!result.valid);
        assert!(result.errors().any(|v| v.rule == "unique_position"));
    }

    #[test]
    fn test_self_lock_is_error() {
        let mut hat = category("hat", 0);
        hat.assets[0].locked_groups = vec!["hat".to_string()];
        let result = Validator::new().validate(&[hat]);
        assert!(!result.valid);
        assert!(result.errors().any(|v| v.rule == "self_lock"));
    }

    #[test]
    fn test_unknown_lock_target_is_warning() {
        let mut hat = category("hat", 0);
        hat.assets[0].locked_groups = vec!["cape".to_string()];
        let result = Validator::new().validate(&[hat]);
        assert!(result.valid);
        assert_eq!(result.warnings().count(), 1);
    }

    #[test]
    fn test_duplicate_asset_id_is_error() {
        let mut hair = category("hair", 0);
        hair.assets.push(Asset::new(0, "Again"));
        let result = Validator::new().validate(&[hair]);
        assert!(result.errors().any(|v| v.rule == "unique_asset"));
    }

    #[test]
    fn test_starting_asset_problems_are_warnings() {
        let mut face = category("face", 0);
        face.assets.clear();
        let mut hat = category("hat", 1);
        hat.starting_asset = Some(7);

        let result = Validator::new().validate(&[face, hat]);
        assert!(result.valid);
        assert!(!result.has_errors());
        assert_eq!(result.warnings().filter(|v| v.rule == "starting_asset").count(), 2);
    }

    #[test]
    fn test_empty_palette_is_error() {
        let mut skin = category("skin", 0);
        skin.color_palette = Some(vec![]);
        let result = Validator::new().validate(&[skin]);
        assert!(result.errors().any(|v| v.rule == "color_palette"));
    }
}
