//! Lock Resolver
//!
//! Derives which categories are unavailable from the assets currently
//! selected. The result is always rebuilt from scratch; nothing here keeps
//! state between calls.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::customization::Customization;

#[cfg(feature = "test-hooks")]
use std::sync::atomic::{AtomicU32, Ordering};

#[cfg(feature = "test-hooks")]
static LOCK_RESOLUTION_COUNT: AtomicU32 = AtomicU32::new(0);

#[cfg(feature = "test-hooks")]
pub fn get_lock_resolution_count() -> u32 {
    LOCK_RESOLUTION_COUNT.load(Ordering::SeqCst)
}

/// A selected asset forcing a category into the locked state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockSource {
    pub asset_name: String,
    pub category_name: String,
}

/// Locked category name -> every source currently locking it.
pub type LockedGroups = BTreeMap<String, Vec<LockSource>>;

/// Compute the locked groups for `customization`.
///
/// Categories are walked in catalog order so the source lists are stable.
/// Group ids that name no category are ignored, as are self-locks.
pub fn resolve_locks(customization: &Customization, catalog: &Catalog) -> LockedGroups {
    #[cfg(feature = "test-hooks")]
    LOCK_RESOLUTION_COUNT.fetch_add(1, Ordering::SeqCst);

    let mut locked = LockedGroups::new();

    for category in catalog.categories() {
        let Some(asset) = customization
            .get(&category.name)
            .and_then(|selection| selection.asset.as_ref())
        else {
            continue;
        };

        for group in &asset.locked_groups {
            let Some(target) = catalog.get_by_id(group) else { continue };
            if target.id == category.id {
                continue;
            }
            locked.entry(target.name.clone()).or_default().push(LockSource {
                asset_name: asset.name.clone(),
                category_name: category.name.clone(),
            });
        }
    }

    locked
}

/// Whether `category_name` has at least one active lock.
pub fn is_locked(locked: &LockedGroups, category_name: &str) -> bool {
    locked.get(category_name).is_some_and(|sources| !sources.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Asset, CatalogDocument, Category};
    use crate::customization::Selection;

    fn category(id: &str, name: &str, position: i32, assets: Vec<Asset>) -> Category {
        Category {
            id: id.to_string(),
            name: name.to_string(),
            position,
            assets,
            removable: true,
            color_palette: None,
            starting_asset: None,
        }
    }

    fn catalog() -> Catalog {
        Catalog::from_document(CatalogDocument {
            categories: vec![
                category("hair", "Hair", 0, vec![Asset::new(1, "Mohawk").locking(&["hat"])]),
                category("glasses", "Glasses", 1, vec![Asset::new(2, "Visor").locking(&["hat", "faceDeco"])]),
                category("hat", "Hat", 2, vec![Asset::new(0, "Cap")]),
                category("faceDeco", "Face Deco", 3, vec![Asset::new(0, "Tattoo")]),
            ],
        })
        .unwrap()
    }

    fn select(customization: &mut Customization, catalog: &Catalog, name: &str, index: usize) {
        let asset = catalog.get(name).unwrap().assets[index].clone();
        customization.insert(name.to_string(), Selection { asset: Some(asset), color: None });
    }

    #[test]
    fn test_no_selection_no_locks() {
        let locked = resolve_locks(&Customization::new(), &catalog());
        assert!(locked.is_empty());
    }

    #[test]
    fn test_multiple_sources_accumulate() {
        let catalog = catalog();
        let mut customization = Customization::new();
        select(&mut customization, &catalog, "Hair", 0);
        select(&mut customization, &catalog, "Glasses", 0);

        let locked = resolve_locks(&customization, &catalog);
        assert_eq!(
            locked["Hat"],
            vec![
                LockSource { asset_name: "Mohawk".into(), category_name: "Hair".into() },
                LockSource { asset_name: "Visor".into(), category_name: "Glasses".into() },
            ]
        );
        assert_eq!(locked["Face Deco"].len(), 1);
        assert!(is_locked(&locked, "Hat"));
        assert!(!is_locked(&locked, "Hair"));
    }

    #[test]
    fn test_resolution_is_pure() {
        let catalog = catalog();
        let mut customization = Customization::new();
        select(&mut customization, &catalog, "Glasses", 0);
        assert_eq!(resolve_locks(&customization, &catalog), resolve_locks(&customization, &catalog));
    }

    #[test]
    fn test_clearing_source_clears_lock() {
        let catalog = catalog();
        let mut customization = Customization::new();
        select(&mut customization, &catalog, "Hair", 0);
        assert!(is_locked(&resolve_locks(&customization, &catalog), "Hat"));

        customization.insert("Hair".to_string(), Selection { asset: None, color: None });
        assert!(resolve_locks(&customization, &catalog).is_empty());
    }

    #[test]
    fn test_unknown_group_ignored() {
        let catalog = catalog();
        let mut customization = Customization::new();
        customization.insert(
            "Hat".to_string(),
            Selection { asset: Some(Asset::new(0, "Cap").locking(&["cape"])), color: None },
        );
        assert!(resolve_locks(&customization, &catalog).is_empty());
    }
}
