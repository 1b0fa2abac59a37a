//! Trait Slots - the fixed, ordered trait tuple used for minting.
//!
//! Slot order is part of the published contract: both the fingerprint and the
//! metadata attribute list read slots in `TraitSlot::ALL` order.

use serde::{Deserialize, Serialize};

use crate::customization::Customization;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TraitSlot {
    Skin,
    Neck,
    FaceDeco,
    Face,
    Brows,
    Mouth,
    Earrings,
    EyeColor,
    Eyes,
    Hair,
    Glasses,
    Shirt,
    Hat,
}

impl TraitSlot {
    pub const COUNT: usize = 13;

    pub const ALL: [TraitSlot; Self::COUNT] = [
        TraitSlot::Skin,
        TraitSlot::Neck,
        TraitSlot::FaceDeco,
        TraitSlot::Face,
        TraitSlot::Brows,
        TraitSlot::Mouth,
        TraitSlot::Earrings,
        TraitSlot::EyeColor,
        TraitSlot::Eyes,
        TraitSlot::Hair,
        TraitSlot::Glasses,
        TraitSlot::Shirt,
        TraitSlot::Hat,
    ];

    /// Position of this slot in the canonical tuple.
    pub fn index(self) -> usize {
        self as usize
    }

    /// `trait_type` label used in published metadata.
    pub fn trait_type(self) -> &'static str {
        match self {
            TraitSlot::Skin => "Skin",
            TraitSlot::Neck => "Neck",
            TraitSlot::FaceDeco => "Face Deco",
            TraitSlot::Face => "Face",
            TraitSlot::Brows => "Brows",
            TraitSlot::Mouth => "Mouth",
            TraitSlot::Earrings => "Earrings",
            TraitSlot::EyeColor => "Eye Color",
            TraitSlot::Eyes => "Eyes",
            TraitSlot::Hair => "Hair",
            TraitSlot::Glasses => "Glasses",
            TraitSlot::Shirt => "Shirt",
            TraitSlot::Hat => "Hat",
        }
    }

    /// Catalog category (by display name) that feeds this slot.
    /// Eye color has no category yet and always reads zero.
    pub fn category_name(self) -> Option<&'static str> {
        match self {
            TraitSlot::EyeColor => None,
            other => Some(other.trait_type()),
        }
    }
}

/// Snapshot of one trait id per slot, in canonical order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TraitTuple([u32; TraitSlot::COUNT]);

impl TraitTuple {
    pub fn from_values(values: [u32; TraitSlot::COUNT]) -> Self {
        Self(values)
    }

    /// Read the selected asset id of every slot's category; a missing
    /// category or an empty selection defaults to zero.
    pub fn from_customization(customization: &Customization) -> Self {
        let mut values = [0u32; TraitSlot::COUNT];
        for slot in TraitSlot::ALL {
            values[slot.index()] = slot
                .category_name()
                .and_then(|name| customization.get(name))
                .and_then(|selection| selection.asset.as_ref())
                .map_or(0, |asset| asset.id);
        }
        Self(values)
    }

    pub fn get(&self, slot: TraitSlot) -> u32 {
        self.0[slot.index()]
    }

    pub fn with(mut self, slot: TraitSlot, value: u32) -> Self {
        self.0[slot.index()] = value;
        self
    }

    /// Slots paired with their values, in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = (TraitSlot, u32)> + '_ {
        TraitSlot::ALL.iter().map(move |slot| (*slot, self.get(*slot)))
    }

    /// `-`-delimited ASCII encoding consumed by the fingerprint.
    pub fn canonical_string(&self) -> String {
        self.0
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join("-")
    }

    /// Parse a comma separated list of exactly thirteen integers.
    pub fn parse_list(raw: &str) -> Result<Self, String> {
        let parsed: Vec<u32> = raw
            .split(',')
            .map(|part| {
                part.trim()
                    .parse::<u32>()
                    .map_err(|e| format!("invalid trait id '{}': {}", part.trim(), e))
            })
            .collect::<Result<_, _>>()?;
        let values: [u32; TraitSlot::COUNT] = parsed.try_into().map_err(|v: Vec<u32>| {
            format!("expected {} trait ids, got {}", TraitSlot::COUNT, v.len())
        })?;
        Ok(Self(values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Asset;
    use crate::customization::Selection;

    #[test]
    fn test_slot_order_is_canonical() {
        let labels: Vec<_> = TraitSlot::ALL.iter().map(|s| s.trait_type()).collect();
        assert_eq!(
            labels,
            vec![
                "Skin", "Neck", "Face Deco", "Face", "Brows", "Mouth", "Earrings",
                "Eye Color", "Eyes", "Hair", "Glasses", "Shirt", "Hat"
            ]
        );
        for (i, slot) in TraitSlot::ALL.iter().enumerate() {
            assert_eq!(slot.index(), i);
        }
    }

    #[test]
    fn test_canonical_string() {
        let traits = TraitTuple::default().with(TraitSlot::Hair, 3);
        assert_eq!(traits.canonical_string(), "0-0-0-0-0-0-0-0-0-3-0-0-0");
    }

    #[test]
    fn test_from_customization_defaults_missing_to_zero() {
        let mut customization = Customization::new();
        customization.insert(
            "Hat".to_string(),
            Selection { asset: Some(Asset::new(4, "Cap")), color: None },
        );
        customization.insert("Glasses".to_string(), Selection { asset: None, color: None });

        let traits = TraitTuple::from_customization(&customization);
        assert_eq!(traits.get(TraitSlot::Hat), 4);
        assert_eq!(traits.get(TraitSlot::Glasses), 0);
        assert_eq!(traits.get(TraitSlot::Skin), 0);
        assert_eq!(traits.get(TraitSlot::EyeColor), 0);
    }

    #[test]
    fn test_parse_list() {
        let traits = TraitTuple::parse_list("1,2,3,4,5,6,7,8,9,10,11,12,13").unwrap();
        assert_eq!(traits.get(TraitSlot::Skin), 1);
        assert_eq!(traits.get(TraitSlot::Hat), 13);

        assert!(TraitTuple::parse_list("1,2,3").is_err());
        assert!(TraitTuple::parse_list("a,2,3,4,5,6,7,8,9,10,11,12,13").is_err());
    }
}
