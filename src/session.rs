//! Session - wallet tier gating and host handoff
//!
//! Authentication itself is external: the core only reads the wallet
//! address it is given and derives the tier from it.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::customization::{CustomizationStore, Mode};
use crate::hashing::{fingerprint, TraitFingerprint};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("A connected wallet is required for the {0:?} tier")]
    WalletRequired(Tier),

    #[error("No character selected")]
    NothingSelected,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    #[default]
    None,
    Whitelist,
    Presale,
}

impl Tier {
    /// Tiers allowed to run the publication pipeline.
    pub fn may_publish(self) -> bool {
        matches!(self, Tier::Whitelist | Tier::Presale)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub wallet_address: Option<String>,
    pub tier: Tier,
}

impl User {
    /// Record the wallet reported by the authentication collaborator.
    /// Connecting yields `whitelist`, disconnecting resets to `none`.
    pub fn set_wallet(&mut self, address: Option<String>) {
        self.tier = if address.is_some() { Tier::Whitelist } else { Tier::None };
        self.wallet_address = address;
        info!(tier = ?self.tier, connected = self.wallet_address.is_some(), "wallet updated");
    }

    /// Explicit upgrade path to presale.
    pub fn promote_to_presale(&mut self) -> Result<(), SessionError> {
        if self.wallet_address.is_none() {
            return Err(SessionError::WalletRequired(Tier::Presale));
        }
        self.tier = Tier::Presale;
        Ok(())
    }
}

/// What the host application receives when the user is done.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum HandoffSelection {
    /// A bundled demo character.
    Character { id: u32, name: String, model: String },
    /// A custom trait combination.
    Traits {
        #[serde(rename = "traitFingerprint")]
        trait_fingerprint: TraitFingerprint,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostHandoff {
    pub wallet_address: String,
    pub selection: HandoffSelection,
}

impl HostHandoff {
    /// Build the handoff for the store's current mode: the selected
    /// character in demo mode, the trait fingerprint in creator mode.
    pub fn from_store(user: &User, store: &CustomizationStore) -> Result<Self, SessionError> {
        let wallet_address = user
            .wallet_address
            .clone()
            .ok_or(SessionError::WalletRequired(Tier::Whitelist))?;

        let selection = match store.mode() {
            Mode::Demo => {
                let character = store.selected_character().ok_or(SessionError::NothingSelected)?;
                HandoffSelection::Character {
                    id: character.id,
                    name: character.name.clone(),
                    model: character.model.clone(),
                }
            }
            Mode::Creator => HandoffSelection::Traits {
                trait_fingerprint: fingerprint(&store.traits()),
            },
        };

        Ok(Self { wallet_address, selection })
    }
}
