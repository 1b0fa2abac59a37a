//! Hashing System - Content Digests and Trait Fingerprints
//!
//! Two families of hash live here:
//! - SHA-256 digests, used to address content blobs and canonical documents.
//! - The trait fingerprint, a rolling polynomial over the canonical trait
//!   string. It is NOT collision resistant and must only be used to signal
//!   duplicate trait combinations, never for integrity.

use std::fmt;

use primitive_types::U256;
use serde::{Deserialize, Serialize};
use serde_json::{to_string, Value};
use sha2::{Digest, Sha256};

use crate::traits::TraitTuple;

/// Multiplier of the fingerprint accumulator.
const FINGERPRINT_BASE: u64 = 31;

/// Compute SHA-256 hash of bytes, return hex string
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    hex::encode(result)
}

/// Convert to canonical JSON (sorted keys, no whitespace)
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let v: Value = serde_json::to_value(value)?;
    let sorted = sort_value(&v);
    to_string(&sorted)
}

fn sort_value(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut sorted: Vec<_> = map.iter().collect();
            sorted.sort_by(|a, b| a.0.cmp(b.0));
            let sorted_map: serde_json::Map<String, Value> = sorted
                .into_iter()
                .map(|(k, v)| (k.clone(), sort_value(v)))
                .collect();
            Value::Object(sorted_map)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sort_value).collect()),
        _ => v.clone(),
    }
}

/// Deterministic 256-bit identifier of a trait combination.
///
/// Displays as `0x` followed by 64 lowercase hex digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TraitFingerprint(U256);

impl TraitFingerprint {
    pub fn to_hex(&self) -> String {
        let mut bytes = [0u8; 32];
        self.0.to_big_endian(&mut bytes);
        format!("0x{}", hex::encode(bytes))
    }
}

impl fmt::Display for TraitFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for TraitFingerprint {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for TraitFingerprint {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        let digits = raw
            .strip_prefix("0x")
            .ok_or_else(|| serde::de::Error::custom("fingerprint must start with 0x"))?;
        if digits.len() != 64 {
            return Err(serde::de::Error::custom("fingerprint must have 64 hex digits"));
        }
        U256::from_str_radix(digits, 16)
            .map(TraitFingerprint)
            .map_err(serde::de::Error::custom)
    }
}

/// Compute the trait fingerprint: `hash = (hash * 31 + byte) mod 2^256`
/// over every byte of the canonical trait string, seeded at zero.
pub fn fingerprint(traits: &TraitTuple) -> TraitFingerprint {
    let base = U256::from(FINGERPRINT_BASE);
    let hash = traits
        .canonical_string()
        .bytes()
        .fold(U256::zero(), |hash, byte| {
            let (scaled, _) = hash.overflowing_mul(base);
            let (next, _) = scaled.overflowing_add(U256::from(byte));
            next
        });
    TraitFingerprint(hash)
}

// We need hex encoding
mod hex {
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        bytes.as_ref().iter().map(|b| format!("{:02x}", b)).collect()
    }
}
