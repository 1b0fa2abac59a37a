//! TraitForge Core - avatar customization and publication
//!
//! # Guarantees
//! 1. The catalog is validated on load and immutable afterwards
//! 2. Every store mutation is all-or-nothing
//! 3. Locks are recomputed wholesale after each asset change
//! 4. Fingerprints depend only on the canonical trait tuple
//! 5. Published metadata and fingerprint come from one trait snapshot

pub mod catalog;
pub mod validation;
pub mod customization;
pub mod locks;
pub mod traits;
pub mod hashing;
pub mod export;
pub mod content;
pub mod pipeline;
pub mod session;
pub mod config;

pub use catalog::{Asset, Catalog, CatalogError, CatalogSource, Category, load_catalog, load_catalog_or_default};
pub use validation::{ValidationResult, ValidationRule, ValidationViolation, ViolationSeverity};
pub use customization::{ColorTarget, Customization, CustomizationError, CustomizationStore, Mode, Selection};
pub use locks::{resolve_locks, LockSource, LockedGroups};
pub use traits::{TraitSlot, TraitTuple};
pub use hashing::{canonical_json, fingerprint, TraitFingerprint};
pub use export::{export_model, ExportError, GltfParts, SceneSource};
pub use content::{asset_url, resolve_http, to_content_uri, ContentError, ContentStore, JsonFetcher};
pub use pipeline::{PublicationPipeline, PublishRequest, PublishedAvatar, PipelineError};
pub use session::{HostHandoff, Tier, User};
pub use config::Config;
