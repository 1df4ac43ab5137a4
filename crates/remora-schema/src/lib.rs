//! Image manifests, build-step specifications, and content identity for Remora.
//!
//! This crate defines the schema layer: TOML manifest parsing (`ManifestV1`),
//! the immutable [`ImageSpec`] value type, deterministic image identity
//! computation (`ImageSpec::fingerprint`), and built-in preset definitions.

pub mod manifest;
pub mod preset;
pub mod spec;
pub mod types;

pub use manifest::{
    parse_manifest_file, parse_manifest_str, BaseSection, BuildSection, ManifestError, ManifestV1,
};
pub use preset::{get_preset, list_presets, Preset, BUILTIN_PRESETS};
pub use spec::{ImageIdentity, ImageSpec};
pub use types::{ImageId, SandboxId, ShortId};
