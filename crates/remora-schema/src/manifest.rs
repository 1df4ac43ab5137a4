use crate::spec::ImageSpec;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read manifest file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse manifest: {0}")]
    ParseToml(#[from] toml::de::Error),
    #[error("unsupported manifest_version: {0}, expected 1")]
    UnsupportedVersion(u32),
    #[error("base.image must not be empty")]
    EmptyBaseImage,
    #[error("build step {0} must not be empty")]
    EmptyBuildStep(usize),
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ManifestV1 {
    pub manifest_version: u32,
    pub base: BaseSection,
    #[serde(default)]
    pub build: BuildSection,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct BaseSection {
    pub image: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct BuildSection {
    #[serde(default)]
    pub steps: Vec<String>,
}

impl ManifestV1 {
    /// Normalize the manifest into a validated [`ImageSpec`].
    ///
    /// Step order is preserved exactly as written: later steps may depend on
    /// earlier ones, so no sorting or deduplication is applied.
    pub fn normalize(&self) -> Result<ImageSpec, ManifestError> {
        if self.manifest_version != 1 {
            return Err(ManifestError::UnsupportedVersion(self.manifest_version));
        }
        ImageSpec::new(self.base.image.trim(), self.build.steps.clone())
    }
}

pub fn parse_manifest_str(input: &str) -> Result<ManifestV1, ManifestError> {
    Ok(toml::from_str(input)?)
}

pub fn parse_manifest_file(path: impl AsRef<Path>) -> Result<ManifestV1, ManifestError> {
    let content = fs::read_to_string(path)?;
    parse_manifest_str(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_manifest() {
        let input = r#"
manifest_version = 1

[base]
image = "debian-slim"

[build]
steps = [
    "apt-get update",
    "apt-get install -y curl",
]
"#;
        let manifest = parse_manifest_str(input).unwrap();
        assert_eq!(manifest.manifest_version, 1);
        assert_eq!(manifest.base.image, "debian-slim");
        assert_eq!(manifest.build.steps.len(), 2);
    }

    #[test]
    fn build_section_is_optional() {
        let input = r#"
manifest_version = 1
[base]
image = "debian-slim"
"#;
        let manifest = parse_manifest_str(input).unwrap();
        assert!(manifest.build.steps.is_empty());
        let spec = manifest.normalize().unwrap();
        assert!(spec.steps().is_empty());
    }

    #[test]
    fn unknown_fields_rejected() {
        let input = r#"
manifest_version = 1
[base]
image = "debian-slim"
[network]
isolated = true
"#;
        assert!(parse_manifest_str(input).is_err());
    }

    #[test]
    fn unsupported_version_fails_normalize() {
        let input = r#"
manifest_version = 2
[base]
image = "debian-slim"
"#;
        let manifest = parse_manifest_str(input).unwrap();
        assert!(matches!(
            manifest.normalize(),
            Err(ManifestError::UnsupportedVersion(2))
        ));
    }

    #[test]
    fn empty_base_image_fails_normalize() {
        let input = r#"
manifest_version = 1
[base]
image = "   "
"#;
        let manifest = parse_manifest_str(input).unwrap();
        assert!(matches!(
            manifest.normalize(),
            Err(ManifestError::EmptyBaseImage)
        ));
    }

    #[test]
    fn normalize_preserves_step_order() {
        let input = r#"
manifest_version = 1
[base]
image = "debian-slim"
[build]
steps = ["b", "a", "c"]
"#;
        let spec = parse_manifest_str(input).unwrap().normalize().unwrap();
        assert_eq!(spec.steps(), ["b", "a", "c"]);
    }

    #[test]
    fn parse_manifest_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("remora.toml");
        std::fs::write(
            &path,
            "manifest_version = 1\n[base]\nimage = \"debian-slim\"\n",
        )
        .unwrap();
        let manifest = parse_manifest_file(&path).unwrap();
        assert_eq!(manifest.base.image, "debian-slim");
    }
}
