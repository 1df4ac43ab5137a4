use crate::manifest::ManifestError;
use crate::types::{ImageId, ShortId};
use serde::{Deserialize, Serialize};

/// Immutable, declarative description of a container image: a base layer plus
/// an ordered list of build steps.
///
/// Construction validates the content, so every `ImageSpec` in existence is
/// well-formed. Two specs with identical `(base, steps)` are interchangeable:
/// they produce the same [`ImageIdentity`] and hit the same builder cache
/// entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImageSpec {
    base: String,
    steps: Vec<String>,
}

/// Deterministic identity for an image, derived from its specification content.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ImageIdentity {
    pub image_id: ImageId,
    pub short_id: ShortId,
}

impl ImageSpec {
    /// Create a specification from a base identifier and ordered build steps.
    ///
    /// Fails fast with [`ManifestError::EmptyBaseImage`] if the base is blank
    /// and [`ManifestError::EmptyBuildStep`] if any step is blank.
    pub fn new(
        base: impl Into<String>,
        steps: impl IntoIterator<Item = impl Into<String>>,
    ) -> Result<Self, ManifestError> {
        let base = base.into();
        if base.trim().is_empty() {
            return Err(ManifestError::EmptyBaseImage);
        }
        let steps: Vec<String> = steps.into_iter().map(Into::into).collect();
        for (index, step) in steps.iter().enumerate() {
            if step.trim().is_empty() {
                return Err(ManifestError::EmptyBuildStep(index));
            }
        }
        Ok(Self { base, steps })
    }

    /// Create a specification with a base layer and no build steps.
    pub fn from_base(base: impl Into<String>) -> Result<Self, ManifestError> {
        Self::new(base, Vec::<String>::new())
    }

    /// Return a new specification with the given commands appended to the
    /// step list, preserving order. The receiver is unchanged.
    pub fn run_commands(
        &self,
        commands: impl IntoIterator<Item = impl Into<String>>,
    ) -> Result<Self, ManifestError> {
        let mut steps = self.steps.clone();
        steps.extend(commands.into_iter().map(Into::into));
        Self::new(self.base.clone(), steps)
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn steps(&self) -> &[String] {
        &self.steps
    }

    /// Compute the content-derived identity of this specification.
    ///
    /// The fingerprint is a blake3 hash over the length-prefixed base and
    /// each length-prefixed step in order, so step order is significant,
    /// field boundaries cannot blend, and equal content always yields an
    /// equal id.
    pub fn fingerprint(&self) -> ImageIdentity {
        let mut hasher = blake3::Hasher::new();

        // Every field is length-prefixed: content shifted across a field
        // boundary must change the encoding, never just the concatenation.
        hasher.update(&(self.base.len() as u64).to_le_bytes());
        hasher.update(self.base.as_bytes());
        hasher.update(&(self.steps.len() as u64).to_le_bytes());
        for step in &self.steps {
            hasher.update(&(step.len() as u64).to_le_bytes());
            hasher.update(step.as_bytes());
        }

        let hex = hasher.finalize().to_hex().to_string();
        let short = hex[..12].to_owned();

        ImageIdentity {
            image_id: ImageId::new(hex),
            short_id: ShortId::new(short),
        }
    }
}
