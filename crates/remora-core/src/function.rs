use crate::CoreError;
use remora_runtime::{payload, Payload, PayloadError};
use remora_schema::{ImageSpec, ManifestV1};

/// A plain callable bound to the image specification it must run inside.
///
/// Created once at program setup and read-only afterward. The core never
/// inspects the payload; it only schedules its execution. Registration is a
/// pure binding: it neither builds the image nor invokes the payload.
#[derive(Clone)]
pub struct RegisteredFunction {
    spec: ImageSpec,
    payload: Payload,
}

impl RegisteredFunction {
    /// Bind a payload to an image specification.
    ///
    /// Infallible: every `ImageSpec` was validated at construction, so there
    /// is no malformed state left to reject here.
    pub fn register(spec: ImageSpec, payload: Payload) -> Self {
        Self { spec, payload }
    }

    /// Bind a plain closure to an image specification.
    pub fn register_fn<F>(spec: ImageSpec, f: F) -> Self
    where
        F: Fn(&str) -> Result<Vec<u8>, PayloadError> + Send + Sync + 'static,
    {
        Self::register(spec, payload(f))
    }

    /// Bind a payload to the image described by a parsed manifest,
    /// normalizing and validating it first.
    pub fn register_manifest(manifest: &ManifestV1, payload: Payload) -> Result<Self, CoreError> {
        let spec = manifest.normalize()?;
        Ok(Self::register(spec, payload))
    }

    pub fn spec(&self) -> &ImageSpec {
        &self.spec
    }

    pub(crate) fn payload(&self) -> &Payload {
        &self.payload
    }
}

impl std::fmt::Debug for RegisteredFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredFunction")
            .field("spec", &self.spec)
            .field("payload", &"<fn>")
            .finish()
    }
}
