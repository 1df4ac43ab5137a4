use crate::RuntimeError;
use remora_schema::{ImageId, SandboxId};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Error raised by a payload during execution, carrying whatever message the
/// payload produced.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct PayloadError(pub String);

impl PayloadError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// The caller-supplied unit of work: takes a primitive argument, returns a
/// byte buffer or raises. Opaque to the runtime beyond this signature.
pub type PayloadFn = dyn Fn(&str) -> Result<Vec<u8>, PayloadError> + Send + Sync;

/// Shared handle to a payload, cheap to clone across dispatch boundaries.
pub type Payload = Arc<PayloadFn>;

/// A live sandbox instance provisioned from a built image.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SandboxInstance {
    pub id: SandboxId,
    pub image: ImageId,
    pub workdir: PathBuf,
}

/// External collaborator that provisions isolated, ephemeral execution
/// environments from built images.
///
/// `stop` must be idempotent: stopping an instance that is already gone is a
/// no-op, so teardown can run unconditionally on every exit path.
pub trait SandboxRuntime: Send + Sync {
    fn name(&self) -> &str;

    fn start(&self, image: &ImageId) -> Result<SandboxInstance, RuntimeError>;

    fn execute(
        &self,
        instance: &SandboxInstance,
        payload: &PayloadFn,
        arg: &str,
    ) -> Result<Vec<u8>, RuntimeError>;

    fn stop(&self, instance: &SandboxInstance) -> Result<(), RuntimeError>;
}

/// Wrap a plain closure as a shareable [`Payload`].
pub fn payload<F>(f: F) -> Payload
where
    F: Fn(&str) -> Result<Vec<u8>, PayloadError> + Send + Sync + 'static,
{
    Arc::new(f)
}
