//! Orchestration core for Remora sandboxed dispatch.
//!
//! This crate ties together image specifications and runtime backends into
//! the caller-facing surface: the [`ImageBuilder`] with its process-wide
//! image cache, [`RegisteredFunction`] bindings of payloads to images, and
//! the [`Dispatcher`]/[`Session`] pair that runs one registered function
//! inside one freshly provisioned sandbox and returns its bytes.

pub mod builder;
pub mod dispatcher;
pub mod function;
pub mod session;

pub use builder::{ImageBuilder, ImageHandle};
pub use dispatcher::{DispatchOptions, Dispatcher};
pub use function::RegisteredFunction;
pub use session::Session;

use remora_runtime::RuntimeError;
use remora_schema::ManifestError;
use std::time::Duration;
use thiserror::Error;

/// Error taxonomy for the dispatch core.
///
/// Nothing here is silently recovered and there are no automatic retries:
/// every failure surfaces unchanged to the `invoke` caller.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid image specification: {0}")]
    InvalidSpecification(#[from] ManifestError),
    #[error("build step {step_index} failed: {source}")]
    BuildStepFailed {
        step_index: usize,
        #[source]
        source: RuntimeError,
    },
    #[error("sandbox provisioning failed: {0}")]
    SandboxProvisionFailed(String),
    #[error("payload execution failed: {0}")]
    PayloadExecutionFailed(String),
    #[error("invocation exceeded timeout of {0:?}")]
    InvocationTimeout(Duration),
    #[error("dispatch attempted outside an active session")]
    NoActiveSession,
    #[error("a session is already active for this dispatcher")]
    SessionActive,
    #[error("runtime error: {0}")]
    Runtime(#[from] RuntimeError),
}
