//! Build backends and sandbox runtimes for Remora.
//!
//! This crate implements the execution layer: the [`BuildBackend`] trait for
//! materializing image build steps (shell and mock implementations), and the
//! [`SandboxRuntime`] trait for provisioning isolated sandbox instances,
//! executing payloads inside them, and tearing them down.

pub mod backend;
pub mod local;
pub mod mock;
pub mod sandbox;
pub mod shell;

pub use backend::{select_backend, BuildBackend};
pub use local::LocalRuntime;
pub use mock::{MockBackend, MockRuntime};
pub use sandbox::{payload, Payload, PayloadError, PayloadFn, SandboxInstance, SandboxRuntime};
pub use shell::ShellBackend;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("runtime I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("backend '{0}' is not available on this system")]
    BackendUnavailable(String),
    #[error("build command failed: '{step}': {message}")]
    CommandFailed { step: String, message: String },
    #[error("sandbox provisioning failed: {0}")]
    ProvisionFailed(String),
    #[error("unknown sandbox instance: {0}")]
    UnknownSandbox(String),
    #[error("payload execution failed: {0}")]
    PayloadFailed(String),
}
