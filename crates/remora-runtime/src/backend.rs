use crate::RuntimeError;

/// External collaborator that materializes image build steps.
///
/// The builder drives steps one at a time, strictly in order, so the backend
/// never sees sequencing concerns: it executes a single shell-style command
/// against the named base layer and reports success or failure.
pub trait BuildBackend: Send + Sync {
    fn name(&self) -> &str;

    fn available(&self) -> bool;

    /// Execute one build step against the base layer.
    ///
    /// Returns [`RuntimeError::CommandFailed`] with the command's own message
    /// on failure; the caller attaches the step index.
    fn run_step(&self, base: &str, step: &str) -> Result<(), RuntimeError>;
}

pub fn select_backend(name: &str, store_root: &str) -> Result<Box<dyn BuildBackend>, RuntimeError> {
    match name {
        "shell" => Ok(Box::new(crate::shell::ShellBackend::with_store_root(
            store_root,
        ))),
        "mock" => Ok(Box::new(crate::mock::MockBackend::new())),
        other => Err(RuntimeError::BackendUnavailable(other.to_owned())),
    }
}
