use crate::backend::BuildBackend;
use crate::RuntimeError;
use std::path::PathBuf;
use std::process::Command;
use tracing::debug;

/// Build backend that executes steps with `sh -c` inside a per-base scratch
/// directory under the store root.
///
/// Each base layer gets its own working directory keyed by a hash of the base
/// identifier, so steps for distinct bases never share filesystem state.
pub struct ShellBackend {
    store_root: PathBuf,
}

impl ShellBackend {
    pub fn with_store_root(store_root: impl Into<PathBuf>) -> Self {
        Self {
            store_root: store_root.into(),
        }
    }

    fn base_dir(&self, base: &str) -> PathBuf {
        // Base identifiers are caller-supplied strings; hash them rather than
        // trusting them as path components.
        let key = blake3::hash(base.as_bytes()).to_hex().to_string();
        self.store_root.join("build").join(&key[..16])
    }
}

impl BuildBackend for ShellBackend {
    fn name(&self) -> &'static str {
        "shell"
    }

    fn available(&self) -> bool {
        Command::new("sh")
            .arg("-c")
            .arg("true")
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    fn run_step(&self, base: &str, step: &str) -> Result<(), RuntimeError> {
        let dir = self.base_dir(base);
        std::fs::create_dir_all(&dir)?;

        debug!("running build step in {}: {step}", dir.display());
        let output = Command::new("sh")
            .arg("-c")
            .arg(step)
            .current_dir(&dir)
            .env("REMORA_BASE", base)
            .output()?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = if stderr.trim().is_empty() {
                format!("exit status {}", output.status)
            } else {
                stderr.trim().to_owned()
            };
            Err(RuntimeError::CommandFailed {
                step: step.to_owned(),
                message,
            })
        }
    }
}
