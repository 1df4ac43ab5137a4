use crate::sandbox::{PayloadFn, SandboxInstance, SandboxRuntime};
use crate::RuntimeError;
use remora_schema::{ImageId, SandboxId};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tracing::debug;

/// In-process sandbox runtime backed by per-instance working directories.
///
/// `start` provisions a fresh directory under the store root and records the
/// instance in a live table; `execute` runs the payload in-process after
/// confirming the instance is still live; `stop` removes the directory and
/// forgets the instance. Stopping an unknown instance is a no-op. The
/// per-instance directory marks the sandbox lifetime on disk; payloads
/// receive only their argument string.
pub struct LocalRuntime {
    store_root: PathBuf,
    live: Mutex<HashMap<SandboxId, PathBuf>>,
    counter: AtomicU64,
}

impl LocalRuntime {
    pub fn with_store_root(store_root: impl Into<PathBuf>) -> Self {
        Self {
            store_root: store_root.into(),
            live: Mutex::new(HashMap::new()),
            counter: AtomicU64::new(0),
        }
    }

    /// Number of currently live sandbox instances.
    pub fn live_count(&self) -> usize {
        self.live.lock().map(|l| l.len()).unwrap_or(0)
    }
}

impl SandboxRuntime for LocalRuntime {
    fn name(&self) -> &'static str {
        "local"
    }

    fn start(&self, image: &ImageId) -> Result<SandboxInstance, RuntimeError> {
        let seq = self.counter.fetch_add(1, Ordering::SeqCst);
        let short = &image.as_str()[..12.min(image.as_str().len())];
        let id = SandboxId::new(format!("sbx-{short}-{seq:04}"));

        let workdir = self.store_root.join("sandboxes").join(id.as_str());
        std::fs::create_dir_all(&workdir)
            .map_err(|e| RuntimeError::ProvisionFailed(format!("{}: {e}", workdir.display())))?;

        let mut live = self
            .live
            .lock()
            .map_err(|e| RuntimeError::ProvisionFailed(format!("mutex poisoned: {e}")))?;
        live.insert(id.clone(), workdir.clone());
        debug!("provisioned sandbox {id} at {}", workdir.display());

        Ok(SandboxInstance {
            id,
            image: image.clone(),
            workdir,
        })
    }

    fn execute(
        &self,
        instance: &SandboxInstance,
        payload: &PayloadFn,
        arg: &str,
    ) -> Result<Vec<u8>, RuntimeError> {
        {
            let live = self
                .live
                .lock()
                .map_err(|e| RuntimeError::PayloadFailed(format!("mutex poisoned: {e}")))?;
            if !live.contains_key(&instance.id) {
                return Err(RuntimeError::UnknownSandbox(instance.id.to_string()));
            }
        }
        payload(arg).map_err(|e| RuntimeError::PayloadFailed(e.to_string()))
    }

    fn stop(&self, instance: &SandboxInstance) -> Result<(), RuntimeError> {
        let removed = {
            let mut live = self
                .live
                .lock()
                .map_err(|e| RuntimeError::ProvisionFailed(format!("mutex poisoned: {e}")))?;
            live.remove(&instance.id)
        };
        if let Some(workdir) = removed {
            debug!("tearing down sandbox {}", instance.id);
            if workdir.exists() {
                std::fs::remove_dir_all(&workdir)?;
            }
        }
        Ok(())
    }
}
