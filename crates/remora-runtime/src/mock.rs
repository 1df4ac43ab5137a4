use crate::backend::BuildBackend;
use crate::sandbox::{PayloadFn, SandboxInstance, SandboxRuntime};
use crate::RuntimeError;
use remora_schema::{ImageId, SandboxId};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

/// Mock build backend with step counting and failure injection.
///
/// A step whose text starts with `fail:` fails with the remainder as the
/// error message; everything else succeeds and bumps the step counter.
#[derive(Default)]
pub struct MockBackend {
    steps_run: AtomicUsize,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of steps executed successfully.
    pub fn steps_run(&self) -> usize {
        self.steps_run.load(Ordering::SeqCst)
    }
}

impl BuildBackend for MockBackend {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn available(&self) -> bool {
        true
    }

    fn run_step(&self, _base: &str, step: &str) -> Result<(), RuntimeError> {
        if let Some(message) = step.strip_prefix("fail:") {
            return Err(RuntimeError::CommandFailed {
                step: step.to_owned(),
                message: message.to_owned(),
            });
        }
        self.steps_run.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Mock sandbox runtime tracking provision/teardown counts and live instances.
#[derive(Default)]
pub struct MockRuntime {
    started: AtomicUsize,
    stopped: AtomicUsize,
    counter: AtomicU64,
    fail_next_start: AtomicBool,
    live: Mutex<HashSet<SandboxId>>,
}

impl MockRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `start` call fail with a provisioning error.
    pub fn fail_next_start(&self) {
        self.fail_next_start.store(true, Ordering::SeqCst);
    }

    pub fn provisioned(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub fn torn_down(&self) -> usize {
        self.stopped.load(Ordering::SeqCst)
    }

    pub fn live_count(&self) -> usize {
        self.live.lock().map(|l| l.len()).unwrap_or(0)
    }
}

impl SandboxRuntime for MockRuntime {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn start(&self, image: &ImageId) -> Result<SandboxInstance, RuntimeError> {
        if self.fail_next_start.swap(false, Ordering::SeqCst) {
            return Err(RuntimeError::ProvisionFailed(
                "injected provisioning failure".to_owned(),
            ));
        }
        let seq = self.counter.fetch_add(1, Ordering::SeqCst);
        let id = SandboxId::new(format!("mock-sbx-{seq:04}"));

        let mut live = self
            .live
            .lock()
            .map_err(|e| RuntimeError::ProvisionFailed(format!("mutex poisoned: {e}")))?;
        live.insert(id.clone());
        self.started.fetch_add(1, Ordering::SeqCst);

        Ok(SandboxInstance {
            id,
            image: image.clone(),
            workdir: std::env::temp_dir().join("remora-mock"),
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
            if !live.contains(&instance.id) {
                return Err(RuntimeError::UnknownSandbox(instance.id.to_string()));
            }
        }
        payload(arg).map_err(|e| RuntimeError::PayloadFailed(e.to_string()))
    }

    fn stop(&self, instance: &SandboxInstance) -> Result<(), RuntimeError> {
        let mut live = self
            .live
            .lock()
            .map_err(|e| RuntimeError::ProvisionFailed(format!("mutex poisoned: {e}")))?;
        // Only count teardowns of instances that were actually live, so
        // provision/teardown counts stay comparable under idempotent stops.
        if live.remove(&instance.id) {
            self.stopped.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::payload;

    fn test_image() -> ImageId {
        ImageId::new("feedfacefeedfacefeedfacefeedfacefeedfacefeedfacefeedfacefeedface")
    }

    #[test]
    fn backend_counts_successful_steps() {
        let backend = MockBackend::new();
        backend.run_step("debian-slim", "apt-get update").unwrap();
        backend.run_step("debian-slim", "apt-get install -y git").unwrap();
        assert_eq!(backend.steps_run(), 2);
    }

    #[test]
    fn backend_fail_prefix_injects_failure() {
        let backend = MockBackend::new();
        let err = backend.run_step("debian-slim", "fail:no such package").unwrap_err();
        match err {
            RuntimeError::CommandFailed { message, .. } => {
                assert_eq!(message, "no such package");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(backend.steps_run(), 0);
    }

    #[test]
    fn runtime_counts_provision_and_teardown() {
        let runtime = MockRuntime::new();
        let a = runtime.start(&test_image()).unwrap();
        let b = runtime.start(&test_image()).unwrap();
        assert_eq!(runtime.provisioned(), 2);
        assert_eq!(runtime.live_count(), 2);

        runtime.stop(&a).unwrap();
        runtime.stop(&a).unwrap(); // idempotent, not double-counted
        runtime.stop(&b).unwrap();
        assert_eq!(runtime.torn_down(), 2);
        assert_eq!(runtime.live_count(), 0);
    }

    #[test]
    fn fail_next_start_is_one_shot() {
        let runtime = MockRuntime::new();
        runtime.fail_next_start();
        assert!(matches!(
            runtime.start(&test_image()),
            Err(RuntimeError::ProvisionFailed(_))
        ));
        assert!(runtime.start(&test_image()).is_ok());
    }

    #[test]
    fn execute_requires_live_instance() {
        let runtime = MockRuntime::new();
        let instance = runtime.start(&test_image()).unwrap();
        runtime.stop(&instance).unwrap();

        let p = payload(|_| Ok(Vec::new()));
        assert!(matches!(
            runtime.execute(&instance, p.as_ref(), "x"),
            Err(RuntimeError::UnknownSandbox(_))
        ));
    }
}
