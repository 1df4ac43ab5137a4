use crate::builder::ImageBuilder;
use crate::function::RegisteredFunction;
use crate::session::Session;
use crate::CoreError;
use remora_runtime::{RuntimeError, SandboxInstance, SandboxRuntime};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, warn};

/// Per-invocation options. The timeout is off by default; when set, payload
/// execution runs on a helper thread and overruns yield
/// [`CoreError::InvocationTimeout`] after the sandbox is torn down.
#[derive(Debug, Clone, Copy, Default)]
pub struct DispatchOptions {
    pub timeout: Option<Duration>,
}

impl DispatchOptions {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
        }
    }
}

/// Runs registered functions inside freshly provisioned sandboxes.
///
/// Dispatch is only permitted while a [`Session`] acquired from this
/// dispatcher is live. Exactly one sandbox is provisioned per invocation and
/// torn down before the call returns, on every exit path.
pub struct Dispatcher {
    pub(crate) builder: ImageBuilder,
    pub(crate) runtime: Arc<dyn SandboxRuntime>,
    pub(crate) session_active: AtomicBool,
    outstanding: Mutex<Vec<SandboxInstance>>,
}

/// Tears the sandbox down when dropped, so teardown also fires on early
/// returns and panic unwind.
struct TeardownGuard<'a> {
    dispatcher: &'a Dispatcher,
    instance: SandboxInstance,
}

impl Drop for TeardownGuard<'_> {
    fn drop(&mut self) {
        self.dispatcher.release(&self.instance);
    }
}

impl Dispatcher {
    pub fn new(builder: ImageBuilder, runtime: Arc<dyn SandboxRuntime>) -> Self {
        Self {
            builder,
            runtime,
            session_active: AtomicBool::new(false),
            outstanding: Mutex::new(Vec::new()),
        }
    }

    /// Acquire the session scope for this dispatcher.
    ///
    /// At most one session may be active at a time; a second acquisition
    /// fails with [`CoreError::SessionActive`] until the first is dropped.
    pub fn session(&self) -> Result<Session<'_>, CoreError> {
        self.session_active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| CoreError::SessionActive)?;
        tracing::info!("session acquired");
        Ok(Session::new(self))
    }

    pub fn builder(&self) -> &ImageBuilder {
        &self.builder
    }

    /// Invoke a registered function with default options.
    pub fn invoke(&self, f: &RegisteredFunction, arg: &str) -> Result<Vec<u8>, CoreError> {
        self.invoke_with(f, arg, DispatchOptions::default())
    }

    /// Invoke a registered function inside one fresh sandbox.
    ///
    /// Ordering is fixed: image resolution precedes provisioning, which
    /// precedes execution, which precedes teardown. A build failure means no
    /// sandbox is ever provisioned.
    pub fn invoke_with(
        &self,
        f: &RegisteredFunction,
        arg: &str,
        options: DispatchOptions,
    ) -> Result<Vec<u8>, CoreError> {
        if !self.session_active.load(Ordering::SeqCst) {
            return Err(CoreError::NoActiveSession);
        }

        let handle = self.builder.build_or_reuse(f.spec())?;

        let instance = self
            .runtime
            .start(handle.image_id())
            .map_err(|e| CoreError::SandboxProvisionFailed(e.to_string()))?;
        debug!(
            "provisioned sandbox {} from image {}",
            instance.id,
            handle.short_id()
        );
        self.track(instance.clone());
        let _guard = TeardownGuard {
            dispatcher: self,
            instance: instance.clone(),
        };

        let result = match options.timeout {
            None => self.runtime.execute(&instance, f.payload().as_ref(), arg),
            Some(timeout) => {
                let (tx, rx) = mpsc::channel();
                let runtime = Arc::clone(&self.runtime);
                let payload = Arc::clone(f.payload());
                let thread_instance = instance.clone();
                let thread_arg = arg.to_owned();
                std::thread::spawn(move || {
                    let _ = tx.send(runtime.execute(
                        &thread_instance,
                        payload.as_ref(),
                        &thread_arg,
                    ));
                });
                match rx.recv_timeout(timeout) {
                    Ok(result) => result,
                    // Helper thread is left detached; its eventual result is
                    // discarded. The guard still tears the sandbox down.
                    Err(_) => return Err(CoreError::InvocationTimeout(timeout)),
                }
            }
        };

        match result {
            Ok(bytes) => {
                debug!("payload returned {} bytes", bytes.len());
                Ok(bytes)
            }
            Err(RuntimeError::PayloadFailed(message)) => {
                Err(CoreError::PayloadExecutionFailed(message))
            }
            Err(other) => Err(CoreError::Runtime(other)),
        }
    }

    pub(crate) fn track(&self, instance: SandboxInstance) {
        self.outstanding
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(instance);
    }

    /// Stop a sandbox and forget it. Safe to call for instances already
    /// stopped: runtime `stop` is idempotent.
    pub(crate) fn release(&self, instance: &SandboxInstance) {
        if let Err(e) = self.runtime.stop(instance) {
            warn!("sandbox teardown failed for {}: {e}", instance.id);
        }
        self.outstanding
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|i| i.id != instance.id);
    }

    /// Tear down every sandbox still tracked, in session-release order.
    pub(crate) fn teardown_outstanding(&self) {
        let leftover: Vec<SandboxInstance> = std::mem::take(
            &mut *self
                .outstanding
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        for instance in leftover {
            warn!("tearing down sandbox {} left by an aborted invoke", instance.id);
            if let Err(e) = self.runtime.stop(&instance) {
                warn!("sandbox teardown failed for {}: {e}", instance.id);
            }
        }
    }
}
