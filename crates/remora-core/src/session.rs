use crate::dispatcher::{DispatchOptions, Dispatcher};
use crate::function::RegisteredFunction;
use crate::CoreError;
use std::sync::atomic::Ordering;
use tracing::info;

/// Scoped proof that the dispatcher is live and able to provision sandboxes.
///
/// Acquired via [`Dispatcher::session`]; released on drop, whether the scope
/// exits normally or by failure. Release tears down any sandbox the session
/// still owns, so no sandbox outlives its session.
pub struct Session<'a> {
    dispatcher: &'a Dispatcher,
}

impl<'a> Session<'a> {
    pub(crate) fn new(dispatcher: &'a Dispatcher) -> Self {
        Self { dispatcher }
    }

    /// Run one registered function inside one fresh sandbox, blocking until
    /// it completes, and return its byte payload or the failure.
    pub fn invoke(&self, f: &RegisteredFunction, arg: &str) -> Result<Vec<u8>, CoreError> {
        self.dispatcher.invoke(f, arg)
    }

    pub fn invoke_with(
        &self,
        f: &RegisteredFunction,
        arg: &str,
        options: DispatchOptions,
    ) -> Result<Vec<u8>, CoreError> {
        self.dispatcher.invoke_with(f, arg, options)
    }
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        self.dispatcher.teardown_outstanding();
        self.dispatcher.session_active.store(false, Ordering::SeqCst);
        info!("session released");
    }
}
