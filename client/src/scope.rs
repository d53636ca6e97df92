//! Cooperative cancellation threaded through operation execution.
//!
//! Cancellation never interrupts in-flight I/O. A handler checkpoints with
//! [`CancelScope::bail_if_canceled`] after each awaited call, so a canceled
//! scope only stops further logic from running past the next checkpoint.

use std::{
    collections::HashMap,
    sync::{
        atomic::{
            AtomicU64,
            Ordering,
        },
        Arc,
        Mutex,
    },
    time::Duration,
};

use thiserror::Error;

/// The stored reason a scope was canceled. This exact value is what
/// [`CancelScope::bail_if_canceled`] surfaces, so callers can tell an
/// abandoned operation apart from a failed one.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CancellationReason {
    #[error("operation canceled: {0}")]
    Canceled(String),

    #[error("operation timed out after {0:?}")]
    TimedOut(Duration),
}

type CancelListener = Box<dyn FnOnce(&CancellationReason) + Send>;

#[derive(Default)]
struct CancelState {
    reason: Mutex<Option<CancellationReason>>,
    listeners: Mutex<HashMap<u64, CancelListener>>,
    next_listener: AtomicU64,
}

impl CancelState {
    /// First cancellation wins; later calls are no-ops.
    fn cancel(&self, reason: CancellationReason) {
        let mut stored = self.reason.lock().expect("reason lock");
        if stored.is_some() {
            return;
        }
        *stored = Some(reason.clone());
        // Drain under the reason lock so a concurrent `add_listener` either
        // sees the reason and fires immediately, or lands in this drain.
        let listeners = std::mem::take(&mut *self.listeners.lock().expect("listeners lock"));
        drop(stored);

        for (_, listener) in listeners {
            listener(&reason);
        }
    }

    fn reason(&self) -> Option<CancellationReason> {
        self.reason.lock().expect("reason lock").clone()
    }

    /// Registers a listener, or fires it immediately when already canceled.
    /// Returns the listener id only when it was actually stored.
    fn add_listener(&self, listener: CancelListener) -> Option<u64> {
        let stored = self.reason.lock().expect("reason lock");
        if let Some(reason) = stored.as_ref() {
            let reason = reason.clone();
            drop(stored);
            listener(&reason);
            return None;
        }
        let id = self.next_listener.fetch_add(1, Ordering::Relaxed);
        self.listeners
            .lock()
            .expect("listeners lock")
            .insert(id, listener);
        Some(id)
    }

    fn remove_listener(&self, id: u64) {
        self.listeners.lock().expect("listeners lock").remove(&id);
    }
}

/// The caller-held side of a cancellation signal. Cloneable; any clone can
/// cancel, and the first reason wins.
#[derive(Clone, Default)]
pub struct CancelHandle {
    state: Arc<CancelState>,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self, reason: impl Into<String>) {
        self.state
            .cancel(CancellationReason::Canceled(reason.into()));
    }

    pub fn is_canceled(&self) -> bool {
        self.state.reason().is_some()
    }
}

/// The per-invocation side of a cancellation signal, handed to every
/// operation handler.
///
/// A scope attaches to at most one [`CancelHandle`]. The listener it
/// registers there is removed unconditionally when the scope drops, whether
/// the invocation settled by success, by error, or by cancellation, so
/// repeated invocations sharing one long-lived handle never accumulate
/// listeners.
pub struct CancelScope {
    local: Arc<CancelState>,
    external: Option<(Arc<CancelState>, u64)>,
}

impl CancelScope {
    /// A scope with no external signal. It can still be canceled internally,
    /// which is how execution timeouts are delivered.
    pub fn detached() -> Self {
        Self {
            local: Arc::new(CancelState::default()),
            external: None,
        }
    }

    /// A scope that observes `handle`: cancellation of the handle forwards
    /// into this scope, with the same reason.
    pub fn attached(handle: &CancelHandle) -> Self {
        let local = Arc::new(CancelState::default());
        let forward = {
            let local = Arc::clone(&local);
            Box::new(move |reason: &CancellationReason| local.cancel(reason.clone()))
        };
        let external = handle
            .state
            .add_listener(forward)
            .map(|id| (Arc::clone(&handle.state), id));
        Self { local, external }
    }

    /// Cancels this scope only. The handle it is attached to, and any other
    /// scope sharing that handle, is untouched.
    pub(crate) fn cancel(&self, reason: CancellationReason) {
        self.local.cancel(reason);
    }

    pub fn is_canceled(&self) -> bool {
        self.local.reason().is_some()
    }

    pub fn cancellation_reason(&self) -> Option<CancellationReason> {
        self.local.reason()
    }

    /// The cooperative checkpoint. Returns the stored reason as an error once
    /// the scope is canceled; handlers call this after each awaited I/O call.
    pub fn bail_if_canceled(&self) -> Result<(), CancellationReason> {
        match self.local.reason() {
            Some(reason) => Err(reason),
            None => Ok(()),
        }
    }

    /// Runs `listener` when the scope is canceled, immediately if it already
    /// was. Listeners registered here die with the scope.
    pub fn on_cancel(&self, listener: impl FnOnce(&CancellationReason) + Send + 'static) {
        self.local.add_listener(Box::new(listener));
    }
}

impl Drop for CancelScope {
    fn drop(&mut self) {
        if let Some((state, id)) = self.external.take() {
            state.remove_listener(id);
        }
    }
}
