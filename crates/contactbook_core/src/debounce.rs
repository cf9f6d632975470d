//! Trailing-edge input debouncer.
//!
//! # Responsibility
//! - Collapse bursts of events into one trailing handler call.
//! - Expose the pending timer and latest event as explicit state.
//!
//! # Invariants
//! - The handler runs at most once per quiet window.
//! - The handler always receives the most recent scheduled event.
//! - A cancelled or superseded timer never invokes the handler.
//! - Dropping the debouncer aborts its pending timer.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;

type Handler<E> = Arc<dyn Fn(E) + Send + Sync>;

struct DebounceState<E> {
    /// Bumped on every schedule/cancel; a timer only fires for its own ticket.
    ticket: u64,
    latest: Option<E>,
    pending: Option<JoinHandle<()>>,
}

/// Debounces events of type `E` into a single trailing `handler` call.
pub struct InputDebouncer<E> {
    quiet_window: Duration,
    handler: Handler<E>,
    state: Arc<Mutex<DebounceState<E>>>,
}

impl<E: Send + 'static> InputDebouncer<E> {
    pub fn new<F>(quiet_window: Duration, handler: F) -> Self
    where
        F: Fn(E) + Send + Sync + 'static,
    {
        Self {
            quiet_window,
            handler: Arc::new(handler),
            state: Arc::new(Mutex::new(DebounceState {
                ticket: 0,
                latest: None,
                pending: None,
            })),
        }
    }

    pub fn quiet_window(&self) -> Duration {
        self.quiet_window
    }

    /// Records `event` as the latest one and restarts the quiet window.
    ///
    /// Must be called from within a tokio runtime.
    pub fn schedule(&self, event: E) {
        let mut state = lock(&self.state);
        state.ticket = state.ticket.wrapping_add(1);
        state.latest = Some(event);
        if let Some(previous) = state.pending.take() {
            previous.abort();
        }

        let ticket = state.ticket;
        let window = self.quiet_window;
        let shared = Arc::clone(&self.state);
        let handler = Arc::clone(&self.handler);
        state.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(window).await;
            let event = {
                let mut state = lock(&shared);
                if state.ticket != ticket {
                    return;
                }
                state.pending = None;
                state.latest.take()
            };
            if let Some(event) = event {
                handler(event);
            }
        }));
    }

    /// Drops the pending event, if any. Returns whether one was pending.
    pub fn cancel(&self) -> bool {
        let mut state = lock(&self.state);
        state.ticket = state.ticket.wrapping_add(1);
        state.latest = None;
        match state.pending.take() {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        lock(&self.state).pending.is_some()
    }
}

impl<E> Drop for InputDebouncer<E> {
    fn drop(&mut self) {
        if let Some(handle) = lock(&self.state).pending.take() {
            handle.abort();
        }
    }
}

fn lock<E>(state: &Mutex<DebounceState<E>>) -> MutexGuard<'_, DebounceState<E>> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}
