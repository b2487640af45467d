// Copyright 2025 Crrow
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Single-assignment operation future with listener callbacks.
//!
//! [`OperationFuture`] is the result container for one logical store
//! operation. It is written exactly once (by the response pipeline) and read
//! any number of times: by blocking waiters, by async waiters, and by
//! registered listeners. The contract it keeps:
//!
//! - the outcome slot transitions pending → settled exactly once; a second
//!   completion attempt is rejected with an illegal-state error;
//! - every listener, whether registered before or after completion, is
//!   notified exactly once with the stored outcome;
//! - a timed-out wait leaves the future untouched; a later wait still
//!   observes the real outcome.
//!
//! One mutex guards the outcome slot, the fired flag, the listener set, and
//! the waker list together, so the add-or-fire-now decision in
//! [`OperationFuture::add_listener`] is atomic with respect to completion.
//! Listeners are always invoked with the lock released.

use std::{
    sync::{Arc, Condvar, Mutex, MutexGuard},
    task::Waker,
    time::{Duration, Instant},
};

use tokio::task::AbortHandle;
use tracing::debug;

use crate::types::{ClientError, ClientResult};

/// Callback interface for operation completion
///
/// Implementations must be ready to be invoked from a transport worker task
/// or synchronously from the registering thread (when the future is already
/// settled at registration time).
pub trait OperationListener<T>: Send + Sync {
    /// Invoked once with the converted result when the operation succeeds
    fn on_success(&self, value: &T);

    /// Invoked once with the stored error when the operation fails or is
    /// cancelled
    fn on_failure(&self, error: &ClientError);
}

/// Everything the single state mutex protects
struct FutureState<T> {
    /// Write-once outcome slot; `Some` means settled
    outcome:   Option<ClientResult<T>>,
    /// Settled by `cancel` rather than by completion
    cancelled: bool,
    /// The listener batch has been fired; late registrations fire inline
    fired:     bool,
    /// Listeners registered before completion, in registration order
    listeners: Vec<Arc<dyn OperationListener<T>>>,
    /// Async waiters parked on `outcome()`
    wakers:    Vec<Waker>,
    /// Dispatch task to abort on best-effort cancellation
    abort:     Option<AbortHandle>,
}

struct Inner<T> {
    state:   Mutex<FutureState<T>>,
    /// Released whenever the future settles
    settled: Condvar,
}

/// Single-assignment, thread-safe container for the eventual result of one
/// store operation
///
/// Cloning the handle is cheap and every clone observes the same outcome.
pub struct OperationFuture<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for OperationFuture<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for OperationFuture<T> {
    fn default() -> Self { Self::new() }
}

impl<T> OperationFuture<T> {
    /// Creates a pending future
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                state:   Mutex::new(FutureState {
                    outcome:   None,
                    cancelled: false,
                    fired:     false,
                    listeners: Vec::new(),
                    wakers:    Vec::new(),
                    abort:     None,
                }),
                settled: Condvar::new(),
            }),
        }
    }

    /// Locks the state, recovering from a poisoned lock
    ///
    /// Listeners fire with the lock released, so state behind a poisoned
    /// lock is still consistent.
    fn lock(&self) -> MutexGuard<'_, FutureState<T>> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Removes a previously registered listener
    ///
    /// Returns `false` (no-op) once the listener batch has fired: the
    /// notification was already promised and will not be revoked.
    pub fn remove_listener(&self, listener: &Arc<dyn OperationListener<T>>) -> bool {
        let mut state = self.lock();
        if state.fired {
            return false;
        }
        let before = state.listeners.len();
        state
            .listeners
            .retain(|candidate| !Arc::ptr_eq(candidate, listener));
        state.listeners.len() != before
    }

    /// Records the dispatch task feeding this future, for best-effort
    /// cancellation
    pub(crate) fn track_dispatch(&self, handle: AbortHandle) {
        let mut state = self.lock();
        if state.cancelled {
            // Cancelled before the task was tracked; stop it now.
            handle.abort();
        } else if state.outcome.is_none() {
            state.abort = Some(handle);
        }
    }

    /// Best-effort cancellation
    ///
    /// Aborts the tracked dispatch task if one is running, settles the
    /// future with [`ClientError::Cancelled`], and notifies listeners with
    /// that failure. Returns `false` if the future already settled:
    /// a completed operation cannot be cancelled.
    pub fn cancel(&self) -> bool {
        let (abort, listeners, wakers) = {
            let mut state = self.lock();
            if state.outcome.is_some() {
                return false;
            }
            state.cancelled = true;
            state.outcome = Some(Err(ClientError::Cancelled));
            state.fired = true;
            let abort = state.abort.take();
            let listeners = std::mem::take(&mut state.listeners);
            let wakers = std::mem::take(&mut state.wakers);
            self.inner.settled.notify_all();
            (abort, listeners, wakers)
        };
        if let Some(handle) = abort {
            debug!("aborting in-flight dispatch for cancelled operation");
            handle.abort();
        }
        for listener in &listeners {
            listener.on_failure(&ClientError::Cancelled);
        }
        for waker in wakers {
            waker.wake();
        }
        true
    }

    /// True once the future settled, by completion or cancellation
    pub fn is_done(&self) -> bool { self.lock().outcome.is_some() }

    /// True if the future was settled by `cancel`
    pub fn is_cancelled(&self) -> bool { self.lock().cancelled }
}

impl<T: Clone> OperationFuture<T> {
    /// Stores the success outcome and notifies everyone exactly once
    ///
    /// # Errors
    /// Returns an `IllegalState` error if the future is already settled.
    pub fn complete(&self, value: T) -> ClientResult<()> { self.settle(Ok(value)) }

    /// Stores the failure outcome and notifies everyone exactly once
    ///
    /// # Errors
    /// Returns an `IllegalState` error if the future is already settled.
    pub fn complete_err(&self, error: ClientError) -> ClientResult<()> { self.settle(Err(error)) }

    fn settle(&self, outcome: ClientResult<T>) -> ClientResult<()> {
        let mut state = self.lock();
        if state.outcome.is_some() {
            return Err(ClientError::IllegalState {
                message: "future already settled".to_string(),
            });
        }
        let listeners = std::mem::take(&mut state.listeners);
        let wakers = std::mem::take(&mut state.wakers);
        state.fired = true;
        state.abort = None;
        let snapshot = (!listeners.is_empty()).then(|| outcome_snapshot(&outcome));
        state.outcome = Some(outcome);
        self.inner.settled.notify_all();
        drop(state);

        // Outcome is immutable from here on; notify with the lock released.
        if let Some(snapshot) = snapshot {
            for listener in &listeners {
                notify(listener, &snapshot);
            }
        }
        for waker in wakers {
            waker.wake();
        }
        Ok(())
    }

    /// Registers a listener, or fires it immediately if the future already
    /// settled
    ///
    /// The decision is made under the state lock, so a listener registered
    /// concurrently with completion is notified exactly once, either as
    /// part of the completion batch or inline here, never both.
    pub fn add_listener(&self, listener: Arc<dyn OperationListener<T>>) {
        let fire_now = {
            let mut state = self.lock();
            if state.fired {
                // Settled: notify inline, do not store.
                state.outcome.as_ref().map(outcome_snapshot)
            } else {
                state.listeners.push(listener.clone());
                None
            }
        };
        if let Some(snapshot) = fire_now {
            notify(&listener, &snapshot);
        }
    }

    /// Blocks the calling thread until the future settles
    ///
    /// Blocks only the caller; safe to use from any plain thread while the
    /// dispatch proceeds on the runtime. Async callers should use
    /// [`OperationFuture::outcome`] instead.
    pub fn wait(&self) -> ClientResult<T> {
        let mut state = self.lock();
        loop {
            if let Some(outcome) = &state.outcome {
                return outcome.clone();
            }
            state = self
                .inner
                .settled
                .wait(state)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
    }

    /// Blocks until the future settles or the timeout elapses
    ///
    /// A timeout raises [`ClientError::Timeout`] without touching the
    /// future: the in-flight operation continues and a later wait still
    /// observes its real outcome.
    pub fn wait_timeout(&self, timeout: Duration) -> ClientResult<T> {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock();
        loop {
            if let Some(outcome) = &state.outcome {
                return outcome.clone();
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(ClientError::Timeout {
                    millis: timeout.as_millis() as u64,
                });
            }
            let (guard, _) = self
                .inner
                .settled
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            state = guard;
        }
    }

    /// Awaits the outcome without blocking the runtime
    pub async fn outcome(&self) -> ClientResult<T> {
        std::future::poll_fn(|cx| {
            let mut state = self.lock();
            if let Some(outcome) = &state.outcome {
                return std::task::Poll::Ready(outcome.clone());
            }
            if !state.wakers.iter().any(|w| w.will_wake(cx.waker())) {
                state.wakers.push(cx.waker().clone());
            }
            std::task::Poll::Pending
        })
        .await
    }

    /// Returns the outcome if the future already settled
    pub fn try_outcome(&self) -> Option<ClientResult<T>> { self.lock().outcome.clone() }
}

/// Borrow-free view of a settled outcome, used to notify with the lock
/// released
enum Snapshot<T> {
    Value(T),
    Error(ClientError),
}

fn outcome_snapshot<T: Clone>(outcome: &ClientResult<T>) -> Snapshot<T> {
    match outcome {
        Ok(value) => Snapshot::Value(value.clone()),
        Err(error) => Snapshot::Error(error.clone()),
    }
}

fn notify<T>(listener: &Arc<dyn OperationListener<T>>, snapshot: &Snapshot<T>) {
    match snapshot {
        Snapshot::Value(value) => listener.on_success(value),
        Snapshot::Error(error) => listener.on_failure(error),
    }
}
