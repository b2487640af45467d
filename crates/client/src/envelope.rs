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

//! Prepared requests: the public handle for one logical store operation.
//!
//! A [`PreparedRequest`] binds a wire request and its result converter to one
//! shared [`OperationFuture`]. Sending is deferred: building the request does
//! nothing on the wire, and the first of `execute`, `wait`, `send`, or
//! `execute_with`, from any thread or clone of the handle, performs the
//! single dispatch. Every later trigger is a no-op that shares the same
//! eventual outcome, so a blocking `wait` racing an explicit `send` can never
//! double-send.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use coffer_api::WireRequest;

use crate::{
    convert::ResultConverter,
    dispatch::Dispatcher,
    future::{OperationFuture, OperationListener},
    types::{ClientError, ClientResult},
};

struct EnvelopeInner<T> {
    request:    WireRequest,
    converter:  Arc<dyn ResultConverter<T>>,
    future:     OperationFuture<T>,
    dispatcher: Arc<Dispatcher>,
    /// One-shot send guard; the first trigger wins
    sent:       AtomicBool,
}

/// A bound, not-yet-sent store operation
///
/// Cloning is cheap; all clones share one future, one send guard, and one
/// eventual outcome.
pub struct PreparedRequest<T> {
    inner: Arc<EnvelopeInner<T>>,
}

impl<T> Clone for PreparedRequest<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> std::fmt::Debug for PreparedRequest<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreparedRequest")
            .field("method", &self.inner.request.method)
            .field("path", &self.inner.request.path)
            .field("sent", &self.inner.sent.load(Ordering::SeqCst))
            .finish()
    }
}

impl<T> PreparedRequest<T>
where
    T: Clone + Send + 'static,
{
    /// Binds a wire request and converter to a fresh future, without
    /// sending
    pub fn deferred(
        dispatcher: Arc<Dispatcher>,
        request: WireRequest,
        converter: Arc<dyn ResultConverter<T>>,
    ) -> Self {
        Self {
            inner: Arc::new(EnvelopeInner {
                request,
                converter,
                future: OperationFuture::new(),
                dispatcher,
                sent: AtomicBool::new(false),
            }),
        }
    }

    /// Triggers the underlying dispatch, at most once across all clones and
    /// call sites
    pub fn send(&self) {
        if !self.inner.sent.swap(true, Ordering::SeqCst) {
            self.inner.dispatcher.dispatch(
                self.inner.request.clone(),
                Arc::clone(&self.inner.converter),
                self.inner.future.clone(),
            );
        }
    }

    /// Sends if needed and awaits the outcome
    pub async fn execute(&self) -> ClientResult<T> {
        self.send();
        self.inner.future.outcome().await
    }

    /// Sends if needed and awaits the outcome, giving up after `timeout`
    ///
    /// Timing out does not cancel the operation; the shared future may still
    /// complete and can be awaited again.
    pub async fn execute_timeout(&self, timeout: Duration) -> ClientResult<T> {
        self.send();
        match tokio::time::timeout(timeout, self.inner.future.outcome()).await {
            Ok(outcome) => outcome,
            Err(_) => Err(ClientError::Timeout {
                millis: timeout.as_millis() as u64,
            }),
        }
    }

    /// Sends if needed and blocks the calling thread for the outcome
    ///
    /// For callers outside the runtime; async code should use
    /// [`PreparedRequest::execute`].
    pub fn wait(&self) -> ClientResult<T> {
        self.send();
        self.inner.future.wait()
    }

    /// Sends if needed and blocks with a deadline
    pub fn wait_timeout(&self, timeout: Duration) -> ClientResult<T> {
        self.send();
        self.inner.future.wait_timeout(timeout)
    }

    /// Registers a completion listener without triggering the send
    pub fn on(&self, listener: Arc<dyn OperationListener<T>>) -> &Self {
        self.inner.future.add_listener(listener);
        self
    }

    /// Registers a listener and triggers the send: fire-and-forget with a
    /// callback
    pub fn execute_with(&self, listener: Arc<dyn OperationListener<T>>) {
        self.on(listener);
        self.send();
    }

    /// Best-effort cancellation of the operation and its in-flight dispatch
    pub fn cancel(&self) -> bool { self.inner.future.cancel() }

    /// The shared future resolving this operation
    pub fn future(&self) -> &OperationFuture<T> { &self.inner.future }

    /// The wire request this operation will send
    pub fn wire_request(&self) -> &WireRequest { &self.inner.request }

    /// True once some trigger performed the dispatch
    pub fn is_sent(&self) -> bool { self.inner.sent.load(Ordering::SeqCst) }
}
