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

//! Logical connection pool and per-connection context.
//!
//! The store protocol carries exactly one logical request per connection at a
//! time. [`ConnectionPool`] enforces that by handing out a bounded number of
//! [`ConnectionContext`]s; each context owns one pool slot for the duration of
//! one request/response exchange and carries the strongly-typed slot for the
//! future awaiting that response. Acquisition is a suspend point: when the
//! pool is exhausted, dispatches queue until a context is released.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::trace;

use crate::{
    future::OperationFuture,
    types::{ClientError, ClientResult},
};

/// Bounded pool of logical store connections
#[derive(Debug)]
pub struct ConnectionPool {
    slots:   Arc<Semaphore>,
    next_id: AtomicU64,
}

impl ConnectionPool {
    /// Creates a pool allowing `max_connections` concurrent exchanges
    pub fn new(max_connections: usize) -> Self {
        Self {
            slots:   Arc::new(Semaphore::new(max_connections)),
            next_id: AtomicU64::new(0),
        }
    }

    /// Acquires a connection context, waiting for a free slot if necessary
    pub async fn acquire<T>(&self) -> ClientResult<ConnectionContext<T>> {
        let permit = self
            .slots
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ClientError::Connection {
                message: "connection pool is closed".to_string(),
            })?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        trace!(connection = id, "acquired connection slot");
        Ok(ConnectionContext {
            _permit: permit,
            id,
            pending: None,
        })
    }

    /// Number of currently free slots
    pub fn available(&self) -> usize { self.slots.available_permits() }
}

/// One logical connection for the duration of a single exchange
///
/// Holds the typed slot associating the connection with the future awaiting
/// its response. At most one future is attached at a time; attaching
/// publishes the future before the request bytes go out, and the response
/// path consumes it with [`ConnectionContext::take_pending`].
pub struct ConnectionContext<T> {
    _permit: OwnedSemaphorePermit,
    id:      u64,
    pending: Option<OperationFuture<T>>,
}

impl<T> ConnectionContext<T> {
    /// Identity of this connection, for diagnostics
    pub fn id(&self) -> u64 { self.id }

    /// Publishes the future that will receive the response on this
    /// connection
    pub fn attach(&mut self, future: OperationFuture<T>) {
        trace!(connection = self.id, "attaching pending operation");
        self.pending = Some(future);
    }

    /// Consumes the pending future, if one is attached
    pub fn take_pending(&mut self) -> Option<OperationFuture<T>> { self.pending.take() }
}
