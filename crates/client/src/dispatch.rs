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

//! Connection dispatcher: turns one prepared operation into one HTTP
//! exchange.
//!
//! Sequencing per dispatch: (1) start the transport lazily and idempotently,
//! (2) acquire a connection context (a suspend point when the pool is
//! exhausted), (3) attach the awaiting future to the context, (4) write the
//! request and hand the completed response to the demultiplexer. A failure at
//! any step settles exactly the future that owns this dispatch; nothing is
//! retried and no other pending operation is touched.
//!
//! Each dispatch runs on its own runtime task; the task's abort handle is
//! tracked by the future so `cancel` can stop an in-flight exchange
//! best-effort.

use std::sync::Arc;

use coffer_api::WireRequest;
use tokio::{runtime::Handle, sync::OnceCell};
use tracing::{debug, warn};

use crate::{
    convert::ResultConverter,
    future::OperationFuture,
    pool::ConnectionPool,
    route,
    transport::Transport,
    types::{ClientError, ClientResult},
};

/// Builds the transport on first use
pub type TransportFactory = Box<dyn Fn() -> ClientResult<Arc<dyn Transport>> + Send + Sync>;

/// Dispatches prepared operations over pooled logical connections
pub struct Dispatcher {
    /// Transport, started lazily on the first dispatch
    transport: OnceCell<Arc<dyn Transport>>,
    /// Factory invoked at most once to start the transport
    connect:   Option<TransportFactory>,
    pool:      ConnectionPool,
    /// Runtime the dispatch tasks run on
    runtime:   Handle,
}

impl Dispatcher {
    /// Creates a dispatcher that starts its transport on first use
    pub fn new(connect: TransportFactory, max_connections: usize, runtime: Handle) -> Self {
        Self {
            transport: OnceCell::new(),
            connect: Some(connect),
            pool: ConnectionPool::new(max_connections),
            runtime,
        }
    }

    /// Creates a dispatcher over an already-started transport
    ///
    /// Used by tests and by callers bringing their own transport.
    pub fn with_transport(
        transport: Arc<dyn Transport>,
        max_connections: usize,
        runtime: Handle,
    ) -> Self {
        Self {
            transport: OnceCell::new_with(Some(transport)),
            connect: None,
            pool: ConnectionPool::new(max_connections),
            runtime,
        }
    }

    /// Starts the transport if it is not running yet
    async fn transport(&self) -> ClientResult<Arc<dyn Transport>> {
        let transport = self
            .transport
            .get_or_try_init(|| async {
                match &self.connect {
                    Some(factory) => factory(),
                    None => Err(ClientError::IllegalState {
                        message: "dispatcher has no transport factory".to_string(),
                    }),
                }
            })
            .await?;
        Ok(Arc::clone(transport))
    }

    /// Dispatches one operation, feeding its future with the eventual
    /// outcome
    ///
    /// Returns immediately; the exchange runs on a spawned runtime task
    /// tracked by the future for cancellation.
    pub fn dispatch<T>(
        self: &Arc<Self>,
        request: WireRequest,
        converter: Arc<dyn ResultConverter<T>>,
        future: OperationFuture<T>,
    ) where
        T: Clone + Send + 'static,
    {
        let dispatcher = Arc::clone(self);
        let pending = future.clone();
        let task = self.runtime.spawn(async move {
            dispatcher.run(request, converter, pending).await;
        });
        future.track_dispatch(task.abort_handle());
    }

    async fn run<T>(
        &self,
        request: WireRequest,
        converter: Arc<dyn ResultConverter<T>>,
        future: OperationFuture<T>,
    ) where
        T: Clone + Send + 'static,
    {
        let transport = match self.transport().await {
            Ok(transport) => transport,
            Err(error) => {
                warn!(%error, "transport start failed");
                fail(future, error);
                return;
            }
        };

        let mut ctx = match self.pool.acquire::<T>().await {
            Ok(ctx) => ctx,
            Err(error) => {
                fail(future, error);
                return;
            }
        };

        // Publish the future on the connection before any bytes go out, so
        // the response path always finds its owner.
        ctx.attach(future);
        debug!(
            connection = ctx.id(),
            method = %request.method,
            path = %request.path,
            "writing request"
        );

        match transport.execute(&request).await {
            Ok(response) => route::deliver(&mut ctx, &converter, response),
            Err(error) => {
                if let Some(future) = ctx.take_pending() {
                    fail(future, error);
                }
            }
        }
    }
}

/// Settles a future with a dispatch failure, tolerating a lost race against
/// cancel
fn fail<T: Clone>(future: OperationFuture<T>, error: ClientError) {
    if let Err(state_error) = future.complete_err(error) {
        debug!(%state_error, "dispatch failure arrived after future settled");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use coffer_api::{Method, RawResponse};

    use super::*;
    use crate::{convert::KvFetchConverter, transport::testing::MockTransport};

    fn dispatcher_with(transport: Arc<MockTransport>) -> Arc<Dispatcher> {
        Arc::new(Dispatcher::with_transport(
            transport,
            4,
            Handle::current(),
        ))
    }

    #[tokio::test]
    async fn test_dispatch_completes_future_with_converted_result() {
        let transport = Arc::new(MockTransport::new());
        transport.push_response(Ok(RawResponse::new(
            200,
            vec![("ETag".to_string(), "\"r1\"".to_string())],
            b"{}".to_vec(),
        )));
        let dispatcher = dispatcher_with(transport.clone());

        let future = OperationFuture::new();
        dispatcher.dispatch(
            WireRequest::new(Method::Get, "v0/users/alice"),
            KvFetchConverter::raw("users", "alice"),
            future.clone(),
        );

        let item = future.outcome().await.unwrap().unwrap();
        assert_eq!(item.value, "{}");
        assert_eq!(transport.calls(), 1);
        assert_eq!(transport.requests()[0].path, "v0/users/alice");
    }

    #[tokio::test]
    async fn test_write_failure_fails_exactly_this_future() {
        let transport = Arc::new(MockTransport::new());
        transport.push_response(Err(ClientError::Connection {
            message: "broken pipe".to_string(),
        }));
        let dispatcher = dispatcher_with(transport.clone());

        let failing = OperationFuture::new();
        dispatcher.dispatch(
            WireRequest::new(Method::Get, "v0/users/a"),
            KvFetchConverter::raw("users", "a"),
            failing.clone(),
        );
        let err = failing.outcome().await.unwrap_err();
        assert!(matches!(err, ClientError::Connection { .. }));

        // An unrelated dispatch on the same dispatcher is unaffected.
        transport.push_response(Ok(RawResponse::new(404, Vec::new(), Vec::new())));
        let healthy = OperationFuture::new();
        dispatcher.dispatch(
            WireRequest::new(Method::Get, "v0/users/b"),
            KvFetchConverter::raw("users", "b"),
            healthy.clone(),
        );
        assert!(healthy.outcome().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_transport_start_failure_fails_future_without_retry() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counted = attempts.clone();
        let dispatcher = Arc::new(Dispatcher::new(
            Box::new(move || {
                counted.fetch_add(1, Ordering::SeqCst);
                Err(ClientError::Connection {
                    message: "transport not startable".to_string(),
                })
            }),
            2,
            Handle::current(),
        ));

        let future = OperationFuture::<bool>::new();
        dispatcher.dispatch(
            WireRequest::new(Method::Head, "v0/"),
            crate::convert::AckConverter::unconditional(),
            future.clone(),
        );
        let err = future.outcome().await.unwrap_err();
        assert!(matches!(err, ClientError::Connection { .. }));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_lazy_transport_start_is_idempotent() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counted = attempts.clone();
        let dispatcher = Arc::new(Dispatcher::new(
            Box::new(move || {
                counted.fetch_add(1, Ordering::SeqCst);
                Ok(Arc::new(MockTransport::new()) as Arc<dyn Transport>)
            }),
            2,
            Handle::current(),
        ));

        for _ in 0..3 {
            let future = OperationFuture::<bool>::new();
            dispatcher.dispatch(
                WireRequest::new(Method::Head, "v0/"),
                crate::convert::AckConverter::unconditional(),
                future.clone(),
            );
            future.outcome().await.unwrap();
        }
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
