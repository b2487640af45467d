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

//! Client entry point and configuration.

use std::{sync::Arc, time::Duration};

use bon::Builder;
use coffer_api::{Method, WireRequest};
use tokio::runtime::Handle;
use tracing::info;
use url::Url;

use crate::{
    convert::AckConverter,
    dispatch::Dispatcher,
    envelope::PreparedRequest,
    events::EventResource,
    kv::KvResource,
    relations::RelationResource,
    search::SearchResource,
    transport::{HttpTransport, Transport},
    types::{ClientError, ClientResult},
};

/// Default bound on concurrent in-flight exchanges
pub const DEFAULT_MAX_CONNECTIONS: usize = 16;

/// Configuration for a [`CofferClient`]
#[derive(Debug, Clone, Builder)]
pub struct ClientConfig {
    /// Base endpoint, e.g. `http://localhost:8080`
    #[builder(into)]
    pub endpoint:        String,
    /// Bearer token sent with every request
    #[builder(into)]
    pub auth_token:      Option<String>,
    /// Bound on concurrent in-flight exchanges
    #[builder(default = DEFAULT_MAX_CONNECTIONS)]
    pub max_connections: usize,
    /// Per-request timeout applied at the transport
    pub request_timeout: Option<Duration>,
}

/// Client for a remote key-value/document store
///
/// Provides KV CRUD, event logs, graph relations, and search over HTTP, in
/// both async and blocking/listener call styles. All operations are
/// deferred: a resource method prepares a request, and the first `execute`,
/// `wait`, or `send` on it performs the single dispatch.
///
/// # Examples
///
/// ```rust,no_run
/// use coffer_client::{ClientConfig, CofferClient};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let client = CofferClient::new(
///         ClientConfig::builder()
///             .endpoint("http://localhost:8080")
///             .auth_token("my-token")
///             .build(),
///     )?;
///
///     // Store a value, then fetch it back typed.
///     let receipt = client
///         .kv("users")
///         .put("alice", &serde_json::json!({"name": "Alice"}))?
///         .prepare()?
///         .execute()
///         .await?;
///     println!("stored at ref {}", receipt.unwrap().path.ref_);
///
///     let item = client
///         .kv("users")
///         .get::<serde_json::Value>("alice")
///         .execute()
///         .await?;
///     println!("value: {:?}", item.map(|i| i.value));
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct CofferClient {
    dispatcher: Arc<Dispatcher>,
}

impl std::fmt::Debug for CofferClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CofferClient").finish_non_exhaustive()
    }
}

impl CofferClient {
    /// Creates a client for the configured endpoint
    ///
    /// The transport starts lazily on the first dispatched operation; this
    /// constructor only validates the endpoint and captures the runtime.
    ///
    /// # Errors
    /// Returns a `ClientError` if the endpoint is not a valid URL or no
    /// tokio runtime is running.
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        Url::parse(&config.endpoint).map_err(|e| ClientError::InvalidUrl {
            message: format!("invalid endpoint '{}': {e}", config.endpoint),
        })?;
        let runtime = Handle::try_current().map_err(|_| ClientError::IllegalState {
            message: "CofferClient must be created inside a tokio runtime".to_string(),
        })?;

        info!("creating client for {}", config.endpoint);
        let ClientConfig {
            endpoint,
            auth_token,
            max_connections,
            request_timeout,
        } = config;
        let connect = Box::new(move || {
            let transport =
                HttpTransport::open(&endpoint, auth_token.as_deref(), request_timeout)?;
            Ok(Arc::new(transport) as Arc<dyn Transport>)
        });

        Ok(Self {
            dispatcher: Arc::new(Dispatcher::new(connect, max_connections, runtime)),
        })
    }

    /// Creates a client over an already-started transport
    ///
    /// Useful for tests and embedded setups that bring their own transport.
    ///
    /// # Errors
    /// Returns a `ClientError` if no tokio runtime is running.
    pub fn with_transport(
        transport: Arc<dyn Transport>,
        max_connections: usize,
    ) -> ClientResult<Self> {
        let runtime = Handle::try_current().map_err(|_| ClientError::IllegalState {
            message: "CofferClient must be created inside a tokio runtime".to_string(),
        })?;
        Ok(Self {
            dispatcher: Arc::new(Dispatcher::with_transport(
                transport,
                max_connections,
                runtime,
            )),
        })
    }

    /// Key-value operations on a collection
    pub fn kv<C: Into<String>>(&self, collection: C) -> KvResource {
        KvResource::new(Arc::clone(&self.dispatcher), collection.into())
    }

    /// Event-log operations on one item
    pub fn events<C: Into<String>, K: Into<String>>(&self, collection: C, key: K) -> EventResource {
        EventResource::new(Arc::clone(&self.dispatcher), collection.into(), key.into())
    }

    /// Graph-relation operations on one item
    pub fn relations<C: Into<String>, K: Into<String>>(
        &self,
        collection: C,
        key: K,
    ) -> RelationResource {
        RelationResource::new(Arc::clone(&self.dispatcher), collection.into(), key.into())
    }

    /// Search operations on a collection
    pub fn search<C: Into<String>>(&self, collection: C) -> SearchResource {
        SearchResource::new(Arc::clone(&self.dispatcher), collection.into())
    }

    /// Prepares a connectivity check against the store root
    pub fn ping(&self) -> PreparedRequest<bool> {
        PreparedRequest::deferred(
            Arc::clone(&self.dispatcher),
            WireRequest::new(Method::Head, "v0/"),
            AckConverter::unconditional(),
        )
    }
}

/// Percent-encodes one path segment
pub(crate) fn encode_segment(segment: &str) -> String {
    urlencoding::encode(segment).into_owned()
}
