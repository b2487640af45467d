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

//! Coffer Client Library
//!
//! Async HTTP client for a remote key-value/document store with event logs,
//! graph relations, and search.
//!
//! # Features
//!
//! - **Deferred requests**: every operation prepares a [`PreparedRequest`];
//!   nothing touches the wire until the first `execute`, `wait`, or `send`,
//!   and concurrent triggers dispatch exactly once
//! - **Three call styles**: async `execute().await`, blocking `wait()` from
//!   threads outside the runtime, and fire-and-forget listeners
//! - **Typed results**: absent keys are `Ok(None)`, failed write
//!   preconditions are `None`/`false`, and pages link to ready-to-send
//!   continuation requests
//! - **Bounded concurrency**: in-flight exchanges are capped by a connection
//!   pool; the transport starts lazily on the first dispatch
//! - **Structured errors**: snafu error types that clone cleanly to every
//!   listener and waiter of a shared future
//!
//! # Examples
//!
//! ## Async style
//!
//! ```rust,no_run
//! use coffer_client::{ClientConfig, CofferClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = CofferClient::new(
//!         ClientConfig::builder()
//!             .endpoint("http://localhost:8080")
//!             .auth_token("my-token")
//!             .build(),
//!     )?;
//!
//!     client
//!         .kv("users")
//!         .put("alice", &serde_json::json!({"name": "Alice"}))?
//!         .prepare()?
//!         .execute()
//!         .await?;
//!
//!     let item = client
//!         .kv("users")
//!         .get::<serde_json::Value>("alice")
//!         .execute()
//!         .await?;
//!     println!("value: {:?}", item.map(|i| i.value));
//!     Ok(())
//! }
//! ```
//!
//! ## Listener style
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use coffer_api::KvItem;
//! use coffer_client::{ClientConfig, ClientError, CofferClient, OperationListener};
//!
//! struct LogOutcome;
//!
//! impl OperationListener<Option<KvItem<serde_json::Value>>> for LogOutcome {
//!     fn on_success(&self, item: &Option<KvItem<serde_json::Value>>) {
//!         println!("fetched: {item:?}");
//!     }
//!
//!     fn on_failure(&self, error: &ClientError) {
//!         eprintln!("fetch failed: {error}");
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = CofferClient::new(
//!         ClientConfig::builder()
//!             .endpoint("http://localhost:8080")
//!             .build(),
//!     )?;
//!     client
//!         .kv("users")
//!         .get::<serde_json::Value>("alice")
//!         .execute_with(Arc::new(LogOutcome));
//!     Ok(())
//! }
//! ```
//!
//! ## Paging
//!
//! ```rust,no_run
//! use coffer_client::{ClientConfig, CofferClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = CofferClient::new(
//!         ClientConfig::builder()
//!             .endpoint("http://localhost:8080")
//!             .build(),
//!     )?;
//!
//!     let mut page = client
//!         .kv("users")
//!         .list::<serde_json::Value>(Some(100), None)
//!         .execute()
//!         .await?;
//!     loop {
//!         for item in &page.results {
//!             println!("{}", item.path.key);
//!         }
//!         match page.next_page() {
//!             Some(next) => page = next.execute().await?,
//!             None => break,
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod convert;
pub mod dispatch;
pub mod envelope;
pub mod events;
pub mod future;
pub mod kv;
pub mod pool;
pub mod relations;
mod route;
pub mod search;
pub mod transport;
pub mod types;

// Re-export the main client surface
pub use coffer_api::{Event, ItemMeta, ItemPath, KvItem, Method, Page, SearchResult, WireRequest};

pub use crate::{
    client::{ClientConfig, CofferClient, DEFAULT_MAX_CONNECTIONS},
    convert::{
        AckConverter, KvFetchConverter, PageConverter, Paged, ResultConverter,
        WriteReceiptConverter,
    },
    dispatch::Dispatcher,
    envelope::PreparedRequest,
    events::EventResource,
    future::{OperationFuture, OperationListener},
    kv::{KvDelete, KvPut, KvResource},
    relations::RelationResource,
    search::SearchResource,
    transport::{HttpTransport, Transport},
    types::{ClientError, ClientResult},
};
