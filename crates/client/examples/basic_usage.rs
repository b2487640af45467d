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

//! Basic usage example for the Coffer client library
//!
//! Walks through the main operations against a running store: KV writes and
//! reads, conditional updates, event logs, relations, and paged listings.
//!
//! Point it at a store with `COFFER_ENDPOINT` (default
//! `http://127.0.0.1:8080`) and `COFFER_TOKEN`, then run:
//! `cargo run --example basic_usage`

use std::sync::Arc;

use coffer_api::KvItem;
use coffer_client::{ClientConfig, ClientError, CofferClient, OperationListener};
use serde::{Deserialize, Serialize};
use tracing::{Level, info};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct User {
    name: String,
    city: String,
}

struct PrintOutcome;

impl OperationListener<Option<KvItem<User>>> for PrintOutcome {
    fn on_success(&self, item: &Option<KvItem<User>>) {
        info!("listener saw: {item:?}");
    }

    fn on_failure(&self, error: &ClientError) {
        eprintln!("listener saw failure: {error}");
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    let endpoint =
        std::env::var("COFFER_ENDPOINT").unwrap_or_else(|_| "http://127.0.0.1:8080".to_string());
    let token = std::env::var("COFFER_TOKEN").ok();

    info!("Connecting to {endpoint}");
    let client = CofferClient::new(
        ClientConfig::builder()
            .endpoint(endpoint)
            .maybe_auth_token(token)
            .build(),
    )?;

    // Check connectivity before doing anything else.
    if !client.ping().execute().await.unwrap_or(false) {
        eprintln!("store did not answer the connectivity check");
        return Ok(());
    }

    // Store a user and read it back typed.
    info!("Storing users...");
    let alice = User {
        name: "Alice".to_string(),
        city: "Amsterdam".to_string(),
    };
    let receipt = client
        .kv("users")
        .put("alice", &alice)?
        .prepare()?
        .execute()
        .await?
        .expect("unconditional write always yields a receipt");
    info!("Stored alice at ref {}", receipt.path.ref_);

    let fetched = client.kv("users").get::<User>("alice").execute().await?;
    info!("Fetched: {:?}", fetched.map(|i| i.value));

    // Conditional update: only write over the version we just saw.
    let updated = client
        .kv("users")
        .put("alice", &User {
            name: "Alice".to_string(),
            city: "Rotterdam".to_string(),
        })?
        .if_match(receipt.path.ref_.clone())
        .prepare()?
        .execute()
        .await?;
    match updated {
        Some(meta) => info!("Updated alice, new ref {}", meta.path.ref_),
        None => info!("Someone else changed alice first; skipped the update"),
    }

    // Fire-and-forget fetch with a listener.
    client
        .kv("users")
        .get::<User>("alice")
        .execute_with(Arc::new(PrintOutcome));

    // Append to alice's event log and read the recent entries back.
    info!("Appending events...");
    client
        .events("users", "alice")
        .append("login", &serde_json::json!({"ip": "10.0.0.1"}), None)?
        .execute()
        .await?;
    let logins = client
        .events("users", "alice")
        .list::<serde_json::Value>("login", Some(10), None, None)
        .execute()
        .await?;
    info!("Found {} login events", logins.count);

    // Relate alice to bob and walk the relation.
    client
        .kv("users")
        .put("bob", &User {
            name: "Bob".to_string(),
            city: "Utrecht".to_string(),
        })?
        .prepare()?
        .execute()
        .await?;
    client
        .relations("users", "alice")
        .link("follows", "users", "bob")
        .execute()
        .await?;
    let followed = client
        .relations("users", "alice")
        .walk::<User>(&["follows"])?
        .execute()
        .await?;
    for item in &followed.results {
        info!("alice follows {}", item.value.name);
    }

    // Page through the whole collection.
    info!("Listing users...");
    let mut page = client
        .kv("users")
        .list::<User>(Some(2), None)
        .execute()
        .await?;
    loop {
        for item in &page.results {
            info!("  {}: {}", item.path.key, item.value.name);
        }
        match page.next_page() {
            Some(next) => page = next.execute().await?,
            None => break,
        }
    }

    info!("Example completed successfully!");
    Ok(())
}
