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

//! End-to-end tests against an in-process stub store.
//!
//! The stub speaks just enough of the store protocol for the client to
//! exercise real HTTP: bearer auth, ETag-based version refs, conditional
//! writes, and paginated listings with `next` links.

use std::{
    collections::BTreeMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicU64, Ordering},
    },
};

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
    routing::get,
};
use coffer_client::{ClientConfig, ClientError, CofferClient, OperationListener};
use serde::Deserialize;

const TOKEN: &str = "test-token";

#[derive(Clone, Default)]
struct StubStore {
    /// Items keyed by `{collection}/{key}`, ordered for stable listings
    items:    Arc<Mutex<BTreeMap<String, StoredItem>>>,
    next_ref: Arc<AtomicU64>,
}

#[derive(Clone)]
struct StoredItem {
    body: Vec<u8>,
    ref_: String,
}

#[derive(Debug, Deserialize)]
struct ListParams {
    limit:     Option<usize>,
    #[serde(rename = "afterKey")]
    after_key: Option<String>,
}

impl StubStore {
    fn issue_ref(&self) -> String {
        format!("r{}", self.next_ref.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {TOKEN}"))
}

fn unauthorized() -> axum::response::Response {
    (
        StatusCode::UNAUTHORIZED,
        [("X-Request-Id", "req-auth-1")],
        "bad or missing token",
    )
        .into_response()
}

/// Extracts the ref from a quoted `If-Match` header value
fn precondition(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim_matches('"').to_string())
}

async fn get_item(
    Path((collection, key)): Path<(String, String)>,
    State(store): State<StubStore>,
    headers: HeaderMap,
) -> axum::response::Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    let items = store.items.lock().unwrap();
    match items.get(&format!("{collection}/{key}")) {
        Some(item) => (
            StatusCode::OK,
            [(header::ETAG, format!("\"{}\"", item.ref_))],
            item.body.clone(),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "no such item").into_response(),
    }
}

async fn put_item(
    Path((collection, key)): Path<(String, String)>,
    State(store): State<StubStore>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> axum::response::Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    let mut items = store.items.lock().unwrap();
    let slot = format!("{collection}/{key}");
    let current = items.get(&slot).map(|item| item.ref_.clone());

    if let Some(required) = precondition(&headers, "If-Match") {
        if current.as_deref() != Some(required.as_str()) {
            return (StatusCode::PRECONDITION_FAILED, "ref mismatch").into_response();
        }
    }
    if precondition(&headers, "If-None-Match").is_some() && current.is_some() {
        return (StatusCode::PRECONDITION_FAILED, "item exists").into_response();
    }

    let ref_ = store.issue_ref();
    items.insert(slot, StoredItem {
        body: body.to_vec(),
        ref_: ref_.clone(),
    });
    (
        StatusCode::CREATED,
        [(header::ETAG, format!("\"{ref_}\""))],
        "",
    )
        .into_response()
}

async fn delete_item(
    Path((collection, key)): Path<(String, String)>,
    State(store): State<StubStore>,
    headers: HeaderMap,
) -> axum::response::Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    let mut items = store.items.lock().unwrap();
    let slot = format!("{collection}/{key}");
    if let Some(required) = precondition(&headers, "If-Match") {
        if items.get(&slot).map(|item| item.ref_.as_str()) != Some(required.as_str()) {
            return (StatusCode::PRECONDITION_FAILED, "ref mismatch").into_response();
        }
    }
    items.remove(&slot);
    StatusCode::NO_CONTENT.into_response()
}

async fn list_items(
    Path(collection): Path<String>,
    Query(params): Query<ListParams>,
    State(store): State<StubStore>,
    headers: HeaderMap,
) -> axum::response::Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    let items = store.items.lock().unwrap();
    let prefix = format!("{collection}/");
    let limit = params.limit.unwrap_or(100);

    let mut results = Vec::new();
    let mut last_key = None;
    for (slot, item) in items.iter() {
        let Some(key) = slot.strip_prefix(&prefix) else {
            continue;
        };
        if let Some(after) = &params.after_key {
            if key <= after.as_str() {
                continue;
            }
        }
        if results.len() == limit {
            // More items remain past this page.
            let next = format!(
                "/v0/{collection}?limit={limit}&afterKey={}",
                last_key.clone().unwrap_or_default()
            );
            return Json(serde_json::json!({
                "results": results,
                "count": results.len(),
                "next": next,
            }))
            .into_response();
        }
        let value: serde_json::Value = serde_json::from_slice(&item.body).unwrap();
        results.push(serde_json::json!({
            "path": {"collection": collection, "key": key, "ref": item.ref_},
            "value": value,
        }));
        last_key = Some(key.to_string());
    }
    Json(serde_json::json!({
        "results": results,
        "count": results.len(),
        "total_count": results.len(),
    }))
    .into_response()
}

async fn start_stub() -> String {
    let store = StubStore::default();
    let router = Router::new()
        .route("/v0/{collection}", get(list_items))
        .route(
            "/v0/{collection}/{key}",
            get(get_item).put(put_item).delete(delete_item),
        )
        .with_state(store);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

fn client_for(endpoint: &str, token: &str) -> CofferClient {
    CofferClient::new(
        ClientConfig::builder()
            .endpoint(endpoint)
            .auth_token(token)
            .build(),
    )
    .unwrap()
}

#[tokio::test]
async fn test_put_then_get_roundtrip() {
    let endpoint = start_stub().await;
    let client = client_for(&endpoint, TOKEN);

    let receipt = client
        .kv("users")
        .put("k1", &serde_json::json!({}))
        .unwrap()
        .prepare()
        .unwrap()
        .execute()
        .await
        .unwrap()
        .unwrap();
    assert_eq!(receipt.path.collection, "users");
    assert_eq!(receipt.path.key, "k1");

    let item = client
        .kv("users")
        .get_raw("k1")
        .execute()
        .await
        .unwrap()
        .unwrap();
    assert_eq!(item.value, "{}");
    // The fetch observes the exact ref the write receipt reported.
    assert_eq!(item.path.ref_, receipt.path.ref_);
}

#[tokio::test]
async fn test_missing_key_resolves_to_none() {
    let endpoint = start_stub().await;
    let client = client_for(&endpoint, TOKEN);

    let item = client
        .kv("users")
        .get::<serde_json::Value>("ghost")
        .execute()
        .await
        .unwrap();
    assert!(item.is_none());
}

#[tokio::test]
async fn test_bad_token_is_unauthorized() {
    let endpoint = start_stub().await;
    let client = client_for(&endpoint, "wrong-token");

    let err = client
        .kv("users")
        .get::<serde_json::Value>("k1")
        .execute()
        .await
        .unwrap_err();
    assert!(err.is_unauthorized());
    match err {
        ClientError::Unauthorized { request_id, .. } => {
            assert_eq!(request_id.as_deref(), Some("req-auth-1"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_conditional_writes_map_precondition_failures() {
    let endpoint = start_stub().await;
    let client = client_for(&endpoint, TOKEN);

    let receipt = client
        .kv("users")
        .put("alice", &serde_json::json!({"v": 1}))
        .unwrap()
        .prepare()
        .unwrap()
        .execute()
        .await
        .unwrap()
        .unwrap();

    // Stale ref: nothing written, no error.
    let stale = client
        .kv("users")
        .put("alice", &serde_json::json!({"v": 2}))
        .unwrap()
        .if_match("stale-ref")
        .prepare()
        .unwrap()
        .execute()
        .await
        .unwrap();
    assert!(stale.is_none());

    // Matching ref: the write lands and issues a new ref.
    let updated = client
        .kv("users")
        .put("alice", &serde_json::json!({"v": 2}))
        .unwrap()
        .if_match(receipt.path.ref_.clone())
        .prepare()
        .unwrap()
        .execute()
        .await
        .unwrap()
        .unwrap();
    assert_ne!(updated.path.ref_, receipt.path.ref_);

    // if_absent on an existing key: precondition not met.
    let absent = client
        .kv("users")
        .put("alice", &serde_json::json!({"v": 3}))
        .unwrap()
        .if_absent()
        .prepare()
        .unwrap()
        .execute()
        .await
        .unwrap();
    assert!(absent.is_none());
}

#[tokio::test]
async fn test_delete_then_fetch_is_none() {
    let endpoint = start_stub().await;
    let client = client_for(&endpoint, TOKEN);

    client
        .kv("users")
        .put("bob", &serde_json::json!({}))
        .unwrap()
        .prepare()
        .unwrap()
        .execute()
        .await
        .unwrap();

    let acked = client.kv("users").delete("bob").prepare().execute().await.unwrap();
    assert!(acked);

    let item = client
        .kv("users")
        .get::<serde_json::Value>("bob")
        .execute()
        .await
        .unwrap();
    assert!(item.is_none());
}

#[tokio::test]
async fn test_listing_pages_through_continuations() {
    let endpoint = start_stub().await;
    let client = client_for(&endpoint, TOKEN);

    for i in 0..5 {
        client
            .kv("users")
            .put(&format!("k{i}"), &serde_json::json!({"i": i}))
            .unwrap()
            .prepare()
            .unwrap()
            .execute()
            .await
            .unwrap();
    }

    let mut page = client
        .kv("users")
        .list::<serde_json::Value>(Some(2), None)
        .execute()
        .await
        .unwrap();
    let mut keys = Vec::new();
    loop {
        assert!(page.results.len() <= 2);
        keys.extend(page.results.iter().map(|item| item.path.key.clone()));
        match page.next_page() {
            Some(next) => page = next.execute().await.unwrap(),
            None => break,
        }
    }
    assert_eq!(keys, vec!["k0", "k1", "k2", "k3", "k4"]);
}

#[tokio::test]
async fn test_listener_observes_fetch_outcome() {
    struct Recorder {
        seen: Mutex<Option<String>>,
    }
    impl OperationListener<Option<coffer_api::KvItem<String>>> for Recorder {
        fn on_success(&self, item: &Option<coffer_api::KvItem<String>>) {
            *self.seen.lock().unwrap() = item.as_ref().map(|i| i.value.clone());
        }

        fn on_failure(&self, _error: &ClientError) {}
    }

    let endpoint = start_stub().await;
    let client = client_for(&endpoint, TOKEN);

    client
        .kv("users")
        .put("carol", &serde_json::json!({"x": 1}))
        .unwrap()
        .prepare()
        .unwrap()
        .execute()
        .await
        .unwrap();

    let recorder = Arc::new(Recorder {
        seen: Mutex::new(None),
    });
    let request = client.kv("users").get_raw("carol");
    request.execute_with(recorder.clone());
    request.future().outcome().await.unwrap();

    assert_eq!(
        recorder.seen.lock().unwrap().as_deref(),
        Some(r#"{"x":1}"#)
    );
}
