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

//! Event-log resource builders.
//!
//! Events are time-ordered entries attached to one item. Appends go to
//! `v0/{collection}/{key}/events/{type}`; listings page through the log in
//! timestamp order.

use std::sync::Arc;

use coffer_api::{Event, ItemMeta, Method, WireRequest};
use serde::{Serialize, de::DeserializeOwned};

use crate::{
    client::encode_segment,
    convert::{PageConverter, Paged, WriteReceiptConverter},
    dispatch::Dispatcher,
    envelope::PreparedRequest,
    types::{ClientError, ClientResult},
};

/// Event-log operations on one item
pub struct EventResource {
    dispatcher: Arc<Dispatcher>,
    collection: String,
    key:        String,
}

impl EventResource {
    pub(crate) fn new(dispatcher: Arc<Dispatcher>, collection: String, key: String) -> Self {
        Self {
            dispatcher,
            collection,
            key,
        }
    }

    fn log_path(&self, event_type: &str) -> String {
        format!(
            "v0/{}/{}/events/{}",
            encode_segment(&self.collection),
            encode_segment(&self.key),
            encode_segment(event_type)
        )
    }

    /// Prepares an append of one event to the `event_type` log
    ///
    /// When `timestamp` is `None` the store assigns arrival time.
    ///
    /// # Errors
    /// Returns a `ClientError` if the event payload cannot be serialized to
    /// JSON.
    pub fn append<V: Serialize>(
        &self,
        event_type: &str,
        value: &V,
        timestamp: Option<i64>,
    ) -> ClientResult<PreparedRequest<Option<ItemMeta>>> {
        let body = serde_json::to_vec(value).map_err(ClientError::conversion)?;
        let mut request = WireRequest::new(Method::Post, self.log_path(event_type))
            .header("Content-Type", "application/json")
            .body(body);
        if let Some(timestamp) = timestamp {
            request = request.query("timestamp", timestamp.to_string());
        }
        Ok(PreparedRequest::deferred(
            Arc::clone(&self.dispatcher),
            request,
            WriteReceiptConverter::unconditional(self.collection.clone(), self.key.clone()),
        ))
    }

    /// Prepares a listing of the `event_type` log
    ///
    /// `start` is inclusive and `end` exclusive, both in the store's event
    /// timestamp units; the page carries a continuation request when more
    /// events exist.
    pub fn list<V>(
        &self,
        event_type: &str,
        limit: Option<u64>,
        start: Option<i64>,
        end: Option<i64>,
    ) -> PreparedRequest<Paged<Event<V>>>
    where
        V: DeserializeOwned + Clone + Send + Sync + 'static,
    {
        let mut request = WireRequest::new(Method::Get, self.log_path(event_type));
        if let Some(limit) = limit {
            request = request.query("limit", limit.to_string());
        }
        if let Some(start) = start {
            request = request.query("startEvent", start.to_string());
        }
        if let Some(end) = end {
            request = request.query("endEvent", end.to_string());
        }
        PreparedRequest::deferred(
            Arc::clone(&self.dispatcher),
            request,
            PageConverter::<Event<V>>::shared(Arc::clone(&self.dispatcher)),
        )
    }
}
