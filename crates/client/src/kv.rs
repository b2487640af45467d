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

//! Key-value resource builders.

use std::sync::Arc;

use coffer_api::{ItemMeta, KvItem, Method, WireRequest};
use serde::{Serialize, de::DeserializeOwned};
use snafu::ensure;

use crate::{
    client::encode_segment,
    convert::{AckConverter, KvFetchConverter, PageConverter, Paged, WriteReceiptConverter},
    dispatch::Dispatcher,
    envelope::PreparedRequest,
    types::{ClientError, ClientResult},
};

/// Key-value operations on one collection
///
/// Every method prepares a deferred request; nothing is sent until the
/// request is executed, awaited, or explicitly triggered.
pub struct KvResource {
    dispatcher: Arc<Dispatcher>,
    collection: String,
}

impl KvResource {
    pub(crate) fn new(dispatcher: Arc<Dispatcher>, collection: String) -> Self {
        Self {
            dispatcher,
            collection,
        }
    }

    fn item_path(&self, key: &str) -> String {
        format!(
            "v0/{}/{}",
            encode_segment(&self.collection),
            encode_segment(key)
        )
    }

    /// Prepares a typed fetch of one value
    ///
    /// An absent key resolves to `None`, not an error.
    pub fn get<T>(&self, key: &str) -> PreparedRequest<Option<KvItem<T>>>
    where
        T: DeserializeOwned + Clone + Send + Sync + 'static,
    {
        PreparedRequest::deferred(
            Arc::clone(&self.dispatcher),
            WireRequest::new(Method::Get, self.item_path(key)),
            KvFetchConverter::<T>::json(self.collection.as_str(), key),
        )
    }

    /// Prepares a fetch of one value as raw text, without JSON parsing
    pub fn get_raw(&self, key: &str) -> PreparedRequest<Option<KvItem<String>>> {
        PreparedRequest::deferred(
            Arc::clone(&self.dispatcher),
            WireRequest::new(Method::Get, self.item_path(key)),
            KvFetchConverter::raw(self.collection.as_str(), key),
        )
    }

    /// Starts a write of `value` at `key`
    ///
    /// The returned builder carries optional preconditions; finish it with
    /// [`KvPut::prepare`].
    ///
    /// # Errors
    /// Returns a `ClientError` if the value cannot be serialized to JSON.
    pub fn put<V: Serialize>(&self, key: &str, value: &V) -> ClientResult<KvPut> {
        let body = serde_json::to_vec(value).map_err(ClientError::conversion)?;
        Ok(KvPut {
            dispatcher: Arc::clone(&self.dispatcher),
            collection: self.collection.clone(),
            key:        key.to_string(),
            path:       self.item_path(key),
            body,
            if_match:   None,
            if_absent:  false,
        })
    }

    /// Starts a delete of `key`
    pub fn delete(&self, key: &str) -> KvDelete {
        KvDelete {
            dispatcher: Arc::clone(&self.dispatcher),
            path:       self.item_path(key),
            if_match:   None,
            purge:      false,
        }
    }

    /// Prepares a listing of the collection, ordered by key
    ///
    /// The page carries a continuation request when more results exist.
    pub fn list<T>(
        &self,
        limit: Option<u64>,
        after_key: Option<String>,
    ) -> PreparedRequest<Paged<KvItem<T>>>
    where
        T: DeserializeOwned + Clone + Send + Sync + 'static,
    {
        let mut request =
            WireRequest::new(Method::Get, format!("v0/{}", encode_segment(&self.collection)));
        if let Some(limit) = limit {
            request = request.query("limit", limit.to_string());
        }
        if let Some(after_key) = after_key {
            request = request.query("afterKey", after_key);
        }
        PreparedRequest::deferred(
            Arc::clone(&self.dispatcher),
            request,
            PageConverter::<KvItem<T>>::shared(Arc::clone(&self.dispatcher)),
        )
    }
}

/// A pending KV write with optional preconditions
///
/// `if_match` and `if_absent` are mutually exclusive; combining them is an
/// immediate illegal-state error at [`KvPut::prepare`], never deferred to
/// the future.
pub struct KvPut {
    dispatcher: Arc<Dispatcher>,
    collection: String,
    key:        String,
    path:       String,
    body:       Vec<u8>,
    if_match:   Option<String>,
    if_absent:  bool,
}

impl KvPut {
    /// Only write if the current value's ref matches (conditional-match)
    pub fn if_match<R: Into<String>>(mut self, ref_: R) -> Self {
        self.if_match = Some(ref_.into());
        self
    }

    /// Only write if the key holds no value yet (conditional-absent)
    pub fn if_absent(mut self) -> Self {
        self.if_absent = true;
        self
    }

    /// Prepares the write
    ///
    /// The result is `Some` receipt on success; for conditional writes a
    /// failed precondition (412) resolves to `None` instead of an error.
    ///
    /// # Errors
    /// Returns an `IllegalState` error if both `if_match` and `if_absent`
    /// were requested.
    pub fn prepare(self) -> ClientResult<PreparedRequest<Option<ItemMeta>>> {
        ensure!(
            !(self.if_match.is_some() && self.if_absent),
            crate::types::IllegalStateSnafu {
                message: "if_match and if_absent are mutually exclusive",
            }
        );

        let mut request = WireRequest::new(Method::Put, self.path)
            .header("Content-Type", "application/json")
            .body(self.body);
        let conditional = self.if_match.is_some() || self.if_absent;
        if let Some(ref_) = &self.if_match {
            request = request.header("If-Match", format!("\"{ref_}\""));
        }
        if self.if_absent {
            request = request.header("If-None-Match", "\"*\"");
        }

        let converter = if conditional {
            WriteReceiptConverter::conditional(self.collection, self.key)
        } else {
            WriteReceiptConverter::unconditional(self.collection, self.key)
        };
        Ok(PreparedRequest::deferred(
            self.dispatcher,
            request,
            converter,
        ))
    }
}

/// A pending KV delete
pub struct KvDelete {
    dispatcher: Arc<Dispatcher>,
    path:       String,
    if_match:   Option<String>,
    purge:      bool,
}

impl KvDelete {
    /// Only delete if the current value's ref matches
    pub fn if_match<R: Into<String>>(mut self, ref_: R) -> Self {
        self.if_match = Some(ref_.into());
        self
    }

    /// Also erase the item's ref history, not just the current value
    pub fn purge(mut self) -> Self {
        self.purge = true;
        self
    }

    /// Prepares the delete
    ///
    /// Resolves to `true` when the delete was applied; a conditional delete
    /// resolves to `false` when the precondition was not met.
    pub fn prepare(self) -> PreparedRequest<bool> {
        let mut request = WireRequest::new(Method::Delete, self.path);
        if self.purge {
            request = request.query("purge", "true");
        }
        let conditional = self.if_match.is_some();
        if let Some(ref_) = &self.if_match {
            request = request.header("If-Match", format!("\"{ref_}\""));
        }
        let converter = if conditional {
            AckConverter::conditional()
        } else {
            AckConverter::unconditional()
        };
        PreparedRequest::deferred(self.dispatcher, request, converter)
    }
}
