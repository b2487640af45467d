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

//! Graph-relation resource builders.
//!
//! Relations are named, directed edges between two items. Walking follows a
//! path of relation kinds from a source item and returns the items reached
//! at the end of the path.

use std::sync::Arc;

use coffer_api::{KvItem, Method, WireRequest};
use serde::de::DeserializeOwned;
use snafu::ensure;

use crate::{
    client::encode_segment,
    convert::{AckConverter, PageConverter, Paged},
    dispatch::Dispatcher,
    envelope::PreparedRequest,
    types::{ClientResult, InvalidArgumentSnafu},
};

/// Graph-relation operations on one item
pub struct RelationResource {
    dispatcher: Arc<Dispatcher>,
    collection: String,
    key:        String,
}

impl RelationResource {
    pub(crate) fn new(dispatcher: Arc<Dispatcher>, collection: String, key: String) -> Self {
        Self {
            dispatcher,
            collection,
            key,
        }
    }

    fn edge_path(&self, kind: &str, to_collection: &str, to_key: &str) -> String {
        format!(
            "v0/{}/{}/relation/{}/{}/{}",
            encode_segment(&self.collection),
            encode_segment(&self.key),
            encode_segment(kind),
            encode_segment(to_collection),
            encode_segment(to_key)
        )
    }

    /// Prepares creation of a directed edge from this item
    pub fn link(&self, kind: &str, to_collection: &str, to_key: &str) -> PreparedRequest<bool> {
        PreparedRequest::deferred(
            Arc::clone(&self.dispatcher),
            WireRequest::new(Method::Put, self.edge_path(kind, to_collection, to_key)),
            AckConverter::unconditional(),
        )
    }

    /// Prepares removal of a directed edge from this item
    pub fn unlink(&self, kind: &str, to_collection: &str, to_key: &str) -> PreparedRequest<bool> {
        PreparedRequest::deferred(
            Arc::clone(&self.dispatcher),
            WireRequest::new(Method::Delete, self.edge_path(kind, to_collection, to_key))
                .query("purge", "true"),
            AckConverter::unconditional(),
        )
    }

    /// Prepares a walk along `kinds` from this item
    ///
    /// Each element of `kinds` names the relation followed at that depth;
    /// the result pages over the items reached at the end of the path.
    ///
    /// # Errors
    /// Returns an `InvalidArgument` error when `kinds` is empty.
    pub fn walk<T>(&self, kinds: &[&str]) -> ClientResult<PreparedRequest<Paged<KvItem<T>>>>
    where
        T: DeserializeOwned + Clone + Send + Sync + 'static,
    {
        ensure!(!kinds.is_empty(), InvalidArgumentSnafu {
            message: "relation walk needs at least one relation kind",
        });
        let path = format!(
            "v0/{}/{}/relations/{}",
            encode_segment(&self.collection),
            encode_segment(&self.key),
            kinds
                .iter()
                .map(|kind| encode_segment(kind))
                .collect::<Vec<_>>()
                .join("/")
        );
        Ok(PreparedRequest::deferred(
            Arc::clone(&self.dispatcher),
            WireRequest::new(Method::Get, path),
            PageConverter::<KvItem<T>>::shared(Arc::clone(&self.dispatcher)),
        ))
    }
}
