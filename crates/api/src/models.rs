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

//! JSON domain models returned by store operations.

use serde::{Deserialize, Serialize};

/// Fully-qualified location of a stored item: collection, key, and the
/// version ref of the value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemPath {
    /// Collection the item lives in
    pub collection: String,
    /// Item key within the collection
    pub key:        String,
    /// Version ref of the value (content hash issued by the server)
    #[serde(rename = "ref")]
    pub ref_:       String,
}

/// Write receipt for a mutating operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemMeta {
    /// Where the write landed, including the new ref
    pub path: ItemPath,
}

/// A stored value together with its location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KvItem<T> {
    /// Location and version of the value
    pub path:  ItemPath,
    /// The deserialized value
    pub value: T,
}

/// One entry in an event log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event<T> {
    /// Event timestamp in milliseconds since Unix epoch
    pub timestamp: i64,
    /// Server-assigned ordinal, unique within one timestamp
    pub ordinal:   u64,
    /// The event payload
    pub value:     T,
}

/// One search hit: the stored item plus its relevance score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult<T> {
    /// Location and version of the matched value
    pub path:  ItemPath,
    /// Relevance score assigned by the search engine
    pub score: f64,
    /// The deserialized value
    pub value: T,
}

/// Wire shape of one page of a paginated listing
///
/// `next`, when present, is a server-issued link (path + query) to the
/// following page. The client turns it into a continuation request; this
/// type only carries the raw link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<E> {
    /// Entries on this page
    pub results:     Vec<E>,
    /// Number of entries on this page
    pub count:       u64,
    /// Total matches across all pages, when the server reports it
    #[serde(default)]
    pub total_count: Option<u64>,
    /// Link to the next page, when one exists
    #[serde(default)]
    pub next:        Option<String>,
}
