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

//! Shared wire and domain types for the Coffer client.
//!
//! This crate holds the types that cross the boundary between the request
//! pipeline and the resource builders: the wire request descriptor, the raw
//! response snapshot, and the JSON domain models (items, events, search
//! results, pages).

pub mod models;
pub mod request;

pub use models::{Event, ItemMeta, ItemPath, KvItem, Page, SearchResult};
pub use request::{Method, RawResponse, WireRequest};
