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

//! Search resource builders.

use std::sync::Arc;

use coffer_api::{Method, SearchResult, WireRequest};
use serde::de::DeserializeOwned;

use crate::{
    client::encode_segment,
    convert::{PageConverter, Paged},
    dispatch::Dispatcher,
    envelope::PreparedRequest,
};

/// Search operations on one collection
pub struct SearchResource {
    dispatcher: Arc<Dispatcher>,
    collection: String,
}

impl SearchResource {
    pub(crate) fn new(dispatcher: Arc<Dispatcher>, collection: String) -> Self {
        Self {
            dispatcher,
            collection,
        }
    }

    /// Prepares a Lucene-syntax query over the collection
    ///
    /// Results come back scored, best first; the page carries a continuation
    /// request when more matches exist.
    pub fn query<T>(
        &self,
        query: &str,
        limit: Option<u64>,
        offset: Option<u64>,
    ) -> PreparedRequest<Paged<SearchResult<T>>>
    where
        T: DeserializeOwned + Clone + Send + Sync + 'static,
    {
        let mut request =
            WireRequest::new(Method::Get, format!("v0/{}", encode_segment(&self.collection)))
                .query("query", query);
        if let Some(limit) = limit {
            request = request.query("limit", limit.to_string());
        }
        if let Some(offset) = offset {
            request = request.query("offset", offset.to_string());
        }
        PreparedRequest::deferred(
            Arc::clone(&self.dispatcher),
            request,
            PageConverter::<SearchResult<T>>::shared(Arc::clone(&self.dispatcher)),
        )
    }
}

#[cfg(test)]
mod tests {
    use tokio::runtime::Handle;

    use super::*;
    use crate::transport::testing::MockTransport;

    fn resource() -> SearchResource {
        let dispatcher = Arc::new(Dispatcher::with_transport(
            Arc::new(MockTransport::new()),
            2,
            Handle::current(),
        ));
        SearchResource::new(dispatcher, "users".to_string())
    }

    #[tokio::test]
    async fn test_query_targets_collection_root() {
        let request = resource().query::<serde_json::Value>("name:Alice", None, None);
        assert_eq!(request.wire_request().method, Method::Get);
        assert_eq!(request.wire_request().path, "v0/users");
        assert_eq!(
            request.wire_request().query,
            vec![("query".to_string(), "name:Alice".to_string())]
        );
    }

    #[tokio::test]
    async fn test_query_carries_window() {
        let request = resource().query::<serde_json::Value>("*", Some(50), Some(100));
        assert_eq!(request.wire_request().query, vec![
            ("query".to_string(), "*".to_string()),
            ("limit".to_string(), "50".to_string()),
            ("offset".to_string(), "100".to_string()),
        ]);
    }
}
