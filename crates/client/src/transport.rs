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

//! HTTP transport boundary.
//!
//! The dispatch pipeline consumes the transport through the narrow
//! [`Transport`] trait: one serialized request in, one full-message response
//! snapshot out. Wire-level framing, TLS, and socket pooling are reqwest's
//! concern; tests substitute a scripted mock.

use std::time::Duration;

use async_trait::async_trait;
use coffer_api::{Method, RawResponse, WireRequest};
use reqwest::Client;
use tracing::debug;
use url::Url;

use crate::types::{ClientError, ClientResult};

/// One-exchange transport: write a serialized request, receive the complete
/// response message
#[async_trait]
pub trait Transport: Send + Sync {
    /// Performs one HTTP exchange
    ///
    /// # Errors
    /// Returns `ClientError::Connection` when the request cannot be written
    /// or the response cannot be read; status-level failures are NOT errors
    /// here, classification happens downstream.
    async fn execute(&self, request: &WireRequest) -> ClientResult<RawResponse>;
}

/// reqwest-backed transport bound to one store endpoint
#[derive(Debug, Clone)]
pub struct HttpTransport {
    /// The HTTP client
    client:          Client,
    /// Base URL for the server, always ending in a slash
    base_url:        Url,
    /// Headers applied to every request (authorization, content type)
    default_headers: Vec<(String, String)>,
}

impl HttpTransport {
    /// Opens a transport against the given endpoint
    ///
    /// # Errors
    /// Returns a `ClientError` if the endpoint is not a valid URL or the
    /// HTTP client cannot be built.
    pub fn open(
        endpoint: &str,
        auth_token: Option<&str>,
        request_timeout: Option<Duration>,
    ) -> ClientResult<Self> {
        // No proxy to avoid proxy issues with localhost endpoints.
        let mut builder = Client::builder().no_proxy();
        if let Some(timeout) = request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| ClientError::connection("failed to build HTTP client", e))?;

        // A trailing slash keeps Url::join from eating the last path segment.
        let normalized = if endpoint.ends_with('/') {
            endpoint.to_string()
        } else {
            format!("{endpoint}/")
        };
        let base_url = Url::parse(&normalized).map_err(|e| ClientError::InvalidUrl {
            message: format!("invalid endpoint '{endpoint}': {e}"),
        })?;

        let mut default_headers = Vec::new();
        if let Some(token) = auth_token {
            default_headers.push(("Authorization".to_string(), format!("Bearer {token}")));
        }

        debug!("opened HTTP transport for {}", base_url);
        Ok(Self {
            client,
            base_url,
            default_headers,
        })
    }

    fn request_url(&self, request: &WireRequest) -> ClientResult<Url> {
        let mut url = self
            .base_url
            .join(&request.path)
            .map_err(|e| ClientError::InvalidUrl {
                message: format!("invalid request path '{}': {e}", request.path),
            })?;
        if !request.query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &request.query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: &WireRequest) -> ClientResult<RawResponse> {
        let url = self.request_url(request)?;
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Put => reqwest::Method::PUT,
            Method::Post => reqwest::Method::POST,
            Method::Delete => reqwest::Method::DELETE,
            Method::Head => reqwest::Method::HEAD,
        };
        debug!("{} {}", request.method, url);

        let mut builder = self.client.request(method, url);
        for (name, value) in self.default_headers.iter().chain(&request.headers) {
            builder = builder.header(name, value);
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await.map_err(|e| {
            ClientError::connection(&format!("request to '{}' failed", request.path), e)
        })?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = response
            .bytes()
            .await
            .map_err(|e| ClientError::connection("failed to read response body", e))?
            .to_vec();

        Ok(RawResponse::new(status, headers, body))
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_normalizes_trailing_slash() {
        let transport = HttpTransport::open("http://localhost:8080/v0", None, None).unwrap();
        let url = transport
            .request_url(&WireRequest::new(Method::Get, "users/alice"))
            .unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/v0/users/alice");
    }

    #[test]
    fn test_open_rejects_bad_endpoint() {
        let err = HttpTransport::open("not a url", None, None).unwrap_err();
        assert!(matches!(err, ClientError::InvalidUrl { .. }));
    }

    #[test]
    fn test_continuation_link_is_not_double_encoded() {
        // A server-issued next link carries already-encoded query values;
        // round-tripping it through from_link and request_url must put a
        // singly-encoded value back on the wire.
        let transport = HttpTransport::open("http://localhost:8080", None, None).unwrap();
        let request = WireRequest::from_link("/v0/users?afterKey=a%20b");
        let url = transport.request_url(&request).unwrap();

        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert_eq!(pairs, vec![("afterKey".to_string(), "a b".to_string())]);
        assert!(!url.query().unwrap().contains("%25"));
    }

    #[test]
    fn test_query_pairs_are_appended_in_order() {
        let transport = HttpTransport::open("http://localhost:8080", None, None).unwrap();
        let request = WireRequest::new(Method::Get, "users")
            .query("limit", "10")
            .query("afterKey", "k1");
        let url = transport.request_url(&request).unwrap();
        assert_eq!(url.query(), Some("limit=10&afterKey=k1"));
    }
}
