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

//! Wire-level request and response descriptors.
//!
//! A [`WireRequest`] is the serialized form of one logical store operation:
//! everything the transport needs to put bytes on a connection. It is built
//! once by a resource builder and never mutated afterwards; pagination clones
//! it for continuation requests.
//!
//! A [`RawResponse`] is the full-message snapshot the transport hands back:
//! status, headers as a multi-map, and the complete body. The response
//! pipeline classifies and converts it without ever touching the socket.

/// HTTP method for a wire request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Put,
    Post,
    Delete,
    Head,
}

impl Method {
    /// Returns the method as its wire token
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Put => "PUT",
            Method::Post => "POST",
            Method::Delete => "DELETE",
            Method::Head => "HEAD",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Serialized form of one logical store operation
///
/// The path is relative to the client's base URL and already percent-encoded
/// by the resource builder that produced it. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct WireRequest {
    /// HTTP method
    pub method:  Method,
    /// Percent-encoded path relative to the base URL, e.g. `v0/users/alice`
    pub path:    String,
    /// Query pairs, appended in order
    pub query:   Vec<(String, String)>,
    /// Extra request headers (conditional preconditions, content type)
    pub headers: Vec<(String, String)>,
    /// Request body, if the operation carries one
    pub body:    Option<Vec<u8>>,
}

impl WireRequest {
    /// Creates a bodyless request for the given method and path
    pub fn new<P: Into<String>>(method: Method, path: P) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// Appends a query pair
    pub fn query<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Appends a request header
    pub fn header<K: Into<String>, V: Into<String>>(mut self, name: K, value: V) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Attaches a body
    pub fn body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(body);
        self
    }

    /// Parses a server-issued continuation link (`/v0/...?limit=10&offset=10`)
    /// back into a GET request relative to the same base URL.
    ///
    /// Query keys and values arrive percent-encoded and are decoded here;
    /// the transport re-encodes them when it assembles the URL, so keeping
    /// the encoded form would encode them twice. The path stays encoded
    /// because it is joined onto the base URL as-is.
    pub fn from_link(link: &str) -> Self {
        let trimmed = link.trim_start_matches('/');
        match trimmed.split_once('?') {
            Some((path, query)) => {
                let query = query
                    .split('&')
                    .filter(|pair| !pair.is_empty())
                    .map(|pair| match pair.split_once('=') {
                        Some((k, v)) => (decode_component(k), decode_component(v)),
                        None => (decode_component(pair), String::new()),
                    })
                    .collect();
                Self {
                    method: Method::Get,
                    path: path.to_string(),
                    query,
                    headers: Vec::new(),
                    body: None,
                }
            }
            None => Self::new(Method::Get, trimmed),
        }
    }
}

/// Percent-decodes one query component, passing it through untouched when
/// the encoding is malformed
fn decode_component(raw: &str) -> String {
    urlencoding::decode(raw)
        .map(std::borrow::Cow::into_owned)
        .unwrap_or_else(|_| raw.to_string())
}

/// Full-message snapshot of one HTTP response
///
/// Headers are kept as a multi-map; lookups are case-insensitive because
/// proxies routinely rewrite header casing.
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    /// Numeric HTTP status
    pub status:  u16,
    /// Response headers in arrival order
    pub headers: Vec<(String, String)>,
    /// Complete response body
    pub body:    Vec<u8>,
}

impl RawResponse {
    /// Creates a response snapshot
    pub fn new(status: u16, headers: Vec<(String, String)>, body: Vec<u8>) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Returns the first value of the named header, case-insensitively
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns the body as UTF-8 text, lossily
    pub fn body_text(&self) -> String { String::from_utf8_lossy(&self.body).into_owned() }
}
