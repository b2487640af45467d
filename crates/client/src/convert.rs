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

//! Result converters: raw HTTP responses to typed domain results.
//!
//! Each store operation kind carries its own [`ResultConverter`], selected by
//! the resource builder that prepared the request. A converter declares which
//! status codes are semantically successful for its operation (a KV fetch
//! treats 404 as "no value", a conditional write treats 412 as "precondition
//! not met") and turns the raw response into the declared result type. The
//! response pipeline routes every status outside that set to the error
//! classifier instead.

use std::{
    marker::PhantomData,
    sync::{Arc, Weak},
};

use coffer_api::{ItemMeta, ItemPath, KvItem, RawResponse, WireRequest};
use serde::de::DeserializeOwned;

use crate::{
    dispatch::Dispatcher,
    envelope::PreparedRequest,
    types::{ClientError, ClientResult},
};

/// Pure mapping from a raw response to a typed result
pub trait ResultConverter<T>: Send + Sync {
    /// Status codes this operation considers semantically successful
    fn success_codes(&self) -> &[u16];

    /// Converts a successful raw response into the declared result type
    ///
    /// # Errors
    /// Returns `ClientError::Conversion` when the body or headers cannot be
    /// mapped to the result type.
    fn convert(&self, response: &RawResponse) -> ClientResult<T>;
}

/// Strips quoting and any compression suffix from a version ref header
///
/// Servers return the ref as a strong ETag (`"cbb48f9464612f20"`), sometimes
/// with a `-gzip` suffix added by intermediaries.
pub fn normalize_ref(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('"');
    trimmed.strip_suffix("-gzip").unwrap_or(trimmed).to_string()
}

/// Extracts the version ref of a write receipt from `ETag` or `Location`
fn ref_from_response(response: &RawResponse) -> ClientResult<String> {
    if let Some(etag) = response.header("ETag") {
        return Ok(normalize_ref(etag));
    }
    if let Some(location) = response.header("Location") {
        if let Some(ref_) = location.rsplit('/').next() {
            if !ref_.is_empty() {
                return Ok(normalize_ref(ref_));
            }
        }
    }
    Err(ClientError::Conversion {
        message: "response carried no version ref".to_string(),
    })
}

type BodyDecoder<T> = Arc<dyn Fn(&[u8]) -> ClientResult<T> + Send + Sync>;

/// Converter for single-item KV fetches
///
/// 404 is part of the success set and maps to `None`: an absent key is a
/// value, not an error. The body decodes as structured JSON, or as the raw
/// UTF-8 text when built with [`KvFetchConverter::raw`].
pub struct KvFetchConverter<T> {
    collection: String,
    key:        String,
    decoder:    BodyDecoder<T>,
}

impl<T: DeserializeOwned> KvFetchConverter<T> {
    /// Converter decoding the value as JSON into `T`
    pub fn json<C: Into<String>, K: Into<String>>(collection: C, key: K) -> Arc<Self> {
        Arc::new(Self {
            collection: collection.into(),
            key:        key.into(),
            decoder:    Arc::new(|bytes| {
                serde_json::from_slice(bytes).map_err(ClientError::conversion)
            }),
        })
    }
}

impl KvFetchConverter<String> {
    /// Converter passing the value through as opaque text, without parsing
    pub fn raw<C: Into<String>, K: Into<String>>(collection: C, key: K) -> Arc<Self> {
        Arc::new(Self {
            collection: collection.into(),
            key:        key.into(),
            decoder:    Arc::new(|bytes| {
                String::from_utf8(bytes.to_vec()).map_err(ClientError::conversion)
            }),
        })
    }
}

impl<T> ResultConverter<Option<KvItem<T>>> for KvFetchConverter<T>
where
    T: Send + Sync,
{
    fn success_codes(&self) -> &[u16] { &[200, 404] }

    fn convert(&self, response: &RawResponse) -> ClientResult<Option<KvItem<T>>> {
        if response.status == 404 {
            return Ok(None);
        }
        let value = (self.decoder)(&response.body)?;
        let ref_ = ref_from_response(response)?;
        Ok(Some(KvItem {
            path: ItemPath {
                collection: self.collection.clone(),
                key: self.key.clone(),
                ref_,
            },
            value,
        }))
    }
}

/// Converter for writes, producing the write receipt
///
/// Conditional writes include 412 in their success set; a 412 converts to
/// `None` (the precondition was not met, nothing was written). Unconditional
/// writes always produce `Some` receipt.
pub struct WriteReceiptConverter {
    collection: String,
    key:        String,
    success:    Vec<u16>,
}

impl WriteReceiptConverter {
    /// Receipt converter for an unconditional write
    pub fn unconditional<C: Into<String>, K: Into<String>>(collection: C, key: K) -> Arc<Self> {
        Arc::new(Self {
            collection: collection.into(),
            key:        key.into(),
            success:    vec![200, 201, 204],
        })
    }

    /// Receipt converter for a write guarded by a precondition
    pub fn conditional<C: Into<String>, K: Into<String>>(collection: C, key: K) -> Arc<Self> {
        Arc::new(Self {
            collection: collection.into(),
            key:        key.into(),
            success:    vec![200, 201, 204, 412],
        })
    }
}

impl ResultConverter<Option<ItemMeta>> for WriteReceiptConverter {
    fn success_codes(&self) -> &[u16] { &self.success }

    fn convert(&self, response: &RawResponse) -> ClientResult<Option<ItemMeta>> {
        if response.status == 412 {
            return Ok(None);
        }
        let ref_ = ref_from_response(response)?;
        Ok(Some(ItemMeta {
            path: ItemPath {
                collection: self.collection.clone(),
                key: self.key.clone(),
                ref_,
            },
        }))
    }
}

/// Converter producing a bare acknowledgement flag
///
/// Conditional operations include 412 in their success set; a 412 response
/// converts to `false` (the precondition was not met) rather than an error.
pub struct AckConverter {
    success: Vec<u16>,
    falsy:   Vec<u16>,
}

impl AckConverter {
    /// Plain acknowledgement: any success status is `true`
    pub fn unconditional() -> Arc<Self> {
        Arc::new(Self {
            success: vec![200, 201, 204],
            falsy:   Vec::new(),
        })
    }

    /// Conditional write acknowledgement: 412 is a negative outcome, not an
    /// error
    pub fn conditional() -> Arc<Self> {
        Arc::new(Self {
            success: vec![200, 201, 204, 412],
            falsy:   vec![412],
        })
    }
}

impl ResultConverter<bool> for AckConverter {
    fn success_codes(&self) -> &[u16] { &self.success }

    fn convert(&self, response: &RawResponse) -> ClientResult<bool> {
        Ok(!self.falsy.contains(&response.status))
    }
}

/// One page of a paginated listing, with a ready-to-send continuation
///
/// Unlike the wire-level [`coffer_api::Page`], `next` here is a bound
/// [`PreparedRequest`] sharing this page's converter: executing it yields the
/// following page of the same declared type.
#[derive(Clone)]
pub struct Paged<E> {
    /// Entries on this page
    pub results:     Vec<E>,
    /// Number of entries on this page
    pub count:       u64,
    /// Total matches across all pages, when the server reports it
    pub total_count: Option<u64>,
    next:            Option<PreparedRequest<Paged<E>>>,
}

impl<E> Paged<E> {
    /// True when the server reported a following page
    pub fn has_next(&self) -> bool { self.next.is_some() }

    /// The prepared (not yet sent) request for the following page
    pub fn next_page(&self) -> Option<&PreparedRequest<Paged<E>>> { self.next.as_ref() }
}

impl<E> std::fmt::Debug for Paged<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Paged")
            .field("count", &self.count)
            .field("total_count", &self.total_count)
            .field("has_next", &self.has_next())
            .finish()
    }
}

/// Converter for paginated listings (KV lists, event ranges, relation walks,
/// search results)
///
/// Self-referential: a `next` link in the body becomes a continuation request
/// bound to this same converter instance, so every page of a listing flows
/// through one converter.
pub struct PageConverter<E> {
    dispatcher: Arc<Dispatcher>,
    this:       Weak<PageConverter<E>>,
    _marker:    PhantomData<fn() -> E>,
}

impl<E> PageConverter<E>
where
    E: DeserializeOwned + Clone + Send + 'static,
{
    /// Creates a shared converter that can hand itself to continuation
    /// requests
    pub fn shared(dispatcher: Arc<Dispatcher>) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            dispatcher,
            this: this.clone(),
            _marker: PhantomData,
        })
    }
}

impl<E> ResultConverter<Paged<E>> for PageConverter<E>
where
    E: DeserializeOwned + Clone + Send + 'static,
{
    fn success_codes(&self) -> &[u16] { &[200] }

    fn convert(&self, response: &RawResponse) -> ClientResult<Paged<E>> {
        let page: coffer_api::Page<E> =
            serde_json::from_slice(&response.body).map_err(ClientError::conversion)?;
        let next = page.next.as_ref().and_then(|link| {
            // The upgrade always succeeds while this converter is being
            // invoked through its own Arc.
            self.this.upgrade().map(|converter| {
                PreparedRequest::deferred(
                    Arc::clone(&self.dispatcher),
                    WireRequest::from_link(link),
                    converter as Arc<dyn ResultConverter<Paged<E>>>,
                )
            })
        });
        Ok(Paged {
            results: page.results,
            count: page.count,
            total_count: page.total_count,
            next,
        })
    }
}
