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

//! Response demultiplexer: routes a completed raw response back to the
//! future attached to its connection.
//!
//! Classification is per-operation: statuses in the converter's success set
//! go through the converter; 401 becomes the distinguished
//! [`ClientError::Unauthorized`]; everything else becomes a
//! [`ClientError::RequestFailed`] carrying the body text and the request id
//! from the `X-Request-Id` header. Converter failures, including panics,
//! are captured and settle the future; nothing escapes on the I/O task.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use coffer_api::RawResponse;
use tracing::{debug, error};

use crate::{
    convert::ResultConverter,
    pool::ConnectionContext,
    types::{ClientError, ClientResult},
};

/// Response header carrying the server-side correlation id
const REQUEST_ID_HEADER: &str = "X-Request-Id";

/// Routes one completed response into the future pending on the connection
///
/// A connection with no attached future at response time is a protocol
/// invariant violation (the dispatcher always attaches before writing); the
/// response is dropped with an error log, since there is no future to fail.
pub(crate) fn deliver<T: Clone>(
    ctx: &mut ConnectionContext<T>,
    converter: &Arc<dyn ResultConverter<T>>,
    response: RawResponse,
) {
    let Some(future) = ctx.take_pending() else {
        error!(
            connection = ctx.id(),
            status = response.status,
            "response arrived with no pending operation attached"
        );
        debug_assert!(false, "response delivered to a connection with no pending future");
        return;
    };

    let settled = match classify(converter.as_ref(), &response) {
        Ok(value) => future.complete(value),
        Err(error) => future.complete_err(error),
    };
    if let Err(state_error) = settled {
        // Lost the race against a concurrent cancel; the outcome stands.
        debug!(connection = ctx.id(), %state_error, "pending future already settled");
    }
}

/// Classifies a raw response and converts it on the success path
pub(crate) fn classify<T>(
    converter: &dyn ResultConverter<T>,
    response: &RawResponse,
) -> ClientResult<T> {
    if converter.success_codes().contains(&response.status) {
        return match catch_unwind(AssertUnwindSafe(|| converter.convert(response))) {
            Ok(converted) => converted,
            Err(_) => Err(ClientError::Conversion {
                message: "result converter panicked".to_string(),
            }),
        };
    }

    let request_id = response.header(REQUEST_ID_HEADER).map(str::to_string);
    let message = response.body_text();
    if response.status == 401 {
        Err(ClientError::Unauthorized {
            message,
            request_id,
        })
    } else {
        Err(ClientError::RequestFailed {
            status: response.status,
            message,
            request_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use coffer_api::KvItem;

    use super::*;
    use crate::convert::KvFetchConverter;

    fn response(status: u16, headers: &[(&str, &str)], body: &str) -> RawResponse {
        RawResponse::new(
            status,
            headers
                .iter()
                .map(|(n, v)| (n.to_string(), v.to_string()))
                .collect(),
            body.as_bytes().to_vec(),
        )
    }

    #[test]
    fn test_classify_routes_whitelisted_status_to_converter() {
        // 404 with a KV fetch converter is an absent value, not an error.
        let converter = KvFetchConverter::<serde_json::Value>::json("users", "ghost");
        let result = classify(converter.as_ref(), &response(404, &[], "")).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_classify_401_is_unauthorized_subtype() {
        let converter = KvFetchConverter::<serde_json::Value>::json("users", "alice");
        let err = classify(
            converter.as_ref(),
            &response(401, &[("X-Request-Id", "req-7")], "bad credentials"),
        )
        .unwrap_err();
        match err {
            ClientError::Unauthorized {
                message,
                request_id,
            } => {
                assert_eq!(message, "bad credentials");
                assert_eq!(request_id.as_deref(), Some("req-7"));
            }
            other => panic!("expected Unauthorized, got {other:?}"),
        }
        assert!(
            classify(converter.as_ref(), &response(401, &[], ""))
                .unwrap_err()
                .is_unauthorized()
        );
    }

    #[test]
    fn test_classify_500_carries_body_and_request_id() {
        let converter = KvFetchConverter::<serde_json::Value>::json("users", "alice");
        let err = classify(
            converter.as_ref(),
            &response(500, &[("x-request-id", "req-9")], "internal error"),
        )
        .unwrap_err();
        match err {
            ClientError::RequestFailed {
                status,
                message,
                request_id,
            } => {
                assert_eq!(status, 500);
                assert_eq!(message, "internal error");
                assert_eq!(request_id.as_deref(), Some("req-9"));
            }
            other => panic!("expected RequestFailed, got {other:?}"),
        }
    }

    #[test]
    fn test_converter_panic_becomes_conversion_error() {
        struct Panicking;
        impl ResultConverter<KvItem<String>> for Panicking {
            fn success_codes(&self) -> &[u16] { &[200] }

            fn convert(&self, _response: &RawResponse) -> ClientResult<KvItem<String>> {
                panic!("converter bug")
            }
        }

        let err = classify(&Panicking, &response(200, &[], "")).unwrap_err();
        assert!(matches!(err, ClientError::Conversion { .. }));
    }
}
