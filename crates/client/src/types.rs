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

use snafu::Snafu;

/// Common result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;

/// Client error types
///
/// Every variant owns its data (no source chains): the same stored outcome is
/// handed to every listener and every waiter of an operation future, so the
/// error type must be `Clone`. Causes from reqwest/url/serde_json are rendered
/// into the message at the boundary where they occur.
#[derive(Debug, Clone, PartialEq, Snafu)]
#[snafu(visibility(pub))]
pub enum ClientError {
    /// Transport-level failure: connect failed, transport not startable, or
    /// the write/read itself failed
    #[snafu(display("Connection error: {message}"))]
    Connection { message: String },

    /// The server answered with a status outside the operation's success set
    #[snafu(display("Request failed with status {status}: {message}"))]
    RequestFailed {
        status:     u16,
        message:    String,
        request_id: Option<String>,
    },

    /// Authentication failure (HTTP 401), distinguished so callers can
    /// special-case credential problems
    #[snafu(display("Unauthorized: {message}"))]
    Unauthorized {
        message:    String,
        request_id: Option<String>,
    },

    /// Response body could not be converted to the declared result type
    #[snafu(display("Conversion error: {message}"))]
    Conversion { message: String },

    /// URL parsing or joining error
    #[snafu(display("Invalid URL: {message}"))]
    InvalidUrl { message: String },

    /// Invalid argument error
    #[snafu(display("Invalid argument: {message}"))]
    InvalidArgument { message: String },

    /// A blocking wait gave up before the operation completed; the operation
    /// itself is unaffected and may still complete later
    #[snafu(display("Timed out after {millis}ms waiting for completion"))]
    Timeout { millis: u64 },

    /// The operation was cancelled before it completed
    #[snafu(display("Operation cancelled"))]
    Cancelled,

    /// Programming error: double completion, mutually exclusive options, or
    /// use outside a runtime
    #[snafu(display("Illegal state: {message}"))]
    IllegalState { message: String },
}

impl ClientError {
    /// Wraps a transport-level cause into a connection error
    pub fn connection<E: std::fmt::Display>(context: &str, cause: E) -> Self {
        ClientError::Connection {
            message: format!("{context}: {cause}"),
        }
    }

    /// Wraps a deserialization cause into a conversion error
    pub fn conversion<E: std::fmt::Display>(cause: E) -> Self {
        ClientError::Conversion {
            message: cause.to_string(),
        }
    }

    /// True for the authentication-failure subtype
    pub fn is_unauthorized(&self) -> bool { matches!(self, ClientError::Unauthorized { .. }) }
}
