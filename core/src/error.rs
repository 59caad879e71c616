//! Error types for the analytics API client.
//!
//! # Design
//! `Unauthorized` and `NotFound` get dedicated variants because callers
//! branch on them. All other non-2xx responses land in `Http` with the raw
//! status and body. `Request` is what the surface-and-wrap operations return:
//! a human-readable message with the underlying failure kept as its source.

use serde::Deserialize;

/// Errors returned by `ApiClient` and `Endpoints`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The server returned 401.
    #[error("unauthorized: {body}")]
    Unauthorized { body: String },

    /// The server returned 404.
    #[error("resource not found")]
    NotFound { body: String },

    /// The server returned a non-2xx status other than 401 and 404.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The request never produced a response.
    #[error("transport failed: {0}")]
    Transport(String),

    /// The response body could not be deserialized into the expected type.
    #[error("deserialization failed: {0}")]
    Deserialization(String),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// The session store rejected a read or write.
    #[error("session storage failed: {0}")]
    Storage(#[from] StoreError),

    /// A local file could not be read.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no refresh token stored")]
    MissingRefreshToken,

    /// A failure rewrapped with a message meant for the user.
    #[error("{message}")]
    Request {
        message: String,
        #[source]
        source: Box<ApiError>,
    },
}

#[derive(Deserialize)]
struct ErrorPayload {
    message: Option<String>,
}

impl ApiError {
    /// HTTP status carried by the error, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Unauthorized { .. } => Some(401),
            ApiError::NotFound { .. } => Some(404),
            ApiError::Http { status, .. } => Some(*status),
            ApiError::Request { source, .. } => source.status(),
            _ => None,
        }
    }

    /// The `message` field of a JSON error payload, when the server sent one.
    pub fn server_message(&self) -> Option<String> {
        let body = match self {
            ApiError::Unauthorized { body }
            | ApiError::NotFound { body }
            | ApiError::Http { body, .. } => body,
            ApiError::Request { source, .. } => return source.server_message(),
            _ => return None,
        };
        serde_json::from_str::<ErrorPayload>(body)
            .ok()
            .and_then(|payload| payload.message)
            .filter(|message| !message.is_empty())
    }
}

/// Errors raised by `SessionStore` implementations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("session file io: {0}")]
    Io(#[from] std::io::Error),

    #[error("session file is not a JSON object: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("session store lock poisoned")]
    Poisoned,
}
