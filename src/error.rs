use std::borrow::Cow;
use std::fmt;

use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use serde::Deserialize;
use thiserror::Error;
use url::Url;

pub type Result<T> = std::result::Result<T, Error>;
pub type TokenReaderResult<T> = std::result::Result<T, TokenReaderError>;

/// Underlying cause of a transport failure.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

const AUTHORIZATION_PENDING: &str = "authorization_pending";

#[derive(Error, Debug)]
pub enum Error {
    #[error("transport failed : {0}")]
    Transport(#[source] BoxError),
    #[error("no response received : HTTP Status {}", .status.as_u16())]
    MalformedResponse { status: StatusCode },
    #[error("{0}")]
    HttpStatus(#[from] HttpStatusError),
    #[error("{0}")]
    Remote(#[from] RemoteError),
    #[error("OAuth problem : {0}")]
    OAuthProtocol(String),
    #[error("request creation failed : {0}")]
    RequestCreation(String),
    #[error("the provided token is expired")]
    TokenExpired,
    #[error("token acquisition failed : {0}")]
    TokenReader(#[from] TokenReaderError),
    #[error("invalid configuration : {0}")]
    Configuration(String),
    #[error("request was cancelled")]
    Cancelled,
}

impl Error {
    /// Whether the caller may reasonably retry the same request later.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Transport(_) => true,
            Error::Remote(remote) => remote.is_authorization_pending(),
            _ => false,
        }
    }

    pub fn is_authorization_pending(&self) -> bool {
        matches!(self, Error::Remote(remote) if remote.is_authorization_pending())
    }

    /// The HTTP status associated with this error, if any.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::MalformedResponse { status } => Some(*status),
            Error::HttpStatus(e) => Some(e.status),
            Error::Remote(e) => Some(e.status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Transport(Box::new(err))
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::RequestCreation(err.to_string())
    }
}

/// A response with status >= 400 that carried no structured error body.
#[derive(Debug, Clone)]
pub struct HttpStatusError {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub url: Url,
}

impl HttpStatusError {
    pub fn reason(&self) -> &'static str {
        self.status.canonical_reason().unwrap_or("Unknown Status")
    }

    pub fn body_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

impl fmt::Display for HttpStatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "HTTP Status {}: {}, Response: {}",
            self.status.as_u16(),
            self.reason(),
            self.body_text()
        )
    }
}

impl std::error::Error for HttpStatusError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteErrorKind {
    /// The user has not finished authorizing yet; poll again later.
    AuthorizationPending,
    Other,
}

/// Structured `error` / `error_description` pair returned in a JSON error body.
#[derive(Error, Debug, Clone)]
#[error("{code} {description}")]
pub struct RemoteError {
    pub code: String,
    pub description: String,
    pub status: StatusCode,
    pub kind: RemoteErrorKind,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
    error_description: String,
}

impl RemoteError {
    /// Returns `None` unless `body` is a JSON object with string `error`
    /// and `error_description` fields.
    pub fn from_body(status: StatusCode, body: &[u8]) -> Option<Self> {
        let parsed: ErrorBody = serde_json::from_slice(body).ok()?;
        let kind = if parsed.error == AUTHORIZATION_PENDING {
            RemoteErrorKind::AuthorizationPending
        } else {
            RemoteErrorKind::Other
        };
        Some(RemoteError {
            code: parsed.error,
            description: parsed.error_description,
            status,
            kind,
        })
    }

    pub fn is_authorization_pending(&self) -> bool {
        self.kind == RemoteErrorKind::AuthorizationPending
    }
}

#[derive(Error, Debug, Clone)]
pub enum TokenReaderError {
    #[error("response has malformed format: not found {0} in {1}")]
    TokenKeyNotFound(&'static str, String),
}
