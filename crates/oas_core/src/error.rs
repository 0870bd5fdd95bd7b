use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::state::Stage;

/// Failures while obtaining a bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("no credentials available under secret {0}")]
    MissingCredentials(String),
    #[error("token request failed: {0}")]
    RequestFailed(String),
    #[error("token response malformed: {0}")]
    MalformedResponse(String),
}

impl AuthError {
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::MissingCredentials(_) => "missing-credentials",
            AuthError::RequestFailed(_) => "request-failed",
            AuthError::MalformedResponse(_) => "malformed-response",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("http status {code}: {message}")]
    HttpStatus { code: u16, message: String },
    #[error("network error: {0}")]
    Network(String),
    #[error("response too large (max {max_bytes}, actual {actual:?})")]
    TooLarge { max_bytes: u64, actual: Option<u64> },
    #[error("invalid source: {0}")]
    InvalidSource(String),
    #[error("failed to decode bytes with {encoding}")]
    DecodeFailed { encoding: String },
}

impl FetchError {
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::NotFound(_) => "not-found",
            FetchError::HttpStatus { .. } => "http-status",
            FetchError::Network(_) => "network",
            FetchError::TooLarge { .. } => "too-large",
            FetchError::InvalidSource(_) => "invalid-source",
            FetchError::DecodeFailed { .. } => "decode-failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversionError {
    #[error("conversion timed out after {0:?}")]
    Timeout(Duration),
    #[error("renderer failed: {0}")]
    RenderFailed(String),
    #[error("renderer produced no usable html: {0}")]
    EmptyOutput(String),
}

impl ConversionError {
    pub fn kind(&self) -> &'static str {
        match self {
            ConversionError::Timeout(_) => "timeout",
            ConversionError::RenderFailed(_) => "render-failed",
            ConversionError::EmptyOutput(_) => "empty-output",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PublishError {
    #[error("failed to write {key}: {message}")]
    WriteFailed { key: String, message: String },
}

impl PublishError {
    pub fn kind(&self) -> &'static str {
        match self {
            PublishError::WriteFailed { .. } => "write-failed",
        }
    }
}

/// Top-level request errors. These are the only errors raised before any
/// item is attempted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("missing required parameter: {0}")]
    MissingParameter(String),
    #[error("ambiguous request, more than one input shape present: {}", .0.join(", "))]
    AmbiguousRequest(Vec<&'static str>),
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

impl RequestError {
    pub fn kind(&self) -> &'static str {
        match self {
            RequestError::MissingParameter(_) => "missing-parameter",
            RequestError::AmbiguousRequest(_) => "ambiguous-request",
            RequestError::InvalidParameter(_) => "invalid-parameter",
        }
    }
}

/// Any failure an individual item can end with.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ItemError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Conversion(#[from] ConversionError),
    #[error(transparent)]
    Publish(#[from] PublishError),
}

impl ItemError {
    pub fn kind(&self) -> &'static str {
        match self {
            ItemError::Auth(err) => err.kind(),
            ItemError::Fetch(err) => err.kind(),
            ItemError::Conversion(err) => err.kind(),
            ItemError::Publish(err) => err.kind(),
        }
    }

    /// Stage an item was in when this error ended it.
    ///
    /// Auth failures surface while fetching: the token is only needed there.
    pub fn stage(&self) -> Stage {
        match self {
            ItemError::Auth(_) | ItemError::Fetch(_) => Stage::Fetching,
            ItemError::Conversion(_) => Stage::Converting,
            ItemError::Publish(_) => Stage::Publishing,
        }
    }
}

/// Structured `{error, kind}` body returned for failed invocations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub kind: String,
}

impl ErrorBody {
    pub fn new(kind: &str, error: impl ToString) -> Self {
        Self {
            error: error.to_string(),
            kind: kind.to_string(),
        }
    }
}
