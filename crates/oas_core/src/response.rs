use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::{
    AuthError, ConversionError, ErrorBody, FetchError, ItemError, PublishError, RequestError,
};
use crate::report::BatchReport;

pub const OUTPUT_KEY_HEADER: &str = "X-Output-Key";

/// `{status_code, body, headers}` handed back to whoever invoked the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Response {
    pub status_code: u16,
    pub body: String,
    pub headers: BTreeMap<String, String>,
}

impl Response {
    /// Single-item success: the rendered page itself.
    pub fn html(html: String, output_key: &str) -> Self {
        let mut headers = content_type("text/html");
        headers.insert(OUTPUT_KEY_HEADER.to_string(), output_key.to_string());
        Self {
            status_code: 200,
            body: html,
            headers,
        }
    }

    /// Batch result: always 2xx, partial failure shows in `failed_count`.
    pub fn report(report: &BatchReport) -> Self {
        Self {
            status_code: 200,
            body: report.to_json(),
            headers: content_type("application/json"),
        }
    }

    pub fn error(status_code: u16, body: ErrorBody) -> Self {
        Self {
            status_code,
            body: serde_json::to_string(&body).unwrap_or_default(),
            headers: content_type("application/json"),
        }
    }

    pub fn from_request_error(err: &RequestError) -> Self {
        Self::error(400, ErrorBody::new(err.kind(), err))
    }

    pub fn from_item_error(err: &ItemError) -> Self {
        Self::error(status_for(err), ErrorBody::new(err.kind(), err))
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

/// HTTP status for a failed single-item invocation.
pub fn status_for(err: &ItemError) -> u16 {
    match err {
        ItemError::Auth(AuthError::MissingCredentials(_)) => 500,
        ItemError::Auth(_) => 502,
        ItemError::Fetch(FetchError::NotFound(_)) => 404,
        ItemError::Fetch(FetchError::InvalidSource(_)) => 400,
        ItemError::Fetch(_) => 502,
        ItemError::Conversion(ConversionError::Timeout(_)) => 504,
        ItemError::Conversion(_) => 500,
        ItemError::Publish(PublishError::WriteFailed { .. }) => 500,
    }
}

fn content_type(value: &str) -> BTreeMap<String, String> {
    let mut headers = BTreeMap::new();
    headers.insert("Content-Type".to_string(), value.to_string());
    headers
}
