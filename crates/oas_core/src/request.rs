//! Invocation shapes accepted by the dispatcher and their normalisation into
//! one canonical request.
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use crate::error::RequestError;
use crate::source::SourceRef;

/// Name given to inline content submitted without one.
pub const DEFAULT_INLINE_NAME: &str = "openapi.yaml";

/// Request fields as they arrive. Older callers use the `oas_*` / `s3_*` names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RawRequest {
    pub url: Option<String>,
    #[serde(alias = "oas_content")]
    pub content: Option<String>,
    #[serde(alias = "oas_file_name")]
    pub name: Option<String>,
    #[serde(alias = "s3_bucket", alias = "bucket")]
    pub container: Option<String>,
    #[serde(alias = "s3_key")]
    pub key: Option<String>,
    pub manifest_key: Option<String>,
    pub path: Option<PathBuf>,
    #[serde(default)]
    pub use_auth: bool,
    pub token_endpoint: Option<String>,
    /// Conversion timeout in seconds.
    pub timeout: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    Url(String),
    Inline { name: String, content: String },
    Object { container: String, key: String },
    Manifest { container: String, manifest_key: String },
    Path(PathBuf),
}

impl Invocation {
    pub fn shape(&self) -> &'static str {
        match self {
            Invocation::Url(_) => "url",
            Invocation::Inline { .. } => "inline",
            Invocation::Object { .. } => "object",
            Invocation::Manifest { .. } => "manifest",
            Invocation::Path(_) => "path",
        }
    }

    /// What has to be processed: one source, or a manifest that expands
    /// only once it has been read.
    pub fn into_workload(self) -> Workload {
        match self {
            Invocation::Url(url) => Workload::Single(SourceRef::Url(url)),
            Invocation::Inline { name, content } => {
                Workload::Single(SourceRef::Inline { name, content })
            }
            Invocation::Object { container, key } => {
                Workload::Single(SourceRef::Object { container, key })
            }
            Invocation::Path(path) => Workload::Single(SourceRef::Path(path)),
            Invocation::Manifest {
                container,
                manifest_key,
            } => Workload::Manifest {
                container,
                manifest_key,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Workload {
    Single(SourceRef),
    Manifest {
        container: String,
        manifest_key: String,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthOptions {
    pub use_auth: bool,
    /// Overrides the configured token endpoint.
    pub token_endpoint: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalRequest {
    pub invocation: Invocation,
    pub auth: AuthOptions,
    pub timeout: Option<Duration>,
}

impl CanonicalRequest {
    /// Decode an incoming event: either a storage notification envelope
    /// (`Records[0].s3`) or a plain request object.
    pub fn from_event(event: Value, manifest_suffixes: &[String]) -> Result<Self, RequestError> {
        if let Some(notification) = StorageNotification::from_envelope(&event) {
            return Ok(CanonicalRequest {
                invocation: notification.into_invocation(manifest_suffixes),
                auth: AuthOptions::default(),
                timeout: None,
            });
        }
        let raw: RawRequest = serde_json::from_value(event)
            .map_err(|err| RequestError::InvalidParameter(err.to_string()))?;
        raw.normalize(manifest_suffixes)
    }
}

impl RawRequest {
    /// Pick exactly one input shape. Zero shapes is `missing-parameter`, more
    /// than one is `ambiguous-request`; nothing is guessed by precedence.
    pub fn normalize(self, manifest_suffixes: &[String]) -> Result<CanonicalRequest, RequestError> {
        let url = non_empty(self.url);
        // Blank inline content is still a shape; conversion reports it.
        let content = self.content;
        let container = non_empty(self.container);
        let key = non_empty(self.key);
        let manifest_key = non_empty(self.manifest_key);
        let path = self.path.filter(|p| !p.as_os_str().is_empty());

        let mut candidates: Vec<Invocation> = Vec::new();
        if let Some(url) = url {
            candidates.push(Invocation::Url(url));
        }
        if let Some(content) = content {
            let name = non_empty(self.name).unwrap_or_else(|| DEFAULT_INLINE_NAME.to_string());
            candidates.push(Invocation::Inline { name, content });
        }
        match (container, key, manifest_key) {
            (Some(_), Some(_), Some(_)) => {
                return Err(RequestError::AmbiguousRequest(vec!["object", "manifest"]));
            }
            (Some(container), Some(key), None) => {
                let notification = StorageNotification { container, key };
                candidates.push(notification.into_invocation(manifest_suffixes));
            }
            (Some(container), None, Some(manifest_key)) => {
                candidates.push(Invocation::Manifest {
                    container,
                    manifest_key,
                });
            }
            (Some(_), None, None) => {
                return Err(RequestError::MissingParameter(
                    "key or manifest_key alongside container".into(),
                ));
            }
            (None, Some(_), _) | (None, None, Some(_)) => {
                return Err(RequestError::MissingParameter("container".into()));
            }
            (None, None, None) => {}
        }
        if let Some(path) = path {
            candidates.push(Invocation::Path(path));
        }

        if candidates.len() > 1 {
            return Err(RequestError::AmbiguousRequest(
                candidates.iter().map(Invocation::shape).collect(),
            ));
        }
        let invocation = candidates.pop().ok_or_else(|| {
            RequestError::MissingParameter(
                "url, content, container+key, container+manifest_key or path".into(),
            )
        })?;

        let timeout = match self.timeout {
            Some(0) => {
                return Err(RequestError::InvalidParameter(
                    "timeout must be at least one second".into(),
                ));
            }
            Some(secs) => Some(Duration::from_secs(secs)),
            None => None,
        };

        Ok(CanonicalRequest {
            invocation,
            auth: AuthOptions {
                use_auth: self.use_auth,
                token_endpoint: non_empty(self.token_endpoint),
            },
            timeout,
        })
    }
}

/// `{container, key}` pair announced by object storage when an object lands.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StorageNotification {
    pub container: String,
    pub key: String,
}

impl StorageNotification {
    /// Read the first record of an S3-style `Records[].s3.{bucket.name, object.key}`
    /// envelope. Keys in such envelopes are form-urlencoded.
    pub fn from_envelope(event: &Value) -> Option<Self> {
        let s3 = event.get("Records")?.get(0)?.get("s3")?;
        let container = s3.get("bucket")?.get("name")?.as_str()?;
        let raw_key = s3.get("object")?.get("key")?.as_str()?;
        // Parsed as a value so that a literal '=' survives; '&' arrives as %26.
        let encoded = format!("key={raw_key}");
        let key = url::form_urlencoded::parse(encoded.as_bytes())
            .next()
            .map(|(_, decoded)| decoded.into_owned())
            .unwrap_or_else(|| raw_key.to_string());
        Some(Self {
            container: container.to_string(),
            key,
        })
    }

    /// Keys carrying a manifest suffix start a batch; anything else is a
    /// single object.
    pub fn into_invocation(self, manifest_suffixes: &[String]) -> Invocation {
        if manifest_suffixes
            .iter()
            .any(|suffix| !suffix.is_empty() && self.key.ends_with(suffix.as_str()))
        {
            Invocation::Manifest {
                container: self.container,
                manifest_key: self.key,
            }
        } else {
            Invocation::Object {
                container: self.container,
                key: self.key,
            }
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
