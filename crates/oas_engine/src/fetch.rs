use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use oas_core::{parse_manifest, FetchError, SourceRef};
use percent_encoding::percent_decode_str;
use pipeline_logging::{pipeline_debug, pipeline_info, pipeline_warn};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};

use crate::config::FetchSettings;
use crate::decode::decode_document;
use crate::store::{ObjectStore, StoreError};
use crate::token::Token;
use crate::types::FetchedDocument;

/// Name used when a URL ends without a file name.
pub const DEFAULT_URL_FILENAME: &str = "openapi.json";

/// Retrieves documents from URLs, local paths and object storage.
pub struct ContentFetcher {
    client: reqwest::Client,
    settings: FetchSettings,
    store: Arc<dyn ObjectStore>,
}

impl ContentFetcher {
    pub fn new(settings: FetchSettings, store: Arc<dyn ObjectStore>) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .build()
            .map_err(|err| FetchError::Network(err.to_string()))?;
        Ok(Self {
            client,
            settings,
            store,
        })
    }

    /// Fetch any source kind. Inline sources are returned as they are.
    pub async fn fetch(
        &self,
        source: &SourceRef,
        token: Option<&Token>,
    ) -> Result<FetchedDocument, FetchError> {
        match source {
            SourceRef::Url(url) => self.fetch_from_url(url, token, None).await,
            SourceRef::Object { container, key } => {
                self.fetch_from_object_store(container, key, token).await
            }
            SourceRef::Path(path) => self.fetch_from_path(path).await,
            SourceRef::Inline { name, content } => Ok(FetchedDocument {
                content: content.clone(),
                source_name: name.clone(),
                byte_size: content.len() as u64,
                content_type: None,
            }),
        }
    }

    /// HTTP GET with an optional bearer token. `timeout` overrides the
    /// configured request timeout.
    pub async fn fetch_from_url(
        &self,
        url: &str,
        token: Option<&Token>,
        timeout: Option<Duration>,
    ) -> Result<FetchedDocument, FetchError> {
        let parsed = reqwest::Url::parse(url)
            .map_err(|err| FetchError::InvalidSource(format!("{url}: {err}")))?;
        let source_name = url_filename(&parsed);
        pipeline_info!("Fetching {} (auth: {})", url, token.is_some());

        let mut request = self
            .client
            .get(parsed)
            .timeout(timeout.unwrap_or(self.settings.request_timeout));
        if let Some(token) = token {
            request = request.header(AUTHORIZATION, format!("Bearer {}", token.value));
        }

        let response = request.send().await.map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            pipeline_warn!("Fetching {} failed with {}", url, status);
            return Err(FetchError::HttpStatus {
                code: status.as_u16(),
                message: status.canonical_reason().unwrap_or("error").to_string(),
            });
        }

        if let Some(content_len) = response.content_length() {
            if content_len > self.settings.max_bytes {
                return Err(FetchError::TooLarge {
                    max_bytes: self.settings.max_bytes,
                    actual: Some(content_len),
                });
            }
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            let next_len = bytes.len() as u64 + chunk.len() as u64;
            if next_len > self.settings.max_bytes {
                return Err(FetchError::TooLarge {
                    max_bytes: self.settings.max_bytes,
                    actual: Some(next_len),
                });
            }
            bytes.extend_from_slice(&chunk);
        }

        self.finish(bytes, source_name, content_type)
    }

    pub async fn fetch_from_path(&self, path: &Path) -> Result<FetchedDocument, FetchError> {
        pipeline_info!("Reading {}", path.display());
        let bytes = tokio::fs::read(path).await.map_err(|err| {
            if err.kind() == io::ErrorKind::NotFound {
                FetchError::NotFound(path.display().to_string())
            } else {
                FetchError::InvalidSource(format!("cannot read {}: {err}", path.display()))
            }
        })?;
        let source_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| DEFAULT_URL_FILENAME.to_string());
        self.check_size(bytes.len())?;
        self.finish(bytes, source_name, None)
    }

    pub async fn fetch_from_object_store(
        &self,
        container: &str,
        key: &str,
        token: Option<&Token>,
    ) -> Result<FetchedDocument, FetchError> {
        pipeline_info!("Reading object {}/{}", container, key);
        let bytes = self.read_object(container, key, token).await?;
        self.check_size(bytes.len())?;
        let source_name = key
            .rsplit('/')
            .next()
            .filter(|name| !name.is_empty())
            .unwrap_or(key)
            .to_string();
        self.finish(bytes, source_name, None)
    }

    /// Read a manifest object and expand it into ordered source references.
    pub async fn fetch_manifest(
        &self,
        container: &str,
        manifest_key: &str,
    ) -> Result<Vec<SourceRef>, FetchError> {
        let bytes = self.read_object(container, manifest_key, None).await?;
        let text = decode_document(&bytes, None)?.text;
        let sources = parse_manifest(&text, container);
        pipeline_info!(
            "Manifest {}/{} lists {} source(s)",
            container,
            manifest_key,
            sources.len()
        );
        Ok(sources)
    }

    async fn read_object(
        &self,
        container: &str,
        key: &str,
        token: Option<&Token>,
    ) -> Result<Vec<u8>, FetchError> {
        let token = token.map(|t| t.value.as_str());
        self.store
            .get(container, key, token)
            .await
            .map_err(|err| match err {
                StoreError::NotFound { container, key } => {
                    FetchError::NotFound(format!("{container}/{key}"))
                }
                StoreError::InvalidKey(key) => FetchError::InvalidSource(key),
                StoreError::Io(message) => FetchError::Network(message),
            })
    }

    fn check_size(&self, len: usize) -> Result<(), FetchError> {
        let len = len as u64;
        if len > self.settings.max_bytes {
            return Err(FetchError::TooLarge {
                max_bytes: self.settings.max_bytes,
                actual: Some(len),
            });
        }
        Ok(())
    }

    fn finish(
        &self,
        bytes: Vec<u8>,
        source_name: String,
        content_type: Option<String>,
    ) -> Result<FetchedDocument, FetchError> {
        let byte_size = bytes.len() as u64;
        let decoded = decode_document(&bytes, content_type.as_deref())?;
        pipeline_debug!(
            "Fetched {} ({} bytes, {})",
            source_name,
            byte_size,
            decoded.encoding_label
        );
        Ok(FetchedDocument {
            content: decoded.text,
            source_name,
            byte_size,
            content_type,
        })
    }
}

/// Last path segment of the URL, percent-decoded, or the default name when
/// there is none.
fn url_filename(url: &reqwest::Url) -> String {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|segment| !segment.is_empty())
        .map(|segment| percent_decode_str(segment).decode_utf8_lossy().into_owned())
        .unwrap_or_else(|| DEFAULT_URL_FILENAME.to_string())
}

fn map_reqwest_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        return FetchError::Network(format!("request timed out: {err}"));
    }
    FetchError::Network(err.to_string())
}
