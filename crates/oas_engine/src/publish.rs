use std::sync::Arc;

use oas_core::PublishError;
use pipeline_logging::{pipeline_info, pipeline_warn};

use crate::filename::html_output_key;
use crate::store::ObjectStore;
use crate::types::PublishedArtifact;

const HTML_CONTENT_TYPE: &str = "text/html";

/// Writes rendered pages to object storage under a deterministic key.
/// Writing the same source twice overwrites the earlier artifact.
pub struct ResultPublisher {
    store: Arc<dyn ObjectStore>,
    prefix: String,
}

impl ResultPublisher {
    pub fn new(store: Arc<dyn ObjectStore>, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
        }
    }

    pub fn output_key(&self, source_name: &str) -> String {
        html_output_key(source_name, &self.prefix)
    }

    pub async fn publish(
        &self,
        html: &str,
        source_name: &str,
        container: &str,
    ) -> Result<PublishedArtifact, PublishError> {
        let key = self.output_key(source_name);
        if let Err(err) = self
            .store
            .put(container, &key, html.as_bytes(), HTML_CONTENT_TYPE)
            .await
        {
            pipeline_warn!("Publishing {}/{} failed: {}", container, key, err);
            return Err(PublishError::WriteFailed {
                key: format!("{container}/{key}"),
                message: err.to_string(),
            });
        }
        pipeline_info!("Published {}/{} ({} bytes)", container, key, html.len());
        Ok(PublishedArtifact {
            container: container.to_string(),
            key,
            byte_size: html.len() as u64,
        })
    }
}
