use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use oas_core::ConversionError;
use pipeline_logging::{pipeline_debug, pipeline_info, pipeline_warn};

use crate::fetch::DEFAULT_URL_FILENAME;
use crate::filename::sanitize_file_name;
use crate::render::Renderer;
use crate::types::{ConversionResult, RenderedHtml};

const WORKDIR_PREFIX: &str = "oas_convert_";
const OUTPUT_FILE: &str = "index.html";

/// Runs a renderer against one document inside a private scratch directory.
///
/// The directory is removed when conversion returns, whatever the outcome.
/// A renderer that outlives the timeout is dropped, which kills a child
/// process it may have started.
pub struct ConversionEngine {
    renderer: Arc<dyn Renderer>,
    default_timeout: Duration,
}

impl ConversionEngine {
    pub fn new(renderer: Arc<dyn Renderer>, default_timeout: Duration) -> Self {
        Self {
            renderer,
            default_timeout,
        }
    }

    pub fn renderer_name(&self) -> &'static str {
        self.renderer.name()
    }

    pub async fn convert(
        &self,
        content: &str,
        source_name: &str,
        timeout: Option<Duration>,
    ) -> ConversionResult {
        let timeout = timeout.unwrap_or(self.default_timeout);
        let started = Instant::now();
        let outcome = self.run(content, source_name, timeout).await;
        let duration = started.elapsed();

        match &outcome {
            Ok(rendered) => pipeline_info!(
                "Converted {} with {} in {:?} ({} bytes)",
                source_name,
                self.renderer.name(),
                duration,
                rendered.byte_size
            ),
            Err(err) => pipeline_warn!("Conversion of {} failed: {}", source_name, err),
        }
        ConversionResult { duration, outcome }
    }

    async fn run(
        &self,
        content: &str,
        source_name: &str,
        timeout: Duration,
    ) -> Result<RenderedHtml, ConversionError> {
        if content.trim().is_empty() {
            return Err(ConversionError::EmptyOutput("document is empty".into()));
        }

        let workdir = tempfile::Builder::new()
            .prefix(WORKDIR_PREFIX)
            .tempdir()
            .map_err(|err| scratch_error("create scratch directory", &err))?;
        let input = workdir.path().join(input_file_name(source_name));
        let output = workdir.path().join(OUTPUT_FILE);
        tokio::fs::write(&input, content)
            .await
            .map_err(|err| scratch_error("write input", &err))?;
        pipeline_debug!("Rendering {} in {}", input.display(), workdir.path().display());

        match tokio::time::timeout(timeout, self.renderer.render(&input, &output)).await {
            Err(_) => return Err(ConversionError::Timeout(timeout)),
            Ok(result) => result?,
        }

        read_output(&output).await
    }
}

/// Keeps the source's file name (and so its extension) for renderers that
/// sniff the format from it.
fn input_file_name(source_name: &str) -> String {
    let last = source_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(source_name);
    sanitize_file_name(last, DEFAULT_URL_FILENAME)
}

async fn read_output(output: &Path) -> Result<RenderedHtml, ConversionError> {
    let html = match tokio::fs::read_to_string(output).await {
        Ok(html) => html,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Err(ConversionError::EmptyOutput(
                "renderer did not write an output file".into(),
            ));
        }
        Err(err) => return Err(scratch_error("read output", &err)),
    };
    if !looks_like_html(&html) {
        return Err(ConversionError::EmptyOutput(
            "output is empty or not an html document".into(),
        ));
    }
    Ok(RenderedHtml {
        byte_size: html.len() as u64,
        html,
    })
}

fn looks_like_html(text: &str) -> bool {
    let lower = text.trim_start().to_ascii_lowercase();
    !lower.is_empty() && (lower.contains("<html") || lower.starts_with("<!doctype html"))
}

fn scratch_error(action: &str, err: &io::Error) -> ConversionError {
    ConversionError::RenderFailed(format!("cannot {action}: {err}"))
}
