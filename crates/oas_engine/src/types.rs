use std::time::Duration;

use oas_core::{ConversionError, ItemResult, Stage};

/// A successfully fetched document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedDocument {
    pub content: String,
    pub source_name: String,
    /// Size of the raw bytes as received, before decoding.
    pub byte_size: u64,
    pub content_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedHtml {
    pub html: String,
    pub byte_size: u64,
}

/// Conversion outcome plus the wall-clock time it took, recorded on every path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionResult {
    pub duration: Duration,
    pub outcome: Result<RenderedHtml, ConversionError>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedArtifact {
    pub container: String,
    pub key: String,
    pub byte_size: u64,
}

/// Progress notifications emitted while a batch runs. `index` is the item's
/// position in the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchEvent {
    StageEntered { index: usize, stage: Stage },
    ItemFinished { index: usize, result: ItemResult },
}

pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: BatchEvent);
}

/// Sink that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn emit(&self, _event: BatchEvent) {}
}
