//! OAS publisher engine: fetching, rendering, publishing and the batch loop.
mod config;
mod convert;
mod decode;
mod dispatch;
mod fetch;
mod filename;
mod orchestrator;
mod persist;
mod publish;
mod render;
mod secrets;
mod store;
mod token;
mod types;

pub use config::{
    Clock, EngineConfig, FetchSettings, DEFAULT_CONTAINER, DEFAULT_PUBLISH_PREFIX,
    DEFAULT_SECRET_NAME, DEFAULT_TOKEN_ENDPOINT,
};
pub use convert::ConversionEngine;
pub use decode::{decode_document, DecodedText};
pub use dispatch::Dispatcher;
pub use fetch::{ContentFetcher, DEFAULT_URL_FILENAME};
pub use filename::{base_name, html_output_key, sanitize_file_name, FALLBACK_BASE_NAME};
pub use orchestrator::{BatchOptions, BatchOrchestrator, EngineError, ItemOutcome};
pub use persist::{ensure_output_dir, AtomicFileWriter, PersistError};
pub use publish::ResultPublisher;
pub use render::{
    escape_html, render_viewer, ProcessRenderer, Renderer, StaticViewerRenderer, StubBehavior,
    StubRenderer, MAX_STDERR_CHARS,
};
pub use secrets::{EnvSecretStore, FileSecretStore, SecretStore, StaticSecretStore};
pub use store::{FsObjectStore, MemoryObjectStore, ObjectStore, StoreError, StoredObject};
pub use token::{
    credential_fingerprint, Credentials, Token, TokenCache, TokenProvider,
    DEFAULT_TOKEN_LIFETIME_SECS,
};
pub use types::{
    BatchEvent, ConversionResult, FetchedDocument, NullSink, ProgressSink, PublishedArtifact,
    RenderedHtml,
};
