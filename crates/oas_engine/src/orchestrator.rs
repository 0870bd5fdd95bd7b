//! Drives every requested item through fetch, convert and publish, and
//! folds the outcomes into one report.
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{self, StreamExt};
use oas_core::{
    AuthError, AuthOptions, BatchReport, ItemError, ItemResult, ItemState, SourceRef, Stage,
};
use pipeline_logging::{pipeline_error, pipeline_info, pipeline_warn};
use thiserror::Error;

use crate::config::EngineConfig;
use crate::convert::ConversionEngine;
use crate::fetch::ContentFetcher;
use crate::publish::ResultPublisher;
use crate::render::Renderer;
use crate::secrets::SecretStore;
use crate::store::ObjectStore;
use crate::token::{Credentials, Token, TokenCache, TokenProvider};
use crate::types::{BatchEvent, NullSink, ProgressSink, PublishedArtifact};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("cannot build http client: {0}")]
    HttpClient(String),
}

/// Per-run options shared by every item.
#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    pub auth: AuthOptions,
    /// Conversion timeout; the configured default when `None`.
    pub timeout: Option<Duration>,
    /// Container for artifacts of sources that have none of their own,
    /// e.g. URLs listed in a manifest. Falls back to the configured default.
    pub destination: Option<String>,
}

/// Result of one item plus what a single-item caller needs to answer with.
#[derive(Debug, Clone)]
pub struct ItemOutcome {
    pub result: ItemResult,
    pub html: Option<String>,
    pub error: Option<ItemError>,
}

pub struct BatchOrchestrator {
    config: EngineConfig,
    fetcher: ContentFetcher,
    converter: ConversionEngine,
    publisher: ResultPublisher,
    tokens: TokenProvider,
    secrets: Arc<dyn SecretStore>,
    sink: Arc<dyn ProgressSink>,
}

impl BatchOrchestrator {
    pub fn new(
        config: EngineConfig,
        store: Arc<dyn ObjectStore>,
        renderer: Arc<dyn Renderer>,
        secrets: Arc<dyn SecretStore>,
    ) -> Result<Self, EngineError> {
        let fetcher = ContentFetcher::new(config.fetch.clone(), store.clone())
            .map_err(|err| EngineError::HttpClient(err.to_string()))?;
        let tokens = TokenProvider::new(config.token_timeout)
            .map_err(|err| EngineError::HttpClient(err.to_string()))?;
        let converter = ConversionEngine::new(renderer, config.convert_timeout);
        let publisher = ResultPublisher::new(store, config.publish_prefix.clone());
        Ok(Self {
            config,
            fetcher,
            converter,
            publisher,
            tokens,
            secrets,
            sink: Arc::new(NullSink),
        })
    }

    pub fn with_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn fetcher(&self) -> &ContentFetcher {
        &self.fetcher
    }

    /// Run every item and report. The only error is a credential lookup that
    /// fails before any item starts.
    pub async fn run_batch(
        &self,
        items: Vec<SourceRef>,
        options: &BatchOptions,
    ) -> Result<BatchReport, AuthError> {
        let outcomes = self.run_items(items, options).await?;
        let report = BatchReport::from_items(
            outcomes.into_iter().map(|outcome| outcome.result).collect(),
            self.config.now_utc(),
        );
        pipeline_info!(
            "Batch finished: {} succeeded, {} failed of {}",
            report.succeeded_count,
            report.failed_count,
            report.total_count
        );
        Ok(report)
    }

    /// Like [`run_batch`](Self::run_batch) but keeps the rendered pages and
    /// typed errors. Outcomes are in request order.
    pub async fn run_items(
        &self,
        items: Vec<SourceRef>,
        options: &BatchOptions,
    ) -> Result<Vec<ItemOutcome>, AuthError> {
        warn_on_duplicates(&items);
        let session = self.open_session(&items, &options.auth).await?;
        let workers = self.config.max_concurrent_items.max(1);
        pipeline_info!("Processing {} item(s), {} at a time", items.len(), workers);

        let outcomes = stream::iter(items.into_iter().enumerate())
            .map(|(index, source)| self.process_item(index, source, &session, options))
            .buffered(workers)
            .collect::<Vec<_>>()
            .await;
        Ok(outcomes)
    }

    /// Fail fast when authorization is requested but no secret is stored.
    /// Callers that read inputs before starting a run check this first.
    pub async fn check_credentials(&self, auth: &AuthOptions) -> Result<(), AuthError> {
        self.resolve_credentials(auth).await.map(|_| ())
    }

    async fn resolve_credentials(
        &self,
        auth: &AuthOptions,
    ) -> Result<Option<Credentials>, AuthError> {
        if !auth.use_auth {
            return Ok(None);
        }
        let name = &self.config.secret_name;
        let credentials = self
            .secrets
            .get_secret(name)
            .await?
            .ok_or_else(|| AuthError::MissingCredentials(name.clone()))?;
        Ok(Some(credentials))
    }

    async fn open_session(
        &self,
        items: &[SourceRef],
        auth: &AuthOptions,
    ) -> Result<AuthSession, AuthError> {
        let Some(credentials) = self.resolve_credentials(auth).await? else {
            return Ok(AuthSession::Disabled);
        };
        let endpoint = auth
            .token_endpoint
            .clone()
            .unwrap_or_else(|| self.config.token_endpoint.clone());

        let cache = TokenCache::new();
        // Inline-only batches never need a token.
        let initial_error = if items.iter().any(SourceRef::needs_fetch) {
            match self
                .tokens
                .get_token(&cache, &credentials, &endpoint, false)
                .await
            {
                Ok(_) => None,
                Err(err) => {
                    pipeline_error!("Token acquisition failed: {}", err);
                    Some(err)
                }
            }
        } else {
            None
        };

        Ok(AuthSession::Enabled {
            credentials,
            endpoint,
            cache,
            initial_error,
        })
    }

    async fn process_item(
        &self,
        index: usize,
        source: SourceRef,
        session: &AuthSession,
        options: &BatchOptions,
    ) -> ItemOutcome {
        let identifier = source.identifier();
        let mut state = ItemState::default();
        let mut duration_ms = None;

        let outcome = self
            .drive(index, &source, session, options, &mut state, &mut duration_ms)
            .await;
        let (output_key, html, error) = match outcome {
            Ok((artifact, html)) => (Some(artifact.key), Some(html), None),
            Err(err) => {
                state.fail(err.clone());
                (None, None, Some(err))
            }
        };

        let result =
            ItemResult::from_state(identifier, &state, output_key).with_duration_ms(duration_ms);
        if result.success {
            pipeline_info!("Item {} ({}) done", index, result.source_identifier);
        } else {
            pipeline_warn!(
                "Item {} ({}) failed at {:?}: {}",
                index,
                result.source_identifier,
                result.stage_reached,
                result.error_message.as_deref().unwrap_or_default()
            );
        }
        self.sink.emit(BatchEvent::ItemFinished {
            index,
            result: result.clone(),
        });
        ItemOutcome {
            result,
            html,
            error,
        }
    }

    async fn drive(
        &self,
        index: usize,
        source: &SourceRef,
        session: &AuthSession,
        options: &BatchOptions,
        state: &mut ItemState,
        duration_ms: &mut Option<u64>,
    ) -> Result<(PublishedArtifact, String), ItemError> {
        let document = if source.needs_fetch() {
            self.enter(index, state, Stage::Fetching);
            let token = session.token(&self.tokens).await?;
            self.fetcher.fetch(source, token.as_ref()).await?
        } else {
            self.fetcher.fetch(source, None).await?
        };

        self.enter(index, state, Stage::Converting);
        let conversion = self
            .converter
            .convert(&document.content, &document.source_name, options.timeout)
            .await;
        *duration_ms = Some(u64::try_from(conversion.duration.as_millis()).unwrap_or(u64::MAX));
        let rendered = conversion.outcome?;

        self.enter(index, state, Stage::Publishing);
        let container = source
            .container()
            .or(options.destination.as_deref())
            .unwrap_or(&self.config.default_container);
        let artifact = self
            .publisher
            .publish(&rendered.html, &document.source_name, container)
            .await?;

        self.enter(index, state, Stage::Done);
        Ok((artifact, rendered.html))
    }

    fn enter(&self, index: usize, state: &mut ItemState, stage: Stage) {
        match state.enter(stage) {
            Ok(()) => self.sink.emit(BatchEvent::StageEntered { index, stage }),
            Err(err) => pipeline_warn!("Item {}: {}", index, err),
        }
    }
}

/// Authorization shared by the items of one run. The cache dies with it.
enum AuthSession {
    Disabled,
    Enabled {
        credentials: Credentials,
        endpoint: String,
        cache: TokenCache,
        /// Set when the up-front token request failed; items needing a token
        /// fail with it instead of asking again.
        initial_error: Option<AuthError>,
    },
}

impl AuthSession {
    async fn token(&self, provider: &TokenProvider) -> Result<Option<Token>, AuthError> {
        match self {
            AuthSession::Disabled => Ok(None),
            AuthSession::Enabled {
                initial_error: Some(err),
                ..
            } => Err(err.clone()),
            AuthSession::Enabled {
                credentials,
                endpoint,
                cache,
                initial_error: None,
            } => provider
                .get_token(cache, credentials, endpoint, false)
                .await
                .map(Some),
        }
    }
}

fn warn_on_duplicates(items: &[SourceRef]) {
    let mut seen = HashSet::new();
    for item in items {
        let identifier = item.identifier();
        if !seen.insert(identifier.clone()) {
            pipeline_warn!("{} is listed more than once and will be processed again", identifier);
        }
    }
}
