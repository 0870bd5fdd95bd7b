//! Entry point for invocations: normalise the event, run the work, shape
//! the response.
use oas_core::{CanonicalRequest, ErrorBody, ItemError, Response, SourceRef, Workload};
use pipeline_logging::{pipeline_error, pipeline_info, pipeline_warn};
use serde_json::Value;

use crate::orchestrator::{BatchOptions, BatchOrchestrator, ItemOutcome};

pub struct Dispatcher {
    orchestrator: BatchOrchestrator,
}

impl Dispatcher {
    pub fn new(orchestrator: BatchOrchestrator) -> Self {
        Self { orchestrator }
    }

    pub fn orchestrator(&self) -> &BatchOrchestrator {
        &self.orchestrator
    }

    /// Handle a raw event: a request object or a storage notification.
    pub async fn handle_event(&self, event: Value) -> Response {
        let suffixes = &self.orchestrator.config().manifest_suffixes;
        match CanonicalRequest::from_event(event, suffixes) {
            Ok(request) => self.handle(request).await,
            Err(err) => {
                pipeline_warn!("Rejected request: {}", err);
                Response::from_request_error(&err)
            }
        }
    }

    pub async fn handle(&self, request: CanonicalRequest) -> Response {
        pipeline_info!(
            "Handling {} request (auth: {})",
            request.invocation.shape(),
            request.auth.use_auth
        );
        let options = BatchOptions {
            auth: request.auth,
            timeout: request.timeout,
            destination: None,
        };
        match request.invocation.into_workload() {
            Workload::Single(source) => self.handle_single(source, options).await,
            Workload::Manifest {
                container,
                manifest_key,
            } => self.handle_manifest(container, &manifest_key, options).await,
        }
    }

    async fn handle_single(&self, source: SourceRef, options: BatchOptions) -> Response {
        let outcomes = match self.orchestrator.run_items(vec![source], &options).await {
            Ok(outcomes) => outcomes,
            Err(err) => return Response::from_item_error(&ItemError::Auth(err)),
        };
        match outcomes.into_iter().next() {
            Some(ItemOutcome {
                result,
                html: Some(html),
                ..
            }) if result.success => {
                let key = result.output_key.unwrap_or_default();
                Response::html(html, &key)
            }
            Some(ItemOutcome {
                error: Some(err), ..
            }) => Response::from_item_error(&err),
            Some(ItemOutcome { result, .. }) => Response::error(
                500,
                ErrorBody::new(
                    result.error_kind.as_deref().unwrap_or("incomplete"),
                    result.error_message.unwrap_or_default(),
                ),
            ),
            None => {
                pipeline_error!("Single-item run produced no outcome");
                Response::error(500, ErrorBody::new("internal", "no outcome produced"))
            }
        }
    }

    /// Credential and manifest read failures end the invocation before any
    /// item starts.
    async fn handle_manifest(
        &self,
        container: String,
        manifest_key: &str,
        mut options: BatchOptions,
    ) -> Response {
        if let Err(err) = self.orchestrator.check_credentials(&options.auth).await {
            pipeline_warn!("Not reading manifest {}/{}: {}", container, manifest_key, err);
            return Response::from_item_error(&ItemError::Auth(err));
        }
        let sources = match self
            .orchestrator
            .fetcher()
            .fetch_manifest(&container, manifest_key)
            .await
        {
            Ok(sources) => sources,
            Err(err) => {
                pipeline_warn!("Cannot read manifest {}/{}: {}", container, manifest_key, err);
                return Response::from_item_error(&ItemError::Fetch(err));
            }
        };
        options.destination = Some(container);
        match self.orchestrator.run_batch(sources, &options).await {
            Ok(report) => Response::report(&report),
            Err(err) => Response::from_item_error(&ItemError::Auth(err)),
        }
    }
}
