//! Wires settings into a ready-to-use dispatcher.
use std::sync::Arc;

use chrono::Utc;
use oas_engine::{
    BatchOrchestrator, Dispatcher, EngineConfig, EnvSecretStore, FileSecretStore,
    FsObjectStore, ProcessRenderer, Renderer, SecretStore, StaticViewerRenderer,
};
use pipeline_logging::{pipeline_info, pipeline_warn};

use crate::settings::{RendererChoice, SecretSource, Settings};

pub fn build_dispatcher(settings: &Settings, mut config: EngineConfig) -> anyhow::Result<Dispatcher> {
    config.clock = Some(Arc::new(|| Utc::now().to_rfc3339()));
    pipeline_info!(
        "Storage root {}, default container {}",
        settings.storage_root.display(),
        config.default_container
    );

    let store = Arc::new(FsObjectStore::new(settings.storage_root.clone()));
    let secrets: Arc<dyn SecretStore> = match &settings.secrets {
        SecretSource::Env => Arc::new(EnvSecretStore::default()),
        SecretSource::Directory(dir) => Arc::new(FileSecretStore::new(dir.clone())),
    };
    let renderer = select_renderer(&settings.renderer);
    pipeline_info!("Renderer: {}", renderer.name());

    let orchestrator = BatchOrchestrator::new(config, store, renderer, secrets)?;
    Ok(Dispatcher::new(orchestrator))
}

fn select_renderer(choice: &RendererChoice) -> Arc<dyn Renderer> {
    match choice {
        RendererChoice::Packager { node, node_modules } => Arc::new(
            ProcessRenderer::swagger_ui_packager(node.clone(), node_modules),
        ),
        RendererChoice::StaticViewer => Arc::new(StaticViewerRenderer),
        RendererChoice::Auto => {
            match ProcessRenderer::discover(&ProcessRenderer::default_search_roots()) {
                Some(renderer) => Arc::new(renderer),
                None => {
                    pipeline_warn!(
                        "swagger-ui-offline-packager not found; using the built-in viewer"
                    );
                    Arc::new(StaticViewerRenderer)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn explicit_renderer_choices_are_honoured() {
        assert_eq!(select_renderer(&RendererChoice::StaticViewer).name(), "static-viewer");
        let packager = RendererChoice::Packager {
            node: "/usr/bin/node".into(),
            node_modules: "/opt/nodejs/node_modules".into(),
        };
        assert_eq!(select_renderer(&packager).name(), "process");
    }

    #[test]
    fn dispatcher_publishes_into_storage_root() {
        let root = tempfile::tempdir().unwrap();
        let settings = Settings {
            storage_root: root.path().to_path_buf(),
            renderer: RendererChoice::StaticViewer,
            ..Settings::default()
        };
        let dispatcher = build_dispatcher(&settings, EngineConfig::default()).unwrap();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        let response = runtime.block_on(dispatcher.handle_event(json!({
            "content": "openapi: 3.0.0\ninfo:\n  title: Orders\n  version: '1'\npaths: {}\n",
            "name": "orders.yaml"
        })));

        assert_eq!(response.status_code, 200);
        assert!(response.body.contains("Orders"));
        let published = root.path().join("output").join("html").join("orders.html");
        assert!(published.is_file());
    }
}
