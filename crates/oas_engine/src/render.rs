//! Renderers turn an OpenAPI document file into a standalone HTML page.
use std::collections::HashMap;
use std::ffi::OsString;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use oas_core::ConversionError;
use pipeline_logging::{pipeline_debug, pipeline_info, pipeline_warn};
use serde_yaml::Value;

/// Stderr kept in a render failure message.
pub const MAX_STDERR_CHARS: usize = 500;

const PACKAGER_CLI: &str = "swagger-ui-offline-packager/bin/cli.js";

#[async_trait]
pub trait Renderer: Send + Sync {
    fn name(&self) -> &'static str;

    /// Render the document at `input` into `output`. Both paths live in a
    /// scratch directory owned by the caller.
    async fn render(&self, input: &Path, output: &Path) -> Result<(), ConversionError>;
}

/// Runs an external program as `<program> <args..> <input> <output>`.
#[derive(Debug, Clone)]
pub struct ProcessRenderer {
    program: PathBuf,
    args: Vec<OsString>,
    envs: Vec<(OsString, OsString)>,
}

impl ProcessRenderer {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// `node <cli.js> <input> <output>` for swagger-ui-offline-packager.
    /// The node binary's directory is put first on PATH and `node_modules`
    /// becomes NODE_PATH.
    pub fn swagger_ui_packager(node: PathBuf, node_modules: &Path) -> Self {
        let cli = node_modules.join(PACKAGER_CLI);
        let mut renderer = Self::new(node.clone())
            .arg(cli)
            .env("NODE_PATH", node_modules.as_os_str());
        if let Some(path) = prepend_path(node.parent()) {
            renderer = renderer.env("PATH", path);
        }
        renderer
    }

    /// Look for `nodejs/node_modules/swagger-ui-offline-packager` under each
    /// root in turn. A bundled `nodejs/bin/node` wins over one on PATH.
    pub fn discover(roots: &[PathBuf]) -> Option<Self> {
        for root in roots {
            let nodejs = root.join("nodejs");
            let node_modules = nodejs.join("node_modules");
            if !node_modules.join(PACKAGER_CLI).is_file() {
                pipeline_debug!("No packager under {}", nodejs.display());
                continue;
            }
            let bundled = nodejs.join("bin").join("node");
            let node = if bundled.is_file() {
                Some(bundled)
            } else {
                which::which("node").ok()
            };
            match node {
                Some(node) => {
                    pipeline_info!(
                        "Using swagger-ui-offline-packager under {} with {}",
                        nodejs.display(),
                        node.display()
                    );
                    return Some(Self::swagger_ui_packager(node, &node_modules));
                }
                None => pipeline_warn!(
                    "Packager found under {} but no node binary is available",
                    nodejs.display()
                ),
            }
        }
        None
    }

    /// `/opt` (layer installs) and the working directory.
    pub fn default_search_roots() -> Vec<PathBuf> {
        let mut roots = vec![PathBuf::from("/opt")];
        if let Ok(cwd) = std::env::current_dir() {
            roots.push(cwd);
        }
        roots
    }
}

#[async_trait]
impl Renderer for ProcessRenderer {
    fn name(&self) -> &'static str {
        "process"
    }

    async fn render(&self, input: &Path, output: &Path) -> Result<(), ConversionError> {
        pipeline_debug!("Running {} for {}", self.program.display(), input.display());
        let result = tokio::process::Command::new(&self.program)
            .args(&self.args)
            .arg(input)
            .arg(output)
            .envs(self.envs.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|err| {
                ConversionError::RenderFailed(format!(
                    "cannot start {}: {err}",
                    self.program.display()
                ))
            })?;

        if result.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&result.stderr);
        let stderr: String = stderr.trim().chars().take(MAX_STDERR_CHARS).collect();
        let code = result
            .status
            .code()
            .map_or_else(|| "signal".to_string(), |code| code.to_string());
        Err(ConversionError::RenderFailed(format!("exit {code}: {stderr}")))
    }
}

fn prepend_path(dir: Option<&Path>) -> Option<OsString> {
    let dir = dir.filter(|dir| !dir.as_os_str().is_empty())?;
    let mut entries = vec![dir.to_path_buf()];
    if let Some(existing) = std::env::var_os("PATH") {
        entries.extend(std::env::split_paths(&existing));
    }
    std::env::join_paths(entries).ok()
}

/// Built-in viewer used when no packager is installed: a title, the list
/// of operations and the document embedded as JSON.
#[derive(Debug, Default, Clone, Copy)]
pub struct StaticViewerRenderer;

#[async_trait]
impl Renderer for StaticViewerRenderer {
    fn name(&self) -> &'static str {
        "static-viewer"
    }

    async fn render(&self, input: &Path, output: &Path) -> Result<(), ConversionError> {
        let text = tokio::fs::read_to_string(input)
            .await
            .map_err(|err| ConversionError::RenderFailed(format!("cannot read input: {err}")))?;
        let fallback_title = input
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let html = render_viewer(&text, &fallback_title)?;
        tokio::fs::write(output, html)
            .await
            .map_err(|err| ConversionError::RenderFailed(format!("cannot write output: {err}")))
    }
}

const HTTP_METHODS: [&str; 8] = [
    "get", "put", "post", "delete", "options", "head", "patch", "trace",
];

/// Build the viewer page for a JSON or YAML document.
pub fn render_viewer(text: &str, fallback_title: &str) -> Result<String, ConversionError> {
    let document: Value = serde_yaml::from_str(text).map_err(|err| {
        ConversionError::RenderFailed(format!("document is not valid JSON or YAML: {err}"))
    })?;
    if document.get("openapi").is_none() && document.get("swagger").is_none() {
        return Err(ConversionError::RenderFailed(
            "document has no openapi or swagger field".into(),
        ));
    }

    let info = document.get("info");
    let title = info
        .and_then(|info| info.get("title"))
        .and_then(scalar_text)
        .unwrap_or_else(|| fallback_title.to_string());
    let version = info
        .and_then(|info| info.get("version"))
        .and_then(scalar_text)
        .unwrap_or_default();

    let embedded = serde_json::to_string(&document)
        .map_err(|err| ConversionError::RenderFailed(format!("cannot embed document: {err}")))?
        .replace("</", "<\\/");

    let mut page = String::new();
    let _ = write!(
        page,
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>{title}</title>\n<style>{VIEWER_CSS}</style>\n</head>\n<body>\n\
         <header><h1>{title}</h1><p class=\"version\">{version}</p></header>\n<main>\n",
        title = escape_html(&title),
        version = escape_html(&version),
    );

    page.push_str("<section id=\"operations\">\n<h2>Operations</h2>\n<ul>\n");
    if let Some(paths) = document.get("paths").and_then(Value::as_mapping) {
        for (path, item) in paths {
            let Some(path) = scalar_text(path) else {
                continue;
            };
            for method in HTTP_METHODS {
                let Some(operation) = item.get(method) else {
                    continue;
                };
                let summary = operation
                    .get("summary")
                    .and_then(scalar_text)
                    .unwrap_or_default();
                let _ = writeln!(
                    page,
                    "<li><span class=\"method method-{method}\">{upper}</span> \
                     <code>{path}</code> <span class=\"summary\">{summary}</span></li>",
                    upper = method.to_ascii_uppercase(),
                    path = escape_html(&path),
                    summary = escape_html(&summary),
                );
            }
        }
    }
    page.push_str("</ul>\n</section>\n</main>\n");
    let _ = write!(
        page,
        "<script id=\"oas-document\" type=\"application/json\">{embedded}</script>\n\
         </body>\n</html>\n"
    );
    Ok(page)
}

const VIEWER_CSS: &str = "body{font-family:sans-serif;margin:2rem;color:#222}\
.version{color:#666}.method{display:inline-block;min-width:4rem;font-weight:bold}\
.method-get{color:#2f8132}.method-post{color:#186faf}.method-put{color:#95507c}\
.method-delete{color:#b61e1e}li{margin:.3rem 0;list-style:none}";

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

/// What a [`StubRenderer`] does for one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StubBehavior {
    /// Write this HTML.
    Html(String),
    /// Wrap the input text in a minimal page.
    Echo,
    Fail(String),
    /// Wait, then behave like `Echo`.
    Delay(Duration),
    /// Succeed without writing anything.
    NoOutput,
}

/// Scriptable renderer for tests and dry runs. Rules match on the input
/// file name; anything else gets the default behaviour.
#[derive(Debug)]
pub struct StubRenderer {
    default: StubBehavior,
    rules: HashMap<String, StubBehavior>,
    calls: AtomicUsize,
    inputs: Mutex<Vec<PathBuf>>,
}

impl StubRenderer {
    pub fn new(default: StubBehavior) -> Self {
        Self {
            default,
            rules: HashMap::new(),
            calls: AtomicUsize::new(0),
            inputs: Mutex::new(Vec::new()),
        }
    }

    pub fn on_file(mut self, file_name: impl Into<String>, behavior: StubBehavior) -> Self {
        self.rules.insert(file_name.into(), behavior);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Input paths seen so far, in call order.
    pub fn inputs(&self) -> Vec<PathBuf> {
        self.inputs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn behavior_for(&self, input: &Path) -> &StubBehavior {
        input
            .file_name()
            .and_then(|name| self.rules.get(&*name.to_string_lossy()))
            .unwrap_or(&self.default)
    }
}

#[async_trait]
impl Renderer for StubRenderer {
    fn name(&self) -> &'static str {
        "stub"
    }

    async fn render(&self, input: &Path, output: &Path) -> Result<(), ConversionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inputs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(input.to_path_buf());

        let html = match self.behavior_for(input) {
            StubBehavior::Html(html) => html.clone(),
            StubBehavior::Echo => echo_page(input).await?,
            StubBehavior::Fail(message) => {
                return Err(ConversionError::RenderFailed(message.clone()))
            }
            StubBehavior::Delay(delay) => {
                tokio::time::sleep(*delay).await;
                echo_page(input).await?
            }
            StubBehavior::NoOutput => return Ok(()),
        };
        tokio::fs::write(output, html)
            .await
            .map_err(|err| ConversionError::RenderFailed(err.to_string()))
    }
}

async fn echo_page(input: &Path) -> Result<String, ConversionError> {
    let text = tokio::fs::read_to_string(input)
        .await
        .map_err(|err| ConversionError::RenderFailed(err.to_string()))?;
    Ok(format!(
        "<html><body><pre>{}</pre></body></html>",
        escape_html(&text)
    ))
}
