//! Settings file for the `oas_publisher` binary.
//!
//! Read from `oas_publisher.ron` in the working directory unless another
//! path is given. A missing file means defaults.
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use oas_engine::{ensure_output_dir, AtomicFileWriter, EngineConfig};
use pipeline_logging::{LogDestination, DEFAULT_LOG_FILE};
use serde::{Deserialize, Serialize};

pub const SETTINGS_FILENAME: &str = "oas_publisher.ron";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SecretSource {
    /// `CLIENT_ID` / `CLIENT_SECRET`.
    Env,
    /// One `<name>.json` file per secret.
    Directory(PathBuf),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogTarget {
    Terminal,
    File,
    Both,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RendererChoice {
    /// swagger-ui-offline-packager if one can be found, else the static viewer.
    Auto,
    Packager { node: PathBuf, node_modules: PathBuf },
    StaticViewer,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub target: LogTarget,
    pub file: PathBuf,
    pub level: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            target: LogTarget::Terminal,
            file: PathBuf::from(DEFAULT_LOG_FILE),
            level: "info".to_string(),
        }
    }
}

impl LogSettings {
    pub fn destination(&self) -> LogDestination {
        match self.target {
            LogTarget::Terminal => LogDestination::Terminal,
            LogTarget::File => LogDestination::File(self.file.clone()),
            LogTarget::Both => LogDestination::Both(self.file.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Containers are directories below this root.
    pub storage_root: PathBuf,
    pub secrets: SecretSource,
    pub log: LogSettings,
    pub renderer: RendererChoice,
    pub default_container: Option<String>,
    pub convert_timeout_secs: Option<u64>,
    pub max_concurrent_items: Option<usize>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            storage_root: PathBuf::from("./storage"),
            secrets: SecretSource::Env,
            log: LogSettings::default(),
            renderer: RendererChoice::Auto,
            default_container: None,
            convert_timeout_secs: None,
            max_concurrent_items: None,
        }
    }
}

impl Settings {
    /// Environment values that belong to the binary rather than the engine.
    pub fn overlay(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        if let Some(root) = get("OAS_STORAGE_ROOT") {
            self.storage_root = PathBuf::from(root);
        }
        if let Some(dir) = get("OAS_SECRETS_DIR") {
            self.secrets = SecretSource::Directory(PathBuf::from(dir));
        }
        if let Some(level) = get("OAS_LOG_LEVEL") {
            self.log.level = level;
        }
        self
    }

    /// Engine configuration: file values first, then the environment.
    pub fn engine_config(&self, lookup: impl Fn(&str) -> Option<String>) -> EngineConfig {
        let mut config = EngineConfig::default();
        if let Some(container) = &self.default_container {
            config.default_container = container.clone();
        }
        if let Some(secs) = self.convert_timeout_secs.filter(|secs| *secs > 0) {
            config.convert_timeout = std::time::Duration::from_secs(secs);
        }
        if let Some(workers) = self.max_concurrent_items {
            config.max_concurrent_items = workers.max(1);
        }
        config.overlay(lookup)
    }
}

pub fn load_settings(path: &Path) -> anyhow::Result<Settings> {
    let content = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Ok(Settings::default());
        }
        Err(err) => {
            return Err(err).with_context(|| format!("cannot read settings {}", path.display()));
        }
    };
    ron::from_str(&content).with_context(|| format!("cannot parse settings {}", path.display()))
}

/// Write `settings` as pretty RON, replacing any existing file atomically.
pub fn save_settings(path: &Path, settings: &Settings) -> anyhow::Result<PathBuf> {
    let dir = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .with_context(|| format!("{} has no file name", path.display()))?;
    ensure_output_dir(dir)?;

    let pretty = ron::ser::PrettyConfig::new();
    let content = ron::ser::to_string_pretty(settings, pretty).context("serialize settings")?;
    let writer = AtomicFileWriter::new(dir.to_path_buf());
    let written = writer.write(Path::new(file_name), content.as_bytes())?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = load_settings(&dir.path().join(SETTINGS_FILENAME)).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILENAME);
        fs::write(
            &path,
            r#"(
                storage_root: "/srv/specs",
                secrets: Directory("/run/secrets"),
                renderer: StaticViewer,
                log: (target: Both, level: "debug"),
            )"#,
        )
        .unwrap();

        let settings = load_settings(&path).unwrap();
        assert_eq!(settings.storage_root, PathBuf::from("/srv/specs"));
        assert_eq!(
            settings.secrets,
            SecretSource::Directory(PathBuf::from("/run/secrets"))
        );
        assert_eq!(settings.renderer, RendererChoice::StaticViewer);
        assert_eq!(
            settings.log.destination(),
            LogDestination::Both(PathBuf::from(DEFAULT_LOG_FILE))
        );
        assert_eq!(settings.log.level, "debug");
        assert_eq!(settings.default_container, None);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILENAME);
        fs::write(&path, "(storage_root: 42").unwrap();
        assert!(load_settings(&path).is_err());
    }

    #[test]
    fn saved_settings_load_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conf").join(SETTINGS_FILENAME);
        let settings = Settings {
            renderer: RendererChoice::Packager {
                node: PathBuf::from("/usr/bin/node"),
                node_modules: PathBuf::from("/opt/nodejs/node_modules"),
            },
            max_concurrent_items: Some(4),
            ..Settings::default()
        };

        let written = save_settings(&path, &settings).unwrap();
        assert_eq!(written, path);
        assert_eq!(load_settings(&path).unwrap(), settings);
    }

    #[test]
    fn environment_wins_over_file_values() {
        let settings = Settings {
            default_container: Some("from-file".into()),
            convert_timeout_secs: Some(30),
            ..Settings::default()
        }
        .overlay(env(&[("OAS_STORAGE_ROOT", "/data"), ("OAS_LOG_LEVEL", "warn")]));
        assert_eq!(settings.storage_root, PathBuf::from("/data"));
        assert_eq!(settings.log.level, "warn");

        let config = settings.engine_config(env(&[("OAS_DEFAULT_CONTAINER", "from-env")]));
        assert_eq!(config.default_container, "from-env");
        assert_eq!(config.convert_timeout, Duration::from_secs(30));

        let config = settings.engine_config(env(&[]));
        assert_eq!(config.default_container, "from-file");
    }
}
