use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use pipeline_logging::pipeline_warn;

pub const DEFAULT_TOKEN_ENDPOINT: &str =
    "https://anypoint.mulesoft.com/accounts/api/v2/oauth2/token";
pub const DEFAULT_SECRET_NAME: &str = "token_cred";
pub const DEFAULT_CONTAINER: &str = "output";
pub const DEFAULT_PUBLISH_PREFIX: &str = "html/";

/// Produces the timestamp stamped on batch reports.
pub type Clock = Arc<dyn Fn() -> String + Send + Sync>;

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub max_bytes: u64,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            max_bytes: 20 * 1024 * 1024,
        }
    }
}

#[derive(Clone)]
pub struct EngineConfig {
    pub fetch: FetchSettings,
    pub token_endpoint: String,
    pub token_timeout: Duration,
    /// Logical name looked up in the secret store when auth is requested.
    pub secret_name: String,
    pub convert_timeout: Duration,
    pub publish_prefix: String,
    /// Destination container for sources that do not come from object storage.
    pub default_container: String,
    pub manifest_suffixes: Vec<String>,
    /// Items in flight at once; 1 keeps the batch strictly sequential.
    pub max_concurrent_items: usize,
    pub clock: Option<Clock>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fetch: FetchSettings::default(),
            token_endpoint: DEFAULT_TOKEN_ENDPOINT.to_string(),
            token_timeout: Duration::from_secs(10),
            secret_name: DEFAULT_SECRET_NAME.to_string(),
            convert_timeout: Duration::from_secs(60),
            publish_prefix: DEFAULT_PUBLISH_PREFIX.to_string(),
            default_container: DEFAULT_CONTAINER.to_string(),
            manifest_suffixes: vec!["urls.txt".to_string(), ".manifest".to_string()],
            max_concurrent_items: 1,
            clock: None,
        }
    }
}

impl fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineConfig")
            .field("fetch", &self.fetch)
            .field("token_endpoint", &self.token_endpoint)
            .field("token_timeout", &self.token_timeout)
            .field("secret_name", &self.secret_name)
            .field("convert_timeout", &self.convert_timeout)
            .field("publish_prefix", &self.publish_prefix)
            .field("default_container", &self.default_container)
            .field("manifest_suffixes", &self.manifest_suffixes)
            .field("max_concurrent_items", &self.max_concurrent_items)
            .field("clock", &self.clock.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

impl EngineConfig {
    /// Defaults overlaid with the process environment.
    pub fn from_env() -> Self {
        Self::default().overlay(|name| std::env::var(name).ok())
    }

    /// Overlay values from `lookup` (an environment-like source). Values that
    /// fail to parse are logged and ignored.
    pub fn overlay(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let number = |name: &str| get(name).and_then(|v| parse_number(name, &v));

        if let Some(url) = get("TOKEN_URL") {
            self.token_endpoint = url;
        }
        if let Some(name) = get("OAS_SECRET_NAME") {
            self.secret_name = name;
        }
        if let Some(container) = get("OAS_DEFAULT_CONTAINER") {
            self.default_container = container;
        }
        if let Some(secs) = number("OAS_CONVERT_TIMEOUT_SECS") {
            if secs > 0 {
                self.convert_timeout = Duration::from_secs(secs);
            }
        }
        if let Some(secs) = number("OAS_FETCH_TIMEOUT_SECS") {
            if secs > 0 {
                self.fetch.request_timeout = Duration::from_secs(secs);
            }
        }
        if let Some(workers) = number("OAS_MAX_CONCURRENT_ITEMS") {
            self.max_concurrent_items = (workers as usize).max(1);
        }
        if let Some(suffixes) = get("OAS_MANIFEST_SUFFIXES") {
            self.manifest_suffixes = suffixes
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(ToOwned::to_owned)
                .collect();
        }
        self
    }

    /// Current timestamp for reports, if a clock is configured.
    pub fn now_utc(&self) -> Option<String> {
        self.clock.as_ref().map(|clock| clock())
    }
}

fn parse_number(name: &str, value: &str) -> Option<u64> {
    match value.trim().parse::<u64>() {
        Ok(n) => Some(n),
        Err(err) => {
            pipeline_warn!("Ignoring {}={:?}: {}", name, value, err);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn overlay_replaces_known_values() {
        let config = EngineConfig::default().overlay(lookup(&[
            ("TOKEN_URL", "https://auth.example.com/token"),
            ("OAS_CONVERT_TIMEOUT_SECS", "120"),
            ("OAS_MAX_CONCURRENT_ITEMS", "4"),
            ("OAS_MANIFEST_SUFFIXES", "list.txt, .batch"),
        ]));
        assert_eq!(config.token_endpoint, "https://auth.example.com/token");
        assert_eq!(config.convert_timeout, Duration::from_secs(120));
        assert_eq!(config.max_concurrent_items, 4);
        assert_eq!(config.manifest_suffixes, vec!["list.txt", ".batch"]);
    }

    #[test]
    fn unparseable_and_zero_values_keep_defaults() {
        let config = EngineConfig::default().overlay(lookup(&[
            ("OAS_CONVERT_TIMEOUT_SECS", "soon"),
            ("OAS_FETCH_TIMEOUT_SECS", "0"),
            ("OAS_MAX_CONCURRENT_ITEMS", "0"),
        ]));
        assert_eq!(config.convert_timeout, Duration::from_secs(60));
        assert_eq!(config.fetch.request_timeout, Duration::from_secs(30));
        assert_eq!(config.max_concurrent_items, 1);
    }

    #[test]
    fn clock_is_optional() {
        let mut config = EngineConfig::default();
        assert_eq!(config.now_utc(), None);
        config.clock = Some(Arc::new(|| "2024-01-01T00:00:00Z".to_string()));
        assert_eq!(config.now_utc().as_deref(), Some("2024-01-01T00:00:00Z"));
    }
}
