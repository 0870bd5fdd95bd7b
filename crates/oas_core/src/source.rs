use std::path::PathBuf;

/// One unresolved document source, as it appears in a request or manifest.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SourceRef {
    Url(String),
    Object { container: String, key: String },
    Path(PathBuf),
    /// Content supplied directly by the caller; there is nothing to fetch.
    Inline { name: String, content: String },
}

impl SourceRef {
    pub fn object(container: impl Into<String>, key: impl Into<String>) -> Self {
        SourceRef::Object {
            container: container.into(),
            key: key.into(),
        }
    }

    /// Stable identifier reported back in `ItemResult::source_identifier`.
    pub fn identifier(&self) -> String {
        match self {
            SourceRef::Url(url) => url.clone(),
            SourceRef::Object { container, key } => format!("{container}/{key}"),
            SourceRef::Path(path) => path.display().to_string(),
            SourceRef::Inline { name, .. } => format!("inline:{name}"),
        }
    }

    pub fn needs_fetch(&self) -> bool {
        !matches!(self, SourceRef::Inline { .. })
    }

    /// Container the source lives in, if it comes from object storage.
    pub fn container(&self) -> Option<&str> {
        match self {
            SourceRef::Object { container, .. } => Some(container),
            _ => None,
        }
    }
}

/// Parse a manifest: one source reference per line. Blank lines and lines
/// starting with `#` are skipped; `http(s)://` lines are URLs, anything else
/// is an object key inside `container`. Order and duplicates are preserved.
pub fn parse_manifest(text: &str, container: &str) -> Vec<SourceRef> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| {
            if is_url(line) {
                SourceRef::Url(line.to_string())
            } else {
                SourceRef::object(container, line.trim_start_matches('/'))
            }
        })
        .collect()
}

fn is_url(line: &str) -> bool {
    let lower = line.get(..8).unwrap_or(line).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_prefix_is_case_insensitive() {
        assert!(is_url("HTTPS://example.com/a.json"));
        assert!(is_url("http://x"));
        assert!(!is_url("specs/http.json"));
        assert!(!is_url("h"));
    }

    #[test]
    fn identifiers_name_the_origin() {
        assert_eq!(SourceRef::object("bucket", "a.json").identifier(), "bucket/a.json");
        assert_eq!(
            SourceRef::Inline {
                name: "api.yaml".into(),
                content: String::new()
            }
            .identifier(),
            "inline:api.yaml"
        );
    }
}
