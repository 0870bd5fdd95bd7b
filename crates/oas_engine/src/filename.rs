/// Name used when a source yields no usable base name.
pub const FALLBACK_BASE_NAME: &str = "openapi";

/// Deterministic artifact key: `{prefix}{base}.html`, where `base` is the last
/// path segment of `source_name` with its final extension removed.
///
/// `html_output_key("specs/petstore.yaml", "html/") == "html/petstore.html"`
pub fn html_output_key(source_name: &str, prefix: &str) -> String {
    let base = base_name(source_name);
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        format!("{base}.html")
    } else {
        format!("{prefix}/{base}.html")
    }
}

/// Last path segment without its final extension, made filesystem-safe.
pub fn base_name(source_name: &str) -> String {
    let segment = source_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(source_name);
    let stem = match segment.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => segment,
    };
    sanitize_file_name(stem, FALLBACK_BASE_NAME)
}

/// Windows-safe file name: forbidden characters become `_`, runs of `_`
/// collapse, length is capped and reserved device names get a suffix.
pub fn sanitize_file_name(input: &str, fallback: &str) -> String {
    let cleaned: String = input
        .chars()
        .map(|c| if is_forbidden(c) { '_' } else { c })
        .collect();
    let cleaned = cleaned.trim_matches(&['_', ' ', '.'][..]);
    if cleaned.is_empty() {
        return fallback.to_string();
    }
    let mut compacted = String::with_capacity(cleaned.len());
    let mut prev_underscore = false;
    for c in cleaned.chars() {
        if c == '_' {
            if !prev_underscore {
                compacted.push(c);
            }
            prev_underscore = true;
        } else {
            compacted.push(c);
            prev_underscore = false;
        }
    }
    let mut final_name = compacted;
    if final_name.len() > 120 {
        let mut end = 120;
        while !final_name.is_char_boundary(end) {
            end -= 1;
        }
        final_name.truncate(end);
    }
    if is_reserved_windows_name(&final_name) {
        final_name.push('_');
    }
    final_name
}

fn is_forbidden(c: char) -> bool {
    matches!(c,
        '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\0'..='\u{1F}'
    )
}

fn is_reserved_windows_name(name: &str) -> bool {
    const RESERVED: &[&str] = &[
        "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
        "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
    ];
    RESERVED.iter().any(|r| r.eq_ignore_ascii_case(name))
}
