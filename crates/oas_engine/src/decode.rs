use chardetng::EncodingDetector;
use encoding_rs::Encoding;
use oas_core::FetchError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedText {
    pub text: String,
    pub encoding_label: String,
}

/// Decode raw document bytes into UTF-8 using: BOM -> Content-Type charset ->
/// plain UTF-8 -> chardetng fallback. The BOM itself is stripped.
pub fn decode_document(bytes: &[u8], content_type: Option<&str>) -> Result<DecodedText, FetchError> {
    if let Some((encoding, _)) = Encoding::for_bom(bytes) {
        return decode_with(bytes, encoding);
    }

    if let Some(label) = content_type.and_then(extract_charset) {
        if let Some(enc) = Encoding::for_label(label.as_bytes()) {
            return decode_with(bytes, enc);
        }
    }

    // JSON and YAML documents are UTF-8 far more often than not.
    if let Ok(text) = std::str::from_utf8(bytes) {
        return Ok(DecodedText {
            text: text.to_string(),
            encoding_label: encoding_rs::UTF_8.name().to_string(),
        });
    }

    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    let enc = detector.guess(None, true);
    decode_with(bytes, enc)
}

fn extract_charset(content_type: &str) -> Option<String> {
    content_type
        .split(';')
        .filter_map(|part| {
            let part = part.trim();
            let (name, value) = part.split_once('=')?;
            name.trim()
                .eq_ignore_ascii_case("charset")
                .then(|| value.trim_matches([' ', '"', '\''].as_ref()))
        })
        .next()
        .map(|s| s.to_string())
}

fn decode_with(bytes: &[u8], enc: &'static Encoding) -> Result<DecodedText, FetchError> {
    let (text, _, had_errors) = enc.decode(bytes);
    if had_errors {
        return Err(FetchError::DecodeFailed {
            encoding: enc.name().to_string(),
        });
    }
    Ok(DecodedText {
        text: text.into_owned(),
        encoding_label: enc.name().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn charset_parameter_is_found_in_any_case() {
        assert_eq!(
            extract_charset("application/json; Charset=\"ISO-8859-1\""),
            Some("ISO-8859-1".to_string())
        );
        assert_eq!(extract_charset("application/yaml"), None);
    }

    #[test]
    fn utf8_bom_is_stripped() {
        let decoded = decode_document(b"\xEF\xBB\xBFopenapi: 3.0.0", None).unwrap();
        assert_eq!(decoded.text, "openapi: 3.0.0");
        assert_eq!(decoded.encoding_label, "UTF-8");
    }

    #[test]
    fn header_charset_wins_over_detection() {
        let decoded = decode_document(b"title: caf\xe9", Some("text/yaml; charset=ISO-8859-1")).unwrap();
        assert_eq!(decoded.text, "title: café");
    }

    #[test]
    fn invalid_utf8_under_declared_utf8_fails() {
        let err = decode_document(b"title: \x80\x81", Some("application/json; charset=utf-8"))
            .unwrap_err();
        assert_eq!(err.kind(), "decode-failed");
    }
}
