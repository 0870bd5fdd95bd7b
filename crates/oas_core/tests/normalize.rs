use std::path::PathBuf;
use std::time::Duration;

use oas_core::{
    AuthOptions, CanonicalRequest, Invocation, RawRequest, RequestError, DEFAULT_INLINE_NAME,
};
use pretty_assertions::assert_eq;
use serde_json::json;

fn suffixes() -> Vec<String> {
    vec!["urls.txt".to_string(), ".manifest".to_string()]
}

fn normalize(event: serde_json::Value) -> Result<CanonicalRequest, RequestError> {
    CanonicalRequest::from_event(event, &suffixes())
}

#[test]
fn url_shape_with_auth_overrides() {
    let request = normalize(json!({
        "url": "https://example.com/specs/petstore.json",
        "use_auth": true,
        "token_endpoint": "https://auth.example.com/token",
        "timeout": 90
    }))
    .unwrap();

    assert_eq!(
        request.invocation,
        Invocation::Url("https://example.com/specs/petstore.json".into())
    );
    assert_eq!(
        request.auth,
        AuthOptions {
            use_auth: true,
            token_endpoint: Some("https://auth.example.com/token".into()),
        }
    );
    assert_eq!(request.timeout, Some(Duration::from_secs(90)));
}

#[test]
fn inline_shape_accepts_legacy_names_and_default_name() {
    let request = normalize(json!({ "oas_content": "openapi: 3.0.0" })).unwrap();
    assert_eq!(
        request.invocation,
        Invocation::Inline {
            name: DEFAULT_INLINE_NAME.into(),
            content: "openapi: 3.0.0".into(),
        }
    );

    let request = normalize(json!({ "content": "{}", "name": "api.json" })).unwrap();
    assert_eq!(request.invocation.shape(), "inline");
}

#[test]
fn blank_inline_content_is_still_inline() {
    let request = normalize(json!({ "content": "", "name": "empty.yaml" })).unwrap();
    assert_eq!(
        request.invocation,
        Invocation::Inline {
            name: "empty.yaml".into(),
            content: String::new(),
        }
    );
}

#[test]
fn object_and_manifest_shapes() {
    let request = normalize(json!({ "s3_bucket": "specs", "s3_key": "team/a.yaml" })).unwrap();
    assert_eq!(
        request.invocation,
        Invocation::Object {
            container: "specs".into(),
            key: "team/a.yaml".into(),
        }
    );

    let request = normalize(json!({ "container": "specs", "manifest_key": "batch/list" })).unwrap();
    assert_eq!(
        request.invocation,
        Invocation::Manifest {
            container: "specs".into(),
            manifest_key: "batch/list".into(),
        }
    );
}

#[test]
fn object_key_with_manifest_suffix_becomes_batch() {
    let request = normalize(json!({ "container": "specs", "key": "nightly/urls.txt" })).unwrap();
    assert_eq!(request.invocation.shape(), "manifest");
}

#[test]
fn storage_notification_envelope_is_decoded() {
    let request = normalize(json!({
        "Records": [{
            "s3": {
                "bucket": { "name": "specs" },
                "object": { "key": "team+b/urls.txt" }
            }
        }]
    }))
    .unwrap();
    assert_eq!(
        request.invocation,
        Invocation::Manifest {
            container: "specs".into(),
            manifest_key: "team b/urls.txt".into(),
        }
    );
    assert!(!request.auth.use_auth);
}

#[test]
fn local_path_shape() {
    let request = normalize(json!({ "path": "docs/api.yaml" })).unwrap();
    assert_eq!(request.invocation, Invocation::Path(PathBuf::from("docs/api.yaml")));
}

#[test]
fn nothing_usable_is_missing_parameter() {
    let err = normalize(json!({ "use_auth": true, "name": "x.yaml" })).unwrap_err();
    assert_eq!(err.kind(), "missing-parameter");

    let err = normalize(json!({ "url": "   " })).unwrap_err();
    assert_eq!(err.kind(), "missing-parameter");
}

#[test]
fn half_a_storage_reference_is_missing_parameter() {
    let err = normalize(json!({ "container": "specs" })).unwrap_err();
    assert!(matches!(err, RequestError::MissingParameter(_)));

    let err = normalize(json!({ "key": "a.json" })).unwrap_err();
    assert_eq!(err, RequestError::MissingParameter("container".into()));
}

#[test]
fn several_shapes_are_rejected_not_guessed() {
    let err = normalize(json!({
        "url": "https://example.com/a.json",
        "content": "openapi: 3.0.0"
    }))
    .unwrap_err();
    assert_eq!(err, RequestError::AmbiguousRequest(vec!["url", "inline"]));

    let err = normalize(json!({
        "container": "specs",
        "key": "a.json",
        "manifest_key": "urls.txt"
    }))
    .unwrap_err();
    assert_eq!(err.kind(), "ambiguous-request");
}

#[test]
fn zero_timeout_is_invalid() {
    let err = normalize(json!({ "url": "https://example.com/a.json", "timeout": 0 })).unwrap_err();
    assert_eq!(err.kind(), "invalid-parameter");
}

#[test]
fn wrongly_typed_field_is_invalid() {
    let err = normalize(json!({ "url": "https://example.com/a.json", "use_auth": "yes" }))
        .unwrap_err();
    assert_eq!(err.kind(), "invalid-parameter");
}

#[test]
fn raw_request_normalizes_directly() {
    let raw = RawRequest {
        url: Some("https://example.com/a.json".into()),
        ..RawRequest::default()
    };
    let request = raw.normalize(&[]).unwrap();
    assert_eq!(request.timeout, None);
    assert_eq!(request.auth, AuthOptions::default());
}
