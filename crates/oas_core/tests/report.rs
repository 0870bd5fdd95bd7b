use std::time::Duration;

use oas_core::{
    status_for, BatchReport, ConversionError, ErrorBody, FetchError, ItemError, ItemResult,
    ItemState, RequestError, Response, Stage, OUTPUT_KEY_HEADER,
};
use pretty_assertions::assert_eq;

fn init_logging() {
    pipeline_logging::initialize_for_tests();
}

#[test]
fn counts_always_add_up() {
    init_logging();
    let not_found = ItemError::from(FetchError::NotFound("specs/b.yaml".into()));
    let report = BatchReport::from_items(
        vec![
            ItemResult::succeeded("specs/a.json", "html/a.html"),
            ItemResult::failed("specs/b.yaml", Stage::Fetching, &not_found),
            ItemResult::succeeded("specs/c.json", "html/c.html"),
        ],
        None,
    );
    assert_eq!(report.total_count, 3);
    assert_eq!(report.succeeded_count, 2);
    assert_eq!(report.failed_count, 1);
    assert_eq!(report.succeeded_count + report.failed_count, report.total_count);

    let failed: Vec<_> = report.failed_items().map(|i| i.source_identifier.as_str()).collect();
    assert_eq!(failed, vec!["specs/b.yaml"]);
}

#[test]
fn empty_report_is_consistent() {
    let report = BatchReport::from_items(Vec::new(), Some("2024-01-01T00:00:00Z".into()));
    assert_eq!(report.total_count, 0);
    assert_eq!(report.failed_count, 0);
}

#[test]
fn item_result_from_terminal_states() {
    let mut state = ItemState::default();
    state.enter(Stage::Converting).unwrap();
    state.fail(ConversionError::Timeout(Duration::from_secs(60)).into());
    let result = ItemResult::from_state("inline:a.yaml", &state, None);
    assert!(!result.success);
    assert_eq!(result.stage_reached, Stage::Converting);
    assert_eq!(result.error_kind.as_deref(), Some("timeout"));

    let done = ItemState::Active(Stage::Done);
    let result = ItemResult::from_state("specs/a.json", &done, Some("html/a.html".into()));
    assert!(result.success);
    assert_eq!(result.output_key.as_deref(), Some("html/a.html"));
}

#[test]
fn report_serializes_with_snake_case_fields_and_lowercase_stages() {
    let err = ItemError::from(FetchError::HttpStatus {
        code: 503,
        message: "unavailable".into(),
    });
    let report = BatchReport::from_items(
        vec![ItemResult::failed("https://x/a.json", Stage::Fetching, &err)],
        None,
    );
    let json: serde_json::Value = serde_json::from_str(&report.to_json()).unwrap();
    assert_eq!(json["failed_count"], 1);
    assert_eq!(json["items"][0]["stage_reached"], "fetching");
    assert_eq!(json["items"][0]["error_kind"], "http-status");
}

#[test]
fn responses_carry_status_body_and_headers() {
    let ok = Response::html("<html></html>".into(), "html/a.html");
    assert!(ok.is_success());
    assert_eq!(ok.headers["Content-Type"], "text/html");
    assert_eq!(ok.headers[OUTPUT_KEY_HEADER], "html/a.html");

    let bad = Response::from_request_error(&RequestError::MissingParameter("url".into()));
    assert_eq!(bad.status_code, 400);
    let body: serde_json::Value = serde_json::from_str(&bad.body).unwrap();
    assert_eq!(body["kind"], "missing-parameter");

    let custom = Response::error(418, ErrorBody::new("teapot", "short and stout"));
    assert!(!custom.is_success());
}

#[test]
fn item_errors_map_to_statuses() {
    assert_eq!(status_for(&FetchError::NotFound("x".into()).into()), 404);
    assert_eq!(status_for(&FetchError::Network("reset".into()).into()), 502);
    assert_eq!(status_for(&ConversionError::Timeout(Duration::from_secs(1)).into()), 504);
    assert_eq!(status_for(&ConversionError::EmptyOutput("".into()).into()), 500);
}
