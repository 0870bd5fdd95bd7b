use oas_core::{parse_manifest, Invocation, SourceRef, Workload};
use pretty_assertions::assert_eq;

#[test]
fn manifest_skips_blank_and_comment_lines_and_keeps_order() {
    let text = "# nightly batch\n\nb.yaml\n  https://example.com/a.json  \n# trailing\n/nested/c.json\n";
    let sources = parse_manifest(text, "specs");
    assert_eq!(
        sources,
        vec![
            SourceRef::object("specs", "b.yaml"),
            SourceRef::Url("https://example.com/a.json".into()),
            SourceRef::object("specs", "nested/c.json"),
        ]
    );
}

#[test]
fn manifest_keeps_duplicates() {
    let sources = parse_manifest("a.json\na.json\n", "specs");
    assert_eq!(sources.len(), 2);
    assert_eq!(sources[0], sources[1]);
}

#[test]
fn empty_manifest_expands_to_nothing() {
    assert!(parse_manifest("\n# only comments\n   \n", "specs").is_empty());
}

#[test]
fn windows_line_endings_are_trimmed() {
    let sources = parse_manifest("a.json\r\nb.yaml\r\n", "specs");
    assert_eq!(sources[1], SourceRef::object("specs", "b.yaml"));
}

#[test]
fn invocations_become_workloads() {
    let inline = Invocation::Inline {
        name: "api.yaml".into(),
        content: "openapi: 3.0.0".into(),
    };
    let Workload::Single(source) = inline.into_workload() else {
        panic!("inline content is a single item");
    };
    assert!(!source.needs_fetch());
    assert_eq!(source.container(), None);

    let object = Invocation::Object {
        container: "specs".into(),
        key: "a.json".into(),
    };
    assert_eq!(
        object.into_workload(),
        Workload::Single(SourceRef::object("specs", "a.json"))
    );

    let manifest = Invocation::Manifest {
        container: "specs".into(),
        manifest_key: "urls.txt".into(),
    };
    assert_eq!(
        manifest.into_workload(),
        Workload::Manifest {
            container: "specs".into(),
            manifest_key: "urls.txt".into(),
        }
    );
}
