//! Schema validation, lookup and write tests against parsed documents

use insta::assert_snapshot;
use pretty_assertions::assert_eq;
use rstest::rstest;
use wyvern_config::{
    ConfigDocument, ConfigError, Configuration, Filter, KeyValueDescriptor, KeyValuePair, Schema,
    Span, Table, Trie, Value, ValueKind,
};

fn key(s: &str) -> Trie {
    Trie::parse(s).unwrap()
}

fn filter(s: &str) -> Filter {
    Filter::parse(s).unwrap()
}

fn parse(source: &str) -> ConfigDocument {
    ConfigDocument::from_toml_str(source).unwrap()
}

fn name_only() -> Schema {
    Schema::new(vec![KeyValueDescriptor::string(
        filter("name"),
        "project name",
        true,
    )])
}

fn package_schema() -> Schema {
    Schema::new(vec![
        KeyValueDescriptor::string(filter("package/name"), "package name", true),
        KeyValueDescriptor::string(filter("package/version"), "package version", true),
        KeyValueDescriptor::list(filter("package/authors"), "authors", false),
        KeyValueDescriptor::bounded_integer(filter("build/jobs"), "parallel jobs", false, 1, 64)
            .with_default(4),
        KeyValueDescriptor::string(filter("dependencies/*"), "dependency version", false),
    ])
}

// ============================================================================
// Validation Tests
// ============================================================================

#[test]
fn test_missing_required_key() {
    let err = Configuration::new(ConfigDocument::default(), name_only(), true).unwrap_err();
    match &err {
        ConfigError::MissingKey { filter } => assert_eq!(filter.to_string(), "name"),
        other => panic!("unexpected error: {other}"),
    }
    assert_snapshot!(err.to_string(), @"Missing required key matching 'name'");
}

#[test]
fn test_strict_rejects_unknown_key() {
    let source = "name = \"x\"\nextra = \"y\"\n";
    let err = Configuration::new(parse(source), name_only(), true).unwrap_err();
    match &err {
        ConfigError::UnknownKey { key: k, span } => {
            assert_eq!(k, &key("extra"));
            let span = span.expect("parsed pairs carry a span");
            assert_eq!(source[span.start..span.end].trim(), "\"y\"");
            assert_eq!(err.to_string(), format!("Unknown key 'extra' at {}", span));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_lenient_ignores_unknown_key() {
    let doc = parse("name = \"x\"\nextra = \"y\"\n");
    let config = Configuration::new(doc, name_only(), false).unwrap();

    assert_eq!(config.matched_keys().iter().collect::<Vec<_>>(), vec![&key("name")]);
    // Still present in the document, just ungoverned
    assert!(config.document().contains_key(&key("extra")));
}

#[test]
fn test_type_mismatch_message() {
    let mut doc = parse("[package]\nname = \"demo\"\nversion = 1\n");
    let err = Configuration::new(doc.clone(), package_schema(), false).unwrap_err();
    assert!(matches!(err, ConfigError::TypeMismatch { span: Some(_), .. }));

    doc.clear_spans();
    let err = Configuration::new(doc, package_schema(), false).unwrap_err();
    assert_snapshot!(
        err.to_string(),
        @"Expected string for 'package/version' but found integer"
    );
}

#[test]
fn test_span_reported_for_external_parser() {
    let doc = ConfigDocument::new(vec![
        KeyValuePair::new("name", "x").into(),
        KeyValuePair::new("stray", true)
            .with_span(Span { start: 11, end: 23 })
            .into(),
    ]);
    let err = Configuration::new(doc, name_only(), true).unwrap_err();
    assert_snapshot!(err.to_string(), @"Unknown key 'stray' at 11..23");
}

#[rstest]
#[case::lower_bound("[package]\nname = \"a\"\nversion = \"1.0.0\"\n[build]\njobs = 1\n", true)]
#[case::upper_bound("[package]\nname = \"a\"\nversion = \"1.0.0\"\n[build]\njobs = 64\n", true)]
#[case::zero("[package]\nname = \"a\"\nversion = \"1.0.0\"\n[build]\njobs = 0\n", false)]
#[case::too_many("[package]\nname = \"a\"\nversion = \"1.0.0\"\n[build]\njobs = 65\n", false)]
fn test_bounded_integer_validation(#[case] source: &str, #[case] valid: bool) {
    let result = Configuration::new(parse(source), package_schema(), true);
    assert_eq!(result.is_ok(), valid);
    if !valid {
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }
}

#[test]
fn test_validation_is_idempotent() {
    let source = r#"
[package]
name = "demo"
version = "0.3.1"
authors = ["ada", "grace"]

[dependencies]
json = "1.2.0"
http = "0.9.4"
"#;
    let first = Configuration::new(parse(source), package_schema(), true).unwrap();
    let second = Configuration::new(first.document().clone(), package_schema(), true).unwrap();

    assert_eq!(first.matched_keys(), second.matched_keys());
    assert_eq!(first.matched_keys().len(), 5);
}

#[test]
fn test_each_overlapping_descriptor_is_checked() {
    let schema = Schema::new(vec![
        KeyValueDescriptor::string(filter("dependencies/*"), "any dependency", false),
        KeyValueDescriptor::string(filter("dependencies/core"), "core", false)
            .with_validator(|v| v.as_str() == Some("1.0.0")),
    ]);

    let err = Configuration::new(parse("[dependencies]\ncore = \"2.0.0\"\n"), schema, true)
        .unwrap_err();
    assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key.to_string() == "dependencies/core"));
}

#[test]
fn test_write_checks_each_overlapping_descriptor() {
    let schema = Schema::new(vec![
        KeyValueDescriptor::string(filter("dependencies/*"), "any dependency", false),
        KeyValueDescriptor::string(filter("dependencies/core"), "core", false)
            .with_validator(|v| v.as_str() == Some("1.0.0")),
    ]);
    let mut config =
        Configuration::new(parse("[dependencies]\ncore = \"1.0.0\"\n"), schema, true).unwrap();

    let err = config.write(&key("dependencies/core"), "9.9.9").unwrap_err();
    assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key.to_string() == "dependencies/core"));
    assert_eq!(
        config.get::<String>(&key("dependencies/core")).unwrap(),
        "1.0.0"
    );

    config.write(&key("dependencies/json"), "9.9.9").unwrap();
    assert!(wyvern_config::validate(config.document(), config.schema(), true).is_ok());
}

// ============================================================================
// Lookup Tests
// ============================================================================

#[test]
fn test_first_declaration_shadows_later_ones() {
    let doc = ConfigDocument::new(vec![
        Table::new(["package"], vec![KeyValuePair::new("name", "first").into()]).into(),
        Table::new(["package"], vec![KeyValuePair::new("name", "second").into()]).into(),
    ]);
    let config = Configuration::new(doc, package_schema_without_version(), true).unwrap();

    assert_eq!(config.get::<String>(&key("package/name")).unwrap(), "first");
    assert_eq!(config.match_all(&filter("package/*")), vec![key("package/name")]);
}

fn package_schema_without_version() -> Schema {
    Schema::new(vec![KeyValueDescriptor::string(
        filter("package/name"),
        "package name",
        true,
    )])
}

#[test]
fn test_lookup_continues_past_partial_table() {
    let doc = ConfigDocument::new(vec![
        Table::new(["package"], vec![KeyValuePair::new("name", "demo").into()]).into(),
        Table::new(["package"], vec![KeyValuePair::new("version", "1.0.0").into()]).into(),
    ]);
    let config = Configuration::new(doc, package_schema(), true).unwrap();

    assert_eq!(config.get::<String>(&key("package/version")).unwrap(), "1.0.0");
}

#[test]
fn test_default_used_when_absent() {
    let doc = parse("[package]\nname = \"a\"\nversion = \"1.0.0\"\n");
    let config = Configuration::new(doc, package_schema(), true).unwrap();

    assert!(config.has_key(&key("build/jobs")));
    assert_eq!(config.get::<i64>(&key("build/jobs")).unwrap(), 4);
    assert!(!config.has_key(&key("package/authors")));
}

#[test]
fn test_read_errors() {
    let doc = parse("[package]\nname = \"a\"\nversion = \"1.0.0\"\n");
    let config = Configuration::new(doc, package_schema(), true).unwrap();

    let err = config.get::<i64>(&key("package/name")).unwrap_err();
    assert_snapshot!(err.to_string(), @"Cannot use string value of 'package/name' as integer");

    let err = config.get::<String>(&key("package/authors")).unwrap_err();
    assert_snapshot!(err.to_string(), @"No value or default for key 'package/authors'");

    let value = config.get_value(&key("package/name")).unwrap();
    assert_eq!(value.kind(), ValueKind::String);
}

// ============================================================================
// Write Tests
// ============================================================================

#[test]
fn test_write_then_render_round_trip() {
    let doc = parse("[package]\nname = \"a\"\nversion = \"1.0.0\"\n");
    let mut config = Configuration::new(doc, package_schema(), true).unwrap();

    config.write(&key("package/version"), "1.1.0").unwrap();
    config.write(&key("dependencies/json"), "2.0.0").unwrap();
    config
        .write(
            &key("package/authors"),
            Value::List(vec![Value::from("ada")]),
        )
        .unwrap();

    let rendered = config.document().to_toml_string().unwrap();
    let reparsed = Configuration::new(parse(&rendered), package_schema(), true).unwrap();

    assert_eq!(reparsed.get::<String>(&key("package/version")).unwrap(), "1.1.0");
    assert_eq!(reparsed.get::<String>(&key("dependencies/json")).unwrap(), "2.0.0");
    assert_eq!(reparsed.matched_keys(), config.matched_keys());
}

#[test]
fn test_write_rejections() {
    let doc = parse("[package]\nname = \"a\"\nversion = \"1.0.0\"\n");
    let mut config = Configuration::new(doc, package_schema(), true).unwrap();

    assert!(matches!(
        config.write(&key("package/license"), "MIT"),
        Err(ConfigError::InvalidKey(_))
    ));
    assert!(matches!(
        config.write(&key("build/jobs"), "eight"),
        Err(ConfigError::IncompatibleType { expected: ValueKind::Integer, .. })
    ));
    assert!(matches!(
        config.write(&key("build/jobs"), 128),
        Err(ConfigError::InvalidValue { .. })
    ));

    // Rejected writes leave the document untouched
    assert_eq!(config.document().keys().len(), 2);
}
