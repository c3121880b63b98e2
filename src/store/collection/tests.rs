use super::*;

fn meta(level: &str) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert("level".to_string(), level.into());
    metadata
}

fn ids(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

#[test]
fn metadata_values_deserialize_untagged() {
    let parsed: Metadata = serde_json::from_str(
        r#"{"level":"HSK3","char_count":42,"weight":0.5,"reviewed":true}"#,
    )
    .expect("should parse metadata");

    assert_eq!(parsed["level"], MetadataValue::Str("HSK3".to_string()));
    assert_eq!(parsed["char_count"], MetadataValue::Int(42));
    assert_eq!(parsed["weight"], MetadataValue::Float(0.5));
    assert_eq!(parsed["reviewed"], MetadataValue::Bool(true));

    let json = serde_json::to_string(&parsed).expect("should serialize metadata");
    assert!(json.contains(r#""char_count":42"#));
}

#[test]
fn numeric_values_match_across_kinds() {
    assert!(MetadataValue::Int(3).matches(&MetadataValue::Float(3.0)));
    assert!(MetadataValue::Float(3.0).matches(&MetadataValue::Int(3)));
    assert!(!MetadataValue::Int(3).matches(&MetadataValue::Float(3.5)));
    assert!(!MetadataValue::Str("3".to_string()).matches(&MetadataValue::Int(3)));
    assert!(!MetadataValue::Bool(true).matches(&MetadataValue::Int(1)));
}

#[test]
fn display_is_plain() {
    assert_eq!(MetadataValue::from("A1").to_string(), "A1");
    assert_eq!(MetadataValue::from(7i64).to_string(), "7");
    assert_eq!(MetadataValue::from(false).to_string(), "false");
    assert_eq!(MetadataValue::from("A1").as_str(), Some("A1"));
    assert_eq!(MetadataValue::from(1.5).as_str(), None);
}

#[test]
fn validate_accepts_consistent_call() {
    let dimension = validate_upsert(
        &ids(&["a", "b"]),
        &[vec![1.0, 0.0], vec![0.0, 1.0]],
        &ids(&["doc a", "doc b"]),
        &[meta("A1"), meta("A2")],
        Some(2),
    )
    .expect("should validate");
    assert_eq!(dimension, 2);
}

#[test]
fn validate_accepts_empty_call() {
    let dimension =
        validate_upsert(&[], &[], &[], &[], Some(8)).expect("empty call should validate");
    assert_eq!(dimension, 0);
}

#[test]
fn validate_rejects_length_mismatch() {
    let err = validate_upsert(
        &ids(&["a", "b"]),
        &[vec![1.0, 0.0]],
        &ids(&["doc a", "doc b"]),
        &[meta("A1"), meta("A1")],
        None,
    )
    .expect_err("lengths differ");
    assert!(matches!(err, PressError::Validation(_)));
}

#[test]
fn validate_rejects_mixed_dimensions() {
    let err = validate_upsert(
        &ids(&["a", "b"]),
        &[vec![1.0, 0.0], vec![1.0, 0.0, 0.0]],
        &ids(&["doc a", "doc b"]),
        &[meta("A1"), meta("A1")],
        None,
    )
    .expect_err("dimensions differ");
    assert!(err.to_string().contains("'b'"));
}

#[test]
fn validate_rejects_configured_dimension_mismatch() {
    let err = validate_upsert(
        &ids(&["a"]),
        &[vec![1.0, 0.0, 0.0]],
        &ids(&["doc a"]),
        &[meta("A1")],
        Some(2),
    )
    .expect_err("collection dimension differs");
    assert!(matches!(err, PressError::Validation(_)));
}

#[test]
fn validate_rejects_duplicate_and_empty_ids() {
    let duplicate = validate_upsert(
        &ids(&["a", "a"]),
        &[vec![1.0], vec![2.0]],
        &ids(&["x", "y"]),
        &[meta("A1"), meta("A1")],
        None,
    );
    assert!(matches!(duplicate, Err(PressError::Validation(_))));

    let empty = validate_upsert(&ids(&[""]), &[vec![1.0]], &ids(&["x"]), &[meta("A1")], None);
    assert!(matches!(empty, Err(PressError::Validation(_))));
}

#[test]
fn validate_rejects_non_finite_values() {
    let nan_embedding = validate_upsert(
        &ids(&["a"]),
        &[vec![f32::NAN]],
        &ids(&["x"]),
        &[meta("A1")],
        None,
    );
    assert!(matches!(nan_embedding, Err(PressError::Validation(_))));

    let mut bad_meta = meta("A1");
    bad_meta.insert("score".to_string(), MetadataValue::Float(f64::INFINITY));
    let infinite_meta =
        validate_upsert(&ids(&["a"]), &[vec![1.0]], &ids(&["x"]), &[bad_meta], None);
    assert!(matches!(infinite_meta, Err(PressError::Validation(_))));
}
