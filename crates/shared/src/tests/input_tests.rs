use super::*;
use rust_decimal_macros::dec;

#[test]
fn numeric_input_accepts_numbers_and_text() {
    assert_eq!(NumericInput::from("10000").to_decimal(), Some(dec!(10000)));
    assert_eq!(NumericInput::from(" 2500.50 ").to_decimal(), Some(dec!(2500.50)));
    assert_eq!(NumericInput::from(dec!(12.5)).to_decimal(), Some(dec!(12.5)));
    assert_eq!(NumericInput::from("abc").to_decimal(), None);
    assert_eq!(NumericInput::from("").to_decimal(), None);
}

#[test]
fn numeric_input_counts_truncate_and_refuse_negatives() {
    assert_eq!(NumericInput::from("5").to_count(), Some(5));
    assert_eq!(NumericInput::from(dec!(5.9)).to_count(), Some(5));
    assert_eq!(NumericInput::from("-2").to_count(), None);
}

#[test]
fn numeric_input_deserializes_from_json_number_or_string() {
    let number: NumericInput = serde_json::from_str("1500").expect("number");
    let text: NumericInput = serde_json::from_str("\"1500\"").expect("text");
    assert_eq!(number.to_decimal(), Some(dec!(1500)));
    assert_eq!(text.to_decimal(), Some(dec!(1500)));
}

#[test]
fn normalize_reduces_every_shape_to_plain_ids() {
    let ids = normalize_assigned_to(vec![
        AssigneeRef::from("a"),
        AssigneeRef::wrapped("b"),
        AssigneeRef::user("c"),
        AssigneeRef::record("d"),
    ]);
    let ids: Vec<&str> = ids.iter().map(UserId::as_str).collect();
    assert_eq!(ids, vec!["a", "b", "c", "d"]);
}

#[test]
fn normalize_drops_falsy_entries_and_duplicates() {
    let ids = normalize_assigned_to(vec![
        AssigneeRef::from(""),
        AssigneeRef::Absent,
        AssigneeRef::from("a"),
        AssigneeRef::user("a"),
        AssigneeRef::wrapped(""),
        AssigneeRef::Object(AssigneeObject::default()),
        AssigneeRef::from("b"),
    ]);
    assert_eq!(ids, vec![UserId::new("a"), UserId::new("b")]);
}

#[test]
fn normalize_is_idempotent() {
    let once = normalize_assigned_to(vec![
        AssigneeRef::user("x"),
        AssigneeRef::wrapped("y"),
        AssigneeRef::from("x"),
    ]);
    let twice = normalize_assigned_to(once.clone());
    assert_eq!(once, twice);
}

#[test]
fn empty_value_falls_through_to_nested_user() {
    let entry = AssigneeRef::Object(AssigneeObject {
        value: Some(String::new()),
        user: Some(IdHolder {
            id: Some("u-1".into()),
        }),
        id: None,
    });
    assert_eq!(entry.resolve(), Some("u-1"));
}

#[test]
fn assignee_shapes_parse_from_picker_json() {
    let raw = r#"["s1", {"value": "s2"}, {"user": {"_id": "s3", "name": "Ravi"}, "amountPaid": 0}, {"_id": "s4"}, null]"#;
    let entries: Vec<AssigneeRef> = serde_json::from_str(raw).expect("entries");
    let ids = normalize_assigned_to(entries);
    assert_eq!(
        ids,
        vec![
            UserId::new("s1"),
            UserId::new("s2"),
            UserId::new("s3"),
            UserId::new("s4"),
        ]
    );
}
