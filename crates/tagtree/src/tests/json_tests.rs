use serde_json::json;

use super::helpers::{json, keys};
use crate::*;

#[test]
fn integers_take_the_narrowest_signed_width() {
    let root = json("n", r#"[1, -5, 5000000000, 18446744073709551615, 1.5, true, null]"#);
    let kinds: Vec<Option<Tag>> = root.iter().map(|c| c.kind()).collect();
    assert_eq!(
        kinds,
        vec![
            Some(Tag::Sint4),
            Some(Tag::Sint4),
            Some(Tag::Sint8),
            Some(Tag::Uint8),
            Some(Tag::Real8),
            Some(Tag::Uint1),
            Some(Tag::Null),
        ]
    );
    assert_eq!(root.get_elem(2).get(0i64), 5_000_000_000);
    assert_eq!(root.get_elem(3).get(0u64), u64::MAX);
}

#[test]
fn object_key_order_is_kept() {
    let root = json("o", r#"{"z": 1, "a": 2, "m": 3}"#);
    assert_eq!(keys(&root), vec!["z", "a", "m"]);
    assert_eq!(root.get_elem("a").get(0i32), 2);
}

#[test]
fn invalid_json_is_an_error() {
    assert!(ValueStore::from_json("bad", "{").is_err());
}

#[test]
fn to_json_round_trips_documents() {
    let text = r#"{"name": "x", "list": [1, 2.5, null, "s"], "nested": {"big": 5000000000}}"#;
    let root = json("doc", text);
    let value = to_json(&root).unwrap();
    assert_eq!(
        value,
        json!({"name": "x", "list": [1, 2.5, null, "s"], "nested": {"big": 5000000000u64}})
    );
}

#[test]
fn to_json_of_merged_view() {
    let merged = MergeCursor::from_stack(
        vec![json("a", r#"{"x": 1, "y": 2}"#), json("b", r#"{"y": 3}"#)],
        MergeOptions::default(),
    )
    .into_cursor();
    assert_eq!(to_json(&merged).unwrap(), json!({"x": 1, "y": 3}));
}

#[test]
fn to_json_of_invalid_cursor_fails() {
    assert_eq!(to_json(&Cursor::invalid()).unwrap_err(), Error::InvalidCursor);
}
