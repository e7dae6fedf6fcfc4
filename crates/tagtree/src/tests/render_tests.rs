use super::helpers::{int_map, int_seq, json};
use crate::*;

#[test]
fn render_flat_map() {
    let root = json("doc", r#"{"a": 1, "b": "x"}"#);
    assert_eq!(root.to_string(), "a :\n  1\nb :\n  \"x\"\n");
}

#[test]
fn render_nested_sequence() {
    let root = json("doc", r#"[1, [2, 3], {"k": null}]"#);
    assert_eq!(
        root.to_string(),
        "- 1\n- \n  - 2\n  - 3\n- k :\n    null\n"
    );
}

#[test]
fn render_sequence_of_multi_key_maps_breaks_line() {
    let root = json("doc", r#"[{"a": 1, "b": 2}]"#);
    assert_eq!(root.to_string(), "- \n  a :\n    1\n  b :\n    2\n");
}

#[test]
fn render_empty_containers_and_invalid() {
    assert_eq!(int_seq("s", &[]).to_string(), "[ ]\n");
    assert_eq!(int_map("m", &[]).to_string(), "{ }\n");
    assert_eq!(Cursor::invalid().to_string(), "NONE\n");
}

#[test]
fn render_applies_starting_indent() {
    let root = int_map("m", &[("a", 1)]);
    assert_eq!(root.render(2, 4), "  a :\n      1\n");
}

#[test]
fn render_floats_and_pairs() {
    let root = json("doc", r#"{"pi": 3.5}"#);
    assert_eq!(root.get_elem("pi").to_string(), "3.500000\n");
    assert_eq!(root.get_key_value_pair(0).to_string(), "pi :\n  3.500000\n");
}

#[test]
fn render_merged_view_like_a_plain_map() {
    let merged = MergeCursor::from_stack(
        vec![
            int_map("base", &[("a", 1), ("b", 2)]),
            int_map("overlay", &[("b", 99)]),
        ],
        MergeOptions::default(),
    )
    .into_cursor();
    assert_eq!(merged.to_string(), "b :\n  99\na :\n  1\n");
}
