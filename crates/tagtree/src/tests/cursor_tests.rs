use std::rc::Rc;

use super::helpers::{int_map, int_seq, ints, json};
use crate::*;

fn scalar<F: FnOnce(&mut ValueStore) -> usize>(push: F) -> Cursor {
    let mut store = ValueStore::new("scalar");
    push(&mut store);
    Cursor::root(&Rc::new(store))
}

// -------------------- Conversions --------------------

#[test]
fn integer_reads_as_number_and_text() {
    let c = scalar(|s| s.push_i32(42, Pos::NONE));
    assert_eq!(c.get(0i32), 42);
    assert_eq!(c.get(0i64), 42);
    assert_eq!(c.get(0.0f64), 42.0);
    assert_eq!(c.get_str(""), "42");
    assert_eq!(c.number(), Some(Number::I32(42)));
    assert!(c.is::<i32>());
    assert!(!c.is::<i64>());
    assert!(c.is_convertible::<String>());
    assert!(c.is_convertible::<u8>());
    assert!(c.is_number());
}

#[test]
fn numeric_casts_follow_as_semantics() {
    let c = scalar(|s| s.push_u8(255, Pos::NONE));
    assert_eq!(c.get(0i8), -1);
    assert_eq!(c.get(0u16), 255);

    let c = scalar(|s| s.push_f64(2.75, Pos::NONE));
    assert_eq!(c.get(0i32), 2);
    assert_eq!(c.get(0.0f32), 2.75);
}

#[test]
fn floats_print_six_digits() {
    let c = scalar(|s| s.push_f32(1.5, Pos::NONE));
    assert_eq!(c.get_str(""), "1.500000");
    let c = scalar(|s| s.push_f64(-0.25, Pos::NONE));
    assert_eq!(c.get_str(""), "-0.250000");
}

#[test]
fn booleans_are_small_unsigned() {
    let c = scalar(|s| s.push_bool(true, Pos::NONE));
    assert!(c.get(false));
    assert!(c.is::<bool>());
    assert_eq!(c.kind(), Some(Tag::Uint1));

    let c = scalar(|s| s.push_bool(false, Pos::NONE));
    assert!(!c.get(true));
}

#[test]
fn string_converts_only_to_string() {
    let c = scalar(|s| s.push_string("text", Pos::NONE).unwrap());
    assert_eq!(c.get_str("x"), "text");
    assert_eq!(c.as_str(), Some("text"));
    assert_eq!(c.get(7i32), 7);
    assert!(c.is::<String>());
    assert!(!c.is_convertible::<i32>());
    assert!(matches!(
        c.try_get::<i32>(),
        Err(Error::KindMismatch {
            found: Tag::String,
            ..
        })
    ));
}

#[test]
fn null_converts_to_nothing() {
    let c = scalar(|s| s.push_null(Pos::NONE));
    assert!(c.is_null());
    assert_eq!(c.get(3i32), 3);
    assert_eq!(c.get_str("none"), "none");
    assert_eq!(c.size(), 1);
}

// -------------------- Navigation --------------------

#[test]
fn sequence_indexing() {
    let seq = int_seq("s", &[10, 20, 30]);
    assert!(seq.is_sequence());
    assert_eq!(seq.size(), 3);
    assert_eq!(seq.get_elem(0).get(0i32), 10);
    assert_eq!(seq.get_elem(2).get(0i32), 30);

    let missing = seq.get_elem(5);
    assert!(!missing.is_valid());
    assert_eq!(missing.size(), 0);
    assert_eq!(
        seq.try_get_elem(5).unwrap_err(),
        Error::IndexOutOfRange { index: 5, len: 3 }
    );
}

#[test]
fn map_lookup_by_any_key_form() {
    let map = int_map("m", &[("a", 1), ("b", 2)]);
    let owned = String::from("b");
    assert_eq!(map.get_elem("a").get(0i32), 1);
    assert_eq!(map.get_elem(owned.clone()).get(0i32), 2);
    assert_eq!(map.get_elem(&owned).get(0i32), 2);
    assert_eq!(
        map.try_get_elem("zz").unwrap_err(),
        Error::KeyNotFound("zz".into())
    );
}

#[test]
fn wrong_index_kind_is_a_mismatch() {
    let map = int_map("m", &[("a", 1)]);
    let seq = int_seq("s", &[1]);
    assert!(matches!(
        map.try_get_elem(0),
        Err(Error::KindMismatch { expected: "sequence", .. })
    ));
    assert!(matches!(
        seq.try_get_elem("a"),
        Err(Error::KindMismatch { expected: "map", .. })
    ));
}

#[test]
fn missing_path_chains_to_default() {
    let root = json("doc", r#"{"a": {"b": [1, 2, 3]}}"#);
    assert_eq!(root.get_elem("a").get_elem("b").get_elem(1).get(0i32), 2);
    assert_eq!(root.get_elem("nope").get_elem(3).get(9i32), 9);
    assert_eq!(root.get_elem("a").get_elem("b").get_elem(7).get_str("-"), "-");
}

#[test]
fn pairs_by_position() {
    let map = int_map("m", &[("z", 26), ("a", 1)]);
    let pair = map.get_key_value_pair(0);
    assert!(pair.is_key_value_pair());
    assert_eq!(pair.size(), 1);
    assert_eq!(pair.get_key(), Some("z"));
    assert_eq!(pair.get_value().get(0i32), 26);
    assert_eq!(map.key_of_pair(1), Some("a".to_owned()));
    assert_eq!(map.value_of_pair(1).get(0i32), 1);
    assert_eq!(map.key_of_pair(2), None);
    assert!(!map.value_of_pair(2).is_valid());
}

#[test]
fn map_key_and_value_come_from_first_pair() {
    let map = int_map("m", &[("first", 1), ("second", 2)]);
    assert_eq!(map.get_key(), Some("first"));
    assert_eq!(map.get_value().get(0i32), 1);

    let empty = int_map("e", &[]);
    assert_eq!(empty.get_key(), None);
    assert!(!empty.get_value().is_valid());
    assert_eq!(empty.size(), 0);
}

#[test]
fn key_of_scalar_is_a_mismatch() {
    let c = scalar(|s| s.push_i32(1, Pos::NONE));
    assert_eq!(c.get_key(), None);
    assert!(matches!(c.try_get_key(), Err(Error::KindMismatch { .. })));
    assert!(!c.get_value().is_valid());
}

#[test]
fn find_key_value_pair_scans_in_order() {
    let map = int_map("m", &[("x", 1), ("y", 2)]);
    let pair = map.find_key_value_pair("y");
    assert_eq!(pair.get_key(), Some("y"));
    assert_eq!(pair.offset(), map.get_key_value_pair(1).offset());
    assert!(!map.find_key_value_pair("q").is_valid());
}

#[test]
fn iterating_children() {
    let seq = int_seq("s", &[3, 1, 2]);
    assert_eq!(ints(&seq), vec![3, 1, 2]);
    assert_eq!(seq.iter().len(), 3);

    let map = int_map("m", &[("a", 1), ("b", 2)]);
    let keys: Vec<String> = (&map)
        .into_iter()
        .filter_map(|p| p.get_key().map(str::to_owned))
        .collect();
    assert_eq!(keys, vec!["a", "b"]);

    let one = scalar(|s| s.push_i32(1, Pos::NONE));
    assert_eq!(one.iter().count(), 0);
}

// -------------------- Identity & diagnostics --------------------

#[test]
fn invalid_cursor_basics() {
    let c = Cursor::invalid();
    assert!(!c.is_valid());
    assert_eq!(c.kind(), None);
    assert_eq!(c.size(), 0);
    assert_eq!(c.name(), "");
    assert_eq!(c.column(), None);
    assert_eq!(c.offset(), None);
    assert!(c.store().is_none());
    assert_eq!(format!("{:?}", c), "Cursor(invalid)");
    assert_eq!(c.try_size().unwrap_err(), Error::InvalidCursor);
}

#[test]
fn root_of_empty_store_is_invalid() {
    let store = Rc::new(ValueStore::new("empty"));
    assert!(!Cursor::root(&store).is_valid());
}

#[test]
fn cursor_past_the_buffer_is_invalid() {
    let store = Rc::new(ValueStore::new("empty"));
    let c = Cursor::new(&store, 10);
    assert!(!c.is_valid());
    assert!(matches!(c.try_kind(), Err(Error::MalformedNode { .. })));
}

#[test]
fn name_and_position() {
    let mut store = ValueStore::new("config.yaml");
    store.begin_sequence((1, 1));
    store.push_i32(5, (3, 2));
    store.end_sequence(Pos::NONE);
    let root = Cursor::root(&Rc::new(store));

    assert_eq!(root.name(), "config.yaml");
    assert_eq!(root.line(), Some(1));
    assert_eq!(root.get_elem(0).column(), Some(3));
    assert_eq!(root.get_elem(0).line(), Some(2));
    assert_eq!(format!("{:?}", root.get_elem(0)), "Cursor(config.yaml@1)");
}

#[test]
fn ptr_eq_compares_handles() {
    let seq = int_seq("s", &[1, 2]);
    assert!(seq.get_elem(0).ptr_eq(&seq.get_elem(0)));
    assert!(!seq.get_elem(0).ptr_eq(&seq.get_elem(1)));
    assert!(Cursor::invalid().ptr_eq(&Cursor::default()));

    let other = int_seq("s", &[1, 2]);
    assert!(!seq.ptr_eq(&other));
}

// -------------------- Diagnostics --------------------

#[derive(Clone, Default)]
struct LogBuffer(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

impl std::io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Runs `f` under a debug-level subscriber and returns what it logged.
fn captured_logs(f: impl FnOnce()) -> String {
    let buffer = LogBuffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    tracing::subscriber::with_default(subscriber, f);
    let bytes = buffer.0.lock().unwrap().clone();
    String::from_utf8(bytes).unwrap()
}

#[test]
fn kind_and_is_valid_report_unresolved_references() {
    let mut store = ValueStore::new("loop");
    store.push_local_reference(0, Pos::NONE);
    let root = Cursor::root(&Rc::new(store));

    let logs = captured_logs(|| {
        assert_eq!(root.kind(), None);
        assert!(!root.is_valid());
    });
    assert!(logs.contains("WARN"));
    assert!(logs.contains("unresolved reference"));
    assert!(logs.contains("kind"));
    assert!(logs.contains("is_valid"));
}

#[test]
fn kind_of_invalid_cursor_is_silent() {
    let logs = captured_logs(|| {
        assert_eq!(Cursor::invalid().kind(), None);
        assert!(!Cursor::invalid().is_valid());
    });
    assert!(logs.is_empty());
}
