use std::cell::RefCell;

use super::helpers::{int_map, int_seq, json};
use crate::*;

#[test]
fn handlers_receive_values() {
    let root = json("server", r#"{"host": "localhost", "port": 8080, "debug": 1}"#);
    let mut host = String::new();
    let mut port = 0u16;

    let mut dispatcher = MapDispatcher::new()
        .with_case("host", |v| host = v.get_str(""))
        .with_case("port", |v| port = v.get(0u16));
    assert_eq!(dispatcher.case_count(), 2);
    assert_eq!(dispatcher.dispatch(&root), 2);
    drop(dispatcher);

    assert_eq!(host, "localhost");
    assert_eq!(port, 8080);
}

#[test]
fn first_matching_case_wins() {
    let root = int_map("m", &[("k", 1)]);
    let calls = RefCell::new(Vec::new());

    let mut dispatcher = MapDispatcher::new();
    dispatcher.add_case("k", |v| calls.borrow_mut().push(("first", v.get(0i32))));
    dispatcher.add_case("k", |v| calls.borrow_mut().push(("second", v.get(0i32))));
    assert_eq!(dispatcher.dispatch(&root), 1);
    drop(dispatcher);

    assert_eq!(calls.into_inner(), vec![("first", 1)]);
}

#[test]
fn non_map_dispatches_nothing() {
    let mut hits = 0;
    let mut dispatcher = MapDispatcher::new().with_case("0", |_| hits += 1);
    assert_eq!(dispatcher.dispatch(&int_seq("s", &[1, 2])), 0);
    assert_eq!(dispatcher.dispatch(&Cursor::invalid()), 0);
    drop(dispatcher);
    assert_eq!(hits, 0);
}

#[test]
fn dispatch_over_merged_view() {
    let merged = MergeCursor::from_stack(
        vec![
            int_map("base", &[("a", 1), ("b", 2)]),
            int_map("overlay", &[("b", 99)]),
        ],
        MergeOptions::default(),
    )
    .into_cursor();

    let seen = RefCell::new(Vec::new());
    let mut dispatcher = MapDispatcher::new()
        .with_case("a", |v| seen.borrow_mut().push(v.get(0i32)))
        .with_case("b", |v| seen.borrow_mut().push(v.get(0i32)));
    assert_eq!(dispatcher.dispatch(&merged), 2);
    drop(dispatcher);

    assert_eq!(seen.into_inner(), vec![99, 1]);
}
