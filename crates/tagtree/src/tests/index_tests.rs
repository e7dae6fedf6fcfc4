use std::rc::Rc;

use proptest::prelude::*;

use crate::*;

fn unsorted_map() -> Rc<ValueStore> {
    let mut store = ValueStore::new("m");
    store.begin_map(Pos::NONE);
    for (i, key) in ["zeta", "alpha", "mid", "beta"].iter().enumerate() {
        store.push_key(key, Pos::NONE).unwrap();
        store.push_i32(i as i32, Pos::NONE);
    }
    store.end_map(Pos::NONE);
    Rc::new(store)
}

#[test]
fn sequence_children_are_memoized() {
    let mut store = ValueStore::new("s");
    store.begin_sequence(Pos::NONE);
    store.push_u8(1, Pos::NONE);
    store.push_string("ab", Pos::NONE).unwrap();
    store.push_null(Pos::NONE);
    store.end_sequence(Pos::NONE);

    let first = store.sequence_children(0).unwrap();
    assert_eq!(&*first, &[1, 3, 9]);

    let second = store.sequence_children(0).unwrap();
    assert!(Rc::ptr_eq(&first, &second));
}

#[test]
fn map_children_keep_insertion_order() {
    let store = unsorted_map();
    let pairs = store.map_children(0).unwrap();
    let keys: Vec<&str> = pairs
        .iter()
        .map(|&p| store.str_value(store.key_offset_of_pair(p).unwrap()).unwrap())
        .collect();
    assert_eq!(keys, vec!["zeta", "alpha", "mid", "beta"]);
}

#[test]
fn sorted_map_children_order_by_key_bytes() {
    let store = unsorted_map();
    let sorted = store.sorted_map_children(0).unwrap();
    let keys: Vec<&str> = sorted
        .iter()
        .map(|&p| store.str_value(store.key_offset_of_pair(p).unwrap()).unwrap())
        .collect();
    assert_eq!(keys, vec!["alpha", "beta", "mid", "zeta"]);
}

#[test]
fn find_pair_hits_and_misses() {
    let store = unsorted_map();
    for key in ["zeta", "alpha", "mid", "beta"] {
        let pair = store.find_pair(0, key.as_bytes()).unwrap().unwrap();
        let found = store.str_value(store.key_offset_of_pair(pair).unwrap()).unwrap();
        assert_eq!(found, key);
    }
    assert_eq!(store.find_pair(0, b"gamma").unwrap(), None);
    assert_eq!(store.find_pair(0, b"").unwrap(), None);
}

#[test]
fn children_of_scalar_is_a_mismatch() {
    let mut store = ValueStore::new("s");
    store.push_i32(1, Pos::NONE);
    assert!(matches!(
        store.children(0),
        Err(Error::KindMismatch { .. })
    ));
}

#[test]
fn map_with_non_pair_entry_is_malformed() {
    let store = ValueStore::from_bytes("bad", vec![14, 0, 15]);
    assert!(matches!(
        store.map_children(0),
        Err(Error::MalformedNode { offset: 1, .. })
    ));
}

#[test]
fn walk_visits_every_node() {
    let store = unsorted_map();
    let mut tags = Vec::new();
    store
        .walk(0, &mut |_, tag| {
            tags.push(tag);
            Ok(())
        })
        .unwrap();

    // map + 4 * (pair + key + value)
    assert_eq!(tags.len(), 13);
    assert_eq!(tags[0], Tag::MapStart);
    assert_eq!(tags.iter().filter(|t| **t == Tag::KeyValuePair).count(), 4);
}

#[test]
fn debug_reports_indexed_containers() {
    let store = unsorted_map();
    store.map_children(0).unwrap();
    let dbg = format!("{:?}", store);
    assert!(dbg.contains("indexed_containers: 1"));
}

proptest! {
    #[test]
    fn binary_search_agrees_with_linear_scan(keys in prop::collection::hash_set("[a-z]{0,6}", 0..40)) {
        let keys: Vec<String> = keys.into_iter().collect();
        let mut store = ValueStore::new("p");
        store.begin_map(Pos::NONE);
        for (i, key) in keys.iter().enumerate() {
            store.push_key(key, Pos::NONE).unwrap();
            store.push_i32(i as i32, Pos::NONE);
        }
        store.end_map(Pos::NONE);
        let root = Cursor::root(&Rc::new(store));

        prop_assert_eq!(root.size(), keys.len());
        for (i, key) in keys.iter().enumerate() {
            let by_search = root.get_elem(key.as_str());
            let by_scan = root.find_key_value_pair(key).get_value();
            prop_assert_eq!(by_search.offset(), by_scan.offset());
            prop_assert_eq!(by_search.get(-1i32), i as i32);
        }

        prop_assert!(!root.get_elem("not-a-key").is_valid());
    }
}
