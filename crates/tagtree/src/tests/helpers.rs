use std::rc::Rc;

use crate::*;

/// Root cursor over a map of i32 values, keys in the given order.
pub fn int_map(name: &str, entries: &[(&str, i32)]) -> Cursor {
    let mut store = ValueStore::new(name);
    store.begin_map(Pos::NONE);
    for (key, value) in entries {
        store.push_key(key, Pos::NONE).unwrap();
        store.push_i32(*value, Pos::NONE);
    }
    store.end_map(Pos::NONE);
    Cursor::root(&Rc::new(store))
}

/// Root cursor over a sequence of i32 values.
pub fn int_seq(name: &str, items: &[i32]) -> Cursor {
    let mut store = ValueStore::new(name);
    store.begin_sequence(Pos::NONE);
    for item in items {
        store.push_i32(*item, Pos::NONE);
    }
    store.end_sequence(Pos::NONE);
    Cursor::root(&Rc::new(store))
}

/// Root cursor over a JSON document.
pub fn json(name: &str, text: &str) -> Cursor {
    Cursor::root(&Rc::new(ValueStore::from_json(name, text).unwrap()))
}

/// Elements of a sequence cursor read as i32.
pub fn ints(cursor: &Cursor) -> Vec<i32> {
    cursor.iter().map(|c| c.get(i32::MIN)).collect()
}

/// Keys of a map cursor in iteration order.
pub fn keys(cursor: &Cursor) -> Vec<String> {
    cursor
        .iter()
        .map(|pair| pair.get_key().unwrap_or_default().to_owned())
        .collect()
}
