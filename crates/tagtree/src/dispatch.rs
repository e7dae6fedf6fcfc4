//! Key-driven loading of map entries into caller state.

use crate::cursor::Cursor;

type Handler<'a> = Box<dyn FnMut(&Cursor) + 'a>;

/// Ordered `(key, handler)` cases applied to each pair of a map.
///
/// ```rust
/// use std::rc::Rc;
/// use tagtree::{Cursor, MapDispatcher, Pos, ValueStore};
///
/// let mut store = ValueStore::new("server");
/// store.begin_map(Pos::NONE);
/// store.push_key("port", Pos::NONE).unwrap();
/// store.push_u16(8080, Pos::NONE);
/// store.end_map(Pos::NONE);
/// let root = Cursor::root(&Rc::new(store));
///
/// let mut port = 0u16;
/// let handled = MapDispatcher::new()
///     .with_case("port", |value| port = value.get(0))
///     .dispatch(&root);
/// assert_eq!(handled, 1);
/// assert_eq!(port, 8080);
/// ```
#[derive(Default)]
pub struct MapDispatcher<'a> {
    cases: Vec<(String, Handler<'a>)>,
}

impl<'a> MapDispatcher<'a> {
    #[must_use]
    pub fn new() -> Self {
        Self { cases: Vec::new() }
    }

    /// Appends a case. Earlier cases win when keys repeat.
    pub fn add_case<F>(&mut self, key: impl Into<String>, handler: F)
    where
        F: FnMut(&Cursor) + 'a,
    {
        self.cases.push((key.into(), Box::new(handler)));
    }

    #[must_use]
    pub fn with_case<F>(mut self, key: impl Into<String>, handler: F) -> Self
    where
        F: FnMut(&Cursor) + 'a,
    {
        self.add_case(key, handler);
        self
    }

    #[must_use]
    pub fn case_count(&self) -> usize {
        self.cases.len()
    }

    /// Calls the first matching handler with the value of every pair of the
    /// map under `cursor`. Returns how many pairs were handled; non-map
    /// cursors handle none.
    pub fn dispatch(&mut self, cursor: &Cursor) -> usize {
        if !cursor.is_map() {
            return 0;
        }

        let mut handled = 0;
        for pair in cursor.iter() {
            let Some(key) = pair.get_key() else {
                continue;
            };
            if let Some((_, handler)) = self.cases.iter_mut().find(|(k, _)| k.as_str() == key) {
                handler(&pair.get_value());
                handled += 1;
            } else {
                tracing::trace!(key, "no case for map key");
            }
        }
        handled
    }
}
