//! Read-side handle over a store node or a merged view.
//!
//! A [`Cursor`] is cheap to clone: it holds an `Rc` to its store plus an
//! offset, or an `Rc` to a [`MergeCursor`]. Navigation never copies node
//! data; string and key accessors borrow straight from the store buffer.
//!
//! Every read resolves REFERENCE nodes first, so a cursor over a reference
//! behaves exactly like a cursor over the referenced node.
//!
//! Each fallible read comes in two forms: `try_*` returns the [`Error`], the
//! plain form returns an invalid cursor or the caller's default and reports
//! the error through `tracing`. Chains like
//! `root.get_elem("a").get_elem(3).get(0)` therefore never fail midway.

use std::fmt;
use std::rc::Rc;

use crate::convert::{FromNode, Number};
use crate::error::{report, Error, Result};
use crate::format::Tag;
use crate::merge::MergeCursor;
use crate::render::render;
use crate::store::{Alias, ValueStore};

/// Longest chain of references followed before giving up.
const MAX_ALIAS_HOPS: usize = 64;

/// Handle to a node in a [`ValueStore`] or to a merged view.
#[derive(Clone, Default)]
pub struct Cursor {
    repr: Repr,
}

#[derive(Clone, Default)]
enum Repr {
    #[default]
    Invalid,
    Node {
        store: Rc<ValueStore>,
        offset: usize,
    },
    Merge(Rc<MergeCursor>),
}

/// What a cursor points at once references are followed.
pub(crate) enum Target<'a> {
    Node(&'a Rc<ValueStore>, usize),
    Merge(&'a Rc<MergeCursor>),
}

impl Cursor {
    /// The cursor that points at nothing.
    #[must_use]
    pub fn invalid() -> Self {
        Self::default()
    }

    /// Cursor at offset 0, or invalid if the store is empty.
    #[must_use]
    pub fn root(store: &Rc<ValueStore>) -> Self {
        if store.is_empty() {
            return Self::invalid();
        }
        Self::new(store, 0)
    }

    /// Cursor at `offset`. The offset is not checked until the cursor is read.
    #[must_use]
    pub fn new(store: &Rc<ValueStore>, offset: usize) -> Self {
        Self {
            repr: Repr::Node {
                store: Rc::clone(store),
                offset,
            },
        }
    }

    /// The store this cursor reads, without following references. For a
    /// merged view this is the top member's store.
    #[must_use]
    pub fn store(&self) -> Option<&Rc<ValueStore>> {
        match &self.repr {
            Repr::Invalid => None,
            Repr::Node { store, .. } => Some(store),
            Repr::Merge(m) => m.top().and_then(Cursor::store),
        }
    }

    /// Raw offset ("raw index") of this cursor, without following references.
    #[must_use]
    pub fn offset(&self) -> Option<usize> {
        match &self.repr {
            Repr::Invalid => None,
            Repr::Node { offset, .. } => Some(*offset),
            Repr::Merge(m) => m.top().and_then(Cursor::offset),
        }
    }

    #[must_use]
    pub fn as_merge(&self) -> Option<&MergeCursor> {
        match &self.repr {
            Repr::Merge(m) => Some(m),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_merge(&self) -> bool {
        matches!(self.repr, Repr::Merge(_))
    }

    /// `true` when both cursors are the same handle: same store and offset,
    /// same merged view, or both invalid.
    #[must_use]
    pub fn ptr_eq(&self, other: &Cursor) -> bool {
        match (&self.repr, &other.repr) {
            (Repr::Invalid, Repr::Invalid) => true,
            (Repr::Node { store: a, offset: x }, Repr::Node { store: b, offset: y }) => {
                Rc::ptr_eq(a, b) && x == y
            }
            (Repr::Merge(a), Repr::Merge(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    // ---- Reference resolution ----

    pub(crate) fn target(&self) -> Result<Target<'_>> {
        match &self.repr {
            Repr::Invalid => Err(Error::InvalidCursor),
            Repr::Merge(m) => Ok(Target::Merge(m)),
            Repr::Node { store, offset } => follow_aliases(store, *offset),
        }
    }

    /// The cursor this one ends up reading once references are followed.
    pub fn try_resolve(&self) -> Result<Cursor> {
        Ok(match self.target()? {
            Target::Node(store, offset) => Cursor::new(store, offset),
            Target::Merge(m) => Cursor {
                repr: Repr::Merge(Rc::clone(m)),
            },
        })
    }

    #[must_use]
    pub fn resolve(&self) -> Cursor {
        self.try_resolve().unwrap_or_else(|e| {
            report("resolve", &e);
            Cursor::invalid()
        })
    }

    // ---- Kind ----

    pub fn try_kind(&self) -> Result<Tag> {
        match self.target()? {
            Target::Node(store, offset) => store.tag(offset),
            Target::Merge(m) => m.try_kind(),
        }
    }

    /// Kind of the node, `None` for an invalid cursor.
    ///
    /// Unresolved references and malformed nodes also give `None` and are
    /// reported through `tracing`.
    #[must_use]
    pub fn kind(&self) -> Option<Tag> {
        match self.try_kind() {
            Ok(kind) => Some(kind),
            Err(Error::InvalidCursor) => None,
            Err(e) => {
                report("kind", &e);
                None
            }
        }
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        let checked = match self.target() {
            Ok(Target::Node(store, offset)) => store.tag(offset).map(|_| ()),
            Ok(Target::Merge(m)) => return m.is_valid(),
            Err(e) => Err(e),
        };
        match checked {
            Ok(()) => true,
            Err(Error::InvalidCursor) => false,
            Err(e) => {
                report("is_valid", &e);
                false
            }
        }
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        self.kind() == Some(Tag::Null)
    }

    #[must_use]
    pub fn is_number(&self) -> bool {
        self.kind().is_some_and(Tag::is_number)
    }

    #[must_use]
    pub fn is_string(&self) -> bool {
        self.kind() == Some(Tag::String)
    }

    #[must_use]
    pub fn is_sequence(&self) -> bool {
        self.kind() == Some(Tag::SequenceStart)
    }

    #[must_use]
    pub fn is_map(&self) -> bool {
        self.kind() == Some(Tag::MapStart)
    }

    #[must_use]
    pub fn is_key_value_pair(&self) -> bool {
        self.kind() == Some(Tag::KeyValuePair)
    }

    /// `true` when the node is stored exactly as `T` would be.
    #[must_use]
    pub fn is<T: FromNode>(&self) -> bool {
        self.kind() == Some(T::TAG)
    }

    /// `true` when [`get::<T>`](Self::get) would convert instead of defaulting.
    #[must_use]
    pub fn is_convertible<T: FromNode>(&self) -> bool {
        self.kind().is_some_and(T::accepts)
    }

    // ---- Size ----

    /// Child count for containers, 1 for any other node.
    pub fn try_size(&self) -> Result<usize> {
        match self.target()? {
            Target::Node(store, offset) => match store.tag(offset)? {
                Tag::SequenceStart | Tag::MapStart => Ok(store.children(offset)?.len()),
                _ => Ok(1),
            },
            Target::Merge(m) => m.try_size(),
        }
    }

    /// Like [`try_size`](Self::try_size), 0 for an invalid cursor.
    #[must_use]
    pub fn size(&self) -> usize {
        self.try_size().unwrap_or_else(|e| {
            report("size", &e);
            0
        })
    }

    // ---- Values ----

    pub fn try_number(&self) -> Result<Number> {
        match self.target()? {
            Target::Node(store, offset) => store.number(offset),
            Target::Merge(m) => Err(Error::mismatch("number", m.try_kind()?)),
        }
    }

    #[must_use]
    pub fn number(&self) -> Option<Number> {
        self.try_number().ok()
    }

    /// Borrows a STRING node's text from the store buffer.
    pub fn try_as_str(&self) -> Result<&str> {
        match self.target()? {
            Target::Node(store, offset) => store.str_value(offset),
            Target::Merge(m) => Err(Error::mismatch("string", m.try_kind()?)),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        self.try_as_str().ok()
    }

    /// Reads the value converted to `T`.
    pub fn try_get<T: FromNode>(&self) -> Result<T> {
        let expected = std::any::type_name::<T>();
        match self.target()? {
            Target::Node(store, offset) => {
                let tag = store.tag(offset)?;
                if tag.is_number() {
                    Ok(T::from_number(store.number(offset)?))
                } else if tag == Tag::String {
                    T::from_text(store.str_value(offset)?).ok_or(Error::mismatch(expected, tag))
                } else {
                    Err(Error::mismatch(expected, tag))
                }
            }
            Target::Merge(m) => Err(Error::mismatch(expected, m.try_kind()?)),
        }
    }

    /// Reads the value converted to `T`, or `default` when it does not convert.
    pub fn get<T: FromNode>(&self, default: T) -> T {
        self.try_get().unwrap_or_else(|e| {
            report("get", &e);
            default
        })
    }

    /// Text form of a string or number, or `default`.
    #[must_use]
    pub fn get_str(&self, default: &str) -> String {
        self.get(default.to_owned())
    }

    // ---- Navigation ----

    /// Element by position (sequences) or value by key (maps).
    pub fn try_get_elem<I: ElemIndex>(&self, index: I) -> Result<Cursor> {
        index.elem_of(self)
    }

    /// Like [`try_get_elem`](Self::try_get_elem), invalid cursor when absent.
    #[must_use]
    pub fn get_elem<I: ElemIndex>(&self, index: I) -> Cursor {
        self.try_get_elem(index).unwrap_or_else(|e| {
            report("get_elem", &e);
            Cursor::invalid()
        })
    }

    fn try_elem_at(&self, index: usize) -> Result<Cursor> {
        match self.target()? {
            Target::Node(store, offset) => {
                store.expect(offset, Tag::SequenceStart, "sequence")?;
                let children = store.sequence_children(offset)?;
                children
                    .get(index)
                    .map(|&child| Cursor::new(store, child))
                    .ok_or(Error::IndexOutOfRange {
                        index,
                        len: children.len(),
                    })
            }
            Target::Merge(m) => m.try_elem_at(index),
        }
    }

    fn try_elem_by_key(&self, key: &str) -> Result<Cursor> {
        match self.target()? {
            Target::Node(store, offset) => {
                store.expect(offset, Tag::MapStart, "map")?;
                match store.find_pair(offset, key.as_bytes())? {
                    Some(pair) => Ok(Cursor::new(store, store.value_offset_of_pair(pair)?)),
                    None => Err(Error::KeyNotFound(key.to_owned())),
                }
            }
            Target::Merge(m) => m.try_elem_by_key(key),
        }
    }

    /// The `index`-th pair of a map, in insertion order.
    pub fn try_get_key_value_pair(&self, index: usize) -> Result<Cursor> {
        match self.target()? {
            Target::Node(store, offset) => {
                store.expect(offset, Tag::MapStart, "map")?;
                let children = store.map_children(offset)?;
                children
                    .get(index)
                    .map(|&pair| Cursor::new(store, pair))
                    .ok_or(Error::IndexOutOfRange {
                        index,
                        len: children.len(),
                    })
            }
            Target::Merge(m) => m.try_get_key_value_pair(index),
        }
    }

    #[must_use]
    pub fn get_key_value_pair(&self, index: usize) -> Cursor {
        self.try_get_key_value_pair(index).unwrap_or_else(|e| {
            report("get_key_value_pair", &e);
            Cursor::invalid()
        })
    }

    /// Key of a pair, or of the first pair of a non-empty map.
    pub fn try_get_key(&self) -> Result<&str> {
        match self.target()? {
            Target::Node(store, offset) => {
                let pair = match store.tag(offset)? {
                    Tag::KeyValuePair => offset,
                    Tag::MapStart => first_pair(store, offset)?,
                    other => return Err(Error::mismatch("key-value-pair or map", other)),
                };
                store.str_value(store.key_offset_of_pair(pair)?)
            }
            Target::Merge(m) => m.try_get_key(),
        }
    }

    #[must_use]
    pub fn get_key(&self) -> Option<&str> {
        self.try_get_key()
            .map_err(|e| report("get_key", &e))
            .ok()
    }

    /// Value of a pair, or of the first pair of a non-empty map.
    pub fn try_get_value(&self) -> Result<Cursor> {
        match self.target()? {
            Target::Node(store, offset) => {
                let pair = match store.tag(offset)? {
                    Tag::KeyValuePair => offset,
                    Tag::MapStart => first_pair(store, offset)?,
                    other => return Err(Error::mismatch("key-value-pair or map", other)),
                };
                Ok(Cursor::new(store, store.value_offset_of_pair(pair)?))
            }
            Target::Merge(m) => m.try_get_value(),
        }
    }

    #[must_use]
    pub fn get_value(&self) -> Cursor {
        self.try_get_value().unwrap_or_else(|e| {
            report("get_value", &e);
            Cursor::invalid()
        })
    }

    /// Key of the `index`-th pair.
    #[must_use]
    pub fn key_of_pair(&self, index: usize) -> Option<String> {
        self.get_key_value_pair(index).get_key().map(str::to_owned)
    }

    /// Value of the `index`-th pair.
    #[must_use]
    pub fn value_of_pair(&self, index: usize) -> Cursor {
        self.get_key_value_pair(index).get_value()
    }

    /// Linear scan of a map's pairs in insertion order.
    ///
    /// Agrees with the binary search behind `get_elem(key)`.
    pub fn try_find_key_value_pair(&self, key: &str) -> Result<Cursor> {
        match self.target()? {
            Target::Node(store, offset) => {
                store.expect(offset, Tag::MapStart, "map")?;
                for &pair in store.map_children(offset)?.iter() {
                    if store.str_bytes(store.key_offset_of_pair(pair)?)? == key.as_bytes() {
                        return Ok(Cursor::new(store, pair));
                    }
                }
                Err(Error::KeyNotFound(key.to_owned()))
            }
            Target::Merge(m) => m.try_find_key_value_pair(key),
        }
    }

    #[must_use]
    pub fn find_key_value_pair(&self, key: &str) -> Cursor {
        self.try_find_key_value_pair(key).unwrap_or_else(|e| {
            report("find_key_value_pair", &e);
            Cursor::invalid()
        })
    }

    /// Children of a sequence (elements) or a map (pairs); empty otherwise.
    #[must_use]
    pub fn iter(&self) -> Iter<'_> {
        let (pairs, len) = match self.kind() {
            Some(Tag::MapStart) => (true, self.size()),
            Some(Tag::SequenceStart) => (false, self.size()),
            _ => (false, 0),
        };
        Iter {
            cursor: self,
            pairs,
            index: 0,
            len,
        }
    }

    // ---- Diagnostics ----

    /// Name of the store the node lives in, or a synthesized label for a
    /// merged view. Empty for an invalid cursor.
    #[must_use]
    pub fn name(&self) -> String {
        match self.target() {
            Ok(Target::Node(store, _)) => store.name().to_owned(),
            Ok(Target::Merge(m)) => m.name(),
            Err(_) => String::new(),
        }
    }

    /// Recorded source column of the node.
    #[must_use]
    pub fn column(&self) -> Option<u32> {
        match self.target().ok()? {
            Target::Node(store, offset) => store.column(offset),
            Target::Merge(m) => m.column(),
        }
    }

    /// Recorded source line of the node.
    #[must_use]
    pub fn line(&self) -> Option<u32> {
        match self.target().ok()? {
            Target::Node(store, offset) => store.line(offset),
            Target::Merge(m) => m.line(),
        }
    }

    /// YAML-like dump starting at `indent` spaces, nesting by `indent_inc`.
    #[must_use]
    pub fn render(&self, indent: usize, indent_inc: usize) -> String {
        let mut out = String::new();
        render(self, &mut out, indent, indent_inc, false);
        out
    }
}

fn first_pair(store: &ValueStore, map: usize) -> Result<usize> {
    let children = store.map_children(map)?;
    children
        .first()
        .copied()
        .ok_or(Error::IndexOutOfRange { index: 0, len: 0 })
}

fn follow_aliases(store: &Rc<ValueStore>, offset: usize) -> Result<Target<'_>> {
    let (mut store, mut offset) = (store, offset);
    for _ in 0..MAX_ALIAS_HOPS {
        if store.tag(offset)? != Tag::Reference {
            return Ok(Target::Node(store, offset));
        }

        match store.alias(offset)? {
            Alias::Local(target) => offset = *target,
            Alias::External(cursor) => match &cursor.repr {
                Repr::Node {
                    store: next,
                    offset: at,
                } => {
                    store = next;
                    offset = *at;
                }
                Repr::Merge(m) if m.is_valid() => return Ok(Target::Merge(m)),
                _ => {
                    return Err(Error::UnresolvedReference {
                        store: store.name().to_owned(),
                        offset,
                    })
                }
            },
        }
    }

    Err(Error::UnresolvedReference {
        store: store.name().to_owned(),
        offset,
    })
}

impl From<MergeCursor> for Cursor {
    fn from(merge: MergeCursor) -> Self {
        Cursor {
            repr: Repr::Merge(Rc::new(merge)),
        }
    }
}

/// YAML-like dump; see [`Cursor::render`].
impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(0, 2))
    }
}

impl fmt::Debug for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.repr {
            Repr::Invalid => f.write_str("Cursor(invalid)"),
            Repr::Node { store, offset } => write!(f, "Cursor({}@{})", store.name(), offset),
            Repr::Merge(m) => write!(f, "Cursor({})", m.name()),
        }
    }
}

/// Iterator over a cursor's children; see [`Cursor::iter`].
pub struct Iter<'a> {
    cursor: &'a Cursor,
    pairs: bool,
    index: usize,
    len: usize,
}

impl Iterator for Iter<'_> {
    type Item = Cursor;

    fn next(&mut self) -> Option<Cursor> {
        if self.index >= self.len {
            return None;
        }
        let i = self.index;
        self.index += 1;
        Some(if self.pairs {
            self.cursor.get_key_value_pair(i)
        } else {
            self.cursor.get_elem(i)
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.len - self.index;
        (left, Some(left))
    }
}

impl ExactSizeIterator for Iter<'_> {}

impl<'a> IntoIterator for &'a Cursor {
    type Item = Cursor;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Iter<'a> {
        self.iter()
    }
}

mod private {
    pub trait Sealed {}
    impl Sealed for usize {}
    impl Sealed for str {}
    impl Sealed for String {}
    impl<T: ?Sized + Sealed> Sealed for &T {}
}

/// Something a cursor can be indexed by: a position or a key.
pub trait ElemIndex: private::Sealed {
    #[doc(hidden)]
    fn elem_of(&self, cursor: &Cursor) -> Result<Cursor>;
}

impl ElemIndex for usize {
    fn elem_of(&self, cursor: &Cursor) -> Result<Cursor> {
        cursor.try_elem_at(*self)
    }
}

impl ElemIndex for str {
    fn elem_of(&self, cursor: &Cursor) -> Result<Cursor> {
        cursor.try_elem_by_key(self)
    }
}

impl ElemIndex for String {
    fn elem_of(&self, cursor: &Cursor) -> Result<Cursor> {
        cursor.try_elem_by_key(self)
    }
}

impl<T: ?Sized + ElemIndex> ElemIndex for &T {
    fn elem_of(&self, cursor: &Cursor) -> Result<Cursor> {
        (**self).elem_of(cursor)
    }
}
