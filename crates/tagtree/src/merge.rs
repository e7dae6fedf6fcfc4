//! Read-time overlay of several cursors.
//!
//! A [`MergeCursor`] holds a precedence stack (index 0 lowest, last highest)
//! of cursors that all share one mergeable kind. Sequences concatenate in
//! stack order; maps are unioned with the highest-precedence member winning
//! each key. Nested containers merge only down to `merge_level`; below that
//! the highest-precedence value is taken as-is.
//!
//! The merged pair list, the logical size and the diagnostic name are
//! computed on first read and dropped whenever the stack changes.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

use crate::cursor::Cursor;
use crate::error::{Error, Result};
use crate::format::Tag;

/// Merge policy shared by a merge cursor and the cursors it spawns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeOptions {
    /// Container levels merged before falling back to the top value. 0 acts as 1.
    pub merge_level: u16,
    pub merge_sequences: bool,
    pub merge_maps: bool,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            merge_level: 1,
            merge_sequences: true,
            merge_maps: true,
        }
    }
}

impl MergeOptions {
    #[must_use]
    pub fn with_level(self, merge_level: u16) -> Self {
        Self {
            merge_level,
            ..self
        }
    }

    fn level(&self) -> u16 {
        self.merge_level.max(1)
    }

    fn descend(self) -> Self {
        self.with_level(self.level() - 1)
    }
}

/// Overlay view over a stack of sequence, map or key-value-pair cursors.
///
/// Wrap it with [`Cursor::from`] (or [`into_cursor`](Self::into_cursor)) to
/// read it through the ordinary cursor API.
///
/// ```rust
/// use std::rc::Rc;
/// use tagtree::{Cursor, MergeCursor, MergeOptions, Pos, ValueStore};
///
/// fn map(entries: &[(&str, i32)]) -> Cursor {
///     let mut store = ValueStore::new("layer");
///     store.begin_map(Pos::NONE);
///     for (key, value) in entries {
///         store.push_key(key, Pos::NONE).unwrap();
///         store.push_i32(*value, Pos::NONE);
///     }
///     store.end_map(Pos::NONE);
///     Cursor::root(&Rc::new(store))
/// }
///
/// let merged = MergeCursor::from_stack(
///     [map(&[("a", 1), ("b", 2)]), map(&[("b", 99), ("c", 3)])],
///     MergeOptions::default(),
/// )
/// .into_cursor();
/// assert_eq!(merged.size(), 3);
/// assert_eq!(merged.get_elem("b").get(0), 99);
/// ```
pub struct MergeCursor {
    stack: Vec<Cursor>,
    kind: Option<Tag>,
    options: MergeOptions,
    size: Cell<Option<usize>>,
    pairs: RefCell<Option<Rc<[Cursor]>>>,
    name: RefCell<Option<String>>,
}

impl MergeCursor {
    /// An empty stack. Its kind is fixed by the first pushed cursor.
    #[must_use]
    pub fn new(options: MergeOptions) -> Self {
        Self {
            stack: Vec::new(),
            kind: None,
            options,
            size: Cell::new(None),
            pairs: RefCell::new(None),
            name: RefCell::new(None),
        }
    }

    /// Builds a stack from cursors listed lowest precedence first.
    ///
    /// The merge kind is the kind of the last cursor with a mergeable kind;
    /// cursors of any other kind are dropped.
    pub fn from_stack<I>(cursors: I, options: MergeOptions) -> Self
    where
        I: IntoIterator<Item = Cursor>,
    {
        let cursors: Vec<Cursor> = cursors.into_iter().collect();
        let kind = cursors
            .iter()
            .rev()
            .filter_map(Cursor::kind)
            .find(|k| k.is_mergeable());

        let mut merge = Self::new(options);
        merge.kind = kind;
        merge.stack = cursors
            .into_iter()
            .filter(|c| kind.is_some() && c.kind() == kind)
            .collect();
        merge
    }

    /// Pushes `cursor` as the new highest-precedence member.
    ///
    /// Returns `false` and leaves the stack unchanged when the cursor's kind
    /// differs from the stack's, or when it is not mergeable.
    pub fn push_cursor(&mut self, cursor: Cursor) -> bool {
        let Some(kind) = cursor.kind() else {
            return false;
        };
        if !kind.is_mergeable() || self.kind.is_some_and(|k| k != kind) {
            tracing::debug!(%kind, stack = ?self.kind, "merge cursor rejected push");
            return false;
        }

        self.kind = Some(kind);
        self.stack.push(cursor);
        self.invalidate();
        true
    }

    /// Removes and returns the highest-precedence member.
    pub fn pop_cursor(&mut self) -> Option<Cursor> {
        let top = self.stack.pop()?;
        if self.stack.is_empty() {
            self.kind = None;
        }
        self.invalidate();
        Some(top)
    }

    fn invalidate(&self) {
        self.size.set(None);
        self.pairs.replace(None);
        self.name.replace(None);
    }

    /// Members, lowest precedence first.
    #[must_use]
    pub fn stack(&self) -> &[Cursor] {
        &self.stack
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.stack.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    #[must_use]
    pub fn options(&self) -> MergeOptions {
        self.options
    }

    /// Highest-precedence member.
    #[must_use]
    pub fn top(&self) -> Option<&Cursor> {
        self.stack.last()
    }

    #[must_use]
    pub fn into_cursor(self) -> Cursor {
        Cursor::from(self)
    }

    fn try_top(&self) -> Result<&Cursor> {
        self.stack.last().ok_or(Error::InvalidCursor)
    }

    // ---- Cursor contract ----

    pub(crate) fn is_valid(&self) -> bool {
        self.kind.is_some() && self.top().is_some_and(Cursor::is_valid)
    }

    pub(crate) fn try_kind(&self) -> Result<Tag> {
        match self.kind {
            Some(kind) if !self.stack.is_empty() => Ok(kind),
            _ => Err(Error::InvalidCursor),
        }
    }

    pub(crate) fn try_size(&self) -> Result<usize> {
        if let Some(size) = self.size.get() {
            return Ok(size);
        }

        let size = match self.try_kind()? {
            Tag::SequenceStart if self.options.merge_sequences => self
                .stack
                .iter()
                .map(Cursor::try_size)
                .sum::<Result<usize>>()?,
            Tag::MapStart if self.options.merge_maps => self.pairs()?.len(),
            Tag::KeyValuePair => 1,
            _ => self.try_top()?.try_size()?,
        };
        self.size.set(Some(size));
        Ok(size)
    }

    pub(crate) fn try_elem_at(&self, index: usize) -> Result<Cursor> {
        let kind = self.try_kind()?;
        if kind != Tag::SequenceStart {
            return Err(Error::mismatch("sequence", kind));
        }
        if !self.options.merge_sequences {
            return self.try_top()?.try_get_elem(index);
        }

        let mut local = index;
        for member in &self.stack {
            let len = member.try_size()?;
            if local < len {
                let elem = member.try_get_elem(local)?;
                return Ok(self.nest_elem(elem));
            }
            local -= len;
        }

        Err(Error::IndexOutOfRange {
            index,
            len: self.try_size()?,
        })
    }

    fn nest_elem(&self, elem: Cursor) -> Cursor {
        let mergeable = elem.kind().is_some_and(Tag::is_mergeable);
        if self.options.level() <= 1 || !mergeable {
            return elem;
        }
        MergeCursor::from_stack([elem], self.options.descend()).into_cursor()
    }

    pub(crate) fn try_elem_by_key(&self, key: &str) -> Result<Cursor> {
        let kind = self.try_kind()?;
        if kind != Tag::MapStart {
            return Err(Error::mismatch("map", kind));
        }
        if !self.options.merge_maps {
            return self.try_top()?.try_get_elem(key);
        }
        self.try_find_key_value_pair(key)?.try_get_value()
    }

    pub(crate) fn try_get_key_value_pair(&self, index: usize) -> Result<Cursor> {
        let kind = self.try_kind()?;
        if kind != Tag::MapStart {
            return Err(Error::mismatch("map", kind));
        }
        if !self.options.merge_maps {
            return self.try_top()?.try_get_key_value_pair(index);
        }

        let pairs = self.pairs()?;
        pairs.get(index).cloned().ok_or(Error::IndexOutOfRange {
            index,
            len: pairs.len(),
        })
    }

    pub(crate) fn try_find_key_value_pair(&self, key: &str) -> Result<Cursor> {
        let kind = self.try_kind()?;
        if kind != Tag::MapStart {
            return Err(Error::mismatch("map", kind));
        }
        if !self.options.merge_maps {
            return self.try_top()?.try_find_key_value_pair(key);
        }

        for pair in self.pairs()?.iter() {
            if pair.try_get_key()? == key {
                return Ok(pair.clone());
            }
        }
        Err(Error::KeyNotFound(key.to_owned()))
    }

    pub(crate) fn try_get_key(&self) -> Result<&str> {
        self.try_top()?.try_get_key()
    }

    pub(crate) fn try_get_value(&self) -> Result<Cursor> {
        let top_value = self.try_top()?.try_get_value()?;
        let kind = top_value.try_kind()?;
        let mergeable = matches!(kind, Tag::SequenceStart | Tag::MapStart);
        if !mergeable || !self.options.merge_maps || self.options.level() <= 1 {
            return Ok(top_value);
        }

        let values = self
            .stack
            .iter()
            .filter_map(|member| member.try_get_value().ok())
            .filter(|value| value.kind() == Some(kind));
        Ok(MergeCursor::from_stack(values, self.options.descend()).into_cursor())
    }

    /// Merged pair list, highest-precedence member's pairs first.
    fn pairs(&self) -> Result<Rc<[Cursor]>> {
        if let Some(pairs) = self.pairs.borrow().as_ref() {
            return Ok(Rc::clone(pairs));
        }

        let mut seen = HashSet::new();
        let mut merged = Vec::new();
        for member in self.stack.iter().rev() {
            for i in 0..member.try_size()? {
                let pair = member.try_get_key_value_pair(i)?;
                let key = pair.try_get_key()?.to_owned();
                if seen.contains(&key) {
                    continue;
                }

                let value_kind = pair.try_get_value().and_then(|v| v.try_kind()).ok();
                let nested = matches!(value_kind, Some(Tag::SequenceStart | Tag::MapStart));
                if self.options.level() <= 1 || !nested {
                    merged.push(pair);
                } else {
                    let mergees = self
                        .stack
                        .iter()
                        .filter_map(|m| m.try_find_key_value_pair(&key).ok());
                    merged.push(MergeCursor::from_stack(mergees, self.options).into_cursor());
                }
                seen.insert(key);
            }
        }

        let pairs: Rc<[Cursor]> = merged.into();
        self.pairs.replace(Some(Rc::clone(&pairs)));
        Ok(pairs)
    }

    /// `<MergerCursor ['top',...,'bottom']>`.
    #[must_use]
    pub fn name(&self) -> String {
        if let Some(name) = self.name.borrow().as_ref() {
            return name.clone();
        }

        let names: Vec<String> = self
            .stack
            .iter()
            .rev()
            .map(|c| format!("'{}'", c.name()))
            .collect();
        let name = format!("<MergerCursor [{}]>", names.join(","));
        self.name.replace(Some(name.clone()));
        name
    }

    pub(crate) fn column(&self) -> Option<u32> {
        self.top()?.column()
    }

    pub(crate) fn line(&self) -> Option<u32> {
        self.top()?.line()
    }
}

impl fmt::Debug for MergeCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MergeCursor")
            .field("kind", &self.kind)
            .field("stack", &self.stack)
            .field("options", &self.options)
            .finish()
    }
}
