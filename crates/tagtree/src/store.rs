use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::Rc;

use crate::cursor::{Cursor, Target};
use crate::error::{Error, Result};
use crate::format::{
    check_nesting, field, read_tag, read_u16, read_u32, Tag, ALIAS_INDEX_BYTES, MAX_STRING_BYTES,
    STR_LEN_BYTES, TAG_BYTES,
};
use crate::index::IndexCache;

/// Source position attached to an encoded node.
///
/// Zero means "unknown" for either field and is not recorded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pos {
    pub column: u32,
    pub line: u32,
}

impl Pos {
    /// No provenance.
    pub const NONE: Pos = Pos { column: 0, line: 0 };

    #[must_use]
    pub fn new(column: u32, line: u32) -> Self {
        Self { column, line }
    }
}

impl From<(u32, u32)> for Pos {
    fn from((column, line): (u32, u32)) -> Self {
        Pos::new(column, line)
    }
}

/// Target of a REFERENCE node.
#[derive(Debug, Clone)]
pub enum Alias {
    /// A node in the same store.
    Local(usize),
    /// A node reached through a cursor, usually into another store.
    External(Cursor),
}

/// Append-only buffer of tagged nodes plus its side tables.
///
/// A store is built through the `push_*` / `begin_*` / `end_*` methods and
/// then shared behind an [`Rc`] for reading. Once shared it can no longer be
/// mutated, which is what keeps the structural index cache valid.
///
/// Every encode method returns the offset of the node it wrote; that offset
/// is the node's identity for cursors and for the side tables.
///
/// # Example
///
/// ```rust
/// use std::rc::Rc;
/// use tagtree::{Cursor, Pos, ValueStore};
///
/// let mut store = ValueStore::new("doc");
/// store.begin_map(Pos::NONE);
/// store.push_key("port", Pos::NONE).unwrap();
/// store.push_u16(8080, Pos::NONE);
/// store.end_map(Pos::NONE);
///
/// let root = Cursor::root(&Rc::new(store));
/// assert_eq!(root.get_elem("port").get(0u16), 8080);
/// ```
pub struct ValueStore {
    name: String,
    data: Vec<u8>,
    columns: HashMap<usize, u32>,
    lines: HashMap<usize, u32>,
    aliases: Vec<Alias>,
    last_pushed: Option<usize>,
    pub(crate) index: IndexCache,
}

macro_rules! push_number {
    ($(#[$doc:meta])* $fn_name:ident, $ty:ty, $tag:expr) => {
        $(#[$doc])*
        pub fn $fn_name(&mut self, value: $ty, pos: impl Into<Pos>) -> usize {
            let offset = self.begin_node($tag, pos.into());
            self.data.extend_from_slice(&value.to_le_bytes());
            offset
        }
    };
}

impl ValueStore {
    /// Creates an empty store. `name` is used in diagnostics only.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: Vec::new(),
            columns: HashMap::new(),
            lines: HashMap::new(),
            aliases: Vec::new(),
            last_pushed: None,
            index: IndexCache::default(),
        }
    }

    /// Wraps raw node bytes without validating them. See [`verify`](Self::verify).
    pub fn from_bytes(name: impl Into<String>, data: Vec<u8>) -> Self {
        let mut store = Self::new(name);
        store.data = data;
        store
    }

    /// Copies the subtree under `cursor` into a new store.
    ///
    /// A cursor over a plain node is sliced byte for byte: positions inside
    /// the slice are rebased and every REFERENCE inside it gets its own alias
    /// entry, so the copy never carries dangling alias indices. A cursor over
    /// a merged view is flattened with [`materialize`](Self::materialize).
    pub fn from_cursor(name: impl Into<String>, cursor: &Cursor) -> Result<Self> {
        match cursor.target()? {
            Target::Node(store, offset) => Self::slice(store, name.into(), offset),
            Target::Merge(_) => Self::materialize(name, cursor),
        }
    }

    /// Re-encodes whatever `cursor` shows into a new store.
    pub fn materialize(name: impl Into<String>, cursor: &Cursor) -> Result<Self> {
        let mut store = Self::new(name);
        store.push_view(cursor)?;
        Ok(store)
    }

    fn slice(source: &Rc<ValueStore>, name: String, offset: usize) -> Result<Self> {
        let size = source.data_size(offset)?;
        let range = offset..offset + size;

        let mut out = Self::new(name);
        out.data = field(&source.data, offset, size)?.to_vec();
        out.columns = rebase(&source.columns, &range);
        out.lines = rebase(&source.lines, &range);

        let mut references = Vec::new();
        source.walk(offset, &mut |at, tag| {
            if tag == Tag::Reference {
                references.push(at);
            }
            Ok(())
        })?;

        for at in references {
            let alias = match source.alias(at)? {
                Alias::Local(target) if range.contains(target) => Alias::Local(target - offset),
                Alias::Local(target) => Alias::External(Cursor::new(source, *target)),
                Alias::External(cursor) => Alias::External(cursor.clone()),
            };
            let index = out.aliases.len() as u32;
            out.aliases.push(alias);

            let index_at = at - offset + TAG_BYTES;
            out.data[index_at..index_at + ALIAS_INDEX_BYTES].copy_from_slice(&index.to_le_bytes());
        }

        Ok(out)
    }

    /// Appends the view under `cursor`, resolving references and merges.
    pub fn push_view(&mut self, cursor: &Cursor) -> Result<usize> {
        let kind = cursor.try_kind()?;
        let pos = Pos::new(cursor.column().unwrap_or(0), cursor.line().unwrap_or(0));

        match kind {
            Tag::Null => Ok(self.push_null(pos)),
            Tag::String => self.push_string(cursor.try_as_str()?, pos),
            Tag::SequenceStart => {
                let start = self.begin_sequence(pos);
                for i in 0..cursor.try_size()? {
                    self.push_view(&cursor.try_get_elem(i)?)?;
                }
                self.end_sequence(Pos::NONE);
                Ok(start)
            }
            Tag::MapStart => {
                let start = self.begin_map(pos);
                for i in 0..cursor.try_size()? {
                    self.push_view(&cursor.try_get_key_value_pair(i)?)?;
                }
                self.end_map(Pos::NONE);
                Ok(start)
            }
            Tag::KeyValuePair => {
                let start = self.push_key(cursor.try_get_key()?, pos)?;
                self.push_view(&cursor.try_get_value()?)?;
                Ok(start)
            }
            number if number.is_number() => Ok(self.push_number(cursor.try_number()?, pos)),
            other => Err(Error::malformed(
                cursor.offset().unwrap_or(0),
                format!("cannot copy a stray {} tag", other),
            )),
        }
    }

    // ---- Accessors ----

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// The encoded node bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Offset of the most recently encoded node.
    #[must_use]
    pub fn last_pushed(&self) -> Option<usize> {
        self.last_pushed
    }

    /// Number of entries in the alias table.
    #[must_use]
    pub fn alias_count(&self) -> usize {
        self.aliases.len()
    }

    #[must_use]
    pub fn column(&self, offset: usize) -> Option<u32> {
        self.columns.get(&offset).copied()
    }

    #[must_use]
    pub fn line(&self, offset: usize) -> Option<u32> {
        self.lines.get(&offset).copied()
    }

    /// Highest recorded source line, 0 when no lines were recorded.
    #[must_use]
    pub fn max_line(&self) -> u32 {
        self.lines.values().copied().max().unwrap_or(0)
    }

    /// Every recorded position, keyed by offset. Missing fields are 0.
    #[must_use]
    pub fn positions(&self) -> BTreeMap<usize, Pos> {
        let mut out: BTreeMap<usize, Pos> = BTreeMap::new();
        for (&offset, &column) in &self.columns {
            out.entry(offset).or_default().column = column;
        }
        for (&offset, &line) in &self.lines {
            out.entry(offset).or_default().line = line;
        }
        out
    }

    pub(crate) fn set_pos(&mut self, offset: usize, pos: Pos) {
        if pos.column > 0 {
            self.columns.insert(offset, pos.column);
        }
        if pos.line > 0 {
            self.lines.insert(offset, pos.line);
        }
    }

    // ---- Encode ----

    fn begin_node(&mut self, tag: Tag, pos: Pos) -> usize {
        let offset = self.data.len();
        self.data.push(tag.as_byte());
        self.set_pos(offset, pos);
        self.last_pushed = Some(offset);
        offset
    }

    pub fn push_null(&mut self, pos: impl Into<Pos>) -> usize {
        self.begin_node(Tag::Null, pos.into())
    }

    push_number!(push_i8, i8, Tag::Sint1);
    push_number!(push_u8, u8, Tag::Uint1);
    push_number!(push_i16, i16, Tag::Sint2);
    push_number!(push_u16, u16, Tag::Uint2);
    push_number!(push_i32, i32, Tag::Sint4);
    push_number!(push_u32, u32, Tag::Uint4);
    push_number!(push_i64, i64, Tag::Sint8);
    push_number!(push_u64, u64, Tag::Uint8);
    push_number!(push_f32, f32, Tag::Real4);
    push_number!(push_f64, f64, Tag::Real8);

    /// Booleans are stored as UINT_1B 0/1.
    pub fn push_bool(&mut self, value: bool, pos: impl Into<Pos>) -> usize {
        self.push_u8(u8::from(value), pos)
    }

    /// Appends a STRING node. The stored length counts a trailing 0 byte.
    ///
    /// # Errors
    ///
    /// [`Error::StringTooLong`] when the terminated length does not fit the
    /// 2-byte header. Nothing is written in that case.
    pub fn push_string(&mut self, value: &str, pos: impl Into<Pos>) -> Result<usize> {
        let count = value.len() + 1;
        if count > MAX_STRING_BYTES {
            return Err(Error::StringTooLong { len: count });
        }

        let offset = self.begin_node(Tag::String, pos.into());
        self.data.extend_from_slice(&(count as u16).to_le_bytes());
        self.data.extend_from_slice(value.as_bytes());
        self.data.push(0);
        Ok(offset)
    }

    /// Appends a REFERENCE to whatever `target` points at.
    pub fn push_reference(&mut self, target: &Cursor, pos: impl Into<Pos>) -> usize {
        self.push_alias(Alias::External(target.clone()), pos.into())
    }

    /// Appends a REFERENCE to the node at `target` in this store.
    pub fn push_local_reference(&mut self, target: usize, pos: impl Into<Pos>) -> usize {
        self.push_alias(Alias::Local(target), pos.into())
    }

    fn push_alias(&mut self, alias: Alias, pos: Pos) -> usize {
        let index = self.aliases.len() as u32;
        self.aliases.push(alias);

        let offset = self.begin_node(Tag::Reference, pos);
        self.data.extend_from_slice(&index.to_le_bytes());
        offset
    }

    pub fn begin_sequence(&mut self, pos: impl Into<Pos>) -> usize {
        self.begin_node(Tag::SequenceStart, pos.into())
    }

    pub fn end_sequence(&mut self, pos: impl Into<Pos>) -> usize {
        self.begin_node(Tag::SequenceEnd, pos.into())
    }

    pub fn begin_map(&mut self, pos: impl Into<Pos>) -> usize {
        self.begin_node(Tag::MapStart, pos.into())
    }

    pub fn end_map(&mut self, pos: impl Into<Pos>) -> usize {
        self.begin_node(Tag::MapEnd, pos.into())
    }

    /// Appends a bare KEY_VALUE_PAIR tag; the key string and value follow.
    pub fn push_key_value_pair(&mut self, pos: impl Into<Pos>) -> usize {
        self.begin_node(Tag::KeyValuePair, pos.into())
    }

    /// Appends a KEY_VALUE_PAIR tag and its key. The value is pushed next.
    ///
    /// Returns the offset of the pair, not of the key.
    pub fn push_key(&mut self, key: &str, pos: impl Into<Pos>) -> Result<usize> {
        let pos = pos.into();
        if key.len() + 1 > MAX_STRING_BYTES {
            return Err(Error::StringTooLong { len: key.len() + 1 });
        }
        let pair = self.push_key_value_pair(pos);
        self.push_string(key, pos)?;
        Ok(pair)
    }

    // ---- Decode ----

    pub fn tag(&self, offset: usize) -> Result<Tag> {
        read_tag(&self.data, offset)
    }

    #[must_use]
    pub fn is_reference(&self, offset: usize) -> bool {
        matches!(self.tag(offset), Ok(Tag::Reference))
    }

    /// Byte length of the node at `offset`, computed from its tag and,
    /// for containers and pairs, recursively from its children.
    ///
    /// Nodes nested more than [`MAX_NESTING`](crate::MAX_NESTING) levels
    /// below `offset` are reported as `MalformedNode`.
    pub fn data_size(&self, offset: usize) -> Result<usize> {
        self.data_size_at(offset, 0)
    }

    pub(crate) fn data_size_at(&self, offset: usize, depth: usize) -> Result<usize> {
        check_nesting(offset, depth)?;
        let tag = self.tag(offset)?;
        match tag {
            Tag::String => Ok(TAG_BYTES + STR_LEN_BYTES + self.str_raw(offset)?.len()),
            Tag::SequenceStart | Tag::MapStart => {
                let children = self.children_at(offset, depth)?;
                let end = match children.last() {
                    Some(&last) => last + self.data_size_at(last, depth + 1)?,
                    None => offset + TAG_BYTES,
                };
                Ok(end + TAG_BYTES - offset)
            }
            Tag::KeyValuePair => {
                let key = self.key_offset_of_pair(offset)?;
                let key_size = self.data_size_at(key, depth + 1)?;
                let value_size = self.data_size_at(key + key_size, depth + 1)?;
                Ok(TAG_BYTES + key_size + value_size)
            }
            fixed => {
                let payload = fixed.fixed_payload().unwrap_or_default();
                field(&self.data, offset + TAG_BYTES, payload)?;
                Ok(TAG_BYTES + payload)
            }
        }
    }

    /// Stored string length, counting the terminator.
    pub fn str_len(&self, offset: usize) -> Result<u16> {
        self.expect(offset, Tag::String, "string")?;
        read_u16(&self.data, offset + TAG_BYTES)
    }

    fn str_raw(&self, offset: usize) -> Result<&[u8]> {
        let len = self.str_len(offset)? as usize;
        if len == 0 {
            return Err(Error::malformed(offset, "string without terminator"));
        }
        field(&self.data, offset + TAG_BYTES + STR_LEN_BYTES, len)
    }

    /// String bytes without the terminator.
    pub fn str_bytes(&self, offset: usize) -> Result<&[u8]> {
        let raw = self.str_raw(offset)?;
        Ok(&raw[..raw.len() - 1])
    }

    pub fn str_value(&self, offset: usize) -> Result<&str> {
        std::str::from_utf8(self.str_bytes(offset)?)
            .map_err(|e| Error::malformed(offset, format!("string is not UTF-8: {}", e)))
    }

    /// Offset of the key STRING of the pair at `pair`.
    pub fn key_offset_of_pair(&self, pair: usize) -> Result<usize> {
        self.expect(pair, Tag::KeyValuePair, "key-value-pair")?;
        let key = pair + TAG_BYTES;
        match self.tag(key)? {
            Tag::String => Ok(key),
            other => Err(Error::malformed(key, format!("pair key is a {} node", other))),
        }
    }

    /// Offset of the value node of the pair at `pair`.
    pub fn value_offset_of_pair(&self, pair: usize) -> Result<usize> {
        let key = self.key_offset_of_pair(pair)?;
        Ok(key + self.data_size(key)?)
    }

    /// Alias-table entry of the REFERENCE node at `offset`.
    pub fn alias(&self, offset: usize) -> Result<&Alias> {
        self.expect(offset, Tag::Reference, "reference")?;
        let index = read_u32(&self.data, offset + TAG_BYTES)? as usize;
        self.aliases.get(index).ok_or_else(|| {
            Error::malformed(
                offset,
                format!("alias index {} outside table of {}", index, self.aliases.len()),
            )
        })
    }

    /// Checks that the buffer is empty or holds exactly one well-formed root
    /// node whose strings are UTF-8 and whose references resolve to table
    /// entries.
    pub fn verify(&self) -> Result<()> {
        if self.data.is_empty() {
            return Ok(());
        }

        let size = self.data_size(0)?;
        if size != self.data.len() {
            return Err(Error::malformed(
                size,
                format!("{} trailing bytes after root node", self.data.len() - size),
            ));
        }

        self.walk(0, &mut |at, tag| {
            match tag {
                Tag::String => {
                    self.str_value(at)?;
                }
                Tag::Reference => {
                    self.alias(at)?;
                }
                Tag::SequenceEnd | Tag::MapEnd => {
                    return Err(Error::malformed(at, "stray end tag"));
                }
                _ => {}
            }
            Ok(())
        })
    }

    pub(crate) fn expect(&self, offset: usize, tag: Tag, expected: &'static str) -> Result<()> {
        let found = self.tag(offset)?;
        if found == tag {
            Ok(())
        } else {
            Err(Error::mismatch(expected, found))
        }
    }
}

fn rebase(table: &HashMap<usize, u32>, range: &std::ops::Range<usize>) -> HashMap<usize, u32> {
    table
        .iter()
        .filter(|(offset, _)| range.contains(offset))
        .map(|(&offset, &value)| (offset - range.start, value))
        .collect()
}

impl fmt::Debug for ValueStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueStore")
            .field("name", &self.name)
            .field("bytes", &self.data.len())
            .field("aliases", &self.aliases.len())
            .field("positions", &self.columns.len().max(self.lines.len()))
            .field("indexed_containers", &self.index.len())
            .finish()
    }
}
