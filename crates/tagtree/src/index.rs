//! Structural indices: memoized child-offset lists per container.
//!
//! Containers carry no length table, so the first read of a sequence or map
//! walks its children (`offset += data_size(offset)` until the END tag) and
//! caches the resulting offsets. Maps additionally get a key-sorted copy used
//! for binary search.
//!
//! The cache is keyed by container offset and never invalidated: a store is
//! only readable once it is shared, and a closed container's bytes never move.
//! The maps sit in `RefCell`s and are filled from `&self` methods, which is
//! sound because `ValueStore` is `!Sync`.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::{Error, Result};
use crate::format::{check_nesting, Tag, TAG_BYTES};
use crate::store::ValueStore;

type Children = Rc<[usize]>;

#[derive(Default)]
pub(crate) struct IndexCache {
    sequences: RefCell<HashMap<usize, Children>>,
    maps: RefCell<HashMap<usize, Children>>,
    sorted_maps: RefCell<HashMap<usize, Children>>,
}

impl IndexCache {
    /// Number of containers with a cached child list.
    pub(crate) fn len(&self) -> usize {
        self.sequences.borrow().len() + self.maps.borrow().len()
    }
}

fn cached(table: &RefCell<HashMap<usize, Children>>, offset: usize) -> Option<Children> {
    table.borrow().get(&offset).cloned()
}

impl ValueStore {
    /// Child offsets of the sequence or map at `offset`, in encounter order.
    pub fn children(&self, offset: usize) -> Result<Children> {
        self.children_at(offset, 0)
    }

    pub(crate) fn children_at(&self, offset: usize, depth: usize) -> Result<Children> {
        match self.tag(offset)? {
            Tag::SequenceStart => self.sequence_children_at(offset, depth),
            Tag::MapStart => self.map_children_at(offset, depth),
            other => Err(Error::mismatch("sequence or map", other)),
        }
    }

    /// Element offsets of the sequence at `offset`.
    pub fn sequence_children(&self, offset: usize) -> Result<Children> {
        self.sequence_children_at(offset, 0)
    }

    fn sequence_children_at(&self, offset: usize, depth: usize) -> Result<Children> {
        if let Some(hit) = cached(&self.index.sequences, offset) {
            return Ok(hit);
        }

        self.expect(offset, Tag::SequenceStart, "sequence")?;
        let children: Children = self.walk_children(offset, Tag::SequenceEnd, depth)?.into();
        self.index
            .sequences
            .borrow_mut()
            .insert(offset, children.clone());
        Ok(children)
    }

    /// Pair offsets of the map at `offset`, in insertion order.
    pub fn map_children(&self, offset: usize) -> Result<Children> {
        self.map_children_at(offset, 0)
    }

    fn map_children_at(&self, offset: usize, depth: usize) -> Result<Children> {
        if let Some(hit) = cached(&self.index.maps, offset) {
            return Ok(hit);
        }

        self.expect(offset, Tag::MapStart, "map")?;
        let children: Children = self.walk_children(offset, Tag::MapEnd, depth)?.into();
        self.index.maps.borrow_mut().insert(offset, children.clone());
        Ok(children)
    }

    /// Pair offsets of the map at `offset`, ordered by key bytes.
    pub fn sorted_map_children(&self, offset: usize) -> Result<Children> {
        if let Some(hit) = cached(&self.index.sorted_maps, offset) {
            return Ok(hit);
        }

        let children = self.map_children(offset)?;
        let mut keyed = children
            .iter()
            .map(|&pair| Ok((self.str_bytes(self.key_offset_of_pair(pair)?)?, pair)))
            .collect::<Result<Vec<(&[u8], usize)>>>()?;
        keyed.sort_by(|a, b| a.0.cmp(b.0));

        let sorted: Children = keyed.into_iter().map(|(_, pair)| pair).collect();
        self.index
            .sorted_maps
            .borrow_mut()
            .insert(offset, sorted.clone());
        Ok(sorted)
    }

    /// Binary search for `key` in the map at `offset`. Returns the pair offset.
    pub fn find_pair(&self, offset: usize, key: &[u8]) -> Result<Option<usize>> {
        let sorted = self.sorted_map_children(offset)?;
        self.bisect(&sorted, key)
    }

    fn bisect(&self, sorted: &[usize], key: &[u8]) -> Result<Option<usize>> {
        if sorted.is_empty() {
            return Ok(None);
        }

        let mid = sorted.len() / 2;
        let pair = sorted[mid];
        let mid_key = self.str_bytes(self.key_offset_of_pair(pair)?)?;
        match key.cmp(mid_key) {
            Ordering::Less => self.bisect(&sorted[..mid], key),
            Ordering::Greater => self.bisect(&sorted[mid + 1..], key),
            Ordering::Equal => Ok(Some(pair)),
        }
    }

    fn walk_children(&self, container: usize, end: Tag, depth: usize) -> Result<Vec<usize>> {
        let mut children = Vec::new();
        let mut at = container + TAG_BYTES;
        loop {
            let tag = self.tag(at)?;
            if tag == end {
                return Ok(children);
            }
            match (end, tag) {
                (_, Tag::SequenceEnd | Tag::MapEnd) => {
                    return Err(Error::malformed(at, format!("{} closes a {}", tag, end)));
                }
                (Tag::MapEnd, t) if t != Tag::KeyValuePair => {
                    return Err(Error::malformed(at, format!("map entry is a {} node", t)));
                }
                _ => {}
            }
            children.push(at);
            at += self.data_size_at(at, depth + 1)?;
        }
    }

    /// Visits `offset` and every node nested under it, depth first.
    ///
    /// REFERENCE nodes are reported but not followed. Nesting is bounded
    /// like [`data_size`](Self::data_size).
    pub fn walk<F>(&self, offset: usize, f: &mut F) -> Result<()>
    where
        F: FnMut(usize, Tag) -> Result<()>,
    {
        self.walk_at(offset, f, 0)
    }

    fn walk_at<F>(&self, offset: usize, f: &mut F, depth: usize) -> Result<()>
    where
        F: FnMut(usize, Tag) -> Result<()>,
    {
        check_nesting(offset, depth)?;
        let tag = self.tag(offset)?;
        f(offset, tag)?;
        match tag {
            Tag::SequenceStart | Tag::MapStart => {
                for &child in self.children_at(offset, depth)?.iter() {
                    self.walk_at(child, f, depth + 1)?;
                }
            }
            Tag::KeyValuePair => {
                self.walk_at(self.key_offset_of_pair(offset)?, f, depth + 1)?;
                self.walk_at(self.value_offset_of_pair(offset)?, f, depth + 1)?;
            }
            _ => {}
        }
        Ok(())
    }
}
