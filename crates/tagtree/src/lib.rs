//! # tagtree - tagged binary value trees
//!
//! A compact binary encoding for a YAML-like value model (scalars, strings,
//! sequences, maps, key-value pairs and aliases) with zero-copy read cursors
//! and a read-time layered overlay.
//!
//! ```text
//! encode calls ──▶ ValueStore (append-only bytes + side tables)
//!                       │  Rc
//!                       ▼
//!                    Cursor ──▶ get_elem / get / get_key / ...
//!                       │
//!   [Cursor, Cursor] ──▶ MergeCursor ──▶ same Cursor API over N layers
//! ```
//!
//! ## Stores
//!
//! A [`ValueStore`] is built once through its `push_*` / `begin_*` / `end_*`
//! methods and then shared behind an `Rc`. Containers carry no length table:
//! the first read of a container walks its children and memoizes their
//! offsets, and maps additionally memoize a key-sorted order for binary
//! search.
//!
//! ## Cursors
//!
//! A [`Cursor`] reads one node. Reads that can miss come in two forms:
//! `try_*` returns [`Error`], the plain form returns an invalid cursor or the
//! caller's default and reports the miss through `tracing`.
//!
//! ## Merging
//!
//! A [`MergeCursor`] overlays a stack of sequence or map cursors: sequences
//! concatenate lowest precedence first, maps take each key from the highest
//! precedence layer that defines it. See [`MergeOptions`] for depth and
//! per-kind policy.
//!
//! ## Persistence
//!
//! Stores without references can be saved to and opened from a single file
//! guarded by a CRC32 footer; see [`ValueStore::save`] and [`ValueStore::open`].
//!
//! ## Threading
//!
//! Everything here is single-threaded: stores and cursors use `Rc` and cell
//! caches and are neither `Send` nor `Sync`.

mod convert;
mod cursor;
mod dispatch;
mod error;
mod format;
mod index;
mod json;
mod merge;
mod persist;
mod render;
mod store;

pub use convert::{FromNode, Number};
pub use cursor::{Cursor, ElemIndex, Iter};
pub use dispatch::MapDispatcher;
pub use error::{Error, Result};
pub use format::{Tag, FOOTER_BYTES, MAX_NESTING, MAX_STRING_BYTES, STORE_MAGIC};
pub use json::to_json;
pub use merge::{MergeCursor, MergeOptions};
pub use persist::{from_file_bytes, to_file_bytes};
pub use store::{Alias, Pos, ValueStore};

#[cfg(test)]
mod tests;
