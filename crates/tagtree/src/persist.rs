//! Store files: the node buffer plus its position table and name.
//!
//! ```text
//! [DATA]      raw node bytes
//! [POSITIONS] count(u32) | repeated: offset(u32) | column(u32) | line(u32)
//! [NAME]      name_len(u16) | name bytes
//! [FOOTER]    positions_offset(u64) | name_offset(u64) | crc32(u32) | magic(u32 = "TTR1")
//! ```
//!
//! The alias table is not persisted, so only stores without REFERENCE nodes
//! can be saved. Flatten a store with [`ValueStore::materialize`] first.

use anyhow::{bail, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use crc32fast::Hasher as Crc32;
use std::fs::{remove_file, rename, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::Path;

use crate::format::{read_footer, write_footer, Footer, FOOTER_BYTES, MAX_STRING_BYTES};
use crate::store::{Pos, ValueStore};

/// Bytes per entry in the POSITIONS section.
const POSITION_ENTRY_BYTES: u64 = 4 + 4 + 4;

/// Encodes `store` in the file format.
///
/// # Errors
///
/// Fails if the store holds references, if its buffer does not fit 32-bit
/// offsets, or if its name is longer than a string node allows.
pub fn to_file_bytes(store: &ValueStore) -> Result<Vec<u8>> {
    if store.alias_count() > 0 {
        bail!(
            "store '{}' holds {} references; materialize it before saving",
            store.name(),
            store.alias_count()
        );
    }
    if u32::try_from(store.len()).is_err() {
        bail!("store '{}' is too large to save ({} bytes)", store.name(), store.len());
    }
    let name = store.name().as_bytes();
    if name.len() > MAX_STRING_BYTES {
        bail!("store name is too long ({} bytes)", name.len());
    }

    let mut out = Vec::with_capacity(store.len() + 64);
    out.extend_from_slice(store.as_bytes());

    let positions = store.positions();
    let positions_offset = out.len() as u64;
    out.write_u32::<LittleEndian>(positions.len() as u32)?;
    for (offset, pos) in &positions {
        out.write_u32::<LittleEndian>(*offset as u32)?;
        out.write_u32::<LittleEndian>(pos.column)?;
        out.write_u32::<LittleEndian>(pos.line)?;
    }

    let name_offset = out.len() as u64;
    out.write_u16::<LittleEndian>(name.len() as u16)?;
    out.extend_from_slice(name);

    let mut hasher = Crc32::new();
    hasher.update(&out);
    let footer = Footer {
        positions_offset,
        name_offset,
        crc: hasher.finalize(),
    };
    write_footer(&mut out, &footer)?;
    Ok(out)
}

/// Decodes a store from file-format bytes and verifies its node buffer.
pub fn from_file_bytes(bytes: &[u8]) -> Result<ValueStore> {
    let filesize = bytes.len() as u64;
    if filesize < FOOTER_BYTES {
        bail!("store file too small ({} bytes)", filesize);
    }

    let footer = read_footer(&mut io::Cursor::new(bytes))?;
    let body_end = filesize - FOOTER_BYTES;
    if footer.positions_offset > footer.name_offset || footer.name_offset >= body_end {
        bail!(
            "invalid section offsets: positions {} name {} body {}",
            footer.positions_offset,
            footer.name_offset,
            body_end
        );
    }

    let body = &bytes[..body_end as usize];
    let mut hasher = Crc32::new();
    hasher.update(body);
    let actual = hasher.finalize();
    if actual != footer.crc {
        bail!(
            "checksum mismatch: expected {:#010x}, got {:#010x}",
            footer.crc,
            actual
        );
    }

    let data = body[..footer.positions_offset as usize].to_vec();

    let mut positions = &body[footer.positions_offset as usize..footer.name_offset as usize];
    let count = positions.read_u32::<LittleEndian>()? as u64;
    if positions.len() as u64 != count * POSITION_ENTRY_BYTES {
        bail!(
            "corrupt position table: {} entries in {} bytes",
            count,
            positions.len()
        );
    }
    let mut table = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let offset = positions.read_u32::<LittleEndian>()? as usize;
        let column = positions.read_u32::<LittleEndian>()?;
        let line = positions.read_u32::<LittleEndian>()?;
        if offset >= data.len() {
            bail!("position entry points past the data section: {}", offset);
        }
        table.push((offset, Pos::new(column, line)));
    }

    let mut name_section = &body[footer.name_offset as usize..];
    let name_len = name_section.read_u16::<LittleEndian>()? as usize;
    if name_section.len() != name_len {
        bail!(
            "corrupt name section: {} bytes declared, {} present",
            name_len,
            name_section.len()
        );
    }
    let mut name = String::with_capacity(name_len);
    name_section.read_to_string(&mut name)?;

    let mut store = ValueStore::from_bytes(name, data);
    for (offset, pos) in table {
        store.set_pos(offset, pos);
    }
    store.verify()?;
    Ok(store)
}

impl ValueStore {
    /// Writes the store to `path` atomically.
    ///
    /// The file is written to `path.ttr.tmp`, fsynced and renamed into place.
    /// On failure the temp file is removed and `path` is left untouched.
    ///
    /// # Errors
    ///
    /// See [`to_file_bytes`]; also any I/O failure.
    pub fn save(&self, path: &Path) -> Result<()> {
        let bytes = to_file_bytes(self)?;

        let tmp_path = path.with_extension("ttr.tmp");
        if let Err(e) = write_synced(&tmp_path, &bytes).and_then(|()| rename(&tmp_path, path)) {
            let _ = remove_file(&tmp_path);
            return Err(e.into());
        }

        if let Some(parent) = path.parent() {
            if let Ok(dir) = File::open(parent) {
                let _ = dir.sync_all();
            }
        }

        tracing::debug!(store = %self.name(), path = %path.display(), bytes = bytes.len(), "saved store");
        Ok(())
    }

    /// Reads and verifies a store written by [`save`](Self::save).
    ///
    /// # Errors
    ///
    /// Short files, a bad magic, out-of-range sections, a checksum mismatch,
    /// or node data that fails [`verify`](Self::verify).
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut bytes = Vec::new();
        File::open(path.as_ref())?.read_to_end(&mut bytes)?;
        from_file_bytes(&bytes)
    }
}

fn write_synced(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}
