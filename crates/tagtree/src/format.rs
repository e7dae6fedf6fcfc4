//! Node tags, field widths and bounds-checked field readers.
//!
//! ## Node layout
//!
//! ```text
//! [tag: u8][payload]
//!
//! NULL            -
//! SINT/UINT_nB    n raw bytes (LE)
//! REAL_4B/8B      IEEE-754 (LE)
//! STRING          len (u16 LE, counts the trailing 0) | bytes | 0
//! SEQUENCE_START  child* | SEQUENCE_END
//! MAP_START       KEY_VALUE_PAIR* | MAP_END
//! KEY_VALUE_PAIR  STRING (key) | node (value)
//! REFERENCE       alias index (u32 LE)
//! ```
//!
//! ## File footer (24 bytes) - magic `TTR1` (`0x5454_5231`)
//!
//! ```text
//! [positions_offset: u64 LE][name_offset: u64 LE][crc32: u32 LE][magic: u32 LE]
//! ```
//!
//! The CRC32 covers every byte before the footer.

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt, WriteBytesExt};
use std::fmt;
use std::io::{self, Read, Seek, SeekFrom, Write};

use crate::error::{Error, Result};

/// Width of the tag byte that starts every node.
pub const TAG_BYTES: usize = 1;

/// Width of the string length header.
pub const STR_LEN_BYTES: usize = 2;

/// Width of an alias-table index stored in a REFERENCE node.
pub const ALIAS_INDEX_BYTES: usize = 4;

/// Largest encodable string, counting the terminator.
pub const MAX_STRING_BYTES: usize = u16::MAX as usize;

/// Deepest container and pair nesting that sizing and walking will descend.
pub const MAX_NESTING: usize = 256;

/// Magic number identifying a persisted store (ASCII "TTR1").
pub const STORE_MAGIC: u32 = 0x5454_5231;

/// Size of the file footer: 8 (`positions_offset`) + 8 (`name_offset`) + 4 (`crc32`) + 4 (`magic`).
pub const FOOTER_BYTES: u64 = 8 + 8 + 4 + 4;

/// The closed set of node tags. Byte values are part of the format.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    Null = 0,
    Sint1 = 1,
    Uint1 = 2,
    Sint2 = 3,
    Uint2 = 4,
    Sint4 = 5,
    Uint4 = 6,
    Sint8 = 7,
    Uint8 = 8,
    Real4 = 9,
    Real8 = 10,
    String = 11,
    SequenceStart = 12,
    SequenceEnd = 13,
    MapStart = 14,
    MapEnd = 15,
    KeyValuePair = 16,
    Reference = 17,
}

impl Tag {
    /// Decodes a tag byte, `None` for bytes outside the enumeration.
    #[must_use]
    pub fn from_byte(b: u8) -> Option<Tag> {
        let tag = match b {
            0 => Tag::Null,
            1 => Tag::Sint1,
            2 => Tag::Uint1,
            3 => Tag::Sint2,
            4 => Tag::Uint2,
            5 => Tag::Sint4,
            6 => Tag::Uint4,
            7 => Tag::Sint8,
            8 => Tag::Uint8,
            9 => Tag::Real4,
            10 => Tag::Real8,
            11 => Tag::String,
            12 => Tag::SequenceStart,
            13 => Tag::SequenceEnd,
            14 => Tag::MapStart,
            15 => Tag::MapEnd,
            16 => Tag::KeyValuePair,
            17 => Tag::Reference,
            _ => return None,
        };
        Some(tag)
    }

    #[must_use]
    pub fn as_byte(self) -> u8 {
        self as u8
    }

    /// Integer and float kinds. Strings are not numbers.
    #[must_use]
    pub fn is_number(self) -> bool {
        (Tag::Sint1.as_byte()..=Tag::Real8.as_byte()).contains(&self.as_byte())
    }

    /// Kinds a merge cursor can overlay.
    #[must_use]
    pub fn is_mergeable(self) -> bool {
        matches!(self, Tag::SequenceStart | Tag::MapStart | Tag::KeyValuePair)
    }

    /// Payload width for tags whose size does not depend on content.
    #[must_use]
    pub fn fixed_payload(self) -> Option<usize> {
        match self {
            Tag::Null | Tag::SequenceEnd | Tag::MapEnd => Some(0),
            Tag::Sint1 | Tag::Uint1 => Some(1),
            Tag::Sint2 | Tag::Uint2 => Some(2),
            Tag::Sint4 | Tag::Uint4 | Tag::Real4 => Some(4),
            Tag::Sint8 | Tag::Uint8 | Tag::Real8 => Some(8),
            Tag::Reference => Some(ALIAS_INDEX_BYTES),
            Tag::String | Tag::SequenceStart | Tag::MapStart | Tag::KeyValuePair => None,
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Tag::Null => "null",
            Tag::Sint1 => "sint1",
            Tag::Uint1 => "uint1",
            Tag::Sint2 => "sint2",
            Tag::Uint2 => "uint2",
            Tag::Sint4 => "sint4",
            Tag::Uint4 => "uint4",
            Tag::Sint8 => "sint8",
            Tag::Uint8 => "uint8",
            Tag::Real4 => "real4",
            Tag::Real8 => "real8",
            Tag::String => "string",
            Tag::SequenceStart => "sequence",
            Tag::SequenceEnd => "sequence-end",
            Tag::MapStart => "map",
            Tag::MapEnd => "map-end",
            Tag::KeyValuePair => "key-value-pair",
            Tag::Reference => "reference",
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Returns `len` bytes at `offset`, or `MalformedNode` if they run past the buffer.
pub(crate) fn field(buf: &[u8], offset: usize, len: usize) -> Result<&[u8]> {
    offset
        .checked_add(len)
        .and_then(|end| buf.get(offset..end))
        .ok_or_else(|| {
            Error::malformed(
                offset,
                format!("{} byte field runs past end of buffer ({} bytes)", len, buf.len()),
            )
        })
}

/// Fails with `MalformedNode` once `depth` passes [`MAX_NESTING`].
pub(crate) fn check_nesting(offset: usize, depth: usize) -> Result<()> {
    if depth > MAX_NESTING {
        return Err(Error::malformed(
            offset,
            format!("nesting deeper than {} levels", MAX_NESTING),
        ));
    }
    Ok(())
}

pub(crate) fn read_tag(buf: &[u8], offset: usize) -> Result<Tag> {
    let b = field(buf, offset, TAG_BYTES)?[0];
    Tag::from_byte(b).ok_or_else(|| Error::malformed(offset, format!("unknown tag byte {:#04x}", b)))
}

pub(crate) fn read_u16(buf: &[u8], offset: usize) -> Result<u16> {
    Ok(LittleEndian::read_u16(field(buf, offset, 2)?))
}

pub(crate) fn read_u32(buf: &[u8], offset: usize) -> Result<u32> {
    Ok(LittleEndian::read_u32(field(buf, offset, 4)?))
}

pub(crate) fn read_u64(buf: &[u8], offset: usize) -> Result<u64> {
    Ok(LittleEndian::read_u64(field(buf, offset, 8)?))
}

/// Parsed file footer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Footer {
    pub positions_offset: u64,
    pub name_offset: u64,
    pub crc: u32,
}

/// Writes the footer to `w`.
pub fn write_footer<W: Write>(w: &mut W, footer: &Footer) -> io::Result<()> {
    w.write_u64::<LittleEndian>(footer.positions_offset)?;
    w.write_u64::<LittleEndian>(footer.name_offset)?;
    w.write_u32::<LittleEndian>(footer.crc)?;
    w.write_u32::<LittleEndian>(STORE_MAGIC)?;
    Ok(())
}

/// Reads the footer from the end of `r`, validating the magic.
pub fn read_footer<R: Read + Seek>(r: &mut R) -> io::Result<Footer> {
    let filesize = r.seek(SeekFrom::End(0))?;
    if filesize < FOOTER_BYTES {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "file too small for store footer",
        ));
    }

    r.seek(SeekFrom::End(-(FOOTER_BYTES as i64)))?;
    let positions_offset = r.read_u64::<LittleEndian>()?;
    let name_offset = r.read_u64::<LittleEndian>()?;
    let crc = r.read_u32::<LittleEndian>()?;
    let magic = r.read_u32::<LittleEndian>()?;
    if magic != STORE_MAGIC {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("unknown store magic: {:#x}", magic),
        ));
    }

    Ok(Footer {
        positions_offset,
        name_offset,
        crc,
    })
}
