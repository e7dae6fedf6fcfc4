//! Numeric payloads and the cursor conversion matrix.
//!
//! Every integer and float kind converts to every numeric Rust type with `as`
//! cast semantics, and to `String` as decimal text. Strings convert only to
//! `String`.

use byteorder::{ByteOrder, LittleEndian};
use std::fmt;

use crate::error::{Error, Result};
use crate::format::{field, Tag, TAG_BYTES};
use crate::store::{Pos, ValueStore};

/// A decoded numeric payload, tagged with its stored width.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
}

macro_rules! cast_number {
    ($n:expr, $ty:ty) => {
        match $n {
            Number::I8(v) => v as $ty,
            Number::U8(v) => v as $ty,
            Number::I16(v) => v as $ty,
            Number::U16(v) => v as $ty,
            Number::I32(v) => v as $ty,
            Number::U32(v) => v as $ty,
            Number::I64(v) => v as $ty,
            Number::U64(v) => v as $ty,
            Number::F32(v) => v as $ty,
            Number::F64(v) => v as $ty,
        }
    };
}

impl Number {
    /// The tag this number is stored under.
    #[must_use]
    pub fn tag(self) -> Tag {
        match self {
            Number::I8(_) => Tag::Sint1,
            Number::U8(_) => Tag::Uint1,
            Number::I16(_) => Tag::Sint2,
            Number::U16(_) => Tag::Uint2,
            Number::I32(_) => Tag::Sint4,
            Number::U32(_) => Tag::Uint4,
            Number::I64(_) => Tag::Sint8,
            Number::U64(_) => Tag::Uint8,
            Number::F32(_) => Tag::Real4,
            Number::F64(_) => Tag::Real8,
        }
    }

    #[must_use]
    pub fn is_real(self) -> bool {
        matches!(self, Number::F32(_) | Number::F64(_))
    }

    #[must_use]
    pub fn as_f64(self) -> f64 {
        cast_number!(self, f64)
    }

    #[must_use]
    pub fn as_i64(self) -> i64 {
        cast_number!(self, i64)
    }
}

/// Integers print plainly, floats with six fractional digits.
impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Number::I8(v) => write!(f, "{}", v),
            Number::U8(v) => write!(f, "{}", v),
            Number::I16(v) => write!(f, "{}", v),
            Number::U16(v) => write!(f, "{}", v),
            Number::I32(v) => write!(f, "{}", v),
            Number::U32(v) => write!(f, "{}", v),
            Number::I64(v) => write!(f, "{}", v),
            Number::U64(v) => write!(f, "{}", v),
            Number::F32(v) => write!(f, "{:.6}", v),
            Number::F64(v) => write!(f, "{:.6}", v),
        }
    }
}

/// Rust types a cursor value can be read as.
pub trait FromNode: Sized {
    /// The tag a value of this type is stored under, used by `Cursor::is`.
    const TAG: Tag;

    fn from_number(n: Number) -> Self;

    /// Conversion from a stored string; `None` when strings do not convert.
    fn from_text(s: &str) -> Option<Self>;

    /// Whether a node of kind `tag` converts to this type.
    fn accepts(tag: Tag) -> bool {
        tag.is_number()
    }
}

macro_rules! numeric_from_node {
    ($($ty:ty => $tag:expr),* $(,)?) => {
        $(
            impl FromNode for $ty {
                const TAG: Tag = $tag;

                fn from_number(n: Number) -> Self {
                    cast_number!(n, $ty)
                }

                fn from_text(_: &str) -> Option<Self> {
                    None
                }
            }
        )*
    };
}

numeric_from_node! {
    i8 => Tag::Sint1,
    u8 => Tag::Uint1,
    i16 => Tag::Sint2,
    u16 => Tag::Uint2,
    i32 => Tag::Sint4,
    u32 => Tag::Uint4,
    i64 => Tag::Sint8,
    u64 => Tag::Uint8,
    f32 => Tag::Real4,
    f64 => Tag::Real8,
}

impl FromNode for bool {
    const TAG: Tag = Tag::Uint1;

    fn from_number(n: Number) -> Self {
        match n {
            Number::F32(_) | Number::F64(_) => n.as_f64() != 0.0,
            Number::U64(v) => v != 0,
            other => other.as_i64() != 0,
        }
    }

    fn from_text(_: &str) -> Option<Self> {
        None
    }
}

impl FromNode for String {
    const TAG: Tag = Tag::String;

    fn from_number(n: Number) -> Self {
        n.to_string()
    }

    fn from_text(s: &str) -> Option<Self> {
        Some(s.to_owned())
    }

    fn accepts(tag: Tag) -> bool {
        tag == Tag::String || tag.is_number()
    }
}

impl ValueStore {
    /// Decodes the numeric node at `offset`.
    pub fn number(&self, offset: usize) -> Result<Number> {
        let tag = self.tag(offset)?;
        let width = match tag.fixed_payload() {
            Some(w) if tag.is_number() => w,
            _ => return Err(Error::mismatch("number", tag)),
        };

        let b = field(self.as_bytes(), offset + TAG_BYTES, width)?;
        let n = match tag {
            Tag::Sint1 => Number::I8(b[0] as i8),
            Tag::Uint1 => Number::U8(b[0]),
            Tag::Sint2 => Number::I16(LittleEndian::read_i16(b)),
            Tag::Uint2 => Number::U16(LittleEndian::read_u16(b)),
            Tag::Sint4 => Number::I32(LittleEndian::read_i32(b)),
            Tag::Uint4 => Number::U32(LittleEndian::read_u32(b)),
            Tag::Sint8 => Number::I64(LittleEndian::read_i64(b)),
            Tag::Uint8 => Number::U64(LittleEndian::read_u64(b)),
            Tag::Real4 => Number::F32(LittleEndian::read_f32(b)),
            Tag::Real8 => Number::F64(LittleEndian::read_f64(b)),
            other => return Err(Error::mismatch("number", other)),
        };
        Ok(n)
    }

    /// Appends `n` under its own tag.
    pub fn push_number(&mut self, n: Number, pos: impl Into<Pos>) -> usize {
        match n {
            Number::I8(v) => self.push_i8(v, pos),
            Number::U8(v) => self.push_u8(v, pos),
            Number::I16(v) => self.push_i16(v, pos),
            Number::U16(v) => self.push_u16(v, pos),
            Number::I32(v) => self.push_i32(v, pos),
            Number::U32(v) => self.push_u32(v, pos),
            Number::I64(v) => self.push_i64(v, pos),
            Number::U64(v) => self.push_u64(v, pos),
            Number::F32(v) => self.push_f32(v, pos),
            Number::F64(v) => self.push_f64(v, pos),
        }
    }
}
