//! Builds stores from JSON documents and renders cursors back to JSON.
//!
//! JSON integers are stored in the narrowest of `Sint4`, `Sint8` and `Uint8`
//! that holds them; other numbers become `Real8`. Object key order is kept.

use serde_json::{Map, Value};

use crate::convert::Number;
use crate::cursor::Cursor;
use crate::error::{Error, Result};
use crate::format::Tag;
use crate::store::{Pos, ValueStore};

impl ValueStore {
    /// Parses `text` as JSON into a new store named `name`.
    pub fn from_json(name: impl Into<String>, text: &str) -> anyhow::Result<Self> {
        let value: Value = serde_json::from_str(text)?;
        let mut store = ValueStore::new(name);
        store.push_json(&value)?;
        Ok(store)
    }

    /// Appends `value` as one node tree. Returns the offset of its root.
    pub fn push_json(&mut self, value: &Value) -> Result<usize> {
        let offset = match value {
            Value::Null => self.push_null(Pos::NONE),
            Value::Bool(b) => self.push_bool(*b, Pos::NONE),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    match i32::try_from(i) {
                        Ok(small) => self.push_i32(small, Pos::NONE),
                        Err(_) => self.push_i64(i, Pos::NONE),
                    }
                } else if let Some(u) = n.as_u64() {
                    self.push_u64(u, Pos::NONE)
                } else {
                    self.push_f64(n.as_f64().unwrap_or(f64::NAN), Pos::NONE)
                }
            }
            Value::String(s) => self.push_string(s, Pos::NONE)?,
            Value::Array(items) => {
                let start = self.begin_sequence(Pos::NONE);
                for item in items {
                    self.push_json(item)?;
                }
                self.end_sequence(Pos::NONE);
                start
            }
            Value::Object(entries) => {
                let start = self.begin_map(Pos::NONE);
                for (key, item) in entries {
                    self.push_key(key, Pos::NONE)?;
                    self.push_json(item)?;
                }
                self.end_map(Pos::NONE);
                start
            }
        };
        Ok(offset)
    }
}

/// Converts the view under `cursor` to a JSON value.
///
/// Non-finite floats become `null`, as JSON cannot represent them.
pub fn to_json(cursor: &Cursor) -> Result<Value> {
    let value = match cursor.try_kind()? {
        Tag::Null => Value::Null,
        Tag::String => Value::String(cursor.try_as_str()?.to_owned()),
        Tag::SequenceStart => Value::Array(cursor.iter().map(|c| to_json(&c)).collect::<Result<_>>()?),
        Tag::MapStart => {
            let mut entries = Map::new();
            for pair in cursor.iter() {
                entries.insert(pair.try_get_key()?.to_owned(), to_json(&pair.try_get_value()?)?);
            }
            Value::Object(entries)
        }
        Tag::KeyValuePair => {
            let mut entries = Map::new();
            entries.insert(cursor.try_get_key()?.to_owned(), to_json(&cursor.try_get_value()?)?);
            Value::Object(entries)
        }
        tag if tag.is_number() => number_to_json(cursor.try_number()?),
        other => return Err(Error::mismatch("value", other)),
    };
    Ok(value)
}

fn number_to_json(n: Number) -> Value {
    match n {
        Number::U64(v) => Value::from(v),
        Number::U32(v) => Value::from(v),
        Number::F32(_) | Number::F64(_) => serde_json::Number::from_f64(n.as_f64())
            .map(Value::Number)
            .unwrap_or(Value::Null),
        other => Value::from(other.as_i64()),
    }
}
