//! YAML-like text dump of a cursor, used by `Display` and the CLI.
//!
//! The output is diagnostic: strings are quoted without escaping and the
//! layout is not meant to be parsed back.

use crate::cursor::Cursor;
use crate::format::Tag;

fn pad(out: &mut String, n: usize) {
    out.extend(std::iter::repeat(' ').take(n));
}

pub(crate) fn render(cursor: &Cursor, out: &mut String, indent: usize, inc: usize, ignore_indent: bool) {
    if !ignore_indent {
        pad(out, indent);
    }

    let Some(kind) = cursor.kind() else {
        out.push_str("NONE\n");
        return;
    };

    match kind {
        Tag::Null => out.push_str("null\n"),
        Tag::String => {
            out.push('"');
            out.push_str(cursor.as_str().unwrap_or_default());
            out.push_str("\"\n");
        }
        number if number.is_number() => {
            out.push_str(&cursor.get_str(""));
            out.push('\n');
        }
        Tag::SequenceStart => render_sequence(cursor, out, indent, inc),
        Tag::MapStart => render_map(cursor, out, indent, inc),
        Tag::KeyValuePair => render_pair(cursor, out, indent, inc),
        other => tracing::warn!(kind = %other, "cannot render node"),
    }
}

fn render_sequence(cursor: &Cursor, out: &mut String, indent: usize, inc: usize) {
    if cursor.size() == 0 {
        out.push_str("[ ]\n");
        return;
    }

    for (i, item) in cursor.iter().enumerate() {
        if i > 0 {
            pad(out, indent);
        }
        out.push_str("- ");
        if item.is_sequence() || (item.is_map() && item.size() > 1) {
            out.push('\n');
            pad(out, indent + inc);
        }
        render(&item, out, indent + inc, inc, true);
    }
}

fn render_map(cursor: &Cursor, out: &mut String, indent: usize, inc: usize) {
    if cursor.size() == 0 {
        out.push_str("{ }\n");
        return;
    }

    for (i, pair) in cursor.iter().enumerate() {
        if i > 0 {
            pad(out, indent);
        }
        render_pair(&pair, out, indent, inc);
    }
}

fn render_pair(pair: &Cursor, out: &mut String, indent: usize, inc: usize) {
    out.push_str(pair.get_key().unwrap_or_default());
    out.push_str(" :\n");
    render(&pair.get_value(), out, indent + inc, inc, false);
}
