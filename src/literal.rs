#![warn(missing_docs)]

//! # Literal Module
//!
//! Renders [`crate::value::Value`] as an inline SQL literal. `scoop` issues
//! parameterless SQL, so every value a `Cond` or `Scoop` touches passes
//! through here rather than through a driver's bind-parameter machinery.

use crate::value::Value;

const HEX: &[u8; 16] = b"0123456789abcdef";

/// A 256-entry lookup table: `None` if the byte needs no escaping, `Some`
/// with its two-character escape sequence otherwise. Built once at first use
/// via `escape`'s fast-path scan, so the common case (no escapable byte)
/// never allocates.
fn escape_for(byte: u8) -> Option<&'static str> {
    match byte {
        0x00 => Some("\\0"),
        b'\n' => Some("\\n"),
        b'\r' => Some("\\r"),
        b'\\' => Some("\\\\"),
        b'\'' => Some("\\'"),
        b'"' => Some("\\\""),
        0x1a => Some("\\Z"),
        _ => None,
    }
}

/// Escapes the bytes in `s` that are unsafe inside a single-quoted SQL
/// string literal. Returns the input unmodified (no allocation) when no byte
/// needs escaping.
pub fn escape(s: &str) -> String {
    let bytes = s.as_bytes();
    let first_needing_escape = bytes.iter().position(|&b| escape_for(b).is_some());
    let Some(first) = first_needing_escape else {
        return s.to_string();
    };

    // Escape-trigger bytes are all single-byte ASCII, so every multibyte
    // UTF-8 sequence's continuation bytes (0x80..=0xBF) never match
    // `escape_for` and pass through untouched — accumulating into a `Vec<u8>`
    // and re-decoding at the end keeps multibyte characters intact instead of
    // reinterpreting each raw byte as a Latin-1 `char`.
    let mut out = Vec::with_capacity(bytes.len() + 8);
    out.extend_from_slice(&bytes[..first]);
    for &b in &bytes[first..] {
        match escape_for(b) {
            Some(seq) => out.extend_from_slice(seq.as_bytes()),
            None => out.push(b),
        }
    }
    String::from_utf8(out).expect("escape: input was valid UTF-8 and only ASCII bytes were rewritten")
}

/// Escapes raw bytes the same way `escape` does for strings, producing a
/// lossy-UTF8 literal body (used for `Value::Bytes`).
fn escape_bytes(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() + 8);
    for &b in bytes {
        match escape_for(b) {
            Some(seq) => out.push_str(seq),
            None if b.is_ascii_graphic() || b == b' ' => out.push(b as char),
            None => {
                out.push_str("\\x");
                out.push(HEX[(b >> 4) as usize] as char);
                out.push(HEX[(b & 0x0f) as usize] as char);
            }
        }
    }
    out
}

/// Renders `value` as an inline SQL literal.
///
/// When `quote_slice` is true and `value` is [`Value::Array`], the
/// comma-joined element list is wrapped in parentheses (the `IN (...)`
/// shape); when false, the bare comma-joined list is returned (used when
/// building a nested array literal, which SQL has no standalone syntax for
/// but which this renderer supports for recursive composition).
pub fn render(value: &Value, quote_slice: bool) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::String(s) => format!("'{}'", escape(s)),
        Value::Bytes(b) => format!("'{}'", escape_bytes(b)),
        Value::Bool(b) => (if *b { "1" } else { "0" }).to_string(),
        Value::Int8(v) => v.to_string(),
        Value::Int16(v) => v.to_string(),
        Value::Int32(v) => v.to_string(),
        Value::Int64(v) => v.to_string(),
        Value::UInt8(v) => v.to_string(),
        Value::UInt16(v) => v.to_string(),
        Value::UInt32(v) => v.to_string(),
        Value::UInt64(v) => v.to_string(),
        Value::Float32(v) => v.to_string(),
        Value::Float64(v) => v.to_string(),
        Value::Array(items) => {
            let joined = items
                .iter()
                .map(|v| render(v, false))
                .collect::<Vec<_>>()
                .join(", ");
            if quote_slice {
                format!("({})", joined)
            } else {
                joined
            }
        }
        Value::Between(lo, hi) => format!("{} AND {}", render(lo, false), render(hi, false)),
        Value::Json(v) => format!("'{}'", escape(&v.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_is_a_no_op_without_escapable_bytes() {
        assert_eq!(escape("hello world"), "hello world");
    }

    #[test]
    fn escape_doubles_single_quotes_and_backslashes() {
        assert_eq!(escape("o'brien"), "o\\'brien");
        assert_eq!(escape("a\\b"), "a\\\\b");
    }

    #[test]
    fn escape_handles_every_trigger_byte() {
        let s = "\0\n\r\\'\"\u{1a}";
        assert_eq!(escape(s), "\\0\\n\\r\\\\\\'\\\"\\Z");
    }

    #[test]
    fn escape_preserves_multibyte_chars_after_a_trigger_byte() {
        assert_eq!(escape("'é"), "\\'é");
        assert_eq!(escape("café'"), "café\\'");
    }

    #[test]
    fn render_null_and_bool() {
        assert_eq!(render(&Value::Null, true), "NULL");
        assert_eq!(render(&Value::Bool(true), true), "1");
        assert_eq!(render(&Value::Bool(false), true), "0");
    }

    #[test]
    fn render_string_escapes_and_quotes() {
        assert_eq!(render(&Value::String("o'brien".into()), true), "'o\\'brien'");
    }

    #[test]
    fn render_integers_and_floats_unquoted() {
        assert_eq!(render(&Value::Int32(-7), true), "-7");
        assert_eq!(render(&Value::Float64(3.5), true), "3.5");
    }

    #[test]
    fn render_array_wraps_in_parens_only_when_quote_slice() {
        let arr = Value::Array(vec![Value::Int32(1), Value::Int32(2), Value::Int32(3)]);
        assert_eq!(render(&arr, true), "(1, 2, 3)");
        assert_eq!(render(&arr, false), "1, 2, 3");
    }

    #[test]
    fn render_between_joins_with_and() {
        let between = Value::Between(Box::new(Value::Int32(18)), Box::new(Value::Int32(65)));
        assert_eq!(render(&between, true), "18 AND 65");
    }
}
