#![warn(missing_docs)]

//! # Reflect Module
//!
//! Table-name derivation, field-presence lookup, and raw-bytes decoding for
//! any type implementing [`Record`]. Two process-wide, `dashmap`-backed
//! caches replace the teacher's `Mutex<Vec<Box<dyn TableDefinition>>>>`
//! linear-scan registry with constant-time, concurrent, first-call-wins
//! lookups keyed by type identity.

mod macros;
mod record;

pub use record::{FieldInfo, FieldSpec, IndexDecl, Record, Validator};

use std::any::TypeId;
use std::sync::OnceLock;

use dashmap::DashMap;

use crate::error::ScoopError;
use crate::value::Value;

fn table_name_cache() -> &'static DashMap<TypeId, String> {
    static CACHE: OnceLock<DashMap<TypeId, String>> = OnceLock::new();
    CACHE.get_or_init(DashMap::new)
}

fn field_cache() -> &'static DashMap<(TypeId, &'static str), bool> {
    static CACHE: OnceLock<DashMap<(TypeId, &'static str), bool>> = OnceLock::new();
    CACHE.get_or_init(DashMap::new)
}

/// Returns `T`'s table name, computing and caching it on first use.
///
/// Stable across calls for the lifetime of the process (§8 invariant 5):
/// once inserted, a type's entry is never evicted or recomputed.
pub fn table_name<T: Record + 'static>() -> String {
    let cache = table_name_cache();
    if let Some(existing) = cache.get(&TypeId::of::<T>()) {
        return existing.clone();
    }
    let derived = T::table_name();
    cache.insert(TypeId::of::<T>(), derived.clone());
    derived
}

/// Returns whether `T` declares a field named `name`, computing and caching
/// the answer on first use.
pub fn has_field<T: Record + 'static>(name: &'static str) -> bool {
    let cache = field_cache();
    let key = (TypeId::of::<T>(), name);
    if let Some(existing) = cache.get(&key) {
        return *existing;
    }
    let present = T::fields().iter().any(|f| f.name == name);
    cache.insert(key, present);
    present
}

/// True if `T` declares a `deleted_at` column (drives the soft-delete rule).
pub fn has_deleted_at<T: Record + 'static>() -> bool {
    has_field::<T>("deleted_at")
}

/// True if `T` declares a `created_at` column.
pub fn has_created_at<T: Record + 'static>() -> bool {
    has_field::<T>("created_at")
}

/// True if `T` declares an `updated_at` column.
pub fn has_updated_at<T: Record + 'static>() -> bool {
    has_field::<T>("updated_at")
}

/// True if `T` declares an `id` column.
pub fn has_id<T: Record + 'static>() -> bool {
    has_field::<T>("id")
}

/// Transforms a CamelCase identifier into snake_case.
///
/// An uppercase byte starts a new segment when the previous byte is
/// lowercase, or when the previous byte is uppercase but the *next* one is
/// lowercase — this collapses a run of uppercase letters (an acronym like
/// `XML`) to a single leading segment instead of one per letter:
/// `XMLParser` → `xml_parser`, not `x_m_l_parser`.
pub fn camel_to_snake(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() {
            let prev_lower = i > 0 && chars[i - 1].is_lowercase();
            let prev_upper_next_lower =
                i > 0 && chars[i - 1].is_uppercase() && chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            if i > 0 && (prev_lower || prev_upper_next_lower) {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Derives a type's default table name: trims a leading `Model` segment,
/// then applies [`camel_to_snake`].
pub fn derive_table_name(type_name: &str) -> String {
    let trimmed = type_name.strip_prefix("Model").unwrap_or(type_name);
    camel_to_snake(trimmed)
}

/// Decodes a raw column value into a [`Value`] per `field`'s declared SQL
/// type.
///
/// Numeric types parse the byte slice's UTF-8 text directly; strings and
/// blobs copy; booleans accept a single `0`/`1` byte or case-insensitive
/// `true`/`false`; composite (`json_serializer`) columns deserialize as
/// JSON. Any other declared type is rejected with `invalid type: <type>`.
pub fn decode(field: &FieldInfo, bytes: &[u8]) -> Result<Value, ScoopError> {
    if field.json_serializer {
        let decoded: serde_json::Value =
            serde_json::from_slice(bytes).map_err(|e| ScoopError::InvalidValue(e.to_string()))?;
        return Ok(Value::Json(decoded));
    }

    match field.sql_type {
        "integer" | "bigint" | "int" | "smallint" | "tinyint" => {
            let text = std::str::from_utf8(bytes).map_err(|e| ScoopError::InvalidValue(e.to_string()))?;
            let n: i64 = text
                .trim()
                .parse()
                .map_err(|_| ScoopError::InvalidValue(format!("not an integer: {text:?}")))?;
            Ok(Value::Int64(n))
        }
        "real" | "float" | "double" | "numeric" | "decimal" => {
            let text = std::str::from_utf8(bytes).map_err(|e| ScoopError::InvalidValue(e.to_string()))?;
            let n: f64 = text
                .trim()
                .parse()
                .map_err(|_| ScoopError::InvalidValue(format!("not a float: {text:?}")))?;
            Ok(Value::Float64(n))
        }
        "boolean" | "bool" => {
            if bytes.len() == 1 {
                return Ok(Value::Bool(bytes[0] != b'0'));
            }
            let text = std::str::from_utf8(bytes).unwrap_or_default();
            match text.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Ok(Value::Bool(true)),
                "false" | "0" | "" => Ok(Value::Bool(false)),
                other => Err(ScoopError::InvalidValue(format!("not a boolean: {other:?}"))),
            }
        }
        "text" | "varchar" | "char" | "uuid" => {
            Ok(Value::String(String::from_utf8_lossy(bytes).into_owned()))
        }
        "blob" | "bytea" | "binary" => Ok(Value::Bytes(bytes.to_vec())),
        other => Err(ScoopError::InvalidValue(format!("invalid type: {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn camel_to_snake_collapses_acronym_runs() {
        assert_eq!(camel_to_snake("XMLParser"), "xml_parser");
        assert_eq!(camel_to_snake("UserName"), "user_name");
        assert_eq!(camel_to_snake("ID"), "id");
        assert_eq!(camel_to_snake("user"), "user");
    }

    #[test]
    fn derive_table_name_trims_model_prefix() {
        assert_eq!(derive_table_name("ModelUser"), "user");
        assert_eq!(derive_table_name("Order"), "order");
    }

    #[test]
    fn decode_boolean_accepts_single_byte_fast_path() {
        assert_eq!(
            decode(&FieldInfo::bare("active", "boolean"), b"1").unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            decode(&FieldInfo::bare("active", "boolean"), b"0").unwrap(),
            Value::Bool(false)
        );
    }

    #[test]
    fn decode_rejects_unknown_sql_type() {
        let err = decode(&FieldInfo::bare("x", "geometry"), b"").unwrap_err();
        assert!(matches!(err, ScoopError::InvalidValue(_)));
    }
}
