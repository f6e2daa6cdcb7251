#![warn(missing_docs)]

//! # Value Module
//!
//! A type-erased representation of a single column value, used by [`crate::cond`]
//! for predicate arguments, by [`crate::scoop`] for INSERT/UPDATE payloads, and
//! by [`crate::row`] for decoded results.

use std::fmt::{self, Display};

/// A type-erased database value.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// Text data.
    String(String),
    /// Raw bytes (BLOB-ish columns).
    Bytes(Vec<u8>),
    /// 8-bit signed integer.
    Int8(i8),
    /// 16-bit signed integer.
    Int16(i16),
    /// 32-bit signed integer.
    Int32(i32),
    /// 64-bit signed integer.
    Int64(i64),
    /// 8-bit unsigned integer.
    UInt8(u8),
    /// 16-bit unsigned integer.
    UInt16(u16),
    /// 32-bit unsigned integer.
    UInt32(u32),
    /// 64-bit unsigned integer.
    UInt64(u64),
    /// 32-bit floating point.
    Float32(f32),
    /// 64-bit floating point.
    Float64(f64),
    /// Boolean.
    Bool(bool),
    /// A JSON-serialized composite value (struct/map/slice column).
    Json(serde_json::Value),
    /// A homogeneous list of values, e.g. the right-hand side of `IN (...)`.
    Array(Vec<Value>),
    /// The bounds of a `BETWEEN ... AND ...` expression.
    Between(Box<Value>, Box<Value>),
    /// SQL `NULL`.
    Null,
}

impl Value {
    /// True for [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// True for every numeric variant representing the integer zero.
    ///
    /// Used by `Create` to decide whether an auto-increment primary key was
    /// left unset, and by `Update` to decide whether a struct field is "the
    /// zero value" and should be skipped.
    pub fn is_zero(&self) -> bool {
        match self {
            Value::Int8(v) => *v == 0,
            Value::Int16(v) => *v == 0,
            Value::Int32(v) => *v == 0,
            Value::Int64(v) => *v == 0,
            Value::UInt8(v) => *v == 0,
            Value::UInt16(v) => *v == 0,
            Value::UInt32(v) => *v == 0,
            Value::UInt64(v) => *v == 0,
            Value::Float32(v) => *v == 0.0,
            Value::Float64(v) => *v == 0.0,
            Value::Bool(v) => !*v,
            Value::String(v) => v.is_empty(),
            Value::Null => true,
            _ => false,
        }
    }

    /// Best-effort conversion to `i64`, used for LAST_INSERT_ID backfill.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int8(v) => Some(*v as i64),
            Value::Int16(v) => Some(*v as i64),
            Value::Int32(v) => Some(*v as i64),
            Value::Int64(v) => Some(*v),
            Value::UInt8(v) => Some(*v as i64),
            Value::UInt16(v) => Some(*v as i64),
            Value::UInt32(v) => Some(*v as i64),
            Value::UInt64(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{}", s),
            Value::Bytes(b) => write!(f, "{:?}", b),
            Value::Int8(v) => write!(f, "{}", v),
            Value::Int16(v) => write!(f, "{}", v),
            Value::Int32(v) => write!(f, "{}", v),
            Value::Int64(v) => write!(f, "{}", v),
            Value::UInt8(v) => write!(f, "{}", v),
            Value::UInt16(v) => write!(f, "{}", v),
            Value::UInt32(v) => write!(f, "{}", v),
            Value::UInt64(v) => write!(f, "{}", v),
            Value::Float32(v) => write!(f, "{}", v),
            Value::Float64(v) => write!(f, "{}", v),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Json(v) => write!(f, "{}", v),
            Value::Array(items) => write!(f, "{:?}", items),
            Value::Between(lo, hi) => write!(f, "BETWEEN {} AND {}", lo, hi),
            Value::Null => write!(f, "NULL"),
        }
    }
}

macro_rules! impl_from {
    ($variant:ident, $ty:ty) => {
        impl From<$ty> for Value {
            fn from(v: $ty) -> Self {
                Value::$variant(v)
            }
        }
    };
}

impl_from!(String, String);
impl_from!(Bytes, Vec<u8>);
impl_from!(Int8, i8);
impl_from!(Int16, i16);
impl_from!(Int32, i32);
impl_from!(Int64, i64);
impl_from!(UInt8, u8);
impl_from!(UInt16, u16);
impl_from!(UInt32, u32);
impl_from!(UInt64, u64);
impl_from!(Float32, f32);
impl_from!(Float64, f64);
impl_from!(Bool, bool);

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

/// The reverse of `Into<Value>`: decodes a `Value` back into a concrete
/// Rust type, used by generated `Record::set_field` implementations.
pub trait FromValue: Sized {
    /// Converts `value`, substituting the type's default for `Value::Null`.
    fn from_value(value: Value) -> Self;
}

macro_rules! impl_from_value {
    ($variant:ident, $ty:ty) => {
        impl FromValue for $ty {
            fn from_value(value: Value) -> Self {
                match value {
                    Value::$variant(v) => v,
                    Value::Null => <$ty>::default(),
                    other => panic!(
                        "scoop: expected {} value, found {:?}",
                        stringify!($variant),
                        other
                    ),
                }
            }
        }
    };
}

impl_from_value!(String, String);
impl_from_value!(Bytes, Vec<u8>);
impl_from_value!(Int8, i8);
impl_from_value!(Int16, i16);
impl_from_value!(Int32, i32);
impl_from_value!(Int64, i64);
impl_from_value!(UInt8, u8);
impl_from_value!(UInt16, u16);
impl_from_value!(UInt32, u32);
impl_from_value!(UInt64, u64);
impl_from_value!(Float32, f32);
impl_from_value!(Float64, f64);
impl_from_value!(Bool, bool);

impl<T> FromValue for Option<T>
where
    T: FromValue,
{
    fn from_value(value: Value) -> Self {
        match value {
            Value::Null => None,
            other => Some(T::from_value(other)),
        }
    }
}
