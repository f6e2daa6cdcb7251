#![warn(missing_docs)]

//! Per-field schema metadata and the trait every mapped struct implements.
//!
//! [`FieldSpec`] is the chainable tag builder [`crate::define_record!`]
//! expands field attributes into, grounded on the teacher's `Column<T>`
//! builder (`primary_key()`, `not_null()`, `unique()`, `auto_increment()`,
//! ...). Unlike the teacher's generic `Column<T>`, a `FieldSpec` carries no
//! type parameter — the Rust field type is already known from the struct
//! definition itself, so the spec only needs to describe what varies.

use crate::error::ScoopError;
use crate::value::Value;

/// An index declared on a field via `.indexed(name)` / `.unique_index(name)`.
#[derive(Debug, Clone)]
pub struct IndexDecl {
    /// Index name. Several fields sharing a name form a composite index.
    pub name: &'static str,
    /// Whether the index enforces uniqueness.
    pub unique: bool,
}

/// A column-level constraint carried forward from the teacher's
/// `ColumnValidators` as an ambient nicety; the spec neither requires nor
/// forbids validating input before it reaches the driver.
#[derive(Debug, Clone, Copy)]
pub enum Validator {
    /// The string must look like `user@host`.
    Email,
    /// The string must parse as an `http(s)://` URL.
    Url,
    /// Minimum string length, inclusive.
    MinLen(u32),
    /// Maximum string length, inclusive.
    MaxLen(u32),
    /// Minimum numeric value, inclusive.
    Min(f64),
    /// Maximum numeric value, inclusive.
    Max(f64),
}

impl Validator {
    /// Checks `value` against this constraint.
    pub fn check(&self, field: &str, value: &Value) -> Result<(), ScoopError> {
        match (self, value) {
            (Validator::Email, Value::String(s)) => {
                if s.contains('@') && s.split('@').nth(1).is_some_and(|host| host.contains('.')) {
                    Ok(())
                } else {
                    Err(ScoopError::InvalidValue(format!("{field}: not a valid email")))
                }
            }
            (Validator::Url, Value::String(s)) => {
                if s.starts_with("http://") || s.starts_with("https://") {
                    Ok(())
                } else {
                    Err(ScoopError::InvalidValue(format!("{field}: not a valid url")))
                }
            }
            (Validator::MinLen(n), Value::String(s)) => {
                if s.chars().count() as u32 >= *n {
                    Ok(())
                } else {
                    Err(ScoopError::InvalidValue(format!("{field}: shorter than {n}")))
                }
            }
            (Validator::MaxLen(n), Value::String(s)) => {
                if s.chars().count() as u32 <= *n {
                    Ok(())
                } else {
                    Err(ScoopError::InvalidValue(format!("{field}: longer than {n}")))
                }
            }
            (Validator::Min(n), other) => match other.as_i64() {
                Some(v) if (v as f64) < *n => Err(ScoopError::InvalidValue(format!("{field}: below minimum {n}"))),
                _ => Ok(()),
            },
            (Validator::Max(n), other) => match other.as_i64() {
                Some(v) if (v as f64) > *n => Err(ScoopError::InvalidValue(format!("{field}: above maximum {n}"))),
                _ => Ok(()),
            },
            _ => Ok(()),
        }
    }
}

/// A chainable builder for a field's schema tags, consumed by
/// [`FieldInfo::from_spec`].
#[derive(Debug, Clone)]
pub struct FieldSpec {
    sql_type: &'static str,
    nullable: bool,
    unique: bool,
    primary_key: bool,
    auto_increment: bool,
    auto_create_time: bool,
    auto_update_time: bool,
    is_deleted_at: bool,
    size: Option<u32>,
    default_sql: Option<&'static str>,
    json_serializer: bool,
    column: Option<&'static str>,
    skip: bool,
    indexes: Vec<IndexDecl>,
    validators: Vec<Validator>,
}

impl FieldSpec {
    /// Starts a spec for a column of the given SQL type, nullable by default.
    pub fn new(sql_type: &'static str) -> Self {
        FieldSpec {
            sql_type,
            nullable: true,
            unique: false,
            primary_key: false,
            auto_increment: false,
            auto_create_time: false,
            auto_update_time: false,
            is_deleted_at: false,
            size: None,
            default_sql: None,
            json_serializer: false,
            column: None,
            skip: false,
            indexes: Vec::new(),
            validators: Vec::new(),
        }
    }

    /// Marks the column primary key (implies `NOT NULL`, excludes it from UPDATE).
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    /// Marks the column `NOT NULL`.
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Marks the column `UNIQUE`.
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// The column receives its value from the dialect on INSERT.
    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    /// The column is set to the current UNIX second on INSERT when zero.
    pub fn auto_create_time(mut self) -> Self {
        self.auto_create_time = true;
        self
    }

    /// The column is forced to the current UNIX second on every UPDATE.
    pub fn auto_update_time(mut self) -> Self {
        self.auto_update_time = true;
        self
    }

    /// Marks this as the `deleted_at` soft-delete sentinel column.
    pub fn deleted_at(mut self) -> Self {
        self.is_deleted_at = true;
        self
    }

    /// Suggests a string-column length.
    pub fn size(mut self, n: u32) -> Self {
        self.size = Some(n);
        self
    }

    /// Sets a literal SQL default expression.
    pub fn default_sql(mut self, sql: &'static str) -> Self {
        self.default_sql = Some(sql);
        self
    }

    /// Marks the column a JSON blob (`serializer:json`): composite values
    /// are marshalled on write and unmarshalled on read.
    pub fn json(mut self) -> Self {
        self.json_serializer = true;
        self
    }

    /// Overrides the derived column name.
    pub fn column(mut self, name: &'static str) -> Self {
        self.column = Some(name);
        self
    }

    /// Excludes the field from reads and writes entirely (`-`).
    pub fn skip(mut self) -> Self {
        self.skip = true;
        self
    }

    /// Declares a (non-unique) index on this field.
    pub fn indexed(mut self, name: &'static str) -> Self {
        self.indexes.push(IndexDecl { name, unique: false });
        self
    }

    /// Declares a unique index on this field.
    pub fn unique_index(mut self, name: &'static str) -> Self {
        self.indexes.push(IndexDecl { name, unique: true });
        self
    }

    /// Requires the field to look like an email address.
    pub fn email(mut self) -> Self {
        self.validators.push(Validator::Email);
        self
    }

    /// Requires the field to look like an `http(s)://` URL.
    pub fn url(mut self) -> Self {
        self.validators.push(Validator::Url);
        self
    }

    /// Requires a minimum string length.
    pub fn min_len(mut self, n: u32) -> Self {
        self.validators.push(Validator::MinLen(n));
        self
    }

    /// Requires a maximum string length.
    pub fn max_len(mut self, n: u32) -> Self {
        self.validators.push(Validator::MaxLen(n));
        self
    }

    /// Requires a minimum numeric value.
    pub fn min(mut self, n: f64) -> Self {
        self.validators.push(Validator::Min(n));
        self
    }

    /// Requires a maximum numeric value.
    pub fn max(mut self, n: f64) -> Self {
        self.validators.push(Validator::Max(n));
        self
    }
}

/// Per-field schema metadata, the `Record`-side counterpart to a column.
///
/// One instance per struct field, assembled by [`crate::define_record!`]
/// from the field's declared tags (§6 of the design).
#[derive(Debug, Clone)]
pub struct FieldInfo {
    /// The struct field name.
    pub name: &'static str,
    /// The SQL column name (defaults to `name`, overridable via `.column(..)`).
    pub column: &'static str,
    /// The SQL type used both for DDL and for `reflect::decode` dispatch.
    pub sql_type: &'static str,
    /// Whether the column allows `NULL`.
    pub nullable: bool,
    /// Whether the column carries a `UNIQUE` constraint directly (distinct
    /// from a named unique index).
    pub unique: bool,
    /// Whether the column is (part of) the primary key.
    pub primary_key: bool,
    /// Whether the column receives its value from the dialect on INSERT.
    pub auto_increment: bool,
    /// Whether the column is set to `now()` on INSERT when zero.
    pub auto_create_time: bool,
    /// Whether the column is forced to `now()` on every UPDATE.
    pub auto_update_time: bool,
    /// Whether this is the `deleted_at` soft-delete sentinel column.
    pub is_deleted_at: bool,
    /// A suggested string-column length, if any.
    pub size: Option<u32>,
    /// A literal SQL default expression, if any.
    pub default_sql: Option<&'static str>,
    /// Whether the column is a JSON blob (`serializer:json`).
    pub json_serializer: bool,
    /// Indexes this field participates in.
    pub indexes: Vec<IndexDecl>,
    /// Whether the field is excluded from reads/writes entirely (`-`).
    pub skip: bool,
    /// Validators applied before a value reaches the driver.
    pub validators: Vec<Validator>,
}

impl FieldInfo {
    /// Assembles a `FieldInfo` from a field name and its [`FieldSpec`].
    pub fn from_spec(name: &'static str, spec: FieldSpec) -> Self {
        FieldInfo {
            name,
            column: spec.column.unwrap_or(name),
            sql_type: spec.sql_type,
            nullable: spec.nullable,
            unique: spec.unique,
            primary_key: spec.primary_key,
            auto_increment: spec.auto_increment,
            auto_create_time: spec.auto_create_time,
            auto_update_time: spec.auto_update_time,
            is_deleted_at: spec.is_deleted_at,
            size: spec.size,
            default_sql: spec.default_sql,
            json_serializer: spec.json_serializer,
            indexes: spec.indexes,
            skip: spec.skip,
            validators: spec.validators,
        }
    }

    /// A minimal `FieldInfo` with every flag false and no constraints,
    /// useful for ad hoc decode tests.
    pub fn bare(name: &'static str, sql_type: &'static str) -> Self {
        FieldInfo::from_spec(name, FieldSpec::new(sql_type))
    }
}

/// A struct mapped onto a SQL table.
///
/// Implemented by hand or, idiomatically, generated by
/// [`crate::define_record!`]. `Scoop`, `Reflector` and `Migrator` all go
/// through this trait rather than touching struct fields directly.
pub trait Record: Send + Sync + Sized + 'static {
    /// The table name this type maps to, absent an explicit override.
    fn table_name() -> String;

    /// The full, declaration-order field list.
    fn fields() -> &'static [FieldInfo];

    /// Reads one field's current value out of `self`.
    fn field_value(&self, field: &str) -> Value;

    /// Writes a decoded value into `self`.
    fn set_field(&mut self, field: &str, value: Value);

    /// Builds a zero-valued instance, used as the scan target for each row.
    fn blank() -> Self;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_validator_rejects_missing_at_or_dot() {
        assert!(Validator::Email.check("email", &Value::String("a@b.com".into())).is_ok());
        assert!(Validator::Email.check("email", &Value::String("not-an-email".into())).is_err());
    }

    #[test]
    fn min_len_validator() {
        assert!(Validator::MinLen(3).check("name", &Value::String("ab".into())).is_err());
        assert!(Validator::MinLen(3).check("name", &Value::String("abc".into())).is_ok());
    }

    #[test]
    fn spec_builder_chains_into_field_info() {
        let field = FieldInfo::from_spec("email", FieldSpec::new("text").unique().max_len(255).email());
        assert!(field.unique);
        assert_eq!(field.validators.len(), 2);
    }
}
