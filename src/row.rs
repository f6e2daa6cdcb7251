#![warn(missing_docs)]

//! # Row Module
//!
//! Maps one [`crate::handle::QueryResult`] row onto a [`Record`] instance.
//! Grounded on the teacher's `extract_column_value` match-by-`data_type`
//! dispatch in `row/mod.rs`, generalized from a typed `sqlx::Row` accessor
//! to the driver-agnostic raw-bytes shape [`crate::handle::Row`] carries.

use tracing::warn;

use crate::error::ScoopError;
use crate::handle::Row as RawRow;
use crate::reflect::{self, Record};

/// Decodes one raw row into a fresh `T`, matching each returned column name
/// against `T`'s declared fields.
///
/// A column with no matching field is logged and skipped rather than
/// aborting the scan — the same tolerance the teacher's row mapper applies,
/// since `SELECT *` against a table with extra, unmapped columns should
/// still materialize the fields the struct does know about.
pub fn scan<T: Record>(columns: &[String], row: &RawRow) -> Result<T, ScoopError> {
    let mut record = T::blank();
    let fields = T::fields();

    for (idx, column_name) in columns.iter().enumerate() {
        let Some(field) = fields.iter().find(|f| f.column == column_name.as_str()) else {
            warn!(column = column_name.as_str(), "scoop: no matching field for column");
            continue;
        };
        if field.skip {
            continue;
        }

        let bytes = match row.get(idx) {
            Some(Some(bytes)) => bytes.as_slice(),
            Some(None) => {
                record.set_field(field.name, crate::value::Value::Null);
                continue;
            }
            None => continue,
        };

        let decoded = reflect::decode(field, bytes)?;
        record.set_field(field.name, decoded);
    }

    Ok(record)
}

/// Decodes every row in `rows` into `T`, in order.
pub fn scan_all<T: Record>(columns: &[String], rows: &[RawRow]) -> Result<Vec<T>, ScoopError> {
    rows.iter().map(|row| scan::<T>(columns, row)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reflect::FieldSpec;

    crate::define_record! {
        struct RowTestRecord {
            id: i64 => FieldSpec::new("integer").primary_key().auto_increment(),
            name: String => FieldSpec::new("text"),
        }
    }

    #[test]
    fn scan_maps_columns_by_name_and_tolerates_extras() {
        let columns = vec!["id".to_string(), "name".to_string(), "mystery".to_string()];
        let row: RawRow = vec![
            Some(b"7".to_vec()),
            Some(b"widget".to_vec()),
            Some(b"ignored".to_vec()),
        ];
        let record: RowTestRecord = scan(&columns, &row).unwrap();
        assert_eq!(record.id, 7);
        assert_eq!(record.name, "widget");
    }

    #[test]
    fn scan_treats_missing_bytes_as_null() {
        let columns = vec!["id".to_string(), "name".to_string()];
        let row: RawRow = vec![Some(b"1".to_vec()), None];
        let record: RowTestRecord = scan(&columns, &row).unwrap();
        assert_eq!(record.id, 1);
        assert_eq!(record.name, String::new());
    }
}
