#![warn(missing_docs)]

//! # Error Module
//!
//! `scoop`'s error taxonomy. Soft errors ([`ScoopError::NotFound`],
//! [`ScoopError::DuplicateKey`]) are mapped from driver-specific strings so
//! callers never depend on a particular backend's wording; [`ScoopError::Driver`]
//! forwards anything else verbatim.
//!
//! Contract violations (`Programmer` in spec terms — empty table name, a
//! non-pointer/non-slice `out`, an empty update map, `$raw` misuse) are not
//! part of this enum: they panic, because they indicate mis-wiring rather
//! than a runtime condition a caller could reasonably recover from.

/// Errors that can cross the `scoop` boundary from a terminal operation.
#[derive(Debug, thiserror::Error)]
pub enum ScoopError {
    /// A single-row read matched zero rows.
    #[error("record not found")]
    NotFound,

    /// An `INSERT` violated a unique constraint.
    #[error("duplicate key: {0}")]
    DuplicateKey(String),

    /// An error surfaced by the underlying driver, forwarded verbatim.
    #[error("driver error: {0}")]
    Driver(String),

    /// Failure connecting to the backend.
    #[error("connection error: {0}")]
    Connection(String),

    /// A configuration or value was invalid in a way the caller should fix.
    #[error("invalid value: {0}")]
    InvalidValue(String),
}

impl ScoopError {
    /// Maps a raw driver error message to [`ScoopError::DuplicateKey`] when
    /// the given dialect recognizes it as a unique-constraint violation,
    /// otherwise wraps it as [`ScoopError::Driver`].
    pub fn from_driver(dialect: crate::dialect::Dialect, message: impl Into<String>) -> Self {
        let message = message.into();
        if dialect.behavior().is_duplicate_key_error(&message) {
            ScoopError::DuplicateKey(message)
        } else {
            ScoopError::Driver(message)
        }
    }
}

/// True if `err` is [`ScoopError::NotFound`].
pub fn is_not_found(err: &ScoopError) -> bool {
    matches!(err, ScoopError::NotFound)
}

/// True if `err` is [`ScoopError::DuplicateKey`].
pub fn is_duplicate_key(err: &ScoopError) -> bool {
    matches!(err, ScoopError::DuplicateKey(_))
}

impl From<sqlx::Error> for ScoopError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ScoopError::NotFound,
            other => ScoopError::Driver(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::Dialect;

    #[test]
    fn recognizes_mysql_duplicate_entry() {
        let err = ScoopError::from_driver(Dialect::MySQL, "Duplicate entry '1' for key 'PRIMARY'");
        assert!(is_duplicate_key(&err));
    }

    #[test]
    fn falls_back_to_driver_error() {
        let err = ScoopError::from_driver(Dialect::MySQL, "no such table: users");
        assert!(!is_duplicate_key(&err));
        assert!(!is_not_found(&err));
    }

    #[test]
    fn sqlx_row_not_found_maps_to_not_found() {
        let err: ScoopError = sqlx::Error::RowNotFound.into();
        assert!(is_not_found(&err));
    }
}
