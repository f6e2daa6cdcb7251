#![warn(missing_docs)]

//! # Dialect Module
//!
//! A pure function table describing how each supported SQL backend wants its
//! identifiers quoted, its conflict-ignoring inserts spelled, its conditional
//! expressions written, and its last-insert-id retrieved.
//!
//! Unlike a single-backend query builder that picks one implementation at
//! compile time via a Cargo feature, [`Dialect`] is a plain runtime tag: one
//! binary can open a SQLite scope and a Postgres scope side by side.

mod clickhouse;
mod mysql;
mod postgres;
mod sqlite;

use crate::config::Config;

/// The closed set of SQL dialects this crate understands.
///
/// `TiDB` speaks the MySQL wire protocol and SQL dialect; `GaussDB` speaks
/// Postgres's. Both get their own tag (callers care which one they're
/// talking to for connection/DSN purposes) but share their SQL-generation
/// behavior with their upstream cousin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    /// SQLite, accessed through a local file.
    Sqlite,
    /// MySQL.
    MySQL,
    /// PostgreSQL.
    Postgres,
    /// ClickHouse, accessed over its native/HTTP protocol.
    ClickHouse,
    /// TiDB (MySQL wire-compatible).
    TiDB,
    /// GaussDB (Postgres wire-compatible).
    GaussDB,
}

impl Default for Dialect {
    fn default() -> Self {
        Dialect::Sqlite
    }
}

/// Behavior that varies across SQL backends.
///
/// Implementations are zero-sized; [`Dialect::behavior`] returns a `&'static
/// dyn SqlDialect` selected by tag instead of by Cargo feature.
pub trait SqlDialect: Send + Sync {
    /// Quote an identifier (table or column name) for this backend.
    ///
    /// Idempotent: quoting an already-quoted identifier returns it unchanged.
    fn quote(&self, identifier: &str) -> String;

    /// Quote a `table.column` path, quoting each side independently.
    fn quote_path(&self, path: &str) -> String {
        match path.split_once('.') {
            Some((table, column)) => format!("{}.{}", self.quote(table), self.quote(column)),
            None => self.quote(path),
        }
    }

    /// Rewrite a plain `INSERT INTO ... VALUES (...)` statement into this
    /// backend's "insert, ignore conflicts" form.
    fn insert_conflict_ignore(&self, base_insert_sql: &str) -> String;

    /// Render a conditional expression: `IIF(...)` for SQLite, `IF(...)`
    /// elsewhere.
    fn conditional(&self, cond: &str, then: &str, else_: &str) -> String {
        format!("{}({}, {}, {})", self.conditional_keyword(), cond, then, else_)
    }

    /// The bare keyword used by [`Self::conditional`].
    fn conditional_keyword(&self) -> &'static str;

    /// SQL to retrieve the last auto-increment id inserted on this
    /// connection, or `None` if the backend doesn't support it (ClickHouse).
    fn last_insert_id_sql(&self, table: &str) -> Option<String>;

    /// Build this backend's connection string from a [`Config`].
    fn build_dsn(&self, config: &Config) -> String;

    /// Whether `message` looks like a duplicate-key / unique-violation error
    /// from this backend's driver.
    fn is_duplicate_key_error(&self, message: &str) -> bool;
}

impl Dialect {
    /// Returns the quote character this dialect wraps identifiers in.
    pub fn quote_char(self) -> char {
        match self {
            Dialect::MySQL | Dialect::TiDB | Dialect::ClickHouse => '`',
            Dialect::Sqlite | Dialect::Postgres | Dialect::GaussDB => '"',
        }
    }

    /// Returns the static behavior table for this dialect.
    pub fn behavior(self) -> &'static dyn SqlDialect {
        match self {
            Dialect::Sqlite => &sqlite::SqliteDialect,
            Dialect::MySQL | Dialect::TiDB => &mysql::MySqlDialect,
            Dialect::Postgres | Dialect::GaussDB => &postgres::PostgresDialect,
            Dialect::ClickHouse => &clickhouse::ClickHouseDialect,
        }
    }

    /// Shorthand for `self.behavior().quote(identifier)`.
    pub fn quote(self, identifier: &str) -> String {
        self.behavior().quote(identifier)
    }

    /// Shorthand for `self.behavior().quote_path(path)`.
    pub fn quote_path(self, path: &str) -> String {
        self.behavior().quote_path(path)
    }

    /// True for the two MySQL-protocol-family dialects.
    pub fn is_mysql_family(self) -> bool {
        matches!(self, Dialect::MySQL | Dialect::TiDB)
    }

    /// True for the two Postgres-protocol-family dialects.
    pub fn is_postgres_family(self) -> bool {
        matches!(self, Dialect::Postgres | Dialect::GaussDB)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_is_idempotent() {
        for d in [
            Dialect::Sqlite,
            Dialect::MySQL,
            Dialect::Postgres,
            Dialect::ClickHouse,
            Dialect::TiDB,
            Dialect::GaussDB,
        ] {
            let once = d.quote("users");
            let twice = d.quote(&once);
            assert_eq!(once, twice, "{:?} quoting should be idempotent", d);
        }
    }

    #[test]
    fn quote_path_splits_on_first_dot() {
        assert_eq!(Dialect::MySQL.quote_path("users.name"), "`users`.`name`");
        assert_eq!(Dialect::Postgres.quote_path("users.name"), "\"users\".\"name\"");
    }

    #[test]
    fn tidb_and_gaussdb_reuse_wire_compatible_syntax() {
        assert_eq!(Dialect::TiDB.quote("x"), Dialect::MySQL.quote("x"));
        assert_eq!(Dialect::GaussDB.quote("x"), Dialect::Postgres.quote("x"));
    }
}
