#![warn(missing_docs)]

//! # Handle Module
//!
//! A dialect-agnostic driver abstraction. `Scoop`, `Migrator` and `Client`
//! talk to this trait rather than to `sqlx`/`clickhouse` directly, the same
//! way the teacher's `Database` held an `Arc<Pool>` behind one field —
//! generalized here to two transport families instead of one hard-coded
//! pool type.

mod any_sql;
mod clickhouse;
#[cfg(test)]
pub(crate) mod mock;

pub use any_sql::AnyHandle;
pub use clickhouse::ClickHouseHandle;

use async_trait::async_trait;

use crate::config::Config;
use crate::dialect::Dialect;
use crate::error::ScoopError;

/// One result row: one `Option<Vec<u8>>` per column, `None` standing in for
/// SQL `NULL`. Fed directly into [`crate::reflect::decode`].
pub type Row = Vec<Option<Vec<u8>>>;

/// The column names and raw row bytes returned by [`Handle::query`].
#[derive(Debug, Clone, Default)]
pub struct QueryResult {
    /// Column names in positional order.
    pub columns: Vec<String>,
    /// One entry per returned row.
    pub rows: Vec<Row>,
}

/// A dialect-agnostic connection or transaction handle.
///
/// Implementations wrap either an `sqlx::AnyPool`/`AnyConnection`
/// (SQLite/MySQL/TiDB/Postgres/GaussDB) or a `clickhouse::Client`
/// (ClickHouse). `async-trait` makes the trait `dyn`-safe, since Scoop and
/// Migrator hold a `Box<dyn Handle>` rather than being generic over the
/// backend.
#[async_trait]
pub trait Handle: Send + Sync {
    /// Executes a statement with no result set, returning rows affected.
    async fn exec(&self, sql: &str) -> Result<u64, ScoopError>;

    /// Executes a SELECT, returning its columns and raw row bytes.
    async fn query(&self, sql: &str) -> Result<QueryResult, ScoopError>;

    /// Executes `exec_sql`, then — only if it affected at least one row —
    /// runs `query_sql` against the very same underlying connection, not
    /// just the same `Handle`.
    ///
    /// Required for LAST_INSERT_ID-style backfills (§9's design note, §8
    /// invariant 7): a pooled `Handle`'s plain `exec` and `query` may each
    /// acquire a *different* pooled connection, and `LAST_INSERT_ID()` /
    /// `last_insert_rowid()` read back from the wrong connection return
    /// stale or zero data. The default implementation here just chains
    /// `exec`/`query`, which is correct for handles where a single call is
    /// already pinned to one connection (an active transaction, or
    /// ClickHouse's connectionless HTTP client) — [`AnyHandle`] overrides it
    /// to hold one pooled connection across both statements.
    async fn exec_then_query(&self, exec_sql: &str, query_sql: &str) -> Result<(u64, QueryResult), ScoopError> {
        let rows_affected = self.exec(exec_sql).await?;
        let result = if rows_affected > 0 {
            self.query(query_sql).await?
        } else {
            QueryResult::default()
        };
        Ok((rows_affected, result))
    }

    /// Verifies the connection is alive.
    async fn ping(&self) -> Result<(), ScoopError>;

    /// Releases the underlying connection or pool.
    async fn close(&self);

    /// Begins a transaction, returning a Handle bound to it. Calling this
    /// on a Handle that is already inside a transaction is a programmer
    /// error (nested transactions are not supported) and panics.
    async fn begin(&self) -> Result<Box<dyn Handle>, ScoopError>;

    /// Commits the transaction this Handle was returned from `begin`.
    async fn commit(&self) -> Result<(), ScoopError>;

    /// Rolls back the transaction this Handle was returned from `begin`.
    async fn rollback(&self) -> Result<(), ScoopError>;

    /// The dialect this Handle speaks.
    fn dialect(&self) -> Dialect;
}

/// Opens a [`Handle`] for `config`, dispatching to the `sqlx::Any` pool for
/// every dialect except ClickHouse.
pub async fn open(config: &Config) -> Result<Box<dyn Handle>, ScoopError> {
    match config.r#type {
        Dialect::ClickHouse => Ok(Box::new(ClickHouseHandle::connect(config).await?)),
        dialect => Ok(Box::new(AnyHandle::connect(dialect, config).await?)),
    }
}
