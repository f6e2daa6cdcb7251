use async_trait::async_trait;
use serde_json::Value as JsonValue;

use super::{Handle, QueryResult, Row as ResultRow};
use crate::config::Config;
use crate::dialect::Dialect;
use crate::error::ScoopError;

/// A [`Handle`] backed by the `clickhouse` crate, ClickHouse not being one
/// of `sqlx`'s `Any` backends.
///
/// ClickHouse has no transactional DML in the sense `begin`/`commit`/
/// `rollback` imply elsewhere; those three methods return
/// [`ScoopError::Driver`] rather than panicking, since a Migrator or Scoop
/// written against the generic `Handle` trait may call them speculatively.
pub struct ClickHouseHandle {
    client: clickhouse::Client,
    debug: bool,
}

impl ClickHouseHandle {
    pub(crate) async fn connect(config: &Config) -> Result<Self, ScoopError> {
        let dsn = Dialect::ClickHouse.behavior().build_dsn(config);
        let client = clickhouse::Client::default().with_url(dsn);
        let handle = ClickHouseHandle {
            client,
            debug: config.debug,
        };
        handle.ping().await?;
        Ok(handle)
    }

    fn log(&self, sql: &str) {
        if self.debug {
            tracing::debug!(sql, "scoop: executing statement");
        }
    }
}

#[async_trait]
impl Handle for ClickHouseHandle {
    async fn exec(&self, sql: &str) -> Result<u64, ScoopError> {
        self.log(sql);
        self.client
            .query(sql)
            .execute()
            .await
            .map_err(|e| ScoopError::Driver(e.to_string()))?;
        // ClickHouse's native protocol does not report an affected-row
        // count for DDL/DML the way a row-count-oriented driver does.
        Ok(0)
    }

    async fn query(&self, sql: &str) -> Result<QueryResult, ScoopError> {
        self.log(sql);
        let mut cursor = self
            .client
            .query(sql)
            .fetch_bytes("JSONEachRow")
            .map_err(|e| ScoopError::Driver(e.to_string()))?;

        let mut columns: Vec<String> = Vec::new();
        let mut rows: Vec<ResultRow> = Vec::new();

        while let Some(chunk) = cursor
            .next()
            .await
            .map_err(|e| ScoopError::Driver(e.to_string()))?
        {
            for line in chunk.split(|&b| b == b'\n') {
                if line.is_empty() {
                    continue;
                }
                let parsed: JsonValue = serde_json::from_slice(line)
                    .map_err(|e| ScoopError::InvalidValue(e.to_string()))?;
                let JsonValue::Object(map) = parsed else {
                    continue;
                };
                if columns.is_empty() {
                    columns = map.keys().cloned().collect();
                }
                let row = columns
                    .iter()
                    .map(|col| match map.get(col) {
                        None | Some(JsonValue::Null) => None,
                        Some(JsonValue::String(s)) => Some(s.clone().into_bytes()),
                        Some(other) => Some(other.to_string().into_bytes()),
                    })
                    .collect();
                rows.push(row);
            }
        }

        Ok(QueryResult { columns, rows })
    }

    async fn ping(&self) -> Result<(), ScoopError> {
        self.client
            .query("SELECT 1")
            .execute()
            .await
            .map_err(|e| ScoopError::Connection(e.to_string()))
    }

    async fn close(&self) {}

    async fn begin(&self) -> Result<Box<dyn Handle>, ScoopError> {
        Err(ScoopError::Driver(
            "clickhouse: transactions are not supported".to_string(),
        ))
    }

    async fn commit(&self) -> Result<(), ScoopError> {
        Err(ScoopError::Driver(
            "clickhouse: transactions are not supported".to_string(),
        ))
    }

    async fn rollback(&self) -> Result<(), ScoopError> {
        Err(ScoopError::Driver(
            "clickhouse: transactions are not supported".to_string(),
        ))
    }

    fn dialect(&self) -> Dialect {
        Dialect::ClickHouse
    }
}
