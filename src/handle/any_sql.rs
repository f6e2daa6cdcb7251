use async_trait::async_trait;
use sqlx::any::{install_default_drivers, AnyPoolOptions, AnyRow};
use sqlx::{Column, Row as _, Transaction, TypeInfo};
use tokio::sync::Mutex;
use tracing::debug;

use super::{Handle, QueryResult, Row as ResultRow};
use crate::config::Config;
use crate::dialect::Dialect;
use crate::error::ScoopError;

enum Conn {
    Pool(sqlx::AnyPool),
    Tx(Mutex<Option<Transaction<'static, sqlx::Any>>>),
}

/// A [`Handle`] backed by `sqlx`'s `Any` driver, covering SQLite, MySQL,
/// TiDB, Postgres and GaussDB from one pool type.
///
/// Grounded on the teacher's `Database { connection: Arc<Pool> }`, with the
/// single hard-coded pool type widened to `sqlx::AnyPool` and a transaction
/// variant added so `begin`/`commit`/`rollback` can hand back a Handle of
/// the same shape rather than a distinct type.
pub struct AnyHandle {
    dialect: Dialect,
    debug: bool,
    conn: Conn,
}

impl AnyHandle {
    pub(crate) async fn connect(dialect: Dialect, config: &Config) -> Result<Self, ScoopError> {
        install_default_drivers();
        let dsn = dialect.behavior().build_dsn(config);

        let mut options = AnyPoolOptions::new();
        if let Some(max_open) = config.max_open_conns {
            if max_open > 0 {
                options = options.max_connections(max_open as u32);
            }
        }
        if let Some(max_idle) = config.max_idle_conns {
            if max_idle > 0 {
                options = options.min_connections(max_idle as u32);
            }
        }

        let pool = options
            .connect(&dsn)
            .await
            .map_err(|e| ScoopError::Connection(e.to_string()))?;

        Ok(AnyHandle {
            dialect,
            debug: config.debug,
            conn: Conn::Pool(pool),
        })
    }

    fn log(&self, sql: &str) {
        if self.debug {
            debug!(sql, "scoop: executing statement");
        }
    }
}

fn row_to_bytes(row: &AnyRow) -> ResultRow {
    (0..row.columns().len())
        .map(|idx| column_bytes(row, idx))
        .collect()
}

fn rows_to_query_result(rows: &[AnyRow]) -> QueryResult {
    let columns = rows
        .first()
        .map(|row| row.columns().iter().map(|c| c.name().to_string()).collect())
        .unwrap_or_default();
    let rows = rows.iter().map(row_to_bytes).collect();
    QueryResult { columns, rows }
}

/// Extracts column `idx` of `row` as raw bytes, trying progressively wider
/// conversions until one succeeds; `None` means SQL `NULL`.
fn column_bytes(row: &AnyRow, idx: usize) -> Option<Vec<u8>> {
    let type_name = row.column(idx).type_info().name().to_ascii_uppercase();
    if type_name.contains("BLOB") || type_name.contains("BYTEA") || type_name.contains("BINARY") {
        return row.try_get::<Vec<u8>, _>(idx).ok();
    }
    if type_name.contains("BOOL") {
        return row
            .try_get::<bool, _>(idx)
            .ok()
            .map(|b| vec![if b { b'1' } else { b'0' }]);
    }
    if let Ok(v) = row.try_get::<i64, _>(idx) {
        return Some(v.to_string().into_bytes());
    }
    if let Ok(v) = row.try_get::<f64, _>(idx) {
        return Some(v.to_string().into_bytes());
    }
    if let Ok(v) = row.try_get::<String, _>(idx) {
        return Some(v.into_bytes());
    }
    row.try_get::<Vec<u8>, _>(idx).ok()
}

#[async_trait]
impl Handle for AnyHandle {
    async fn exec(&self, sql: &str) -> Result<u64, ScoopError> {
        self.log(sql);
        let rows_affected = match &self.conn {
            Conn::Pool(pool) => sqlx::query(sql)
                .execute(pool)
                .await
                .map_err(|e| ScoopError::from_driver(self.dialect, e.to_string()))?
                .rows_affected(),
            Conn::Tx(tx) => {
                let mut guard = tx.lock().await;
                let conn = guard
                    .as_mut()
                    .expect("scoop: handle used after commit/rollback");
                sqlx::query(sql)
                    .execute(&mut **conn)
                    .await
                    .map_err(|e| ScoopError::from_driver(self.dialect, e.to_string()))?
                    .rows_affected()
            }
        };
        Ok(rows_affected)
    }

    async fn query(&self, sql: &str) -> Result<QueryResult, ScoopError> {
        self.log(sql);
        let rows: Vec<AnyRow> = match &self.conn {
            Conn::Pool(pool) => sqlx::query(sql)
                .fetch_all(pool)
                .await
                .map_err(|e| ScoopError::from_driver(self.dialect, e.to_string()))?,
            Conn::Tx(tx) => {
                let mut guard = tx.lock().await;
                let conn = guard
                    .as_mut()
                    .expect("scoop: handle used after commit/rollback");
                sqlx::query(sql)
                    .fetch_all(&mut **conn)
                    .await
                    .map_err(|e| ScoopError::from_driver(self.dialect, e.to_string()))?
            }
        };

        Ok(rows_to_query_result(&rows))
    }

    async fn exec_then_query(&self, exec_sql: &str, query_sql: &str) -> Result<(u64, QueryResult), ScoopError> {
        self.log(exec_sql);
        match &self.conn {
            Conn::Pool(pool) => {
                let mut conn = pool.acquire().await.map_err(|e| ScoopError::Connection(e.to_string()))?;
                let rows_affected = sqlx::query(exec_sql)
                    .execute(&mut *conn)
                    .await
                    .map_err(|e| ScoopError::from_driver(self.dialect, e.to_string()))?
                    .rows_affected();
                if rows_affected == 0 {
                    return Ok((0, QueryResult::default()));
                }
                self.log(query_sql);
                let rows: Vec<AnyRow> = sqlx::query(query_sql)
                    .fetch_all(&mut *conn)
                    .await
                    .map_err(|e| ScoopError::from_driver(self.dialect, e.to_string()))?;
                Ok((rows_affected, rows_to_query_result(&rows)))
            }
            Conn::Tx(tx) => {
                let mut guard = tx.lock().await;
                let conn = guard
                    .as_mut()
                    .expect("scoop: handle used after commit/rollback");
                let rows_affected = sqlx::query(exec_sql)
                    .execute(&mut **conn)
                    .await
                    .map_err(|e| ScoopError::from_driver(self.dialect, e.to_string()))?
                    .rows_affected();
                if rows_affected == 0 {
                    return Ok((0, QueryResult::default()));
                }
                self.log(query_sql);
                let rows: Vec<AnyRow> = sqlx::query(query_sql)
                    .fetch_all(&mut **conn)
                    .await
                    .map_err(|e| ScoopError::from_driver(self.dialect, e.to_string()))?;
                Ok((rows_affected, rows_to_query_result(&rows)))
            }
        }
    }

    async fn ping(&self) -> Result<(), ScoopError> {
        match &self.conn {
            Conn::Pool(pool) => {
                use sqlx::Connection;
                let mut conn = pool
                    .acquire()
                    .await
                    .map_err(|e| ScoopError::Connection(e.to_string()))?;
                conn.ping().await.map_err(|e| ScoopError::Connection(e.to_string()))
            }
            Conn::Tx(_) => Ok(()),
        }
    }

    async fn close(&self) {
        if let Conn::Pool(pool) = &self.conn {
            pool.close().await;
        }
    }

    async fn begin(&self) -> Result<Box<dyn Handle>, ScoopError> {
        match &self.conn {
            Conn::Pool(pool) => {
                let tx = pool
                    .begin()
                    .await
                    .map_err(|e| ScoopError::from_driver(self.dialect, e.to_string()))?;
                Ok(Box::new(AnyHandle {
                    dialect: self.dialect,
                    debug: self.debug,
                    conn: Conn::Tx(Mutex::new(Some(tx))),
                }))
            }
            Conn::Tx(_) => panic!("scoop: nested transactions are not supported"),
        }
    }

    async fn commit(&self) -> Result<(), ScoopError> {
        match &self.conn {
            Conn::Tx(tx) => {
                let owned = tx.lock().await.take().expect("scoop: transaction already closed");
                owned
                    .commit()
                    .await
                    .map_err(|e| ScoopError::from_driver(self.dialect, e.to_string()))
            }
            Conn::Pool(_) => panic!("scoop: commit called on a Handle that is not a transaction"),
        }
    }

    async fn rollback(&self) -> Result<(), ScoopError> {
        match &self.conn {
            Conn::Tx(tx) => {
                let owned = tx.lock().await.take().expect("scoop: transaction already closed");
                owned
                    .rollback()
                    .await
                    .map_err(|e| ScoopError::from_driver(self.dialect, e.to_string()))
            }
            Conn::Pool(_) => panic!("scoop: rollback called on a Handle that is not a transaction"),
        }
    }

    fn dialect(&self) -> Dialect {
        self.dialect
    }
}
