//! An in-memory [`Handle`] used by unit tests across `scoop`, `migrator` and
//! `client` so SQL-assembly behavior can be asserted without a live driver.
//!
//! Grounded on the teacher's own test style (`tests/database.rs` hits a real
//! MySQL instance) generalized one step further: since this crate speaks six
//! dialects from one binary, a recording fake stands in for "a real database
//! was reachable" the same way the teacher's tests assumed one was.

#![cfg(test)]

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{Handle, QueryResult};
use crate::dialect::Dialect;
use crate::error::ScoopError;

/// Records every statement it's asked to run and answers from two canned
/// queues (`exec` results, `query` results), FIFO.
pub(crate) struct MockHandle {
    dialect: Dialect,
    queries: Mutex<Vec<String>>,
    exec_results: Mutex<VecDeque<u64>>,
    query_results: Mutex<VecDeque<QueryResult>>,
}

impl MockHandle {
    pub(crate) fn new(dialect: Dialect) -> Self {
        MockHandle {
            dialect,
            queries: Mutex::new(Vec::new()),
            exec_results: Mutex::new(VecDeque::new()),
            query_results: Mutex::new(VecDeque::new()),
        }
    }

    pub(crate) fn push_exec_result(&self, rows_affected: u64) {
        self.exec_results.lock().unwrap().push_back(rows_affected);
    }

    pub(crate) fn push_query_result(&self, result: QueryResult) {
        self.query_results.lock().unwrap().push_back(result);
    }

    /// Every statement passed to `exec`/`query`, in call order.
    pub(crate) fn statements(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }

    pub(crate) fn last_statement(&self) -> String {
        self.queries.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

#[async_trait]
impl Handle for MockHandle {
    async fn exec(&self, sql: &str) -> Result<u64, ScoopError> {
        self.queries.lock().unwrap().push(sql.to_string());
        Ok(self.exec_results.lock().unwrap().pop_front().unwrap_or(1))
    }

    async fn query(&self, sql: &str) -> Result<QueryResult, ScoopError> {
        self.queries.lock().unwrap().push(sql.to_string());
        Ok(self.query_results.lock().unwrap().pop_front().unwrap_or_default())
    }

    async fn ping(&self) -> Result<(), ScoopError> {
        Ok(())
    }

    async fn close(&self) {}

    async fn begin(&self) -> Result<Box<dyn Handle>, ScoopError> {
        Ok(Box::new(MockHandle::new(self.dialect)))
    }

    async fn commit(&self) -> Result<(), ScoopError> {
        Ok(())
    }

    async fn rollback(&self) -> Result<(), ScoopError> {
        Ok(())
    }

    fn dialect(&self) -> Dialect {
        self.dialect
    }
}
