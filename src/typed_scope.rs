#![warn(missing_docs)]

//! # TypedScope Module
//!
//! A generic wrapper around [`Scoop`] whose terminal operations return `T`
//! (or `Vec<T>`) directly instead of taking an out-parameter, plus the
//! composite operations (`first_or_create`, `create_or_update`) §7 describes
//! as the crate's only built-in retry.
//!
//! The teacher has no direct analogue — its four operation structs
//! (`Query<T, S>`, `Insert<T>`, `Update<T, U>`, `Delete<T>`) are already
//! per-type, so there's no untyped scope to wrap in the first place. This
//! module plays the role the teacher's per-type structs play, built on top
//! of [`Scoop`] rather than duplicating its SQL assembly.

use std::marker::PhantomData;

use crate::error::ScoopError;
use crate::reflect::Record;
use crate::scoop::{BoxFuture, ChunkOutcome, OpResult, PageOptions, Paginate, Scoop, UpdateSet};

/// A [`Scoop`] bound to a single record type `T`, exposing result-typed
/// operations.
pub struct TypedScope<T: Record> {
    scoop: Scoop,
    _marker: PhantomData<T>,
}

impl<T: Record> TypedScope<T> {
    /// Binds `scoop` to `T` via [`Scoop::model`].
    pub fn new(scoop: Scoop) -> Self {
        TypedScope {
            scoop: scoop.model::<T>(),
            _marker: PhantomData,
        }
    }

    /// Appends one AND-combined predicate term.
    pub fn where_(mut self, term: impl crate::cond::IntoCondTerm) -> Self {
        self.scoop = self.scoop.where_(term);
        self
    }

    /// Merges a prebuilt [`crate::cond::Cond`] into the scope's condition.
    pub fn cond(mut self, other: crate::cond::Cond) -> Self {
        self.scoop = self.scoop.cond(other);
        self
    }

    /// Restricts the selected columns.
    pub fn select(mut self, columns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.scoop = self.scoop.select(columns);
        self
    }

    /// Appends one `ORDER BY` clause fragment.
    pub fn order_by(mut self, clause: impl Into<String>) -> Self {
        self.scoop = self.scoop.order_by(clause);
        self
    }

    /// Appends one `GROUP BY` clause fragment.
    pub fn group_by(mut self, clause: impl Into<String>) -> Self {
        self.scoop = self.scoop.group_by(clause);
        self
    }

    /// Sets `LIMIT`.
    pub fn limit(mut self, n: u64) -> Self {
        self.scoop = self.scoop.limit(n);
        self
    }

    /// Sets `OFFSET`.
    pub fn offset(mut self, n: u64) -> Self {
        self.scoop = self.scoop.offset(n);
        self
    }

    /// Suppresses the automatic soft-delete filter.
    pub fn unscoped(mut self) -> Self {
        self.scoop = self.scoop.unscoped();
        self
    }

    /// Requests the dialect's "insert, ignore conflicts" form for the next
    /// `create`/`create_in_batches` call.
    pub fn ignore(mut self) -> Self {
        self.scoop = self.scoop.ignore();
        self
    }

    /// Every row matching the scope's condition.
    pub async fn find(&mut self) -> Result<Vec<T>, ScoopError> {
        let mut out = Vec::new();
        self.scoop.find::<T>(&mut out).await?;
        Ok(out)
    }

    /// The first matching row, or [`ScoopError::NotFound`].
    pub async fn first(&mut self) -> Result<T, ScoopError> {
        let mut out = T::blank();
        self.scoop.first::<T>(&mut out).await?;
        Ok(out)
    }

    /// See [`Scoop::count`].
    pub async fn count(&mut self) -> Result<u64, ScoopError> {
        self.scoop.count::<T>().await
    }

    /// See [`Scoop::exist`].
    pub async fn exist(&mut self) -> Result<bool, ScoopError> {
        self.scoop.exist::<T>().await
    }

    /// See [`Scoop::create`].
    pub async fn create(&mut self, record: &mut T) -> Result<OpResult, ScoopError> {
        self.scoop.create::<T>(record).await
    }

    /// See [`Scoop::create_in_batches`].
    pub async fn create_in_batches(
        &mut self,
        records: &mut [T],
        batch_size: usize,
    ) -> Result<OpResult, (OpResult, ScoopError)> {
        self.scoop.create_in_batches::<T>(records, batch_size).await
    }

    /// See [`Scoop::update`].
    pub async fn update(&mut self, changes: UpdateSet) -> Result<OpResult, ScoopError> {
        self.scoop.update::<T>(changes).await
    }

    /// See [`Scoop::update_model`].
    pub async fn update_model(&mut self, record: &T) -> Result<OpResult, ScoopError> {
        self.scoop.update_model::<T>(record).await
    }

    /// See [`Scoop::delete`].
    pub async fn delete(&mut self) -> Result<OpResult, ScoopError> {
        self.scoop.delete::<T>().await
    }

    /// See [`Scoop::find_by_page`].
    pub async fn find_by_page(&mut self, opt: PageOptions) -> Result<(Vec<T>, Paginate), ScoopError> {
        let mut out = Vec::new();
        let page = self.scoop.find_by_page::<T>(opt, &mut out).await?;
        Ok((out, page))
    }

    /// See [`Scoop::chunk`].
    pub async fn chunk<F>(&mut self, size: u64, f: F) -> Result<(), ScoopError>
    where
        F: FnMut(&[T], u64) -> BoxFuture<'static, Result<(), ChunkOutcome>>,
    {
        self.scoop.chunk::<T, F>(size, f).await
    }

    /// Reads the first matching row; if none exists, builds one via `build`
    /// and creates it.
    ///
    /// A [`ScoopError::DuplicateKey`] from a racing `create` (another writer
    /// won the race between the failed read and this call's insert) is
    /// treated as success: the row is re-read and returned rather than
    /// propagated, per §7's "internally translate DuplicateKey ... into a
    /// re-read" rule — the crate's only built-in retry.
    pub async fn first_or_create(&mut self, build: impl FnOnce() -> T) -> Result<T, ScoopError> {
        match self.first().await {
            Ok(existing) => Ok(existing),
            Err(ScoopError::NotFound) => {
                let mut record = build();
                match self.create(&mut record).await {
                    Ok(_) => Ok(record),
                    Err(ScoopError::DuplicateKey(_)) => self.first().await,
                    Err(err) => Err(err),
                }
            }
            Err(err) => Err(err),
        }
    }

    /// Attempts to insert `record`; on a racing duplicate key, falls back to
    /// [`TypedScope::update`] with `changes` instead, scoped by the
    /// condition already configured on this `TypedScope`.
    pub async fn create_or_update(
        &mut self,
        record: &mut T,
        changes: UpdateSet,
    ) -> Result<OpResult, ScoopError> {
        match self.create(record).await {
            Ok(result) => Ok(result),
            Err(ScoopError::DuplicateKey(_)) => self.update(changes).await,
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::Dialect;
    use crate::handle::mock::MockHandle;
    use crate::handle::{Handle, QueryResult};
    use crate::reflect::FieldSpec;
    use std::sync::Arc;

    crate::define_record! {
        struct TypedWidget {
            id: i64 => FieldSpec::new("integer").primary_key().auto_increment(),
            label: String => FieldSpec::new("text"),
        }
    }

    fn typed_scope(handle: MockHandle) -> (TypedScope<TypedWidget>, Arc<MockHandle>) {
        let handle = Arc::new(handle);
        let scoop = Scoop::new(handle.clone() as Arc<dyn Handle>);
        (TypedScope::new(scoop), handle)
    }

    #[tokio::test]
    async fn find_returns_typed_rows() {
        let (mut scope, handle) = typed_scope(MockHandle::new(Dialect::MySQL));
        handle.push_query_result(QueryResult {
            columns: vec!["id".into(), "label".into()],
            rows: vec![vec![Some(b"1".to_vec()), Some(b"widget".to_vec())]],
        });
        let rows = scope.find().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].label, "widget");
    }

    #[tokio::test]
    async fn first_or_create_builds_when_missing() {
        let (mut scope, _handle) = typed_scope(MockHandle::new(Dialect::MySQL));
        let record = scope
            .first_or_create(|| {
                let mut w = TypedWidget::blank();
                w.label = "fresh".to_string();
                w
            })
            .await
            .unwrap();
        assert_eq!(record.label, "fresh");
    }

    #[tokio::test]
    async fn first_or_create_returns_existing_row_without_creating() {
        let (mut scope, handle) = typed_scope(MockHandle::new(Dialect::MySQL));
        handle.push_query_result(QueryResult {
            columns: vec!["id".into(), "label".into()],
            rows: vec![vec![Some(b"1".to_vec()), Some(b"existing".to_vec())]],
        });
        let record = scope
            .first_or_create(|| {
                let mut w = TypedWidget::blank();
                w.label = "fresh".to_string();
                w
            })
            .await
            .unwrap();
        assert_eq!(record.label, "existing");
        assert_eq!(handle.statements().len(), 1);
    }
}
