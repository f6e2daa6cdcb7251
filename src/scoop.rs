#![warn(missing_docs)]

//! # Scoop Module
//!
//! `Scoop` is the fluent query scope: a builder accumulating selection,
//! filtering, ordering, pagination and transactional state, plus the
//! terminal operations (`find`, `first`, `create`, `update`, `delete`, ...)
//! that assemble raw SQL from that state and materialize rows back into
//! [`Record`] values.
//!
//! Grounded on the teacher's `operations/{query,insert,update,delete}.rs`
//! split, generalized from four typed, schema-bound structs (`Query<T, S>`,
//! `Insert<T>`, `Update<T, U>`, `Delete<T>`) into one untyped scope whose
//! terminal methods are generic over the record type instead of the scope
//! itself — the freeform `Cond`/`Value` shape spec.md calls for doesn't fit
//! the teacher's compile-time-typed `Filter`/`Select<T>` split.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

use regex::Regex;

use crate::cond::{Cond, IntoCondTerm};
use crate::dialect::Dialect;
use crate::error::ScoopError;
use crate::expression::Expression;
use crate::handle::Handle;
use crate::literal;
use crate::reflect::{self, Record};
use crate::row;
use crate::value::Value;

fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

fn table_name_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_.]+$").unwrap())
}

/// The outcome of a terminal mutation (`create`, `update`, `delete`, ...).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpResult {
    /// Rows affected by the statement.
    pub rows_affected: u64,
}

/// A raw `column = value` or `column = <expression>` assignment for
/// [`Scoop::update`], built up via [`UpdateSet::set`] / [`UpdateSet::set_expr`].
#[derive(Debug, Clone, Default)]
pub struct UpdateSet {
    entries: Vec<(String, SetValue)>,
}

#[derive(Debug, Clone)]
enum SetValue {
    Value(Value),
    Expr(Expression),
}

impl UpdateSet {
    /// An empty assignment set.
    pub fn new() -> Self {
        UpdateSet::default()
    }

    /// Assigns `column = value`.
    pub fn set(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.entries.push((column.into(), SetValue::Value(value.into())));
        self
    }

    /// Assigns `column = <expression>`, interpolating the expression's own
    /// args inline rather than binding them as a separate parameter.
    pub fn set_expr(mut self, column: impl Into<String>, expr: Expression) -> Self {
        self.entries.push((column.into(), SetValue::Expr(expr)));
        self
    }

    fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn has_column(&self, column: &str) -> bool {
        self.entries.iter().any(|(c, _)| c == column)
    }
}

/// What a [`Scoop::chunk`] callback may ask for besides "keep going".
#[derive(Debug)]
pub enum ChunkOutcome {
    /// Stop iterating without treating it as an error — the analogue of the
    /// source's `BatchesStop` sentinel (§6).
    Stop,
    /// Stop iterating and propagate `err` to the caller of `chunk`.
    Failed(ScoopError),
}

impl From<ScoopError> for ChunkOutcome {
    fn from(err: ScoopError) -> Self {
        ChunkOutcome::Failed(err)
    }
}

pub(crate) type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Pagination input for [`Scoop::find_by_page`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PageOptions {
    /// Row offset of the first record in the page.
    pub offset: u64,
    /// Maximum rows in the page.
    pub limit: u64,
    /// Whether to also compute the total row count matching the WHERE clause.
    pub show_total: bool,
}

/// The result of [`Scoop::find_by_page`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Paginate {
    /// Echoes [`PageOptions::offset`].
    pub offset: u64,
    /// Echoes [`PageOptions::limit`].
    pub limit: u64,
    /// Populated when [`PageOptions::show_total`] was set.
    pub total: Option<u64>,
}

/// The fluent query scope.
///
/// Every configurator consumes and returns `Self` for chaining. Terminal
/// operations are generic over the bound [`Record`] type rather than the
/// scope itself, so one `Scoop` can't accidentally be reused across two
/// unrelated record types mid-chain without saying which type it means at
/// the call that matters.
pub struct Scoop {
    handle: Arc<dyn Handle>,
    dialect: Dialect,
    table: Option<String>,
    cond: Cond,
    columns: Vec<String>,
    order_by: Vec<String>,
    group_by: Vec<String>,
    limit: Option<u64>,
    offset: Option<u64>,
    unscoped: bool,
    ignore: bool,
}

impl Scoop {
    /// A fresh Scoop talking through `handle`.
    pub fn new(handle: Arc<dyn Handle>) -> Self {
        let dialect = handle.dialect();
        Scoop {
            handle,
            dialect,
            table: None,
            cond: Cond::new(dialect).top_level(),
            columns: Vec::new(),
            order_by: Vec::new(),
            group_by: Vec::new(),
            limit: None,
            offset: None,
            unscoped: false,
            ignore: false,
        }
    }

    fn with_handle(handle: Arc<dyn Handle>, dialect: Dialect) -> Self {
        Scoop {
            handle,
            dialect,
            table: None,
            cond: Cond::new(dialect).top_level(),
            columns: Vec::new(),
            order_by: Vec::new(),
            group_by: Vec::new(),
            limit: None,
            offset: None,
            unscoped: false,
            ignore: false,
        }
    }

    /// Binds the target table to `T`'s derived (or overridden) table name,
    /// unless an explicit [`Scoop::table`] call already set one.
    pub fn model<T: Record>(mut self) -> Self {
        if self.table.is_none() {
            self.table = Some(reflect::table_name::<T>());
        }
        self
    }

    /// Explicitly names the target table, validated against `[A-Za-z0-9_.]+`.
    ///
    /// Panics (a Programmer-error contract violation, per §7) if `name`
    /// doesn't match.
    pub fn table(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        assert!(
            table_name_pattern().is_match(&name),
            "scoop: invalid table name {name:?}"
        );
        self.table = Some(name);
        self
    }

    /// Appends one AND-combined predicate term to the scope's condition.
    pub fn where_(mut self, term: impl IntoCondTerm) -> Self {
        self.cond = self.cond.push(term);
        self
    }

    /// Merges a prebuilt [`Cond`] (e.g. one built with [`crate::cond::or_where`])
    /// into the scope's condition as a single AND-combined fragment.
    pub fn cond(mut self, other: Cond) -> Self {
        self.cond = self.cond.push(other);
        self
    }

    /// Restricts the selected columns; `*` (the default) if never called.
    pub fn select(mut self, columns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Appends one `ORDER BY` clause fragment (e.g. `"created_at DESC"`).
    pub fn order_by(mut self, clause: impl Into<String>) -> Self {
        self.order_by.push(clause.into());
        self
    }

    /// Appends one `GROUP BY` clause fragment.
    pub fn group_by(mut self, clause: impl Into<String>) -> Self {
        self.group_by.push(clause.into());
        self
    }

    /// Sets `LIMIT`.
    pub fn limit(mut self, n: u64) -> Self {
        self.limit = Some(n);
        self
    }

    /// Sets `OFFSET`.
    pub fn offset(mut self, n: u64) -> Self {
        self.offset = Some(n);
        self
    }

    /// Suppresses the automatic soft-delete filter for this scope's terminal
    /// operations.
    pub fn unscoped(mut self) -> Self {
        self.unscoped = true;
        self
    }

    /// Requests the dialect's "insert, ignore conflicts" form for the next
    /// `create`/`create_in_batches` call.
    pub fn ignore(mut self) -> Self {
        self.ignore = true;
        self
    }

    /// Builds a dialect-aware conditional [`Expression`]: `IIF(cond, ?, ?)`
    /// on SQLite, `IF(cond, ?, ?)` elsewhere, with `then`/`else_` bound as
    /// the expression's own args rather than inlined (§8 S8) — feed it into
    /// [`UpdateSet::set_expr`] the same way a raw `Expression` is used.
    pub fn expr(&self, cond: impl Into<String>, then: impl Into<Value>, else_: impl Into<Value>) -> Expression {
        let sql = self.dialect.behavior().conditional(&cond.into(), "?", "?");
        Expression::new(sql, vec![then.into(), else_.into()])
    }

    fn resolve_table<T: Record>(&self) -> String {
        self.table.clone().unwrap_or_else(reflect::table_name::<T>)
    }

    /// The scope's condition plus, unless [`Scoop::unscoped`] was set and `T`
    /// declares a `deleted_at` column, the soft-delete filter `deleted_at = 0`
    /// (§4.4). Computed fresh per call rather than mutating `self.cond`, so
    /// calling a terminal operation twice on the same Scoop doesn't
    /// double-apply the filter.
    fn effective_cond<T: Record>(&self) -> Cond {
        if !self.unscoped && reflect::has_deleted_at::<T>() {
            self.cond.clone().push(("deleted_at", 0i64))
        } else {
            self.cond.clone()
        }
    }

    fn build_select_sql<T: Record>(&self) -> String {
        let table = self.resolve_table::<T>();
        let cond = self.effective_cond::<T>();

        let cols = if self.columns.is_empty() {
            "*".to_string()
        } else {
            self.columns
                .iter()
                .map(|c| self.dialect.quote_path(c))
                .collect::<Vec<_>>()
                .join(", ")
        };

        let mut sql = format!("SELECT {} FROM {}", cols, self.dialect.quote(&table));
        let where_clause = cond.to_string();
        if !where_clause.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&where_clause);
        }
        if !self.group_by.is_empty() {
            sql.push_str(" GROUP BY ");
            sql.push_str(&self.group_by.join(", "));
        }
        if !self.order_by.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&self.order_by.join(", "));
        }
        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        if let Some(offset) = self.offset {
            sql.push_str(&format!(" OFFSET {offset}"));
        }
        sql
    }

    /// `SELECT <cols|*> FROM <table> [WHERE ...] [GROUP BY ...] [ORDER BY ...]
    /// [LIMIT ...] [OFFSET ...]`, materializing every matching row into `out`.
    ///
    /// `out` is cleared first. A `skip`ped condition (§3) short-circuits
    /// before any SQL is issued, leaving `out` empty (invariant 9, §8).
    pub async fn find<T: Record>(&mut self, out: &mut Vec<T>) -> Result<(), ScoopError> {
        out.clear();
        if self.cond.is_skip() {
            return Ok(());
        }
        let sql = self.build_select_sql::<T>();
        let result = self.handle.query(&sql).await?;
        *out = row::scan_all::<T>(&result.columns, &result.rows)?;
        Ok(())
    }

    /// Like [`Scoop::find`] but forces `LIMIT 1 OFFSET 0` and returns
    /// [`ScoopError::NotFound`] on zero rows instead of leaving `out` untouched.
    pub async fn first<T: Record>(&mut self, out: &mut T) -> Result<(), ScoopError> {
        if self.cond.is_skip() {
            return Err(ScoopError::NotFound);
        }
        self.limit = Some(1);
        self.offset = Some(0);
        let sql = self.build_select_sql::<T>();
        let result = self.handle.query(&sql).await?;
        match result.rows.first() {
            None => Err(ScoopError::NotFound),
            Some(row) => {
                *out = row::scan::<T>(&result.columns, row)?;
                Ok(())
            }
        }
    }

    /// `SELECT COUNT(*) FROM <table> [WHERE ...] [GROUP BY ...]`.
    pub async fn count<T: Record>(&mut self) -> Result<u64, ScoopError> {
        if self.cond.is_skip() {
            return Ok(0);
        }
        let table = self.resolve_table::<T>();
        let cond = self.effective_cond::<T>();

        let mut sql = format!("SELECT COUNT(*) FROM {}", self.dialect.quote(&table));
        let where_clause = cond.to_string();
        if !where_clause.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&where_clause);
        }
        if !self.group_by.is_empty() {
            sql.push_str(" GROUP BY ");
            sql.push_str(&self.group_by.join(", "));
        }

        let result = self.handle.query(&sql).await?;
        Ok(first_count_value(&result))
    }

    /// `SELECT id ... LIMIT 1` when `T` has an `id` column, else
    /// `SELECT COUNT(*) ... LIMIT 1`.
    pub async fn exist<T: Record>(&mut self) -> Result<bool, ScoopError> {
        if self.cond.is_skip() {
            return Ok(false);
        }
        let table = self.resolve_table::<T>();
        let cond = self.effective_cond::<T>();
        let where_clause = cond.to_string();

        if reflect::has_id::<T>() {
            let mut sql = format!("SELECT id FROM {}", self.dialect.quote(&table));
            if !where_clause.is_empty() {
                sql.push_str(" WHERE ");
                sql.push_str(&where_clause);
            }
            sql.push_str(" LIMIT 1");
            let result = self.handle.query(&sql).await?;
            Ok(!result.rows.is_empty())
        } else {
            let mut sql = format!("SELECT COUNT(*) FROM {}", self.dialect.quote(&table));
            if !where_clause.is_empty() {
                sql.push_str(" WHERE ");
                sql.push_str(&where_clause);
            }
            sql.push_str(" LIMIT 1");
            let result = self.handle.query(&sql).await?;
            Ok(first_count_value(&result) > 0)
        }
    }

    /// Runs [`Scoop::find`] with `opt`'s offset/limit, and, when
    /// `opt.show_total` is set, also [`Scoop::count`] with the same WHERE.
    pub async fn find_by_page<T: Record>(
        &mut self,
        opt: PageOptions,
        out: &mut Vec<T>,
    ) -> Result<Paginate, ScoopError> {
        self.limit = Some(opt.limit);
        self.offset = Some(opt.offset);
        self.find::<T>(out).await?;
        let total = if opt.show_total {
            Some(self.count::<T>().await?)
        } else {
            None
        };
        Ok(Paginate {
            offset: opt.offset,
            limit: opt.limit,
            total,
        })
    }

    /// Pages through the scope's result set `size` rows at a time, invoking
    /// `f` with each page and its offset.
    ///
    /// Stops when a page comes back empty, or when `f` returns
    /// [`ChunkOutcome::Stop`] (no error propagated) or
    /// [`ChunkOutcome::Failed`] (propagated as-is). Matches invariant 6
    /// (§8): over a `K`-row result, `f` is called `ceil(K/size)` times with
    /// offsets `0, size, 2*size, ...` and sees `K` rows total.
    pub async fn chunk<T, F>(&mut self, size: u64, mut f: F) -> Result<(), ScoopError>
    where
        T: Record,
        F: FnMut(&[T], u64) -> BoxFuture<'static, Result<(), ChunkOutcome>>,
    {
        let mut offset = 0u64;
        loop {
            self.limit = Some(size);
            self.offset = Some(offset);
            let mut page: Vec<T> = Vec::new();
            self.find(&mut page).await?;
            if page.is_empty() {
                return Ok(());
            }
            let seen = page.len() as u64;
            match f(&page, offset).await {
                Ok(()) => {}
                Err(ChunkOutcome::Stop) => return Ok(()),
                Err(ChunkOutcome::Failed(err)) => return Err(err),
            }
            offset += seen;
        }
    }

    /// Inserts one record.
    ///
    /// Skips an auto-increment primary key left at zero, stamps any zero
    /// `auto_create_time`/`auto_update_time` column with `now()`, and
    /// substitutes `0` for a null `deleted_at`. On success, backfills a
    /// zero-valued `id` field from the dialect's LAST_INSERT_ID query, issued
    /// on the same underlying connection as the INSERT via
    /// [`Handle::exec_then_query`] (§9) — skipped entirely for dialects
    /// (ClickHouse) that don't support it.
    pub async fn create<T: Record>(&mut self, record: &mut T) -> Result<OpResult, ScoopError> {
        let table = self.resolve_table::<T>();
        let fields = T::fields();
        let now = now_unix();

        let mut columns = Vec::new();
        let mut values = Vec::new();

        for field in fields {
            if field.skip {
                continue;
            }
            let mut value = record.field_value(field.name);
            if field.primary_key && field.auto_increment && value.is_zero() {
                continue;
            }
            if (field.auto_create_time || field.auto_update_time) && value.is_zero() {
                value = Value::Int64(now);
                record.set_field(field.name, value.clone());
            } else if field.is_deleted_at && value.is_null() {
                value = Value::Int64(0);
                record.set_field(field.name, value.clone());
            }
            columns.push(field.column);
            values.push(value);
        }

        if columns.is_empty() {
            panic!("scoop: create has no columns to insert");
        }

        let quoted_columns = columns.iter().map(|c| self.dialect.quote(c)).collect::<Vec<_>>().join(", ");
        let rendered_values = values.iter().map(|v| literal::render(v, true)).collect::<Vec<_>>().join(", ");
        let insert_sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.dialect.quote(&table),
            quoted_columns,
            rendered_values
        );
        let insert_sql = if self.ignore {
            self.dialect.behavior().insert_conflict_ignore(&insert_sql)
        } else {
            insert_sql
        };

        let id_field = fields.iter().find(|f| f.name == "id");
        let needs_id_backfill = id_field.is_some_and(|_| record.field_value("id").is_zero());
        let id_sql = needs_id_backfill
            .then(|| self.dialect.behavior().last_insert_id_sql(&table))
            .flatten();

        // The id-backfill query must run on the *same* connection as the
        // INSERT (§9, §8 invariant 7) — `exec_then_query` pins one pooled
        // connection across both statements instead of the two independent
        // pool checkouts a plain `exec` + `query` pair would make.
        let rows_affected = if let Some(id_sql) = &id_sql {
            let (rows_affected, result) = self.handle.exec_then_query(&insert_sql, id_sql).await?;
            if let (Some(id_field), Some(Some(bytes))) =
                (id_field, result.rows.first().and_then(|row| row.first()))
            {
                if let Ok(decoded) = reflect::decode(id_field, bytes) {
                    record.set_field("id", decoded);
                }
            }
            rows_affected
        } else {
            self.handle.exec(&insert_sql).await?
        };

        Ok(OpResult { rows_affected })
    }

    /// Inserts `records` in batches of `batch_size`, accumulating
    /// `RowsAffected` across batches.
    ///
    /// The set of included columns (and which get auto-time/delete-sentinel
    /// treatment) is computed once from `records[0]` and reused for every
    /// row (§4.4 point 2) — this does not re-derive the schema per row.
    ///
    /// On the first batch that errors, the accumulated count-so-far travels
    /// alongside the error rather than being discarded, since a single
    /// `Result` can't carry both a partial success and a failure.
    pub async fn create_in_batches<T: Record>(
        &mut self,
        records: &mut [T],
        batch_size: usize,
    ) -> Result<OpResult, (OpResult, ScoopError)> {
        if records.is_empty() {
            return Ok(OpResult::default());
        }
        let batch_size = batch_size.max(1);
        let table = self.resolve_table::<T>();
        let now = now_unix();

        let included: Vec<_> = T::fields()
            .iter()
            .filter(|f| !f.skip)
            .filter(|f| !(f.primary_key && f.auto_increment && records[0].field_value(f.name).is_zero()))
            .collect();

        if included.is_empty() {
            panic!("scoop: create_in_batches has no columns to insert");
        }

        for record in records.iter_mut() {
            for field in &included {
                let value = record.field_value(field.name);
                if (field.auto_create_time || field.auto_update_time) && value.is_zero() {
                    record.set_field(field.name, Value::Int64(now));
                } else if field.is_deleted_at && value.is_null() {
                    record.set_field(field.name, Value::Int64(0));
                }
            }
        }

        let quoted_columns = included.iter().map(|f| self.dialect.quote(f.column)).collect::<Vec<_>>().join(", ");

        let mut total_affected = 0u64;
        for batch in records.chunks(batch_size) {
            let rows_sql: Vec<String> = batch
                .iter()
                .map(|record| {
                    let rendered = included
                        .iter()
                        .map(|f| literal::render(&record.field_value(f.name), true))
                        .collect::<Vec<_>>()
                        .join(", ");
                    format!("({rendered})")
                })
                .collect();

            let insert_sql = format!(
                "INSERT INTO {} ({}) VALUES {}",
                self.dialect.quote(&table),
                quoted_columns,
                rows_sql.join(", ")
            );
            let insert_sql = if self.ignore {
                self.dialect.behavior().insert_conflict_ignore(&insert_sql)
            } else {
                insert_sql
            };

            match self.handle.exec(&insert_sql).await {
                Ok(n) => total_affected += n,
                Err(err) => return Err((OpResult { rows_affected: total_affected }, err)),
            }
        }

        Ok(OpResult { rows_affected: total_affected })
    }

    /// Applies a raw column-to-value (or column-to-expression) assignment
    /// set. Forces `updated_at = now()` when `T` declares that column and
    /// `changes` didn't already set it.
    ///
    /// A `skip`ped condition returns `RowsAffected = 0` without issuing SQL.
    /// An empty `changes` is a contract violation a caller should fix, not a
    /// runtime condition — it's reported as [`ScoopError::InvalidValue`]
    /// rather than panicking, matching §7's documented "updateMap is empty"
    /// behavior.
    pub async fn update<T: Record>(&mut self, mut changes: UpdateSet) -> Result<OpResult, ScoopError> {
        if self.cond.is_skip() {
            return Ok(OpResult::default());
        }
        if changes.is_empty() {
            return Err(ScoopError::InvalidValue("updateMap is empty".to_string()));
        }
        if reflect::has_updated_at::<T>() && !changes.has_column("updated_at") {
            changes = changes.set("updated_at", now_unix());
        }

        let table = self.resolve_table::<T>();
        let assignments: Vec<String> = changes
            .entries
            .iter()
            .map(|(column, value)| {
                let quoted = self.dialect.quote(column);
                match value {
                    SetValue::Value(v) => format!("{quoted} = {}", literal::render(v, true)),
                    SetValue::Expr(e) => format!("{quoted} = {}", e.render()),
                }
            })
            .collect();

        let mut sql = format!("UPDATE {} SET {}", self.dialect.quote(&table), assignments.join(", "));
        let cond = self.effective_cond::<T>();
        let where_clause = cond.to_string();
        if !where_clause.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&where_clause);
        }

        let rows_affected = self.handle.exec(&sql).await?;
        Ok(OpResult { rows_affected })
    }

    /// Derives an [`UpdateSet`] from `record`'s non-zero, non-skipped,
    /// non-primary-key, non-auto-time fields and applies it via
    /// [`Scoop::update`].
    pub async fn update_model<T: Record>(&mut self, record: &T) -> Result<OpResult, ScoopError> {
        let mut set = UpdateSet::new();
        for field in T::fields() {
            if field.skip || field.primary_key || field.auto_create_time || field.auto_update_time {
                continue;
            }
            let value = record.field_value(field.name);
            if value.is_zero() {
                continue;
            }
            set = set.set(field.column, value);
        }
        if set.is_empty() {
            return Err(ScoopError::InvalidValue("no field to update".to_string()));
        }
        self.update::<T>(set).await
    }

    /// Soft-deletes (`UPDATE ... SET deleted_at = now()`) when `T` has a
    /// `deleted_at` column and the scope isn't [`Scoop::unscoped`]; otherwise
    /// issues a hard `DELETE FROM`. A `skip`ped condition returns
    /// `RowsAffected = 0` without issuing SQL.
    pub async fn delete<T: Record>(&mut self) -> Result<OpResult, ScoopError> {
        if self.cond.is_skip() {
            return Ok(OpResult::default());
        }
        let table = self.resolve_table::<T>();

        if !self.unscoped && reflect::has_deleted_at::<T>() {
            let now = now_unix();
            let mut sql = format!(
                "UPDATE {} SET {} = {now}",
                self.dialect.quote(&table),
                self.dialect.quote("deleted_at")
            );
            let cond = self.cond.clone().push(("deleted_at", 0i64));
            let where_clause = cond.to_string();
            if !where_clause.is_empty() {
                sql.push_str(" WHERE ");
                sql.push_str(&where_clause);
            }
            let rows_affected = self.handle.exec(&sql).await?;
            Ok(OpResult { rows_affected })
        } else {
            let mut sql = format!("DELETE FROM {}", self.dialect.quote(&table));
            let where_clause = self.cond.to_string();
            if !where_clause.is_empty() {
                sql.push_str(" WHERE ");
                sql.push_str(&where_clause);
            }
            let rows_affected = self.handle.exec(&sql).await?;
            Ok(OpResult { rows_affected })
        }
    }

    /// Begins a transaction, returning a fresh Scoop bound to it. The
    /// returned Scoop must not outlive the transaction.
    pub async fn begin(&self) -> Result<Scoop, ScoopError> {
        let tx_handle = self.handle.begin().await?;
        Ok(Scoop::with_handle(Arc::from(tx_handle), self.dialect))
    }

    /// Commits the transaction this Scoop was returned from [`Scoop::begin`].
    pub async fn commit(&self) -> Result<(), ScoopError> {
        self.handle.commit().await
    }

    /// Rolls back the transaction this Scoop was returned from [`Scoop::begin`].
    pub async fn rollback(&self) -> Result<(), ScoopError> {
        self.handle.rollback().await
    }

    /// Runs `logic` inside a fresh transaction, committing on `Ok` and
    /// rolling back on `Err`.
    pub async fn commit_or_rollback<F, Fut, R>(&self, logic: F) -> Result<R, ScoopError>
    where
        F: FnOnce(Scoop) -> Fut,
        Fut: Future<Output = Result<R, ScoopError>>,
    {
        let tx = self.begin().await?;
        match logic(Scoop::with_handle(Arc::clone(&tx.handle), tx.dialect)).await {
            Ok(value) => {
                tx.commit().await?;
                Ok(value)
            }
            Err(err) => {
                let _ = tx.rollback().await;
                Err(err)
            }
        }
    }
}

fn first_count_value(result: &crate::handle::QueryResult) -> u64 {
    result
        .rows
        .first()
        .and_then(|row| row.first())
        .and_then(|cell| cell.as_ref())
        .and_then(|bytes| std::str::from_utf8(bytes).ok())
        .and_then(|text| text.trim().parse::<u64>().ok())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::mock::MockHandle;
    use crate::handle::QueryResult;
    use crate::reflect::FieldSpec;

    crate::define_record! {
        struct ScoopUser {
            id: i64 => FieldSpec::new("integer").primary_key().auto_increment(),
            name: String => FieldSpec::new("text"),
            created_at: i64 => FieldSpec::new("integer").auto_create_time(),
            updated_at: i64 => FieldSpec::new("integer").auto_update_time(),
            deleted_at: i64 => FieldSpec::new("integer").deleted_at(),
        }
    }

    crate::define_record! {
        struct ScoopWidget {
            id: i64 => FieldSpec::new("integer").primary_key().auto_increment(),
            label: String => FieldSpec::new("text"),
        }
    }

    fn scoop_with(handle: MockHandle) -> (Scoop, Arc<MockHandle>) {
        let handle = Arc::new(handle);
        (Scoop::new(handle.clone() as Arc<dyn Handle>), handle)
    }

    #[tokio::test]
    async fn find_injects_soft_delete_filter_for_record_with_deleted_at() {
        let (mut scoop, handle) = scoop_with(MockHandle::new(Dialect::MySQL));
        let mut out: Vec<ScoopUser> = Vec::new();
        scoop.find::<ScoopUser>(&mut out).await.unwrap();
        assert!(handle.last_statement().contains("`deleted_at` = 0"));
    }

    #[tokio::test]
    async fn find_skips_soft_delete_filter_when_unscoped() {
        let (scoop, handle) = scoop_with(MockHandle::new(Dialect::MySQL));
        let mut scoop = scoop.unscoped();
        let mut out: Vec<ScoopUser> = Vec::new();
        scoop.find::<ScoopUser>(&mut out).await.unwrap();
        assert!(!handle.last_statement().contains("deleted_at"));
    }

    #[tokio::test]
    async fn find_skips_soft_delete_filter_for_record_without_it() {
        let (mut scoop, handle) = scoop_with(MockHandle::new(Dialect::MySQL));
        let mut out: Vec<ScoopWidget> = Vec::new();
        scoop.find::<ScoopWidget>(&mut out).await.unwrap();
        assert!(!handle.last_statement().contains("deleted_at"));
    }

    #[tokio::test]
    async fn skip_cond_short_circuits_without_issuing_sql() {
        let (scoop, handle) = scoop_with(MockHandle::new(Dialect::MySQL));
        let mut scoop = scoop.where_(false);
        let mut out: Vec<ScoopUser> = Vec::new();
        scoop.find::<ScoopUser>(&mut out).await.unwrap();
        assert!(out.is_empty());
        assert!(handle.statements().is_empty());
    }

    #[tokio::test]
    async fn first_returns_not_found_on_empty_result() {
        let (mut scoop, _handle) = scoop_with(MockHandle::new(Dialect::MySQL));
        let mut out = ScoopUser::blank();
        let err = scoop.first::<ScoopUser>(&mut out).await.unwrap_err();
        assert!(matches!(err, ScoopError::NotFound));
    }

    #[tokio::test]
    async fn first_forces_limit_one_offset_zero() {
        let (mut scoop, handle) = scoop_with(MockHandle::new(Dialect::MySQL));
        handle.push_query_result(QueryResult {
            columns: vec!["id".into(), "name".into(), "created_at".into(), "updated_at".into(), "deleted_at".into()],
            rows: vec![vec![
                Some(b"1".to_vec()),
                Some(b"ada".to_vec()),
                Some(b"10".to_vec()),
                Some(b"10".to_vec()),
                Some(b"0".to_vec()),
            ]],
        });
        let mut out = ScoopUser::blank();
        scoop.first::<ScoopUser>(&mut out).await.unwrap();
        assert_eq!(out.name, "ada");
        assert!(handle.last_statement().contains("LIMIT 1 OFFSET 0"));
    }

    #[tokio::test]
    async fn create_skips_zero_valued_auto_increment_key_and_stamps_times() {
        let (mut scoop, handle) = scoop_with(MockHandle::new(Dialect::MySQL));
        let mut user = ScoopUser::blank();
        user.name = "Ada".to_string();
        scoop.create(&mut user).await.unwrap();

        let sql = handle.statements().into_iter().next().unwrap();
        assert!(!sql.contains("`id`"), "auto-increment key should be omitted: {sql}");
        assert!(sql.contains("`deleted_at`"));
        assert!(user.created_at > 0);
        assert_eq!(user.deleted_at, 0);
    }

    #[tokio::test]
    async fn create_backfills_last_insert_id() {
        let (mut scoop, handle) = scoop_with(MockHandle::new(Dialect::MySQL));
        handle.push_exec_result(1);
        handle.push_query_result(QueryResult {
            columns: vec!["id".into()],
            rows: vec![vec![Some(b"42".to_vec())]],
        });
        let mut user = ScoopUser::blank();
        user.name = "Ada".to_string();
        scoop.create(&mut user).await.unwrap();
        assert_eq!(user.id, 42);
    }

    #[tokio::test]
    async fn create_skips_id_backfill_query_when_id_already_set() {
        let (mut scoop, handle) = scoop_with(MockHandle::new(Dialect::MySQL));
        let mut user = ScoopUser::blank();
        user.id = 9;
        user.name = "Ada".to_string();
        scoop.create(&mut user).await.unwrap();
        assert_eq!(
            handle.statements().len(),
            1,
            "no LAST_INSERT_ID query should be issued when the id field is already non-zero"
        );
    }

    #[tokio::test]
    async fn create_in_batches_accumulates_rows_affected() {
        let (mut scoop, handle) = scoop_with(MockHandle::new(Dialect::MySQL));
        handle.push_exec_result(2);
        handle.push_exec_result(2);
        handle.push_exec_result(1);
        let mut records: Vec<ScoopWidget> = (0..5)
            .map(|i| {
                let mut w = ScoopWidget::blank();
                w.label = format!("w{i}");
                w
            })
            .collect();
        let result = scoop.create_in_batches(&mut records, 2).await.unwrap();
        assert_eq!(result.rows_affected, 5);
        assert_eq!(handle.statements().len(), 3);
    }

    #[test]
    fn expr_renders_the_dialects_conditional_with_bound_args() {
        let (scoop, _handle) = scoop_with(MockHandle::new(Dialect::Sqlite));
        let e = scoop.expr("status = 1", "active", "inactive");
        assert_eq!(e.render(), "IIF(status = 1, 'active', 'inactive')");

        let (scoop, _handle) = scoop_with(MockHandle::new(Dialect::MySQL));
        let e = scoop.expr("status = 1", "active", "inactive");
        assert_eq!(e.render(), "IF(status = 1, 'active', 'inactive')");
    }

    #[tokio::test]
    async fn update_with_empty_set_is_an_error_not_a_panic() {
        let (mut scoop, _handle) = scoop_with(MockHandle::new(Dialect::MySQL));
        let err = scoop.update::<ScoopUser>(UpdateSet::new()).await.unwrap_err();
        assert!(matches!(err, ScoopError::InvalidValue(_)));
    }

    #[tokio::test]
    async fn update_forces_updated_at_when_record_has_the_column() {
        let (mut scoop, handle) = scoop_with(MockHandle::new(Dialect::MySQL));
        scoop.update::<ScoopUser>(UpdateSet::new().set("name", "Ada")).await.unwrap();
        assert!(handle.last_statement().contains("`updated_at` ="));
    }

    #[tokio::test]
    async fn update_honors_skip_without_issuing_sql() {
        let (scoop, handle) = scoop_with(MockHandle::new(Dialect::MySQL));
        let mut scoop = scoop.where_(false);
        let result = scoop.update::<ScoopUser>(UpdateSet::new().set("name", "Ada")).await.unwrap();
        assert_eq!(result.rows_affected, 0);
        assert!(handle.statements().is_empty());
    }

    #[tokio::test]
    async fn delete_soft_deletes_when_record_has_deleted_at() {
        let (mut scoop, handle) = scoop_with(MockHandle::new(Dialect::MySQL));
        scoop.delete::<ScoopUser>().await.unwrap();
        let sql = handle.last_statement();
        assert!(sql.starts_with("UPDATE"));
        assert!(sql.contains("`deleted_at` ="));
        assert!(sql.contains("`deleted_at` = 0"));
    }

    #[tokio::test]
    async fn delete_hard_deletes_when_record_has_no_deleted_at() {
        let (mut scoop, handle) = scoop_with(MockHandle::new(Dialect::MySQL));
        scoop.delete::<ScoopWidget>().await.unwrap();
        assert!(handle.last_statement().starts_with("DELETE FROM"));
    }

    #[tokio::test]
    async fn delete_unscoped_hard_deletes_even_with_deleted_at() {
        let (scoop, handle) = scoop_with(MockHandle::new(Dialect::MySQL));
        let mut scoop = scoop.unscoped();
        scoop.delete::<ScoopUser>().await.unwrap();
        assert!(handle.last_statement().starts_with("DELETE FROM"));
    }

    #[tokio::test]
    async fn count_parses_first_column_of_first_row() {
        let (mut scoop, handle) = scoop_with(MockHandle::new(Dialect::MySQL));
        handle.push_query_result(QueryResult {
            columns: vec!["COUNT(*)".into()],
            rows: vec![vec![Some(b"7".to_vec())]],
        });
        let n = scoop.count::<ScoopUser>().await.unwrap();
        assert_eq!(n, 7);
    }

    #[tokio::test]
    async fn exist_uses_id_projection_when_record_has_id() {
        let (mut scoop, handle) = scoop_with(MockHandle::new(Dialect::MySQL));
        handle.push_query_result(QueryResult {
            columns: vec!["id".into()],
            rows: vec![vec![Some(b"1".to_vec())]],
        });
        assert!(scoop.exist::<ScoopUser>().await.unwrap());
        assert!(handle.last_statement().starts_with("SELECT id"));
    }

    #[tokio::test]
    async fn chunk_pages_through_with_correct_offsets_and_total() {
        let (mut scoop, handle) = scoop_with(MockHandle::new(Dialect::MySQL));
        for rows in [2, 2, 1, 0] {
            let row_set = (0..rows)
                .map(|i| {
                    vec![
                        Some(i.to_string().into_bytes()),
                        Some(b"w".to_vec()),
                        Some(b"0".to_vec()),
                        Some(b"0".to_vec()),
                        Some(b"0".to_vec()),
                    ]
                })
                .collect();
            handle.push_query_result(QueryResult {
                columns: vec!["id".into(), "name".into(), "created_at".into(), "updated_at".into(), "deleted_at".into()],
                rows: row_set,
            });
        }

        let offsets = Arc::new(std::sync::Mutex::new(Vec::new()));
        let total = Arc::new(std::sync::Mutex::new(0u64));
        {
            let offsets = offsets.clone();
            let total = total.clone();
            scoop
                .chunk::<ScoopUser, _>(2, move |page, offset| {
                    offsets.lock().unwrap().push(offset);
                    *total.lock().unwrap() += page.len() as u64;
                    Box::pin(async { Ok(()) })
                })
                .await
                .unwrap();
        }

        assert_eq!(*offsets.lock().unwrap(), vec![0, 2, 4]);
        assert_eq!(*total.lock().unwrap(), 5);
    }

    #[tokio::test]
    async fn chunk_stop_outcome_ends_iteration_without_error() {
        let (mut scoop, handle) = scoop_with(MockHandle::new(Dialect::MySQL));
        handle.push_query_result(QueryResult {
            columns: vec!["id".into(), "name".into(), "created_at".into(), "updated_at".into(), "deleted_at".into()],
            rows: vec![vec![
                Some(b"1".to_vec()),
                Some(b"w".to_vec()),
                Some(b"0".to_vec()),
                Some(b"0".to_vec()),
                Some(b"0".to_vec()),
            ]],
        });
        let result = scoop
            .chunk::<ScoopUser, _>(2, |_page, _offset| Box::pin(async { Err(ChunkOutcome::Stop) }))
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn table_validates_identifier_shape() {
        let handle: Arc<dyn Handle> = Arc::new(MockHandle::new(Dialect::MySQL));
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            Scoop::new(handle).table("bad;table")
        }));
        assert!(result.is_err());
    }
}
