#![warn(missing_docs)]

//! # Client Module
//!
//! Connection lifecycle: applies [`Config`] defaults, opens the dialect's
//! [`Handle`], configures the pool, auto-migrates registered record types,
//! and hands out fresh [`Scoop`]/[`TypedScope`] instances.
//!
//! Grounded on the teacher's `Database::connect`/`register_table`
//! (`database/mod.rs`), extended with pool-size config (already applied at
//! the `Handle` layer, §4.7), auto-migrate-at-open, and a `Drop`-based
//! teardown — the teacher never closes its pool at all; this is a
//! straightforward generalization of "the Client owns the pool" to "the
//! Client also releases it deterministically" (§4.7, §1's process-exit hook).

use std::sync::Arc;

use crate::config::Config;
use crate::dialect::Dialect;
use crate::error::ScoopError;
use crate::handle::{self, Handle};
use crate::migrator;
use crate::reflect::Record;
use crate::scoop::Scoop;
use crate::typed_scope::TypedScope;

/// Owns a [`Handle`] for the lifetime of the process (or until [`Client::close`]
/// is called explicitly), and is the entry point for building [`Scoop`]s.
///
/// Cloning a `Client` is cheap: the underlying `Handle` is reference-counted,
/// the same way the teacher's `Database` shares one `Arc<Pool>` across every
/// `Query`/`Insert`/`Update`/`Delete` it hands out.
#[derive(Clone)]
pub struct Client {
    handle: Arc<dyn Handle>,
    dialect: Dialect,
}

impl Client {
    /// Opens a connection for `config`, applying pool defaults and the
    /// dialect's DSN shape.
    ///
    /// Does not auto-migrate anything by itself — call [`Client::auto_migrate`]
    /// (or the [`crate::auto_migrates!`] macro for several types at once) for
    /// each record type the caller wants reconciled, mirroring the teacher's
    /// explicit `register_table::<T>()` step rather than scanning a global
    /// registry implicitly.
    pub async fn open(config: Config) -> Result<Self, ScoopError> {
        let handle = handle::open(&config).await?;
        let dialect = handle.dialect();
        Ok(Client {
            handle: Arc::from(handle),
            dialect,
        })
    }

    /// The dialect this Client's connection speaks.
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// A fresh, untyped [`Scoop`] sharing this Client's connection.
    pub fn new_scope(&self) -> Scoop {
        Scoop::new(Arc::clone(&self.handle))
    }

    /// A fresh [`TypedScope`] bound to `T`, sharing this Client's connection.
    pub fn model<T: Record>(&self) -> TypedScope<T> {
        TypedScope::new(self.new_scope())
    }

    /// Creates `T`'s table if absent, or reconciles additive column/index
    /// differences if it already exists (§4.6).
    pub async fn auto_migrate<T: Record>(&self) -> Result<(), ScoopError> {
        migrator::migrate::<T>(self.handle.as_ref()).await
    }

    /// Verifies the underlying connection is alive.
    pub async fn ping(&self) -> Result<(), ScoopError> {
        self.handle.ping().await
    }

    /// Exposes the raw [`Handle`] for operations outside this crate's
    /// surface (context-aware / cancellable driver calls are an explicit
    /// external collaborator per §5).
    pub fn raw_handle(&self) -> Arc<dyn Handle> {
        Arc::clone(&self.handle)
    }

    /// Releases the underlying connection pool.
    ///
    /// Idempotent: calling this more than once, or letting the last `Client`
    /// clone drop without calling it, both release cleanly — `Handle::close`
    /// is safe to call on an already-closed pool by construction (it just
    /// drops connections that are already gone).
    pub async fn close(&self) {
        self.handle.close().await;
    }

    #[cfg(test)]
    fn from_handle(handle: Arc<dyn Handle>) -> Self {
        let dialect = handle.dialect();
        Client { handle, dialect }
    }
}

/// Runs [`Client::auto_migrate`] for each listed type in turn against
/// `$client`, stopping at the first failure — the compatibility layer for
/// the source's variadic `AutoMigrate(t...)` (§4.7), expressed as a macro
/// since each type argument needs its own monomorphized call rather than a
/// single function iterating a heterogeneous list at runtime.
///
/// ```ignore
/// scoop::auto_migrates!(client, User, Order, Product)?;
/// ```
#[macro_export]
macro_rules! auto_migrates {
    ($client:expr, $($record:ty),+ $(,)?) => {{
        async {
            $(
                $client.auto_migrate::<$record>().await?;
            )+
            Ok::<(), $crate::error::ScoopError>(())
        }
    }};
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::define_record;
    use crate::handle::mock::MockHandle;
    use crate::handle::QueryResult;
    use crate::reflect::FieldSpec;

    define_record! {
        struct ClientTestUser {
            id: i64 => FieldSpec::new("integer").primary_key().auto_increment(),
            name: String => FieldSpec::new("text"),
            created_at: i64 => FieldSpec::new("integer").auto_create_time(),
            updated_at: i64 => FieldSpec::new("integer").auto_update_time(),
            deleted_at: i64 => FieldSpec::new("integer").deleted_at(),
        }
    }

    #[tokio::test]
    async fn ping_delegates_to_the_handle() {
        let client = Client::from_handle(Arc::new(MockHandle::new(Dialect::Sqlite)));
        client.ping().await.expect("ping");
    }

    #[tokio::test]
    async fn auto_migrate_creates_table_when_absent() {
        let mock = Arc::new(MockHandle::new(Dialect::Sqlite));
        let client = Client::from_handle(mock.clone());
        client.auto_migrate::<ClientTestUser>().await.expect("migrate");
        assert!(mock.statements().iter().any(|s| s.starts_with("CREATE TABLE IF NOT EXISTS")));
    }

    #[tokio::test]
    async fn new_scope_and_model_inherit_the_handles_dialect() {
        let client = Client::from_handle(Arc::new(MockHandle::new(Dialect::MySQL)));
        assert_eq!(client.dialect(), Dialect::MySQL);
        let mut user = ClientTestUser::blank();
        user.name = "Ada".to_string();
        let result = client.model::<ClientTestUser>().create(&mut user).await.expect("create");
        assert_eq!(result.rows_affected, 1);
    }

    #[tokio::test]
    async fn create_then_first_round_trips_through_a_shared_handle() {
        let mock = Arc::new(MockHandle::new(Dialect::MySQL));
        mock.push_exec_result(1);
        mock.push_query_result(QueryResult {
            columns: vec!["id".to_string()],
            rows: vec![vec![Some(b"7".to_vec())]],
        });
        mock.push_query_result(QueryResult {
            columns: vec!["id".to_string(), "name".to_string()],
            rows: vec![vec![Some(b"7".to_vec()), Some(b"Ada".to_vec())]],
        });
        let client = Client::from_handle(mock);

        let mut user = ClientTestUser::blank();
        user.name = "Ada".to_string();
        client.model::<ClientTestUser>().create(&mut user).await.expect("create");
        assert_eq!(user.id, 7);

        let found = client
            .model::<ClientTestUser>()
            .where_(("id", user.id))
            .first()
            .await
            .expect("first");
        assert_eq!(found.name, "Ada");
    }

    #[tokio::test]
    async fn cloned_client_shares_the_same_handle() {
        let mock = Arc::new(MockHandle::new(Dialect::Sqlite));
        let client = Client::from_handle(mock.clone());
        let clone = client.clone();
        clone.ping().await.expect("ping via clone");
        clone.auto_migrate::<ClientTestUser>().await.expect("migrate via clone");
        assert!(mock.statements().iter().any(|s| s.starts_with("CREATE TABLE IF NOT EXISTS")));
    }

    #[tokio::test]
    async fn raw_handle_exposes_the_same_dialect() {
        let client = Client::from_handle(Arc::new(MockHandle::new(Dialect::Postgres)));
        assert_eq!(client.raw_handle().dialect(), Dialect::Postgres);
    }
}
