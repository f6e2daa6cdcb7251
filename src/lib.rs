#![allow(dead_code)]

//! `scoop` is a condition DSL and query engine that builds and executes
//! parameterless SQL against SQLite, MySQL, Postgres, ClickHouse and their
//! wire-compatible cousins (TiDB, GaussDB), materializing rows back into
//! strongly-typed records.
//!
//! The three load-bearing pieces are [`cond::Cond`] (the predicate builder),
//! [`scoop::Scoop`] (the query scope), and [`reflect`] (schema caching and
//! row decoding). [`client::Client`] ties them together with connection
//! lifecycle and auto-migration.

pub mod client;
pub mod cond;
pub mod config;
pub mod dialect;
pub mod error;
pub mod expression;
pub mod handle;
pub mod literal;
pub mod migrator;
pub mod reflect;
pub mod row;
pub mod scoop;
pub mod typed_scope;
pub mod value;

pub use client::Client;
pub use cond::{Combinator, Cond};
pub use error::ScoopError;
pub use scoop::Scoop;
pub use value::Value;
