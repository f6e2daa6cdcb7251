#![warn(missing_docs)]

//! # Config Module
//!
//! Connection and pool configuration consumed by [`crate::client::Client`] at
//! open time. File loading is an external collaborator (§1 of the design) —
//! this module only describes the shape, with `serde::Deserialize` so an
//! embedding application can parse it out of TOML/JSON/env itself.

use std::collections::HashMap;

use crate::dialect::Dialect;

/// Connection and pool configuration.
///
/// Every field is optional except where noted; [`crate::client::Client`]
/// applies defaults at `open` time and treats the `Config` it was given as
/// frozen afterward.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    /// Which SQL dialect to speak. Defaults to [`Dialect::Sqlite`].
    #[serde(default)]
    pub r#type: Dialect,

    /// Network host, or filesystem directory for SQLite.
    pub address: Option<String>,
    /// Network port. Ignored for SQLite.
    pub port: Option<u16>,
    /// Database (or SQLite file stem) name.
    pub name: Option<String>,
    /// Authentication username.
    pub username: Option<String>,
    /// Authentication password.
    pub password: Option<String>,

    /// Extra key/value pairs merged verbatim into the DSN's query string.
    #[serde(default)]
    pub extras: HashMap<String, String>,

    /// Positive sets the pool's max open connections; zero leaves the driver
    /// default; negative disables the limit.
    pub max_open_conns: Option<i64>,
    /// Same tri-state rule as `max_open_conns`, for idle connections.
    pub max_idle_conns: Option<i64>,

    /// Enables per-statement trace logging via `tracing`.
    #[serde(default)]
    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            r#type: Dialect::Sqlite,
            address: None,
            port: None,
            name: None,
            username: None,
            password: None,
            extras: HashMap::new(),
            max_open_conns: None,
            max_idle_conns: None,
            debug: false,
        }
    }
}

impl serde::Serialize for Dialect {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let s = match self {
            Dialect::Sqlite => "sqlite",
            Dialect::MySQL => "mysql",
            Dialect::Postgres => "postgres",
            Dialect::ClickHouse => "clickhouse",
            Dialect::TiDB => "tidb",
            Dialect::GaussDB => "gaussdb",
        };
        serializer.serialize_str(s)
    }
}

impl<'de> serde::Deserialize<'de> for Dialect {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        match s.to_ascii_lowercase().as_str() {
            "sqlite" | "sqlite3" => Ok(Dialect::Sqlite),
            "mysql" => Ok(Dialect::MySQL),
            "postgres" | "postgresql" | "pg" => Ok(Dialect::Postgres),
            "clickhouse" => Ok(Dialect::ClickHouse),
            "tidb" => Ok(Dialect::TiDB),
            "gaussdb" | "gauss" => Ok(Dialect::GaussDB),
            other => Err(serde::de::Error::custom(format!(
                "unknown dialect: {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_dialect_is_sqlite() {
        assert_eq!(Config::default().r#type, Dialect::Sqlite);
    }

    #[test]
    fn deserializes_dialect_tags_case_insensitively() {
        #[derive(serde::Deserialize)]
        struct Wrapper {
            r#type: Dialect,
        }
        let w: Wrapper = serde_json::from_str(r#"{"type":"MySQL"}"#).unwrap();
        assert_eq!(w.r#type, Dialect::MySQL);
    }
}
