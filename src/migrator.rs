#![warn(missing_docs)]

//! # Migrator Module
//!
//! Ensures each registered [`Record`] type's table exists and matches its
//! declared columns and indexes.
//!
//! Grounded on the teacher's `SchemaWrapper::to_create_sql` (CREATE TABLE
//! assembly) and `Database::{generate_migration_sql, adapt_sql_for_postgres,
//! adapt_sql_for_sqlite}` (dialect-specific DDL adaptation), generalized two
//! ways: the teacher picks exactly one backend at compile time and never
//! looks at what already exists, whereas this module (a) maps each abstract
//! [`FieldInfo::sql_type`] to its DDL spelling per dialect at runtime instead
//! of textually patching a MySQL-flavored baseline, since the field-level
//! schema here was never MySQL SQL text to begin with, and (b) adds the
//! reconciliation path (`AddColumn`, index diff/rebuild) the teacher never
//! needed because it always started from an empty database.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use tracing::warn;

use crate::dialect::Dialect;
use crate::error::ScoopError;
use crate::handle::{Handle, QueryResult, Row};
use crate::reflect::{self, FieldInfo, Record};

fn table_name_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_.]+$").unwrap())
}

/// Ensures `T`'s table exists and matches its declared schema, creating it
/// fresh or reconciling additive column/index differences as needed.
///
/// Called once per record type at [`crate::client::Client`] open.
pub async fn migrate<T: Record>(handle: &dyn Handle) -> Result<(), ScoopError> {
    let dialect = handle.dialect();
    let table = reflect::table_name::<T>();
    assert!(
        table_name_pattern().is_match(&table),
        "scoop: invalid table name {table:?}"
    );

    let existing = existing_columns(handle, dialect, &table).await?;

    if existing.is_empty() {
        let sql = create_table_sql::<T>(dialect, &table);
        for stmt in sql.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            handle.exec(stmt).await?;
        }
    } else {
        reconcile_columns::<T>(handle, dialect, &table, &existing).await?;
        reconcile_indexes::<T>(handle, dialect, &table).await?;
    }

    if dialect == Dialect::Sqlite {
        if let Err(err) = handle.exec("PRAGMA auto_vacuum = INCREMENTAL").await {
            tracing::debug!(?err, "scoop: sqlite auto_vacuum pragma failed, continuing");
        }
    }

    Ok(())
}

fn base_integer_type(dialect: Dialect, field: &FieldInfo) -> &'static str {
    match (dialect, field.sql_type) {
        (Dialect::ClickHouse, "bigint") => "Int64",
        (Dialect::ClickHouse, _) => "Int32",
        (_, "bigint") => "BIGINT",
        _ => "INT",
    }
}

/// Maps a field's abstract [`FieldInfo::sql_type`] to its dialect-native DDL
/// spelling, special-casing the auto-increment primary key per dialect: the
/// `INTEGER PRIMARY KEY` ROWID alias on SQLite, `AUTO_INCREMENT` on
/// MySQL/TiDB, `BIGSERIAL` on Postgres/GaussDB (§6's SQLite autoincrement
/// caveat — no `type:` override is attached here).
fn column_ddl_type(dialect: Dialect, field: &FieldInfo) -> String {
    if field.primary_key && field.auto_increment {
        return match dialect {
            Dialect::Sqlite => "INTEGER".to_string(),
            Dialect::MySQL | Dialect::TiDB => format!("{} AUTO_INCREMENT", base_integer_type(dialect, field)),
            Dialect::Postgres | Dialect::GaussDB => "BIGSERIAL".to_string(),
            Dialect::ClickHouse => base_integer_type(dialect, field).to_string(),
        };
    }

    let base: &str = match field.sql_type {
        "integer" | "int" => match dialect {
            Dialect::ClickHouse => "Int32",
            _ => "INT",
        },
        "bigint" => match dialect {
            Dialect::ClickHouse => "Int64",
            Dialect::Sqlite => "INTEGER",
            _ => "BIGINT",
        },
        "smallint" => match dialect {
            Dialect::ClickHouse => "Int16",
            Dialect::Sqlite => "INTEGER",
            _ => "SMALLINT",
        },
        "tinyint" => match dialect {
            Dialect::ClickHouse => "Int8",
            Dialect::Sqlite => "INTEGER",
            Dialect::Postgres | Dialect::GaussDB => "SMALLINT",
            _ => "TINYINT",
        },
        "real" | "float" => match dialect {
            Dialect::ClickHouse => "Float32",
            Dialect::Sqlite | Dialect::Postgres | Dialect::GaussDB => "REAL",
            _ => "FLOAT",
        },
        "double" | "numeric" | "decimal" => match dialect {
            Dialect::ClickHouse => "Float64",
            Dialect::Sqlite => "REAL",
            Dialect::Postgres | Dialect::GaussDB => "DOUBLE PRECISION",
            _ => "DOUBLE",
        },
        "boolean" | "bool" => match dialect {
            Dialect::ClickHouse => "UInt8",
            Dialect::Sqlite => "INTEGER",
            Dialect::Postgres | Dialect::GaussDB => "BOOLEAN",
            _ => "TINYINT(1)",
        },
        "uuid" => match dialect {
            Dialect::ClickHouse => "String",
            Dialect::Postgres | Dialect::GaussDB => "UUID",
            Dialect::Sqlite => "TEXT",
            _ => "CHAR(36)",
        },
        "varchar" | "char" => {
            return match dialect {
                Dialect::ClickHouse => "String".to_string(),
                Dialect::Sqlite => "TEXT".to_string(),
                _ => format!("VARCHAR({})", field.size.unwrap_or(255)),
            };
        }
        "text" => match dialect {
            Dialect::ClickHouse => "String",
            _ => "TEXT",
        },
        "blob" | "bytea" | "binary" => match dialect {
            Dialect::ClickHouse => "String",
            Dialect::Postgres | Dialect::GaussDB => "BYTEA",
            _ => "BLOB",
        },
        other => {
            warn!(sql_type = other, "scoop: unrecognized field sql_type, defaulting DDL to TEXT");
            match dialect {
                Dialect::ClickHouse => "String",
                _ => "TEXT",
            }
        }
    };
    base.to_string()
}

fn column_definition(dialect: Dialect, field: &FieldInfo) -> String {
    let mut def = format!("{} {}", dialect.quote(field.column), column_ddl_type(dialect, field));
    if field.primary_key {
        def.push_str(" PRIMARY KEY");
    }
    if !field.nullable && !field.primary_key {
        def.push_str(" NOT NULL");
    }
    if field.unique && !field.primary_key {
        def.push_str(" UNIQUE");
    }
    if let Some(default_sql) = field.default_sql {
        def.push_str(&format!(" DEFAULT {default_sql}"));
    }
    def
}

/// Groups each field's [`crate::reflect::IndexDecl`]s by name, in
/// declaration order, so fields sharing an index name form one composite
/// index.
fn declared_indexes(fields: &'static [FieldInfo]) -> Vec<(String, Vec<String>, bool)> {
    let mut order: Vec<String> = Vec::new();
    let mut by_name: HashMap<String, (Vec<String>, bool)> = HashMap::new();

    for field in fields {
        if field.skip {
            continue;
        }
        for decl in &field.indexes {
            let entry = by_name.entry(decl.name.to_string()).or_insert_with(|| {
                order.push(decl.name.to_string());
                (Vec::new(), decl.unique)
            });
            entry.0.push(field.column.to_string());
            entry.1 |= decl.unique;
        }
    }

    order
        .into_iter()
        .map(|name| {
            let (columns, unique) = by_name.remove(&name).unwrap();
            (name, columns, unique)
        })
        .collect()
}

fn create_index_sql(dialect: Dialect, table: &str, name: &str, columns: &[String], unique: bool) -> String {
    let kind = if unique { "UNIQUE INDEX" } else { "INDEX" };
    let cols = columns.iter().map(|c| dialect.quote(c)).collect::<Vec<_>>().join(", ");
    format!(
        "CREATE {} {} ON {} ({})",
        kind,
        dialect.quote(name),
        dialect.quote(table),
        cols
    )
}

fn drop_index_sql(dialect: Dialect, table: &str, name: &str) -> String {
    if dialect.is_mysql_family() {
        format!("DROP INDEX {} ON {}", dialect.quote(name), dialect.quote(table))
    } else {
        format!("DROP INDEX {}", dialect.quote(name))
    }
}

fn create_table_sql<T: Record>(dialect: Dialect, table: &str) -> String {
    let fields: Vec<&FieldInfo> = T::fields().iter().filter(|f| !f.skip).collect();
    let column_defs: Vec<String> = fields
        .iter()
        .map(|f| format!("    {}", column_definition(dialect, f)))
        .collect();

    let mut sql = format!("CREATE TABLE IF NOT EXISTS {} (\n", dialect.quote(table));
    sql.push_str(&column_defs.join(",\n"));
    sql.push_str("\n);");

    for (name, columns, unique) in declared_indexes(T::fields()) {
        sql.push_str("\n\n");
        sql.push_str(&create_index_sql(dialect, table, &name, &columns, unique));
        sql.push(';');
    }

    sql
}

fn column_index(result: &QueryResult, name: &str) -> Option<usize> {
    result.columns.iter().position(|c| c.eq_ignore_ascii_case(name))
}

fn cell_string(row: &Row, idx: usize) -> Option<String> {
    row.get(idx)
        .and_then(|cell| cell.as_ref())
        .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
}

/// The columns metadata reports for `table`, empty when the table does not
/// exist — used both as the existence check and the reconciliation baseline.
async fn existing_columns(handle: &dyn Handle, dialect: Dialect, table: &str) -> Result<Vec<String>, ScoopError> {
    let sql = match dialect {
        Dialect::Sqlite => format!("SELECT name FROM pragma_table_info('{table}')"),
        Dialect::MySQL | Dialect::TiDB => format!(
            "SELECT column_name FROM information_schema.columns \
             WHERE table_schema = database() AND table_name = '{table}'"
        ),
        Dialect::Postgres | Dialect::GaussDB => {
            format!("SELECT column_name FROM information_schema.columns WHERE table_name = '{table}'")
        }
        Dialect::ClickHouse => {
            format!("SELECT name FROM system.columns WHERE table = '{table}' AND database = currentDatabase()")
        }
    };
    let result = handle.query(&sql).await?;
    let idx = column_index(&result, "name")
        .or_else(|| column_index(&result, "column_name"))
        .unwrap_or(0);
    Ok(result.rows.iter().filter_map(|row| cell_string(row, idx)).collect())
}

async fn reconcile_columns<T: Record>(
    handle: &dyn Handle,
    dialect: Dialect,
    table: &str,
    existing: &[String],
) -> Result<(), ScoopError> {
    for field in T::fields() {
        if field.skip {
            continue;
        }
        if existing.iter().any(|c| c.eq_ignore_ascii_case(field.column)) {
            // MigrateColumn (driver-level, non-destructive type align) is a
            // deliberate no-op here: safely re-typing a live column across
            // six dialects needs ALTER/CAST semantics this crate doesn't
            // try to infer. "Already present" is treated as "already
            // correct"; AddColumn below covers genuinely new columns.
            continue;
        }
        let sql = format!("ALTER TABLE {} ADD COLUMN {}", dialect.quote(table), column_definition(dialect, field));
        handle.exec(&sql).await?;
    }
    Ok(())
}

async fn reconcile_indexes<T: Record>(handle: &dyn Handle, dialect: Dialect, table: &str) -> Result<(), ScoopError> {
    if dialect == Dialect::ClickHouse {
        return Ok(());
    }

    let declared = declared_indexes(T::fields());
    let existing = existing_indexes(handle, dialect, table).await?;

    for (name, columns, unique) in &declared {
        match existing.iter().find(|(existing_name, ..)| existing_name == name) {
            None => {
                let sql = create_index_sql(dialect, table, name, columns, *unique);
                handle.exec(&sql).await?;
            }
            Some((_, existing_columns, existing_unique)) => {
                if existing_columns == columns {
                    continue;
                }
                if *unique || *existing_unique {
                    warn!(
                        index = name.as_str(),
                        table, "scoop: declared index differs from an existing unique/primary index; not rebuilt"
                    );
                    continue;
                }

                let tx = handle.begin().await?;
                let outcome: Result<(), ScoopError> = async {
                    tx.exec(&drop_index_sql(dialect, table, name)).await?;
                    tx.exec(&create_index_sql(dialect, table, name, columns, *unique)).await?;
                    Ok(())
                }
                .await;
                match outcome {
                    Ok(()) => tx.commit().await?,
                    Err(err) => {
                        let _ = tx.rollback().await;
                        return Err(err);
                    }
                }
            }
        }
    }

    Ok(())
}

async fn existing_indexes(
    handle: &dyn Handle,
    dialect: Dialect,
    table: &str,
) -> Result<Vec<(String, Vec<String>, bool)>, ScoopError> {
    match dialect {
        Dialect::MySQL | Dialect::TiDB => {
            let sql = format!(
                "SELECT index_name, column_name, non_unique FROM information_schema.statistics \
                 WHERE table_schema = database() AND table_name = '{table}' AND index_name != 'PRIMARY' \
                 ORDER BY index_name, seq_in_index"
            );
            let result = handle.query(&sql).await?;
            Ok(group_mysql_indexes(&result))
        }
        Dialect::Postgres | Dialect::GaussDB => {
            let sql = format!("SELECT indexname, indexdef FROM pg_indexes WHERE tablename = '{table}'");
            let result = handle.query(&sql).await?;
            Ok(parse_postgres_indexes(&result, table))
        }
        Dialect::Sqlite => list_sqlite_indexes(handle, table).await,
        Dialect::ClickHouse => Ok(Vec::new()),
    }
}

fn group_mysql_indexes(result: &QueryResult) -> Vec<(String, Vec<String>, bool)> {
    let (Some(name_idx), Some(col_idx)) = (column_index(result, "index_name"), column_index(result, "column_name"))
    else {
        return Vec::new();
    };
    let unique_idx = column_index(result, "non_unique");

    let mut order: Vec<String> = Vec::new();
    let mut by_name: HashMap<String, (Vec<String>, bool)> = HashMap::new();
    for row in &result.rows {
        let Some(name) = cell_string(row, name_idx) else { continue };
        let Some(col) = cell_string(row, col_idx) else { continue };
        let unique = unique_idx
            .and_then(|i| cell_string(row, i))
            .map(|v| v.trim() == "0")
            .unwrap_or(false);
        let entry = by_name.entry(name.clone()).or_insert_with(|| {
            order.push(name.clone());
            (Vec::new(), unique)
        });
        entry.0.push(col);
    }

    order
        .into_iter()
        .map(|name| {
            let (columns, unique) = by_name.remove(&name).unwrap();
            (name, columns, unique)
        })
        .collect()
}

fn index_column_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\(([^)]*)\)\s*$").unwrap())
}

fn parse_postgres_indexes(result: &QueryResult, table: &str) -> Vec<(String, Vec<String>, bool)> {
    let (Some(name_idx), Some(def_idx)) = (column_index(result, "indexname"), column_index(result, "indexdef"))
    else {
        return Vec::new();
    };
    let pk_name = format!("{table}_pkey");
    let pattern = index_column_pattern();

    result
        .rows
        .iter()
        .filter_map(|row| {
            let name = cell_string(row, name_idx)?;
            if name == pk_name {
                return None;
            }
            let def = cell_string(row, def_idx)?;
            let unique = def.contains("UNIQUE INDEX");
            let columns = pattern
                .captures(&def)
                .map(|caps| caps[1].split(',').map(|c| c.trim().trim_matches('"').to_string()).collect())
                .unwrap_or_default();
            Some((name, columns, unique))
        })
        .collect()
}

async fn list_sqlite_indexes(handle: &dyn Handle, table: &str) -> Result<Vec<(String, Vec<String>, bool)>, ScoopError> {
    let list_sql = format!("SELECT name, \"unique\", origin FROM pragma_index_list('{table}')");
    let list = handle.query(&list_sql).await?;
    let Some(name_idx) = column_index(&list, "name") else {
        return Ok(Vec::new());
    };
    let unique_idx = column_index(&list, "unique");
    let origin_idx = column_index(&list, "origin");

    let mut out = Vec::new();
    for row in &list.rows {
        let Some(name) = cell_string(row, name_idx) else { continue };
        if origin_idx.and_then(|i| cell_string(row, i)).as_deref() == Some("pk") {
            continue;
        }
        let unique = unique_idx
            .and_then(|i| cell_string(row, i))
            .map(|v| v.trim() == "1")
            .unwrap_or(false);

        let info_sql = format!("SELECT name FROM pragma_index_info('{name}') ORDER BY seqno");
        let info = handle.query(&info_sql).await?;
        let Some(col_idx) = column_index(&info, "name") else {
            continue;
        };
        let columns = info.rows.iter().filter_map(|r| cell_string(r, col_idx)).collect();
        out.push((name, columns, unique));
    }
    Ok(out)
}
