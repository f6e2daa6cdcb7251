use super::SqlDialect;
use crate::config::Config;

/// PostgreSQL (and GaussDB, which speaks the same wire protocol and SQL dialect).
pub(crate) struct PostgresDialect;

impl SqlDialect for PostgresDialect {
    fn quote(&self, identifier: &str) -> String {
        if identifier.starts_with('"') {
            return identifier.to_string();
        }
        format!("\"{}\"", identifier.replace('"', "\"\""))
    }

    fn insert_conflict_ignore(&self, base_insert_sql: &str) -> String {
        format!("{} ON CONFLICT DO NOTHING", base_insert_sql)
    }

    fn conditional_keyword(&self) -> &'static str {
        "IF"
    }

    fn last_insert_id_sql(&self, table: &str) -> Option<String> {
        Some(format!("SELECT currval('{}_id_seq')", table))
    }

    fn build_dsn(&self, config: &Config) -> String {
        let mut parts = vec![
            format!("host={}", config.address.as_deref().unwrap_or("127.0.0.1")),
            format!("port={}", config.port.unwrap_or(5432)),
            format!("user={}", config.username.as_deref().unwrap_or("")),
            format!("password={}", config.password.as_deref().unwrap_or("")),
            format!("dbname={}", config.name.as_deref().unwrap_or("")),
            "sslmode=disable".to_string(),
            "TimeZone=Asia/Shanghai".to_string(),
        ];

        for (key, value) in &config.extras {
            parts.push(format!("{}={}", key, value));
        }

        parts.join(" ")
    }

    fn is_duplicate_key_error(&self, message: &str) -> bool {
        message.contains("duplicate key value violates unique constraint")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_ignore_appends_on_conflict_clause() {
        let d = PostgresDialect;
        assert_eq!(
            d.insert_conflict_ignore("INSERT INTO \"t\" (\"a\") VALUES (1)"),
            "INSERT INTO \"t\" (\"a\") VALUES (1) ON CONFLICT DO NOTHING"
        );
    }

    #[test]
    fn last_insert_id_uses_table_specific_sequence() {
        let d = PostgresDialect;
        assert_eq!(
            d.last_insert_id_sql("users"),
            Some("SELECT currval('users_id_seq')".to_string())
        );
    }

    #[test]
    fn dsn_is_space_separated_keyword_pairs() {
        let config = Config {
            address: Some("db.internal".into()),
            name: Some("app".into()),
            username: Some("svc".into()),
            ..Default::default()
        };
        let dsn = PostgresDialect.build_dsn(&config);
        assert!(dsn.contains("host=db.internal"));
        assert!(dsn.contains("dbname=app"));
        assert!(dsn.contains("sslmode=disable"));
    }
}
