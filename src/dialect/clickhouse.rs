use super::SqlDialect;
use crate::config::Config;

pub(crate) struct ClickHouseDialect;

impl SqlDialect for ClickHouseDialect {
    fn quote(&self, identifier: &str) -> String {
        if identifier.starts_with('`') {
            return identifier.to_string();
        }
        format!("`{}`", identifier.replace('`', "``"))
    }

    fn insert_conflict_ignore(&self, base_insert_sql: &str) -> String {
        // ClickHouse has no conflict-ignoring insert form; plain INSERT.
        base_insert_sql.to_string()
    }

    fn conditional_keyword(&self) -> &'static str {
        "IF"
    }

    fn last_insert_id_sql(&self, _table: &str) -> Option<String> {
        // ClickHouse tables have no auto-increment concept; skip ID backfill.
        None
    }

    fn build_dsn(&self, config: &Config) -> String {
        let mut auth = String::new();
        if let Some(user) = &config.username {
            auth.push_str(user);
            if let Some(password) = &config.password {
                auth.push(':');
                auth.push_str(password);
            }
            auth.push('@');
        }

        format!(
            "clickhouse://{}{}:{}/{}?dial_timeout=10s&read_timeout=300s",
            auth,
            config.address.as_deref().unwrap_or("127.0.0.1"),
            config.port.unwrap_or(9000),
            config.name.as_deref().unwrap_or("default"),
        )
    }

    fn is_duplicate_key_error(&self, _message: &str) -> bool {
        // ClickHouse tables are typically append-only / engine-specific;
        // there's no generic unique-constraint violation to detect.
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_conflict_ignore_is_a_no_op() {
        let d = ClickHouseDialect;
        let sql = "INSERT INTO `events` (`id`) VALUES (1)";
        assert_eq!(d.insert_conflict_ignore(sql), sql);
    }

    #[test]
    fn last_insert_id_unsupported() {
        assert_eq!(ClickHouseDialect.last_insert_id_sql("events"), None);
    }

    #[test]
    fn dsn_includes_auth_when_present() {
        let config = Config {
            username: Some("default".into()),
            address: Some("ch.internal".into()),
            name: Some("analytics".into()),
            ..Default::default()
        };
        let dsn = ClickHouseDialect.build_dsn(&config);
        assert_eq!(dsn, "clickhouse://default@ch.internal:9000/analytics?dial_timeout=10s&read_timeout=300s");
    }
}
