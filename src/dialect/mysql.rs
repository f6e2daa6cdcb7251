use super::SqlDialect;
use crate::config::Config;

/// MySQL (and TiDB, which speaks the same wire protocol and SQL dialect).
pub(crate) struct MySqlDialect;

impl SqlDialect for MySqlDialect {
    fn quote(&self, identifier: &str) -> String {
        if identifier.starts_with('`') {
            return identifier.to_string();
        }
        format!("`{}`", identifier.replace('`', "``"))
    }

    fn insert_conflict_ignore(&self, base_insert_sql: &str) -> String {
        // "INSERT INTO ..." -> "INSERT IGNORE INTO ..."
        match base_insert_sql.strip_prefix("INSERT INTO ") {
            Some(rest) => format!("INSERT IGNORE INTO {}", rest),
            None => base_insert_sql.to_string(),
        }
    }

    fn conditional_keyword(&self) -> &'static str {
        "IF"
    }

    fn last_insert_id_sql(&self, _table: &str) -> Option<String> {
        Some("SELECT LAST_INSERT_ID()".to_string())
    }

    fn build_dsn(&self, config: &Config) -> String {
        format!(
            "mysql://{}:{}@{}:{}/{}?charset=utf8mb4&parseTime=True&loc=Local",
            config.username.as_deref().unwrap_or(""),
            config.password.as_deref().unwrap_or(""),
            config.address.as_deref().unwrap_or("127.0.0.1"),
            config.port.unwrap_or(3306),
            config.name.as_deref().unwrap_or(""),
        )
    }

    fn is_duplicate_key_error(&self, message: &str) -> bool {
        message.contains("Duplicate entry")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_with_backticks_and_escapes_existing() {
        let d = MySqlDialect;
        assert_eq!(d.quote("users"), "`users`");
        assert_eq!(d.quote("weird`name"), "`weird``name`");
    }

    #[test]
    fn ignore_insert_prepends_keyword() {
        let d = MySqlDialect;
        assert_eq!(
            d.insert_conflict_ignore("INSERT INTO `t` (`a`) VALUES (1)"),
            "INSERT IGNORE INTO `t` (`a`) VALUES (1)"
        );
    }

    #[test]
    fn detects_duplicate_key_message() {
        let d = MySqlDialect;
        assert!(d.is_duplicate_key_error("Error 1062: Duplicate entry '1' for key 'PRIMARY'"));
        assert!(!d.is_duplicate_key_error("Error 1146: Table doesn't exist"));
    }
}
