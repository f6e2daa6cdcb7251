use super::SqlDialect;
use crate::config::Config;

pub(crate) struct SqliteDialect;

impl SqlDialect for SqliteDialect {
    fn quote(&self, identifier: &str) -> String {
        if identifier.starts_with('"') {
            return identifier.to_string();
        }
        format!("\"{}\"", identifier.replace('"', "\"\""))
    }

    fn insert_conflict_ignore(&self, base_insert_sql: &str) -> String {
        match base_insert_sql.strip_prefix("INSERT INTO ") {
            Some(rest) => format!("INSERT OR IGNORE INTO {}", rest),
            None => base_insert_sql.to_string(),
        }
    }

    fn conditional_keyword(&self) -> &'static str {
        "IIF"
    }

    fn last_insert_id_sql(&self, _table: &str) -> Option<String> {
        Some("SELECT last_insert_rowid()".to_string())
    }

    fn build_dsn(&self, config: &Config) -> String {
        let address = config.address.as_deref().unwrap_or(".");
        let name = config.name.as_deref().unwrap_or("scoop");

        let mut params = vec![
            "_vacuum=2".to_string(),
            "_journal=delete".to_string(),
            "_locking_mode=exclusive".to_string(),
            "mode=rwc".to_string(),
            "_sync=3".to_string(),
            "_timeout=9999999".to_string(),
        ];

        if let Some(password) = &config.password {
            params.push("_auth=1".to_string());
            params.push(format!(
                "_auth_user={}",
                config.username.as_deref().unwrap_or("")
            ));
            params.push(format!("_auth_pass={}", password));
            params.push("_auth_crypt=sha512".to_string());
        }

        for (key, value) in &config.extras {
            params.push(format!("{}={}", key, value));
        }

        format!("{}/{}.db?{}", address, name, params.join("&"))
    }

    fn is_duplicate_key_error(&self, message: &str) -> bool {
        message.contains("UNIQUE constraint failed")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_with_double_quotes_and_escapes_existing() {
        let d = SqliteDialect;
        assert_eq!(d.quote("users"), "\"users\"");
        assert_eq!(d.quote("weird\"name"), "\"weird\"\"name\"");
    }

    #[test]
    fn dsn_includes_pragma_style_params() {
        let config = Config {
            address: Some("/tmp".into()),
            name: Some("app".into()),
            ..Default::default()
        };
        let dsn = SqliteDialect.build_dsn(&config);
        assert!(dsn.starts_with("/tmp/app.db?"));
        assert!(dsn.contains("_timeout=9999999"));
    }

    #[test]
    fn dsn_adds_auth_params_when_password_set() {
        let config = Config {
            password: Some("hunter2".into()),
            username: Some("root".into()),
            ..Default::default()
        };
        let dsn = SqliteDialect.build_dsn(&config);
        assert!(dsn.contains("_auth=1"));
        assert!(dsn.contains("_auth_pass=hunter2"));
        assert!(dsn.contains("_auth_crypt=sha512"));
    }
}
