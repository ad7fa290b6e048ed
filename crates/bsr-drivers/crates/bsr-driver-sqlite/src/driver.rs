//! SQLite driver implementation

use async_trait::async_trait;
use bsr_core::{BsrError, Connection, ConnectionConfig, DatabaseDriver, Result};
use std::sync::Arc;
use std::time::Duration;

use crate::{DEFAULT_BUSY_TIMEOUT, SqliteConnection, SqliteTarget};

const BUSY_TIMEOUT_PARAM: &str = "busy_timeout_ms";

/// SQLite database driver.
///
/// Targets are `sqlite:<path>[;key=value...]`. The only recognised setting
/// is `busy_timeout_ms`.
pub struct SqliteDriver;

impl SqliteDriver {
    pub fn new() -> Self {
        tracing::debug!("SQLite driver initialized");
        Self
    }
}

impl Default for SqliteDriver {
    fn default() -> Self {
        Self::new()
    }
}

fn busy_timeout(config: &ConnectionConfig) -> Result<Duration> {
    match config.get_string(BUSY_TIMEOUT_PARAM) {
        None => Ok(DEFAULT_BUSY_TIMEOUT),
        Some(raw) => raw.trim().parse::<u64>().map(Duration::from_millis).map_err(|_| {
            BsrError::Configuration(format!(
                "{} must be a whole number of milliseconds, got '{}'",
                BUSY_TIMEOUT_PARAM, raw
            ))
        }),
    }
}

#[async_trait]
impl DatabaseDriver for SqliteDriver {
    fn id(&self) -> &'static str {
        "sqlite"
    }

    fn connection_string_help(&self) -> &'static str {
        "sqlite:<database file>[;busy_timeout_ms=<n>], e.g. sqlite:///var/data/app.db or sqlite:app.db"
    }

    async fn connect(&self, config: &ConnectionConfig) -> Result<Arc<dyn Connection>> {
        let path = config.get_string("path").ok_or_else(|| {
            BsrError::Configuration("SQLite target has no database path".into())
        })?;
        let target = SqliteTarget::resolve(&path)?;
        let conn = SqliteConnection::open_with_timeout(&target, busy_timeout(config)?)
            .inspect_err(|e| tracing::error!(error = %e, "failed to open SQLite database"))?;
        Ok(Arc::new(conn))
    }

    fn parse_connection_string(&self, conn_str: &str) -> Result<ConnectionConfig> {
        let mut parts = conn_str.split(';');
        // `sqlite:///abs/path` and `sqlite:rel/path` are both accepted
        let location = parts.next().unwrap_or_default();
        let location = location.strip_prefix("//").unwrap_or(location).trim();
        if location.is_empty() {
            return Err(BsrError::Configuration(
                "SQLite connection target is missing the database path".into(),
            ));
        }

        let mut config = ConnectionConfig::new_sqlite(location);
        for setting in parts.map(str::trim).filter(|s| !s.is_empty()) {
            let Some((key, value)) = setting.split_once('=') else {
                return Err(BsrError::Configuration(format!(
                    "expected key=value in SQLite target, got '{}'",
                    setting
                )));
            };
            config = config.with_param(key.trim(), value.trim());
        }
        busy_timeout(&config)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_absolute_path() {
        let config = SqliteDriver::new()
            .parse_connection_string("///var/data/app.db")
            .expect("should parse");
        assert_eq!(config.get_string("path").as_deref(), Some("/var/data/app.db"));
    }

    #[test]
    fn test_parse_relative_path() {
        let config = SqliteDriver::new()
            .parse_connection_string("app.db")
            .expect("should parse");
        assert_eq!(config.get_string("path").as_deref(), Some("app.db"));
    }

    #[test]
    fn test_parse_empty_path() {
        let result = SqliteDriver::new().parse_connection_string("  ");
        assert!(matches!(result, Err(BsrError::Configuration(_))));
    }

    #[test]
    fn test_parse_busy_timeout() {
        let driver = SqliteDriver::new();
        let config = driver
            .parse_connection_string("app.db; busy_timeout_ms = 250")
            .expect("should parse");
        assert_eq!(busy_timeout(&config).unwrap(), Duration::from_millis(250));

        assert!(driver.parse_connection_string("app.db;busy_timeout_ms=soon").is_err());
        assert!(driver.parse_connection_string("app.db;readonly").is_err());
    }

    #[test]
    fn test_params_survive_parsing() {
        let config = SqliteDriver::new()
            .parse_connection_string("///tmp/x.db;busy_timeout_ms=100")
            .expect("should parse");
        assert_eq!(config, ConnectionConfig::new_sqlite("/tmp/x.db").with_param(BUSY_TIMEOUT_PARAM, "100"));
    }
}
