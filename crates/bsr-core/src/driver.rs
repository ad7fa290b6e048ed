//! Database driver trait definition

use crate::{BsrError, Connection, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// A database engine that can open connections for a connection target.
///
/// Targets look like `<id>:<driver specific part>`. The registry strips the
/// scheme and hands the remainder to [`DatabaseDriver::parse_connection_string`].
#[async_trait]
pub trait DatabaseDriver: Send + Sync {
    /// Scheme used in connection targets
    fn id(&self) -> &'static str;

    /// One-line description of the target format, appended to target errors
    fn connection_string_help(&self) -> &'static str {
        ""
    }

    async fn connect(&self, config: &ConnectionConfig) -> Result<Arc<dyn Connection>>;

    /// Parse the driver-specific part of a connection target
    fn parse_connection_string(&self, _conn_str: &str) -> Result<ConnectionConfig> {
        Err(BsrError::NotSupported(format!(
            "driver '{}' does not accept connection targets",
            self.id()
        )))
    }
}

/// A parsed connection target.
///
/// `location` is whatever the driver uses to find the database (a file path,
/// a host, a DSN). Extra `key=value` settings live in `params`.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub driver: String,
    pub location: String,
    pub params: BTreeMap<String, String>,
}

impl ConnectionConfig {
    pub fn new(driver: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            driver: driver.into(),
            location: location.into(),
            params: BTreeMap::new(),
        }
    }

    pub fn new_sqlite(database_path: impl Into<String>) -> Self {
        Self::new("sqlite", database_path)
    }

    pub fn with_param(mut self, key: &str, value: impl Into<String>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }

    /// Look up a setting. Explicit params win; `path`, `database` and
    /// `location` fall back to the target location.
    pub fn get_string(&self, key: &str) -> Option<String> {
        if let Some(val) = self.params.get(key) {
            return Some(val.clone());
        }
        match key {
            "path" | "database" | "location" if !self.location.is_empty() => {
                Some(self.location.clone())
            }
            _ => None,
        }
    }
}

// Params can carry credentials, so only their keys are printed.
impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("driver", &self.driver)
            .field("location", &self.location)
            .field("params", &self.params.keys().collect::<Vec<_>>())
            .finish()
    }
}
