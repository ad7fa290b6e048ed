//! Driver registry for managing available database drivers

use bsr_core::{BsrError, Connection, ConnectionConfig, DatabaseDriver, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// Registry of available database drivers
pub struct DriverRegistry {
    drivers: HashMap<String, Arc<dyn DatabaseDriver>>,
}

impl DriverRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            drivers: HashMap::new(),
        }
    }

    /// Create a registry with all built-in drivers registered
    pub fn with_defaults() -> Self {
        #[allow(unused_mut)]
        let mut registry = Self::new();

        #[cfg(feature = "sqlite")]
        registry.register(Arc::new(crate::sqlite::SqliteDriver::new()));

        registry
    }

    /// Register a new driver under its id
    pub fn register(&mut self, driver: Arc<dyn DatabaseDriver>) {
        let id = driver.id().to_string();
        tracing::debug!(driver = %id, "registering database driver");
        self.drivers.insert(id, driver);
    }

    /// Get a driver by id
    pub fn get(&self, id: &str) -> Option<Arc<dyn DatabaseDriver>> {
        let driver = self.drivers.get(&id.to_lowercase()).cloned();
        if driver.is_none() {
            tracing::warn!(driver = %id, "driver not found in registry");
        }
        driver
    }

    /// List all registered driver ids
    pub fn list(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.drivers.keys().map(|s| s.as_str()).collect();
        ids.sort_unstable();
        ids
    }

    /// Check if a driver is registered
    pub fn has(&self, id: &str) -> bool {
        self.drivers.contains_key(&id.to_lowercase())
    }

    /// Resolve a `<driver>:<rest>` target into its driver and parsed config
    /// without connecting.
    pub fn resolve(&self, target: &str) -> Result<(Arc<dyn DatabaseDriver>, ConnectionConfig)> {
        let (scheme, rest) = split_target(target)?;
        let driver = self.get(scheme).ok_or_else(|| {
            BsrError::Configuration(format!(
                "unknown driver '{}' in connection target (available: {})",
                scheme,
                self.list().join(", ")
            ))
        })?;
        let config = driver
            .parse_connection_string(rest)
            .map_err(|e| with_target_help(e, driver.as_ref()))?;
        Ok((driver, config))
    }

    /// Resolve and connect to a `<driver>:<rest>` target
    pub async fn connect(&self, target: &str) -> Result<Arc<dyn Connection>> {
        let (driver, config) = self.resolve(target)?;
        driver.connect(&config).await
    }
}

/// Split a connection target into its driver scheme and the driver-specific
/// remainder.
pub fn split_target(target: &str) -> Result<(&str, &str)> {
    let target = target.trim();
    match target.split_once(':') {
        Some((scheme, rest))
            if !scheme.is_empty() && scheme.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') =>
        {
            Ok((scheme, rest))
        }
        _ => Err(BsrError::Configuration(format!(
            "connection target must look like '<driver>:<connection string>', got '{}'",
            target
        ))),
    }
}

fn with_target_help(err: BsrError, driver: &dyn DatabaseDriver) -> BsrError {
    let help = driver.connection_string_help();
    if help.is_empty() {
        return err;
    }
    match err {
        BsrError::Configuration(msg) => BsrError::Configuration(format!("{} (expected {})", msg, help)),
        BsrError::NotSupported(msg) => BsrError::NotSupported(format!("{} (expected {})", msg, help)),
        other => other,
    }
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_target() {
        assert_eq!(
            split_target("sqlite:///tmp/a.db").expect("valid target"),
            ("sqlite", "///tmp/a.db")
        );
        assert_eq!(split_target("  sqlite:a.db ").expect("valid target"), ("sqlite", "a.db"));
    }

    #[test]
    fn test_split_target_rejects_missing_scheme() {
        assert!(split_target("/tmp/a.db").is_err());
        assert!(split_target(":a.db").is_err());
        assert!(split_target("my driver:a.db").is_err());
    }

    struct HelpfulDriver;

    #[async_trait::async_trait]
    impl DatabaseDriver for HelpfulDriver {
        fn id(&self) -> &'static str {
            "helpful"
        }

        fn connection_string_help(&self) -> &'static str {
            "helpful:<name>"
        }

        async fn connect(&self, _config: &ConnectionConfig) -> Result<Arc<dyn Connection>> {
            Err(BsrError::Connection("never connects".into()))
        }
    }

    #[test]
    fn test_rejected_target_names_expected_format() {
        let mut registry = DriverRegistry::new();
        registry.register(Arc::new(HelpfulDriver));
        let err = match registry.resolve("helpful:db") {
            Ok(_) => panic!("driver does not parse targets"),
            Err(e) => e,
        };
        assert!(matches!(err, BsrError::NotSupported(_)));
        assert!(err.to_string().ends_with("(expected helpful:<name>)"));
    }

    #[test]
    fn test_empty_registry_rejects_targets() {
        let registry = DriverRegistry::new();
        assert!(registry.list().is_empty());
        assert!(matches!(
            registry.resolve("sqlite:a.db"),
            Err(BsrError::Configuration(_))
        ));
    }
}
