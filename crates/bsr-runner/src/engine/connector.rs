//! Connection source for batch execution

use std::sync::Arc;

use async_trait::async_trait;
use bsr_core::{Connection, Result};
use bsr_drivers::DriverRegistry;

/// Opens a connection to a target for one execution attempt.
///
/// The engine asks for a fresh connection on every attempt so a retry
/// after a dropped link reconnects.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self, target: &str) -> Result<Arc<dyn Connection>>;

    /// Check that `target` is usable without connecting
    fn validate_target(&self, _target: &str) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl<T: Connector> Connector for Arc<T> {
    async fn connect(&self, target: &str) -> Result<Arc<dyn Connection>> {
        (**self).connect(target).await
    }

    fn validate_target(&self, target: &str) -> Result<()> {
        (**self).validate_target(target)
    }
}

/// Connects through a [`DriverRegistry`] using `<driver>:<rest>` targets
#[derive(Clone)]
pub struct RegistryConnector {
    registry: Arc<DriverRegistry>,
}

impl RegistryConnector {
    pub fn new(registry: Arc<DriverRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &DriverRegistry {
        &self.registry
    }
}

#[async_trait]
impl Connector for RegistryConnector {
    async fn connect(&self, target: &str) -> Result<Arc<dyn Connection>> {
        self.registry.connect(target).await
    }

    fn validate_target(&self, target: &str) -> Result<()> {
        self.registry.resolve(target).map(|_| ())
    }
}
