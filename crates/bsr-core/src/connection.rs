//! Connection trait

use crate::{Result, StatementResult};
use async_trait::async_trait;

/// A database connection
///
/// The runner only needs one capability from it: execute a blob of SQL
/// text (possibly several statements) and report how many rows changed.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Get the driver name (e.g., "sqlite")
    fn driver_name(&self) -> &str;

    /// Execute a single statement that modifies data
    async fn execute(&self, sql: &str) -> Result<StatementResult>;

    /// Execute a blob that may hold several statements separated the way the
    /// database expects. Drivers that cannot run multi-statement text in one
    /// call should override this; the default forwards to `execute`.
    async fn execute_batch(&self, sql: &str) -> Result<StatementResult> {
        self.execute(sql).await
    }

    /// Close the connection
    async fn close(&self) -> Result<()>;

    /// Check if the connection is closed
    fn is_closed(&self) -> bool;
}
