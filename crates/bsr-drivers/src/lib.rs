//! BSR Drivers - Database driver implementations
//!
//! This crate wires the concrete drivers into a registry keyed by the
//! connection target scheme (`sqlite:...`).

#[cfg(feature = "sqlite")]
pub use bsr_driver_sqlite as sqlite;

mod registry;

pub use registry::{DriverRegistry, split_target};

/// Re-export commonly used types from bsr-core
pub use bsr_core::{
    BsrError, Connection, ConnectionConfig, DatabaseDriver, Result, StatementResult,
};
