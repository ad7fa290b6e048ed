//! BSR Core - Core abstractions shared by the big SQL runner crates
//!
//! This crate defines the execution primitive the runner drives:
//!
//! - `DatabaseDriver` - Trait for database driver implementations
//! - `Connection` - Trait for a live connection that can execute SQL blobs
//! - `ConnectionConfig` - Parsed connection target
//! - `BsrError` / `Result` - The shared error type

mod connection;
mod driver;
mod error;
mod types;

pub use connection::*;
pub use driver::*;
pub use error::*;
pub use types::*;
