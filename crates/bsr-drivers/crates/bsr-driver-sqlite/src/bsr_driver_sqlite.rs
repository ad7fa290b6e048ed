//! SQLite database driver implementation

mod connection;
mod driver;

pub use connection::{DEFAULT_BUSY_TIMEOUT, SqliteConnection, SqliteTarget};
pub use driver::SqliteDriver;
