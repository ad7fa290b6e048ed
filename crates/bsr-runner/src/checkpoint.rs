//! Persistent record of which script units already executed
//!
//! Markers live in a small key-value table next to the script, under
//! `<script dir>/.bsr/.<script stem>.bsrjob/`. A store is bound to one
//! addressing mode for its whole life: units are keyed either by their
//! position in the script or by a digest of their trimmed text.

mod kv;
mod store;


pub use kv::{CHECKPOINT_DB_FILE, KvStore, MemoryKvStore, SqliteKvStore};
pub use store::{AddressingMode, CheckpointKey, CheckpointStore, CheckpointSummary, SESSION_SAVE_TYPE_KEY};
