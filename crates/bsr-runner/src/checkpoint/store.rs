//! Addressing-mode aware checkpoint store

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use ring::digest;
use serde::{Deserialize, Serialize};

use super::kv::{KvStore, SqliteKvStore};
use crate::unit::Unit;
use crate::{RunnerError, RunnerResult};

/// Reserved key recording the addressing mode a store was created with
pub const SESSION_SAVE_TYPE_KEY: &str = "SessionSaveType";

const TRUE_VALUE: &str = "true";
const FALSE_VALUE: &str = "false";

/// How units are identified in the checkpoint store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AddressingMode {
    /// Zero-based position of the unit in the script
    #[default]
    #[serde(rename = "SqlUnitIndex")]
    ByIndex,
    /// SHA-256 of the trimmed unit text; survives edits that shift positions
    #[serde(rename = "SqlUnitHash")]
    ByHash,
}

impl AddressingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AddressingMode::ByIndex => "SqlUnitIndex",
            AddressingMode::ByHash => "SqlUnitHash",
        }
    }

    /// Key a unit is stored under in this mode
    pub fn key_for(&self, unit: &Unit) -> CheckpointKey {
        match self {
            AddressingMode::ByIndex => CheckpointKey::Index(unit.index()),
            AddressingMode::ByHash => CheckpointKey::hash_of(unit.text()),
        }
    }
}

impl fmt::Display for AddressingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AddressingMode {
    type Err = RunnerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "SqlUnitIndex" => Ok(AddressingMode::ByIndex),
            "SqlUnitHash" => Ok(AddressingMode::ByHash),
            other => Err(RunnerError::Configuration(format!("unknown addressing mode: {}", other))),
        }
    }
}

/// Identity of a unit inside a checkpoint store
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CheckpointKey {
    Index(u64),
    /// Lowercase hex SHA-256 digest
    Hash(String),
}

impl CheckpointKey {
    /// Digest key of a unit text, trimmed before hashing
    pub fn hash_of(text: &str) -> Self {
        let digest = digest::digest(&digest::SHA256, text.trim().as_bytes());
        CheckpointKey::Hash(hex::encode(digest.as_ref()))
    }

    pub fn mode(&self) -> AddressingMode {
        match self {
            CheckpointKey::Index(_) => AddressingMode::ByIndex,
            CheckpointKey::Hash(_) => AddressingMode::ByHash,
        }
    }

    fn storage_key(&self) -> String {
        match self {
            CheckpointKey::Index(index) => index.to_string(),
            CheckpointKey::Hash(hash) => hash.clone(),
        }
    }
}

impl fmt::Display for CheckpointKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckpointKey::Index(index) => write!(f, "#{}", index),
            CheckpointKey::Hash(hash) => write!(f, "{}", hash),
        }
    }
}

/// Counts over the markers held by a store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckpointSummary {
    pub executed: usize,
    pub not_executed: usize,
}

/// Executed-unit markers bound to one [`AddressingMode`]
pub struct CheckpointStore {
    kv: Option<Box<dyn KvStore>>,
    mode: AddressingMode,
    location: Option<PathBuf>,
}

impl CheckpointStore {
    /// Open the on-disk store in a job directory.
    ///
    /// A fresh store records `mode`; an existing one must have been created
    /// with the same mode or opening fails without writing anything.
    pub fn open(dir: &Path, mode: AddressingMode) -> RunnerResult<Self> {
        let kv = SqliteKvStore::open(dir)?;
        let mut store = Self::with_backend(Box::new(kv), mode)?;
        store.location = Some(dir.to_path_buf());
        Ok(store)
    }

    /// Wrap an arbitrary backend, with the same mode check as [`open`](Self::open)
    pub fn with_backend(mut kv: Box<dyn KvStore>, mode: AddressingMode) -> RunnerResult<Self> {
        match kv.get(SESSION_SAVE_TYPE_KEY)? {
            None => {
                kv.put(SESSION_SAVE_TYPE_KEY, mode.as_str())?;
            }
            Some(recorded) => {
                let recorded_mode = recorded.parse::<AddressingMode>().map_err(|_| {
                    RunnerError::ResumeIntegrity(format!(
                        "checkpoint store records unknown addressing mode '{}'",
                        recorded
                    ))
                })?;
                if recorded_mode != mode {
                    return Err(RunnerError::ResumeIntegrity(format!(
                        "checkpoint store was created with {} but {} was requested",
                        recorded_mode, mode
                    )));
                }
            }
        }

        Ok(Self {
            kv: Some(kv),
            mode,
            location: None,
        })
    }

    pub fn mode(&self) -> AddressingMode {
        self.mode
    }

    /// Job directory for on-disk stores
    pub fn location(&self) -> Option<&Path> {
        self.location.as_deref()
    }

    pub fn is_closed(&self) -> bool {
        self.kv.is_none()
    }

    pub fn is_executed(&self, unit: &Unit) -> RunnerResult<bool> {
        self.is_executed_key(&self.mode.key_for(unit))
    }

    pub fn set_executed(&mut self, unit: &Unit, executed: bool) -> RunnerResult<()> {
        let key = self.mode.key_for(unit);
        self.set_executed_key(&key, executed)
    }

    /// Mark every unit of a batch executed in one atomic write
    pub fn mark_executed(&mut self, units: &[Unit]) -> RunnerResult<()> {
        if units.is_empty() {
            return Ok(());
        }
        let entries: Vec<(String, String)> = units
            .iter()
            .map(|unit| (self.mode.key_for(unit).storage_key(), TRUE_VALUE.to_string()))
            .collect();
        self.backend_mut()?.put_many(&entries)
    }

    pub fn is_executed_key(&self, key: &CheckpointKey) -> RunnerResult<bool> {
        self.check_key(key)?;
        let value = self.backend()?.get(&key.storage_key())?;
        Ok(value.is_some_and(|v| v.trim().eq_ignore_ascii_case(TRUE_VALUE)))
    }

    pub fn set_executed_key(&mut self, key: &CheckpointKey, executed: bool) -> RunnerResult<()> {
        self.check_key(key)?;
        let value = if executed { TRUE_VALUE } else { FALSE_VALUE };
        self.backend_mut()?.put(&key.storage_key(), value)
    }

    pub fn summary(&self) -> RunnerResult<CheckpointSummary> {
        let mut summary = CheckpointSummary::default();
        for (key, value) in self.backend()?.entries()? {
            if key == SESSION_SAVE_TYPE_KEY {
                continue;
            }
            if value.trim().eq_ignore_ascii_case(TRUE_VALUE) {
                summary.executed += 1;
            } else {
                summary.not_executed += 1;
            }
        }
        Ok(summary)
    }

    /// Flush and release the backend. Calling it again is a no-op.
    pub fn close(&mut self) -> RunnerResult<()> {
        if let Some(mut kv) = self.kv.take() {
            kv.flush()?;
            tracing::debug!(mode = %self.mode, "checkpoint store closed");
        }
        Ok(())
    }

    fn check_key(&self, key: &CheckpointKey) -> RunnerResult<()> {
        if key.mode() != self.mode {
            return Err(RunnerError::ResumeIntegrity(format!(
                "{} key used against a store addressed by {}",
                key.mode(),
                self.mode
            )));
        }
        Ok(())
    }

    fn backend(&self) -> RunnerResult<&dyn KvStore> {
        self.kv
            .as_deref()
            .ok_or_else(|| RunnerError::Storage("checkpoint store is closed".into()))
    }

    fn backend_mut(&mut self) -> RunnerResult<&mut (dyn KvStore + 'static)> {
        match self.kv.as_deref_mut() {
            Some(kv) => Ok(kv),
            None => Err(RunnerError::Storage("checkpoint store is closed".into())),
        }
    }
}

impl Drop for CheckpointStore {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!(error = %e, "failed to close checkpoint store");
        }
    }
}
