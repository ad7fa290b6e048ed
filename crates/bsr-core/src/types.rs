//! Core types for BSR

/// Result of executing a statement or a blob of statements
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatementResult {
    /// Rows affected across every statement in the blob
    pub affected_rows: u64,
}

impl StatementResult {
    /// Result for a blob that affected `affected_rows` rows
    pub fn with_affected_rows(affected_rows: u64) -> Self {
        Self { affected_rows }
    }
}
