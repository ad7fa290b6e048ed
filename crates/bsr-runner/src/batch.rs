//! Groups not-yet-executed units into batches

use std::io::BufRead;

use crate::checkpoint::CheckpointStore;
use crate::unit::{Unit, UnitReader, combine_units};
use crate::{RunnerError, RunnerResult};

/// Up to `batch_size` consecutive units that still need to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    units: Vec<Unit>,
    start_index: u64,
    next_index: u64,
}

impl Batch {
    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// An empty batch means the script is exhausted
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Index of the first unit read for this batch, skipped ones included
    pub fn start_index(&self) -> u64 {
        self.start_index
    }

    /// Index the next read will assign
    pub fn next_index(&self) -> u64 {
        self.next_index
    }

    /// Units read past because the store already had them executed
    pub fn skipped_count(&self) -> u64 {
        (self.next_index - self.start_index).saturating_sub(self.units.len() as u64)
    }

    /// Non-blank unit texts joined with newlines
    pub fn combined_sql(&self) -> String {
        combine_units(&self.units)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BatchAssembler {
    batch_size: usize,
}

impl BatchAssembler {
    pub fn new(batch_size: usize) -> RunnerResult<Self> {
        if batch_size == 0 {
            return Err(RunnerError::Configuration("batch size must be at least 1".into()));
        }
        Ok(Self { batch_size })
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Read units starting at `next_index` until `batch_size` unexecuted ones
    /// are collected or the input ends.
    ///
    /// Every unit read consumes an index, including the ones skipped because
    /// the store already has them executed.
    pub fn next_batch<R: BufRead>(
        &self,
        reader: &mut UnitReader<R>,
        store: &CheckpointStore,
        next_index: u64,
    ) -> RunnerResult<Batch> {
        let mut units = Vec::with_capacity(self.batch_size);
        let mut index = next_index;

        while units.len() < self.batch_size {
            let Some(text) = reader.read_unit()? else {
                break;
            };
            let unit = Unit::new(index, text);
            index += 1;

            if store.is_executed(&unit)? {
                tracing::trace!(index = unit.index(), "skipping executed unit");
                continue;
            }
            units.push(unit);
        }

        Ok(Batch {
            units,
            start_index: next_index,
            next_index: index,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::{AddressingMode, MemoryKvStore};
    use std::io::Cursor;

    const SCRIPT: &str = "u0\nGO\nu1\nGO\nu2\nGO\nu3\nGO\nu4\nGO\n";

    fn store(mode: AddressingMode) -> CheckpointStore {
        CheckpointStore::with_backend(Box::new(MemoryKvStore::new()), mode).unwrap()
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        assert!(matches!(
            BatchAssembler::new(0),
            Err(RunnerError::Configuration(_))
        ));
    }

    #[test]
    fn test_batches_skip_executed_units() {
        let mut store = store(AddressingMode::ByIndex);
        store
            .mark_executed(&[Unit::new(0, ""), Unit::new(1, ""), Unit::new(3, "")])
            .unwrap();

        let assembler = BatchAssembler::new(2).unwrap();
        let mut reader = UnitReader::new(Cursor::new(SCRIPT), "GO");

        let first = assembler.next_batch(&mut reader, &store, 0).unwrap();
        let indices: Vec<u64> = first.units().iter().map(Unit::index).collect();
        assert_eq!(indices, vec![2, 4]);
        assert_eq!(first.skipped_count(), 3);
        assert_eq!(first.next_index(), 5);
        assert_eq!(first.combined_sql(), "u2\n\nu4\n");

        let second = assembler.next_batch(&mut reader, &store, first.next_index()).unwrap();
        assert!(second.is_empty());
        assert_eq!(second.skipped_count(), 0);
    }

    #[test]
    fn test_ten_units_batches_of_three_with_two_marked() {
        let script: String = (0..10).map(|i| format!("u{i}\nGO\n")).collect();
        let mut store = store(AddressingMode::ByIndex);
        store.mark_executed(&[Unit::new(2, ""), Unit::new(5, "")]).unwrap();

        let assembler = BatchAssembler::new(3).unwrap();
        let mut reader = UnitReader::new(Cursor::new(script), "GO");

        let mut batches = Vec::new();
        let mut next_index = 0;
        loop {
            let batch = assembler.next_batch(&mut reader, &store, next_index).unwrap();
            if batch.is_empty() {
                break;
            }
            next_index = batch.next_index();
            let indices: Vec<u64> = batch.units().iter().map(Unit::index).collect();
            batches.push((indices, batch.skipped_count()));
        }

        assert_eq!(
            batches,
            vec![(vec![0, 1, 3], 1), (vec![4, 6, 7], 1), (vec![8, 9], 0)]
        );
        assert_eq!(next_index, 10);
    }

    #[test]
    fn test_final_batch_may_be_short() {
        let store = store(AddressingMode::ByIndex);
        let assembler = BatchAssembler::new(3).unwrap();
        let mut reader = UnitReader::new(Cursor::new(SCRIPT), "GO");

        let first = assembler.next_batch(&mut reader, &store, 0).unwrap();
        assert_eq!(first.len(), 3);
        let second = assembler.next_batch(&mut reader, &store, first.next_index()).unwrap();
        assert_eq!(second.len(), 2);
        assert_eq!(second.start_index(), 3);
        assert_eq!(second.units()[1].text(), "u4\n");
    }

    #[test]
    fn test_hash_mode_skips_by_text() {
        let mut store = store(AddressingMode::ByHash);
        store.set_executed(&Unit::new(99, "u1"), true).unwrap();

        let assembler = BatchAssembler::new(10).unwrap();
        let mut reader = UnitReader::new(Cursor::new(SCRIPT), "GO");
        let batch = assembler.next_batch(&mut reader, &store, 0).unwrap();

        let texts: Vec<&str> = batch.units().iter().map(Unit::text).collect();
        assert_eq!(texts, vec!["u0\n", "u2\n", "u3\n", "u4\n"]);
        assert_eq!(batch.skipped_count(), 1);
    }
}
