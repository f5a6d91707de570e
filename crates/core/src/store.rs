//! Document-store seam the mutation gateway writes through.

use std::collections::BTreeMap;

use anyhow::Result;
use parking_lot::RwLock;

use crate::model::{Task, TaskPatch, Transaction};

/// Record persistence for tasks and ledger entries.
///
/// Each call is one independent write or read; there is no cross-record
/// transaction. Updates and deletes of unknown ids are not errors: they
/// report `None`/`false` and leave the store untouched.
pub trait RecordStore: Send + Sync {
    /// Tasks in insertion order, optionally restricted to one owner.
    fn tasks(&self, owner: Option<&str>) -> Result<Vec<Task>>;

    fn task(&self, id: &str) -> Result<Option<Task>>;

    fn insert_task(&self, task: &Task) -> Result<()>;

    fn update_task(&self, id: &str, patch: &TaskPatch) -> Result<Option<Task>>;

    fn delete_task(&self, id: &str) -> Result<bool>;

    /// Ledger entries, oldest first.
    fn transactions(&self) -> Result<Vec<Transaction>>;

    fn insert_transaction(&self, transaction: &Transaction) -> Result<()>;

    fn delete_transaction(&self, id: &str) -> Result<bool>;
}

/// In-process store keeping records in insertion order.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryRecords>,
}

#[derive(Debug, Default)]
struct MemoryRecords {
    seq: u64,
    tasks: BTreeMap<u64, Task>,
    transactions: BTreeMap<u64, Transaction>,
}

impl MemoryRecords {
    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordStore for MemoryStore {
    fn tasks(&self, owner: Option<&str>) -> Result<Vec<Task>> {
        let records = self.inner.read();
        Ok(records
            .tasks
            .values()
            .filter(|task| owner.map_or(true, |owner| task.owner == owner))
            .cloned()
            .collect())
    }

    fn task(&self, id: &str) -> Result<Option<Task>> {
        let records = self.inner.read();
        Ok(records.tasks.values().find(|task| task.id == id).cloned())
    }

    fn insert_task(&self, task: &Task) -> Result<()> {
        let mut records = self.inner.write();
        let seq = records.next_seq();
        records.tasks.insert(seq, task.clone());
        Ok(())
    }

    fn update_task(&self, id: &str, patch: &TaskPatch) -> Result<Option<Task>> {
        let mut records = self.inner.write();
        let Some(task) = records.tasks.values_mut().find(|task| task.id == id) else {
            return Ok(None);
        };
        patch.apply_to(task);
        Ok(Some(task.clone()))
    }

    fn delete_task(&self, id: &str) -> Result<bool> {
        let mut records = self.inner.write();
        let before = records.tasks.len();
        records.tasks.retain(|_, task| task.id != id);
        Ok(records.tasks.len() != before)
    }

    fn transactions(&self) -> Result<Vec<Transaction>> {
        let records = self.inner.read();
        Ok(records.transactions.values().cloned().collect())
    }

    fn insert_transaction(&self, transaction: &Transaction) -> Result<()> {
        let mut records = self.inner.write();
        let seq = records.next_seq();
        records.transactions.insert(seq, transaction.clone());
        Ok(())
    }

    fn delete_transaction(&self, id: &str) -> Result<bool> {
        let mut records = self.inner.write();
        let before = records.transactions.len();
        records.transactions.retain(|_, entry| entry.id != id);
        Ok(records.transactions.len() != before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NewTask;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn task(owner: &str, text: &str) -> Task {
        NewTask {
            text: text.into(),
            owner: owner.into(),
            ..NewTask::default()
        }
        .into_task(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())
    }

    #[test]
    fn filters_by_owner_in_insertion_order() {
        let store = MemoryStore::new();
        store.insert_task(&task("ana", "one")).unwrap();
        store.insert_task(&task("luca", "two")).unwrap();
        store.insert_task(&task("ana", "three")).unwrap();

        let texts: Vec<String> = store
            .tasks(Some("ana"))
            .unwrap()
            .into_iter()
            .map(|t| t.text)
            .collect();
        assert_eq!(texts, vec!["one", "three"]);
        assert_eq!(store.tasks(None).unwrap().len(), 3);
    }

    #[test]
    fn unknown_ids_are_noops() {
        let store = MemoryStore::new();
        let patch = TaskPatch {
            important: Some(true),
            ..TaskPatch::default()
        };
        assert!(store.update_task("missing", &patch).unwrap().is_none());
        assert!(!store.delete_task("missing").unwrap());
        assert!(!store.delete_transaction("missing").unwrap());
    }
}
