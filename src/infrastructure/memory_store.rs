use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use super::kv::{KvStore, ScanBatch, StoreError, Transaction, TxOp, TxOutcome};

#[derive(Debug, Default)]
struct Inner {
    values: HashMap<String, Vec<u8>>,
    sets: HashMap<String, BTreeSet<String>>,
}

impl Inner {
    fn precondition_holds(&self, op: &TxOp) -> bool {
        match op {
            TxOp::SetIfAbsent { key, .. } => !self.values.contains_key(key),
            TxOp::SetIfPresent { key, .. } | TxOp::Delete { key } => {
                self.values.contains_key(key)
            }
            TxOp::AddToSet { .. } | TxOp::RemoveFromSet { .. } => true,
        }
    }

    fn apply(&mut self, op: TxOp) {
        match op {
            TxOp::SetIfAbsent { key, value } | TxOp::SetIfPresent { key, value } => {
                self.values.insert(key, value);
            }
            TxOp::Delete { key } => {
                self.values.remove(&key);
            }
            TxOp::AddToSet { set, member } => {
                self.sets.entry(set).or_default().insert(member);
            }
            TxOp::RemoveFromSet { set, member } => self.remove_member(&set, &member),
        }
    }

    fn remove_member(&mut self, set: &str, member: &str) {
        if let Some(members) = self.sets.get_mut(set) {
            members.remove(member);
            if members.is_empty() {
                self.sets.remove(set);
            }
        }
    }
}

/// In-process `KvStore` with the same semantics as the Redis adapter.
///
/// Set scans walk members in sorted order and the cursor is the position of
/// the next member, so a set mutated mid-scan can repeat or skip members just
/// like `SSCAN`.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Transport("memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        self.lock().map(|_| ())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.lock()?.values.get(key).cloned())
    }

    async fn set_if_absent(&self, key: &str, value: &[u8]) -> Result<bool, StoreError> {
        let mut inner = self.lock()?;
        if inner.values.contains_key(key) {
            return Ok(false);
        }
        inner.values.insert(key.to_string(), value.to_vec());
        Ok(true)
    }

    async fn set_if_present(&self, key: &str, value: &[u8]) -> Result<bool, StoreError> {
        let mut inner = self.lock()?;
        match inner.values.get_mut(key) {
            Some(slot) => {
                *slot = value.to_vec();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.lock()?.values.remove(key).is_some())
    }

    async fn add_to_set(&self, set: &str, member: &str) -> Result<(), StoreError> {
        self.lock()?
            .sets
            .entry(set.to_string())
            .or_default()
            .insert(member.to_string());
        Ok(())
    }

    async fn remove_from_set(&self, set: &str, member: &str) -> Result<(), StoreError> {
        self.lock()?.remove_member(set, member);
        Ok(())
    }

    async fn scan_set(
        &self,
        set: &str,
        cursor: u64,
        count: u64,
    ) -> Result<ScanBatch, StoreError> {
        let inner = self.lock()?;
        let Some(members) = inner.sets.get(set) else {
            return Ok(ScanBatch::default());
        };

        let start = usize::try_from(cursor).unwrap_or(usize::MAX);
        let take = usize::try_from(count.max(1)).unwrap_or(usize::MAX);
        let batch: Vec<String> = members.iter().skip(start).take(take).cloned().collect();

        let next = start.saturating_add(batch.len());
        let cursor = if batch.is_empty() || next >= members.len() {
            0
        } else {
            next as u64
        };
        Ok(ScanBatch {
            members: batch,
            cursor,
        })
    }

    async fn multi_get(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>, StoreError> {
        let inner = self.lock()?;
        Ok(keys.iter().map(|k| inner.values.get(k).cloned()).collect())
    }

    async fn execute(&self, tx: Transaction) -> Result<TxOutcome, StoreError> {
        let mut inner = self.lock()?;
        if let Some(failed_op) = tx.ops().iter().position(|op| !inner.precondition_holds(op)) {
            return Ok(TxOutcome::Discarded { failed_op });
        }
        for op in tx.into_ops() {
            inner.apply(op);
        }
        Ok(TxOutcome::Committed)
    }
}
