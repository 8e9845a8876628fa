use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("transaction aborted: {0}")]
    TransactionAborted(String),
    /// The store answered but refused the command, e.g. a type mismatch.
    #[error("command rejected: {0}")]
    Rejected(String),
}

/// One page of an unordered set scan. A `cursor` of `0` means the scan is
/// complete.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanBatch {
    pub members: Vec<String>,
    pub cursor: u64,
}

/// A queued transaction operation. Conditional operations carry a
/// precondition that is checked before anything in the transaction applies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxOp {
    /// Precondition: `key` is absent.
    SetIfAbsent { key: String, value: Vec<u8> },
    /// Precondition: `key` is present.
    SetIfPresent { key: String, value: Vec<u8> },
    /// Precondition: `key` is present.
    Delete { key: String },
    AddToSet { set: String, member: String },
    RemoveFromSet { set: String, member: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxOutcome {
    Committed,
    /// The precondition of the op at `failed_op` did not hold; nothing was
    /// applied.
    Discarded { failed_op: usize },
}

/// Accumulates operations to be applied all-or-nothing by `commit`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[must_use = "a transaction does nothing until committed"]
pub struct Transaction {
    ops: Vec<TxOp>,
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_if_absent(mut self, key: impl Into<String>, value: Vec<u8>) -> Self {
        self.ops.push(TxOp::SetIfAbsent {
            key: key.into(),
            value,
        });
        self
    }

    pub fn set_if_present(mut self, key: impl Into<String>, value: Vec<u8>) -> Self {
        self.ops.push(TxOp::SetIfPresent {
            key: key.into(),
            value,
        });
        self
    }

    pub fn delete(mut self, key: impl Into<String>) -> Self {
        self.ops.push(TxOp::Delete { key: key.into() });
        self
    }

    pub fn add_to_set(mut self, set: impl Into<String>, member: impl Into<String>) -> Self {
        self.ops.push(TxOp::AddToSet {
            set: set.into(),
            member: member.into(),
        });
        self
    }

    pub fn remove_from_set(mut self, set: impl Into<String>, member: impl Into<String>) -> Self {
        self.ops.push(TxOp::RemoveFromSet {
            set: set.into(),
            member: member.into(),
        });
        self
    }

    pub fn ops(&self) -> &[TxOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<TxOp> {
        self.ops
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub async fn commit<S: KvStore + ?Sized>(self, store: &S) -> Result<TxOutcome, StoreError> {
        if self.is_empty() {
            return Ok(TxOutcome::Committed);
        }
        store.execute(self).await
    }
}

/// The key-value primitives the order repository is built on. Implementations
/// are shared between concurrent callers and must be safe to use from many
/// tasks at once.
#[async_trait]
pub trait KvStore: Send + Sync + 'static {
    async fn ping(&self) -> Result<(), StoreError>;

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Returns `false` if the key already existed.
    async fn set_if_absent(&self, key: &str, value: &[u8]) -> Result<bool, StoreError>;

    /// Returns `false` if the key did not exist.
    async fn set_if_present(&self, key: &str, value: &[u8]) -> Result<bool, StoreError>;

    /// Returns `false` if the key did not exist.
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;

    async fn add_to_set(&self, set: &str, member: &str) -> Result<(), StoreError>;

    async fn remove_from_set(&self, set: &str, member: &str) -> Result<(), StoreError>;

    /// `count` is a batch-size hint; a store may return more or fewer members.
    async fn scan_set(
        &self,
        set: &str,
        cursor: u64,
        count: u64,
    ) -> Result<ScanBatch, StoreError>;

    /// Values come back in the order of `keys`, `None` for missing keys.
    async fn multi_get(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>, StoreError>;

    /// Applies every op of `tx` or none of them.
    async fn execute(&self, tx: Transaction) -> Result<TxOutcome, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_keeps_ops_in_order() {
        let tx = Transaction::new()
            .set_if_absent("order:1", b"{}".to_vec())
            .add_to_set("orders", "order:1");

        assert_eq!(
            tx.ops(),
            &[
                TxOp::SetIfAbsent {
                    key: "order:1".to_string(),
                    value: b"{}".to_vec(),
                },
                TxOp::AddToSet {
                    set: "orders".to_string(),
                    member: "order:1".to_string(),
                },
            ]
        );
    }

    #[test]
    fn new_transaction_is_empty() {
        assert!(Transaction::new().is_empty());
        assert!(!Transaction::new().delete("order:1").is_empty());
    }
}
