use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::errors::DomainError;
use crate::domain::order::{FindAllPage, FindResult, Order};
use crate::domain::ports::OrderRepository;

use super::kv::{KvStore, StoreError, Transaction, TxOutcome};

/// Set holding the primary key of every stored order.
pub const ORDER_INDEX: &str = "orders";

pub fn order_key(id: u64) -> String {
    format!("order:{id}")
}

// ── Error conversions (infrastructure concern only) ──────────────────────────

impl From<StoreError> for DomainError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Transport(msg) => DomainError::Transport(msg),
            StoreError::TransactionAborted(msg) => DomainError::TransactionAborted(msg),
            StoreError::Rejected(msg) => DomainError::StoreRejected(msg),
        }
    }
}

fn encode(order: &Order) -> Result<Vec<u8>, DomainError> {
    serde_json::to_vec(order).map_err(|e| DomainError::Encode(e.to_string()))
}

fn decode(key: &str, bytes: &[u8]) -> Result<Order, DomainError> {
    serde_json::from_slice(bytes).map_err(|e| {
        log::warn!("stored value at {} is not a valid order: {}", key, e);
        DomainError::CorruptRecord(format!("{}: {}", key, e))
    })
}

// ── Repository ────────────────────────────────────────────────────────────────

/// Orders stored one JSON document per key, with every key listed in the
/// `orders` set. Writes that touch both the key and the set go through one
/// transaction so the two never disagree.
pub struct KvOrderRepository<S: ?Sized> {
    store: Arc<S>,
}

impl<S: KvStore + ?Sized> KvOrderRepository<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<S: KvStore + ?Sized> OrderRepository for KvOrderRepository<S> {
    async fn insert(&self, order: &Order) -> Result<(), DomainError> {
        let key = order_key(order.order_id);
        let value = encode(order)?;

        let outcome = Transaction::new()
            .set_if_absent(key.as_str(), value)
            .add_to_set(ORDER_INDEX, key.as_str())
            .commit(self.store.as_ref())
            .await?;

        match outcome {
            TxOutcome::Committed => {
                log::debug!("inserted {}", key);
                Ok(())
            }
            TxOutcome::Discarded { failed_op: 0 } => {
                log::debug!("insert of {} discarded: key exists", key);
                Err(DomainError::AlreadyExists)
            }
            TxOutcome::Discarded { failed_op } => {
                log::warn!("insert of {} discarded at op {}", key, failed_op);
                Err(DomainError::TransactionAborted(format!(
                    "insert of {} discarded",
                    key
                )))
            }
        }
    }

    async fn find_by_id(&self, id: u64) -> Result<Order, DomainError> {
        let key = order_key(id);
        let bytes = self
            .store
            .get(&key)
            .await?
            .ok_or(DomainError::NotFound)?;
        decode(&key, &bytes)
    }

    async fn update(&self, order: &Order) -> Result<(), DomainError> {
        let key = order_key(order.order_id);
        let value = encode(order)?;

        if !self.store.set_if_present(&key, &value).await? {
            return Err(DomainError::NotFound);
        }
        log::debug!("updated {}", key);
        Ok(())
    }

    async fn delete_by_id(&self, id: u64) -> Result<(), DomainError> {
        let key = order_key(id);

        let outcome = Transaction::new()
            .delete(key.as_str())
            .remove_from_set(ORDER_INDEX, key.as_str())
            .commit(self.store.as_ref())
            .await?;

        match outcome {
            TxOutcome::Committed => {
                log::debug!("deleted {}", key);
                Ok(())
            }
            TxOutcome::Discarded { failed_op: 0 } => Err(DomainError::NotFound),
            TxOutcome::Discarded { failed_op } => {
                log::warn!("delete of {} discarded at op {}", key, failed_op);
                Err(DomainError::TransactionAborted(format!(
                    "delete of {} discarded",
                    key
                )))
            }
        }
    }

    async fn find_all(&self, page: FindAllPage) -> Result<FindResult, DomainError> {
        if page.size == 0 {
            return Err(DomainError::InvalidInput(
                "page size must be at least 1".to_string(),
            ));
        }

        let batch = self
            .store
            .scan_set(ORDER_INDEX, page.offset, page.size)
            .await?;

        // The store may hand back an empty batch before the scan is done.
        if batch.members.is_empty() {
            return Ok(FindResult {
                orders: Vec::new(),
                cursor: batch.cursor,
            });
        }

        let values = self.store.multi_get(&batch.members).await?;

        let mut orders = Vec::with_capacity(values.len());
        for (key, value) in batch.members.iter().zip(values) {
            // Deleted between the scan and the fetch.
            let Some(bytes) = value else {
                log::debug!("{} vanished during listing, skipping", key);
                continue;
            };
            orders.push(decode(key, &bytes)?);
        }

        Ok(FindResult {
            orders,
            cursor: batch.cursor,
        })
    }
}
