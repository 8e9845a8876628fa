use std::sync::Arc;

use async_trait::async_trait;

use super::errors::DomainError;
use super::order::{FindAllPage, FindResult, Order};

/// Id-keyed storage of orders. Each call is a single atomic unit; callers
/// get no isolation across calls.
#[async_trait]
pub trait OrderRepository: Send + Sync + 'static {
    /// Fails with `AlreadyExists` if an order with the same id is stored.
    async fn insert(&self, order: &Order) -> Result<(), DomainError>;
    async fn find_by_id(&self, id: u64) -> Result<Order, DomainError>;
    /// Whole-record replacement of an existing order. Never creates one.
    async fn update(&self, order: &Order) -> Result<(), DomainError>;
    async fn delete_by_id(&self, id: u64) -> Result<(), DomainError>;
    /// Best-effort cursor sweep; pages may repeat or miss orders that are
    /// mutated while the sweep is in progress.
    async fn find_all(&self, page: FindAllPage) -> Result<FindResult, DomainError>;
}

#[async_trait]
impl<R: OrderRepository + ?Sized> OrderRepository for Arc<R> {
    async fn insert(&self, order: &Order) -> Result<(), DomainError> {
        (**self).insert(order).await
    }

    async fn find_by_id(&self, id: u64) -> Result<Order, DomainError> {
        (**self).find_by_id(id).await
    }

    async fn update(&self, order: &Order) -> Result<(), DomainError> {
        (**self).update(order).await
    }

    async fn delete_by_id(&self, id: u64) -> Result<(), DomainError> {
        (**self).delete_by_id(id).await
    }

    async fn find_all(&self, page: FindAllPage) -> Result<FindResult, DomainError> {
        (**self).find_all(page).await
    }
}
