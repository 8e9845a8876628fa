use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use crate::domain::errors::DomainError;
use crate::domain::order::{FindAllPage, FindResult, LineItem, Order, OrderStatus};
use crate::domain::ports::OrderRepository;

pub struct OrderService<R> {
    repo: R,
    deadline: Duration,
}

impl<R: OrderRepository> OrderService<R> {
    pub fn new(repo: R, deadline: Duration) -> Self {
        Self { repo, deadline }
    }

    /// Runs one repository call under the configured deadline. On expiry the
    /// call's future is dropped before it completes.
    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, DomainError>>,
    ) -> Result<T, DomainError> {
        tokio::time::timeout(self.deadline, call)
            .await
            .map_err(|_| {
                DomainError::Transport(format!("deadline of {:?} exceeded", self.deadline))
            })?
    }

    pub async fn create_order(
        &self,
        customer_id: u64,
        line_items: Vec<LineItem>,
    ) -> Result<Order, DomainError> {
        let order = Order {
            order_id: new_order_id(),
            customer_id,
            line_items,
            created_at: Utc::now(),
            shipped_at: None,
            completed_at: None,
        };
        self.bounded(self.repo.insert(&order)).await?;
        Ok(order)
    }

    pub async fn get_order(&self, id: u64) -> Result<Order, DomainError> {
        self.bounded(self.repo.find_by_id(id)).await
    }

    pub async fn list_orders(&self, page: FindAllPage) -> Result<FindResult, DomainError> {
        self.bounded(self.repo.find_all(page)).await
    }

    pub async fn delete_order(&self, id: u64) -> Result<(), DomainError> {
        self.bounded(self.repo.delete_by_id(id)).await
    }

    /// Moves an order to `status`, stamping the matching timestamp. Orders
    /// ship once, and only shipped orders can complete. The read and the
    /// write share one deadline.
    pub async fn update_status(&self, id: u64, status: OrderStatus) -> Result<Order, DomainError> {
        self.bounded(async {
            let mut order = self.repo.find_by_id(id).await?;
            apply_status(&mut order, status)?;
            self.repo.update(&order).await?;
            Ok::<_, DomainError>(order)
        })
        .await
    }
}

fn apply_status(order: &mut Order, status: OrderStatus) -> Result<(), DomainError> {
    let now = Utc::now();
    match status {
        OrderStatus::Shipped => {
            if order.shipped_at.is_some() {
                return Err(DomainError::InvalidTransition(format!(
                    "order {} has already shipped",
                    order.order_id
                )));
            }
            order.shipped_at = Some(now);
        }
        OrderStatus::Completed => {
            if order.shipped_at.is_none() {
                return Err(DomainError::InvalidTransition(format!(
                    "order {} has not shipped",
                    order.order_id
                )));
            }
            if order.completed_at.is_some() {
                return Err(DomainError::InvalidTransition(format!(
                    "order {} is already completed",
                    order.order_id
                )));
            }
            order.completed_at = Some(now);
        }
    }
    Ok(())
}

/// Largest id the service hands out: 2^53 - 1, the biggest integer a JSON
/// client parsing numbers as doubles reads back exactly.
pub const MAX_ORDER_ID: u64 = (1 << 53) - 1;

/// Random order id in `1..=MAX_ORDER_ID`.
fn new_order_id() -> u64 {
    loop {
        // The low half's top two bits are the UUID variant; the rest is random.
        let (_, low) = Uuid::new_v4().as_u64_pair();
        let id = low & MAX_ORDER_ID;
        if id != 0 {
            return id;
        }
    }
}
