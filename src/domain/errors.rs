use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Order already exists")]
    AlreadyExists,
    #[error("Order not found")]
    NotFound,
    #[error("Corrupt record: {0}")]
    CorruptRecord(String),
    #[error("Failed to encode order: {0}")]
    Encode(String),
    #[error("Store unavailable: {0}")]
    Transport(String),
    #[error("Transaction aborted: {0}")]
    TransactionAborted(String),
    #[error("Store rejected request: {0}")]
    StoreRejected(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Invalid status transition: {0}")]
    InvalidTransition(String),
}
