pub mod kv;
pub mod memory_store;
pub mod order_repo;
pub mod redis_store;
