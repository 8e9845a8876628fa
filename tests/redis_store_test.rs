//! `RedisStore` and the order repository against a real Redis server.
//!
//! Starts a throwaway `redis:7-alpine` container, so Docker (or Podman) must
//! be available:
//!
//!   cargo test --test redis_store_test -- --include-ignored

use std::collections::HashSet;
use std::str::FromStr;
use std::sync::Arc;

use bigdecimal::BigDecimal;
use chrono::Utc;
use order_store::domain::errors::DomainError;
use order_store::domain::order::{FindAllPage, LineItem, Order};
use order_store::domain::ports::OrderRepository;
use order_store::infrastructure::kv::{KvStore, Transaction, TxOutcome};
use order_store::infrastructure::order_repo::{KvOrderRepository, ORDER_INDEX};
use order_store::infrastructure::redis_store::RedisStore;
use testcontainers::core::{ContainerPort, WaitFor};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, GenericImage, ImageExt};
use uuid::Uuid;

fn free_port() -> u16 {
    // Bind to port 0 to let the OS assign a free port, then release it.
    // There is a small TOCTOU window, but it is acceptable for test usage.
    std::net::TcpListener::bind("127.0.0.1:0")
        .expect("bind failed")
        .local_addr()
        .expect("addr failed")
        .port()
}

async fn setup_redis() -> (ContainerAsync<GenericImage>, Arc<RedisStore>) {
    // Pre-allocate a host port so we never need `get_host_port_ipv4`, which
    // breaks on Podman because it returns `HostIp: ""` instead of `"0.0.0.0"`.
    let port = free_port();
    let container = GenericImage::new("redis", "7-alpine")
        .with_wait_for(WaitFor::message_on_stdout("Ready to accept connections"))
        .with_mapped_port(port, ContainerPort::Tcp(6379))
        .start()
        .await
        .expect("Failed to start Redis container");
    let url = format!("redis://127.0.0.1:{}", port);
    let store = RedisStore::connect(&url)
        .await
        .expect("Failed to connect to Redis");
    (container, Arc::new(store))
}

fn make_order(id: u64) -> Order {
    Order {
        order_id: id,
        customer_id: 1,
        line_items: vec![LineItem {
            product_id: Uuid::new_v4(),
            quantity: 1,
            unit_price: BigDecimal::from_str("1.00").expect("valid decimal"),
        }],
        created_at: Utc::now(),
        shipped_at: None,
        completed_at: None,
    }
}

#[tokio::test]
#[ignore = "requires a container runtime"]
async fn primitives_follow_store_contract() {
    let (_container, store) = setup_redis().await;

    store.ping().await.expect("ping failed");
    assert!(store.set_if_absent("k", b"v1").await.expect("set nx"));
    assert!(!store.set_if_absent("k", b"v2").await.expect("set nx"));
    assert!(store.set_if_present("k", b"v3").await.expect("set xx"));
    assert!(!store.set_if_present("missing", b"v").await.expect("set xx"));
    assert_eq!(store.get("k").await.expect("get"), Some(b"v3".to_vec()));

    let keys = vec!["k".to_string(), "missing".to_string()];
    assert_eq!(
        store.multi_get(&keys).await.expect("mget"),
        vec![Some(b"v3".to_vec()), None]
    );

    assert!(store.delete("k").await.expect("del"));
    assert!(!store.delete("k").await.expect("del"));

    store.add_to_set("s", "a").await.expect("sadd");
    store.add_to_set("s", "b").await.expect("sadd");
    store.remove_from_set("s", "a").await.expect("srem");
    let batch = store.scan_set("s", 0, 10).await.expect("sscan");
    assert_eq!(batch.members, vec!["b"]);
    assert_eq!(batch.cursor, 0);
}

#[tokio::test]
#[ignore = "requires a container runtime"]
async fn failed_precondition_discards_index_write() {
    let (_container, store) = setup_redis().await;
    store.set_if_absent("order:1", b"old").await.expect("seed");

    let outcome = Transaction::new()
        .set_if_absent("order:1", b"new".to_vec())
        .add_to_set(ORDER_INDEX, "order:1")
        .commit(store.as_ref())
        .await
        .expect("transaction failed");

    assert_eq!(outcome, TxOutcome::Discarded { failed_op: 0 });
    assert_eq!(store.get("order:1").await.expect("get"), Some(b"old".to_vec()));
    let batch = store.scan_set(ORDER_INDEX, 0, 10).await.expect("sscan");
    assert!(batch.members.is_empty());
}

#[tokio::test]
#[ignore = "requires a container runtime"]
async fn repository_roundtrip_and_sweep() {
    let (_container, store) = setup_redis().await;
    let repo = KvOrderRepository::new(store.clone());

    for id in 1..=25 {
        repo.insert(&make_order(id)).await.expect("insert failed");
    }
    assert!(matches!(
        repo.insert(&make_order(3)).await,
        Err(DomainError::AlreadyExists)
    ));

    let mut seen = HashSet::new();
    let mut cursor = 0;
    loop {
        let page = repo
            .find_all(FindAllPage {
                size: 5,
                offset: cursor,
            })
            .await
            .expect("find_all failed");
        seen.extend(page.orders.iter().map(|o| o.order_id));
        cursor = page.cursor;
        if cursor == 0 {
            break;
        }
    }
    assert_eq!(seen, (1..=25).collect::<HashSet<u64>>());

    repo.delete_by_id(7).await.expect("delete failed");
    assert!(matches!(repo.find_by_id(7).await, Err(DomainError::NotFound)));
    assert!(matches!(
        repo.delete_by_id(7).await,
        Err(DomainError::NotFound)
    ));

    store
        .set_if_present("order:8", b"garbage")
        .await
        .expect("overwrite failed");
    assert!(matches!(
        repo.find_by_id(8).await,
        Err(DomainError::CorruptRecord(_))
    ));
}
