//! Pool tests.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use super::*;
use crate::backend::{MemoryConnector, MemoryNode};
use crate::net::{Command, Value};
use crate::Error;

/// Launched pool over one in-memory node.
pub fn pool_with(config: Config) -> (Pool, MemoryNode) {
    let connector = MemoryConnector::default();
    let address = Address::new_test();
    let node = connector.node(&address);

    let pool = Pool::new(&PoolConfig { address, config }, Arc::new(connector));
    pool.launch();
    (pool, node)
}

pub fn memory_pool() -> (Pool, MemoryNode) {
    pool_with(Config {
        max_total: 1,
        checkout_timeout: Duration::from_millis(50),
        ..Default::default()
    })
}

#[tokio::test]
async fn test_pool_checkout() {
    crate::logger();

    let (pool, node) = memory_pool();
    let mut conn = pool.get().await.unwrap();
    assert_eq!(
        conn.execute(&Command::new("PING")).await.unwrap(),
        Value::Simple("PONG".into())
    );
    assert_eq!(pool.checked_out(), 1);
    assert_eq!(pool.state().idle, 0);
    drop(conn);

    // Same connection is reused.
    let conn = pool.get().await.unwrap();
    drop(conn);
    assert_eq!(node.connects(), 1);

    let state = pool.state();
    assert_eq!(state.stats.checkouts, 2);
    assert_eq!(state.stats.connects, 1);
    assert_eq!(state.idle, 1);
}

#[tokio::test]
async fn test_checkout_timeout() {
    crate::logger();

    let (pool, _node) = memory_pool();
    let held = pool.get().await.unwrap();

    let start = Instant::now();
    let err = pool.get().await.unwrap_err();
    assert!(matches!(err, Error::PoolExhausted));
    assert!(start.elapsed() >= Duration::from_millis(50));
    assert_eq!(pool.state().stats.checkout_timeouts, 1);

    drop(held);
    assert!(pool.get().await.is_ok());
}

#[tokio::test]
async fn test_waiter_gets_returned_connection() {
    crate::logger();

    let (pool, node) = pool_with(Config {
        max_total: 1,
        checkout_timeout: Duration::from_secs(1),
        ..Default::default()
    });
    let held = pool.get().await.unwrap();

    let waiter = {
        let pool = pool.clone();
        tokio::spawn(async move { pool.get().await.map(|_| ()) })
    };

    tokio::time::sleep(Duration::from_millis(20)).await;
    drop(held);

    waiter.await.unwrap().unwrap();
    assert_eq!(node.connects(), 1);
}

#[tokio::test]
async fn test_offline() {
    crate::logger();

    let (pool, _node) = memory_pool();
    let conn = pool.get().await.unwrap();
    drop(conn);

    pool.shutdown();
    assert!(!pool.online());
    assert_eq!(pool.state().idle, 0);
    assert!(matches!(pool.get().await, Err(Error::Offline)));

    let connector = Arc::new(MemoryConnector::default());
    let never_launched = Pool::new(
        &PoolConfig {
            address: Address::new_test(),
            config: Config::default(),
        },
        connector,
    );
    assert!(matches!(never_launched.get().await, Err(Error::Offline)));
}

#[tokio::test]
async fn test_shutdown_wakes_waiters() {
    crate::logger();

    let (pool, _node) = pool_with(Config {
        max_total: 1,
        checkout_timeout: Duration::from_secs(5),
        ..Default::default()
    });
    let held = pool.get().await.unwrap();

    let waiter = {
        let pool = pool.clone();
        tokio::spawn(async move { pool.get().await.map(|_| ()) })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    pool.shutdown();
    assert!(matches!(waiter.await.unwrap(), Err(Error::Offline)));

    // Returning a connection to an offline pool closes it.
    drop(held);
    assert_eq!(pool.state().idle, 0);
}

#[tokio::test]
async fn test_node_down_connect_error() {
    crate::logger();

    let (pool, node) = memory_pool();
    node.set_down(true);

    assert!(pool.get().await.unwrap_err().is_transport());
    assert_eq!(pool.state().stats.connect_errors, 1);
    assert_eq!(pool.checked_out(), 0);

    node.set_down(false);
    assert!(pool.get().await.is_ok());
}

#[tokio::test]
async fn test_test_on_borrow_replaces_dead_connection() {
    crate::logger();

    let (pool, node) = pool_with(Config {
        max_total: 2,
        test_on_borrow: true,
        ..Default::default()
    });

    let conn = pool.get().await.unwrap();
    drop(conn);
    assert_eq!(pool.state().idle, 1);

    // Idle connection dies, node comes back.
    node.kill_connections();

    let mut conn = pool.get().await.unwrap();
    assert!(conn.execute(&Command::new("PING")).await.is_ok());
    drop(conn);

    let state = pool.state();
    assert_eq!(state.stats.healthchecks, 1);
    assert_eq!(state.stats.errors, 1);
    assert_eq!(state.stats.connects, 2);
    assert_eq!(state.idle, 1);
}

#[tokio::test]
async fn test_max_idle() {
    crate::logger();

    let (pool, _node) = pool_with(Config {
        max_total: 3,
        max_idle: 1,
        ..Default::default()
    });

    let a = pool.get().await.unwrap();
    let b = pool.get().await.unwrap();
    let c = pool.get().await.unwrap();
    assert_eq!(pool.checked_out(), 3);
    drop(a);
    drop(b);
    drop(c);

    let state = pool.state();
    assert_eq!(state.idle, 1);
    assert_eq!(state.stats.closed_idle, 2);
    assert_eq!(state.checked_out, 0);
}

#[tokio::test]
async fn test_concurrent_checkouts_share_pool() {
    crate::logger();

    let (pool, node) = pool_with(Config {
        max_total: 4,
        checkout_timeout: Duration::from_secs(1),
        ..Default::default()
    });

    let mut tasks = vec![];
    for i in 0..32 {
        let pool = pool.clone();
        tasks.push(tokio::spawn(async move {
            let mut conn = pool.get().await.unwrap();
            conn.execute(&Command::new("RPUSH").arg("q").int(i))
                .await
                .unwrap()
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    assert!(node.connects() <= 4);
    assert_eq!(pool.checked_out(), 0);

    let mut conn = pool.get().await.unwrap();
    let len = conn.execute(&Command::new("LLEN").arg("q")).await.unwrap();
    assert_eq!(len, Value::Integer(32));
}
