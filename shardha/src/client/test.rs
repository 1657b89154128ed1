use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use shardha_config::{Cluster, Node, Pool as PoolSettings, Role};

use super::{Popped, ShardedClient};
use crate::backend::{MemoryConnector, MemoryNode};
use crate::net::{Command, Value};
use crate::{Error, Outcome};

/// Cluster of `nodes` nodes on 127.0.0.1, ports starting at `port`.
pub(crate) fn cluster(nodes: usize, port: u16) -> Cluster {
    Cluster {
        pool: PoolSettings {
            max_wait: 100,
            ..Default::default()
        },
        nodes: (0..nodes)
            .map(|i| Node::new("127.0.0.1", port + i as u16))
            .collect(),
    }
}

async fn client(nodes: usize) -> (ShardedClient, MemoryConnector) {
    let connector = MemoryConnector::default();
    let client = ShardedClient::with_connector(&cluster(nodes, 7000), Arc::new(connector.clone()))
        .await
        .unwrap();
    (client, connector)
}

fn node_for(client: &ShardedClient, connector: &MemoryConnector, key: &str) -> MemoryNode {
    connector.node(client.pool(key).addr())
}

/// Two keys owned by different nodes.
fn split_keys(client: &ShardedClient) -> (String, String) {
    let first = "key:0".to_string();
    let shard = client.shard(&first);
    let second = (1..)
        .map(|i| format!("key:{}", i))
        .find(|key| client.shard(key) != shard)
        .unwrap();
    (first, second)
}

#[tokio::test]
async fn test_list_operations() {
    crate::logger();
    let (client, _) = client(3).await;

    assert_eq!(client.rpush("q", "a").await.into_option(), Some(1));
    assert_eq!(client.rpush("q", "b").await.into_option(), Some(2));
    assert_eq!(
        client.lrange("q", 0, -1).await.into_option(),
        Some(vec![Bytes::from("a"), Bytes::from("b")])
    );

    assert_eq!(
        client.lpush_many("q", &["y", "z"]).await.into_option(),
        Some(4)
    );
    assert_eq!(
        client.lindex("q", 0).await.into_option(),
        Some(Bytes::from("z"))
    );
    assert!(client.lindex("q", 100).await.is_empty());
    assert!(client.lset("q", 0, "x").await.is_value());
    assert!(client.lset("q", 100, "x").await.is_failed());

    assert_eq!(client.lrem("q", 0, "y").await.into_option(), Some(1));
    assert_eq!(client.llen("q").await.into_option(), Some(3));
    assert_eq!(
        client.lpop("q").await.into_option(),
        Some(Bytes::from("x"))
    );
    assert_eq!(
        client.rpop("q").await.into_option(),
        Some(Bytes::from("b"))
    );
    assert_eq!(
        client.rpush_many("q", &["c", "d"]).await.into_option(),
        Some(3)
    );

    assert!(client.lpop("missing").await.is_empty());
    assert_eq!(client.llen("missing").await.into_option(), Some(0));
    assert_eq!(client.lrange("missing", 0, -1).await.into_option(), Some(vec![]));
}

#[tokio::test]
async fn test_setnx() {
    crate::logger();
    let (client, _) = client(2).await;

    assert_eq!(client.setnx("lock", "1").await.into_option(), Some(true));
    assert_eq!(client.setnx("lock", "1").await.into_option(), Some(false));
}

#[tokio::test]
async fn test_string_operations() {
    crate::logger();
    let (client, _) = client(2).await;

    assert!(client.get("k").await.is_empty());
    assert!(client.set("k", "v").await.is_value());
    assert_eq!(client.get("k").await.into_option(), Some(Bytes::from("v")));
    assert_eq!(client.expire("k", 60).await.into_option(), Some(true));
    assert_eq!(client.expire("nope", 60).await.into_option(), Some(false));
    assert_eq!(client.del("k").await.into_option(), Some(1));
    assert_eq!(client.del("k").await.into_option(), Some(0));

    assert_eq!(client.hset("h", "a", "1").await.into_option(), Some(1));
    assert_eq!(client.hset("h", "b", "2").await.into_option(), Some(1));
    assert_eq!(
        client.hvals("h").await.into_option(),
        Some(vec![Bytes::from("1"), Bytes::from("2")])
    );
}

#[tokio::test]
async fn test_keys_go_to_their_node() {
    crate::logger();
    let (client, connector) = client(4).await;

    for i in 0..50 {
        let key = format!("queue:{}", i);
        assert!(client.rpush(&key, "a").await.is_value());
        assert_eq!(client.pool(&key).addr().node_number, client.shard(&key));
    }

    let total: usize = (0..4)
        .map(|i| connector.node_at("127.0.0.1", 7000 + i).len())
        .sum();
    assert_eq!(total, 50);

    for i in 0..50 {
        let key = format!("queue:{}", i);
        let node = node_for(&client, &connector, &key);
        let reply = node
            .execute(&Command::new("LLEN").arg(&key))
            .await
            .unwrap();
        assert_eq!(reply, Value::Integer(1));
    }
}

#[tokio::test]
async fn test_node_failure_is_isolated() {
    crate::logger();
    let (client, connector) = client(2).await;
    let (down, up) = split_keys(&client);

    node_for(&client, &connector, &down).set_down(true);

    let outcome = client.rpush(&down, "a").await;
    assert!(outcome.error().unwrap().is_transport());
    assert!(client.rpush(&up, "a").await.is_value());

    // Node comes back, pool reconnects.
    node_for(&client, &connector, &down).set_down(false);
    assert!(client.rpush(&down, "a").await.is_value());
}

#[tokio::test]
async fn test_server_error_keeps_connection() {
    crate::logger();
    let (client, _) = client(1).await;

    assert!(client.set("str", "v").await.is_value());
    match client.rpush("str", "a").await {
        Outcome::Failed(Error::Server(err)) => assert!(err.starts_with("WRONGTYPE")),
        other => panic!("{:?}", other),
    }

    let state = &client.state()[0];
    assert_eq!(state.idle, 1);
    assert_eq!(state.stats.errors, 0);
    assert_eq!(state.stats.connects, 1);
}

#[tokio::test]
async fn test_blocking_pop() {
    crate::logger();
    let (client, _) = client(2).await;

    let waiter = {
        let client = client.clone();
        tokio::spawn(async move { client.blpop("jobs", Duration::from_secs(5)).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(client.rpush("jobs", "a").await.is_value());

    let popped = waiter.await.unwrap().into_option().unwrap();
    assert_eq!(
        popped,
        Popped {
            key: Bytes::from("jobs"),
            value: Bytes::from("a"),
        }
    );

    assert!(client.rpush_many("jobs", &["b", "c"]).await.is_value());
    assert_eq!(
        client
            .brpop("jobs", Duration::from_secs(1))
            .await
            .into_option()
            .map(|popped| popped.value),
        Some(Bytes::from("c"))
    );
}

#[tokio::test]
async fn test_blocking_pop_timeout() {
    crate::logger();
    let (client, _) = client(1).await;

    // Rounded up to one second.
    let start = tokio::time::Instant::now();
    assert!(client
        .blpop("empty", Duration::from_millis(10))
        .await
        .is_empty());
    assert!(start.elapsed() >= Duration::from_millis(900));
}

#[tokio::test]
async fn test_pipeline() {
    crate::logger();
    let (client, connector) = client(3).await;

    let mut pipeline = client.pipeline();
    for i in 0..10 {
        pipeline.rpush(format!("p:{}", i), format!("{}", i));
    }
    pipeline.get("missing").set("str", "v").rpush("str", "x");
    for i in 0..10 {
        pipeline.llen(format!("p:{}", i));
    }
    assert_eq!(pipeline.len(), 23);

    let replies = pipeline.sync().await;
    assert_eq!(replies.len(), 23);
    for reply in &replies[..10] {
        assert_eq!(reply.get(), Some(&Value::Integer(1)));
    }
    assert!(replies[10].is_empty());
    assert_eq!(replies[11].get(), Some(&Value::Simple("OK".into())));
    assert!(matches!(replies[12], Outcome::Failed(Error::Server(_))));
    for reply in &replies[13..] {
        assert_eq!(reply.get(), Some(&Value::Integer(1)));
    }

    // Unsent pipeline writes nothing.
    let before: usize = (0..3)
        .map(|i| connector.node_at("127.0.0.1", 7000 + i).len())
        .sum();
    {
        let mut pipeline = client.pipeline();
        pipeline.set("never", "sent");
    }
    assert!(client.get("never").await.is_empty());
    let after: usize = (0..3)
        .map(|i| connector.node_at("127.0.0.1", 7000 + i).len())
        .sum();
    assert_eq!(before, after);
}

#[tokio::test]
async fn test_invalid_arguments_stay_local() {
    crate::logger();
    let (client, connector) = client(1).await;
    let node = connector.node_at("127.0.0.1", 7000);

    let empty: [&str; 0] = [];
    assert!(matches!(
        client.rpush_many("q", &empty).await,
        Outcome::Failed(Error::InvalidArgument { operation: "RPUSH", .. })
    ));
    assert!(matches!(
        client.lpush_many("q", &empty).await,
        Outcome::Failed(Error::InvalidArgument { operation: "LPUSH", .. })
    ));

    // A TTL past i64::MAX must not wrap around and expire the key.
    client.set("k", "v").await.into_option().unwrap();
    assert!(matches!(
        client.expire("k", u64::MAX).await,
        Outcome::Failed(Error::InvalidArgument { operation: "EXPIRE", .. })
    ));

    let mut pipeline = client.pipeline();
    pipeline.expire("k", u64::MAX).get("k");
    let replies = pipeline.sync().await;
    assert!(matches!(replies[0], Outcome::Failed(Error::InvalidArgument { .. })));
    assert_eq!(replies[1].get(), Some(&Value::Bulk(Bytes::from("v"))));

    assert_eq!(client.get("k").await.into_option(), Some(Bytes::from("v")));
    assert_eq!(node.len(), 1);
    assert_eq!(client.pool("k").state().stats.errors, 0);
}

#[tokio::test]
async fn test_pipeline_node_down() {
    crate::logger();
    let (client, connector) = client(2).await;
    let (down, up) = split_keys(&client);
    node_for(&client, &connector, &down).set_down(true);

    let mut pipeline = client.pipeline();
    pipeline.rpush(&down, "a").rpush(&up, "a").rpush(&down, "b");
    let replies = pipeline.sync().await;

    assert!(matches!(replies[0], Outcome::Failed(Error::Pipeline(_))));
    assert_eq!(replies[1].get(), Some(&Value::Integer(1)));
    assert!(matches!(replies[2], Outcome::Failed(Error::Pipeline(_))));
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct Job {
    id: u64,
    payload: String,
}

#[tokio::test]
async fn test_objects() {
    crate::logger();
    let (client, _) = client(2).await;

    let job = Job {
        id: 1,
        payload: "hello".into(),
    };
    assert!(client.set_object("job:1", &job).await.is_value());
    assert_eq!(client.get_object::<Job>("job:1").await.into_option(), Some(job));
    assert!(client.get_object::<Job>("job:2").await.is_empty());

    assert!(client.set("garbage", "not msgpack").await.is_value());
    assert!(matches!(
        client.get_object::<Job>("garbage").await,
        Outcome::Failed(Error::Codec(_))
    ));

    for id in 0..3 {
        let bytes = crate::codec::encode(&Job {
            id,
            payload: "p".into(),
        })
        .unwrap();
        assert!(client.hset("jobs", id.to_string(), bytes).await.is_value());
    }
    let jobs = client.hvals_objects::<Job>("jobs").await.into_option().unwrap();
    assert_eq!(jobs.iter().map(|job| job.id).collect::<Vec<_>>(), vec![0, 1, 2]);
}

#[tokio::test]
async fn test_construction_fails_closed() {
    crate::logger();

    let connector = MemoryConnector::default();
    let err = ShardedClient::with_connector(&cluster(0, 7000), Arc::new(connector.clone()))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Config(shardha_config::Error::NoNodes(Role::Primary))
    ));

    let mut heavy = cluster(1, 7000);
    heavy.nodes[0].weight = usize::MAX / 100;
    let err = ShardedClient::with_connector(&heavy, Arc::new(connector.clone()))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Config(shardha_config::Error::Invalid { .. })
    ));

    connector.node_at("127.0.0.1", 7001).set_down(true);
    let err = ShardedClient::with_connector(&cluster(3, 7000), Arc::new(connector.clone()))
        .await
        .unwrap_err();
    match err {
        Error::Unreachable { addr, .. } => assert_eq!(addr.port, 7001),
        other => panic!("{:?}", other),
    }
}

#[tokio::test]
async fn test_shutdown() {
    crate::logger();
    let (client, _) = client(2).await;

    client.shutdown();
    assert!(matches!(
        client.rpush("q", "a").await,
        Outcome::Failed(Error::Offline)
    ));
    assert!(client.state().iter().all(|state| !state.online));
}

#[tokio::test]
async fn test_concurrent_callers() {
    crate::logger();
    let (client, _) = client(3).await;

    let mut tasks = vec![];
    for i in 0..100 {
        let client = client.clone();
        tasks.push(tokio::spawn(async move {
            client.rpush(format!("q:{}", i % 5), "x").await.is_value()
        }));
    }
    for task in tasks {
        assert!(task.await.unwrap());
    }

    let mut total = 0;
    for i in 0..5 {
        total += client.llen(format!("q:{}", i)).await.into_option().unwrap();
    }
    assert_eq!(total, 100);
}
