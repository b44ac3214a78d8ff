use crate::utils::{addr, ids, options, setup_tracing, two_dc_peers};

use scylla_topology::routing::partitioner::calculate_token_for_partition_key;
use scylla_topology::{Cluster, ClusterBuilder, PartitionerName, Peer, Token};
use uuid::Uuid;

async fn cluster_with_keyspaces(keyspaces: &[(&str, &str, &[(&str, &str)])]) -> Cluster {
    let cluster = ClusterBuilder::new().build();
    cluster.on_hosts_snapshot(two_dc_peers()).await.unwrap();
    for (keyspace, class, opts) in keyspaces {
        cluster
            .on_keyspace_replication_changed(*keyspace, class, &options(opts.iter().copied()))
            .await
            .unwrap();
    }
    cluster.refresh().await.unwrap();
    cluster
}

#[tokio::test]
#[ntest::timeout(10000)]
async fn simple_strategy_walks_the_ring() {
    setup_tracing();
    let cluster = cluster_with_keyspaces(&[
        ("rf3", "SimpleStrategy", &[("replication_factor", "3")]),
        ("transient", "SimpleStrategy", &[("replication_factor", "3/1")]),
    ])
    .await;
    let state = cluster.get_state();
    let replicas = |ks, token| ids(state.token_map().replicas(ks, &Token::new(token)));

    assert_eq!(replicas("rf3", 50), vec![2, 3, 4]);
    assert_eq!(replicas("rf3", 100), vec![2, 3, 4]);
    // Past the last token the walk wraps around.
    assert_eq!(replicas("rf3", 850), vec![4, 1, 2]);
    assert_eq!(replicas("rf3", 950), vec![1, 2, 3]);
    // Only full replicas are returned.
    assert_eq!(replicas("transient", 50), vec![2, 3]);
}

#[tokio::test]
#[ntest::timeout(10000)]
async fn network_topology_strategy_places_replicas_per_datacenter() {
    setup_tracing();
    let cluster = cluster_with_keyspaces(&[
        ("both", "NetworkTopologyStrategy", &[("dc1", "2"), ("dc2", "2")]),
        ("dc1_only", "NetworkTopologyStrategy", &[("dc1", "3")]),
        ("dc2_only", "NetworkTopologyStrategy", &[("dc2", "2")]),
    ])
    .await;
    let state = cluster.get_state();
    let replicas = |ks, token| ids(state.token_map().replicas(ks, &Token::new(token)));

    assert_eq!(replicas("both", 50), vec![2, 3, 4, 5]);
    assert_eq!(replicas("both", 650), vec![2, 3, 4, 5]);
    assert_eq!(replicas("dc1_only", 50), vec![2, 3, 1]);
    // Host 6 comes right after host 5 but shares its rack, so host 4 is preferred.
    assert_eq!(replicas("dc2_only", 350), vec![5, 4]);
}

#[tokio::test]
#[ntest::timeout(10000)]
async fn local_and_everywhere_strategies() {
    setup_tracing();
    let cluster = cluster_with_keyspaces(&[
        ("system", "LocalStrategy", &[]),
        ("system_auth", "org.apache.cassandra.locator.EverywhereStrategy", &[]),
    ])
    .await;
    let state = cluster.get_state();
    let token_map = state.token_map();

    assert_eq!(ids(token_map.replicas("system", &Token::new(50))), vec![2]);
    assert_eq!(ids(token_map.primary_replica(&Token::new(50))), vec![2]);

    let mut everywhere = ids(token_map.replicas("system_auth", &Token::new(50)));
    everywhere.sort_unstable();
    assert_eq!(everywhere, vec![1, 2, 3, 4, 5, 6]);
}

#[tokio::test]
#[ntest::timeout(10000)]
async fn replica_set_helpers() {
    setup_tracing();
    let cluster = cluster_with_keyspaces(&[(
        "ks",
        "NetworkTopologyStrategy",
        &[("dc1", "2"), ("dc2", "2")],
    )])
    .await;
    let state = cluster.get_state();
    let replicas = state.token_map().replicas("ks", &Token::new(50));

    assert_eq!(replicas.len(), 4);
    assert!(replicas.contains(addr(5)));
    assert!(!replicas.contains(addr(1)));
    assert_eq!(ids(replicas.in_datacenter("dc2")), vec![4, 5]);
    assert_eq!(replicas.in_datacenter("dc3").count(), 0);

    let mut rng = rand::rng();
    let chosen = replicas
        .choose_filtered(&mut rng, |host| host.datacenter.as_deref() == Some("dc1"))
        .unwrap();
    assert!([addr(2), addr(3)].contains(&chosen.address));
    assert!(replicas.choose_filtered(&mut rng, |_| false).is_none());
}

#[tokio::test]
#[ntest::timeout(10000)]
async fn partition_keys_are_hashed_with_cluster_partitioner() {
    setup_tracing();
    let cluster = cluster_with_keyspaces(&[(
        "ks",
        "SimpleStrategy",
        &[("replication_factor", "2")],
    )])
    .await;
    let state = cluster.get_state();
    let token_map = state.token_map();

    let key: &[u8] = &42_i32.to_be_bytes();
    let token = calculate_token_for_partition_key(&[key], &PartitionerName::Murmur3).unwrap();
    assert_eq!(token_map.compute_token(key), token);
    assert_eq!(
        ids(token_map.replicas_for_key("ks", key)),
        ids(token_map.replicas("ks", &token))
    );
}

#[tokio::test]
#[ntest::timeout(10000)]
async fn byte_ordered_ring() {
    setup_tracing();
    let cluster = ClusterBuilder::new()
        .partitioner(PartitionerName::ByteOrdered)
        .build();

    let partitioner = PartitionerName::ByteOrdered;
    let peers = [(1, "64"), (2, "0x6d"), (3, "74")]
        .into_iter()
        .map(|(id, token)| {
            Peer::new(
                Uuid::new_v4(),
                addr(id),
                Some("dc1".to_owned()),
                None,
                vec![partitioner.parse_token(token).unwrap()],
            )
        })
        .collect();
    cluster.on_hosts_snapshot(peers).await.unwrap();
    cluster
        .on_keyspace_replication_changed(
            "ks",
            "SimpleStrategy",
            &options([("replication_factor", "1")]),
        )
        .await
        .unwrap();
    cluster.refresh().await.unwrap();

    let state = cluster.get_state();
    let token_map = state.token_map();
    assert_eq!(token_map.partitioner(), PartitionerName::ByteOrdered);
    assert_eq!(
        token_map.compute_token(b"cat"),
        Token::from_bytes(&b"cat"[..])
    );

    // Tokens: "d" (1), "m" (2), "t" (3).
    assert_eq!(ids(token_map.replicas_for_key("ks", b"cat")), vec![1]);
    assert_eq!(ids(token_map.replicas_for_key("ks", b"d")), vec![1]);
    assert_eq!(ids(token_map.replicas_for_key("ks", b"dog")), vec![2]);
    assert_eq!(ids(token_map.replicas_for_key("ks", b"zebra")), vec![1]);
}
