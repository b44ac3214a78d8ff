use std::sync::Arc;
use std::time::Duration;

use crate::utils::{addr, ids, options, peer, setup_tracing, two_dc_peers};

use assert_matches::assert_matches;
use scylla_topology::errors::{
    KeyspaceStrategyError, ReplicationFactorParseError, TopologyUpdateError,
};
use scylla_topology::{ClusterBuilder, Strategy, Token};

#[tokio::test]
#[ntest::timeout(10000)]
async fn readers_keep_their_snapshot() {
    setup_tracing();
    let cluster = ClusterBuilder::new().build();
    cluster.on_hosts_snapshot(two_dc_peers()).await.unwrap();
    cluster
        .on_keyspace_replication_changed(
            "ks",
            "SimpleStrategy",
            &options([("replication_factor", "2")]),
        )
        .await
        .unwrap();
    cluster.refresh().await.unwrap();

    let before = cluster.get_state();
    cluster.on_host_removed(addr(2)).await.unwrap();
    cluster.refresh().await.unwrap();
    let after = cluster.get_state();

    assert_eq!(after.generation(), before.generation() + 1);
    assert_eq!(
        ids(before.token_map().replicas("ks", &Token::new(50))),
        vec![2, 3]
    );
    assert_eq!(
        ids(after.token_map().replicas("ks", &Token::new(50))),
        vec![3, 4]
    );
    assert!(before.get_host(addr(2)).is_some());
    assert!(after.get_host(addr(2)).is_none());

    // Hosts which didn't change are shared between snapshots.
    for id in [1, 3, 4, 5, 6] {
        assert!(Arc::ptr_eq(
            before.get_host(addr(id)).unwrap(),
            after.get_host(addr(id)).unwrap()
        ));
    }
}

#[tokio::test]
#[ntest::timeout(10000)]
async fn schema_changes_reuse_hosts() {
    setup_tracing();
    let cluster = ClusterBuilder::new().build();
    let peers = two_dc_peers();
    cluster.on_hosts_snapshot(peers.clone()).await.unwrap();
    cluster.refresh().await.unwrap();
    let before = cluster.get_state();

    cluster
        .on_keyspace_replication_changed("ks", "EverywhereStrategy", &options([]))
        .await
        .unwrap();
    // The same snapshot again is not a change.
    cluster.on_hosts_snapshot(peers).await.unwrap();
    cluster.refresh().await.unwrap();
    let after = cluster.get_state();

    assert_eq!(after.generation(), before.generation() + 1);
    assert_eq!(
        after.token_map().strategy("ks"),
        Some(&Strategy::EverywhereStrategy)
    );
    for host in before.get_hosts_info() {
        assert!(Arc::ptr_eq(host, after.get_host(host.address).unwrap()));
    }
}

#[tokio::test]
#[ntest::timeout(10000)]
async fn rejected_replication_options_leave_keyspace_without_replicas() {
    setup_tracing();
    let cluster = ClusterBuilder::new().build();
    cluster.on_hosts_snapshot(two_dc_peers()).await.unwrap();
    cluster
        .on_keyspace_replication_changed(
            "ks",
            "SimpleStrategy",
            &options([("replication_factor", "2")]),
        )
        .await
        .unwrap();
    cluster.refresh().await.unwrap();
    let before = cluster.get_state();
    assert_eq!(
        ids(before.token_map().replicas("ks", &Token::new(50))),
        vec![2, 3]
    );

    let result = cluster
        .on_keyspace_replication_changed(
            "ks",
            "SimpleStrategy",
            &options([("replication_factor", "3/5")]),
        )
        .await;
    assert_matches!(
        result,
        Err(TopologyUpdateError::KeyspaceStrategy {
            error: KeyspaceStrategyError::ReplicationFactorParseError(
                ReplicationFactorParseError::TransientExceedsAll { all: 3, transient: 5 }
            ),
            ..
        })
    );

    let result = cluster
        .on_keyspace_replication_changed(
            "ks",
            "SimpleStrategy",
            &options([("replication_factor", "2/1/0")]),
        )
        .await;
    assert_matches!(
        result,
        Err(TopologyUpdateError::KeyspaceStrategy {
            error: KeyspaceStrategyError::ReplicationFactorParseError(
                ReplicationFactorParseError::TooManyParts(_)
            ),
            ..
        })
    );

    cluster.refresh().await.unwrap();
    let state = cluster.get_state();
    assert_eq!(state.generation(), before.generation() + 1);
    assert!(state.token_map().strategy("ks").is_none());
    assert!(state
        .token_map()
        .replicas("ks", &Token::new(50))
        .is_empty());
    assert_eq!(
        ids(before.token_map().replicas("ks", &Token::new(50))),
        vec![2, 3]
    );

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
    assert_eq!(
        ids(state.token_map().replicas("ks", &Token::new(50))),
        vec![2]
    );
}

#[tokio::test]
#[ntest::timeout(10000)]
async fn unusable_strategies_give_no_replicas() {
    setup_tracing();
    let cluster = ClusterBuilder::new().build();
    cluster.on_hosts_snapshot(two_dc_peers()).await.unwrap();
    cluster
        .on_keyspace_replication_changed("custom", "com.example.CustomStrategy", &options([]))
        .await
        .unwrap();
    cluster
        .on_keyspace_replication_changed("no_rf", "SimpleStrategy", &options([]))
        .await
        .unwrap();
    cluster.refresh().await.unwrap();

    let state = cluster.get_state();
    for keyspace in ["custom", "no_rf", "unknown"] {
        assert!(state
            .token_map()
            .replicas(keyspace, &Token::new(50))
            .is_empty());
        assert!(state.token_map().strategy(keyspace).is_none());
    }
}

#[tokio::test]
#[ntest::timeout(10000)]
async fn hosts_without_tokens_are_known_but_own_nothing() {
    setup_tracing();
    let cluster = ClusterBuilder::new().build();
    let mut peers = two_dc_peers();
    peers.push(peer(7, "dc1", "r3", &[]));
    cluster.on_hosts_snapshot(peers).await.unwrap();
    cluster
        .on_keyspace_replication_changed("ks", "EverywhereStrategy", &options([]))
        .await
        .unwrap();
    cluster.refresh().await.unwrap();

    let state = cluster.get_state();
    let joining = state.get_host(addr(7)).unwrap();
    assert!(!joining.has_tokens());
    assert_eq!(state.get_hosts_info().count(), 7);
    assert_eq!(state.token_map().unique_hosts_in_ring().len(), 6);
    assert_eq!(state.token_map().datacenters()["dc1"].rack_count(), 2);
    assert!(!state
        .token_map()
        .replicas("ks", &Token::new(50))
        .contains(addr(7)));
}

#[tokio::test]
#[ntest::timeout(10000)]
async fn liveness_does_not_affect_placement() {
    setup_tracing();
    let cluster = ClusterBuilder::new().build();
    cluster.on_hosts_snapshot(two_dc_peers()).await.unwrap();
    cluster
        .on_keyspace_replication_changed(
            "ks",
            "NetworkTopologyStrategy",
            &options([("dc1", "2"), ("dc2", "2")]),
        )
        .await
        .unwrap();
    cluster.refresh().await.unwrap();
    let generation = cluster.get_state().generation();

    cluster
        .on_host_status_changed(addr(3), false)
        .await
        .unwrap();
    cluster.refresh().await.unwrap();

    let state = cluster.get_state();
    assert_eq!(state.generation(), generation);
    let replicas = state.token_map().replicas("ks", &Token::new(50));
    assert_eq!(ids(replicas), vec![2, 3, 4, 5]);
    assert!(!state.get_host(addr(3)).unwrap().is_up());

    let mut rng = rand::rng();
    for _ in 0..32 {
        let chosen = replicas
            .choose_filtered(&mut rng, |host| host.is_up())
            .unwrap();
        assert_ne!(chosen.address, addr(3));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[ntest::timeout(20000)]
async fn lookups_run_concurrently_with_rebuilds() {
    setup_tracing();
    let cluster = Arc::new(
        ClusterBuilder::new()
            .rebuild_delay(Duration::from_millis(1))
            .build(),
    );
    cluster.on_hosts_snapshot(two_dc_peers()).await.unwrap();
    cluster.refresh().await.unwrap();

    let reader = {
        let cluster = Arc::clone(&cluster);
        tokio::spawn(async move {
            let mut last_generation = 0;
            for i in 0..2000_i64 {
                let state = cluster.get_state();
                assert!(state.generation() >= last_generation);
                last_generation = state.generation();

                let replicas = state.token_map().replicas("ks", &Token::new(i * 7));
                let mut seen = ids(replicas);
                assert!(seen.len() <= 4);
                seen.sort_unstable();
                seen.dedup();
                assert_eq!(seen.len(), replicas.len());
                tokio::task::yield_now().await;
            }
        })
    };

    for rf in ["1", "2", "1", "2", "1", "2"] {
        cluster
            .on_keyspace_replication_changed(
                "ks",
                "NetworkTopologyStrategy",
                &options([("dc1", rf), ("dc2", rf)]),
            )
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(2)).await;
    }

    reader.await.unwrap();
    cluster.refresh().await.unwrap();
    assert_eq!(
        cluster
            .get_state()
            .token_map()
            .replicas("ks", &Token::new(50))
            .len(),
        4
    );
}
