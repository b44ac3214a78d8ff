//! Token-aware replica placement for [Scylla](https://scylladb.com) and
//! [Apache Cassandra®](https://cassandra.apache.org/) clusters.
//!
//! Given the cluster topology (hosts, their datacenters, racks and tokens) and the replication
//! settings of keyspaces, this crate answers which hosts hold replicas of a given partition.
//! Drivers use it to send requests straight to a replica.
//!
//! # Overview
//! ### Building the state
//! All activity revolves around the [Cluster].\
//! It is fed with topology and schema changes, and publishes immutable [ClusterState] snapshots:
//!
//! ```rust
//! use scylla_topology::{ClusterBuilder, Peer, Token};
//! use std::collections::HashMap;
//! use std::error::Error;
//! use uuid::Uuid;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn Error>> {
//!     let cluster = ClusterBuilder::new().build();
//!
//!     let peers = vec![
//!         Peer::new(
//!             Uuid::new_v4(),
//!             "10.0.0.1:9042".parse()?,
//!             Some("dc1".to_owned()),
//!             Some("rack1".to_owned()),
//!             vec![Token::new(-100), Token::new(100)],
//!         ),
//!         Peer::new(
//!             Uuid::new_v4(),
//!             "10.0.0.2:9042".parse()?,
//!             Some("dc1".to_owned()),
//!             Some("rack2".to_owned()),
//!             vec![Token::new(0)],
//!         ),
//!     ];
//!     cluster.on_hosts_snapshot(peers).await?;
//!
//!     let options = HashMap::from([("dc1".to_owned(), "2".to_owned())]);
//!     cluster
//!         .on_keyspace_replication_changed("ks", "NetworkTopologyStrategy", &options)
//!         .await?;
//!
//!     // Waits until the changes are visible.
//!     cluster.refresh().await?;
//!
//!     let state = cluster.get_state();
//!     let replicas = state.token_map().replicas("ks", &Token::new(50));
//!     assert_eq!(replicas.len(), 2);
//!     Ok(())
//! }
//! ```
//!
//! ### Looking up replicas
//! Readers take the current snapshot with [Cluster::get_state] and query its [TokenMap].
//! Lookups never block and never wait for a rebuild in progress:
//! * [by token](crate::TokenMap::replicas)
//! * [by serialized partition key](crate::TokenMap::replicas_for_key)
//! * [primary owner only](crate::TokenMap::primary_replica)
//!
//! A lookup in an unknown keyspace, or in a keyspace whose strategy can't be used for routing,
//! returns an empty [ReplicaSet]. Callers should then fall back to any available host.

#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub mod cluster;
pub mod errors;
pub mod routing;

pub(crate) mod utils;
#[cfg(test)]
pub(crate) use utils::test_utils;

pub use cluster::metadata::{Peer, ReplicationFactor, Strategy};
pub use cluster::{Cluster, ClusterBuilder, ClusterConfig, ClusterState, Host, HostRef};
pub use routing::locator::{ReplicaSet, TokenMap};
pub use routing::partitioner::PartitionerName;
pub use routing::Token;
