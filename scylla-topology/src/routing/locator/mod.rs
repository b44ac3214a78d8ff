//! Replica locator: the token ring and replica lists of every token,
//! computed for the replication strategies of known keyspaces.

mod precomputed_replicas;
mod replication_info;
mod token_ring;

use rand::{seq::IteratorRandom, Rng};
pub use replication_info::DatacenterInfo;
pub use token_ring::TokenRing;

use crate::cluster::host::{Host, HostRef};
use crate::cluster::metadata::Strategy;
use crate::routing::partitioner::PartitionerName;
use crate::routing::Token;
use precomputed_replicas::{PrecomputedReplicas, ReplicaTable};
use replication_info::ReplicationInfo;

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::warn;

/// `TokenMap` provides a way to find the set of replicas for a given (keyspace, token) pair.
///
/// It is an immutable snapshot of the cluster topology and keyspace replication settings.
/// Replica lists of every token are computed once, when the map is built, so lookups are
/// a binary search followed by a slice borrow.
#[derive(Debug, Clone)]
pub struct TokenMap {
    partitioner: PartitionerName,

    /// The data based on which `TokenMap` computes replica sets.
    replication_data: ReplicationInfo,

    precomputed_replicas: PrecomputedReplicas,

    /// All known hosts, including those which own no tokens.
    hosts: HashMap<SocketAddr, Arc<Host>>,

    strategies: HashMap<String, Strategy>,
}

impl TokenMap {
    /// Builds a new `TokenMap` out of all known hosts and keyspace strategies.
    ///
    /// Hosts are expected to have distinct addresses. If two hosts claim the same token,
    /// the one with the greater address owns it and a warning is logged.
    ///
    /// This function can potentially be CPU-intensive (if the ring and replication factors are big).
    pub fn new(
        partitioner: PartitionerName,
        hosts: impl IntoIterator<Item = Arc<Host>>,
        strategies: HashMap<String, Strategy>,
    ) -> Self {
        let mut hosts_by_address: Vec<Arc<Host>> = hosts.into_iter().collect();
        hosts_by_address.sort_by_key(|host| host.address);

        let ring_iter = hosts_by_address.iter().flat_map(|host| {
            host.tokens
                .iter()
                .map(move |token| (token.clone(), Arc::clone(host)))
        });
        let global_ring = TokenRing::new(ring_iter, |token, replaced, winner| {
            if replaced.address != winner.address {
                warn!(
                    "Token {} is claimed by both {} and {}, assigning it to {}. Topology data may be stale.",
                    token, replaced.address, winner.address, winner.address
                );
            }
        });

        let replication_data = ReplicationInfo::new(global_ring);
        let precomputed_replicas = PrecomputedReplicas::compute(
            &replication_data,
            strategies
                .iter()
                .map(|(name, strategy)| (name.as_str(), strategy)),
        );

        Self {
            partitioner,
            replication_data,
            precomputed_replicas,
            hosts: hosts_by_address
                .into_iter()
                .map(|host| (host.address, host))
                .collect(),
            strategies,
        }
    }

    /// Builds a `TokenMap` with no hosts and no keyspaces.
    pub fn new_empty(partitioner: PartitionerName) -> Self {
        Self::new(partitioner, std::iter::empty(), HashMap::new())
    }

    /// Partitioner used to compute tokens of partition keys.
    pub fn partitioner(&self) -> PartitionerName {
        self.partitioner
    }

    /// Computes the token of a serialized partition key.
    pub fn compute_token(&self, partition_key: &[u8]) -> Token {
        self.partitioner.hash_one(partition_key)
    }

    /// Returns replicas of the given token in the given keyspace, in placement order.
    ///
    /// An empty set is returned if the keyspace is unknown, has no usable strategy,
    /// or the ring is empty. Callers should then route to any available host.
    pub fn replicas(&self, keyspace: &str, token: &Token) -> ReplicaSet<'_> {
        let ring = self.replication_data.get_global_ring();
        let (Some(table), Some(idx)) = (
            self.precomputed_replicas.table_for_keyspace(keyspace),
            ring.position(token),
        ) else {
            return ReplicaSet::empty();
        };

        let replicas: &[Arc<Host>] = match table {
            ReplicaTable::PerToken(lists) => {
                lists.get(idx).map(|list| list.as_slice()).unwrap_or(&[])
            }
            ReplicaTable::Uniform(hosts) => hosts.as_slice(),
            ReplicaTable::PrimaryOwner => ring
                .get(idx)
                .map(|(_t, host)| std::slice::from_ref(host))
                .unwrap_or(&[]),
        };

        ReplicaSet { replicas }
    }

    /// Hashes the partition key with the cluster's partitioner and returns the replicas
    /// of the resulting token.
    pub fn replicas_for_key(&self, keyspace: &str, partition_key: &[u8]) -> ReplicaSet<'_> {
        self.replicas(keyspace, &self.compute_token(partition_key))
    }

    /// Returns the host owning the first ring token not less than the given one.
    pub fn primary_replica(&self, token: &Token) -> Option<HostRef<'_>> {
        self.replication_data
            .get_global_ring()
            .get_elem_for_token(token)
    }

    /// Gives access to the token ring, based on which all replica sets are computed.
    pub fn ring(&self) -> &TokenRing<Arc<Host>> {
        self.replication_data.get_global_ring()
    }

    /// Iterates over all known hosts, including those which own no tokens.
    pub fn all_hosts(&self) -> impl Iterator<Item = HostRef<'_>> {
        self.hosts.values()
    }

    /// Gives a list of distinct hosts present in the token ring.
    pub fn unique_hosts_in_ring(&self) -> &[Arc<Host>] {
        self.replication_data.unique_hosts_in_global_ring()
    }

    /// Looks up a host by its address.
    pub fn get_host(&self, address: SocketAddr) -> Option<HostRef<'_>> {
        self.hosts.get(&address)
    }

    /// Aggregated information about datacenters of token-owning hosts.
    pub fn datacenters(&self) -> &HashMap<String, DatacenterInfo> {
        self.replication_data.get_datacenters()
    }

    /// Strategy of the given keyspace, if known.
    pub fn strategy(&self, keyspace: &str) -> Option<&Strategy> {
        self.strategies.get(keyspace)
    }

    /// Iterates over known keyspaces and their strategies.
    pub fn keyspaces(&self) -> impl Iterator<Item = (&str, &Strategy)> {
        self.strategies
            .iter()
            .map(|(name, strategy)| (name.as_str(), strategy))
    }
}

/// Represents the replicas of a given token in a given keyspace,
/// ordered the way they were placed on the ring.
///
/// This container can only be created by calling [TokenMap::replicas], and it
/// borrows precomputed replica lists living in the map.
#[derive(Debug, Clone, Copy)]
pub struct ReplicaSet<'a> {
    replicas: &'a [Arc<Host>],
}

impl<'a> ReplicaSet<'a> {
    const fn empty() -> Self {
        Self { replicas: &[] }
    }

    /// Gets the size of the set.
    pub fn len(&self) -> usize {
        self.replicas.len()
    }

    /// Returns `true` if the replica set contains no elements.
    pub fn is_empty(&self) -> bool {
        self.replicas.is_empty()
    }

    /// Iterates over replicas in placement order.
    pub fn iter(&self) -> std::slice::Iter<'a, Arc<Host>> {
        self.replicas.iter()
    }

    /// Returns replicas as a slice.
    pub fn as_slice(&self) -> &'a [Arc<Host>] {
        self.replicas
    }

    /// Checks if the host with the given address is one of the replicas.
    pub fn contains(&self, address: SocketAddr) -> bool {
        self.replicas.iter().any(|host| host.address == address)
    }

    /// Iterates over replicas which live in the given datacenter.
    pub fn in_datacenter<'dc>(
        &self,
        datacenter: &'dc str,
    ) -> impl Iterator<Item = HostRef<'a>> + use<'a, 'dc> {
        self.replicas
            .iter()
            .filter(move |host| host.datacenter.as_deref() == Some(datacenter))
    }

    /// Chooses a random replica that satisfies the given predicate.
    pub fn choose_filtered<R>(
        self,
        rng: &mut R,
        predicate: impl Fn(HostRef<'a>) -> bool,
    ) -> Option<HostRef<'a>>
    where
        R: Rng + ?Sized,
    {
        let happy = self.choose(rng)?;
        if predicate(happy) {
            return Some(happy);
        }

        self.into_iter()
            .filter(|host| predicate(*host))
            .choose(rng)
    }

    fn choose<R>(&self, rng: &mut R) -> Option<HostRef<'a>>
    where
        R: Rng + ?Sized,
    {
        if self.replicas.is_empty() {
            return None;
        }

        self.replicas.get(rng.random_range(0..self.replicas.len()))
    }
}

impl<'a> IntoIterator for ReplicaSet<'a> {
    type Item = HostRef<'a>;
    type IntoIter = std::slice::Iter<'a, Arc<Host>>;

    fn into_iter(self) -> Self::IntoIter {
        self.replicas.iter()
    }
}
