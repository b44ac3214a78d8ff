//! This module is responsible for precomputing replica lists of every token in the ring
//! for the replication strategies of known keyspaces.
//! Having the replicas precomputed allows to avoid costly calculations each time a request is sent.
//! To get a replica list for a given token the engine simply does a lookup in the precomputed data.
//!
//! Keyspaces often share their replication settings, so replica lists are computed once per
//! distinct [Strategy] and shared by all keyspaces that use it.

use super::replication_info::{Replicas, ReplicationInfo};
use crate::cluster::host::Host;
use crate::cluster::metadata::Strategy;

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::warn;

/// Replica lists of one strategy.
#[derive(Debug, Clone)]
pub(crate) enum ReplicaTable {
    /// One replica list per ring member, indexed like the global ring.
    PerToken(Vec<Replicas>),

    /// The same replica list for every token.
    Uniform(Vec<Arc<Host>>),

    /// The primary owner of the token is its only replica.
    PrimaryOwner,
}

/// Takes care of precomputing replica lists for given replication strategies.
/// Uses `ReplicationInfo` to calculate the replica lists for all tokens present in the ring,
/// and stores them for future use.
#[derive(Debug, Clone)]
pub(crate) struct PrecomputedReplicas {
    tables: Vec<ReplicaTable>,
    table_for_keyspace: HashMap<String, usize>,
}

impl PrecomputedReplicas {
    /// Performs the replica precomputation for each distinct strategy of the given keyspaces.
    /// The computation could potentially take some time so it shouldn't be done in an async function.
    pub(crate) fn compute<'a>(
        replication_data: &ReplicationInfo,
        keyspace_strategies: impl Iterator<Item = (&'a str, &'a Strategy)>,
    ) -> PrecomputedReplicas {
        let mut tables: Vec<ReplicaTable> = Vec::new();
        let mut table_for_strategy: HashMap<&'a Strategy, usize> = HashMap::new();
        let mut table_for_keyspace: HashMap<String, usize> = HashMap::new();

        for (keyspace_name, strategy) in keyspace_strategies {
            let table_idx = *table_for_strategy.entry(strategy).or_insert_with(|| {
                tables.push(Self::compute_table(replication_data, strategy));
                tables.len() - 1
            });
            table_for_keyspace.insert(keyspace_name.to_owned(), table_idx);
        }

        PrecomputedReplicas {
            tables,
            table_for_keyspace,
        }
    }

    fn compute_table(replication_data: &ReplicationInfo, strategy: &Strategy) -> ReplicaTable {
        let ring_len = replication_data.get_global_ring().len();

        match strategy {
            Strategy::SimpleStrategy { replication_factor } => ReplicaTable::PerToken(
                (0..ring_len)
                    .map(|idx| replication_data.simple_strategy_replicas(idx, *replication_factor))
                    .collect(),
            ),
            Strategy::NetworkTopologyStrategy {
                datacenter_repfactors,
            } => {
                let unknown_datacenters: BTreeSet<&str> = datacenter_repfactors
                    .keys()
                    .map(String::as_str)
                    .filter(|dc_name| !replication_data.get_datacenters().contains_key(*dc_name))
                    .collect();
                if !unknown_datacenters.is_empty() {
                    warn!(
                        "NetworkTopologyStrategy replication options name datacenters unknown to the cluster: {:?}. \
                        Replicas will not be placed there.",
                        unknown_datacenters
                    );
                }

                ReplicaTable::PerToken(
                    (0..ring_len)
                        .map(|idx| replication_data.nts_replicas(idx, datacenter_repfactors))
                        .collect(),
                )
            }
            Strategy::LocalStrategy => ReplicaTable::PrimaryOwner,
            Strategy::EverywhereStrategy => {
                ReplicaTable::Uniform(replication_data.unique_hosts_in_global_ring().to_vec())
            }
        }
    }

    /// Returns the replica table used by the given keyspace, if the keyspace
    /// has a known strategy.
    pub(crate) fn table_for_keyspace(&self, keyspace: &str) -> Option<&ReplicaTable> {
        self.table_for_keyspace
            .get(keyspace)
            .map(|table_idx| &self.tables[*table_idx])
    }

    /// Number of distinct replica tables.
    #[cfg(test)]
    pub(crate) fn table_count(&self) -> usize {
        self.tables.len()
    }
}
