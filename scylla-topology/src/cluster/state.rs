use crate::routing::locator::TokenMap;
use crate::routing::partitioner::PartitionerName;

use itertools::Itertools;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use super::host::{Host, HostRef};
use super::metadata::{Peer, Strategy};

/// Represents the state of the cluster: known hosts, keyspace strategies, and the token map
/// built out of them.
///
/// It is immutable after creation, and is replaced atomically upon every topology or schema change.
/// Can be accessed through [Cluster::get_state()](crate::cluster::Cluster::get_state).
pub struct ClusterState {
    pub(crate) token_map: TokenMap,

    /// Number of snapshots published before this one.
    pub(crate) generation: u64,
}

/// Prints [ClusterState] in a neat way, skipping the clutter involved by
/// the ring and the replica tables being large.
impl std::fmt::Debug for ClusterState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ring_printer = {
            struct RingSizePrinter(usize);
            impl std::fmt::Debug for RingSizePrinter {
                fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    write!(f, "<size={}>", self.0)
                }
            }
            RingSizePrinter(self.token_map.ring().len())
        };

        f.debug_struct("ClusterState")
            .field("generation", &self.generation)
            .field(
                "hosts",
                &self
                    .token_map
                    .all_hosts()
                    .map(|host| host.address)
                    .sorted()
                    .collect_vec(),
            )
            .field("ring", &ring_printer)
            .field(
                "keyspaces",
                &self
                    .token_map
                    .keyspaces()
                    .map(|(name, _)| name)
                    .sorted()
                    .collect_vec(),
            )
            .finish_non_exhaustive()
    }
}

impl ClusterState {
    pub(crate) fn new_empty(partitioner: PartitionerName) -> Self {
        ClusterState {
            token_map: TokenMap::new_empty(partitioner),
            generation: 0,
        }
    }

    /// Creates new ClusterState using the given topology and schema description.
    /// Uses hosts of the `previous` state to recycle `Arc<Host>`s if possible.
    ///
    /// Builds the token map, so it shouldn't be called from an async context.
    pub(crate) fn new(
        partitioner: PartitionerName,
        peers: impl IntoIterator<Item = Peer>,
        strategies: HashMap<String, Strategy>,
        previous: &ClusterState,
    ) -> Self {
        let hosts = peers.into_iter().map(|peer| {
            match previous.token_map.get_host(peer.address) {
                // Unchanged host is reused, so references held by readers stay valid and up to date.
                Some(host) if host.describes_same(&peer) => Arc::clone(host),
                // Changed attributes of the same host. Liveness is carried over.
                Some(host) if host.host_id == peer.host_id => {
                    Arc::new(Host::with_liveness(peer, host.is_up()))
                }
                _ => Arc::new(Host::new(peer)),
            }
        });

        ClusterState {
            token_map: TokenMap::new(partitioner, hosts, strategies),
            generation: previous.generation + 1,
        }
    }

    /// Token map of this snapshot.
    pub fn token_map(&self) -> &TokenMap {
        &self.token_map
    }

    /// Number of snapshots published before this one. The initial, empty state has generation 0.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Looks up a host by its address.
    pub fn get_host(&self, address: SocketAddr) -> Option<HostRef<'_>> {
        self.token_map.get_host(address)
    }

    /// Access to all hosts known to the engine.
    pub fn get_hosts_info(&self) -> impl Iterator<Item = HostRef<'_>> {
        self.token_map.all_hosts()
    }
}
