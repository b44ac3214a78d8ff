use uuid::Uuid;

use crate::cluster::metadata::Peer;
use crate::routing::Token;

use std::hash::{Hash, Hasher};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Host represents a cluster node as seen by the topology engine.
///
/// Hosts are identified by their address: two `Host`s with the same address
/// compare equal, regardless of their other attributes.
///
/// A `Host` is immutable apart from its liveness marker. When the control connection
/// reports a different datacenter, rack, token set or host id for an address,
/// the next [ClusterState](crate::cluster::ClusterState) holds a new instance for it,
/// while an unchanged host keeps the very same `Arc<Host>` across snapshots.
#[derive(Debug)]
pub struct Host {
    /// Unique identifier of the host.
    pub host_id: Uuid,
    /// Address of the host.
    pub address: SocketAddr,
    /// Datacenter of the host, if known.
    pub datacenter: Option<String>,
    /// Rack of the host, if known.
    pub rack: Option<String>,
    /// Tokens owned by the host, as reported by the control connection.
    pub tokens: Vec<Token>,

    up: AtomicBool,
}

/// A way that Hosts are often passed and accessed in the engine's code.
pub type HostRef<'a> = &'a Arc<Host>;

impl Host {
    /// Creates a new host, initially marked as up.
    pub fn new(peer: Peer) -> Self {
        Self::with_liveness(peer, true)
    }

    pub(crate) fn with_liveness(peer: Peer, up: bool) -> Self {
        let Peer {
            host_id,
            address,
            datacenter,
            rack,
            tokens,
        } = peer;

        Self {
            host_id,
            address,
            datacenter,
            rack,
            tokens,
            up: AtomicBool::new(up),
        }
    }

    /// Whether the host was last reported as up.
    ///
    /// Liveness does not affect replica placement, it is there for routers
    /// which want to skip hosts known to be down.
    pub fn is_up(&self) -> bool {
        self.up.load(Ordering::Relaxed)
    }

    pub(crate) fn change_up_marker(&self, is_up: bool) {
        self.up.store(is_up, Ordering::Relaxed);
    }

    /// Whether the host owns at least one token and thus takes part in the ring.
    pub fn has_tokens(&self) -> bool {
        !self.tokens.is_empty()
    }

    /// Checks if the host can be reused as-is for the given topology description.
    pub(crate) fn describes_same(&self, peer: &Peer) -> bool {
        self.host_id == peer.host_id
            && self.address == peer.address
            && self.datacenter == peer.datacenter
            && self.rack == peer.rack
            && self.tokens == peer.tokens
    }
}

impl PartialEq for Host {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address
    }
}

impl Eq for Host {}

impl Hash for Host {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.address.hash(state);
    }
}
