use crate::errors::TopologyUpdateError;
use crate::routing::partitioner::PartitionerName;

use arc_swap::ArcSwap;
use futures::{future::RemoteHandle, FutureExt};
use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, trace, warn};

use super::config::ClusterConfig;
use super::metadata::{Peer, Strategy};
use super::state::ClusterState;

/// Cluster keeps an up to date [ClusterState], rebuilding it in the background
/// whenever the topology or the replication settings change.
///
/// All state can be accessed by cloning `Arc<ClusterState>` through [Cluster::get_state].
/// Readers never wait for a rebuild: a new state is published with a single atomic swap,
/// and readers holding the previous one can keep using it.
///
/// Topology and schema changes are submitted with the `on_*` methods. Changes submitted in quick
/// succession are coalesced, so a burst of events causes a single rebuild.
pub struct Cluster {
    // `ArcSwap<ClusterState>` is wrapped in `Arc` to support sharing cluster state
    // between `Cluster` and `ClusterWorker`
    state: Arc<ArcSwap<ClusterState>>,

    events_channel: mpsc::Sender<TopologyEvent>,

    _worker_handle: RemoteHandle<()>,
}

impl std::fmt::Debug for Cluster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cluster")
            .field("state", &self.state.load())
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
enum TopologyEvent {
    HostsSnapshot(Vec<Peer>),
    HostRemoved(SocketAddr),
    HostStatusChanged {
        address: SocketAddr,
        is_up: bool,
    },
    KeyspaceReplicationChanged {
        keyspace: String,
        strategy: Option<Strategy>,
    },
    KeyspaceDropped(String),
    Sync(oneshot::Sender<()>),
}

// Works in the background to keep the cluster state updated
struct ClusterWorker {
    // Cluster state to keep updated:
    cluster_state: Arc<ArcSwap<ClusterState>>,

    // To listen for topology and schema changes
    events_channel: mpsc::Receiver<TopologyEvent>,

    // Authoritative topology and schema description
    peers: BTreeMap<SocketAddr, Peer>,
    strategies: HashMap<String, Strategy>,

    partitioner: PartitionerName,
    rebuild_delay: Duration,
}

impl Cluster {
    /// Creates a new cluster with an empty state and starts its background worker.
    ///
    /// # Panics
    /// Panics if called outside of a Tokio runtime.
    pub fn new(config: ClusterConfig) -> Cluster {
        let (events_sender, events_receiver) = mpsc::channel(config.event_channel_capacity.max(1));

        let cluster_state: Arc<ArcSwap<ClusterState>> = Arc::new(ArcSwap::from(Arc::new(
            ClusterState::new_empty(config.partitioner),
        )));

        let worker = ClusterWorker {
            cluster_state: cluster_state.clone(),
            events_channel: events_receiver,
            peers: BTreeMap::new(),
            strategies: HashMap::new(),
            partitioner: config.partitioner,
            rebuild_delay: config.rebuild_delay,
        };

        let (fut, worker_handle) = worker.work().remote_handle();
        tokio::spawn(fut);

        Cluster {
            state: cluster_state,
            events_channel: events_sender,
            _worker_handle: worker_handle,
        }
    }

    /// Returns the most recently published state.
    pub fn get_state(&self) -> Arc<ClusterState> {
        self.state.load_full()
    }

    /// Replaces the whole known topology with the given hosts.
    pub async fn on_hosts_snapshot(&self, peers: Vec<Peer>) -> Result<(), TopologyUpdateError> {
        self.send(TopologyEvent::HostsSnapshot(peers)).await
    }

    /// Removes a decommissioned host.
    pub async fn on_host_removed(&self, address: SocketAddr) -> Result<(), TopologyUpdateError> {
        self.send(TopologyEvent::HostRemoved(address)).await
    }

    /// Records a host going up or down.
    ///
    /// The marker of the host in the current state is changed immediately. Liveness does
    /// not affect replica placement, so no rebuild takes place.
    pub async fn on_host_status_changed(
        &self,
        address: SocketAddr,
        is_up: bool,
    ) -> Result<(), TopologyUpdateError> {
        if let Some(host) = self.state.load().get_host(address) {
            host.change_up_marker(is_up);
        }
        // A rebuild in progress could still carry over the stale marker.
        // The worker applies the change again once it is done.
        self.send(TopologyEvent::HostStatusChanged { address, is_up })
            .await
    }

    /// Sets replication settings of a keyspace.
    ///
    /// The strategy is constructed right away. If the options are malformed, an error is returned
    /// and the keyspace loses its strategy with the next rebuild, so it has no replicas until
    /// valid options arrive. The currently published state is left untouched.
    /// If the strategy can't be used for routing (unknown class, missing replication factor),
    /// the keyspace will have no replicas either.
    pub async fn on_keyspace_replication_changed(
        &self,
        keyspace: impl Into<String>,
        strategy_class: &str,
        options: &HashMap<String, String>,
    ) -> Result<(), TopologyUpdateError> {
        let keyspace = keyspace.into();
        let strategy = match Strategy::from_class_and_options(strategy_class, options) {
            Ok(strategy) => strategy,
            Err(error) => {
                warn!(
                    "Rejected replication options of keyspace {}: {}. It will have no replicas until valid options arrive.",
                    keyspace, error
                );
                self.send(TopologyEvent::KeyspaceReplicationChanged {
                    keyspace: keyspace.clone(),
                    strategy: None,
                })
                .await?;
                return Err(TopologyUpdateError::KeyspaceStrategy { keyspace, error });
            }
        };

        self.send(TopologyEvent::KeyspaceReplicationChanged { keyspace, strategy })
            .await
    }

    /// Forgets a dropped keyspace.
    pub async fn on_keyspace_dropped(
        &self,
        keyspace: impl Into<String>,
    ) -> Result<(), TopologyUpdateError> {
        self.send(TopologyEvent::KeyspaceDropped(keyspace.into()))
            .await
    }

    /// Waits until all changes submitted so far are reflected in the published state.
    pub async fn refresh(&self) -> Result<(), TopologyUpdateError> {
        let (response_sender, response_receiver) = oneshot::channel();
        self.send(TopologyEvent::Sync(response_sender)).await?;

        response_receiver
            .await
            .map_err(|_| TopologyUpdateError::WorkerStopped)
    }

    async fn send(&self, event: TopologyEvent) -> Result<(), TopologyUpdateError> {
        // Other end of this channel is in ClusterWorker, which lives as long as _worker_handle,
        // unless it panicked.
        self.events_channel
            .send(event)
            .await
            .map_err(|_| TopologyUpdateError::WorkerStopped)
    }
}

impl ClusterWorker {
    async fn work(mut self) {
        while let Some(first_event) = self.events_channel.recv().await {
            // A refresh with nothing queued before it has nothing to wait for.
            let is_sync = matches!(first_event, TopologyEvent::Sync(_));
            if !is_sync && !self.rebuild_delay.is_zero() {
                tokio::time::sleep(self.rebuild_delay).await;
            }

            // Take everything that has arrived so far, one rebuild serves all of it.
            let mut batch = vec![first_event];
            while let Ok(event) = self.events_channel.try_recv() {
                batch.push(event);
            }

            let batch_len = batch.len();
            let mut sync_requests = Vec::new();
            let mut rebuild_needed = false;
            for event in batch {
                trace!("Applying topology event: {:?}", event);
                match event {
                    TopologyEvent::Sync(response_chan) => sync_requests.push(response_chan),
                    event => rebuild_needed |= self.apply(event),
                }
            }

            if rebuild_needed {
                self.perform_rebuild(batch_len).await;
            }

            for response_chan in sync_requests {
                // We can ignore sending error - if no one waits for the response we can drop it
                let _ = response_chan.send(());
            }
        }
        // If events_channel was closed then cluster was dropped, we can stop working
    }

    /// Applies the event to the topology and schema description.
    /// Returns whether the cluster state has to be rebuilt.
    fn apply(&mut self, event: TopologyEvent) -> bool {
        match event {
            TopologyEvent::HostsSnapshot(peers) => {
                let peers: BTreeMap<SocketAddr, Peer> = peers
                    .into_iter()
                    .map(|peer| (peer.address, peer))
                    .collect();
                let changed = peers != self.peers;
                self.peers = peers;
                changed
            }
            TopologyEvent::HostRemoved(address) => {
                let removed = self.peers.remove(&address).is_some();
                if !removed {
                    debug!("Removal of unknown host {} ignored", address);
                }
                removed
            }
            TopologyEvent::HostStatusChanged { address, is_up } => {
                match self.cluster_state.load().get_host(address) {
                    Some(host) => host.change_up_marker(is_up),
                    None => debug!("Status change of unknown host {} ignored", address),
                }
                false
            }
            TopologyEvent::KeyspaceReplicationChanged { keyspace, strategy } => match strategy {
                Some(strategy) if self.strategies.get(&keyspace) == Some(&strategy) => false,
                Some(strategy) => {
                    self.strategies.insert(keyspace, strategy);
                    true
                }
                // Keyspaces without a usable strategy have no replicas.
                None => self.strategies.remove(&keyspace).is_some(),
            },
            TopologyEvent::KeyspaceDropped(keyspace) => {
                self.strategies.remove(&keyspace).is_some()
            }
            TopologyEvent::Sync(_) => false,
        }
    }

    async fn perform_rebuild(&mut self, coalesced_events: usize) {
        let previous: Arc<ClusterState> = self.cluster_state.load_full();
        let partitioner = self.partitioner;
        let peers: Vec<Peer> = self.peers.values().cloned().collect();
        let strategies = self.strategies.clone();

        let rebuilt = tokio::task::spawn_blocking(move || {
            ClusterState::new(partitioner, peers, strategies, &previous)
        })
        .await;

        match rebuilt {
            Ok(new_cluster_state) => {
                debug!(
                    generation = new_cluster_state.generation(),
                    ring_size = new_cluster_state.token_map().ring().len(),
                    hosts = self.peers.len(),
                    keyspaces = self.strategies.len(),
                    coalesced_events,
                    "Publishing rebuilt cluster state"
                );
                self.update_cluster_state(Arc::new(new_cluster_state));
            }
            Err(err) => {
                error!(
                    "Rebuilding cluster state failed: {}. Previous state stays in use.",
                    err
                );
            }
        }
    }

    fn update_cluster_state(&mut self, new_cluster_state: Arc<ClusterState>) {
        self.cluster_state.store(new_cluster_state);
    }
}
