use std::time::Duration;

use crate::routing::partitioner::PartitionerName;

use super::Cluster;

/// Configuration options for [`Cluster`].
///
/// Can be created manually, but usually it's easier to use
/// [ClusterBuilder]
#[derive(Clone, Debug)]
#[non_exhaustive]
pub struct ClusterConfig {
    /// Partitioner used to compute tokens of partition keys.
    /// The default is [PartitionerName::Murmur3].
    pub partitioner: PartitionerName,

    /// How long the background worker waits after receiving a change
    /// before rebuilding the state, so that changes following shortly after
    /// are applied in a single rebuild.
    /// The default is zero: only changes already queued are coalesced.
    pub rebuild_delay: Duration,

    /// Capacity of the channel carrying changes to the background worker.
    /// Submitting a change waits while the channel is full.
    /// The default is 32.
    pub event_channel_capacity: usize,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            partitioner: PartitionerName::default(),
            rebuild_delay: Duration::ZERO,
            event_channel_capacity: 32,
        }
    }
}

impl ClusterConfig {
    /// Creates a [`ClusterConfig`] with default configuration
    /// # Default configuration
    /// * Murmur3 partitioner
    /// * No rebuild delay
    /// * Event channel capacity of 32
    pub fn new() -> Self {
        Default::default()
    }
}

/// ClusterBuilder is used to create new [Cluster] instances
/// # Example
///
/// ```
/// # use scylla_topology::{Cluster, ClusterBuilder};
/// # use std::time::Duration;
/// # async fn example() {
/// let cluster: Cluster = ClusterBuilder::new()
///     .rebuild_delay(Duration::from_millis(50))
///     .build();
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct ClusterBuilder {
    /// Configuration of the cluster being built.
    pub config: ClusterConfig,
}

impl ClusterBuilder {
    /// Creates new ClusterBuilder with default configuration
    /// # Default configuration
    /// * Murmur3 partitioner
    /// * No rebuild delay
    /// * Event channel capacity of 32
    pub fn new() -> Self {
        ClusterBuilder {
            config: ClusterConfig::new(),
        }
    }

    /// Sets the partitioner used to compute tokens of partition keys.
    /// The default is [PartitionerName::Murmur3].
    ///
    /// # Example
    /// ```
    /// # use scylla_topology::{Cluster, ClusterBuilder, PartitionerName};
    /// # async fn example() {
    /// let cluster: Cluster = ClusterBuilder::new()
    ///     .partitioner(PartitionerName::ByteOrdered)
    ///     .build();
    /// # }
    /// ```
    pub fn partitioner(mut self, partitioner: PartitionerName) -> Self {
        self.config.partitioner = partitioner;
        self
    }

    /// Sets how long the background worker waits for further changes before rebuilding the state.
    /// The default is zero.
    pub fn rebuild_delay(mut self, delay: Duration) -> Self {
        self.config.rebuild_delay = delay;
        self
    }

    /// Sets capacity of the channel carrying changes to the background worker.
    /// Values lower than 1 are treated as 1.
    /// The default is 32.
    pub fn event_channel_capacity(mut self, capacity: usize) -> Self {
        self.config.event_channel_capacity = capacity;
        self
    }

    /// Builds the Cluster and starts its background worker.
    /// The initial state contains no hosts and no keyspaces.
    ///
    /// # Panics
    /// Panics if called outside of a Tokio runtime.
    pub fn build(self) -> Cluster {
        Cluster::new(self.config)
    }
}
