//! This module contains various errors which can be returned by the topology engine.

use thiserror::Error;

use crate::routing::partitioner::PartitionerName;

/// An error that occurred when parsing a replication factor
/// of the form `N` or `N/T` (all replicas / transient replicas).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ReplicationFactorParseError {
    /// Replica count is not a non-negative integer written with decimal digits only,
    /// or it doesn't fit in `usize`.
    #[error("Invalid replica count \"{value}\": expected a non-negative decimal integer")]
    InvalidReplicaCount {
        /// The offending part of the replication factor.
        value: String,
    },

    /// More than one `/` separator.
    #[error("Replication factor \"{0}\" has more than one '/' separator")]
    TooManyParts(String),

    /// Transient replica count is greater than the total replica count.
    #[error("Transient replica count ({transient}) exceeds total replica count ({all})")]
    TransientExceedsAll {
        /// Total replica count.
        all: usize,
        /// Transient replica count.
        transient: usize,
    },
}

/// An error that occurred during construction of a keyspace replication strategy.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum KeyspaceStrategyError {
    /// `replication_factor` option of SimpleStrategy could not be parsed.
    #[error("Failed to parse SimpleStrategy replication factor: {0}")]
    ReplicationFactorParseError(#[source] ReplicationFactorParseError),

    /// NetworkTopologyStrategy option which is not a valid per-datacenter replication factor.
    #[error("Unexpected NetworkTopologyStrategy option: '{key}': '{value}': {error}")]
    UnexpectedNetworkTopologyStrategyOption {
        /// Option key (datacenter name).
        key: String,
        /// Option value.
        value: String,
        /// Reason why the value is not a replication factor.
        #[source]
        error: ReplicationFactorParseError,
    },
}

/// Token text could not be parsed for the given partitioner.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid {partitioner} token: \"{token}\"")]
#[non_exhaustive]
pub struct TokenParseError {
    /// Partitioner which was asked to parse the token.
    pub partitioner: PartitionerName,
    /// The malformed token text.
    pub token: String,
}

/// An error returned by [Cluster](crate::cluster::Cluster) when submitting topology
/// or schema changes.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum TopologyUpdateError {
    /// Keyspace replication options were rejected. The keyspace has no replicas
    /// until valid options are submitted.
    #[error("Invalid replication options of keyspace {keyspace}: {error}")]
    KeyspaceStrategy {
        /// Name of the keyspace.
        keyspace: String,
        /// Reason of the rejection.
        #[source]
        error: KeyspaceStrategyError,
    },

    /// The background worker which rebuilds cluster state is no longer running.
    #[error("Cluster worker has stopped, topology updates are no longer processed")]
    WorkerStopped,
}

/// An error that occurred when computing the token of a partition key.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TokenCalculationError {
    /// A component of a composite partition key is longer than `u16::MAX` bytes.
    #[error("Value of a partition key component is too long to be hashed: {0} bytes")]
    ValueTooLong(usize),
}
