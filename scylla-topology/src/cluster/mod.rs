//! This module holds entities that represent the cluster as a whole,
//! hosts in the cluster, and the cluster's state.
//!
//! This includes:
//! - host's representation ([Host]),
//! - [metadata] describing hosts and keyspace replication, as reported by the cluster,
//! - [ClusterState], which is a snapshot of the cluster's state.
//!   - [ClusterState] is replaced atomically upon every topology or schema change,
//!     preventing any issues arising from mutability, including races.
//! - [Cluster], which keeps the latest [ClusterState] and rebuilds it in the background.

mod config;
pub use config::{ClusterBuilder, ClusterConfig};

mod worker;
pub use worker::Cluster;

mod state;
pub use state::ClusterState;

pub(crate) mod host;
pub use host::{Host, HostRef};

pub mod metadata;
