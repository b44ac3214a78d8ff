//! This module holds entities that represent the cluster metadata
//! consumed by the topology engine, which includes:
//! - topology metadata:
//!   - [Peer] - a host as reported by the control connection,
//! - schema metadata:
//!   - [Strategy] - replication strategy employed by a keyspace,
//!   - [ReplicationFactor] - replica count, possibly with transient replicas.
//!

use std::collections::{BTreeMap, HashMap};
use std::fmt::Display;
use std::net::SocketAddr;
use std::str::FromStr;

use tracing::warn;
use uuid::Uuid;

use crate::errors::{KeyspaceStrategyError, ReplicationFactorParseError};
use crate::routing::Token;

/// Describes a host as reported by the control connection
/// (`system.local` / `system.peers`).
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub struct Peer {
    /// Unique identifier of the host.
    pub host_id: Uuid,
    /// Address of the host. It identifies the host within the engine.
    pub address: SocketAddr,
    /// Datacenter of the host, if known.
    pub datacenter: Option<String>,
    /// Rack of the host, if known.
    pub rack: Option<String>,
    /// Tokens owned by the host.
    pub tokens: Vec<Token>,
}

impl Peer {
    /// Creates a new peer description.
    pub fn new(
        host_id: Uuid,
        address: SocketAddr,
        datacenter: Option<String>,
        rack: Option<String>,
        tokens: Vec<Token>,
    ) -> Self {
        Self {
            host_id,
            address,
            datacenter,
            rack,
            tokens,
        }
    }
}

/// Replication factor of a keyspace (or of a single datacenter in a keyspace).
///
/// It is written either as `"N"` (N full replicas) or as `"N/T"`, where N is
/// the total number of replicas and T of them are transient. Transient replicas
/// only hold data temporarily, so requests are routed to full replicas only.
///
/// Replication factors are ordered by the total replica count first,
/// then by the transient replica count.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReplicationFactor {
    // Field order defines the derived ordering.
    all_replicas: usize,
    transient_replicas: usize,
}

impl ReplicationFactor {
    /// Replication factor with `replicas` full replicas and no transient ones.
    pub const fn full(replicas: usize) -> Self {
        Self {
            all_replicas: replicas,
            transient_replicas: 0,
        }
    }

    /// Replication factor with `all_replicas` replicas, `transient_replicas` of which are transient.
    pub fn new(
        all_replicas: usize,
        transient_replicas: usize,
    ) -> Result<Self, ReplicationFactorParseError> {
        if transient_replicas > all_replicas {
            return Err(ReplicationFactorParseError::TransientExceedsAll {
                all: all_replicas,
                transient: transient_replicas,
            });
        }

        Ok(Self {
            all_replicas,
            transient_replicas,
        })
    }

    /// Total number of replicas.
    pub fn all_replicas(&self) -> usize {
        self.all_replicas
    }

    /// Number of transient replicas.
    pub fn transient_replicas(&self) -> usize {
        self.transient_replicas
    }

    /// Number of full replicas - the ones that requests may be routed to.
    pub fn full_replicas(&self) -> usize {
        self.all_replicas - self.transient_replicas
    }

    /// Whether some of the replicas are transient.
    pub fn has_transient_replicas(&self) -> bool {
        self.transient_replicas > 0
    }
}

impl FromStr for ReplicationFactor {
    type Err = ReplicationFactorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // `usize::from_str` would also accept a leading '+'.
        let parse_count = |value: &str| {
            value
                .bytes()
                .all(|b| b.is_ascii_digit())
                .then(|| usize::from_str(value).ok())
                .flatten()
                .ok_or_else(|| ReplicationFactorParseError::InvalidReplicaCount {
                    value: value.to_owned(),
                })
        };

        let mut parts = s.split('/');
        let all_replicas = parse_count(parts.next().unwrap_or_default())?;
        let transient_replicas = parts.next().map(parse_count).transpose()?.unwrap_or(0);
        if parts.next().is_some() {
            return Err(ReplicationFactorParseError::TooManyParts(s.to_owned()));
        }

        Self::new(all_replicas, transient_replicas)
    }
}

impl Display for ReplicationFactor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.has_transient_replicas() {
            write!(f, "{}/{}", self.all_replicas, self.transient_replicas)
        } else {
            write!(f, "{}", self.all_replicas)
        }
    }
}

/// Replication strategy of a keyspace.
///
/// Strategies are compared by value, so keyspaces with equal strategies
/// share the computed replica placement.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
#[allow(clippy::enum_variant_names)]
pub enum Strategy {
    /// Replicas are the next distinct hosts on the ring, regardless of topology.
    SimpleStrategy {
        /// Replication factor for the whole cluster.
        replication_factor: ReplicationFactor,
    },
    /// Replicas are chosen per datacenter, spread across racks.
    NetworkTopologyStrategy {
        /// Replication factors of datacenters with given names.
        datacenter_repfactors: BTreeMap<String, ReplicationFactor>,
    },
    /// The only replica is the primary owner of the token. Used by node-local system keyspaces.
    LocalStrategy,
    /// Every host is a replica of every token.
    EverywhereStrategy,
}

const OPTION_CLASS: &str = "class";
const OPTION_REPLICATION_FACTOR: &str = "replication_factor";

impl Strategy {
    /// Constructs a strategy from the keyspace's strategy class name and its raw
    /// replication options (as stored in `system_schema.keyspaces.replication`).
    ///
    /// The class name is matched case-insensitively and may be fully qualified.
    ///
    /// Returns `Ok(None)` if the strategy can't be used for routing: the class is
    /// not recognized, or SimpleStrategy lacks its `replication_factor` option.
    /// Malformed replication factors are reported as errors.
    pub fn from_class_and_options(
        class_name: &str,
        options: &HashMap<String, String>,
    ) -> Result<Option<Strategy>, KeyspaceStrategyError> {
        let class = class_name.to_ascii_lowercase();
        let class = class.rsplit('.').next().unwrap_or_default();

        let strategy = match class {
            "simplestrategy" => {
                let Some(rep_factor_str) = options.get(OPTION_REPLICATION_FACTOR) else {
                    warn!(
                        "SimpleStrategy without '{}' option, routing information will be unavailable",
                        OPTION_REPLICATION_FACTOR
                    );
                    return Ok(None);
                };
                let replication_factor = ReplicationFactor::from_str(rep_factor_str)
                    .map_err(KeyspaceStrategyError::ReplicationFactorParseError)?;

                Strategy::SimpleStrategy { replication_factor }
            }
            "networktopologystrategy" => {
                let datacenter_repfactors = options
                    .iter()
                    .filter(|(key, _)| key.as_str() != OPTION_CLASS)
                    .map(|(key, value)| {
                        // Every option but 'class' is expected to be a replication factor of some dc.
                        ReplicationFactor::from_str(value)
                            .map(|rf| (key.clone(), rf))
                            .map_err(|error| {
                                KeyspaceStrategyError::UnexpectedNetworkTopologyStrategyOption {
                                    key: key.clone(),
                                    value: value.clone(),
                                    error,
                                }
                            })
                    })
                    .collect::<Result<BTreeMap<_, _>, _>>()?;

                Strategy::NetworkTopologyStrategy {
                    datacenter_repfactors,
                }
            }
            "localstrategy" => Strategy::LocalStrategy,
            "everywherestrategy" => Strategy::EverywhereStrategy,
            _ => {
                warn!(
                    "Unknown replication strategy class ({}), routing information will be unavailable",
                    class_name
                );
                return Ok(None);
            }
        };

        Ok(Some(strategy))
    }
}
