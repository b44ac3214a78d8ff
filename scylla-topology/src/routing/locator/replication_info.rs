use itertools::Itertools;
use smallvec::SmallVec;

use super::TokenRing;
use crate::cluster::host::Host;
use crate::cluster::metadata::ReplicationFactor;

use std::cmp;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::Arc;

/// Replica list of a single token, in placement order.
pub(crate) type Replicas = SmallVec<[Arc<Host>; 3]>;

/// Aggregated information about hosts of one datacenter which own tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatacenterInfo {
    host_count: usize,
    racks: BTreeSet<String>,
}

impl DatacenterInfo {
    /// Number of distinct hosts in the datacenter which own at least one token.
    pub fn host_count(&self) -> usize {
        self.host_count
    }

    /// Names of distinct racks of those hosts. Hosts with unknown rack don't contribute.
    pub fn racks(&self) -> &BTreeSet<String> {
        &self.racks
    }

    /// Number of distinct racks.
    pub fn rack_count(&self) -> usize {
        self.racks.len()
    }
}

/// ReplicationInfo keeps information about the token ring
/// and provides methods to calculate replica lists for every supported strategy.
#[derive(Debug, Clone)]
pub(crate) struct ReplicationInfo {
    global_ring: TokenRing<Arc<Host>>,
    unique_hosts_in_global_ring: Vec<Arc<Host>>,
    datacenters: HashMap<String, DatacenterInfo>,
}

impl ReplicationInfo {
    pub(crate) fn new(global_ring: TokenRing<Arc<Host>>) -> ReplicationInfo {
        let unique_hosts_in_global_ring: Vec<Arc<Host>> = global_ring
            .iter()
            .map(|(_t, host)| host)
            .unique()
            .cloned()
            .collect();

        let mut datacenters: HashMap<String, DatacenterInfo> = HashMap::new();
        for host in &unique_hosts_in_global_ring {
            if let Some(datacenter_name) = host.datacenter.as_deref() {
                let info = datacenters.entry(datacenter_name.to_owned()).or_default();
                info.host_count += 1;
                if let Some(rack) = &host.rack {
                    info.racks.insert(rack.clone());
                }
            }
        }

        ReplicationInfo {
            global_ring,
            unique_hosts_in_global_ring,
            datacenters,
        }
    }

    pub(crate) fn get_global_ring(&self) -> &TokenRing<Arc<Host>> {
        &self.global_ring
    }

    pub(crate) fn get_datacenters(&self) -> &HashMap<String, DatacenterInfo> {
        &self.datacenters
    }

    pub(crate) fn unique_hosts_in_global_ring(&self) -> &[Arc<Host>] {
        self.unique_hosts_in_global_ring.as_slice()
    }

    /// Computes SimpleStrategy replicas for the ring member at `start`:
    /// the next distinct hosts walking the ring forward.
    pub(crate) fn simple_strategy_replicas(
        &self,
        start: usize,
        replication_factor: ReplicationFactor,
    ) -> Replicas {
        let num_to_take = cmp::min(
            replication_factor.full_replicas(),
            self.unique_hosts_in_global_ring.len(),
        );

        self.global_ring
            .ring_range_full_from(start)
            .map(|(_t, host)| host)
            .unique()
            .take(num_to_take)
            .cloned()
            .collect()
    }

    /// Computes NetworkTopologyStrategy replicas for the ring member at `start`.
    ///
    /// Within each datacenter, hosts whose rack already holds a replica are deferred until
    /// every rack of the datacenter is represented. Once that happens, deferred hosts fill the
    /// remaining slots in the order they were encountered.
    pub(crate) fn nts_replicas(
        &self,
        start: usize,
        datacenter_repfactors: &BTreeMap<String, ReplicationFactor>,
    ) -> Replicas {
        let mut placements: HashMap<&str, DatacenterPlacement<'_>> = datacenter_repfactors
            .iter()
            .filter_map(|(dc_name, rf)| {
                let info = self.datacenters.get(dc_name)?;
                let quota = cmp::min(rf.full_replicas(), info.host_count);
                (quota > 0).then(|| (dc_name.as_str(), DatacenterPlacement::new(quota, info)))
            })
            .collect();

        let total_quota: usize = placements.values().map(|p| p.quota).sum();
        let mut replicas = Replicas::with_capacity(total_quota);
        let mut chosen: HashSet<SocketAddr> = HashSet::with_capacity(total_quota);
        let mut incomplete_datacenters = placements.len();

        for (_token, host) in self.global_ring.ring_range_full_from(start) {
            if incomplete_datacenters == 0 {
                break;
            }

            let Some(placement) = host
                .datacenter
                .as_deref()
                .and_then(|dc_name| placements.get_mut(dc_name))
            else {
                continue;
            };
            if placement.is_complete() || chosen.contains(&host.address) {
                continue;
            }

            let rack = host.rack.as_deref();
            if let Some(rack) = rack {
                if placement.racks_placed.contains(rack) && !placement.all_racks_placed() {
                    placement.defer(host);
                    continue;
                }
            }

            chosen.insert(host.address);
            replicas.push(Arc::clone(host));
            placement.placed += 1;

            if let Some(rack) = rack {
                if placement.racks_placed.insert(rack) && placement.all_racks_placed() {
                    for skipped in placement.take_backfill() {
                        if chosen.insert(skipped.address) {
                            replicas.push(Arc::clone(skipped));
                            placement.placed += 1;
                        }
                    }
                }
            }

            if placement.is_complete() {
                incomplete_datacenters -= 1;
            }
        }

        replicas
    }
}

/// Placement progress of NetworkTopologyStrategy replicas of one token in one datacenter.
struct DatacenterPlacement<'a> {
    quota: usize,
    placed: usize,
    rack_count: usize,
    racks_placed: HashSet<&'a str>,
    skipped: Vec<&'a Arc<Host>>,
}

impl<'a> DatacenterPlacement<'a> {
    fn new(quota: usize, info: &DatacenterInfo) -> Self {
        Self {
            quota,
            placed: 0,
            rack_count: info.rack_count(),
            racks_placed: HashSet::new(),
            skipped: Vec::new(),
        }
    }

    fn is_complete(&self) -> bool {
        self.placed >= self.quota
    }

    fn all_racks_placed(&self) -> bool {
        self.racks_placed.len() >= self.rack_count
    }

    fn defer(&mut self, host: &'a Arc<Host>) {
        if self.skipped.len() < self.quota - self.placed && !self.skipped.contains(&host) {
            self.skipped.push(host);
        }
    }

    fn take_backfill(&mut self) -> Vec<&'a Arc<Host>> {
        let remaining = self.quota - self.placed;
        let mut backfill = std::mem::take(&mut self.skipped);
        backfill.truncate(remaining);
        backfill
    }
}
