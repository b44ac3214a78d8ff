mod replica_lookup;
mod topology_updates;
pub(crate) mod utils;
