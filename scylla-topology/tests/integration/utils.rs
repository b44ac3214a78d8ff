use std::collections::HashMap;
use std::net::SocketAddr;

use scylla_topology::{Peer, Token};
use uuid::Uuid;

pub(crate) fn setup_tracing() {
    let _ = tracing_subscriber::fmt::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(tracing_subscriber::fmt::TestWriter::new())
        .try_init();
}

pub(crate) fn addr(id: u8) -> SocketAddr {
    SocketAddr::from(([10, 0, 0, id], 9042))
}

pub(crate) fn peer(id: u8, dc: &str, rack: &str, tokens: &[i64]) -> Peer {
    Peer::new(
        Uuid::new_v4(),
        addr(id),
        Some(dc.to_owned()),
        Some(rack.to_owned()),
        tokens.iter().copied().map(Token::new).collect(),
    )
}

// Two datacenters with two racks each.
// id | DC  | rack | tokens
// 1    dc1   r1     0, 600
// 2    dc1   r1     100, 700
// 3    dc1   r2     200, 800
// 4    dc2   r1     300, 900
// 5    dc2   r2     400
// 6    dc2   r2     500
pub(crate) fn two_dc_peers() -> Vec<Peer> {
    vec![
        peer(1, "dc1", "r1", &[0, 600]),
        peer(2, "dc1", "r1", &[100, 700]),
        peer(3, "dc1", "r2", &[200, 800]),
        peer(4, "dc2", "r1", &[300, 900]),
        peer(5, "dc2", "r2", &[400]),
        peer(6, "dc2", "r2", &[500]),
    ]
}

pub(crate) fn options<'a>(
    pairs: impl IntoIterator<Item = (&'a str, &'a str)>,
) -> HashMap<String, String> {
    pairs
        .into_iter()
        .map(|(key, value)| (key.to_owned(), value.to_owned()))
        .collect()
}

pub(crate) fn ids<'a>(
    hosts: impl IntoIterator<Item = &'a std::sync::Arc<scylla_topology::Host>>,
) -> Vec<u8> {
    hosts
        .into_iter()
        .map(|host| match host.address {
            SocketAddr::V4(v4) => v4.ip().octets()[3],
            SocketAddr::V6(_) => unreachable!("only IPv4 addresses are used in tests"),
        })
        .collect()
}
