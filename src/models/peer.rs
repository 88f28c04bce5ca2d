/// A peer advertising a file, reachable for chunk fetches
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PeerEntry {
    /// `host:port` or `http(s)://host:port` as registered
    pub address: String,
    /// Unix timestamp of the most recent registration
    pub last_seen: i64,
}

impl PeerEntry {
    pub fn new(address: String, last_seen: i64) -> Self {
        Self { address, last_seen }
    }
}
