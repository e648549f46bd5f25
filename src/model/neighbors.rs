use std::collections::BTreeMap;
use std::time::Instant;

/// A configured neighbor: the identifier and link cost loaded from the topology file,
/// mutable at runtime via the operator `cost` command.
#[derive(Debug, Clone)]
pub struct ConfiguredNeighbor {
    pub id: String,
    pub cost: u32,
}

#[derive(Debug, Clone)]
pub struct DiscoveredNeighbor {
    pub port: u16,
    pub last_seen: Instant,
}

/// Mapping from neighbor logical address to the observed port and last-seen timestamp.
/// "Observed" here means the canonical port recorded on hello receipt (see
/// `routing::hello`), not the TCP stream's ephemeral source port.
#[derive(Debug, Default)]
pub struct DiscoveredNeighbors {
    by_address: BTreeMap<String, DiscoveredNeighbor>,
}

impl DiscoveredNeighbors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records (or refreshes) a neighbor. Returns true the first time this address is
    /// confirmed, so the caller can emit a `new_nodes` notification exactly once.
    pub fn confirm(&mut self, address: String, port: u16, now: Instant) -> bool {
        let is_new = !self.by_address.contains_key(&address);
        self.by_address
            .insert(address, DiscoveredNeighbor { port, last_seen: now });
        is_new
    }

    pub fn contains(&self, address: &str) -> bool {
        self.by_address.contains_key(address)
    }

    pub fn get(&self, address: &str) -> Option<&DiscoveredNeighbor> {
        self.by_address.get(address)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &DiscoveredNeighbor)> {
        self.by_address.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confirm_reports_novelty_once() {
        let mut neighbors = DiscoveredNeighbors::new();
        assert!(neighbors.confirm("nodeB@localhost".to_string(), 5001, Instant::now()));
        assert!(!neighbors.confirm("nodeB@localhost".to_string(), 5001, Instant::now()));
        assert!(neighbors.contains("nodeB@localhost"));
    }
}
