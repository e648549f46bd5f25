use std::collections::BTreeMap;
use std::time::Instant;

use crate::model::message::Protocol;

pub const ENTRY_TTL_SECS: u64 = 120;

#[derive(Debug, Clone)]
pub struct RoutingEntry {
    pub next_hop_address: String,
    pub distance_or_cost: f64,
    pub interface: (String, u16),
    pub learned_at: Instant,
    pub source_algorithm: Protocol,
}

/// Keyed by destination logical address. Shared behind `shared::NodeState`'s single
/// mutex; never locked independently.
#[derive(Debug, Default)]
pub struct RoutingTable {
    entries: BTreeMap<String, RoutingEntry>,
}

impl RoutingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&mut self, destination: String, entry: RoutingEntry) {
        self.entries.insert(destination, entry);
    }

    pub fn get(&self, destination: &str) -> Option<&RoutingEntry> {
        self.entries.get(destination)
    }

    pub fn remove(&mut self, destination: &str) -> Option<RoutingEntry> {
        self.entries.remove(destination)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &RoutingEntry)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops entries whose timestamp has aged past `ENTRY_TTL_SECS`. Returns the
    /// destinations dropped, for logging.
    pub fn expire(&mut self, now: Instant) -> Vec<String> {
        let ttl = std::time::Duration::from_secs(ENTRY_TTL_SECS);
        let stale: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| now.duration_since(entry.learned_at) > ttl)
            .map(|(dest, _)| dest.clone())
            .collect();
        for dest in &stale {
            self.entries.remove(dest);
        }
        stale
    }

    /// Replaces every entry previously written by `algorithm` with `fresh`, leaving
    /// entries from other algorithms untouched. Used by the LSR/Dijkstra sub-engines to
    /// rewrite the whole table after a topology change without disturbing entries a
    /// different algorithm instance might (in principle) own.
    pub fn replace_algorithm_entries(
        &mut self,
        algorithm: Protocol,
        fresh: BTreeMap<String, RoutingEntry>,
    ) {
        self.entries
            .retain(|_, entry| entry.source_algorithm != algorithm);
        self.entries.extend(fresh);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn entry(next_hop: &str, cost: f64) -> RoutingEntry {
        RoutingEntry {
            next_hop_address: next_hop.to_string(),
            distance_or_cost: cost,
            interface: ("localhost".to_string(), 5000),
            learned_at: Instant::now(),
            source_algorithm: Protocol::Flooding,
        }
    }

    #[test]
    fn expire_drops_only_stale_entries() {
        let mut table = RoutingTable::new();
        let old = Instant::now() - Duration::from_secs(ENTRY_TTL_SECS + 1);
        table.upsert(
            "nodeB@localhost".to_string(),
            RoutingEntry {
                learned_at: old,
                ..entry("nodeB@localhost", 1.0)
            },
        );
        table.upsert("nodeC@localhost".to_string(), entry("nodeC@localhost", 1.0));

        let dropped = table.expire(Instant::now());
        assert_eq!(dropped, vec!["nodeB@localhost".to_string()]);
        assert_eq!(table.len(), 1);
        assert!(table.get("nodeC@localhost").is_some());
    }
}
