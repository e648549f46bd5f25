use std::collections::BTreeMap;
use std::time::Instant;

use crate::routing::spf::Graph;

#[derive(Debug, Clone)]
pub struct LinkStateRecord {
    pub origin: String,
    pub sequence: u64,
    pub neighbor_cost_map: BTreeMap<String, f64>,
    pub learned_at: Instant,
}

/// Per-origin most-recently-received neighbor-cost announcement. Owned exclusively by
/// the routing worker's LSR (or Dijkstra) sub-engine instance; never touched by
/// forwarding or the operator.
#[derive(Debug, Default)]
pub struct LinkStateDb {
    records: BTreeMap<String, LinkStateRecord>,
}

impl LinkStateDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the record for `origin` if `sequence` is strictly greater than what's
    /// stored (or nothing is stored yet). Returns true if the database changed.
    pub fn upsert(
        &mut self,
        origin: String,
        sequence: u64,
        neighbor_cost_map: BTreeMap<String, f64>,
        now: Instant,
    ) -> bool {
        if let Some(current) = self.records.get(&origin) {
            if sequence <= current.sequence {
                return false;
            }
        }
        self.records.insert(
            origin.clone(),
            LinkStateRecord {
                origin,
                sequence,
                neighbor_cost_map,
                learned_at: now,
            },
        );
        true
    }

    pub fn sequence_of(&self, origin: &str) -> Option<u64> {
        self.records.get(origin).map(|r| r.sequence)
    }

    pub fn records(&self) -> impl Iterator<Item = &LinkStateRecord> {
        self.records.values()
    }

    /// Builds the adjacency graph over the union of every node mentioned anywhere in
    /// the database (as an origin or as a neighbor of one).
    pub fn build_graph(&self) -> Graph {
        let mut graph: Graph = BTreeMap::new();
        for record in self.records.values() {
            let entry = graph.entry(record.origin.clone()).or_default();
            for (neighbor, cost) in &record.neighbor_cost_map {
                entry.insert(neighbor.clone(), *cost);
                graph.entry(neighbor.clone()).or_default();
            }
        }
        graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_requires_strictly_increasing_sequence() {
        let mut db = LinkStateDb::new();
        assert!(db.upsert("A".into(), 1, BTreeMap::from([("B".to_string(), 1.0)]), Instant::now()));
        assert!(!db.upsert("A".into(), 1, BTreeMap::from([("B".to_string(), 5.0)]), Instant::now()));
        assert!(db.upsert("A".into(), 2, BTreeMap::from([("B".to_string(), 5.0)]), Instant::now()));
        assert_eq!(db.sequence_of("A"), Some(2));
    }

    #[test]
    fn build_graph_includes_mentioned_neighbors_with_no_own_record() {
        let mut db = LinkStateDb::new();
        db.upsert("A".into(), 1, BTreeMap::from([("B".to_string(), 1.0)]), Instant::now());
        let graph = db.build_graph();
        assert!(graph.contains_key("A"));
        assert!(graph.contains_key("B"));
        assert!(graph.get("B").unwrap().is_empty());
    }
}
