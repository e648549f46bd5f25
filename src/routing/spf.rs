use std::collections::{BTreeMap, BTreeSet};

/// Adjacency representation shared by the LSR and Dijkstra sub-engines: node identifier
/// -> {neighbor identifier -> edge cost}. Absent edges are simply absent keys, standing
/// in for positive infinity.
pub type Graph = BTreeMap<String, BTreeMap<String, f64>>;

#[derive(Debug, Clone, Default)]
pub struct SpfResult {
    pub dist: BTreeMap<String, f64>,
    pub first_hop: BTreeMap<String, String>,
}

impl SpfResult {
    pub fn reachable(&self, destination: &str) -> bool {
        self.dist.contains_key(destination)
    }
}

/// Classical single-source shortest path over non-negative edge weights, with
/// first-hop propagation during relaxation and a deterministic smallest-identifier
/// tie-break. Shared by the LSR and Dijkstra sub-engines (`routing::lsr`,
/// `routing::dijkstra`); ported from the route-compute family's `compute_spf_single`,
/// re-keyed on `String` node identifiers instead of numeric router ids.
pub fn shortest_paths(graph: &Graph, source: &str) -> SpfResult {
    let mut dist: BTreeMap<String, f64> = BTreeMap::new();
    let mut first_hop: BTreeMap<String, String> = BTreeMap::new();
    let mut visited: BTreeSet<String> = BTreeSet::new();

    dist.insert(source.to_string(), 0.0);

    loop {
        let mut candidate: Option<(&String, f64)> = None;
        for (node, node_dist) in &dist {
            if visited.contains(node) {
                continue;
            }
            match candidate {
                None => candidate = Some((node, *node_dist)),
                Some((best_node, best_dist)) => {
                    if *node_dist < best_dist || (*node_dist == best_dist && node < best_node) {
                        candidate = Some((node, *node_dist));
                    }
                }
            }
        }

        let Some((u, cost_u)) = candidate.map(|(n, d)| (n.clone(), d)) else {
            break;
        };
        visited.insert(u.clone());

        if let Some(neighbors) = graph.get(&u) {
            for (v, edge_cost) in neighbors {
                let candidate_metric = cost_u + *edge_cost;
                let candidate_hop = if u == source {
                    v.clone()
                } else {
                    first_hop.get(&u).cloned().unwrap_or_else(|| v.clone())
                };

                let best = dist.get(v).copied().unwrap_or(f64::INFINITY);

                if candidate_metric < best {
                    dist.insert(v.clone(), candidate_metric);
                    first_hop.insert(v.clone(), candidate_hop);
                }
            }
        }
    }

    SpfResult { dist, first_hop }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph_from(edges: &[(&str, &str, f64)]) -> Graph {
        let mut graph: Graph = BTreeMap::new();
        for (a, b, cost) in edges {
            graph.entry(a.to_string()).or_default().insert(b.to_string(), *cost);
            graph.entry(b.to_string()).or_default().insert(a.to_string(), *cost);
        }
        graph
    }

    #[test]
    fn prefers_lower_next_hop_on_tie() {
        let graph = graph_from(&[("A", "B", 1.0), ("A", "C", 1.0), ("B", "D", 1.0), ("C", "D", 1.0)]);
        let result = shortest_paths(&graph, "A");
        assert_eq!(result.first_hop.get("D").map(String::as_str), Some("B"));
        assert_eq!(result.dist.get("D").copied(), Some(2.0));
    }

    #[test]
    fn unreachable_destination_is_absent() {
        let mut graph = graph_from(&[("A", "B", 1.0)]);
        graph.entry("C".to_string()).or_default();
        let result = shortest_paths(&graph, "A");
        assert!(!result.reachable("C"));
    }

    #[test]
    fn four_node_ring_converges_to_cost_two_for_far_node() {
        let graph = graph_from(&[("A", "B", 1.0), ("B", "C", 1.0), ("C", "D", 1.0), ("D", "A", 1.0)]);
        let result = shortest_paths(&graph, "A");
        assert_eq!(result.dist.get("C").copied(), Some(2.0));
        assert_eq!(result.first_hop.get("C").map(String::as_str), Some("B"));
    }
}
