use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::model::neighbors::DiscoveredNeighbors;
use crate::model::routing_table::RoutingTable;
use crate::routing::spf::Graph;

/// The shared-mutable resources named in §5, bundled behind exactly one mutex. No
/// field is ever locked independently; every worker that needs any of these takes the
/// whole lock, mutates/reads, and releases it before doing any queue or socket
/// operation (never hold the mutex across a blocking call).
///
/// `neighbor_costs` extends §5's documented set: the operator's `cost` command (§4.5)
/// mutates a live value the routing worker reads every announcement cycle, so it must
/// live behind the same lock rather than a thread-local copy captured at spawn time.
///
/// `dijkstra_topology` extends it further: the distributed-Dijkstra sub-engine's known
/// adjacency matrix is otherwise a stack-local in `routing::dijkstra::run`, and the
/// operator's `graph` command (§4.5) has no other path to it. Unused (stays empty) for
/// the other two algorithms.
#[derive(Debug, Default)]
pub struct NodeState {
    pub routing_table: RoutingTable,
    pub discovered_neighbors: DiscoveredNeighbors,
    pub neighbor_costs: BTreeMap<String, u32>,
    pub dijkstra_topology: Graph,
}

#[derive(Debug, Default)]
pub struct SharedState(Mutex<NodeState>);

impl SharedState {
    pub fn new() -> Self {
        Self(Mutex::new(NodeState::default()))
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut NodeState) -> R) -> R {
        let mut guard = self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard)
    }
}
