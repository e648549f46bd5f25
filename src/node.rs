use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::RecvTimeoutError;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::bus::NodeBus;
use crate::forwarding::flood_policy::{FloodOutcome, FloodPolicy};
use crate::forwarding::table_forward;
use crate::logging::NodeLog;
use crate::model::identity::{canonical_port, IdentityResolver};
use crate::model::message::{MessageKind, Protocol};
use crate::model::neighbors::ConfiguredNeighbor;
use crate::operator;
use crate::routing::{self, RoutingContext};
use crate::shared::SharedState;
use crate::transport::TransportWorker;

const FORWARDING_POLL: Duration = Duration::from_millis(100);

/// A node's full runtime: shared state, the message bus, and the four workers of §2.
/// Three run as background threads (transport listener, transport sender, routing);
/// the forwarding worker also runs as a background thread, and the operator REPL
/// drives the calling (main) thread, per SPEC_FULL.md §2/§4.5.
pub struct Node {
    node_id: String,
    self_address: String,
    algorithm: Protocol,
    identity: IdentityResolver,
    neighbors: Vec<ConfiguredNeighbor>,
    shared: Arc<SharedState>,
    bus: Arc<NodeBus>,
    transport: TransportWorker,
    log: Arc<NodeLog>,
    running: Arc<AtomicBool>,
}

impl Node {
    pub fn new(
        node_id: String,
        algorithm: Protocol,
        topology: &BTreeMap<String, Vec<String>>,
        names: BTreeMap<String, String>,
        log_dir: &std::path::Path,
    ) -> Result<Self> {
        let identity = IdentityResolver::new(names);
        let self_address = identity.address_of(&node_id);
        let port = canonical_port(&node_id).context("deriving this node's listening port")?;

        let neighbor_ids = topology.get(&node_id).cloned().unwrap_or_default();
        let neighbors: Vec<ConfiguredNeighbor> = neighbor_ids
            .into_iter()
            .map(|id| ConfiguredNeighbor { id, cost: 1 })
            .collect();

        let shared = Arc::new(SharedState::new());
        shared.with(|state| {
            for neighbor in &neighbors {
                state.neighbor_costs.insert(neighbor.id.clone(), neighbor.cost);
            }
        });

        let bus = Arc::new(NodeBus::new());
        let transport = TransportWorker::bind("0.0.0.0", port)
            .with_context(|| format!("binding listener on port {port}"))?;
        let log = Arc::new(NodeLog::open(log_dir, &node_id)?);

        Ok(Self {
            node_id,
            self_address,
            algorithm,
            identity,
            neighbors,
            shared,
            bus,
            transport,
            log,
            running: Arc::new(AtomicBool::new(true)),
        })
    }

    /// Starts all background workers, runs the operator REPL on this thread until
    /// `quit`, then joins every worker. Mirrors `Nodo.main_executor`'s
    /// spawn-then-interactive-then-join shape, with OS threads standing in for the
    /// original's separate processes.
    pub fn run(self) -> Result<()> {
        let running = self.running.clone();
        let sig_running = self.running.clone();
        ctrlc::set_handler(move || {
            sig_running.store(false, Ordering::Relaxed);
        })
        .context("installing ctrl-c handler")?;

        let mut handles = Vec::new();

        let listener = self.transport;
        let listener_bus = self.bus.clone();
        let listener_running = running.clone();
        handles.push(std::thread::spawn(move || {
            listener.run_listener(listener_bus, listener_running);
        }));

        let sender_bus = self.bus.clone();
        let sender_running = running.clone();
        handles.push(std::thread::spawn(move || {
            TransportWorker::run_sender(sender_bus, sender_running);
        }));

        let routing_ctx = RoutingContext {
            self_id: self.node_id.clone(),
            self_address: self.self_address.clone(),
            identity: self.identity.clone(),
            neighbors: self.neighbors.clone(),
            shared: self.shared.clone(),
            outbox: self.bus.outbox_tx.clone(),
            new_nodes: self.bus.new_nodes_tx.clone(),
        };
        let routing_bus = self.bus.clone();
        let routing_running = running.clone();
        let algorithm = self.algorithm;
        handles.push(std::thread::spawn(move || {
            routing::run(algorithm, routing_ctx, &routing_bus, routing_running);
        }));

        let forwarding_bus = self.bus.clone();
        let forwarding_shared = self.shared.clone();
        let forwarding_identity = self.identity.clone();
        let forwarding_neighbors = self.neighbors.clone();
        let forwarding_self_id = self.node_id.clone();
        let forwarding_self_address = self.self_address.clone();
        let forwarding_log = self.log.clone();
        let forwarding_running = running.clone();
        handles.push(std::thread::spawn(move || {
            run_forwarding(
                forwarding_self_id,
                forwarding_self_address,
                algorithm,
                forwarding_identity,
                forwarding_neighbors,
                &forwarding_bus,
                &forwarding_shared,
                &forwarding_log,
                forwarding_running,
            );
        }));

        operator::run(
            &self.node_id,
            &self.self_address,
            self.algorithm,
            &self.shared,
            &self.identity,
            &self.neighbors,
            &self.bus,
            running.clone(),
        );

        running.store(false, Ordering::Relaxed);
        for handle in handles {
            let _ = handle.join();
        }
        info!(node_id = %self.node_id, "node stopped");
        Ok(())
    }
}

/// The forwarding worker (§4.4): drains `inbox`, dispatches to the flooding state
/// machine or a routing-table lookup depending on `algorithm`, pushes forwarded
/// frames to `outbox`, and logs local deliveries to the per-node log file.
#[allow(clippy::too_many_arguments)]
fn run_forwarding(
    self_id: String,
    self_address: String,
    algorithm: Protocol,
    identity: IdentityResolver,
    neighbors: Vec<ConfiguredNeighbor>,
    bus: &NodeBus,
    shared: &Arc<SharedState>,
    log: &NodeLog,
    running: Arc<AtomicBool>,
) {
    let mut flood_policy = FloodPolicy::new(
        self_id,
        self_address.clone(),
        neighbors,
        Box::new(move |id: &str| {
            if id.contains('@') {
                id.to_string()
            } else {
                identity.address_of(id)
            }
        }),
    );

    while running.load(Ordering::Relaxed) {
        match bus.inbox_rx.recv_timeout(FORWARDING_POLL) {
            Ok((message, _peer)) => {
                if message.kind != MessageKind::Message {
                    continue;
                }
                match algorithm {
                    Protocol::Flooding => match flood_policy.handle(message, std::time::Instant::now()) {
                        FloodOutcome::Delivered { original_sender, data } => {
                            log.write(&format!("delivered from {original_sender}: {data}"));
                        }
                        FloodOutcome::Forwarded(frames) => {
                            for frame in frames {
                                let _ = bus.outbox_tx.send(frame);
                            }
                        }
                        FloodOutcome::Dropped => {}
                    },
                    Protocol::Lsr | Protocol::Dijkstra => {
                        match table_forward::forward(shared, &self_address, message) {
                            table_forward::TableForwardOutcome::Delivered { original_sender, data } => {
                                log.write(&format!("delivered from {original_sender}: {data}"));
                            }
                            table_forward::TableForwardOutcome::Forwarded(frame) => {
                                let _ = bus.outbox_tx.send(frame);
                            }
                            table_forward::TableForwardOutcome::NoRoute => {
                                warn!("no route for forwarded frame");
                            }
                        }
                    }
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap as StdBTreeMap;

    #[test]
    fn new_binds_a_listener_and_seeds_neighbor_costs() {
        let mut topology = StdBTreeMap::new();
        topology.insert("A".to_string(), vec!["B".to_string()]);
        let node = Node::new(
            "A".to_string(),
            Protocol::Flooding,
            &topology,
            StdBTreeMap::new(),
            std::env::temp_dir().as_path(),
        );
        // Binding the real canonical port (5000) may collide in CI; accept either
        // outcome but confirm when it succeeds that neighbor costs were seeded.
        if let Ok(node) = node {
            let has_b = node.shared.with(|state| state.neighbor_costs.contains_key("B"));
            assert!(has_b);
        }
    }
}
