use std::io::{self, BufRead, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use crate::bus::{classify_and_enqueue, NodeBus};
use crate::model::identity::IdentityResolver;
use crate::model::message::{Message, MessageKind, Protocol};
use crate::model::neighbors::ConfiguredNeighbor;
use crate::shared::SharedState;

/// Runs the line-oriented operator REPL on the calling thread (§4.5). Command
/// availability is gated by `algorithm`, matching `Nodo.interactive_mode`'s
/// per-algorithm menu. Every command reads state through the same lock the
/// workers use, or builds a `Message` and self-injects it into the inbox (§9).
#[allow(clippy::too_many_arguments)]
pub fn run(
    node_id: &str,
    self_address: &str,
    algorithm: Protocol,
    shared: &SharedState,
    identity: &IdentityResolver,
    neighbors: &[ConfiguredNeighbor],
    bus: &NodeBus,
    running: Arc<AtomicBool>,
) {
    print_banner(node_id, algorithm);
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    while running.load(Ordering::Relaxed) {
        print!("[{node_id}-{}]> ", algorithm_label(algorithm));
        let _ = io::stdout().flush();

        let Some(Ok(line)) = lines.next() else {
            break;
        };
        let words: Vec<&str> = line.trim().split_whitespace().collect();
        if words.is_empty() {
            continue;
        }

        match words[0] {
            "send" if words.len() >= 3 => {
                let destination = words[1];
                let text = words[2..].join(" ");
                send(node_id, self_address, identity, destination, &text, algorithm, bus);
            }
            "neighbors" => print_neighbors(shared, neighbors, algorithm),
            "table" => print_table(shared, algorithm),
            "cost" if words.len() == 3 && matches!(algorithm, Protocol::Lsr | Protocol::Dijkstra) => {
                set_cost(shared, neighbors, words[1], words[2]);
            }
            "topology" if matches!(algorithm, Protocol::Lsr | Protocol::Dijkstra) => {
                print_topology(shared, neighbors, algorithm);
            }
            "graph" if algorithm == Protocol::Dijkstra => print_graph(shared),
            "calculate" if words.len() == 2 && algorithm == Protocol::Dijkstra => {
                calculate(shared, identity, words[1]);
            }
            "quit" => {
                running.store(false, Ordering::Relaxed);
                break;
            }
            _ => println!("unrecognized command"),
        }
    }
}

fn print_banner(node_id: &str, algorithm: Protocol) {
    println!("\n=== NODE {node_id} - INTERACTIVE MODE ({}) ===", algorithm_label(algorithm));
    println!("available commands:");
    println!("  send <destination> <text>  - send a data message");
    println!("  neighbors                  - list discovered neighbors");
    println!("  table                      - show the routing table");
    if matches!(algorithm, Protocol::Lsr | Protocol::Dijkstra) {
        println!("  cost <neighbor> <integer>  - change a neighbor's link cost");
        println!("  topology                   - show known topology");
    }
    if algorithm == Protocol::Dijkstra {
        println!("  graph                      - inspect the known adjacency");
        println!("  calculate <destination>    - report the path to a destination");
    }
    println!("  quit                       - stop this node");
    println!("{}", "=".repeat(60));
}

fn algorithm_label(algorithm: Protocol) -> &'static str {
    match algorithm {
        Protocol::Flooding => "FLOODING",
        Protocol::Lsr => "LSR",
        Protocol::Dijkstra => "DIJKSTRA",
    }
}

/// Builds a fresh data `Message` and enqueues it as if it had arrived from self,
/// exactly like a peer's frame (§9: self-injection into the inbox).
fn send(
    node_id: &str,
    self_address: &str,
    identity: &IdentityResolver,
    destination: &str,
    text: &str,
    algorithm: Protocol,
    bus: &NodeBus,
) {
    let to = identity.address_of(destination);
    let message = Message {
        proto: algorithm,
        kind: MessageKind::Message,
        from: self_address.to_string(),
        to,
        ttl: 5,
        msg_id: format!("{node_id}-{}", now_ms()),
        original_sender: self_address.to_string(),
        timestamp: now_ms() as f64 / 1000.0,
        payload: serde_json::json!({ "data": text }),
        headers: Vec::new(),
    };
    classify_and_enqueue(bus, message, self_address.to_string());
}

fn print_neighbors(shared: &SharedState, neighbors: &[ConfiguredNeighbor], algorithm: Protocol) {
    let discovered: Vec<String> = shared.with(|state| state.discovered_neighbors.iter().map(|(addr, _)| addr.clone()).collect());
    println!("discovered neighbors: {discovered:?}");
    if matches!(algorithm, Protocol::Lsr | Protocol::Dijkstra) {
        println!("neighbor costs: {:?}", current_costs(shared, neighbors));
    }
}

fn print_table(shared: &SharedState, algorithm: Protocol) {
    let rows: Vec<(String, String, f64)> = shared.with(|state| {
        state
            .routing_table
            .iter()
            .map(|(dest, entry)| (dest.clone(), entry.next_hop_address.clone(), entry.distance_or_cost))
            .collect()
    });
    println!("routing table ({}):", algorithm_label(algorithm));
    if rows.is_empty() {
        println!("  (empty)");
        return;
    }
    for (dest, next_hop, cost) in rows {
        println!("  {dest} -> {next_hop} (dist/cost: {cost})");
    }
}

/// Writes the new cost into `shared.neighbor_costs` (see `shared::NodeState`), which
/// the running routing sub-engine reads fresh on every periodic announcement; there is
/// no separate invalidation signal (§3: "changes invalidate cached path computations"
/// is satisfied by the next LSP/dijkstra_info cycle recomputing from the updated cost).
fn set_cost(shared: &SharedState, neighbors: &[ConfiguredNeighbor], neighbor_id: &str, raw_cost: &str) {
    let Ok(cost) = raw_cost.parse::<u32>() else {
        println!("error: cost must be an integer");
        return;
    };
    if !neighbors.iter().any(|n| n.id == neighbor_id) {
        println!("error: {neighbor_id} is not a configured neighbor");
        return;
    }
    shared.with(|state| {
        state.neighbor_costs.insert(neighbor_id.to_string(), cost);
    });
}

fn current_costs(shared: &SharedState, neighbors: &[ConfiguredNeighbor]) -> Vec<(String, u32)> {
    let live = shared.with(|state| state.neighbor_costs.clone());
    neighbors
        .iter()
        .map(|n| (n.id.clone(), live.get(&n.id).copied().unwrap_or(n.cost)))
        .collect()
}

fn print_topology(shared: &SharedState, neighbors: &[ConfiguredNeighbor], algorithm: Protocol) {
    println!("known topology:");
    let ids: Vec<&String> = neighbors.iter().map(|n| &n.id).collect();
    println!("  direct neighbors: {ids:?}");
    println!("  costs: {:?}", current_costs(shared, neighbors));
    let _ = algorithm;
}

/// Prints the known adjacency matrix (`shared.dijkstra_topology`), `inf` for an absent
/// edge between two known nodes -- the operator-visible equivalent of
/// `Nodo.interactive_mode`'s `graph` command.
fn print_graph(shared: &SharedState) {
    let topology = shared.with(|state| state.dijkstra_topology.clone());
    if topology.is_empty() {
        println!("adjacency matrix: (no topology known yet)");
        return;
    }
    let nodes: Vec<&String> = topology.keys().collect();
    println!("adjacency matrix nodes: {nodes:?}");
    for node in &nodes {
        let row: Vec<String> = nodes
            .iter()
            .map(|other| match topology.get(*node).and_then(|links| links.get(*other)) {
                Some(cost) => cost.to_string(),
                None if node == other => "0".to_string(),
                None => "inf".to_string(),
            })
            .collect();
        println!("  {node}: {row:?}");
    }
}

fn calculate(shared: &SharedState, identity: &IdentityResolver, destination: &str) {
    let address = identity.address_of(destination);
    let found = shared.with(|state| {
        state
            .routing_table
            .get(&address)
            .map(|entry| (entry.next_hop_address.clone(), entry.distance_or_cost))
    });
    match found {
        Some((next_hop, cost)) => println!("path to {destination}: via {next_hop} (cost: {cost})"),
        None => println!("{destination} not found in the current routing table"),
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
