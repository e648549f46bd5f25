use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use tracing::debug;

use crate::bus::{NewNodeNotice, OutboundFrame};
use crate::model::identity::canonical_port;
use crate::model::message::{Message, MessageKind, Protocol};
use crate::model::routing_table::RoutingEntry;
use crate::routing::spf::{shortest_paths, Graph};
use crate::routing::timers::PeriodicTimer;
use crate::routing::{hello, RoutingContext};

const DIJKSTRA_INFO_INTERVAL: Duration = Duration::from_secs(10);
const TOPOLOGY_UPDATE_INTERVAL: Duration = Duration::from_secs(5);
const HELLO_INTERVAL: Duration = Duration::from_secs(10);

/// Distributed-Dijkstra sub-engine (§4.3): `dijkstra_info` (own neighbor cost map,
/// ~10s) and `topology_update` (known topology snapshot, ~5s) announcements build a
/// global adjacency matrix; shortest paths are recomputed from self via the shared
/// `routing::spf` solver whenever the matrix changes.
pub fn run(
    ctx: RoutingContext,
    routing_info_rx: &Receiver<Message>,
    new_nodes_rx: &Receiver<NewNodeNotice>,
    running: Arc<AtomicBool>,
) {
    let mut topology: Graph = BTreeMap::new();
    seed_own_links(&ctx, &mut topology);
    recompute_routes(&ctx, &topology);

    let mut dijkstra_info_timer = PeriodicTimer::new(DIJKSTRA_INFO_INTERVAL);
    let mut topology_update_timer = PeriodicTimer::new(TOPOLOGY_UPDATE_INTERVAL);
    let mut hello_timer = PeriodicTimer::new(HELLO_INTERVAL);

    while running.load(Ordering::Relaxed) {
        let now = Instant::now();

        if hello_timer.due(now) {
            hello::send_hellos(&ctx, Protocol::Dijkstra, now_ms());
        }
        if dijkstra_info_timer.due(now) {
            if broadcast_dijkstra_info(&ctx, &mut topology) {
                recompute_routes(&ctx, &topology);
            }
        }
        if topology_update_timer.due(now) {
            broadcast_topology_update(&ctx, &topology);
        }

        let mut new_node_seen = false;
        while let Ok(notice) = new_nodes_rx.try_recv() {
            process_new_node(&ctx, &mut topology, notice);
            new_node_seen = true;
        }
        if new_node_seen {
            recompute_routes(&ctx, &topology);
        }

        match routing_info_rx.recv_timeout(crate::routing::ROUTING_POLL) {
            Ok(message) => {
                if handle_message(&ctx, &mut topology, message, now) {
                    recompute_routes(&ctx, &topology);
                }
            }
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {}
            Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }
}

/// Ensures the new neighbor has a direct edge in this node's own topology row (it
/// already does, from `live_cost_map`'s unconditional coverage of every configured
/// neighbor) and forces a route recompute so the newly-confirmed path is picked up
/// without waiting for the next `dijkstra_info` cycle -- mirrors
/// `_process_new_node_dijkstra`'s immediate `_update_dijkstra_routing_table` call.
fn process_new_node(ctx: &RoutingContext, topology: &mut Graph, notice: NewNodeNotice) {
    let own_row = topology.entry(ctx.self_address.clone()).or_default();
    own_row.entry(notice.address).or_insert(1.0);
}

/// Live neighbor cost map, mirroring `lsr::configured_cost_map` -- costs are mutable
/// at runtime via the operator `cost` command (§3), so they're read from shared state
/// rather than the `ConfiguredNeighbor` list captured at worker spawn.
fn live_cost_map(ctx: &RoutingContext) -> BTreeMap<String, f64> {
    let live = ctx.shared.with(|state| state.neighbor_costs.clone());
    ctx.neighbors
        .iter()
        .map(|n| {
            let cost = live.get(&n.id).copied().unwrap_or(n.cost) as f64;
            (ctx.identity.address_of(&n.id), cost)
        })
        .collect()
}

fn seed_own_links(ctx: &RoutingContext, topology: &mut Graph) {
    topology.insert(ctx.self_address.clone(), live_cost_map(ctx));
}

/// Refreshes this node's own row in `topology` from the live cost map (so an operator
/// `cost` change is picked up, not just relayed) before announcing it, and returns
/// whether that row actually changed so the caller knows to recompute routes.
fn broadcast_dijkstra_info(ctx: &RoutingContext, topology: &mut Graph) -> bool {
    let links = live_cost_map(ctx);
    let changed = topology.get(&ctx.self_address) != Some(&links);
    topology.insert(ctx.self_address.clone(), links.clone());

    broadcast_to_neighbors(
        ctx,
        MessageKind::DijkstraInfo,
        serde_json::json!({ "origin": ctx.self_address, "links": links }),
    );
    changed
}

fn broadcast_topology_update(ctx: &RoutingContext, topology: &Graph) {
    broadcast_to_neighbors(
        ctx,
        MessageKind::TopologyUpdate,
        serde_json::json!({ "graph": topology }),
    );
}

fn broadcast_to_neighbors(ctx: &RoutingContext, kind: MessageKind, payload: serde_json::Value) {
    for neighbor in &ctx.neighbors {
        let Ok(port) = canonical_port(&neighbor.id) else {
            continue;
        };
        let address = ctx.identity.address_of(&neighbor.id);
        let host = address.split('@').nth(1).unwrap_or("localhost").to_string();
        let message = Message {
            proto: Protocol::Dijkstra,
            kind,
            from: ctx.self_address.clone(),
            to: address,
            ttl: 1,
            msg_id: format!("{}-{}", ctx.self_id, now_ms()),
            original_sender: ctx.self_address.clone(),
            timestamp: now_ms() as f64 / 1000.0,
            payload: payload.clone(),
            headers: Vec::new(),
        };
        let _ = ctx.outbox.send(OutboundFrame { host, port, message });
    }
}

/// Returns true if `topology` changed and routes need recomputing.
fn handle_message(ctx: &RoutingContext, topology: &mut Graph, message: Message, now: Instant) -> bool {
    match message.kind {
        MessageKind::Hello => {
            hello::handle_hello(ctx, &message, now);
            false
        }
        MessageKind::DijkstraInfo => {
            let Some(origin) = message.payload.get("origin").and_then(|v| v.as_str()) else {
                return false;
            };
            let Some(links_raw) = message.payload.get("links").and_then(|v| v.as_object()) else {
                return false;
            };
            let links: BTreeMap<String, f64> = links_raw
                .iter()
                .filter_map(|(k, v)| v.as_f64().map(|cost| (k.clone(), cost)))
                .collect();
            let changed = topology.get(origin) != Some(&links);
            topology.insert(origin.to_string(), links);
            changed
        }
        MessageKind::TopologyUpdate => {
            let Some(graph_raw) = message.payload.get("graph").and_then(|v| v.as_object()) else {
                return false;
            };
            let mut changed = false;
            for (origin, links_raw) in graph_raw {
                let Some(links_raw) = links_raw.as_object() else {
                    continue;
                };
                let links: BTreeMap<String, f64> = links_raw
                    .iter()
                    .filter_map(|(k, v)| v.as_f64().map(|cost| (k.clone(), cost)))
                    .collect();
                if topology.get(origin) != Some(&links) {
                    topology.insert(origin.clone(), links);
                    changed = true;
                }
            }
            changed
        }
        _ => false,
    }
}

fn recompute_routes(ctx: &RoutingContext, topology: &Graph) {
    let result = shortest_paths(topology, &ctx.self_address);

    let mut fresh: BTreeMap<String, RoutingEntry> = BTreeMap::new();
    for (destination, distance) in &result.dist {
        if destination == &ctx.self_address {
            continue;
        }
        let Some(first_hop) = result.first_hop.get(destination) else {
            continue;
        };
        let Some(neighbor_id) = ctx.identity.identifier_of(first_hop) else {
            continue;
        };
        let Ok(port) = canonical_port(&neighbor_id) else {
            continue;
        };
        let host = first_hop.split('@').nth(1).unwrap_or("localhost").to_string();
        fresh.insert(
            destination.clone(),
            RoutingEntry {
                next_hop_address: first_hop.clone(),
                distance_or_cost: *distance,
                interface: (host, port),
                learned_at: Instant::now(),
                source_algorithm: Protocol::Dijkstra,
            },
        );
    }

    let count = fresh.len();
    ctx.shared.with(|state| {
        state.routing_table.replace_algorithm_entries(Protocol::Dijkstra, fresh);
        state.dijkstra_topology = topology.clone();
    });
    debug!(destinations = count, "dijkstra routes recomputed");
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
