use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use tracing::{debug, info};

use crate::bus::OutboundFrame;
use crate::model::identity::canonical_port;
use crate::model::link_state::LinkStateDb;
use crate::model::message::{Message, MessageKind, Protocol};
use crate::model::routing_table::RoutingEntry;
use crate::model::seen_set::SeenSet;
use crate::routing::spf::shortest_paths;
use crate::routing::timers::PeriodicTimer;
use crate::routing::{hello, RoutingContext};

const LSP_INTERVAL: Duration = Duration::from_secs(30);
const HELLO_INTERVAL: Duration = Duration::from_secs(10);
const LSP_HISTORY_RETENTION: Duration = Duration::from_secs(600);
const INITIAL_TTL: i64 = 10;

/// Link-state sub-engine (§4.3): sequence-numbered LSP origination/flooding, a
/// link-state database with strictly-increasing-sequence replacement, and SPF-driven
/// routing-table rewrite on every database change. LSP emission is unconditional every
/// 30 seconds -- the original's `should_send_lsp` gate is deliberately not ported (see
/// SPEC_FULL.md §9's Open Question resolution).
pub fn run(
    ctx: RoutingContext,
    routing_info_rx: &Receiver<Message>,
    lsp_queue_rx: &Receiver<Message>,
    running: Arc<AtomicBool>,
) {
    let mut sequence: u64 = 0;
    let mut lsdb = LinkStateDb::new();
    let mut lsp_history = SeenSet::new(LSP_HISTORY_RETENTION);

    let mut lsp_timer = PeriodicTimer::new(LSP_INTERVAL);
    let mut hello_timer = PeriodicTimer::new(HELLO_INTERVAL);

    // Emit an LSP on startup, per §4.3; priming `lsp_timer` here means the first loop
    // iteration's `due()` check doesn't also fire and emit a second LSP with a
    // different sequence number in the same instant.
    let start = Instant::now();
    lsp_timer.due(start);
    sequence += 1;
    originate_and_flood_lsp(&ctx, &mut lsdb, &mut lsp_history, sequence, start);
    recompute_routes(&ctx, &lsdb);

    while running.load(Ordering::Relaxed) {
        let now = Instant::now();

        if hello_timer.due(now) {
            hello::send_hellos(&ctx, Protocol::Lsr, now_ms());
        }
        if lsp_timer.due(now) {
            sequence += 1;
            originate_and_flood_lsp(&ctx, &mut lsdb, &mut lsp_history, sequence, now);
            recompute_routes(&ctx, &lsdb);
        }

        match lsp_queue_rx.try_recv() {
            Ok(lsp) => {
                if handle_lsp(&ctx, &mut lsdb, &mut lsp_history, lsp, now) {
                    recompute_routes(&ctx, &lsdb);
                }
                continue;
            }
            Err(std::sync::mpsc::TryRecvError::Empty) => {}
            Err(std::sync::mpsc::TryRecvError::Disconnected) => break,
        }

        match routing_info_rx.recv_timeout(crate::routing::ROUTING_POLL) {
            Ok(message) if message.kind == MessageKind::Hello => {
                hello::handle_hello(&ctx, &message, now);
            }
            Ok(_) => {}
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {}
            Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }
}

/// Builds the local neighbor cost map from the *live* cost values in shared state
/// (mutable at runtime via the operator `cost` command), not `ctx.neighbors`' costs
/// at construction time -- see `shared::NodeState::neighbor_costs`.
fn configured_cost_map(ctx: &RoutingContext) -> BTreeMap<String, f64> {
    let live = ctx.shared.with(|state| state.neighbor_costs.clone());
    ctx.neighbors
        .iter()
        .map(|n| {
            let cost = live.get(&n.id).copied().unwrap_or(n.cost) as f64;
            (ctx.identity.address_of(&n.id), cost)
        })
        .collect()
}

fn originate_and_flood_lsp(
    ctx: &RoutingContext,
    lsdb: &mut LinkStateDb,
    history: &mut SeenSet,
    sequence: u64,
    now: Instant,
) {
    let links = configured_cost_map(ctx);
    lsdb.upsert(ctx.self_address.clone(), sequence, links.clone(), now);
    history.insert(lsp_history_key(&ctx.self_address, sequence), now);

    let message = Message {
        proto: Protocol::Lsr,
        kind: MessageKind::Lsp,
        from: ctx.self_address.clone(),
        to: "broadcast".to_string(),
        ttl: INITIAL_TTL,
        msg_id: format!("{}-{}", ctx.self_id, now_ms()),
        original_sender: ctx.self_address.clone(),
        timestamp: now_ms() as f64 / 1000.0,
        payload: serde_json::json!({ "origin": ctx.self_address, "sequence": sequence, "links": links }),
        headers: Vec::new(),
    };
    flood_to_all_neighbors(ctx, &message, None);
}

/// Returns true if the LSDB changed (so the caller should recompute routes).
fn handle_lsp(
    ctx: &RoutingContext,
    lsdb: &mut LinkStateDb,
    history: &mut SeenSet,
    mut message: Message,
    now: Instant,
) -> bool {
    if message.ttl <= 0 {
        return false;
    }
    let Some(origin) = message.payload.get("origin").and_then(|v| v.as_str()) else {
        return false;
    };
    let Some(sequence) = message.payload.get("sequence").and_then(|v| v.as_u64()) else {
        return false;
    };
    let key = lsp_history_key(origin, sequence);
    if history.contains(&key) {
        return false;
    }
    history.insert(key, now);

    let Some(links_raw) = message.payload.get("links").and_then(|v| v.as_object()) else {
        return false;
    };
    let links: BTreeMap<String, f64> = links_raw
        .iter()
        .filter_map(|(k, v)| v.as_f64().map(|cost| (k.clone(), cost)))
        .collect();

    let changed = lsdb.upsert(origin.to_string(), sequence, links, now);
    if !changed {
        return false;
    }
    info!(origin, sequence, "link-state database updated");

    message.ttl -= 1;
    flood_to_all_neighbors(ctx, &message, Some(message.from.clone()));
    true
}

fn flood_to_all_neighbors(ctx: &RoutingContext, message: &Message, except_sender: Option<String>) {
    for neighbor in &ctx.neighbors {
        let neighbor_address = ctx.identity.address_of(&neighbor.id);
        if Some(&neighbor_address) == except_sender.as_ref() {
            continue;
        }
        let Ok(port) = canonical_port(&neighbor.id) else {
            continue;
        };
        let host = neighbor_address.split('@').nth(1).unwrap_or("localhost").to_string();
        let mut outgoing = message.clone();
        outgoing.to = neighbor_address;
        let _ = ctx.outbox.send(OutboundFrame { host, port, message: outgoing });
    }
}

fn recompute_routes(ctx: &RoutingContext, lsdb: &LinkStateDb) {
    let graph = lsdb.build_graph();
    let result = shortest_paths(&graph, &ctx.self_address);

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
                source_algorithm: Protocol::Lsr,
            },
        );
    }

    let count = fresh.len();
    ctx.shared.with(|state| {
        state.routing_table.replace_algorithm_entries(Protocol::Lsr, fresh);
    });
    debug!(destinations = count, "lsr routes recomputed");
}

fn lsp_history_key(origin: &str, sequence: u64) -> String {
    format!("{origin}-{sequence}")
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::identity::IdentityResolver;
    use crate::model::neighbors::ConfiguredNeighbor;
    use crate::shared::SharedState;
    use std::collections::BTreeMap as StdBTreeMap;
    use std::sync::mpsc;

    fn ctx(self_id: &str, neighbor_ids: &[&str]) -> RoutingContext {
        let identity = IdentityResolver::new(StdBTreeMap::from([
            ("A".to_string(), "nodeA@localhost".to_string()),
            ("B".to_string(), "nodeB@localhost".to_string()),
            ("C".to_string(), "nodeC@localhost".to_string()),
            ("D".to_string(), "nodeD@localhost".to_string()),
        ]));
        let (outbox_tx, _outbox_rx) = mpsc::channel();
        let (new_nodes_tx, _new_nodes_rx) = mpsc::channel();
        RoutingContext {
            self_id: self_id.to_string(),
            self_address: format!("node{self_id}@localhost"),
            identity,
            neighbors: neighbor_ids
                .iter()
                .map(|id| ConfiguredNeighbor { id: id.to_string(), cost: 1 })
                .collect(),
            shared: Arc::new(SharedState::new()),
            outbox: outbox_tx,
            new_nodes: new_nodes_tx,
        }
    }

    #[test]
    fn duplicate_origin_sequence_does_not_change_database() {
        let mut lsdb = LinkStateDb::new();
        let mut history = SeenSet::new(LSP_HISTORY_RETENTION);
        let now = Instant::now();
        lsdb.upsert("nodeB@localhost".to_string(), 1, BTreeMap::from([("nodeA@localhost".to_string(), 1.0)]), now);
        history.insert(lsp_history_key("nodeB@localhost", 1), now);

        let context = ctx("A", &["B"]);
        let lsp = Message {
            proto: Protocol::Lsr,
            kind: MessageKind::Lsp,
            from: "nodeB@localhost".to_string(),
            to: "broadcast".to_string(),
            ttl: 9,
            msg_id: "B-1".to_string(),
            original_sender: "nodeB@localhost".to_string(),
            timestamp: 0.0,
            payload: serde_json::json!({"origin": "nodeB@localhost", "sequence": 1, "links": {"nodeA@localhost": 1.0}}),
            headers: Vec::new(),
        };
        let changed = handle_lsp(&context, &mut lsdb, &mut history, lsp, now);
        assert!(!changed);
    }

    #[test]
    fn ring_converges_to_correct_costs_and_next_hops() {
        // A-B-C-D-A ring, all costs 1: convergence is exercised at the SPF level
        // directly here since it's the deterministic, fast-to-test part of this
        // sub-engine (the LSP flood/history machinery is exercised above).
        let mut lsdb = LinkStateDb::new();
        let now = Instant::now();
        for (origin, a, b) in [("A", "B", "D"), ("B", "A", "C"), ("C", "B", "D"), ("D", "C", "A")] {
            lsdb.upsert(
                format!("node{origin}@localhost"),
                1,
                BTreeMap::from([
                    (format!("node{a}@localhost"), 1.0),
                    (format!("node{b}@localhost"), 1.0),
                ]),
                now,
            );
        }
        let graph = lsdb.build_graph();
        let result = shortest_paths(&graph, "nodeA@localhost");
        assert_eq!(result.dist.get("nodeC@localhost").copied(), Some(2.0));
    }
}
