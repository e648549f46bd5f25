use std::collections::BTreeMap;
use std::sync::atomic::Ordering;
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use tracing::{debug, info};

use crate::bus::{NewNodeNotice, OutboundFrame};
use crate::model::identity::canonical_port;
use crate::model::message::{Message, MessageKind, Protocol};
use crate::model::routing_table::RoutingEntry;
use crate::routing::timers::PeriodicTimer;
use crate::routing::{hello, RoutingContext};

const BROADCAST_INTERVAL: Duration = Duration::from_secs(5);
const EXPIRY_INTERVAL: Duration = Duration::from_secs(3);
const HELLO_INTERVAL: Duration = Duration::from_secs(10);

/// Flooding sub-engine (§4.3): direct neighbors seeded at cost 1, periodic table
/// broadcast to active (discovered) neighbors, distance-vector-style merge on receipt.
/// The relaxation rule is plain Bellman-Ford: `remote_distance + 1`, replace the
/// current entry only if strictly better.
pub fn run(
    ctx: RoutingContext,
    routing_info_rx: &Receiver<Message>,
    new_nodes_rx: &Receiver<NewNodeNotice>,
    running: Arc<std::sync::atomic::AtomicBool>,
) {
    seed_direct_neighbors(&ctx);

    let mut broadcast_timer = PeriodicTimer::new(BROADCAST_INTERVAL);
    let mut expiry_timer = PeriodicTimer::new(EXPIRY_INTERVAL);
    let mut hello_timer = PeriodicTimer::new(HELLO_INTERVAL);

    while running.load(Ordering::Relaxed) {
        let now = Instant::now();

        if hello_timer.due(now) {
            hello::send_hellos(&ctx, Protocol::Flooding, now_ms());
        }
        if broadcast_timer.due(now) {
            broadcast_table(&ctx);
        }
        if expiry_timer.due(now) {
            let dropped = ctx.shared.with(|state| state.routing_table.expire(now));
            if !dropped.is_empty() {
                debug!(count = dropped.len(), "expired stale routing entries");
            }
        }

        while let Ok(notice) = new_nodes_rx.try_recv() {
            process_new_node(&ctx, notice);
        }

        match routing_info_rx.recv_timeout(crate::routing::ROUTING_POLL) {
            Ok(message) => handle_routing_info(&ctx, message, now),
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {}
            Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }
}

/// Adds a direct routing-table entry for a freshly-confirmed neighbor if one isn't
/// already there. `seed_direct_neighbors` already covers every *configured* neighbor
/// unconditionally at startup, so this is mostly a no-op in practice; it exists so the
/// entry still appears promptly for a neighbor relationship established only after
/// this node starts (discovery, not configuration).
fn process_new_node(ctx: &RoutingContext, notice: NewNodeNotice) {
    let Ok(port) = canonical_port(&notice.neighbor_id) else {
        return;
    };
    let host = notice.address.split('@').nth(1).unwrap_or("localhost").to_string();
    ctx.shared.with(|state| {
        if state.routing_table.get(&notice.address).is_none() {
            state.routing_table.upsert(
                notice.address.clone(),
                RoutingEntry {
                    next_hop_address: notice.address,
                    distance_or_cost: 1.0,
                    interface: (host, port),
                    learned_at: Instant::now(),
                    source_algorithm: Protocol::Flooding,
                },
            );
        }
    });
}

fn seed_direct_neighbors(ctx: &RoutingContext) {
    ctx.shared.with(|state| {
        for neighbor in &ctx.neighbors {
            let Ok(port) = canonical_port(&neighbor.id) else {
                continue;
            };
            let address = ctx.identity.address_of(&neighbor.id);
            let host = address.split('@').nth(1).unwrap_or("localhost").to_string();
            state.routing_table.upsert(
                address.clone(),
                RoutingEntry {
                    next_hop_address: address,
                    distance_or_cost: 1.0,
                    interface: (host, port),
                    learned_at: Instant::now(),
                    source_algorithm: Protocol::Flooding,
                },
            );
        }
    });
}

fn broadcast_table(ctx: &RoutingContext) {
    let table: BTreeMap<String, f64> = ctx.shared.with(|state| {
        state
            .routing_table
            .iter()
            .map(|(dest, entry)| (dest.clone(), entry.distance_or_cost))
            .collect()
    });
    let active: Vec<(String, u16)> = ctx.shared.with(|state| {
        state
            .discovered_neighbors
            .iter()
            .map(|(addr, info)| (addr.clone(), info.port))
            .collect()
    });
    if active.is_empty() {
        return;
    }
    for (address, port) in active {
        let host = address.split('@').nth(1).unwrap_or("localhost").to_string();
        let message = Message {
            proto: Protocol::Flooding,
            kind: MessageKind::RoutingInfo,
            from: ctx.self_address.clone(),
            to: address,
            ttl: 1,
            msg_id: format!("{}-{}", ctx.self_id, now_ms()),
            original_sender: ctx.self_address.clone(),
            timestamp: now_ms() as f64 / 1000.0,
            payload: serde_json::json!({ "table": table }),
            headers: Vec::new(),
        };
        let _ = ctx.outbox.send(OutboundFrame { host, port, message });
    }
}

fn handle_routing_info(ctx: &RoutingContext, message: Message, now: Instant) {
    if message.kind == MessageKind::Hello {
        hello::handle_hello(ctx, &message, now);
        return;
    }
    if message.kind != MessageKind::RoutingInfo {
        return;
    }
    let Some(remote_table) = message.payload.get("table").and_then(|v| v.as_object()) else {
        return;
    };
    let sender = message.from.clone();
    let Ok(port) = ctx
        .identity
        .identifier_of(&sender)
        .ok_or(())
        .and_then(|id| canonical_port(&id).map_err(|_| ()))
    else {
        return;
    };
    let host = sender.split('@').nth(1).unwrap_or("localhost").to_string();

    ctx.shared.with(|state| {
        for (destination, remote_distance) in remote_table {
            let Some(remote_distance) = remote_distance.as_f64() else {
                continue;
            };
            if destination == &ctx.self_address {
                continue;
            }
            let candidate_distance = remote_distance + 1.0;
            let replace = match state.routing_table.get(destination) {
                None => true,
                Some(current) => candidate_distance < current.distance_or_cost,
            };
            if replace {
                state.routing_table.upsert(
                    destination.clone(),
                    RoutingEntry {
                        next_hop_address: sender.clone(),
                        distance_or_cost: candidate_distance,
                        interface: (host.clone(), port),
                        learned_at: now,
                        source_algorithm: Protocol::Flooding,
                    },
                );
            }
        }
    });
    info!(from = %sender, "merged routing info");
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
