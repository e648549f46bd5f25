use std::time::Instant;

use tracing::{debug, info};

use crate::bus::{NewNodeNotice, OutboundFrame};
use crate::model::identity::canonical_port;
use crate::model::message::{Message, MessageKind, Protocol};
use crate::routing::RoutingContext;

/// Builds and enqueues a hello to every configured neighbor. Shared by all three
/// sub-engines (§4.3: "Hello protocol (all sub-engines)").
pub fn send_hellos(ctx: &RoutingContext, proto: Protocol, now_ms: u64) {
    for neighbor in &ctx.neighbors {
        let Ok(port) = canonical_port(&neighbor.id) else {
            continue;
        };
        let to = ctx.identity.address_of(&neighbor.id);
        let host = to.split('@').nth(1).unwrap_or("localhost").to_string();
        let hello = Message {
            proto,
            kind: MessageKind::Hello,
            from: ctx.self_address.clone(),
            to,
            ttl: 1,
            msg_id: format!("{}-{now_ms}", ctx.self_id),
            original_sender: ctx.self_address.clone(),
            timestamp: now_ms as f64 / 1000.0,
            payload: serde_json::json!({}),
            headers: Vec::new(),
        };
        let _ = ctx.outbox.send(OutboundFrame { host, port, message: hello });
    }
}

/// On hello receipt: if `from` resolves to a configured neighbor identifier, record the
/// discovered-neighbors entry with the *canonical* port (never the stream's observed
/// source port -- resolved per SPEC_FULL.md §9's Open Question) and, the first time,
/// emit a `new_nodes` notification. Unknown origins are logged and ignored.
pub fn handle_hello(ctx: &RoutingContext, message: &Message, now: Instant) {
    let Some(neighbor_id) = ctx.identity.identifier_of(&message.from) else {
        debug!(from = %message.from, "hello from unresolvable origin, ignored");
        return;
    };
    if !ctx.neighbors.iter().any(|n| n.id == neighbor_id) {
        debug!(from = %message.from, "hello from non-configured neighbor, ignored");
        return;
    }
    let Ok(port) = canonical_port(&neighbor_id) else {
        return;
    };

    let is_new = ctx
        .shared
        .with(|state| state.discovered_neighbors.confirm(message.from.clone(), port, now));

    if is_new {
        info!(neighbor = %neighbor_id, address = %message.from, "neighbor confirmed");
        let _ = ctx.new_nodes.send(NewNodeNotice {
            neighbor_id,
            address: message.from.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::identity::IdentityResolver;
    use crate::model::neighbors::ConfiguredNeighbor;
    use crate::shared::SharedState;
    use std::collections::BTreeMap;
    use std::sync::mpsc;
    use std::sync::Arc;

    fn ctx() -> RoutingContext {
        let identity = IdentityResolver::new(BTreeMap::from([
            ("A".to_string(), "nodeA@localhost".to_string()),
            ("B".to_string(), "nodeB@localhost".to_string()),
        ]));
        let (outbox_tx, _outbox_rx) = mpsc::channel();
        let (new_nodes_tx, _new_nodes_rx) = mpsc::channel();
        RoutingContext {
            self_id: "A".to_string(),
            self_address: "nodeA@localhost".to_string(),
            identity,
            neighbors: vec![ConfiguredNeighbor { id: "B".to_string(), cost: 1 }],
            shared: Arc::new(SharedState::new()),
            outbox: outbox_tx,
            new_nodes: new_nodes_tx,
        }
    }

    #[test]
    fn hello_from_configured_neighbor_confirms_and_notifies_once() {
        let context = ctx();
        let hello = Message {
            proto: Protocol::Flooding,
            kind: MessageKind::Hello,
            from: "nodeB@localhost".to_string(),
            to: "nodeA@localhost".to_string(),
            ttl: 1,
            msg_id: "B-1".to_string(),
            original_sender: "nodeB@localhost".to_string(),
            timestamp: 0.0,
            payload: serde_json::json!({}),
            headers: Vec::new(),
        };
        handle_hello(&context, &hello, Instant::now());
        assert!(context
            .shared
            .with(|state| state.discovered_neighbors.contains("nodeB@localhost")));
    }

    #[test]
    fn hello_from_unconfigured_origin_is_ignored() {
        let context = ctx();
        let hello = Message {
            proto: Protocol::Flooding,
            kind: MessageKind::Hello,
            from: "nodeZ@localhost".to_string(),
            to: "nodeA@localhost".to_string(),
            ttl: 1,
            msg_id: "Z-1".to_string(),
            original_sender: "nodeZ@localhost".to_string(),
            timestamp: 0.0,
            payload: serde_json::json!({}),
            headers: Vec::new(),
        };
        handle_hello(&context, &hello, Instant::now());
        assert!(!context
            .shared
            .with(|state| state.discovered_neighbors.contains("nodeZ@localhost")));
    }
}
