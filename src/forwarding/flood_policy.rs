use std::time::{Duration, Instant};

use tracing::info;

use crate::bus::OutboundFrame;
use crate::model::identity::canonical_port;
use crate::model::message::Message;
use crate::model::neighbors::ConfiguredNeighbor;
use crate::model::seen_set::SeenSet;

const SEEN_RETENTION: Duration = Duration::from_secs(300);

#[derive(Debug)]
pub enum FloodOutcome {
    /// Delivered locally; `original_sender`/`data` already logged by the caller.
    Delivered { original_sender: String, data: String },
    Forwarded(Vec<OutboundFrame>),
    Dropped,
}

/// The flooding forwarding state machine of §4.4: seen-set dedup, TTL cutoff,
/// fan-out-to-all-but-predecessor. Owned exclusively by the forwarding worker; ported
/// near-verbatim from the original `Flodding.receive_message`.
pub struct FloodPolicy {
    self_id: String,
    self_address: String,
    neighbors: Vec<ConfiguredNeighbor>,
    resolve_address: Box<dyn Fn(&str) -> String + Send>,
    seen: SeenSet,
}

impl FloodPolicy {
    pub fn new(
        self_id: String,
        self_address: String,
        neighbors: Vec<ConfiguredNeighbor>,
        resolve_address: Box<dyn Fn(&str) -> String + Send>,
    ) -> Self {
        Self {
            self_id,
            self_address,
            neighbors,
            resolve_address,
            seen: SeenSet::new(SEEN_RETENTION),
        }
    }

    pub fn contains_seen(&self, msg_id: &str) -> bool {
        self.seen.contains(msg_id)
    }

    /// Self-originated sends re-enter here exactly like any other inbound frame (§9:
    /// self-injection into the inbox) -- callers build a `Message` with `from` set to
    /// `self_address` and pass it through `handle` the same way.
    pub fn handle(&mut self, mut message: Message, now: Instant) -> FloodOutcome {
        if self.seen.contains(&message.msg_id) {
            return FloodOutcome::Dropped;
        }
        self.seen.insert(message.msg_id.clone(), now);

        if message.to == self.self_address {
            let data = message
                .payload
                .get("data")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            info!(
                from = %message.original_sender,
                %data,
                "delivered"
            );
            return FloodOutcome::Delivered {
                original_sender: message.original_sender,
                data,
            };
        }

        if message.ttl <= 1 {
            return FloodOutcome::Dropped;
        }
        message.ttl -= 1;

        let predecessor = (self.resolve_address)(&message.from);
        let rewritten_from = self.self_address.clone();

        let mut frames = Vec::new();
        for neighbor in &self.neighbors {
            let neighbor_address = (self.resolve_address)(&neighbor.id);
            if neighbor_address == predecessor {
                continue;
            }
            let Ok(port) = canonical_port(&neighbor.id) else {
                continue;
            };
            let mut outgoing = message.clone();
            outgoing.from = rewritten_from.clone();
            frames.push(OutboundFrame {
                host: host_of(&neighbor_address),
                port,
                message: outgoing,
            });
        }
        FloodOutcome::Forwarded(frames)
    }
}

fn host_of(address: &str) -> String {
    address
        .split('@')
        .nth(1)
        .unwrap_or("localhost")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::message::{MessageKind, Protocol};
    use serde_json::json;

    fn neighbor(id: &str) -> ConfiguredNeighbor {
        ConfiguredNeighbor { id: id.to_string(), cost: 1 }
    }

    fn data_message(from: &str, to: &str, ttl: i64, msg_id: &str) -> Message {
        Message {
            proto: Protocol::Flooding,
            kind: MessageKind::Message,
            from: from.to_string(),
            to: to.to_string(),
            ttl,
            msg_id: msg_id.to_string(),
            original_sender: from.to_string(),
            timestamp: 0.0,
            payload: json!({"data": "hello"}),
            headers: Vec::new(),
        }
    }

    fn policy_for(self_id: &str) -> FloodPolicy {
        FloodPolicy::new(
            self_id.to_string(),
            format!("node{self_id}@localhost"),
            vec![neighbor("A"), neighbor("B"), neighbor("C")],
            Box::new(|id: &str| {
                if id.contains('@') {
                    id.to_string()
                } else {
                    format!("node{id}@localhost")
                }
            }),
        )
    }

    #[test]
    fn duplicate_msg_id_is_dropped() {
        let mut policy = policy_for("B");
        let now = Instant::now();
        let msg = data_message("nodeA@localhost", "nodeC@localhost", 5, "A-1");
        assert!(matches!(
            policy.handle(msg.clone(), now),
            FloodOutcome::Forwarded(_)
        ));
        assert!(matches!(policy.handle(msg, now), FloodOutcome::Dropped));
    }

    #[test]
    fn delivers_when_destination_is_self() {
        let mut policy = policy_for("C");
        let msg = data_message("nodeB@localhost", "nodeC@localhost", 3, "A-1");
        match policy.handle(msg, Instant::now()) {
            FloodOutcome::Delivered { original_sender, data } => {
                assert_eq!(original_sender, "nodeB@localhost");
                assert_eq!(data, "hello");
            }
            other => panic!("expected delivery, got {other:?}"),
        }
    }

    #[test]
    fn ttl_of_one_is_dropped_without_forwarding() {
        let mut policy = policy_for("B");
        let msg = data_message("nodeA@localhost", "nodeZ@localhost", 1, "A-1");
        assert!(matches!(policy.handle(msg, Instant::now()), FloodOutcome::Dropped));
    }

    #[test]
    fn forwards_to_all_neighbors_except_predecessor() {
        let mut policy = policy_for("B");
        let msg = data_message("nodeA@localhost", "nodeZ@localhost", 5, "A-1");
        match policy.handle(msg, Instant::now()) {
            FloodOutcome::Forwarded(frames) => {
                let targets: Vec<_> = frames.iter().map(|f| f.message.to.clone()).collect();
                assert_eq!(frames.len(), 2);
                for frame in &frames {
                    assert_eq!(frame.message.ttl, 4);
                    assert_eq!(frame.message.from, "nodeB@localhost");
                }
                let _ = targets;
            }
            other => panic!("expected forward, got {other:?}"),
        }
    }
}
