use std::sync::mpsc::{self, Receiver, Sender};

use crate::model::message::{Message, MessageKind, Protocol};

/// An outbound send request: destination host/port plus the record to serialize.
#[derive(Debug, Clone)]
pub struct OutboundFrame {
    pub host: String,
    pub port: u16,
    pub message: Message,
}

/// Emitted by the routing worker when a previously-unconfirmed neighbor sends a hello.
#[derive(Debug, Clone)]
pub struct NewNodeNotice {
    pub neighbor_id: String,
    pub address: String,
}

/// The five typed queues of §4.2. Every queue has exactly one producer-side classifier
/// and exactly one consumer in this design (the transport worker classifies and feeds
/// `inbox`/`routing_info`/`lsp_queue`; the routing worker is the sole producer of
/// `new_nodes`), so plain `std::sync::mpsc` is sufficient -- see DESIGN.md.
pub struct NodeBus {
    pub inbox_tx: Sender<(Message, String)>,
    pub inbox_rx: Receiver<(Message, String)>,
    pub outbox_tx: Sender<OutboundFrame>,
    pub outbox_rx: Receiver<OutboundFrame>,
    pub routing_info_tx: Sender<Message>,
    pub routing_info_rx: Receiver<Message>,
    pub lsp_queue_tx: Sender<Message>,
    pub lsp_queue_rx: Receiver<Message>,
    pub new_nodes_tx: Sender<NewNodeNotice>,
    pub new_nodes_rx: Receiver<NewNodeNotice>,
}

impl NodeBus {
    pub fn new() -> Self {
        let (inbox_tx, inbox_rx) = mpsc::channel();
        let (outbox_tx, outbox_rx) = mpsc::channel();
        let (routing_info_tx, routing_info_rx) = mpsc::channel();
        let (lsp_queue_tx, lsp_queue_rx) = mpsc::channel();
        let (new_nodes_tx, new_nodes_rx) = mpsc::channel();
        Self {
            inbox_tx,
            inbox_rx,
            outbox_tx,
            outbox_rx,
            routing_info_tx,
            routing_info_rx,
            lsp_queue_tx,
            lsp_queue_rx,
            new_nodes_tx,
            new_nodes_rx,
        }
    }
}

impl Default for NodeBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Control-plane kinds the routing worker wants to see (everything except plain data
/// frames and LSR's own `lsp` kind, which gets its own queue).
fn is_routing_info(kind: MessageKind) -> bool {
    matches!(
        kind,
        MessageKind::Hello
            | MessageKind::RoutingInfo
            | MessageKind::DijkstraInfo
            | MessageKind::TopologyUpdate
    )
}

/// The transport worker's dual-enqueue: every decoded record goes to `inbox`, and by
/// type additionally to `routing_info` or `lsp_queue`. Load-bearing per SPEC_FULL.md §9
/// -- preserved here rather than filtered at the consumer.
pub fn classify_and_enqueue(bus: &NodeBus, message: Message, peer: String) {
    if message.kind == MessageKind::Lsp && message.proto == Protocol::Lsr {
        let _ = bus.lsp_queue_tx.send(message.clone());
    } else if is_routing_info(message.kind) {
        let _ = bus.routing_info_tx.send(message.clone());
    }
    let _ = bus.inbox_tx.send((message, peer));
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn msg(kind: MessageKind, proto: Protocol) -> Message {
        Message {
            proto,
            kind,
            from: "nodeA@localhost".into(),
            to: "broadcast".into(),
            ttl: 5,
            msg_id: "A-1".into(),
            original_sender: "nodeA@localhost".into(),
            timestamp: 0.0,
            payload: json!({}),
            headers: Vec::new(),
        }
    }

    #[test]
    fn hello_goes_to_inbox_and_routing_info_not_lsp() {
        let bus = NodeBus::new();
        classify_and_enqueue(&bus, msg(MessageKind::Hello, Protocol::Flooding), "1.2.3.4".into());
        assert!(bus.inbox_rx.try_recv().is_ok());
        assert!(bus.routing_info_rx.try_recv().is_ok());
        assert!(bus.lsp_queue_rx.try_recv().is_err());
    }

    #[test]
    fn lsp_goes_to_inbox_and_lsp_queue_not_routing_info() {
        let bus = NodeBus::new();
        classify_and_enqueue(&bus, msg(MessageKind::Lsp, Protocol::Lsr), "1.2.3.4".into());
        assert!(bus.inbox_rx.try_recv().is_ok());
        assert!(bus.lsp_queue_rx.try_recv().is_ok());
        assert!(bus.routing_info_rx.try_recv().is_err());
    }

    #[test]
    fn data_message_only_goes_to_inbox() {
        let bus = NodeBus::new();
        classify_and_enqueue(&bus, msg(MessageKind::Message, Protocol::Flooding), "1.2.3.4".into());
        assert!(bus.inbox_rx.try_recv().is_ok());
        assert!(bus.routing_info_rx.try_recv().is_err());
        assert!(bus.lsp_queue_rx.try_recv().is_err());
    }
}
