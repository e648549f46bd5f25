use tracing::warn;

use crate::bus::OutboundFrame;
use crate::model::message::Message;
use crate::shared::SharedState;

#[derive(Debug)]
pub enum TableForwardOutcome {
    Delivered { original_sender: String, data: String },
    Forwarded(OutboundFrame),
    NoRoute,
}

/// LSR/Dijkstra forwarding (§4.4): single routing-table lookup and forward, or a
/// logged drop on a miss. Self-originated data follows the identical path (§9:
/// self-injection), so this takes no special "is this mine" branch for the sender.
pub fn forward(shared: &SharedState, self_address: &str, message: Message) -> TableForwardOutcome {
    if message.to == self_address {
        let data = message
            .payload
            .get("data")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        return TableForwardOutcome::Delivered {
            original_sender: message.original_sender,
            data,
        };
    }

    shared.with(|state| {
        let Some(entry) = state.routing_table.get(&message.to) else {
            warn!(to = %message.to, "no route");
            return TableForwardOutcome::NoRoute;
        };
        let (host, port) = entry.interface.clone();
        TableForwardOutcome::Forwarded(OutboundFrame { host, port, message })
    })
}
