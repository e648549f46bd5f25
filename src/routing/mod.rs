pub mod dijkstra;
pub mod flooding;
pub mod hello;
pub mod lsr;
pub mod spf;
pub mod timers;

use std::sync::mpsc::Sender;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use crate::bus::{NewNodeNotice, NodeBus, OutboundFrame};
use crate::model::identity::IdentityResolver;
use crate::model::message::Protocol;
use crate::model::neighbors::ConfiguredNeighbor;
use crate::shared::SharedState;

pub const ROUTING_POLL: Duration = Duration::from_millis(100);

/// Everything a routing sub-engine needs, bundled so `flooding`/`lsr`/`dijkstra` share
/// one constructor shape instead of threading six parameters individually.
pub struct RoutingContext {
    pub self_id: String,
    pub self_address: String,
    pub identity: IdentityResolver,
    pub neighbors: Vec<ConfiguredNeighbor>,
    pub shared: Arc<SharedState>,
    pub outbox: Sender<OutboundFrame>,
    pub new_nodes: Sender<NewNodeNotice>,
}

/// Runs the routing worker loop for whichever sub-engine `protocol` selects. Each
/// sub-engine owns its full loop (tick cadences differ enough between the three that a
/// shared generic loop would need more hooks than it would save -- see DESIGN.md).
pub fn run(
    protocol: Protocol,
    ctx: RoutingContext,
    bus: &NodeBus,
    running: Arc<AtomicBool>,
) {
    match protocol {
        Protocol::Flooding => flooding::run(ctx, &bus.routing_info_rx, &bus.new_nodes_rx, running),
        Protocol::Lsr => lsr::run(ctx, &bus.routing_info_rx, &bus.lsp_queue_rx, running),
        Protocol::Dijkstra => dijkstra::run(ctx, &bus.routing_info_rx, &bus.new_nodes_rx, running),
    }
}
