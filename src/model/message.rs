use serde::{Deserialize, Serialize};

pub const BROADCAST: &str = "broadcast";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
    Flooding,
    Lsr,
    Dijkstra,
}

impl Protocol {
    pub fn from_str(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "flooding" => Some(Self::Flooding),
            "lsr" => Some(Self::Lsr),
            "dijkstra" => Some(Self::Dijkstra),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Flooding => "flooding",
            Self::Lsr => "lsr",
            Self::Dijkstra => "dijkstra",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Hello,
    Message,
    RoutingInfo,
    Lsp,
    DijkstraInfo,
    TopologyUpdate,
}

/// Wire-level record. One JSON value per TCP connection; see `crate::transport`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub proto: Protocol,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub from: String,
    pub to: String,
    pub ttl: i64,
    pub msg_id: String,
    pub original_sender: String,
    pub timestamp: f64,
    pub payload: serde_json::Value,
    #[serde(default)]
    pub headers: Vec<serde_json::Value>,
}

impl Message {
    pub fn encode(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn decode(raw: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn is_broadcast(&self) -> bool {
        self.to == BROADCAST
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_through_json() {
        let msg = Message {
            proto: Protocol::Flooding,
            kind: MessageKind::Message,
            from: "nodeA@localhost".into(),
            to: "nodeC@localhost".into(),
            ttl: 5,
            msg_id: "A-1000".into(),
            original_sender: "nodeA@localhost".into(),
            timestamp: 1.0,
            payload: serde_json::json!({"data": "hello"}),
            headers: Vec::new(),
        };
        let encoded = msg.encode().unwrap();
        let decoded = Message::decode(&encoded).unwrap();
        assert_eq!(decoded.msg_id, msg.msg_id);
        assert_eq!(decoded.payload["data"], "hello");
    }

    #[test]
    fn protocol_str_roundtrips() {
        assert_eq!(Protocol::from_str("LSR"), Some(Protocol::Lsr));
        assert_eq!(Protocol::from_str("bogus"), None);
        assert_eq!(Protocol::Dijkstra.as_str(), "dijkstra");
    }
}
