use std::collections::BTreeMap;

pub const BASE_PORT: u16 = 5000;

/// `port = base_port + (identifier[0] - 'A')`.
pub fn canonical_port(identifier: &str) -> anyhow::Result<u16> {
    let first = identifier
        .chars()
        .next()
        .ok_or_else(|| anyhow::anyhow!("empty node identifier"))?;
    if !first.is_ascii_uppercase() {
        anyhow::bail!("node identifier must start with an uppercase letter, got {first:?}");
    }
    Ok(BASE_PORT + (first as u16 - 'A' as u16))
}

/// Bidirectional identifier <-> logical-address resolver, backed by the names file
/// (`data/id_nodos.txt`) with a `<id>@<host>` fallback when an identifier has no entry.
#[derive(Debug, Clone, Default)]
pub struct IdentityResolver {
    id_to_address: BTreeMap<String, String>,
    address_to_id: BTreeMap<String, String>,
}

impl IdentityResolver {
    pub fn new(names: BTreeMap<String, String>) -> Self {
        let address_to_id = names
            .iter()
            .map(|(id, addr)| (addr.clone(), id.clone()))
            .collect();
        Self {
            id_to_address: names,
            address_to_id,
        }
    }

    pub fn address_of(&self, id: &str) -> String {
        self.id_to_address
            .get(id)
            .cloned()
            .unwrap_or_else(|| default_address(id))
    }

    /// Resolves a logical address back to a short identifier, falling back to parsing
    /// `<id>@<host>` when the names file has no matching entry.
    pub fn identifier_of(&self, address: &str) -> Option<String> {
        if let Some(id) = self.address_to_id.get(address) {
            return Some(id.clone());
        }
        parse_fallback(address)
    }
}

fn default_address(id: &str) -> String {
    format!("node{id}@localhost")
}

/// Parses `node<ID>@<host>` (or bare `<ID>@<host>`) back into `<ID>`.
fn parse_fallback(address: &str) -> Option<String> {
    let (user, _host) = address.split_once('@')?;
    let id = user.strip_prefix("node").unwrap_or(user);
    if id.is_empty() {
        return None;
    }
    Some(id.to_ascii_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_port_offsets_from_base() {
        assert_eq!(canonical_port("A").unwrap(), 5000);
        assert_eq!(canonical_port("D").unwrap(), 5003);
        assert!(canonical_port("").is_err());
    }

    #[test]
    fn resolver_falls_back_to_address_parsing() {
        let resolver = IdentityResolver::new(BTreeMap::from([(
            "A".to_string(),
            "nodeA@localhost".to_string(),
        )]));
        assert_eq!(resolver.address_of("A"), "nodeA@localhost");
        assert_eq!(resolver.address_of("Z"), "nodeZ@localhost");
        assert_eq!(resolver.identifier_of("nodeA@localhost").as_deref(), Some("A"));
        assert_eq!(resolver.identifier_of("nodeZ@localhost").as_deref(), Some("Z"));
        assert_eq!(resolver.identifier_of("not-an-address"), None);
    }
}
