use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use clap::Parser;
use serde::Deserialize;

use crate::model::message::Protocol;

#[derive(Debug, Parser)]
#[command(name = "overlayd")]
#[command(about = "Overlay-network routing node: flooding, link-state, or distributed-Dijkstra")]
pub struct Args {
    /// Short symbolic node identifier, e.g. "A".
    pub node_id: String,

    /// Routing strategy: flooding, lsr, or dijkstra.
    #[arg(default_value = "flooding")]
    pub algorithm: String,

    /// Directory containing topo.txt / id_nodos.txt.
    #[arg(long, default_value = "data")]
    pub config_dir: PathBuf,

    /// Directory for per-node log files.
    #[arg(long, default_value = "logs")]
    pub log_dir: PathBuf,
}

impl Args {
    pub fn parsed_algorithm(&self) -> anyhow::Result<Protocol> {
        Protocol::from_str(&self.algorithm)
            .ok_or_else(|| anyhow::anyhow!("unknown algorithm {:?}; expected one of flooding, lsr, dijkstra", self.algorithm))
    }

    pub fn parsed_node_id(&self) -> anyhow::Result<String> {
        if self.node_id.is_empty() || !self.node_id.chars().all(|c| c.is_ascii_alphabetic()) {
            anyhow::bail!("node_id must be one or more letters, got {:?}", self.node_id);
        }
        Ok(self.node_id.to_ascii_uppercase())
    }
}

#[derive(Debug, Deserialize)]
struct TopoFile {
    #[serde(default)]
    config: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct NamesFile {
    #[serde(default)]
    config: BTreeMap<String, String>,
}

/// Loads `data/topo.txt`'s `{id: [neighbor_id, ...]}` mapping. Any I/O or parse error
/// (missing file, malformed JSON) yields an empty configuration, matching
/// `RedConfig.load_topology`'s tolerant `except: return {}`.
pub fn load_topology(path: &Path) -> BTreeMap<String, Vec<String>> {
    load_tolerant::<TopoFile>(path)
        .map(|file| file.config)
        .unwrap_or_default()
}

/// Loads `data/id_nodos.txt`'s `{id: "node<id>@host"}` mapping. Missing file yields an
/// empty map; callers fall back to the default `<id>@localhost` per-identifier (see
/// `model::identity::IdentityResolver`).
pub fn load_names(path: &Path) -> BTreeMap<String, String> {
    load_tolerant::<NamesFile>(path)
        .map(|file| file.config)
        .unwrap_or_default()
}

fn load_tolerant<T: for<'de> Deserialize<'de>>(path: &Path) -> Option<T> {
    let raw = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&raw).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_topology_file_yields_empty_config() {
        let topo = load_topology(Path::new("/nonexistent/topo.txt"));
        assert!(topo.is_empty());
    }

    #[test]
    fn loads_well_formed_topology() {
        let file = tempfile_with(r#"{"type": "topo", "config": {"A": ["B"], "B": ["A"]}}"#);
        let topo = load_topology(file.path());
        assert_eq!(topo.get("A"), Some(&vec!["B".to_string()]));
    }

    #[test]
    fn malformed_topology_yields_empty_config() {
        let file = tempfile_with("not json at all");
        assert!(load_topology(file.path()).is_empty());
    }

    fn tempfile_with(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new();
        file.write(contents);
        file
    }

    struct NamedTempFile {
        path: PathBuf,
    }

    impl NamedTempFile {
        fn new() -> Self {
            let mut path = std::env::temp_dir();
            path.push(format!("overlayd-test-{}.json", std::process::id()));
            Self { path }
        }

        fn write(&mut self, contents: &str) {
            std::fs::write(&self.path, contents).expect("write temp config");
        }

        fn path(&self) -> &Path {
            &self.path
        }
    }

    impl Drop for NamedTempFile {
        fn drop(&mut self) {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}
