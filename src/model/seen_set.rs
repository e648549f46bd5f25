use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Age-evicting set of identifiers already handled, used for the flooding message
/// seen-set and the LSR LSP `(origin, sequence)` history.
///
/// Keeps a per-entry insertion timestamp and evicts individually past `retention`,
/// checked opportunistically on each insert.
#[derive(Debug)]
pub struct SeenSet {
    retention: Duration,
    entries: HashMap<String, Instant>,
}

impl SeenSet {
    pub fn new(retention: Duration) -> Self {
        Self {
            retention,
            entries: HashMap::new(),
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Inserts `id` and opportunistically evicts anything older than `retention`.
    /// Returns true if `id` was newly inserted (false if it was already present).
    pub fn insert(&mut self, id: String, now: Instant) -> bool {
        self.evict(now);
        self.entries.insert(id, now).is_none()
    }

    fn evict(&mut self, now: Instant) {
        self.entries
            .retain(|_, inserted_at| now.duration_since(*inserted_at) <= self.retention);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_reports_novelty_and_evicts_by_age() {
        let mut seen = SeenSet::new(Duration::from_secs(300));
        let t0 = Instant::now();
        assert!(seen.insert("A-1".to_string(), t0));
        assert!(!seen.insert("A-1".to_string(), t0));

        let later = t0 + Duration::from_secs(301);
        assert!(seen.insert("B-1".to_string(), later));
        assert!(!seen.contains("A-1"));
    }
}
