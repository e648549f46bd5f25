use std::time::{Duration, Instant};

/// Gates a single periodic action (hello, LSP, routing-info broadcast, expiry sweep)
/// to fire no more often than `interval`. Every timer in this system is purely
/// periodic; there is no triggered/hybrid mode to gate.
#[derive(Debug, Clone, Copy)]
pub struct PeriodicTimer {
    interval: Duration,
    last_fired: Option<Instant>,
}

impl PeriodicTimer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_fired: None,
        }
    }

    /// Returns true at most once per `interval`, and marks the firing when it does.
    pub fn due(&mut self, now: Instant) -> bool {
        match self.last_fired {
            Some(last) if now.duration_since(last) < self.interval => false,
            _ => {
                self.last_fired = Some(now);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_once_per_interval() {
        let mut timer = PeriodicTimer::new(Duration::from_secs(5));
        let t0 = Instant::now();
        assert!(timer.due(t0));
        assert!(!timer.due(t0 + Duration::from_secs(2)));
        assert!(timer.due(t0 + Duration::from_secs(6)));
    }
}
