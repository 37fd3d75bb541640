use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;

use super::{Decision, RateLimitError, RateLimitStore, WindowPolicy};
use crate::utils::unix_now;

const MIN_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// In-process ledger. Timestamps per client are kept in arrival order, so the
/// front of each deque is always the oldest call.
pub struct MemoryStore {
    policy: WindowPolicy,
    ledger: Mutex<HashMap<String, VecDeque<f64>>>,
}

impl MemoryStore {
    pub fn new(policy: WindowPolicy) -> Self {
        Self {
            policy,
            ledger: Mutex::new(HashMap::new()),
        }
    }

    pub fn policy(&self) -> WindowPolicy {
        self.policy
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, VecDeque<f64>>> {
        // The ledger stays consistent even if a holder panicked mid-check.
        self.ledger.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn check_at(&self, client: &str, now: f64) -> Decision {
        let cutoff = self.policy.cutoff(now);
        let mut ledger = self.lock();
        let calls = ledger.entry(client.to_string()).or_default();

        while calls.front().is_some_and(|&t| t <= cutoff) {
            calls.pop_front();
        }

        if calls.len() >= self.policy.max_calls {
            let oldest = calls.front().copied().unwrap_or(now);
            return Decision::Limited {
                retry_after: oldest + self.policy.window_secs - now,
            };
        }

        calls.push_back(now);
        Decision::Allowed
    }

    /// Drops clients with no call inside the window. Returns how many were removed.
    pub fn sweep(&self, now: f64) -> usize {
        let cutoff = self.policy.cutoff(now);
        let mut ledger = self.lock();
        let before = ledger.len();
        ledger.retain(|_, calls| calls.back().is_some_and(|&t| t > cutoff));
        before - ledger.len()
    }

    pub fn tracked_clients(&self) -> usize {
        self.lock().len()
    }

    pub fn spawn_sweeper(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every.max(MIN_SWEEP_INTERVAL));
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = store.sweep(unix_now());
                if removed > 0 {
                    tracing::debug!(removed, "swept idle rate-limit clients");
                }
            }
        })
    }
}

#[async_trait]
impl RateLimitStore for MemoryStore {
    async fn check(&self, client: &str, now: f64) -> Result<Decision, RateLimitError> {
        Ok(self.check_at(client, now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> MemoryStore {
        MemoryStore::new(WindowPolicy::default())
    }

    fn fill(store: &MemoryStore, client: &str, start: f64) {
        for i in 0..60 {
            let now = start + i as f64 * (1.0 / 60.0);
            assert!(store.check_at(client, now).is_allowed());
        }
    }

    #[test]
    fn rejects_after_sixty_calls_in_one_second() {
        let store = store();
        fill(&store, "10.0.0.1", 1000.0);

        match store.check_at("10.0.0.1", 1001.0) {
            Decision::Limited { retry_after } => {
                assert!(retry_after > 0.0);
                assert!((retry_after - 59.0).abs() < 1e-6);
            }
            Decision::Allowed => panic!("61st call must be rejected"),
        }
    }

    #[test]
    fn admits_once_oldest_call_leaves_window() {
        let store = store();
        fill(&store, "10.0.0.1", 1000.0);

        assert!(store.check_at("10.0.0.1", 1060.0).is_allowed());
    }

    #[test]
    fn rejected_calls_are_not_recorded() {
        let store = MemoryStore::new(WindowPolicy {
            max_calls: 1,
            window_secs: 60.0,
        });
        assert!(store.check_at("a", 0.0).is_allowed());
        assert!(!store.check_at("a", 10.0).is_allowed());
        assert!(!store.check_at("a", 20.0).is_allowed());
        // only the call at t=0 is in the ledger, so t=60 is admitted
        assert!(store.check_at("a", 60.0).is_allowed());
    }

    #[test]
    fn clients_are_counted_separately() {
        let store = store();
        fill(&store, "a", 0.0);
        assert!(!store.check_at("a", 1.0).is_allowed());
        assert!(store.check_at("b", 1.0).is_allowed());
    }

    #[test]
    fn sweep_forgets_idle_clients() {
        let store = store();
        store.check_at("idle", 0.0);
        store.check_at("busy", 100.0);

        assert_eq!(store.sweep(120.0), 1);
        assert_eq!(store.tracked_clients(), 1);
    }

    #[tokio::test]
    async fn sweeper_survives_zero_interval() {
        let store = Arc::new(store());
        let handle = store.spawn_sweeper(Duration::ZERO);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!handle.is_finished());
        handle.abort();
    }
}
