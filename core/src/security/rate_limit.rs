use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::Serialize;

const DEFAULT_CLEANUP_THRESHOLD: usize = 10_000;

#[derive(Debug, Clone)]
struct AttemptWindow {
    attempts: VecDeque<Instant>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitDecision {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wait_time: Option<Duration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl RateLimitDecision {
    fn allowed() -> Self {
        Self {
            allowed: true,
            wait_time: None,
            message: None,
        }
    }

    fn denied(wait_time: Duration) -> Self {
        let minutes = wait_time.as_secs().div_ceil(60).max(1);
        Self {
            allowed: false,
            wait_time: Some(wait_time),
            message: Some(format!(
                "Muitas tentativas. Tente novamente em {} minuto(s).",
                minutes
            )),
        }
    }

    pub fn wait_millis(&self) -> u64 {
        self.wait_time
            .map(|wait| u64::try_from(wait.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or(0)
    }
}

/// Sliding-window attempt tracker keyed by `(identity, action)`.
///
/// Only failed attempts accumulate; a recorded success clears the key.
#[derive(Debug)]
pub struct RateLimiter {
    store: Mutex<HashMap<String, AttemptWindow>>,
    cleanup_threshold: usize,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_CLEANUP_THRESHOLD)
    }
}

impl RateLimiter {
    pub fn new(cleanup_threshold: usize) -> Self {
        Self {
            store: Mutex::new(HashMap::new()),
            cleanup_threshold: cleanup_threshold.max(1),
        }
    }

    pub fn check(
        &self,
        identity: &str,
        action: &str,
        max_attempts: u32,
        window: Duration,
    ) -> RateLimitDecision {
        self.check_at(identity, action, max_attempts, window, Instant::now())
    }

    pub fn check_at(
        &self,
        identity: &str,
        action: &str,
        max_attempts: u32,
        window: Duration,
        now: Instant,
    ) -> RateLimitDecision {
        let key = rate_limit_key(identity, action);
        let max_attempts = max_attempts.max(1) as usize;
        let mut store = self.store.lock().unwrap_or_else(|e| e.into_inner());

        if store.len() > self.cleanup_threshold {
            store.retain(|_, entry| {
                prune_expired_attempts(entry, now, window);
                !entry.attempts.is_empty()
            });
        }

        let (attempts, oldest) = match store.get_mut(&key) {
            Some(entry) => {
                prune_expired_attempts(entry, now, window);
                (entry.attempts.len(), entry.attempts.front().copied())
            }
            None => (0, None),
        };
        decide(attempts, max_attempts, oldest, now, window)
    }

    pub fn record_attempt(&self, identity: &str, action: &str, success: bool) {
        self.record_attempt_at(identity, action, success, Instant::now());
    }

    pub fn record_attempt_at(&self, identity: &str, action: &str, success: bool, now: Instant) {
        let key = rate_limit_key(identity, action);
        let mut store = self.store.lock().unwrap_or_else(|e| e.into_inner());

        if success {
            store.remove(&key);
            return;
        }

        store
            .entry(key)
            .or_insert_with(|| AttemptWindow {
                attempts: VecDeque::new(),
            })
            .attempts
            .push_back(now);
    }

    /// Number of attempts currently held for a key, expired ones included.
    pub fn attempts(&self, identity: &str, action: &str) -> usize {
        let store = self.store.lock().unwrap_or_else(|e| e.into_inner());
        store
            .get(&rate_limit_key(identity, action))
            .map(|entry| entry.attempts.len())
            .unwrap_or(0)
    }

    pub fn tracked_keys(&self) -> usize {
        self.store.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn clear(&self) {
        self.store
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}

fn decide(
    attempts: usize,
    max_attempts: usize,
    oldest: Option<Instant>,
    now: Instant,
    window: Duration,
) -> RateLimitDecision {
    if attempts < max_attempts {
        return RateLimitDecision::allowed();
    }
    let wait_time = oldest
        .map(|oldest| window.saturating_sub(now.duration_since(oldest)))
        .unwrap_or(window)
        .max(Duration::from_millis(1));
    RateLimitDecision::denied(wait_time)
}

fn rate_limit_key(identity: &str, action: &str) -> String {
    format!("{}:{}", identity.trim().to_lowercase(), action)
}

fn prune_expired_attempts(entry: &mut AttemptWindow, now: Instant, window: Duration) {
    while let Some(oldest) = entry.attempts.front() {
        if now.duration_since(*oldest) >= window {
            entry.attempts.pop_front();
        } else {
            break;
        }
    }
}
