use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Sliding-window limit on reply posts per author (process local).
#[derive(Clone)]
pub struct ReplyRateLimiter {
    store: Arc<DashMap<String, VecDeque<Instant>>>,
    limit: usize,
    window: Duration,
}

impl ReplyRateLimiter {
    pub fn new(limit: usize, window: Duration) -> Self {
        Self { store: Arc::new(DashMap::new()), limit, window }
    }

    pub fn from_env() -> Self {
        let limit = std::env::var("RL_REPLY_LIMIT").ok().and_then(|v| v.parse().ok()).unwrap_or(10);
        let secs = std::env::var("RL_REPLY_WINDOW").ok().and_then(|v| v.parse().ok()).unwrap_or(60);
        Self::new(limit, Duration::from_secs(secs))
    }

    /// Records an attempt by `author_id`; false when over the limit.
    pub fn allow(&self, author_id: &str) -> bool {
        let now = Instant::now();
        let mut hits = self.store.entry(author_id.to_string()).or_default();
        while hits.front().is_some_and(|t| now.duration_since(*t) >= self.window) {
            hits.pop_front();
        }
        if hits.len() >= self.limit {
            return false;
        }
        hits.push_back(now);
        true
    }
}
