//! Transient CSRF state store with TTL eviction.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

const DEFAULT_TTL_MINUTES: i64 = 10;

/// In-memory store for OAuth `state` values.
///
/// `GET /login` issues a value, the callback or `/exchange` consumes it
/// exactly once. Entries older than the TTL are evicted on every operation,
/// so abandoned logins do not accumulate.
pub struct StateStore {
    ttl: Duration,
    entries: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new(Duration::minutes(DEFAULT_TTL_MINUTES))
    }
}

impl StateStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Issue a fresh state value and remember when it was handed out.
    pub fn issue(&self) -> String {
        let state = Uuid::new_v4().simple().to_string();
        let mut entries = self.entries.lock().unwrap();
        let now = Utc::now();
        Self::purge(&mut entries, now, self.ttl);
        entries.insert(state.clone(), now);
        state
    }

    /// Consume a state value.
    ///
    /// Returns `true` only for a known, unexpired value; each value is good
    /// for exactly one consumption.
    pub fn consume(&self, state: &str) -> bool {
        let mut entries = self.entries.lock().unwrap();
        Self::purge(&mut entries, Utc::now(), self.ttl);
        entries.remove(state).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn purge(entries: &mut HashMap<String, DateTime<Utc>>, now: DateTime<Utc>, ttl: Duration) {
        entries.retain(|_, issued| now.signed_duration_since(*issued) < ttl);
    }
}
