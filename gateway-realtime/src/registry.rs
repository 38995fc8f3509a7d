//! Session table with global and per-key concurrency caps (`§2` component J).

use crate::session::SessionId;
use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Tracks which key id owns each live session and enforces the global
/// and per-key caps from `§4.1` "Accept".
pub struct SessionRegistry {
    sessions: DashMap<SessionId, String>,
    per_key_counts: DashMap<String, usize>,
    global_count: AtomicUsize,
    global_max: usize,
    per_key_max: usize,
}

impl SessionRegistry {
    pub fn new(global_max: usize, per_key_max: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            per_key_counts: DashMap::new(),
            global_count: AtomicUsize::new(0),
            global_max,
            per_key_max,
        }
    }

    /// Attempt to admit a new session for `key_id`. Returns `false` (and
    /// admits nothing) if either cap would be exceeded.
    pub fn try_admit(&self, id: SessionId, key_id: &str) -> bool {
        if self.global_count.load(Ordering::SeqCst) >= self.global_max {
            return false;
        }
        let mut per_key = self.per_key_counts.entry(key_id.to_string()).or_insert(0);
        if *per_key >= self.per_key_max {
            return false;
        }
        *per_key += 1;
        drop(per_key);
        self.global_count.fetch_add(1, Ordering::SeqCst);
        self.sessions.insert(id, key_id.to_string());
        true
    }

    pub fn remove(&self, id: SessionId) {
        if let Some((_, key_id)) = self.sessions.remove(&id) {
            self.global_count.fetch_sub(1, Ordering::SeqCst);
            if let Some(mut count) = self.per_key_counts.get_mut(&key_id) {
                *count = count.saturating_sub(1);
            }
        }
    }

    pub fn global_count(&self) -> usize {
        self.global_count.load(Ordering::SeqCst)
    }

    pub fn key_count(&self, key_id: &str) -> usize {
        self.per_key_counts.get(key_id).map(|c| *c).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_cap_rejects_once_full() {
        let registry = SessionRegistry::new(1, 10);
        assert!(registry.try_admit(SessionId::new(), "k1"));
        assert!(!registry.try_admit(SessionId::new(), "k2"));
    }

    #[test]
    fn per_key_cap_rejects_independent_of_global() {
        let registry = SessionRegistry::new(10, 1);
        assert!(registry.try_admit(SessionId::new(), "k1"));
        assert!(!registry.try_admit(SessionId::new(), "k1"));
        assert!(registry.try_admit(SessionId::new(), "k2"), "a different key still has headroom");
    }

    #[test]
    fn removal_frees_both_caps() {
        let registry = SessionRegistry::new(1, 1);
        let id = SessionId::new();
        registry.try_admit(id, "k1");
        registry.remove(id);
        assert_eq!(registry.global_count(), 0);
        assert_eq!(registry.key_count("k1"), 0);
        assert!(registry.try_admit(SessionId::new(), "k1"));
    }
}
