//! In-process key store (`§3`, `§4.4`).

use dashmap::DashMap;
use gateway_core::{KeyInfo, KeyKind};

/// Resolves a raw credential string to a [`KeyInfo`].
///
/// Gateway-issued keys are registered up front (from config/env);
/// client-supplied provider keys are recognized by prefix and given a
/// [`KeyInfo`] the first time they're seen, then reused for subsequent
/// requests on the same process.
#[derive(Default)]
pub struct KeyStore {
    keys: DashMap<String, KeyInfo>,
}

impl KeyStore {
    pub fn new() -> Self {
        Self { keys: DashMap::new() }
    }

    /// Register a gateway-issued key, keyed by the raw credential string
    /// clients present.
    pub fn register(&self, credential: impl Into<String>, info: KeyInfo) {
        self.keys.insert(credential.into(), info);
    }

    /// Resolve `credential` to a [`KeyInfo`], registering a client-kind
    /// entry on first sight if it matches a recognized provider-key
    /// prefix.
    pub fn resolve(&self, credential: &str) -> Option<KeyInfo> {
        if let Some(existing) = self.keys.get(credential) {
            return Some(existing.clone());
        }
        let provider = crate::credential::recognize_provider_key(credential)?;
        let info = KeyInfo::client_provider_key(credential.to_string(), provider);
        self.keys.insert(credential.to_string(), info.clone());
        Some(info)
    }

    pub fn disable(&self, credential: &str) {
        if let Some(mut entry) = self.keys.get_mut(credential) {
            entry.enabled = false;
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn gateway_key_count(&self) -> usize {
        self.keys.iter().filter(|e| e.kind == KeyKind::Gateway).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registered_key_resolves_back() {
        let store = KeyStore::new();
        store.register("gw_live_abc", KeyInfo::gateway("k1", "primary"));
        let resolved = store.resolve("gw_live_abc").unwrap();
        assert_eq!(resolved.id, "k1");
    }

    #[test]
    fn unrecognized_credential_with_no_prefix_match_is_none() {
        let store = KeyStore::new();
        assert!(store.resolve("not-a-key").is_none());
    }

    #[test]
    fn client_provider_key_is_registered_on_first_sight() {
        let store = KeyStore::new();
        let first = store.resolve("sk-abc123").unwrap();
        assert_eq!(first.kind, KeyKind::Client);
        assert_eq!(store.len(), 1);
        let second = store.resolve("sk-abc123").unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(store.len(), 1, "second resolve reuses the same entry");
    }
}
