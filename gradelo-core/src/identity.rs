//! Client identity and default parameters

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::error::{TrackerError, TrackerResult};
use crate::store::KeyValueStore;
use crate::Params;

/// Generate a fresh opaque token (128 random bits, hyphenated UUID form).
///
/// Used for client ids, session tokens and pageview tokens.
pub fn generate_token() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Lazily created, persisted per-installation identifier
pub struct IdentityStore {
    store: Arc<dyn KeyValueStore>,
    key: String,
    cached: Mutex<Option<String>>,
}

impl IdentityStore {
    pub fn new(store: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
            cached: Mutex::new(None),
        }
    }

    /// Storage key the identifier lives under
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Return the client id, creating and persisting it on first use.
    ///
    /// Lookup, generation and persistence run under one lock, so concurrent
    /// first calls observe the same value. Storage failures are logged and
    /// swallowed: the id is still returned, it just may not survive a
    /// restart.
    pub fn client_id(&self) -> String {
        let mut cached = self.cached.lock();
        if let Some(id) = cached.as_ref() {
            return id.clone();
        }

        let persisted = match self.store.get(&self.key) {
            Ok(value) => value.filter(|v| !v.is_empty()),
            Err(e) => {
                warn!(backend = self.store.name(), error = %e, "failed to read client id");
                None
            }
        };

        let id = match persisted {
            Some(id) => {
                debug!(backend = self.store.name(), "loaded persisted client id");
                id
            }
            None => {
                let id = generate_token();
                match self.store.set(&self.key, &id) {
                    Ok(()) => debug!(backend = self.store.name(), "persisted new client id"),
                    Err(e) => warn!(
                        backend = self.store.name(),
                        error = %e,
                        "failed to persist client id; identity will not survive restart"
                    ),
                }
                id
            }
        };

        *cached = Some(id.clone());
        id
    }
}

/// Default parameters attached to every hit
#[derive(Debug, Default)]
pub struct ParameterStore {
    defaults: RwLock<Params>,
}

impl ParameterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the defaults wholesale. An empty map clears them.
    pub fn set_defaults(&self, params: Params) -> TrackerResult<()> {
        if params.keys().any(|k| k.is_empty()) {
            return Err(TrackerError::Config(
                "default parameter keys must not be empty".to_string(),
            ));
        }
        *self.defaults.write() = params;
        Ok(())
    }

    /// Snapshot of the current defaults
    pub fn defaults(&self) -> Params {
        self.defaults.read().clone()
    }

    /// Defaults overlaid by `call_site`; call-site values win on collision
    pub fn merge(&self, call_site: &Params) -> Params {
        let mut merged: Params = self.defaults.read().clone();
        merged.extend(call_site.iter().map(|(k, v)| (k.clone(), v.clone())));
        merged
    }
}

impl From<HashMap<String, String>> for ParameterStore {
    fn from(defaults: HashMap<String, String>) -> Self {
        Self {
            defaults: RwLock::new(defaults),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemoryStore, NullStore};

    struct FailingStore;

    impl KeyValueStore for FailingStore {
        fn get(&self, _key: &str) -> TrackerResult<Option<String>> {
            Err(TrackerError::Storage("read-only".to_string()))
        }

        fn set(&self, _key: &str, _value: &str) -> TrackerResult<()> {
            Err(TrackerError::Storage("read-only".to_string()))
        }

        fn name(&self) -> &'static str {
            "failing"
        }
    }

    #[test]
    fn test_client_id_is_stable() {
        let identity = IdentityStore::new(Arc::new(InMemoryStore::new()), "id");
        let first = identity.client_id();
        assert_eq!(first, identity.client_id());
        assert!(uuid::Uuid::parse_str(&first).is_ok());
    }

    #[test]
    fn test_client_id_persisted_across_instances() {
        let store: Arc<dyn KeyValueStore> = Arc::new(InMemoryStore::new());
        let first = IdentityStore::new(store.clone(), "id").client_id();

        assert_eq!(store.get("id").unwrap().as_deref(), Some(first.as_str()));
        let second = IdentityStore::new(store, "id").client_id();
        assert_eq!(first, second);
    }

    #[test]
    fn test_client_id_without_persistence() {
        // Still returns an id and keeps it for the process lifetime
        let failing = IdentityStore::new(Arc::new(FailingStore), "id");
        let id = failing.client_id();
        assert!(!id.is_empty());
        assert_eq!(id, failing.client_id());

        // A fresh instance cannot recover it
        let a = IdentityStore::new(Arc::new(NullStore::new()), "id").client_id();
        let b = IdentityStore::new(Arc::new(NullStore::new()), "id").client_id();
        assert_ne!(a, b);
    }

    #[test]
    fn test_concurrent_first_use_yields_one_id() {
        let identity = Arc::new(IdentityStore::new(Arc::new(InMemoryStore::new()), "id"));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let identity = identity.clone();
                std::thread::spawn(move || identity.client_id())
            })
            .collect();

        let ids: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(ids.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn test_set_defaults_replaces() {
        let params = ParameterStore::new();
        params
            .set_defaults(Params::from([("a".to_string(), "1".to_string())]))
            .unwrap();
        params
            .set_defaults(Params::from([("b".to_string(), "2".to_string())]))
            .unwrap();

        let defaults = params.defaults();
        assert!(!defaults.contains_key("a"));
        assert_eq!(defaults.get("b").map(String::as_str), Some("2"));

        params.set_defaults(Params::new()).unwrap();
        assert!(params.defaults().is_empty());
    }

    #[test]
    fn test_set_defaults_rejects_empty_key() {
        let params = ParameterStore::from(Params::from([("keep".to_string(), "me".to_string())]));
        let result = params.set_defaults(Params::from([(String::new(), "x".to_string())]));

        assert!(matches!(result, Err(TrackerError::Config(_))));
        // Rejected update leaves the previous defaults in place
        assert!(params.defaults().contains_key("keep"));
    }

    #[test]
    fn test_merge_call_site_wins() {
        let params = ParameterStore::from(Params::from([
            ("lang".to_string(), "de".to_string()),
            ("channel".to_string(), "app".to_string()),
        ]));
        let merged = params.merge(&Params::from([("lang".to_string(), "en".to_string())]));

        assert_eq!(merged.get("lang").map(String::as_str), Some("en"));
        assert_eq!(merged.get("channel").map(String::as_str), Some("app"));
    }
}
