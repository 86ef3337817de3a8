use bytes::Bytes;
use std::collections::HashMap;
use std::ops::Deref;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::time::{Duration, Instant};

/// The Store is responsible for managing key-value pairs, with an optional expiration deadline
/// for each key. Expiration is lazy: an expired key is only removed the next time it is accessed.
/// The store is designed to be thread-safe, allowing it to be shared and cloned cheaply using
/// reference counting.
#[derive(Clone)]
pub struct Store {
    inner: Arc<InnerStore>,
}

impl Store {
    pub fn new() -> Store {
        let state = State {
            keys: HashMap::new(),
        };

        let inner = Arc::new(InnerStore {
            state: Mutex::new(state),
        });

        Self { inner }
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

pub struct InnerStore {
    state: Mutex<State>,
}

/// Exclusive view of the store. Every operation on it runs under the same lock, so a read that
/// finds an expired entry also removes it before any other session can observe it.
pub struct InnerStoreLocked<'a> {
    state: MutexGuard<'a, State>,
}

impl<'a> InnerStoreLocked<'a> {
    /// Returns the value of `key`, or `None` if it was never set or its deadline has passed.
    pub fn get(&mut self, key: &[u8]) -> Option<Bytes> {
        let now = Instant::now();

        let value = self.state.keys.get(key)?;
        if value.is_expired(now) {
            self.state.keys.remove(key);
            return None;
        }

        Some(value.data.clone())
    }

    /// Inserts or replaces `key`. Any deadline previously attached to the key is dropped.
    pub fn set(&mut self, key: Bytes, data: Bytes) {
        let value = Value {
            data,
            expires_at: None,
        };
        self.state.keys.insert(key, value);
    }

    /// Makes `key` expire `ttl` from now. Keys that do not exist, including ones that already
    /// expired, are left untouched and `false` is returned.
    pub fn set_expiry(&mut self, key: &[u8], ttl: Duration) -> bool {
        let now = Instant::now();

        let Some(value) = self.state.keys.get_mut(key) else {
            return false;
        };
        if value.is_expired(now) {
            self.state.keys.remove(key);
            return false;
        }

        value.expires_at = Some(now + ttl);
        true
    }

    /// Number of entries physically held, expired ones that were not touched yet included.
    pub fn len(&self) -> usize {
        self.state.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.keys.is_empty()
    }
}

impl Deref for Store {
    type Target = InnerStore;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl InnerStore {
    pub fn lock(&self) -> InnerStoreLocked<'_> {
        // Operations never panic halfway through a mutation, so the state behind a poisoned lock
        // is still consistent.
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        InnerStoreLocked { state }
    }
}

type Key = Bytes;

pub struct Value {
    pub data: Bytes,
    pub expires_at: Option<Instant>,
}

impl Value {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }
}

struct State {
    keys: HashMap<Key, Value>,
}
