//! Application state shared across handlers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::OwnedMutexGuard;
use uuid::Uuid;

use crate::acl::AccessPolicy;
use crate::config::CartApiConfig;
use crate::engine::CommerceEngine;
use crate::projection::Interceptors;
use crate::sync::QuoteSynchronizer;

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: CartApiConfig,
    engine: Arc<dyn CommerceEngine>,
    policy: Arc<dyn AccessPolicy>,
    interceptors: Interceptors,
    /// Per-session write locks. None of the quote invariants are safe under
    /// concurrent mutation, so every cart handler serializes on its
    /// session's lock before touching the quote.
    session_locks: Mutex<HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>>,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(
        config: CartApiConfig,
        engine: Arc<dyn CommerceEngine>,
        policy: Arc<dyn AccessPolicy>,
        interceptors: Interceptors,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                engine,
                policy,
                interceptors,
                session_locks: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Get a reference to the configuration.
    #[must_use]
    pub fn config(&self) -> &CartApiConfig {
        &self.inner.config
    }

    /// Get a reference to the Commerce Engine.
    #[must_use]
    pub fn engine(&self) -> &dyn CommerceEngine {
        self.inner.engine.as_ref()
    }

    /// Get a reference to the access policy.
    #[must_use]
    pub fn policy(&self) -> &dyn AccessPolicy {
        self.inner.policy.as_ref()
    }

    /// Get a reference to the registered interceptors.
    #[must_use]
    pub fn interceptors(&self) -> &Interceptors {
        &self.inner.interceptors
    }

    /// Quote synchronizer bound to this state's engine.
    #[must_use]
    pub fn synchronizer(&self) -> QuoteSynchronizer {
        QuoteSynchronizer::new(Arc::clone(&self.inner.engine))
    }

    /// Acquire the write lock for a session's quote.
    ///
    /// Handlers hold the guard for the whole load-mutate-commit span.
    pub async fn lock_session(&self, key: Uuid) -> OwnedMutexGuard<()> {
        let lock = {
            #[allow(clippy::unwrap_used)]
            // Poisoning requires a panic while holding the map lock; the
            // map operations below cannot panic.
            let mut locks = self.inner.session_locks.lock().unwrap();
            Arc::clone(locks.entry(key).or_default())
        };
        lock.lock_owned().await
    }
}
