//! Process-wide shared state: one DAO, one schema registry and JWT
//! verifier per context, and the loaded configuration set.
//!
//! Both the sync TCP listener and the admin HTTP router hold an `Arc` of
//! this, matching the concurrency model (§5): registries are read far more
//! than they're written, so each lives behind its own lock rather than one
//! coarse lock over everything.

use crate::config::ConfigStore;
use beehive_auth::{GoogleJwtVerifier, PasswordHasher, Sha256Hasher};
use beehive_core::{ContextId, SchemaRegistry};
use beehive_storage::Dao;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Everything a connection handler or admin route needs, scoped process-wide.
pub struct AppState {
    pub dao: Arc<dyn Dao>,
    pub hasher: Arc<dyn PasswordHasher>,
    pub configs: Arc<ConfigStore>,
    registries: RwLock<HashMap<ContextId, Arc<SchemaRegistry>>>,
    verifiers: RwLock<HashMap<ContextId, Arc<GoogleJwtVerifier>>>,
}

impl AppState {
    pub fn new(dao: Arc<dyn Dao>, configs: Arc<ConfigStore>) -> Self {
        Self {
            dao,
            hasher: Arc::new(Sha256Hasher),
            configs,
            registries: RwLock::new(HashMap::new()),
            verifiers: RwLock::new(HashMap::new()),
        }
    }

    /// The registry for a context, creating an empty one on first use.
    pub fn registry(&self, context: ContextId) -> Arc<SchemaRegistry> {
        if let Some(registry) = self.registries.read().get(&context) {
            return registry.clone();
        }
        let mut registries = self.registries.write();
        registries.entry(context).or_insert_with(|| Arc::new(SchemaRegistry::new())).clone()
    }

    /// The JWT verifier for a context, (re)built from the loaded config's
    /// current key set if not already cached.
    pub fn jwt_verifier(&self, context: ContextId) -> anyhow::Result<Arc<GoogleJwtVerifier>> {
        if let Some(verifier) = self.verifiers.read().get(&context) {
            return Ok(verifier.clone());
        }
        let config = self
            .configs
            .get(context)
            .ok_or_else(|| anyhow::anyhow!("no configuration loaded for context {context}"))?;
        let verifier = Arc::new(GoogleJwtVerifier::from_pem_keys(&config.jwt.google_keys)?);
        self.verifiers.write().insert(context, verifier.clone());
        Ok(verifier)
    }

    /// Drop a context's cached JWT verifier so the next lookup rebuilds it
    /// from the freshly reloaded config (paired with [`ConfigStore::reload_all`]).
    pub fn invalidate_jwt_verifier(&self, context: ContextId) {
        self.verifiers.write().remove(&context);
    }
}
