//! Per-context configuration loading (§6.4, §6.6): one TOML file per
//! context, loaded at startup and reloadable on demand. Real `SIGHUP`
//! wiring is left to the operator's process supervisor — `reload_all`
//! models the effect a signal handler would trigger without this crate
//! owning process signal handling itself.

use beehive_core::{ContextId, RoleId};
use parking_lot::RwLock;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Accepted Google RSA public keys for JWT verification (§6.4
/// `jwt.google.keys`).
#[derive(Debug, Clone, Deserialize, Default)]
pub struct JwtConfig {
    #[serde(default)]
    pub google_keys: Vec<String>,
}

/// One context's on-disk configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ContextConfig {
    pub context: ContextId,
    pub default_role: RoleId,
    pub version: u32,
    pub edited: u32,
    #[serde(default)]
    pub jwt: JwtConfig,
    /// Whether this context is still in its pre-publish bootstrap phase
    /// (§3: `Context.bootstrap`). Carried but not interpreted — the admin
    /// surface is out of scope beyond exercising §6.3's contracts.
    #[serde(default)]
    pub bootstrap: bool,
    /// Admin-UI field descriptors keyed by entity kind (§3 "forms"),
    /// opaque to the core.
    #[serde(default)]
    pub forms: toml::value::Table,
}

fn parse_one(path: &Path) -> anyhow::Result<ContextConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("reading context config {}: {e}", path.display()))?;
    toml::from_str(&raw).map_err(|e| anyhow::anyhow!("parsing context config {}: {e}", path.display()))
}

fn load_dir(dir: &Path) -> anyhow::Result<HashMap<ContextId, ContextConfig>> {
    let mut configs = HashMap::new();
    for entry in std::fs::read_dir(dir).map_err(|e| anyhow::anyhow!("reading config dir {}: {e}", dir.display()))? {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("toml") {
            continue;
        }
        let config = parse_one(&path)?;
        configs.insert(config.context, config);
    }
    Ok(configs)
}

/// Holds every context's loaded configuration, swappable as a whole on
/// reload.
pub struct ConfigStore {
    dir: PathBuf,
    configs: RwLock<HashMap<ContextId, ContextConfig>>,
}

impl ConfigStore {
    /// Load every `*.toml` file under `dir` as one context's configuration.
    pub fn load(dir: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let dir = dir.into();
        let configs = load_dir(&dir)?;
        Ok(Self { dir, configs: RwLock::new(configs) })
    }

    /// Re-read every config file under the store's directory, replacing
    /// the held set atomically. Modeled for a `SIGHUP`-triggered reload.
    pub fn reload_all(&self) -> anyhow::Result<()> {
        let configs = load_dir(&self.dir)?;
        *self.configs.write() = configs;
        Ok(())
    }

    /// Look up one context's current configuration.
    pub fn get(&self, context: ContextId) -> Option<ContextConfig> {
        self.configs.read().get(&context).cloned()
    }

    /// Every currently loaded context id.
    pub fn contexts(&self) -> Vec<ContextId> {
        self.configs.read().keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_and_reloads_a_context_directory() {
        let dir = tempfile::tempdir().unwrap();
        let context = ContextId::new();
        let role = RoleId::new();
        let path = dir.path().join("acme.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        write!(
            file,
            "context = \"{context}\"\ndefault_role = \"{role}\"\nversion = 1\nedited = 1\nbootstrap = true\n"
        )
        .unwrap();

        let store = ConfigStore::load(dir.path()).unwrap();
        let loaded = store.get(context).unwrap();
        assert_eq!(loaded.version, 1);
        assert!(loaded.bootstrap);

        std::fs::remove_file(&path).unwrap();
        store.reload_all().unwrap();
        assert!(store.get(context).is_none());
    }
}
