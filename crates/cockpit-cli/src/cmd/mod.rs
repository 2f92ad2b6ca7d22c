pub mod agents;
pub mod config;
pub mod memory;
pub mod route;
pub mod serve;
pub mod usage;

use std::path::Path;

use anyhow::Context;
use cockpit_core::config::Config;
use cockpit_core::store::KvStore;

/// Config plus environment overrides, and the store it points at.
pub(crate) fn open_store(root: &Path) -> anyhow::Result<(Config, KvStore)> {
    let mut config = Config::load(root).context("failed to load cockpit.yaml")?;
    config.apply_env();
    let db = config.db_path(root);
    let kv = KvStore::open(&db).with_context(|| format!("failed to open store at {}", db.display()))?;
    Ok((config, kv))
}
