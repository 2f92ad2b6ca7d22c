use std::path::Path;

use chrono::{DateTime, Utc};
use cockpit_core::config::{Config, Credentials};
use cockpit_core::store::KvStore;
use cockpit_core::Pipeline;

/// Shared handler state. Cheap to clone.
#[derive(Debug, Clone)]
pub struct AppState {
    pub pipeline: Pipeline,
    pub verify_token: Option<String>,
    /// When set, `POST /webhook` requires a valid `X-Hub-Signature-256`.
    pub app_secret: Option<String>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(pipeline: Pipeline) -> Self {
        let credentials = pipeline.credentials();
        let verify_token = credentials.whatsapp_verify_token.clone();
        let app_secret = credentials.whatsapp_app_secret.clone();
        Self {
            pipeline,
            verify_token,
            app_secret,
            started_at: Utc::now(),
        }
    }

    /// Config from `<root>/cockpit.yaml` plus the environment, secrets from
    /// the environment, store under `root`.
    pub fn from_root(root: &Path) -> anyhow::Result<Self> {
        let mut config = Config::load(root)?;
        config.apply_env();
        let credentials = Credentials::from_env();
        Self::open(root, config, credentials)
    }

    pub fn open(root: &Path, config: Config, credentials: Credentials) -> anyhow::Result<Self> {
        let mut warnings = config.validate();
        warnings.extend(credentials.validate(config.transcription.enabled));
        for warning in warnings {
            tracing::warn!(level = ?warning.level, "{}", warning.message);
        }
        let kv = KvStore::open(&config.db_path(root))?;
        let pipeline = Pipeline::new(config, credentials, kv)?;
        Ok(Self::new(pipeline))
    }
}
