use crate::error::{CockpitError, Result};
use crate::paths;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

impl ConfigWarning {
    fn warning(message: impl Into<String>) -> Self {
        Self {
            level: WarnLevel::Warning,
            message: message.into(),
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            level: WarnLevel::Error,
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// ServerConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

// ---------------------------------------------------------------------------
// ContentConfig
// ---------------------------------------------------------------------------

/// Where agent instructions and JSON config are fetched from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentConfig {
    pub github_username: String,
    pub github_repo: String,
    pub github_branch: String,
    /// Overrides the raw.githubusercontent.com URL derived from the fields above.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// How long a fetched agent file is reused. 0 disables the cache.
    pub agent_cache_ttl_secs: u64,
    pub timeout_secs: u64,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            github_username: "briandusape".to_string(),
            github_repo: "the-cockpit".to_string(),
            github_branch: "main".to_string(),
            base_url: None,
            agent_cache_ttl_secs: 300,
            timeout_secs: 10,
        }
    }
}

impl ContentConfig {
    pub fn raw_base_url(&self) -> String {
        match &self.base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!(
                "https://raw.githubusercontent.com/{}/{}/{}",
                self.github_username, self.github_repo, self.github_branch
            ),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// ---------------------------------------------------------------------------
// ClaudeConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClaudeConfig {
    pub model: String,
    pub max_tokens: u32,
    /// Budget for the short welcome reply to a bare `@agent`.
    pub greeting_max_tokens: u32,
    pub temperature: f32,
    pub base_url: String,
    pub api_version: String,
    pub timeout_secs: u64,
}

impl Default for ClaudeConfig {
    fn default() -> Self {
        Self {
            model: claude_agent::client::DEFAULT_MODEL.to_string(),
            max_tokens: claude_agent::client::DEFAULT_MAX_TOKENS,
            greeting_max_tokens: 1024,
            temperature: claude_agent::client::DEFAULT_TEMPERATURE,
            base_url: claude_agent::client::DEFAULT_BASE_URL.to_string(),
            api_version: claude_agent::client::DEFAULT_API_VERSION.to_string(),
            timeout_secs: 60,
        }
    }
}

impl ClaudeConfig {
    pub fn client_config(&self, api_key: &str) -> claude_agent::ClientConfig {
        let mut cfg = claude_agent::ClientConfig::new(api_key);
        cfg.base_url = self.base_url.clone();
        cfg.api_version = self.api_version.clone();
        cfg.model = self.model.clone();
        cfg.max_tokens = self.max_tokens;
        cfg.temperature = Some(self.temperature);
        cfg.timeout = Duration::from_secs(self.timeout_secs);
        cfg
    }
}

// ---------------------------------------------------------------------------
// WhatsAppConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WhatsAppConfig {
    pub api_version: String,
    pub graph_base_url: String,
    pub timeout_secs: u64,
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            api_version: "v17.0".to_string(),
            graph_base_url: "https://graph.facebook.com".to_string(),
            timeout_secs: 15,
        }
    }
}

// ---------------------------------------------------------------------------
// AuthConfig / MemoryConfig / PricingConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Admit everyone with role `default` when team access cannot be loaded.
    pub fail_open: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    pub max_entries: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self { max_entries: 10 }
    }
}

/// USD per million tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    pub input_per_mtok: f64,
    pub output_per_mtok: f64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            input_per_mtok: 3.0,
            output_per_mtok: 15.0,
        }
    }
}

impl PricingConfig {
    pub fn cost(&self, usage: &claude_agent::TokenUsage) -> f64 {
        usage.estimated_cost(self.input_per_mtok, self.output_per_mtok)
    }
}

// ---------------------------------------------------------------------------
// TranscriptionConfig / StoreConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionConfig {
    pub enabled: bool,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://api.openai.com".to_string(),
            model: "whisper-1".to_string(),
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(paths::DEFAULT_DB_FILE),
        }
    }
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub content: ContentConfig,
    pub claude: ClaudeConfig,
    pub whatsapp: WhatsAppConfig,
    pub auth: AuthConfig,
    pub memory: MemoryConfig,
    pub pricing: PricingConfig,
    pub transcription: TranscriptionConfig,
    pub store: StoreConfig,
}

impl Config {
    /// Load `<root>/cockpit.yaml`; a missing file yields the defaults.
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Ok(Config::default());
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let data = serde_yaml::to_string(self)?;
        std::fs::write(paths::config_path(root), data)?;
        Ok(())
    }

    /// Overlay the process environment onto the file config.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("GITHUB_USERNAME") {
            self.content.github_username = v;
        }
        if let Some(v) = get("GITHUB_REPO") {
            self.content.github_repo = v;
        }
        if let Some(v) = get("GITHUB_BRANCH") {
            self.content.github_branch = v;
        }
        if let Some(v) = get("CLAUDE_MODEL") {
            self.claude.model = v;
        }
        if let Some(v) = get("CLAUDE_MAX_TOKENS") {
            match v.parse() {
                Ok(n) => self.claude.max_tokens = n,
                Err(_) => tracing::warn!(value = %v, "ignoring unparsable CLAUDE_MAX_TOKENS"),
            }
        }
        if let Some(v) = get("CLAUDE_TEMPERATURE") {
            match v.parse() {
                Ok(t) => self.claude.temperature = t,
                Err(_) => tracing::warn!(value = %v, "ignoring unparsable CLAUDE_TEMPERATURE"),
            }
        }
        if let Some(v) = get("WHATSAPP_API_VERSION") {
            self.whatsapp.api_version = v;
        }
        if let Some(v) = get("COCKPIT_AUTH_FAIL_OPEN") {
            self.auth.fail_open = matches!(v.as_str(), "1" | "true" | "yes");
        }
    }

    pub fn db_path(&self, root: &Path) -> PathBuf {
        paths::db_path(root, &self.store.path)
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.memory.max_entries == 0 {
            warnings.push(ConfigWarning::error(
                "memory.max_entries is 0: conversations will have no context",
            ));
        } else if self.memory.max_entries % 2 != 0 {
            warnings.push(ConfigWarning::warning(format!(
                "memory.max_entries={} is odd: history is stored as user/assistant pairs",
                self.memory.max_entries
            )));
        }

        if !self.claude.model.contains("claude") {
            warnings.push(ConfigWarning::warning(format!(
                "claude.model '{}' does not look like a Claude model id",
                self.claude.model
            )));
        }
        if self.claude.max_tokens == 0 {
            warnings.push(ConfigWarning::error("claude.max_tokens must be greater than 0"));
        }
        if self.claude.greeting_max_tokens > self.claude.max_tokens {
            warnings.push(ConfigWarning::warning(format!(
                "claude.greeting_max_tokens ({}) exceeds claude.max_tokens ({})",
                self.claude.greeting_max_tokens, self.claude.max_tokens
            )));
        }
        if !(0.0..=1.0).contains(&self.claude.temperature) {
            warnings.push(ConfigWarning::error(format!(
                "claude.temperature={} is outside 0.0..=1.0",
                self.claude.temperature
            )));
        }

        for (name, secs) in [
            ("content.timeout_secs", self.content.timeout_secs),
            ("claude.timeout_secs", self.claude.timeout_secs),
            ("whatsapp.timeout_secs", self.whatsapp.timeout_secs),
            ("transcription.timeout_secs", self.transcription.timeout_secs),
        ] {
            if secs == 0 {
                warnings.push(ConfigWarning::error(format!("{name} must be greater than 0")));
            }
        }

        if self.pricing.input_per_mtok < 0.0 || self.pricing.output_per_mtok < 0.0 {
            warnings.push(ConfigWarning::error("pricing values must not be negative"));
        }

        if self.auth.fail_open {
            warnings.push(ConfigWarning::warning(
                "auth.fail_open is enabled: anyone can message the bot while team access is unreachable",
            ));
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// Secrets, read from the environment only.
#[derive(Clone, Default)]
pub struct Credentials {
    pub claude_api_key: Option<String>,
    pub whatsapp_token: Option<String>,
    pub whatsapp_phone_number_id: Option<String>,
    pub whatsapp_verify_token: Option<String>,
    pub whatsapp_app_secret: Option<String>,
    pub openai_api_key: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mask = |v: &Option<String>| if v.is_some() { "<set>" } else { "<unset>" };
        f.debug_struct("Credentials")
            .field("claude_api_key", &mask(&self.claude_api_key))
            .field("whatsapp_token", &mask(&self.whatsapp_token))
            .field("whatsapp_phone_number_id", &self.whatsapp_phone_number_id)
            .field("whatsapp_verify_token", &mask(&self.whatsapp_verify_token))
            .field("whatsapp_app_secret", &mask(&self.whatsapp_app_secret))
            .field("openai_api_key", &mask(&self.openai_api_key))
            .finish()
    }
}

impl Credentials {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            claude_api_key: get("CLAUDE_API_KEY"),
            whatsapp_token: get("WHATSAPP_TOKEN").or_else(|| get("WHATSAPP_ACCESS_TOKEN")),
            whatsapp_phone_number_id: get("WHATSAPP_PHONE_NUMBER_ID"),
            whatsapp_verify_token: get("WHATSAPP_VERIFY_TOKEN"),
            whatsapp_app_secret: get("WHATSAPP_APP_SECRET"),
            openai_api_key: get("OPENAI_API_KEY"),
        }
    }

    pub fn claude_api_key(&self) -> Result<&str> {
        self.claude_api_key
            .as_deref()
            .ok_or(CockpitError::ConfigurationMissing {
                setting: "Claude API key",
                env: "CLAUDE_API_KEY",
            })
    }

    pub fn whatsapp_token(&self) -> Result<&str> {
        self.whatsapp_token
            .as_deref()
            .ok_or(CockpitError::ConfigurationMissing {
                setting: "WhatsApp access token",
                env: "WHATSAPP_TOKEN",
            })
    }

    pub fn whatsapp_phone_number_id(&self) -> Result<&str> {
        self.whatsapp_phone_number_id
            .as_deref()
            .ok_or(CockpitError::ConfigurationMissing {
                setting: "WhatsApp phone number id",
                env: "WHATSAPP_PHONE_NUMBER_ID",
            })
    }

    pub fn openai_api_key(&self) -> Result<&str> {
        self.openai_api_key
            .as_deref()
            .ok_or(CockpitError::ConfigurationMissing {
                setting: "OpenAI API key",
                env: "OPENAI_API_KEY",
            })
    }

    /// Missing secrets, reported by `cockpit config check`.
    pub fn validate(&self, transcription_enabled: bool) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        let required = [
            ("CLAUDE_API_KEY", &self.claude_api_key),
            ("WHATSAPP_TOKEN", &self.whatsapp_token),
            ("WHATSAPP_PHONE_NUMBER_ID", &self.whatsapp_phone_number_id),
            ("WHATSAPP_VERIFY_TOKEN", &self.whatsapp_verify_token),
        ];
        for (env, value) in required {
            if value.is_none() {
                warnings.push(ConfigWarning::error(format!("{env} is not set")));
            }
        }
        if let Some(key) = &self.claude_api_key {
            if !key.starts_with("sk-ant-") {
                warnings.push(ConfigWarning::warning(
                    "CLAUDE_API_KEY does not start with 'sk-ant-'",
                ));
            }
        }
        if self.whatsapp_app_secret.is_none() {
            warnings.push(ConfigWarning::warning(
                "WHATSAPP_APP_SECRET is not set: webhook signatures will not be verified",
            ));
        }
        if transcription_enabled && self.openai_api_key.is_none() {
            warnings.push(ConfigWarning::warning(
                "OPENAI_API_KEY is not set: voice messages will be ignored",
            ));
        }
        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
