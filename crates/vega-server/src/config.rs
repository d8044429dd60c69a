use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use vega_ai::OpenAiCompatConfig;
use vega_notify::channels::SmtpSettings;
use vega_notify::DispatcherSettings;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    /// Locale for report titles, prompts and alert headers.
    #[serde(default = "default_locale")]
    pub locale: String,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub ai: AiConfig,
    /// Absent means the email channel is never configured.
    #[serde(default)]
    pub smtp: Option<SmtpConfig>,
    #[serde(default)]
    pub notify: NotifyConfig,
    #[serde(default)]
    pub report_scheduler: ReportSchedulerConfig,
}

impl ServerConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }
}

fn default_locale() -> String {
    vega_common::i18n::DEFAULT_LOCALE.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_http_port")]
    pub port: u16,
    /// Empty allows every origin.
    #[serde(default)]
    pub cors_allowed_origins: Vec<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            port: default_http_port(),
            cors_allowed_origins: Vec::new(),
        }
    }
}

fn default_http_port() -> u16 {
    8080
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> String {
    "data/vega.db".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub jwt_secret: Option<String>,
    #[serde(default = "default_token_expire_secs")]
    pub token_expire_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            token_expire_secs: default_token_expire_secs(),
        }
    }
}

fn default_token_expire_secs() -> u64 {
    86400
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,
    /// Per-route request ceilings keyed by route pattern, e.g.
    /// `"/v1/reports/run" = 5`.
    #[serde(default)]
    pub routes: HashMap<String, u32>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_requests: default_max_requests(),
            window_ms: default_window_ms(),
            routes: HashMap::new(),
        }
    }
}

impl RateLimitConfig {
    pub fn max_for(&self, route: &str) -> u32 {
        self.routes.get(route).copied().unwrap_or(self.max_requests)
    }
}

fn default_true() -> bool {
    true
}

fn default_max_requests() -> u32 {
    60
}

fn default_window_ms() -> u64 {
    60_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    /// Empty disables report generation and semantic rule evaluation.
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_ai_base_url")]
    pub base_url: String,
    #[serde(default = "default_ai_model")]
    pub model: String,
    #[serde(default = "default_ai_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub max_tokens: Option<usize>,
    #[serde(default)]
    pub temperature: Option<f32>,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_ai_base_url(),
            model: default_ai_model(),
            timeout_secs: default_ai_timeout_secs(),
            max_tokens: None,
            temperature: None,
        }
    }
}

impl AiConfig {
    pub fn is_configured(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    pub fn to_provider_config(&self, locale: &str) -> OpenAiCompatConfig {
        OpenAiCompatConfig {
            api_key: self.api_key.clone(),
            base_url: self.base_url.clone(),
            model: self.model.clone(),
            timeout_secs: self.timeout_secs,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            locale: locale.to_string(),
        }
    }
}

fn default_ai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_ai_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_ai_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    pub from: String,
    #[serde(default = "default_true")]
    pub tls: bool,
    #[serde(default = "default_smtp_timeout_secs")]
    pub timeout_secs: u64,
}

impl SmtpConfig {
    pub fn to_settings(&self) -> SmtpSettings {
        SmtpSettings {
            host: self.host.clone(),
            port: self.port,
            username: self.username.clone(),
            password: self.password.clone(),
            from: self.from.clone(),
            tls: self.tls,
            timeout_secs: self.timeout_secs,
        }
    }
}

fn default_smtp_port() -> u16 {
    587
}

fn default_smtp_timeout_secs() -> u64 {
    15
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    #[serde(default = "default_telegram_api_base")]
    pub telegram_api_base: String,
    #[serde(default = "default_slack_api_base")]
    pub slack_api_base: String,
    #[serde(default = "default_notify_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            telegram_api_base: default_telegram_api_base(),
            slack_api_base: default_slack_api_base(),
            timeout_secs: default_notify_timeout_secs(),
        }
    }
}

impl NotifyConfig {
    pub fn to_settings(&self) -> DispatcherSettings {
        DispatcherSettings {
            telegram_api_base: self.telegram_api_base.clone(),
            slack_api_base: self.slack_api_base.clone(),
            timeout_secs: self.timeout_secs,
        }
    }
}

fn default_telegram_api_base() -> String {
    vega_notify::dispatcher::DEFAULT_TELEGRAM_API_BASE.to_string()
}

fn default_slack_api_base() -> String {
    vega_notify::dispatcher::DEFAULT_SLACK_API_BASE.to_string()
}

fn default_notify_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSchedulerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,
}

impl Default for ReportSchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tick_secs: default_tick_secs(),
        }
    }
}

fn default_tick_secs() -> u64 {
    60
}
