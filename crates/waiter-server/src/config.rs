//! Server configuration loading from file and environment variables.

use serde::Deserialize;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use thiserror::Error;
use waiter_agent::{AgentSettings, DEFAULT_APOLOGY};
use waiter_llm::{AgentProfile, LlmConfig};
use waiter_menu::{Menu, MenuError};

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server network settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Model provider settings.
    #[serde(default)]
    pub llm: LlmConfig,

    /// Conversation and restaurant settings.
    #[serde(default)]
    pub agent: AgentConfig,

    /// Where finished orders are forwarded.
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// Voice platform webhook verification.
    #[serde(default)]
    pub webhook: WebhookConfig,
}

/// Network configuration for the HTTP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "waiter_agent=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_language")]
    pub language: String,

    /// Greeting sent as soon as the call connects.
    #[serde(default = "default_begin_sentence")]
    pub begin_sentence: String,

    /// Closing line sent when the agent hangs up.
    #[serde(default = "default_ending_sentence")]
    pub ending_sentence: String,

    /// House rules appended to the system prompt.
    #[serde(default)]
    pub order_instructions: String,

    #[serde(default = "default_payment_methods")]
    pub payment_methods: Vec<String>,

    /// Path to a JSON menu listing. The built-in sample menu is used when
    /// neither this nor `menu_listing` is set.
    #[serde(default)]
    pub menu_path: Option<String>,

    /// Inline JSON menu listing; takes precedence over `menu_path`.
    #[serde(default)]
    pub menu_listing: Option<String>,

    /// Tool executions allowed within one user turn.
    #[serde(default = "default_max_tool_chain")]
    pub max_tool_chain: usize,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PersistenceConfig {
    /// Base URL of the order backend. Orders stay in memory when unset.
    #[serde(default)]
    pub backend_api_url: Option<String>,
}

#[derive(Clone, Deserialize)]
pub struct WebhookConfig {
    /// Shared secret used to sign webhook deliveries.
    #[serde(default)]
    pub secret: Option<String>,

    /// Maximum age of a signed delivery, in seconds.
    #[serde(default = "default_tolerance_secs")]
    pub tolerance_secs: u64,
}

impl fmt::Debug for WebhookConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebhookConfig")
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .field("tolerance_secs", &self.tolerance_secs)
            .finish()
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_language() -> String {
    "English".to_string()
}

fn default_begin_sentence() -> String {
    "Welcome to our restaurant! I can help you place an order. What would you like to order today?"
        .to_string()
}

fn default_ending_sentence() -> String {
    AgentSettings::default().ending_sentence
}

fn default_payment_methods() -> Vec<String> {
    vec!["Cash".to_string(), "Credit Card".to_string()]
}

fn default_max_tool_chain() -> usize {
    AgentSettings::default().max_tool_chain
}

fn default_tolerance_secs() -> u64 {
    300
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            language: default_language(),
            begin_sentence: default_begin_sentence(),
            ending_sentence: default_ending_sentence(),
            order_instructions: String::new(),
            payment_methods: default_payment_methods(),
            menu_path: None,
            menu_listing: None,
            max_tool_chain: default_max_tool_chain(),
        }
    }
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            secret: None,
            tolerance_secs: default_tolerance_secs(),
        }
    }
}

impl AgentConfig {
    /// Loads the configured menu, falling back to the sample menu.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Menu` if the configured listing cannot be read
    /// or fails validation.
    pub fn load_menu(&self) -> Result<Menu, ConfigError> {
        let menu = match (&self.menu_listing, &self.menu_path) {
            (Some(listing), _) => Menu::from_json(listing)?,
            (None, Some(path)) => Menu::from_path(path)?,
            (None, None) => {
                tracing::info!("no menu configured, using the sample menu");
                Menu::sample()
            }
        };
        Ok(menu)
    }

    pub fn profile(&self) -> AgentProfile {
        AgentProfile {
            language: self.language.clone(),
            begin_sentence: self.begin_sentence.clone(),
            order_instructions: self.order_instructions.clone(),
            payment_methods: self.payment_methods.clone(),
        }
    }

    pub fn settings(&self) -> AgentSettings {
        AgentSettings {
            ending_sentence: self.ending_sentence.clone(),
            apology: DEFAULT_APOLOGY.to_string(),
            max_tool_chain: self.max_tool_chain,
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// The configured menu is unusable.
    #[error("invalid menu: {0}")]
    Menu(#[from] MenuError),
}

/// Loads configuration from a TOML file, falling back to defaults, then
/// applies `WAITER_*` environment overrides.
///
/// Environment variable overrides:
/// - `WAITER_HOST`, `WAITER_PORT` override `server.host` and `server.port`
/// - `WAITER_LOG_LEVEL`, `WAITER_LOG_JSON` override the `logging` section
/// - `WAITER_LLM_PROVIDER`, `WAITER_LLM_MODEL` override `llm.provider` and `llm.model`
/// - `WAITER_LANGUAGE`, `WAITER_BEGIN_SENTENCE`, `WAITER_ENDING_SENTENCE`,
///   `WAITER_ORDER_INSTRUCTIONS`, `WAITER_MENU_PATH`, `WAITER_MENU_LISTING`
///   override the `agent` section
/// - `WAITER_BACKEND_API_URL` overrides `persistence.backend_api_url`
/// - `WAITER_WEBHOOK_SECRET` overrides `webhook.secret`
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    load_config_with(path, |key| std::env::var(key).ok())
}

/// [`load_config`] with an explicit environment lookup.
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config_with(
    path: Option<&str>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    if let Some(host) = env("WAITER_HOST") {
        if let Ok(parsed) = host.parse() {
            config.server.host = parsed;
        }
    }
    if let Some(port) = env("WAITER_PORT") {
        if let Ok(parsed) = port.parse() {
            config.server.port = parsed;
        }
    }
    if let Some(level) = env("WAITER_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(json) = env("WAITER_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }

    if let Some(provider) = env("WAITER_LLM_PROVIDER") {
        match provider.parse() {
            Ok(parsed) => config.llm.provider = parsed,
            Err(error) => tracing::warn!(%provider, %error, "ignoring WAITER_LLM_PROVIDER"),
        }
    }
    if let Some(model) = env("WAITER_LLM_MODEL") {
        config.llm.model = Some(model);
    }

    if let Some(language) = env("WAITER_LANGUAGE") {
        config.agent.language = language;
    }
    if let Some(sentence) = env("WAITER_BEGIN_SENTENCE") {
        config.agent.begin_sentence = sentence;
    }
    if let Some(sentence) = env("WAITER_ENDING_SENTENCE") {
        config.agent.ending_sentence = sentence;
    }
    if let Some(instructions) = env("WAITER_ORDER_INSTRUCTIONS") {
        config.agent.order_instructions = instructions;
    }
    if let Some(path) = env("WAITER_MENU_PATH") {
        config.agent.menu_path = Some(path);
    }
    if let Some(listing) = env("WAITER_MENU_LISTING") {
        config.agent.menu_listing = Some(listing);
    }

    if let Some(url) = env("WAITER_BACKEND_API_URL").filter(|url| !url.trim().is_empty()) {
        config.persistence.backend_api_url = Some(url);
    }
    if let Some(secret) = env("WAITER_WEBHOOK_SECRET").filter(|secret| !secret.is_empty()) {
        config.webhook.secret = Some(secret);
    }

    Ok(config)
}
