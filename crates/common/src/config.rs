//! Application configuration.

use serde::Deserialize;
use std::path::Path;
use url::Url;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Database configuration. When absent, objects are kept in memory.
    #[serde(default)]
    pub database: Option<DatabaseConfig>,
    /// Federation configuration.
    #[serde(default)]
    pub federation: FederationConfig,
    /// Key used to sign outgoing requests.
    #[serde(default)]
    pub signing: Option<SigningConfig>,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind to.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Public URL of this instance. Every IRI under this origin is locally owned.
    pub url: Url,
}

/// Database connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// `PostgreSQL` connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// What to do when a Follow arrives for a local actor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnFollow {
    /// Leave the decision to the application.
    #[default]
    DoNothing,
    /// Reply with an Accept and record the follower.
    AutomaticallyAccept,
    /// Reply with a Reject.
    AutomaticallyReject,
}

/// Federation configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct FederationConfig {
    /// Whether outgoing delivery is enabled.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Collection nesting followed when resolving recipients. `<= 0` is unbounded.
    #[serde(default = "default_recursion_depth")]
    pub max_delivery_depth: i32,
    /// Object graph depth searched before inbox forwarding. `<= 0` is unbounded.
    #[serde(default = "default_recursion_depth")]
    pub max_forwarding_depth: i32,
    /// Automatic response to incoming Follow activities.
    #[serde(default)]
    pub on_follow: OnFollow,
    /// Page size used for `first` links and legacy `page=true` requests.
    #[serde(default = "default_page_limit")]
    pub default_page_limit: usize,
    /// Smallest page size a client may request.
    #[serde(default = "default_min_page_limit")]
    pub min_page_limit: usize,
    /// Largest page size a client may request.
    #[serde(default = "default_max_page_limit")]
    pub max_page_limit: usize,
    /// Hosts whose actors are refused at the inbox.
    #[serde(default)]
    pub blocked_domains: Vec<String>,
    /// Lifetime of memoised remote dereferences.
    #[serde(default = "default_cache_ttl_secs")]
    pub dereference_cache_ttl_secs: u64,
    /// Interval between cache sweeps.
    #[serde(default = "default_sweep_interval_secs")]
    pub cache_sweep_interval_secs: u64,
    /// User agent sent on outgoing requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for FederationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_delivery_depth: default_recursion_depth(),
            max_forwarding_depth: default_recursion_depth(),
            on_follow: OnFollow::default(),
            default_page_limit: default_page_limit(),
            min_page_limit: default_min_page_limit(),
            max_page_limit: default_max_page_limit(),
            blocked_domains: Vec::new(),
            dereference_cache_ttl_secs: default_cache_ttl_secs(),
            cache_sweep_interval_secs: default_sweep_interval_secs(),
            user_agent: default_user_agent(),
        }
    }
}

/// Outgoing request signing key.
#[derive(Debug, Clone, Deserialize)]
pub struct SigningConfig {
    /// `keyId` advertised in the signature header.
    pub key_id: String,
    /// PKCS#8 PEM encoded RSA private key.
    pub private_key_pem: String,
}

/// Logging configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    /// Emit JSON formatted log lines.
    #[serde(default)]
    pub json: bool,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    3000
}

const fn default_max_connections() -> u32 {
    20
}

const fn default_min_connections() -> u32 {
    2
}

const fn default_true() -> bool {
    true
}

const fn default_recursion_depth() -> i32 {
    4
}

const fn default_page_limit() -> usize {
    40
}

const fn default_min_page_limit() -> usize {
    1
}

const fn default_max_page_limit() -> usize {
    80
}

const fn default_cache_ttl_secs() -> u64 {
    300
}

const fn default_sweep_interval_secs() -> u64 {
    60
}

fn default_user_agent() -> String {
    format!("hearth/{}", env!("CARGO_PKG_VERSION"))
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `.env` (if present, exported into the environment)
    /// 2. `config/default.toml`
    /// 3. `config/{environment}.toml` (based on `HEARTH_ENV`)
    /// 4. Environment variables with `HEARTH__` prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();
        let env = std::env::var("HEARTH_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("HEARTH")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("federation.blocked_domains")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load configuration from a specific file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("HEARTH")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
