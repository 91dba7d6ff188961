//! Application configuration.

use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Redis configuration.
    #[serde(default)]
    pub redis: RedisConfig,
    /// Identifier generator configuration.
    #[serde(default)]
    pub id: IdConfig,
    /// Vote and ranking store configuration.
    #[serde(default)]
    pub engagement: EngagementConfig,
    /// Listing configuration.
    #[serde(default)]
    pub pagination: PaginationConfig,
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

/// Redis configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL.
    #[serde(default = "default_redis_url")]
    pub url: String,
    /// Key prefix for all Redis keys.
    #[serde(default = "default_redis_prefix")]
    pub prefix: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            prefix: default_redis_prefix(),
        }
    }
}

/// Identifier generator configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct IdConfig {
    /// Epoch anchor as an RFC 3339 timestamp.
    #[serde(default = "default_epoch")]
    pub epoch: String,
    /// Worker number, unique per running instance.
    #[serde(default)]
    pub worker_id: u64,
}

impl Default for IdConfig {
    fn default() -> Self {
        Self {
            epoch: default_epoch(),
            worker_id: 0,
        }
    }
}

/// Where vote records and scores live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EngagementBackend {
    /// In-process, lock-protected maps. Single instance only.
    #[default]
    Memory,
    /// Redis hashes and a sorted set, shared by all instances.
    Redis,
}

/// Vote store and ranking index configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct EngagementConfig {
    /// Storage backend.
    #[serde(default)]
    pub backend: EngagementBackend,
    /// Register unknown posts on first score update instead of failing.
    #[serde(default = "default_true")]
    pub auto_register: bool,
    /// Deadline for a single store round trip, in milliseconds.
    #[serde(default = "default_deadline_ms")]
    pub deadline_ms: u64,
    /// How many times a vote commit is retried after losing a race.
    #[serde(default = "default_max_commit_retries")]
    pub max_commit_retries: u32,
}

impl Default for EngagementConfig {
    fn default() -> Self {
        Self {
            backend: EngagementBackend::default(),
            auto_register: true,
            deadline_ms: default_deadline_ms(),
            max_commit_retries: default_max_commit_retries(),
        }
    }
}

/// Listing configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PaginationConfig {
    /// Page size used when the request omits one.
    #[serde(default = "default_page_size")]
    pub default_page_size: u64,
    /// Upper bound for any requested page size.
    #[serde(default = "default_max_page_size")]
    pub max_page_size: u64,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    3000
}

const fn default_max_connections() -> u32 {
    100
}

const fn default_min_connections() -> u32 {
    5
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_redis_prefix() -> String {
    "agora".to_string()
}

fn default_epoch() -> String {
    "2024-01-01T00:00:00Z".to_string()
}

const fn default_true() -> bool {
    true
}

const fn default_deadline_ms() -> u64 {
    2_000
}

const fn default_max_commit_retries() -> u32 {
    8
}

const fn default_page_size() -> u64 {
    20
}

const fn default_max_page_size() -> u64 {
    100
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `.env` (if present)
    /// 2. `config/default.toml`
    /// 3. `config/{environment}.toml` (based on `AGORA_ENV`)
    /// 4. Environment variables with `AGORA__` prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        // A missing .env file is normal outside development.
        let _ = dotenvy::dotenv();

        let env = std::env::var("AGORA_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("AGORA")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn from_toml(source: &str) -> Config {
        config::Config::builder()
            .add_source(config::File::from_str(source, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = from_toml(
            r#"
            [server]
            [database]
            url = "postgres://localhost/agora"
            "#,
        );

        assert_eq!(config.server.port, 3000);
        assert_eq!(config.database.max_connections, 100);
        assert_eq!(config.redis.prefix, "agora");
        assert_eq!(config.id.worker_id, 0);
        assert_eq!(config.engagement.backend, EngagementBackend::Memory);
        assert!(config.engagement.auto_register);
        assert_eq!(config.pagination.default_page_size, 20);
        assert_eq!(config.pagination.max_page_size, 100);
    }

    #[test]
    fn test_engagement_backend_parsing() {
        let config = from_toml(
            r#"
            [server]
            [database]
            url = "postgres://localhost/agora"
            [engagement]
            backend = "redis"
            auto_register = false
            deadline_ms = 250
            "#,
        );

        assert_eq!(config.engagement.backend, EngagementBackend::Redis);
        assert!(!config.engagement.auto_register);
        assert_eq!(config.engagement.deadline_ms, 250);
        assert_eq!(config.engagement.max_commit_retries, 8);
    }
}
