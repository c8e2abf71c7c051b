use anyhow::{bail, Context, Result};
use serde::Deserialize;

/// Default config file, overridable with `MILLBOARD_CONFIG`
const DEFAULT_CONFIG_FILE: &str = "millboard.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
    #[serde(default)]
    pub live: LiveConfig,
    #[serde(default)]
    pub maintenance: MaintenanceConfig,
    #[serde(default)]
    pub seed: SeedConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Maximum request body size in bytes (default: 1MB)
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum idle connections in pool
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    /// Connection acquire timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Idle connection timeout in seconds
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    /// Allowed CORS origins (comma-separated, or "*" for any)
    #[serde(default = "default_cors_origins")]
    pub cors_origins: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Session lifetime in hours
    #[serde(default = "default_session_ttl_hours")]
    pub session_ttl_hours: i64,
    #[serde(default = "default_min_password_length")]
    pub min_password_length: usize,
    /// Admin account created when the user table is empty
    #[serde(default = "default_admin_email")]
    pub admin_email: String,
    /// Bootstrap is skipped when unset
    pub admin_password: Option<String>,
}

/// Operating policy for the lifecycle engine and the aggregates
#[derive(Debug, Clone, Deserialize)]
pub struct PolicyConfig {
    /// Days in service after which a board counts as overdue
    #[serde(default = "default_overdue_days")]
    pub overdue_days: i64,
    /// Look-ahead window for expiring warranties, in days
    #[serde(default = "default_warranty_window_days")]
    pub warranty_window_days: i64,
    /// Reject a substitute that already backs another board
    #[serde(default = "default_exclusive_substitutes")]
    pub exclusive_substitutes: bool,
    /// Board id prefix that marks spare units
    #[serde(default = "default_substitute_prefix")]
    pub substitute_prefix: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LiveConfig {
    /// Full reload interval for the live store, in seconds
    #[serde(default = "default_resync_interval")]
    pub resync_interval_secs: u64,
    /// Age after which a snapshot is reported stale, in seconds
    #[serde(default = "default_stale_after")]
    pub stale_after_secs: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MaintenanceConfig {
    /// Interval between maintenance passes, in seconds
    #[serde(default = "default_maintenance_interval")]
    pub interval_secs: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SeedConfig {
    /// Insert the standard mills and service partners into an empty database
    #[serde(default)]
    pub master_data: bool,
}

fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_max_body_size() -> usize { 1024 * 1024 } // 1MB
fn default_max_connections() -> u32 { 20 }
fn default_min_connections() -> u32 { 2 }
fn default_connect_timeout() -> u64 { 30 }
fn default_idle_timeout() -> u64 { 600 }
fn default_cors_origins() -> String { "*".to_string() }
fn default_session_ttl_hours() -> i64 { 12 }
fn default_min_password_length() -> usize { 8 }
fn default_admin_email() -> String { "admin@smw.com".to_string() }
fn default_overdue_days() -> i64 { 14 }
fn default_warranty_window_days() -> i64 { 30 }
fn default_exclusive_substitutes() -> bool { true }
fn default_substitute_prefix() -> String { "SMW-S-".to_string() }
fn default_resync_interval() -> u64 { 30 }
fn default_stale_after() -> i64 { 120 }
fn default_maintenance_interval() -> u64 { 900 } // 15 minutes

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_body_size: default_max_body_size(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connect_timeout_secs: default_connect_timeout(),
            idle_timeout_secs: default_idle_timeout(),
        }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self { cors_origins: default_cors_origins() }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_ttl_hours: default_session_ttl_hours(),
            min_password_length: default_min_password_length(),
            admin_email: default_admin_email(),
            admin_password: None,
        }
    }
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            overdue_days: default_overdue_days(),
            warranty_window_days: default_warranty_window_days(),
            exclusive_substitutes: default_exclusive_substitutes(),
            substitute_prefix: default_substitute_prefix(),
        }
    }
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            resync_interval_secs: default_resync_interval(),
            stale_after_secs: default_stale_after(),
        }
    }
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self { interval_secs: default_maintenance_interval() }
    }
}

impl Config {
    /// Load configuration from the optional config file and the environment.
    ///
    /// Sources, lowest priority first:
    /// - `millboard.toml` (or the file named by `MILLBOARD_CONFIG`), if present
    /// - `MILLBOARD__<SECTION>__<KEY>` variables
    /// - `DATABASE_URL`, `HOST`, `PORT`
    pub fn load() -> Result<Self> {
        let path = std::env::var("MILLBOARD_CONFIG")
            .unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());

        let builder = config::Config::builder()
            .add_source(config::File::with_name(&path).required(false))
            .add_source(
                config::Environment::with_prefix("MILLBOARD")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("database.url", std::env::var("DATABASE_URL").ok())?
            .set_override_option("server.host", std::env::var("HOST").ok())?
            .set_override_option("server.port", std::env::var("PORT").ok())?;

        let config = Self::from_source(builder.build()?)?;
        if config.database.url.is_empty() {
            bail!("DATABASE_URL must be set");
        }
        Ok(config)
    }

    /// Deserialize from an already assembled source
    pub fn from_source(source: config::Config) -> Result<Self> {
        source
            .try_deserialize()
            .context("Invalid configuration")
    }
}
