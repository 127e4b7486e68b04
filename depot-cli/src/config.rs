//! depot configuration file
//!
//! Lookup order: `--config <path>`, then `./depot.toml`, then
//! `~/.depot/config.toml`. When none exists the built-in defaults are used.
//! `DATABASE_URL` overrides `databases.url`.
//!
//! Every default lives here; `depot-repo` settings carry none.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use depot_repo::{
    ConnectionSettings, MigrationSettings, PoolSettings, RepositorySettings, TraceSettings,
};
use serde::{Deserialize, Serialize};

pub const CONFIG_FILE_NAME: &str = "depot.toml";
pub const APP_NAME: &str = "depot";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DepotConfig {
    pub app: AppConfig,
    pub log: LogConfig,
    pub databases: DatabaseConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// `[databases]`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Supports `$VAR`, `${VAR}` and `${VAR:-default}`
    pub url: String,
    pub user: Option<String>,
    pub password: Option<String>,
    pub app_name: String,
    pub config: PoolConfig,
    pub migrations: MigrationsConfig,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            user: None,
            password: None,
            app_name: APP_NAME.to_string(),
            config: PoolConfig::default(),
            migrations: MigrationsConfig::default(),
        }
    }
}

/// `[databases.config]`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub max_idle_conns: u32,
    pub max_open_conns: u32,
    pub conn_max_lifetime_secs: u64,
    pub ping_timeout_secs: u64,
    pub acquire_timeout_secs: u64,
    pub log: LogConfig,
    pub trace: TraceConfig,
    /// `SET key = value` run on every new connection
    pub set: BTreeMap<String, String>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_idle_conns: default_max_idle_conns(),
            max_open_conns: default_max_open_conns(),
            conn_max_lifetime_secs: default_conn_max_lifetime_secs(),
            ping_timeout_secs: default_ping_timeout_secs(),
            acquire_timeout_secs: default_acquire_timeout_secs(),
            log: LogConfig::default(),
            trace: TraceConfig::default(),
            set: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceConfig {
    pub enabled: bool,
}

/// `[databases.migrations]`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationsConfig {
    pub enabled: bool,
    pub timeout_secs: u64,
    pub table: String,
}

impl Default for MigrationsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_secs: default_migration_timeout_secs(),
            table: default_migration_table(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_idle_conns() -> u32 {
    25
}

fn default_max_open_conns() -> u32 {
    50
}

fn default_conn_max_lifetime_secs() -> u64 {
    300
}

fn default_ping_timeout_secs() -> u64 {
    10
}

fn default_acquire_timeout_secs() -> u64 {
    30
}

fn default_migration_timeout_secs() -> u64 {
    120
}

fn default_migration_table() -> String {
    "depot_schema_migrations".to_string()
}

impl DepotConfig {
    /// Load from the first config file found, then apply `DATABASE_URL`.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::load_from(path)?,
            None => match Self::discover() {
                Some(path) => Self::load_from(&path)?,
                None => {
                    tracing::debug!("no config file found, using defaults");
                    Self::default()
                }
            },
        };
        config.apply_database_url(std::env::var("DATABASE_URL").ok());
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// `./depot.toml`, then `~/.depot/config.toml`
    pub fn discover() -> Option<PathBuf> {
        let local = PathBuf::from(CONFIG_FILE_NAME);
        if local.is_file() {
            return Some(local);
        }
        Self::home_config_path().filter(|path| path.is_file())
    }

    pub fn home_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".depot"))
    }

    pub fn home_config_path() -> Option<PathBuf> {
        Self::home_dir().map(|dir| dir.join("config.toml"))
    }

    pub fn apply_database_url(&mut self, url: Option<String>) {
        if let Some(url) = url.filter(|url| !url.trim().is_empty()) {
            self.databases.url = url;
        }
    }

    pub fn bind_addr(&self) -> Result<SocketAddr> {
        let addr = format!("{}:{}", self.app.host, self.app.port);
        addr.parse()
            .with_context(|| format!("Invalid [app] host/port: {}", addr))
    }

    pub fn to_repository_settings(&self) -> RepositorySettings {
        let db = &self.databases;
        let pool = &db.config;

        RepositorySettings {
            connection: ConnectionSettings {
                url: db.url.clone(),
                user: db.user.clone(),
                password: db.password.clone(),
                app_name: db.app_name.clone(),
                pool: PoolSettings {
                    max_idle_conns: pool.max_idle_conns,
                    max_open_conns: pool.max_open_conns,
                    conn_max_lifetime: Duration::from_secs(pool.conn_max_lifetime_secs),
                    acquire_timeout: Duration::from_secs(pool.acquire_timeout_secs),
                },
                ping_timeout: Duration::from_secs(pool.ping_timeout_secs),
                set_commands: pool.set.clone(),
                trace: TraceSettings {
                    enabled: pool.trace.enabled,
                    log_level: pool.log.level.clone(),
                },
            },
            migrations: MigrationSettings {
                enabled: db.migrations.enabled,
                timeout: Duration::from_secs(db.migrations.timeout_secs),
                table: db.migrations.table.clone(),
            },
        }
    }
}
