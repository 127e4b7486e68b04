//! Repository settings.
//!
//! These types carry no defaults: the caller (the `depot` binary's config layer)
//! decides every value. `validate()` never touches the network.

use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use sqlx::postgres::PgConnectOptions;
use tracing::Level;
use url::Url;

use crate::error::ValidationError;

static ENV_REF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$(?:\$|\{([^}]*)\}|([A-Za-z_][A-Za-z0-9_]*))").expect("valid env regex")
});

static BRACED_REF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*)(?::-(.*))?$").expect("valid braced env regex")
});

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_.]*$").expect("valid identifier regex"));

static TABLE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid table name regex"));

const REDACTED: &str = "xxxxx";

/// Connection pool limits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSettings {
    /// Connections kept open while idle
    pub max_idle_conns: u32,
    /// Upper bound of live connections
    pub max_open_conns: u32,
    /// Zero means connections are never recycled on age
    pub conn_max_lifetime: Duration,
    /// How long a caller waits for a connection when the pool is saturated
    pub acquire_timeout: Duration,
}

/// SQL statement tracing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceSettings {
    pub enabled: bool,
    /// One of trace, debug, info, warn, error
    pub log_level: String,
}

/// Everything needed to open the primary database pool
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    /// PostgreSQL URL, may reference environment variables (`${PGHOST}`)
    pub url: String,
    /// Overrides the user in `url` when set and non-empty after substitution
    pub user: Option<String>,
    /// Overrides the password in `url` when set and non-empty after substitution
    pub password: Option<String>,
    /// Reported to the server as `application_name`
    pub app_name: String,
    pub pool: PoolSettings,
    /// Maximum time to wait for the database to answer at startup
    pub ping_timeout: Duration,
    /// `SET key = value` statements run on every new connection
    pub set_commands: BTreeMap<String, String>,
    pub trace: TraceSettings,
}

/// Schema migration policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationSettings {
    /// Run pending migrations during `start()`
    pub enabled: bool,
    /// Deadline for one whole migration run, lock wait included
    pub timeout: Duration,
    /// Name of the schema-version tracking table
    pub table: String,
}

/// Settings consumed by [`crate::Repository`]
#[derive(Debug, Clone)]
pub struct RepositorySettings {
    pub connection: ConnectionSettings,
    pub migrations: MigrationSettings,
}

impl RepositorySettings {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.connection.validate()?;
        self.migrations.validate()
    }
}

impl MigrationSettings {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.table.is_empty() {
            return Err(ValidationError::Empty {
                field: "migrations.table",
            });
        }
        if !TABLE_NAME.is_match(&self.table) {
            return Err(ValidationError::InvalidFormat {
                field: "migrations.table",
                reason: format!("'{}' is not a plain SQL identifier", self.table),
            });
        }
        Ok(())
    }
}

impl ConnectionSettings {
    /// Validate the settings without any network I/O.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.connect_options()?;
        self.pool.validate()?;
        self.driver_log_level()?;
        self.set_statements()?;
        Ok(())
    }

    /// The connection URL after environment substitution.
    pub fn database_url(&self) -> Result<String, ValidationError> {
        let url = expand_env(&self.url).map_err(|reason| ValidationError::InvalidFormat {
            field: "url",
            reason,
        })?;
        if url.trim().is_empty() {
            return Err(ValidationError::Empty { field: "url" });
        }
        Ok(url)
    }

    /// Driver options with user/password overrides and the application name applied.
    pub fn connect_options(&self) -> Result<PgConnectOptions, ValidationError> {
        let url = self.database_url()?;
        let mut options =
            PgConnectOptions::from_str(&url).map_err(|e| ValidationError::InvalidFormat {
                field: "url",
                reason: format!("invalid connection string: {}", e),
            })?;

        if let Some(user) = expand_override("user", self.user.as_deref())? {
            options = options.username(&user);
        }
        if let Some(password) = expand_override("password", self.password.as_deref())? {
            options = options.password(&password);
        }

        Ok(options.application_name(&self.app_name))
    }

    /// The connection URL with any password masked, safe for logs and traces.
    pub fn redacted_url(&self) -> String {
        let raw = self.database_url().unwrap_or_else(|_| self.url.clone());
        match Url::parse(&raw) {
            Ok(mut url) => {
                if url.password().is_some() {
                    // only fails for cannot-be-a-base URLs, which have no password
                    let _ = url.set_password(Some(REDACTED));
                }
                url.to_string()
            }
            Err(_) => String::from("postgres://<unparsed>"),
        }
    }

    /// Level at which traced statements are reported.
    pub fn driver_log_level(&self) -> Result<Level, ValidationError> {
        Level::from_str(&self.trace.log_level).map_err(|_| ValidationError::InvalidVariant {
            field: "log level for the sql driver",
            value: self.trace.log_level.clone(),
        })
    }

    /// Expanded `SET key = value` statements, in key order.
    pub fn set_statements(&self) -> Result<Vec<String>, ValidationError> {
        self.set_commands
            .iter()
            .map(|(key, value)| {
                let key = expand_env(key).map_err(|reason| ValidationError::InvalidFormat {
                    field: "set",
                    reason,
                })?;
                let value = expand_env(value).map_err(|reason| ValidationError::InvalidFormat {
                    field: "set",
                    reason,
                })?;
                if !IDENTIFIER.is_match(&key) {
                    return Err(ValidationError::InvalidFormat {
                        field: "set",
                        reason: format!("'{}' is not a valid setting name", key),
                    });
                }
                if value.trim().is_empty() {
                    return Err(ValidationError::Empty { field: "set value" });
                }
                Ok(format!("SET {} = {}", key, value))
            })
            .collect()
    }
}

impl PoolSettings {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_open_conns == 0 {
            return Err(ValidationError::OutOfRange {
                field: "max_open_conns",
                reason: "at least one connection is required".into(),
            });
        }
        if self.max_idle_conns > self.max_open_conns {
            return Err(ValidationError::OutOfRange {
                field: "max_idle_conns",
                reason: format!(
                    "{} idle connections exceed the open connection cap of {}",
                    self.max_idle_conns, self.max_open_conns
                ),
            });
        }
        Ok(())
    }
}

fn expand_override(
    field: &'static str,
    value: Option<&str>,
) -> Result<Option<String>, ValidationError> {
    let Some(value) = value else {
        return Ok(None);
    };
    let expanded =
        expand_env(value).map_err(|reason| ValidationError::InvalidFormat { field, reason })?;
    Ok((!expanded.is_empty()).then_some(expanded))
}

/// Substitute `$VAR`, `${VAR}` and `${VAR:-default}` from the process environment.
///
/// Unset variables expand to the empty string. `$$` yields a literal `$`.
pub fn expand_env(input: &str) -> Result<String, String> {
    expand_with(input, |name| std::env::var(name).ok())
}

/// Same as [`expand_env`] with a caller-supplied variable lookup.
pub fn expand_with<F>(input: &str, lookup: F) -> Result<String, String>
where
    F: Fn(&str) -> Option<String>,
{
    let mut out = String::with_capacity(input.len());
    let mut last = 0;

    for caps in ENV_REF.captures_iter(input) {
        let Some(whole) = caps.get(0) else { continue };
        check_literal(&input[last..whole.start()])?;
        out.push_str(&input[last..whole.start()]);
        last = whole.end();

        if let Some(braced) = caps.get(1) {
            let inner = BRACED_REF.captures(braced.as_str()).ok_or_else(|| {
                format!("invalid variable reference '${{{}}}'", braced.as_str())
            })?;
            let name = &inner[1];
            match (lookup(name), inner.get(2)) {
                (Some(value), _) if !value.is_empty() => out.push_str(&value),
                (_, Some(default)) => out.push_str(default.as_str()),
                (value, None) => out.push_str(&value.unwrap_or_default()),
            }
        } else if let Some(name) = caps.get(2) {
            out.push_str(&lookup(name.as_str()).unwrap_or_default());
        } else {
            out.push('$');
        }
    }

    check_literal(&input[last..])?;
    out.push_str(&input[last..]);
    Ok(out)
}

fn check_literal(chunk: &str) -> Result<(), String> {
    if chunk.contains("${") {
        return Err(format!("unterminated variable reference in '{}'", chunk));
    }
    Ok(())
}
