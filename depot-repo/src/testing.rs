//! Shared fixtures for unit tests.

use std::collections::BTreeMap;
use std::time::Duration;

use crate::config::{
    ConnectionSettings, MigrationSettings, PoolSettings, RepositorySettings, TraceSettings,
};

pub(crate) fn connection_settings(url: &str) -> ConnectionSettings {
    ConnectionSettings {
        url: url.to_string(),
        user: None,
        password: None,
        app_name: "depot-test".into(),
        pool: PoolSettings {
            max_idle_conns: 5,
            max_open_conns: 10,
            conn_max_lifetime: Duration::from_secs(300),
            acquire_timeout: Duration::from_secs(30),
        },
        ping_timeout: Duration::from_secs(10),
        set_commands: BTreeMap::new(),
        trace: TraceSettings {
            enabled: false,
            log_level: "info".into(),
        },
    }
}

pub(crate) fn repository_settings(url: &str) -> RepositorySettings {
    RepositorySettings {
        connection: connection_settings(url),
        migrations: MigrationSettings {
            enabled: true,
            timeout: Duration::from_secs(60),
            table: "depot_schema_migrations".into(),
        },
    }
}

/// `DATABASE_URL` for tests marked `#[ignore = "requires database"]`.
pub(crate) fn database_url() -> String {
    std::env::var("DATABASE_URL").expect("DATABASE_URL required")
}
