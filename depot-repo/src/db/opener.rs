use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use sqlx::{ConnectOptions, Executor};
use tokio::time::Instant;

use super::pool;
use super::readiness::{wait_ready, DirectPing, Ping};
use super::trace::{statement_log_level, DriverRegistry, TraceOptions};
use super::Database;
use crate::config::ConnectionSettings;
use crate::error::{ConnectionError, Result};

/// Turns [`ConnectionSettings`] into a ready [`Database`].
#[derive(Debug, Clone, Default)]
pub struct ConnectionOpener {
    registry: Arc<DriverRegistry>,
}

impl ConnectionOpener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Share instrumented drivers with other openers in the process.
    pub fn with_registry(registry: Arc<DriverRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<DriverRegistry> {
        &self.registry
    }

    /// Validate, build the pool, then wait for the database to answer.
    ///
    /// Readiness is checked over direct connections so a failure carries the
    /// driver's error. The first pooled connection is then opened, which runs the
    /// `SET` statements. On any failure the pool is closed before returning, so
    /// callers never hold a half-initialized handle.
    pub async fn open(&self, settings: &ConnectionSettings) -> Result<Database> {
        settings.validate()?;

        let mut connect = settings.connect_options()?;
        let statements = settings.set_statements()?;
        let instance = settings.redacted_url();

        let tracer = if settings.trace.enabled {
            let level = settings.driver_log_level()?;
            let options = TraceOptions::default();
            // every connection of the pool, the migration connection included
            connect = connect.log_statements(statement_log_level(level, options));
            Some(self.registry.register(&instance, &settings.app_name, level, options))
        } else {
            None
        };
        let direct = DirectPing::new(connect.clone());

        let mut options = pool::configure(PgPoolOptions::new(), &settings.pool);
        if !statements.is_empty() {
            let statements = Arc::new(statements);
            options = options.after_connect(move |conn, _meta| {
                let statements = Arc::clone(&statements);
                Box::pin(async move {
                    for statement in statements.iter() {
                        (&mut *conn).execute(statement.as_str()).await?;
                    }
                    Ok(())
                })
            });
        }

        let pool = options.connect_lazy_with(connect);

        tracing::info!(
            instance = %instance,
            max_wait = ?settings.ping_timeout,
            traced = tracer.is_some(),
            "waiting for database"
        );
        let started = Instant::now();

        let ready = match wait_ready(&direct, settings.ping_timeout).await {
            Ok(()) => Ping::ping(&pool).await,
            Err(e) => Err(e),
        };
        if let Err(source) = ready {
            pool.close().await;
            tracing::error!(instance = %instance, error = %source, "database not ready");
            return Err(ConnectionError::NotReady {
                instance,
                waited: started.elapsed(),
                source,
            }
            .into());
        }

        tracing::info!(
            instance = %instance,
            elapsed_ms = started.elapsed().as_millis() as u64,
            max_open = settings.pool.max_open_conns,
            max_idle = settings.pool.max_idle_conns,
            "database ready"
        );
        Ok(Database::new(pool, tracer))
    }
}
