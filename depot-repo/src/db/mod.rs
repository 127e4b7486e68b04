//! Database connection lifecycle
//!
//! - [`ConnectionOpener`] validates settings, builds the pool and waits for readiness
//! - [`pool::configure`] applies connection limits
//! - [`readiness::wait_ready`] is the bounded startup probe loop
//! - [`trace`] holds the optional statement instrumentation

pub mod opener;
pub mod pool;
pub mod readiness;
pub mod trace;

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use sqlx::PgPool;

pub use opener::ConnectionOpener;
pub use readiness::{wait_ready, DirectPing, Ping, PROBE_INTERVAL};
pub use trace::{statement_log_level, DriverRegistry, SqlTracer, TraceOptions};

/// Live pool plus the tracer statements are reported to, if tracing is on.
///
/// Cloning is cheap and shares the pool. Owned by [`crate::Repository`];
/// sub-repositories hold clones that must not be used after `stop()`.
#[derive(Debug, Clone)]
pub struct Database {
    pool: PgPool,
    tracer: Option<Arc<SqlTracer>>,
}

impl Database {
    pub fn new(pool: PgPool, tracer: Option<Arc<SqlTracer>>) -> Self {
        Self { pool, tracer }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn tracer(&self) -> Option<&SqlTracer> {
        self.tracer.as_deref()
    }

    /// Run a statement future, reporting its parameters and outcome when tracing
    /// is enabled. The statement text itself is logged by the driver.
    pub async fn traced<T, F>(
        &self,
        operation: &'static str,
        params: &(dyn fmt::Debug + Sync),
        fut: F,
    ) -> Result<T, sqlx::Error>
    where
        F: Future<Output = Result<T, sqlx::Error>>,
    {
        match &self.tracer {
            Some(tracer) => tracer.observe(operation, params, fut).await,
            None => fut.await,
        }
    }

    pub(crate) fn rows_affected(&self, operation: &'static str, rows: u64) {
        if let Some(tracer) = &self.tracer {
            tracer.rows_affected(operation, rows);
        }
    }

    pub async fn ping(&self) -> Result<(), sqlx::Error> {
        Ping::ping(&self.pool).await
    }

    /// Close every connection; waits for checked-out connections to come back.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    pub fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }
}
