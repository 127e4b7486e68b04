use std::time::Duration;

use async_trait::async_trait;
use sqlx::{Connection, Executor, PgConnection, PgPool};

use super::Migration;
use crate::error::LockError;

/// Where migrations are recorded and executed.
///
/// [`Migrator`](super::Migrator) drives this; the PostgreSQL implementation is
/// [`PgSchemaStore`].
#[async_trait]
pub trait SchemaStore: Send {
    /// Block until this store holds the cluster-wide migration lock.
    async fn lock(&mut self) -> Result<(), LockError>;

    async fn unlock(&mut self) -> Result<(), sqlx::Error>;

    /// Create the tracking table if it is missing.
    async fn ensure_version_table(&mut self) -> Result<(), sqlx::Error>;

    /// Highest applied version, 0 for a fresh schema. Must not create the
    /// tracking table: status reads run without the lock.
    async fn current_version(&mut self) -> Result<i64, sqlx::Error>;

    /// Run the forward SQL and record the version, atomically.
    async fn apply(&mut self, migration: &Migration) -> Result<(), sqlx::Error>;

    /// Run the reverse SQL and forget the version, atomically.
    async fn revert(&mut self, migration: &Migration) -> Result<(), sqlx::Error>;
}

/// Advisory lock key derived from the tracking table name.
pub fn lock_key(table: &str) -> i64 {
    let digest = md5::compute(format!("depot-migrations:{}", table));
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest.0[..8]);
    i64::from_be_bytes(bytes)
}

/// Schema store on a single connection taken out of the pool.
///
/// The connection is detached, so the session advisory lock lives and dies with
/// this store and never leaks back into the pool. `lock_timeout` and
/// `statement_timeout` are set to the migration budget.
#[derive(Debug)]
pub struct PgSchemaStore {
    conn: PgConnection,
    table: String,
    key: i64,
}

impl PgSchemaStore {
    /// `table` must already be validated as a plain identifier.
    pub async fn connect(pool: &PgPool, table: &str, timeout: Duration) -> Result<Self, sqlx::Error> {
        let mut conn = pool.acquire().await?.detach();

        let millis = timeout.as_millis().max(1);
        let session = format!(
            "SET lock_timeout = {millis}; SET statement_timeout = {millis}"
        );
        sqlx::raw_sql(&session).execute(&mut conn).await?;

        Ok(Self {
            conn,
            table: table.to_owned(),
            key: lock_key(table),
        })
    }

    /// Close the dedicated connection, releasing any lock still held.
    pub async fn close(self) {
        if let Err(e) = self.conn.close().await {
            tracing::warn!(error = %e, "closing migration connection failed");
        }
    }
}

#[async_trait]
impl SchemaStore for PgSchemaStore {
    async fn lock(&mut self) -> Result<(), LockError> {
        let key = self.key;
        tracing::debug!(key, "acquiring migration lock");
        sqlx::query("SELECT pg_advisory_lock($1)")
            .bind(key)
            .execute(&mut self.conn)
            .await
            .map_err(|source| LockError { key, source })?;
        Ok(())
    }

    async fn unlock(&mut self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT pg_advisory_unlock($1)")
            .bind(self.key)
            .execute(&mut self.conn)
            .await?;
        Ok(())
    }

    async fn ensure_version_table(&mut self) -> Result<(), sqlx::Error> {
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (
                version BIGINT PRIMARY KEY,
                description TEXT NOT NULL,
                applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )",
            self.table
        );
        sqlx::query(&sql).execute(&mut self.conn).await?;
        Ok(())
    }

    async fn current_version(&mut self) -> Result<i64, sqlx::Error> {
        let exists: bool = sqlx::query_scalar("SELECT to_regclass($1) IS NOT NULL")
            .bind(&self.table)
            .fetch_one(&mut self.conn)
            .await?;
        if !exists {
            return Ok(0);
        }

        let sql = format!("SELECT COALESCE(MAX(version), 0) FROM {}", self.table);
        sqlx::query_scalar::<_, i64>(&sql)
            .fetch_one(&mut self.conn)
            .await
    }

    async fn apply(&mut self, migration: &Migration) -> Result<(), sqlx::Error> {
        let record = format!(
            "INSERT INTO {} (version, description) VALUES ($1, $2)",
            self.table
        );

        let mut tx = self.conn.begin().await?;
        let conn: &mut PgConnection = &mut tx;
        conn.execute(sqlx::raw_sql(migration.up)).await?;
        sqlx::query(&record)
            .bind(migration.version)
            .bind(migration.description)
            .execute(&mut *conn)
            .await?;
        tx.commit().await
    }

    async fn revert(&mut self, migration: &Migration) -> Result<(), sqlx::Error> {
        let forget = format!("DELETE FROM {} WHERE version = $1", self.table);

        let mut tx = self.conn.begin().await?;
        let conn: &mut PgConnection = &mut tx;
        conn.execute(sqlx::raw_sql(migration.down)).await?;
        sqlx::query(&forget)
            .bind(migration.version)
            .execute(&mut *conn)
            .await?;
        tx.commit().await
    }
}
