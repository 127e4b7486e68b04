use std::time::Duration;

use tokio::time::Instant;

use super::{validate, Migration, SchemaStore};
use crate::error::{MigrationError, StepError};

/// What a successful run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    /// Version recorded before the run
    pub from: i64,
    /// Version recorded after the run
    pub to: i64,
    /// Versions applied by this run, in order
    pub applied: Vec<i64>,
}

impl MigrationReport {
    pub fn is_noop(&self) -> bool {
        self.applied.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationStatus {
    pub current: i64,
    pub pending: Vec<i64>,
}

/// Applies an ordered migration set under the store's lock.
#[derive(Debug, Clone, Copy)]
pub struct Migrator<'m> {
    migrations: &'m [Migration],
    timeout: Duration,
}

impl<'m> Migrator<'m> {
    /// `timeout` bounds the forward steps of one run; rollback always runs to completion.
    pub fn new(migrations: &'m [Migration], timeout: Duration) -> Result<Self, MigrationError> {
        validate(migrations)?;
        Ok(Self {
            migrations,
            timeout,
        })
    }

    /// Highest version this set knows about.
    pub fn latest(&self) -> i64 {
        self.migrations.last().map_or(0, |m| m.version)
    }

    /// Lock, migrate forward, roll back on failure, unlock.
    pub async fn run<S>(&self, store: &mut S) -> Result<MigrationReport, MigrationError>
    where
        S: SchemaStore + ?Sized,
    {
        let deadline = Instant::now() + self.timeout;

        store.lock().await?;
        tracing::debug!("migration lock acquired");

        let outcome = self.run_locked(store, deadline).await;

        if let Err(e) = store.unlock().await {
            tracing::warn!(error = %e, "failed to release migration lock");
        }
        outcome
    }

    /// Current and pending versions. Read-only, so it does not lock.
    pub async fn status<S>(&self, store: &mut S) -> Result<MigrationStatus, MigrationError>
    where
        S: SchemaStore + ?Sized,
    {
        let current = store.current_version().await.map_err(MigrationError::Store)?;

        Ok(MigrationStatus {
            current,
            pending: self.pending(current).map(|m| m.version).collect(),
        })
    }

    fn pending(&self, current: i64) -> impl Iterator<Item = &'m Migration> {
        self.migrations.iter().filter(move |m| m.version > current)
    }

    async fn run_locked<S>(
        &self,
        store: &mut S,
        deadline: Instant,
    ) -> Result<MigrationReport, MigrationError>
    where
        S: SchemaStore + ?Sized,
    {
        store
            .ensure_version_table()
            .await
            .map_err(MigrationError::Store)?;
        let from = store.current_version().await.map_err(MigrationError::Store)?;

        let mut applied: Vec<&Migration> = Vec::new();
        for migration in self.pending(from) {
            let step = if Instant::now() >= deadline {
                Err(StepError::DeadlineExceeded(self.timeout))
            } else {
                store.apply(migration).await.map_err(StepError::from)
            };

            match step {
                Ok(()) => {
                    tracing::info!(
                        version = migration.version,
                        description = migration.description,
                        "applied migration"
                    );
                    applied.push(migration);
                }
                Err(cause) => {
                    return Err(self.roll_back(store, from, migration, cause, &applied).await);
                }
            }
        }

        let to = applied.last().map_or(from, |m| m.version);
        if applied.is_empty() {
            tracing::info!(version = from, "schema up to date");
        } else {
            tracing::info!(from, to, count = applied.len(), "schema migrated");
        }

        Ok(MigrationReport {
            from,
            to,
            applied: applied.iter().map(|m| m.version).collect(),
        })
    }

    /// Revert `applied` newest first and confirm the store is back at `target`.
    async fn roll_back<S>(
        &self,
        store: &mut S,
        target: i64,
        failed: &Migration,
        cause: StepError,
        applied: &[&Migration],
    ) -> MigrationError
    where
        S: SchemaStore + ?Sized,
    {
        tracing::warn!(
            version = failed.version,
            description = failed.description,
            error = %cause,
            target,
            "migration failed, rolling back"
        );

        for migration in applied.iter().rev() {
            if let Err(e) = store.revert(migration).await {
                tracing::error!(
                    version = migration.version,
                    error = %e,
                    "rollback step failed"
                );
                return MigrationError::Irrecoverable {
                    version: failed.version,
                    rollback_version: migration.version,
                    cause,
                    rollback: StepError::Statement(e),
                };
            }
            tracing::info!(version = migration.version, "reverted migration");
        }

        let rollback = match store.current_version().await {
            Ok(found) if found == target => {
                tracing::warn!(version = target, "schema rolled back");
                return MigrationError::Failed {
                    version: failed.version,
                    description: failed.description,
                    rolled_back_to: target,
                    cause,
                };
            }
            Ok(found) => StepError::VersionMismatch {
                expected: target,
                found,
            },
            Err(e) => StepError::Statement(e),
        };

        tracing::error!(error = %rollback, "schema version could not be confirmed after rollback");
        let rollback_version = match &rollback {
            StepError::VersionMismatch { found, .. } => *found,
            _ => target,
        };
        MigrationError::Irrecoverable {
            version: failed.version,
            rollback_version,
            cause,
            rollback,
        }
    }
}
