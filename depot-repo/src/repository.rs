use async_trait::async_trait;

use crate::config::RepositorySettings;
use crate::db::{ConnectionOpener, Database};
use crate::error::{ConnectionError, Error, Result};
use crate::migrate::{self, MigrationReport, MigrationStatus};
use crate::repos::{ItemRepo, ItemStore, Repos};

/// Entry point for the rest of the application.
///
/// `start()` opens and readies the pool, optionally migrates the schema and
/// binds the sub-repositories. `stop()` closes the pool. `start` and `stop` are
/// meant to be called from one control path, not concurrently.
#[derive(Debug)]
pub struct Repository {
    settings: RepositorySettings,
    opener: ConnectionOpener,
    state: Option<Started>,
}

#[derive(Debug)]
struct Started {
    db: Database,
    items: ItemRepo,
}

impl Repository {
    pub fn new(settings: RepositorySettings) -> Self {
        Self::with_opener(settings, ConnectionOpener::new())
    }

    /// Use a specific opener, e.g. one sharing its driver registry.
    pub fn with_opener(settings: RepositorySettings, opener: ConnectionOpener) -> Self {
        Self {
            settings,
            opener,
            state: None,
        }
    }

    pub fn settings(&self) -> &RepositorySettings {
        &self.settings
    }

    pub fn is_started(&self) -> bool {
        self.state.is_some()
    }

    /// Open the pool and bind sub-repositories.
    ///
    /// Fails with `AlreadyStarted` when called twice without `stop()`. On any
    /// failure nothing stays open.
    pub async fn start(&mut self) -> Result<()> {
        if self.state.is_some() {
            return Err(Error::AlreadyStarted);
        }
        self.settings.validate()?;

        let db = self.opener.open(&self.settings.connection).await?;

        if self.settings.migrations.enabled {
            if let Err(e) = migrate::run(&db, &self.settings.migrations).await {
                if e.is_irrecoverable() {
                    tracing::error!(error = %e, "schema left inconsistent, operator action required");
                }
                db.close().await;
                return Err(e.into());
            }
        }

        self.state = Some(Started {
            items: ItemRepo::new(db.clone()),
            db,
        });
        tracing::info!(app = %self.settings.connection.app_name, "repository started");
        Ok(())
    }

    /// Close the pool. A no-op when not started; safe to repeat.
    pub async fn stop(&mut self) -> Result<()> {
        if let Some(started) = self.state.take() {
            started.db.close().await;
            tracing::info!("repository stopped");
        }
        Ok(())
    }

    /// The live database handle.
    pub fn database(&self) -> Result<&Database> {
        self.state
            .as_ref()
            .map(|s| &s.db)
            .ok_or(Error::NotStarted)
    }

    /// Run pending migrations on demand.
    pub async fn migrate(&self) -> Result<MigrationReport> {
        let db = self.database()?;
        Ok(migrate::run(db, &self.settings.migrations).await?)
    }

    pub async fn migration_status(&self) -> Result<MigrationStatus> {
        let db = self.database()?;
        Ok(migrate::status(db, &self.settings.migrations).await?)
    }
}

#[async_trait]
impl Repos for Repository {
    fn items(&self) -> Result<&dyn ItemStore> {
        self.state
            .as_ref()
            .map(|s| &s.items as &dyn ItemStore)
            .ok_or(Error::NotStarted)
    }

    /// Ping bounded by the configured ping timeout.
    async fn health_check(&self) -> Result<()> {
        let db = self.database()?;
        match tokio::time::timeout(self.settings.connection.ping_timeout, db.ping()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(ConnectionError::Unavailable(e).into()),
            Err(_) => Err(ConnectionError::Unavailable(sqlx::Error::PoolTimedOut).into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Item;
    use crate::testing::{database_url, repository_settings};
    use std::time::Duration;

    fn unreachable() -> RepositorySettings {
        let mut settings = repository_settings("postgres://depot@127.0.0.1:1/depot");
        settings.connection.ping_timeout = Duration::from_secs(1);
        settings.connection.pool.acquire_timeout = Duration::from_millis(200);
        settings
    }

    #[tokio::test]
    async fn accessors_fail_loudly_before_start() {
        let repo = Repository::new(unreachable());

        assert!(matches!(repo.items(), Err(Error::NotStarted)));
        assert!(matches!(repo.database(), Err(Error::NotStarted)));
        assert!(matches!(repo.health_check().await, Err(Error::NotStarted)));
        assert!(matches!(repo.migrate().await, Err(Error::NotStarted)));
    }

    #[tokio::test]
    async fn stop_without_start_is_a_noop() {
        let mut repo = Repository::new(unreachable());
        repo.stop().await.unwrap();
        repo.stop().await.unwrap();
        assert!(!repo.is_started());
    }

    #[tokio::test]
    async fn invalid_settings_abort_start() {
        let mut settings = unreachable();
        settings.migrations.table = "bad table".into();
        let mut repo = Repository::new(settings);

        let err = repo.start().await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(!repo.is_started());
    }

    #[tokio::test]
    async fn unreachable_database_aborts_start() {
        let mut repo = Repository::new(unreachable());

        let err = repo.start().await.unwrap_err();
        assert!(matches!(err, Error::Connection(_)));
        assert!(matches!(repo.items(), Err(Error::NotStarted)));
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn start_stop_lifecycle() {
        let mut repo = Repository::new(repository_settings(&database_url()));
        repo.start().await.unwrap();
        assert!(matches!(repo.start().await, Err(Error::AlreadyStarted)));

        repo.health_check().await.unwrap();
        let status = repo.migration_status().await.unwrap();
        assert!(status.pending.is_empty());

        let id = repo.items().unwrap().create(&Item::named("lifecycle")).await.unwrap();
        assert!(repo.items().unwrap().delete(&id).await.unwrap());

        let db = repo.database().unwrap().clone();
        repo.stop().await.unwrap();
        assert!(db.is_closed());
        assert_eq!(db.pool().size(), 0);
        repo.stop().await.unwrap();
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn second_migration_run_is_noop() {
        let mut repo = Repository::new(repository_settings(&database_url()));
        repo.start().await.unwrap();

        let report = repo.migrate().await.unwrap();
        assert!(report.is_noop());
        assert_eq!(report.from, report.to);

        repo.stop().await.unwrap();
    }
}
