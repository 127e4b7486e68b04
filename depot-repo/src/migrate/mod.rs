//! Versioned schema migrations with rollback.
//!
//! A run takes a cluster-wide lock, applies every migration newer than the
//! recorded version in ascending order, and on the first failure reverts what
//! this run applied so the schema ends where it started. If the rollback itself
//! fails the error is [`MigrationError::Irrecoverable`] and the schema needs an
//! operator.
//!
//! ```rust,ignore
//! let report = depot_repo::migrate::run(&db, &settings.migrations).await?;
//! println!("schema {} -> {}", report.from, report.to);
//! ```

mod runner;
mod store;

use std::collections::BTreeSet;

pub use runner::{MigrationReport, MigrationStatus, Migrator};
pub use store::{lock_key, PgSchemaStore, SchemaStore};

use crate::config::MigrationSettings;
use crate::db::Database;
use crate::error::MigrationError;

/// One schema change with explicit forward and reverse SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Migration {
    /// Positive, strictly increasing within a set
    pub version: i64,
    pub description: &'static str,
    pub up: &'static str,
    pub down: &'static str,
}

/// Schema of the item store, oldest first.
pub static ITEM_MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "create items",
        up: include_str!("../../migrations/0001_create_items.up.sql"),
        down: include_str!("../../migrations/0001_create_items.down.sql"),
    },
    Migration {
        version: 2,
        description: "index items by warehouse location",
        up: include_str!("../../migrations/0002_index_items_by_location.up.sql"),
        down: include_str!("../../migrations/0002_index_items_by_location.down.sql"),
    },
];

/// Check that versions are positive, unique and ascending.
pub fn validate(migrations: &[Migration]) -> Result<(), MigrationError> {
    let mut seen = BTreeSet::new();
    let mut previous = 0;

    for migration in migrations {
        if migration.version <= 0 {
            return Err(MigrationError::Invalid {
                reason: format!("version {} is not positive", migration.version),
            });
        }
        if !seen.insert(migration.version) {
            return Err(MigrationError::Invalid {
                reason: format!("version {} appears twice", migration.version),
            });
        }
        if migration.version < previous {
            return Err(MigrationError::Invalid {
                reason: format!(
                    "version {} follows {}, versions must ascend",
                    migration.version, previous
                ),
            });
        }
        previous = migration.version;
    }
    Ok(())
}

/// Bring the schema up to date on a dedicated connection from `db`'s pool.
pub async fn run(
    db: &Database,
    settings: &MigrationSettings,
) -> Result<MigrationReport, MigrationError> {
    let migrator = Migrator::new(ITEM_MIGRATIONS, settings.timeout)?;
    let mut store = PgSchemaStore::connect(db.pool(), &settings.table, settings.timeout)
        .await
        .map_err(MigrationError::Store)?;

    let outcome = migrator.run(&mut store).await;
    store.close().await;
    outcome
}

/// Current and pending versions, without taking the lock.
pub async fn status(
    db: &Database,
    settings: &MigrationSettings,
) -> Result<MigrationStatus, MigrationError> {
    let migrator = Migrator::new(ITEM_MIGRATIONS, settings.timeout)?;
    let mut store = PgSchemaStore::connect(db.pool(), &settings.table, settings.timeout)
        .await
        .map_err(MigrationError::Store)?;

    let outcome = migrator.status(&mut store).await;
    store.close().await;
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(version: i64) -> Migration {
        Migration {
            version,
            description: "test",
            up: "",
            down: "",
        }
    }

    #[test]
    fn embedded_set_is_valid() {
        assert!(validate(ITEM_MIGRATIONS).is_ok());
        assert!(ITEM_MIGRATIONS[0].up.contains("CREATE TABLE"));
        assert!(ITEM_MIGRATIONS[0].down.contains("DROP TABLE"));
    }

    // Steps fail on objects they did not create instead of adopting them.
    #[test]
    fn embedded_steps_never_adopt_existing_objects() {
        for migration in ITEM_MIGRATIONS {
            assert!(
                !migration.up.contains("IF NOT EXISTS"),
                "version {} forward step",
                migration.version
            );
            assert!(
                !migration.down.contains("IF EXISTS"),
                "version {} reverse step",
                migration.version
            );
        }
    }

    #[test]
    fn rejects_duplicates() {
        let err = validate(&[m(1), m(2), m(2)]).unwrap_err();
        assert!(matches!(err, MigrationError::Invalid { .. }));
    }

    #[test]
    fn rejects_descending_versions() {
        assert!(validate(&[m(2), m(1)]).is_err());
    }

    #[test]
    fn rejects_non_positive_versions() {
        assert!(validate(&[m(0)]).is_err());
        assert!(validate(&[m(-3), m(1)]).is_err());
    }

    #[test]
    fn gaps_are_allowed() {
        assert!(validate(&[m(1), m(5), m(20)]).is_ok());
        assert!(validate(&[]).is_ok());
    }
}
