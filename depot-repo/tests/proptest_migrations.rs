use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use depot_repo::migrate::{Migration, Migrator, SchemaStore};
use depot_repo::{LockError, MigrationError};
use proptest::prelude::*;

const OBJECTS: [&str; 8] = ["t1", "t2", "t3", "t4", "t5", "t6", "t7", "t8"];

// Schema store kept in memory; each migration creates/drops the object it names
#[derive(Default)]
struct MemoryStore {
    versions: BTreeSet<i64>,
    objects: BTreeSet<&'static str>,
    fail_at: Option<i64>,
    held: bool,
}

#[async_trait]
impl SchemaStore for MemoryStore {
    async fn lock(&mut self) -> Result<(), LockError> {
        self.held = true;
        Ok(())
    }

    async fn unlock(&mut self) -> Result<(), sqlx::Error> {
        self.held = false;
        Ok(())
    }

    async fn ensure_version_table(&mut self) -> Result<(), sqlx::Error> {
        Ok(())
    }

    async fn current_version(&mut self) -> Result<i64, sqlx::Error> {
        Ok(self.versions.last().copied().unwrap_or(0))
    }

    async fn apply(&mut self, m: &Migration) -> Result<(), sqlx::Error> {
        if self.fail_at == Some(m.version) {
            return Err(sqlx::Error::Protocol("injected".into()));
        }
        self.objects.insert(m.up);
        self.versions.insert(m.version);
        Ok(())
    }

    async fn revert(&mut self, m: &Migration) -> Result<(), sqlx::Error> {
        self.objects.remove(m.down);
        self.versions.remove(&m.version);
        Ok(())
    }
}

fn migration_set(n: usize) -> Vec<Migration> {
    OBJECTS[..n]
        .iter()
        .copied()
        .enumerate()
        .map(|(i, name)| Migration {
            version: i as i64 + 1,
            description: "generated",
            up: name,
            down: name,
        })
        .collect()
}

fn block_on<F: std::future::Future>(fut: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap()
        .block_on(fut)
}

// (set size, already applied, failing step) with applied < failing <= size
fn arb_failure() -> impl Strategy<Value = (usize, usize, usize)> {
    (1usize..=8).prop_flat_map(|n| (Just(n), 0..n)).prop_flat_map(|(n, applied)| {
        (Just(n), Just(applied), (applied + 1)..=n)
    })
}

proptest! {
    /// Property: a failed run leaves exactly the pre-run schema behind
    #[test]
    fn prop_failed_run_restores_pre_run_schema((n, applied, failing) in arb_failure()) {
        let set = migration_set(n);
        let mut store = MemoryStore::default();
        for m in &set[..applied] {
            store.versions.insert(m.version);
            store.objects.insert(m.up);
        }
        store.fail_at = Some(failing as i64);

        let migrator = Migrator::new(&set, Duration::from_secs(60)).unwrap();
        let err = block_on(migrator.run(&mut store)).unwrap_err();

        let rolled_back_to = match err {
            MigrationError::Failed { rolled_back_to, .. } => rolled_back_to,
            other => return Err(TestCaseError::fail(format!("unexpected {:?}", other))),
        };
        prop_assert_eq!(rolled_back_to, applied as i64);
        prop_assert_eq!(store.versions.len(), applied);
        let expected: BTreeSet<&str> = OBJECTS[..applied].iter().copied().collect();
        prop_assert_eq!(&store.objects, &expected);
        prop_assert!(!store.held);
    }

    /// Property: a successful run is followed by a no-op run
    #[test]
    fn prop_runs_are_idempotent(n in 0usize..=8, applied_frac in 0.0f64..=1.0) {
        let set = migration_set(n);
        let applied = (n as f64 * applied_frac) as usize;
        let mut store = MemoryStore::default();
        for m in &set[..applied] {
            store.versions.insert(m.version);
            store.objects.insert(m.up);
        }

        let migrator = Migrator::new(&set, Duration::from_secs(60)).unwrap();
        let first = block_on(migrator.run(&mut store)).unwrap();
        prop_assert_eq!(first.applied.len(), n - applied);
        prop_assert_eq!(first.to, n as i64);

        let second = block_on(migrator.run(&mut store)).unwrap();
        prop_assert!(second.is_noop());
        prop_assert_eq!(store.objects.len(), n);
    }
}
