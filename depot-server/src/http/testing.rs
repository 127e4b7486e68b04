//! In-memory repository for handler tests.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use depot_repo::{Error, Item, ItemCursor, ItemStore, Repos, Result};

/// Ids start at 42 so tests read like the API examples.
pub(crate) struct FakeItems {
    rows: Mutex<(i64, BTreeMap<i64, Item>)>,
}

impl Default for FakeItems {
    fn default() -> Self {
        Self {
            rows: Mutex::new((42, BTreeMap::new())),
        }
    }
}

#[async_trait]
impl ItemStore for FakeItems {
    async fn get(&self, id: &str) -> Result<Item> {
        let rows = self.rows.lock().unwrap();
        id.parse::<i64>()
            .ok()
            .and_then(|key| rows.1.get(&key).cloned())
            .ok_or_else(|| Error::not_found("item", id))
    }

    async fn create(&self, item: &Item) -> Result<String> {
        item.validate()?;
        let mut rows = self.rows.lock().unwrap();
        let key = rows.0;
        rows.0 += 1;
        rows.1.insert(
            key,
            Item {
                id: key.to_string(),
                ..item.clone()
            },
        );
        Ok(key.to_string())
    }

    async fn update(&self, item: &Item) -> Result<bool> {
        item.validate()?;
        let Ok(key) = item.id.parse::<i64>() else {
            return Ok(false);
        };
        let mut rows = self.rows.lock().unwrap();
        match rows.1.get_mut(&key) {
            Some(row) => {
                *row = item.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let mut rows = self.rows.lock().unwrap();
        Ok(id
            .parse::<i64>()
            .ok()
            .and_then(|key| rows.1.remove(&key))
            .is_some())
    }

    async fn list<'a>(&'a self) -> Result<ItemCursor<'a>> {
        let rows = self.rows.lock().unwrap();
        Ok(ItemCursor::from_items(rows.1.values().cloned().collect()))
    }
}

/// `items: None` behaves like a repository that was never started.
pub(crate) struct FakeRepos {
    pub items: Option<FakeItems>,
    pub healthy: bool,
}

impl FakeRepos {
    pub fn started() -> Self {
        Self {
            items: Some(FakeItems::default()),
            healthy: true,
        }
    }

    pub fn not_started() -> Self {
        Self {
            items: None,
            healthy: false,
        }
    }
}

#[async_trait]
impl Repos for FakeRepos {
    fn items(&self) -> Result<&dyn ItemStore> {
        self.items
            .as_ref()
            .map(|items| items as &dyn ItemStore)
            .ok_or(Error::NotStarted)
    }

    async fn health_check(&self) -> Result<()> {
        if self.healthy {
            Ok(())
        } else {
            Err(Error::NotStarted)
        }
    }
}
