//! Typed sub-repositories
//!
//! Pattern:
//! - one trait per entity (`ItemStore`) so handlers can be tested against fakes
//! - one PostgreSQL implementation per entity, bound to a [`crate::Database`]
//! - [`Repos`] exposes the accessors; adding an entity adds one method

mod cursor;
mod items;

use async_trait::async_trait;

pub use cursor::ItemCursor;
pub use items::{ItemRepo, LIST_PAGE_SIZE};

use crate::error::Result;
use crate::models::Item;

/// CRUD and streaming list over items.
#[async_trait]
pub trait ItemStore: Send + Sync {
    /// Fails with `NotFound` when no item has this id.
    async fn get(&self, id: &str) -> Result<Item>;

    /// Store a new item and return its server-assigned id.
    async fn create(&self, item: &Item) -> Result<String>;

    /// Overwrite the item with `item.id`. Returns `false` when no such item exists.
    async fn update(&self, item: &Item) -> Result<bool>;

    /// Remove an item. Returns `false` when no such item exists.
    async fn delete(&self, id: &str) -> Result<bool>;

    /// First page of items ordered by id.
    async fn list<'a>(&'a self) -> Result<ItemCursor<'a>>;
}

/// Sub-repositories of a started repository.
///
/// Every accessor fails with `NotStarted` until the repository is started.
#[async_trait]
pub trait Repos: Send + Sync {
    fn items(&self) -> Result<&dyn ItemStore>;

    /// Liveness of the backing database.
    async fn health_check(&self) -> Result<()>;
}
