pub mod config;
pub mod db;
pub mod error;
pub mod migrate;
pub mod models;
pub mod repos;
pub mod repository;

#[cfg(test)]
mod testing;

pub use config::{
    ConnectionSettings, MigrationSettings, PoolSettings, RepositorySettings, TraceSettings,
};
pub use db::{ConnectionOpener, Database, DriverRegistry};
pub use error::{
    ConnectionError, Error, LockError, MigrationError, Result, StepError, ValidationError,
};
pub use migrate::{MigrationReport, MigrationStatus};
pub use models::Item;
pub use repos::{ItemCursor, ItemStore, Repos, LIST_PAGE_SIZE};
pub use repository::Repository;
