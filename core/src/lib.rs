//! Embedded store and domain rules for the bua meal logger.
//!
//! The database lives in memory and is persisted as a whole image through an
//! [`ImageStore`]. Front ends go through [`AppContext`] to reach [`BuaService`].

pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod favorites_version;
pub mod migrate;
pub mod models;
pub mod repo;
pub mod seed;
pub mod service;
pub mod storage;
pub mod time;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::Limits;
pub use context::{AppContext, InitState};
pub use db::Database;
pub use error::{Error, Result};
pub use favorites_version::FavoritesVersion;
pub use service::{BuaService, Food, Outcome, OutcomeCode, Status};
pub use storage::{FileImageStore, ImageStore, MemoryImageStore};
