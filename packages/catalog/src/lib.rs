//! Botanical catalog: families, variants, genera, species and plants on top
//! of the cache-aside repositories in `store`.

pub mod catalog;
pub mod config;
pub mod database;
pub mod domain;
pub mod entity;
pub mod error;
pub mod seed;
pub mod tables;

pub use catalog::{Backend, Catalog, EntityKind, InMemory, ListRow, Postgres};
pub use error::{CatalogError, CatalogResult};
