//! Cache-aside entity storage shared by every catalog entity type.
//!
//! A [`RemoteTable`] talks to the backing store for one entity type, a
//! [`Repository`] wraps it with an in-memory snapshot, retry and change
//! events, and a [`HierarchicalRepository`] adds parent-scoped queries and
//! bulk parent hydration on top.

mod cache;

pub mod capability;
pub mod config;
pub mod connectivity;
pub mod entity;
pub mod error;
pub mod hierarchy;
pub mod memory;
pub mod repository;
pub mod sea;
pub mod statistics;
pub mod table;
pub mod visibility;

pub use capability::{EntityStore, Favoritable};
pub use config::RepositoryConfig;
pub use connectivity::{ConnectivityStatus, spawn_probe};
pub use entity::{
    CatalogEntity, EntityRecord, HierarchicalEntity, NameScope, ParentRef, ValidationError,
};
pub use error::{ErrorKind, OperationResult, StoreError, StoreResult};
pub use hierarchy::HierarchicalRepository;
pub use memory::MemoryTable;
pub use repository::{NameCheck, Repository, StatusFilter};
pub use sea::{SeaTable, TableMapping};
pub use statistics::{Distribution, EntityStatistics, Statistics};
pub use table::RemoteTable;
pub use visibility::Viewer;
