use async_trait::async_trait;
use uuid::Uuid;

use crate::entity::{CatalogEntity, NameScope};
use crate::error::StoreResult;

/// Raw access to the backing table of one entity type.
///
/// Every read applies the viewer's visibility filter. Implementations do not
/// retry; failures surface as typed [`StoreError`](crate::StoreError)s and
/// the repository decides what to do with them.
#[async_trait]
pub trait RemoteTable: Send + Sync + 'static {
    type Entity: CatalogEntity;

    /// All visible rows, sorted by name case-insensitively.
    async fn list(&self, include_inactive: bool) -> StoreResult<Vec<Self::Entity>>;

    async fn get(&self, id: Uuid) -> StoreResult<Option<Self::Entity>>;

    /// Visible rows among `ids`, fetched in one round-trip.
    async fn get_many(&self, ids: &[Uuid]) -> StoreResult<Vec<Self::Entity>>;

    /// Insert a row owned by the current viewer and return the stored row.
    async fn create(&self, entity: &Self::Entity) -> StoreResult<Self::Entity>;

    /// Replace the viewer's row with the same id and return the stored row.
    async fn update(&self, entity: &Self::Entity) -> StoreResult<Self::Entity>;

    /// Delete the viewer's row. Returns `false` if nothing was deleted.
    async fn delete(&self, id: Uuid) -> StoreResult<bool>;

    /// Delete the viewer's rows among `ids` in one round-trip.
    async fn delete_many(&self, ids: &[Uuid]) -> StoreResult<usize>;

    /// Case-insensitive name match within `scope`, ignoring `exclude_id`.
    async fn name_exists(
        &self,
        name: &str,
        exclude_id: Option<Uuid>,
        scope: NameScope,
    ) -> StoreResult<bool>;

    /// Lightweight round-trip used to tell network failures from others.
    async fn test_connection(&self) -> bool;
}
