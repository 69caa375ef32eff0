//! Capability traits for code that works with any repository kind.

use async_trait::async_trait;
use uuid::Uuid;

use crate::entity::{CatalogEntity, HierarchicalEntity, NameScope};
use crate::error::StoreResult;
use crate::hierarchy::HierarchicalRepository;
use crate::repository::{Repository, StatusFilter};
use crate::statistics::EntityStatistics;
use crate::table::RemoteTable;

/// Read, write and cache operations shared by flat and hierarchical
/// repositories.
#[async_trait]
pub trait EntityStore<E: CatalogEntity>: Send + Sync {
    async fn get_all(&self, include_inactive: bool) -> Vec<E>;
    async fn get_filtered(&self, search_text: &str, status: StatusFilter) -> Vec<E>;
    async fn get_by_id(&self, id: Uuid) -> Option<E>;
    async fn create(&self, entity: E) -> StoreResult<E>;
    async fn update(&self, entity: E) -> StoreResult<E>;
    async fn delete(&self, id: Uuid) -> StoreResult<bool>;
    async fn delete_multiple(&self, ids: &[Uuid]) -> usize;
    /// Case-insensitive name match within `scope`. Hierarchical entities
    /// are unique per parent, so pass [`NameScope::Parent`] for them.
    async fn name_exists(
        &self,
        name: &str,
        exclude_id: Option<Uuid>,
        scope: NameScope,
    ) -> StoreResult<bool>;
    async fn refresh_cache(&self) -> StoreResult<()>;
    async fn invalidate_cache(&self);
    async fn test_connection(&self) -> bool;
    async fn get_statistics(&self) -> EntityStatistics;
}

/// Entities a user can pin as favorites.
#[async_trait]
pub trait Favoritable<E: CatalogEntity>: Send + Sync {
    /// Flip the flag and return the stored row.
    async fn toggle_favorite(&self, id: Uuid) -> StoreResult<E>;
    /// Active favorites, sorted by name.
    async fn favorites(&self) -> Vec<E>;
}

#[async_trait]
impl<T: RemoteTable> EntityStore<T::Entity> for Repository<T> {
    async fn get_all(&self, include_inactive: bool) -> Vec<T::Entity> {
        Repository::get_all(self, include_inactive).await
    }

    async fn get_filtered(&self, search_text: &str, status: StatusFilter) -> Vec<T::Entity> {
        Repository::get_filtered(self, search_text, status).await
    }

    async fn get_by_id(&self, id: Uuid) -> Option<T::Entity> {
        Repository::get_by_id(self, id).await
    }

    async fn create(&self, entity: T::Entity) -> StoreResult<T::Entity> {
        Repository::create(self, entity).await
    }

    async fn update(&self, entity: T::Entity) -> StoreResult<T::Entity> {
        Repository::update(self, entity).await
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        Repository::delete(self, id).await
    }

    async fn delete_multiple(&self, ids: &[Uuid]) -> usize {
        Repository::delete_multiple(self, ids).await
    }

    async fn name_exists(
        &self,
        name: &str,
        exclude_id: Option<Uuid>,
        scope: NameScope,
    ) -> StoreResult<bool> {
        self.name_exists_in(name, exclude_id, scope).await
    }

    async fn refresh_cache(&self) -> StoreResult<()> {
        Repository::refresh_cache(self).await
    }

    async fn invalidate_cache(&self) {
        Repository::invalidate_cache(self).await
    }

    async fn test_connection(&self) -> bool {
        Repository::test_connection(self).await
    }

    async fn get_statistics(&self) -> EntityStatistics {
        Repository::get_statistics(self).await
    }
}

#[async_trait]
impl<T: RemoteTable> Favoritable<T::Entity> for Repository<T> {
    async fn toggle_favorite(&self, id: Uuid) -> StoreResult<T::Entity> {
        Repository::toggle_favorite(self, id).await
    }

    async fn favorites(&self) -> Vec<T::Entity> {
        Repository::favorites(self).await
    }
}

#[async_trait]
impl<T, P> EntityStore<T::Entity> for HierarchicalRepository<T, P>
where
    T: RemoteTable,
    T::Entity: HierarchicalEntity<Parent = P::Entity>,
    P: RemoteTable,
{
    async fn get_all(&self, include_inactive: bool) -> Vec<T::Entity> {
        HierarchicalRepository::get_all(self, include_inactive).await
    }

    async fn get_filtered(&self, search_text: &str, status: StatusFilter) -> Vec<T::Entity> {
        HierarchicalRepository::get_filtered(self, search_text, status).await
    }

    async fn get_by_id(&self, id: Uuid) -> Option<T::Entity> {
        HierarchicalRepository::get_by_id(self, id).await
    }

    async fn create(&self, entity: T::Entity) -> StoreResult<T::Entity> {
        HierarchicalRepository::create(self, entity).await
    }

    async fn update(&self, entity: T::Entity) -> StoreResult<T::Entity> {
        HierarchicalRepository::update(self, entity).await
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        self.base().delete(id).await
    }

    async fn delete_multiple(&self, ids: &[Uuid]) -> usize {
        self.base().delete_multiple(ids).await
    }

    async fn name_exists(
        &self,
        name: &str,
        exclude_id: Option<Uuid>,
        scope: NameScope,
    ) -> StoreResult<bool> {
        self.base().name_exists_in(name, exclude_id, scope).await
    }

    async fn refresh_cache(&self) -> StoreResult<()> {
        self.base().refresh_cache().await
    }

    async fn invalidate_cache(&self) {
        self.base().invalidate_cache().await
    }

    async fn test_connection(&self) -> bool {
        self.base().test_connection().await
    }

    async fn get_statistics(&self) -> EntityStatistics {
        self.base().get_statistics().await
    }
}

#[async_trait]
impl<T, P> Favoritable<T::Entity> for HierarchicalRepository<T, P>
where
    T: RemoteTable,
    T::Entity: HierarchicalEntity<Parent = P::Entity>,
    P: RemoteTable,
{
    async fn toggle_favorite(&self, id: Uuid) -> StoreResult<T::Entity> {
        let toggled = self.base().toggle_favorite(id).await?;
        Ok(self.hydrate_one(toggled).await)
    }

    async fn favorites(&self) -> Vec<T::Entity> {
        let favorites = self.base().favorites().await;
        self.hydrate(favorites).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use common::config::RetryConfig;

    use super::*;
    use crate::config::RepositoryConfig;
    use crate::entity::EntityRecord;
    use crate::memory::MemoryTable;
    use crate::visibility::Viewer;

    #[derive(Clone, Debug)]
    struct Variant(EntityRecord);

    impl CatalogEntity for Variant {
        const KIND: &'static str = "variant";
        fn record(&self) -> &EntityRecord {
            &self.0
        }
        fn record_mut(&mut self) -> &mut EntityRecord {
            &mut self.0
        }
    }

    async fn favorite_names<S>(store: &S) -> Vec<String>
    where
        S: Favoritable<Variant> + ?Sized,
    {
        store
            .favorites()
            .await
            .into_iter()
            .map(|v| v.name().to_string())
            .collect()
    }

    #[tokio::test]
    async fn repositories_are_usable_through_trait_objects() {
        let user = Uuid::new_v4();
        let config = RepositoryConfig {
            retry: RetryConfig {
                delay_ms: 1,
                ..RetryConfig::default()
            },
            ..RepositoryConfig::default()
        };
        let repo = Arc::new(Repository::new(MemoryTable::new(Viewer::user(user)), config));

        let store: Arc<dyn EntityStore<Variant>> = repo.clone();
        let variegata = store
            .create(Variant(EntityRecord::new("Variegata")))
            .await
            .unwrap();
        store.create(Variant(EntityRecord::new("Aurea"))).await.unwrap();
        assert_eq!(store.get_all(true).await.len(), 2);

        let favorites: Arc<dyn Favoritable<Variant>> = repo;
        favorites.toggle_favorite(variegata.id()).await.unwrap();
        assert_eq!(favorite_names(favorites.as_ref()).await, ["Variegata"]);
    }
}
