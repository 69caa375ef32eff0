use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::entity::{CatalogEntity, HierarchicalEntity, NameScope};
use crate::error::{StoreError, StoreResult};
use crate::repository::{NameCheck, Repository, StatusFilter};
use crate::table::RemoteTable;

/// Repository for entities that reference a parent row.
///
/// Children are cached by the inner [`Repository`] exactly as stored. Every
/// read hydrates the parent names in bulk: one lookup per call against the
/// parent repository's warm cache, or a single batched fetch when it is cold.
pub struct HierarchicalRepository<T: RemoteTable, P: RemoteTable> {
    base: Arc<Repository<T>>,
    parents: Arc<Repository<P>>,
}

impl<T, P> HierarchicalRepository<T, P>
where
    T: RemoteTable,
    T::Entity: HierarchicalEntity<Parent = P::Entity>,
    P: RemoteTable,
{
    pub fn new(base: Arc<Repository<T>>, parents: Arc<Repository<P>>) -> Self {
        Self { base, parents }
    }

    /// The underlying child repository, shared with deeper levels.
    pub fn base(&self) -> &Arc<Repository<T>> {
        &self.base
    }

    pub fn parents(&self) -> &Arc<Repository<P>> {
        &self.parents
    }

    /// Attach parent names to `children` in one pass.
    ///
    /// A child whose parent cannot be resolved keeps its place in the list
    /// with the placeholder label.
    pub async fn populate_parent_data(&self, children: Vec<T::Entity>) -> Vec<T::Entity> {
        self.hydrate(children).await
    }

    pub(crate) async fn hydrate(&self, mut children: Vec<T::Entity>) -> Vec<T::Entity> {
        self.attach_parents(&mut children).await;
        children
    }

    pub(crate) async fn hydrate_one(&self, child: T::Entity) -> T::Entity {
        let mut one = [child];
        self.attach_parents(&mut one).await;
        let [child] = one;
        child
    }

    async fn attach_parents(&self, children: &mut [T::Entity]) {
        if children.is_empty() {
            return;
        }
        let wanted: HashSet<Uuid> = children.iter().map(|c| c.parent_id()).collect();

        match self.parents.resolve_many(&wanted).await {
            Ok(parents) => {
                let mut unresolved = 0;
                for child in children.iter_mut() {
                    let parent_id = child.parent_id();
                    match parents.get(&parent_id) {
                        Some(parent) => child.parent_mut().resolve(parent.name()),
                        None => {
                            unresolved += 1;
                            child.parent_mut().clear();
                        }
                    }
                }
                if unresolved > 0 {
                    debug!(
                        entity = T::Entity::KIND,
                        unresolved, "Some parents could not be resolved"
                    );
                }
            }
            Err(e) => {
                warn!(
                    entity = T::Entity::KIND,
                    parents = wanted.len(),
                    error = %e,
                    "Parent hydration failed, using placeholders"
                );
                for child in children.iter_mut() {
                    child.parent_mut().clear();
                }
            }
        }
    }

    pub async fn get_all(&self, include_inactive: bool) -> Vec<T::Entity> {
        let children = self.base.get_all(include_inactive).await;
        self.hydrate(children).await
    }

    pub async fn get_filtered(&self, search_text: &str, status: StatusFilter) -> Vec<T::Entity> {
        let children = self.base.get_filtered(search_text, status).await;
        self.hydrate(children).await
    }

    pub async fn get_by_id(&self, id: Uuid) -> Option<T::Entity> {
        let child = self.base.get_by_id(id).await?;
        Some(self.hydrate_one(child).await)
    }

    fn children_of(
        children: Vec<T::Entity>,
        parent_ids: &HashSet<Uuid>,
    ) -> Vec<T::Entity> {
        children
            .into_iter()
            .filter(|c| parent_ids.contains(&c.parent_id()))
            .collect()
    }

    /// Children of one parent, filtered from the cached set.
    pub async fn get_by_parent_id(
        &self,
        parent_id: Uuid,
        include_inactive: bool,
    ) -> Vec<T::Entity> {
        self.get_by_parent_ids(&[parent_id], include_inactive).await
    }

    /// Children of any of `parent_ids`, filtered from the cached set.
    pub async fn get_by_parent_ids(
        &self,
        parent_ids: &[Uuid],
        include_inactive: bool,
    ) -> Vec<T::Entity> {
        if parent_ids.is_empty() {
            return Vec::new();
        }
        let wanted: HashSet<Uuid> = parent_ids.iter().copied().collect();
        let children = Self::children_of(self.base.get_all(include_inactive).await, &wanted);
        self.hydrate(children).await
    }

    pub async fn get_count_by_parent(&self, parent_id: Uuid, include_inactive: bool) -> usize {
        self.base
            .get_all(include_inactive)
            .await
            .iter()
            .filter(|c| c.parent_id() == parent_id)
            .count()
    }

    /// Case-insensitive name match among visible siblings under `parent_id`.
    pub async fn name_exists_in_parent(
        &self,
        name: &str,
        parent_id: Uuid,
        exclude_id: Option<Uuid>,
    ) -> StoreResult<bool> {
        self.base
            .name_exists_in(name, exclude_id, NameScope::Parent(parent_id))
            .await
    }

    pub async fn check_name_in_parent(
        &self,
        name: &str,
        parent_id: Uuid,
        exclude_id: Option<Uuid>,
    ) -> NameCheck {
        self.base
            .check_name(name, exclude_id, NameScope::Parent(parent_id))
            .await
    }

    async fn ensure_parent(&self, child: &T::Entity) -> StoreResult<()> {
        let parent_id = child.parent_id();
        if self.parents.try_get_by_id(parent_id).await?.is_none() {
            return Err(StoreError::NotFound(format!(
                "{} {} referenced by {} '{}'",
                P::Entity::KIND,
                parent_id,
                T::Entity::KIND,
                child.name()
            )));
        }
        Ok(())
    }

    /// Create a child under an existing, visible parent.
    pub async fn create(&self, child: T::Entity) -> StoreResult<T::Entity> {
        self.ensure_parent(&child).await?;
        let created = self.base.create(child).await?;
        Ok(self.hydrate_one(created).await)
    }

    pub async fn update(&self, child: T::Entity) -> StoreResult<T::Entity> {
        self.ensure_parent(&child).await?;
        let updated = self.base.update(child).await?;
        Ok(self.hydrate_one(updated).await)
    }
}

impl<T, P> HierarchicalRepository<T, P>
where
    T: RemoteTable,
    T::Entity: HierarchicalEntity<Parent = P::Entity>,
    P: RemoteTable,
    P::Entity: HierarchicalEntity,
{
    /// Children whose parent sits under `grandparent_id`.
    ///
    /// Lists the parents under the grandparent first, then filters children
    /// by that parent set; no grandparent key is stored on the child.
    pub async fn get_by_grandparent(
        &self,
        grandparent_id: Uuid,
        include_inactive: bool,
    ) -> Vec<T::Entity> {
        let parent_ids: Vec<Uuid> = self
            .parents
            .get_all(true)
            .await
            .iter()
            .filter(|p| p.parent_id() == grandparent_id)
            .map(|p| p.id())
            .collect();
        self.get_by_parent_ids(&parent_ids, include_inactive).await
    }
}
