use std::future::Future;
use std::marker::PhantomData;
use std::time::Duration;

use async_trait::async_trait;
use sea_orm::prelude::Expr;
use sea_orm::sea_query::Func;
use sea_orm::*;
use tracing::debug;
use uuid::Uuid;

use crate::entity::{CatalogEntity, NameScope, sort_by_name};
use crate::error::{StoreError, StoreResult};
use crate::table::RemoteTable;
use crate::visibility::Viewer;

pub type ModelOf<M> = <<M as TableMapping>::Table as EntityTrait>::Model;
pub type ActiveModelOf<M> = <<M as TableMapping>::Table as EntityTrait>::ActiveModel;
pub type ColumnOf<M> = <<M as TableMapping>::Table as EntityTrait>::Column;

/// Binds a domain entity to a SeaORM table.
///
/// Wire rows carry `id`, `owner_id`, `name`, `description`, `is_active`,
/// `is_favorite`, `created_at`, `updated_at` and, for hierarchical tables, a
/// non-null `<parent>_id` column.
pub trait TableMapping: Send + Sync + 'static {
    type Table: EntityTrait;
    type Entity: CatalogEntity;

    fn id_column() -> ColumnOf<Self>;
    fn owner_column() -> ColumnOf<Self>;
    fn name_column() -> ColumnOf<Self>;
    fn active_column() -> ColumnOf<Self>;
    fn created_at_column() -> ColumnOf<Self>;

    /// Foreign key to the parent table, for hierarchical entities.
    fn parent_column() -> Option<ColumnOf<Self>> {
        None
    }

    fn from_model(model: ModelOf<Self>) -> Self::Entity;
    fn to_active_model(entity: &Self::Entity) -> ActiveModelOf<Self>;
}

/// [`RemoteTable`] over a SeaORM connection.
pub struct SeaTable<M: TableMapping> {
    db: DatabaseConnection,
    viewer: Viewer,
    timeout: Duration,
    _mapping: PhantomData<fn() -> M>,
}

impl<M: TableMapping> SeaTable<M> {
    pub fn new(db: DatabaseConnection, viewer: Viewer, timeout: Duration) -> Self {
        Self {
            db,
            viewer,
            timeout,
            _mapping: PhantomData,
        }
    }

    /// `owner_id = current_user OR owner_id IS NULL`
    fn visible(&self) -> Condition {
        let owner = M::owner_column();
        match self.viewer.user_id() {
            Some(user) => Condition::any().add(owner.eq(user)).add(owner.is_null()),
            None => Condition::all().add(owner.is_null()),
        }
    }

    async fn bounded<T, F>(&self, fut: F) -> StoreResult<T>
    where
        F: Future<Output = Result<T, DbErr>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result.map_err(StoreError::from),
            Err(_) => Err(StoreError::Timeout(self.timeout)),
        }
    }

    fn not_editable(id: Uuid) -> StoreError {
        StoreError::NotFound(format!(
            "{} {} is not editable by the current user",
            M::Entity::KIND,
            id
        ))
    }
}

#[async_trait]
impl<M> RemoteTable for SeaTable<M>
where
    M: TableMapping,
    ModelOf<M>: IntoActiveModel<ActiveModelOf<M>> + Send + Sync,
    ActiveModelOf<M>: Send + Sync,
{
    type Entity = M::Entity;

    async fn list(&self, include_inactive: bool) -> StoreResult<Vec<M::Entity>> {
        let mut select = M::Table::find().filter(self.visible());
        if !include_inactive {
            select = select.filter(M::active_column().eq(true));
        }

        let rows = self.bounded(select.all(&self.db)).await?;
        let mut entities: Vec<M::Entity> = rows.into_iter().map(M::from_model).collect();
        sort_by_name(&mut entities);
        Ok(entities)
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<M::Entity>> {
        let row = self
            .bounded(
                M::Table::find()
                    .filter(M::id_column().eq(id))
                    .filter(self.visible())
                    .one(&self.db),
            )
            .await?;
        Ok(row.map(M::from_model))
    }

    async fn get_many(&self, ids: &[Uuid]) -> StoreResult<Vec<M::Entity>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = self
            .bounded(
                M::Table::find()
                    .filter(M::id_column().is_in(ids.to_vec()))
                    .filter(self.visible())
                    .all(&self.db),
            )
            .await?;
        Ok(rows.into_iter().map(M::from_model).collect())
    }

    async fn create(&self, entity: &M::Entity) -> StoreResult<M::Entity> {
        let owner = self.viewer.require_user()?;

        let mut row = entity.clone();
        row.record_mut().owner = Some(owner);
        let active = M::to_active_model(&row);

        let model = self.bounded(active.insert(&self.db)).await?;
        debug!(entity = M::Entity::KIND, id = %entity.id(), "Inserted row");
        Ok(M::from_model(model))
    }

    async fn update(&self, entity: &M::Entity) -> StoreResult<M::Entity> {
        let owner = self.viewer.require_user()?;

        // Identity, ownership and creation time never change on update.
        let mut active = M::to_active_model(entity);
        active.not_set(M::id_column());
        active.not_set(M::owner_column());
        active.not_set(M::created_at_column());

        let result = self
            .bounded(
                M::Table::update_many()
                    .set(active)
                    .filter(M::id_column().eq(entity.id()))
                    .filter(M::owner_column().eq(owner))
                    .exec(&self.db),
            )
            .await?;
        if result.rows_affected == 0 {
            return Err(Self::not_editable(entity.id()));
        }

        self.get(entity.id())
            .await?
            .ok_or_else(|| Self::not_editable(entity.id()))
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        let owner = self.viewer.require_user()?;
        let result = self
            .bounded(
                M::Table::delete_many()
                    .filter(M::id_column().eq(id))
                    .filter(M::owner_column().eq(owner))
                    .exec(&self.db),
            )
            .await?;
        Ok(result.rows_affected > 0)
    }

    async fn delete_many(&self, ids: &[Uuid]) -> StoreResult<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let owner = self.viewer.require_user()?;
        let result = self
            .bounded(
                M::Table::delete_many()
                    .filter(M::id_column().is_in(ids.to_vec()))
                    .filter(M::owner_column().eq(owner))
                    .exec(&self.db),
            )
            .await?;
        Ok(result.rows_affected as usize)
    }

    async fn name_exists(
        &self,
        name: &str,
        exclude_id: Option<Uuid>,
        scope: NameScope,
    ) -> StoreResult<bool> {
        let mut select = M::Table::find()
            .filter(
                Expr::expr(Func::lower(Expr::col(M::name_column())))
                    .eq(name.trim().to_lowercase()),
            )
            .filter(self.visible());

        if let NameScope::Parent(parent_id) = scope {
            let Some(parent) = M::parent_column() else {
                return Err(StoreError::Unknown(format!(
                    "{} has no parent column",
                    M::Entity::KIND
                )));
            };
            select = select.filter(parent.eq(parent_id));
        }
        if let Some(exclude_id) = exclude_id {
            select = select.filter(M::id_column().ne(exclude_id));
        }

        let count = self.bounded(select.count(&self.db)).await?;
        Ok(count > 0)
    }

    async fn test_connection(&self) -> bool {
        self.bounded(self.db.ping()).await.is_ok()
    }
}
