use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use chrono::{DateTime, Utc};
use common::{ChangeKind, EntityChanged, EventBus, OperationClass, RetryPolicy};
use serde::Deserialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::cache::CacheState;
use crate::config::RepositoryConfig;
use crate::connectivity::ConnectivityStatus;
use crate::entity::{CatalogEntity, NameScope, ValidationError, validate_name};
use crate::error::{StoreError, StoreResult};
use crate::statistics::EntityStatistics;
use crate::table::RemoteTable;

/// Status filter applied at read time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusFilter {
    #[default]
    All,
    Active,
    Inactive,
}

impl StatusFilter {
    pub fn matches(self, is_active: bool) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Active => is_active,
            StatusFilter::Inactive => !is_active,
        }
    }
}

/// Outcome of a live name check during editing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameCheck {
    Available,
    Taken,
    /// Fails the client-side length rules.
    Invalid(Vec<ValidationError>),
    /// Passes the length rules but uniqueness could not be checked.
    Unverified(String),
}

/// Case-insensitive substring match on name and description.
pub fn matches_search<E: CatalogEntity>(entity: &E, needle: &str) -> bool {
    let needle = needle.trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }
    entity.name().to_lowercase().contains(&needle)
        || entity
            .description()
            .is_some_and(|d| d.to_lowercase().contains(&needle))
}

/// Cache-aside repository over one [`RemoteTable`].
///
/// The cache always holds the full visible set, active and inactive; filters
/// are applied on read. Loads and invalidations happen under the cache write
/// lock and mutations are serialized, so a reader sees either the whole old
/// snapshot or the whole new one. Successful mutations invalidate rather
/// than patch the snapshot.
pub struct Repository<T: RemoteTable> {
    table: Arc<T>,
    cache: RwLock<CacheState<T::Entity>>,
    writes: Mutex<()>,
    config: RepositoryConfig,
    retry: RetryPolicy,
    connectivity: ConnectivityStatus,
    events: Option<Arc<EventBus>>,
}

impl<T: RemoteTable> Repository<T> {
    pub fn new(table: T, config: RepositoryConfig) -> Self {
        Self::from_shared(Arc::new(table), config)
    }

    pub fn from_shared(table: Arc<T>, config: RepositoryConfig) -> Self {
        Self {
            table,
            cache: RwLock::new(CacheState::new()),
            writes: Mutex::new(()),
            retry: RetryPolicy::from_config(&config.retry),
            config,
            connectivity: ConnectivityStatus::new(),
            events: None,
        }
    }

    /// Publish [`EntityChanged`] events on `bus` after each mutation.
    pub fn with_events(mut self, bus: Arc<EventBus>) -> Self {
        self.events = Some(bus);
        self
    }

    /// Share one connectivity indicator between repositories.
    pub fn with_connectivity(mut self, status: ConnectivityStatus) -> Self {
        self.connectivity = status;
        self
    }

    pub fn table(&self) -> &Arc<T> {
        &self.table
    }

    pub fn connectivity(&self) -> &ConnectivityStatus {
        &self.connectivity
    }

    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    /// When the current snapshot was loaded, if the cache is warm.
    pub async fn cache_timestamp(&self) -> Option<DateTime<Utc>> {
        self.cache.read().await.loaded_at()
    }

    pub async fn is_cache_warm(&self) -> bool {
        self.cached().await.is_some()
    }

    /// Incremented on every invalidation.
    pub async fn cache_generation(&self) -> u64 {
        self.cache.read().await.generation()
    }

    async fn cached(&self) -> Option<Arc<Vec<T::Entity>>> {
        self.cache.read().await.fresh(self.config.cache_ttl())
    }

    fn note<V>(&self, result: &StoreResult<V>) {
        match result {
            Ok(_) => self.connectivity.set(true),
            Err(e) if e.is_connectivity() => self.connectivity.set(false),
            Err(_) => {}
        }
    }

    async fn load_all(&self) -> StoreResult<Vec<T::Entity>> {
        let result = self
            .retry
            .run("list", OperationClass::Standard, || self.table.list(true))
            .await;
        self.note(&result);
        result
    }

    /// The full snapshot, loading it if the cache is cold.
    async fn snapshot(&self) -> StoreResult<Arc<Vec<T::Entity>>> {
        if let Some(snapshot) = self.cached().await {
            return Ok(snapshot);
        }

        let mut cache = self.cache.write().await;
        // Another caller may have loaded it while we waited for the lock.
        if let Some(snapshot) = cache.fresh(self.config.cache_ttl()) {
            return Ok(snapshot);
        }
        let entities = self.load_all().await?;
        debug!(entity = T::Entity::KIND, rows = entities.len(), "Cache loaded");
        Ok(cache.store(entities))
    }

    pub async fn try_get_all(&self, include_inactive: bool) -> StoreResult<Vec<T::Entity>> {
        let snapshot = self.snapshot().await?;
        Ok(snapshot
            .iter()
            .filter(|e| include_inactive || e.is_active())
            .cloned()
            .collect())
    }

    /// Visible rows sorted by name. Degrades to an empty list when the store
    /// is unreachable.
    pub async fn get_all(&self, include_inactive: bool) -> Vec<T::Entity> {
        match self.try_get_all(include_inactive).await {
            Ok(entities) => entities,
            Err(e) => {
                warn!(
                    entity = T::Entity::KIND,
                    error = %e,
                    "Listing failed, returning empty result"
                );
                Vec::new()
            }
        }
    }

    pub async fn get_filtered(&self, search_text: &str, status: StatusFilter) -> Vec<T::Entity> {
        self.get_all(true)
            .await
            .into_iter()
            .filter(|e| status.matches(e.is_active()) && matches_search(e, search_text))
            .collect()
    }

    pub async fn try_get_by_id(&self, id: Uuid) -> StoreResult<Option<T::Entity>> {
        if let Some(snapshot) = self.cached().await {
            return Ok(snapshot.iter().find(|e| e.id() == id).cloned());
        }
        let result = self
            .retry
            .run("get", OperationClass::Standard, || self.table.get(id))
            .await;
        self.note(&result);
        result
    }

    pub async fn get_by_id(&self, id: Uuid) -> Option<T::Entity> {
        match self.try_get_by_id(id).await {
            Ok(entity) => entity,
            Err(e) => {
                warn!(entity = T::Entity::KIND, %id, error = %e, "Lookup failed");
                None
            }
        }
    }

    /// Resolve a set of ids in one step: from the warm snapshot, or with a
    /// single batched fetch when the cache is cold.
    pub async fn resolve_many(&self, ids: &HashSet<Uuid>) -> StoreResult<HashMap<Uuid, T::Entity>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        if let Some(snapshot) = self.cached().await {
            return Ok(snapshot
                .iter()
                .filter(|e| ids.contains(&e.id()))
                .map(|e| (e.id(), e.clone()))
                .collect());
        }

        let wanted: Vec<Uuid> = ids.iter().copied().collect();
        let result = self
            .retry
            .run("get_many", OperationClass::Standard, || {
                self.table.get_many(&wanted)
            })
            .await;
        self.note(&result);
        Ok(result?.into_iter().map(|e| (e.id(), e)).collect())
    }

    async fn ensure_writable(&self) -> StoreResult<()> {
        if !self.config.gate_writes_on_connectivity {
            return Ok(());
        }
        if self.test_connection().await {
            Ok(())
        } else {
            Err(StoreError::Network("remote store is unreachable".into()))
        }
    }

    async fn name_taken(
        &self,
        name: &str,
        exclude_id: Option<Uuid>,
        scope: NameScope,
    ) -> StoreResult<bool> {
        let result = self
            .retry
            .run("name_exists", OperationClass::Standard, || {
                self.table.name_exists(name, exclude_id, scope)
            })
            .await;
        self.note(&result);
        result
    }

    async fn ensure_unique(&self, entity: &T::Entity, exclude_id: Option<Uuid>) -> StoreResult<()> {
        if self
            .name_taken(entity.name(), exclude_id, entity.name_scope())
            .await?
        {
            return Err(StoreError::Conflict(format!(
                "a {} named '{}' already exists",
                T::Entity::KIND,
                entity.name()
            )));
        }
        Ok(())
    }

    async fn invalidate_locked(&self) {
        self.cache.write().await.invalidate();
    }

    /// A write that failed on connectivity may still have been applied, so
    /// the snapshot can no longer be trusted.
    async fn settle_failed_write(&self, error: &StoreError) {
        if error.is_connectivity() {
            warn!(
                entity = T::Entity::KIND,
                error = %error,
                "Write outcome unknown, dropping cache"
            );
            self.invalidate_locked().await;
        }
    }

    fn publish(&self, kind: ChangeKind, ids: Vec<Uuid>) {
        if let Some(bus) = &self.events {
            bus.publish(&EntityChanged::new(T::Entity::KIND, kind, ids));
        }
    }

    fn prepare(entity: &mut T::Entity) -> StoreResult<()> {
        entity.record_mut().normalize();
        entity.validate().map_err(StoreError::Validation)
    }

    /// Validate, insert, then invalidate the cache. A write that fails before
    /// reaching the store leaves the cache untouched.
    #[instrument(skip(self, entity), fields(entity = T::Entity::KIND, id = %entity.id()))]
    pub async fn create(&self, mut entity: T::Entity) -> StoreResult<T::Entity> {
        Self::prepare(&mut entity)?;

        let _guard = self.writes.lock().await;
        self.ensure_writable().await?;
        self.ensure_unique(&entity, None).await?;

        // An insert whose acknowledgement was lost must not turn into an id
        // conflict on the next attempt.
        let attempts = AtomicU8::new(0);
        let (attempts_ref, table, row) = (&attempts, &self.table, &entity);
        let result = self
            .retry
            .run("create", OperationClass::Standard, move || async move {
                if attempts_ref.fetch_add(1, Ordering::Relaxed) > 0
                    && let Some(stored) = table.get(row.id()).await?
                {
                    return Ok(stored);
                }
                table.create(row).await
            })
            .await;
        self.note(&result);
        let created = match result {
            Ok(created) => created,
            Err(e) => {
                self.settle_failed_write(&e).await;
                return Err(e);
            }
        };

        self.invalidate_locked().await;
        self.publish(ChangeKind::Created, vec![created.id()]);
        info!(name = %created.name(), "Created");
        Ok(created)
    }

    /// Full replace. System-default rows are read-only.
    #[instrument(skip(self, entity), fields(entity = T::Entity::KIND, id = %entity.id()))]
    pub async fn update(&self, mut entity: T::Entity) -> StoreResult<T::Entity> {
        if entity.is_system_default() {
            return Err(StoreError::Authorization(format!(
                "system default {} cannot be modified",
                T::Entity::KIND
            )));
        }
        Self::prepare(&mut entity)?;
        entity.record_mut().touch(Utc::now());

        let _guard = self.writes.lock().await;
        self.ensure_writable().await?;
        self.ensure_unique(&entity, Some(entity.id())).await?;

        let result = self
            .retry
            .run("update", OperationClass::Standard, || self.table.update(&entity))
            .await;
        self.note(&result);
        let updated = match result {
            Ok(updated) => updated,
            Err(e) => {
                self.settle_failed_write(&e).await;
                return Err(e);
            }
        };

        self.invalidate_locked().await;
        self.publish(ChangeKind::Updated, vec![updated.id()]);
        info!("Updated");
        Ok(updated)
    }

    /// Hard delete. Returns `Ok(false)` when no visible row has this id.
    #[instrument(skip(self), fields(entity = T::Entity::KIND))]
    pub async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        let _guard = self.writes.lock().await;

        let Some(target) = self.try_get_by_id(id).await? else {
            return Ok(false);
        };
        if target.is_system_default() {
            return Err(StoreError::Authorization(format!(
                "system default {} '{}' cannot be deleted",
                T::Entity::KIND,
                target.name()
            )));
        }
        self.ensure_writable().await?;

        let attempts = AtomicU8::new(0);
        let (attempts_ref, table) = (&attempts, &self.table);
        let result = self
            .retry
            .run("delete", OperationClass::Standard, move || async move {
                let retried = attempts_ref.fetch_add(1, Ordering::Relaxed) > 0;
                let deleted = table.delete(id).await?;
                // The row existed before the first attempt. If a retry finds
                // nothing to delete, the earlier attempt removed it.
                Ok::<_, StoreError>(deleted || (retried && table.get(id).await?.is_none()))
            })
            .await;
        self.note(&result);
        let deleted = match result {
            Ok(deleted) => deleted,
            Err(e) => {
                self.settle_failed_write(&e).await;
                return Err(e);
            }
        };

        if deleted {
            self.invalidate_locked().await;
            self.publish(ChangeKind::Deleted, vec![id]);
            info!("Deleted");
        }
        Ok(deleted)
    }

    /// Delete in fixed-size batches and invalidate once at the end.
    /// Returns the number of rows actually deleted.
    ///
    /// Only rows the viewer can delete are sent: ids that are unknown,
    /// invisible or system defaults are skipped up front.
    #[instrument(skip(self, ids), fields(entity = T::Entity::KIND, requested = ids.len()))]
    pub async fn delete_multiple(&self, ids: &[Uuid]) -> usize {
        let wanted: HashSet<Uuid> = ids.iter().copied().collect();
        if wanted.is_empty() {
            return 0;
        }

        let _guard = self.writes.lock().await;
        if let Err(e) = self.ensure_writable().await {
            warn!(error = %e, "Batch delete skipped");
            return 0;
        }

        let known = match self.resolve_many(&wanted).await {
            Ok(known) => known,
            Err(e) => {
                warn!(error = %e, "Batch delete skipped, rows could not be resolved");
                return 0;
            }
        };
        // Keep the caller's order so batches are deterministic.
        let mut seen = HashSet::new();
        let deletable: Vec<Uuid> = ids
            .iter()
            .copied()
            .filter(|id| seen.insert(*id))
            .filter(|id| known.get(id).is_some_and(|e| !e.is_system_default()))
            .collect();
        if deletable.len() < wanted.len() {
            debug!(
                skipped = wanted.len() - deletable.len(),
                "Skipping missing or system rows"
            );
        }

        let batch_size = self.config.delete_batch_size.max(1);
        let mut removed: Vec<Uuid> = Vec::with_capacity(deletable.len());
        for batch in deletable.chunks(batch_size) {
            match self.delete_batch(batch).await {
                Ok(gone) => removed.extend(gone),
                Err(e) => warn!(batch = batch.len(), error = %e, "Batch delete failed"),
            }
        }

        self.invalidate_locked().await;
        let deleted = removed.len();
        if deleted > 0 {
            self.publish(ChangeKind::Deleted, removed);
        }
        info!(deleted, "Batch delete finished");
        deleted
    }

    /// Delete one batch of rows known to exist and return the ids that are
    /// gone afterwards.
    async fn delete_batch(&self, batch: &[Uuid]) -> StoreResult<Vec<Uuid>> {
        let attempts = AtomicU8::new(0);
        let (attempts_ref, table) = (&attempts, &self.table);
        let result = self
            .retry
            .run("delete_many", OperationClass::Standard, move || async move {
                attempts_ref.fetch_add(1, Ordering::Relaxed);
                table.delete_many(batch).await
            })
            .await;
        self.note(&result);
        let deleted = result?;
        if deleted == batch.len() && attempts.load(Ordering::Relaxed) == 1 {
            return Ok(batch.to_vec());
        }

        // A retried call cannot count what an unacknowledged attempt
        // removed, and a short count may mean rows vanished meanwhile.
        let survivors: HashSet<Uuid> = self
            .table
            .get_many(batch)
            .await?
            .iter()
            .map(|e| e.id())
            .collect();
        Ok(batch
            .iter()
            .copied()
            .filter(|id| !survivors.contains(id))
            .collect())
    }

    /// Whether a visible row already uses `name`, ignoring `exclude_id`.
    pub async fn name_exists(&self, name: &str, exclude_id: Option<Uuid>) -> StoreResult<bool> {
        self.name_taken(name, exclude_id, NameScope::Visibility).await
    }

    pub(crate) async fn name_exists_in(
        &self,
        name: &str,
        exclude_id: Option<Uuid>,
        scope: NameScope,
    ) -> StoreResult<bool> {
        self.name_taken(name, exclude_id, scope).await
    }

    /// Live validation for edit forms. Offline, only the length rules run
    /// and the result says uniqueness could not be verified.
    pub async fn check_name(
        &self,
        name: &str,
        exclude_id: Option<Uuid>,
        scope: NameScope,
    ) -> NameCheck {
        let problems = validate_name(name);
        if !problems.is_empty() {
            return NameCheck::Invalid(problems);
        }
        match self.name_taken(name, exclude_id, scope).await {
            Ok(true) => NameCheck::Taken,
            Ok(false) => NameCheck::Available,
            Err(e) if e.is_connectivity() => {
                NameCheck::Unverified("cannot verify uniqueness - offline".into())
            }
            Err(e) => NameCheck::Unverified(e.to_string()),
        }
    }

    /// Drop the snapshot and reload it under the same lock.
    pub async fn refresh_cache(&self) -> StoreResult<()> {
        let mut cache = self.cache.write().await;
        cache.invalidate();
        let entities = self.load_all().await?;
        cache.store(entities);
        Ok(())
    }

    /// Drop the snapshot; the next read reloads it.
    pub async fn invalidate_cache(&self) {
        self.invalidate_locked().await;
    }

    pub async fn test_connection(&self) -> bool {
        let online = self.table.test_connection().await;
        self.connectivity.set(online);
        online
    }

    /// Counts and breakdowns over the full snapshot, warming it if cold.
    pub async fn get_statistics(&self) -> EntityStatistics {
        EntityStatistics::from_snapshot(&self.get_all(true).await)
    }

    /// Flip the favorite flag on a user-owned row.
    pub async fn toggle_favorite(&self, id: Uuid) -> StoreResult<T::Entity> {
        let mut entity = self
            .try_get_by_id(id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("{} {}", T::Entity::KIND, id)))?;
        let favorite = !entity.is_favorite();
        entity.record_mut().is_favorite = favorite;
        self.update(entity).await
    }

    pub async fn favorites(&self) -> Vec<T::Entity> {
        self.get_all(false)
            .await
            .into_iter()
            .filter(|e| e.is_favorite())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use common::config::RetryConfig;

    use super::*;
    use crate::entity::EntityRecord;
    use crate::error::ErrorKind;
    use crate::memory::MemoryTable;
    use crate::visibility::Viewer;

    #[derive(Clone, Debug)]
    struct Family(EntityRecord);

    impl CatalogEntity for Family {
        const KIND: &'static str = "family";
        fn record(&self) -> &EntityRecord {
            &self.0
        }
        fn record_mut(&mut self) -> &mut EntityRecord {
            &mut self.0
        }
    }

    fn family(name: &str) -> Family {
        Family(EntityRecord::new(name))
    }

    fn owned(name: &str, owner: Uuid) -> Family {
        Family(EntityRecord::new(name).owned_by(owner))
    }

    fn fast_config() -> RepositoryConfig {
        RepositoryConfig {
            retry: RetryConfig {
                delay_ms: 1,
                auth_delay_ms: 1,
                ..RetryConfig::default()
            },
            ..RepositoryConfig::default()
        }
    }

    fn repo(viewer: Viewer, rows: Vec<Family>) -> Repository<MemoryTable<Family>> {
        Repository::new(MemoryTable::new(viewer).with_rows(rows), fast_config())
    }

    fn names(entities: &[Family]) -> Vec<&str> {
        entities.iter().map(|e| e.name()).collect()
    }

    #[tokio::test]
    async fn visibility_follows_ownership() {
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let rows = vec![
            family("Orchidaceae"),
            owned("Alice Family", alice),
            owned("Bob Family", bob),
        ];
        let private_id = rows[1].id();

        let as_alice = repo(Viewer::user(alice), rows.clone());
        assert_eq!(names(&as_alice.get_all(true).await), ["Alice Family", "Orchidaceae"]);
        assert!(as_alice.get_by_id(private_id).await.is_some());

        let as_bob = repo(Viewer::user(bob), rows.clone());
        assert_eq!(names(&as_bob.get_all(true).await), ["Bob Family", "Orchidaceae"]);
        assert!(as_bob.get_by_id(private_id).await.is_none());

        let anonymous = repo(Viewer::anonymous(), rows);
        assert_eq!(names(&anonymous.get_all(true).await), ["Orchidaceae"]);
    }

    #[tokio::test]
    async fn warm_cache_serves_reads_without_remote_calls() {
        let user = Uuid::new_v4();
        let mut dormant = owned("Dormant", user);
        dormant.0.is_active = false;
        let repo = repo(Viewer::user(user), vec![family("Araceae"), dormant]);

        assert_eq!(repo.get_all(false).await.len(), 1);
        assert_eq!(repo.get_all(true).await.len(), 2);
        let _ = repo.get_filtered("ara", StatusFilter::All).await;
        assert_eq!(repo.table().calls("list"), 1);
        assert!(repo.cache_timestamp().await.is_some());
    }

    #[tokio::test]
    async fn get_by_id_on_cold_cache_does_not_warm_it() {
        let row = family("Cactaceae");
        let id = row.id();
        let repo = repo(Viewer::anonymous(), vec![row]);

        assert!(repo.get_by_id(id).await.is_some());
        assert_eq!(repo.table().calls("get"), 1);
        assert!(!repo.is_cache_warm().await);
    }

    #[tokio::test]
    async fn get_filtered_matches_name_description_and_status() {
        let user = Uuid::new_v4();
        let mut described = owned("Arum", user);
        described.0.description = Some("Aroid lily relatives".into());
        let mut inactive = owned("Lilium", user);
        inactive.0.is_active = false;
        let repo = repo(
            Viewer::user(user),
            vec![described, inactive, owned("Bromeliaceae", user)],
        );

        assert_eq!(names(&repo.get_filtered("LILY", StatusFilter::All).await), ["Arum"]);
        assert_eq!(names(&repo.get_filtered("lili", StatusFilter::Inactive).await), ["Lilium"]);
        assert!(repo.get_filtered("lili", StatusFilter::Active).await.is_empty());
        assert_eq!(repo.get_filtered("", StatusFilter::Active).await.len(), 2);
    }

    #[tokio::test]
    async fn create_is_visible_after_refresh() {
        let user = Uuid::new_v4();
        let repo = repo(Viewer::user(user), vec![family("Araceae")]);
        assert_eq!(repo.get_all(true).await.len(), 1);

        let created = repo.create(family("Orchidaceae")).await.unwrap();
        assert_eq!(created.owner(), Some(user));
        assert!(!repo.is_cache_warm().await);

        repo.refresh_cache().await.unwrap();
        let all = repo.get_all(true).await;
        assert!(all.iter().any(|e| e.id() == created.id()));
    }

    #[tokio::test]
    async fn names_are_unique_case_insensitively() {
        let user = Uuid::new_v4();
        let repo = repo(Viewer::user(user), vec![]);

        let original = repo.create(family("Orchidaceae")).await.unwrap();
        let err = repo.create(family("orchidaceae")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        assert!(repo.name_exists("ORCHIDACEAE", None).await.unwrap());
        assert!(!repo.name_exists("orchidaceae", Some(original.id())).await.unwrap());

        let mut renamed = original.clone();
        renamed.set_name("Orchidaceae ");
        assert!(repo.update(renamed).await.is_ok());
    }

    #[tokio::test]
    async fn validation_runs_before_any_remote_call() {
        let repo = repo(Viewer::user(Uuid::new_v4()), vec![]);

        let err = repo.create(family("  ")).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::Validation(ref v) if v == &[ValidationError::MissingName]
        ));
        assert_eq!(repo.table().calls("name_exists"), 0);
        assert_eq!(repo.table().calls("create"), 0);
    }

    #[tokio::test]
    async fn update_strictly_advances_updated_at() {
        let user = Uuid::new_v4();
        let repo = repo(Viewer::user(user), vec![]);
        let created = repo.create(family("Rosaceae")).await.unwrap();

        let mut edited = created.clone();
        edited.0.description = Some("Roses".into());
        let updated = repo.update(edited).await.unwrap();

        assert!(updated.updated_at() > created.updated_at());
        assert_eq!(updated.created_at(), created.created_at());
        assert!(updated.created_at() <= updated.updated_at());
    }

    #[tokio::test]
    async fn system_defaults_cannot_be_deleted_or_modified() {
        let system = family("Poaceae");
        let id = system.id();
        let repo = repo(Viewer::user(Uuid::new_v4()), vec![system.clone()]);

        let err = repo.delete(id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authorization);
        assert_eq!(repo.table().calls("delete"), 0);

        let err = repo.update(system).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authorization);

        assert!(repo.table().raw_rows().iter().any(|r| r.id() == id));
    }

    #[tokio::test]
    async fn delete_removes_row_after_refresh() {
        let user = Uuid::new_v4();
        let row = owned("Cactaceae", user);
        let id = row.id();
        let repo = repo(Viewer::user(user), vec![row]);

        assert!(repo.delete(id).await.unwrap());
        repo.refresh_cache().await.unwrap();
        assert!(repo.get_all(true).await.iter().all(|e| e.id() != id));

        assert!(!repo.delete(id).await.unwrap());
    }

    #[tokio::test]
    async fn batch_delete_uses_fixed_batches_and_one_invalidation() {
        let user = Uuid::new_v4();
        let rows: Vec<Family> = (0..120).map(|i| owned(&format!("F{i:03}"), user)).collect();
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id()).collect();
        let repo = repo(Viewer::user(user), rows);
        let generation = repo.cache_generation().await;

        let deleted = repo.delete_multiple(&ids).await;

        assert_eq!(deleted, 120);
        assert_eq!(repo.table().batch_sizes("delete_many"), [50, 50, 20]);
        assert_eq!(repo.cache_generation().await, generation + 1);
        assert!(repo.get_all(true).await.is_empty());
    }

    #[tokio::test]
    async fn batch_delete_counts_only_rows_that_existed() {
        let user = Uuid::new_v4();
        let row = owned("Only", user);
        let system = family("System");
        let ids = [row.id(), Uuid::new_v4(), system.id()];
        let repo = repo(Viewer::user(user), vec![row, system]);

        assert_eq!(repo.delete_multiple(&ids).await, 1);
        assert_eq!(repo.table().raw_rows().len(), 1);
    }

    #[tokio::test]
    async fn offline_reads_degrade_to_empty_and_flag_connectivity() {
        let repo = repo(Viewer::anonymous(), vec![family("Araceae")]);
        repo.table().set_online(false);

        assert!(repo.get_all(true).await.is_empty());
        assert!(!repo.connectivity().is_online());
        // One list call per retry attempt.
        assert_eq!(repo.table().calls("list"), 3);

        repo.table().set_online(true);
        assert_eq!(repo.get_all(true).await.len(), 1);
        assert!(repo.connectivity().is_online());
    }

    #[tokio::test]
    async fn failed_write_leaves_cache_untouched() {
        let user = Uuid::new_v4();
        let repo = repo(Viewer::user(user), vec![owned("Araceae", user)]);
        repo.get_all(true).await;
        let generation = repo.cache_generation().await;

        repo.table().set_online(false);
        let err = repo.create(family("Orchidaceae")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Network);

        assert!(repo.is_cache_warm().await);
        assert_eq!(repo.cache_generation().await, generation);
    }

    #[tokio::test]
    async fn gated_writes_refuse_when_offline() {
        let user = Uuid::new_v4();
        let config = RepositoryConfig {
            gate_writes_on_connectivity: true,
            ..fast_config()
        };
        let table = MemoryTable::<Family>::new(Viewer::user(user));
        table.set_online(false);
        let repo = Repository::new(table, config);

        let err = repo.create(family("Orchidaceae")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Network);
        assert_eq!(repo.table().calls("create"), 0);
        assert_eq!(repo.table().calls("name_exists"), 0);
    }

    #[tokio::test]
    async fn check_name_is_unverified_offline() {
        let repo = repo(Viewer::user(Uuid::new_v4()), vec![family("Araceae")]);

        assert_eq!(
            repo.check_name("araceae", None, NameScope::Visibility).await,
            NameCheck::Taken
        );
        assert_eq!(
            repo.check_name("Moraceae", None, NameScope::Visibility).await,
            NameCheck::Available
        );
        assert!(matches!(
            repo.check_name("", None, NameScope::Visibility).await,
            NameCheck::Invalid(_)
        ));

        repo.table().set_online(false);
        assert!(matches!(
            repo.check_name("Moraceae", None, NameScope::Visibility).await,
            NameCheck::Unverified(_)
        ));
    }

    #[tokio::test]
    async fn statistics_partitions_add_up() {
        let user = Uuid::new_v4();
        let mut inactive = owned("Dormant", user);
        inactive.0.is_active = false;
        let repo = repo(
            Viewer::user(user),
            vec![family("Araceae"), owned("Mine", user), inactive],
        );

        let stats = repo.get_statistics().await.summary;
        assert_eq!(stats.total, 3);
        assert_eq!(stats.active + stats.inactive, stats.total);
        assert_eq!(stats.system_default, 1);
        assert_eq!(stats.system_default + stats.user_created, stats.total);
    }

    #[tokio::test]
    async fn toggle_favorite_flips_flag_on_owned_rows() {
        let user = Uuid::new_v4();
        let row = owned("Mine", user);
        let system = family("Shared");
        let (id, system_id) = (row.id(), system.id());
        let repo = repo(Viewer::user(user), vec![row, system]);

        assert!(repo.toggle_favorite(id).await.unwrap().is_favorite());
        assert_eq!(names(&repo.favorites().await), ["Mine"]);
        assert!(!repo.toggle_favorite(id).await.unwrap().is_favorite());

        let err = repo.toggle_favorite(system_id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authorization);
    }

    #[tokio::test]
    async fn mutations_publish_change_events() {
        let user = Uuid::new_v4();
        let bus = Arc::new(EventBus::default());
        let mut changes = bus.subscribe::<EntityChanged>("family");
        let repo = repo(Viewer::user(user), vec![]).with_events(Arc::clone(&bus));

        let created = repo.create(family("Orchidaceae")).await.unwrap();
        let event = changes.recv().await.unwrap();
        assert_eq!(event.kind, ChangeKind::Created);
        assert_eq!(event.ids, vec![created.id()]);

        repo.delete(created.id()).await.unwrap();
        assert_eq!(changes.recv().await.unwrap().kind, ChangeKind::Deleted);
    }

    #[tokio::test]
    async fn cache_ttl_expires_snapshot() {
        let config = RepositoryConfig {
            cache_ttl_secs: Some(0),
            ..fast_config()
        };
        let repo = Repository::new(
            MemoryTable::new(Viewer::anonymous()).with_rows(vec![family("Araceae")]),
            config,
        );

        repo.get_all(true).await;
        tokio::time::sleep(Duration::from_millis(2)).await;
        repo.get_all(true).await;
        assert_eq!(repo.table().calls("list"), 2);
    }

    #[tokio::test]
    async fn concurrent_cold_reads_load_once() {
        let repo = Arc::new(repo(Viewer::anonymous(), vec![family("Araceae")]));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let repo = Arc::clone(&repo);
                tokio::spawn(async move { repo.get_all(true).await.len() })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.await.unwrap(), 1);
        }
        assert_eq!(repo.table().calls("list"), 1);
    }

    /// Applies writes but can drop the reply, like a connection reset after
    /// the server committed.
    struct LostAck {
        inner: MemoryTable<Family>,
        lost: AtomicU8,
    }

    impl LostAck {
        fn new(inner: MemoryTable<Family>) -> Self {
            Self {
                inner,
                lost: AtomicU8::new(0),
            }
        }

        fn lose_acks(&self, n: u8) {
            self.lost.store(n, Ordering::SeqCst);
        }

        fn ack<V>(&self, result: StoreResult<V>) -> StoreResult<V> {
            let value = result?;
            let dropped = self
                .lost
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if dropped {
                return Err(StoreError::Network("connection reset before reply".into()));
            }
            Ok(value)
        }
    }

    #[async_trait::async_trait]
    impl RemoteTable for LostAck {
        type Entity = Family;

        async fn list(&self, include_inactive: bool) -> StoreResult<Vec<Family>> {
            self.inner.list(include_inactive).await
        }

        async fn get(&self, id: Uuid) -> StoreResult<Option<Family>> {
            self.inner.get(id).await
        }

        async fn get_many(&self, ids: &[Uuid]) -> StoreResult<Vec<Family>> {
            self.inner.get_many(ids).await
        }

        async fn create(&self, entity: &Family) -> StoreResult<Family> {
            self.ack(self.inner.create(entity).await)
        }

        async fn update(&self, entity: &Family) -> StoreResult<Family> {
            self.ack(self.inner.update(entity).await)
        }

        async fn delete(&self, id: Uuid) -> StoreResult<bool> {
            self.ack(self.inner.delete(id).await)
        }

        async fn delete_many(&self, ids: &[Uuid]) -> StoreResult<usize> {
            self.ack(self.inner.delete_many(ids).await)
        }

        async fn name_exists(
            &self,
            name: &str,
            exclude_id: Option<Uuid>,
            scope: NameScope,
        ) -> StoreResult<bool> {
            self.inner.name_exists(name, exclude_id, scope).await
        }

        async fn test_connection(&self) -> bool {
            self.inner.test_connection().await
        }
    }

    fn lossy_repo(user: Uuid, rows: Vec<Family>) -> Repository<LostAck> {
        let table = MemoryTable::new(Viewer::user(user)).with_rows(rows);
        Repository::new(LostAck::new(table), fast_config())
    }

    #[tokio::test]
    async fn create_with_lost_reply_succeeds_and_shows_up() {
        let user = Uuid::new_v4();
        let repo = lossy_repo(user, vec![owned("Araceae", user)]);
        assert_eq!(repo.get_all(true).await.len(), 1);

        repo.table().lose_acks(1);
        let created = repo.create(family("Orchidaceae")).await.unwrap();

        assert_eq!(created.owner(), Some(user));
        assert_eq!(repo.table().inner.raw_rows().len(), 2);
        assert_eq!(repo.table().inner.calls("create"), 1);
        assert_eq!(names(&repo.get_all(true).await), ["Araceae", "Orchidaceae"]);
    }

    #[tokio::test]
    async fn delete_with_lost_reply_reports_deleted() {
        let user = Uuid::new_v4();
        let row = owned("Araceae", user);
        let id = row.id();
        let repo = lossy_repo(user, vec![row]);
        repo.get_all(true).await;

        repo.table().lose_acks(1);
        assert!(repo.delete(id).await.unwrap());
        assert!(repo.get_all(true).await.is_empty());
    }

    #[tokio::test]
    async fn batch_delete_with_lost_reply_counts_removed_rows() {
        let user = Uuid::new_v4();
        let rows: Vec<Family> = (0..3).map(|i| owned(&format!("F{i}"), user)).collect();
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id()).collect();
        let repo = lossy_repo(user, rows);

        repo.table().lose_acks(1);
        assert_eq!(repo.delete_multiple(&ids).await, 3);
        assert!(repo.table().inner.raw_rows().is_empty());
    }

    #[tokio::test]
    async fn write_with_unknown_outcome_drops_cache() {
        let user = Uuid::new_v4();
        let repo = lossy_repo(user, vec![owned("Araceae", user)]);
        let mut row = repo.get_all(true).await.remove(0);
        let generation = repo.cache_generation().await;

        repo.table().lose_acks(3);
        row.set_name("Aroids");
        let err = repo.update(row).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Network);
        assert!(!repo.is_cache_warm().await);
        assert_eq!(repo.cache_generation().await, generation + 1);
        assert_eq!(names(&repo.get_all(true).await), ["Aroids"]);
    }

    #[tokio::test]
    async fn batch_delete_announces_only_removed_ids() {
        let user = Uuid::new_v4();
        let row = owned("Mine", user);
        let system = family("System");
        let ids = [row.id(), Uuid::new_v4(), system.id()];
        let bus = Arc::new(EventBus::default());
        let mut changes = bus.subscribe::<EntityChanged>("family");
        let repo = repo(Viewer::user(user), vec![row.clone(), system]).with_events(bus);

        assert_eq!(repo.delete_multiple(&ids).await, 1);

        let event = changes.try_recv().unwrap();
        assert_eq!(event.kind, ChangeKind::Deleted);
        assert_eq!(event.ids, vec![row.id()]);
    }
}
