use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use uuid::Uuid;

use crate::entity::{CatalogEntity, NameScope, sort_by_name};
use crate::error::{StoreError, StoreResult};
use crate::table::RemoteTable;
use crate::visibility::Viewer;

#[derive(Default)]
struct CallLog {
    counts: HashMap<&'static str, usize>,
    batches: HashMap<&'static str, Vec<usize>>,
}

/// In-process [`RemoteTable`] that applies the same visibility and
/// ownership rules as the database adapter.
///
/// Every call is counted, batched calls record their batch size, and the
/// table can be taken offline to exercise degraded paths.
pub struct MemoryTable<E: CatalogEntity> {
    viewer: Viewer,
    rows: Mutex<Vec<E>>,
    online: AtomicBool,
    calls: Mutex<CallLog>,
}

impl<E: CatalogEntity> MemoryTable<E> {
    pub fn new(viewer: Viewer) -> Self {
        Self {
            viewer,
            rows: Mutex::new(Vec::new()),
            online: AtomicBool::new(true),
            calls: Mutex::new(CallLog::default()),
        }
    }

    /// Insert rows as-is, bypassing ownership rules. Used for system rows
    /// and rows belonging to other users.
    pub fn seed(&self, rows: impl IntoIterator<Item = E>) {
        self.lock_rows().extend(rows);
    }

    pub fn with_rows(self, rows: impl IntoIterator<Item = E>) -> Self {
        self.seed(rows);
        self
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Number of calls made to `operation` (e.g. `"list"`, `"get_many"`).
    pub fn calls(&self, operation: &str) -> usize {
        let log = self.calls.lock().unwrap_or_else(|e| e.into_inner());
        log.counts.get(operation).copied().unwrap_or(0)
    }

    /// Batch sizes passed to a batched operation, in call order.
    pub fn batch_sizes(&self, operation: &str) -> Vec<usize> {
        let log = self.calls.lock().unwrap_or_else(|e| e.into_inner());
        log.batches.get(operation).cloned().unwrap_or_default()
    }

    /// Every row, regardless of visibility.
    pub fn raw_rows(&self) -> Vec<E> {
        self.lock_rows().clone()
    }

    fn lock_rows(&self) -> std::sync::MutexGuard<'_, Vec<E>> {
        self.rows.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn record(&self, operation: &'static str, batch: Option<usize>) -> StoreResult<()> {
        {
            let mut log = self.calls.lock().unwrap_or_else(|e| e.into_inner());
            *log.counts.entry(operation).or_default() += 1;
            if let Some(size) = batch {
                log.batches.entry(operation).or_default().push(size);
            }
        }
        if self.online.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Network(format!(
                "{} table is unreachable",
                E::KIND
            )))
        }
    }

    fn visible(&self, row: &E) -> bool {
        self.viewer.can_see(row.owner())
    }
}

#[async_trait]
impl<E: CatalogEntity> RemoteTable for MemoryTable<E> {
    type Entity = E;

    async fn list(&self, include_inactive: bool) -> StoreResult<Vec<E>> {
        self.record("list", None)?;
        let mut rows: Vec<E> = self
            .lock_rows()
            .iter()
            .filter(|r| self.visible(r) && (include_inactive || r.is_active()))
            .cloned()
            .collect();
        sort_by_name(&mut rows);
        Ok(rows)
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<E>> {
        self.record("get", None)?;
        Ok(self
            .lock_rows()
            .iter()
            .find(|r| r.id() == id && self.visible(r))
            .cloned())
    }

    async fn get_many(&self, ids: &[Uuid]) -> StoreResult<Vec<E>> {
        self.record("get_many", Some(ids.len()))?;
        Ok(self
            .lock_rows()
            .iter()
            .filter(|r| ids.contains(&r.id()) && self.visible(r))
            .cloned()
            .collect())
    }

    async fn create(&self, entity: &E) -> StoreResult<E> {
        self.record("create", None)?;
        let owner = self.viewer.require_user()?;

        let mut rows = self.lock_rows();
        if rows.iter().any(|r| r.id() == entity.id()) {
            return Err(StoreError::Conflict(format!(
                "{} {} already exists",
                E::KIND,
                entity.id()
            )));
        }
        let mut stored = entity.clone();
        stored.record_mut().owner = Some(owner);
        rows.push(stored.clone());
        Ok(stored)
    }

    async fn update(&self, entity: &E) -> StoreResult<E> {
        self.record("update", None)?;
        let owner = self.viewer.require_user()?;

        let mut rows = self.lock_rows();
        let Some(row) = rows
            .iter_mut()
            .find(|r| r.id() == entity.id() && r.owner() == Some(owner))
        else {
            return Err(StoreError::NotFound(format!(
                "{} {} is not editable by the current user",
                E::KIND,
                entity.id()
            )));
        };
        let created_at = row.created_at();
        let mut stored = entity.clone();
        stored.record_mut().owner = Some(owner);
        stored.record_mut().created_at = created_at;
        *row = stored.clone();
        Ok(stored)
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        self.record("delete", None)?;
        let owner = self.viewer.require_user()?;

        let mut rows = self.lock_rows();
        let before = rows.len();
        rows.retain(|r| !(r.id() == id && r.owner() == Some(owner)));
        Ok(rows.len() < before)
    }

    async fn delete_many(&self, ids: &[Uuid]) -> StoreResult<usize> {
        self.record("delete_many", Some(ids.len()))?;
        let owner = self.viewer.require_user()?;

        let mut rows = self.lock_rows();
        let before = rows.len();
        rows.retain(|r| !(ids.contains(&r.id()) && r.owner() == Some(owner)));
        Ok(before - rows.len())
    }

    async fn name_exists(
        &self,
        name: &str,
        exclude_id: Option<Uuid>,
        scope: NameScope,
    ) -> StoreResult<bool> {
        self.record("name_exists", None)?;
        let needle = name.trim().to_lowercase();
        Ok(self.lock_rows().iter().any(|r| {
            let in_scope = match scope {
                NameScope::Visibility => true,
                NameScope::Parent(_) => r.name_scope() == scope,
            };
            self.visible(r)
                && in_scope
                && Some(r.id()) != exclude_id
                && r.name().to_lowercase() == needle
        }))
    }

    async fn test_connection(&self) -> bool {
        self.record("test_connection", None).is_ok()
    }
}
