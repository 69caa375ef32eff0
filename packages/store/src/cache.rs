use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use crate::entity::{CatalogEntity, sort_by_name};

struct Snapshot<E> {
    entities: Arc<Vec<E>>,
    loaded_at: DateTime<Utc>,
    loaded: Instant,
}

/// Full unfiltered set of visible rows, or nothing when cold.
pub(crate) struct CacheState<E> {
    snapshot: Option<Snapshot<E>>,
    generation: u64,
}

impl<E: CatalogEntity> CacheState<E> {
    pub(crate) fn new() -> Self {
        Self {
            snapshot: None,
            generation: 0,
        }
    }

    /// The snapshot, unless it is absent or older than `ttl`.
    pub(crate) fn fresh(&self, ttl: Option<Duration>) -> Option<Arc<Vec<E>>> {
        let snapshot = self.snapshot.as_ref()?;
        if let Some(ttl) = ttl
            && snapshot.loaded.elapsed() >= ttl
        {
            return None;
        }
        Some(Arc::clone(&snapshot.entities))
    }

    pub(crate) fn store(&mut self, mut entities: Vec<E>) -> Arc<Vec<E>> {
        sort_by_name(&mut entities);
        let entities = Arc::new(entities);
        self.snapshot = Some(Snapshot {
            entities: Arc::clone(&entities),
            loaded_at: Utc::now(),
            loaded: Instant::now(),
        });
        entities
    }

    pub(crate) fn invalidate(&mut self) {
        self.snapshot = None;
        self.generation += 1;
    }

    pub(crate) fn loaded_at(&self) -> Option<DateTime<Utc>> {
        self.snapshot.as_ref().map(|s| s.loaded_at)
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }
}
