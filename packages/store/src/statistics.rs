use std::collections::BTreeMap;

use serde::Serialize;

use crate::entity::CatalogEntity;

/// Bucket for entities with no value in a categorical field.
pub const UNSPECIFIED: &str = "Unspecified";

/// Count per categorical value.
pub type Distribution = BTreeMap<String, usize>;

/// Counts derived from a snapshot.
///
/// `active + inactive == total` and `system_default + user_created == total`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Statistics {
    pub total: usize,
    pub active: usize,
    pub inactive: usize,
    pub system_default: usize,
    pub user_created: usize,
    pub favorites: usize,
}

impl Statistics {
    pub fn from_snapshot<E: CatalogEntity>(snapshot: &[E]) -> Self {
        let mut stats = Statistics {
            total: snapshot.len(),
            ..Default::default()
        };
        for entity in snapshot {
            if entity.is_active() {
                stats.active += 1;
            } else {
                stats.inactive += 1;
            }
            if entity.is_system_default() {
                stats.system_default += 1;
            } else {
                stats.user_created += 1;
            }
            if entity.is_favorite() {
                stats.favorites += 1;
            }
        }
        stats
    }
}

/// Count entities by the value `key` extracts.
pub fn distribution<E, F>(snapshot: &[E], key: F) -> Distribution
where
    F: Fn(&E) -> Option<String>,
{
    let mut counts = Distribution::new();
    for entity in snapshot {
        let bucket = key(entity)
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| UNSPECIFIED.to_string());
        *counts.entry(bucket).or_default() += 1;
    }
    counts
}

/// Summary counts plus one distribution per categorical field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EntityStatistics {
    pub summary: Statistics,
    pub breakdowns: BTreeMap<String, Distribution>,
}

impl EntityStatistics {
    pub fn from_snapshot<E: CatalogEntity>(snapshot: &[E]) -> Self {
        let mut breakdowns: BTreeMap<String, Distribution> = BTreeMap::new();
        for entity in snapshot {
            for (field, value) in entity.categories() {
                let bucket = value
                    .filter(|v| !v.trim().is_empty())
                    .unwrap_or_else(|| UNSPECIFIED.to_string());
                *breakdowns
                    .entry(field.to_string())
                    .or_default()
                    .entry(bucket)
                    .or_default() += 1;
            }
        }
        Self {
            summary: Statistics::from_snapshot(snapshot),
            breakdowns,
        }
    }

    pub fn breakdown(&self, field: &str) -> Option<&Distribution> {
        self.breakdowns.get(field)
    }
}
