use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use common::EventBus;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use store::statistics::EntityStatistics;
use store::{
    CatalogEntity, ConnectivityStatus, HierarchicalEntity, HierarchicalRepository, MemoryTable,
    RemoteTable, Repository, RepositoryConfig, StatusFilter, Viewer, spawn_probe,
};
use tokio::task::JoinHandle;
use tracing::info;
use uuid::Uuid;

use crate::domain::{Family, Genus, Plant, Species, Variant};
use crate::error::CatalogError;
use crate::tables::{FamilyTable, GenusTable, PlantTable, SpeciesTable, VariantTable};

/// The table adapters a [`Catalog`] is built from.
pub trait Backend: 'static {
    type Families: RemoteTable<Entity = Family>;
    type Variants: RemoteTable<Entity = Variant>;
    type Genera: RemoteTable<Entity = Genus>;
    type Species: RemoteTable<Entity = Species>;
    type Plants: RemoteTable<Entity = Plant>;
}

/// Tables in a SeaORM database.
pub struct Postgres;

impl Backend for Postgres {
    type Families = FamilyTable;
    type Variants = VariantTable;
    type Genera = GenusTable;
    type Species = SpeciesTable;
    type Plants = PlantTable;
}

/// Process-local tables, for tests and demos.
pub struct InMemory;

impl Backend for InMemory {
    type Families = MemoryTable<Family>;
    type Variants = MemoryTable<Variant>;
    type Genera = MemoryTable<Genus>;
    type Species = MemoryTable<Species>;
    type Plants = MemoryTable<Plant>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Family,
    Variant,
    Genus,
    Species,
    Plant,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Family => Family::KIND,
            EntityKind::Variant => Variant::KIND,
            EntityKind::Genus => Genus::KIND,
            EntityKind::Species => Species::KIND,
            EntityKind::Plant => Plant::KIND,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "family" | "families" => Ok(EntityKind::Family),
            "variant" | "variants" => Ok(EntityKind::Variant),
            "genus" | "genera" => Ok(EntityKind::Genus),
            "species" => Ok(EntityKind::Species),
            "plant" | "plants" => Ok(EntityKind::Plant),
            other => Err(CatalogError::UnknownKind(other.to_string())),
        }
    }
}

/// Flattened row for listings.
#[derive(Debug, Clone, Serialize)]
pub struct ListRow {
    pub id: Uuid,
    pub name: String,
    /// Hydrated parent name, for hierarchical entities.
    pub parent: Option<String>,
    pub is_active: bool,
    pub is_favorite: bool,
    pub system_default: bool,
}

impl ListRow {
    fn flat<E: CatalogEntity>(entity: &E) -> Self {
        Self {
            id: entity.id(),
            name: entity.name().to_string(),
            parent: None,
            is_active: entity.is_active(),
            is_favorite: entity.is_favorite(),
            system_default: entity.is_system_default(),
        }
    }

    fn child<E: HierarchicalEntity>(entity: &E) -> Self {
        Self {
            parent: Some(entity.parent().label().to_string()),
            ..Self::flat(entity)
        }
    }
}

/// Every catalog repository, wired to share one event bus, one
/// connectivity indicator and the parent caches.
pub struct Catalog<B: Backend> {
    pub families: Arc<Repository<B::Families>>,
    pub variants: Arc<Repository<B::Variants>>,
    pub genera: HierarchicalRepository<B::Genera, B::Families>,
    pub species: HierarchicalRepository<B::Species, B::Genera>,
    pub plants: HierarchicalRepository<B::Plants, B::Species>,
    events: Arc<EventBus>,
    connectivity: ConnectivityStatus,
}

impl<B: Backend> Catalog<B> {
    pub fn from_tables(
        families: B::Families,
        variants: B::Variants,
        genera: B::Genera,
        species: B::Species,
        plants: B::Plants,
        config: &RepositoryConfig,
    ) -> Self {
        let events = Arc::new(EventBus::default());
        let connectivity = ConnectivityStatus::new();

        macro_rules! repo {
            ($table:expr) => {
                Arc::new(
                    Repository::new($table, config.clone())
                        .with_events(Arc::clone(&events))
                        .with_connectivity(connectivity.clone()),
                )
            };
        }

        let families = repo!(families);
        let genus_base = repo!(genera);
        let species_base = repo!(species);

        Self {
            genera: HierarchicalRepository::new(Arc::clone(&genus_base), Arc::clone(&families)),
            species: HierarchicalRepository::new(Arc::clone(&species_base), genus_base),
            plants: HierarchicalRepository::new(repo!(plants), species_base),
            variants: repo!(variants),
            families,
            events,
            connectivity,
        }
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn connectivity(&self) -> &ConnectivityStatus {
        &self.connectivity
    }

    /// Probe the store through the family table and record the result.
    pub async fn ping(&self) -> bool {
        self.families.test_connection().await
    }

    pub fn spawn_probe(&self, interval: Duration) -> JoinHandle<()> {
        spawn_probe(
            Arc::clone(self.families.table()),
            self.connectivity.clone(),
            interval,
        )
    }

    pub async fn statistics(&self, kind: EntityKind) -> EntityStatistics {
        match kind {
            EntityKind::Family => self.families.get_statistics().await,
            EntityKind::Variant => self.variants.get_statistics().await,
            EntityKind::Genus => self.genera.base().get_statistics().await,
            EntityKind::Species => self.species.base().get_statistics().await,
            EntityKind::Plant => self.plants.base().get_statistics().await,
        }
    }

    pub async fn list(&self, kind: EntityKind, search: &str, status: StatusFilter) -> Vec<ListRow> {
        match kind {
            EntityKind::Family => {
                let found = self.families.get_filtered(search, status).await;
                rows(found, ListRow::flat)
            }
            EntityKind::Variant => {
                let found = self.variants.get_filtered(search, status).await;
                rows(found, ListRow::flat)
            }
            EntityKind::Genus => {
                let found = self.genera.get_filtered(search, status).await;
                rows(found, ListRow::child)
            }
            EntityKind::Species => {
                let found = self.species.get_filtered(search, status).await;
                rows(found, ListRow::child)
            }
            EntityKind::Plant => {
                let found = self.plants.get_filtered(search, status).await;
                rows(found, ListRow::child)
            }
        }
    }

    /// Species under any genus of `family_id`.
    pub async fn species_in_family(&self, family_id: Uuid, include_inactive: bool) -> Vec<Species> {
        self.species
            .get_by_grandparent(family_id, include_inactive)
            .await
    }

    /// Plants under any species of `genus_id`.
    pub async fn plants_in_genus(&self, genus_id: Uuid, include_inactive: bool) -> Vec<Plant> {
        self.plants.get_by_grandparent(genus_id, include_inactive).await
    }

    /// Plants three levels down: family -> genera -> species -> plants.
    pub async fn plants_in_family(&self, family_id: Uuid, include_inactive: bool) -> Vec<Plant> {
        let genus_ids: HashSet<Uuid> = self
            .genera
            .base()
            .get_all(true)
            .await
            .iter()
            .filter(|g| g.parent_id() == family_id)
            .map(|g| g.id())
            .collect();
        if genus_ids.is_empty() {
            return Vec::new();
        }

        let species_ids: Vec<Uuid> = self
            .species
            .base()
            .get_all(true)
            .await
            .iter()
            .filter(|s| genus_ids.contains(&s.parent_id()))
            .map(|s| s.id())
            .collect();
        self.plants
            .get_by_parent_ids(&species_ids, include_inactive)
            .await
    }
}

fn rows<E>(entities: Vec<E>, to_row: fn(&E) -> ListRow) -> Vec<ListRow> {
    entities.iter().map(to_row).collect()
}

impl Catalog<Postgres> {
    /// Build every repository over `db` on behalf of `viewer`.
    pub fn connect(db: DatabaseConnection, viewer: Viewer, config: &RepositoryConfig) -> Self {
        let timeout = config.request_timeout();
        info!(
            user = ?viewer.user_id(),
            timeout_ms = config.request_timeout_ms,
            "Catalog repositories ready"
        );
        Self::from_tables(
            FamilyTable::new(db.clone(), viewer, timeout),
            VariantTable::new(db.clone(), viewer, timeout),
            GenusTable::new(db.clone(), viewer, timeout),
            SpeciesTable::new(db.clone(), viewer, timeout),
            PlantTable::new(db, viewer, timeout),
            config,
        )
    }
}

impl Catalog<InMemory> {
    pub fn in_memory(viewer: Viewer, config: &RepositoryConfig) -> Self {
        Self::from_tables(
            MemoryTable::new(viewer),
            MemoryTable::new(viewer),
            MemoryTable::new(viewer),
            MemoryTable::new(viewer),
            MemoryTable::new(viewer),
            config,
        )
    }
}
