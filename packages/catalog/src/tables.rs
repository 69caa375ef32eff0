//! Row mappings between the SeaORM entities and the domain types.

use sea_orm::ActiveValue::Set;
use store::sea::{ActiveModelOf, ColumnOf, ModelOf};
use store::{EntityRecord, ParentRef, SeaTable, TableMapping};

use crate::domain::{Family, Genus, Plant, Species, Variant};
use crate::entity::{family, genus, plant, species, variant};

pub type FamilyTable = SeaTable<FamilyMapping>;
pub type VariantTable = SeaTable<VariantMapping>;
pub type GenusTable = SeaTable<GenusMapping>;
pub type SpeciesTable = SeaTable<SpeciesMapping>;
pub type PlantTable = SeaTable<PlantMapping>;

/// Builds an [`EntityRecord`] from the columns every catalog table shares.
macro_rules! record_from {
    ($model:expr) => {
        EntityRecord {
            id: $model.id,
            owner: $model.owner_id,
            name: $model.name,
            description: $model.description,
            is_active: $model.is_active,
            is_favorite: $model.is_favorite,
            created_at: $model.created_at,
            updated_at: $model.updated_at,
        }
    };
}

/// Implements the column accessors of [`TableMapping`] for one table module.
macro_rules! common_columns {
    ($table:ident) => {
        fn id_column() -> ColumnOf<Self> {
            $table::Column::Id
        }
        fn owner_column() -> ColumnOf<Self> {
            $table::Column::OwnerId
        }
        fn name_column() -> ColumnOf<Self> {
            $table::Column::Name
        }
        fn active_column() -> ColumnOf<Self> {
            $table::Column::IsActive
        }
        fn created_at_column() -> ColumnOf<Self> {
            $table::Column::CreatedAt
        }
    };
}

pub struct FamilyMapping;

impl TableMapping for FamilyMapping {
    type Table = family::Entity;
    type Entity = Family;

    common_columns!(family);

    fn from_model(model: ModelOf<Self>) -> Family {
        Family {
            record: record_from!(model),
        }
    }

    fn to_active_model(entity: &Family) -> ActiveModelOf<Self> {
        let r = &entity.record;
        family::ActiveModel {
            id: Set(r.id),
            owner_id: Set(r.owner),
            name: Set(r.name.clone()),
            description: Set(r.description.clone()),
            is_active: Set(r.is_active),
            is_favorite: Set(r.is_favorite),
            created_at: Set(r.created_at),
            updated_at: Set(r.updated_at),
        }
    }
}

pub struct VariantMapping;

impl TableMapping for VariantMapping {
    type Table = variant::Entity;
    type Entity = Variant;

    common_columns!(variant);

    fn from_model(model: ModelOf<Self>) -> Variant {
        Variant {
            record: record_from!(model),
        }
    }

    fn to_active_model(entity: &Variant) -> ActiveModelOf<Self> {
        let r = &entity.record;
        variant::ActiveModel {
            id: Set(r.id),
            owner_id: Set(r.owner),
            name: Set(r.name.clone()),
            description: Set(r.description.clone()),
            is_active: Set(r.is_active),
            is_favorite: Set(r.is_favorite),
            created_at: Set(r.created_at),
            updated_at: Set(r.updated_at),
        }
    }
}

pub struct GenusMapping;

impl TableMapping for GenusMapping {
    type Table = genus::Entity;
    type Entity = Genus;

    common_columns!(genus);

    fn parent_column() -> Option<ColumnOf<Self>> {
        Some(genus::Column::FamilyId)
    }

    fn from_model(model: ModelOf<Self>) -> Genus {
        Genus {
            family: ParentRef::new(model.family_id),
            record: record_from!(model),
        }
    }

    fn to_active_model(entity: &Genus) -> ActiveModelOf<Self> {
        let r = &entity.record;
        genus::ActiveModel {
            id: Set(r.id),
            owner_id: Set(r.owner),
            name: Set(r.name.clone()),
            description: Set(r.description.clone()),
            is_active: Set(r.is_active),
            is_favorite: Set(r.is_favorite),
            family_id: Set(entity.family.id),
            created_at: Set(r.created_at),
            updated_at: Set(r.updated_at),
        }
    }
}

pub struct SpeciesMapping;

impl TableMapping for SpeciesMapping {
    type Table = species::Entity;
    type Entity = Species;

    common_columns!(species);

    fn parent_column() -> Option<ColumnOf<Self>> {
        Some(species::Column::GenusId)
    }

    fn from_model(model: ModelOf<Self>) -> Species {
        Species {
            genus: ParentRef::new(model.genus_id),
            common_name: model.common_name,
            record: record_from!(model),
        }
    }

    fn to_active_model(entity: &Species) -> ActiveModelOf<Self> {
        let r = &entity.record;
        species::ActiveModel {
            id: Set(r.id),
            owner_id: Set(r.owner),
            name: Set(r.name.clone()),
            description: Set(r.description.clone()),
            common_name: Set(entity.common_name.clone()),
            is_active: Set(r.is_active),
            is_favorite: Set(r.is_favorite),
            genus_id: Set(entity.genus.id),
            created_at: Set(r.created_at),
            updated_at: Set(r.updated_at),
        }
    }
}

pub struct PlantMapping;

impl TableMapping for PlantMapping {
    type Table = plant::Entity;
    type Entity = Plant;

    common_columns!(plant);

    fn parent_column() -> Option<ColumnOf<Self>> {
        Some(plant::Column::SpeciesId)
    }

    fn from_model(model: ModelOf<Self>) -> Plant {
        Plant {
            species: ParentRef::new(model.species_id),
            supplier: model.supplier,
            location: model.location,
            container_material: model.container_material,
            record: record_from!(model),
        }
    }

    fn to_active_model(entity: &Plant) -> ActiveModelOf<Self> {
        let r = &entity.record;
        plant::ActiveModel {
            id: Set(r.id),
            owner_id: Set(r.owner),
            name: Set(r.name.clone()),
            description: Set(r.description.clone()),
            supplier: Set(entity.supplier.clone()),
            location: Set(entity.location.clone()),
            container_material: Set(entity.container_material.clone()),
            is_active: Set(r.is_active),
            is_favorite: Set(r.is_favorite),
            species_id: Set(entity.species.id),
            created_at: Set(r.created_at),
            updated_at: Set(r.updated_at),
        }
    }
}
