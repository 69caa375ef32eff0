use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A physical plant in the user's collection.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "plant")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub owner_id: Option<Uuid>,

    pub name: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,

    pub supplier: Option<String>,
    /// Where the plant is kept, e.g. "Living room".
    pub location: Option<String>,
    pub container_material: Option<String>,

    #[sea_orm(default_value = true)]
    pub is_active: bool,
    #[sea_orm(default_value = false)]
    pub is_favorite: bool,

    pub species_id: Uuid,
    #[sea_orm(belongs_to, from = "species_id", to = "id")]
    pub species: HasOne<super::species::Entity>,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
