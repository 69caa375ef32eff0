use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "species")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub owner_id: Option<Uuid>,

    /// Specific epithet, e.g. "deliciosa".
    pub name: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    pub common_name: Option<String>,

    #[sea_orm(default_value = true)]
    pub is_active: bool,
    #[sea_orm(default_value = false)]
    pub is_favorite: bool,

    pub genus_id: Uuid,
    #[sea_orm(belongs_to, from = "genus_id", to = "id")]
    pub genus: HasOne<super::genus::Entity>,

    #[sea_orm(has_many)]
    pub plants: HasMany<super::plant::Entity>,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
