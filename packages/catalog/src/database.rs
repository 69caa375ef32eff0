use std::time::Duration;

use sea_orm::sea_query::{Index, PostgresQueryBuilder};
use sea_orm::{
    ColumnTrait, ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, EntityName,
};
use store::Viewer;
use tracing::{info, warn};

use crate::catalog::{Catalog, Postgres};
use crate::config::AppConfig;
use crate::entity::{family, genus, plant, species, variant};
use crate::error::CatalogResult;

pub async fn init_db(db_url: &str) -> Result<DatabaseConnection, DbErr> {
    let mut opt = ConnectOptions::new(db_url.to_owned());

    opt.max_connections(20)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(8))
        .acquire_timeout(Duration::from_secs(8))
        .idle_timeout(Duration::from_secs(300))
        .sqlx_logging(false);

    let db = Database::connect(opt).await?;
    db.get_schema_registry("catalog::entity::*")
        .sync(&db)
        .await?;

    Ok(db)
}

/// Create an index unless it exists. Failures are logged, not returned.
async fn ensure_index<E, C>(db: &DatabaseConnection, name: &str, table: E, columns: &[C])
where
    E: EntityName + 'static,
    C: ColumnTrait + Copy + 'static,
{
    let mut index = Index::create();
    index.if_not_exists().name(name).table(table);
    for column in columns {
        index.col(*column);
    }
    let stmt = index.to_string(PostgresQueryBuilder);

    match db.execute_unprepared(&stmt).await {
        Ok(_) => info!("Ensured index {} exists", name),
        Err(e) => warn!("Failed to create index {}: {}", name, e),
    }
}

/// Indexes the schema sync does not derive on its own.
///
/// Every listing filters on `owner_id`, and parent-scoped queries and name
/// checks filter on the parent key.
pub async fn ensure_indexes(db: &DatabaseConnection) -> Result<(), DbErr> {
    ensure_index(db, "idx_family_owner", family::Entity, &[family::Column::OwnerId]).await;
    ensure_index(db, "idx_variant_owner", variant::Entity, &[variant::Column::OwnerId]).await;
    ensure_index(
        db,
        "idx_genus_family_owner",
        genus::Entity,
        &[genus::Column::FamilyId, genus::Column::OwnerId],
    )
    .await;
    ensure_index(
        db,
        "idx_species_genus_owner",
        species::Entity,
        &[species::Column::GenusId, species::Column::OwnerId],
    )
    .await;
    ensure_index(
        db,
        "idx_plant_species_owner",
        plant::Entity,
        &[plant::Column::SpeciesId, plant::Column::OwnerId],
    )
    .await;

    Ok(())
}

/// Connect, sync the schema and build the repositories for the configured
/// session user.
pub async fn open_catalog(config: &AppConfig) -> CatalogResult<Catalog<Postgres>> {
    let db = init_db(&config.database.url).await?;
    ensure_indexes(&db).await?;

    let viewer = config.session.user_id.map(Viewer::user).unwrap_or_default();
    Ok(Catalog::connect(db, viewer, &config.repository))
}
