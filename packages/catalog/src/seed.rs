use sea_orm::sea_query::OnConflict;
use sea_orm::*;
use store::{CatalogEntity, EntityRecord, TableMapping};
use tracing::info;
use uuid::Uuid;

use crate::domain::{Family, Variant};
use crate::entity::{family, variant};
use crate::tables::{FamilyMapping, VariantMapping};

/// Ownerless families every user sees. Ids are fixed so reseeding is a no-op.
const SYSTEM_FAMILIES: &[(u128, &str, &str)] = &[
    (0x0190_0000_0000_7000_8000_0000_0000_0101, "Araceae", "Aroids: monstera, philodendron"),
    (0x0190_0000_0000_7000_8000_0000_0000_0102, "Asparagaceae", "Snake plants, dracaena, hosta"),
    (0x0190_0000_0000_7000_8000_0000_0000_0103, "Begoniaceae", "Begonias"),
    (0x0190_0000_0000_7000_8000_0000_0000_0104, "Bromeliaceae", "Bromeliads and tillandsia"),
    (0x0190_0000_0000_7000_8000_0000_0000_0105, "Cactaceae", "Cacti"),
    (0x0190_0000_0000_7000_8000_0000_0000_0106, "Crassulaceae", "Stonecrops and jade plants"),
    (0x0190_0000_0000_7000_8000_0000_0000_0107, "Marantaceae", "Prayer plants and calatheas"),
    (0x0190_0000_0000_7000_8000_0000_0000_0108, "Moraceae", "Figs"),
    (0x0190_0000_0000_7000_8000_0000_0000_0109, "Orchidaceae", "Orchids"),
    (0x0190_0000_0000_7000_8000_0000_0000_010a, "Piperaceae", "Peperomia and pepper"),
];

const SYSTEM_VARIANTS: &[(u128, &str, &str)] = &[
    (0x0190_0000_0000_7000_8000_0000_0000_0201, "Albo Variegata", "White sectoral variegation"),
    (0x0190_0000_0000_7000_8000_0000_0000_0202, "Aurea", "Yellow or golden foliage"),
    (0x0190_0000_0000_7000_8000_0000_0000_0203, "Marginata", "Contrasting leaf margins"),
    (0x0190_0000_0000_7000_8000_0000_0000_0204, "Compacta", "Dwarf or compact habit"),
    (0x0190_0000_0000_7000_8000_0000_0000_0205, "Thai Constellation", "Cream speckled variegation"),
];

fn system_record(id: u128, name: &str, description: &str) -> EntityRecord {
    let mut record = EntityRecord::new(name).with_description(description);
    record.id = Uuid::from_u128(id);
    record
}

pub fn system_families() -> Vec<Family> {
    SYSTEM_FAMILIES
        .iter()
        .map(|&(id, name, description)| Family {
            record: system_record(id, name, description),
        })
        .collect()
}

pub fn system_variants() -> Vec<Variant> {
    SYSTEM_VARIANTS
        .iter()
        .map(|&(id, name, description)| Variant {
            record: system_record(id, name, description),
        })
        .collect()
}

/// Insert rows whose id is not taken yet. Returns how many were inserted.
async fn insert_missing<A>(
    db: &DatabaseConnection,
    rows: Vec<A>,
    id: <A::Entity as EntityTrait>::Column,
) -> Result<u32, DbErr>
where
    A: ActiveModelTrait + ActiveModelBehavior + Send,
{
    let mut inserted = 0u32;
    for row in rows {
        let result = <A::Entity as EntityTrait>::insert(row)
            .on_conflict(OnConflict::column(id).do_nothing().to_owned())
            .exec_without_returning(db)
            .await;

        match result {
            Ok(0) => {}
            Ok(_) => inserted += 1,
            Err(DbErr::RecordNotInserted) => {}
            Err(e) => return Err(e),
        }
    }
    Ok(inserted)
}

/// Seed the ownerless system-default families and variants.
pub async fn seed_system_defaults(db: &DatabaseConnection) -> Result<u32, DbErr> {
    let families: Vec<family::ActiveModel> = system_families()
        .iter()
        .map(FamilyMapping::to_active_model)
        .collect();
    let families_inserted = insert_missing(db, families, family::Column::Id).await?;
    if families_inserted > 0 {
        info!("Seeded {} new system families", families_inserted);
    }

    let variants: Vec<variant::ActiveModel> = system_variants()
        .iter()
        .map(VariantMapping::to_active_model)
        .collect();
    let variants_inserted = insert_missing(db, variants, variant::Column::Id).await?;
    if variants_inserted > 0 {
        info!("Seeded {} new system variants", variants_inserted);
    }

    Ok(families_inserted + variants_inserted)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn system_rows_are_valid_ownerless_and_unique() {
        let families = system_families();
        assert!(families.iter().all(|f| f.is_system_default()));
        assert!(families.iter().all(|f| f.validate().is_ok()));

        let lowered: HashSet<String> = families.iter().map(|f| f.name().to_lowercase()).collect();
        assert_eq!(lowered.len(), families.len());

        let ids: HashSet<Uuid> = families
            .iter()
            .map(|f| f.id())
            .chain(system_variants().iter().map(|v| v.id()))
            .collect();
        assert_eq!(ids.len(), SYSTEM_FAMILIES.len() + SYSTEM_VARIANTS.len());
    }

    #[test]
    fn seeded_ids_are_stable() {
        let araceae = &system_families()[0];
        assert_eq!(araceae.name(), "Araceae");
        assert_eq!(araceae.id(), Uuid::from_u128(SYSTEM_FAMILIES[0].0));
    }

    #[tokio::test]
    async fn reseeding_counts_only_new_rows() {
        let total = SYSTEM_FAMILIES.len() + SYSTEM_VARIANTS.len();
        let results = (0..total).map(|i| MockExecResult {
            last_insert_id: 0,
            // Only the first family is new this time.
            rows_affected: u64::from(i == 0),
        });
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results(results)
            .into_connection();

        assert_eq!(seed_system_defaults(&db).await.unwrap(), 1);

        let log = db.into_transaction_log();
        assert_eq!(log.len(), total);
        let first = &log[0].statements()[0].sql;
        assert!(first.starts_with(r#"INSERT INTO "family""#));
        assert!(first.contains("ON CONFLICT"));
    }
}
