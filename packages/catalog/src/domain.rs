//! Botanical catalog entities.
//!
//! Families and variants are top-level. Genera, species and plants each
//! belong to one parent and are unique by name only among their siblings.

use serde::{Deserialize, Serialize};
use store::{CatalogEntity, EntityRecord, HierarchicalEntity, NameScope, ParentRef};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Family {
    #[serde(flatten)]
    pub record: EntityRecord,
}

impl Family {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            record: EntityRecord::new(name),
        }
    }
}

impl CatalogEntity for Family {
    const KIND: &'static str = "family";

    fn record(&self) -> &EntityRecord {
        &self.record
    }
    fn record_mut(&mut self) -> &mut EntityRecord {
        &mut self.record
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    #[serde(flatten)]
    pub record: EntityRecord,
}

impl Variant {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            record: EntityRecord::new(name),
        }
    }
}

impl CatalogEntity for Variant {
    const KIND: &'static str = "variant";

    fn record(&self) -> &EntityRecord {
        &self.record
    }
    fn record_mut(&mut self) -> &mut EntityRecord {
        &mut self.record
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Genus {
    #[serde(flatten)]
    pub record: EntityRecord,
    pub family: ParentRef,
}

impl Genus {
    pub fn new(name: impl Into<String>, family_id: Uuid) -> Self {
        Self {
            record: EntityRecord::new(name),
            family: ParentRef::new(family_id),
        }
    }
}

impl CatalogEntity for Genus {
    const KIND: &'static str = "genus";

    fn record(&self) -> &EntityRecord {
        &self.record
    }
    fn record_mut(&mut self) -> &mut EntityRecord {
        &mut self.record
    }
    fn name_scope(&self) -> NameScope {
        NameScope::Parent(self.family.id)
    }
}

impl HierarchicalEntity for Genus {
    type Parent = Family;

    fn parent(&self) -> &ParentRef {
        &self.family
    }
    fn parent_mut(&mut self) -> &mut ParentRef {
        &mut self.family
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Species {
    #[serde(flatten)]
    pub record: EntityRecord,
    pub genus: ParentRef,
    pub common_name: Option<String>,
}

impl Species {
    pub fn new(name: impl Into<String>, genus_id: Uuid) -> Self {
        Self {
            record: EntityRecord::new(name),
            genus: ParentRef::new(genus_id),
            common_name: None,
        }
    }

    pub fn with_common_name(mut self, common_name: impl Into<String>) -> Self {
        self.common_name = Some(common_name.into());
        self
    }

    /// "Monstera deliciosa" once the genus is hydrated.
    pub fn binomial(&self) -> String {
        format!("{} {}", self.genus.label(), self.record.name)
    }
}

impl CatalogEntity for Species {
    const KIND: &'static str = "species";

    fn record(&self) -> &EntityRecord {
        &self.record
    }
    fn record_mut(&mut self) -> &mut EntityRecord {
        &mut self.record
    }
    fn name_scope(&self) -> NameScope {
        NameScope::Parent(self.genus.id)
    }
    fn categories(&self) -> Vec<(&'static str, Option<String>)> {
        let has_common_name = self
            .common_name
            .as_deref()
            .is_some_and(|n| !n.trim().is_empty());
        vec![(
            "has_common_name",
            Some(if has_common_name { "yes" } else { "no" }.to_string()),
        )]
    }
}

impl HierarchicalEntity for Species {
    type Parent = Genus;

    fn parent(&self) -> &ParentRef {
        &self.genus
    }
    fn parent_mut(&mut self) -> &mut ParentRef {
        &mut self.genus
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plant {
    #[serde(flatten)]
    pub record: EntityRecord,
    pub species: ParentRef,
    pub supplier: Option<String>,
    pub location: Option<String>,
    pub container_material: Option<String>,
}

impl Plant {
    pub fn new(name: impl Into<String>, species_id: Uuid) -> Self {
        Self {
            record: EntityRecord::new(name),
            species: ParentRef::new(species_id),
            supplier: None,
            location: None,
            container_material: None,
        }
    }
}

impl CatalogEntity for Plant {
    const KIND: &'static str = "plant";

    fn record(&self) -> &EntityRecord {
        &self.record
    }
    fn record_mut(&mut self) -> &mut EntityRecord {
        &mut self.record
    }
    fn name_scope(&self) -> NameScope {
        NameScope::Parent(self.species.id)
    }
    fn categories(&self) -> Vec<(&'static str, Option<String>)> {
        vec![
            ("supplier", self.supplier.clone()),
            ("location", self.location.clone()),
            ("container_material", self.container_material.clone()),
        ]
    }
}

impl HierarchicalEntity for Plant {
    type Parent = Species;

    fn parent(&self) -> &ParentRef {
        &self.species
    }
    fn parent_mut(&mut self) -> &mut ParentRef {
        &mut self.species
    }
}

#[cfg(test)]
mod tests {
    use store::statistics::EntityStatistics;

    use super::*;

    #[test]
    fn hierarchical_names_are_scoped_to_parent() {
        let genus_id = Uuid::new_v4();
        let species = Species::new("deliciosa", genus_id);
        assert_eq!(species.name_scope(), NameScope::Parent(genus_id));
        assert_eq!(Family::new("Araceae").name_scope(), NameScope::Visibility);
    }

    #[test]
    fn binomial_uses_placeholder_until_hydrated() {
        let mut species = Species::new("deliciosa", Uuid::new_v4());
        assert_eq!(species.binomial(), "Unknown deliciosa");
        species.genus.resolve("Monstera");
        assert_eq!(species.binomial(), "Monstera deliciosa");
    }

    #[test]
    fn plant_breakdowns_bucket_missing_values() {
        let species_id = Uuid::new_v4();
        let mut terracotta = Plant::new("Big one", species_id);
        terracotta.container_material = Some("Terracotta".into());
        terracotta.supplier = Some("Local nursery".into());
        let mut plastic = Plant::new("Cutting", species_id);
        plastic.container_material = Some("Plastic".into());
        let bare = Plant::new("Bare root", species_id);

        let stats = EntityStatistics::from_snapshot(&[terracotta, plastic, bare]);

        let materials = stats.breakdown("container_material").unwrap();
        assert_eq!(materials["Terracotta"], 1);
        assert_eq!(materials["Plastic"], 1);
        assert_eq!(materials["Unspecified"], 1);
        assert_eq!(stats.breakdown("supplier").unwrap()["Unspecified"], 2);
    }

    #[test]
    fn species_report_common_name_presence() {
        let genus_id = Uuid::new_v4();
        let named = Species::new("deliciosa", genus_id).with_common_name("Swiss cheese plant");
        let blank = Species::new("adansonii", genus_id).with_common_name("  ");

        let stats = EntityStatistics::from_snapshot(&[named, blank]);
        let presence = stats.breakdown("has_common_name").unwrap();
        assert_eq!(presence["yes"], 1);
        assert_eq!(presence["no"], 1);
    }

    #[test]
    fn serializes_record_fields_inline() {
        let json = serde_json::to_value(Genus::new("Monstera", Uuid::new_v4())).unwrap();
        assert_eq!(json["name"], "Monstera");
        assert_eq!(json["is_active"], true);
        assert!(json["family"]["name"].is_null());
    }
}
