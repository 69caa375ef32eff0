use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Maximum name length, counted in characters after trimming.
pub const MAX_NAME_LEN: usize = 255;
/// Maximum description length in characters.
pub const MAX_DESCRIPTION_LEN: usize = 2000;
/// Label shown for a child whose parent could not be resolved.
pub const UNKNOWN_PARENT: &str = "Unknown";

/// A problem found by [`CatalogEntity::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("name is required")]
    MissingName,
    #[error("name must be at most {max} characters (got {actual})")]
    NameTooLong { max: usize, actual: usize },
    #[error("description must be at most {max} characters (got {actual})")]
    DescriptionTooLong { max: usize, actual: usize },
    #[error("created_at must not be after updated_at")]
    TimestampOrder,
}

/// Where a name has to be unique.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NameScope {
    /// Among all rows visible to the current viewer.
    Visibility,
    /// Among visible rows sharing the given parent.
    Parent(Uuid),
}

/// Fields every catalog row carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub id: Uuid,
    /// `None` marks a system-default row visible to everyone.
    pub owner: Option<Uuid>,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub is_favorite: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EntityRecord {
    /// A fresh, active, ownerless record with a client-generated id.
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            owner: None,
            name: name.into(),
            description: None,
            is_active: true,
            is_favorite: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn owned_by(mut self, owner: Uuid) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    /// Move `updated_at` forward. The new value is always strictly greater
    /// than the previous one, even when the clock has not advanced.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        let floor = self.updated_at + Duration::microseconds(1);
        self.updated_at = now.max(floor);
    }

    /// Trim surrounding whitespace from the name and drop blank descriptions.
    pub fn normalize(&mut self) {
        let trimmed = self.name.trim();
        if trimmed.len() != self.name.len() {
            self.name = trimmed.to_string();
        }
        if self
            .description
            .as_deref()
            .is_some_and(|d| d.trim().is_empty())
        {
            self.description = None;
        }
    }

    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = validate_name(&self.name);

        if let Some(description) = &self.description {
            let actual = description.chars().count();
            if actual > MAX_DESCRIPTION_LEN {
                errors.push(ValidationError::DescriptionTooLong {
                    max: MAX_DESCRIPTION_LEN,
                    actual,
                });
            }
        }
        if self.created_at > self.updated_at {
            errors.push(ValidationError::TimestampOrder);
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// Client-side name checks: present and within bounds after trimming.
pub fn validate_name(name: &str) -> Vec<ValidationError> {
    let name = name.trim();
    let actual = name.chars().count();
    if actual == 0 {
        vec![ValidationError::MissingName]
    } else if actual > MAX_NAME_LEN {
        vec![ValidationError::NameTooLong {
            max: MAX_NAME_LEN,
            actual,
        }]
    } else {
        Vec::new()
    }
}

/// The shape every cacheable catalog object satisfies.
pub trait CatalogEntity: Clone + Send + Sync + 'static {
    /// Short lowercase kind, used as event topic and in log fields.
    const KIND: &'static str;

    fn record(&self) -> &EntityRecord;
    fn record_mut(&mut self) -> &mut EntityRecord;

    fn id(&self) -> Uuid {
        self.record().id
    }

    fn owner(&self) -> Option<Uuid> {
        self.record().owner
    }

    fn name(&self) -> &str {
        &self.record().name
    }

    fn set_name(&mut self, name: impl Into<String>) {
        self.record_mut().name = name.into();
    }

    fn description(&self) -> Option<&str> {
        self.record().description.as_deref()
    }

    fn is_active(&self) -> bool {
        self.record().is_active
    }

    fn is_favorite(&self) -> bool {
        self.record().is_favorite
    }

    fn is_system_default(&self) -> bool {
        self.record().owner.is_none()
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.record().created_at
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.record().updated_at
    }

    fn clone_entity(&self) -> Self {
        self.clone()
    }

    /// Scope in which this entity's name must be unique.
    fn name_scope(&self) -> NameScope {
        NameScope::Visibility
    }

    /// Categorical fields used for statistics breakdowns.
    fn categories(&self) -> Vec<(&'static str, Option<String>)> {
        Vec::new()
    }

    /// Report every contract violation without side effects.
    fn validate(&self) -> Result<(), Vec<ValidationError>> {
        self.record().validate()
    }
}

/// Weak reference to a parent row: the id is authoritative, the name is a
/// read-side copy filled in by hydration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentRef {
    pub id: Uuid,
    pub name: Option<String>,
}

impl ParentRef {
    pub fn new(id: Uuid) -> Self {
        Self { id, name: None }
    }

    pub fn is_resolved(&self) -> bool {
        self.name.is_some()
    }

    /// Display label, falling back to [`UNKNOWN_PARENT`].
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(UNKNOWN_PARENT)
    }

    pub fn resolve(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
    }

    pub fn clear(&mut self) {
        self.name = None;
    }
}

/// An entity whose uniqueness and some queries are scoped to a parent.
pub trait HierarchicalEntity: CatalogEntity {
    type Parent: CatalogEntity;

    fn parent(&self) -> &ParentRef;
    fn parent_mut(&mut self) -> &mut ParentRef;

    fn parent_id(&self) -> Uuid {
        self.parent().id
    }
}

/// Sort by name, ordinal and case-insensitive, with the id as tiebreaker.
pub fn sort_by_name<E: CatalogEntity>(entities: &mut [E]) {
    entities.sort_by_cached_key(|e| (e.name().to_lowercase(), e.id()));
}
