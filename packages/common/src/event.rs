use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use uuid::Uuid;

/// A typed message carried on the [`EventBus`](crate::EventBus).
pub trait Event: Send + Sync + Sized + Serialize + DeserializeOwned {
    /// Topic the event is published on (e.g. "family", "species").
    fn topic(&self) -> &str;

    fn to_envelope(&self) -> Envelope {
        Envelope {
            topic: self.topic().to_string(),
            published_at: Utc::now(),
            payload: serde_json::to_value(self).unwrap_or_default(),
        }
    }

    fn from_envelope(envelope: &Envelope) -> Result<Self, serde_json::Error> {
        serde_json::from_value(envelope.payload.clone())
    }
}

/// Untyped form in which events travel between publisher and subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub topic: String,
    pub published_at: DateTime<Utc>,
    pub payload: serde_json::Value,
}

impl Event for Envelope {
    fn topic(&self) -> &str {
        &self.topic
    }

    fn to_envelope(&self) -> Envelope {
        self.clone()
    }

    fn from_envelope(envelope: &Envelope) -> Result<Self, serde_json::Error> {
        Ok(envelope.clone())
    }
}

/// What happened to the rows named in an [`EntityChanged`] event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
}

/// Published after a successful mutation so other views can refresh.
///
/// The topic is the entity kind (`"family"`, `"plant"`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityChanged {
    pub entity: String,
    pub kind: ChangeKind,
    pub ids: Vec<Uuid>,
}

impl EntityChanged {
    pub fn new(entity: impl Into<String>, kind: ChangeKind, ids: Vec<Uuid>) -> Self {
        Self {
            entity: entity.into(),
            kind,
            ids,
        }
    }
}

impl Event for EntityChanged {
    fn topic(&self) -> &str {
        &self.entity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_changed_travels_in_an_envelope() {
        let id = Uuid::new_v4();
        let event = EntityChanged::new("genus", ChangeKind::Updated, vec![id]);

        let envelope = event.to_envelope();
        assert_eq!(envelope.topic, "genus");
        assert_eq!(envelope.payload["kind"], "updated");

        let back = EntityChanged::from_envelope(&envelope).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn malformed_payload_is_rejected() {
        let envelope = Envelope {
            topic: "genus".into(),
            published_at: Utc::now(),
            payload: serde_json::json!({ "entity": "genus" }),
        };
        assert!(EntityChanged::from_envelope(&envelope).is_err());
    }
}
