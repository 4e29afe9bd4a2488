//! Wire types for messages delivered over the livetable push channel.
//!
//! The backend emits one JSON object per mutation, tagged by `type`:
//!
//! ```json
//! {"type":"upsert","resource":"users","entity":{"id":"u-1"},"previousStatus":null,"newStatus":"active"}
//! {"type":"remove","resource":"users","id":"u-1","previousStatus":"deleted"}
//! ```
//!
//! The entity payload stays untyped here; consumers decode it into their own
//! record types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lifecycle status as carried on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireStatus {
    Active,
    Deleted,
}

/// One push-channel message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PushMessage {
    /// The entity was created, edited, soft-deleted or restored.
    #[serde(rename_all = "camelCase")]
    Upsert {
        resource: String,
        entity: Value,
        #[serde(default)]
        previous_status: Option<WireStatus>,
        new_status: WireStatus,
    },
    /// The entity was permanently deleted.
    #[serde(rename_all = "camelCase")]
    Remove {
        resource: String,
        id: String,
        previous_status: WireStatus,
    },
}

impl PushMessage {
    /// Parse a raw transport frame.
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Resource collection the message targets (e.g. `users`).
    pub fn resource(&self) -> &str {
        match self {
            PushMessage::Upsert { resource, .. } | PushMessage::Remove { resource, .. } => {
                resource
            }
        }
    }

    /// Entity id the message is keyed by, when present.
    pub fn entity_id(&self) -> Option<&str> {
        match self {
            PushMessage::Upsert { entity, .. } => entity.get("id").and_then(Value::as_str),
            PushMessage::Remove { id, .. } => Some(id),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            PushMessage::Upsert { .. } => "upsert",
            PushMessage::Remove { .. } => "remove",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_creation_upsert_with_null_previous_status() {
        let raw = r#"{"type":"upsert","resource":"tags","entity":{"id":"t-1","name":"rust"},"previousStatus":null,"newStatus":"active"}"#;
        let message = PushMessage::parse(raw).expect("valid upsert");

        assert_eq!(message.kind(), "upsert");
        assert_eq!(message.resource(), "tags");
        assert_eq!(message.entity_id(), Some("t-1"));
        match message {
            PushMessage::Upsert {
                previous_status,
                new_status,
                ..
            } => {
                assert_eq!(previous_status, None);
                assert_eq!(new_status, WireStatus::Active);
            }
            PushMessage::Remove { .. } => panic!("expected upsert"),
        }
    }

    #[test]
    fn missing_previous_status_reads_as_creation() {
        let raw = r#"{"type":"upsert","resource":"tags","entity":{"id":"t-1"},"newStatus":"deleted"}"#;
        let message = PushMessage::parse(raw).expect("valid upsert");
        assert!(matches!(
            message,
            PushMessage::Upsert {
                previous_status: None,
                new_status: WireStatus::Deleted,
                ..
            }
        ));
    }

    #[test]
    fn parses_remove() {
        let raw = r#"{"type":"remove","resource":"users","id":"u-9","previousStatus":"deleted"}"#;
        let message = PushMessage::parse(raw).expect("valid remove");
        assert_eq!(
            message,
            PushMessage::Remove {
                resource: "users".to_string(),
                id: "u-9".to_string(),
                previous_status: WireStatus::Deleted,
            }
        );
    }

    #[test]
    fn rejects_unknown_type_and_missing_fields() {
        assert!(PushMessage::parse(r#"{"type":"patch","resource":"users"}"#).is_err());
        assert!(PushMessage::parse(r#"{"type":"remove","resource":"users"}"#).is_err());
        assert!(PushMessage::parse("not json").is_err());
    }

    #[test]
    fn upsert_without_string_id_has_no_entity_id() {
        let message = PushMessage::Upsert {
            resource: "users".to_string(),
            entity: serde_json::json!({ "id": 7 }),
            previous_status: None,
            new_status: WireStatus::Active,
        };
        assert_eq!(message.entity_id(), None);
    }
}
