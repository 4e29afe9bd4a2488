//! View cache events.
//!
//! Typed push events folded into cached views, plus the receipt envelope the
//! subscription adapter wraps them in.

use std::fmt;

use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::entities::ViewEntity;
use crate::domain::types::LifecycleStatus;

/// Monotonic receipt counter for events seen by one adapter.
pub type Epoch = u64;

/// Discriminator used to register observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    Upsert,
    Remove,
}

impl EventType {
    pub fn as_str(self) -> &'static str {
        match self {
            EventType::Upsert => "upsert",
            EventType::Remove => "remove",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A change pushed by the backend for one entity.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewEvent<E> {
    /// The entity now looks like `entity` (create, edit, soft-delete, restore).
    ///
    /// `previous_status` is `None` when the entity did not exist before.
    Upsert {
        entity: E,
        previous_status: Option<LifecycleStatus>,
        new_status: LifecycleStatus,
    },
    /// The entity no longer exists anywhere.
    Remove {
        id: String,
        previous_status: LifecycleStatus,
    },
}

impl<E: ViewEntity> ViewEvent<E> {
    pub fn upsert(entity: E, previous_status: Option<LifecycleStatus>) -> Self {
        let new_status = entity.lifecycle_status();
        Self::Upsert {
            entity,
            previous_status,
            new_status,
        }
    }

    pub fn remove(id: impl Into<String>, previous_status: LifecycleStatus) -> Self {
        Self::Remove {
            id: id.into(),
            previous_status,
        }
    }

    pub fn event_type(&self) -> EventType {
        match self {
            ViewEvent::Upsert { .. } => EventType::Upsert,
            ViewEvent::Remove { .. } => EventType::Remove,
        }
    }

    pub fn entity_id(&self) -> &str {
        match self {
            ViewEvent::Upsert { entity, .. } => entity.id(),
            ViewEvent::Remove { id, .. } => id,
        }
    }

    /// True when an upsert flips the lifecycle (soft-delete or restore).
    pub fn is_status_move(&self) -> bool {
        matches!(
            self,
            ViewEvent::Upsert {
                previous_status: Some(previous),
                new_status,
                ..
            } if previous != new_status
        )
    }
}

/// Event as received by an adapter, with receipt metadata for tracing.
#[derive(Debug, Clone)]
pub struct CacheEvent<E> {
    /// Unique receipt identifier (UUIDv4).
    pub id: Uuid,
    pub epoch: Epoch,
    pub kind: ViewEvent<E>,
    pub received_at: OffsetDateTime,
}

impl<E> CacheEvent<E> {
    pub fn new(kind: ViewEvent<E>, epoch: Epoch) -> Self {
        Self {
            id: Uuid::new_v4(),
            epoch,
            kind,
            received_at: OffsetDateTime::now_utc(),
        }
    }
}
