//! Push subscription adapter.
//!
//! Decodes raw push-channel frames into typed [`ViewEvent`]s for one resource
//! and dispatches them to the handlers registered with [`SubscriptionAdapter::on`].
//! Frames that cannot be decoded are dropped here, so handlers only ever see
//! well-formed events.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};

use livetable_wire::{PushMessage, WireStatus};
use metrics::counter;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::entities::ViewEntity;
use crate::domain::types::{LifecycleStatus, ResourceKind};

use super::events::{CacheEvent, Epoch, EventType, ViewEvent};

const METRIC_EVENTS_DROPPED: &str = "livetable_events_dropped_total";

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed push message: {0}")]
    Malformed(#[source] serde_json::Error),
    #[error("entity payload is not a valid {resource} record: {source}")]
    Entity {
        resource: ResourceKind,
        #[source]
        source: serde_json::Error,
    },
}

impl DecodeError {
    fn reason(&self) -> &'static str {
        match self {
            DecodeError::Malformed(_) => "malformed",
            DecodeError::Entity { .. } => "entity",
        }
    }
}

/// Result of feeding one frame to the adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Decoded and handed to `handlers` observers.
    Dispatched { epoch: Epoch, handlers: usize },
    /// Well-formed, but addressed to another resource.
    Ignored,
}

type Handler<E> = Box<dyn Fn(&CacheEvent<E>) + Send + Sync>;

pub struct SubscriptionAdapter<E> {
    handlers: HashMap<EventType, Vec<Handler<E>>>,
    epoch_counter: AtomicU64,
    _entity: PhantomData<fn() -> E>,
}

impl<E> SubscriptionAdapter<E>
where
    E: ViewEntity + DeserializeOwned,
{
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            epoch_counter: AtomicU64::new(0),
            _entity: PhantomData,
        }
    }

    /// Register `handler` for every decoded event of `event_type`.
    pub fn on<F>(&mut self, event_type: EventType, handler: F) -> &mut Self
    where
        F: Fn(&CacheEvent<E>) + Send + Sync + 'static,
    {
        self.handlers
            .entry(event_type)
            .or_default()
            .push(Box::new(handler));
        self
    }

    pub fn handler_count(&self, event_type: EventType) -> usize {
        self.handlers.get(&event_type).map_or(0, Vec::len)
    }

    /// Decode one raw frame and dispatch it.
    ///
    /// Malformed frames are logged, counted and returned as errors; nothing
    /// is dispatched for them.
    pub fn receive(&self, raw: &str) -> Result<Delivery, DecodeError> {
        let decoded = PushMessage::parse(raw)
            .map_err(DecodeError::Malformed)
            .and_then(|message| decode(message));

        match decoded {
            Ok(Some(event)) => Ok(self.dispatch(event)),
            Ok(None) => {
                debug!(resource = %E::RESOURCE, "Push message for another resource ignored");
                Ok(Delivery::Ignored)
            }
            Err(error) => {
                warn!(
                    resource = %E::RESOURCE,
                    error = %error,
                    "Dropping undecodable push message"
                );
                counter!(METRIC_EVENTS_DROPPED, "reason" => error.reason()).increment(1);
                Err(error)
            }
        }
    }

    /// Dispatch an already-typed event, e.g. one produced locally.
    pub fn dispatch(&self, event: ViewEvent<E>) -> Delivery {
        let epoch = self.epoch_counter.fetch_add(1, Ordering::SeqCst);
        let envelope = CacheEvent::new(event, epoch);
        let event_type = envelope.kind.event_type();

        debug!(
            event_id = %envelope.id,
            event_epoch = envelope.epoch,
            event_kind = %event_type,
            entity_id = %envelope.kind.entity_id(),
            "Push event received"
        );

        let handlers = self.handlers.get(&event_type).map_or(&[][..], Vec::as_slice);
        for handler in handlers {
            handler(&envelope);
        }

        Delivery::Dispatched {
            epoch,
            handlers: handlers.len(),
        }
    }
}

impl<E> Default for SubscriptionAdapter<E>
where
    E: ViewEntity + DeserializeOwned,
{
    fn default() -> Self {
        Self::new()
    }
}

fn decode<E>(message: PushMessage) -> Result<Option<ViewEvent<E>>, DecodeError>
where
    E: ViewEntity + DeserializeOwned,
{
    if ResourceKind::try_from(message.resource()) != Ok(E::RESOURCE) {
        return Ok(None);
    }

    let event = match message {
        PushMessage::Upsert {
            entity,
            previous_status,
            new_status,
            ..
        } => {
            let entity: E = serde_json::from_value(entity).map_err(|source| DecodeError::Entity {
                resource: E::RESOURCE,
                source,
            })?;
            ViewEvent::Upsert {
                entity,
                previous_status: previous_status.map(lifecycle),
                new_status: lifecycle(new_status),
            }
        }
        PushMessage::Remove {
            id,
            previous_status,
            ..
        } => ViewEvent::Remove {
            id,
            previous_status: lifecycle(previous_status),
        },
    };
    Ok(Some(event))
}

fn lifecycle(status: WireStatus) -> LifecycleStatus {
    match status {
        WireStatus::Active => LifecycleStatus::Active,
        WireStatus::Deleted => LifecycleStatus::Deleted,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use crate::domain::entities::TagRecord;

    const TAG_UPSERT: &str = r#"{"type":"upsert","resource":"tags","entity":{"id":"t-1","name":"Rust","slug":"rust","createdAt":"2024-01-01T00:00:00Z","deletedAt":null},"previousStatus":null,"newStatus":"active"}"#;
    const TAG_REMOVE: &str = r#"{"type":"remove","resource":"tags","id":"t-1","previousStatus":"deleted"}"#;

    fn counting_adapter() -> (SubscriptionAdapter<TagRecord>, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let upserts = Arc::new(AtomicUsize::new(0));
        let removes = Arc::new(AtomicUsize::new(0));
        let mut adapter = SubscriptionAdapter::new();
        {
            let upserts = Arc::clone(&upserts);
            adapter.on(EventType::Upsert, move |event| {
                assert!(matches!(event.kind, ViewEvent::Upsert { .. }));
                upserts.fetch_add(1, Ordering::SeqCst);
            });
        }
        {
            let removes = Arc::clone(&removes);
            adapter.on(EventType::Remove, move |_| {
                removes.fetch_add(1, Ordering::SeqCst);
            });
        }
        (adapter, upserts, removes)
    }

    #[test]
    fn dispatches_decoded_events_by_type() {
        let (adapter, upserts, removes) = counting_adapter();

        assert_eq!(
            adapter.receive(TAG_UPSERT).expect("decoded"),
            Delivery::Dispatched {
                epoch: 0,
                handlers: 1
            }
        );
        assert!(matches!(
            adapter.receive(TAG_REMOVE).expect("decoded"),
            Delivery::Dispatched { epoch: 1, .. }
        ));

        assert_eq!(upserts.load(Ordering::SeqCst), 1);
        assert_eq!(removes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn malformed_frames_are_dropped_before_handlers() {
        let (adapter, upserts, _) = counting_adapter();

        assert!(matches!(
            adapter.receive("{not json"),
            Err(DecodeError::Malformed(_))
        ));
        let bad_entity = r#"{"type":"upsert","resource":"tags","entity":{"id":"t-1"},"newStatus":"active"}"#;
        assert!(matches!(
            adapter.receive(bad_entity),
            Err(DecodeError::Entity {
                resource: ResourceKind::Tags,
                ..
            })
        ));
        assert_eq!(upserts.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn other_resources_are_ignored() {
        let (adapter, _, removes) = counting_adapter();
        let frame = r#"{"type":"remove","resource":"users","id":"u-1","previousStatus":"active"}"#;

        assert_eq!(adapter.receive(frame).expect("well formed"), Delivery::Ignored);
        assert_eq!(removes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn wire_statuses_map_to_lifecycle() {
        let (adapter, _, _) = counting_adapter();
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut adapter = adapter;
        {
            let seen = Arc::clone(&seen);
            adapter.on(EventType::Remove, move |event| {
                if let ViewEvent::Remove {
                    previous_status, ..
                } = &event.kind
                {
                    seen.lock().expect("lock").push(*previous_status);
                }
            });
        }

        adapter.receive(TAG_REMOVE).expect("decoded");
        assert_eq!(
            *seen.lock().expect("lock"),
            vec![LifecycleStatus::Deleted]
        );
        assert_eq!(adapter.handler_count(EventType::Remove), 2);
    }
}
