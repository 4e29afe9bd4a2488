//! Fixture replay: seed a collection, open views, push messages, report.

use std::sync::Arc;

use futures::stream;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{info, instrument};

use crate::application::error::AppError;
use crate::cache::{
    CacheConfig, EventType, FollowStats, LiveViewCache, SubscriptionAdapter, TransportFrame,
    ViewKey,
};
use crate::domain::entities::{
    ContactRequestRecord, PostRecord, RoleRecord, SessionRecord, StudentRecord, TagRecord,
    UserRecord, ViewEntity,
};
use crate::domain::error::DomainError;
use crate::domain::types::ResourceKind;
use crate::infra::fixture::ReplayFixture;
use crate::infra::memory::InMemoryCollection;

/// Fixture message standing for a dropped and re-established connection.
const RECONNECT_MARKER: &str = "reconnect";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewSnapshot {
    pub key: ViewKey,
    /// `None` when the view was evicted to respect the view capacity.
    pub page: Option<Value>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayOutcome {
    pub resource: ResourceKind,
    pub version: u64,
    pub stats: FollowStats,
    pub views: Vec<ViewSnapshot>,
}

/// Run `fixture` through a fresh cache for its resource.
pub async fn replay(fixture: ReplayFixture, config: &CacheConfig) -> Result<ReplayOutcome, AppError> {
    let resource = ResourceKind::try_from(fixture.resource.as_str())
        .map_err(|()| DomainError::unknown_resource(&fixture.resource))?;

    match resource {
        ResourceKind::ContactRequests => replay_as::<ContactRequestRecord>(fixture, config).await,
        ResourceKind::Posts => replay_as::<PostRecord>(fixture, config).await,
        ResourceKind::Roles => replay_as::<RoleRecord>(fixture, config).await,
        ResourceKind::Sessions => replay_as::<SessionRecord>(fixture, config).await,
        ResourceKind::Students => replay_as::<StudentRecord>(fixture, config).await,
        ResourceKind::Tags => replay_as::<TagRecord>(fixture, config).await,
        ResourceKind::Users => replay_as::<UserRecord>(fixture, config).await,
    }
}

#[instrument(skip_all, fields(resource = %E::RESOURCE))]
async fn replay_as<E>(fixture: ReplayFixture, config: &CacheConfig) -> Result<ReplayOutcome, AppError>
where
    E: ViewEntity + DeserializeOwned + Serialize,
{
    let records = fixture
        .records
        .into_iter()
        .map(serde_json::from_value::<E>)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| {
            AppError::validation(format!("fixture record is not a valid {}: {err}", E::RESOURCE))
        })?;

    let source = Arc::new(
        InMemoryCollection::with_records(E::RESOURCE.predicate(), records)
            .map_err(|err| AppError::validation(format!("fixture records are invalid: {err}")))?,
    );
    let cache = Arc::new(LiveViewCache::new(config, E::RESOURCE.predicate()));

    for key in &fixture.views {
        cache.load(source.as_ref(), key).await?;
    }

    let mut adapter = SubscriptionAdapter::new();
    cache.attach(&mut adapter);
    // Pushed events already happened server-side; keep the collection in step
    // so a reconnect resync sees them.
    for event_type in [EventType::Upsert, EventType::Remove] {
        let source = Arc::clone(&source);
        adapter.on(event_type, move |event| source.apply(&event.kind));
    }

    let frames = stream::iter(fixture.messages.iter().map(frame_for));
    let stats = cache.follow(&adapter, frames, source.as_ref()).await;
    cache.debouncer().flush();

    let views = fixture
        .views
        .into_iter()
        .map(|key| {
            let page = cache
                .store()
                .peek(&key)
                .map(|page| serde_json::to_value(&page))
                .transpose()?;
            Ok(ViewSnapshot { key, page })
        })
        .collect::<Result<Vec<_>, serde_json::Error>>()
        .map_err(|err| AppError::unexpected(format!("failed to encode view: {err}")))?;

    info!(
        dispatched = stats.dispatched,
        dropped = stats.dropped,
        version = cache.version(),
        "Replay finished"
    );

    Ok(ReplayOutcome {
        resource: E::RESOURCE,
        version: cache.version(),
        stats,
        views,
    })
}

fn frame_for(message: &Value) -> TransportFrame {
    match message {
        Value::String(marker) if marker == RECONNECT_MARKER => TransportFrame::Reconnected,
        other => TransportFrame::Message(other.to_string()),
    }
}
