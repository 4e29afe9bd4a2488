//! Live view cache facade.
//!
//! Owns the page store, reconciler and debouncer for one resource collection.
//! Share it behind an `Arc`: readers load views through it, the transport
//! pump feeds push frames into it.

use std::sync::Arc;

use futures::{Stream, StreamExt};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use crate::application::pagination::PagedResult;
use crate::application::repos::{CollectionSource, ListQuery, RepoError};
use crate::domain::entities::ViewEntity;

use super::config::CacheConfig;
use super::debounce::ChangeDebouncer;
use super::events::{EventType, ViewEvent};
use super::keys::ViewKey;
use super::predicate::MembershipPredicate;
use super::reconciler::{ReconcileReport, Reconciler};
use super::store::PageStore;
use super::subscription::{Delivery, SubscriptionAdapter};

/// One frame from the push transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportFrame {
    Message(String),
    /// The connection dropped and came back; events may have been missed.
    Reconnected,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResyncReport {
    pub refreshed: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FollowStats {
    pub dispatched: usize,
    pub ignored: usize,
    pub dropped: usize,
    pub reconnects: usize,
}

pub struct LiveViewCache<E> {
    store: PageStore<E>,
    reconciler: Reconciler,
    debouncer: ChangeDebouncer,
}

impl<E: ViewEntity> LiveViewCache<E> {
    pub fn new(config: &CacheConfig, predicate: MembershipPredicate) -> Self {
        Self {
            store: PageStore::new(config),
            reconciler: Reconciler::new(predicate),
            debouncer: ChangeDebouncer::new(config.debounce_window()),
        }
    }

    pub fn store(&self) -> &PageStore<E> {
        &self.store
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    pub fn debouncer(&self) -> &ChangeDebouncer {
        &self.debouncer
    }

    /// Cached view, if present.
    pub fn view(&self, key: &ViewKey) -> Option<PagedResult<E>> {
        self.store.get(key)
    }

    /// Read-through: serve the cached view or fetch and cache it.
    pub async fn load<S>(&self, source: &S, key: &ViewKey) -> Result<PagedResult<E>, RepoError>
    where
        S: CollectionSource<E> + ?Sized,
    {
        if let Some(page) = self.store.get(key) {
            return Ok(page);
        }
        self.refresh(source, key).await
    }

    /// Refetch one view from the collection, replacing any cached copy.
    pub async fn refresh<S>(&self, source: &S, key: &ViewKey) -> Result<PagedResult<E>, RepoError>
    where
        S: CollectionSource<E> + ?Sized,
    {
        let page = source.list(&ListQuery::from(key)).await?;
        if let Some(evicted) = self.store.put(key.clone(), page.clone()) {
            debug!(view = %key, evicted = %evicted, "Cached view evicted to make room");
        }
        Ok(page)
    }

    pub fn evict(&self, key: &ViewKey) -> Option<PagedResult<E>> {
        self.store.evict(key)
    }

    pub fn invalidate_all(&self) {
        self.store.invalidate_all();
        self.debouncer.notify_changed();
    }

    /// Refetch every cached view, e.g. after the push channel reconnects.
    ///
    /// A view that fails to refetch keeps its cached copy.
    #[instrument(skip_all)]
    pub async fn resync<S>(&self, source: &S) -> ResyncReport
    where
        S: CollectionSource<E> + ?Sized,
    {
        let mut report = ResyncReport::default();
        for key in self.store.keys() {
            match self.refresh(source, &key).await {
                Ok(_) => report.refreshed += 1,
                Err(error) => {
                    warn!(view = %key, error = %error, "Failed to refetch cached view");
                    report.failed += 1;
                }
            }
        }

        if report.refreshed > 0 {
            self.debouncer.notify_changed();
        }
        info!(
            refreshed = report.refreshed,
            failed = report.failed,
            "Cached views resynchronised"
        );
        report
    }

    /// Fold one event into the cached views and schedule a version bump if
    /// any view changed.
    pub fn apply(&self, event: &ViewEvent<E>) -> ReconcileReport {
        let report = self.reconciler.apply(&self.store, event);
        if report.changed() {
            self.debouncer.notify_changed();
        }
        report
    }

    pub fn version(&self) -> u64 {
        self.debouncer.version()
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.debouncer.subscribe()
    }
}

impl<E> LiveViewCache<E>
where
    E: ViewEntity + DeserializeOwned,
{
    /// Route every event the adapter decodes into this cache.
    pub fn attach(self: &Arc<Self>, adapter: &mut SubscriptionAdapter<E>) {
        for event_type in [EventType::Upsert, EventType::Remove] {
            let cache = Arc::clone(self);
            adapter.on(event_type, move |event| {
                cache.apply(&event.kind);
            });
        }
    }

    /// Drive `frames` through `adapter` until the transport closes.
    ///
    /// Reconnect frames trigger a [`resync`](Self::resync) against `source`.
    pub async fn follow<T, S>(
        &self,
        adapter: &SubscriptionAdapter<E>,
        mut frames: T,
        source: &S,
    ) -> FollowStats
    where
        T: Stream<Item = TransportFrame> + Unpin,
        S: CollectionSource<E> + ?Sized,
    {
        let mut stats = FollowStats::default();
        while let Some(frame) = frames.next().await {
            match frame {
                TransportFrame::Message(raw) => match adapter.receive(&raw) {
                    Ok(Delivery::Dispatched { .. }) => stats.dispatched += 1,
                    Ok(Delivery::Ignored) => stats.ignored += 1,
                    Err(_) => stats.dropped += 1,
                },
                TransportFrame::Reconnected => {
                    stats.reconnects += 1;
                    self.resync(source).await;
                }
            }
        }
        debug!(?stats, "Push transport closed");
        stats
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use time::macros::datetime;

    use super::*;
    use crate::cache::predicate::ResourceSchema;
    use crate::domain::entities::TagRecord;
    use crate::domain::types::{LifecycleStatus, StatusScope};

    fn tag(id: &str) -> TagRecord {
        TagRecord {
            id: id.to_string(),
            name: format!("tag {id}"),
            slug: id.to_string(),
            created_at: datetime!(2024-01-01 0:00 UTC),
            deleted_at: None,
        }
    }

    /// Serves `rows` for every query; fails queries for `failing_page`.
    struct StubSource {
        rows: Mutex<Vec<TagRecord>>,
        failing_page: Option<u32>,
        calls: Mutex<usize>,
    }

    impl StubSource {
        fn new(rows: Vec<TagRecord>) -> Self {
            Self {
                rows: Mutex::new(rows),
                failing_page: None,
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> usize {
            *self.calls.lock().expect("calls")
        }
    }

    #[async_trait]
    impl CollectionSource<TagRecord> for StubSource {
        async fn list(&self, query: &ListQuery) -> Result<PagedResult<TagRecord>, RepoError> {
            *self.calls.lock().expect("calls") += 1;
            if self.failing_page == Some(query.page) {
                return Err(RepoError::Timeout);
            }
            let rows = self.rows.lock().expect("rows").clone();
            let total = rows.len() as u64;
            let rows = rows.into_iter().take(query.limit as usize).collect();
            Ok(PagedResult::new(rows, query.page, query.limit, total))
        }

        async fn get(&self, id: &str) -> Result<Option<TagRecord>, RepoError> {
            Ok(self
                .rows
                .lock()
                .expect("rows")
                .iter()
                .find(|row| row.id == id)
                .cloned())
        }
    }

    fn cache() -> Arc<LiveViewCache<TagRecord>> {
        Arc::new(LiveViewCache::new(
            &CacheConfig::default(),
            MembershipPredicate::new(ResourceSchema::new(["name", "slug"])),
        ))
    }

    fn first_page() -> ViewKey {
        ViewKey::new(StatusScope::Active, 1, 10).expect("key")
    }

    #[tokio::test]
    async fn load_reads_through_once() {
        let cache = cache();
        let source = StubSource::new(vec![tag("a")]);

        let first = cache.load(&source, &first_page()).await.expect("load");
        let second = cache.load(&source, &first_page()).await.expect("load");

        assert_eq!(first, second);
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn applied_change_bumps_version_after_window() {
        let cache = cache();
        let source = StubSource::new(vec![tag("a")]);
        cache.load(&source, &first_page()).await.expect("load");

        let report = cache.apply(&ViewEvent::upsert(tag("b"), None));
        assert!(report.changed());
        assert_eq!(cache.version(), 0);

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(cache.version(), 1);
        let ids: Vec<_> = cache
            .view(&first_page())
            .expect("view")
            .rows
            .into_iter()
            .map(|row| row.id)
            .collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[tokio::test(start_paused = true)]
    async fn unchanged_views_do_not_bump() {
        let cache = cache();
        let report = cache.apply(&ViewEvent::remove("ghost", LifecycleStatus::Active));
        assert!(!report.changed());

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(cache.version(), 0);
    }

    #[tokio::test]
    async fn resync_keeps_views_that_fail_to_refetch() {
        let cache = cache();
        let mut source = StubSource::new(vec![tag("a")]);
        let second_page = ViewKey::new(StatusScope::Active, 2, 10).expect("key");
        cache.load(&source, &first_page()).await.expect("load");
        cache.load(&source, &second_page).await.expect("load");

        source.failing_page = Some(2);
        source.rows.lock().expect("rows").push(tag("b"));
        let report = cache.resync(&source).await;

        assert_eq!(
            report,
            ResyncReport {
                refreshed: 1,
                failed: 1
            }
        );
        assert_eq!(cache.view(&first_page()).expect("view").total, 2);
        assert_eq!(cache.view(&second_page).expect("view").total, 1);
    }

    #[tokio::test]
    async fn follow_routes_frames_and_resyncs_on_reconnect() {
        let cache = cache();
        let source = StubSource::new(vec![tag("a")]);
        cache.load(&source, &first_page()).await.expect("load");

        let mut adapter = SubscriptionAdapter::new();
        cache.attach(&mut adapter);

        let frames = futures::stream::iter(vec![
            TransportFrame::Message(
                r#"{"type":"remove","resource":"tags","id":"a","previousStatus":"active"}"#.into(),
            ),
            TransportFrame::Message("garbage".into()),
            TransportFrame::Message(
                r#"{"type":"remove","resource":"posts","id":"p","previousStatus":"active"}"#.into(),
            ),
            TransportFrame::Reconnected,
        ]);

        let stats = cache.follow(&adapter, frames, &source).await;

        assert_eq!(
            stats,
            FollowStats {
                dispatched: 1,
                ignored: 1,
                dropped: 1,
                reconnects: 1
            }
        );
        // The resync refetched the page the remove had emptied.
        assert_eq!(cache.view(&first_page()).expect("view").rows.len(), 1);
        assert_eq!(source.calls(), 2);
    }
}
