//! Reconciler: folds one push event into every cached view.
//!
//! Reconciliation is synchronous and never calls the persistence layer. Each
//! view is handled on its own; a malformed cached entry is reported and left
//! alone while the remaining views are still updated.

use std::collections::HashSet;
use std::fmt;
use std::time::Instant;

use metrics::{counter, histogram};
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::application::pagination::{PagedResult, total_pages_for};
use crate::domain::entities::ViewEntity;

use super::events::ViewEvent;
use super::keys::ViewKey;
use super::predicate::MembershipPredicate;
use super::store::PageStore;

const METRIC_EVENTS_APPLIED: &str = "livetable_events_applied_total";
const METRIC_VIEWS_CHANGED: &str = "livetable_views_changed_total";
const METRIC_VIEW_ERRORS: &str = "livetable_reconcile_view_errors_total";
const METRIC_RECONCILE_MS: &str = "livetable_reconcile_ms";

/// A cached entry that cannot be reconciled safely.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconcileError {
    #[error("cached view has a zero page size")]
    ZeroPageSize,
    #[error("cached view holds {rows} rows but its page size is {page_size}")]
    Overfull { rows: usize, page_size: u32 },
    #[error("cached view reports {found} pages but its total implies {expected}")]
    StalePageCount { found: u64, expected: u64 },
    #[error("cached view holds row `{id}` more than once")]
    DuplicateRow { id: String },
    #[error("cached view is page {cached} but its key asks for page {requested}")]
    PageMismatch { cached: u32, requested: u32 },
}

/// What happened to one view while applying an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewChange {
    /// The event does not concern this view.
    Untouched,
    /// The cached row was swapped for the pushed snapshot.
    Replaced,
    /// The entity was placed at the front of a first page.
    Inserted { dropped: Option<String> },
    /// The entity left the view (status move or hard delete).
    Removed,
    /// The entity now belongs on a later page; its position is unknown
    /// until the next server refresh, so the view is left as is.
    DeferredToRefresh,
}

impl ViewChange {
    pub fn is_change(&self) -> bool {
        matches!(
            self,
            ViewChange::Replaced | ViewChange::Inserted { .. } | ViewChange::Removed
        )
    }

    fn label(&self) -> &'static str {
        match self {
            ViewChange::Untouched => "untouched",
            ViewChange::Replaced => "replaced",
            ViewChange::Inserted { .. } => "inserted",
            ViewChange::Removed => "removed",
            ViewChange::DeferredToRefresh => "deferred",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ViewFailure {
    pub key: ViewKey,
    pub error: ReconcileError,
}

/// Summary of one reconciliation pass.
#[derive(Debug, Clone, Default)]
pub struct ReconcileReport {
    pub views_scanned: usize,
    pub views_changed: usize,
    pub views_deferred: usize,
    pub failures: Vec<ViewFailure>,
}

impl ReconcileReport {
    pub fn changed(&self) -> bool {
        self.views_changed > 0
    }
}

impl fmt::Display for ReconcileReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ReconcileReport {{ scanned: {}, changed: {}, deferred: {}, failed: {} }}",
            self.views_scanned,
            self.views_changed,
            self.views_deferred,
            self.failures.len()
        )
    }
}

pub struct Reconciler {
    predicate: MembershipPredicate,
}

impl Reconciler {
    pub fn new(predicate: MembershipPredicate) -> Self {
        Self { predicate }
    }

    pub fn predicate(&self) -> &MembershipPredicate {
        &self.predicate
    }

    /// Apply `event` to every view in `store`.
    #[instrument(
        skip_all,
        fields(event = %event.event_type(), entity_id = %event.entity_id())
    )]
    pub fn apply<E: ViewEntity>(&self, store: &PageStore<E>, event: &ViewEvent<E>) -> ReconcileReport {
        let started_at = Instant::now();
        let mut report = ReconcileReport::default();

        store.for_each_mut(|key, page| {
            report.views_scanned += 1;

            let outcome = check_invariants(key, page).map(|()| match event {
                ViewEvent::Upsert { entity, .. } => self.upsert_into(key, page, entity),
                ViewEvent::Remove { id, .. } => remove_from(page, id),
            });

            match outcome {
                Ok(change) => {
                    if change.is_change() {
                        report.views_changed += 1;
                    }
                    if change == ViewChange::DeferredToRefresh {
                        report.views_deferred += 1;
                    }
                    if change != ViewChange::Untouched {
                        debug!(
                            view = %key,
                            change = change.label(),
                            total = page.total,
                            total_pages = page.total_pages,
                            "View reconciled"
                        );
                    }
                }
                Err(error) => {
                    warn!(
                        view = %key,
                        view_fingerprint = key.fingerprint(),
                        error = %error,
                        "Skipping malformed cached view"
                    );
                    counter!(METRIC_VIEW_ERRORS).increment(1);
                    report.failures.push(ViewFailure {
                        key: key.clone(),
                        error,
                    });
                }
            }
        });

        counter!(METRIC_EVENTS_APPLIED, "kind" => event.event_type().as_str()).increment(1);
        counter!(METRIC_VIEWS_CHANGED).increment(report.views_changed as u64);
        histogram!(METRIC_RECONCILE_MS).record(started_at.elapsed().as_secs_f64() * 1000.0);

        report
    }

    /// Fold an upserted snapshot into one view.
    pub fn upsert_into<E: ViewEntity>(
        &self,
        key: &ViewKey,
        page: &mut PagedResult<E>,
        entity: &E,
    ) -> ViewChange {
        let should_include = self.predicate.matches(key, entity);
        let existing = position_of(page, entity.id());

        match (should_include, existing) {
            (false, None) => ViewChange::Untouched,
            // Full replacement: the pushed snapshot is authoritative and
            // overrides any optimistic local edit.
            (true, Some(index)) => {
                page.replace_at(index, entity.clone());
                ViewChange::Replaced
            }
            (true, None) if key.is_first_page() => {
                let dropped = page.insert_front(entity.clone());
                ViewChange::Inserted {
                    dropped: dropped.map(|row| row.id().to_string()),
                }
            }
            (true, None) => ViewChange::DeferredToRefresh,
            (false, Some(index)) => {
                page.remove_at(index);
                ViewChange::Removed
            }
        }
    }
}

/// Splice a hard-deleted entity out of one view.
///
/// Later pages are not backfilled; they stay under-full until refreshed.
pub fn remove_from<E: ViewEntity>(page: &mut PagedResult<E>, id: &str) -> ViewChange {
    match position_of(page, id) {
        Some(index) => {
            page.remove_at(index);
            ViewChange::Removed
        }
        None => ViewChange::Untouched,
    }
}

/// Verify the paged-result invariants of a cached view.
pub fn check_invariants<E: ViewEntity>(
    key: &ViewKey,
    page: &PagedResult<E>,
) -> Result<(), ReconcileError> {
    if page.page_size == 0 {
        return Err(ReconcileError::ZeroPageSize);
    }
    if page.page != key.page() {
        return Err(ReconcileError::PageMismatch {
            cached: page.page,
            requested: key.page(),
        });
    }
    if page.rows.len() > page.page_size as usize {
        return Err(ReconcileError::Overfull {
            rows: page.rows.len(),
            page_size: page.page_size,
        });
    }
    let expected = total_pages_for(page.total, page.page_size);
    if page.total_pages != expected {
        return Err(ReconcileError::StalePageCount {
            found: page.total_pages,
            expected,
        });
    }
    let mut seen = HashSet::with_capacity(page.rows.len());
    for row in &page.rows {
        if !seen.insert(row.id()) {
            return Err(ReconcileError::DuplicateRow {
                id: row.id().to_string(),
            });
        }
    }
    Ok(())
}

fn position_of<E: ViewEntity>(page: &PagedResult<E>, id: &str) -> Option<usize> {
    page.rows.iter().position(|row| row.id() == id)
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;
    use crate::cache::config::CacheConfig;
    use crate::cache::predicate::ResourceSchema;
    use crate::domain::entities::TagRecord;
    use crate::domain::types::{LifecycleStatus, StatusScope};

    fn tag(id: &str, deleted: bool) -> TagRecord {
        TagRecord {
            id: id.to_string(),
            name: format!("tag {id}"),
            slug: id.to_string(),
            created_at: datetime!(2024-01-01 0:00 UTC),
            deleted_at: deleted.then_some(datetime!(2024-02-01 0:00 UTC)),
        }
    }

    fn reconciler() -> Reconciler {
        Reconciler::new(MembershipPredicate::new(ResourceSchema::new(["name", "slug"])))
    }

    fn key(scope: StatusScope, page: u32, page_size: u32) -> ViewKey {
        ViewKey::new(scope, page, page_size).expect("key")
    }

    fn ids(page: &PagedResult<TagRecord>) -> Vec<&str> {
        page.rows.iter().map(|row| row.id.as_str()).collect()
    }

    #[test]
    fn creation_on_first_page_inserts_front_and_drops_overflow() {
        let view = key(StatusScope::Active, 1, 2);
        let mut page = PagedResult::new(vec![tag("x", false), tag("y", false)], 1, 2, 5);

        let change = reconciler().upsert_into(&view, &mut page, &tag("z", false));

        assert_eq!(
            change,
            ViewChange::Inserted {
                dropped: Some("y".to_string())
            }
        );
        assert_eq!(ids(&page), vec!["z", "x"]);
        assert_eq!(page.total, 6);
        assert_eq!(page.total_pages, 3);
    }

    #[test]
    fn matching_entity_on_later_page_is_deferred() {
        let view = key(StatusScope::Active, 2, 2);
        let mut page = PagedResult::new(vec![tag("a", false)], 2, 2, 3);
        let before = page.clone();

        let change = reconciler().upsert_into(&view, &mut page, &tag("z", false));

        assert_eq!(change, ViewChange::DeferredToRefresh);
        assert_eq!(page, before);
    }

    #[test]
    fn present_and_matching_row_is_replaced_in_place() {
        let view = key(StatusScope::Active, 1, 10);
        let mut page = PagedResult::new(vec![tag("a", false), tag("b", false)], 1, 10, 2);
        let mut edited = tag("b", false);
        edited.name = "renamed".to_string();

        let change = reconciler().upsert_into(&view, &mut page, &edited);

        assert_eq!(change, ViewChange::Replaced);
        assert_eq!(page.rows[1].name, "renamed");
        assert_eq!(page.total, 2);
    }

    #[test]
    fn row_that_stops_matching_is_removed() {
        let view = key(StatusScope::Active, 3, 10);
        let mut page = PagedResult::new(vec![tag("a", false)], 3, 10, 21);

        let change = reconciler().upsert_into(&view, &mut page, &tag("a", true));

        assert_eq!(change, ViewChange::Removed);
        assert!(page.is_empty());
        assert_eq!(page.total, 20);
        assert_eq!(page.total_pages, 2);
    }

    #[test]
    fn irrelevant_entity_leaves_view_untouched() {
        let view = key(StatusScope::Deleted, 1, 10);
        let mut page = PagedResult::<TagRecord>::empty(1, 10);
        let change = reconciler().upsert_into(&view, &mut page, &tag("a", false));
        assert_eq!(change, ViewChange::Untouched);
        assert_eq!(page.total, 0);
    }

    #[test]
    fn remove_missing_id_is_noop_and_total_never_negative() {
        let mut page = PagedResult {
            rows: vec![tag("a", false)],
            page: 1,
            page_size: 10,
            total: 0,
            total_pages: 0,
        };
        assert_eq!(remove_from(&mut page, "missing"), ViewChange::Untouched);
        assert_eq!(remove_from(&mut page, "a"), ViewChange::Removed);
        assert_eq!(page.total, 0);
        assert_eq!(page.total_pages, 0);
    }

    #[test]
    fn invariant_violations_are_reported() {
        let view = key(StatusScope::Active, 1, 1);
        let overfull = PagedResult::new(vec![tag("a", false), tag("b", false)], 1, 1, 2);
        assert!(matches!(
            check_invariants(&view, &overfull),
            Err(ReconcileError::Overfull { rows: 2, .. })
        ));

        let view = key(StatusScope::Active, 1, 10);
        let duplicated = PagedResult::new(vec![tag("a", false), tag("a", false)], 1, 10, 2);
        assert_eq!(
            check_invariants(&view, &duplicated),
            Err(ReconcileError::DuplicateRow { id: "a".into() })
        );

        let mut stale = PagedResult::new(vec![tag("a", false)], 1, 10, 1);
        stale.total_pages = 4;
        assert!(matches!(
            check_invariants(&view, &stale),
            Err(ReconcileError::StalePageCount { found: 4, expected: 1 })
        ));

        let wrong_page = PagedResult::<TagRecord>::empty(2, 10);
        assert!(matches!(
            check_invariants(&view, &wrong_page),
            Err(ReconcileError::PageMismatch { .. })
        ));
    }

    #[test]
    fn malformed_view_does_not_block_other_views() {
        let store = PageStore::new(&CacheConfig::default());
        let healthy = key(StatusScope::Active, 1, 10);
        let broken = key(StatusScope::All, 1, 1);
        store.put(healthy.clone(), PagedResult::new(vec![tag("a", false)], 1, 10, 1));
        store.put(
            broken.clone(),
            PagedResult {
                rows: vec![tag("a", false), tag("b", false)],
                page: 1,
                page_size: 1,
                total: 2,
                total_pages: 2,
            },
        );

        let event = ViewEvent::upsert(tag("a", true), Some(LifecycleStatus::Active));
        let report = reconciler().apply(&store, &event);

        assert_eq!(report.views_scanned, 2);
        assert_eq!(report.views_changed, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].key, broken);
        assert!(store.peek(&healthy).expect("healthy").is_empty());
        assert_eq!(store.peek(&broken).expect("broken").rows.len(), 2);
    }
}
