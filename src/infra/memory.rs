//! In-memory collection backing the replay command and tests.
//!
//! Serves list queries with the same membership rules as the view cache and
//! applies back-office mutations, returning the push event each one emits.

use std::collections::HashSet;
use std::sync::RwLock;

use async_trait::async_trait;
use time::OffsetDateTime;
use tracing::debug;

use crate::application::pagination::PagedResult;
use crate::application::repos::{CollectionSource, ListQuery, RepoError};
use crate::cache::lock::{rw_read, rw_write};
use crate::cache::{MembershipPredicate, ViewEvent, ViewKey};
use crate::domain::entities::ViewEntity;

const SOURCE: &str = "infra::memory";

pub struct InMemoryCollection<E> {
    records: RwLock<Vec<E>>,
    predicate: MembershipPredicate,
}

impl<E: ViewEntity> InMemoryCollection<E> {
    pub fn new(predicate: MembershipPredicate) -> Self {
        Self {
            records: RwLock::new(Vec::new()),
            predicate,
        }
    }

    /// Build a collection holding `records`, rejecting duplicate ids.
    pub fn with_records(
        predicate: MembershipPredicate,
        records: impl IntoIterator<Item = E>,
    ) -> Result<Self, RepoError> {
        let collection = Self::new(predicate);
        for record in records {
            collection.create(record)?;
        }
        Ok(collection)
    }

    pub fn len(&self) -> usize {
        rw_read(&self.records, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn create(&self, entity: E) -> Result<ViewEvent<E>, RepoError> {
        let mut records = rw_write(&self.records, SOURCE, "create");
        if records.iter().any(|row| row.id() == entity.id()) {
            return Err(RepoError::InvalidInput {
                message: format!("{} `{}` already exists", E::RESOURCE, entity.id()),
            });
        }
        records.push(entity.clone());
        Ok(ViewEvent::upsert(entity, None))
    }

    /// Replace a record with an edited snapshot.
    pub fn edit(&self, entity: E) -> Result<ViewEvent<E>, RepoError> {
        let mut records = rw_write(&self.records, SOURCE, "edit");
        let slot = records
            .iter_mut()
            .find(|row| row.id() == entity.id())
            .ok_or(RepoError::NotFound)?;
        let previous = slot.lifecycle_status();
        *slot = entity.clone();
        Ok(ViewEvent::upsert(entity, Some(previous)))
    }

    pub fn soft_delete(&self, id: &str) -> Result<ViewEvent<E>, RepoError> {
        self.set_deleted_at(id, Some(OffsetDateTime::now_utc()))
    }

    pub fn restore(&self, id: &str) -> Result<ViewEvent<E>, RepoError> {
        self.set_deleted_at(id, None)
    }

    pub fn hard_delete(&self, id: &str) -> Result<ViewEvent<E>, RepoError> {
        let mut records = rw_write(&self.records, SOURCE, "hard_delete");
        let index = records
            .iter()
            .position(|row| row.id() == id)
            .ok_or(RepoError::NotFound)?;
        let removed = records.remove(index);
        Ok(ViewEvent::remove(id, removed.lifecycle_status()))
    }

    /// Soft-delete every id, or none of them if any id is unknown.
    pub fn bulk_soft_delete(&self, ids: &[&str]) -> Result<Vec<ViewEvent<E>>, RepoError> {
        self.bulk_set_deleted_at(ids, Some(OffsetDateTime::now_utc()))
    }

    /// Restore every id, or none of them if any id is unknown.
    pub fn bulk_restore(&self, ids: &[&str]) -> Result<Vec<ViewEvent<E>>, RepoError> {
        self.bulk_set_deleted_at(ids, None)
    }

    /// Mirror a change that happened elsewhere, e.g. a pushed event.
    pub fn apply(&self, event: &ViewEvent<E>) {
        let mut records = rw_write(&self.records, SOURCE, "apply");
        match event {
            ViewEvent::Upsert { entity, .. } => {
                match records.iter_mut().find(|row| row.id() == entity.id()) {
                    Some(slot) => *slot = entity.clone(),
                    None => records.push(entity.clone()),
                }
            }
            ViewEvent::Remove { id, .. } => records.retain(|row| row.id() != id),
        }
    }

    fn set_deleted_at(
        &self,
        id: &str,
        deleted_at: Option<OffsetDateTime>,
    ) -> Result<ViewEvent<E>, RepoError> {
        let mut records = rw_write(&self.records, SOURCE, "set_deleted_at");
        let row = records
            .iter_mut()
            .find(|row| row.id() == id)
            .ok_or(RepoError::NotFound)?;
        Ok(move_status(row, deleted_at))
    }

    fn bulk_set_deleted_at(
        &self,
        ids: &[&str],
        deleted_at: Option<OffsetDateTime>,
    ) -> Result<Vec<ViewEvent<E>>, RepoError> {
        let mut records = rw_write(&self.records, SOURCE, "bulk_set_deleted_at");
        let wanted: HashSet<&str> = ids.iter().copied().collect();
        let known = records
            .iter()
            .filter(|row| wanted.contains(row.id()))
            .count();
        if known != wanted.len() {
            return Err(RepoError::NotFound);
        }

        let events: Vec<_> = records
            .iter_mut()
            .filter(|row| wanted.contains(row.id()))
            .map(|row| move_status(row, deleted_at))
            .collect();
        debug!(resource = %E::RESOURCE, count = events.len(), "Bulk status change applied");
        Ok(events)
    }
}

fn move_status<E: ViewEntity>(row: &mut E, deleted_at: Option<OffsetDateTime>) -> ViewEvent<E> {
    let previous = row.lifecycle_status();
    row.set_deleted_at(deleted_at);
    ViewEvent::upsert(row.clone(), Some(previous))
}

fn view_key_for(query: &ListQuery) -> Result<ViewKey, RepoError> {
    let mut key = ViewKey::new(query.status_scope.clone(), query.page, query.limit).map_err(
        |err| RepoError::InvalidInput {
            message: err.to_string(),
        },
    )?;
    if let Some(search) = &query.search {
        key = key.with_search(search.clone());
    }
    for (name, value) in &query.filters {
        key = key.with_filter(name.clone(), value.clone());
    }
    Ok(key)
}

#[async_trait]
impl<E: ViewEntity> CollectionSource<E> for InMemoryCollection<E> {
    async fn list(&self, query: &ListQuery) -> Result<PagedResult<E>, RepoError> {
        let key = view_key_for(query)?;

        let mut matching: Vec<E> = rw_read(&self.records, SOURCE, "list")
            .iter()
            .filter(|row| self.predicate.matches(&key, *row))
            .cloned()
            .collect();
        matching.sort_by(|a, b| {
            b.created_at()
                .cmp(&a.created_at())
                .then_with(|| b.id().cmp(a.id()))
        });

        let total = matching.len() as u64;
        let offset = (query.page as usize - 1).saturating_mul(query.limit as usize);
        let rows = matching
            .into_iter()
            .skip(offset)
            .take(query.limit as usize)
            .collect();
        Ok(PagedResult::new(rows, query.page, query.limit, total))
    }

    async fn get(&self, id: &str) -> Result<Option<E>, RepoError> {
        Ok(rw_read(&self.records, SOURCE, "get")
            .iter()
            .find(|row| row.id() == id)
            .cloned())
    }
}
