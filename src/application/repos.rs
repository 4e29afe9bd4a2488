//! Repository traits describing the persistence collaborator.

use std::collections::BTreeMap;

use async_trait::async_trait;
use thiserror::Error;

use crate::application::pagination::PagedResult;
use crate::cache::ViewKey;
use crate::domain::entities::ViewEntity;
use crate::domain::types::StatusScope;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("request timed out")]
    Timeout,
}

/// Query sent to the backend list endpoint for one view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub page: u32,
    pub limit: u32,
    pub status_scope: StatusScope,
    pub search: Option<String>,
    pub filters: BTreeMap<String, String>,
}

impl From<&ViewKey> for ListQuery {
    fn from(key: &ViewKey) -> Self {
        Self {
            page: key.page(),
            limit: key.page_size(),
            status_scope: key.status_scope().clone(),
            search: key.search().map(str::to_string),
            filters: key.filters().clone(),
        }
    }
}

/// Generic CRUD store for one resource collection.
#[async_trait]
pub trait CollectionSource<E: ViewEntity>: Send + Sync {
    async fn list(&self, query: &ListQuery) -> Result<PagedResult<E>, RepoError>;

    async fn get(&self, id: &str) -> Result<Option<E>, RepoError>;
}
