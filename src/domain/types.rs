//! Shared domain enumerations for back-office resources and view scopes.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle of a soft-deletable record, derived from its `deletedAt`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleStatus {
    Active,
    Deleted,
}

impl LifecycleStatus {
    pub fn from_deleted_at<T>(deleted_at: Option<T>) -> Self {
        match deleted_at {
            Some(_) => LifecycleStatus::Deleted,
            None => LifecycleStatus::Active,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LifecycleStatus::Active => "active",
            LifecycleStatus::Deleted => "deleted",
        }
    }
}

impl fmt::Display for LifecycleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status scope of a cached list view.
///
/// Besides the lifecycle scopes, a resource may expose its own workflow
/// states (contact requests are `new` until read); those arrive as
/// [`StatusScope::Workflow`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StatusScope {
    #[default]
    Active,
    Deleted,
    All,
    Workflow(String),
}

impl StatusScope {
    pub fn as_str(&self) -> &str {
        match self {
            StatusScope::Active => "active",
            StatusScope::Deleted => "deleted",
            StatusScope::All => "all",
            StatusScope::Workflow(value) => value,
        }
    }
}

impl From<&str> for StatusScope {
    fn from(value: &str) -> Self {
        match value.trim() {
            "" | "active" => StatusScope::Active,
            "deleted" => StatusScope::Deleted,
            "all" => StatusScope::All,
            other => StatusScope::Workflow(other.to_string()),
        }
    }
}

impl From<String> for StatusScope {
    fn from(value: String) -> Self {
        StatusScope::from(value.as_str())
    }
}

impl From<StatusScope> for String {
    fn from(value: StatusScope) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for StatusScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Back-office record collections served by the push channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    ContactRequests,
    Posts,
    Roles,
    Sessions,
    Students,
    Tags,
    Users,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 7] = [
        ResourceKind::ContactRequests,
        ResourceKind::Posts,
        ResourceKind::Roles,
        ResourceKind::Sessions,
        ResourceKind::Students,
        ResourceKind::Tags,
        ResourceKind::Users,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::ContactRequests => "contact_requests",
            ResourceKind::Posts => "posts",
            ResourceKind::Roles => "roles",
            ResourceKind::Sessions => "sessions",
            ResourceKind::Students => "students",
            ResourceKind::Tags => "tags",
            ResourceKind::Users => "users",
        }
    }
}

impl TryFrom<&str> for ResourceKind {
    type Error = ();

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "contact_requests" | "contact-requests" => Ok(ResourceKind::ContactRequests),
            "posts" => Ok(ResourceKind::Posts),
            "roles" => Ok(ResourceKind::Roles),
            "sessions" => Ok(ResourceKind::Sessions),
            "students" => Ok(ResourceKind::Students),
            "tags" => Ok(ResourceKind::Tags),
            "users" => Ok(ResourceKind::Users),
            _ => Err(()),
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
