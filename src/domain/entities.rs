//! Back-office records as pushed by the backend and cached by list views.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::domain::types::{LifecycleStatus, ResourceKind};

/// Value of a named record field as seen by search and column filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldValue<'a> {
    Text(&'a str),
    Bool(bool),
    Absent,
}

impl<'a> FieldValue<'a> {
    pub fn as_text(self) -> Option<&'a str> {
        match self {
            FieldValue::Text(value) => Some(value),
            _ => None,
        }
    }
}

impl<'a> From<&'a str> for FieldValue<'a> {
    fn from(value: &'a str) -> Self {
        FieldValue::Text(value)
    }
}

impl<'a> From<&'a String> for FieldValue<'a> {
    fn from(value: &'a String) -> Self {
        FieldValue::Text(value.as_str())
    }
}

impl<'a> From<&'a Option<String>> for FieldValue<'a> {
    fn from(value: &'a Option<String>) -> Self {
        value.as_deref().map_or(FieldValue::Absent, FieldValue::Text)
    }
}

impl From<bool> for FieldValue<'_> {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

/// A record that can be held in a cached list view.
///
/// Field names passed to [`ViewEntity::field`] use the same camelCase
/// spelling as the wire payload and the column filters.
pub trait ViewEntity: Clone + Send + Sync + 'static {
    const RESOURCE: ResourceKind;

    fn id(&self) -> &str;

    fn deleted_at(&self) -> Option<OffsetDateTime>;

    /// Soft-delete (`Some`) or restore (`None`) the record.
    fn set_deleted_at(&mut self, deleted_at: Option<OffsetDateTime>);

    fn created_at(&self) -> OffsetDateTime;

    fn field(&self, name: &str) -> FieldValue<'_>;

    /// Resource-specific workflow state, for views scoped beyond active/deleted.
    fn workflow_status(&self) -> Option<&str> {
        None
    }

    fn lifecycle_status(&self) -> LifecycleStatus {
        LifecycleStatus::from_deleted_at(self.deleted_at())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactRequestRecord {
    pub id: String,
    pub name: String,
    pub email: String,
    pub subject: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub is_read: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub deleted_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostRecord {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub author_id: String,
    #[serde(default)]
    pub published: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub deleted_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub deleted_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub id: String,
    pub user_id: String,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub deleted_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRecord {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub grade: Option<String>,
    #[serde(default)]
    pub enrolled: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub deleted_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagRecord {
    pub id: String,
    pub name: String,
    pub slug: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub deleted_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub role_id: Option<String>,
    #[serde(default)]
    pub verified: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub deleted_at: Option<OffsetDateTime>,
}

/// Implements the identity and lifecycle accessors of [`ViewEntity`] for a
/// record with `id`, `created_at` and `deleted_at` fields.
macro_rules! record_accessors {
    () => {
        fn id(&self) -> &str {
            &self.id
        }

        fn deleted_at(&self) -> Option<OffsetDateTime> {
            self.deleted_at
        }

        fn set_deleted_at(&mut self, deleted_at: Option<OffsetDateTime>) {
            self.deleted_at = deleted_at;
        }

        fn created_at(&self) -> OffsetDateTime {
            self.created_at
        }
    };
}

impl ViewEntity for ContactRequestRecord {
    const RESOURCE: ResourceKind = ResourceKind::ContactRequests;

    record_accessors!();

    fn field(&self, name: &str) -> FieldValue<'_> {
        match name {
            "id" => (&self.id).into(),
            "name" => (&self.name).into(),
            "email" => (&self.email).into(),
            "subject" => (&self.subject).into(),
            "message" => (&self.message).into(),
            "isRead" => self.is_read.into(),
            _ => FieldValue::Absent,
        }
    }

    fn workflow_status(&self) -> Option<&str> {
        Some(if self.is_read { "read" } else { "new" })
    }
}

impl ViewEntity for PostRecord {
    const RESOURCE: ResourceKind = ResourceKind::Posts;

    record_accessors!();

    fn field(&self, name: &str) -> FieldValue<'_> {
        match name {
            "id" => (&self.id).into(),
            "title" => (&self.title).into(),
            "slug" => (&self.slug).into(),
            "authorId" => (&self.author_id).into(),
            "published" => self.published.into(),
            _ => FieldValue::Absent,
        }
    }
}

impl ViewEntity for RoleRecord {
    const RESOURCE: ResourceKind = ResourceKind::Roles;

    record_accessors!();

    fn field(&self, name: &str) -> FieldValue<'_> {
        match name {
            "id" => (&self.id).into(),
            "name" => (&self.name).into(),
            "description" => (&self.description).into(),
            _ => FieldValue::Absent,
        }
    }
}

impl ViewEntity for SessionRecord {
    const RESOURCE: ResourceKind = ResourceKind::Sessions;

    record_accessors!();

    fn field(&self, name: &str) -> FieldValue<'_> {
        match name {
            "id" => (&self.id).into(),
            "userId" => (&self.user_id).into(),
            "ipAddress" => (&self.ip_address).into(),
            "userAgent" => (&self.user_agent).into(),
            _ => FieldValue::Absent,
        }
    }
}

impl ViewEntity for StudentRecord {
    const RESOURCE: ResourceKind = ResourceKind::Students;

    record_accessors!();

    fn field(&self, name: &str) -> FieldValue<'_> {
        match name {
            "id" => (&self.id).into(),
            "firstName" => (&self.first_name).into(),
            "lastName" => (&self.last_name).into(),
            "email" => (&self.email).into(),
            "grade" => (&self.grade).into(),
            "enrolled" => self.enrolled.into(),
            _ => FieldValue::Absent,
        }
    }
}

impl ViewEntity for TagRecord {
    const RESOURCE: ResourceKind = ResourceKind::Tags;

    record_accessors!();

    fn field(&self, name: &str) -> FieldValue<'_> {
        match name {
            "id" => (&self.id).into(),
            "name" => (&self.name).into(),
            "slug" => (&self.slug).into(),
            _ => FieldValue::Absent,
        }
    }
}

impl ViewEntity for UserRecord {
    const RESOURCE: ResourceKind = ResourceKind::Users;

    record_accessors!();

    fn field(&self, name: &str) -> FieldValue<'_> {
        match name {
            "id" => (&self.id).into(),
            "name" => (&self.name).into(),
            "email" => (&self.email).into(),
            "roleId" => (&self.role_id).into(),
            "verified" => self.verified.into(),
            _ => FieldValue::Absent,
        }
    }
}
