//! Membership predicate.
//!
//! Decides whether an entity snapshot currently belongs in a cached view.
//! The predicate is configured per resource with a [`ResourceSchema`] listing
//! the searchable text fields and the filterable columns.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::domain::entities::{FieldValue, ViewEntity};
use crate::domain::types::{LifecycleStatus, StatusScope};

use super::keys::ViewKey;

/// How a column filter value is compared with the entity field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    /// Exact string equality.
    Text,
    /// `"true"` / `"false"` compared with a boolean field.
    Bool,
}

/// Searchable fields and filter comparators of one resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResourceSchema {
    pub searchable: Vec<String>,
    pub filters: BTreeMap<String, FilterKind>,
}

impl ResourceSchema {
    pub fn new<I, S>(searchable: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            searchable: searchable.into_iter().map(Into::into).collect(),
            filters: BTreeMap::new(),
        }
    }

    pub fn filter(mut self, key: impl Into<String>, kind: FilterKind) -> Self {
        self.filters.insert(key.into(), kind);
        self
    }
}

#[derive(Debug, Clone)]
pub struct MembershipPredicate {
    schema: ResourceSchema,
}

impl MembershipPredicate {
    pub fn new(schema: ResourceSchema) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &ResourceSchema {
        &self.schema
    }

    /// True when `entity` passes the status, search and filter checks of `key`.
    pub fn matches<E: ViewEntity>(&self, key: &ViewKey, entity: &E) -> bool {
        status_matches(key.status_scope(), entity)
            && self.search_matches(key.search(), entity)
            && self.filters_match(key, entity)
    }

    fn search_matches<E: ViewEntity>(&self, search: Option<&str>, entity: &E) -> bool {
        let term = match search.map(str::trim) {
            None | Some("") => return true,
            Some(term) => term.to_lowercase(),
        };

        self.schema.searchable.iter().any(|field| {
            entity
                .field(field)
                .as_text()
                .is_some_and(|value| value.to_lowercase().contains(&term))
        })
    }

    fn filters_match<E: ViewEntity>(&self, key: &ViewKey, entity: &E) -> bool {
        key.filters().iter().all(|(name, expected)| {
            if expected.is_empty() {
                return true;
            }
            // Unknown keys are ignored so older clients keep working when
            // the backend adds filter columns.
            let Some(kind) = self.schema.filters.get(name) else {
                return true;
            };
            compare(*kind, entity.field(name), expected)
        })
    }
}

fn status_matches<E: ViewEntity>(scope: &StatusScope, entity: &E) -> bool {
    let lifecycle = entity.lifecycle_status();
    match scope {
        StatusScope::All => true,
        StatusScope::Active => lifecycle == LifecycleStatus::Active,
        StatusScope::Deleted => lifecycle == LifecycleStatus::Deleted,
        StatusScope::Workflow(state) => {
            lifecycle == LifecycleStatus::Active
                && entity.workflow_status() == Some(state.as_str())
        }
    }
}

fn compare(kind: FilterKind, actual: FieldValue<'_>, expected: &str) -> bool {
    match kind {
        FilterKind::Text => match actual {
            FieldValue::Text(value) => value == expected,
            FieldValue::Bool(value) => parse_bool(expected) == Some(value),
            FieldValue::Absent => false,
        },
        FilterKind::Bool => match parse_bool(expected) {
            None => true,
            Some(wanted) => actual == FieldValue::Bool(wanted),
        },
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use time::OffsetDateTime;
    use time::macros::datetime;

    use super::*;
    use crate::domain::entities::{ContactRequestRecord, UserRecord};

    fn user(id: &str, name: &str, deleted: bool) -> UserRecord {
        UserRecord {
            id: id.to_string(),
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
            role_id: Some("editor".to_string()),
            verified: true,
            created_at: datetime!(2024-03-01 12:00 UTC),
            deleted_at: deleted.then(OffsetDateTime::now_utc),
        }
    }

    fn predicate() -> MembershipPredicate {
        MembershipPredicate::new(
            ResourceSchema::new(["name", "email"])
                .filter("roleId", FilterKind::Text)
                .filter("verified", FilterKind::Bool),
        )
    }

    fn key(scope: StatusScope) -> ViewKey {
        ViewKey::new(scope, 1, 10).expect("valid key")
    }

    #[test]
    fn status_scope_uses_derived_lifecycle() {
        let predicate = predicate();
        let active = user("u-1", "Ada", false);
        let deleted = user("u-2", "Bob", true);

        assert!(predicate.matches(&key(StatusScope::Active), &active));
        assert!(!predicate.matches(&key(StatusScope::Active), &deleted));
        assert!(predicate.matches(&key(StatusScope::Deleted), &deleted));
        assert!(!predicate.matches(&key(StatusScope::Deleted), &active));
        assert!(predicate.matches(&key(StatusScope::All), &active));
        assert!(predicate.matches(&key(StatusScope::All), &deleted));
    }

    #[test]
    fn workflow_scope_requires_active_entity_in_that_state() {
        let predicate = MembershipPredicate::new(ResourceSchema::new(["subject"]));
        let mut request = ContactRequestRecord {
            id: "c-1".into(),
            name: "Ada".into(),
            email: "ada@example.com".into(),
            subject: "Hello".into(),
            message: String::new(),
            is_read: false,
            created_at: datetime!(2024-03-01 12:00 UTC),
            deleted_at: None,
        };
        let scope = key(StatusScope::Workflow("new".into()));

        assert!(predicate.matches(&scope, &request));
        request.is_read = true;
        assert!(!predicate.matches(&scope, &request));
        request.is_read = false;
        request.deleted_at = Some(datetime!(2024-03-02 12:00 UTC));
        assert!(!predicate.matches(&scope, &request));
    }

    #[test]
    fn search_is_trimmed_case_insensitive_substring() {
        let predicate = predicate();
        let ada = user("u-1", "Ada Lovelace", false);

        assert!(predicate.matches(&key(StatusScope::Active).with_search("  LOVE "), &ada));
        assert!(predicate.matches(&key(StatusScope::Active).with_search("example.com"), &ada));
        assert!(!predicate.matches(&key(StatusScope::Active).with_search("turing"), &ada));
    }

    #[test]
    fn search_ignores_fields_outside_schema() {
        let predicate = predicate();
        let ada = user("u-1", "Ada", false);
        // `roleId` holds "editor" but is not searchable.
        assert!(!predicate.matches(&key(StatusScope::Active).with_search("editor"), &ada));
    }

    #[test]
    fn filters_compare_by_kind() {
        let predicate = predicate();
        let ada = user("u-1", "Ada", false);

        assert!(predicate.matches(&key(StatusScope::Active).with_filter("roleId", "editor"), &ada));
        assert!(!predicate.matches(&key(StatusScope::Active).with_filter("roleId", "admin"), &ada));
        assert!(predicate.matches(&key(StatusScope::Active).with_filter("verified", "true"), &ada));
        assert!(!predicate.matches(&key(StatusScope::Active).with_filter("verified", "false"), &ada));
    }

    #[test]
    fn empty_unknown_and_unparseable_filters_are_ignored() {
        let predicate = predicate();
        let ada = user("u-1", "Ada", false);

        assert!(predicate.matches(&key(StatusScope::Active).with_filter("roleId", ""), &ada));
        assert!(predicate.matches(&key(StatusScope::Active).with_filter("plan", "gold"), &ada));
        assert!(predicate.matches(&key(StatusScope::Active).with_filter("verified", "yes"), &ada));
    }

    #[test]
    fn text_filter_on_missing_field_fails() {
        let predicate = predicate();
        let mut ada = user("u-1", "Ada", false);
        ada.role_id = None;
        assert!(!predicate.matches(&key(StatusScope::Active).with_filter("roleId", "editor"), &ada));
    }

    #[test]
    fn all_checks_must_pass() {
        let predicate = predicate();
        let deleted = user("u-2", "Bob", true);
        let view = key(StatusScope::Active)
            .with_search("bob")
            .with_filter("roleId", "editor");
        assert!(!predicate.matches(&view, &deleted));
    }
}
