//! View key definitions.
//!
//! A [`ViewKey`] names one cached read of a collection. Keys are compared by
//! value; changing any field yields a different key rather than mutating the
//! cached entry.

use std::collections::BTreeMap;
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::domain::error::DomainError;
use crate::domain::types::StatusScope;

/// Identity of one cached list view.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewKey {
    #[serde(default)]
    status_scope: StatusScope,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    search: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    filters: BTreeMap<String, String>,
    page: u32,
    page_size: u32,
}

impl ViewKey {
    /// Create a key for the given page, rejecting zero page or page size.
    pub fn new(status_scope: StatusScope, page: u32, page_size: u32) -> Result<Self, DomainError> {
        let key = Self {
            status_scope,
            search: None,
            filters: BTreeMap::new(),
            page,
            page_size,
        };
        key.validate()?;
        Ok(key)
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        let search = search.into();
        self.search = if search.trim().is_empty() {
            None
        } else {
            Some(search)
        };
        self
    }

    pub fn with_filter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.insert(key.into(), value.into());
        self
    }

    /// Check the bounds that deserialization cannot enforce on its own.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.page == 0 {
            return Err(DomainError::invalid_view_key("page", "must be at least 1"));
        }
        if self.page_size == 0 {
            return Err(DomainError::invalid_view_key(
                "pageSize",
                "must be at least 1",
            ));
        }
        Ok(())
    }

    pub fn status_scope(&self) -> &StatusScope {
        &self.status_scope
    }

    pub fn search(&self) -> Option<&str> {
        self.search.as_deref()
    }

    pub fn filters(&self) -> &BTreeMap<String, String> {
        &self.filters
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn is_first_page(&self) -> bool {
        self.page == 1
    }

    /// Stable hash of the key, used to correlate log lines for one view.
    pub fn fingerprint(&self) -> u64 {
        hash_value(self)
    }
}

impl fmt::Display for ViewKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:p{}x{}",
            self.status_scope, self.page, self.page_size
        )?;
        if let Some(search) = &self.search {
            write!(f, ":q={search}")?;
        }
        for (key, value) in &self.filters {
            write!(f, ":{key}={value}")?;
        }
        Ok(())
    }
}

/// Compute a hash for any hashable value.
pub fn hash_value<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_with_equal_fields_are_identical() {
        let a = ViewKey::new(StatusScope::Active, 1, 20)
            .expect("key")
            .with_filter("roleId", "admin")
            .with_filter("verified", "true");
        let b = ViewKey::new(StatusScope::Active, 1, 20)
            .expect("key")
            .with_filter("verified", "true")
            .with_filter("roleId", "admin");

        assert_eq!(a, b);
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn any_changed_field_is_a_different_key() {
        let base = ViewKey::new(StatusScope::Active, 1, 20).expect("key");

        assert_ne!(base, ViewKey::new(StatusScope::Deleted, 1, 20).expect("key"));
        assert_ne!(base, ViewKey::new(StatusScope::Active, 2, 20).expect("key"));
        assert_ne!(base, ViewKey::new(StatusScope::Active, 1, 10).expect("key"));
        assert_ne!(base, base.clone().with_search("ada"));
        assert_ne!(base, base.clone().with_filter("roleId", "admin"));
    }

    #[test]
    fn blank_search_is_dropped() {
        let key = ViewKey::new(StatusScope::All, 1, 5)
            .expect("key")
            .with_search("   ");
        assert_eq!(key.search(), None);
    }

    #[test]
    fn zero_page_or_page_size_is_rejected() {
        assert!(ViewKey::new(StatusScope::Active, 0, 10).is_err());
        assert!(ViewKey::new(StatusScope::Active, 1, 0).is_err());
    }

    #[test]
    fn missing_status_scope_defaults_to_active() {
        let key: ViewKey = serde_json::from_str(r#"{"page":1,"pageSize":10}"#).expect("key");
        assert_eq!(key.status_scope(), &StatusScope::Active);
        assert!(key.validate().is_ok());
    }

    #[test]
    fn deserialized_zero_page_fails_validation() {
        let key: ViewKey =
            serde_json::from_str(r#"{"statusScope":"deleted","page":0,"pageSize":10}"#)
                .expect("key");
        assert!(key.validate().is_err());
    }

    #[test]
    fn display_includes_search_and_filters() {
        let key = ViewKey::new(StatusScope::Workflow("new".into()), 2, 25)
            .expect("key")
            .with_search("hello")
            .with_filter("email", "a@b.c");
        assert_eq!(key.to_string(), "new:p2x25:q=hello:email=a@b.c");
    }
}
