//! Per-resource view configuration: searchable columns and column filters.

use std::collections::BTreeMap;

use crate::cache::{FilterKind, MembershipPredicate, ResourceSchema};
use crate::domain::types::ResourceKind;

impl ResourceKind {
    /// Search and filter configuration used by list views of this resource.
    pub fn schema(self) -> ResourceSchema {
        match self {
            ResourceKind::ContactRequests => ResourceSchema::new(["name", "email", "subject"])
                .filter("email", FilterKind::Text)
                .filter("isRead", FilterKind::Bool),
            ResourceKind::Posts => ResourceSchema::new(["title", "slug"])
                .filter("authorId", FilterKind::Text)
                .filter("published", FilterKind::Bool),
            ResourceKind::Roles => ResourceSchema::new(["name", "description"]),
            ResourceKind::Sessions => ResourceSchema::new(["userId", "ipAddress", "userAgent"])
                .filter("userId", FilterKind::Text),
            ResourceKind::Students => ResourceSchema::new(["firstName", "lastName", "email"])
                .filter("grade", FilterKind::Text)
                .filter("enrolled", FilterKind::Bool),
            ResourceKind::Tags => ResourceSchema::new(["name", "slug"]),
            ResourceKind::Users => ResourceSchema::new(["name", "email"])
                .filter("roleId", FilterKind::Text)
                .filter("verified", FilterKind::Bool),
        }
    }

    pub fn predicate(self) -> MembershipPredicate {
        MembershipPredicate::new(self.schema())
    }
}

/// Schemas keyed by resource name, for one resource or all of them.
pub fn schemas(resource: Option<ResourceKind>) -> BTreeMap<&'static str, ResourceSchema> {
    let kinds = match resource {
        Some(kind) => vec![kind],
        None => ResourceKind::ALL.to_vec(),
    };
    kinds
        .into_iter()
        .map(|kind| (kind.as_str(), kind.schema()))
        .collect()
}
