use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("invalid view key field `{field}`: {reason}")]
    InvalidViewKey { field: &'static str, reason: String },
    #[error("unknown resource `{0}`")]
    UnknownResource(String),
}

impl DomainError {
    pub fn invalid_view_key(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidViewKey {
            field,
            reason: reason.into(),
        }
    }

    pub fn unknown_resource(name: impl Into<String>) -> Self {
        Self::UnknownResource(name.into())
    }
}
