//! Replay fixture files.

use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use crate::cache::ViewKey;

use super::error::InfraError;

/// A recorded scenario: seed records, the views a screen has open, and the
/// push messages that arrive afterwards.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayFixture {
    pub resource: String,
    #[serde(default)]
    pub records: Vec<Value>,
    pub views: Vec<ViewKey>,
    #[serde(default)]
    pub messages: Vec<Value>,
}

impl ReplayFixture {
    pub fn parse(path: &Path, contents: &str) -> Result<Self, InfraError> {
        let fixture: Self = serde_json::from_str(contents)
            .map_err(|err| InfraError::fixture(path, err.to_string()))?;
        for view in &fixture.views {
            view.validate()
                .map_err(|err| InfraError::fixture(path, err.to_string()))?;
        }
        Ok(fixture)
    }

    pub async fn load(path: &Path) -> Result<Self, InfraError> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|err| InfraError::fixture(path, format!("cannot read file: {err}")))?;
        Self::parse(path, &contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_views_and_defaults_optional_sections() {
        let fixture = ReplayFixture::parse(
            Path::new("inline.json"),
            r#"{"resource":"tags","views":[{"page":1,"pageSize":5}]}"#,
        )
        .expect("fixture");

        assert_eq!(fixture.resource, "tags");
        assert!(fixture.records.is_empty());
        assert!(fixture.messages.is_empty());
        assert_eq!(fixture.views[0].page_size(), 5);
    }

    #[test]
    fn rejects_views_with_zero_page() {
        let err = ReplayFixture::parse(
            Path::new("bad.json"),
            r#"{"resource":"tags","views":[{"page":0,"pageSize":5}]}"#,
        )
        .expect_err("zero page");

        assert!(matches!(err, InfraError::Fixture { .. }));
    }

    #[tokio::test]
    async fn unreadable_path_is_a_fixture_error() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let missing = dir.path().join("absent.json");

        let err = ReplayFixture::load(&missing).await.expect_err("missing file");

        match err {
            InfraError::Fixture { path, message } => {
                assert_eq!(path, missing);
                assert!(message.starts_with("cannot read file"), "{message}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
