//! Remote data model for the knowledge-base API.
//!
//! Every entity keeps the fields lakeexport does not interpret in `extra`, so a
//! raw document written to disk carries the full API payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{LakeExportError, Result};

// ---------------------------------------------------------------------------
// Remote trait
// ---------------------------------------------------------------------------

/// A remote entity identified by a stable key and carrying a modification time.
pub trait Remote {
    /// Stable identifier within its listing (slug or login).
    fn key(&self) -> &str;
    /// Last modification time reported by the service.
    fn updated_at(&self) -> DateTime<Utc>;
}

/// `true` if `fresh` was modified after `cached`.
pub fn has_update<T: Remote>(cached: &T, fresh: &T) -> bool {
    fresh.updated_at() > cached.updated_at()
}

/// Reject remote identifiers that cannot be used as a single path component.
pub fn validate_path_component(name: &str) -> Result<&str> {
    if name.is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\\')
        || name.contains('\0')
    {
        return Err(LakeExportError::validation(format!(
            "unsafe path component {name:?}"
        )));
    }
    Ok(name)
}

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// The authenticated account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub login: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub updated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Remote for User {
    fn key(&self) -> &str {
        &self.login
    }
    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

// ---------------------------------------------------------------------------
// Repo
// ---------------------------------------------------------------------------

/// A knowledge base (document repository) owned by the account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repo {
    pub id: u64,
    pub slug: String,
    pub name: String,
    /// `<login>/<slug>`.
    pub namespace: String,
    pub updated_at: DateTime<Utc>,
    /// Catalog in YAML, present on the repo detail endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub toc_yml: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Remote for Repo {
    fn key(&self) -> &str {
        &self.slug
    }
    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

// ---------------------------------------------------------------------------
// Documents
// ---------------------------------------------------------------------------

/// A document as listed in a repo.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocSummary {
    pub id: u64,
    pub slug: String,
    pub title: String,
    pub updated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Remote for DocSummary {
    fn key(&self) -> &str {
        &self.slug
    }
    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

/// A full document, as stored on disk after a crawl.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocDetail {
    pub id: u64,
    pub slug: String,
    pub title: String,
    /// `lake`, `markdown`, `lakesheet`, ...
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    /// Markdown source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_html: Option<String>,
    /// Lake source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_lake: Option<String>,
    pub updated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Remote for DocDetail {
    fn key(&self) -> &str {
        &self.slug
    }
    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(slug: &str, updated_at: &str) -> DocSummary {
        serde_json::from_value(serde_json::json!({
            "id": 1,
            "slug": slug,
            "title": "Doc",
            "updated_at": updated_at,
        }))
        .expect("deserialize summary")
    }

    #[test]
    fn has_update_compares_timestamps() {
        let old = summary("a", "2024-01-01T00:00:00.000Z");
        let new = summary("a", "2024-03-01T10:00:00.000Z");
        assert!(has_update(&old, &new));
        assert!(!has_update(&new, &old));
        assert!(!has_update(&old, &old.clone()));
    }

    #[test]
    fn has_update_sees_multi_day_gaps() {
        let old = summary("a", "2024-01-01T12:00:00Z");
        let new = summary("a", "2024-01-03T11:00:00Z");
        assert!(has_update(&old, &new));
    }

    #[test]
    fn unknown_fields_survive_serialization() {
        let raw = serde_json::json!({
            "id": 7,
            "slug": "intro",
            "title": "Intro",
            "format": "lake",
            "body_lake": "<!doctype lake><p>hi</p>",
            "updated_at": "2024-01-01T00:00:00Z",
            "word_count": 1,
            "creator": {"login": "alice"}
        });
        let doc: DocDetail = serde_json::from_value(raw).unwrap();
        assert_eq!(doc.format.as_deref(), Some("lake"));
        assert_eq!(doc.extra["word_count"], 1);

        let back = serde_json::to_value(&doc).unwrap();
        assert_eq!(back["creator"]["login"], "alice");
        assert!(back.get("body").is_none());
    }

    #[test]
    fn path_components_validated() {
        assert!(validate_path_component("getting-started").is_ok());
        assert!(validate_path_component("").is_err());
        assert!(validate_path_component("..").is_err());
        assert!(validate_path_component("a/b").is_err());
        assert!(validate_path_component("a\\b").is_err());
    }
}
