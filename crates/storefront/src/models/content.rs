//! CMS pages and blog posts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use canopy_core::{PageId, PostId};

use super::{ValidationError, require_text};

/// Search metadata stored with a page or post.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Seo {
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
    pub keywords: Vec<String>,
    pub og_image: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Page {
    pub id: PageId,
    pub title: String,
    pub slug: String,
    pub content: String,
    pub is_published: bool,
    pub published_at: Option<DateTime<Utc>>,
    pub seo: Seo,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Post {
    pub id: PostId,
    pub title: String,
    pub slug: String,
    pub content: String,
    pub excerpt: Option<String>,
    pub author: Option<String>,
    pub tags: Vec<String>,
    pub is_published: bool,
    pub published_at: Option<DateTime<Utc>>,
    pub seo: Seo,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PageInput {
    pub title: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub is_published: bool,
    #[serde(default)]
    pub seo: Seo,
}

impl PageInput {
    /// # Errors
    ///
    /// Returns `ValidationError` for a blank title.
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("title", &self.title)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PostInput {
    pub title: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub excerpt: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_published: bool,
    #[serde(default)]
    pub seo: Seo,
}

impl PostInput {
    /// Validate and tidy tags (trimmed, lowercased, blanks and duplicates
    /// dropped).
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` for a blank title.
    pub fn validate(&mut self) -> Result<(), ValidationError> {
        require_text("title", &self.title)?;
        let mut tags: Vec<String> = self
            .tags
            .iter()
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        tags.sort();
        tags.dedup();
        self.tags = tags;
        Ok(())
    }
}

/// `published_at` after an update.
///
/// Set the first time a document is published and kept afterwards, even
/// across unpublish and republish.
#[must_use]
pub fn next_published_at(
    existing: Option<DateTime<Utc>>,
    is_published: bool,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    match existing {
        Some(at) => Some(at),
        None if is_published => Some(now),
        None => None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_published_at_set_once() {
        let first = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        let later = Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap();

        assert_eq!(next_published_at(None, false, later), None);
        assert_eq!(next_published_at(None, true, first), Some(first));
        assert_eq!(next_published_at(Some(first), true, later), Some(first));
        assert_eq!(next_published_at(Some(first), false, later), Some(first));
    }

    #[test]
    fn test_post_tags_are_normalized() {
        let mut input: PostInput = serde_json::from_str(
            r#"{"title": "Terpenes 101", "tags": [" Education", "education", "", "CBD"]}"#,
        )
        .unwrap();
        input.validate().unwrap();
        assert_eq!(input.tags, vec!["cbd", "education"]);
    }

    #[test]
    fn test_seo_defaults() {
        let seo: Seo = serde_json::from_str(r#"{"meta_title": "Shop"}"#).unwrap();
        assert_eq!(seo.meta_title.as_deref(), Some("Shop"));
        assert!(seo.keywords.is_empty());
    }
}
