//! Data models for scraped articles and the per-run report.
//!
//! - [`Article`]: one scraped article, filled in progressively by the pipeline
//! - [`RunReport`]: everything a successful run produces

use crate::analysis::WordFrequencies;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// A single article scraped from the section listing.
///
/// The URL is fixed at construction. The remaining fields are filled as the
/// pipeline advances; `title_en` is only ever set for every article of a run
/// at once, after the batch translation succeeded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Article {
    url: String,
    /// Spanish title as shown on the page, `""` when no title was found.
    pub title_es: String,
    /// English title, `None` until the batch translation completes.
    pub title_en: Option<String>,
    /// Header image URL, `None` when the article has no image.
    pub image_url: Option<String>,
    /// Article body. Never scraped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl Article {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title_es: String::new(),
            title_en: None,
            image_url: None,
            content: None,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Output of a completed run.
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub generated_at: DateTime<Utc>,
    pub section_url: String,
    pub threshold: usize,
    pub articles: Vec<Article>,
    pub repeated_words: WordFrequencies,
}
