//! Browser-driven scraping components for the section being digested.
//!
//! Each component borrows the run's [`RunContext`](crate::pipeline::RunContext)
//! and follows the same two-phase pattern as the rest of the crate:
//!
//! 1. **Indexing**: reach the section and collect article URLs
//! 2. **Fetching**: visit each URL and extract an [`Article`](crate::models::Article)
//!
//! | Component | Module | Role |
//! |-----------|--------|------|
//! | `WaitEngine` | [`wait`] | Bounded polling for visible elements |
//! | `Navigator` | [`navigation`] | Home page, consent banner, section |
//! | `ArticleExtractor` | [`articles`] | Link collection and per-article extraction |
//!
//! Lookups that time out are "not found", never errors. Failures while
//! extracting one article are logged and skipped.

pub mod articles;
pub mod navigation;
pub mod wait;

#[cfg(test)]
pub(crate) mod testing;
