//! One scraping run: navigate, extract, translate, analyze.
//!
//! Everything a run needs is borrowed through [`RunContext`]. The browser
//! session is owned by the caller and outlives the run, so it is released
//! on every exit path.

use crate::analysis::{WordFrequencies, repeated_words};
use crate::api::{Translate, TranslationError};
use crate::browser::{Driver, Session};
use crate::config::Config;
use crate::images::ImageStore;
use crate::models::{Article, RunReport};
use crate::scrapers::articles::ArticleExtractor;
use crate::scrapers::navigation::Navigator;
use crate::scrapers::wait::WaitEngine;
use chrono::Utc;
use thiserror::Error;
use tracing::{info, instrument};

/// Per-run state shared by the scraping components.
pub struct RunContext<'a, D> {
    pub session: &'a Session<D>,
    pub config: &'a Config,
    /// Destination for header images; `None` disables downloads.
    pub images: Option<&'a ImageStore>,
}

impl<'a, D: Driver> RunContext<'a, D> {
    pub fn new(
        session: &'a Session<D>,
        config: &'a Config,
        images: Option<&'a ImageStore>,
    ) -> Self {
        Self {
            session,
            config,
            images,
        }
    }

    pub fn waiter(&self) -> WaitEngine<'a, D> {
        WaitEngine::new(self.session, self.config.timeouts.poll_interval())
    }
}

#[derive(Error, Debug)]
pub enum PipelineError {
    /// The batch translation failed. The extracted articles are handed back
    /// untranslated.
    #[error("translation failed for {} article(s): {source}", articles.len())]
    Translation {
        #[source]
        source: TranslationError,
        articles: Vec<Article>,
    },
}

#[instrument(level = "info", skip_all, fields(section = %ctx.config.site.section_url))]
pub async fn run<D, T>(ctx: &RunContext<'_, D>, translator: &T) -> Result<RunReport, PipelineError>
where
    D: Driver,
    T: Translate,
{
    let site = &ctx.config.site;
    let locators = &ctx.config.locators;
    let threshold = ctx.config.analysis.threshold;

    let navigator = Navigator::new(ctx);
    navigator.open(&site.base_url).await;
    navigator.dismiss_consent(&locators.consent_button).await;
    navigator.check_language(&locators.language_marker).await;

    let route = navigator
        .go_to_section(&locators.section_nav, &site.section_url)
        .await;
    let confirmed = navigator
        .confirm_section(&locators.section_header, &site.section_url)
        .await;
    info!(?route, confirmed, "Reached section");

    let extractor = ArticleExtractor::new(ctx);
    let links = extractor
        .collect_links(
            &locators.all_articles,
            &locators.article_links,
            site.max_articles,
            &site.section_path,
        )
        .await;
    let mut articles = extractor.extract_all(&links).await;

    let report = |articles: Vec<Article>, repeated_words: WordFrequencies| RunReport {
        generated_at: Utc::now(),
        section_url: site.section_url.clone(),
        threshold,
        articles,
        repeated_words,
    };

    if articles.is_empty() {
        info!("No titles available to translate");
        return Ok(report(articles, WordFrequencies::default()));
    }

    let titles_es: Vec<String> = articles.iter().map(|a| a.title_es.clone()).collect();
    let titles_en = match translator.translate_batch(&titles_es).await {
        Ok(titles) => titles,
        Err(source) => return Err(PipelineError::Translation { source, articles }),
    };

    info!("Translated titles");
    for (i, (article, title_en)) in articles.iter_mut().zip(titles_en).enumerate() {
        info!("  {}) ES: {}", i + 1, article.title_es);
        info!("     EN: {}", title_en);
        article.title_en = Some(title_en);
    }

    let repeated = repeated_words(
        articles.iter().filter_map(|a| a.title_en.as_deref()),
        threshold,
    );
    info!(threshold, "Repeated words (count > threshold)");
    if repeated.is_empty() {
        info!("  None found");
    }
    for (word, count) in repeated.iter() {
        info!("  {word}: {count}");
    }

    Ok(report(articles, repeated))
}
