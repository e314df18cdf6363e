//! Section listing scan and per-article extraction.
//!
//! Two phases, like every scraper in this crate:
//!
//! 1. **Indexing**: [`ArticleExtractor::collect_links`] reads the listing
//!    page and keeps the first `max` distinct links inside the section.
//! 2. **Fetching**: [`ArticleExtractor::extract_all`] visits each link in
//!    order. A failing article is logged and skipped.

use crate::browser::{Driver, DriverError, Locator, Navigable};
use crate::models::Article;
use crate::pipeline::RunContext;
use crate::scrapers::navigation::Navigator;
use crate::utils::{first_non_blank, truncate_for_log};
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

/// Failure isolated to a single article.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("failed to load article {url}: {source}")]
    Navigation {
        url: String,
        #[source]
        source: DriverError,
    },

    #[error("failed to read {field} of {url}: {source}")]
    Read {
        url: String,
        field: &'static str,
        #[source]
        source: DriverError,
    },
}

/// Raw image attributes read from the page, in fallback order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImageAttributes {
    pub src: Option<String>,
    pub data_src: Option<String>,
    pub data_lazy_src: Option<String>,
    pub srcset: Option<String>,
}

impl ImageAttributes {
    /// `src`, then the first non-blank of `data-src` / `data-lazy-src`, then
    /// the URL of the last `srcset` candidate. Blank means no image.
    pub fn resolve(&self) -> Option<String> {
        let direct = first_non_blank([
            self.src.as_deref(),
            self.data_src.as_deref(),
            self.data_lazy_src.as_deref(),
        ]);
        if let Some(url) = direct {
            return Some(url.to_string());
        }

        self.srcset
            .as_deref()?
            .split(',')
            .map(str::trim)
            .filter(|candidate| !candidate.is_empty())
            .last()?
            .split_whitespace()
            .next()
            .map(str::to_string)
    }
}

pub struct ArticleExtractor<'a, D> {
    ctx: &'a RunContext<'a, D>,
    navigator: Navigator<'a, D>,
}

impl<'a, D: Driver> ArticleExtractor<'a, D> {
    pub fn new(ctx: &'a RunContext<'a, D>) -> Self {
        Self {
            ctx,
            navigator: Navigator::new(ctx),
        }
    }

    fn driver(&self) -> &D {
        self.ctx.session.driver()
    }

    /// First `max` distinct link targets containing `section`, in page
    /// order. `listing` is only counted for diagnostics.
    #[instrument(level = "info", skip(self, listing, links))]
    pub async fn collect_links(
        &self,
        listing: &Locator,
        links: &Locator,
        max: usize,
        section: &str,
    ) -> Vec<String> {
        match self.driver().find_all(listing).await {
            Ok(found) => info!(count = found.len(), "Listing elements on page"),
            Err(e) => debug!(error = %e, "Could not count listing elements"),
        }

        let mut collected = Vec::new();
        if max == 0 {
            return collected;
        }

        let elements = match self.driver().find_all(links).await {
            Ok(found) => found,
            Err(e) => {
                warn!(%links, error = %e, "Could not read article links");
                return collected;
            }
        };

        let mut seen = HashSet::new();
        for element in &elements {
            let href = match self.driver().attribute(element, "href").await {
                Ok(Some(href)) => href,
                Ok(None) => continue,
                Err(e) => {
                    debug!(error = %e, "Skipping link with unreadable href");
                    continue;
                }
            };
            if href.contains(section) && seen.insert(href.clone()) {
                collected.push(href);
                if collected.len() >= max {
                    break;
                }
            }
        }

        info!(count = collected.len(), "Collected article links");
        for (i, url) in collected.iter().enumerate() {
            info!("  {}) {}", i + 1, url);
        }
        collected
    }

    /// Visit every URL in order, keeping the articles that could be
    /// extracted.
    #[instrument(level = "info", skip_all, fields(total = urls.len()))]
    pub async fn extract_all(&self, urls: &[String]) -> Vec<Article> {
        let total = urls.len();
        let articles: Vec<Article> = stream::iter(urls.iter().enumerate())
            .then(|(i, url)| async move {
                info!("=== Article {}/{} === {}", i + 1, total, url);
                match self.extract_article(url).await {
                    Ok(article) => Some(article),
                    Err(e) => {
                        error!(error = %e, %url, "Error processing article; continuing to next");
                        None
                    }
                }
            })
            .filter_map(std::future::ready)
            .collect()
            .await;

        info!(count = articles.len(), "Extracted articles");
        articles
    }

    /// Load `url` and read its title, first paragraph and header image.
    #[instrument(level = "info", skip(self))]
    pub async fn extract_article(&self, url: &str) -> Result<Article, ExtractError> {
        self.navigator
            .load(url)
            .await
            .map_err(|source| ExtractError::Navigation {
                url: url.to_string(),
                source,
            })?;

        let locators = &self.ctx.config.locators;
        let timeouts = &self.ctx.config.timeouts;
        let mut article = Article::new(url);

        article.title_es = self
            .read_text(url, "title", &locators.article_title, timeouts.title_secs)
            .await?;
        if article.title_es.is_empty() {
            info!("Title (ES): (not found)");
        } else {
            info!(title = %article.title_es, "Title (ES)");
        }

        let first_paragraph = self
            .read_text(
                url,
                "first paragraph",
                &locators.first_paragraph,
                timeouts.paragraph_secs,
            )
            .await?;
        if first_paragraph.is_empty() {
            info!("First paragraph (ES): (not found)");
        } else {
            info!(
                paragraph = %truncate_for_log(&first_paragraph, 300),
                "First paragraph (ES)"
            );
        }

        article.image_url = self.extract_image(url).await;
        Ok(article)
    }

    /// Text of the first visible match, `""` when nothing shows up in time.
    async fn read_text(
        &self,
        url: &str,
        field: &'static str,
        locator: &Locator,
        secs: u64,
    ) -> Result<String, ExtractError> {
        let waiter = self.navigator.waiter();
        match waiter.retrieve(locator, Duration::from_secs(secs)).await {
            Some(element) => {
                self.driver()
                    .text(&element)
                    .await
                    .map_err(|source| ExtractError::Read {
                        url: url.to_string(),
                        field,
                        source,
                    })
            }
            None => Ok(String::new()),
        }
    }

    /// Header image URL, downloading it when an image store is configured.
    /// Never fails the article.
    async fn extract_image(&self, url: &str) -> Option<String> {
        let locator = &self.ctx.config.locators.article_image;
        let timeout = Duration::from_secs(self.ctx.config.timeouts.image_secs);
        let Some(image) = self.navigator.waiter().retrieve(locator, timeout).await else {
            info!("Image URL: (none)");
            return None;
        };

        let attributes = match self.image_attributes(&image).await {
            Ok(attributes) => attributes,
            Err(e) => {
                warn!(error = %e, "Image: error while reading attributes");
                return None;
            }
        };
        let Some(image_url) = attributes.resolve() else {
            info!("Image URL: (none)");
            return None;
        };
        info!(%image_url, "Image URL");

        if let Some(store) = self.ctx.images {
            let page_url = match self.driver().current_url().await {
                Ok(current) if !current.is_empty() => current,
                _ => url.to_string(),
            };
            let absolute = Url::parse(&page_url)
                .and_then(|base| base.join(&image_url))
                .map(String::from)
                .unwrap_or_else(|_| image_url.clone());
            match store.save(&absolute).await {
                Ok(path) => info!(path = %path.display(), "Saved image"),
                Err(e) => warn!(error = %e, "Image download failed"),
            }
        }
        Some(image_url)
    }

    async fn image_attributes(
        &self,
        image: &<D as Navigable>::Element,
    ) -> Result<ImageAttributes, DriverError> {
        let driver = self.driver();
        Ok(ImageAttributes {
            src: driver.attribute(image, "src").await?,
            data_src: driver.attribute(image, "data-src").await?,
            data_lazy_src: driver.attribute(image, "data-lazy-src").await?,
            srcset: driver.attribute(image, "srcset").await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::images::ImageStore;
    use crate::scrapers::testing::{FakeDriver, FakeElement};
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path},
    };

    const LISTING: &str = "https://elpais.com/opinion/";

    fn config() -> Config {
        let mut config = Config::default();
        config.locators.all_articles = Locator::css("article");
        config.locators.article_links = Locator::css("article h2 a");
        config.locators.article_title = Locator::css("h1");
        config.locators.first_paragraph = Locator::css("header + div p");
        config.locators.article_image = Locator::css("article header img");
        config
    }

    /// A link element per entry; `None` gives an anchor without `href`.
    fn listing_driver(hrefs: &[Option<&str>]) -> FakeDriver {
        let config = config();
        let links = hrefs
            .iter()
            .enumerate()
            .map(|(i, href)| match href {
                Some(href) => FakeElement::new(i, "titular").attr("href", href),
                None => FakeElement::new(i, "titular"),
            })
            .collect();
        FakeDriver::default().page(
            LISTING,
            vec![
                (config.locators.all_articles.clone(), vec![FakeElement::new(100, "")]),
                (config.locators.article_links.clone(), links),
            ],
        )
    }

    #[test]
    fn test_image_resolution_precedence() {
        let attrs = ImageAttributes {
            src: Some("https://img/src.jpg".into()),
            data_src: Some("https://img/data.jpg".into()),
            data_lazy_src: None,
            srcset: Some("https://img/small.jpg 320w, https://img/big.jpg 1024w".into()),
        };
        assert_eq!(attrs.resolve().as_deref(), Some("https://img/src.jpg"));

        let attrs = ImageAttributes {
            src: Some("  ".into()),
            data_src: Some("".into()),
            data_lazy_src: Some("https://img/lazy.jpg".into()),
            ..attrs
        };
        assert_eq!(attrs.resolve().as_deref(), Some("https://img/lazy.jpg"));

        let attrs = ImageAttributes {
            data_lazy_src: None,
            ..attrs
        };
        assert_eq!(attrs.resolve().as_deref(), Some("https://img/big.jpg"));
    }

    #[test]
    fn test_image_resolution_blank_is_none() {
        assert_eq!(ImageAttributes::default().resolve(), None);
        let attrs = ImageAttributes {
            srcset: Some(" , ".into()),
            ..Default::default()
        };
        assert_eq!(attrs.resolve(), None);
        let attrs = ImageAttributes {
            srcset: Some("a.jpg 1x, b.jpg 2x,".into()),
            ..Default::default()
        };
        assert_eq!(attrs.resolve().as_deref(), Some("b.jpg"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_collect_links_filters_dedupes_and_bounds() {
        let mut driver = listing_driver(&[
            Some("https://elpais.com/opinion/2025-01-01/a.html"),
            None,
            Some("https://elpais.com/espana/2025-01-01/b.html"),
            Some("https://elpais.com/opinion/2025-01-01/a.html"),
            Some("https://elpais.com/opinion/2025-01-01/stale.html"),
            Some("https://elpais.com/opinion/2025-01-02/c.html"),
            Some("https://elpais.com/opinion/2025-01-03/d.html"),
        ]);
        driver.unreadable_attributes.push(4);
        let session = driver.scripted();
        session.driver().goto(LISTING).await.unwrap();
        let config = config();
        let ctx = RunContext::new(&session, &config, None);
        let extractor = ArticleExtractor::new(&ctx);
        let locators = &config.locators;

        let links = extractor
            .collect_links(&locators.all_articles, &locators.article_links, 2, "/opinion/")
            .await;
        assert_eq!(
            links,
            vec![
                "https://elpais.com/opinion/2025-01-01/a.html",
                "https://elpais.com/opinion/2025-01-02/c.html",
            ]
        );

        let all = extractor
            .collect_links(&locators.all_articles, &locators.article_links, 10, "/opinion/")
            .await;
        assert_eq!(all.len(), 3);
        assert!(all.iter().all(|l| l.contains("/opinion/")));
        assert!(!all.iter().any(|l| l.ends_with("stale.html")));

        let none = extractor
            .collect_links(&locators.all_articles, &locators.article_links, 0, "/opinion/")
            .await;
        assert!(none.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_extract_article_without_title_or_image() {
        let url = "https://elpais.com/opinion/2025-01-01/empty.html";
        let session = FakeDriver::default().page(url, vec![]).scripted();
        let config = config();
        let ctx = RunContext::new(&session, &config, None);
        let extractor = ArticleExtractor::new(&ctx);

        let article = extractor.extract_article(url).await.unwrap();
        assert_eq!(article.url(), url);
        assert_eq!(article.title_es, "");
        assert!(article.image_url.is_none());
        assert!(article.title_en.is_none());
    }

    #[tokio::test]
    async fn test_extract_article_reads_fields_and_saves_image() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/fotos/portada.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"IMG".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let url = "https://elpais.com/opinion/2025-01-01/paz.html";
        let config = config();
        let image_src = format!("{}/fotos/portada.jpg", server.uri());
        let session = FakeDriver::default()
            .page(
                url,
                vec![
                    (
                        config.locators.article_title.clone(),
                        vec![FakeElement::new(1, "Guerra y paz")],
                    ),
                    (
                        config.locators.first_paragraph.clone(),
                        vec![FakeElement::new(2, "Primer párrafo.")],
                    ),
                    (
                        config.locators.article_image.clone(),
                        vec![FakeElement::new(3, "").attr("data-src", &image_src)],
                    ),
                ],
            )
            .scripted();

        let tmp = tempfile::tempdir().unwrap();
        let store = ImageStore::new(tmp.path(), Duration::from_secs(5)).unwrap();
        let ctx = RunContext::new(&session, &config, Some(&store));
        let extractor = ArticleExtractor::new(&ctx);

        let article = extractor.extract_article(url).await.unwrap();
        assert_eq!(article.title_es, "Guerra y paz");
        assert_eq!(article.image_url.as_deref(), Some(image_src.as_str()));
        assert!(tmp.path().join("portada.jpg").exists());
    }

    #[tokio::test]
    async fn test_relative_image_resolved_against_final_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/articulos/2025/fotos/portada.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"IMG".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let requested = "https://elpais.com/opinion/2025-01-01/paz.html";
        let landed = format!("{}/articulos/2025/paz.html", server.uri());
        let config = config();
        let mut driver = FakeDriver::default().page(
            &landed,
            vec![
                (
                    config.locators.article_title.clone(),
                    vec![FakeElement::new(1, "Guerra y paz")],
                ),
                (
                    config.locators.first_paragraph.clone(),
                    vec![FakeElement::new(2, "Primer párrafo.")],
                ),
                (
                    config.locators.article_image.clone(),
                    vec![FakeElement::new(3, "").attr("src", "fotos/portada.jpg")],
                ),
            ],
        );
        driver.redirects.insert(requested.to_string(), landed);
        let session = driver.scripted();

        let tmp = tempfile::tempdir().unwrap();
        let store = ImageStore::new(tmp.path(), Duration::from_secs(5)).unwrap();
        let ctx = RunContext::new(&session, &config, Some(&store));
        let extractor = ArticleExtractor::new(&ctx);

        let article = extractor.extract_article(requested).await.unwrap();
        assert_eq!(article.url(), requested);
        assert_eq!(article.image_url.as_deref(), Some("fotos/portada.jpg"));
        assert!(tmp.path().join("portada.jpg").exists());
    }

    #[tokio::test(start_paused = true)]
    async fn test_extract_all_isolates_failures() {
        let good = "https://elpais.com/opinion/a.html";
        let down = "https://elpais.com/opinion/down.html";
        let stale = "https://elpais.com/opinion/stale.html";
        let config = config();
        let title = config.locators.article_title.clone();

        let mut driver = FakeDriver::default()
            .page(good, vec![(title.clone(), vec![FakeElement::new(1, "Bueno")])])
            .page(stale, vec![(title, vec![FakeElement::new(2, "Viejo")])]);
        driver.unreachable.push(down.to_string());
        driver.unreadable_text.push(2);
        let session = driver.scripted();
        let ctx = RunContext::new(&session, &config, None);
        let extractor = ArticleExtractor::new(&ctx);

        let urls = vec![down.to_string(), stale.to_string(), good.to_string()];
        let articles = extractor.extract_all(&urls).await;

        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].url(), good);
        assert_eq!(articles[0].title_es, "Bueno");
        assert_eq!(session.driver().visits(), vec![down, stale, good]);
    }
}
