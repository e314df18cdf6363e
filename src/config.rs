//! Run configuration: site URLs, the locator table, wait bounds and the
//! translation endpoint.
//!
//! Everything has a built-in default matching the El País "Opinión" section,
//! so the YAML file only needs the keys it wants to change. The translation
//! API key is a secret and is never read from this file.

use crate::browser::Locator;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::fs;
use tracing::{info, instrument};
use url::Url;

/// Fatal startup errors while loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub site: SiteConfig,
    pub locators: Locators,
    pub timeouts: Timeouts,
    pub translation: TranslationConfig,
    pub analysis: AnalysisConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Home page loaded first.
    pub base_url: String,
    /// Section listing, loaded directly when the nav link cannot be used.
    pub section_url: String,
    /// Substring every kept article link must contain.
    pub section_path: String,
    pub max_articles: usize,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: "https://elpais.com/".to_string(),
            section_url: "https://elpais.com/opinion/".to_string(),
            section_path: "/opinion/".to_string(),
            max_articles: 5,
        }
    }
}

/// Symbolic locator names used by the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Locators {
    pub language_marker: Locator,
    pub consent_button: Locator,
    pub section_nav: Locator,
    pub section_header: Locator,
    pub all_articles: Locator,
    pub article_links: Locator,
    pub article_title: Locator,
    pub first_paragraph: Locator,
    pub article_image: Locator,
}

impl Default for Locators {
    fn default() -> Self {
        Self {
            language_marker: Locator::xpath(
                r#"//*[text()="Seleccione:"]/following-sibling::div//span[text()="España"]"#,
            ),
            consent_button: Locator::xpath(
                "//button[@id='didomi-notice-agree-button' or contains(., 'Aceptar') or contains(., 'Accept')]",
            ),
            section_nav: Locator::xpath(r#"//nav[@class="cs_m"]//a[text()="Opinión"]"#),
            section_header: Locator::xpath(r#"//h1/a[text()="Opinión"]"#),
            all_articles: Locator::xpath("//article"),
            article_links: Locator::xpath("//article//h2/a"),
            article_title: Locator::xpath("//h1"),
            first_paragraph: Locator::xpath("(//header/following-sibling::div/p)[1]"),
            article_image: Locator::xpath("//article/header//img"),
        }
    }
}

impl Locators {
    /// Every locator with its config key.
    pub fn entries(&self) -> [(&'static str, &Locator); 9] {
        [
            ("language_marker", &self.language_marker),
            ("consent_button", &self.consent_button),
            ("section_nav", &self.section_nav),
            ("section_header", &self.section_header),
            ("all_articles", &self.all_articles),
            ("article_links", &self.article_links),
            ("article_title", &self.article_title),
            ("first_paragraph", &self.first_paragraph),
            ("article_image", &self.article_image),
        ]
    }
}

/// Wait bounds, in seconds unless noted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    pub page_load_secs: u64,
    pub consent_secs: u64,
    pub language_secs: u64,
    pub nav_secs: u64,
    pub header_secs: u64,
    pub title_secs: u64,
    pub paragraph_secs: u64,
    pub image_secs: u64,
    pub poll_interval_millis: u64,
    /// Per-request bound for the HTTP backend and image downloads.
    pub http_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            page_load_secs: 10,
            consent_secs: 5,
            language_secs: 5,
            nav_secs: 6,
            header_secs: 5,
            title_secs: 6,
            paragraph_secs: 5,
            image_secs: 4,
            poll_interval_millis: 500,
            http_secs: 30,
        }
    }
}

impl Timeouts {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_millis)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslationConfig {
    pub endpoint: String,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://translation.googleapis.com/language/translate/v2".to_string(),
            connect_timeout_secs: 15,
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Words must occur strictly more often than this to be reported.
    pub threshold: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self { threshold: 2 }
    }
}

impl Config {
    /// Load the YAML file at `path`, or the defaults when no path is given.
    #[instrument(level = "info")]
    pub async fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => {
                let raw = fs::read_to_string(path).await.map_err(|source| ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                let config = Self::from_yaml(&raw).map_err(|source| ConfigError::Yaml {
                    path: path.to_path_buf(),
                    source,
                })?;
                info!(path = %path.display(), "Loaded configuration");
                config
            }
            None => {
                info!("No config file given; using built-in defaults");
                Self::default()
            }
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("site.base_url", &self.site.base_url),
            ("site.section_url", &self.site.section_url),
            ("translation.endpoint", &self.translation.endpoint),
        ] {
            Url::parse(value)
                .map_err(|e| ConfigError::Invalid(format!("{name} `{value}` is not a URL: {e}")))?;
        }
        if self.site.section_path.trim().is_empty() {
            return Err(ConfigError::Invalid("site.section_path must not be empty".into()));
        }
        if self.timeouts.poll_interval_millis == 0 {
            return Err(ConfigError::Invalid(
                "timeouts.poll_interval_millis must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Reject XPath locators, for backends that only evaluate CSS.
    pub fn require_css_locators(&self) -> Result<(), ConfigError> {
        let xpath: Vec<&str> = self
            .locators
            .entries()
            .into_iter()
            .filter(|(_, locator)| matches!(locator, Locator::XPath(_)))
            .map(|(name, _)| name)
            .collect();
        if xpath.is_empty() {
            return Ok(());
        }
        Err(ConfigError::Invalid(format!(
            "the http driver only evaluates CSS locators; XPath configured for: locators.{}",
            xpath.join(", locators.")
        )))
    }
}
