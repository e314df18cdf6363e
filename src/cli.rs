//! Command-line interface definitions for Opinion Digest.
//!
//! Every option overrides the matching value from the config file. The
//! translation key can also come from the environment.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Browser backend used to drive the site.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum DriverKind {
    /// Local Chrome through the DevTools protocol
    #[default]
    Chrome,
    /// Plain HTTP fetches; no scripts, CSS locators only
    Http,
}

/// Command-line arguments for the Opinion Digest application.
///
/// # Examples
///
/// ```sh
/// # Default run against the Opinión section
/// opinion_digest --translate-api-key YOUR_KEY
///
/// # Ten articles, report written as JSON, no image downloads
/// opinion_digest -n 10 -j ./reports --no-images
///
/// # Static HTTP backend with CSS locators
/// opinion_digest --driver http -c config/http.yaml
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a config.yaml file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Google Cloud Translation API key
    #[arg(long, env = "GOOGLE_TRANSLATE_API_KEY", hide_env_values = true)]
    pub translate_api_key: String,

    /// Maximum number of articles to extract
    #[arg(short = 'n', long)]
    pub max_articles: Option<usize>,

    /// Report words seen strictly more than this many times
    #[arg(short, long)]
    pub threshold: Option<usize>,

    /// Directory for downloaded header images
    #[arg(short, long, conflicts_with = "no_images")]
    pub images_dir: Option<PathBuf>,

    /// Skip image downloads
    #[arg(long)]
    pub no_images: bool,

    /// Output directory for the JSON run report
    #[arg(short, long)]
    pub json_output_dir: Option<PathBuf>,

    /// Browser backend
    #[arg(long, value_enum, default_value_t = DriverKind::Chrome)]
    pub driver: DriverKind,

    /// Show the Chrome window
    #[arg(long)]
    pub headful: bool,
}
