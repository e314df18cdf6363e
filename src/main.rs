//! # Opinion Digest
//!
//! Scrapes the first articles of a news section (El País "Opinión" by
//! default) with a browser session, batch-translates their titles from
//! Spanish to English and reports the words repeated across the translated
//! titles.
//!
//! ## Usage
//!
//! ```sh
//! GOOGLE_TRANSLATE_API_KEY=... opinion_digest -j ./reports
//! ```
//!
//! ## Architecture
//!
//! 1. **Provisioning**: launch one browser session (Chrome or plain HTTP)
//! 2. **Indexing**: reach the section and collect article links
//! 3. **Fetching**: extract title and header image of each article
//! 4. **Translation**: one batch request for all titles
//! 5. **Analysis**: count repeated words, optionally write a JSON report

use clap::Parser;
use directories::BaseDirs;
use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod analysis;
mod api;
mod browser;
mod cli;
mod config;
mod images;
mod models;
mod outputs;
mod pipeline;
mod scrapers;
mod utils;

use api::GoogleTranslator;
use browser::{Driver, Session, chrome, http::HttpDriver};
use cli::{Cli, DriverKind};
use config::Config;
use images::ImageStore;
use outputs::json;
use pipeline::{PipelineError, RunContext};
use utils::{ensure_writable_dir, run_timestamp};

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("opinion_digest starting up");

    let args = Cli::parse();
    debug!(?args.config, ?args.driver, ?args.json_output_dir, "Parsed CLI arguments");

    let mut config = Config::load(args.config.as_deref()).await?;
    if let Some(max) = args.max_articles {
        config.site.max_articles = max;
    }
    if let Some(threshold) = args.threshold {
        config.analysis.threshold = threshold;
    }
    if args.driver == DriverKind::Http {
        config.require_css_locators()?;
    }

    // Early check: fail before launching a browser if outputs are unusable
    if let Some(dir) = &args.json_output_dir {
        if let Err(e) = ensure_writable_dir(dir).await {
            error!(
                path = %dir.display(),
                error = %e,
                "JSON output directory is not writable (fix perms or choose a different path)"
            );
            return Err(e);
        }
    }

    let http_timeout = Duration::from_secs(config.timeouts.http_secs);
    let images = if args.no_images {
        info!("Image downloads disabled");
        None
    } else {
        let dir = args.images_dir.clone().unwrap_or_else(default_images_dir);
        ensure_writable_dir(&dir).await?;
        info!(path = %dir.display(), "Saving images");
        Some(ImageStore::new(dir, http_timeout)?)
    };

    let translator = GoogleTranslator::new(&config.translation, args.translate_api_key.as_str())?;

    match args.driver {
        DriverKind::Chrome => {
            let session = chrome::launch_chrome(!args.headful)?;
            digest(session, &config, images.as_ref(), &translator, &args).await?;
        }
        DriverKind::Http => {
            let session = HttpDriver::session(http_timeout)?;
            digest(session, &config, images.as_ref(), &translator, &args).await?;
        }
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );

    Ok(())
}

/// Run the pipeline on `session` and write the report. The session is
/// dropped, releasing the browser, before this returns.
#[instrument(level = "info", skip_all, fields(capabilities = ?session.capabilities()))]
async fn digest<D: Driver>(
    session: Session<D>,
    config: &Config,
    images: Option<&ImageStore>,
    translator: &GoogleTranslator,
    args: &Cli,
) -> Result<(), Box<dyn Error>> {
    let ctx = RunContext::new(&session, config, images);
    let report = match pipeline::run(&ctx, translator).await {
        Ok(report) => report,
        Err(PipelineError::Translation { source, articles }) => {
            error!(error = %source, "Translation failed; extracted articles follow untranslated");
            for (i, article) in articles.iter().enumerate() {
                warn!("  {}) {} | {}", i + 1, article.title_es, article.url());
            }
            return Err(PipelineError::Translation { source, articles }.into());
        }
    };

    info!(
        articles = report.articles.len(),
        repeated = report.repeated_words.len(),
        "Run finished"
    );

    if let Some(dir) = &args.json_output_dir {
        if let Err(e) = json::write_report(&report, dir).await {
            error!(error = %e, "Failed to write JSON report");
        }
    }
    Ok(())
}

/// `~/opinion_digest/<timestamp>/images`, relative to the working directory
/// when no home directory is known.
fn default_images_dir() -> PathBuf {
    let root = BaseDirs::new()
        .map(|dirs| dirs.home_dir().to_path_buf())
        .unwrap_or_default();
    root.join("opinion_digest").join(run_timestamp()).join("images")
}
