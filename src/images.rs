//! Idempotent image download into a per-run folder.

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tokio::fs;
use tracing::{debug, instrument};

static UNSAFE_FILE_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-zA-Z0-9._-]").unwrap());

#[derive(Error, Debug)]
pub enum ImageError {
    #[error("image URL `{0}` has no file name")]
    NoFileName(String),

    #[error("image download failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("image write failed: {0}")]
    Io(#[from] std::io::Error),
}

/// File name for `url`: last path segment, query dropped, unsafe chars
/// replaced with `_`.
pub fn file_name_for(url: &str) -> Option<String> {
    let last = url.rsplit('/').next().unwrap_or(url);
    let name = last.split(['?', '#']).next().unwrap_or_default();
    if name.is_empty() {
        return None;
    }
    Some(UNSAFE_FILE_CHARS.replace_all(name, "_").into_owned())
}

/// Saves images into one destination directory.
#[derive(Debug, Clone)]
pub struct ImageStore {
    client: Client,
    dir: PathBuf,
}

impl ImageStore {
    pub fn new(dir: impl Into<PathBuf>, timeout: Duration) -> Result<Self, ImageError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            dir: dir.into(),
        })
    }

    /// Download `url` into the store directory and return the saved path.
    /// An existing file with the same name is returned without refetching.
    #[instrument(level = "debug", skip(self))]
    pub async fn save(&self, url: &str) -> Result<PathBuf, ImageError> {
        let name = file_name_for(url).ok_or_else(|| ImageError::NoFileName(url.to_string()))?;
        fs::create_dir_all(&self.dir).await?;

        let path = self.dir.join(name);
        if fs::try_exists(&path).await? {
            debug!(path = %path.display(), "Image already exists");
            return Ok(path);
        }

        let bytes = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        fs::write(&path, &bytes).await?;
        debug!(path = %path.display(), bytes = bytes.len(), "Saved image");
        Ok(path)
    }
}
