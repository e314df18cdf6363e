//! Page transitions: home page, consent banner, target section.
//!
//! Nothing in here fails the run. A missing or unclickable navigation link
//! falls back to loading the section URL directly, consent dismissal is
//! best-effort, and the readiness wait gives up quietly after its bound.

use crate::browser::{Driver, DriverError, Locator, Navigable};
use crate::pipeline::RunContext;
use crate::scrapers::wait::WaitEngine;
use serde_json::Value;
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tracing::{debug, error, info, instrument, trace, warn};

const READY_STATE_SCRIPT: &str = "document.readyState";

/// How the section page was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionRoute {
    Clicked,
    Fallback,
}

pub struct Navigator<'a, D> {
    ctx: &'a RunContext<'a, D>,
    waiter: WaitEngine<'a, D>,
}

impl<'a, D: Driver> Navigator<'a, D> {
    pub fn new(ctx: &'a RunContext<'a, D>) -> Self {
        Self {
            ctx,
            waiter: ctx.waiter(),
        }
    }

    pub fn waiter(&self) -> &WaitEngine<'a, D> {
        &self.waiter
    }

    fn secs(secs: u64) -> Duration {
        Duration::from_secs(secs)
    }

    /// Load `url` and wait for the page to report ready.
    pub async fn load(&self, url: &str) -> Result<(), DriverError> {
        self.ctx.session.driver().goto(url).await?;
        self.wait_for_page_load().await;
        Ok(())
    }

    /// Load the home page. A failed load is logged and the run continues.
    #[instrument(level = "info", skip(self))]
    pub async fn open(&self, base_url: &str) {
        match self.load(base_url).await {
            Ok(()) => info!("Home page loaded"),
            Err(e) => error!(error = %e, "Failed to load home page; continuing"),
        }
    }

    /// Poll `document.readyState` until `"complete"` or the page-load bound.
    /// Sessions without script capability skip the wait. Returns whether
    /// the page reported ready.
    pub async fn wait_for_page_load(&self) -> bool {
        let Some(scripts) = self.ctx.session.scripts() else {
            debug!("Session cannot run scripts; skipping readiness wait");
            return true;
        };

        let timeout = Self::secs(self.ctx.config.timeouts.page_load_secs);
        let poll = self.ctx.config.timeouts.poll_interval();
        let deadline = Instant::now() + timeout;
        loop {
            match scripts.execute_script(READY_STATE_SCRIPT).await {
                Ok(Value::String(state)) if state == "complete" => return true,
                Ok(state) => trace!(%state, "Page not ready yet"),
                Err(e) => trace!(error = %e, "Readiness probe failed"),
            }
            let now = Instant::now();
            if now >= deadline {
                warn!(?timeout, "Page did not finish loading in time; continuing");
                return false;
            }
            sleep(poll.min(deadline - now)).await;
        }
    }

    /// Click the consent banner's accept button if it shows up. Returns
    /// whether the banner was dismissed.
    #[instrument(level = "info", skip_all)]
    pub async fn dismiss_consent(&self, locator: &Locator) -> bool {
        let timeout = Self::secs(self.ctx.config.timeouts.consent_secs);
        let Some(button) = self.waiter.retrieve(locator, timeout).await else {
            debug!("Consent button not found");
            return false;
        };
        if let Err(e) = self.ctx.session.driver().click(&button).await {
            debug!(error = %e, "Could not click consent button");
            return false;
        }
        if self.waiter.until_hidden(&button, timeout).await {
            info!("Clicked consent accept button");
            true
        } else {
            debug!("Consent button still visible after click");
            false
        }
    }

    /// Diagnostic: is the Spanish edition marker visible?
    pub async fn check_language(&self, locator: &Locator) -> bool {
        let timeout = Self::secs(self.ctx.config.timeouts.language_secs);
        let found = self.waiter.retrieve(locator, timeout).await.is_some();
        if found {
            info!("Edition marker found; page is likely in Spanish");
        } else {
            info!("Edition marker not found (page may already be Spanish)");
        }
        found
    }

    /// Reach the section through its nav link, or load `fallback_url` when
    /// the link is missing or the click fails.
    #[instrument(level = "info", skip(self, nav_locator))]
    pub async fn go_to_section(&self, nav_locator: &Locator, fallback_url: &str) -> SectionRoute {
        let timeout = Self::secs(self.ctx.config.timeouts.nav_secs);
        match self.waiter.retrieve(nav_locator, timeout).await {
            Some(link) => {
                info!("Clicking section nav link");
                match self.ctx.session.driver().click(&link).await {
                    Ok(()) => {
                        self.wait_for_page_load().await;
                        return SectionRoute::Clicked;
                    }
                    Err(e) => warn!(error = %e, "Nav link click failed; loading section URL"),
                }
            }
            None => info!("Nav link not found; loading section URL directly"),
        }

        if let Err(e) = self.load(fallback_url).await {
            error!(error = %e, "Failed to load section URL");
        }
        SectionRoute::Fallback
    }

    /// Diagnostic: header present, or current URL under `expected_prefix`.
    pub async fn confirm_section(&self, header: &Locator, expected_prefix: &str) -> bool {
        let timeout = Self::secs(self.ctx.config.timeouts.header_secs);
        if self.waiter.retrieve(header, timeout).await.is_some() {
            return true;
        }
        self.ctx
            .session
            .driver()
            .current_url()
            .await
            .is_ok_and(|url| url.starts_with(expected_prefix))
    }
}
