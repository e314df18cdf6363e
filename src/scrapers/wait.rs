//! Bounded, polling element retrieval.
//!
//! A lookup either yields a visible element before its deadline or yields
//! `None`. Driver errors during a poll count as "not present yet".

use crate::browser::{Locator, Navigable, Session};
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tracing::{debug, trace};

#[derive(Debug)]
pub struct WaitEngine<'a, D> {
    session: &'a Session<D>,
    poll_interval: Duration,
}

impl<D> Clone for WaitEngine<'_, D> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<D> Copy for WaitEngine<'_, D> {}

impl<'a, D: Navigable> WaitEngine<'a, D> {
    pub fn new(session: &'a Session<D>, poll_interval: Duration) -> Self {
        Self {
            session,
            poll_interval,
        }
    }

    /// First visible element matching `locator`, polling until `timeout`.
    pub async fn retrieve(&self, locator: &Locator, timeout: Duration) -> Option<D::Element> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(element) = self.first_visible(locator).await {
                return Some(element);
            }
            let now = Instant::now();
            if now >= deadline {
                debug!(%locator, ?timeout, "Element not found before timeout");
                return None;
            }
            sleep(self.poll_interval.min(deadline - now)).await;
        }
    }

    /// Wait for `element` to stop being displayed. An element that can no
    /// longer be queried counts as gone. Returns `false` on timeout.
    pub async fn until_hidden(&self, element: &D::Element, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            match self.session.driver().is_displayed(element).await {
                Ok(false) | Err(_) => return true,
                Ok(true) => {}
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            sleep(self.poll_interval.min(deadline - now)).await;
        }
    }

    async fn first_visible(&self, locator: &Locator) -> Option<D::Element> {
        let driver = self.session.driver();
        let candidates = match driver.find_all(locator).await {
            Ok(found) => found,
            Err(e) => {
                trace!(%locator, error = %e, "Lookup failed during poll");
                return None;
            }
        };
        for element in candidates {
            if let Ok(true) = driver.is_displayed(&element).await {
                return Some(element);
            }
        }
        None
    }
}
