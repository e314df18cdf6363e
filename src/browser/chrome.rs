//! Chrome DevTools backend built on `headless_chrome`.
//!
//! `headless_chrome` is blocking, so every call is moved onto the blocking
//! pool with the tab handle cloned in. Elements are referred to by DOM node
//! id and re-resolved on each call.

use super::{Capabilities, Capability, DriverError, Locator, Navigable, ScriptExecutable, Session};
use headless_chrome::protocol::cdp::DOM::NodeId;
use headless_chrome::{Browser, Element, LaunchOptions, Tab};
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tracing::{info, instrument};

static LOCAL_SESSION_STARTED: AtomicBool = AtomicBool::new(false);

const IS_DISPLAYED_JS: &str = "function() { \
    const style = window.getComputedStyle(this); \
    const rect = this.getBoundingClientRect(); \
    return style.display !== 'none' && style.visibility !== 'hidden' \
        && rect.width > 0 && rect.height > 0; }";

const PROPERTY_OR_ATTRIBUTE_JS: &str = "function(name) { \
    const prop = this[name]; \
    if (typeof prop === 'string' && prop.length > 0) { return prop; } \
    return this.getAttribute(name); }";

/// Errors raised while provisioning a browser session.
#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error("a local browser session is already running in this process")]
    SessionBusy,

    #[error("invalid launch options: {0}")]
    Options(String),

    #[error("failed to launch browser: {0}")]
    Launch(#[from] anyhow::Error),
}

/// Claim the single local browser slot. Only the first caller gets `true`.
pub fn acquire_exclusive_session() -> bool {
    LOCAL_SESSION_STARTED
        .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        .is_ok()
}

/// Launch a local Chrome and open one tab on it.
#[instrument(level = "info")]
pub fn launch_chrome(headless: bool) -> Result<Session<ChromeDriver>, ProvisionError> {
    if !acquire_exclusive_session() {
        return Err(ProvisionError::SessionBusy);
    }

    let options = LaunchOptions::default_builder()
        .headless(headless)
        .window_size(Some((1366, 900)))
        .build()
        .map_err(|e| ProvisionError::Options(e.to_string()))?;
    let browser = Browser::new(options)?;
    let tab = browser.new_tab()?;
    info!(headless, "Launched local Chrome");

    let capabilities = Capabilities::empty()
        .with(Capability::Navigable)
        .with(Capability::ScriptExecutable);
    Ok(Session::new(
        ChromeDriver {
            tab,
            _browser: browser,
        },
        capabilities,
    ))
}

/// A single Chrome tab. The browser process lives as long as this value.
pub struct ChromeDriver {
    tab: Arc<Tab>,
    _browser: Browser,
}

impl ChromeDriver {
    async fn blocking<T, F>(&self, f: F) -> Result<T, DriverError>
    where
        F: FnOnce(&Tab) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let tab = Arc::clone(&self.tab);
        let out = tokio::task::spawn_blocking(move || f(&tab)).await??;
        Ok(out)
    }
}

impl Navigable for ChromeDriver {
    type Element = NodeId;

    async fn goto(&self, url: &str) -> Result<(), DriverError> {
        let url = url.to_string();
        self.blocking(move |tab| {
            tab.navigate_to(&url)?.wait_until_navigated()?;
            Ok(())
        })
        .await
    }

    async fn current_url(&self) -> Result<String, DriverError> {
        self.blocking(|tab| Ok(tab.get_url())).await
    }

    async fn find_all(&self, locator: &Locator) -> Result<Vec<NodeId>, DriverError> {
        let locator = locator.clone();
        self.blocking(move |tab| {
            let elements = match &locator {
                Locator::Css(selector) => tab.find_elements(selector)?,
                Locator::XPath(expression) => tab.find_elements_by_xpath(expression)?,
            };
            Ok(elements.into_iter().map(|e| e.node_id).collect())
        })
        .await
    }

    async fn is_displayed(&self, element: &NodeId) -> Result<bool, DriverError> {
        let node_id = *element;
        self.blocking(move |tab| {
            let value = Element::new(tab, node_id)?
                .call_js_fn(IS_DISPLAYED_JS, vec![], false)?
                .value;
            Ok(matches!(value, Some(Value::Bool(true))))
        })
        .await
    }

    async fn text(&self, element: &NodeId) -> Result<String, DriverError> {
        let node_id = *element;
        self.blocking(move |tab| {
            let text = Element::new(tab, node_id)?.get_inner_text()?;
            Ok(text.trim().to_string())
        })
        .await
    }

    async fn attribute(&self, element: &NodeId, name: &str) -> Result<Option<String>, DriverError> {
        let node_id = *element;
        let name = name.to_string();
        self.blocking(move |tab| {
            let value = Element::new(tab, node_id)?
                .call_js_fn(PROPERTY_OR_ATTRIBUTE_JS, vec![Value::String(name)], false)?
                .value;
            Ok(match value {
                Some(Value::String(s)) => Some(s),
                _ => None,
            })
        })
        .await
    }

    async fn click(&self, element: &NodeId) -> Result<(), DriverError> {
        let node_id = *element;
        self.blocking(move |tab| {
            Element::new(tab, node_id)?.click()?;
            Ok(())
        })
        .await
    }
}

impl ScriptExecutable for ChromeDriver {
    async fn execute_script(&self, expression: &str) -> Result<Value, DriverError> {
        let expression = expression.to_string();
        self.blocking(move |tab| {
            let result = tab.evaluate(&expression, false)?;
            Ok(result.value.unwrap_or(Value::Null))
        })
        .await
    }
}

impl Drop for ChromeDriver {
    fn drop(&mut self) {
        let _ = self.tab.close(true);
        info!("Browser session released");
    }
}
