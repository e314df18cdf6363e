//! Browser automation handle used by the scraping pipeline.
//!
//! The pipeline never talks to a concrete browser. It receives a
//! [`Session`] from provisioning: a driver plus the explicit set of
//! [`Capabilities`] that driver offers. Two backends exist:
//!
//! | Backend | Module | Capabilities | Locators |
//! |---------|--------|--------------|----------|
//! | Chrome DevTools | [`chrome`] | navigable, script-executable | CSS, XPath |
//! | Static HTTP | [`http`] | navigable | CSS |
//!
//! Script execution (used for the page readiness signal) is only reachable
//! through [`Session::scripts`], which returns `None` when the capability is
//! absent.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub mod chrome;
pub mod http;

/// An opaque, externally configured element selector.
///
/// Serialized as `{ css: "..." }` or `{ xpath: "..." }` in the config file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "LocatorEntry", into = "LocatorEntry")]
pub enum Locator {
    Css(String),
    XPath(String),
}

/// Map form of a [`Locator`]: exactly one of the two keys.
#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct LocatorEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    css: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    xpath: Option<String>,
}

impl TryFrom<LocatorEntry> for Locator {
    type Error = String;

    fn try_from(entry: LocatorEntry) -> Result<Self, Self::Error> {
        match (entry.css, entry.xpath) {
            (Some(css), None) => Ok(Locator::Css(css)),
            (None, Some(xpath)) => Ok(Locator::XPath(xpath)),
            (None, None) => Err("locator needs a `css` or `xpath` key".to_string()),
            (Some(_), Some(_)) => Err("locator must set only one of `css` and `xpath`".to_string()),
        }
    }
}

impl From<Locator> for LocatorEntry {
    fn from(locator: Locator) -> Self {
        match locator {
            Locator::Css(css) => LocatorEntry {
                css: Some(css),
                xpath: None,
            },
            Locator::XPath(xpath) => LocatorEntry {
                css: None,
                xpath: Some(xpath),
            },
        }
    }
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    pub fn xpath(expression: impl Into<String>) -> Self {
        Self::XPath(expression.into())
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Css(s) => write!(f, "css:{s}"),
            Locator::XPath(s) => write!(f, "xpath:{s}"),
        }
    }
}

/// Something a provisioned handle is able to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Navigable,
    ScriptExecutable,
}

impl Capability {
    const fn bit(self) -> u8 {
        match self {
            Capability::Navigable => 1,
            Capability::ScriptExecutable => 1 << 1,
        }
    }
}

/// Small set of [`Capability`] values carried by a [`Session`].
#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities(u8);

impl Capabilities {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn with(self, capability: Capability) -> Self {
        Self(self.0 | capability.bit())
    }

    pub const fn contains(self, capability: Capability) -> bool {
        self.0 & capability.bit() != 0
    }
}

impl fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut set = f.debug_set();
        for capability in [Capability::Navigable, Capability::ScriptExecutable] {
            if self.contains(capability) {
                set.entry(&capability);
            }
        }
        set.finish()
    }
}

/// Errors raised by a driver backend.
#[derive(Error, Debug)]
pub enum DriverError {
    #[error("browser backend error: {0}")]
    Backend(#[from] anyhow::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("locator {0} is not supported by this backend")]
    UnsupportedLocator(String),

    #[error("invalid locator {locator}: {reason}")]
    InvalidLocator { locator: String, reason: String },

    #[error("element is not interactable: {0}")]
    NotInteractable(String),

    #[error("capability {0:?} is not available on this session")]
    Unsupported(Capability),

    #[error("blocking browser task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Page navigation and element access.
pub trait Navigable {
    /// Handle to an element found on the current page.
    type Element: Clone + fmt::Debug;

    /// Load `url` in the current navigation context.
    async fn goto(&self, url: &str) -> Result<(), DriverError>;

    async fn current_url(&self) -> Result<String, DriverError>;

    /// All elements matching `locator`, in document order.
    async fn find_all(&self, locator: &Locator) -> Result<Vec<Self::Element>, DriverError>;

    async fn is_displayed(&self, element: &Self::Element) -> Result<bool, DriverError>;

    /// Rendered text of the element, trimmed.
    async fn text(&self, element: &Self::Element) -> Result<String, DriverError>;

    /// DOM property if it is a non-empty string, otherwise the raw attribute.
    async fn attribute(
        &self,
        element: &Self::Element,
        name: &str,
    ) -> Result<Option<String>, DriverError>;

    async fn click(&self, element: &Self::Element) -> Result<(), DriverError>;
}

/// Evaluation of a JavaScript expression in the page.
pub trait ScriptExecutable {
    async fn execute_script(&self, expression: &str) -> Result<serde_json::Value, DriverError>;
}

/// A backend usable by the pipeline. Whether scripts may actually be run is
/// decided by the session's [`Capabilities`], not by the type.
pub trait Driver: Navigable + ScriptExecutable {}

impl<T: Navigable + ScriptExecutable> Driver for T {}

/// Capability-typed automation handle handed out by provisioning.
///
/// Dropping the session releases the underlying browser.
pub struct Session<D> {
    driver: D,
    capabilities: Capabilities,
}

impl<D> Session<D> {
    pub fn new(driver: D, capabilities: Capabilities) -> Self {
        Self {
            driver,
            capabilities,
        }
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }
}

impl<D: ScriptExecutable> Session<D> {
    /// The script executor, present only when the session was provisioned
    /// with [`Capability::ScriptExecutable`].
    pub fn scripts(&self) -> Option<&D> {
        self.capabilities
            .contains(Capability::ScriptExecutable)
            .then_some(&self.driver)
    }
}

impl<D> fmt::Debug for Session<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("capabilities", &self.capabilities)
            .finish()
    }
}
