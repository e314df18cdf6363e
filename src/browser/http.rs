//! Static HTTP backend: fetches pages with `reqwest` and queries them with
//! `scraper`.
//!
//! No JavaScript runs, so the document is complete as soon as `goto`
//! returns and the session is provisioned without
//! [`Capability::ScriptExecutable`]. Only CSS locators can be evaluated.
//! Elements are snapshots of the page they were found on.

use super::{Capabilities, Capability, DriverError, Locator, Navigable, ScriptExecutable, Session};
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Attributes whose DOM property is an absolute URL.
const URL_PROPERTIES: [&str; 2] = ["href", "src"];

#[derive(Debug, Default)]
struct Page {
    url: String,
    html: String,
}

/// Snapshot of an element taken when it was located.
#[derive(Debug, Clone)]
pub struct HttpElement {
    page_url: String,
    text: String,
    attributes: Vec<(String, String)>,
    displayed: bool,
}

impl HttpElement {
    fn from_ref(page_url: &str, element: ElementRef<'_>) -> Self {
        let text = element
            .text()
            .flat_map(str::split_whitespace)
            .collect::<Vec<_>>()
            .join(" ");
        let attributes: Vec<(String, String)> = element
            .value()
            .attrs()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let displayed = !is_hidden(&attributes);
        Self {
            page_url: page_url.to_string(),
            text,
            attributes,
            displayed,
        }
    }

    fn raw_attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

fn is_hidden(attributes: &[(String, String)]) -> bool {
    attributes.iter().any(|(k, v)| match k.as_str() {
        "hidden" => true,
        "aria-hidden" => v.eq_ignore_ascii_case("true"),
        "style" => v
            .split(';')
            .filter_map(|decl| decl.split_once(':'))
            .any(|(prop, val)| prop.trim() == "display" && val.trim() == "none"),
        _ => false,
    })
}

/// Navigation context backed by plain HTTP requests.
#[derive(Debug)]
pub struct HttpDriver {
    client: Client,
    page: Mutex<Page>,
}

impl HttpDriver {
    pub fn new(timeout: Duration) -> Result<Self, DriverError> {
        let client = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            page: Mutex::new(Page::default()),
        })
    }

    /// Wrap the driver in a session that can navigate but not run scripts.
    pub fn session(timeout: Duration) -> Result<Session<Self>, DriverError> {
        Ok(Session::new(
            Self::new(timeout)?,
            Capabilities::empty().with(Capability::Navigable),
        ))
    }

    fn resolve(base: &str, reference: &str) -> String {
        Url::parse(base)
            .and_then(|b| b.join(reference))
            .map(|u| u.to_string())
            .unwrap_or_else(|_| reference.to_string())
    }
}

impl Navigable for HttpDriver {
    type Element = HttpElement;

    async fn goto(&self, url: &str) -> Result<(), DriverError> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        let final_url = response.url().to_string();
        let html = response.text().await?;
        debug!(%final_url, bytes = html.len(), "Fetched page");

        let mut page = self.page.lock().unwrap_or_else(PoisonError::into_inner);
        page.url = final_url;
        page.html = html;
        Ok(())
    }

    async fn current_url(&self) -> Result<String, DriverError> {
        let page = self.page.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(page.url.clone())
    }

    async fn find_all(&self, locator: &Locator) -> Result<Vec<HttpElement>, DriverError> {
        let selector = match locator {
            Locator::Css(css) => {
                Selector::parse(css).map_err(|e| DriverError::InvalidLocator {
                    locator: locator.to_string(),
                    reason: e.to_string(),
                })?
            }
            Locator::XPath(_) => return Err(DriverError::UnsupportedLocator(locator.to_string())),
        };

        let page = self.page.lock().unwrap_or_else(PoisonError::into_inner);
        let document = Html::parse_document(&page.html);
        Ok(document
            .select(&selector)
            .map(|e| HttpElement::from_ref(&page.url, e))
            .collect())
    }

    async fn is_displayed(&self, element: &HttpElement) -> Result<bool, DriverError> {
        Ok(element.displayed)
    }

    async fn text(&self, element: &HttpElement) -> Result<String, DriverError> {
        Ok(element.text.clone())
    }

    async fn attribute(
        &self,
        element: &HttpElement,
        name: &str,
    ) -> Result<Option<String>, DriverError> {
        Ok(element.raw_attribute(name).map(|value| {
            if URL_PROPERTIES.contains(&name) && !value.trim().is_empty() {
                Self::resolve(&element.page_url, value.trim())
            } else {
                value.to_string()
            }
        }))
    }

    async fn click(&self, element: &HttpElement) -> Result<(), DriverError> {
        match self.attribute(element, "href").await? {
            Some(target) if element.displayed => self.goto(&target).await,
            _ => Err(DriverError::NotInteractable(element.text.clone())),
        }
    }
}

impl ScriptExecutable for HttpDriver {
    async fn execute_script(&self, _expression: &str) -> Result<Value, DriverError> {
        Err(DriverError::Unsupported(Capability::ScriptExecutable))
    }
}
