//! In-memory driver for exercising the components without a browser.

use crate::browser::{
    Capabilities, Capability, DriverError, Locator, Navigable, ScriptExecutable, Session,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

/// A fake element: an id, visible text and attributes.
#[derive(Debug, Clone, Default)]
pub struct FakeElement {
    pub id: usize,
    pub text: String,
    pub attributes: HashMap<String, String>,
}

impl FakeElement {
    pub fn new(id: usize, text: &str) -> Self {
        Self {
            id,
            text: text.to_string(),
            attributes: HashMap::new(),
        }
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attributes.insert(name.to_string(), value.to_string());
        self
    }
}

#[derive(Debug, Default)]
pub struct FakeState {
    pub url: String,
    pub visits: Vec<String>,
    pub clicks: Vec<usize>,
    pub hidden: Vec<usize>,
    pub ready_polls: usize,
}

/// Pages keyed by URL, each a map from locator to elements. Elements
/// appear only after `appear_after` lookups of their locator.
#[derive(Debug, Default)]
pub struct FakeDriver {
    pub pages: HashMap<String, HashMap<Locator, Vec<FakeElement>>>,
    pub unreachable: Vec<String>,
    pub unreadable_text: Vec<usize>,
    pub unreadable_attributes: Vec<usize>,
    pub failing_clicks: Vec<usize>,
    pub appear_after: HashMap<Locator, usize>,
    pub click_targets: HashMap<usize, String>,
    pub redirects: HashMap<String, String>,
    pub ready_after: usize,
    pub lookups: Mutex<HashMap<Locator, usize>>,
    pub state: Mutex<FakeState>,
}

impl FakeDriver {
    pub fn page(mut self, url: &str, elements: Vec<(Locator, Vec<FakeElement>)>) -> Self {
        self.pages
            .insert(url.to_string(), elements.into_iter().collect());
        self
    }

    pub fn scripted(self) -> Session<Self> {
        Session::new(
            self,
            Capabilities::empty()
                .with(Capability::Navigable)
                .with(Capability::ScriptExecutable),
        )
    }

    pub fn navigable_only(self) -> Session<Self> {
        Session::new(self, Capabilities::empty().with(Capability::Navigable))
    }

    pub fn visits(&self) -> Vec<String> {
        self.state.lock().unwrap().visits.clone()
    }
}

impl Navigable for FakeDriver {
    type Element = FakeElement;

    async fn goto(&self, url: &str) -> Result<(), DriverError> {
        let mut state = self.state.lock().unwrap();
        state.visits.push(url.to_string());
        if self.unreachable.iter().any(|u| u == url) {
            return Err(DriverError::Backend(anyhow::anyhow!(
                "net::ERR_CONNECTION_REFUSED at {url}"
            )));
        }
        state.url = self.redirects.get(url).cloned().unwrap_or_else(|| url.to_string());
        state.ready_polls = 0;
        Ok(())
    }

    async fn current_url(&self) -> Result<String, DriverError> {
        Ok(self.state.lock().unwrap().url.clone())
    }

    async fn find_all(&self, locator: &Locator) -> Result<Vec<FakeElement>, DriverError> {
        let seen = {
            let mut lookups = self.lookups.lock().unwrap();
            let n = lookups.entry(locator.clone()).or_default();
            *n += 1;
            *n
        };
        if self.appear_after.get(locator).is_some_and(|after| seen <= *after) {
            return Ok(vec![]);
        }
        let url = self.state.lock().unwrap().url.clone();
        Ok(self
            .pages
            .get(&url)
            .and_then(|page| page.get(locator))
            .cloned()
            .unwrap_or_default())
    }

    async fn is_displayed(&self, element: &FakeElement) -> Result<bool, DriverError> {
        Ok(!self.state.lock().unwrap().hidden.contains(&element.id))
    }

    async fn text(&self, element: &FakeElement) -> Result<String, DriverError> {
        if self.unreadable_text.contains(&element.id) {
            return Err(DriverError::Backend(anyhow::anyhow!("stale element")));
        }
        Ok(element.text.clone())
    }

    async fn attribute(
        &self,
        element: &FakeElement,
        name: &str,
    ) -> Result<Option<String>, DriverError> {
        if self.unreadable_attributes.contains(&element.id) {
            return Err(DriverError::Backend(anyhow::anyhow!("detached node")));
        }
        Ok(element.attributes.get(name).cloned())
    }

    async fn click(&self, element: &FakeElement) -> Result<(), DriverError> {
        if self.failing_clicks.contains(&element.id) {
            return Err(DriverError::NotInteractable(element.text.clone()));
        }
        {
            let mut state = self.state.lock().unwrap();
            state.clicks.push(element.id);
            state.hidden.push(element.id);
        }
        match self.click_targets.get(&element.id) {
            Some(target) => self.goto(target).await,
            None => Ok(()),
        }
    }
}

impl ScriptExecutable for FakeDriver {
    async fn execute_script(&self, _expression: &str) -> Result<Value, DriverError> {
        let mut state = self.state.lock().unwrap();
        state.ready_polls += 1;
        let ready = if state.ready_polls > self.ready_after {
            "complete"
        } else {
            "loading"
        };
        Ok(Value::String(ready.to_string()))
    }
}
