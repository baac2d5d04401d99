//! In-memory [`Browser`] implementation for tests.
//!
//! Pages are registered by URL with a flat list of elements; the matcher
//! understands exactly the locator shapes the portal flows use.

use crate::webdriver::browser::{Browser, ElementRef, Locator};
use crate::webdriver::errors::WebDriverError;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Clone)]
pub struct FakeElement {
    pub handle: String,
    pub tag: String,
    pub dom_id: Option<String>,
    pub link_text: Option<String>,
    pub text: String,
    pub attrs: HashMap<String, String>,
    pub click_goes_to: Option<String>,
    pub parent: Option<String>,
    pub displayed: bool,
    pub enabled: bool,
}

impl FakeElement {
    pub fn new(handle: &str, tag: &str) -> Self {
        Self {
            handle: handle.to_owned(),
            tag: tag.to_owned(),
            dom_id: None,
            link_text: None,
            text: String::new(),
            attrs: HashMap::new(),
            click_goes_to: None,
            parent: None,
            displayed: true,
            enabled: true,
        }
    }

    pub fn dom_id(mut self, id: &str) -> Self {
        self.dom_id = Some(id.to_owned());
        self
    }

    pub fn link_text(mut self, text: &str) -> Self {
        self.link_text = Some(text.to_owned());
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = text.to_owned();
        self
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.insert(name.to_owned(), value.to_owned());
        self
    }

    pub fn goes_to(mut self, url: &str) -> Self {
        self.click_goes_to = Some(url.to_owned());
        self
    }

    pub fn child_of(mut self, parent_handle: &str) -> Self {
        self.parent = Some(parent_handle.to_owned());
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct FakePage {
    pub source: String,
    pub elements: Vec<FakeElement>,
}

impl FakePage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(mut self, source: &str) -> Self {
        self.source = source.to_owned();
        self
    }

    pub fn with_element(mut self, element: FakeElement) -> Self {
        self.elements.push(element);
        self
    }
}

#[derive(Default)]
struct State {
    current_url: String,
    pages: HashMap<String, FakePage>,
    typed: HashMap<String, String>,
    clicked: Vec<String>,
    fail_cookie_clear: bool,
}

#[derive(Default)]
pub struct FakeBrowser {
    state: Mutex<State>,
}

impl FakeBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_page(&self, url: &str, page: FakePage) {
        self.state
            .lock()
            .unwrap()
            .pages
            .insert(url.to_owned(), page);
    }

    pub fn fail_cookie_clear(&self) {
        self.state.lock().unwrap().fail_cookie_clear = true;
    }

    /// Keys typed into an element so far (send_keys accumulates, clear resets).
    pub fn typed_into(&self, handle: &str) -> Option<String> {
        self.state.lock().unwrap().typed.get(handle).cloned()
    }

    pub fn clicked(&self) -> Vec<String> {
        self.state.lock().unwrap().clicked.clone()
    }

    fn matches(element: &FakeElement, locator: Locator<'_>) -> bool {
        match locator {
            Locator::Id(id) => element.dom_id.as_deref() == Some(id),
            Locator::Tag(tag) => element.tag == tag,
            Locator::LinkText(text) => element.link_text.as_deref() == Some(text),
            Locator::Css(selector) => Self::css_matches(element, selector),
        }
    }

    /// Minimal CSS support: `#id`, `tag`, `tag[attr='value']`, and descendant
    /// selectors where only the last component is matched (`table tr`).
    fn css_matches(element: &FakeElement, selector: &str) -> bool {
        let component = selector.split_whitespace().last().unwrap_or(selector);
        if let Some(id) = component.strip_prefix('#') {
            return element.dom_id.as_deref() == Some(id);
        }
        if let Some((tag, rest)) = component.split_once('[') {
            let inner = rest.trim_end_matches(']');
            let Some((attr, value)) = inner.split_once('=') else {
                return false;
            };
            let value = value.trim_matches('\'').trim_matches('"');
            let tag_ok = tag.is_empty() || element.tag == tag;
            return tag_ok && element.attrs.get(attr).map(String::as_str) == Some(value);
        }
        element.tag == component
    }

    fn find_matching(
        &self,
        parent: Option<&ElementRef>,
        locator: Locator<'_>,
    ) -> Vec<ElementRef> {
        let state = self.state.lock().unwrap();
        let Some(page) = state.pages.get(&state.current_url) else {
            return Vec::new();
        };
        page.elements
            .iter()
            .filter(|e| match parent {
                Some(p) => e.parent.as_deref() == Some(p.0.as_str()),
                None => true,
            })
            .filter(|e| Self::matches(e, locator))
            .map(|e| ElementRef(e.handle.clone()))
            .collect()
    }

    fn with_element<T>(
        &self,
        element: &ElementRef,
        f: impl FnOnce(&FakeElement) -> T,
    ) -> Result<T, WebDriverError> {
        let state = self.state.lock().unwrap();
        state
            .pages
            .values()
            .flat_map(|p| p.elements.iter())
            .find(|e| e.handle == element.0)
            .map(f)
            .ok_or_else(|| WebDriverError::NoSuchElement(format!("stale element {}", element.0)))
    }
}

#[async_trait]
impl Browser for FakeBrowser {
    async fn goto(&self, url: &str) -> Result<(), WebDriverError> {
        self.state.lock().unwrap().current_url = url.to_owned();
        Ok(())
    }

    async fn current_url(&self) -> Result<String, WebDriverError> {
        Ok(self.state.lock().unwrap().current_url.clone())
    }

    async fn page_source(&self) -> Result<String, WebDriverError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .pages
            .get(&state.current_url)
            .map(|p| p.source.clone())
            .unwrap_or_default())
    }

    async fn find(&self, locator: Locator<'_>) -> Result<ElementRef, WebDriverError> {
        self.find_matching(None, locator)
            .into_iter()
            .next()
            .ok_or_else(|| WebDriverError::NoSuchElement(format!("{locator:?}")))
    }

    async fn find_all(&self, locator: Locator<'_>) -> Result<Vec<ElementRef>, WebDriverError> {
        Ok(self.find_matching(None, locator))
    }

    async fn find_in(
        &self,
        parent: &ElementRef,
        locator: Locator<'_>,
    ) -> Result<ElementRef, WebDriverError> {
        self.find_matching(Some(parent), locator)
            .into_iter()
            .next()
            .ok_or_else(|| WebDriverError::NoSuchElement(format!("{locator:?}")))
    }

    async fn find_all_in(
        &self,
        parent: &ElementRef,
        locator: Locator<'_>,
    ) -> Result<Vec<ElementRef>, WebDriverError> {
        Ok(self.find_matching(Some(parent), locator))
    }

    async fn click(&self, element: &ElementRef) -> Result<(), WebDriverError> {
        let destination = self.with_element(element, |e| e.click_goes_to.clone())?;
        let mut state = self.state.lock().unwrap();
        state.clicked.push(element.0.clone());
        if let Some(url) = destination {
            state.current_url = url;
        }
        Ok(())
    }

    async fn clear(&self, element: &ElementRef) -> Result<(), WebDriverError> {
        self.state
            .lock()
            .unwrap()
            .typed
            .insert(element.0.clone(), String::new());
        Ok(())
    }

    async fn send_keys(&self, element: &ElementRef, text: &str) -> Result<(), WebDriverError> {
        self.state
            .lock()
            .unwrap()
            .typed
            .entry(element.0.clone())
            .or_default()
            .push_str(text);
        Ok(())
    }

    async fn text(&self, element: &ElementRef) -> Result<String, WebDriverError> {
        self.with_element(element, |e| e.text.clone())
    }

    async fn attribute(
        &self,
        element: &ElementRef,
        name: &str,
    ) -> Result<Option<String>, WebDriverError> {
        if name == "value" {
            if let Some(typed) = self.typed_into(&element.0) {
                return Ok(Some(typed));
            }
        }
        self.with_element(element, |e| e.attrs.get(name).cloned())
    }

    async fn is_displayed(&self, element: &ElementRef) -> Result<bool, WebDriverError> {
        self.with_element(element, |e| e.displayed)
    }

    async fn is_enabled(&self, element: &ElementRef) -> Result<bool, WebDriverError> {
        self.with_element(element, |e| e.enabled)
    }

    async fn execute_script(
        &self,
        _script: &str,
        _args: Vec<Value>,
    ) -> Result<Value, WebDriverError> {
        Ok(Value::Null)
    }

    async fn delete_all_cookies(&self) -> Result<(), WebDriverError> {
        if self.state.lock().unwrap().fail_cookie_clear {
            return Err(WebDriverError::Protocol {
                error: "unknown error".to_owned(),
                message: "session wedged".to_owned(),
            });
        }
        Ok(())
    }

    async fn quit(&self) -> Result<(), WebDriverError> {
        Ok(())
    }
}
