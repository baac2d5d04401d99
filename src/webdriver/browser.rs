//! The browser capability surface consumed by portal navigation flows.

use crate::webdriver::errors::WebDriverError;
use async_trait::async_trait;
use serde_json::{Value, json};

/// W3C WebDriver element identifier key.
pub const W3C_ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// Element locator strategies used by the portal flows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Locator<'a> {
    /// Element `id` attribute (primary strategy for known form fields).
    Id(&'a str),
    /// CSS selector (fallbacks and option lookups).
    Css(&'a str),
    /// Exact visible link text.
    LinkText(&'a str),
    /// Tag name (indiscriminate row/input collection).
    Tag(&'a str),
}

/// Opaque handle to a located element, valid within the session that found it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementRef(pub String);

impl ElementRef {
    /// JSON representation used when passing the element as a script argument.
    pub fn to_arg(&self) -> Value {
        json!({ W3C_ELEMENT_KEY: self.0 })
    }
}

/// One live browser session.
///
/// This mirrors the subset of the WebDriver command set the scrape flows
/// need; [`crate::webdriver::WebDriverClient`] implements it against a real
/// chromedriver, tests implement it in-memory.
#[async_trait]
pub trait Browser: Send + Sync {
    async fn goto(&self, url: &str) -> Result<(), WebDriverError>;
    async fn current_url(&self) -> Result<String, WebDriverError>;
    async fn page_source(&self) -> Result<String, WebDriverError>;

    async fn find(&self, locator: Locator<'_>) -> Result<ElementRef, WebDriverError>;
    async fn find_all(&self, locator: Locator<'_>) -> Result<Vec<ElementRef>, WebDriverError>;
    async fn find_in(
        &self,
        parent: &ElementRef,
        locator: Locator<'_>,
    ) -> Result<ElementRef, WebDriverError>;
    async fn find_all_in(
        &self,
        parent: &ElementRef,
        locator: Locator<'_>,
    ) -> Result<Vec<ElementRef>, WebDriverError>;

    async fn click(&self, element: &ElementRef) -> Result<(), WebDriverError>;
    async fn clear(&self, element: &ElementRef) -> Result<(), WebDriverError>;
    async fn send_keys(&self, element: &ElementRef, text: &str) -> Result<(), WebDriverError>;
    async fn text(&self, element: &ElementRef) -> Result<String, WebDriverError>;
    async fn attribute(
        &self,
        element: &ElementRef,
        name: &str,
    ) -> Result<Option<String>, WebDriverError>;
    async fn is_displayed(&self, element: &ElementRef) -> Result<bool, WebDriverError>;
    async fn is_enabled(&self, element: &ElementRef) -> Result<bool, WebDriverError>;

    async fn execute_script(
        &self,
        script: &str,
        args: Vec<Value>,
    ) -> Result<Value, WebDriverError>;
    async fn delete_all_cookies(&self) -> Result<(), WebDriverError>;
    async fn quit(&self) -> Result<(), WebDriverError>;
}
