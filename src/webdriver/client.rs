//! Reqwest-backed W3C WebDriver protocol client.

use crate::webdriver::browser::{Browser, ElementRef, Locator, W3C_ELEMENT_KEY};
use crate::webdriver::errors::WebDriverError;
use crate::webdriver::pool::SessionFactory;
use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;

/// Chrome launch arguments for headless scraping.
///
/// `--no-sandbox` / `--disable-dev-shm-usage` are required in the containers
/// this runs in; the window size keeps the portal's desktop layout.
const CHROME_ARGS: &[&str] = &[
    "--headless=new",
    "--no-sandbox",
    "--disable-dev-shm-usage",
    "--window-size=1920,1080",
];

/// One chromedriver session, addressed as `{server}/session/{id}`.
pub struct WebDriverClient {
    http: reqwest::Client,
    base: String,
    session_id: String,
}

impl WebDriverClient {
    /// Open a new session against a running chromedriver.
    pub async fn new_session(
        http: reqwest::Client,
        server_url: &str,
        chrome_binary: &str,
    ) -> Result<Self, WebDriverError> {
        let server = server_url.trim_end_matches('/');
        let capabilities = json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "chrome",
                    "goog:chromeOptions": {
                        "binary": chrome_binary,
                        "args": CHROME_ARGS,
                    }
                }
            }
        });

        let response = http
            .post(format!("{server}/session"))
            .json(&capabilities)
            .send()
            .await?;
        let value = Self::unwrap_value(response).await?;

        let session_id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| WebDriverError::Protocol {
                error: "session not created".to_owned(),
                message: "response did not carry a sessionId".to_owned(),
            })?
            .to_owned();

        debug!(session_id = %session_id, "webdriver session created");
        Ok(Self {
            base: format!("{server}/session/{session_id}"),
            session_id,
            http,
        })
    }

    /// Unwrap the `{"value": ...}` envelope, converting protocol-level
    /// failures into typed errors.
    async fn unwrap_value(response: reqwest::Response) -> Result<Value, WebDriverError> {
        let status = response.status();
        let body: Value = response.json().await?;
        let value = body.get("value").cloned().unwrap_or(Value::Null);

        if !status.is_success() {
            let error = value
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_owned();
            let message = value
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_owned();
            if error == "no such element" {
                return Err(WebDriverError::NoSuchElement(message));
            }
            return Err(WebDriverError::Protocol { error, message });
        }
        Ok(value)
    }

    async fn get_value(&self, path: &str) -> Result<Value, WebDriverError> {
        let response = self.http.get(format!("{}{path}", self.base)).send().await?;
        Self::unwrap_value(response).await
    }

    async fn post_value(&self, path: &str, body: Value) -> Result<Value, WebDriverError> {
        let response = self
            .http
            .post(format!("{}{path}", self.base))
            .json(&body)
            .send()
            .await?;
        Self::unwrap_value(response).await
    }

    async fn delete_value(&self, path: &str) -> Result<Value, WebDriverError> {
        let response = self
            .http
            .delete(format!("{}{path}", self.base))
            .send()
            .await?;
        Self::unwrap_value(response).await
    }

    /// Translate a locator into the protocol's `{using, value}` pair.
    fn locator_body(locator: Locator<'_>) -> Value {
        let (using, value) = match locator {
            Locator::Id(id) => ("css selector", format!("#{id}")),
            Locator::Css(selector) => ("css selector", selector.to_owned()),
            Locator::LinkText(text) => ("link text", text.to_owned()),
            Locator::Tag(tag) => ("tag name", tag.to_owned()),
        };
        json!({ "using": using, "value": value })
    }

    fn extract_element(value: &Value) -> Result<ElementRef, WebDriverError> {
        let object = value.as_object().ok_or_else(|| WebDriverError::Protocol {
            error: "invalid element".to_owned(),
            message: format!("expected an element object, got {value}"),
        })?;
        let id = object
            .get(W3C_ELEMENT_KEY)
            .or_else(|| object.values().next())
            .and_then(Value::as_str)
            .ok_or_else(|| WebDriverError::Protocol {
                error: "invalid element".to_owned(),
                message: "element object carried no identifier".to_owned(),
            })?;
        Ok(ElementRef(id.to_owned()))
    }

    fn extract_elements(value: &Value) -> Result<Vec<ElementRef>, WebDriverError> {
        value
            .as_array()
            .ok_or_else(|| WebDriverError::Protocol {
                error: "invalid element list".to_owned(),
                message: format!("expected an array, got {value}"),
            })?
            .iter()
            .map(Self::extract_element)
            .collect()
    }
}

#[async_trait]
impl Browser for WebDriverClient {
    async fn goto(&self, url: &str) -> Result<(), WebDriverError> {
        self.post_value("/url", json!({ "url": url })).await?;
        Ok(())
    }

    async fn current_url(&self) -> Result<String, WebDriverError> {
        let value = self.get_value("/url").await?;
        Ok(value.as_str().unwrap_or_default().to_owned())
    }

    async fn page_source(&self) -> Result<String, WebDriverError> {
        let value = self.get_value("/source").await?;
        Ok(value.as_str().unwrap_or_default().to_owned())
    }

    async fn find(&self, locator: Locator<'_>) -> Result<ElementRef, WebDriverError> {
        let value = self
            .post_value("/element", Self::locator_body(locator))
            .await?;
        Self::extract_element(&value)
    }

    async fn find_all(&self, locator: Locator<'_>) -> Result<Vec<ElementRef>, WebDriverError> {
        let value = self
            .post_value("/elements", Self::locator_body(locator))
            .await?;
        Self::extract_elements(&value)
    }

    async fn find_in(
        &self,
        parent: &ElementRef,
        locator: Locator<'_>,
    ) -> Result<ElementRef, WebDriverError> {
        let value = self
            .post_value(
                &format!("/element/{}/element", parent.0),
                Self::locator_body(locator),
            )
            .await?;
        Self::extract_element(&value)
    }

    async fn find_all_in(
        &self,
        parent: &ElementRef,
        locator: Locator<'_>,
    ) -> Result<Vec<ElementRef>, WebDriverError> {
        let value = self
            .post_value(
                &format!("/element/{}/elements", parent.0),
                Self::locator_body(locator),
            )
            .await?;
        Self::extract_elements(&value)
    }

    async fn click(&self, element: &ElementRef) -> Result<(), WebDriverError> {
        self.post_value(&format!("/element/{}/click", element.0), json!({}))
            .await?;
        Ok(())
    }

    async fn clear(&self, element: &ElementRef) -> Result<(), WebDriverError> {
        self.post_value(&format!("/element/{}/clear", element.0), json!({}))
            .await?;
        Ok(())
    }

    async fn send_keys(&self, element: &ElementRef, text: &str) -> Result<(), WebDriverError> {
        self.post_value(
            &format!("/element/{}/value", element.0),
            json!({ "text": text }),
        )
        .await?;
        Ok(())
    }

    async fn text(&self, element: &ElementRef) -> Result<String, WebDriverError> {
        let value = self.get_value(&format!("/element/{}/text", element.0)).await?;
        Ok(value.as_str().unwrap_or_default().to_owned())
    }

    async fn attribute(
        &self,
        element: &ElementRef,
        name: &str,
    ) -> Result<Option<String>, WebDriverError> {
        let value = self
            .get_value(&format!("/element/{}/attribute/{name}", element.0))
            .await?;
        Ok(value.as_str().map(str::to_owned))
    }

    async fn is_displayed(&self, element: &ElementRef) -> Result<bool, WebDriverError> {
        let value = self
            .get_value(&format!("/element/{}/displayed", element.0))
            .await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn is_enabled(&self, element: &ElementRef) -> Result<bool, WebDriverError> {
        let value = self
            .get_value(&format!("/element/{}/enabled", element.0))
            .await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn execute_script(
        &self,
        script: &str,
        args: Vec<Value>,
    ) -> Result<Value, WebDriverError> {
        self.post_value("/execute/sync", json!({ "script": script, "args": args }))
            .await
    }

    async fn delete_all_cookies(&self) -> Result<(), WebDriverError> {
        self.delete_value("/cookie").await?;
        Ok(())
    }

    async fn quit(&self) -> Result<(), WebDriverError> {
        let response = self.http.delete(&self.base).send().await?;
        Self::unwrap_value(response).await?;
        debug!(session_id = %self.session_id, "webdriver session closed");
        Ok(())
    }
}

/// Factory that opens real chromedriver sessions for the pool.
pub struct ChromeSessionFactory {
    http: reqwest::Client,
    server_url: String,
    chrome_binary: String,
}

impl ChromeSessionFactory {
    pub fn new(http: reqwest::Client, server_url: String, chrome_binary: String) -> Self {
        Self {
            http,
            server_url,
            chrome_binary,
        }
    }
}

#[async_trait]
impl SessionFactory for ChromeSessionFactory {
    type Session = WebDriverClient;

    async fn create(&self) -> Result<Self::Session, WebDriverError> {
        WebDriverClient::new_session(self.http.clone(), &self.server_url, &self.chrome_binary).await
    }
}
