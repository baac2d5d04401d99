//! Login and attendance navigation against the portal.
//!
//! The portal's markup is not contractually stable, so each step has a
//! primary locator strategy and a documented fallback. Page readiness is
//! handled with bounded wait-for conditions rather than fixed sleeps.

use crate::portal::{Credentials, PortalConfig, PortalError};
use crate::webdriver::{Browser, ElementRef, Locator, WebDriverError};
use std::time::Duration;
use tracing::debug;

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Poll for an element until it appears or `timeout` elapses.
pub(crate) async fn wait_for<B: Browser>(
    browser: &B,
    locator: Locator<'_>,
    timeout: Duration,
) -> Result<ElementRef, WebDriverError> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        match browser.find(locator).await {
            Ok(element) => return Ok(element),
            Err(e) if e.is_not_found() => {
                if tokio::time::Instant::now() >= deadline {
                    return Err(e);
                }
                tokio::time::sleep(POLL_INTERVAL).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Poll the current URL for a substring; `false` once `timeout` elapses.
pub(crate) async fn wait_for_url_contains<B: Browser>(
    browser: &B,
    needle: &str,
    timeout: Duration,
) -> Result<bool, WebDriverError> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if browser.current_url().await?.contains(needle) {
            return Ok(true);
        }
        if tokio::time::Instant::now() >= deadline {
            return Ok(false);
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// Scroll an element into view and verify it can actually be interacted with.
pub(crate) async fn ensure_interactable<B: Browser>(
    browser: &B,
    element: &ElementRef,
    what: &'static str,
) -> Result<(), PortalError> {
    browser
        .execute_script("arguments[0].scrollIntoView(true);", vec![element.to_arg()])
        .await?;
    if !browser.is_displayed(element).await? || !browser.is_enabled(element).await? {
        return Err(PortalError::NotInteractable(what));
    }
    Ok(())
}

/// Log in to the portal.
///
/// Success is judged by the landing URL containing "home"; anything else
/// after a completed submit means the credentials were rejected.
pub async fn login<B: Browser>(
    browser: &B,
    config: &PortalConfig,
    credentials: &Credentials,
) -> Result<(), PortalError> {
    browser.goto(&config.base_url).await?;

    match wait_for(browser, Locator::Id("txt_uname"), config.page_wait).await {
        Ok(username_field) => {
            let password_field = browser.find(Locator::Id("txt_pwd")).await?;
            browser.send_keys(&username_field, &credentials.username).await?;
            browser.send_keys(&password_field, &credentials.password).await?;
        }
        Err(e) if e.is_not_found() => {
            // Field ids changed before; fall back to the first two generic
            // inputs on the page.
            debug!("login field ids missing, using positional fallback");
            let inputs = browser.find_all(Locator::Tag("input")).await?;
            if inputs.len() < 2 {
                return Err(PortalError::ElementNotFound("login input fields"));
            }
            browser.send_keys(&inputs[0], &credentials.username).await?;
            browser.send_keys(&inputs[1], &credentials.password).await?;
        }
        Err(e) => return Err(e.into()),
    }

    submit_login(browser).await?;

    if !wait_for_url_contains(browser, "home", config.page_wait).await? {
        return Err(PortalError::InvalidCredentials);
    }
    Ok(())
}

async fn submit_login<B: Browser>(browser: &B) -> Result<(), PortalError> {
    match browser.find(Locator::Id("but_submit")).await {
        Ok(button) => Ok(browser.click(&button).await?),
        Err(e) if e.is_not_found() => {
            let button = browser
                .find(Locator::Css("input[type='submit']"))
                .await
                .map_err(|e| {
                    if e.is_not_found() {
                        PortalError::ElementNotFound("login submit control")
                    } else {
                        e.into()
                    }
                })?;
            Ok(browser.click(&button).await?)
        }
        Err(e) => Err(e.into()),
    }
}

/// Navigate to the attendance view and collect every table row's text.
///
/// Rows are collected indiscriminately; deciding which are data rows is the
/// parser's job.
pub async fn fetch_attendance_rows<B: Browser>(
    browser: &B,
    config: &PortalConfig,
) -> Result<Vec<String>, PortalError> {
    match browser.find(Locator::LinkText("Course Content")).await {
        Ok(link) => browser.click(&link).await?,
        Err(e) if e.is_not_found() => {
            // Menu got reorganized: go straight to the known URL.
            debug!("attendance menu link missing, navigating directly");
            browser.goto(&config.attendance_url).await?;
        }
        Err(e) => return Err(e.into()),
    }

    // Rows render asynchronously; an empty page after the wait is NoData.
    let _ = wait_for(browser, Locator::Tag("tr"), config.page_wait).await;
    let rows = browser.find_all(Locator::Tag("tr")).await?;
    if rows.is_empty() {
        return Err(PortalError::NoData);
    }

    let mut texts = Vec::with_capacity(rows.len());
    for row in &rows {
        texts.push(browser.text(row).await?);
    }
    Ok(texts)
}
