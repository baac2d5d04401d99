//! Error taxonomy for portal scrape flows.
//!
//! Everything a flow can fail with is represented here so the HTTP layer can
//! turn failures into structured outcomes instead of propagating raw faults.

use crate::webdriver::WebDriverError;

#[derive(Debug, thiserror::Error)]
pub enum PortalError {
    /// Login submitted but the landing URL never reached the home page.
    /// Deliberately not a transport error: the portal answers 200 either way.
    #[error("Invalid username or password.")]
    InvalidCredentials,
    /// The attendance view loaded but carried no rows at all.
    #[error("No attendance data found (maybe server issue).")]
    NoData,
    /// No browser session could be acquired within the configured bound.
    /// Retryable by the caller.
    #[error("All browser sessions are busy. Please try again shortly.")]
    Busy,
    /// Primary and fallback locator strategies were both exhausted.
    #[error("could not find {0} on the page")]
    ElementNotFound(&'static str),
    /// Element located but hidden or disabled when we went to use it.
    #[error("{0} is not interactable")]
    NotInteractable(&'static str),
    /// Anything else that went wrong mid-sequence.
    #[error(transparent)]
    Scrape(#[from] anyhow::Error),
}

impl From<WebDriverError> for PortalError {
    fn from(e: WebDriverError) -> Self {
        match e {
            WebDriverError::AcquireTimeout(_) | WebDriverError::PoolClosed => PortalError::Busy,
            other => PortalError::Scrape(anyhow::Error::new(other)),
        }
    }
}
