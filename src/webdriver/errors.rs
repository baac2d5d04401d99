//! Error types for the WebDriver client and session pool.

use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum WebDriverError {
    #[error("no such element: {0}")]
    NoSuchElement(String),
    #[error("webdriver request failed")]
    Transport(#[from] reqwest::Error),
    #[error("webdriver protocol error '{error}': {message}")]
    Protocol { error: String, message: String },
    #[error("no browser session became available within {0:.2?}")]
    AcquireTimeout(Duration),
    #[error("browser session pool is shut down")]
    PoolClosed,
}

impl WebDriverError {
    /// True for the "no such element" class of failures, which navigation
    /// flows treat as a cue to try their fallback strategy.
    pub fn is_not_found(&self) -> bool {
        matches!(self, WebDriverError::NoSuchElement(_))
    }
}
