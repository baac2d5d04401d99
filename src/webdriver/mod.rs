//! WebDriver protocol client and browser session pool.
//!
//! Talks W3C WebDriver JSON-over-HTTP to a local chromedriver. The capability
//! surface the rest of the crate consumes is the [`Browser`] trait, so scrape
//! flows can be exercised against a fake driver in tests.

pub mod browser;
pub mod client;
pub mod errors;
#[cfg(test)]
pub mod fake;
pub mod pool;

pub use browser::{Browser, ElementRef, Locator};
pub use client::{ChromeSessionFactory, WebDriverClient};
pub use errors::WebDriverError;
pub use pool::{PooledSession, SessionFactory, SessionPool};

/// Pool type used by the application proper (tests substitute fake factories).
pub type ChromePool = SessionPool<ChromeSessionFactory>;
