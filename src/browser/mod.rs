//! Browser capability used by the collection engine.
//!
//! The engine only needs a handful of operations from a browser: load a
//! location and wait until it is ready, read the page source, list anchors
//! matching a CSS selector, click a consent button, scroll, and shut down.
//! Those are captured by [`BrowserLauncher`] and [`BrowserSession`].
//!
//! # Backends
//!
//! | Backend | Module | JS | Notes |
//! |---------|--------|----|-------|
//! | Chromium | [`chrome`] | yes | `chromiumoxide`, local launch or remote DevTools URL |
//! | HTTP | [`http`] | no | `reqwest` + `scraper`, for static newsrooms |
//!
//! A launcher creates one session per entity. Sessions are closed by the
//! engine before the next entity starts.

pub mod chrome;
pub mod document;
#[cfg(test)]
pub mod fake;
pub mod http;

use std::time::Duration;
use thiserror::Error;

pub use chrome::ChromeLauncher;
pub use http::HttpLauncher;

/// Errors raised by a browser backend.
///
/// Only [`BrowserError::Launch`] ever escapes the batch; every other variant
/// is folded into a session's terminal reason by the engine.
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("failed to launch browser: {0}")]
    Launch(String),
    #[error("navigation to {location} failed: {reason}")]
    Navigation { location: String, reason: String },
    #[error("{location} was not ready after {secs}s")]
    Timeout { location: String, secs: u64 },
    #[error("invalid selector `{0}`")]
    Selector(String),
    #[error("browser protocol error: {0}")]
    Protocol(String),
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// A hyperlink element as seen on the rendered page.
///
/// `href` is the raw attribute value; resolution against the page location is
/// the extractor's job.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Anchor {
    pub href: Option<String>,
    pub text: String,
}

/// Creates browser sessions.
pub trait BrowserLauncher {
    type Session: BrowserSession;

    /// Acquire a fresh session. A failure here is a resource-acquisition
    /// failure and aborts the whole batch.
    async fn launch(&self) -> Result<Self::Session, BrowserError>;
}

/// One live browser, dedicated to a single entity.
pub trait BrowserSession {
    /// Navigate to `location` and wait for the document to be ready, giving up
    /// after `timeout`.
    async fn navigate(&mut self, location: &str, timeout: Duration) -> Result<(), BrowserError>;

    /// Location currently displayed, after redirects.
    async fn current_location(&self) -> Result<String, BrowserError>;

    /// Full page source of the current document.
    async fn content(&self) -> Result<String, BrowserError>;

    /// Anchors matching a CSS selector, in document order.
    async fn anchors(&self, selector: &str) -> Result<Vec<Anchor>, BrowserError>;

    /// Click the first element matching `selector` whose text contains one of
    /// `needles`. Returns whether anything was clicked.
    async fn click_with_text(&self, selector: &str, needles: &[&str]) -> Result<bool, BrowserError>;

    /// Scroll to the bottom so lazily loaded results render.
    async fn scroll_to_bottom(&self) -> Result<(), BrowserError> {
        Ok(())
    }

    /// Tear the session down.
    async fn close(self) -> Result<(), BrowserError>
    where
        Self: Sized;
}
