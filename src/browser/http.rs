//! Plain HTTP "browser" backed by `reqwest` and `scraper`.
//!
//! No JavaScript runs, so this backend only suits newsrooms that render their
//! listings server-side. It is much cheaper than launching Chromium and keeps
//! the same session semantics: one client per entity, bounded page loads,
//! anchor queries over the fetched document.

use super::document::{has_text_match, select_anchors};
use super::{Anchor, BrowserError, BrowserLauncher, BrowserSession};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, instrument};

pub const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0 Safari/537.36";

#[derive(Debug, Clone, Default)]
pub struct HttpLauncher;

impl BrowserLauncher for HttpLauncher {
    type Session = HttpSession;

    async fn launch(&self) -> Result<HttpSession, BrowserError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| BrowserError::Launch(e.to_string()))?;
        Ok(HttpSession {
            client,
            location: String::new(),
            html: String::new(),
        })
    }
}

#[derive(Debug)]
pub struct HttpSession {
    client: Client,
    location: String,
    html: String,
}

impl BrowserSession for HttpSession {
    #[instrument(level = "debug", skip_all, fields(%location))]
    async fn navigate(&mut self, location: &str, timeout: Duration) -> Result<(), BrowserError> {
        let fetch = async {
            let resp = self.client.get(location).send().await?.error_for_status()?;
            let final_url = resp.url().to_string();
            let body = resp.text().await?;
            Ok::<_, reqwest::Error>((final_url, body))
        };
        let (final_url, body) = tokio::time::timeout(timeout, fetch)
            .await
            .map_err(|_| BrowserError::Timeout {
                location: location.to_string(),
                secs: timeout.as_secs(),
            })?
            .map_err(|e| BrowserError::Navigation {
                location: location.to_string(),
                reason: e.to_string(),
            })?;
        debug!(bytes = body.len(), %final_url, "Fetched page");
        self.location = final_url;
        self.html = body;
        Ok(())
    }

    async fn current_location(&self) -> Result<String, BrowserError> {
        Ok(self.location.clone())
    }

    async fn content(&self) -> Result<String, BrowserError> {
        Ok(self.html.clone())
    }

    async fn anchors(&self, selector: &str) -> Result<Vec<Anchor>, BrowserError> {
        select_anchors(&self.html, selector)
    }

    /// Nothing can be clicked without a DOM; reports whether a click *would*
    /// have matched so the caller's logging stays meaningful.
    async fn click_with_text(&self, selector: &str, needles: &[&str]) -> Result<bool, BrowserError> {
        if has_text_match(&self.html, selector, needles)? {
            debug!(selector, "Static page has a matching button; ignoring click");
        }
        Ok(false)
    }

    async fn close(self) -> Result<(), BrowserError> {
        Ok(())
    }
}
