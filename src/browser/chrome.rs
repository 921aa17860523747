//! Chromium backend built on `chromiumoxide`.
//!
//! Each session owns its own browser process (or its own tab when attached to
//! a remote DevTools endpoint) plus the task that drives the CDP event
//! handler. Closing the session shuts both down.

use super::{Anchor, BrowserError, BrowserLauncher, BrowserSession};
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, instrument, warn};

const READY_POLL: Duration = Duration::from_millis(200);

/// Launches Chromium sessions.
#[derive(Debug, Clone)]
pub struct ChromeLauncher {
    /// Run without a visible window.
    pub headless: bool,
    /// Attach to an already running Chrome instead of launching one.
    pub remote_url: Option<String>,
    /// Upper bound for individual CDP requests.
    pub request_timeout: Duration,
}

impl Default for ChromeLauncher {
    fn default() -> Self {
        Self {
            headless: true,
            remote_url: None,
            request_timeout: Duration::from_secs(30),
        }
    }
}

fn protocol(e: impl std::fmt::Display) -> BrowserError {
    BrowserError::Protocol(e.to_string())
}

impl BrowserLauncher for ChromeLauncher {
    type Session = ChromeSession;

    #[instrument(level = "info", skip_all, fields(headless = self.headless, remote = self.remote_url.is_some()))]
    async fn launch(&self) -> Result<ChromeSession, BrowserError> {
        let (browser, mut handler) = if let Some(ref url) = self.remote_url {
            info!(%url, "Connecting to remote Chrome");
            Browser::connect(url)
                .await
                .map_err(|e| BrowserError::Launch(format!("connect to {url}: {e}")))?
        } else {
            let mut builder = BrowserConfig::builder()
                .no_sandbox()
                .request_timeout(self.request_timeout)
                .arg("--disable-gpu")
                .arg("--disable-dev-shm-usage")
                .arg("--blink-settings=imagesEnabled=false");
            if !self.headless {
                builder = builder.with_head();
            }
            let config = builder.build().map_err(BrowserError::Launch)?;
            Browser::launch(config)
                .await
                .map_err(|e| BrowserError::Launch(e.to_string()))?
        };

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                handler_task.abort();
                return Err(BrowserError::Launch(format!("open tab: {e}")));
            }
        };

        debug!("Chrome session ready");
        Ok(ChromeSession {
            browser,
            page,
            handler_task,
            owns_process: self.remote_url.is_none(),
        })
    }
}

/// A single Chromium tab plus the process or connection behind it.
pub struct ChromeSession {
    browser: Browser,
    page: Page,
    handler_task: JoinHandle<()>,
    owns_process: bool,
}

/// `Ok(true)` once the document is complete, `Ok(false)` while there is still
/// time to wait.
fn check_ready(
    state: &str,
    location: &str,
    deadline: Instant,
    timeout: Duration,
) -> Result<bool, BrowserError> {
    if state == "complete" {
        return Ok(true);
    }
    if Instant::now() >= deadline {
        debug!(%location, state, "readyState never reached complete");
        return Err(BrowserError::Timeout {
            location: location.to_string(),
            secs: timeout.as_secs(),
        });
    }
    Ok(false)
}

impl ChromeSession {
    async fn wait_until_ready(
        &self,
        location: &str,
        deadline: Instant,
        timeout: Duration,
    ) -> Result<(), BrowserError> {
        loop {
            let state: String = self
                .page
                .evaluate("document.readyState")
                .await
                .map_err(protocol)?
                .into_value()
                .map_err(protocol)?;
            if check_ready(&state, location, deadline, timeout)? {
                return Ok(());
            }
            sleep(READY_POLL).await;
        }
    }
}

impl BrowserSession for ChromeSession {
    #[instrument(level = "debug", skip_all, fields(%location))]
    async fn navigate(&mut self, location: &str, timeout: Duration) -> Result<(), BrowserError> {
        let deadline = Instant::now() + timeout;
        let load = async {
            self.page
                .goto(location)
                .await
                .map_err(|e| BrowserError::Navigation {
                    location: location.to_string(),
                    reason: e.to_string(),
                })?;
            self.wait_until_ready(location, deadline, timeout).await
        };
        tokio::time::timeout(timeout, load)
            .await
            .map_err(|_| BrowserError::Timeout {
                location: location.to_string(),
                secs: timeout.as_secs(),
            })?
    }

    async fn current_location(&self) -> Result<String, BrowserError> {
        Ok(self.page.url().await.map_err(protocol)?.unwrap_or_default())
    }

    async fn content(&self) -> Result<String, BrowserError> {
        self.page.content().await.map_err(protocol)
    }

    async fn anchors(&self, selector: &str) -> Result<Vec<Anchor>, BrowserError> {
        let elements = self
            .page
            .find_elements(selector)
            .await
            .map_err(|e| BrowserError::Selector(format!("{selector}: {e}")))?;
        let mut anchors = Vec::with_capacity(elements.len());
        for el in elements {
            let href = el.attribute("href").await.map_err(protocol)?;
            let text = el.inner_text().await.map_err(protocol)?.unwrap_or_default();
            anchors.push(Anchor {
                href,
                text: text.trim().to_string(),
            });
        }
        Ok(anchors)
    }

    async fn click_with_text(&self, selector: &str, needles: &[&str]) -> Result<bool, BrowserError> {
        let Ok(elements) = self.page.find_elements(selector).await else {
            return Ok(false);
        };
        for el in elements {
            let text = el.inner_text().await.map_err(protocol)?.unwrap_or_default();
            if needles.iter().any(|n| text.contains(n)) {
                el.click().await.map_err(protocol)?;
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn scroll_to_bottom(&self) -> Result<(), BrowserError> {
        self.page
            .evaluate("window.scrollTo(0, document.body.scrollHeight);")
            .await
            .map_err(protocol)?;
        Ok(())
    }

    #[instrument(level = "debug", skip_all)]
    async fn close(mut self) -> Result<(), BrowserError> {
        if let Err(e) = self.page.close().await {
            warn!(error = %e, "Failed to close tab");
        }
        let result = if self.owns_process {
            match self.browser.close().await {
                Ok(_) => {
                    let _ = self.browser.wait().await;
                    Ok(())
                }
                Err(e) => Err(protocol(e)),
            }
        } else {
            Ok(())
        };
        self.handler_task.abort();
        result
    }
}
