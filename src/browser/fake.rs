//! In-memory browser for engine and batch tests.
//!
//! Pages are canned HTML keyed by exact location. Every launch, navigation
//! and close is recorded in a shared [`FakeLog`] so tests can check the page
//! bound and the teardown guarantee.

use super::document::{has_text_match, select_anchors};
use super::{Anchor, BrowserError, BrowserLauncher, BrowserSession};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Default)]
pub struct FakeLog {
    pub launches: usize,
    pub closes: usize,
    pub navigations: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct FakeBrowser {
    pages: HashMap<String, String>,
    fail_launch: bool,
    pub log: Arc<Mutex<FakeLog>>,
}

impl FakeBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, location: &str, html: &str) -> Self {
        self.pages.insert(location.to_string(), html.to_string());
        self
    }

    pub fn failing_launch(mut self) -> Self {
        self.fail_launch = true;
        self
    }

    pub fn navigations(&self) -> Vec<String> {
        self.log.lock().unwrap().navigations.clone()
    }

    pub fn launches(&self) -> usize {
        self.log.lock().unwrap().launches
    }

    pub fn closes(&self) -> usize {
        self.log.lock().unwrap().closes
    }
}

impl BrowserLauncher for FakeBrowser {
    type Session = FakeSession;

    async fn launch(&self) -> Result<FakeSession, BrowserError> {
        if self.fail_launch {
            return Err(BrowserError::Launch("no browser binary".to_string()));
        }
        self.log.lock().unwrap().launches += 1;
        Ok(FakeSession {
            pages: self.pages.clone(),
            log: Arc::clone(&self.log),
            location: String::new(),
            html: String::new(),
        })
    }
}

pub struct FakeSession {
    pages: HashMap<String, String>,
    log: Arc<Mutex<FakeLog>>,
    location: String,
    html: String,
}

impl BrowserSession for FakeSession {
    async fn navigate(&mut self, location: &str, timeout: Duration) -> Result<(), BrowserError> {
        self.log.lock().unwrap().navigations.push(location.to_string());
        match self.pages.get(location) {
            Some(html) => {
                self.location = location.to_string();
                self.html = html.clone();
                Ok(())
            }
            None => Err(BrowserError::Timeout {
                location: location.to_string(),
                secs: timeout.as_secs(),
            }),
        }
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

    async fn click_with_text(&self, selector: &str, needles: &[&str]) -> Result<bool, BrowserError> {
        has_text_match(&self.html, selector, needles)
    }

    async fn close(self) -> Result<(), BrowserError> {
        self.log.lock().unwrap().closes += 1;
        Ok(())
    }
}
