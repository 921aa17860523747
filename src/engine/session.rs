//! Per-entity session state.
//!
//! A [`SessionState`] lives for exactly one entity's scrape: it is created by
//! the engine when the browser comes up and consumed into a
//! [`ScrapeOutcome`] when the loop exits.

use crate::models::{DiscoveredLink, ScrapeOutcome, TerminalReason};
use std::collections::HashSet;

#[derive(Debug)]
pub struct SessionState {
    seen: HashSet<String>,
    links: Vec<DiscoveredLink>,
    pages_loaded: u32,
    location: String,
}

impl SessionState {
    pub fn new(seed: String) -> Self {
        Self {
            seen: HashSet::new(),
            links: Vec::new(),
            pages_loaded: 0,
            location: seed,
        }
    }

    /// Whether `address` was already emitted in this session. Exact string
    /// match: case and fragment matter.
    #[allow(dead_code)]
    pub fn seen(&self, address: &str) -> bool {
        self.seen.contains(address)
    }

    /// Mark `address` as emitted. Returns whether it was new.
    pub fn record(&mut self, address: &str) -> bool {
        self.seen.insert(address.to_string())
    }

    pub fn push(&mut self, link: DiscoveredLink) {
        self.links.push(link);
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    /// Count a load attempt for the current location.
    pub fn begin_load(&mut self) -> u32 {
        self.pages_loaded += 1;
        self.pages_loaded
    }

    pub fn advance(&mut self, next: String) {
        self.location = next;
    }

    pub fn finish(self, entity_id: &str, reason: TerminalReason) -> ScrapeOutcome {
        ScrapeOutcome {
            entity_id: entity_id.to_string(),
            links: self.links,
            pages_loaded: self.pages_loaded,
            reason,
        }
    }
}
