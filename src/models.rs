//! Data models shared by the collection engine, the batch orchestrator and the
//! export step.
//!
//! - [`ScrapeTarget`]: one entity to collect links for
//! - [`DateWindow`]: inclusive publication-date window
//! - [`DiscoveredLink`]: a link accepted by the engine
//! - [`ScrapeOutcome`]: everything one entity's session produced
//! - [`ExportRow`]: the flat record handed to the writers

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

const NEWS_SEARCH_URL: &str = "https://www.google.com/search";

/// A named entity (usually a company slug) to harvest links for.
///
/// `seed` is the first location the engine loads. When it is `None` the engine
/// short-circuits with [`TerminalReason::TargetUnresolved`] without ever
/// launching a browser. `base_domain`, when set, scopes link acceptance:
/// every accepted address must contain it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeTarget {
    pub entity_id: String,
    pub seed: Option<String>,
    pub base_domain: Option<String>,
}

impl ScrapeTarget {
    /// Target whose seed is a news search for the entity name.
    ///
    /// Underscores in the identifier become spaces in the query
    /// (`apple_inc` searches for "apple inc"). When a window is given it is
    /// passed to the search engine as a custom date range.
    pub fn news_search(entity_id: &str, window: Option<&DateWindow>) -> Self {
        let query = entity_id.replace('_', " ");
        let mut seed = format!(
            "{}?q={}&tbm=nws",
            NEWS_SEARCH_URL,
            urlencoding::encode(query.trim())
        );
        if let Some(w) = window {
            let range = format!(
                "cdr:1,cd_min:{},cd_max:{}",
                w.start.format("%-m/%-d/%Y"),
                w.end.format("%-m/%-d/%Y")
            );
            seed.push_str("&tbs=");
            seed.push_str(&urlencoding::encode(&range));
        }
        Self {
            entity_id: entity_id.to_string(),
            seed: Some(seed),
            base_domain: None,
        }
    }

    /// Target that crawls a company's own newsroom.
    ///
    /// The base URL doubles as the seed and as the scoping domain. A blank or
    /// missing base URL yields an unresolved target.
    pub fn site(entity_id: &str, base_url: Option<&str>) -> Self {
        let base = base_url
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .map(str::to_string);
        Self {
            entity_id: entity_id.to_string(),
            seed: base.clone(),
            base_domain: base,
        }
    }

    /// Target with nothing to load.
    pub fn unresolved(entity_id: &str) -> Self {
        Self {
            entity_id: entity_id.to_string(),
            seed: None,
            base_domain: None,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WindowError {
    #[error("start date {start} is after end date {end}")]
    Inverted { start: NaiveDate, end: NaiveDate },
}

/// Inclusive `[start, end]` date window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, WindowError> {
        if start > end {
            return Err(WindowError::Inverted { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// A link accepted by the collection engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveredLink {
    pub entity_id: String,
    pub address: String,
    pub date: Option<NaiveDate>,
}

/// Why a session stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerminalReason {
    /// No seed location; nothing was loaded.
    #[serde(rename = "no-target")]
    TargetUnresolved,
    /// No further "next page" affordance.
    #[serde(rename = "exhausted")]
    PaginationExhausted,
    /// `max_pages` pages were loaded.
    #[serde(rename = "page-limit")]
    PageLimitReached,
    /// Navigation failed or the page never became ready in time.
    #[serde(rename = "load-failure")]
    LoadFailure,
    /// An anti-bot interstitial was served.
    #[serde(rename = "blocked")]
    Blocked,
}

impl TerminalReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            TerminalReason::TargetUnresolved => "no-target",
            TerminalReason::PaginationExhausted => "exhausted",
            TerminalReason::PageLimitReached => "page-limit",
            TerminalReason::LoadFailure => "load-failure",
            TerminalReason::Blocked => "blocked",
        }
    }

    /// `true` for the two terminals that stop a session early.
    pub fn is_abort(&self) -> bool {
        matches!(self, TerminalReason::LoadFailure | TerminalReason::Blocked)
    }
}

impl fmt::Display for TerminalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one entity's session, produced exactly once per entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeOutcome {
    pub entity_id: String,
    pub links: Vec<DiscoveredLink>,
    pub pages_loaded: u32,
    pub reason: TerminalReason,
}

impl ScrapeOutcome {
    pub fn unresolved(entity_id: &str) -> Self {
        Self {
            entity_id: entity_id.to_string(),
            links: Vec::new(),
            pages_loaded: 0,
            reason: TerminalReason::TargetUnresolved,
        }
    }
}

/// Flat record handed to the CSV/JSON writers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportRow {
    pub entity_id: String,
    pub link: String,
    pub date: Option<NaiveDate>,
}

impl From<DiscoveredLink> for ExportRow {
    fn from(link: DiscoveredLink) -> Self {
        Self {
            entity_id: link.entity_id,
            link: link.address,
            date: link.date,
        }
    }
}
