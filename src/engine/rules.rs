//! Selection rules plugged into the collection engine.
//!
//! Each discovery mode is a [`CollectionRules`] value: an ordered extraction
//! chain, an ordered pagination chain, a scoping rule and the anti-bot
//! markers to watch for. Chains are evaluated in priority order and the first
//! rule that yields anything wins.

use crate::browser::{Anchor, BrowserError, BrowserSession};
use crate::models::ScrapeTarget;
use clap::ValueEnum;
use tracing::debug;
use url::Url;

/// Where links for an entity come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DiscoveryMode {
    /// News search results for the entity name.
    Search,
    /// The entity's own newsroom, from the company registry.
    Site,
}

/// How candidate links are picked off a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionRule {
    /// Anchors matching a CSS selector.
    Css(String),
    /// Every anchor on the page.
    AllAnchors,
}

impl ExtractionRule {
    fn selector(&self) -> &str {
        match self {
            ExtractionRule::Css(sel) => sel,
            ExtractionRule::AllAnchors => "a",
        }
    }
}

/// How the "next page" affordance is found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaginationRule {
    /// First anchor matching a CSS selector.
    Css(String),
    /// First anchor whose visible text contains the given string.
    LinkText(String),
    /// First anchor whose visible text is exactly the given string.
    ExactText(String),
}

impl PaginationRule {
    fn matches_text(&self, text: &str) -> bool {
        match self {
            PaginationRule::Css(_) => true,
            PaginationRule::LinkText(needle) => text.contains(needle.as_str()),
            PaginationRule::ExactText(label) => text.trim() == label,
        }
    }
}

/// Which resolved addresses belong to the entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkScope {
    /// Reject addresses whose host contains any of these fragments.
    ExcludeHosts(Vec<String>),
    /// Accept only addresses containing this string.
    Require(String),
}

impl LinkScope {
    pub fn accepts(&self, address: &str) -> bool {
        match self {
            LinkScope::ExcludeHosts(fragments) => match Url::parse(address) {
                Ok(url) => {
                    let host = url.host_str().unwrap_or_default();
                    !fragments.iter().any(|f| host.contains(f.as_str()))
                }
                Err(_) => false,
            },
            LinkScope::Require(base) => address.contains(base.as_str()),
        }
    }
}

/// A consent dialog to dismiss once, right after the first page loads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsentRule {
    pub selector: String,
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionRules {
    pub extraction: Vec<ExtractionRule>,
    pub pagination: Vec<PaginationRule>,
    pub scope: LinkScope,
    pub block_markers: Vec<String>,
    pub consent: Option<ConsentRule>,
    /// Only follow next-page links on the host of the current page.
    pub same_host_pages: bool,
}

const BLOCK_MARKERS: &[&str] = &[
    "detected unusual traffic",
    "unusual traffic from your computer network",
    "/sorry/index",
];

fn block_markers() -> Vec<String> {
    BLOCK_MARKERS.iter().map(|m| m.to_string()).collect()
}

impl CollectionRules {
    pub fn for_target(mode: DiscoveryMode, target: &ScrapeTarget) -> Self {
        match mode {
            DiscoveryMode::Search => Self::news_search(),
            DiscoveryMode::Site => Self::company_site(target.base_domain.as_deref().unwrap_or_default()),
        }
    }

    pub fn news_search() -> Self {
        Self {
            extraction: vec![
                ExtractionRule::Css("a[href^='http']".to_string()),
                ExtractionRule::AllAnchors,
            ],
            pagination: vec![
                PaginationRule::Css("a#pnnext, a[aria-label='Next page']".to_string()),
                PaginationRule::ExactText("Next".to_string()),
            ],
            scope: LinkScope::ExcludeHosts(vec!["google.".to_string(), "gstatic.".to_string()]),
            block_markers: block_markers(),
            consent: Some(ConsentRule {
                selector: "button".to_string(),
                labels: vec!["Accept".to_string(), "I agree".to_string()],
            }),
            same_host_pages: true,
        }
    }

    pub fn company_site(base: &str) -> Self {
        Self {
            extraction: vec![
                ExtractionRule::Css("article a, .news-item a, li.article a".to_string()),
                ExtractionRule::AllAnchors,
            ],
            pagination: vec![
                PaginationRule::Css("a[rel=\"next\"], a.next, li.next a".to_string()),
                PaginationRule::LinkText("Next".to_string()),
            ],
            scope: LinkScope::Require(base.to_string()),
            block_markers: block_markers(),
            consent: None,
            same_host_pages: false,
        }
    }

    /// Anti-bot interstitial check on the raw page source.
    pub fn is_blocked(&self, html: &str) -> bool {
        let lower = html.to_lowercase();
        self.block_markers.iter().any(|m| lower.contains(m.as_str()))
    }

    /// Raw hrefs from the first extraction rule that yields any.
    pub async fn extract_candidates<B: BrowserSession>(
        &self,
        browser: &B,
    ) -> Result<Vec<String>, BrowserError> {
        for rule in &self.extraction {
            let hrefs: Vec<String> = browser
                .anchors(rule.selector())
                .await?
                .into_iter()
                .filter_map(|a| a.href)
                .filter(|h| !h.trim().is_empty())
                .collect();
            if !hrefs.is_empty() {
                debug!(rule = ?rule, count = hrefs.len(), "Extraction rule matched");
                return Ok(hrefs);
            }
            debug!(rule = ?rule, "Extraction rule matched nothing; relaxing");
        }
        Ok(Vec::new())
    }

    /// Next location to load, resolved against `page_url`.
    pub async fn next_location<B: BrowserSession>(
        &self,
        browser: &B,
        page_url: &str,
    ) -> Result<Option<String>, BrowserError> {
        for rule in &self.pagination {
            let selector = match rule {
                PaginationRule::Css(sel) => sel.as_str(),
                PaginationRule::LinkText(_) | PaginationRule::ExactText(_) => "a",
            };
            let next = browser
                .anchors(selector)
                .await?
                .into_iter()
                .filter(|a| rule.matches_text(&a.text))
                .filter_map(|Anchor { href, .. }| href)
                .filter_map(|href| resolve_href(page_url, &href))
                .filter(|next| !self.same_host_pages || same_host(page_url, next))
                .find(|next| next != page_url);
            if next.is_some() {
                debug!(rule = ?rule, next = ?next, "Pagination rule matched");
                return Ok(next);
            }
        }
        Ok(None)
    }
}

fn same_host(a: &str, b: &str) -> bool {
    match (Url::parse(a), Url::parse(b)) {
        (Ok(a), Ok(b)) => a.host_str() == b.host_str(),
        _ => false,
    }
}

/// Resolve `href` against the page it was found on. Only http(s) results are
/// kept; `javascript:`, `mailto:` and the like come back as `None`.
pub fn resolve_href(page_url: &str, href: &str) -> Option<String> {
    let href = href.trim();
    let resolved = match Url::parse(page_url) {
        Ok(base) => base.join(href).ok()?,
        Err(_) => Url::parse(href).ok()?,
    };
    matches!(resolved.scheme(), "http" | "https").then(|| resolved.to_string())
}
