//! Anchor queries over a static HTML document.
//!
//! Shared by the HTTP backend and the test browser so both answer selector
//! queries exactly like a rendered DOM would for non-JS pages.

use super::{Anchor, BrowserError};
use scraper::{Html, Selector};

fn parse_selector(selector: &str) -> Result<Selector, BrowserError> {
    Selector::parse(selector).map_err(|e| BrowserError::Selector(format!("{selector}: {e}")))
}

/// Anchors matching `selector` in document order.
pub fn select_anchors(html: &str, selector: &str) -> Result<Vec<Anchor>, BrowserError> {
    let selector = parse_selector(selector)?;
    let document = Html::parse_document(html);
    let anchors = document
        .select(&selector)
        .map(|el| Anchor {
            href: el.value().attr("href").map(str::to_string),
            text: el.text().collect::<Vec<_>>().join(" ").trim().to_string(),
        })
        .collect();
    Ok(anchors)
}

/// Whether an element matching `selector` has text containing one of `needles`.
pub fn has_text_match(html: &str, selector: &str, needles: &[&str]) -> Result<bool, BrowserError> {
    let selector = parse_selector(selector)?;
    let document = Html::parse_document(html);
    let found = document.select(&selector).any(|el| {
        let text = el.text().collect::<String>();
        needles.iter().any(|n| text.contains(n))
    });
    Ok(found)
}
