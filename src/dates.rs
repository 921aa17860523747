//! Publication-date resolution for discovered links.
//!
//! Resolution is best effort. Many pages carry no usable date, so absence is a
//! normal result. [`DateResolver::resolve`] therefore returns an `Option` and
//! never an error; failures are logged at debug level and swallowed.
//!
//! # Lookup order
//!
//! 1. `<meta>` publication tags (Open Graph, schema.org, Dublin Core, ...)
//! 2. JSON-LD `datePublished`, including nested `@graph` entries
//! 3. The first `<time datetime="...">` element
//! 4. A date embedded in the URL path (`/2024/02/15/`, `/2024-02-15`)

use crate::browser::http::USER_AGENT;
use chrono::{DateTime, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use scraper::{Html, Selector};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument};

pub trait DateResolver {
    async fn resolve(&self, address: &str) -> Option<NaiveDate>;
}

/// Resolver used when dates are not wanted.
#[derive(Debug, Clone, Copy, Default)]
pub struct SkipDates;

impl DateResolver for SkipDates {
    async fn resolve(&self, _address: &str) -> Option<NaiveDate> {
        None
    }
}

/// Fetches each link over HTTP and inspects its metadata.
#[derive(Debug, Clone)]
pub struct HttpDateResolver {
    client: Client,
}

impl HttpDateResolver {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }

    async fn fetch(&self, address: &str) -> Result<String, reqwest::Error> {
        self.client
            .get(address)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await
    }
}

impl DateResolver for HttpDateResolver {
    #[instrument(level = "debug", skip_all, fields(%address))]
    async fn resolve(&self, address: &str) -> Option<NaiveDate> {
        match self.fetch(address).await {
            Ok(html) => {
                let date = extract_publication_date(&html, address);
                debug!(?date, "Resolved publication date");
                date
            }
            Err(e) => {
                debug!(error = %e, "Date lookup fetch failed; trying URL only");
                date_from_url(address)
            }
        }
    }
}

const META_KEYS: &[&str] = &[
    "article:published_time",
    "og:published_time",
    "datepublished",
    "pubdate",
    "publishdate",
    "date",
    "dc.date",
    "dc.date.issued",
    "sailthru.date",
    "parsely-pub-date",
];

static META_SELECTOR: Lazy<Option<Selector>> = Lazy::new(|| Selector::parse("meta[content]").ok());
static LD_JSON_SELECTOR: Lazy<Option<Selector>> =
    Lazy::new(|| Selector::parse(r#"script[type="application/ld+json"]"#).ok());
static TIME_SELECTOR: Lazy<Option<Selector>> = Lazy::new(|| Selector::parse("time[datetime]").ok());
static URL_DATE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"/(\d{4})[/-](\d{1,2})[/-](\d{1,2})(?:[/._-]|$)").ok());

/// Best publication date found in `html`, falling back to `address`.
pub fn extract_publication_date(html: &str, address: &str) -> Option<NaiveDate> {
    let document = Html::parse_document(html);
    date_from_meta(&document)
        .or_else(|| date_from_json_ld(&document))
        .or_else(|| date_from_time_tag(&document))
        .or_else(|| date_from_url(address))
}

fn date_from_meta(document: &Html) -> Option<NaiveDate> {
    let selector = META_SELECTOR.as_ref()?;
    let mut best: Option<(usize, NaiveDate)> = None;
    for el in document.select(selector) {
        let attrs = el.value();
        let key = attrs
            .attr("property")
            .or_else(|| attrs.attr("name"))
            .or_else(|| attrs.attr("itemprop"))
            .map(str::to_lowercase);
        let Some(rank) = key.and_then(|k| META_KEYS.iter().position(|m| *m == k)) else {
            continue;
        };
        let Some(date) = attrs.attr("content").and_then(parse_date) else {
            continue;
        };
        if best.is_none_or(|(r, _)| rank < r) {
            best = Some((rank, date));
        }
    }
    best.map(|(_, date)| date)
}

fn date_from_json_ld(document: &Html) -> Option<NaiveDate> {
    let selector = LD_JSON_SELECTOR.as_ref()?;
    document
        .select(selector)
        .filter_map(|el| serde_json::from_str::<Value>(&el.text().collect::<String>()).ok())
        .find_map(|value| find_date_published(&value))
}

fn find_date_published(value: &Value) -> Option<NaiveDate> {
    match value {
        Value::Object(map) => map
            .get("datePublished")
            .and_then(Value::as_str)
            .and_then(parse_date)
            .or_else(|| map.values().find_map(find_date_published)),
        Value::Array(items) => items.iter().find_map(find_date_published),
        _ => None,
    }
}

fn date_from_time_tag(document: &Html) -> Option<NaiveDate> {
    let selector = TIME_SELECTOR.as_ref()?;
    document
        .select(selector)
        .filter_map(|el| el.value().attr("datetime"))
        .find_map(parse_date)
}

/// Date embedded in a URL path, e.g. `/2024/02/15/slug`.
pub fn date_from_url(address: &str) -> Option<NaiveDate> {
    let caps = URL_DATE.as_ref()?.captures(address)?;
    let y = caps.get(1)?.as_str().parse().ok()?;
    let m = caps.get(2)?.as_str().parse().ok()?;
    let d = caps.get(3)?.as_str().parse().ok()?;
    NaiveDate::from_ymd_opt(y, m, d)
}

/// Parse the date part of the timestamp formats commonly found in article
/// metadata.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.date_naive());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.date_naive());
    }
    let head = raw.get(..10)?;
    NaiveDate::parse_from_str(head, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(head, "%Y/%m/%d"))
        .ok()
}
