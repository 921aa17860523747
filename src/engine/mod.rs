//! The paginated collection engine.
//!
//! [`collect`] runs one entity's session to exactly one terminal state:
//!
//! ```text
//! LOADING -> EXTRACTING -> DECIDING_NEXT -> LOADING | DONE
//!    |            |
//!    +------------+--> ABORTED (load-failure, blocked)
//! ```
//!
//! The browser is launched when the session starts and closed when it ends,
//! whatever the terminal state. Links collected before an abort are kept.

pub mod rules;
pub mod session;

use crate::browser::{BrowserError, BrowserLauncher, BrowserSession};
use crate::dates::DateResolver;
use crate::models::{DiscoveredLink, ScrapeOutcome, ScrapeTarget, TerminalReason};
use rand::{Rng, rng};
use rules::{CollectionRules, resolve_href};
use session::SessionState;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

/// Knobs shared by every session in a batch.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Upper bound on page loads per entity (at least 1).
    pub max_pages: u32,
    /// Budget for a page to load and become ready.
    pub page_timeout: Duration,
    /// Pause after scrolling so lazy results render. Zero disables it.
    pub settle: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_pages: 5,
            page_timeout: Duration::from_secs(15),
            settle: Duration::from_millis(1500),
        }
    }
}

/// Collect links for one target.
///
/// Only a failure to launch the browser is returned as an error; every other
/// failure ends up as the outcome's terminal reason.
#[instrument(level = "info", skip_all, fields(entity = %target.entity_id))]
pub async fn collect<L, R>(
    launcher: &L,
    resolver: &R,
    target: &ScrapeTarget,
    rules: &CollectionRules,
    settings: &EngineSettings,
) -> Result<ScrapeOutcome, BrowserError>
where
    L: BrowserLauncher,
    R: DateResolver,
{
    let Some(seed) = target.seed.clone() else {
        warn!("No seed location; skipping");
        return Ok(ScrapeOutcome::unresolved(&target.entity_id));
    };

    let mut browser = launcher.launch().await?;
    let mut state = SessionState::new(seed);
    let reason = run_session(&mut browser, resolver, target, rules, settings, &mut state).await;
    if let Err(e) = browser.close().await {
        warn!(error = %e, "Browser did not shut down cleanly");
    }

    let outcome = state.finish(&target.entity_id, reason);
    info!(
        links = outcome.links.len(),
        pages = outcome.pages_loaded,
        reason = %outcome.reason,
        "Session finished"
    );
    Ok(outcome)
}

async fn run_session<B, R>(
    browser: &mut B,
    resolver: &R,
    target: &ScrapeTarget,
    rules: &CollectionRules,
    settings: &EngineSettings,
    state: &mut SessionState,
) -> TerminalReason
where
    B: BrowserSession,
    R: DateResolver,
{
    loop {
        // LOADING
        let page = state.begin_load();
        let location = state.location().to_string();
        if let Err(e) = browser.navigate(&location, settings.page_timeout).await {
            warn!(page, %location, error = %e, "Page load failed; aborting session");
            return TerminalReason::LoadFailure;
        }
        let page_url = match browser.current_location().await {
            Ok(url) if !url.is_empty() => url,
            _ => location.clone(),
        };

        if page == 1 {
            dismiss_consent(browser, rules).await;
        }

        let html = match browser.content().await {
            Ok(html) => html,
            Err(e) => {
                warn!(page, %location, error = %e, "Could not read page; aborting session");
                return TerminalReason::LoadFailure;
            }
        };
        if rules.is_blocked(&html) {
            warn!(page, %location, "Anti-bot interstitial detected; stopping");
            return TerminalReason::Blocked;
        }

        // EXTRACTING
        settle(browser, settings).await;
        match extract_page(browser, resolver, target, rules, &page_url, state).await {
            Ok(added) => info!(page, added, total = state.link_count(), "Page extracted"),
            Err(e) => {
                warn!(page, error = %e, "Extraction failed; ending session");
                return TerminalReason::PaginationExhausted;
            }
        }

        // DECIDING_NEXT
        match rules.next_location(browser, &page_url).await {
            Ok(Some(next)) if page >= settings.max_pages => {
                debug!(page, max = settings.max_pages, %next, "Page limit reached");
                return TerminalReason::PageLimitReached;
            }
            Ok(Some(next)) => {
                debug!(page, %next, "Following next page");
                state.advance(next);
            }
            Ok(None) => {
                info!(page, "No more pages");
                return TerminalReason::PaginationExhausted;
            }
            Err(e) => {
                warn!(page, error = %e, "Pagination lookup failed; treating as last page");
                return TerminalReason::PaginationExhausted;
            }
        }
    }
}

async fn extract_page<B, R>(
    browser: &B,
    resolver: &R,
    target: &ScrapeTarget,
    rules: &CollectionRules,
    page_url: &str,
    state: &mut SessionState,
) -> Result<usize, BrowserError>
where
    B: BrowserSession,
    R: DateResolver,
{
    let candidates = rules.extract_candidates(browser).await?;
    let mut added = 0;
    for href in candidates {
        let Some(address) = resolve_href(page_url, &href) else {
            continue;
        };
        if !rules.scope.accepts(&address) || !state.record(&address) {
            continue;
        }
        let date = resolver.resolve(&address).await;
        debug!(%address, ?date, "Captured link");
        state.push(DiscoveredLink {
            entity_id: target.entity_id.clone(),
            address,
            date,
        });
        added += 1;
    }
    Ok(added)
}

async fn dismiss_consent<B: BrowserSession>(browser: &B, rules: &CollectionRules) {
    let Some(consent) = &rules.consent else {
        return;
    };
    let labels: Vec<&str> = consent.labels.iter().map(String::as_str).collect();
    match browser.click_with_text(&consent.selector, &labels).await {
        Ok(true) => info!("Cookie consent accepted"),
        Ok(false) => debug!("No cookie consent dialog"),
        Err(e) => debug!(error = %e, "Cookie consent click failed"),
    }
}

async fn settle<B: BrowserSession>(browser: &B, settings: &EngineSettings) {
    if let Err(e) = browser.scroll_to_bottom().await {
        debug!(error = %e, "Scroll failed");
    }
    if settings.settle.is_zero() {
        return;
    }
    let jitter_ms: u64 = rng().random_range(0..=250);
    sleep(settings.settle + Duration::from_millis(jitter_ms)).await;
}

#[cfg(test)]
mod tests {
    use super::rules::{ExtractionRule, PaginationRule};
    use super::*;
    use crate::browser::fake::FakeBrowser;
    use crate::dates::SkipDates;
    use crate::models::ScrapeTarget;
    use chrono::NaiveDate;
    use std::collections::HashSet;

    const SEED: &str = "https://acme.com/news";

    fn settings(max_pages: u32) -> EngineSettings {
        EngineSettings {
            max_pages,
            page_timeout: Duration::from_secs(1),
            settle: Duration::ZERO,
        }
    }

    fn site_target() -> ScrapeTarget {
        ScrapeTarget::site("acme", Some(SEED))
    }

    fn site_rules() -> CollectionRules {
        CollectionRules::company_site(SEED)
    }

    /// Resolver that dates every link from a fixed table.
    struct TableDates(Vec<(&'static str, NaiveDate)>);

    impl DateResolver for TableDates {
        async fn resolve(&self, address: &str) -> Option<NaiveDate> {
            self.0.iter().find(|(a, _)| *a == address).map(|(_, d)| *d)
        }
    }

    #[tokio::test]
    async fn test_single_page_without_next() {
        let browser = FakeBrowser::new().page(
            SEED,
            r#"<article><a href="/news/a">A</a></article>
               <article><a href="/news/b">B</a></article>
               <article><a href="https://acme.com/news/c">C</a></article>"#,
        );

        let outcome = collect(&browser, &SkipDates, &site_target(), &site_rules(), &settings(5))
            .await
            .unwrap();

        assert_eq!(outcome.links.len(), 3);
        assert_eq!(outcome.reason, TerminalReason::PaginationExhausted);
        assert_eq!(outcome.links[0].address, "https://acme.com/news/a");
        assert_eq!(browser.launches(), 1);
        assert_eq!(browser.closes(), 1);
    }

    #[tokio::test]
    async fn test_duplicates_across_pages_are_suppressed() {
        let browser = FakeBrowser::new()
            .page(
                SEED,
                r#"<article><a href="/news/a">A</a></article>
                   <article><a href="/news/b">B</a></article>
                   <a rel="next" href="/news?page=2">Next</a>"#,
            )
            .page(
                "https://acme.com/news?page=2",
                r#"<article><a href="/news/c">C</a></article>
                   <article><a href="/news/a">A again</a></article>"#,
            );

        let outcome = collect(&browser, &SkipDates, &site_target(), &site_rules(), &settings(5))
            .await
            .unwrap();

        let addresses: Vec<_> = outcome.links.iter().map(|l| l.address.as_str()).collect();
        assert_eq!(
            addresses,
            vec!["https://acme.com/news/a", "https://acme.com/news/b", "https://acme.com/news/c"]
        );
        assert_eq!(outcome.pages_loaded, 2);
        assert_eq!(outcome.reason, TerminalReason::PaginationExhausted);
        let unique: HashSet<_> = addresses.iter().collect();
        assert_eq!(unique.len(), addresses.len());
    }

    #[tokio::test]
    async fn test_block_marker_yields_no_links() {
        let browser = FakeBrowser::new().page(
            SEED,
            r#"<p>Our systems have detected unusual traffic from your computer network.</p>
               <article><a href="/news/a">A</a></article>"#,
        );

        let outcome = collect(&browser, &SkipDates, &site_target(), &site_rules(), &settings(5))
            .await
            .unwrap();

        assert!(outcome.links.is_empty());
        assert_eq!(outcome.reason, TerminalReason::Blocked);
        assert_eq!(browser.closes(), 1);
    }

    #[tokio::test]
    async fn test_block_on_later_page_keeps_earlier_links() {
        let browser = FakeBrowser::new()
            .page(
                SEED,
                r#"<article><a href="/news/a">A</a></article>
                   <a class="next" href="/news?page=2">Older</a>"#,
            )
            .page("https://acme.com/news?page=2", "<p>Detected unusual traffic</p>");

        let outcome = collect(&browser, &SkipDates, &site_target(), &site_rules(), &settings(5))
            .await
            .unwrap();

        assert_eq!(outcome.links.len(), 1);
        assert_eq!(outcome.reason, TerminalReason::Blocked);
    }

    #[tokio::test]
    async fn test_unresolved_target_never_launches() {
        let browser = FakeBrowser::new();
        let target = ScrapeTarget::unresolved("ghost");

        let outcome = collect(&browser, &SkipDates, &target, &site_rules(), &settings(5))
            .await
            .unwrap();

        assert!(outcome.links.is_empty());
        assert_eq!(outcome.reason, TerminalReason::TargetUnresolved);
        assert_eq!(outcome.pages_loaded, 0);
        assert_eq!(browser.launches(), 0);
    }

    #[tokio::test]
    async fn test_load_failure_preserves_partial_results() {
        let browser = FakeBrowser::new().page(
            SEED,
            r#"<article><a href="/news/a">A</a></article>
               <a rel="next" href="/news?page=2">Next</a>"#,
        );

        let outcome = collect(&browser, &SkipDates, &site_target(), &site_rules(), &settings(5))
            .await
            .unwrap();

        assert_eq!(outcome.links.len(), 1);
        assert_eq!(outcome.reason, TerminalReason::LoadFailure);
        assert_eq!(browser.closes(), 1);
    }

    #[tokio::test]
    async fn test_page_limit_bounds_loads() {
        // Every page links to a fresh next page; only the limit stops the loop.
        let mut browser = FakeBrowser::new();
        for n in 1..=10 {
            let location = if n == 1 {
                SEED.to_string()
            } else {
                format!("{SEED}?page={n}")
            };
            let html = format!(
                r#"<article><a href="/news/item-{n}">item</a></article>
                   <a rel="next" href="/news?page={}">Next</a>"#,
                n + 1
            );
            browser = browser.page(&location, &html);
        }

        for max in [1, 3] {
            let before = browser.navigations().len();
            let outcome = collect(&browser, &SkipDates, &site_target(), &site_rules(), &settings(max))
                .await
                .unwrap();
            let loads = browser.navigations().len() - before;
            assert_eq!(loads as u32, max);
            assert_eq!(outcome.pages_loaded, max);
            assert_eq!(outcome.links.len() as u32, max);
            assert_eq!(outcome.reason, TerminalReason::PageLimitReached);
        }
    }

    #[tokio::test]
    async fn test_fallback_rule_used_when_preferred_matches_nothing() {
        let browser = FakeBrowser::new().page(
            SEED,
            r#"<ul><li><a href="/news/plain-1">One</a></li>
                   <li><a href="/news/plain-2">Two</a></li>
                   <li><a href="https://elsewhere.org/x">Off-site</a></li></ul>"#,
        );

        let outcome = collect(&browser, &SkipDates, &site_target(), &site_rules(), &settings(5))
            .await
            .unwrap();

        assert_eq!(outcome.links.len(), 2);
        assert!(outcome.links.iter().all(|l| l.address.starts_with(SEED)));
    }

    #[tokio::test]
    async fn test_link_text_pagination_fallback() {
        let browser = FakeBrowser::new()
            .page(
                SEED,
                r#"<article><a href="/news/a">A</a></article>
                   <a href="/news/archive/2">Next page &raquo;</a>"#,
            )
            .page(
                "https://acme.com/news/archive/2",
                r#"<article><a href="/news/b">B</a></article>"#,
            );

        let outcome = collect(&browser, &SkipDates, &site_target(), &site_rules(), &settings(5))
            .await
            .unwrap();

        assert_eq!(outcome.links.len(), 2);
        assert_eq!(outcome.pages_loaded, 2);
    }

    #[tokio::test]
    async fn test_search_mode_skips_search_engine_links() {
        let seed = "https://www.google.com/search?q=amd&tbm=nws";
        let target = ScrapeTarget {
            entity_id: "amd".to_string(),
            seed: Some(seed.to_string()),
            base_domain: None,
        };
        let browser = FakeBrowser::new().page(
            seed,
            r#"<button>Accept all</button>
               <a href="https://www.reuters.com/amd-1">Reuters</a>
               <a href="https://www.google.com/preferences">Settings</a>
               <a href="https://apnews.com/amd-2">AP</a>
               <a href="/search?q=amd&tbm=nws&start=10" id="pnnext">Next</a>"#,
        );

        let outcome = collect(
            &browser,
            &SkipDates,
            &target,
            &CollectionRules::news_search(),
            &settings(1),
        )
        .await
        .unwrap();

        let addresses: Vec<_> = outcome.links.iter().map(|l| l.address.as_str()).collect();
        assert_eq!(addresses, vec!["https://www.reuters.com/amd-1", "https://apnews.com/amd-2"]);
        assert_eq!(outcome.reason, TerminalReason::PageLimitReached);
    }

    #[tokio::test]
    async fn test_search_mode_does_not_follow_headlines_as_pagination() {
        let seed = "https://www.google.com/search?q=amd&tbm=nws";
        let target = ScrapeTarget {
            entity_id: "amd".to_string(),
            seed: Some(seed.to_string()),
            base_domain: None,
        };
        // Last results page: no #pnnext, a headline containing "Next" and an
        // off-host anchor labelled exactly "Next".
        let browser = FakeBrowser::new()
            .page(
                seed,
                r#"<a href="https://www.reuters.com/amd-next-gen">AMD unveils Next-gen chips</a>
                   <a href="https://spam.example/more">Next</a>"#,
            )
            .page(
                "https://www.reuters.com/amd-next-gen",
                r#"<a href="https://www.reuters.com/about">About</a>
                   <a href="https://twitter.com/reuters">Twitter</a>
                   <a href="https://www.reuters.com/careers">Careers</a>"#,
            )
            .page("https://spam.example/more", r#"<a href="https://spam.example/x">x</a>"#);

        let outcome = collect(
            &browser,
            &SkipDates,
            &target,
            &CollectionRules::news_search(),
            &settings(5),
        )
        .await
        .unwrap();

        assert_eq!(browser.navigations(), vec![seed.to_string()]);
        let addresses: Vec<_> = outcome.links.iter().map(|l| l.address.as_str()).collect();
        assert_eq!(
            addresses,
            vec!["https://www.reuters.com/amd-next-gen", "https://spam.example/more"]
        );
        assert_eq!(outcome.pages_loaded, 1);
        assert_eq!(outcome.reason, TerminalReason::PaginationExhausted);
    }

    #[tokio::test]
    async fn test_search_mode_follows_exact_next_on_same_host() {
        let seed = "https://www.google.com/search?q=amd&tbm=nws";
        let target = ScrapeTarget {
            entity_id: "amd".to_string(),
            seed: Some(seed.to_string()),
            base_domain: None,
        };
        let browser = FakeBrowser::new()
            .page(
                seed,
                r#"<a href="https://www.reuters.com/amd-1">Reuters</a>
                   <a href="/search?q=amd&tbm=nws&start=10"> Next </a>"#,
            )
            .page(
                "https://www.google.com/search?q=amd&tbm=nws&start=10",
                r#"<a href="https://apnews.com/amd-2">AP</a>"#,
            );

        let outcome = collect(
            &browser,
            &SkipDates,
            &target,
            &CollectionRules::news_search(),
            &settings(5),
        )
        .await
        .unwrap();

        assert_eq!(outcome.pages_loaded, 2);
        assert_eq!(outcome.links.len(), 2);
        assert_eq!(outcome.reason, TerminalReason::PaginationExhausted);
    }

    #[tokio::test]
    async fn test_extraction_error_keeps_earlier_pages() {
        // The fallback selector is malformed, so page 2 (which needs it) fails.
        let rules = CollectionRules {
            extraction: vec![
                ExtractionRule::Css("article a".to_string()),
                ExtractionRule::Css("a[".to_string()),
            ],
            pagination: vec![PaginationRule::Css("a[rel=\"next\"]".to_string())],
            ..site_rules()
        };
        let browser = FakeBrowser::new()
            .page(
                SEED,
                r#"<article><a href="/news/a">A</a></article>
                   <article><a href="/news/b">B</a></article>
                   <a rel="next" href="/news?page=2">Next</a>"#,
            )
            .page("https://acme.com/news?page=2", "<p>Nothing listed</p>");

        let outcome = collect(&browser, &SkipDates, &site_target(), &rules, &settings(5))
            .await
            .unwrap();

        assert_eq!(outcome.links.len(), 2);
        assert_eq!(outcome.pages_loaded, 2);
        assert_eq!(outcome.reason, TerminalReason::PaginationExhausted);
        assert_eq!(browser.closes(), 1);
    }

    #[tokio::test]
    async fn test_pagination_error_ends_session_with_links() {
        let rules = CollectionRules {
            pagination: vec![PaginationRule::Css("a[".to_string())],
            ..site_rules()
        };
        let browser = FakeBrowser::new().page(
            SEED,
            r#"<article><a href="/news/a">A</a></article>
               <a rel="next" href="/news?page=2">Next</a>"#,
        );

        let outcome = collect(&browser, &SkipDates, &site_target(), &rules, &settings(5))
            .await
            .unwrap();

        assert_eq!(outcome.links.len(), 1);
        assert_eq!(outcome.pages_loaded, 1);
        assert_eq!(outcome.reason, TerminalReason::PaginationExhausted);
        assert_eq!(browser.navigations().len(), 1);
        assert_eq!(browser.closes(), 1);
    }

    #[tokio::test]
    async fn test_last_page_at_limit_is_exhausted() {
        let browser = FakeBrowser::new().page(SEED, r#"<article><a href="/news/a">A</a></article>"#);

        let outcome = collect(&browser, &SkipDates, &site_target(), &site_rules(), &settings(1))
            .await
            .unwrap();

        assert_eq!(outcome.pages_loaded, 1);
        assert_eq!(outcome.reason, TerminalReason::PaginationExhausted);
    }

    #[tokio::test]
    async fn test_dates_resolved_inline_and_absence_keeps_link() {
        let browser = FakeBrowser::new().page(
            SEED,
            r#"<article><a href="/news/dated">A</a></article>
               <article><a href="/news/undated">B</a></article>"#,
        );
        let dates = TableDates(vec![(
            "https://acme.com/news/dated",
            NaiveDate::from_ymd_opt(2024, 2, 15).unwrap(),
        )]);

        let outcome = collect(&browser, &dates, &site_target(), &site_rules(), &settings(5))
            .await
            .unwrap();

        assert_eq!(outcome.links.len(), 2);
        assert_eq!(outcome.links[0].date, NaiveDate::from_ymd_opt(2024, 2, 15));
        assert_eq!(outcome.links[1].date, None);
    }

    #[tokio::test]
    async fn test_launch_failure_propagates() {
        let browser = FakeBrowser::new().failing_launch();
        let result = collect(&browser, &SkipDates, &site_target(), &site_rules(), &settings(5)).await;
        assert!(matches!(result, Err(BrowserError::Launch(_))));
    }
}
