//! # News Link Harvester
//!
//! Collects news-article links for a list of companies by driving a browser
//! across paginated result pages, then exports them as CSV or JSON.
//!
//! ## Features
//!
//! - Two discovery modes: news search results (`search`) or each company's
//!   own newsroom listed in a registry file (`site`)
//! - Per-company deduplication across result pages
//! - Stops a company's session on anti-bot interstitials, load failures, the
//!   last page or the page limit, keeping everything collected so far
//! - Optional publication-date resolution and inclusive date-window filtering
//! - Chromium (`chromiumoxide`) or plain HTTP backends
//!
//! ## Usage
//!
//! ```sh
//! news_link_harvester --companies apple_inc,amd --start-date 2024-01-10 --end-date 2024-03-15
//! ```
//!
//! ## Architecture
//!
//! 1. **Targets**: build one target per company id (search URL or registry base URL)
//! 2. **Collection**: one browser session per company, strictly one after another
//! 3. **Filtering**: keep links dated inside the window, when dates were resolved
//! 4. **Output**: write the rows, with placeholder rows for companies without results

use chrono::{Local, Utc};
use clap::Parser;
use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod batch;
mod browser;
mod cli;
mod dates;
mod engine;
mod filter;
mod models;
mod outputs;
mod targets;
mod utils;

use batch::{BatchSettings, export_rows, log_summary, run_batch};
use browser::{BrowserError, BrowserLauncher, ChromeLauncher, HttpLauncher};
use cli::{Cli, Engine};
use dates::{HttpDateResolver, SkipDates};
use engine::EngineSettings;
use engine::rules::DiscoveryMode;
use models::{DateWindow, ScrapeOutcome, ScrapeTarget};
use outputs::json::ExportDocument;
use outputs::{OutputFormat, export_file_name};
use targets::{CompanyRegistry, build_targets, parse_company_ids};
use utils::ensure_writable_dir;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("news_link_harvester starting up");

    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    let window = match (args.start_date, args.end_date) {
        (Some(start), Some(end)) => Some(DateWindow::new(start, end)?),
        _ => None,
    };

    let ids = parse_company_ids(&args.companies);
    if ids.is_empty() {
        error!(raw = %args.companies, "No company ids given");
        return Err("no company ids given".into());
    }

    // Early check: fail before any browser comes up
    let output_dir = PathBuf::from(&args.output_dir);
    if let Err(e) = ensure_writable_dir(&output_dir).await {
        error!(
            path = %output_dir.display(),
            error = %e,
            "Output directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }

    let registry = match args.mode {
        DiscoveryMode::Site => Some(CompanyRegistry::load(&args.registry)?),
        DiscoveryMode::Search => None,
    };
    let targets = build_targets(&ids, args.mode, window.as_ref(), registry.as_ref());
    info!(companies = targets.len(), mode = ?args.mode, engine = ?args.engine, "Targets ready");

    let settings = BatchSettings {
        mode: args.mode,
        engine: EngineSettings {
            max_pages: args.max_pages,
            page_timeout: Duration::from_secs(args.timeout),
            settle: Duration::from_millis(args.settle_ms),
        },
    };

    // ---- Collect ----
    let outcomes = match args.engine {
        Engine::Chrome => {
            let launcher = ChromeLauncher {
                headless: !args.headful,
                remote_url: args.chrome_url.clone(),
                ..ChromeLauncher::default()
            };
            harvest(&launcher, args.wants_dates(), &targets, &settings).await?
        }
        Engine::Http => harvest(&HttpLauncher, args.wants_dates(), &targets, &settings).await?,
    };
    log_summary(&outcomes);

    // ---- Filter ----
    // Search mode without resolved dates already got its window from the search engine.
    let filter_window = window.as_ref().filter(|_| args.wants_dates());
    let export = export_rows(&outcomes, filter_window);
    if let Some(counts) = export.counts {
        info!(
            total = counts.total,
            in_range = counts.in_range,
            out_of_range = counts.out_of_range,
            undated = counts.undated,
            "Scraping summary"
        );
    }

    // ---- Output ----
    let file_name = export_file_name(window.as_ref(), Local::now().naive_local(), args.format);
    let path = output_dir.join(file_name);
    match args.format {
        OutputFormat::Csv => outputs::csv::write_rows(&export.rows, &path)?,
        OutputFormat::Json => {
            let doc = ExportDocument::new(
                Utc::now().to_rfc3339(),
                window.as_ref(),
                export.counts,
                &outcomes,
                &export.rows,
            );
            outputs::json::write_document(&doc, &path).await?;
        }
    }
    info!(rows = export.rows.len(), path = %path.display(), "Export saved");

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );

    Ok(())
}

/// Run the batch with the date resolver the run needs.
#[instrument(level = "info", skip_all, fields(resolve_dates = resolve_dates))]
async fn harvest<L: BrowserLauncher>(
    launcher: &L,
    resolve_dates: bool,
    targets: &[ScrapeTarget],
    settings: &BatchSettings,
) -> Result<Vec<ScrapeOutcome>, BrowserError> {
    if resolve_dates {
        let resolver = HttpDateResolver::new(settings.engine.page_timeout)?;
        run_batch(launcher, &resolver, targets, settings).await
    } else {
        run_batch(launcher, &SkipDates, targets, settings).await
    }
}
