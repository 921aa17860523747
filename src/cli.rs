//! Command-line interface definitions.
//!
//! Every option can also be supplied through an environment variable, which
//! is how scheduled runs are usually configured.

use crate::engine::rules::DiscoveryMode;
use crate::outputs::OutputFormat;
use chrono::NaiveDate;
use clap::{Parser, ValueEnum};

/// Which browser backend drives the sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Engine {
    /// Chromium via the DevTools protocol.
    Chrome,
    /// Plain HTTP fetches, no JavaScript.
    Http,
}

/// Command-line arguments.
///
/// # Examples
///
/// ```sh
/// # News search for two companies, last quarter of 2024
/// news_link_harvester --companies apple_inc,amd --start-date 2024-10-01 --end-date 2024-12-31
///
/// # Company newsrooms from a registry, with publication-date filtering
/// news_link_harvester --mode site --registry companies.csv --companies acme \
///     --start-date 01-10-2024 --end-date 03-15-2024 --max-pages 2
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Comma-separated company ids (e.g. apple_inc,amd)
    #[arg(short, long, env = "COMPANY_IDS")]
    pub companies: String,

    /// Where links come from
    #[arg(long, value_enum, env = "HARVEST_MODE", default_value = "search")]
    pub mode: DiscoveryMode,

    /// Company registry CSV (`company_id,base_url`), used in site mode
    #[arg(long, env = "COMPANY_REGISTRY", default_value = "companies.csv")]
    pub registry: String,

    /// First publication date to keep (YYYY-MM-DD or MM-DD-YYYY)
    #[arg(long, env = "START_DATE", value_parser = parse_cli_date, requires = "end_date")]
    pub start_date: Option<NaiveDate>,

    /// Last publication date to keep (YYYY-MM-DD or MM-DD-YYYY)
    #[arg(long, env = "END_DATE", value_parser = parse_cli_date, requires = "start_date")]
    pub end_date: Option<NaiveDate>,

    /// Maximum result pages per company
    #[arg(long, env = "MAX_PAGES", default_value_t = 5, value_parser = clap::value_parser!(u32).range(1..))]
    pub max_pages: u32,

    /// Page load timeout in seconds
    #[arg(short, long, env = "PAGE_TIMEOUT", default_value_t = 15, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: u64,

    /// Pause after scrolling each page, in milliseconds
    #[arg(long, env = "SETTLE_MS", default_value_t = 1500)]
    pub settle_ms: u64,

    /// Browser backend
    #[arg(long, value_enum, env = "HARVEST_ENGINE", default_value = "chrome")]
    pub engine: Engine,

    /// Show the browser window instead of running headless
    #[arg(long)]
    pub headful: bool,

    /// Attach to a running Chrome instead of launching one
    #[arg(long, env = "CHROMIUM_REMOTE_DEBUGGING_URL")]
    pub chrome_url: Option<String>,

    /// Resolve publication dates in search mode too (always on in site mode)
    #[arg(long)]
    pub resolve_dates: bool,

    /// Directory for the export file
    #[arg(short, long, env = "OUTPUT_DIR", default_value = "output")]
    pub output_dir: String,

    /// Export format
    #[arg(short, long, value_enum, env = "OUTPUT_FORMAT", default_value = "csv")]
    pub format: OutputFormat,
}

impl Cli {
    /// Dates are resolved per link only when they will be used.
    pub fn wants_dates(&self) -> bool {
        self.mode == DiscoveryMode::Site || self.resolve_dates
    }
}

/// Accept both ISO dates and the US `MM-DD-YYYY` form.
pub fn parse_cli_date(raw: &str) -> Result<NaiveDate, String> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%m-%d-%Y"))
        .map_err(|_| format!("invalid date `{raw}`; use YYYY-MM-DD or MM-DD-YYYY"))
}
