//! Export writers for harvested rows.
//!
//! # Submodules
//!
//! - [`csv`]: one row per link, `entity_id,link,date` header
//! - [`json`]: the same rows plus run metadata, pretty-printed
//!
//! # Output Structure
//!
//! ```text
//! output_dir/
//! ├── news_links_2024-01-10_to_2024-03-15_2024-03-20_09-41-07.csv
//! └── news_links_2024-03-20_09-41-07.json   # no date window
//! ```

pub mod csv;
pub mod json;

use crate::models::DateWindow;
use chrono::NaiveDateTime;
use clap::ValueEnum;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Csv,
    Json,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Json => "json",
        }
    }
}

/// Timestamped export file name, carrying the window when there is one.
pub fn export_file_name(window: Option<&DateWindow>, now: NaiveDateTime, format: OutputFormat) -> String {
    let stamp = now.format("%Y-%m-%d_%H-%M-%S");
    match window {
        Some(w) => format!(
            "news_links_{}_to_{}_{}.{}",
            w.start,
            w.end,
            stamp,
            format.extension()
        ),
        None => format!("news_links_{}.{}", stamp, format.extension()),
    }
}
