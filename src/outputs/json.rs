//! JSON export.
//!
//! The document carries the rows plus enough run metadata (window, filter
//! counters, per-entity terminal reasons) to audit a run afterwards.

use crate::filter::FilterCounts;
use crate::models::{DateWindow, ExportRow, ScrapeOutcome, TerminalReason};
use serde::Serialize;
use std::error::Error;
use std::path::Path;
use tokio::fs;
use tracing::{error, info, instrument};

#[derive(Debug, Serialize)]
pub struct EntityStatus<'a> {
    pub entity_id: &'a str,
    pub links: usize,
    pub pages_loaded: u32,
    pub reason: TerminalReason,
}

#[derive(Debug, Serialize)]
pub struct ExportDocument<'a> {
    pub generated_at: String,
    pub window: Option<&'a DateWindow>,
    pub counts: Option<FilterCounts>,
    pub entities: Vec<EntityStatus<'a>>,
    pub rows: &'a [ExportRow],
}

impl<'a> ExportDocument<'a> {
    pub fn new(
        generated_at: String,
        window: Option<&'a DateWindow>,
        counts: Option<FilterCounts>,
        outcomes: &'a [ScrapeOutcome],
        rows: &'a [ExportRow],
    ) -> Self {
        let entities = outcomes
            .iter()
            .map(|o| EntityStatus {
                entity_id: &o.entity_id,
                links: o.links.len(),
                pages_loaded: o.pages_loaded,
                reason: o.reason,
            })
            .collect();
        Self {
            generated_at,
            window,
            counts,
            entities,
            rows,
        }
    }
}

/// Serialize `doc` to `path`, creating the parent directory when needed.
#[instrument(level = "info", skip_all, fields(path = %path.display(), rows = doc.rows.len()))]
pub async fn write_document(doc: &ExportDocument<'_>, path: &Path) -> Result<(), Box<dyn Error>> {
    let json = serde_json::to_string_pretty(doc)?;

    if let Some(dir) = path.parent() {
        if let Err(e) = fs::create_dir_all(dir).await {
            error!(dir = %dir.display(), error = %e, "Failed to create JSON dir");
            return Err(e.into());
        }
    }

    fs::write(path, json).await?;
    info!("Wrote JSON export");
    Ok(())
}
