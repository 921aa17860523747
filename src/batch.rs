//! Sequential batch orchestration and export-row assembly.
//!
//! Entities are processed strictly one after another, each with its own
//! browser session. A browser that cannot be launched aborts the batch; every
//! other per-entity failure is recorded in that entity's outcome and the
//! batch moves on.

use crate::browser::{BrowserError, BrowserLauncher};
use crate::dates::DateResolver;
use crate::engine::rules::{CollectionRules, DiscoveryMode};
use crate::engine::{EngineSettings, collect};
use crate::filter::{FilterCounts, filter_by_window};
use crate::models::{DateWindow, ExportRow, ScrapeOutcome, ScrapeTarget, TerminalReason};
use tracing::{info, instrument};

pub const NO_TARGET_PLACEHOLDER: &str = "news path not available";
pub const NO_RESULTS_PLACEHOLDER: &str = "no news found";

#[derive(Debug, Clone)]
pub struct BatchSettings {
    pub mode: DiscoveryMode,
    pub engine: EngineSettings,
}

/// Run every target in order and return one outcome per target.
#[instrument(level = "info", skip_all, fields(targets = targets.len(), mode = ?settings.mode))]
pub async fn run_batch<L, R>(
    launcher: &L,
    resolver: &R,
    targets: &[ScrapeTarget],
    settings: &BatchSettings,
) -> Result<Vec<ScrapeOutcome>, BrowserError>
where
    L: BrowserLauncher,
    R: DateResolver,
{
    let mut outcomes = Vec::with_capacity(targets.len());
    for (i, target) in targets.iter().enumerate() {
        info!(index = i + 1, of = targets.len(), entity = %target.entity_id, "Processing entity");
        let rules = CollectionRules::for_target(settings.mode, target);
        let outcome = collect(launcher, resolver, target, &rules, &settings.engine).await?;
        outcomes.push(outcome);
    }
    Ok(outcomes)
}

/// Rows ready for export, plus filter counters when a window was applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSet {
    pub rows: Vec<ExportRow>,
    pub counts: Option<FilterCounts>,
}

/// Flatten outcomes into export rows. Entity ids are expected to be unique.
///
/// With a window, only in-range links survive. Every entity that ends up
/// without a row gets a placeholder row so "no results" is never confused
/// with "not attempted".
pub fn export_rows(outcomes: &[ScrapeOutcome], window: Option<&DateWindow>) -> ExportSet {
    let links = outcomes.iter().flat_map(|o| o.links.iter().cloned()).collect::<Vec<_>>();
    let (kept, counts) = match window {
        Some(w) => {
            let report = filter_by_window(links, w);
            (report.kept, Some(report.counts))
        }
        None => (links, None),
    };

    let mut rows: Vec<ExportRow> = Vec::with_capacity(kept.len() + outcomes.len());
    for outcome in outcomes {
        let before = rows.len();
        rows.extend(
            kept.iter()
                .filter(|l| l.entity_id == outcome.entity_id)
                .cloned()
                .map(ExportRow::from),
        );
        if rows.len() == before {
            let link = match outcome.reason {
                TerminalReason::TargetUnresolved => NO_TARGET_PLACEHOLDER,
                _ => NO_RESULTS_PLACEHOLDER,
            };
            rows.push(ExportRow {
                entity_id: outcome.entity_id.clone(),
                link: link.to_string(),
                date: None,
            });
        }
    }
    ExportSet { rows, counts }
}

/// Per-entity summary lines for the run log.
pub fn log_summary(outcomes: &[ScrapeOutcome]) {
    for outcome in outcomes {
        info!(
            entity = %outcome.entity_id,
            links = outcome.links.len(),
            pages = outcome.pages_loaded,
            reason = %outcome.reason,
            "Entity summary"
        );
    }
    let total: usize = outcomes.iter().map(|o| o.links.len()).sum();
    let aborted = outcomes.iter().filter(|o| o.reason.is_abort()).count();
    info!(entities = outcomes.len(), total_links = total, aborted, "Batch summary");
}
