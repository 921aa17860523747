//! Post-collection date-window filtering.

use crate::models::{DateWindow, DiscoveredLink};
use serde::Serialize;
use tracing::{info, instrument};

/// Counters for one filtering pass.
///
/// The buckets are disjoint: `in_range + out_of_range + undated == total`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FilterCounts {
    pub total: usize,
    pub in_range: usize,
    pub out_of_range: usize,
    pub undated: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterReport {
    pub kept: Vec<DiscoveredLink>,
    pub counts: FilterCounts,
}

/// Keep the links whose resolved date falls inside `window`, in order.
///
/// Links without a date are dropped and counted as undated; they are not an
/// error. The window's own `start <= end` invariant is not re-checked here.
#[instrument(level = "info", skip_all, fields(start = %window.start, end = %window.end))]
pub fn filter_by_window(links: Vec<DiscoveredLink>, window: &DateWindow) -> FilterReport {
    let mut counts = FilterCounts {
        total: links.len(),
        ..FilterCounts::default()
    };
    let mut kept = Vec::new();

    for link in links {
        match link.date {
            Some(date) if window.contains(date) => {
                counts.in_range += 1;
                kept.push(link);
            }
            Some(_) => counts.out_of_range += 1,
            None => counts.undated += 1,
        }
    }

    info!(
        total = counts.total,
        in_range = counts.in_range,
        out_of_range = counts.out_of_range,
        undated = counts.undated,
        "Applied date window"
    );
    FilterReport { kept, counts }
}
