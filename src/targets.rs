//! Building the list of [`ScrapeTarget`]s for a run.
//!
//! Search mode derives everything from the company id. Site mode looks the
//! id up in a company registry, a CSV file with a `company_id,base_url`
//! header.

use crate::engine::rules::DiscoveryMode;
use crate::models::{DateWindow, ScrapeTarget};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;
use tracing::{info, instrument, warn};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("cannot read company registry {path}: {source}")]
    Read { path: String, source: csv::Error },
}

#[derive(Debug, Deserialize)]
struct RegistryRecord {
    company_id: String,
    #[serde(default)]
    base_url: Option<String>,
}

/// Company id to newsroom base URL. Ids are matched after trimming.
#[derive(Debug, Default)]
pub struct CompanyRegistry {
    base_urls: HashMap<String, Option<String>>,
}

impl CompanyRegistry {
    #[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let display = path.as_ref().display().to_string();
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path.as_ref())
            .map_err(|source| RegistryError::Read {
                path: display.clone(),
                source,
            })?;
        let registry = Self::from_reader(reader).map_err(|source| RegistryError::Read {
            path: display,
            source,
        })?;
        info!(companies = registry.base_urls.len(), "Loaded company registry");
        Ok(registry)
    }

    fn from_reader<R: std::io::Read>(mut reader: csv::Reader<R>) -> Result<Self, csv::Error> {
        let mut base_urls = HashMap::new();
        for record in reader.deserialize::<RegistryRecord>() {
            let record = record?;
            base_urls.insert(record.company_id.trim().to_string(), record.base_url);
        }
        Ok(Self { base_urls })
    }

    pub fn base_url(&self, company_id: &str) -> Option<&str> {
        self.base_urls.get(company_id).and_then(|b| b.as_deref())
    }
}

/// Split a comma-separated id list, trimming blanks and dropping repeats while
/// keeping first-seen order.
pub fn parse_company_ids(raw: &str) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    for id in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if !ids.iter().any(|existing| existing == id) {
            ids.push(id.to_string());
        }
    }
    ids
}

pub fn build_targets(
    ids: &[String],
    mode: DiscoveryMode,
    window: Option<&DateWindow>,
    registry: Option<&CompanyRegistry>,
) -> Vec<ScrapeTarget> {
    ids.iter()
        .map(|id| match mode {
            DiscoveryMode::Search => ScrapeTarget::news_search(id, window),
            DiscoveryMode::Site => match registry.and_then(|r| r.base_url(id)) {
                Some(base) => ScrapeTarget::site(id, Some(base)),
                None => {
                    warn!(company_id = %id, "No newsroom base URL in registry");
                    ScrapeTarget::unresolved(id)
                }
            },
        })
        .collect()
}
