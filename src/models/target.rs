//! Scrape targets and their source file.

use std::path::Path;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::utils::fs::read_csv_records;

/// A named leaderboard whose pages are scraped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    /// Unique display name
    pub name: String,

    /// URL of the first page
    pub base_url: String,
}

impl Target {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
        }
    }

    /// File name stem used when persisting this target's summary.
    pub fn file_stem(&self) -> String {
        file_stem(&self.name)
    }
}

/// Filesystem-safe form of a target name.
pub fn file_stem(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            ' ' | '/' | '\\' => '_',
            other => other,
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct TargetRecord {
    #[serde(rename = "Boss_Name")]
    name: String,
    #[serde(rename = "URL")]
    url: String,
}

/// Load targets from a `Boss_Name,URL` CSV file.
///
/// Never fails: an unreadable file yields an empty list and the caller
/// decides whether to abort. Names behave like map keys, so a repeated name
/// keeps its first position and takes the last URL.
pub fn load_targets(path: impl AsRef<Path>) -> Vec<Target> {
    let path = path.as_ref();
    let records: Vec<TargetRecord> = match read_csv_records(path) {
        Ok(records) => records,
        Err(e) => {
            log::warn!("Failed to load targets from {:?}: {}", path, e);
            return Vec::new();
        }
    };

    let mut targets: Vec<Target> = Vec::with_capacity(records.len());
    for record in records {
        if record.name.is_empty() {
            log::warn!("Skipping target with empty name ({})", record.url);
            continue;
        }
        if !is_http_url(&record.url) {
            log::warn!("Skipping {}: invalid URL '{}'", record.name, record.url);
            continue;
        }
        match targets.iter_mut().find(|t| t.name == record.name) {
            Some(existing) => {
                log::warn!("Duplicate target {}: using later URL", record.name);
                existing.base_url = record.url;
            }
            None => targets.push(Target::new(record.name, record.url)),
        }
    }
    targets
}

fn is_http_url(raw: &str) -> bool {
    Url::parse(raw)
        .map(|u| matches!(u.scheme(), "http" | "https"))
        .unwrap_or(false)
}
