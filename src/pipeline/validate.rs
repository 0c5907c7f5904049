// src/pipeline/validate.rs

use crate::error::{AppError, Result};
use crate::models::{Config, load_header_profiles, load_targets};
use crate::storage::SummaryStorage;
use crate::utils::log as console;

/// Check configuration and inputs without touching the network.
pub async fn run_validate(config: &Config, storage: &dyn SummaryStorage) -> Result<()> {
    console::header("Validating configuration");

    if let Err(e) = config.validate() {
        console::failure(&format!("Config validation failed: {}", e));
        return Err(e);
    }
    console::success("Config OK");
    let scraper = &config.scraper;
    console::sub_item(&format!("Workers: {}", scraper.worker_count));
    console::sub_item(&format!("Max pages per target: {}", scraper.max_pages_per_target));
    console::sub_item(&format!(
        "Max requests per minute: {}",
        scraper.max_requests_per_minute
    ));
    console::sub_item(&format!("Request timeout: {}s", scraper.request_timeout));

    let targets = load_targets(&config.paths.targets_file);
    if targets.is_empty() {
        console::failure(&format!("No targets in {}", config.paths.targets_file));
        return Err(AppError::validation(format!(
            "no targets loaded from {}",
            config.paths.targets_file
        )));
    }
    console::success(&format!("{} targets", targets.len()));

    let profiles = load_header_profiles(&config.paths.headers_file);
    console::success(&format!("{} header profiles", profiles.len()));

    match storage.load_report().await {
        Ok(Some(report)) => console::sub_item(&format!(
            "Last run: {} ({} of {} targets saved{})",
            report.finished_at.format("%Y-%m-%d %H:%M:%S"),
            report.successful.len(),
            report.total_targets,
            if report.interrupted { ", interrupted" } else { "" }
        )),
        Ok(None) => console::sub_item("No previous run"),
        Err(e) => log::warn!("Could not read previous run report: {}", e),
    }

    Ok(())
}
