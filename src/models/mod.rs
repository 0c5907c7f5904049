// src/models/mod.rs

//! Domain models for the scraper.
//!
//! Plain data shared by the services and the pipeline: configuration,
//! targets, header profiles, scraped rows and summaries.

mod config;
mod header;
mod report;
mod summary;
mod target;

// Re-export all public types
pub use config::{Config, LoggingConfig, PathsConfig, RetryConfig, ScraperConfig};
pub use header::{HeaderProfile, load_header_profiles, sanitize_value};
pub use report::RunReport;
pub use summary::{Row, TargetAccumulator, TargetSummary, parse_score};
pub use target::{Target, file_stem, load_targets};
