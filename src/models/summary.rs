//! Scraped rows and the per-target aggregate built from them.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// One leaderboard entry, as text exactly as the page shows it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    pub rank: String,
    pub name: String,
    pub score: String,
}

impl Row {
    pub fn new(rank: impl Into<String>, name: impl Into<String>, score: impl Into<String>) -> Self {
        Self {
            rank: rank.into(),
            name: name.into(),
            score: score.into(),
        }
    }
}

/// Rows collected for one target while its pages are fetched.
///
/// Rows are only ever appended. Ownership moves to the scheduler once the
/// worker finishes, so nothing touches them after completion.
#[derive(Debug, Clone)]
pub struct TargetAccumulator {
    target_name: String,
    rows: Vec<Row>,
    pages_fetched: u32,
}

impl TargetAccumulator {
    pub fn new(target_name: impl Into<String>) -> Self {
        Self {
            target_name: target_name.into(),
            rows: Vec::new(),
            pages_fetched: 0,
        }
    }

    /// Append one page worth of rows.
    pub fn append_page(&mut self, rows: Vec<Row>) {
        self.rows.extend(rows);
        self.pages_fetched += 1;
    }

    pub fn target_name(&self) -> &str {
        &self.target_name
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn pages_fetched(&self) -> u32 {
        self.pages_fetched
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Aggregate the collected rows.
    pub fn summarize(&self, completed_at: DateTime<Local>) -> Result<TargetSummary> {
        TargetSummary::from_rows(&self.target_name, &self.rows, completed_at)
    }
}

/// Persisted aggregate for one target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetSummary {
    pub target_name: String,
    pub total_score: i64,
    pub player_count: usize,
    pub completed_at: DateTime<Local>,
}

impl TargetSummary {
    /// Sum the scores of `rows`. Any unparseable score fails the whole summary.
    pub fn from_rows(
        target_name: &str,
        rows: &[Row],
        completed_at: DateTime<Local>,
    ) -> Result<Self> {
        let mut total_score: i64 = 0;
        for row in rows {
            let score = parse_score(&row.score)?;
            total_score = total_score
                .checked_add(score)
                .ok_or_else(|| AppError::parse("total score", target_name))?;
        }

        Ok(Self {
            target_name: target_name.to_string(),
            total_score,
            player_count: rows.len(),
            completed_at,
        })
    }

    /// `Last Updated` column value.
    pub fn last_updated(&self) -> String {
        self.completed_at.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

/// Parse a score such as `"1,234"` into an integer.
pub fn parse_score(raw: &str) -> Result<i64> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
    cleaned
        .parse::<i64>()
        .map_err(|_| AppError::parse("score", raw))
}
