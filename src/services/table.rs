// src/services/table.rs

//! Leaderboard table extraction.

use scraper::{ElementRef, Html, Selector};

use crate::error::{AppError, Result};
use crate::models::Row;

/// Why a page produced no rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableError {
    /// The document has no `<table>` at all
    NoTable,
    /// The first table has no data row with three cells
    NoRows,
}

/// Compiled selectors for the first-table, three-cell layout.
#[derive(Debug, Clone)]
pub struct TableParser {
    table: Selector,
    row: Selector,
    cell: Selector,
}

impl TableParser {
    pub fn new() -> Result<Self> {
        Ok(Self {
            table: parse_selector("table")?,
            row: parse_selector("tr")?,
            cell: parse_selector("td")?,
        })
    }

    /// Extract `(rank, name, score)` rows from the first table, skipping its
    /// header row and any row with fewer than three cells.
    pub fn parse(&self, html: &str) -> std::result::Result<Vec<Row>, TableError> {
        let document = Html::parse_document(html);
        let table = document
            .select(&self.table)
            .next()
            .ok_or(TableError::NoTable)?;

        let rows: Vec<Row> = table
            .select(&self.row)
            .skip(1)
            .filter_map(|tr| {
                let mut cells = tr.select(&self.cell);
                let rank = cell_text(cells.next()?);
                let name = cell_text(cells.next()?);
                let score = cell_text(cells.next()?);
                Some(Row { rank, name, score })
            })
            .collect();

        if rows.is_empty() {
            Err(TableError::NoRows)
        } else {
            Ok(rows)
        }
    }
}

/// Text of a cell with each fragment trimmed, joined without separators.
fn cell_text(cell: ElementRef<'_>) -> String {
    cell.text().map(str::trim).collect()
}

fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}
