// src/utils/fs.rs

//! File system utilities.

use std::path::Path;

use serde::de::DeserializeOwned;

use crate::error::Result;

/// Read every well-formed record of a headed CSV file.
///
/// Rows that fail to deserialize are skipped with a warning; only failures
/// to open or read the file itself are returned as errors.
pub fn read_csv_records<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)?;

    let mut records = Vec::new();
    for (idx, row) in reader.deserialize::<T>().enumerate() {
        match row {
            Ok(record) => records.push(record),
            // Header line is line 1, so data row `idx` sits on line idx + 2.
            Err(e) => log::warn!("Skipping malformed row {} in {:?}: {}", idx + 2, path, e),
        }
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::fs;
    use tempfile::TempDir;

    #[derive(Debug, Deserialize)]
    struct Pair {
        a: String,
        b: u32,
    }

    #[test]
    fn test_read_csv_skips_bad_rows() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("pairs.csv");
        fs::write(&path, "a,b\nx, 1\ny,oops\nz,3\n").unwrap();

        let rows: Vec<Pair> = read_csv_records(&path).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].a, "x");
        assert_eq!(rows[0].b, 1);
        assert_eq!(rows[1].a, "z");
    }

    #[test]
    fn test_read_csv_missing_file() {
        let tmp = TempDir::new().unwrap();
        let result: Result<Vec<Pair>> = read_csv_records(&tmp.path().join("nope.csv"));
        assert!(result.is_err());
    }
}
