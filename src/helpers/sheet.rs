use std::fs;
use std::path::PathBuf;
use tracing::info;

use crate::error::Result;
use crate::models::cell::Row;

/// Supplies timesheet rows for a spreadsheet range, unformatted: date-times
/// as serial numbers, everything else as raw values.
pub trait RowSource {
    fn rows(&self, range: &str) -> Result<Vec<Row>>;
}

/// Reads rows from a flat JSON export: an array of arrays of cell values.
/// The range is informational only; the whole file is returned.
pub struct JsonRowSource {
    path: PathBuf,
}

impl JsonRowSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl RowSource for JsonRowSource {
    fn rows(&self, range: &str) -> Result<Vec<Row>> {
        info!("Reading range {} from {}", range, self.path.display());
        let content = fs::read_to_string(&self.path)?;
        let rows: Vec<Row> = serde_json::from_str(&content)?;
        if rows.is_empty() {
            info!("No data found in {}", self.path.display());
        }
        Ok(rows)
    }
}

/// Rows held in memory.
impl RowSource for Vec<Row> {
    fn rows(&self, _range: &str) -> Result<Vec<Row>> {
        Ok(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InvoiceError;
    use crate::models::cell::CellValue;
    use tempfile::tempdir;

    #[test]
    fn reads_rows_from_a_json_export() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rows.json");
        let content = r#"[[45292.375, 45292.5, "INV1", "work", "A-1"], ["", 45292.6]]"#;
        fs::write(&path, content).unwrap();

        let rows = JsonRowSource::new(&path).rows("Sheet1!A2:E").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][2], CellValue::from("INV1"));
        assert_eq!(rows[1].len(), 2);
    }

    #[test]
    fn malformed_exports_fail() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rows.json");
        fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            JsonRowSource::new(&path).rows("A:E"),
            Err(InvoiceError::Serialization(_))
        ));
    }
}
