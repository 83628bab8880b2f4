/// File ingestion - raw file content into a Table
///
/// Parse errors are reported before any table is built.

mod csv;
mod json;

pub use self::csv::{infer_scalar, parse_csv};
pub use self::json::parse_json;

use std::fs;
use std::path::Path;
use tracing::debug;
use crate::types::{InsightError, Table};

/// Parses a `.csv` or `.json` file by extension; the table is named after the file.
pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<Table, InsightError> {
    let path = path.as_ref();
    let name = path
        .file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();

    let bytes = fs::read(path)?;
    let text = String::from_utf8(bytes)
        .map_err(|_| InsightError::ParseError(format!("'{name}' is not valid UTF-8")))?;

    let table = match extension.as_str() {
        "csv" => parse_csv(&name, &text)?,
        "json" => parse_json(&name, &text)?,
        other => {
            return Err(InsightError::ParseError(format!("unsupported file type '.{other}' for '{name}'")));
        }
    };
    debug!(file = %name, rows = table.row_count(), cols = table.col_count(), "file parsed");
    Ok(table)
}
