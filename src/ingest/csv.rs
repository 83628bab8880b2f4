/// CSV reader: comma separated, one record per line, quotes stripped
///
/// Embedded commas inside quoted cells are not supported. The header is taken
/// from the first line unless that line looks like data, in which case columns
/// are named `col_0`, `col_1`, ...

use tracing::warn;
use crate::types::{InsightError, Row, Table, Value};

pub fn parse_csv(name: &str, text: &str) -> Result<Table, InsightError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let lines: Vec<Vec<String>> = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(split_line)
        .collect();

    let Some(first) = lines.first() else {
        return Err(InsightError::ParseError(format!("'{name}' has no content")));
    };

    let has_header = lines.len() == 1 || looks_like_header(first);
    let width = lines.iter().map(Vec::len).max().unwrap_or(0);
    let columns = if has_header {
        header_names(first, width)
    } else {
        (0..width).map(|i| format!("col_{i}")).collect()
    };

    let body = if has_header { &lines[1..] } else { &lines[..] };
    let mut ragged = 0usize;
    let rows = body
        .iter()
        .map(|cells| {
            if cells.len() != columns.len() {
                ragged += 1;
            }
            Row::from_pairs(
                columns
                    .iter()
                    .enumerate()
                    .map(|(i, col)| (col.clone(), cells.get(i).map_or(Value::Null, |c| infer_scalar(c)))),
            )
        })
        .collect();
    if ragged > 0 {
        warn!(file = name, ragged, "rows with a different cell count were padded with nulls");
    }

    Ok(Table::new(name, columns, rows))
}

fn split_line(line: &str) -> Vec<String> {
    line.split(',').map(|cell| strip_quotes(cell.trim()).to_string()).collect()
}

fn strip_quotes(cell: &str) -> &str {
    for quote in ['"', '\''] {
        if cell.len() >= 2 && cell.starts_with(quote) && cell.ends_with(quote) {
            return &cell[1..cell.len() - 1];
        }
    }
    cell
}

/// Digits once `.` and `-` are removed.
fn is_numeric_like(cell: &str) -> bool {
    let digits: String = cell.chars().filter(|c| *c != '.' && *c != '-').collect();
    !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
}

/// A first line is data when no cell has letters and most cells are numeric.
fn looks_like_header(cells: &[String]) -> bool {
    let alphabetic = cells.iter().filter(|c| c.chars().any(char::is_alphabetic)).count();
    let numeric = cells.iter().filter(|c| is_numeric_like(c)).count();
    alphabetic > 0 || numeric * 2 <= cells.len()
}

/// Header cells, with blanks named by position and repeats suffixed.
fn header_names(cells: &[String], width: usize) -> Vec<String> {
    let mut names: Vec<String> = Vec::with_capacity(width);
    for i in 0..width {
        let base = match cells.get(i) {
            Some(cell) if !cell.is_empty() => cell.clone(),
            _ => format!("col_{i}"),
        };
        let mut name = base.clone();
        let mut n = 1;
        while names.contains(&name) {
            name = format!("{base}_{n}");
            n += 1;
        }
        names.push(name);
    }
    names
}

/// empty -> null, then integer, real, boolean, text.
pub fn infer_scalar(cell: &str) -> Value {
    if cell.is_empty() {
        return Value::Null;
    }
    if let Ok(i) = cell.parse::<i64>() {
        return Value::Integer(i);
    }
    if let Ok(r) = cell.parse::<f64>() {
        if r.is_finite() {
            return Value::Real(r);
        }
    }
    match cell.to_ascii_lowercase().as_str() {
        "true" => Value::Boolean(true),
        "false" => Value::Boolean(false),
        _ => Value::Text(cell.to_string()),
    }
}
