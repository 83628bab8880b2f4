/// Column transforms: rename, split, merge, format, remove
///
/// Actions apply strictly in list order; each one sees the columns and rows left by
/// the previous one.

use chrono::{NaiveDate, NaiveDateTime};
use crate::types::{ColumnAction, FormatKind, InsightError, Row, Table, TransformConfig, Value};

/// Input layouts tried, in order, when formatting a date cell
const DATE_TIME_INPUTS: &[&str] = &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y/%m/%d %H:%M:%S"];
const DATE_INPUTS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d.%m.%Y", "%Y%m%d"];

pub struct TransformExecutor;

impl TransformExecutor {
    pub fn apply(table: &Table, config: &TransformConfig) -> Result<Table, InsightError> {
        let mut columns = table.columns.clone();
        let mut rows = table.rows.clone();

        for action in &config.actions {
            match action {
                ColumnAction::Rename { from, to } => Self::rename(&mut columns, &mut rows, from, to)?,
                ColumnAction::Split { column, separator, new_columns } => {
                    Self::split(&mut columns, &mut rows, column, separator, new_columns)?;
                }
                ColumnAction::Merge { columns: merged, separator, new_column } => {
                    Self::merge(&mut columns, &mut rows, merged, separator, new_column)?;
                }
                ColumnAction::Format { column, kind, pattern } => {
                    let formatter = CellFormatter::parse(*kind, pattern)?;
                    for row in &mut rows {
                        if let Some(cell) = row.values.get_mut(column) {
                            *cell = formatter.format(cell);
                        }
                    }
                }
                ColumnAction::Remove { columns: removed } => {
                    columns.retain(|c| !removed.contains(c));
                    for row in &mut rows {
                        for c in removed {
                            row.remove(c);
                        }
                    }
                }
            }
        }

        Ok(table.derive_from(columns, rows))
    }

    /// Positional rename; an absent source column is a no-op
    fn rename(columns: &mut [String], rows: &mut [Row], from: &str, to: &str) -> Result<(), InsightError> {
        let Some(idx) = columns.iter().position(|c| c == from) else {
            return Ok(());
        };
        if from == to {
            return Ok(());
        }
        if columns.iter().any(|c| c == to) {
            return Err(InsightError::InvalidOperation(format!(
                "cannot rename '{from}' to existing column '{to}'"
            )));
        }
        columns[idx] = to.to_string();
        for row in rows {
            if let Some(v) = row.remove(from) {
                row.set(to, v);
            }
        }
        Ok(())
    }

    fn split(
        columns: &mut Vec<String>,
        rows: &mut [Row],
        column: &str,
        separator: &str,
        new_columns: &[String],
    ) -> Result<(), InsightError> {
        if separator.is_empty() {
            return Err(InsightError::InvalidOperation(format!(
                "split of '{column}' needs a non-empty separator"
            )));
        }
        let idx = columns
            .iter()
            .position(|c| c == column)
            .ok_or_else(|| InsightError::ColumnNotFound(column.to_string()))?;

        let names: Vec<String> = if new_columns.is_empty() {
            let parts = rows
                .iter()
                .filter(|r| !r.get(column).is_null())
                .map(|r| r.get(column).to_string().split(separator).count())
                .max()
                .unwrap_or(1);
            (1..=parts).map(|n| format!("{column}_{n}")).collect()
        } else {
            new_columns.to_vec()
        };
        if let Some(clash) = names.iter().find(|n| columns.contains(n)) {
            return Err(InsightError::InvalidOperation(format!(
                "split target column '{clash}' already exists"
            )));
        }

        for row in rows.iter_mut() {
            let source = row.get(column).clone();
            let text = source.to_string();
            let mut parts = text.split(separator);
            for name in &names {
                let part = if source.is_null() { None } else { parts.next() };
                let value = part.map_or(Value::Null, |p| Value::Text(p.trim().to_string()));
                row.set(name.clone(), value);
            }
        }

        for (offset, name) in names.into_iter().enumerate() {
            columns.insert(idx + 1 + offset, name);
        }
        Ok(())
    }

    fn merge(
        columns: &mut Vec<String>,
        rows: &mut [Row],
        merged: &[String],
        separator: &str,
        new_column: &str,
    ) -> Result<(), InsightError> {
        if merged.is_empty() {
            return Err(InsightError::InvalidOperation("merge needs at least one column".to_string()));
        }
        if columns.iter().any(|c| c == new_column) {
            return Err(InsightError::InvalidOperation(format!(
                "merge target column '{new_column}' already exists"
            )));
        }
        for row in rows.iter_mut() {
            let joined = merged
                .iter()
                .map(|c| row.get(c).to_string())
                .collect::<Vec<_>>()
                .join(separator);
            row.set(new_column, Value::Text(joined));
        }
        let insert_at = merged
            .iter()
            .filter_map(|m| columns.iter().position(|c| c == m))
            .max()
            .map_or(columns.len(), |last| last + 1);
        columns.insert(insert_at, new_column.to_string());
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum NumberPattern {
    Integer,
    Fixed(usize),
    Percent,
    Thousands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TextPattern {
    Upper,
    Lower,
    Trim,
    Capitalize,
}

/// A validated `format` action. Cells that cannot be read pass through unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
enum CellFormatter {
    /// chrono format string translated from the named pattern
    Date(String),
    Number(NumberPattern),
    Text(TextPattern),
}

impl CellFormatter {
    fn parse(kind: FormatKind, pattern: &str) -> Result<Self, InsightError> {
        let invalid = || InsightError::InvalidOperation(format!("unknown {kind:?} format pattern '{pattern}'"));
        match kind {
            FormatKind::Date => {
                if !["YYYY", "MM", "DD", "HH", "mm", "ss"].iter().any(|t| pattern.contains(t)) {
                    return Err(invalid());
                }
                let chrono_fmt = pattern
                    .replace('%', "%%")
                    .replace("YYYY", "%Y")
                    .replace("MM", "%m")
                    .replace("DD", "%d")
                    .replace("HH", "%H")
                    .replace("mm", "%M")
                    .replace("ss", "%S");
                Ok(Self::Date(chrono_fmt))
            }
            FormatKind::Number => {
                let p = pattern.trim().to_lowercase();
                match p.as_str() {
                    "integer" => Ok(Self::Number(NumberPattern::Integer)),
                    "percent" => Ok(Self::Number(NumberPattern::Percent)),
                    "thousands" => Ok(Self::Number(NumberPattern::Thousands)),
                    _ => p
                        .strip_prefix("fixed:")
                        .and_then(|n| n.parse::<usize>().ok())
                        .filter(|n| *n <= 10)
                        .map(|n| Self::Number(NumberPattern::Fixed(n)))
                        .ok_or_else(invalid),
                }
            }
            FormatKind::Text => match pattern.trim().to_lowercase().as_str() {
                "upper" => Ok(Self::Text(TextPattern::Upper)),
                "lower" => Ok(Self::Text(TextPattern::Lower)),
                "trim" => Ok(Self::Text(TextPattern::Trim)),
                "capitalize" => Ok(Self::Text(TextPattern::Capitalize)),
                _ => Err(invalid()),
            },
        }
    }

    fn format(&self, cell: &Value) -> Value {
        match self {
            Self::Date(fmt) => {
                let Some(text) = cell.as_text() else {
                    return cell.clone();
                };
                parse_date_time(text.trim())
                    .map_or_else(|| cell.clone(), |dt| Value::Text(dt.format(fmt).to_string()))
            }
            Self::Number(pattern) => {
                let Some(n) = cell.as_number() else {
                    return cell.clone();
                };
                match pattern {
                    NumberPattern::Integer => Value::from_f64(n.round()),
                    NumberPattern::Fixed(digits) => {
                        let digits = *digits;
                        Value::Text(format!("{n:.digits$}"))
                    }
                    NumberPattern::Percent => Value::Text(format!("{:.2}%", n * 100.0)),
                    NumberPattern::Thousands => Value::Text(group_thousands(n)),
                }
            }
            Self::Text(pattern) => {
                let Some(text) = cell.as_text() else {
                    return cell.clone();
                };
                Value::Text(match pattern {
                    TextPattern::Upper => text.to_uppercase(),
                    TextPattern::Lower => text.to_lowercase(),
                    TextPattern::Trim => text.trim().to_string(),
                    TextPattern::Capitalize => {
                        let mut chars = text.chars();
                        chars.next().map_or_else(String::new, |first| {
                            first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect()
                        })
                    }
                })
            }
        }
    }
}

fn parse_date_time(text: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_utc());
    }
    DATE_TIME_INPUTS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(text, f).ok())
        .or_else(|| {
            DATE_INPUTS
                .iter()
                .find_map(|f| NaiveDate::parse_from_str(text, f).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// `1234567.891` -> `1,234,567.89`
fn group_thousands(n: f64) -> String {
    let fixed = format!("{:.2}", n.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    let sign = if n < 0.0 { "-" } else { "" };
    if frac_part == "00" {
        format!("{sign}{grouped}")
    } else {
        format!("{sign}{grouped}.{frac_part}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn people() -> Table {
        Table::new(
            "people",
            vec!["id".into(), "full_name".into(), "joined".into(), "salary".into()],
            vec![
                Row::from_pairs([
                    ("id", Value::Integer(1)),
                    ("full_name", Value::from("Ada Lovelace")),
                    ("joined", Value::from("2023-04-05")),
                    ("salary", Value::Real(1234567.891)),
                ]),
                Row::from_pairs([
                    ("id", Value::Integer(2)),
                    ("full_name", Value::from("Plato")),
                    ("joined", Value::from("not a date")),
                    ("salary", Value::from("n/a")),
                ]),
            ],
        )
    }

    fn run(actions: Vec<ColumnAction>) -> Result<Table, InsightError> {
        TransformExecutor::apply(&people(), &TransformConfig { actions })
    }

    #[test]
    fn test_rename_keeps_position() {
        let out = run(vec![ColumnAction::Rename { from: "full_name".into(), to: "name".into() }]).unwrap();
        assert_eq!(out.columns, vec!["id", "name", "joined", "salary"]);
        assert_eq!(out.rows[0].get("name"), &Value::from("Ada Lovelace"));
        assert!(!out.rows[0].contains("full_name"));
    }

    #[test]
    fn test_rename_onto_existing_column_fails() {
        let err = run(vec![ColumnAction::Rename { from: "id".into(), to: "salary".into() }]).unwrap_err();
        assert!(err.is_operation_error());
    }

    #[test]
    fn test_split_inserts_after_source() {
        let out = run(vec![ColumnAction::Split {
            column: "full_name".into(),
            separator: " ".into(),
            new_columns: vec!["first".into(), "last".into()],
        }])
        .unwrap();
        assert_eq!(out.columns, vec!["id", "full_name", "first", "last", "joined", "salary"]);
        assert_eq!(out.rows[0].get("first"), &Value::from("Ada"));
        assert_eq!(out.rows[0].get("last"), &Value::from("Lovelace"));
        assert_eq!(out.rows[1].get("first"), &Value::from("Plato"));
        assert!(out.rows[1].get("last").is_null());
    }

    #[test]
    fn test_split_derives_names() {
        let out = run(vec![ColumnAction::Split {
            column: "joined".into(),
            separator: "-".into(),
            new_columns: vec![],
        }])
        .unwrap();
        assert_eq!(out.columns[3..6], ["joined_1", "joined_2", "joined_3"]);
    }

    #[test]
    fn test_split_empty_separator_is_invalid() {
        let err = run(vec![ColumnAction::Split {
            column: "full_name".into(),
            separator: String::new(),
            new_columns: vec![],
        }]);
        assert!(matches!(err, Err(InsightError::InvalidOperation(_))));
    }

    #[test]
    fn test_merge_inserts_after_last_merged() {
        let out = run(vec![ColumnAction::Merge {
            columns: vec!["full_name".into(), "id".into()],
            separator: "#".into(),
            new_column: "tag".into(),
        }])
        .unwrap();
        assert_eq!(out.columns, vec!["id", "full_name", "tag", "joined", "salary"]);
        assert_eq!(out.rows[0].get("tag"), &Value::from("Ada Lovelace#1"));
    }

    #[test]
    fn test_format_date_and_passthrough() {
        let out = run(vec![ColumnAction::Format {
            column: "joined".into(),
            kind: FormatKind::Date,
            pattern: "DD/MM/YYYY".into(),
        }])
        .unwrap();
        assert_eq!(out.rows[0].get("joined"), &Value::from("05/04/2023"));
        assert_eq!(out.rows[1].get("joined"), &Value::from("not a date"));
    }

    #[test]
    fn test_format_numbers() {
        let thousands = run(vec![ColumnAction::Format {
            column: "salary".into(),
            kind: FormatKind::Number,
            pattern: "thousands".into(),
        }])
        .unwrap();
        assert_eq!(thousands.rows[0].get("salary"), &Value::from("1,234,567.89"));
        assert_eq!(thousands.rows[1].get("salary"), &Value::from("n/a"));

        let fixed = run(vec![ColumnAction::Format {
            column: "salary".into(),
            kind: FormatKind::Number,
            pattern: "fixed:1".into(),
        }])
        .unwrap();
        assert_eq!(fixed.rows[0].get("salary"), &Value::from("1234567.9"));
    }

    #[test]
    fn test_format_unknown_pattern_is_invalid() {
        let err = run(vec![ColumnAction::Format {
            column: "salary".into(),
            kind: FormatKind::Number,
            pattern: "roman".into(),
        }]);
        assert!(matches!(err, Err(InsightError::InvalidOperation(_))));
    }

    #[test]
    fn test_remove_drops_schema_and_cells() {
        let out = run(vec![ColumnAction::Remove { columns: vec!["salary".into(), "joined".into()] }]).unwrap();
        assert_eq!(out.columns, vec!["id", "full_name"]);
        assert!(out.rows.iter().all(|r| !r.contains("salary") && !r.contains("joined")));
    }

    #[test]
    fn test_actions_apply_in_order() {
        let out = run(vec![
            ColumnAction::Rename { from: "full_name".into(), to: "name".into() },
            ColumnAction::Format { column: "name".into(), kind: FormatKind::Text, pattern: "upper".into() },
            ColumnAction::Remove { columns: vec!["joined".into()] },
        ])
        .unwrap();
        assert_eq!(out.columns, vec!["id", "name", "salary"]);
        assert_eq!(out.rows[0].get("name"), &Value::from("ADA LOVELACE"));
    }

    #[test]
    fn test_group_thousands() {
        assert_eq!(group_thousands(1000.0), "1,000");
        assert_eq!(group_thousands(-1234.5), "-1,234.50");
        assert_eq!(group_thousands(12.0), "12");
    }
}
