/// Dataset profiling - per-column statistics and a 0-100 quality score
///
/// Quality score components:
/// - completeness (40): share of non-null cells
/// - uniqueness (30): share of distinct rows
/// - validity (30): numeric columns' IQR outlier share, penalized twice

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::time::UNIX_EPOCH;
use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;
use crate::ingest::parse_file;
use crate::storage::ApiCache;
use crate::types::{InsightError, Table, Value, ValueKey};

const PROFILE_ENDPOINT: &str = "/profile";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ColumnKind {
    Numeric,
    Categorical,
    Datetime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnStats {
    pub name: String,
    pub kind: ColumnKind,
    pub non_null_count: usize,
    pub null_count: usize,
    pub null_percentage: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub median: Option<f64>,
    /// Sample standard deviation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub std: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unique_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub most_common: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableStatistics {
    pub total_rows: usize,
    pub total_columns: usize,
    pub column_stats: Vec<ColumnStats>,
    pub numeric_columns: Vec<String>,
    pub categorical_columns: Vec<String>,
    pub datetime_columns: Vec<String>,
    pub missing_values_total: usize,
    pub missing_values_percentage: f64,
}

fn round4(n: f64) -> f64 {
    (n * 10_000.0).round() / 10_000.0
}

fn round2(n: f64) -> f64 {
    (n * 100.0).round() / 100.0
}

fn is_datetime(value: &Value) -> bool {
    value.as_text().is_some_and(|s| {
        DateTime::parse_from_rfc3339(s).is_ok() || NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
    })
}

fn classify(values: &[&Value]) -> ColumnKind {
    if values.is_empty() {
        ColumnKind::Categorical
    } else if values.iter().all(|v| matches!(v, Value::Integer(_) | Value::Real(_))) {
        ColumnKind::Numeric
    } else if values.iter().all(|v| is_datetime(v)) {
        ColumnKind::Datetime
    } else {
        ColumnKind::Categorical
    }
}

/// Linear-interpolated quantile over sorted values.
fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64))
}

fn sorted_numbers(table: &Table, column: &str) -> Vec<f64> {
    let mut nums: Vec<f64> = table.rows.iter().filter_map(|r| r.get(column).as_number()).collect();
    nums.sort_by(f64::total_cmp);
    nums
}

fn numeric_columns(table: &Table) -> Vec<&String> {
    table
        .columns
        .iter()
        .filter(|c| {
            let values: Vec<&Value> = table.rows.iter().map(|r| r.get(c)).filter(|v| !v.is_null()).collect();
            classify(&values) == ColumnKind::Numeric
        })
        .collect()
}

fn column_stats(table: &Table, column: &str) -> ColumnStats {
    let values: Vec<&Value> = table.rows.iter().map(|r| r.get(column)).filter(|v| !v.is_null()).collect();
    let total = table.row_count();
    let null_count = total - values.len();
    let kind = classify(&values);

    let mut stats = ColumnStats {
        name: column.to_string(),
        kind,
        non_null_count: values.len(),
        null_count,
        null_percentage: if total == 0 { 0.0 } else { round2(null_count as f64 / total as f64 * 100.0) },
        mean: None,
        median: None,
        std: None,
        min: None,
        max: None,
        unique_count: None,
        most_common: None,
    };

    let distinct: HashSet<ValueKey> = values.iter().map(|v| v.key()).collect();
    match kind {
        ColumnKind::Numeric => {
            let nums = sorted_numbers(table, column);
            let n = nums.len() as f64;
            let mean = nums.iter().sum::<f64>() / n;
            stats.mean = Some(round4(mean));
            stats.median = quantile(&nums, 0.5).map(round4);
            stats.min = nums.first().copied().map(round4);
            stats.max = nums.last().copied().map(round4);
            if nums.len() > 1 {
                let var = nums.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);
                stats.std = Some(round4(var.sqrt()));
            }
        }
        ColumnKind::Datetime => {
            stats.unique_count = Some(distinct.len());
        }
        ColumnKind::Categorical => {
            stats.unique_count = Some(distinct.len());
            let mut counts: HashMap<String, usize> = HashMap::new();
            for v in &values {
                *counts.entry(v.to_string()).or_default() += 1;
            }
            // ties resolve to the smallest value
            stats.most_common = counts
                .into_iter()
                .max_by(|(a, ca), (b, cb)| ca.cmp(cb).then_with(|| b.cmp(a)))
                .map(|(v, _)| v);
        }
    }
    stats
}

/// Per-column statistics plus totals.
#[must_use]
pub fn statistics(table: &Table) -> TableStatistics {
    let column_stats: Vec<ColumnStats> = table.columns.iter().map(|c| column_stats(table, c)).collect();
    let by_kind = |kind: ColumnKind| -> Vec<String> {
        column_stats.iter().filter(|s| s.kind == kind).map(|s| s.name.clone()).collect()
    };
    let missing_values_total: usize = column_stats.iter().map(|s| s.null_count).sum();
    let total_cells = table.row_count() * table.col_count();

    TableStatistics {
        total_rows: table.row_count(),
        total_columns: table.col_count(),
        numeric_columns: by_kind(ColumnKind::Numeric),
        categorical_columns: by_kind(ColumnKind::Categorical),
        datetime_columns: by_kind(ColumnKind::Datetime),
        missing_values_total,
        missing_values_percentage: if total_cells == 0 {
            0.0
        } else {
            round2(missing_values_total as f64 / total_cells as f64 * 100.0)
        },
        column_stats,
    }
}

/// 0-100 quality score; an empty table scores 0.
#[must_use]
pub fn quality_score(table: &Table) -> u8 {
    let total_rows = table.row_count();
    if total_rows == 0 {
        return 0;
    }
    let mut score = 0u32;

    let total_cells = total_rows * table.col_count();
    if total_cells > 0 {
        let nulls: usize = table
            .rows
            .iter()
            .map(|r| table.columns.iter().filter(|c| r.get(c).is_null()).count())
            .sum();
        score += ((1.0 - nulls as f64 / total_cells as f64) * 40.0) as u32;
    } else {
        score += 40;
    }

    let unique_rows: HashSet<Vec<ValueKey>> = table.rows.iter().map(|r| r.key(&table.columns, false)).collect();
    score += (unique_rows.len() as f64 / total_rows as f64 * 30.0) as u32;

    let numeric = numeric_columns(table);
    if numeric.is_empty() {
        score += 30;
    } else {
        let ratios: Vec<f64> = numeric
            .iter()
            .map(|c| {
                let nums = sorted_numbers(table, c);
                let (Some(q1), Some(q3)) = (quantile(&nums, 0.25), quantile(&nums, 0.75)) else {
                    return 0.0;
                };
                let iqr = q3 - q1;
                let (lower, upper) = (q1 - 1.5 * iqr, q3 + 1.5 * iqr);
                let outliers = nums.iter().filter(|x| **x < lower || **x > upper).count();
                outliers as f64 / total_rows as f64
            })
            .collect();
        let avg = ratios.iter().sum::<f64>() / ratios.len() as f64;
        score += ((1.0 - (avg * 2.0).min(1.0)) * 30.0) as u32;
    }

    score.min(100) as u8
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileReport {
    pub statistics: TableStatistics,
    pub quality_score: u8,
}

#[must_use]
pub fn report(table: &Table) -> ProfileReport {
    ProfileReport { statistics: statistics(table), quality_score: quality_score(table) }
}

/// Profiles a CSV/JSON file through the API cache.
///
/// The key covers the path, size and modification time, so an edited file
/// misses; an unchanged one is parsed again only after `ttl_minutes`.
pub fn cached_report(cache: &ApiCache, path: &Path, ttl_minutes: u32) -> Result<ProfileReport, InsightError> {
    let meta = fs::metadata(path)?;
    let modified = meta
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map_or(0, |d| d.as_millis() as u64);
    let params = json!({
        "path": fs::canonicalize(path)?.display().to_string(),
        "size": meta.len(),
        "modified": modified,
    });

    let cached = cache.get_or_fetch(PROFILE_ENDPOINT, &params, ttl_minutes, || {
        debug!(path = %path.display(), "profiling file");
        Ok(serde_json::to_value(report(&parse_file(path)?))?)
    })?;
    Ok(serde_json::from_value(cached)?)
}
