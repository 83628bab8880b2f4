/// Two-table hash join on a single key column per side
///
/// Keys compare by display string; null keys never match. The right side is indexed
/// first-match, so duplicate right keys contribute only their first row.

use std::collections::{HashMap, HashSet};
use crate::types::{InsightError, JoinConfig, JoinType, Row, Table, Value};

pub struct JoinExecutor;

impl JoinExecutor {
    pub fn apply(left: &Table, right: &Table, config: &JoinConfig) -> Result<Table, InsightError> {
        if !left.has_column(&config.left_key) {
            return Err(InsightError::ColumnNotFound(config.left_key.clone()));
        }
        if !right.has_column(&config.right_key) {
            return Err(InsightError::ColumnNotFound(config.right_key.clone()));
        }

        let mut columns = left.columns.clone();
        columns.extend(right.columns.iter().filter(|c| !left.has_column(c)).cloned());

        let mut index: HashMap<String, usize> = HashMap::new();
        for (i, row) in right.rows.iter().enumerate() {
            if let Some(key) = Self::join_key(row, &config.right_key) {
                index.entry(key).or_insert(i);
            }
        }

        let keep_left_only = matches!(config.join_type, JoinType::Left | JoinType::Full);
        let keep_right_only = matches!(config.join_type, JoinType::Right | JoinType::Full);

        let mut left_keys: HashSet<String> = HashSet::new();
        let mut rows = Vec::with_capacity(left.row_count());

        for row in &left.rows {
            let key = Self::join_key(row, &config.left_key);
            let matched = key.as_ref().and_then(|k| index.get(k)).map(|&i| &right.rows[i]);
            if let Some(k) = key {
                left_keys.insert(k);
            }
            match matched {
                Some(other) => rows.push(Self::merge(row, other, &left.columns, &right.columns)),
                None if keep_left_only => rows.push(Self::pad(row, &left.columns, &columns)),
                None => {}
            }
        }

        if keep_right_only {
            for row in &right.rows {
                let matched = Self::join_key(row, &config.right_key).is_some_and(|k| left_keys.contains(&k));
                if !matched {
                    rows.push(Self::pad(row, &right.columns, &columns));
                }
            }
        }

        Ok(left.derive_from(columns, rows))
    }

    fn join_key(row: &Row, column: &str) -> Option<String> {
        let value = row.get(column);
        if value.is_null() { None } else { Some(value.to_string()) }
    }

    /// Left cells, then right cells; overlapping columns take the right-side value.
    fn merge(left: &Row, right: &Row, left_columns: &[String], right_columns: &[String]) -> Row {
        let mut out = left.project(left_columns);
        for column in right_columns {
            out.set(column.clone(), right.get(column).clone());
        }
        out
    }

    /// One side's declared cells with every other output column null.
    fn pad(row: &Row, own_columns: &[String], all_columns: &[String]) -> Row {
        let mut out = row.project(own_columns);
        for column in all_columns {
            if !out.contains(column) {
                out.set(column.clone(), Value::Null);
            }
        }
        out
    }
}
