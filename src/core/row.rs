use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use super::value::{Value, ValueKey};

static NULL: Value = Value::Null;

/// One table row: column name -> cell.
///
/// A row may carry keys outside the table's declared columns (left over from an
/// earlier step); readers only look at declared columns.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct Row {
    pub values: BTreeMap<String, Value>,
}

impl Row {
    #[must_use]
    pub const fn new() -> Self {
        Self { values: BTreeMap::new() }
    }

    /// Builds a row from `(column, value)` pairs.
    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self {
            values: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    /// Cell for `column`, `Null` when absent.
    #[must_use]
    pub fn get(&self, column: &str) -> &Value {
        self.values.get(column).unwrap_or(&NULL)
    }

    pub fn set(&mut self, column: impl Into<String>, value: Value) {
        self.values.insert(column.into(), value);
    }

    pub fn remove(&mut self, column: &str) -> Option<Value> {
        self.values.remove(column)
    }

    #[must_use]
    pub fn contains(&self, column: &str) -> bool {
        self.values.contains_key(column)
    }

    /// Structured key over `columns` in the given order.
    #[must_use]
    pub fn key(&self, columns: &[String], case_insensitive: bool) -> Vec<ValueKey> {
        columns
            .iter()
            .map(|c| {
                let v = self.get(c);
                if case_insensitive { v.key_case_insensitive() } else { v.key() }
            })
            .collect()
    }

    /// Copy holding only `columns`; absent cells become `Null`.
    #[must_use]
    pub fn project(&self, columns: &[String]) -> Self {
        Self {
            values: columns.iter().map(|c| (c.clone(), self.get(c).clone())).collect(),
        }
    }
}
