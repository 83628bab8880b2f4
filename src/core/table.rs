use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use super::row::Row;

/// Where a table came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TableSource {
    /// Parsed from an uploaded file or a backend preview
    Upload,
    /// Produced by an operation
    Derived,
}

impl std::fmt::Display for TableSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Upload => write!(f, "upload"),
            Self::Derived => write!(f, "derived"),
        }
    }
}

/// Immutable-by-convention tabular value.
///
/// Row and column counts are computed from `rows`/`columns`, so they can never
/// drift from the data. Operations never mutate a table; they build a new one
/// with [`Table::derive_from`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    pub id: String,
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
    pub source: TableSource,
    pub created_at: DateTime<Utc>,
}

impl Table {
    /// New uploaded table with a fresh identity.
    ///
    /// Duplicate column names are dropped, keeping the first occurrence.
    #[must_use]
    pub fn new(name: impl Into<String>, columns: Vec<String>, rows: Vec<Row>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            columns: dedup_columns(columns),
            rows,
            source: TableSource::Upload,
            created_at: Utc::now(),
        }
    }

    /// Reassembles a table from stored parts without changing its identity.
    #[must_use]
    pub fn from_parts(
        id: String,
        name: String,
        columns: Vec<String>,
        rows: Vec<Row>,
        source: TableSource,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self { id, name, columns: dedup_columns(columns), rows, source, created_at }
    }

    /// New derived table that keeps this table's name.
    #[must_use]
    pub fn derive_from(&self, columns: Vec<String>, rows: Vec<Row>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: self.name.clone(),
            columns: dedup_columns(columns),
            rows,
            source: TableSource::Derived,
            created_at: Utc::now(),
        }
    }

    /// Derived table whose identity depends only on this table and `salt`,
    /// so repeated derivations compare equal. The timestamp is the input's.
    #[must_use]
    pub fn derive_keyed(&self, salt: &str, columns: Vec<String>, rows: Vec<Row>) -> Self {
        let name = format!("{}:{salt}", self.id);
        Self {
            id: Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string(),
            name: self.name.clone(),
            columns: dedup_columns(columns),
            rows,
            source: TableSource::Derived,
            created_at: self.created_at,
        }
    }

    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn col_count(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn get_column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.get_column_index(name).is_some()
    }

    /// Rows projected onto the declared columns, in column order.
    #[must_use]
    pub fn declared_rows(&self) -> Vec<Row> {
        self.rows.iter().map(|r| r.project(&self.columns)).collect()
    }
}

fn dedup_columns(columns: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    columns.into_iter().filter(|c| seen.insert(c.clone())).collect()
}
