/// Deduplication on structured composite keys
///
/// keep = first: first-seen row per key, in original order.
/// keep = last: latest row per key, placed at the first-seen key's position.

use std::collections::HashMap;
use crate::types::{DedupConfig, KeepPolicy, Row, Table, ValueKey};

pub struct DedupExecutor;

impl DedupExecutor {
    #[must_use]
    pub fn apply(table: &Table, config: &DedupConfig) -> Table {
        let key_columns: &[String] = if config.columns.is_empty() {
            &table.columns
        } else {
            &config.columns
        };

        let mut slots: HashMap<Vec<ValueKey>, usize> = HashMap::with_capacity(table.row_count());
        let mut kept: Vec<&Row> = Vec::new();

        for row in &table.rows {
            let key = row.key(key_columns, config.case_insensitive);
            match slots.get(&key) {
                Some(&slot) => {
                    if config.keep == KeepPolicy::Last {
                        kept[slot] = row;
                    }
                }
                None => {
                    slots.insert(key, kept.len());
                    kept.push(row);
                }
            }
        }

        table.derive_from(table.columns.clone(), kept.into_iter().cloned().collect())
    }
}
