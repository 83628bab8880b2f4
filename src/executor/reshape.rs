/// Reshape: melt (wide -> long) and pivot (long -> wide)

use std::collections::HashMap;
use crate::types::{InsightError, MeltConfig, ReshapeConfig, Row, Table, Value, ValueKey, WidenConfig};

pub struct ReshapeExecutor;

impl ReshapeExecutor {
    pub fn apply(table: &Table, config: &ReshapeConfig) -> Result<Table, InsightError> {
        match config {
            ReshapeConfig::Melt(melt) => Self::melt(table, melt),
            ReshapeConfig::Pivot(widen) => Self::widen(table, widen),
        }
    }

    /// One output row per (input row, value column), row-major.
    pub fn melt(table: &Table, config: &MeltConfig) -> Result<Table, InsightError> {
        if config.var_name == config.value_name || config.id_vars.iter().any(|c| *c == config.var_name || *c == config.value_name) {
            return Err(InsightError::InvalidOperation(format!(
                "melt output columns '{}'/'{}' clash with id columns",
                config.var_name, config.value_name
            )));
        }
        let value_vars: Vec<String> = if config.value_vars.is_empty() {
            table
                .columns
                .iter()
                .filter(|c| !config.id_vars.contains(c))
                .cloned()
                .collect()
        } else {
            config.value_vars.clone()
        };

        let mut rows = Vec::with_capacity(table.row_count() * value_vars.len());
        for row in &table.rows {
            for var in &value_vars {
                let mut out = row.project(&config.id_vars);
                out.set(config.var_name.clone(), Value::Text(var.clone()));
                out.set(config.value_name.clone(), row.get(var).clone());
                rows.push(out);
            }
        }

        let mut columns = config.id_vars.clone();
        columns.push(config.var_name.clone());
        columns.push(config.value_name.clone());
        Ok(table.derive_from(columns, rows))
    }

    /// Groups by the index columns; each distinct `columns` value becomes a column.
    pub fn widen(table: &Table, config: &WidenConfig) -> Result<Table, InsightError> {
        if config.index.is_empty() {
            return Err(InsightError::InvalidOperation("pivot reshape needs an index column".to_string()));
        }

        let mut groups: HashMap<Vec<ValueKey>, usize> = HashMap::new();
        let mut out_rows: Vec<Row> = Vec::new();
        let mut new_columns: Vec<String> = Vec::new();

        for row in &table.rows {
            let name = row.get(&config.columns).to_string();
            if config.index.contains(&name) {
                return Err(InsightError::InvalidOperation(format!(
                    "pivoted column '{name}' clashes with an index column"
                )));
            }
            if !new_columns.contains(&name) {
                new_columns.push(name.clone());
            }

            let key = row.key(&config.index, false);
            let slot = *groups.entry(key).or_insert_with(|| {
                out_rows.push(row.project(&config.index));
                out_rows.len() - 1
            });
            // duplicate (index, column) pairs: the later value wins
            out_rows[slot].set(name, row.get(&config.values).clone());
        }

        for row in &mut out_rows {
            for name in &new_columns {
                if !row.contains(name) {
                    row.set(name.clone(), Value::Null);
                }
            }
        }

        let mut columns = config.index.clone();
        columns.extend(new_columns);
        Ok(table.derive_from(columns, out_rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wide() -> Table {
        Table::new(
            "scores",
            vec!["student".into(), "math".into(), "art".into()],
            vec![
                Row::from_pairs([("student", Value::from("ann")), ("math", Value::Integer(90)), ("art", Value::Integer(70))]),
                Row::from_pairs([("student", Value::from("bo")), ("math", Value::Integer(60)), ("art", Value::Null)]),
            ],
        )
    }

    #[test]
    fn test_melt_defaults_to_non_id_columns() {
        let long = ReshapeExecutor::melt(&wide(), &MeltConfig::new(vec!["student".into()], vec![])).unwrap();
        assert_eq!(long.columns, vec!["student", "variable", "value"]);
        assert_eq!(long.row_count(), 4);
        assert_eq!(long.rows[1].get("variable"), &Value::from("art"));
        assert_eq!(long.rows[1].get("value"), &Value::Integer(70));
        assert!(long.rows[3].get("value").is_null());
    }

    #[test]
    fn test_melt_explicit_value_vars() {
        let long = ReshapeExecutor::melt(&wide(), &MeltConfig::new(vec!["student".into()], vec!["math".into()])).unwrap();
        assert_eq!(long.row_count(), 2);
    }

    #[test]
    fn test_widen_fills_missing_with_null() {
        let long = Table::new(
            "long",
            vec!["k".into(), "var".into(), "val".into()],
            vec![
                Row::from_pairs([("k", Value::Integer(1)), ("var", Value::from("x")), ("val", Value::Integer(10))]),
                Row::from_pairs([("k", Value::Integer(2)), ("var", Value::from("y")), ("val", Value::Integer(20))]),
                Row::from_pairs([("k", Value::Integer(1)), ("var", Value::from("y")), ("val", Value::Integer(11))]),
            ],
        );
        let config = WidenConfig { index: vec!["k".into()], columns: "var".into(), values: "val".into() };
        let out = ReshapeExecutor::widen(&long, &config).unwrap();
        assert_eq!(out.columns, vec!["k", "x", "y"]);
        assert_eq!(out.row_count(), 2);
        assert_eq!(out.rows[0].get("y"), &Value::Integer(11));
        assert!(out.rows[1].get("x").is_null());
        assert!(out.rows[1].contains("x"));
    }

    #[test]
    fn test_melt_then_widen_round_trip() {
        let original = wide();
        let long = ReshapeExecutor::melt(&original, &MeltConfig::new(vec!["student".into()], vec![])).unwrap();
        let config = WidenConfig { index: vec!["student".into()], columns: "variable".into(), values: "value".into() };
        let back = ReshapeExecutor::widen(&long, &config).unwrap();
        assert_eq!(back.declared_rows(), original.declared_rows());
    }

    #[test]
    fn test_widen_requires_index() {
        let config = WidenConfig { index: vec![], columns: "a".into(), values: "b".into() };
        assert!(ReshapeExecutor::widen(&wide(), &config).is_err());
    }
}
