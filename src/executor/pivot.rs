/// Grouping pivot with aggregations
///
/// Groups by (row-dimension tuple) x (column-dimension tuple). Output columns are
/// `{columnValue}_{valueColumn}_{aggregation}`, or `{valueColumn}_{aggregation}`
/// without a column dimension.

use std::collections::HashMap;
use crate::types::{Aggregation, FilterLogic, InsightError, PivotConfig, PivotValue, Row, Table, Value, ValueKey};
use super::conditions::ConditionEvaluator;

pub struct PivotExecutor;

impl PivotExecutor {
    pub fn apply(table: &Table, config: &PivotConfig) -> Result<Table, InsightError> {
        if config.values.is_empty() {
            return Err(InsightError::InvalidOperation("pivot needs at least one value column".to_string()));
        }

        let visible = table
            .rows
            .iter()
            .filter(|row| ConditionEvaluator::evaluate_all(row, &config.filters, FilterLogic::And));

        // first-seen order for both dimensions
        let mut row_groups: HashMap<Vec<ValueKey>, usize> = HashMap::new();
        let mut row_heads: Vec<Row> = Vec::new();
        let mut col_groups: HashMap<Vec<ValueKey>, usize> = HashMap::new();
        let mut col_labels: Vec<String> = Vec::new();
        let mut cells: HashMap<(usize, usize), Vec<&Row>> = HashMap::new();

        for row in visible {
            let r = *row_groups.entry(row.key(&config.rows, false)).or_insert_with(|| {
                row_heads.push(row.project(&config.rows));
                row_heads.len() - 1
            });
            let c = *col_groups.entry(row.key(&config.columns, false)).or_insert_with(|| {
                col_labels.push(
                    config
                        .columns
                        .iter()
                        .map(|col| row.get(col).to_string())
                        .collect::<Vec<_>>()
                        .join("_"),
                );
                col_labels.len() - 1
            });
            cells.entry((r, c)).or_default().push(row);
        }

        let mut columns = config.rows.clone();
        for label in &col_labels {
            for spec in &config.values {
                columns.push(Self::output_name(&config.columns, label, spec));
            }
        }

        let mut rows = Vec::with_capacity(row_heads.len());
        for (r, head) in row_heads.into_iter().enumerate() {
            let mut out = head;
            for (c, label) in col_labels.iter().enumerate() {
                let group = cells.get(&(r, c)).map(Vec::as_slice);
                for spec in &config.values {
                    let value = match group {
                        Some(group) => Self::aggregate(group, spec),
                        None if spec.aggregation == Aggregation::Count => Value::Integer(0),
                        None => Value::Null,
                    };
                    out.set(Self::output_name(&config.columns, label, spec), value);
                }
            }
            rows.push(out);
        }

        Ok(table.derive_from(columns, rows))
    }

    fn output_name(column_dims: &[String], label: &str, spec: &PivotValue) -> String {
        if column_dims.is_empty() {
            format!("{}_{}", spec.column, spec.aggregation.as_str())
        } else {
            format!("{label}_{}_{}", spec.column, spec.aggregation.as_str())
        }
    }

    /// Aggregate over numeric-coerced non-null values; `count` counts non-null raw values.
    fn aggregate(rows: &[&Row], spec: &PivotValue) -> Value {
        let mut nums = rows.iter().filter_map(|r| r.get(&spec.column).as_number());
        match spec.aggregation {
            Aggregation::Count => {
                let count = rows.iter().filter(|r| !r.get(&spec.column).is_null()).count();
                Value::Integer(count as i64)
            }
            Aggregation::Sum => Value::from_f64(nums.sum()),
            Aggregation::Avg => {
                let (sum, n) = nums.fold((0.0, 0usize), |(s, n), x| (s + x, n + 1));
                if n == 0 { Value::Null } else { Value::from_f64(sum / n as f64) }
            }
            Aggregation::Max => nums.reduce(f64::max).map_or(Value::Null, Value::from_f64),
            Aggregation::Min => nums.reduce(f64::min).map_or(Value::Null, Value::from_f64),
            Aggregation::First => nums.next().map_or(Value::Null, Value::from_f64),
            Aggregation::Last => nums.last().map_or(Value::Null, Value::from_f64),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FilterCondition, FilterOperator};

    fn sales() -> Table {
        Table::new(
            "sales",
            vec!["id".into(), "dept".into(), "amt".into()],
            vec![
                Row::from_pairs([("id", Value::Integer(1)), ("dept", Value::from("A")), ("amt", Value::Integer(10))]),
                Row::from_pairs([("id", Value::Integer(2)), ("dept", Value::from("A")), ("amt", Value::Integer(20))]),
                Row::from_pairs([("id", Value::Integer(3)), ("dept", Value::from("B")), ("amt", Value::Integer(5))]),
            ],
        )
    }

    fn value(column: &str, aggregation: Aggregation) -> PivotValue {
        PivotValue { column: column.into(), aggregation }
    }

    #[test]
    fn test_sum_by_dept() {
        let config = PivotConfig {
            rows: vec!["dept".into()],
            values: vec![value("amt", Aggregation::Sum)],
            ..PivotConfig::default()
        };
        let out = PivotExecutor::apply(&sales(), &config).unwrap();
        assert_eq!(out.columns, vec!["dept", "amt_sum"]);
        assert_eq!(
            out.rows,
            vec![
                Row::from_pairs([("dept", Value::from("A")), ("amt_sum", Value::Integer(30))]),
                Row::from_pairs([("dept", Value::from("B")), ("amt_sum", Value::Integer(5))]),
            ]
        );
    }

    #[test]
    fn test_column_dimension_names() {
        let config = PivotConfig {
            rows: vec![],
            columns: vec!["dept".into()],
            values: vec![value("amt", Aggregation::Avg), value("amt", Aggregation::Count)],
            filters: vec![],
        };
        let out = PivotExecutor::apply(&sales(), &config).unwrap();
        assert_eq!(out.columns, vec!["A_amt_avg", "A_amt_count", "B_amt_avg", "B_amt_count"]);
        assert_eq!(out.row_count(), 1);
        assert_eq!(out.rows[0].get("A_amt_avg"), &Value::Integer(15));
        assert_eq!(out.rows[0].get("B_amt_count"), &Value::Integer(1));
    }

    #[test]
    fn test_empty_combination() {
        let config = PivotConfig {
            rows: vec!["id".into()],
            columns: vec!["dept".into()],
            values: vec![value("amt", Aggregation::Max), value("amt", Aggregation::Count)],
            filters: vec![],
        };
        let out = PivotExecutor::apply(&sales(), &config).unwrap();
        let first = &out.rows[0];
        assert_eq!(first.get("A_amt_max"), &Value::Integer(10));
        assert!(first.get("B_amt_max").is_null());
        assert_eq!(first.get("B_amt_count"), &Value::Integer(0));
    }

    #[test]
    fn test_pre_filter_and_non_numeric_values() {
        let mut table = sales();
        table.rows.push(Row::from_pairs([("id", Value::Integer(4)), ("dept", Value::from("B")), ("amt", Value::from("n/a"))]));
        let config = PivotConfig {
            rows: vec!["dept".into()],
            columns: vec![],
            values: vec![
                value("amt", Aggregation::Min),
                value("amt", Aggregation::Count),
                value("amt", Aggregation::Last),
            ],
            filters: vec![FilterCondition::new("dept", FilterOperator::Equals, "B")],
        };
        let out = PivotExecutor::apply(&table, &config).unwrap();
        assert_eq!(out.row_count(), 1);
        assert_eq!(out.rows[0].get("amt_min"), &Value::Integer(5));
        assert_eq!(out.rows[0].get("amt_count"), &Value::Integer(2));
        assert_eq!(out.rows[0].get("amt_last"), &Value::Integer(5));
    }

    #[test]
    fn test_requires_values() {
        let config = PivotConfig { rows: vec!["dept".into()], ..PivotConfig::default() };
        assert!(matches!(PivotExecutor::apply(&sales(), &config), Err(InsightError::InvalidOperation(_))));
    }
}
