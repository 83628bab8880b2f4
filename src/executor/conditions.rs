/// Condition evaluation for Filter and the Pivot pre-filter
///
/// Supports: equals, notEquals (string-compared), greaterThan, lessThan,
/// greaterOrEqual, lessOrEqual (numeric-coerced), contains, startsWith, endsWith
/// (string-compared), isNull, isNotNull; combined with AND or OR.

use std::cmp::Ordering;
use crate::types::{FilterCondition, FilterConfig, FilterLogic, FilterOperator, Row, Table, Value};

pub struct ConditionEvaluator;

impl ConditionEvaluator {
    /// Keep the rows satisfying the combined predicate, in original order.
    #[must_use]
    pub fn filter(table: &Table, config: &FilterConfig) -> Table {
        let rows = table
            .rows
            .iter()
            .filter(|row| Self::evaluate_all(row, &config.conditions, config.logic))
            .cloned()
            .collect();
        table.derive_from(table.columns.clone(), rows)
    }

    /// Combine conditions with `logic`. An empty list accepts every row.
    #[must_use]
    pub fn evaluate_all(row: &Row, conditions: &[FilterCondition], logic: FilterLogic) -> bool {
        if conditions.is_empty() {
            return true;
        }
        match logic {
            FilterLogic::And => conditions.iter().all(|c| Self::evaluate(row, c)),
            FilterLogic::Or => conditions.iter().any(|c| Self::evaluate(row, c)),
        }
    }

    /// Evaluate one condition against a row. Columns the row lacks read as null.
    #[must_use]
    pub fn evaluate(row: &Row, condition: &FilterCondition) -> bool {
        let cell = row.get(&condition.column);
        let target = &condition.value;
        match condition.operator {
            FilterOperator::Equals => Self::string_equals(cell, target),
            FilterOperator::NotEquals => !Self::string_equals(cell, target),
            FilterOperator::GreaterThan => Self::compare_numbers(cell, target) == Some(Ordering::Greater),
            FilterOperator::LessThan => Self::compare_numbers(cell, target) == Some(Ordering::Less),
            FilterOperator::GreaterOrEqual => matches!(
                Self::compare_numbers(cell, target),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            FilterOperator::LessOrEqual => matches!(
                Self::compare_numbers(cell, target),
                Some(Ordering::Less | Ordering::Equal)
            ),
            FilterOperator::Contains => {
                Self::match_text(cell, target, |text, needle| text.contains(needle))
            }
            FilterOperator::StartsWith => {
                Self::match_text(cell, target, |text, needle| text.starts_with(needle))
            }
            FilterOperator::EndsWith => {
                Self::match_text(cell, target, |text, needle| text.ends_with(needle))
            }
            FilterOperator::IsNull => cell.is_null(),
            FilterOperator::IsNotNull => !cell.is_null(),
        }
    }

    /// Equality on display strings; null only equals null
    fn string_equals(cell: &Value, target: &Value) -> bool {
        match (cell.is_null(), target.is_null()) {
            (true, true) => true,
            (false, false) => cell.to_string() == target.to_string(),
            _ => false,
        }
    }

    /// Numeric ordering after coercion; `None` when either side is not a number
    fn compare_numbers(cell: &Value, target: &Value) -> Option<Ordering> {
        let a = cell.as_number()?;
        let b = target.as_number()?;
        a.partial_cmp(&b)
    }

    fn match_text(cell: &Value, target: &Value, pred: impl Fn(&str, &str) -> bool) -> bool {
        if cell.is_null() {
            return false;
        }
        pred(&cell.to_string(), &target.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_row() -> Row {
        Row::from_pairs([
            ("id", Value::Integer(1)),
            ("name", Value::from("Alice")),
            ("age", Value::Integer(30)),
            ("score", Value::from("87.5")),
            ("note", Value::Null),
        ])
    }

    fn cond(column: &str, operator: FilterOperator, value: impl Into<Value>) -> FilterCondition {
        FilterCondition::new(column, operator, value)
    }

    #[test]
    fn test_equals_condition() {
        let row = create_test_row();
        assert!(ConditionEvaluator::evaluate(&row, &cond("name", FilterOperator::Equals, "Alice")));
        assert!(!ConditionEvaluator::evaluate(&row, &cond("name", FilterOperator::Equals, "Bob")));
        // string-compared: number cell vs text target
        assert!(ConditionEvaluator::evaluate(&row, &cond("age", FilterOperator::Equals, "30")));
    }

    #[test]
    fn test_not_equals_condition() {
        let row = create_test_row();
        assert!(ConditionEvaluator::evaluate(&row, &cond("age", FilterOperator::NotEquals, 25)));
        assert!(!ConditionEvaluator::evaluate(&row, &cond("age", FilterOperator::NotEquals, 30)));
    }

    #[test]
    fn test_null_equality() {
        let row = create_test_row();
        assert!(ConditionEvaluator::evaluate(&row, &cond("note", FilterOperator::Equals, Value::Null)));
        assert!(!ConditionEvaluator::evaluate(&row, &cond("note", FilterOperator::Equals, "")));
        assert!(!ConditionEvaluator::evaluate(&row, &cond("name", FilterOperator::Equals, Value::Null)));
    }

    #[test]
    fn test_numeric_comparisons_coerce_text() {
        let row = create_test_row();
        assert!(ConditionEvaluator::evaluate(&row, &cond("score", FilterOperator::GreaterThan, 80)));
        assert!(ConditionEvaluator::evaluate(&row, &cond("score", FilterOperator::LessThan, "90")));
        assert!(ConditionEvaluator::evaluate(&row, &cond("age", FilterOperator::GreaterOrEqual, 30)));
        assert!(ConditionEvaluator::evaluate(&row, &cond("age", FilterOperator::LessOrEqual, 30)));
        assert!(!ConditionEvaluator::evaluate(&row, &cond("age", FilterOperator::GreaterThan, 35)));
    }

    #[test]
    fn test_numeric_comparison_with_non_number_is_false() {
        let row = create_test_row();
        assert!(!ConditionEvaluator::evaluate(&row, &cond("name", FilterOperator::GreaterThan, 1)));
        assert!(!ConditionEvaluator::evaluate(&row, &cond("name", FilterOperator::LessThan, 1)));
        assert!(!ConditionEvaluator::evaluate(&row, &cond("note", FilterOperator::LessOrEqual, 1)));
    }

    #[test]
    fn test_string_operators() {
        let row = create_test_row();
        assert!(ConditionEvaluator::evaluate(&row, &cond("name", FilterOperator::Contains, "lic")));
        assert!(ConditionEvaluator::evaluate(&row, &cond("name", FilterOperator::StartsWith, "Al")));
        assert!(ConditionEvaluator::evaluate(&row, &cond("name", FilterOperator::EndsWith, "ce")));
        assert!(!ConditionEvaluator::evaluate(&row, &cond("name", FilterOperator::StartsWith, "al")));
        assert!(!ConditionEvaluator::evaluate(&row, &cond("note", FilterOperator::Contains, "")));
    }

    #[test]
    fn test_is_null_and_unknown_column() {
        let row = create_test_row();
        assert!(ConditionEvaluator::evaluate(&row, &cond("note", FilterOperator::IsNull, Value::Null)));
        assert!(ConditionEvaluator::evaluate(&row, &cond("missing", FilterOperator::IsNull, Value::Null)));
        assert!(ConditionEvaluator::evaluate(&row, &cond("name", FilterOperator::IsNotNull, Value::Null)));
    }

    #[test]
    fn test_and_or_logic() {
        let row = create_test_row();
        let conditions = vec![
            cond("name", FilterOperator::Equals, "Bob"),
            cond("age", FilterOperator::GreaterThan, 25),
        ];
        assert!(!ConditionEvaluator::evaluate_all(&row, &conditions, FilterLogic::And));
        assert!(ConditionEvaluator::evaluate_all(&row, &conditions, FilterLogic::Or));
        assert!(ConditionEvaluator::evaluate_all(&row, &[], FilterLogic::Or));
    }

    #[test]
    fn test_filter_preserves_order() {
        let rows: Vec<Row> = (1..=6)
            .map(|i| Row::from_pairs([("n", Value::Integer(i))]))
            .collect();
        let table = Table::new("numbers", vec!["n".to_string()], rows);
        let config = FilterConfig {
            conditions: vec![
                cond("n", FilterOperator::LessThan, 3),
                cond("n", FilterOperator::GreaterThan, 4),
            ],
            logic: FilterLogic::Or,
        };
        let out = ConditionEvaluator::filter(&table, &config);
        let ns: Vec<&Value> = out.rows.iter().map(|r| r.get("n")).collect();
        assert_eq!(ns, vec![&Value::Integer(1), &Value::Integer(2), &Value::Integer(5), &Value::Integer(6)]);
        assert_eq!(out.row_count(), 4);
        assert_eq!(table.row_count(), 6);
    }
}
