/// Derived columns from sandboxed formulas
///
/// Evaluation failures are soft: the failing cell becomes null and the operation
/// still succeeds. A formula that does not parse, or that reads a column the table
/// does not declare, nulls the whole column.

use tracing::{debug, warn};
use crate::formula::Formula;
use crate::types::{DeriveConfig, InsightError, Table, Value};

pub struct DeriveExecutor;

impl DeriveExecutor {
    pub fn apply(table: &Table, config: &DeriveConfig) -> Result<Table, InsightError> {
        if config.column.trim().is_empty() {
            return Err(InsightError::InvalidOperation("derive needs an output column name".to_string()));
        }

        let formula = match Formula::compile(&config.formula) {
            Ok(formula) => {
                let unknown: Vec<String> = formula
                    .columns()
                    .into_iter()
                    .filter(|c| !table.has_column(c))
                    .collect();
                if unknown.is_empty() {
                    Some(formula)
                } else {
                    warn!(column = %config.column, unknown = ?unknown, "formula references unknown columns");
                    None
                }
            }
            Err(e) => {
                warn!(column = %config.column, formula = %config.formula, error = %e, "formula does not parse");
                None
            }
        };

        let mut failures = 0usize;
        let rows = table
            .rows
            .iter()
            .map(|row| {
                let value = match &formula {
                    Some(formula) => formula.evaluate(row).unwrap_or_else(|e| {
                        failures += 1;
                        debug!(column = %config.column, error = %e, "formula failed for row");
                        Value::Null
                    }),
                    None => Value::Null,
                };
                let mut out = row.clone();
                out.set(config.column.clone(), value);
                out
            })
            .collect();

        if failures > 0 {
            warn!(column = %config.column, failures, "formula produced null cells");
        }

        let mut columns = table.columns.clone();
        if !columns.contains(&config.column) {
            columns.push(config.column.clone());
        }
        Ok(table.derive_from(columns, rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Row;

    fn orders() -> Table {
        Table::new(
            "orders",
            vec!["item".into(), "qty".into(), "price".into()],
            vec![
                Row::from_pairs([("item", Value::from("pen")), ("qty", Value::Integer(3)), ("price", Value::Real(1.5))]),
                Row::from_pairs([("item", Value::from("ink")), ("qty", Value::Integer(0)), ("price", Value::from("n/a"))]),
            ],
        )
    }

    fn derive(column: &str, formula: &str) -> DeriveConfig {
        DeriveConfig { column: column.into(), formula: formula.into() }
    }

    #[test]
    fn test_appends_column() {
        let out = DeriveExecutor::apply(&orders(), &derive("label", "UPPER(item) + ':' + qty")).unwrap();
        assert_eq!(out.columns, vec!["item", "qty", "price", "label"]);
        assert_eq!(out.rows[0].get("label"), &Value::from("PEN:3"));
    }

    #[test]
    fn test_failing_cell_is_null_only_for_that_row() {
        let out = DeriveExecutor::apply(&orders(), &derive("total", "qty * price")).unwrap();
        assert_eq!(out.rows[0].get("total"), &Value::Real(4.5));
        assert!(out.rows[1].get("total").is_null());
        assert!(out.rows[1].contains("total"));
    }

    #[test]
    fn test_replaces_existing_column_in_place() {
        let out = DeriveExecutor::apply(&orders(), &derive("qty", "qty + 1")).unwrap();
        assert_eq!(out.columns, vec!["item", "qty", "price"]);
        assert_eq!(out.rows[1].get("qty"), &Value::Integer(1));
    }

    #[test]
    fn test_unparsable_formula_nulls_column() {
        let out = DeriveExecutor::apply(&orders(), &derive("x", "qty +* 2")).unwrap();
        assert!(out.rows.iter().all(|r| r.get("x").is_null()));
        let out = DeriveExecutor::apply(&orders(), &derive("x", "missing + 1")).unwrap();
        assert!(out.rows.iter().all(|r| r.get("x").is_null()));
    }

    #[test]
    fn test_non_ascii_column_names() {
        let table = Table::new(
            "销售",
            vec!["销售额".into()],
            vec![Row::from_pairs([("销售额", Value::Integer(10))])],
        );
        let out = DeriveExecutor::apply(&table, &derive("翻倍", "销售额 * 2")).unwrap();
        assert_eq!(out.rows[0].get("翻倍"), &Value::Integer(20));
        let out = DeriveExecutor::apply(&table, &derive("翻倍", "[销售额] * 2")).unwrap();
        assert_eq!(out.rows[0].get("翻倍"), &Value::Integer(20));
    }

    #[test]
    fn test_deeply_nested_formula_nulls_column() {
        let formula = format!("{}qty{}", "(".repeat(50_000), ")".repeat(50_000));
        let out = DeriveExecutor::apply(&orders(), &derive("x", &formula)).unwrap();
        assert!(out.rows.iter().all(|r| r.get("x").is_null()));

        let out = DeriveExecutor::apply(&orders(), &derive("x", &format!("{}qty", "-".repeat(50_000)))).unwrap();
        assert!(out.rows.iter().all(|r| r.get("x").is_null()));
    }

    #[test]
    fn test_code_is_not_executable() {
        let out = DeriveExecutor::apply(&orders(), &derive("x", "process.exit(1)")).unwrap();
        assert!(out.rows[0].get("x").is_null());
    }

    #[test]
    fn test_requires_column_name() {
        assert!(DeriveExecutor::apply(&orders(), &derive(" ", "1")).is_err());
    }
}
