use std::collections::HashMap;
use tracing::debug;
use crate::types::{InsightError, Operation, OperationKind, Table};

use super::conditions::ConditionEvaluator;
use super::dedup::DedupExecutor;
use super::derive::DeriveExecutor;
use super::join::JoinExecutor;
use super::pivot::PivotExecutor;
use super::reshape::ReshapeExecutor;
use super::sample::SampleExecutor;
use super::transform::TransformExecutor;

/// Looks up the second table of a join by identity.
pub trait TableResolver {
    fn resolve(&self, id: &str) -> Option<&Table>;
}

impl TableResolver for HashMap<String, Table> {
    fn resolve(&self, id: &str) -> Option<&Table> {
        self.get(id)
    }
}

impl TableResolver for [Table] {
    fn resolve(&self, id: &str) -> Option<&Table> {
        self.iter().find(|t| t.id == id)
    }
}

impl TableResolver for Vec<Table> {
    fn resolve(&self, id: &str) -> Option<&Table> {
        self.as_slice().resolve(id)
    }
}

/// Resolver with no tables; joins always fail with `TableNotFound`.
pub struct NoTables;

impl TableResolver for NoTables {
    fn resolve(&self, _id: &str) -> Option<&Table> {
        None
    }
}

pub struct OperationExecutor;

impl OperationExecutor {
    /// Applies one operation to `table`, returning a new derived table.
    ///
    /// Join needs a second table and fails with `NeedsMultiTableContext` here;
    /// use [`OperationExecutor::execute_with_tables`] for chains that join.
    pub fn execute(table: &Table, operation: &Operation) -> Result<Table, InsightError> {
        let out = match &operation.kind {
            OperationKind::Join(_) => {
                return Err(InsightError::NeedsMultiTableContext(operation.name.clone()));
            }
            OperationKind::Filter(config) => ConditionEvaluator::filter(table, config),
            OperationKind::Pivot(config) => PivotExecutor::apply(table, config)?,
            OperationKind::Reshape(config) => ReshapeExecutor::apply(table, config)?,
            OperationKind::Transform(config) => TransformExecutor::apply(table, config)?,
            OperationKind::Dedup(config) => DedupExecutor::apply(table, config),
            OperationKind::Sample(config) => SampleExecutor::apply(table, config)?,
            OperationKind::Derive(config) => DeriveExecutor::apply(table, config)?,
            // export formatting happens outside the executor
            OperationKind::Output(_) => table.derive_from(table.columns.clone(), table.rows.clone()),
        };
        debug!(
            operation = operation.kind.type_name(),
            rows_in = table.row_count(),
            rows_out = out.row_count(),
            cols_out = out.col_count(),
            "operation applied"
        );
        Ok(out)
    }

    /// Like [`OperationExecutor::execute`], resolving join partners through `tables`.
    pub fn execute_with_tables(
        table: &Table,
        operation: &Operation,
        tables: &dyn TableResolver,
    ) -> Result<Table, InsightError> {
        match &operation.kind {
            OperationKind::Join(config) => {
                let right = tables
                    .resolve(&config.right_table)
                    .ok_or_else(|| InsightError::TableNotFound(config.right_table.clone()))?;
                let out = JoinExecutor::apply(table, right, config)?;
                debug!(
                    operation = "join",
                    rows_in = table.row_count(),
                    rows_out = out.row_count(),
                    "operation applied"
                );
                Ok(out)
            }
            _ => Self::execute(table, operation),
        }
    }

    /// Two-table join entry point.
    pub fn join(left: &Table, right: &Table, config: &crate::types::JoinConfig) -> Result<Table, InsightError> {
        JoinExecutor::apply(left, right, config)
    }
}
