/// Chain runner - sequential execution with progress events and cancellation
///
/// Steps run strictly in order, each consuming the previous step's output. The
/// cancellation token is checked before every step; progress events are sent
/// after every completed step with a strictly increasing `step` index.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info};
use crate::engine::{EngineDecision, EngineSelector, ExecutionEngine};
use crate::types::{InsightError, Operation, Table};
use super::dispatcher::{OperationExecutor, TableResolver};

/// Cooperative cancellation flag shared between the caller and a running chain.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Emitted after each completed step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainProgress {
    /// Zero-based index of the step that just finished
    pub step: usize,
    pub total: usize,
    pub operation_id: String,
    pub operation_name: String,
    pub row_count: usize,
}

/// The heavier engine an escalated chain is handed to.
pub trait AnalyticalBackend: Send + Sync {
    fn name(&self) -> &str;

    fn run_chain(
        &self,
        table: &Table,
        operations: &[Operation],
        tables: &dyn TableResolver,
    ) -> Result<Table, InsightError>;
}

pub struct ChainRunner {
    selector: EngineSelector,
    backend: Option<Arc<dyn AnalyticalBackend>>,
    progress: Option<UnboundedSender<ChainProgress>>,
    cancel: CancellationToken,
}

impl ChainRunner {
    #[must_use]
    pub fn new(selector: EngineSelector) -> Self {
        Self {
            selector,
            backend: None,
            progress: None,
            cancel: CancellationToken::new(),
        }
    }

    #[must_use]
    pub fn with_backend(mut self, backend: Arc<dyn AnalyticalBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    #[must_use]
    pub fn with_progress(mut self, sender: UnboundedSender<ChainProgress>) -> Self {
        self.progress = Some(sender);
        self
    }

    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    #[must_use]
    pub const fn selector(&self) -> &EngineSelector {
        &self.selector
    }

    /// Decides with the selector, then dispatches the whole chain to one engine.
    pub fn run_auto(
        &self,
        table: &Table,
        operations: &[Operation],
        tables: &dyn TableResolver,
    ) -> Result<(EngineDecision, Table), InsightError> {
        let decision = self.selector.choose_for_chain(table, operations);
        info!(engine = %decision.engine, reason = %decision.reason, "engine selected");
        let out = self.run(table, operations, decision.engine, tables)?;
        Ok((decision, out))
    }

    /// Runs on the given engine. Escalation without a registered backend is an error.
    pub fn run(
        &self,
        table: &Table,
        operations: &[Operation],
        engine: ExecutionEngine,
        tables: &dyn TableResolver,
    ) -> Result<Table, InsightError> {
        match engine {
            ExecutionEngine::InProcess => self.run_in_process(table, operations, tables),
            ExecutionEngine::EmbeddedAnalytical => {
                let backend = self
                    .backend
                    .as_ref()
                    .ok_or_else(|| InsightError::EngineUnavailable(engine.to_string()))?;
                if self.cancel.is_cancelled() {
                    return Err(InsightError::Cancelled { step: 0 });
                }
                debug!(backend = backend.name(), steps = operations.len(), "delegating chain");
                backend.run_chain(table, operations, tables)
            }
        }
    }

    /// Forces the in-process evaluator regardless of size.
    pub fn run_in_process(
        &self,
        table: &Table,
        operations: &[Operation],
        tables: &dyn TableResolver,
    ) -> Result<Table, InsightError> {
        let total = operations.len();
        let mut current = table.clone();

        for (step, operation) in operations.iter().enumerate() {
            if self.cancel.is_cancelled() {
                info!(step, total, "chain cancelled");
                return Err(InsightError::Cancelled { step });
            }

            current = OperationExecutor::execute_with_tables(&current, operation, tables)?;
            debug!(step, total, operation = %operation.name, rows = current.row_count(), "step finished");

            if let Some(sender) = &self.progress {
                // a dropped receiver only means nobody is watching
                let _ = sender.send(ChainProgress {
                    step,
                    total,
                    operation_id: operation.id.clone(),
                    operation_name: operation.name.clone(),
                    row_count: current.row_count(),
                });
            }
        }

        Ok(current)
    }
}

impl Default for ChainRunner {
    fn default() -> Self {
        Self::new(EngineSelector::default())
    }
}
