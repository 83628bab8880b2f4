/// Engine selector - decides where an operation chain should run
///
/// Each operation type carries a static complexity class. Simple and moderate work
/// stays in-process while the table is within the class thresholds; complex work
/// (pivot, join) always goes to the embedded analytical engine. The decision is
/// advisory: nothing is executed here.

use serde::{Deserialize, Serialize};
use crate::types::{Operation, OperationKind, Table};

/// Where a chain runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExecutionEngine {
    InProcess,
    EmbeddedAnalytical,
}

impl std::fmt::Display for ExecutionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InProcess => write!(f, "in-process"),
            Self::EmbeddedAnalytical => write!(f, "embedded-analytical"),
        }
    }
}

/// Static cost class of an operation type
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Complexity {
    Simple,
    Moderate,
    Complex,
}

impl Complexity {
    #[must_use]
    pub const fn of(kind: &OperationKind) -> Self {
        match kind {
            OperationKind::Filter(_)
            | OperationKind::Dedup(_)
            | OperationKind::Sample(_)
            | OperationKind::Derive(_)
            | OperationKind::Output(_) => Self::Simple,
            OperationKind::Transform(_) | OperationKind::Reshape(_) => Self::Moderate,
            OperationKind::Pivot(_) | OperationKind::Join(_) => Self::Complex,
        }
    }

    /// Rough per-cell cost in microseconds, used only for the time hint.
    const fn micros_per_cell(self, engine: ExecutionEngine) -> f64 {
        match (self, engine) {
            (Self::Simple, ExecutionEngine::InProcess) => 0.5,
            (Self::Moderate, ExecutionEngine::InProcess) => 2.0,
            (Self::Complex, ExecutionEngine::InProcess) => 8.0,
            (Self::Simple, ExecutionEngine::EmbeddedAnalytical) => 0.2,
            (Self::Moderate, ExecutionEngine::EmbeddedAnalytical) => 0.5,
            (Self::Complex, ExecutionEngine::EmbeddedAnalytical) => 1.5,
        }
    }
}

impl std::fmt::Display for Complexity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Simple => write!(f, "simple"),
            Self::Moderate => write!(f, "moderate"),
            Self::Complex => write!(f, "complex"),
        }
    }
}

/// Runtime-tunable limits for staying in-process
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineThresholds {
    pub simple_max_rows: usize,
    pub simple_max_density: f64,
    pub moderate_max_rows: usize,
    pub moderate_max_density: f64,
}

impl Default for EngineThresholds {
    fn default() -> Self {
        Self {
            simple_max_rows: 200_000,
            simple_max_density: 1000.0,
            moderate_max_rows: 50_000,
            moderate_max_density: 1000.0,
        }
    }
}

/// Advisory dispatch decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineDecision {
    pub engine: ExecutionEngine,
    pub reason: String,
    /// Rough wall-clock estimate; a UI hint, not a guarantee
    pub estimated_ms: u64,
    pub complexity: Complexity,
    pub row_count: usize,
    pub density: f64,
}

impl EngineDecision {
    /// Human-readable form of `estimated_ms`.
    #[must_use]
    pub fn estimated_time(&self) -> String {
        match self.estimated_ms {
            0..=999 => "< 1s".to_string(),
            ms @ 1000..=59_999 => format!("~{}s", ms.div_ceil(1000)),
            ms => format!("~{} min", ms.div_ceil(60_000)),
        }
    }

    #[must_use]
    pub fn is_escalated(&self) -> bool {
        self.engine == ExecutionEngine::EmbeddedAnalytical
    }
}

/// `rows x columns / 1000`
#[must_use]
pub fn density_score(row_count: usize, col_count: usize) -> f64 {
    (row_count as f64 * col_count as f64) / 1000.0
}

#[derive(Debug, Clone, Default)]
pub struct EngineSelector {
    thresholds: EngineThresholds,
}

impl EngineSelector {
    #[must_use]
    pub const fn new(thresholds: EngineThresholds) -> Self {
        Self { thresholds }
    }

    #[must_use]
    pub const fn thresholds(&self) -> &EngineThresholds {
        &self.thresholds
    }

    pub fn set_thresholds(&mut self, thresholds: EngineThresholds) {
        self.thresholds = thresholds;
    }

    /// Decision for a single operation.
    #[must_use]
    pub fn choose(&self, table: &Table, operation: &Operation) -> EngineDecision {
        let complexity = Complexity::of(&operation.kind);
        let (engine, why) = self.classify(table.row_count(), table.col_count(), complexity);
        let reason = format!("{} is {complexity}: {why}", operation.kind.type_name());
        Self::decision(table, engine, complexity, reason, &[complexity])
    }

    /// One decision for the whole chain; any escalating step escalates the chain.
    #[must_use]
    pub fn choose_for_chain(&self, table: &Table, operations: &[Operation]) -> EngineDecision {
        if operations.is_empty() {
            return Self::decision(
                table,
                ExecutionEngine::InProcess,
                Complexity::Simple,
                "empty chain".to_string(),
                &[],
            );
        }

        let classes: Vec<Complexity> = operations.iter().map(|op| Complexity::of(&op.kind)).collect();
        let complexity = classes.iter().copied().max().unwrap_or(Complexity::Simple);

        let escalating = operations.iter().find_map(|op| {
            let class = Complexity::of(&op.kind);
            let (engine, why) = self.classify(table.row_count(), table.col_count(), class);
            (engine == ExecutionEngine::EmbeddedAnalytical)
                .then(|| format!("step '{}' ({}) escalates: {why}", op.name, op.kind.type_name()))
        });

        match escalating {
            Some(reason) => Self::decision(table, ExecutionEngine::EmbeddedAnalytical, complexity, reason, &classes),
            None => Self::decision(
                table,
                ExecutionEngine::InProcess,
                complexity,
                format!("all {} steps fit in-process limits", operations.len()),
                &classes,
            ),
        }
    }

    fn classify(&self, rows: usize, cols: usize, complexity: Complexity) -> (ExecutionEngine, String) {
        let density = density_score(rows, cols);
        let (max_rows, max_density) = match complexity {
            Complexity::Complex => {
                return (ExecutionEngine::EmbeddedAnalytical, "complex operations always escalate".to_string());
            }
            Complexity::Simple => (self.thresholds.simple_max_rows, self.thresholds.simple_max_density),
            Complexity::Moderate => (self.thresholds.moderate_max_rows, self.thresholds.moderate_max_density),
        };

        if rows > max_rows {
            (ExecutionEngine::EmbeddedAnalytical, format!("{rows} rows exceed the {max_rows} row limit"))
        } else if density > max_density {
            (ExecutionEngine::EmbeddedAnalytical, format!("density {density:.1} exceeds {max_density:.1}"))
        } else {
            (ExecutionEngine::InProcess, format!("{rows} rows, density {density:.1} within limits"))
        }
    }

    fn decision(
        table: &Table,
        engine: ExecutionEngine,
        complexity: Complexity,
        reason: String,
        steps: &[Complexity],
    ) -> EngineDecision {
        let cells = (table.row_count() * table.col_count().max(1)) as f64;
        let micros: f64 = steps.iter().map(|c| c.micros_per_cell(engine) * cells).sum();
        EngineDecision {
            engine,
            reason,
            estimated_ms: (micros / 1000.0).ceil() as u64,
            complexity,
            row_count: table.row_count(),
            density: density_score(table.row_count(), table.col_count()),
        }
    }
}
