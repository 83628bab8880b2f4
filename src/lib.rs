// InsightEase - client-resident tabular data engine
// Declarative operation chains, engine selection and a compressed local store

// Clippy configuration
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::significant_drop_tightening)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::multiple_crate_versions)]

// Table model, operation model, chains and the error type
pub mod core;

// Backward compatibility - re-export all core types as types module
pub mod types {
    pub use crate::core::*;
}

// Operation executor (one family per file) and the chain runner
pub mod executor;

// Sandboxed expression language for derived columns
pub mod formula;

// Engine selection by size and complexity
pub mod engine;

// Local persistent store (compression, collections, datasets, chains, cache)
pub mod storage;

// CSV/JSON ingestion
pub mod ingest;

// Column statistics and quality score
pub mod profile;

// Layered runtime configuration
pub mod config;

// Re-export commonly used types for convenience
pub use core::{InsightError, Operation, OperationChain, OperationKind, Row, Table, Value};
pub use executor::{CancellationToken, ChainProgress, ChainRunner, OperationExecutor, TableResolver};
pub use engine::{EngineDecision, EngineSelector, EngineThresholds, ExecutionEngine};
pub use formula::Formula;
pub use storage::LocalStore;
pub use config::InsightConfig;
