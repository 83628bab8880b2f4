/// Executor module - applies operations to tables
///
/// Structure:
/// - dispatcher: single entry point, matches on the operation variant
/// - conditions: filter predicates (also the pivot pre-filter)
/// - transform: rename/split/merge/format/remove column actions
/// - dedup, reshape, pivot, sample, derive, join: one file per operation family
/// - runner: sequential chain execution, progress, cancellation, engine dispatch

pub mod dispatcher;
pub mod conditions;
pub mod transform;
pub mod dedup;
pub mod reshape;
pub mod pivot;
pub mod sample;
pub mod derive;
pub mod join;
pub mod runner;

pub use dispatcher::{NoTables, OperationExecutor, TableResolver};
pub use conditions::ConditionEvaluator;
pub use transform::TransformExecutor;
pub use dedup::DedupExecutor;
pub use reshape::ReshapeExecutor;
pub use pivot::PivotExecutor;
pub use sample::{Lcg, SampleExecutor};
pub use derive::DeriveExecutor;
pub use join::JoinExecutor;
pub use runner::{AnalyticalBackend, CancellationToken, ChainProgress, ChainRunner};
