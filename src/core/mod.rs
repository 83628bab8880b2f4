// Module declarations
pub mod error;
pub mod value;
pub mod row;
pub mod table;
pub mod operation;
pub mod chain;

// Re-exports for convenience
pub use error::InsightError;
pub use value::{Value, ValueKey};
pub use row::Row;
pub use table::{Table, TableSource};
pub use operation::{
    Aggregation, ColumnAction, DedupConfig, DeriveConfig, ExportFormat, FilterCondition,
    FilterConfig, FilterLogic, FilterOperator, FormatKind, JoinConfig, JoinType, KeepPolicy,
    MeltConfig, Operation, OperationKind, OutputConfig, PivotConfig, PivotValue, ReshapeConfig,
    SampleConfig, SampleSize, TransformConfig, WidenConfig,
};
pub use chain::OperationChain;
