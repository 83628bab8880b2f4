use thiserror::Error;

#[derive(Error, Debug)]
pub enum InsightError {
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("Formula error: {0}")]
    Formula(String),
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
    #[error("Column '{0}' not found")]
    ColumnNotFound(String),
    #[error("Table '{0}' not found")]
    TableNotFound(String),
    #[error("Operation '{0}' needs multi-table context")]
    NeedsMultiTableContext(String),
    #[error("Execution engine '{0}' is not available")]
    EngineUnavailable(String),
    #[error("Operation chain cancelled before step {step}")]
    Cancelled { step: usize },
    #[error("Version conflict on '{id}': expected {expected}, found {found}")]
    VersionConflict { id: String, expected: u64, found: u64 },
    #[error("Schema version mismatch: found {found}, expected {expected}")]
    SchemaMismatch { found: u32, expected: u32 },
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("Compression error: {0}")]
    Compression(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Binary Serialization error: {0}")]
    BinarySerialization(String),
}

impl InsightError {
    /// Operation errors abort the whole chain; everything else is I/O or input related.
    #[must_use]
    pub const fn is_operation_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidOperation(_)
                | Self::ColumnNotFound(_)
                | Self::TableNotFound(_)
                | Self::NeedsMultiTableContext(_)
        )
    }
}
