use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;
use super::value::Value;

/// One declarative transform step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub id: String,
    pub name: String,
    pub kind: OperationKind,
}

impl Operation {
    #[must_use]
    pub fn new(name: impl Into<String>, kind: OperationKind) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            kind,
        }
    }
}

/// Closed set of operation variants; dispatch is an exhaustive match.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum OperationKind {
    Join(JoinConfig),
    Filter(FilterConfig),
    Pivot(PivotConfig),
    Reshape(ReshapeConfig),
    Transform(TransformConfig),
    Dedup(DedupConfig),
    Sample(SampleConfig),
    Derive(DeriveConfig),
    Output(OutputConfig),
}

impl OperationKind {
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Join(_) => "join",
            Self::Filter(_) => "filter",
            Self::Pivot(_) => "pivot",
            Self::Reshape(_) => "reshape",
            Self::Transform(_) => "transform",
            Self::Dedup(_) => "dedup",
            Self::Sample(_) => "sample",
            Self::Derive(_) => "derive",
            Self::Output(_) => "output",
        }
    }
}

// --- Filter ---

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum FilterOperator {
    Equals,
    NotEquals,
    GreaterThan,
    LessThan,
    GreaterOrEqual,
    LessOrEqual,
    Contains,
    StartsWith,
    EndsWith,
    IsNull,
    IsNotNull,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum FilterLogic {
    #[default]
    And,
    Or,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FilterCondition {
    pub column: String,
    pub operator: FilterOperator,
    #[serde(default)]
    pub value: Value,
}

impl FilterCondition {
    pub fn new(column: impl Into<String>, operator: FilterOperator, value: impl Into<Value>) -> Self {
        Self { column: column.into(), operator, value: value.into() }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FilterConfig {
    pub conditions: Vec<FilterCondition>,
    #[serde(default)]
    pub logic: FilterLogic,
}

// --- Transform ---

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum FormatKind {
    Date,
    Number,
    Text,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum ColumnAction {
    Rename {
        from: String,
        to: String,
    },
    #[serde(rename_all = "camelCase")]
    Split {
        column: String,
        separator: String,
        /// Names for the produced columns; derived from the data when empty
        #[serde(default)]
        new_columns: Vec<String>,
    },
    #[serde(rename_all = "camelCase")]
    Merge {
        columns: Vec<String>,
        separator: String,
        new_column: String,
    },
    Format {
        column: String,
        kind: FormatKind,
        pattern: String,
    },
    Remove {
        columns: Vec<String>,
    },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TransformConfig {
    pub actions: Vec<ColumnAction>,
}

// --- Dedup ---

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum KeepPolicy {
    #[default]
    First,
    Last,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DedupConfig {
    /// Key columns; the whole declared row when empty
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub keep: KeepPolicy,
    #[serde(default)]
    pub case_insensitive: bool,
}

// --- Reshape ---

fn default_var_name() -> String {
    "variable".to_string()
}

fn default_value_name() -> String {
    "value".to_string()
}

/// Wide -> long.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MeltConfig {
    pub id_vars: Vec<String>,
    /// All non-id columns when empty
    #[serde(default)]
    pub value_vars: Vec<String>,
    #[serde(default = "default_var_name")]
    pub var_name: String,
    #[serde(default = "default_value_name")]
    pub value_name: String,
}

impl MeltConfig {
    #[must_use]
    pub fn new(id_vars: Vec<String>, value_vars: Vec<String>) -> Self {
        Self {
            id_vars,
            value_vars,
            var_name: default_var_name(),
            value_name: default_value_name(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

/// `"dept"` or `["dept", "year"]`
fn one_or_many<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(column) => vec![column],
        OneOrMany::Many(columns) => columns,
    })
}

/// Long -> wide.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WidenConfig {
    #[serde(deserialize_with = "one_or_many")]
    pub index: Vec<String>,
    pub columns: String,
    pub values: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum ReshapeConfig {
    Melt(MeltConfig),
    Pivot(WidenConfig),
}

// --- Pivot (grouping / aggregation) ---

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Aggregation {
    Sum,
    Avg,
    Count,
    Max,
    Min,
    First,
    Last,
}

impl Aggregation {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Sum => "sum",
            Self::Avg => "avg",
            Self::Count => "count",
            Self::Max => "max",
            Self::Min => "min",
            Self::First => "first",
            Self::Last => "last",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PivotValue {
    pub column: String,
    pub aggregation: Aggregation,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PivotConfig {
    #[serde(default)]
    pub rows: Vec<String>,
    #[serde(default)]
    pub columns: Vec<String>,
    pub values: Vec<PivotValue>,
    /// Pre-filter, AND-combined
    #[serde(default)]
    pub filters: Vec<FilterCondition>,
}

// --- Sample ---

const fn default_seed() -> u64 {
    42
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "method", rename_all = "camelCase")]
pub enum SampleSize {
    Count { count: usize },
    Percentage { percentage: f64 },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SampleConfig {
    pub size: SampleSize,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

// --- Derive ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeriveConfig {
    /// Output column
    pub column: String,
    pub formula: String,
}

// --- Join ---

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum JoinType {
    #[default]
    Inner,
    Left,
    Right,
    Full,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct JoinConfig {
    /// Identity of the right-hand table
    pub right_table: String,
    #[serde(default)]
    pub join_type: JoinType,
    pub left_key: String,
    pub right_key: String,
}

// --- Output ---

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ExportFormat {
    #[default]
    Csv,
    Excel,
    Json,
    Markdown,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OutputConfig {
    #[serde(default)]
    pub format: ExportFormat,
    #[serde(default)]
    pub file_name: Option<String>,
}
