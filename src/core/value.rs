use serde::{Deserialize, Serialize};

/// Dynamically typed cell value.
///
/// Serializes as a plain JSON scalar so stored tables and operation configs stay
/// readable by any JSON consumer.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Boolean(bool),
    Integer(i64),
    Real(f64),
    Text(String),
}

/// Largest integer an f64 represents exactly (2^53).
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;

impl Value {
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Numeric coercion used by comparisons and aggregations.
    ///
    /// Integers and reals pass through, text is parsed after trimming, everything
    /// else has no numeric reading.
    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Integer(i) => Some(*i as f64),
            Self::Real(r) if r.is_finite() => Some(*r),
            Self::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return None;
                }
                trimmed.parse::<f64>().ok().filter(|n| n.is_finite())
            }
            _ => None,
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Builds a numeric value, preferring `Integer` when the number is integral.
    #[must_use]
    pub fn from_f64(n: f64) -> Self {
        if !n.is_finite() {
            return Self::Null;
        }
        if n.fract() == 0.0 && n.abs() < MAX_SAFE_INTEGER {
            Self::Integer(n as i64)
        } else {
            Self::Real(n)
        }
    }

    /// Truthiness used by formula conditionals.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Boolean(b) => *b,
            Self::Integer(i) => *i != 0,
            Self::Real(r) => *r != 0.0 && !r.is_nan(),
            Self::Text(s) => !s.is_empty(),
        }
    }

    /// Structured, hashable key for grouping and deduplication.
    #[must_use]
    pub fn key(&self) -> ValueKey {
        match self {
            Self::Null => ValueKey::Null,
            Self::Boolean(b) => ValueKey::Boolean(*b),
            Self::Integer(i) => ValueKey::Integer(*i),
            Self::Real(r) => match Self::from_f64(*r) {
                Self::Integer(i) => ValueKey::Integer(i),
                // -0.0 is integral and handled above, so bits are canonical here
                _ if r.is_nan() => ValueKey::Real(f64::NAN.to_bits()),
                _ => ValueKey::Real(r.to_bits()),
            },
            Self::Text(s) => ValueKey::Text(s.clone()),
        }
    }

    /// Same as [`Value::key`] but folds text to lowercase.
    #[must_use]
    pub fn key_case_insensitive(&self) -> ValueKey {
        match self {
            Self::Text(s) => ValueKey::Text(s.to_lowercase()),
            other => other.key(),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Real(r) => write!(f, "{r}"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Integer(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(r: f64) -> Self {
        Self::Real(r)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl<T: Into<Self>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

impl From<&serde_json::Value> for Value {
    fn from(v: &serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Boolean(*b),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map_or_else(|| n.as_f64().map_or(Self::Null, Self::Real), Self::Integer),
            serde_json::Value::String(s) => Self::Text(s.clone()),
            // Nested structures are kept as their JSON text
            other => Self::Text(other.to_string()),
        }
    }
}

/// Hashable, totally ordered projection of a [`Value`].
///
/// Composite keys are `Vec<ValueKey>`, so cell contents can never collide with a
/// separator the way joined strings do.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ValueKey {
    Null,
    Boolean(bool),
    Integer(i64),
    Real(u64),
    Text(String),
}
