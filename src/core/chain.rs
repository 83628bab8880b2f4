use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use super::operation::Operation;

/// Named, ordered sequence of operations. Pure data: no execution state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OperationChain {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub operations: Vec<Operation>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OperationChain {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            description: None,
            operations: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    #[must_use]
    pub fn with_operations(name: impl Into<String>, operations: Vec<Operation>) -> Self {
        let mut chain = Self::new(name);
        chain.operations = operations;
        chain
    }

    pub fn push(&mut self, operation: Operation) {
        self.operations.push(operation);
        self.touch();
    }

    /// Removes the operation with `id`, returning it if present.
    pub fn remove(&mut self, id: &str) -> Option<Operation> {
        let idx = self.operations.iter().position(|op| op.id == id)?;
        let removed = self.operations.remove(idx);
        self.touch();
        Some(removed)
    }

    /// Moves the operation with `id` to `index` (clamped to the chain length).
    pub fn move_to(&mut self, id: &str, index: usize) -> bool {
        let Some(from) = self.operations.iter().position(|op| op.id == id) else {
            return false;
        };
        let op = self.operations.remove(from);
        let to = index.min(self.operations.len());
        self.operations.insert(to, op);
        self.touch();
        true
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
