/// Sandboxed expression language for derived columns
///
/// Formulas are tokenized, parsed into an expression tree and interpreted against
/// one row at a time. Only the built-in function set is callable:
/// UPPER, LOWER, TRIM, LEN, SUBSTR, REPLACE, CONCAT, IF, AND, OR, NOT, ROUND, ABS.
///
/// Column references are bare identifiers (`amount`, `销售额`) or bracketed names
/// (`[unit price]`); `TRUE`, `FALSE` and `NULL` are literals. Expressions nest at
/// most `MAX_DEPTH` levels.

mod eval;
mod lexer;
mod parser;

pub use lexer::{tokenize, Token};
pub use parser::{BinaryOp, Expr, Function, Parser, UnaryOp, MAX_DEPTH};

use crate::types::{InsightError, Row, Value};

/// A parsed formula, reusable across rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Formula {
    source: String,
    expr: Expr,
}

impl Formula {
    pub fn compile(source: &str) -> Result<Self, InsightError> {
        let tokens = tokenize(source)?;
        let expr = Parser::parse(tokens)?;
        Ok(Self { source: source.to_string(), expr })
    }

    pub fn evaluate(&self, row: &Row) -> Result<Value, InsightError> {
        eval::evaluate(&self.expr, row)
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    #[must_use]
    pub const fn expr(&self) -> &Expr {
        &self.expr
    }

    /// Columns the formula reads.
    #[must_use]
    pub fn columns(&self) -> Vec<String> {
        self.expr.columns()
    }
}
