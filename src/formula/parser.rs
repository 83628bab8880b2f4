/// Recursive-descent parser from tokens to an expression tree
///
/// Precedence, loosest first: `||`, `&&`, comparison, `+ -`, `* / %`, unary `- !`.

use crate::types::{InsightError, Value};
use super::lexer::Token;

/// Bound on both parser recursion and expression tree height.
pub const MAX_DEPTH: usize = 256;

/// An expression with its tree height.
type Node = (Expr, usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

/// Closed set of built-in functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Upper,
    Lower,
    Trim,
    Len,
    Substr,
    Replace,
    Concat,
    If,
    And,
    Or,
    Not,
    Round,
    Abs,
}

impl Function {
    fn lookup(name: &str) -> Option<Self> {
        let f = match name.to_ascii_uppercase().as_str() {
            "UPPER" => Self::Upper,
            "LOWER" => Self::Lower,
            "TRIM" => Self::Trim,
            "LEN" | "LENGTH" => Self::Len,
            "SUBSTR" | "SUBSTRING" => Self::Substr,
            "REPLACE" => Self::Replace,
            "CONCAT" => Self::Concat,
            "IF" => Self::If,
            "AND" => Self::And,
            "OR" => Self::Or,
            "NOT" => Self::Not,
            "ROUND" => Self::Round,
            "ABS" => Self::Abs,
            _ => return None,
        };
        Some(f)
    }

    /// Accepted argument counts, inclusive.
    const fn arity(self) -> (usize, usize) {
        match self {
            Self::Upper | Self::Lower | Self::Trim | Self::Len | Self::Not | Self::Abs => (1, 1),
            Self::Substr => (2, 3),
            Self::Replace | Self::If => (3, 3),
            Self::Round => (1, 2),
            Self::Concat => (0, usize::MAX),
            Self::And | Self::Or => (1, usize::MAX),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Column(String),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Call(Function, Vec<Expr>),
}

impl Expr {
    /// Column names referenced anywhere in the tree, in first-seen order.
    #[must_use]
    pub fn columns(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_columns(&mut out);
        out
    }

    fn collect_columns(&self, out: &mut Vec<String>) {
        match self {
            Self::Literal(_) => {}
            Self::Column(name) => {
                if !out.contains(name) {
                    out.push(name.clone());
                }
            }
            Self::Unary(_, inner) => inner.collect_columns(out),
            Self::Binary(_, lhs, rhs) => {
                lhs.collect_columns(out);
                rhs.collect_columns(out);
            }
            Self::Call(_, args) => args.iter().for_each(|a| a.collect_columns(out)),
        }
    }
}

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    pub fn parse(tokens: Vec<Token>) -> Result<Expr, InsightError> {
        if tokens.is_empty() {
            return Err(InsightError::Formula("empty formula".to_string()));
        }
        let mut parser = Self { tokens, pos: 0, depth: 0 };
        let (expr, _) = parser.or_expr()?;
        if let Some(tok) = parser.peek() {
            return Err(InsightError::Formula(format!("unexpected token {tok:?} after expression")));
        }
        Ok(expr)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &Token) -> Result<(), InsightError> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(InsightError::Formula(format!(
                "expected {expected:?}, found {:?}",
                self.peek()
            )))
        }
    }

    /// Enters one level of parser recursion (parentheses, unary operators, calls).
    fn descend(&mut self) -> Result<(), InsightError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(too_deep());
        }
        Ok(())
    }

    fn binary(op: BinaryOp, (lhs, lh): Node, (rhs, rh): Node) -> Result<Node, InsightError> {
        let height = lh.max(rh) + 1;
        if height > MAX_DEPTH {
            return Err(too_deep());
        }
        Ok((Expr::Binary(op, Box::new(lhs), Box::new(rhs)), height))
    }

    fn or_expr(&mut self) -> Result<Node, InsightError> {
        let mut lhs = self.and_expr()?;
        while self.eat(&Token::Or) {
            let rhs = self.and_expr()?;
            lhs = Self::binary(BinaryOp::Or, lhs, rhs)?;
        }
        Ok(lhs)
    }

    fn and_expr(&mut self) -> Result<Node, InsightError> {
        let mut lhs = self.comparison()?;
        while self.eat(&Token::And) {
            let rhs = self.comparison()?;
            lhs = Self::binary(BinaryOp::And, lhs, rhs)?;
        }
        Ok(lhs)
    }

    fn comparison(&mut self) -> Result<Node, InsightError> {
        let lhs = self.additive()?;
        let op = match self.peek() {
            Some(Token::Eq) => BinaryOp::Eq,
            Some(Token::Ne) => BinaryOp::Ne,
            Some(Token::Lt) => BinaryOp::Lt,
            Some(Token::Le) => BinaryOp::Le,
            Some(Token::Gt) => BinaryOp::Gt,
            Some(Token::Ge) => BinaryOp::Ge,
            _ => return Ok(lhs),
        };
        self.pos += 1;
        let rhs = self.additive()?;
        Self::binary(op, lhs, rhs)
    }

    fn additive(&mut self) -> Result<Node, InsightError> {
        let mut lhs = self.multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.multiplicative()?;
            lhs = Self::binary(op, lhs, rhs)?;
        }
    }

    fn multiplicative(&mut self) -> Result<Node, InsightError> {
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                Some(Token::Percent) => BinaryOp::Rem,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.unary()?;
            lhs = Self::binary(op, lhs, rhs)?;
        }
    }

    fn unary(&mut self) -> Result<Node, InsightError> {
        let op = if self.eat(&Token::Minus) {
            UnaryOp::Neg
        } else if self.eat(&Token::Not) {
            UnaryOp::Not
        } else {
            return self.primary();
        };
        self.descend()?;
        let (inner, height) = self.unary()?;
        self.depth -= 1;
        Ok((Expr::Unary(op, Box::new(inner)), height + 1))
    }

    fn primary(&mut self) -> Result<Node, InsightError> {
        let leaf = |expr: Expr| -> Result<Node, InsightError> { Ok((expr, 1)) };
        match self.advance() {
            Some(Token::Number(n)) => leaf(Expr::Literal(Value::from_f64(n))),
            Some(Token::Str(s)) => leaf(Expr::Literal(Value::Text(s))),
            Some(Token::Column(name)) => leaf(Expr::Column(name)),
            Some(Token::LParen) => {
                self.descend()?;
                let inner = self.or_expr()?;
                self.expect(&Token::RParen)?;
                self.depth -= 1;
                Ok(inner)
            }
            Some(Token::Ident(name)) => {
                if self.peek() == Some(&Token::LParen) {
                    return self.call(&name);
                }
                match name.to_ascii_uppercase().as_str() {
                    "TRUE" => leaf(Expr::Literal(Value::Boolean(true))),
                    "FALSE" => leaf(Expr::Literal(Value::Boolean(false))),
                    "NULL" => leaf(Expr::Literal(Value::Null)),
                    _ => leaf(Expr::Column(name)),
                }
            }
            Some(tok) => Err(InsightError::Formula(format!("unexpected token {tok:?}"))),
            None => Err(InsightError::Formula("unexpected end of formula".to_string())),
        }
    }

    fn call(&mut self, name: &str) -> Result<Node, InsightError> {
        let function = Function::lookup(name)
            .ok_or_else(|| InsightError::Formula(format!("unknown function '{name}'")))?;
        self.expect(&Token::LParen)?;
        self.descend()?;

        let mut args = Vec::new();
        let mut height = 0;
        if !self.eat(&Token::RParen) {
            loop {
                let (arg, h) = self.or_expr()?;
                args.push(arg);
                height = height.max(h);
                if self.eat(&Token::RParen) {
                    break;
                }
                self.expect(&Token::Comma)?;
            }
        }
        self.depth -= 1;

        let (min, max) = function.arity();
        if args.len() < min || args.len() > max {
            return Err(InsightError::Formula(format!(
                "{} takes {} argument(s), got {}",
                name.to_ascii_uppercase(),
                if min == max { min.to_string() } else if max == usize::MAX { format!("at least {min}") } else { format!("{min}-{max}") },
                args.len()
            )));
        }
        Ok((Expr::Call(function, args), height + 1))
    }
}

fn too_deep() -> InsightError {
    InsightError::Formula("formula nested too deeply".to_string())
}
