/// Tree-walking interpreter over a single row
///
/// Null propagates through arithmetic and string functions. `+` adds when both
/// sides read as numbers and concatenates display text otherwise.
/// Recursion follows the tree height, which the parser caps at `MAX_DEPTH`.

use std::cmp::Ordering;
use crate::types::{InsightError, Row, Value};
use super::parser::{BinaryOp, Expr, Function, UnaryOp};

pub fn evaluate(expr: &Expr, row: &Row) -> Result<Value, InsightError> {
    match expr {
        Expr::Literal(v) => Ok(v.clone()),
        Expr::Column(name) => Ok(row.get(name).clone()),
        Expr::Unary(op, inner) => unary(*op, &evaluate(inner, row)?),
        Expr::Binary(BinaryOp::And, lhs, rhs) => {
            // short-circuit
            let l = evaluate(lhs, row)?.is_truthy();
            Ok(Value::Boolean(l && evaluate(rhs, row)?.is_truthy()))
        }
        Expr::Binary(BinaryOp::Or, lhs, rhs) => {
            let l = evaluate(lhs, row)?.is_truthy();
            Ok(Value::Boolean(l || evaluate(rhs, row)?.is_truthy()))
        }
        Expr::Binary(op, lhs, rhs) => binary(*op, &evaluate(lhs, row)?, &evaluate(rhs, row)?),
        Expr::Call(function, args) => call(*function, args, row),
    }
}

fn unary(op: UnaryOp, v: &Value) -> Result<Value, InsightError> {
    match op {
        UnaryOp::Not => Ok(Value::Boolean(!v.is_truthy())),
        UnaryOp::Neg if v.is_null() => Ok(Value::Null),
        UnaryOp::Neg => Ok(Value::from_f64(-number(v)?)),
    }
}

fn number(v: &Value) -> Result<f64, InsightError> {
    v.as_number()
        .ok_or_else(|| InsightError::Formula(format!("'{v}' is not a number")))
}

fn binary(op: BinaryOp, l: &Value, r: &Value) -> Result<Value, InsightError> {
    match op {
        BinaryOp::Add => match (l.as_number(), r.as_number()) {
            (Some(a), Some(b)) => Ok(Value::from_f64(a + b)),
            _ if l.is_null() && r.is_null() => Ok(Value::Null),
            _ => Ok(Value::Text(format!("{l}{r}"))),
        },
        BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => {
            if l.is_null() || r.is_null() {
                return Ok(Value::Null);
            }
            let (a, b) = (number(l)?, number(r)?);
            let n = match op {
                BinaryOp::Sub => a - b,
                BinaryOp::Mul => a * b,
                _ if b == 0.0 => return Err(InsightError::Formula("division by zero".to_string())),
                BinaryOp::Div => a / b,
                _ => a % b,
            };
            Ok(Value::from_f64(n))
        }
        BinaryOp::Eq => Ok(Value::Boolean(equals(l, r))),
        BinaryOp::Ne => Ok(Value::Boolean(!equals(l, r))),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let Some(ord) = compare(l, r) else {
                return Ok(Value::Boolean(false));
            };
            let result = match op {
                BinaryOp::Lt => ord == Ordering::Less,
                BinaryOp::Le => ord != Ordering::Greater,
                BinaryOp::Gt => ord == Ordering::Greater,
                _ => ord != Ordering::Less,
            };
            Ok(Value::Boolean(result))
        }
        BinaryOp::And => Ok(Value::Boolean(l.is_truthy() && r.is_truthy())),
        BinaryOp::Or => Ok(Value::Boolean(l.is_truthy() || r.is_truthy())),
    }
}

/// Numeric equality when both sides are numbers, display equality otherwise.
fn equals(l: &Value, r: &Value) -> bool {
    match (l.is_null(), r.is_null()) {
        (true, true) => true,
        (false, false) => match (l.as_number(), r.as_number()) {
            (Some(a), Some(b)) => a == b,
            _ => l.to_string() == r.to_string(),
        },
        _ => false,
    }
}

/// Ordering for `< <= > >=`; nulls never compare.
fn compare(l: &Value, r: &Value) -> Option<Ordering> {
    if l.is_null() || r.is_null() {
        return None;
    }
    match (l.as_number(), r.as_number()) {
        (Some(a), Some(b)) => a.partial_cmp(&b),
        _ => Some(l.to_string().cmp(&r.to_string())),
    }
}

fn text_fn(v: &Value, f: impl Fn(&str) -> String) -> Value {
    if v.is_null() { Value::Null } else { Value::Text(f(&v.to_string())) }
}

fn call(function: Function, args: &[Expr], row: &Row) -> Result<Value, InsightError> {
    match function {
        // IF evaluates only the taken branch
        Function::If => {
            let branch = if evaluate(&args[0], row)?.is_truthy() { &args[1] } else { &args[2] };
            evaluate(branch, row)
        }
        eager => {
            let values = args
                .iter()
                .map(|a| evaluate(a, row))
                .collect::<Result<Vec<_>, _>>()?;
            apply(eager, &values)
        }
    }
}

/// Applies a built-in to already evaluated arguments.
fn apply(function: Function, values: &[Value]) -> Result<Value, InsightError> {
    let result = match function {
        Function::Upper => text_fn(&values[0], str::to_uppercase),
        Function::Lower => text_fn(&values[0], str::to_lowercase),
        Function::Trim => text_fn(&values[0], |s| s.trim().to_string()),
        Function::Len => Value::Integer(values[0].to_string().chars().count() as i64),
        Function::Substr => substr(values)?,
        Function::Replace => {
            if values[0].is_null() {
                Value::Null
            } else {
                let from = values[1].to_string();
                let text = values[0].to_string();
                if from.is_empty() {
                    Value::Text(text)
                } else {
                    Value::Text(text.replace(&from, &values[2].to_string()))
                }
            }
        }
        Function::Concat => Value::Text(values.iter().map(ToString::to_string).collect()),
        Function::And => Value::Boolean(values.iter().all(Value::is_truthy)),
        Function::Or => Value::Boolean(values.iter().any(Value::is_truthy)),
        Function::Not => Value::Boolean(!values[0].is_truthy()),
        Function::Round => {
            if values[0].is_null() {
                return Ok(Value::Null);
            }
            let digits = match values.get(1) {
                Some(d) => number(d)? as i32,
                None => 0,
            };
            let factor = 10f64.powi(digits.clamp(-15, 15));
            Value::from_f64((number(&values[0])? * factor).round() / factor)
        }
        Function::Abs => {
            if values[0].is_null() {
                Value::Null
            } else {
                Value::from_f64(number(&values[0])?.abs())
            }
        }
        Function::If => {
            let taken = if values[0].is_truthy() { 1 } else { 2 };
            values[taken].clone()
        }
    };
    Ok(result)
}

/// `SUBSTR(text, start[, length])` with a 1-based start.
fn substr(values: &[Value]) -> Result<Value, InsightError> {
    if values[0].is_null() {
        return Ok(Value::Null);
    }
    let text = values[0].to_string();
    let start = number(&values[1])?;
    if start < 1.0 {
        return Err(InsightError::Formula(format!("SUBSTR start {start} must be at least 1")));
    }
    let skip = start as usize - 1;
    let chars = text.chars().skip(skip);
    let out: String = match values.get(2) {
        Some(len) => {
            let len = number(len)?;
            if len < 0.0 {
                return Err(InsightError::Formula("SUBSTR length must not be negative".to_string()));
            }
            chars.take(len as usize).collect()
        }
        None => chars.collect(),
    };
    Ok(Value::Text(out))
}
