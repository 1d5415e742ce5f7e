//! AST evaluator — walks an [`Expr`] tree against a scope object
//!
//! All arithmetic is done in `f64`; JSON has no integer/float distinction
//! at the syntax level and neither does this language.

use serde_json::{Map, Number, Value};

use super::ast::{BinaryOp, Expr, UnaryOp};
use super::ExprError;

/// Evaluate `expr` against `scope`, returning the resulting JSON value
pub fn evaluate_ast(expr: &Expr, scope: &Map<String, Value>) -> Result<Value, ExprError> {
    match expr {
        Expr::Number(n) => Ok(Number::from_f64(*n).map_or(Value::Null, Value::Number)),
        Expr::String(s) => Ok(Value::String(s.clone())),
        Expr::Bool(b) => Ok(Value::Bool(*b)),
        Expr::Null => Ok(Value::Null),
        Expr::Identifier(name) => Ok(scope.get(name).cloned().unwrap_or(Value::Null)),
        Expr::Member { object, property } => {
            let obj = evaluate_ast(object, scope)?;
            Ok(obj.get(property).cloned().unwrap_or(Value::Null))
        }
        Expr::Index { object, index } => {
            let obj = evaluate_ast(object, scope)?;
            let idx = evaluate_ast(index, scope)?;
            Ok(index_value(&obj, &idx))
        }
        Expr::Array(items) => {
            let values = items
                .iter()
                .map(|item| evaluate_ast(item, scope))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::Array(values))
        }
        Expr::Object(fields) => {
            let mut map = Map::new();
            for (key, value) in fields {
                map.insert(key.clone(), evaluate_ast(value, scope)?);
            }
            Ok(Value::Object(map))
        }
        Expr::Unary { op, expr } => {
            let value = evaluate_ast(expr, scope)?;
            Ok(match op {
                UnaryOp::Not => Value::Bool(!is_truthy(&value)),
                UnaryOp::Neg => Number::from_f64(-as_number(&value)?)
                    .map_or(Value::Null, Value::Number),
            })
        }
        Expr::Binary { op, left, right } => evaluate_binary(*op, left, right, scope),
    }
}

fn index_value(obj: &Value, idx: &Value) -> Value {
    match (obj, idx) {
        (Value::Array(items), Value::Number(n)) => n
            .as_f64()
            .and_then(|n| items.get(n as usize))
            .cloned()
            .unwrap_or(Value::Null),
        (Value::Object(map), Value::String(key)) => map.get(key).cloned().unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

fn evaluate_binary(
    op: BinaryOp,
    left: &Expr,
    right: &Expr,
    scope: &Map<String, Value>,
) -> Result<Value, ExprError> {
    // short-circuit logical operators evaluate their right side lazily
    match op {
        BinaryOp::And => {
            let l = evaluate_ast(left, scope)?;
            if !is_truthy(&l) {
                return Ok(Value::Bool(false));
            }
            return Ok(Value::Bool(is_truthy(&evaluate_ast(right, scope)?)));
        }
        BinaryOp::Or => {
            let l = evaluate_ast(left, scope)?;
            if is_truthy(&l) {
                return Ok(Value::Bool(true));
            }
            return Ok(Value::Bool(is_truthy(&evaluate_ast(right, scope)?)));
        }
        _ => {}
    }

    let l = evaluate_ast(left, scope)?;
    let r = evaluate_ast(right, scope)?;

    match op {
        BinaryOp::Eq => Ok(Value::Bool(l == r)),
        BinaryOp::NotEq => Ok(Value::Bool(l != r)),
        BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq => {
            let (ln, rn) = (as_number(&l)?, as_number(&r)?);
            Ok(Value::Bool(match op {
                BinaryOp::Lt => ln < rn,
                BinaryOp::LtEq => ln <= rn,
                BinaryOp::Gt => ln > rn,
                BinaryOp::GtEq => ln >= rn,
                _ => unreachable!(),
            }))
        }
        BinaryOp::Add => {
            // string concatenation if either side is a string, else numeric add
            if matches!(l, Value::String(_)) || matches!(r, Value::String(_)) {
                let mut s = to_display_string(&l);
                s.push_str(&to_display_string(&r));
                return Ok(Value::String(s));
            }
            let n = as_number(&l)? + as_number(&r)?;
            Ok(Number::from_f64(n).map_or(Value::Null, Value::Number))
        }
        BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => {
            let (ln, rn) = (as_number(&l)?, as_number(&r)?);
            let n = match op {
                BinaryOp::Sub => ln - rn,
                BinaryOp::Mul => ln * rn,
                BinaryOp::Div => {
                    if rn == 0.0 {
                        return Err(ExprError::Eval("division by zero".to_string()));
                    }
                    ln / rn
                }
                BinaryOp::Rem => ln % rn,
                _ => unreachable!(),
            };
            Ok(Number::from_f64(n).map_or(Value::Null, Value::Number))
        }
        BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
    }
}

fn to_display_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn as_number(value: &Value) -> Result<f64, ExprError> {
    value
        .as_f64()
        .ok_or_else(|| ExprError::Eval(format!("expected a number, found {value}")))
}

/// Truthiness used by Condition routing and the `&&`/`||`/`!` operators:
/// `false`, `null`, `0`, and `""` are falsy; everything else is truthy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
