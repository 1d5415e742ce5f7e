//! Restricted expression interpreter used by Transform and Condition steps
//!
//! A small AST-walking interpreter over `serde_json::Value` — no host
//! `eval`, no function calls, no way to reach outside the scope object
//! handed to it. Grounded on the dotted-path `FieldValue` idiom in the
//! reference codebase's transition-condition evaluator, generalized from
//! string pattern matching into a real tokenizer + parser + evaluator
//! per the tiny-interpreter design called for in SPEC_FULL.md §9.

mod ast;
mod eval;
mod lexer;

pub use ast::{parse, BinaryOp, Expr, UnaryOp};
pub use eval::evaluate_ast;

use serde_json::{Map, Value};
use thiserror::Error;

/// Identifiers that may never appear in an expression, anywhere they could
/// be used to read or write through to host object internals.
pub const FORBIDDEN_IDENTIFIERS: &[&str] = &["__proto__", "constructor", "prototype"];

/// An error raised while lexing, parsing, or evaluating an expression
#[derive(Debug, Clone, Error)]
pub enum ExprError {
    #[error("expression parse error: {0}")]
    Parse(String),
    #[error("expression references forbidden identifier '{0}'")]
    ForbiddenIdentifier(String),
    #[error("expression evaluation error: {0}")]
    Eval(String),
}

/// Parse and evaluate `source` against `scope`, returning the raw result
/// value. Used by the Transform executor.
pub fn evaluate(source: &str, scope: &Map<String, Value>) -> Result<Value, ExprError> {
    let expr = parse(source)?;
    evaluate_ast(&expr, scope)
}

/// Parse and evaluate `source`, coercing the result to a `bool` using the
/// same truthiness rules as [`eval::is_truthy`]. Used by the Condition
/// executor, whose routing decision is strictly binary.
pub fn evaluate_bool(source: &str, scope: &Map<String, Value>) -> Result<bool, ExprError> {
    let value = evaluate(source, scope)?;
    Ok(eval::is_truthy(&value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scope() -> Map<String, Value> {
        json!({
            "input": {"count": 5, "name": "alice"},
            "fetch": {"success": true, "data": {"items": [1, 2, 3]}},
        })
        .as_object()
        .unwrap()
        .clone()
    }

    #[test]
    fn evaluates_dotted_member_access() {
        let result = evaluate("input.name", &scope()).unwrap();
        assert_eq!(result, json!("alice"));
    }

    #[test]
    fn evaluates_arithmetic_and_comparison() {
        assert_eq!(evaluate("input.count + 1", &scope()).unwrap(), json!(6.0));
        assert!(evaluate_bool("input.count > 3", &scope()).unwrap());
        assert!(!evaluate_bool("input.count > 10", &scope()).unwrap());
    }

    #[test]
    fn evaluates_logical_and_indexing() {
        assert!(evaluate_bool("fetch.success && fetch.data.items[0] == 1", &scope()).unwrap());
    }

    #[test]
    fn rejects_forbidden_identifier() {
        let err = evaluate("input.__proto__", &scope()).unwrap_err();
        assert!(matches!(err, ExprError::ForbiddenIdentifier(_)));
    }

    #[test]
    fn builds_object_and_array_literals() {
        let result = evaluate("{ n: input.count, tag: [input.name, 1] }", &scope()).unwrap();
        assert_eq!(result["n"], json!(5.0));
        assert_eq!(result["tag"], json!(["alice", 1.0]));
    }
}
