//! Engine-neutral query algebra
//!
//! Callers build a [`QueryExpr`] tree; the translator renders it into the
//! native syntax of a remote backend, and catalogs evaluate the same tree
//! directly against their field indexes.

pub mod error;
pub mod translate;

pub use error::{QueryError, QueryResult};
pub use translate::{FieldTable, Translator};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A scalar operand in a comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Str(String),
    Number(f64),
    Date(DateTime<Utc>),
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Date(value)
    }
}

/// Structured query expression tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QueryExpr {
    Eq(String, FieldValue),
    NotEq(String, FieldValue),
    Contains(String, String),
    DoesNotContain(String, String),
    Lt(String, FieldValue),
    Le(String, FieldValue),
    Gt(String, FieldValue),
    Ge(String, FieldValue),
    And(Vec<QueryExpr>),
    Or(Vec<QueryExpr>),
}

impl QueryExpr {
    pub fn eq(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self::Eq(field.into(), value.into())
    }

    pub fn not_eq(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self::NotEq(field.into(), value.into())
    }

    pub fn contains(field: impl Into<String>, substring: impl Into<String>) -> Self {
        Self::Contains(field.into(), substring.into())
    }

    pub fn does_not_contain(field: impl Into<String>, substring: impl Into<String>) -> Self {
        Self::DoesNotContain(field.into(), substring.into())
    }

    pub fn lt(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self::Lt(field.into(), value.into())
    }

    pub fn le(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self::Le(field.into(), value.into())
    }

    pub fn gt(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self::Gt(field.into(), value.into())
    }

    pub fn ge(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self::Ge(field.into(), value.into())
    }

    pub fn and(exprs: Vec<QueryExpr>) -> Self {
        Self::And(exprs)
    }

    pub fn or(exprs: Vec<QueryExpr>) -> Self {
        Self::Or(exprs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_shapes() {
        let expr = QueryExpr::and(vec![
            QueryExpr::eq("creator", "bob"),
            QueryExpr::gt("age", 45i64),
        ]);
        match expr {
            QueryExpr::And(parts) => assert_eq!(parts.len(), 2),
            other => panic!("unexpected expression: {:?}", other),
        }
    }

    #[test]
    fn test_expr_serde_roundtrip() {
        let expr = QueryExpr::or(vec![
            QueryExpr::contains("content", "physics"),
            QueryExpr::not_eq("creator", "carol"),
        ]);
        let json = serde_json::to_string(&expr).unwrap();
        let back: QueryExpr = serde_json::from_str(&json).unwrap();
        assert_eq!(back, expr);
    }
}
