//! Translation of the query algebra into backend query syntax
//!
//! Output targets the whoosh-style grammar most remote engines accept:
//! `field:value` terms, `NOT (...)` negation, bracketed ranges, and
//! explicit `AND`/`OR` composition. Logical field names pass through a
//! translation table before emission.

use crate::query::error::{QueryError, QueryResult};
use crate::query::{FieldValue, QueryExpr};
use std::collections::HashMap;

const DATE_FORMAT: &str = "%Y%m%d%H%M%S";

/// Logical-to-physical field name translation table
#[derive(Debug, Clone)]
pub struct FieldTable {
    map: HashMap<String, String>,
}

impl FieldTable {
    /// Table with no entries; every translation fails
    pub fn empty() -> Self {
        Self {
            map: HashMap::new(),
        }
    }

    /// Build a table from (logical, physical) pairs
    pub fn with_fields<I, S, T>(fields: I) -> Self
    where
        I: IntoIterator<Item = (S, T)>,
        S: Into<String>,
        T: Into<String>,
    {
        Self {
            map: fields
                .into_iter()
                .map(|(logical, physical)| (logical.into(), physical.into()))
                .collect(),
        }
    }

    pub fn insert(&mut self, logical: impl Into<String>, physical: impl Into<String>) {
        self.map.insert(logical.into(), physical.into());
    }

    pub fn resolve(&self, logical: &str) -> QueryResult<&str> {
        self.map
            .get(logical)
            .map(String::as_str)
            .ok_or_else(|| QueryError::UnknownField(logical.to_string()))
    }
}

impl Default for FieldTable {
    /// Catalog fields plus the reserved-name remappings
    fn default() -> Self {
        Self::with_fields([
            ("creator", "creator"),
            ("container_id", "container_id"),
            ("tags", "tags"),
            ("content", "content"),
            ("title", "title"),
            ("created_at", "created_at"),
            ("last_modified", "last_modified"),
            ("LAST_MODIFIED", "last_modified"),
        ])
    }
}

/// Renders [`QueryExpr`] trees into backend query strings
#[derive(Debug, Clone)]
pub struct Translator {
    fields: FieldTable,
}

impl Translator {
    pub fn new(fields: FieldTable) -> Self {
        Self { fields }
    }

    /// Translate a full expression tree; any unknown field or empty boolean
    /// group fails the whole translation.
    pub fn translate(&self, expr: &QueryExpr) -> QueryResult<String> {
        self.emit(expr, false)
    }

    fn emit(&self, expr: &QueryExpr, inside_and: bool) -> QueryResult<String> {
        match expr {
            QueryExpr::Eq(field, value) => self.term(field, value),
            QueryExpr::Contains(field, substring) => {
                self.term(field, &FieldValue::Str(substring.clone()))
            }
            QueryExpr::NotEq(field, value) => Ok(format!("NOT ({})", self.term(field, value)?)),
            QueryExpr::DoesNotContain(field, substring) => Ok(format!(
                "NOT ({})",
                self.term(field, &FieldValue::Str(substring.clone()))?
            )),
            QueryExpr::Lt(field, value) => self.range(field, value, "[TO ", "}"),
            QueryExpr::Le(field, value) => self.range(field, value, "[TO ", "]"),
            QueryExpr::Gt(field, value) => self.range(field, value, "{", " TO]"),
            QueryExpr::Ge(field, value) => self.range(field, value, "[", " TO]"),
            QueryExpr::And(parts) => {
                if parts.is_empty() {
                    return Err(QueryError::EmptyGroup("And"));
                }
                let rendered: Vec<String> = parts
                    .iter()
                    .map(|part| self.emit(part, true))
                    .collect::<QueryResult<_>>()?;
                Ok(rendered.join(" AND "))
            }
            QueryExpr::Or(parts) => {
                if parts.is_empty() {
                    return Err(QueryError::EmptyGroup("Or"));
                }
                let rendered: Vec<String> = parts
                    .iter()
                    .map(|part| self.emit(part, false))
                    .collect::<QueryResult<_>>()?;
                let joined = rendered.join(" OR ");
                // AND binds tighter; an OR group under an AND needs parens.
                if inside_and && rendered.len() > 1 {
                    Ok(format!("({})", joined))
                } else {
                    Ok(joined)
                }
            }
        }
    }

    fn term(&self, field: &str, value: &FieldValue) -> QueryResult<String> {
        let physical = self.fields.resolve(field)?;
        Ok(format!("{}:{}", physical, render_value(value)))
    }

    fn range(
        &self,
        field: &str,
        value: &FieldValue,
        open: &str,
        close: &str,
    ) -> QueryResult<String> {
        let physical = self.fields.resolve(field)?;
        let rendered = render_bound(field, value)?;
        Ok(format!("{}:{}{}{}", physical, open, rendered, close))
    }
}

impl Default for Translator {
    fn default() -> Self {
        Self::new(FieldTable::default())
    }
}

fn render_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 9e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

fn render_value(value: &FieldValue) -> String {
    match value {
        FieldValue::Str(s) => {
            if s.chars().any(char::is_whitespace) {
                format!("\"{}\"", s)
            } else {
                s.clone()
            }
        }
        FieldValue::Number(n) => render_number(*n),
        FieldValue::Date(d) => d.format(DATE_FORMAT).to_string(),
    }
}

fn render_bound(field: &str, value: &FieldValue) -> QueryResult<String> {
    match value {
        FieldValue::Number(n) => Ok(render_number(*n)),
        FieldValue::Date(d) => Ok(d.format(DATE_FORMAT).to_string()),
        FieldValue::Str(_) => Err(QueryError::InvalidOperand {
            field: field.to_string(),
            message: "range comparison requires a number or date".to_string(),
        }),
    }
}
