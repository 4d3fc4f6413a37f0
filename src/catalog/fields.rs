//! Scalar and keyword field indexes
//!
//! Each catalog keeps keyword indexes (creator, container id, tags) and
//! ordered timestamp indexes (created-at, last-modified) used to evaluate
//! structured filters before ranking. The same [`QueryExpr`] algebra that
//! the translator renders for remote backends is evaluated here directly.

use crate::models::ContentObject;
use crate::query::{FieldValue, QueryError, QueryExpr, QueryResult};
use crate::storage::DocId;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Indexed scalar values for one document, kept for removal
#[derive(Debug, Clone)]
struct DocFields {
    creator: String,
    container_id: Option<String>,
    tags: Vec<String>,
    created_at: i64,
    last_modified: i64,
}

impl From<&ContentObject> for DocFields {
    fn from(obj: &ContentObject) -> Self {
        Self {
            creator: obj.creator.clone(),
            container_id: obj.container_id.clone(),
            tags: obj.tags.clone(),
            created_at: obj.created_at.timestamp(),
            last_modified: obj.last_modified.timestamp(),
        }
    }
}

#[derive(Debug, Default)]
pub struct FieldIndexes {
    creator: HashMap<String, BTreeSet<DocId>>,
    container: HashMap<String, BTreeSet<DocId>>,
    tags: HashMap<String, BTreeSet<DocId>>,
    created_at: BTreeMap<i64, BTreeSet<DocId>>,
    last_modified: BTreeMap<i64, BTreeSet<DocId>>,
    by_doc: HashMap<DocId, DocFields>,
}

impl FieldIndexes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, doc_id: DocId, obj: &ContentObject) {
        self.remove(doc_id);

        let fields = DocFields::from(obj);
        self.creator
            .entry(fields.creator.clone())
            .or_default()
            .insert(doc_id);
        if let Some(ref container) = fields.container_id {
            self.container
                .entry(container.clone())
                .or_default()
                .insert(doc_id);
        }
        for tag in &fields.tags {
            self.tags.entry(tag.clone()).or_default().insert(doc_id);
        }
        self.created_at
            .entry(fields.created_at)
            .or_default()
            .insert(doc_id);
        self.last_modified
            .entry(fields.last_modified)
            .or_default()
            .insert(doc_id);
        self.by_doc.insert(doc_id, fields);
    }

    pub fn remove(&mut self, doc_id: DocId) {
        let Some(fields) = self.by_doc.remove(&doc_id) else {
            return;
        };
        detach(&mut self.creator, &fields.creator, doc_id);
        if let Some(ref container) = fields.container_id {
            detach(&mut self.container, container, doc_id);
        }
        for tag in &fields.tags {
            detach(&mut self.tags, tag, doc_id);
        }
        detach_ord(&mut self.created_at, fields.created_at, doc_id);
        detach_ord(&mut self.last_modified, fields.last_modified, doc_id);
    }

    pub fn all_docs(&self) -> BTreeSet<DocId> {
        self.by_doc.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.by_doc.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_doc.is_empty()
    }

    /// Evaluate a structured filter against the indexed fields
    pub fn evaluate(&self, expr: &QueryExpr) -> QueryResult<BTreeSet<DocId>> {
        match expr {
            QueryExpr::Eq(field, value) => self.eval_eq(field, value),
            QueryExpr::NotEq(field, value) => {
                let positive = self.eval_eq(field, value)?;
                Ok(self.all_docs().difference(&positive).copied().collect())
            }
            QueryExpr::Contains(field, substring) => self.eval_contains(field, substring),
            QueryExpr::DoesNotContain(field, substring) => {
                let positive = self.eval_contains(field, substring)?;
                Ok(self.all_docs().difference(&positive).copied().collect())
            }
            QueryExpr::Lt(field, value) => self.eval_range(field, value, Bound::Lt),
            QueryExpr::Le(field, value) => self.eval_range(field, value, Bound::Le),
            QueryExpr::Gt(field, value) => self.eval_range(field, value, Bound::Gt),
            QueryExpr::Ge(field, value) => self.eval_range(field, value, Bound::Ge),
            QueryExpr::And(parts) => {
                if parts.is_empty() {
                    return Err(QueryError::EmptyGroup("And"));
                }
                let mut sets = parts.iter().map(|part| self.evaluate(part));
                let mut result = sets.next().expect("nonempty")?;
                for set in sets {
                    let set = set?;
                    result = result.intersection(&set).copied().collect();
                }
                Ok(result)
            }
            QueryExpr::Or(parts) => {
                if parts.is_empty() {
                    return Err(QueryError::EmptyGroup("Or"));
                }
                let mut result = BTreeSet::new();
                for part in parts {
                    result.extend(self.evaluate(part)?);
                }
                Ok(result)
            }
        }
    }

    fn keyword_index(&self, field: &str) -> Option<&HashMap<String, BTreeSet<DocId>>> {
        match field {
            "creator" => Some(&self.creator),
            "container_id" => Some(&self.container),
            "tags" => Some(&self.tags),
            _ => None,
        }
    }

    fn time_index(&self, field: &str) -> Option<&BTreeMap<i64, BTreeSet<DocId>>> {
        match field {
            "created_at" => Some(&self.created_at),
            "last_modified" | "LAST_MODIFIED" => Some(&self.last_modified),
            _ => None,
        }
    }

    fn eval_eq(&self, field: &str, value: &FieldValue) -> QueryResult<BTreeSet<DocId>> {
        if let Some(index) = self.keyword_index(field) {
            let needle = string_operand(field, value)?;
            return Ok(index.get(&needle).cloned().unwrap_or_default());
        }
        if let Some(index) = self.time_index(field) {
            let instant = time_operand(field, value)?;
            return Ok(index.get(&instant).cloned().unwrap_or_default());
        }
        Err(QueryError::UnknownField(field.to_string()))
    }

    fn eval_contains(&self, field: &str, substring: &str) -> QueryResult<BTreeSet<DocId>> {
        let index = self
            .keyword_index(field)
            .ok_or_else(|| QueryError::UnknownField(field.to_string()))?;
        let mut result = BTreeSet::new();
        for (key, docs) in index {
            if key.contains(substring) {
                result.extend(docs.iter().copied());
            }
        }
        Ok(result)
    }

    fn eval_range(
        &self,
        field: &str,
        value: &FieldValue,
        bound: Bound,
    ) -> QueryResult<BTreeSet<DocId>> {
        let index = self
            .time_index(field)
            .ok_or_else(|| QueryError::UnknownField(field.to_string()))?;
        let instant = time_operand(field, value)?;
        let mut result = BTreeSet::new();
        let range: Box<dyn Iterator<Item = (&i64, &BTreeSet<DocId>)> + '_> = match bound {
            Bound::Lt => Box::new(index.range(..instant)),
            Bound::Le => Box::new(index.range(..=instant)),
            Bound::Gt => Box::new(index.range((
                std::ops::Bound::Excluded(instant),
                std::ops::Bound::Unbounded,
            ))),
            Bound::Ge => Box::new(index.range(instant..)),
        };
        for (_, docs) in range {
            result.extend(docs.iter().copied());
        }
        Ok(result)
    }
}

#[derive(Clone, Copy)]
enum Bound {
    Lt,
    Le,
    Gt,
    Ge,
}

fn detach(index: &mut HashMap<String, BTreeSet<DocId>>, key: &str, doc_id: DocId) {
    if let Some(docs) = index.get_mut(key) {
        docs.remove(&doc_id);
        if docs.is_empty() {
            index.remove(key);
        }
    }
}

fn detach_ord(index: &mut BTreeMap<i64, BTreeSet<DocId>>, key: i64, doc_id: DocId) {
    if let Some(docs) = index.get_mut(&key) {
        docs.remove(&doc_id);
        if docs.is_empty() {
            index.remove(&key);
        }
    }
}

fn string_operand(field: &str, value: &FieldValue) -> QueryResult<String> {
    match value {
        FieldValue::Str(s) => Ok(s.clone()),
        _ => Err(QueryError::InvalidOperand {
            field: field.to_string(),
            message: "keyword comparison requires a string".to_string(),
        }),
    }
}

fn time_operand(field: &str, value: &FieldValue) -> QueryResult<i64> {
    match value {
        FieldValue::Number(n) => Ok(*n as i64),
        FieldValue::Date(d) => Ok(d.timestamp()),
        FieldValue::Str(_) => Err(QueryError::InvalidOperand {
            field: field.to_string(),
            message: "time comparison requires a number or date".to_string(),
        }),
    }
}
