//! Equality filters for `Table::fetch`.
//!
//! A filter maps a field (or, on crumbs, a property ID) to the value it must
//! equal. Keys are ANDed; an empty filter matches every row. Filters compile
//! to SQL so they are answered by the row store's indexes.

use rusqlite::types::Value as SqlValue;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

use crate::core::error::{CupboardError, Result};
use crate::core::schemas::{self, ColumnKind};
use crate::entities::TableName;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    terms: BTreeMap<String, JsonValue>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.terms.insert(key.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn terms(&self) -> impl Iterator<Item = (&String, &JsonValue)> {
        self.terms.iter()
    }

    /// Translates the filter into a WHERE fragment plus bound parameters for
    /// `table`.
    pub(crate) fn compile(&self, table: TableName) -> Result<FilterPlan> {
        let mut plan = FilterPlan::default();
        for (key, value) in &self.terms {
            if let Some(kind) = schemas::column_kind(table, key) {
                plan.clauses.push(format!("{}.{} = ?", table.as_str(), key));
                plan.params.push(column_param(key, kind, value)?);
            } else if table == TableName::Crumbs {
                scalar(key, value)?;
                plan.clauses.push(
                    "EXISTS (SELECT 1 FROM crumb_properties cp \
                     WHERE cp.crumb_id = crumbs.id AND cp.property_id = ? AND cp.value = ?)"
                        .to_string(),
                );
                plan.params.push(SqlValue::Text(key.clone()));
                plan.params
                    .push(SqlValue::Text(serde_json::to_string(value)?));
            } else {
                return Err(CupboardError::InvalidFilter(format!(
                    "{} has no field '{}'",
                    table, key
                )));
            }
        }
        Ok(plan)
    }
}

impl From<BTreeMap<String, JsonValue>> for Filter {
    fn from(terms: BTreeMap<String, JsonValue>) -> Self {
        Self { terms }
    }
}

impl<K: Into<String>, V: Into<JsonValue>> FromIterator<(K, V)> for Filter {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            terms: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct FilterPlan {
    pub clauses: Vec<String>,
    pub params: Vec<SqlValue>,
}

impl FilterPlan {
    pub fn where_sql(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }
}

fn scalar<'a>(key: &str, value: &'a JsonValue) -> Result<&'a JsonValue> {
    match value {
        JsonValue::String(_) | JsonValue::Number(_) | JsonValue::Bool(_) => Ok(value),
        other => Err(CupboardError::InvalidFilter(format!(
            "unsupported value {} for '{}'",
            other, key
        ))),
    }
}

fn column_param(key: &str, kind: ColumnKind, value: &JsonValue) -> Result<SqlValue> {
    match (kind, scalar(key, value)?) {
        (ColumnKind::Text, JsonValue::String(s)) => Ok(SqlValue::Text(s.clone())),
        (ColumnKind::Integer, JsonValue::Number(n)) => n
            .as_i64()
            .map(SqlValue::Integer)
            .ok_or_else(|| CupboardError::InvalidFilter(format!("'{}' needs an integer", key))),
        (ColumnKind::Text, other) => Err(CupboardError::InvalidFilter(format!(
            "'{}' needs a string, got {}",
            key, other
        ))),
        (ColumnKind::Integer, other) => Err(CupboardError::InvalidFilter(format!(
            "'{}' needs an integer, got {}",
            key, other
        ))),
    }
}
