use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use std::str::FromStr;

use crate::core::error::{CupboardError, Result};
use crate::core::filter::Filter;
use crate::core::time;
use crate::entities::category::Category;
use crate::entities::TableName;
use crate::table::Table;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Categorical,
    Text,
    Integer,
    Boolean,
    Timestamp,
    List,
}

impl ValueType {
    pub const ALL: [ValueType; 6] = [
        ValueType::Categorical,
        ValueType::Text,
        ValueType::Integer,
        ValueType::Boolean,
        ValueType::Timestamp,
        ValueType::List,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::Categorical => "categorical",
            ValueType::Text => "text",
            ValueType::Integer => "integer",
            ValueType::Boolean => "boolean",
            ValueType::Timestamp => "timestamp",
            ValueType::List => "list",
        }
    }

    /// Shape check for a crumb property value. Category membership of
    /// categorical values is checked against storage, not here.
    pub fn check_value(&self, value: &JsonValue) -> Result<()> {
        let fits = match self {
            ValueType::Categorical | ValueType::Text => value.is_string(),
            ValueType::Integer => value.as_i64().is_some(),
            ValueType::Boolean => value.is_boolean(),
            ValueType::Timestamp => value
                .as_str()
                .is_some_and(|raw| time::parse_ts(raw).is_ok()),
            ValueType::List => value
                .as_array()
                .is_some_and(|items| items.iter().all(JsonValue::is_string)),
        };
        if fits {
            Ok(())
        } else {
            Err(CupboardError::TypeMismatch(format!(
                "{} is not a valid {} value",
                value, self
            )))
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValueType {
    type Err = CupboardError;

    fn from_str(s: &str) -> Result<Self> {
        ValueType::ALL
            .into_iter()
            .find(|vt| vt.as_str() == s)
            .ok_or_else(|| CupboardError::InvalidValueType(format!("unknown value type '{}'", s)))
    }
}

/// A typed field definition that crumbs carry values for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub id: String,
    pub name: String,
    pub value_type: ValueType,
    #[serde(default)]
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl Property {
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            id: String::new(),
            name: name.into(),
            value_type,
            description: String::new(),
            created_at: time::now(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    fn require_categorical(&self) -> Result<()> {
        if self.value_type != ValueType::Categorical {
            return Err(CupboardError::InvalidValueType(format!(
                "property '{}' is {}, only categorical properties have categories",
                self.name, self.value_type
            )));
        }
        Ok(())
    }

    fn require_categories_table(table: &Table) -> Result<()> {
        if table.name() != TableName::Categories {
            return Err(CupboardError::InvalidData(format!(
                "categories live in the categories table, not {}",
                table.name()
            )));
        }
        Ok(())
    }

    /// Persists a new category of this property and returns its ID.
    pub fn define_category(&self, table: &Table, name: &str, ordinal: i64) -> Result<String> {
        self.require_categorical()?;
        if name.trim().is_empty() {
            return Err(CupboardError::InvalidName(
                "category name must not be empty".to_string(),
            ));
        }
        if self.id.is_empty() {
            return Err(CupboardError::InvalidId(
                "property must be persisted before defining categories".to_string(),
            ));
        }
        Self::require_categories_table(table)?;
        table.set("", Category::new(&self.id, name, ordinal))
    }

    /// Categories of this property in ordinal order.
    pub fn get_categories(&self, table: &Table) -> Result<Vec<Category>> {
        self.require_categorical()?;
        Self::require_categories_table(table)?;
        let filter = Filter::new().with("property_id", self.id.as_str());
        table.fetch_as::<Category>(&filter)
    }
}
