use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::core::error::{CupboardError, Result};
use crate::core::time;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrumbState {
    Draft,
    Pending,
    Ready,
    Taken,
    Completed,
    Failed,
    Archived,
}

impl CrumbState {
    pub const ALL: [CrumbState; 7] = [
        CrumbState::Draft,
        CrumbState::Pending,
        CrumbState::Ready,
        CrumbState::Taken,
        CrumbState::Completed,
        CrumbState::Failed,
        CrumbState::Archived,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CrumbState::Draft => "draft",
            CrumbState::Pending => "pending",
            CrumbState::Ready => "ready",
            CrumbState::Taken => "taken",
            CrumbState::Completed => "completed",
            CrumbState::Failed => "failed",
            CrumbState::Archived => "archived",
        }
    }
}

impl fmt::Display for CrumbState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CrumbState {
    type Err = CupboardError;

    fn from_str(s: &str) -> Result<Self> {
        CrumbState::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| CupboardError::InvalidState(format!("unknown crumb state '{}'", s)))
    }
}

/// A unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Crumb {
    pub id: String,
    pub name: String,
    pub state: CrumbState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Property ID to value.
    #[serde(default)]
    pub properties: BTreeMap<String, JsonValue>,
}

impl Crumb {
    pub fn new(name: impl Into<String>) -> Self {
        let now = time::now();
        Self {
            id: String::new(),
            name: name.into(),
            state: CrumbState::Draft,
            created_at: now,
            updated_at: now,
            properties: BTreeMap::new(),
        }
    }

    fn touch(&mut self) {
        self.updated_at = time::advance(self.updated_at);
    }

    /// Moves to any recognised state, including the current one. The update
    /// timestamp always advances.
    pub fn set_state(&mut self, target: &str) -> Result<()> {
        let state: CrumbState = target.parse()?;
        self.state = state;
        self.touch();
        Ok(())
    }

    fn finish(&mut self, target: CrumbState) -> Result<()> {
        if self.state != CrumbState::Taken {
            return Err(CupboardError::InvalidTransition(format!(
                "cannot move crumb from {} to {}; it must be taken first",
                self.state, target
            )));
        }
        self.state = target;
        self.touch();
        Ok(())
    }

    pub fn complete(&mut self) -> Result<()> {
        self.finish(CrumbState::Completed)
    }

    pub fn fail(&mut self) -> Result<()> {
        self.finish(CrumbState::Failed)
    }

    pub fn archive(&mut self) {
        self.state = CrumbState::Archived;
        self.touch();
    }

    pub fn set_property(&mut self, property_id: impl Into<String>, value: JsonValue) {
        self.properties.insert(property_id.into(), value);
        self.touch();
    }

    pub fn get_property(&self, property_id: &str) -> Result<&JsonValue> {
        self.properties
            .get(property_id)
            .ok_or_else(|| CupboardError::PropertyNotFound(property_id.to_string()))
    }

    pub fn clear_property(&mut self, property_id: &str) -> Result<()> {
        if self.properties.remove(property_id).is_none() {
            return Err(CupboardError::PropertyNotFound(property_id.to_string()));
        }
        self.touch();
        Ok(())
    }

    /// Detached copy of the property map.
    pub fn get_properties(&self) -> BTreeMap<String, JsonValue> {
        self.properties.clone()
    }
}
