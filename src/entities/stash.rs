use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use std::fmt;
use std::str::FromStr;

use crate::core::error::{CupboardError, Result};
use crate::core::time;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StashType {
    Resource,
    Artifact,
    Context,
    Counter,
    Lock,
}

impl StashType {
    pub const ALL: [StashType; 5] = [
        StashType::Resource,
        StashType::Artifact,
        StashType::Context,
        StashType::Counter,
        StashType::Lock,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StashType::Resource => "resource",
            StashType::Artifact => "artifact",
            StashType::Context => "context",
            StashType::Counter => "counter",
            StashType::Lock => "lock",
        }
    }
}

impl fmt::Display for StashType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StashType {
    type Err = CupboardError;

    fn from_str(s: &str) -> Result<Self> {
        StashType::ALL
            .into_iter()
            .find(|st| st.as_str() == s)
            .ok_or_else(|| CupboardError::InvalidStashType(format!("unknown stash type '{}'", s)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StashOp {
    Create,
    Set,
    Increment,
    Acquire,
    Release,
}

impl StashOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            StashOp::Create => "create",
            StashOp::Set => "set",
            StashOp::Increment => "increment",
            StashOp::Acquire => "acquire",
            StashOp::Release => "release",
        }
    }
}

impl FromStr for StashOp {
    type Err = CupboardError;

    fn from_str(s: &str) -> Result<Self> {
        [
            StashOp::Create,
            StashOp::Set,
            StashOp::Increment,
            StashOp::Acquire,
            StashOp::Release,
        ]
        .into_iter()
        .find(|op| op.as_str() == s)
        .ok_or_else(|| CupboardError::InvalidData(format!("unknown stash operation '{}'", s)))
    }
}

/// Versioned shared state. Global unless a `scoped_to` link ties it to a
/// trail.
///
/// Every successful mutation bumps `version` by one and records the
/// operation; a lock re-acquired by its current holder is the one no-op.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stash {
    pub id: String,
    pub name: String,
    pub stash_type: StashType,
    #[serde(default)]
    pub value: JsonValue,
    pub version: i64,
    pub last_operation: StashOp,
    #[serde(default)]
    pub changed_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Stash {
    pub fn new(name: impl Into<String>, stash_type: StashType, value: JsonValue) -> Self {
        let now = time::now();
        let value = if stash_type == StashType::Lock {
            JsonValue::Null
        } else {
            value
        };
        Self {
            id: String::new(),
            name: name.into(),
            stash_type,
            value,
            version: 1,
            last_operation: StashOp::Create,
            changed_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn counter(name: impl Into<String>) -> Self {
        Self::new(name, StashType::Counter, json!(0))
    }

    pub fn lock(name: impl Into<String>) -> Self {
        Self::new(name, StashType::Lock, JsonValue::Null)
    }

    fn record(&mut self, op: StashOp, changed_by: Option<&str>) {
        self.version += 1;
        self.last_operation = op;
        self.changed_by = changed_by.map(str::to_string);
        self.updated_at = time::advance(self.updated_at);
    }

    fn wrong_type(&self, op: StashOp) -> CupboardError {
        CupboardError::InvalidStashType(format!(
            "{} is not allowed on {} stash '{}'",
            op.as_str(),
            self.stash_type,
            self.name
        ))
    }

    /// Replaces the value of a resource, artifact, context or counter stash.
    pub fn set_value(&mut self, value: JsonValue, changed_by: Option<&str>) -> Result<()> {
        if self.stash_type == StashType::Lock {
            return Err(self.wrong_type(StashOp::Set));
        }
        self.value = value;
        self.record(StashOp::Set, changed_by);
        Ok(())
    }

    /// Adds `delta` to a counter and returns the new count.
    pub fn increment(&mut self, delta: i64, changed_by: Option<&str>) -> Result<i64> {
        if self.stash_type != StashType::Counter {
            return Err(self.wrong_type(StashOp::Increment));
        }
        let current = counter_value(&self.value)?;
        let next = current.checked_add(delta).ok_or_else(|| {
            CupboardError::InvalidData(format!("counter '{}' overflowed", self.name))
        })?;
        self.value = json!(next);
        self.record(StashOp::Increment, changed_by);
        Ok(next)
    }

    pub fn holder(&self) -> Option<&str> {
        if self.stash_type != StashType::Lock {
            return None;
        }
        self.value.get("holder").and_then(JsonValue::as_str)
    }

    pub fn acquire(&mut self, holder: &str, changed_by: Option<&str>) -> Result<()> {
        if holder.is_empty() {
            return Err(CupboardError::InvalidHolder);
        }
        if self.stash_type != StashType::Lock {
            return Err(self.wrong_type(StashOp::Acquire));
        }
        match self.holder() {
            Some(current) if current == holder => return Ok(()),
            Some(current) => {
                return Err(CupboardError::LockHeld {
                    name: self.name.clone(),
                    holder: current.to_string(),
                });
            }
            None => {}
        }
        self.value = json!({
            "holder": holder,
            "acquired_at": time::format_ts(&time::now()),
        });
        self.record(StashOp::Acquire, changed_by);
        Ok(())
    }

    pub fn release(&mut self, holder: &str, changed_by: Option<&str>) -> Result<()> {
        if self.stash_type != StashType::Lock {
            return Err(self.wrong_type(StashOp::Release));
        }
        match self.holder() {
            Some(current) if current == holder => {}
            Some(current) => {
                return Err(CupboardError::NotLockHolder(format!(
                    "lock '{}' is held by {}, not {}",
                    self.name, current, holder
                )));
            }
            None => {
                return Err(CupboardError::NotLockHolder(format!(
                    "lock '{}' is not held",
                    self.name
                )));
            }
        }
        self.value = JsonValue::Null;
        self.record(StashOp::Release, changed_by);
        Ok(())
    }
}

/// One persisted version of a stash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StashVersion {
    pub stash_id: String,
    pub version: i64,
    pub value: JsonValue,
    pub operation: StashOp,
    pub changed_by: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

/// Absent counts as zero; whole floats are accepted since some writers
/// store every number as a double.
fn counter_value(value: &JsonValue) -> Result<i64> {
    match value {
        JsonValue::Null => Ok(0),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(i)
            } else if let Some(f) = n.as_f64().filter(|f| f.fract() == 0.0 && f.abs() < 9.0e15) {
                Ok(f as i64)
            } else {
                Err(CupboardError::TypeMismatch(format!(
                    "counter value {} is not an integer",
                    n
                )))
            }
        }
        other => Err(CupboardError::TypeMismatch(format!(
            "counter value {} is not a number",
            other
        ))),
    }
}
