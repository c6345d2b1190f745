use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::core::error::{CupboardError, Result};
use crate::core::time;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrailState {
    Draft,
    Pending,
    Active,
    Completed,
    Abandoned,
}

impl TrailState {
    pub const ALL: [TrailState; 5] = [
        TrailState::Draft,
        TrailState::Pending,
        TrailState::Active,
        TrailState::Completed,
        TrailState::Abandoned,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TrailState::Draft => "draft",
            TrailState::Pending => "pending",
            TrailState::Active => "active",
            TrailState::Completed => "completed",
            TrailState::Abandoned => "abandoned",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TrailState::Completed | TrailState::Abandoned)
    }
}

impl fmt::Display for TrailState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrailState {
    type Err = CupboardError;

    fn from_str(s: &str) -> Result<Self> {
        TrailState::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| CupboardError::InvalidState(format!("unknown trail state '{}'", s)))
    }
}

/// An exploration session grouping crumbs through `belongs_to` links.
///
/// Completing a trail makes its crumbs permanent (the membership links are
/// dropped); abandoning it deletes them. Both cascades run when the trail is
/// persisted with its new state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trail {
    pub id: String,
    pub state: TrailState,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Default for Trail {
    fn default() -> Self {
        Self::new()
    }
}

impl Trail {
    pub fn new() -> Self {
        Self {
            id: String::new(),
            state: TrailState::Draft,
            created_at: time::now(),
            completed_at: None,
        }
    }

    /// Moves between the non-terminal states.
    pub fn set_state(&mut self, target: &str) -> Result<()> {
        let state: TrailState = target.parse()?;
        if state.is_terminal() {
            return Err(CupboardError::InvalidTransition(format!(
                "trail can only become {} through complete or abandon",
                state
            )));
        }
        if self.state.is_terminal() {
            return Err(CupboardError::InvalidTransition(format!(
                "trail is already {}",
                self.state
            )));
        }
        self.state = state;
        Ok(())
    }

    fn close(&mut self, target: TrailState) -> Result<()> {
        if self.state != TrailState::Active {
            return Err(CupboardError::InvalidState(format!(
                "trail must be active to become {}, it is {}",
                target, self.state
            )));
        }
        self.state = target;
        self.completed_at = Some(time::now());
        Ok(())
    }

    pub fn complete(&mut self) -> Result<()> {
        self.close(TrailState::Completed)
    }

    pub fn abandon(&mut self) -> Result<()> {
        self.close(TrailState::Abandoned)
    }
}
