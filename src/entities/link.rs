use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::core::error::{CupboardError, Result};
use crate::core::time;
use crate::entities::TableName;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkType {
    /// crumb -> trail membership
    BelongsTo,
    /// crumb -> parent crumb
    ChildOf,
    /// trail -> the crumb it branched from
    BranchesFrom,
    /// stash -> trail scope
    ScopedTo,
}

impl LinkType {
    pub const ALL: [LinkType; 4] = [
        LinkType::BelongsTo,
        LinkType::ChildOf,
        LinkType::BranchesFrom,
        LinkType::ScopedTo,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LinkType::BelongsTo => "belongs_to",
            LinkType::ChildOf => "child_of",
            LinkType::BranchesFrom => "branches_from",
            LinkType::ScopedTo => "scoped_to",
        }
    }

    /// Tables the `from` and `to` ends must reference.
    pub fn endpoints(&self) -> (TableName, TableName) {
        match self {
            LinkType::BelongsTo => (TableName::Crumbs, TableName::Trails),
            LinkType::ChildOf => (TableName::Crumbs, TableName::Crumbs),
            LinkType::BranchesFrom => (TableName::Trails, TableName::Crumbs),
            LinkType::ScopedTo => (TableName::Stashes, TableName::Trails),
        }
    }
}

impl fmt::Display for LinkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LinkType {
    type Err = CupboardError;

    fn from_str(s: &str) -> Result<Self> {
        LinkType::ALL
            .into_iter()
            .find(|lt| lt.as_str() == s)
            .ok_or_else(|| CupboardError::InvalidData(format!("unknown link type '{}'", s)))
    }
}

/// Directed, typed edge between two entities. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub id: String,
    pub link_type: LinkType,
    pub from_id: String,
    pub to_id: String,
    pub created_at: DateTime<Utc>,
}

impl Link {
    pub fn new(link_type: LinkType, from_id: impl Into<String>, to_id: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            link_type,
            from_id: from_id.into(),
            to_id: to_id.into(),
            created_at: time::now(),
        }
    }

    pub fn belongs_to(crumb_id: impl Into<String>, trail_id: impl Into<String>) -> Self {
        Self::new(LinkType::BelongsTo, crumb_id, trail_id)
    }

    pub fn scoped_to(stash_id: impl Into<String>, trail_id: impl Into<String>) -> Self {
        Self::new(LinkType::ScopedTo, stash_id, trail_id)
    }
}
