use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::time;

/// Append-only annotation on a crumb, filed under a metadata schema such as
/// `comments`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub id: String,
    pub crumb_id: String,
    pub schema: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Metadata {
    pub fn new(
        crumb_id: impl Into<String>,
        schema: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: String::new(),
            crumb_id: crumb_id.into(),
            schema: schema.into(),
            content: content.into(),
            created_at: time::now(),
        }
    }

    pub fn comment(crumb_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(crumb_id, "comments", content)
    }
}
