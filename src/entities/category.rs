use serde::{Deserialize, Serialize};

/// One ordered value of a categorical property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub property_id: String,
    pub name: String,
    pub ordinal: i64,
}

impl Category {
    pub fn new(property_id: impl Into<String>, name: impl Into<String>, ordinal: i64) -> Self {
        Self {
            id: String::new(),
            property_id: property_id.into(),
            name: name.into(),
            ordinal,
        }
    }
}
