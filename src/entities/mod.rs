//! Entity model: the typed records a cupboard stores.
//!
//! Everything here is pure data plus in-memory transition logic. Nothing is
//! durable until the mutated value is handed to [`crate::table::Table::set`].

pub mod category;
pub mod crumb;
pub mod link;
pub mod metadata;
pub mod property;
pub mod stash;
pub mod trail;

use serde_json::Value as JsonValue;
use std::fmt;
use std::str::FromStr;

use crate::core::error::{CupboardError, Result};

pub use category::Category;
pub use crumb::{Crumb, CrumbState};
pub use link::{Link, LinkType};
pub use metadata::Metadata;
pub use property::{Property, ValueType};
pub use stash::{Stash, StashOp, StashType, StashVersion};
pub use trail::{Trail, TrailState};

/// The standard tables a cupboard exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TableName {
    Crumbs,
    Trails,
    Properties,
    Categories,
    Metadata,
    Links,
    Stashes,
}

impl TableName {
    pub const ALL: [TableName; 7] = [
        TableName::Crumbs,
        TableName::Trails,
        TableName::Properties,
        TableName::Categories,
        TableName::Metadata,
        TableName::Links,
        TableName::Stashes,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TableName::Crumbs => "crumbs",
            TableName::Trails => "trails",
            TableName::Properties => "properties",
            TableName::Categories => "categories",
            TableName::Metadata => "metadata",
            TableName::Links => "links",
            TableName::Stashes => "stashes",
        }
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TableName {
    type Err = CupboardError;

    fn from_str(s: &str) -> Result<Self> {
        TableName::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| CupboardError::TableNotFound(s.to_string()))
    }
}

/// One value of any entity kind, tagged by kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Entity {
    Crumb(Crumb),
    Trail(Trail),
    Property(Property),
    Category(Category),
    Metadata(Metadata),
    Link(Link),
    Stash(Stash),
}

impl Entity {
    pub fn table(&self) -> TableName {
        match self {
            Entity::Crumb(_) => TableName::Crumbs,
            Entity::Trail(_) => TableName::Trails,
            Entity::Property(_) => TableName::Properties,
            Entity::Category(_) => TableName::Categories,
            Entity::Metadata(_) => TableName::Metadata,
            Entity::Link(_) => TableName::Links,
            Entity::Stash(_) => TableName::Stashes,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Entity::Crumb(e) => &e.id,
            Entity::Trail(e) => &e.id,
            Entity::Property(e) => &e.id,
            Entity::Category(e) => &e.id,
            Entity::Metadata(e) => &e.id,
            Entity::Link(e) => &e.id,
            Entity::Stash(e) => &e.id,
        }
    }

    pub(crate) fn set_id(&mut self, id: &str) {
        let slot = match self {
            Entity::Crumb(e) => &mut e.id,
            Entity::Trail(e) => &mut e.id,
            Entity::Property(e) => &mut e.id,
            Entity::Category(e) => &mut e.id,
            Entity::Metadata(e) => &mut e.id,
            Entity::Link(e) => &mut e.id,
            Entity::Stash(e) => &mut e.id,
        };
        *slot = id.to_string();
    }

    pub fn to_json(&self) -> Result<JsonValue> {
        let value = match self {
            Entity::Crumb(e) => serde_json::to_value(e)?,
            Entity::Trail(e) => serde_json::to_value(e)?,
            Entity::Property(e) => serde_json::to_value(e)?,
            Entity::Category(e) => serde_json::to_value(e)?,
            Entity::Metadata(e) => serde_json::to_value(e)?,
            Entity::Link(e) => serde_json::to_value(e)?,
            Entity::Stash(e) => serde_json::to_value(e)?,
        };
        Ok(value)
    }

    pub fn from_json(table: TableName, value: JsonValue) -> Result<Self> {
        let invalid = |e: serde_json::Error| {
            CupboardError::InvalidData(format!("malformed {} record: {}", table, e))
        };
        Ok(match table {
            TableName::Crumbs => Entity::Crumb(serde_json::from_value(value).map_err(invalid)?),
            TableName::Trails => Entity::Trail(serde_json::from_value(value).map_err(invalid)?),
            TableName::Properties => {
                Entity::Property(serde_json::from_value(value).map_err(invalid)?)
            }
            TableName::Categories => {
                Entity::Category(serde_json::from_value(value).map_err(invalid)?)
            }
            TableName::Metadata => {
                Entity::Metadata(serde_json::from_value(value).map_err(invalid)?)
            }
            TableName::Links => Entity::Link(serde_json::from_value(value).map_err(invalid)?),
            TableName::Stashes => Entity::Stash(serde_json::from_value(value).map_err(invalid)?),
        })
    }
}

macro_rules! entity_conversions {
    ($($variant:ident => $ty:ty),+ $(,)?) => {
        $(
            impl From<$ty> for Entity {
                fn from(value: $ty) -> Self {
                    Entity::$variant(value)
                }
            }

            impl TryFrom<Entity> for $ty {
                type Error = CupboardError;

                fn try_from(entity: Entity) -> Result<Self> {
                    match entity {
                        Entity::$variant(value) => Ok(value),
                        other => Err(CupboardError::InvalidData(format!(
                            "expected {}, found a {} entity",
                            stringify!($variant),
                            other.table()
                        ))),
                    }
                }
            }
        )+
    };
}

entity_conversions! {
    Crumb => Crumb,
    Trail => Trail,
    Property => Property,
    Category => Category,
    Metadata => Metadata,
    Link => Link,
    Stash => Stash,
}
