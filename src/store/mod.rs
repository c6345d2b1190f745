//! Persistence engine: applies one validated mutation to the row store and
//! reports the journal records describing every row it touched.
//!
//! Callers run these inside a `rusqlite::Transaction` and append the returned
//! records to the journal only after the transaction commits.

pub mod cascade;
pub mod rows;
pub mod validate;

use rusqlite::Connection;
use tracing::debug;

use crate::core::config::Settings;
use crate::core::error::{CupboardError, Result};
use crate::core::journal::{JournalOp, JournalRecord};
use crate::core::time::IdGenerator;
use crate::entities::{Category, Entity, Property, TableName, TrailState, ValueType};

/// Upserts `entity` (its ID already assigned) with validation and cascades.
/// Storing a value identical to the stored row changes nothing.
pub fn persist_set(
    conn: &Connection,
    settings: &Settings,
    entity: &Entity,
) -> Result<Vec<JournalRecord>> {
    let table = entity.table();
    let existing = rows::load(conn, table, entity.id())?;
    if existing.as_ref() == Some(entity) {
        return Ok(Vec::new());
    }
    validate::check(conn, settings, entity, existing.as_ref())?;

    rows::write(conn, entity)?;
    let op = if existing.is_some() {
        JournalOp::Update
    } else {
        JournalOp::Create
    };
    let mut records = vec![JournalRecord::upsert(op, entity)?];

    if let Entity::Trail(trail) = entity {
        let prev_state = match &existing {
            Some(Entity::Trail(prev)) => Some(prev.state),
            _ => None,
        };
        if prev_state != Some(trail.state) {
            match trail.state {
                TrailState::Completed => cascade::trail_completed(conn, &trail.id, &mut records)?,
                TrailState::Abandoned => cascade::trail_abandoned(conn, &trail.id, &mut records)?,
                _ => {}
            }
        }
    }
    debug!(table = %table, id = entity.id(), ?op, rows = records.len(), "set");
    Ok(records)
}

pub fn persist_delete(conn: &Connection, table: TableName, id: &str) -> Result<Vec<JournalRecord>> {
    if !rows::exists(conn, table, id)? {
        return Err(CupboardError::not_found(table.as_str(), id));
    }
    let mut records = Vec::new();
    match table {
        TableName::Crumbs => cascade::delete_crumb(conn, id, &mut records)?,
        TableName::Trails => cascade::delete_trail(conn, id, &mut records)?,
        TableName::Properties => cascade::delete_property(conn, id, &mut records)?,
        TableName::Categories => cascade::delete_category(conn, id, &mut records)?,
        TableName::Stashes => cascade::delete_stash(conn, id, &mut records)?,
        TableName::Metadata | TableName::Links => {
            rows::remove(conn, table, id)?;
            records.push(JournalRecord::delete(table, id));
        }
    }
    debug!(table = %table, id, rows = records.len(), "delete");
    Ok(records)
}

const BUILTIN_PROPERTIES: &[(&str, ValueType, &str, &[&str])] = &[
    (
        "priority",
        ValueType::Categorical,
        "Relative urgency of a crumb",
        &["highest", "high", "medium", "low", "lowest"],
    ),
    (
        "type",
        ValueType::Categorical,
        "Kind of work a crumb represents",
        &["task", "epic", "bug", "chore"],
    ),
    ("description", ValueType::Text, "Longer free-form detail", &[]),
    ("owner", ValueType::Text, "Who is responsible for the crumb", &[]),
    ("labels", ValueType::List, "Free-form tags", &[]),
];

/// Defines the standard properties when the properties table is empty.
pub fn seed_builtin_properties(
    conn: &Connection,
    settings: &Settings,
    ids: &mut IdGenerator,
) -> Result<Vec<JournalRecord>> {
    if rows::count(conn, TableName::Properties)? > 0 {
        return Ok(Vec::new());
    }
    let mut records = Vec::new();
    for (name, value_type, description, categories) in BUILTIN_PROPERTIES {
        let mut property = Property::new(*name, *value_type).with_description(*description);
        property.id = ids.mint();
        let property_id = property.id.clone();
        records.extend(persist_set(conn, settings, &Entity::Property(property))?);
        for (ordinal, category) in categories.iter().enumerate() {
            let mut category = Category::new(&property_id, *category, ordinal as i64);
            category.id = ids.mint();
            records.extend(persist_set(conn, settings, &Entity::Category(category))?);
        }
    }
    debug!(records = records.len(), "seeded built-in properties");
    Ok(records)
}
