//! Checks that need storage: references, uniqueness and write-once rules.
//!
//! Each check runs inside the write transaction, before any row changes.

use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value as JsonValue;

use crate::core::config::Settings;
use crate::core::error::{CupboardError, Result};
use crate::entities::{
    Category, Crumb, Entity, Link, LinkType, Metadata, Property, Stash, StashType, TableName,
    Trail, ValueType,
};
use crate::store::rows;

pub fn check(
    conn: &Connection,
    settings: &Settings,
    entity: &Entity,
    existing: Option<&Entity>,
) -> Result<()> {
    match (entity, existing) {
        (Entity::Crumb(c), _) => check_crumb(conn, c),
        (Entity::Trail(t), Some(Entity::Trail(prev))) => check_trail(t, prev),
        (Entity::Trail(_), _) => Ok(()),
        (Entity::Property(p), prev) => check_property(conn, p, prev),
        (Entity::Category(c), _) => check_category(conn, c),
        (Entity::Metadata(m), prev) => check_metadata(conn, settings, m, prev),
        (Entity::Link(l), prev) => check_link(conn, l, prev),
        (Entity::Stash(s), prev) => check_stash(conn, s, prev),
    }
}

fn require_name(kind: &str, name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(CupboardError::InvalidName(format!(
            "{} name must not be empty",
            kind
        )));
    }
    Ok(())
}

fn load_property(conn: &Connection, id: &str) -> Result<Option<Property>> {
    rows::load(conn, TableName::Properties, id)?
        .map(Property::try_from)
        .transpose()
}

fn check_crumb(conn: &Connection, crumb: &Crumb) -> Result<()> {
    require_name("crumb", &crumb.name)?;
    for (property_id, value) in &crumb.properties {
        let property = load_property(conn, property_id)?
            .ok_or_else(|| CupboardError::PropertyNotFound(property_id.clone()))?;
        property.value_type.check_value(value)?;
        if property.value_type == ValueType::Categorical {
            let category_id = value.as_str().unwrap_or_default();
            if !category_of(conn, &property.id, category_id)? {
                return Err(CupboardError::InvalidCategory(format!(
                    "'{}' is not a category of property '{}'",
                    category_id, property.name
                )));
            }
        }
    }
    Ok(())
}

fn category_of(conn: &Connection, property_id: &str, category_id: &str) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM categories WHERE id = ?1 AND property_id = ?2",
            params![category_id, property_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

fn check_trail(trail: &Trail, prev: &Trail) -> Result<()> {
    if prev.state.is_terminal() && trail.state != prev.state {
        return Err(CupboardError::InvalidTransition(format!(
            "trail {} is {} and cannot become {}",
            trail.id, prev.state, trail.state
        )));
    }
    Ok(())
}

fn check_property(conn: &Connection, property: &Property, prev: Option<&Entity>) -> Result<()> {
    require_name("property", &property.name)?;
    if let Some(Entity::Property(prev)) = prev
        && prev.value_type != property.value_type
    {
        return Err(CupboardError::InvalidValueType(format!(
            "property '{}' is {} and cannot change to {}",
            prev.name, prev.value_type, property.value_type
        )));
    }
    let clash: Option<String> = conn
        .query_row(
            "SELECT id FROM properties WHERE name = ?1 AND id != ?2",
            params![property.name, property.id],
            |row| row.get(0),
        )
        .optional()?;
    if clash.is_some() {
        return Err(CupboardError::DuplicateName(format!(
            "property '{}' already exists",
            property.name
        )));
    }
    Ok(())
}

fn check_category(conn: &Connection, category: &Category) -> Result<()> {
    require_name("category", &category.name)?;
    let property = load_property(conn, &category.property_id)?.ok_or_else(|| {
        CupboardError::not_found(TableName::Properties.as_str(), &category.property_id)
    })?;
    if property.value_type != ValueType::Categorical {
        return Err(CupboardError::InvalidValueType(format!(
            "property '{}' is {}, only categorical properties have categories",
            property.name, property.value_type
        )));
    }
    let clash: Option<String> = conn
        .query_row(
            "SELECT id FROM categories WHERE property_id = ?1 AND name = ?2 AND id != ?3",
            params![category.property_id, category.name, category.id],
            |row| row.get(0),
        )
        .optional()?;
    if clash.is_some() {
        return Err(CupboardError::DuplicateName(format!(
            "category '{}' already exists for property '{}'",
            category.name, property.name
        )));
    }
    Ok(())
}

fn check_metadata(
    conn: &Connection,
    settings: &Settings,
    metadata: &Metadata,
    prev: Option<&Entity>,
) -> Result<()> {
    if prev.is_some() {
        return Err(CupboardError::InvalidData(format!(
            "metadata {} is append-only",
            metadata.id
        )));
    }
    if !rows::exists(conn, TableName::Crumbs, &metadata.crumb_id)? {
        return Err(CupboardError::not_found(
            TableName::Crumbs.as_str(),
            &metadata.crumb_id,
        ));
    }
    if !settings.metadata_schemas.iter().any(|s| *s == metadata.schema) {
        return Err(CupboardError::SchemaNotFound(metadata.schema.clone()));
    }
    if metadata.content.trim().is_empty() {
        return Err(CupboardError::InvalidContent(
            "metadata content must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn links_from(conn: &Connection, link_type: LinkType, from_id: &str) -> Result<Vec<Link>> {
    let mut out = Vec::new();
    for entity in rows::fetch_by(conn, TableName::Links, "from_id", from_id)? {
        let link = Link::try_from(entity)?;
        if link.link_type == link_type {
            out.push(link);
        }
    }
    Ok(out)
}

fn check_link(conn: &Connection, link: &Link, prev: Option<&Entity>) -> Result<()> {
    if prev.is_some() {
        return Err(CupboardError::InvalidData(format!(
            "link {} is immutable",
            link.id
        )));
    }
    let (from_table, to_table) = link.link_type.endpoints();
    for (table, id) in [(from_table, &link.from_id), (to_table, &link.to_id)] {
        if id.is_empty() {
            return Err(CupboardError::InvalidId(format!(
                "{} link endpoint must not be empty",
                link.link_type
            )));
        }
        if !rows::exists(conn, table, id)? {
            return Err(CupboardError::not_found(table.as_str(), id.as_str()));
        }
    }
    if link.from_id == link.to_id {
        return Err(CupboardError::InvalidData(format!(
            "{} link cannot point at itself",
            link.link_type
        )));
    }

    let siblings = links_from(conn, link.link_type, &link.from_id)?;
    match link.link_type {
        LinkType::BelongsTo => {
            if let Some(current) = siblings.first() {
                return Err(CupboardError::AlreadyInTrail {
                    crumb: link.from_id.clone(),
                    trail: current.to_id.clone(),
                });
            }
            let trail = rows::load(conn, TableName::Trails, &link.to_id)?
                .map(Trail::try_from)
                .transpose()?;
            if let Some(trail) = trail
                && trail.state.is_terminal()
            {
                return Err(CupboardError::InvalidState(format!(
                    "trail {} is {}",
                    trail.id, trail.state
                )));
            }
        }
        LinkType::ScopedTo => {
            if let Some(current) = siblings.first() {
                return Err(CupboardError::InvalidData(format!(
                    "stash {} is already scoped to trail {}",
                    link.from_id, current.to_id
                )));
            }
            let stash: Stash = rows::load(conn, TableName::Stashes, &link.from_id)?
                .ok_or_else(|| CupboardError::not_found(TableName::Stashes.as_str(), &link.from_id))?
                .try_into()?;
            if let Some(other) = stash_name_clash(conn, &stash.name, &stash.id, Some(&link.to_id))? {
                return Err(CupboardError::DuplicateName(format!(
                    "trail {} already has a stash named '{}' ({})",
                    link.to_id, stash.name, other
                )));
            }
        }
        LinkType::ChildOf | LinkType::BranchesFrom => {
            if siblings.iter().any(|l| l.to_id == link.to_id) {
                return Err(CupboardError::InvalidData(format!(
                    "{} link {} -> {} already exists",
                    link.link_type, link.from_id, link.to_id
                )));
            }
        }
    }
    Ok(())
}

/// Trail a stash is scoped to, if any.
fn stash_scope(conn: &Connection, stash_id: &str) -> Result<Option<String>> {
    let scope = conn
        .query_row(
            "SELECT to_id FROM links WHERE link_type = 'scoped_to' AND from_id = ?1",
            params![stash_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(scope)
}

/// Another stash with `name` in the given scope (`None` is global).
fn stash_name_clash(
    conn: &Connection,
    name: &str,
    stash_id: &str,
    scope: Option<&str>,
) -> Result<Option<String>> {
    let clash = match scope {
        Some(trail_id) => conn
            .query_row(
                "SELECT s.id FROM stashes s
                 JOIN links l ON l.from_id = s.id AND l.link_type = 'scoped_to'
                 WHERE l.to_id = ?1 AND s.name = ?2 AND s.id != ?3",
                params![trail_id, name, stash_id],
                |row| row.get(0),
            )
            .optional()?,
        None => conn
            .query_row(
                "SELECT s.id FROM stashes s
                 WHERE s.name = ?1 AND s.id != ?2
                   AND NOT EXISTS (SELECT 1 FROM links l
                                   WHERE l.link_type = 'scoped_to' AND l.from_id = s.id)",
                params![name, stash_id],
                |row| row.get(0),
            )
            .optional()?,
    };
    Ok(clash)
}

fn check_stash(conn: &Connection, stash: &Stash, prev: Option<&Entity>) -> Result<()> {
    require_name("stash", &stash.name)?;
    match prev {
        Some(Entity::Stash(prev)) => {
            if prev.stash_type != stash.stash_type {
                return Err(CupboardError::InvalidStashType(format!(
                    "stash '{}' is a {} and cannot become a {}",
                    prev.name, prev.stash_type, stash.stash_type
                )));
            }
            if stash.version <= prev.version {
                return Err(CupboardError::StaleVersion {
                    id: stash.id.clone(),
                    stored: prev.version,
                    offered: stash.version,
                });
            }
        }
        _ => {
            if stash.version < 1 {
                return Err(CupboardError::InvalidData(format!(
                    "stash '{}' must start at version 1 or later",
                    stash.name
                )));
            }
        }
    }
    check_stash_value(stash)?;

    let scope = stash_scope(conn, &stash.id)?;
    if let Some(other) = stash_name_clash(conn, &stash.name, &stash.id, scope.as_deref())? {
        return Err(CupboardError::DuplicateName(format!(
            "stash '{}' already exists in this scope ({})",
            stash.name, other
        )));
    }
    Ok(())
}

fn check_stash_value(stash: &Stash) -> Result<()> {
    match stash.stash_type {
        StashType::Counter if !(stash.value.is_null() || stash.value.is_number()) => {
            Err(CupboardError::TypeMismatch(format!(
                "counter '{}' holds {}",
                stash.name, stash.value
            )))
        }
        StashType::Lock => match &stash.value {
            JsonValue::Null => Ok(()),
            JsonValue::Object(map) if map.get("holder").is_some_and(|h| {
                h.as_str().is_some_and(|h| !h.is_empty())
            }) =>
            {
                Ok(())
            }
            other => Err(CupboardError::InvalidData(format!(
                "lock '{}' holds {}",
                stash.name, other
            ))),
        },
        _ => Ok(()),
    }
}
