//! Dependent-row removal. Every function runs inside the caller's
//! transaction and returns one journal record per row it changed, each keyed
//! to that row's own table.

use rusqlite::{params, Connection};

use crate::core::error::{CupboardError, Result};
use crate::core::journal::{JournalOp, JournalRecord};
use crate::entities::{Category, Crumb, Entity, TableName};
use crate::store::rows;

fn ids(conn: &Connection, sql: &str, key: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(sql)?;
    let found = stmt
        .query_map(params![key], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(found)
}

fn remove(
    conn: &Connection,
    table: TableName,
    id: &str,
    records: &mut Vec<JournalRecord>,
) -> Result<()> {
    if rows::remove(conn, table, id)? {
        records.push(JournalRecord::delete(table, id));
    }
    Ok(())
}

fn remove_links_touching(
    conn: &Connection,
    id: &str,
    records: &mut Vec<JournalRecord>,
) -> Result<()> {
    let links = ids(
        conn,
        "SELECT id FROM links WHERE from_id = ?1 OR to_id = ?1 ORDER BY id",
        id,
    )?;
    for link_id in links {
        remove(conn, TableName::Links, &link_id, records)?;
    }
    Ok(())
}

/// Crumb plus its property values, metadata and every link touching it.
pub fn delete_crumb(conn: &Connection, id: &str, records: &mut Vec<JournalRecord>) -> Result<()> {
    for metadata_id in ids(conn, "SELECT id FROM metadata WHERE crumb_id = ?1 ORDER BY id", id)? {
        remove(conn, TableName::Metadata, &metadata_id, records)?;
    }
    remove_links_touching(conn, id, records)?;
    remove(conn, TableName::Crumbs, id, records)
}

/// Trail plus its links and scoped stashes. Member crumbs survive, unlinked.
pub fn delete_trail(conn: &Connection, id: &str, records: &mut Vec<JournalRecord>) -> Result<()> {
    let scoped = ids(
        conn,
        "SELECT from_id FROM links WHERE link_type = 'scoped_to' AND to_id = ?1 ORDER BY from_id",
        id,
    )?;
    for stash_id in scoped {
        delete_stash(conn, &stash_id, records)?;
    }
    remove_links_touching(conn, id, records)?;
    remove(conn, TableName::Trails, id, records)
}

pub fn delete_stash(conn: &Connection, id: &str, records: &mut Vec<JournalRecord>) -> Result<()> {
    remove_links_touching(conn, id, records)?;
    remove(conn, TableName::Stashes, id, records)
}

/// Property plus its categories; its values are cleared from every crumb.
pub fn delete_property(
    conn: &Connection,
    id: &str,
    records: &mut Vec<JournalRecord>,
) -> Result<()> {
    for category_id in ids(
        conn,
        "SELECT id FROM categories WHERE property_id = ?1 ORDER BY id",
        id,
    )? {
        remove(conn, TableName::Categories, &category_id, records)?;
    }
    let holders = ids(
        conn,
        "SELECT crumb_id FROM crumb_properties WHERE property_id = ?1 ORDER BY crumb_id",
        id,
    )?;
    clear_crumb_values(conn, &holders, id, records)?;
    remove(conn, TableName::Properties, id, records)
}

/// Category; crumbs holding it as their value lose that property value.
pub fn delete_category(
    conn: &Connection,
    id: &str,
    records: &mut Vec<JournalRecord>,
) -> Result<()> {
    let category: Category = rows::load(conn, TableName::Categories, id)?
        .ok_or_else(|| CupboardError::not_found(TableName::Categories.as_str(), id))?
        .try_into()?;
    let stored_value = serde_json::to_string(&category.id)?;
    let mut stmt = conn.prepare(
        "SELECT crumb_id FROM crumb_properties
         WHERE property_id = ?1 AND value = ?2 ORDER BY crumb_id",
    )?;
    let holders = stmt
        .query_map(params![category.property_id, stored_value], |row| {
            row.get::<_, String>(0)
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    clear_crumb_values(conn, &holders, &category.property_id, records)?;
    remove(conn, TableName::Categories, id, records)
}

/// Drops one property value from each crumb. `updated_at` is left alone: the
/// crumb itself was not edited.
fn clear_crumb_values(
    conn: &Connection,
    crumb_ids: &[String],
    property_id: &str,
    records: &mut Vec<JournalRecord>,
) -> Result<()> {
    for crumb_id in crumb_ids {
        let Some(entity) = rows::load(conn, TableName::Crumbs, crumb_id)? else {
            continue;
        };
        let mut crumb = Crumb::try_from(entity)?;
        if crumb.properties.remove(property_id).is_none() {
            continue;
        }
        let entity = Entity::Crumb(crumb);
        rows::write(conn, &entity)?;
        records.push(JournalRecord::upsert(JournalOp::Update, &entity)?);
    }
    Ok(())
}

/// Completion makes member crumbs permanent by dropping their membership.
pub fn trail_completed(
    conn: &Connection,
    trail_id: &str,
    records: &mut Vec<JournalRecord>,
) -> Result<()> {
    for link_id in ids(
        conn,
        "SELECT id FROM links WHERE link_type = 'belongs_to' AND to_id = ?1 ORDER BY id",
        trail_id,
    )? {
        remove(conn, TableName::Links, &link_id, records)?;
    }
    Ok(())
}

/// Abandonment deletes every member crumb with its full cascade.
pub fn trail_abandoned(
    conn: &Connection,
    trail_id: &str,
    records: &mut Vec<JournalRecord>,
) -> Result<()> {
    for crumb_id in ids(
        conn,
        "SELECT from_id FROM links WHERE link_type = 'belongs_to' AND to_id = ?1 ORDER BY from_id",
        trail_id,
    )? {
        delete_crumb(conn, &crumb_id, records)?;
    }
    Ok(())
}
