//! Row mapping between entities and the SQLite tables.
//!
//! Reads go through `rusqlite::Rows` rather than `query_map` so hydration can
//! issue the nested `crumb_properties` lookup and report malformed rows as
//! `InvalidData` instead of a backend fault.

use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::str::FromStr;

use crate::core::error::{CupboardError, Result};
use crate::core::filter::FilterPlan;
use crate::core::time;
use crate::entities::stash::StashVersion;
use crate::entities::{
    Category, Crumb, Entity, Link, Metadata, Property, Stash, TableName, Trail,
};

fn select_columns(table: TableName) -> &'static str {
    match table {
        TableName::Crumbs => "id, name, state, created_at, updated_at",
        TableName::Trails => "id, state, created_at, completed_at",
        TableName::Properties => "id, name, value_type, description, created_at",
        TableName::Categories => "id, property_id, name, ordinal",
        TableName::Metadata => "id, crumb_id, schema, content, created_at",
        TableName::Links => "id, link_type, from_id, to_id, created_at",
        TableName::Stashes => {
            "id, name, stash_type, value, version, last_operation, changed_by, created_at, updated_at"
        }
    }
}

fn order_by(table: TableName) -> &'static str {
    match table {
        TableName::Categories => "property_id, ordinal, name, id",
        _ => "id",
    }
}

fn malformed(table: TableName, detail: impl std::fmt::Display) -> CupboardError {
    CupboardError::InvalidData(format!("malformed {} row: {}", table, detail))
}

/// Column read where a type mismatch means the row is malformed, not that the
/// backend failed.
fn column<T: rusqlite::types::FromSql>(table: TableName, row: &Row<'_>, idx: usize) -> Result<T> {
    row.get::<_, T>(idx).map_err(|e| match e {
        rusqlite::Error::InvalidColumnType(..)
        | rusqlite::Error::FromSqlConversionFailure(..)
        | rusqlite::Error::IntegralValueOutOfRange(..) => malformed(table, e),
        other => CupboardError::RusqliteError(other),
    })
}

fn parsed<T: FromStr<Err = CupboardError>>(table: TableName, raw: &str) -> Result<T> {
    raw.parse().map_err(|e: CupboardError| malformed(table, e))
}

fn timestamp(table: TableName, raw: &str) -> Result<chrono::DateTime<chrono::Utc>> {
    time::parse_ts(raw).map_err(|e| malformed(table, e))
}

fn json_text(table: TableName, raw: &str) -> Result<JsonValue> {
    serde_json::from_str(raw).map_err(|e| malformed(table, e))
}

fn crumb_properties(conn: &Connection, crumb_id: &str) -> Result<BTreeMap<String, JsonValue>> {
    let mut stmt = conn.prepare(
        "SELECT property_id, value FROM crumb_properties WHERE crumb_id = ?1 ORDER BY property_id",
    )?;
    let mut rows = stmt.query(params![crumb_id])?;
    let mut properties = BTreeMap::new();
    while let Some(row) = rows.next()? {
        let property_id: String = column(TableName::Crumbs, row, 0)?;
        let raw: String = column(TableName::Crumbs, row, 1)?;
        properties.insert(property_id, json_text(TableName::Crumbs, &raw)?);
    }
    Ok(properties)
}

fn hydrate(conn: &Connection, table: TableName, row: &Row<'_>) -> Result<Entity> {
    let t = table;
    let entity = match table {
        TableName::Crumbs => {
            let id: String = column(t, row, 0)?;
            let properties = crumb_properties(conn, &id)?;
            Entity::Crumb(Crumb {
                name: column(t, row, 1)?,
                state: parsed(t, &column::<String>(t, row, 2)?)?,
                created_at: timestamp(t, &column::<String>(t, row, 3)?)?,
                updated_at: timestamp(t, &column::<String>(t, row, 4)?)?,
                properties,
                id,
            })
        }
        TableName::Trails => {
            let completed_at: Option<String> = column(t, row, 3)?;
            Entity::Trail(Trail {
                id: column(t, row, 0)?,
                state: parsed(t, &column::<String>(t, row, 1)?)?,
                created_at: timestamp(t, &column::<String>(t, row, 2)?)?,
                completed_at: completed_at.map(|raw| timestamp(t, &raw)).transpose()?,
            })
        }
        TableName::Properties => Entity::Property(Property {
            id: column(t, row, 0)?,
            name: column(t, row, 1)?,
            value_type: parsed(t, &column::<String>(t, row, 2)?)?,
            description: column(t, row, 3)?,
            created_at: timestamp(t, &column::<String>(t, row, 4)?)?,
        }),
        TableName::Categories => Entity::Category(Category {
            id: column(t, row, 0)?,
            property_id: column(t, row, 1)?,
            name: column(t, row, 2)?,
            ordinal: column(t, row, 3)?,
        }),
        TableName::Metadata => Entity::Metadata(Metadata {
            id: column(t, row, 0)?,
            crumb_id: column(t, row, 1)?,
            schema: column(t, row, 2)?,
            content: column(t, row, 3)?,
            created_at: timestamp(t, &column::<String>(t, row, 4)?)?,
        }),
        TableName::Links => Entity::Link(Link {
            id: column(t, row, 0)?,
            link_type: parsed(t, &column::<String>(t, row, 1)?)?,
            from_id: column(t, row, 2)?,
            to_id: column(t, row, 3)?,
            created_at: timestamp(t, &column::<String>(t, row, 4)?)?,
        }),
        TableName::Stashes => Entity::Stash(Stash {
            id: column(t, row, 0)?,
            name: column(t, row, 1)?,
            stash_type: parsed(t, &column::<String>(t, row, 2)?)?,
            value: json_text(t, &column::<String>(t, row, 3)?)?,
            version: column(t, row, 4)?,
            last_operation: parsed(t, &column::<String>(t, row, 5)?)?,
            changed_by: column(t, row, 6)?,
            created_at: timestamp(t, &column::<String>(t, row, 7)?)?,
            updated_at: timestamp(t, &column::<String>(t, row, 8)?)?,
        }),
    };
    Ok(entity)
}

fn query(
    conn: &Connection,
    table: TableName,
    where_sql: &str,
    params: &[SqlValue],
) -> Result<Vec<Entity>> {
    let sql = format!(
        "SELECT {} FROM {}{} ORDER BY {}",
        select_columns(table),
        table.as_str(),
        where_sql,
        order_by(table)
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params_from_iter(params.iter()))?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        out.push(hydrate(conn, table, row)?);
    }
    Ok(out)
}

pub fn load(conn: &Connection, table: TableName, id: &str) -> Result<Option<Entity>> {
    let mut found = query(conn, table, " WHERE id = ?", &[SqlValue::Text(id.to_string())])?;
    Ok(found.pop())
}

pub fn fetch(conn: &Connection, table: TableName, plan: &FilterPlan) -> Result<Vec<Entity>> {
    query(conn, table, &plan.where_sql(), &plan.params)
}

/// Loads every row of `table` whose `column` equals `value`.
pub fn fetch_by(
    conn: &Connection,
    table: TableName,
    column: &str,
    value: &str,
) -> Result<Vec<Entity>> {
    query(
        conn,
        table,
        &format!(" WHERE {} = ?", column),
        &[SqlValue::Text(value.to_string())],
    )
}

pub fn exists(conn: &Connection, table: TableName, id: &str) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            &format!("SELECT 1 FROM {} WHERE id = ?1", table.as_str()),
            params![id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

pub fn count(conn: &Connection, table: TableName) -> Result<i64> {
    let n = conn.query_row(
        &format!("SELECT COUNT(*) FROM {}", table.as_str()),
        [],
        |row| row.get(0),
    )?;
    Ok(n)
}

/// Inserts or replaces the row for `entity`, including its dependent rows.
pub fn write(conn: &Connection, entity: &Entity) -> Result<()> {
    match entity {
        Entity::Crumb(c) => {
            conn.execute(
                "INSERT INTO crumbs(id, name, state, created_at, updated_at)
                 VALUES(?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(id) DO UPDATE SET
                    name=excluded.name, state=excluded.state,
                    created_at=excluded.created_at, updated_at=excluded.updated_at",
                params![
                    c.id,
                    c.name,
                    c.state.as_str(),
                    time::format_ts(&c.created_at),
                    time::format_ts(&c.updated_at),
                ],
            )?;
            conn.execute(
                "DELETE FROM crumb_properties WHERE crumb_id = ?1",
                params![c.id],
            )?;
            let mut insert = conn.prepare(
                "INSERT INTO crumb_properties(crumb_id, property_id, value) VALUES(?1, ?2, ?3)",
            )?;
            for (property_id, value) in &c.properties {
                insert.execute(params![c.id, property_id, serde_json::to_string(value)?])?;
            }
        }
        Entity::Trail(t) => {
            conn.execute(
                "INSERT INTO trails(id, state, created_at, completed_at)
                 VALUES(?1, ?2, ?3, ?4)
                 ON CONFLICT(id) DO UPDATE SET
                    state=excluded.state, created_at=excluded.created_at,
                    completed_at=excluded.completed_at",
                params![
                    t.id,
                    t.state.as_str(),
                    time::format_ts(&t.created_at),
                    t.completed_at.as_ref().map(time::format_ts),
                ],
            )?;
        }
        Entity::Property(p) => {
            conn.execute(
                "INSERT INTO properties(id, name, value_type, description, created_at)
                 VALUES(?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(id) DO UPDATE SET
                    name=excluded.name, value_type=excluded.value_type,
                    description=excluded.description, created_at=excluded.created_at",
                params![
                    p.id,
                    p.name,
                    p.value_type.as_str(),
                    p.description,
                    time::format_ts(&p.created_at),
                ],
            )?;
        }
        Entity::Category(c) => {
            conn.execute(
                "INSERT INTO categories(id, property_id, name, ordinal)
                 VALUES(?1, ?2, ?3, ?4)
                 ON CONFLICT(id) DO UPDATE SET
                    property_id=excluded.property_id, name=excluded.name,
                    ordinal=excluded.ordinal",
                params![c.id, c.property_id, c.name, c.ordinal],
            )?;
        }
        Entity::Metadata(m) => {
            conn.execute(
                "INSERT INTO metadata(id, crumb_id, schema, content, created_at)
                 VALUES(?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(id) DO UPDATE SET
                    crumb_id=excluded.crumb_id, schema=excluded.schema,
                    content=excluded.content, created_at=excluded.created_at",
                params![
                    m.id,
                    m.crumb_id,
                    m.schema,
                    m.content,
                    time::format_ts(&m.created_at),
                ],
            )?;
        }
        Entity::Link(l) => {
            conn.execute(
                "INSERT INTO links(id, link_type, from_id, to_id, created_at)
                 VALUES(?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(id) DO UPDATE SET
                    link_type=excluded.link_type, from_id=excluded.from_id,
                    to_id=excluded.to_id, created_at=excluded.created_at",
                params![
                    l.id,
                    l.link_type.as_str(),
                    l.from_id,
                    l.to_id,
                    time::format_ts(&l.created_at),
                ],
            )?;
        }
        Entity::Stash(s) => {
            let value = serde_json::to_string(&s.value)?;
            conn.execute(
                "INSERT INTO stashes(id, name, stash_type, value, version, last_operation,
                                     changed_by, created_at, updated_at)
                 VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                 ON CONFLICT(id) DO UPDATE SET
                    name=excluded.name, stash_type=excluded.stash_type,
                    value=excluded.value, version=excluded.version,
                    last_operation=excluded.last_operation,
                    changed_by=excluded.changed_by, created_at=excluded.created_at,
                    updated_at=excluded.updated_at",
                params![
                    s.id,
                    s.name,
                    s.stash_type.as_str(),
                    value,
                    s.version,
                    s.last_operation.as_str(),
                    s.changed_by,
                    time::format_ts(&s.created_at),
                    time::format_ts(&s.updated_at),
                ],
            )?;
            conn.execute(
                "INSERT OR IGNORE INTO stash_history(stash_id, version, value, operation,
                                                     changed_by, recorded_at)
                 VALUES(?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    s.id,
                    s.version,
                    value,
                    s.last_operation.as_str(),
                    s.changed_by,
                    time::format_ts(&s.updated_at),
                ],
            )?;
        }
    }
    Ok(())
}

/// Deletes the row and its dependent rows. Returns false when absent.
pub fn remove(conn: &Connection, table: TableName, id: &str) -> Result<bool> {
    match table {
        TableName::Crumbs => {
            conn.execute("DELETE FROM crumb_properties WHERE crumb_id = ?1", params![id])?;
        }
        TableName::Stashes => {
            conn.execute("DELETE FROM stash_history WHERE stash_id = ?1", params![id])?;
        }
        _ => {}
    }
    let n = conn.execute(
        &format!("DELETE FROM {} WHERE id = ?1", table.as_str()),
        params![id],
    )?;
    Ok(n > 0)
}

pub fn stash_history(conn: &Connection, stash_id: &str) -> Result<Vec<StashVersion>> {
    let t = TableName::Stashes;
    let mut stmt = conn.prepare(
        "SELECT stash_id, version, value, operation, changed_by, recorded_at
         FROM stash_history WHERE stash_id = ?1 ORDER BY version",
    )?;
    let mut rows = stmt.query(params![stash_id])?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        out.push(StashVersion {
            stash_id: column(t, row, 0)?,
            version: column(t, row, 1)?,
            value: json_text(t, &column::<String>(t, row, 2)?)?,
            operation: parsed(t, &column::<String>(t, row, 3)?)?,
            changed_by: column(t, row, 4)?,
            recorded_at: timestamp(t, &column::<String>(t, row, 5)?)?,
        });
    }
    Ok(out)
}
