use crate::core::error::{CupboardError, Result};
use crate::core::schemas;
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;
use std::time::Duration;

pub fn db_connect(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.busy_timeout(Duration::from_secs(5))
        .map_err(CupboardError::RusqliteError)?;
    conn.query_row("PRAGMA journal_mode=WAL;", [], |_| Ok(()))
        .map_err(CupboardError::RusqliteError)?;
    conn.execute_batch("PRAGMA synchronous=NORMAL;")
        .map_err(CupboardError::RusqliteError)?;
    Ok(conn)
}

pub fn ensure_schema(conn: &Connection) -> Result<()> {
    conn.execute(schemas::SCHEMA_META, [])?;

    let current: Option<String> = conn
        .query_row(
            "SELECT value FROM meta WHERE key = 'schema_version'",
            [],
            |row| row.get(0),
        )
        .optional()
        .map_err(CupboardError::RusqliteError)?;

    let current_version: u32 = current
        .as_deref()
        .and_then(|s| s.parse::<u32>().ok())
        .unwrap_or(0);

    if current_version > schemas::SCHEMA_VERSION {
        return Err(CupboardError::Backend(format!(
            "row store schema version {} is newer than supported version {}",
            current_version,
            schemas::SCHEMA_VERSION
        )));
    }
    if current_version == schemas::SCHEMA_VERSION {
        return Ok(());
    }

    conn.execute(schemas::SCHEMA_CRUMBS, [])?;
    conn.execute(schemas::SCHEMA_CRUMB_PROPERTIES, [])?;
    conn.execute(schemas::SCHEMA_TRAILS, [])?;
    conn.execute(schemas::SCHEMA_PROPERTIES, [])?;
    conn.execute(schemas::SCHEMA_CATEGORIES, [])?;
    conn.execute(schemas::SCHEMA_METADATA, [])?;
    conn.execute(schemas::SCHEMA_LINKS, [])?;
    conn.execute(schemas::SCHEMA_STASHES, [])?;
    conn.execute(schemas::SCHEMA_STASH_HISTORY, [])?;
    for index in schemas::SCHEMA_INDEXES {
        conn.execute(index, [])?;
    }

    conn.execute(
        "INSERT INTO meta(key, value) VALUES('schema_version', ?1)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        [schemas::SCHEMA_VERSION.to_string()],
    )?;

    Ok(())
}
