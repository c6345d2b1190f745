//! Centralized schema definitions for the cupboard row store.
//!
//! One SQLite database (`cupboard.db`) holds a table per entity kind plus two
//! join tables: `crumb_properties` (a crumb's property values) and
//! `stash_history` (one row per stash version). Every table is also journaled
//! to `<table>.jsonl`, from which the database can be rebuilt.
//!
//! No foreign keys: journals replay file by file, so rows may briefly
//! reference rows another journal has not restored yet.

use crate::entities::TableName;

pub const DB_NAME: &str = "cupboard.db";
pub const LEASE_NAME: &str = "cupboard.lock";
pub const JOURNAL_EXT: &str = "jsonl";
pub const SCHEMA_VERSION: u32 = 1;

pub const SCHEMA_META: &str = "
    CREATE TABLE IF NOT EXISTS meta (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    )
";

pub const SCHEMA_CRUMBS: &str = "
    CREATE TABLE IF NOT EXISTS crumbs (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        state TEXT NOT NULL DEFAULT 'draft',
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
";

pub const SCHEMA_CRUMB_PROPERTIES: &str = "
    CREATE TABLE IF NOT EXISTS crumb_properties (
        crumb_id TEXT NOT NULL,
        property_id TEXT NOT NULL,
        value TEXT NOT NULL,
        PRIMARY KEY (crumb_id, property_id)
    )
";

pub const SCHEMA_TRAILS: &str = "
    CREATE TABLE IF NOT EXISTS trails (
        id TEXT PRIMARY KEY,
        state TEXT NOT NULL DEFAULT 'draft',
        created_at TEXT NOT NULL,
        completed_at TEXT
    )
";

pub const SCHEMA_PROPERTIES: &str = "
    CREATE TABLE IF NOT EXISTS properties (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL UNIQUE,
        value_type TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        created_at TEXT NOT NULL
    )
";

pub const SCHEMA_CATEGORIES: &str = "
    CREATE TABLE IF NOT EXISTS categories (
        id TEXT PRIMARY KEY,
        property_id TEXT NOT NULL,
        name TEXT NOT NULL,
        ordinal INTEGER NOT NULL DEFAULT 0,
        UNIQUE (property_id, name)
    )
";

pub const SCHEMA_METADATA: &str = "
    CREATE TABLE IF NOT EXISTS metadata (
        id TEXT PRIMARY KEY,
        crumb_id TEXT NOT NULL,
        schema TEXT NOT NULL,
        content TEXT NOT NULL,
        created_at TEXT NOT NULL
    )
";

pub const SCHEMA_LINKS: &str = "
    CREATE TABLE IF NOT EXISTS links (
        id TEXT PRIMARY KEY,
        link_type TEXT NOT NULL,
        from_id TEXT NOT NULL,
        to_id TEXT NOT NULL,
        created_at TEXT NOT NULL
    )
";

pub const SCHEMA_STASHES: &str = "
    CREATE TABLE IF NOT EXISTS stashes (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        stash_type TEXT NOT NULL,
        value TEXT NOT NULL DEFAULT 'null',
        version INTEGER NOT NULL,
        last_operation TEXT NOT NULL,
        changed_by TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
";

pub const SCHEMA_STASH_HISTORY: &str = "
    CREATE TABLE IF NOT EXISTS stash_history (
        stash_id TEXT NOT NULL,
        version INTEGER NOT NULL,
        value TEXT NOT NULL,
        operation TEXT NOT NULL,
        changed_by TEXT,
        recorded_at TEXT NOT NULL,
        PRIMARY KEY (stash_id, version)
    )
";

pub const SCHEMA_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_crumbs_state ON crumbs(state)",
    "CREATE INDEX IF NOT EXISTS idx_crumb_properties_property ON crumb_properties(property_id, value)",
    "CREATE INDEX IF NOT EXISTS idx_trails_state ON trails(state)",
    "CREATE INDEX IF NOT EXISTS idx_categories_property ON categories(property_id)",
    "CREATE INDEX IF NOT EXISTS idx_metadata_crumb ON metadata(crumb_id)",
    "CREATE INDEX IF NOT EXISTS idx_links_from ON links(from_id, link_type)",
    "CREATE INDEX IF NOT EXISTS idx_links_to ON links(to_id, link_type)",
    "CREATE INDEX IF NOT EXISTS idx_stashes_name ON stashes(name)",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Integer,
}

/// Filterable native columns per table.
pub fn columns(table: TableName) -> &'static [(&'static str, ColumnKind)] {
    use ColumnKind::*;
    match table {
        TableName::Crumbs => &[
            ("id", Text),
            ("name", Text),
            ("state", Text),
            ("created_at", Text),
            ("updated_at", Text),
        ],
        TableName::Trails => &[
            ("id", Text),
            ("state", Text),
            ("created_at", Text),
            ("completed_at", Text),
        ],
        TableName::Properties => &[
            ("id", Text),
            ("name", Text),
            ("value_type", Text),
            ("description", Text),
            ("created_at", Text),
        ],
        TableName::Categories => &[
            ("id", Text),
            ("property_id", Text),
            ("name", Text),
            ("ordinal", Integer),
        ],
        TableName::Metadata => &[
            ("id", Text),
            ("crumb_id", Text),
            ("schema", Text),
            ("content", Text),
            ("created_at", Text),
        ],
        TableName::Links => &[
            ("id", Text),
            ("link_type", Text),
            ("from_id", Text),
            ("to_id", Text),
            ("created_at", Text),
        ],
        TableName::Stashes => &[
            ("id", Text),
            ("name", Text),
            ("stash_type", Text),
            ("version", Integer),
            ("last_operation", Text),
            ("changed_by", Text),
            ("created_at", Text),
            ("updated_at", Text),
        ],
    }
}

pub fn column_kind(table: TableName, column: &str) -> Option<ColumnKind> {
    columns(table)
        .iter()
        .find(|(name, _)| *name == column)
        .map(|(_, kind)| *kind)
}

pub fn journal_file_name(table: TableName) -> String {
    format!("{}.{}", table.as_str(), JOURNAL_EXT)
}
