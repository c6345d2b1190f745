//! Append-only JSONL journals, one file per table.
//!
//! Each line is a self-describing record of one row-level effect: the full
//! entity for `create`/`update`, only the ID for `delete`. Lines carry a
//! SHA-256 of the entity so replay can detect hand-edited or damaged files.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::core::error::{CupboardError, Result};
use crate::core::schemas;
use crate::core::sync::{SyncController, SyncStrategy};
use crate::core::time;
use crate::entities::{Entity, TableName};

const WRITER_CAPACITY: usize = 64 * 1024;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum JournalOp {
    Create,
    Update,
    Delete,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct JournalRecord {
    pub ts: String,
    pub event_id: String,
    pub op: JournalOp,
    pub table: String,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

impl JournalRecord {
    pub fn upsert(op: JournalOp, entity: &Entity) -> Result<Self> {
        let value = entity.to_json()?;
        Ok(Self {
            ts: time::format_ts(&time::now()),
            event_id: time::new_event_id(),
            op,
            table: entity.table().as_str().to_string(),
            id: entity.id().to_string(),
            hash: Some(entity_hash(&value)?),
            entity: Some(value),
        })
    }

    pub fn delete(table: TableName, id: &str) -> Self {
        Self {
            ts: time::format_ts(&time::now()),
            event_id: time::new_event_id(),
            op: JournalOp::Delete,
            table: table.as_str().to_string(),
            id: id.to_string(),
            entity: None,
            hash: None,
        }
    }

    pub fn table_name(&self) -> Result<TableName> {
        self.table
            .parse()
            .map_err(|_| CupboardError::JournalCorrupt(format!("unknown table '{}'", self.table)))
    }

    /// Decodes the carried entity after checking its hash and ID.
    pub fn entity(&self) -> Result<Option<Entity>> {
        let Some(value) = &self.entity else {
            if self.op == JournalOp::Delete {
                return Ok(None);
            }
            return Err(CupboardError::JournalCorrupt(format!(
                "{} record {} carries no entity",
                self.table, self.event_id
            )));
        };
        let expected = entity_hash(value)?;
        if self.hash.as_deref() != Some(expected.as_str()) {
            return Err(CupboardError::JournalCorrupt(format!(
                "hash mismatch for {}/{} in event {}",
                self.table, self.id, self.event_id
            )));
        }
        let entity = Entity::from_json(self.table_name()?, value.clone())
            .map_err(|e| CupboardError::JournalCorrupt(e.to_string()))?;
        if entity.id() != self.id {
            return Err(CupboardError::JournalCorrupt(format!(
                "event {} is keyed {} but carries entity {}",
                self.event_id,
                self.id,
                entity.id()
            )));
        }
        Ok(Some(entity))
    }
}

fn entity_hash(value: &JsonValue) -> Result<String> {
    let bytes = serde_json::to_vec(value)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

pub fn journal_path(dir: &Path, table: TableName) -> PathBuf {
    dir.join(schemas::journal_file_name(table))
}

/// Open journal writers for every table plus the sync policy governing them.
pub struct Journal {
    writers: BTreeMap<TableName, BufWriter<File>>,
    dirty: BTreeSet<TableName>,
    controller: SyncController,
}

impl Journal {
    pub fn open(dir: &Path, strategy: SyncStrategy) -> Result<Self> {
        fs::create_dir_all(dir).map_err(CupboardError::IoError)?;
        let mut writers = BTreeMap::new();
        for table in TableName::ALL {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(journal_path(dir, table))
                .map_err(CupboardError::IoError)?;
            writers.insert(table, BufWriter::with_capacity(WRITER_CAPACITY, file));
        }
        Ok(Self {
            writers,
            dirty: BTreeSet::new(),
            controller: SyncController::new(strategy),
        })
    }

    pub fn strategy(&self) -> SyncStrategy {
        self.controller.strategy()
    }

    pub fn has_unsynced(&self) -> bool {
        self.controller.has_unsynced()
    }

    /// Appends the records produced by one mutating call, then syncs if the
    /// strategy says so.
    pub fn commit(&mut self, records: &[JournalRecord]) -> Result<()> {
        for record in records {
            let table = record.table_name()?;
            let writer = self.writers.get_mut(&table).ok_or_else(|| {
                CupboardError::Backend(format!("no journal writer for {}", table))
            })?;
            let line = serde_json::to_string(record)?;
            writeln!(writer, "{}", line).map_err(CupboardError::IoError)?;
            self.dirty.insert(table);
        }
        if self.controller.record_write() {
            self.sync()?;
        }
        Ok(())
    }

    /// Flushes and fsyncs every journal written since the last sync.
    pub fn sync(&mut self) -> Result<()> {
        for table in std::mem::take(&mut self.dirty) {
            if let Some(writer) = self.writers.get_mut(&table) {
                writer.flush().map_err(CupboardError::IoError)?;
                writer.get_ref().sync_data().map_err(CupboardError::IoError)?;
            }
        }
        self.controller.mark_synced();
        Ok(())
    }

    pub fn sync_if_overdue(&mut self) -> Result<bool> {
        if !self.controller.is_overdue() {
            return Ok(false);
        }
        self.sync()?;
        Ok(true)
    }
}

/// Reads every record of one journal file. A torn final line (no trailing
/// newline) is skipped with a warning; any other malformed line is fatal.
pub fn read_journal(path: &Path) -> Result<Vec<JournalRecord>> {
    if !path.is_file() {
        return Ok(Vec::new());
    }
    let content = fs::read_to_string(path).map_err(CupboardError::IoError)?;
    let complete = content.ends_with('\n');
    let lines: Vec<&str> = content.lines().collect();

    let mut records = Vec::with_capacity(lines.len());
    for (idx, line) in lines.iter().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<JournalRecord>(line) {
            Ok(record) => records.push(record),
            Err(e) if idx + 1 == lines.len() && !complete => {
                warn!(path = %path.display(), error = %e, "skipping torn journal tail");
            }
            Err(e) => {
                return Err(CupboardError::JournalCorrupt(format!(
                    "{}:{}: {}",
                    path.display(),
                    idx + 1,
                    e
                )));
            }
        }
    }
    debug!(path = %path.display(), records = records.len(), "journal read");
    Ok(records)
}

pub fn has_records(dir: &Path) -> bool {
    TableName::ALL.into_iter().any(|table| {
        fs::metadata(journal_path(dir, table))
            .map(|m| m.len() > 0)
            .unwrap_or(false)
    })
}
