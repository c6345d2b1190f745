//! Reconstructs the row store from the journals.
//!
//! Records are applied verbatim: no validation and no cascades, since every
//! cascaded effect was journaled as its own record. Each table's journal is
//! self-contained, so files are replayed one after another.

use rusqlite::Connection;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::core::db;
use crate::core::error::{CupboardError, Result};
use crate::core::journal::{self, JournalOp};
use crate::core::lease::Lease;
use crate::core::schemas;
use crate::entities::TableName;
use crate::store::rows;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RebuildReport {
    /// Records applied per table, in `TableName::ALL` order.
    pub applied: Vec<(TableName, usize)>,
}

impl RebuildReport {
    pub fn total(&self) -> usize {
        self.applied.iter().map(|(_, n)| n).sum()
    }
}

/// Rebuilds `<data_dir>/cupboard.db` from the journals. Fails with
/// `AlreadyAttached` while a cupboard holds the directory.
pub fn rebuild(data_dir: &Path) -> Result<RebuildReport> {
    fs::create_dir_all(data_dir).map_err(CupboardError::IoError)?;
    let _lease = Lease::acquire(data_dir)?;
    rebuild_locked(data_dir)
}

/// Same as [`rebuild`] for a caller that already holds the lease.
pub(crate) fn rebuild_locked(data_dir: &Path) -> Result<RebuildReport> {
    let tmp_db = data_dir.join(format!(".{}.tmp", schemas::DB_NAME));
    if tmp_db.exists() {
        fs::remove_file(&tmp_db).map_err(CupboardError::IoError)?;
    }

    let mut conn = Connection::open(&tmp_db)?;
    db::ensure_schema(&conn)?;
    let report = apply_journals(&mut conn, data_dir)?;
    drop(conn);

    let db_path = data_dir.join(schemas::DB_NAME);
    for sidecar in sidecars(&db_path) {
        if sidecar.exists() {
            fs::remove_file(&sidecar).map_err(CupboardError::IoError)?;
        }
    }
    fs::rename(&tmp_db, &db_path).map_err(CupboardError::IoError)?;

    info!(
        data_dir = %data_dir.display(),
        records = report.total(),
        "row store rebuilt from journals"
    );
    Ok(report)
}

fn apply_journals(conn: &mut Connection, data_dir: &Path) -> Result<RebuildReport> {
    let tx = conn.transaction()?;
    let mut report = RebuildReport::default();
    for table in TableName::ALL {
        let records = journal::read_journal(&journal::journal_path(data_dir, table))?;
        for record in &records {
            if record.table_name()? != table {
                return Err(CupboardError::JournalCorrupt(format!(
                    "{} record {} found in the {} journal",
                    record.table, record.event_id, table
                )));
            }
            match record.op {
                JournalOp::Create | JournalOp::Update => {
                    let entity = record.entity()?.ok_or_else(|| {
                        CupboardError::JournalCorrupt(format!(
                            "event {} carries no entity",
                            record.event_id
                        ))
                    })?;
                    rows::write(&tx, &entity)?;
                }
                JournalOp::Delete => {
                    rows::remove(&tx, table, &record.id)?;
                }
            }
        }
        report.applied.push((table, records.len()));
    }
    tx.commit()?;
    Ok(report)
}

/// WAL files left by a previous row store must not be applied to the new one.
fn sidecars(db_path: &Path) -> [PathBuf; 2] {
    let base = db_path.as_os_str().to_string_lossy();
    [
        PathBuf::from(format!("{}-wal", base)),
        PathBuf::from(format!("{}-shm", base)),
    ]
}
