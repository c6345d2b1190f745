//! Attach/detach lifecycle and the backend shared by every [`Table`].

use rusqlite::Connection;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::core::config::{Config, Settings};
use crate::core::db;
use crate::core::error::{CupboardError, Result};
use crate::core::filter::Filter;
use crate::core::journal::{self, Journal, JournalRecord};
use crate::core::lease::Lease;
use crate::core::replay;
use crate::core::schemas;
use crate::core::sync::{Flusher, SyncStrategy};
use crate::core::time::IdGenerator;
use crate::entities::{Entity, StashVersion, TableName};
use crate::store::{self, rows};
use crate::table::Table;

/// Upper bound on how long detach waits for the background flusher.
pub const DETACH_TIMEOUT: Duration = Duration::from_secs(5);

pub(crate) type Shared = Arc<Mutex<Option<Backend>>>;

/// A poisoned lock only means another caller panicked mid-call; its
/// transaction was rolled back when it unwound.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn with_backend<T>(
    shared: &Shared,
    f: impl FnOnce(&mut Backend) -> Result<T>,
) -> Result<T> {
    let mut guard = lock(shared);
    let backend = guard.as_mut().ok_or(CupboardError::CupboardDetached)?;
    f(backend)
}

/// Everything an attached cupboard owns. Fields drop in order, so the lease
/// is released last.
pub(crate) struct Backend {
    conn: Connection,
    journal: Arc<Mutex<Journal>>,
    flusher: Option<Flusher>,
    ids: IdGenerator,
    settings: Settings,
    _lease: Lease,
}

impl Backend {
    fn open(settings: Settings) -> Result<Self> {
        let data_dir = settings.data_dir.clone();
        fs::create_dir_all(&data_dir).map_err(CupboardError::IoError)?;
        let lease = Lease::acquire(&data_dir)?;

        let db_path = data_dir.join(schemas::DB_NAME);
        if !db_path.exists() && journal::has_records(&data_dir) {
            info!(data_dir = %data_dir.display(), "row store missing; replaying journals");
            replay::rebuild_locked(&data_dir)?;
        }

        let conn = db::db_connect(&db_path)?;
        db::ensure_schema(&conn)?;
        let journal = Arc::new(Mutex::new(Journal::open(&data_dir, settings.sync)?));

        let mut backend = Self {
            conn,
            journal,
            flusher: None,
            ids: IdGenerator::new(),
            settings,
            _lease: lease,
        };
        if backend.settings.seed_builtin_properties {
            backend.seed()?;
        }
        if let SyncStrategy::Batch { interval, .. } = backend.settings.sync {
            backend.flusher = Some(Flusher::spawn(Arc::clone(&backend.journal), interval)?);
        }

        info!(
            data_dir = %data_dir.display(),
            sync = backend.settings.sync.name(),
            "cupboard attached"
        );
        Ok(backend)
    }

    fn seed(&mut self) -> Result<()> {
        let tx = self.conn.transaction()?;
        let records = store::seed_builtin_properties(&tx, &self.settings, &mut self.ids)?;
        tx.commit()?;
        self.append(&records)
    }

    fn append(&self, records: &[JournalRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        lock(&self.journal).commit(records)
    }

    pub(crate) fn get(&self, table: TableName, id: &str) -> Result<Entity> {
        require_id(id)?;
        rows::load(&self.conn, table, id)?
            .ok_or_else(|| CupboardError::not_found(table.as_str(), id))
    }

    pub(crate) fn set(&mut self, table: TableName, id: &str, mut entity: Entity) -> Result<String> {
        if entity.table() != table {
            return Err(CupboardError::InvalidData(format!(
                "cannot store a {} entity in the {} table",
                entity.table(),
                table
            )));
        }
        let id = if id.is_empty() {
            self.ids.mint()
        } else {
            id.to_string()
        };
        entity.set_id(&id);

        let tx = self.conn.transaction()?;
        let records = store::persist_set(&tx, &self.settings, &entity)?;
        tx.commit()?;
        self.append(&records)?;
        Ok(id)
    }

    pub(crate) fn delete(&mut self, table: TableName, id: &str) -> Result<()> {
        require_id(id)?;
        let tx = self.conn.transaction()?;
        let records = store::persist_delete(&tx, table, id)?;
        tx.commit()?;
        self.append(&records)
    }

    pub(crate) fn fetch(&self, table: TableName, filter: &Filter) -> Result<Vec<Entity>> {
        let plan = filter.compile(table)?;
        rows::fetch(&self.conn, table, &plan)
    }

    fn stash_history(&self, stash_id: &str) -> Result<Vec<StashVersion>> {
        require_id(stash_id)?;
        let history = rows::stash_history(&self.conn, stash_id)?;
        if history.is_empty() && !rows::exists(&self.conn, TableName::Stashes, stash_id)? {
            return Err(CupboardError::not_found(
                TableName::Stashes.as_str(),
                stash_id,
            ));
        }
        Ok(history)
    }

    fn close(self) -> Result<()> {
        let Backend {
            conn,
            journal,
            flusher,
            settings,
            _lease,
            ..
        } = self;
        if let Some(flusher) = flusher {
            flusher.shutdown(DETACH_TIMEOUT);
        }
        let synced = lock(&journal).sync();
        let closed = conn.close().map_err(|(_, e)| CupboardError::RusqliteError(e));
        info!(data_dir = %settings.data_dir.display(), "cupboard detached");
        synced.and(closed)
    }
}

fn require_id(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(CupboardError::InvalidId("id must not be empty".to_string()));
    }
    Ok(())
}

/// Lifecycle handle for one data directory.
///
/// At most one attached `Cupboard` may own a directory at a time. Tables
/// handed out by [`Cupboard::get_table`] share the backend and start failing
/// with `CupboardDetached` once [`Cupboard::detach`] runs. Dropping the
/// cupboard detaches it.
pub struct Cupboard {
    shared: Shared,
}

impl Default for Cupboard {
    fn default() -> Self {
        Self::new()
    }
}

impl Cupboard {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Mutex::new(None)),
        }
    }

    /// Creates a cupboard and attaches it in one step.
    pub fn open(config: Config) -> Result<Self> {
        let cupboard = Self::new();
        cupboard.attach(config)?;
        Ok(cupboard)
    }

    pub fn attach(&self, config: Config) -> Result<()> {
        let mut guard = lock(&self.shared);
        if guard.is_some() {
            return Err(CupboardError::AlreadyAttached);
        }
        let settings = config.validate()?;
        *guard = Some(Backend::open(settings)?);
        Ok(())
    }

    pub fn is_attached(&self) -> bool {
        lock(&self.shared).is_some()
    }

    pub fn data_dir(&self) -> Option<PathBuf> {
        lock(&self.shared)
            .as_ref()
            .map(|b| b.settings.data_dir.clone())
    }

    pub fn get_table(&self, name: &str) -> Result<Table> {
        let name: TableName = name.parse()?;
        self.table(name)
    }

    pub fn table(&self, name: TableName) -> Result<Table> {
        if !self.is_attached() {
            return Err(CupboardError::CupboardDetached);
        }
        Ok(Table::new(name, Arc::clone(&self.shared)))
    }

    /// Flushes and fsyncs the journals now, whatever the sync strategy.
    pub fn sync(&self) -> Result<()> {
        with_backend(&self.shared, |backend| lock(&backend.journal).sync())
    }

    /// Every persisted version of a stash, oldest first.
    pub fn stash_history(&self, stash_id: &str) -> Result<Vec<StashVersion>> {
        with_backend(&self.shared, |backend| backend.stash_history(stash_id))
    }

    /// Syncs the journals and releases the directory. Calling it again, or on
    /// a cupboard that was never attached, does nothing.
    pub fn detach(&self) -> Result<()> {
        let backend = lock(&self.shared).take();
        match backend {
            Some(backend) => backend.close(),
            None => {
                debug!("detach on a detached cupboard");
                Ok(())
            }
        }
    }

    /// Rebuilds the row store of an unattached directory from its journals.
    pub fn rebuild(data_dir: &Path) -> Result<replay::RebuildReport> {
        replay::rebuild(data_dir)
    }
}

impl Drop for Cupboard {
    fn drop(&mut self) {
        if let Err(e) = self.detach() {
            warn!(error = %e, "detach on drop failed");
        }
    }
}
