//! Journal sync policy.
//!
//! | Strategy  | fsync                         | Loss window on crash      |
//! |-----------|-------------------------------|---------------------------|
//! | Immediate | after every `set`/`delete`    | none                      |
//! | Batch     | every N writes or T elapsed   | up to the unsynced batch  |
//! | OnClose   | at detach only                | everything since attach   |
//!
//! The row store is always committed before the journal is written, so the
//! strategies only trade how far the journal may lag behind it.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::core::error::{CupboardError, Result};
use crate::core::journal::Journal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStrategy {
    Immediate,
    Batch { size: usize, interval: Duration },
    OnClose,
}

impl SyncStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            SyncStrategy::Immediate => "immediate",
            SyncStrategy::Batch { .. } => "batch",
            SyncStrategy::OnClose => "on_close",
        }
    }
}

/// Tracks unsynced writes and decides when the journal must be fsynced.
#[derive(Debug)]
pub struct SyncController {
    strategy: SyncStrategy,
    writes_since_sync: usize,
    last_sync: Instant,
}

impl SyncController {
    pub fn new(strategy: SyncStrategy) -> Self {
        Self {
            strategy,
            writes_since_sync: 0,
            last_sync: Instant::now(),
        }
    }

    pub fn strategy(&self) -> SyncStrategy {
        self.strategy
    }

    pub fn has_unsynced(&self) -> bool {
        self.writes_since_sync > 0
    }

    /// Registers one completed mutating call; returns whether to sync now.
    pub fn record_write(&mut self) -> bool {
        self.writes_since_sync += 1;
        match self.strategy {
            SyncStrategy::Immediate => true,
            SyncStrategy::Batch { size, interval } => {
                self.writes_since_sync >= size || self.last_sync.elapsed() >= interval
            }
            SyncStrategy::OnClose => false,
        }
    }

    /// Batch mode only: unsynced writes older than the interval.
    pub fn is_overdue(&self) -> bool {
        match self.strategy {
            SyncStrategy::Batch { interval, .. } => {
                self.has_unsynced() && self.last_sync.elapsed() >= interval
            }
            _ => false,
        }
    }

    pub fn mark_synced(&mut self) {
        self.writes_since_sync = 0;
        self.last_sync = Instant::now();
    }
}

/// Background thread that honours the batch interval while the cupboard is
/// idle.
pub struct Flusher {
    stop: Sender<()>,
    done: Receiver<()>,
    handle: JoinHandle<()>,
}

impl Flusher {
    pub fn spawn(journal: Arc<Mutex<Journal>>, interval: Duration) -> Result<Self> {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let (done_tx, done_rx) = mpsc::channel::<()>();

        let handle = thread::Builder::new()
            .name("cupboard-journal-flush".to_string())
            .spawn(move || {
                loop {
                    match stop_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {
                            let Ok(mut journal) = journal.lock() else {
                                warn!("journal lock poisoned; stopping flusher");
                                break;
                            };
                            match journal.sync_if_overdue() {
                                Ok(true) => debug!("background journal sync"),
                                Ok(false) => {}
                                Err(e) => warn!(error = %e, "background journal sync failed"),
                            }
                        }
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                let _ = done_tx.send(());
            })
            .map_err(|e| CupboardError::Backend(format!("failed to spawn flusher: {}", e)))?;

        Ok(Self {
            stop: stop_tx,
            done: done_rx,
            handle,
        })
    }

    /// Stops the thread, waiting at most `timeout`. Returns false if the
    /// thread did not finish in time; it is then left detached.
    pub fn shutdown(self, timeout: Duration) -> bool {
        let _ = self.stop.send(());
        match self.done.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                let _ = self.handle.join();
                true
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(?timeout, "journal flusher did not stop in time");
                false
            }
        }
    }
}
