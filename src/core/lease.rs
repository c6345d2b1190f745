use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::core::error::{CupboardError, Result};
use crate::core::schemas;
use crate::core::time;

/// Exclusive ownership of a data directory for one attached cupboard.
///
/// `create_new` gives single-winner semantics per path; the file is removed
/// when the lease drops. A crashed process leaves the file behind and the
/// directory then refuses attach until it is removed by hand.
#[derive(Debug)]
pub struct Lease {
    path: PathBuf,
    _file: File,
}

impl Lease {
    pub fn acquire(data_dir: &Path) -> Result<Self> {
        let path = data_dir.join(schemas::LEASE_NAME);
        let mut file = match OpenOptions::new()
            .create_new(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)
        {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                return Err(CupboardError::AlreadyAttached);
            }
            Err(err) => return Err(CupboardError::IoError(err)),
        };
        writeln!(
            file,
            "pid={} acquired_at={}",
            std::process::id(),
            time::format_ts(&time::now())
        )
        .map_err(CupboardError::IoError)?;
        Ok(Self { path, _file: file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "failed to remove lease file");
        }
    }
}
