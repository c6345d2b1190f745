use rusqlite;
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CupboardError {
    // Lifecycle
    #[error("Cupboard is already attached")]
    AlreadyAttached,
    #[error("Cupboard is detached")]
    CupboardDetached,
    #[error("Table not found: {0}")]
    TableNotFound(String),

    // Configuration
    #[error("Configuration error: backend is empty")]
    BackendEmpty,
    #[error("Configuration error: unknown backend '{0}'")]
    BackendUnknown(String),
    #[error("Configuration error: unknown sync strategy '{0}'")]
    SyncStrategyUnknown(String),
    #[error("Configuration error: batch size must be positive, got {0}")]
    BatchSizeInvalid(i64),
    #[error("Configuration error: batch interval must be positive, got {0}ms")]
    BatchIntervalInvalid(i64),
    #[error("Configuration error: {0}")]
    ConfigParse(String),

    // Identity / data
    #[error("Not found: {table}/{id}")]
    NotFound { table: String, id: String },
    #[error("Invalid ID: {0}")]
    InvalidId(String),
    #[error("Invalid data: {0}")]
    InvalidData(String),
    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    // Entity invariants
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
    #[error("Invalid name: {0}")]
    InvalidName(String),
    #[error("Duplicate name: {0}")]
    DuplicateName(String),
    #[error("Invalid value type: {0}")]
    InvalidValueType(String),
    #[error("Invalid category: {0}")]
    InvalidCategory(String),
    #[error("Property not found: {0}")]
    PropertyNotFound(String),
    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    // Relationships
    #[error("Crumb {crumb} already belongs to trail {trail}")]
    AlreadyInTrail { crumb: String, trail: String },
    #[error("Crumb {crumb} is not in trail {trail}")]
    NotInTrail { crumb: String, trail: String },
    #[error("Metadata schema not found: {0}")]
    SchemaNotFound(String),
    #[error("Invalid content: {0}")]
    InvalidContent(String),

    // Stash primitives
    #[error("Invalid stash type: {0}")]
    InvalidStashType(String),
    #[error("Lock {name} is held by {holder}")]
    LockHeld { name: String, holder: String },
    #[error("Not the lock holder: {0}")]
    NotLockHolder(String),
    #[error("Invalid holder: holder must not be empty")]
    InvalidHolder,
    #[error("Stale version for stash {id}: stored {stored}, offered {offered}")]
    StaleVersion { id: String, stored: i64, offered: i64 },

    // Backend faults
    #[error("SQLite error: {0}")]
    RusqliteError(#[from] rusqlite::Error),
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
    #[error("Journal corrupt: {0}")]
    JournalCorrupt(String),
    #[error("Backend error: {0}")]
    Backend(String),
}

/// Coarse grouping of [`CupboardError`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Lifecycle,
    Configuration,
    Data,
    Invariant,
    Relationship,
    Concurrency,
    Backend,
}

impl CupboardError {
    pub fn kind(&self) -> ErrorKind {
        use CupboardError::*;
        match self {
            AlreadyAttached | CupboardDetached | TableNotFound(_) => ErrorKind::Lifecycle,
            BackendEmpty
            | BackendUnknown(_)
            | SyncStrategyUnknown(_)
            | BatchSizeInvalid(_)
            | BatchIntervalInvalid(_)
            | ConfigParse(_) => ErrorKind::Configuration,
            NotFound { .. } | InvalidId(_) | InvalidData(_) | InvalidFilter(_) => ErrorKind::Data,
            InvalidState(_)
            | InvalidTransition(_)
            | InvalidName(_)
            | DuplicateName(_)
            | InvalidValueType(_)
            | InvalidCategory(_)
            | PropertyNotFound(_)
            | TypeMismatch(_) => ErrorKind::Invariant,
            AlreadyInTrail { .. } | NotInTrail { .. } | SchemaNotFound(_) | InvalidContent(_) => {
                ErrorKind::Relationship
            }
            InvalidStashType(_)
            | LockHeld { .. }
            | NotLockHolder(_)
            | InvalidHolder
            | StaleVersion { .. } => ErrorKind::Concurrency,
            RusqliteError(_) | IoError(_) | SerdeError(_) | JournalCorrupt(_) | Backend(_) => {
                ErrorKind::Backend
            }
        }
    }

    /// True for faults of the storage layer itself; callers may retry these.
    pub fn is_backend_fault(&self) -> bool {
        self.kind() == ErrorKind::Backend
    }

    /// True for errors caused by caller input rather than the environment.
    pub fn is_user_error(&self) -> bool {
        !matches!(
            self.kind(),
            ErrorKind::Backend | ErrorKind::Configuration
        )
    }

    pub(crate) fn not_found(table: impl Into<String>, id: impl Into<String>) -> Self {
        CupboardError::NotFound {
            table: table.into(),
            id: id.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CupboardError>;
