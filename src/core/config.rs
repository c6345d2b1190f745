//! Attach-time configuration.
//!
//! Directory resolution is the caller's business; a `Config` arrives fully
//! populated (or parsed from TOML) and is validated once, at attach.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::error::{CupboardError, Result};
use crate::core::sync::SyncStrategy;

pub const BACKEND_SQLITE: &str = "sqlite";

pub const SYNC_IMMEDIATE: &str = "immediate";
pub const SYNC_BATCH: &str = "batch";
pub const SYNC_ON_CLOSE: &str = "on_close";

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub backend: String,
    pub data_dir: PathBuf,
    pub sync_strategy: String,
    pub batch_size: i64,
    pub batch_interval_ms: i64,
    /// Schemas that metadata rows may be filed under.
    pub metadata_schemas: Vec<String>,
    pub seed_builtin_properties: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BACKEND_SQLITE.to_string(),
            data_dir: PathBuf::new(),
            sync_strategy: SYNC_IMMEDIATE.to_string(),
            batch_size: 100,
            batch_interval_ms: 1000,
            metadata_schemas: vec!["comments".to_string(), "attachments".to_string()],
            seed_builtin_properties: true,
        }
    }
}

/// Validated form of [`Config`], produced by [`Config::validate`].
#[derive(Debug, Clone)]
pub struct Settings {
    pub data_dir: PathBuf,
    pub sync: SyncStrategy,
    pub metadata_schemas: Vec<String>,
    pub seed_builtin_properties: bool,
}

impl Config {
    pub fn sqlite(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    pub fn with_sync(mut self, strategy: &str) -> Self {
        self.sync_strategy = strategy.to_string();
        self
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| CupboardError::ConfigParse(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(CupboardError::IoError)?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<Settings> {
        let backend = self.backend.trim();
        if backend.is_empty() {
            return Err(CupboardError::BackendEmpty);
        }
        if backend != BACKEND_SQLITE {
            return Err(CupboardError::BackendUnknown(backend.to_string()));
        }
        if self.data_dir.as_os_str().is_empty() {
            return Err(CupboardError::ConfigParse("data_dir is empty".to_string()));
        }

        let sync = match self.sync_strategy.trim() {
            "" | SYNC_IMMEDIATE => SyncStrategy::Immediate,
            SYNC_BATCH => {
                if self.batch_size <= 0 {
                    return Err(CupboardError::BatchSizeInvalid(self.batch_size));
                }
                if self.batch_interval_ms <= 0 {
                    return Err(CupboardError::BatchIntervalInvalid(self.batch_interval_ms));
                }
                SyncStrategy::Batch {
                    size: self.batch_size as usize,
                    interval: Duration::from_millis(self.batch_interval_ms as u64),
                }
            }
            SYNC_ON_CLOSE => SyncStrategy::OnClose,
            other => return Err(CupboardError::SyncStrategyUnknown(other.to_string())),
        };

        let mut metadata_schemas: Vec<String> = self
            .metadata_schemas
            .iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        metadata_schemas.sort();
        metadata_schemas.dedup();

        Ok(Settings {
            data_dir: self.data_dir.clone(),
            sync,
            metadata_schemas,
            seed_builtin_properties: self.seed_builtin_properties,
        })
    }
}
