//! Cupboard: an embedded storage engine for local-first work tracking.
//!
//! Work is modelled as a small typed graph: crumbs (units of work), trails
//! (sessions grouping crumbs), properties and their categories, append-only
//! metadata, typed links, and stashes (versioned shared state with counter
//! and lock semantics).
//!
//! # Storage
//!
//! Every write lands in two places inside `data_dir`:
//!
//! - `cupboard.db`: a SQLite row store answering `get` and `fetch`.
//! - `<table>.jsonl`: one append-only journal per table, diffable and safe to
//!   commit. The row store can be rebuilt from the journals alone.
//!
//! The row store transaction commits first; the journal append follows, and
//! the configured sync strategy decides when it is fsynced.
//!
//! # Example
//!
//! ```no_run
//! use cupboard::{Config, Crumb, Cupboard};
//!
//! # fn main() -> cupboard::Result<()> {
//! let cupboard = Cupboard::open(Config::sqlite("/tmp/cupboard-demo"))?;
//! let crumbs = cupboard.get_table("crumbs")?;
//! let id = crumbs.set("", Crumb::new("Fix bug"))?;
//!
//! let mut crumb: Crumb = crumbs.get_as(&id)?;
//! crumb.set_state("taken")?;
//! crumb.complete()?;
//! crumbs.set(&id, crumb)?;
//! cupboard.detach()?;
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod cupboard;
pub mod entities;
pub mod graph;
pub(crate) mod store;
pub mod table;

pub use crate::core::config::Config;
pub use crate::core::error::{CupboardError, ErrorKind, Result};
pub use crate::core::filter::Filter;
pub use crate::core::replay::{rebuild, RebuildReport};
pub use crate::core::sync::SyncStrategy;
pub use crate::cupboard::Cupboard;
pub use crate::entities::{
    Category, Crumb, CrumbState, Entity, Link, LinkType, Metadata, Property, Stash, StashOp,
    StashType, StashVersion, TableName, Trail, TrailState, ValueType,
};
pub use crate::table::Table;
