use std::fmt;

use crate::core::error::{CupboardError, Result};
use crate::core::filter::Filter;
use crate::cupboard::{with_backend, Shared};
use crate::entities::{Entity, TableName};

/// CRUD view over one standard table of an attached cupboard.
///
/// Handles are cheap to clone and all share the cupboard's backend.
#[derive(Clone)]
pub struct Table {
    name: TableName,
    shared: Shared,
}

impl fmt::Debug for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Table").field("name", &self.name).finish()
    }
}

impl Table {
    pub(crate) fn new(name: TableName, shared: Shared) -> Self {
        Self { name, shared }
    }

    pub fn name(&self) -> TableName {
        self.name
    }

    /// Fails with `InvalidId` for an empty ID and `NotFound` when absent.
    pub fn get(&self, id: &str) -> Result<Entity> {
        with_backend(&self.shared, |backend| backend.get(self.name, id))
    }

    /// Stores `entity` and returns its ID.
    ///
    /// An empty `id` mints a fresh identifier; any other `id` updates that
    /// row, creating it if absent. The ID carried by `entity` is ignored.
    /// Everything the write changes, cascades included, commits atomically
    /// before it is journaled.
    pub fn set(&self, id: &str, entity: impl Into<Entity>) -> Result<String> {
        let entity = entity.into();
        with_backend(&self.shared, |backend| backend.set(self.name, id, entity))
    }

    /// Removes a row and everything that depends on it.
    pub fn delete(&self, id: &str) -> Result<()> {
        with_backend(&self.shared, |backend| backend.delete(self.name, id))
    }

    /// Rows matching every term of `filter`, ordered by ID.
    pub fn fetch(&self, filter: &Filter) -> Result<Vec<Entity>> {
        with_backend(&self.shared, |backend| backend.fetch(self.name, filter))
    }

    pub fn get_as<T>(&self, id: &str) -> Result<T>
    where
        T: TryFrom<Entity, Error = CupboardError>,
    {
        T::try_from(self.get(id)?)
    }

    pub fn fetch_as<T>(&self, filter: &Filter) -> Result<Vec<T>>
    where
        T: TryFrom<Entity, Error = CupboardError>,
    {
        self.fetch(filter)?.into_iter().map(T::try_from).collect()
    }
}
