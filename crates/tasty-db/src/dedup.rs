//! Get-or-create of shared, name-keyed rows (ingredients and tags).

use tracing::{debug, error};

use tasty_core::{logging, Error, Result};

use crate::backend::{Catalog, StoreTx};

/// Resolves a natural key to the id of its shared row, creating it on miss.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DedupStore {
    catalog: Catalog,
}

impl DedupStore {
    pub fn new(catalog: Catalog) -> Self {
        Self { catalog }
    }

    pub fn ingredients() -> Self {
        Self::new(Catalog::Ingredients)
    }

    pub fn tags() -> Self {
        Self::new(Catalog::Tags)
    }

    pub fn catalog(&self) -> Catalog {
        self.catalog
    }

    /// Return the id of the row named exactly `name`, inserting it if absent.
    ///
    /// Names match case-sensitively. Losing an insert race to a concurrent
    /// transaction falls back to re-reading the winner's row, so at most one
    /// row exists per name.
    pub async fn get_or_create<T>(&self, tx: &mut T, name: &str) -> Result<i64>
    where
        T: StoreTx + ?Sized,
    {
        if name.trim().is_empty() {
            return Err(Error::InvalidInput(format!(
                "{} name cannot be empty",
                self.kind()
            )));
        }

        if let Some(id) = tx.find_named(self.catalog, name).await? {
            return Ok(id);
        }

        if let Some(id) = tx.insert_named(self.catalog, name).await? {
            debug!(
                subsystem = logging::DATABASE,
                component = logging::DEDUP,
                catalog = %self.catalog,
                id,
                "Created shared row"
            );
            return Ok(id);
        }

        // Conflict: another transaction inserted the name since the lookup.
        match tx.find_named(self.catalog, name).await? {
            Some(id) => Ok(id),
            None => {
                error!(
                    subsystem = logging::DATABASE,
                    component = logging::DEDUP,
                    catalog = %self.catalog,
                    "Insert conflicted but no row is visible"
                );
                Err(Error::Internal(format!(
                    "{} '{}' conflicted on insert but could not be read back",
                    self.kind(),
                    name
                )))
            }
        }
    }

    fn kind(&self) -> &'static str {
        match self.catalog {
            Catalog::Ingredients => "Ingredient",
            Catalog::Tags => "Tag",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Backend;
    use crate::memory::MemoryBackend;

    #[tokio::test]
    async fn test_get_or_create_reuses_existing_row() {
        let backend = MemoryBackend::new();
        let mut tx = backend.begin().await.unwrap();
        let dedup = DedupStore::ingredients();

        let first = dedup.get_or_create(&mut tx, "sugar").await.unwrap();
        let second = dedup.get_or_create(&mut tx, "sugar").await.unwrap();
        assert_eq!(first, second);

        let other = dedup.get_or_create(&mut tx, "Sugar").await.unwrap();
        assert_ne!(first, other, "names are case-sensitive");
    }

    #[tokio::test]
    async fn test_blank_name_is_invalid_input() {
        let backend = MemoryBackend::new();
        let mut tx = backend.begin().await.unwrap();

        let result = DedupStore::tags().get_or_create(&mut tx, "  ").await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
        assert_eq!(backend.stats().statements, 0);
    }

    #[tokio::test]
    async fn test_lookup_failure_propagates() {
        let backend = MemoryBackend::new();
        backend.fail_statement(1);
        let mut tx = backend.begin().await.unwrap();

        let result = DedupStore::tags().get_or_create(&mut tx, "spicy").await;
        assert!(matches!(result, Err(Error::Database(_))));
    }
}
