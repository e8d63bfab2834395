//! In-memory storage backend for deterministic testing.
//!
//! Each transaction reads a private snapshot of the committed state and
//! records its writes. Commit replays the writes onto the current committed
//! state, so overlapping transactions both land unless they collide on a
//! unique key or leave a junction row without its parent. Rollback discards
//! both. Ids come from shared sequences and are never reused.
//! Faults can be injected into begin, commit, rollback or the n-th statement,
//! and lifecycle counters record what the transaction context did.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tasty_db::{MemoryBackend, RecipeStore};
//!
//! let backend = MemoryBackend::new();
//! let store = RecipeStore::new(backend.clone());
//! backend.fail_statement(3);
//! assert!(store.insert(req).await.is_err());
//! assert_eq!(backend.stats().rollbacks, 1);
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;

use tasty_core::{Error, Link, Portion, RecipeIngredient, Result, Tag};

use crate::backend::{Backend, Catalog, ListingRow, RecipeRow, RecipeScalars, StoreTx};

// =============================================================================
// STATE
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
struct NamedTable {
    rows: BTreeMap<i64, String>,
}

impl NamedTable {
    fn find(&self, name: &str) -> Option<i64> {
        self.rows
            .iter()
            .find(|(_, existing)| existing.as_str() == name)
            .map(|(id, _)| *id)
    }
}

/// Junction rows keyed by (recipe_id, member_id).
type JunctionTable = BTreeMap<(i64, i64), Option<Portion>>;

/// Committed contents of the in-memory store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryState {
    recipes: BTreeMap<i64, RecipeRow>,
    ingredients: NamedTable,
    tags: NamedTable,
    recipe_ingredients: JunctionTable,
    recipe_tags: JunctionTable,
}

impl MemoryState {
    fn named(&self, catalog: Catalog) -> &NamedTable {
        match catalog {
            Catalog::Ingredients => &self.ingredients,
            Catalog::Tags => &self.tags,
        }
    }

    fn named_mut(&mut self, catalog: Catalog) -> &mut NamedTable {
        match catalog {
            Catalog::Ingredients => &mut self.ingredients,
            Catalog::Tags => &mut self.tags,
        }
    }

    fn junction(&self, catalog: Catalog) -> &JunctionTable {
        match catalog {
            Catalog::Ingredients => &self.recipe_ingredients,
            Catalog::Tags => &self.recipe_tags,
        }
    }

    fn junction_mut(&mut self, catalog: Catalog) -> &mut JunctionTable {
        match catalog {
            Catalog::Ingredients => &mut self.recipe_ingredients,
            Catalog::Tags => &mut self.recipe_tags,
        }
    }

    fn links_for(&self, catalog: Catalog, recipe_id: i64) -> Vec<Link> {
        self.junction(catalog)
            .range((recipe_id, i64::MIN)..=(recipe_id, i64::MAX))
            .map(|((_, member_id), portion)| Link {
                member_id: *member_id,
                portion: portion.clone(),
            })
            .collect()
    }

    fn ingredients_for(&self, recipe_id: i64) -> Vec<RecipeIngredient> {
        self.links_for(Catalog::Ingredients, recipe_id)
            .into_iter()
            .filter_map(|link| {
                let name = self.ingredients.rows.get(&link.member_id)?.clone();
                let portion = link.portion?;
                Some(RecipeIngredient {
                    id: link.member_id,
                    name,
                    quantity: portion.quantity,
                    unit: portion.unit,
                })
            })
            .collect()
    }

    fn tags_for(&self, recipe_id: i64) -> Vec<Tag> {
        self.links_for(Catalog::Tags, recipe_id)
            .into_iter()
            .filter_map(|link| {
                let name = self.tags.rows.get(&link.member_id)?.clone();
                Some(Tag {
                    id: link.member_id,
                    name,
                })
            })
            .collect()
    }

    /// Number of recipe rows.
    pub fn recipe_count(&self) -> usize {
        self.recipes.len()
    }

    /// Number of shared rows in a catalog.
    pub fn named_count(&self, catalog: Catalog) -> usize {
        self.named(catalog).rows.len()
    }

    /// Id of the shared row named `name`, if any.
    pub fn named_id(&self, catalog: Catalog, name: &str) -> Option<i64> {
        self.named(catalog).find(name)
    }

    /// Number of rows carrying `name` in a catalog.
    pub fn named_occurrences(&self, catalog: Catalog, name: &str) -> usize {
        self.named(catalog)
            .rows
            .values()
            .filter(|existing| existing.as_str() == name)
            .count()
    }

    /// Total junction rows in a catalog.
    pub fn link_count(&self, catalog: Catalog) -> usize {
        self.junction(catalog).len()
    }

    /// Member ids linked to a recipe, ascending.
    pub fn member_ids(&self, catalog: Catalog, recipe_id: i64) -> BTreeSet<i64> {
        self.links_for(catalog, recipe_id)
            .into_iter()
            .map(|l| l.member_id)
            .collect()
    }

    /// Replay one committed write. Fails on a unique key collision.
    fn apply(&mut self, write: Write) -> std::result::Result<(), sqlx::Error> {
        match write {
            Write::InsertRecipe(row) => {
                self.recipes.insert(row.id, row);
            }
            Write::UpdateRecipe(id, scalars) => {
                if let Some(row) = self.recipes.get_mut(&id) {
                    row.scalars = scalars;
                }
            }
            Write::DeleteRecipe(id) => {
                self.recipes.remove(&id);
            }
            Write::InsertNamed(catalog, id, name) => {
                let table = self.named_mut(catalog);
                if table.find(&name).is_some() {
                    return Err(conflict(format!(
                        "duplicate key value violates unique constraint on {} (name)={}",
                        catalog.table(),
                        name
                    )));
                }
                table.rows.insert(id, name);
            }
            Write::InsertLink(catalog, key, portion) => {
                let junction = self.junction_mut(catalog);
                if junction.contains_key(&key) {
                    return Err(conflict(format!(
                        "duplicate key value violates unique constraint on {} ({}, {})",
                        catalog.junction_table(),
                        key.0,
                        key.1
                    )));
                }
                junction.insert(key, portion);
            }
            Write::UpdateLink(catalog, key, portion) => {
                if let Some(existing) = self.junction_mut(catalog).get_mut(&key) {
                    *existing = Some(portion);
                }
            }
            Write::DeleteLink(catalog, key) => {
                self.junction_mut(catalog).remove(&key);
            }
            Write::DeleteLinksForRecipe(catalog, recipe_id) => {
                self.junction_mut(catalog)
                    .retain(|(rid, _), _| *rid != recipe_id);
            }
        }
        Ok(())
    }

    /// Deferred foreign keys: every junction row needs its recipe and member.
    fn check_references(&self) -> std::result::Result<(), sqlx::Error> {
        for catalog in [Catalog::Ingredients, Catalog::Tags] {
            let members = &self.named(catalog).rows;
            for (recipe_id, member_id) in self.junction(catalog).keys() {
                if !self.recipes.contains_key(recipe_id) || !members.contains_key(member_id) {
                    return Err(conflict(format!(
                        "insert or update on {} ({}, {}) violates foreign key constraint",
                        catalog.junction_table(),
                        recipe_id,
                        member_id
                    )));
                }
            }
        }
        Ok(())
    }
}

/// A write statement recorded by a transaction, replayed at commit.
#[derive(Debug, Clone)]
enum Write {
    InsertRecipe(RecipeRow),
    UpdateRecipe(i64, RecipeScalars),
    DeleteRecipe(i64),
    InsertNamed(Catalog, i64, String),
    InsertLink(Catalog, (i64, i64), Option<Portion>),
    UpdateLink(Catalog, (i64, i64), Portion),
    DeleteLink(Catalog, (i64, i64)),
    DeleteLinksForRecipe(Catalog, i64),
}

/// Id sequences shared by every transaction. Rolled back ids stay consumed.
#[derive(Debug, Default)]
struct Sequences {
    recipes: i64,
    ingredients: i64,
    tags: i64,
}

impl Sequences {
    fn next_recipe(&mut self) -> i64 {
        self.recipes += 1;
        self.recipes
    }

    fn next_named(&mut self, catalog: Catalog) -> i64 {
        let seq = match catalog {
            Catalog::Ingredients => &mut self.ingredients,
            Catalog::Tags => &mut self.tags,
        };
        *seq += 1;
        *seq
    }
}

// =============================================================================
// FAULTS AND COUNTERS
// =============================================================================

/// Lifecycle counters recorded by the backend.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TxStats {
    pub begins: usize,
    /// Commit attempts, including failed ones.
    pub commits: usize,
    pub rollbacks: usize,
    /// Statements executed across all transactions.
    pub statements: usize,
}

#[derive(Debug, Default)]
struct Faults {
    fail_begin: bool,
    fail_commit: bool,
    fail_rollback: bool,
    fail_ping: bool,
    /// Fail when the statement counter reaches this value.
    fail_statement_at: Option<usize>,
}

#[derive(Debug, Default)]
struct Shared {
    state: MemoryState,
    sequences: Sequences,
    faults: Faults,
    stats: TxStats,
    log: Vec<String>,
}

fn injected(what: &str) -> sqlx::Error {
    sqlx::Error::Protocol(format!("injected fault: {}", what))
}

fn conflict(message: String) -> sqlx::Error {
    sqlx::Error::Protocol(message)
}

// =============================================================================
// BACKEND
// =============================================================================

/// In-memory backend. Clones share the same store.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    shared: Arc<Mutex<Shared>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        // A panicking unit of work must not wedge later assertions.
        self.shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Make the next `begin` calls fail until cleared.
    pub fn fail_begin(&self, fail: bool) {
        self.lock().faults.fail_begin = fail;
    }

    pub fn fail_commit(&self, fail: bool) {
        self.lock().faults.fail_commit = fail;
    }

    pub fn fail_rollback(&self, fail: bool) {
        self.lock().faults.fail_rollback = fail;
    }

    pub fn fail_ping(&self, fail: bool) {
        self.lock().faults.fail_ping = fail;
    }

    /// Fail the n-th statement (1-based) executed from now on.
    pub fn fail_statement(&self, n: usize) {
        let mut shared = self.lock();
        let at = shared.stats.statements + n;
        shared.faults.fail_statement_at = Some(at);
    }

    /// Remove every armed fault.
    pub fn clear_faults(&self) {
        self.lock().faults = Faults::default();
    }

    /// Snapshot of the committed state.
    pub fn state(&self) -> MemoryState {
        self.lock().state.clone()
    }

    pub fn stats(&self) -> TxStats {
        self.lock().stats.clone()
    }

    /// Write statements executed so far, e.g. `"insert_link tags 1 4"`.
    pub fn write_log(&self) -> Vec<String> {
        self.lock().log.clone()
    }

    pub fn clear_write_log(&self) {
        self.lock().log.clear();
    }
}

/// A transaction over a private snapshot plus its pending writes.
pub struct MemoryTx {
    snapshot: MemoryState,
    writes: Vec<Write>,
    shared: Arc<Mutex<Shared>>,
}

impl MemoryTx {
    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Count a statement and trip the armed fault if it is due.
    fn statement(&self, op: &str) -> Result<()> {
        let mut shared = self.lock();
        shared.stats.statements += 1;
        if shared.faults.fail_statement_at == Some(shared.stats.statements) {
            shared.faults.fail_statement_at = None;
            return Err(Error::Database(injected(op)));
        }
        Ok(())
    }

    /// Keep `write` for commit and note it in the write log.
    fn record(&mut self, entry: String, write: Write) {
        self.writes.push(write);
        self.lock().log.push(entry);
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    type Tx = MemoryTx;

    async fn begin(&self) -> std::result::Result<MemoryTx, sqlx::Error> {
        let mut shared = self.lock();
        if shared.faults.fail_begin {
            return Err(sqlx::Error::PoolTimedOut);
        }
        shared.stats.begins += 1;
        Ok(MemoryTx {
            snapshot: shared.state.clone(),
            writes: Vec::new(),
            shared: Arc::clone(&self.shared),
        })
    }

    async fn commit(&self, tx: MemoryTx) -> std::result::Result<(), sqlx::Error> {
        let mut shared = self.lock();
        shared.stats.commits += 1;
        if shared.faults.fail_commit {
            // A failed commit publishes nothing.
            return Err(injected("commit"));
        }
        let mut next = shared.state.clone();
        for write in tx.writes {
            next.apply(write)?;
        }
        next.check_references()?;
        shared.state = next;
        Ok(())
    }

    async fn rollback(&self, tx: MemoryTx) -> std::result::Result<(), sqlx::Error> {
        drop(tx);
        let mut shared = self.lock();
        shared.stats.rollbacks += 1;
        if shared.faults.fail_rollback {
            return Err(injected("rollback"));
        }
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        if self.lock().faults.fail_ping {
            return Err(Error::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn insert_recipe(&mut self, scalars: &RecipeScalars) -> Result<i64> {
        self.statement("insert_recipe")?;
        let id = self.lock().sequences.next_recipe();
        let row = RecipeRow {
            id,
            scalars: scalars.clone(),
            created_at: Utc::now(),
        };
        self.snapshot.recipes.insert(id, row.clone());
        self.record(format!("insert_recipe {}", id), Write::InsertRecipe(row));
        Ok(id)
    }

    async fn fetch_recipe(&mut self, id: i64) -> Result<Option<RecipeRow>> {
        self.statement("fetch_recipe")?;
        Ok(self.snapshot.recipes.get(&id).cloned())
    }

    async fn update_recipe(&mut self, id: i64, scalars: &RecipeScalars) -> Result<u64> {
        self.statement("update_recipe")?;
        let affected = match self.snapshot.recipes.get_mut(&id) {
            Some(row) => {
                row.scalars = scalars.clone();
                1
            }
            None => 0,
        };
        self.record(
            format!("update_recipe {}", id),
            Write::UpdateRecipe(id, scalars.clone()),
        );
        Ok(affected)
    }

    async fn delete_recipe(&mut self, id: i64) -> Result<u64> {
        self.statement("delete_recipe")?;
        let affected = u64::from(self.snapshot.recipes.remove(&id).is_some());
        self.record(format!("delete_recipe {}", id), Write::DeleteRecipe(id));
        Ok(affected)
    }

    async fn list_recipe_rows(&mut self) -> Result<Vec<ListingRow>> {
        self.statement("list_recipe_rows")?;
        let state = &self.snapshot;
        let mut rows = Vec::new();
        for (id, recipe) in &state.recipes {
            // LEFT JOIN semantics: an empty side still yields one NULL row.
            let mut ingredients: Vec<Option<RecipeIngredient>> =
                state.ingredients_for(*id).into_iter().map(Some).collect();
            if ingredients.is_empty() {
                ingredients.push(None);
            }
            let mut tags: Vec<Option<Tag>> = state.tags_for(*id).into_iter().map(Some).collect();
            if tags.is_empty() {
                tags.push(None);
            }
            for ingredient in &ingredients {
                for tag in &tags {
                    rows.push(ListingRow {
                        recipe: recipe.clone(),
                        ingredient: ingredient.clone(),
                        tag: tag.clone(),
                    });
                }
            }
        }
        Ok(rows)
    }

    async fn find_named(&mut self, catalog: Catalog, name: &str) -> Result<Option<i64>> {
        self.statement("find_named")?;
        Ok(self.snapshot.named(catalog).find(name))
    }

    async fn insert_named(&mut self, catalog: Catalog, name: &str) -> Result<Option<i64>> {
        self.statement("insert_named")?;
        if self.snapshot.named(catalog).find(name).is_some() {
            return Ok(None);
        }
        let id = self.lock().sequences.next_named(catalog);
        self.snapshot
            .named_mut(catalog)
            .rows
            .insert(id, name.to_string());
        self.record(
            format!("insert_named {} {}", catalog, id),
            Write::InsertNamed(catalog, id, name.to_string()),
        );
        Ok(Some(id))
    }

    async fn links(&mut self, catalog: Catalog, recipe_id: i64) -> Result<Vec<Link>> {
        self.statement("links")?;
        Ok(self.snapshot.links_for(catalog, recipe_id))
    }

    async fn link_exists(
        &mut self,
        catalog: Catalog,
        recipe_id: i64,
        member_id: i64,
    ) -> Result<bool> {
        self.statement("link_exists")?;
        Ok(self
            .snapshot
            .junction(catalog)
            .contains_key(&(recipe_id, member_id)))
    }

    async fn insert_link(&mut self, catalog: Catalog, recipe_id: i64, link: &Link) -> Result<()> {
        self.statement("insert_link")?;
        if catalog.has_portion() && link.portion.is_none() {
            return Err(Error::InvalidInput(format!(
                "Association with {} {} requires quantity and unit",
                catalog, link.member_id
            )));
        }
        let key = (recipe_id, link.member_id);
        let junction = self.snapshot.junction_mut(catalog);
        if junction.contains_key(&key) {
            // Composite primary key violation.
            return Err(Error::Database(sqlx::Error::Protocol(format!(
                "duplicate key value violates unique constraint on {} ({}, {})",
                catalog.junction_table(),
                recipe_id,
                link.member_id
            ))));
        }
        let portion = if catalog.has_portion() {
            link.portion.clone()
        } else {
            None
        };
        junction.insert(key, portion.clone());
        self.record(
            format!("insert_link {} {} {}", catalog, recipe_id, link.member_id),
            Write::InsertLink(catalog, key, portion),
        );
        Ok(())
    }

    async fn update_link(&mut self, catalog: Catalog, recipe_id: i64, link: &Link) -> Result<u64> {
        self.statement("update_link")?;
        if !catalog.has_portion() {
            return Ok(0);
        }
        let Some(portion) = link.portion.clone() else {
            return Err(Error::InvalidInput(format!(
                "Association with {} {} requires quantity and unit",
                catalog, link.member_id
            )));
        };
        let key = (recipe_id, link.member_id);
        let affected = match self.snapshot.junction_mut(catalog).get_mut(&key) {
            Some(existing) => {
                *existing = Some(portion.clone());
                1
            }
            None => 0,
        };
        self.record(
            format!("update_link {} {} {}", catalog, recipe_id, link.member_id),
            Write::UpdateLink(catalog, key, portion),
        );
        Ok(affected)
    }

    async fn delete_link(
        &mut self,
        catalog: Catalog,
        recipe_id: i64,
        member_id: i64,
    ) -> Result<u64> {
        self.statement("delete_link")?;
        let key = (recipe_id, member_id);
        let removed = self.snapshot.junction_mut(catalog).remove(&key).is_some();
        self.record(
            format!("delete_link {} {} {}", catalog, recipe_id, member_id),
            Write::DeleteLink(catalog, key),
        );
        Ok(u64::from(removed))
    }

    async fn delete_links_for_recipe(&mut self, catalog: Catalog, recipe_id: i64) -> Result<u64> {
        self.statement("delete_links_for_recipe")?;
        let junction = self.snapshot.junction_mut(catalog);
        let before = junction.len();
        junction.retain(|(rid, _), _| *rid != recipe_id);
        let removed = (before - junction.len()) as u64;
        self.record(
            format!("delete_links_for_recipe {} {}", catalog, recipe_id),
            Write::DeleteLinksForRecipe(catalog, recipe_id),
        );
        Ok(removed)
    }

    async fn recipe_ingredients(&mut self, recipe_id: i64) -> Result<Vec<RecipeIngredient>> {
        self.statement("recipe_ingredients")?;
        Ok(self.snapshot.ingredients_for(recipe_id))
    }

    async fn recipe_tags(&mut self, recipe_id: i64) -> Result<Vec<Tag>> {
        self.statement("recipe_tags")?;
        Ok(self.snapshot.tags_for(recipe_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scalars(name: &str) -> RecipeScalars {
        RecipeScalars {
            name: name.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_commit_publishes_snapshot() {
        let backend = MemoryBackend::new();
        let mut tx = backend.begin().await.unwrap();
        let id = tx.insert_recipe(&scalars("Soup")).await.unwrap();
        assert_eq!(backend.state().recipe_count(), 0, "uncommitted writes are private");

        backend.commit(tx).await.unwrap();
        assert_eq!(backend.state().recipe_count(), 1);
        assert_eq!(id, 1);
    }

    #[tokio::test]
    async fn test_overlapping_inserts_both_persist() {
        let backend = MemoryBackend::new();
        let mut a = backend.begin().await.unwrap();
        let mut b = backend.begin().await.unwrap();

        let id_a = a.insert_recipe(&scalars("A")).await.unwrap();
        let id_b = b.insert_recipe(&scalars("B")).await.unwrap();
        assert_ne!(id_a, id_b);

        backend.commit(a).await.unwrap();
        backend.commit(b).await.unwrap();

        let mut tx = backend.begin().await.unwrap();
        let names: Vec<String> = tx
            .list_recipe_rows()
            .await
            .unwrap()
            .into_iter()
            .map(|row| row.recipe.scalars.name)
            .collect();
        assert_eq!(names, vec!["A".to_string(), "B".to_string()]);
        assert_eq!(backend.state().recipe_count(), 2);
    }

    #[tokio::test]
    async fn test_overlapping_commit_keeps_other_writes() {
        let backend = MemoryBackend::new();
        let mut setup = backend.begin().await.unwrap();
        let id = setup.insert_recipe(&scalars("Stew")).await.unwrap();
        backend.commit(setup).await.unwrap();

        let mut a = backend.begin().await.unwrap();
        let mut b = backend.begin().await.unwrap();
        let tag = a.insert_named(Catalog::Tags, "hearty").await.unwrap().unwrap();
        a.insert_link(Catalog::Tags, id, &Link::bare(tag)).await.unwrap();
        b.update_recipe(id, &scalars("Beef stew")).await.unwrap();

        backend.commit(a).await.unwrap();
        backend.commit(b).await.unwrap();

        let state = backend.state();
        assert_eq!(state.member_ids(Catalog::Tags, id).len(), 1);
        let mut tx = backend.begin().await.unwrap();
        let row = tx.fetch_recipe(id).await.unwrap().unwrap();
        assert_eq!(row.scalars.name, "Beef stew");
    }

    #[tokio::test]
    async fn test_overlapping_same_name_conflicts_at_commit() {
        let backend = MemoryBackend::new();
        let mut a = backend.begin().await.unwrap();
        let mut b = backend.begin().await.unwrap();
        a.insert_named(Catalog::Ingredients, "salt").await.unwrap();
        b.insert_named(Catalog::Ingredients, "salt").await.unwrap();
        b.insert_named(Catalog::Ingredients, "pepper").await.unwrap();

        backend.commit(a).await.unwrap();
        assert!(backend.commit(b).await.is_err());

        let state = backend.state();
        assert_eq!(state.named_occurrences(Catalog::Ingredients, "salt"), 1);
        assert_eq!(state.named_id(Catalog::Ingredients, "pepper"), None);
    }

    #[tokio::test]
    async fn test_link_to_deleted_recipe_fails_commit() {
        let backend = MemoryBackend::new();
        let mut setup = backend.begin().await.unwrap();
        let id = setup.insert_recipe(&scalars("Gone")).await.unwrap();
        let tag = setup.insert_named(Catalog::Tags, "t").await.unwrap().unwrap();
        backend.commit(setup).await.unwrap();

        let mut a = backend.begin().await.unwrap();
        let mut b = backend.begin().await.unwrap();
        a.delete_recipe(id).await.unwrap();
        b.insert_link(Catalog::Tags, id, &Link::bare(tag)).await.unwrap();

        backend.commit(a).await.unwrap();
        assert!(backend.commit(b).await.is_err());
        assert_eq!(backend.state().link_count(Catalog::Tags), 0);
    }

    #[tokio::test]
    async fn test_rolled_back_ids_are_not_reused() {
        let backend = MemoryBackend::new();
        let mut tx = backend.begin().await.unwrap();
        let first = tx.insert_recipe(&scalars("Draft")).await.unwrap();
        backend.rollback(tx).await.unwrap();

        let mut tx = backend.begin().await.unwrap();
        let second = tx.insert_recipe(&scalars("Final")).await.unwrap();
        assert!(second > first);
    }

    #[tokio::test]
    async fn test_rollback_discards_snapshot() {
        let backend = MemoryBackend::new();
        let mut tx = backend.begin().await.unwrap();
        tx.insert_named(Catalog::Tags, "vegan").await.unwrap();
        backend.rollback(tx).await.unwrap();

        assert_eq!(backend.state().named_count(Catalog::Tags), 0);
        assert_eq!(backend.stats().rollbacks, 1);
    }

    #[tokio::test]
    async fn test_insert_named_reports_existing_name() {
        let backend = MemoryBackend::new();
        let mut tx = backend.begin().await.unwrap();
        assert_eq!(
            tx.insert_named(Catalog::Ingredients, "salt").await.unwrap(),
            Some(1)
        );
        assert_eq!(tx.insert_named(Catalog::Ingredients, "salt").await.unwrap(), None);
        assert_eq!(tx.find_named(Catalog::Ingredients, "Salt").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_statement_fault_fires_once() {
        let backend = MemoryBackend::new();
        backend.fail_statement(2);
        let mut tx = backend.begin().await.unwrap();
        assert!(tx.find_named(Catalog::Tags, "a").await.is_ok());
        assert!(matches!(
            tx.find_named(Catalog::Tags, "a").await,
            Err(Error::Database(_))
        ));
        assert!(tx.find_named(Catalog::Tags, "a").await.is_ok());
    }

    #[tokio::test]
    async fn test_duplicate_link_is_rejected() {
        let backend = MemoryBackend::new();
        let mut tx = backend.begin().await.unwrap();
        tx.insert_link(Catalog::Tags, 1, &Link::bare(2)).await.unwrap();
        assert!(tx.insert_link(Catalog::Tags, 1, &Link::bare(2)).await.is_err());
    }

    #[tokio::test]
    async fn test_listing_left_join_shape() {
        let backend = MemoryBackend::new();
        let mut tx = backend.begin().await.unwrap();
        let with_assoc = tx.insert_recipe(&scalars("Full")).await.unwrap();
        let bare = tx.insert_recipe(&scalars("Bare")).await.unwrap();
        for name in ["flour", "milk"] {
            let id = tx
                .insert_named(Catalog::Ingredients, name)
                .await
                .unwrap()
                .unwrap();
            let portion = Portion {
                quantity: 1.0,
                unit: "cup".to_string(),
            };
            tx.insert_link(Catalog::Ingredients, with_assoc, &Link::with_portion(id, portion))
                .await
                .unwrap();
        }
        let tag = tx.insert_named(Catalog::Tags, "baking").await.unwrap().unwrap();
        tx.insert_link(Catalog::Tags, with_assoc, &Link::bare(tag))
            .await
            .unwrap();

        let rows = tx.list_recipe_rows().await.unwrap();
        let full: Vec<_> = rows.iter().filter(|r| r.recipe.id == with_assoc).collect();
        let empty: Vec<_> = rows.iter().filter(|r| r.recipe.id == bare).collect();
        assert_eq!(full.len(), 2);
        assert_eq!(empty.len(), 1);
        assert!(empty[0].ingredient.is_none() && empty[0].tag.is_none());
    }
}
