//! Storage capability traits.
//!
//! [`Backend`] owns the transaction lifecycle (begin, commit, rollback) and the
//! liveness probe. [`StoreTx`] is the handle a unit of work receives: it can
//! run the fixed statement shapes this service needs but cannot commit or roll
//! itself back, so the lifecycle stays with the transaction context.
//!
//! Both are implemented by PostgreSQL ([`crate::postgres`]) and by an
//! in-memory double ([`crate::memory`]).

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use tasty_core::{
    CreateRecipeRequest, Link, Recipe, RecipeIngredient, Result, Tag,
};

// =============================================================================
// CATALOGS
// =============================================================================

/// A table of shared, name-keyed rows together with its junction table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Catalog {
    Ingredients,
    Tags,
}

impl Catalog {
    /// Table holding the shared rows.
    pub fn table(self) -> &'static str {
        match self {
            Catalog::Ingredients => "ingredients",
            Catalog::Tags => "tags",
        }
    }

    /// Junction table linking recipes to this catalog.
    pub fn junction_table(self) -> &'static str {
        match self {
            Catalog::Ingredients => "recipe_ingredients",
            Catalog::Tags => "recipe_tags",
        }
    }

    /// Member id column in the junction table.
    pub fn member_column(self) -> &'static str {
        match self {
            Catalog::Ingredients => "ingredient_id",
            Catalog::Tags => "tag_id",
        }
    }

    /// Whether junction rows carry quantity and unit.
    pub fn has_portion(self) -> bool {
        matches!(self, Catalog::Ingredients)
    }
}

impl std::fmt::Display for Catalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.table())
    }
}

// =============================================================================
// ROW SHAPES
// =============================================================================

/// Scalar columns of a recipe row that callers may write.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecipeScalars {
    pub name: String,
    pub description: String,
    pub instructions: String,
    pub preparation_time: String,
    pub cooking_time: String,
    pub portions: i32,
}

impl From<&CreateRecipeRequest> for RecipeScalars {
    fn from(req: &CreateRecipeRequest) -> Self {
        Self {
            name: req.name.clone(),
            description: req.description.clone(),
            instructions: req.instructions.clone(),
            preparation_time: req.preparation_time.clone(),
            cooking_time: req.cooking_time.clone(),
            portions: req.portions,
        }
    }
}

impl From<&Recipe> for RecipeScalars {
    fn from(recipe: &Recipe) -> Self {
        Self {
            name: recipe.name.clone(),
            description: recipe.description.clone(),
            instructions: recipe.instructions.clone(),
            preparation_time: recipe.preparation_time.clone(),
            cooking_time: recipe.cooking_time.clone(),
            portions: recipe.portions,
        }
    }
}

/// A stored recipe row without associations.
#[derive(Debug, Clone, PartialEq)]
pub struct RecipeRow {
    pub id: i64,
    pub scalars: RecipeScalars,
    pub created_at: DateTime<Utc>,
}

impl RecipeRow {
    pub fn into_recipe(self, ingredients: Vec<RecipeIngredient>, tags: Vec<Tag>) -> Recipe {
        Recipe {
            id: self.id,
            name: self.scalars.name,
            description: self.scalars.description,
            instructions: self.scalars.instructions,
            preparation_time: self.scalars.preparation_time,
            cooking_time: self.scalars.cooking_time,
            portions: self.scalars.portions,
            created_at: self.created_at,
            ingredients,
            tags,
        }
    }
}

/// One row of the denormalized recipe listing.
///
/// The listing left-joins both association kinds, so a recipe appears once per
/// (ingredient × tag) combination and either side may be absent.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingRow {
    pub recipe: RecipeRow,
    pub ingredient: Option<RecipeIngredient>,
    pub tag: Option<Tag>,
}

// =============================================================================
// CAPABILITIES
// =============================================================================

/// Statements available inside an open transaction.
#[async_trait]
pub trait StoreTx: Send {
    // ── recipes ────────────────────────────────────────────────────────────

    /// Insert a recipe row stamped with the current time, returning its id.
    async fn insert_recipe(&mut self, scalars: &RecipeScalars) -> Result<i64>;

    async fn fetch_recipe(&mut self, id: i64) -> Result<Option<RecipeRow>>;

    /// Overwrite scalar columns. Returns rows affected.
    async fn update_recipe(&mut self, id: i64, scalars: &RecipeScalars) -> Result<u64>;

    /// Delete the recipe row only. Returns rows affected.
    async fn delete_recipe(&mut self, id: i64) -> Result<u64>;

    /// Denormalized listing ordered by recipe, ingredient and tag id.
    async fn list_recipe_rows(&mut self) -> Result<Vec<ListingRow>>;

    // ── shared name-keyed rows ────────────────────────────────────────────

    /// Exact, case-sensitive lookup by name.
    async fn find_named(&mut self, catalog: Catalog, name: &str) -> Result<Option<i64>>;

    /// Insert a named row. `None` means the name already exists, typically
    /// because a concurrent transaction created it first.
    async fn insert_named(&mut self, catalog: Catalog, name: &str) -> Result<Option<i64>>;

    // ── junction rows ──────────────────────────────────────────────────────

    /// Current junction rows for a recipe, ordered by member id.
    async fn links(&mut self, catalog: Catalog, recipe_id: i64) -> Result<Vec<Link>>;

    async fn link_exists(&mut self, catalog: Catalog, recipe_id: i64, member_id: i64)
        -> Result<bool>;

    async fn insert_link(&mut self, catalog: Catalog, recipe_id: i64, link: &Link) -> Result<()>;

    /// Overwrite the attributes of an existing junction row. Returns rows affected.
    async fn update_link(&mut self, catalog: Catalog, recipe_id: i64, link: &Link) -> Result<u64>;

    async fn delete_link(&mut self, catalog: Catalog, recipe_id: i64, member_id: i64)
        -> Result<u64>;

    async fn delete_links_for_recipe(&mut self, catalog: Catalog, recipe_id: i64) -> Result<u64>;

    // ── nested reads ───────────────────────────────────────────────────────

    /// Ingredients of a recipe joined with their names, ordered by ingredient id.
    async fn recipe_ingredients(&mut self, recipe_id: i64) -> Result<Vec<RecipeIngredient>>;

    /// Tags of a recipe joined with their names, ordered by tag id.
    async fn recipe_tags(&mut self, recipe_id: i64) -> Result<Vec<Tag>>;
}

/// Transaction lifecycle and liveness for a storage engine.
///
/// Lifecycle failures are returned as raw `sqlx::Error` so the transaction
/// context can classify them as begin, commit or rollback faults.
#[async_trait]
pub trait Backend: Send + Sync + 'static {
    type Tx: StoreTx + 'static;

    async fn begin(&self) -> std::result::Result<Self::Tx, sqlx::Error>;

    async fn commit(&self, tx: Self::Tx) -> std::result::Result<(), sqlx::Error>;

    async fn rollback(&self, tx: Self::Tx) -> std::result::Result<(), sqlx::Error>;

    async fn ping(&self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_tables() {
        assert_eq!(Catalog::Ingredients.table(), "ingredients");
        assert_eq!(Catalog::Ingredients.junction_table(), "recipe_ingredients");
        assert_eq!(Catalog::Ingredients.member_column(), "ingredient_id");
        assert_eq!(Catalog::Tags.table(), "tags");
        assert_eq!(Catalog::Tags.junction_table(), "recipe_tags");
        assert_eq!(Catalog::Tags.member_column(), "tag_id");
    }

    #[test]
    fn test_only_ingredients_carry_portions() {
        assert!(Catalog::Ingredients.has_portion());
        assert!(!Catalog::Tags.has_portion());
    }

    #[test]
    fn test_scalars_from_create_request() {
        let req = CreateRecipeRequest {
            name: "Stew".to_string(),
            portions: 6,
            cooking_time: "2h".to_string(),
            ..Default::default()
        };
        let scalars = RecipeScalars::from(&req);
        assert_eq!(scalars.name, "Stew");
        assert_eq!(scalars.portions, 6);
        assert_eq!(scalars.cooking_time, "2h");
        assert!(scalars.description.is_empty());
    }

    #[test]
    fn test_row_into_recipe_keeps_created_at() {
        let created_at = Utc::now();
        let row = RecipeRow {
            id: 3,
            scalars: RecipeScalars {
                name: "Salad".to_string(),
                ..Default::default()
            },
            created_at,
        };
        let recipe = row.into_recipe(vec![], vec![]);
        assert_eq!(recipe.id, 3);
        assert_eq!(recipe.name, "Salad");
        assert_eq!(recipe.created_at, created_at);
    }
}
