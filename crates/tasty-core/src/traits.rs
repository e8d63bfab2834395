//! Core traits for tasty-byte abstractions.
//!
//! The HTTP layer depends only on [`RecipeRepository`], so handlers can be
//! exercised against any backend.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{CreateRecipeRequest, Recipe};

// =============================================================================
// RECIPE REPOSITORY TRAITS
// =============================================================================

/// Repository for recipe aggregate operations.
///
/// Every write is atomic: either the recipe row and all of its association
/// changes persist, or none of them do.
#[async_trait]
pub trait RecipeRepository: Send + Sync {
    /// Liveness probe against the storage connection.
    async fn ping(&self) -> Result<()>;

    /// Insert a recipe with its ingredients and tags, returning the new id.
    async fn insert(&self, req: CreateRecipeRequest) -> Result<i64>;

    /// Fetch one recipe with its associations.
    async fn get(&self, id: i64) -> Result<Recipe>;

    /// List every recipe with its associations, ascending by id.
    async fn get_all(&self) -> Result<Vec<Recipe>>;

    /// Overwrite a recipe's scalars and association sets with `recipe`.
    ///
    /// `recipe` must already carry the fully merged desired state.
    async fn update(&self, recipe: Recipe) -> Result<()>;

    /// Delete a recipe and its junction rows. Shared ingredients and tags stay.
    async fn delete(&self, id: i64) -> Result<()>;
}
