//! Domain models for recipes and their associations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// =============================================================================
// RECIPE
// =============================================================================

/// A recipe together with its ingredient and tag associations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub id: i64,
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub instructions: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub preparation_time: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cooking_time: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub portions: i32,
    /// Server-assigned on insert, never changed afterwards.
    #[serde(skip)]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub ingredients: Vec<RecipeIngredient>,
    #[serde(default)]
    pub tags: Vec<Tag>,
}

fn is_zero(n: &i32) -> bool {
    *n == 0
}

impl Recipe {
    /// Check the scalar invariants shared by insert and update.
    pub fn validate(&self) -> Result<()> {
        validate_recipe_fields(&self.name, self.portions)
    }

    /// Desired ingredient names with their portions, in list order.
    pub fn ingredient_inputs(&self) -> Vec<IngredientInput> {
        self.ingredients
            .iter()
            .map(|i| IngredientInput {
                name: i.name.clone(),
                quantity: i.quantity,
                unit: i.unit.clone(),
            })
            .collect()
    }

    /// Desired tag names, in list order.
    pub fn tag_inputs(&self) -> Vec<TagInput> {
        self.tags
            .iter()
            .map(|t| TagInput {
                name: t.name.clone(),
            })
            .collect()
    }
}

/// Validate a recipe name and portion count.
pub fn validate_recipe_fields(name: &str, portions: i32) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::InvalidInput("Recipe name cannot be empty".to_string()));
    }
    if portions < 0 {
        return Err(Error::InvalidInput(format!(
            "Portions must not be negative, got {}",
            portions
        )));
    }
    Ok(())
}

/// An ingredient as used by one recipe: the shared ingredient row plus the
/// quantity and unit owned by the association.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeIngredient {
    #[serde(default)]
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub quantity: f64,
    #[serde(default)]
    pub unit: String,
}

/// A shared tag row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    #[serde(default)]
    pub id: i64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
}

// =============================================================================
// REQUESTS
// =============================================================================

/// An ingredient supplied on create or update, identified by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngredientInput {
    pub name: String,
    #[serde(default)]
    pub quantity: f64,
    #[serde(default)]
    pub unit: String,
}

/// A tag supplied on create or update, identified by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagInput {
    pub name: String,
}

/// Request for creating a recipe.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateRecipeRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub instructions: String,
    #[serde(default)]
    pub preparation_time: String,
    #[serde(default)]
    pub cooking_time: String,
    #[serde(default)]
    pub portions: i32,
    #[serde(default)]
    pub ingredients: Vec<IngredientInput>,
    #[serde(default)]
    pub tags: Vec<TagInput>,
}

impl CreateRecipeRequest {
    pub fn validate(&self) -> Result<()> {
        validate_recipe_fields(&self.name, self.portions)
    }
}

/// Partial update of a recipe.
///
/// Omitted fields keep their stored value. A supplied ingredient or tag list
/// replaces the stored list wholesale.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateRecipeRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub instructions: Option<String>,
    pub preparation_time: Option<String>,
    pub cooking_time: Option<String>,
    pub portions: Option<i32>,
    pub ingredients: Option<Vec<IngredientInput>>,
    pub tags: Option<Vec<TagInput>>,
}

impl UpdateRecipeRequest {
    /// Merge this request into a stored recipe, producing the full desired state.
    pub fn merge_into(self, mut recipe: Recipe) -> Recipe {
        if let Some(name) = self.name {
            recipe.name = name;
        }
        if let Some(description) = self.description {
            recipe.description = description;
        }
        if let Some(instructions) = self.instructions {
            recipe.instructions = instructions;
        }
        if let Some(preparation_time) = self.preparation_time {
            recipe.preparation_time = preparation_time;
        }
        if let Some(cooking_time) = self.cooking_time {
            recipe.cooking_time = cooking_time;
        }
        if let Some(portions) = self.portions {
            recipe.portions = portions;
        }
        if let Some(ingredients) = self.ingredients {
            // Ids are resolved by name during the update.
            recipe.ingredients = ingredients
                .into_iter()
                .map(|i| RecipeIngredient {
                    id: 0,
                    name: i.name,
                    quantity: i.quantity,
                    unit: i.unit,
                })
                .collect();
        }
        if let Some(tags) = self.tags {
            recipe.tags = tags
                .into_iter()
                .map(|t| Tag { id: 0, name: t.name })
                .collect();
        }
        recipe
    }
}
