//! Recipe aggregate repository.
//!
//! Every operation runs as one unit of work inside a [`TransactionContext`].
//! Writes commit once at the end; reads run in a transaction that is always
//! rolled back so the recipe row and both association reads see one snapshot.

use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use tracing::{debug, info, instrument};

use tasty_core::{
    logging, CreateRecipeRequest, Error, IngredientInput, Link, Portion, Recipe, RecipeIngredient,
    RecipeRepository, Result, Tag, TagInput,
};

use crate::backend::{Backend, ListingRow, RecipeRow, RecipeScalars, StoreTx};
use crate::dedup::DedupStore;
use crate::junction::JunctionSync;
use crate::postgres::PgBackend;
use crate::transaction::TransactionContext;

/// Recipe repository backed by PostgreSQL.
pub type PgRecipeRepository = RecipeStore<PgBackend>;

/// Recipe aggregate over any storage backend.
pub struct RecipeStore<B: Backend> {
    tx: TransactionContext<B>,
}

impl<B: Backend> Clone for RecipeStore<B> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<B: Backend> RecipeStore<B> {
    pub fn new(backend: B) -> Self {
        Self {
            tx: TransactionContext::new(backend),
        }
    }

    /// The transaction context operations run in.
    pub fn transactions(&self) -> &TransactionContext<B> {
        &self.tx
    }

    /// Read one recipe with its associations inside an open transaction.
    pub async fn load_recipe(tx: &mut B::Tx, id: i64) -> Result<Recipe> {
        let row = tx
            .fetch_recipe(id)
            .await?
            .ok_or_else(|| Error::recipe_not_found(id))?;
        let ingredients = tx.recipe_ingredients(id).await?;
        let tags = tx.recipe_tags(id).await?;
        Ok(row.into_recipe(ingredients, tags))
    }

    /// Resolve ingredient names to ids and build their desired links.
    async fn ingredient_links(tx: &mut B::Tx, inputs: Vec<IngredientInput>) -> Result<Vec<Link>> {
        let dedup = DedupStore::ingredients();
        let mut links = Vec::with_capacity(inputs.len());
        for input in inputs {
            validate_portion(&input)?;
            let id = dedup.get_or_create(tx, &input.name).await?;
            links.push(Link::with_portion(
                id,
                Portion {
                    quantity: input.quantity,
                    unit: input.unit,
                },
            ));
        }
        Ok(links)
    }

    /// Resolve tag names to ids.
    async fn tag_links(tx: &mut B::Tx, inputs: Vec<TagInput>) -> Result<Vec<Link>> {
        let dedup = DedupStore::tags();
        let mut links = Vec::with_capacity(inputs.len());
        for input in inputs {
            let id = dedup.get_or_create(tx, &input.name).await?;
            links.push(Link::bare(id));
        }
        Ok(links)
    }
}

fn validate_portion(input: &IngredientInput) -> Result<()> {
    if !input.quantity.is_finite() {
        return Err(Error::InvalidInput(format!(
            "Quantity for '{}' must be a finite number",
            input.name
        )));
    }
    Ok(())
}

#[async_trait]
impl<B: Backend> RecipeRepository for RecipeStore<B> {
    async fn ping(&self) -> Result<()> {
        self.tx.ping().await
    }

    #[instrument(
        skip(self, req),
        fields(subsystem = logging::DATABASE, component = logging::RECIPES, op = "insert")
    )]
    async fn insert(&self, req: CreateRecipeRequest) -> Result<i64> {
        req.validate()?;

        let id = self
            .tx
            .run("insert", move |tx| {
                Box::pin(async move {
                    let scalars = RecipeScalars::from(&req);
                    let recipe_id = tx.insert_recipe(&scalars).await?;

                    let ingredient_links = Self::ingredient_links(tx, req.ingredients).await?;
                    let sync = JunctionSync::ingredients();
                    for link in ingredient_links {
                        sync.associate(tx, recipe_id, &link).await?;
                    }

                    let tag_links = Self::tag_links(tx, req.tags).await?;
                    let sync = JunctionSync::tags();
                    for link in tag_links {
                        sync.associate(tx, recipe_id, &link).await?;
                    }

                    Ok(recipe_id)
                })
            })
            .await?;

        info!(recipe_id = id, "Recipe created");
        Ok(id)
    }

    async fn get(&self, id: i64) -> Result<Recipe> {
        self.tx
            .read("get", move |tx| Box::pin(async move { Self::load_recipe(tx, id).await }))
            .await
    }

    async fn get_all(&self) -> Result<Vec<Recipe>> {
        let rows = self
            .tx
            .read("get_all", |tx| Box::pin(async move { tx.list_recipe_rows().await }))
            .await?;
        let recipes = fold_listing(rows);
        debug!(
            subsystem = logging::DATABASE,
            component = logging::RECIPES,
            op = "get_all",
            result_count = recipes.len(),
            "Listed recipes"
        );
        Ok(recipes)
    }

    #[instrument(
        skip(self, recipe),
        fields(
            subsystem = logging::DATABASE,
            component = logging::RECIPES,
            op = "update",
            recipe_id = recipe.id
        )
    )]
    async fn update(&self, recipe: Recipe) -> Result<()> {
        recipe.validate()?;

        self.tx
            .run("update", move |tx| {
                Box::pin(async move {
                    let id = recipe.id;
                    if tx.fetch_recipe(id).await?.is_none() {
                        return Err(Error::recipe_not_found(id));
                    }

                    let scalars = RecipeScalars::from(&recipe);
                    if tx.update_recipe(id, &scalars).await? == 0 {
                        return Err(Error::recipe_not_found(id));
                    }

                    let ingredient_links =
                        Self::ingredient_links(tx, recipe.ingredient_inputs()).await?;
                    let tag_links = Self::tag_links(tx, recipe.tag_inputs()).await?;

                    JunctionSync::ingredients()
                        .apply_desired_set(tx, id, &ingredient_links)
                        .await?;
                    JunctionSync::tags()
                        .apply_desired_set(tx, id, &tag_links)
                        .await?;
                    Ok(())
                })
            })
            .await?;

        info!("Recipe updated");
        Ok(())
    }

    #[instrument(
        skip(self),
        fields(subsystem = logging::DATABASE, component = logging::RECIPES, op = "delete")
    )]
    async fn delete(&self, id: i64) -> Result<()> {
        self.tx
            .run("delete", move |tx| {
                Box::pin(async move {
                    if tx.delete_recipe(id).await? == 0 {
                        return Err(Error::recipe_not_found(id));
                    }
                    JunctionSync::ingredients()
                        .delete_all_for_recipe(tx, id)
                        .await?;
                    JunctionSync::tags().delete_all_for_recipe(tx, id).await?;
                    Ok(())
                })
            })
            .await?;

        info!("Recipe deleted");
        Ok(())
    }
}

// =============================================================================
// LISTING FOLD
// =============================================================================

struct Accumulator {
    row: RecipeRow,
    ingredients: Vec<RecipeIngredient>,
    tags: Vec<Tag>,
    seen_ingredients: HashSet<i64>,
    seen_tags: HashSet<i64>,
}

/// Fold the denormalized listing into one [`Recipe`] per id, ascending.
///
/// Ingredients and tags are collected independently per recipe, so the
/// ingredient × tag fan-out of the join never duplicates either list.
pub fn fold_listing(rows: Vec<ListingRow>) -> Vec<Recipe> {
    let mut by_id: BTreeMap<i64, Accumulator> = BTreeMap::new();

    for ListingRow {
        recipe,
        ingredient,
        tag,
    } in rows
    {
        let acc = by_id.entry(recipe.id).or_insert_with(|| Accumulator {
            row: recipe,
            ingredients: Vec::new(),
            tags: Vec::new(),
            seen_ingredients: HashSet::new(),
            seen_tags: HashSet::new(),
        });

        if let Some(ingredient) = ingredient {
            if acc.seen_ingredients.insert(ingredient.id) {
                acc.ingredients.push(ingredient);
            }
        }
        if let Some(tag) = tag {
            if acc.seen_tags.insert(tag.id) {
                acc.tags.push(tag);
            }
        }
    }

    by_id
        .into_values()
        .map(|acc| acc.row.into_recipe(acc.ingredients, acc.tags))
        .collect()
}
