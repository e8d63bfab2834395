//! Junction row synchronisation between a recipe and a catalog.
//!
//! Two shapes are supported. The two-phase form calls [`JunctionSync::associate`]
//! for every desired member and then [`JunctionSync::reconcile_not_in_list`].
//! The one-pass form, [`JunctionSync::apply_desired_set`], plans additions,
//! attribute updates and removals up front and leaves matching rows alone.

use std::collections::HashSet;

use tracing::debug;

use tasty_core::{logging, plan_membership, Link, MembershipPlan, Result};

use crate::backend::{Catalog, StoreTx};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JunctionSync {
    catalog: Catalog,
}

impl JunctionSync {
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

    /// Ensure one junction row for `(recipe_id, link.member_id)`.
    ///
    /// An existing ingredient row gets its quantity and unit overwritten; an
    /// existing tag row is left as is.
    pub async fn associate<T>(&self, tx: &mut T, recipe_id: i64, link: &Link) -> Result<()>
    where
        T: StoreTx + ?Sized,
    {
        if tx
            .link_exists(self.catalog, recipe_id, link.member_id)
            .await?
        {
            if self.catalog.has_portion() {
                tx.update_link(self.catalog, recipe_id, link).await?;
            }
            return Ok(());
        }
        tx.insert_link(self.catalog, recipe_id, link).await
    }

    /// Delete junction rows whose member is not in `desired`.
    ///
    /// Returns the number of rows removed. Missing desired members are not
    /// created here. An empty `desired` removes every row for the recipe.
    pub async fn reconcile_not_in_list<T>(
        &self,
        tx: &mut T,
        recipe_id: i64,
        desired: &[i64],
    ) -> Result<u64>
    where
        T: StoreTx + ?Sized,
    {
        let keep: HashSet<i64> = desired.iter().copied().collect();
        let stale: Vec<i64> = tx
            .links(self.catalog, recipe_id)
            .await?
            .into_iter()
            .map(|link| link.member_id)
            .filter(|id| !keep.contains(id))
            .collect();

        let mut removed = 0;
        for member_id in stale {
            removed += tx.delete_link(self.catalog, recipe_id, member_id).await?;
        }

        debug!(
            subsystem = logging::DATABASE,
            component = logging::JUNCTION,
            op = "reconcile",
            catalog = %self.catalog,
            recipe_id,
            removed,
            "Reconciled junction rows"
        );
        Ok(removed)
    }

    /// Remove every junction row for the recipe.
    pub async fn delete_all_for_recipe<T>(&self, tx: &mut T, recipe_id: i64) -> Result<u64>
    where
        T: StoreTx + ?Sized,
    {
        tx.delete_links_for_recipe(self.catalog, recipe_id).await
    }

    /// Move the recipe's junction rows to exactly `desired` in one pass.
    ///
    /// Rows already matching the desired attributes are not written.
    pub async fn apply_desired_set<T>(
        &self,
        tx: &mut T,
        recipe_id: i64,
        desired: &[Link],
    ) -> Result<MembershipPlan>
    where
        T: StoreTx + ?Sized,
    {
        let current = tx.links(self.catalog, recipe_id).await?;
        let desired: Vec<Link> = if self.catalog.has_portion() {
            desired.to_vec()
        } else {
            // Tag rows carry no attributes, so nothing can need an update.
            desired.iter().map(|l| Link::bare(l.member_id)).collect()
        };
        let plan = plan_membership(&current, &desired);

        for link in &plan.to_add {
            tx.insert_link(self.catalog, recipe_id, link).await?;
        }
        for link in &plan.to_update {
            tx.update_link(self.catalog, recipe_id, link).await?;
        }
        for member_id in &plan.to_remove {
            tx.delete_link(self.catalog, recipe_id, *member_id).await?;
        }

        debug!(
            subsystem = logging::DATABASE,
            component = logging::JUNCTION,
            op = "apply_desired_set",
            catalog = %self.catalog,
            recipe_id,
            added = plan.to_add.len(),
            updated = plan.to_update.len(),
            removed = plan.to_remove.len(),
            "Applied desired junction set"
        );
        Ok(plan)
    }
}
