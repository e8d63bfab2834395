//! Association set planning.
//!
//! A recipe's ingredient or tag associations are a set of junction rows keyed
//! by member id. [`plan_membership`] compares the rows currently stored with
//! the rows the caller wants and returns the three edits that turn one into
//! the other. Applying the plan is the storage layer's job.

use std::collections::{HashMap, HashSet};

/// Attributes carried by an ingredient association.
#[derive(Debug, Clone, PartialEq)]
pub struct Portion {
    pub quantity: f64,
    pub unit: String,
}

/// One junction row, seen from the recipe side.
///
/// Tag links have no portion; ingredient links always have one.
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    pub member_id: i64,
    pub portion: Option<Portion>,
}

impl Link {
    pub fn bare(member_id: i64) -> Self {
        Self {
            member_id,
            portion: None,
        }
    }

    pub fn with_portion(member_id: i64, portion: Portion) -> Self {
        Self {
            member_id,
            portion: Some(portion),
        }
    }
}

/// Edits needed to move a recipe's junction rows to the desired set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MembershipPlan {
    /// Members not yet linked.
    pub to_add: Vec<Link>,
    /// Members already linked whose attributes differ.
    pub to_update: Vec<Link>,
    /// Linked members absent from the desired set.
    pub to_remove: Vec<i64>,
}

impl MembershipPlan {
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_update.is_empty() && self.to_remove.is_empty()
    }
}

/// Collapse duplicate members, keeping the first position and the last attributes.
pub fn dedup_links(links: &[Link]) -> Vec<Link> {
    let mut order: Vec<i64> = Vec::with_capacity(links.len());
    let mut latest: HashMap<i64, &Link> = HashMap::with_capacity(links.len());
    for link in links {
        if latest.insert(link.member_id, link).is_none() {
            order.push(link.member_id);
        }
    }
    order
        .into_iter()
        .filter_map(|id| latest.get(&id).map(|l| (*l).clone()))
        .collect()
}

/// Compute `{to_add, to_update, to_remove}` for `current` → `desired`.
///
/// Members present on both sides with equal attributes produce no edit.
/// Output order follows `desired` for additions and updates and `current`
/// for removals.
pub fn plan_membership(current: &[Link], desired: &[Link]) -> MembershipPlan {
    let current_by_id: HashMap<i64, &Link> = current.iter().map(|l| (l.member_id, l)).collect();
    let desired = dedup_links(desired);
    let desired_ids: HashSet<i64> = desired.iter().map(|l| l.member_id).collect();

    let mut plan = MembershipPlan::default();
    for link in desired {
        match current_by_id.get(&link.member_id) {
            None => plan.to_add.push(link),
            Some(existing) if existing.portion != link.portion => plan.to_update.push(link),
            Some(_) => {}
        }
    }

    let mut seen = HashSet::new();
    for link in current {
        if !desired_ids.contains(&link.member_id) && seen.insert(link.member_id) {
            plan.to_remove.push(link.member_id);
        }
    }

    tracing::trace!(
        added = plan.to_add.len(),
        updated = plan.to_update.len(),
        removed = plan.to_remove.len(),
        "Planned membership changes"
    );

    plan
}
