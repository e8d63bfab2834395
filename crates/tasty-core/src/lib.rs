//! # tasty-core
//!
//! Core types, traits, and abstractions for the tasty-byte recipe service.
//!
//! This crate provides the domain model shared by the storage and HTTP
//! crates: recipes with their ingredient and tag associations, the error
//! taxonomy, the repository trait the HTTP layer consumes, and the pure
//! membership planner used to reconcile association sets.

pub mod error;
pub mod logging;
pub mod membership;
pub mod models;
pub mod traits;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use membership::{plan_membership, Link, MembershipPlan, Portion};
pub use models::*;
pub use traits::*;
