//! Structured logging vocabulary for tasty-byte.
//!
//! Every event carries `subsystem` and `component` fields whose values come
//! from the constants below, so log queries can filter on the same values
//! across crates. Other fields in use: `op`, `recipe_id`, `catalog`,
//! `duration_ms`, `result_count`, `added`, `updated`, `removed`,
//! `pool_size`, `pool_idle`, `error`, `rollback_error`.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, rollback failures, panics inside a transaction |
//! | WARN  | Recoverable issue, unit of work rolled back |
//! | INFO  | Lifecycle events (startup, shutdown, pool creation) |
//! | DEBUG | Transaction begin/commit, association plans |

// ─── subsystem ─────────────────────────────────────────────────────────────

/// HTTP boundary.
pub const API: &str = "api";

/// Storage layer.
pub const DATABASE: &str = "database";

// ─── component ─────────────────────────────────────────────────────────────

pub const POOL: &str = "pool";
pub const TRANSACTION: &str = "transaction";
pub const RECIPES: &str = "recipes";
pub const DEDUP: &str = "dedup";
pub const JUNCTION: &str = "junction";
