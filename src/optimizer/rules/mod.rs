//! # Rewrite Rules
//!
//! Individual plan-to-plan transformations driven by the [`Optimizer`].
//!
//! Rules follow three guidelines:
//!
//! 1. A rule that cannot prove a rewrite safe declines (`Ok(None)`) and
//!    leaves the plan untouched; it never guesses.
//! 2. Rules allocate new nodes in the provided arena and never mutate the
//!    nodes they were given.
//! 3. Applying a rule to its own output is a no-op.
//!
//! [`Optimizer`]: crate::optimizer::Optimizer

mod subquery_to_join;

pub use subquery_to_join::SubqueryToJoinRule;
