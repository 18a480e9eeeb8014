//! # rejoin - Logical Plan Rewriting
//!
//! `rejoin` rewrites logical query plans. Its centerpiece is the
//! subquery-to-join reformulation: filter predicates of the form
//! `(NOT) IN (subquery)`, `(NOT) EXISTS (subquery)` and
//! `column <op> (subquery)` become semi-/anti-joins between the outer plan
//! and an adapted copy of the subquery plan, turning per-row subquery
//! evaluation into a single join.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │       Optimizer (fixed point)        │
//! ├─────────────────────────────────────┤
//! │   Rewrite Rules (SubqueryToJoin)     │
//! ├─────────────────────────────────────┤
//! │   Plan Algebra (LqpNode operators)   │
//! ├─────────────────────────────────────┤
//! │     Expression Trees (Expr)          │
//! └─────────────────────────────────────┘
//! ```
//!
//! ## Memory Model
//!
//! Plans and expressions are arena-allocated (`bumpalo`) and immutable.
//! Children are `&'a` references, so subtrees are cheaply shared between
//! plans, and a rewrite allocates fresh nodes above the changed region
//! while everything else keeps its identity. Old nodes become unreachable
//! when the arena is dropped.
//!
//! ## Usage
//!
//! ```ignore
//! use bumpalo::Bump;
//! use rejoin::optimizer::Optimizer;
//!
//! let arena = Bump::new();
//! let plan = /* build an LqpNode tree in the arena */;
//! let optimized = Optimizer::new().optimize(plan, &arena)?;
//! ```
//!
//! The library performs no I/O and holds no global state; applying a rule
//! is deterministic and single-threaded.
//!
//! ## Module Overview
//!
//! - [`expr`]: Expression trees, correlated parameters, the walker
//! - [`plan`]: Logical operators and column resolution
//! - [`optimizer`]: The rule trait, the driver, and the rewrite rules

pub mod expr;
pub mod optimizer;
pub mod plan;

pub use expr::{ColumnRef, Expr, ParameterId, PredicateCondition, SubqueryExpr};
pub use optimizer::{OptimizationRule, Optimizer};
pub use plan::{JoinMode, LqpNode};
