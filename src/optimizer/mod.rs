//! # Rule-Based Plan Optimizer
//!
//! A fixed-point driver that applies rewrite rules to a logical plan until
//! none of them changes it.
//!
//! ## Rule contract
//!
//! A rule receives the plan root and the arena the plan lives in. It returns
//! `Ok(Some(new_root))` when it rewrote something, allocating every fresh
//! node into the arena, and `Ok(None)` when it has nothing to do. Rules
//! never mutate the plan they are given: a rewrite allocates new nodes
//! above the changed region, and subtrees the rule did not touch keep their
//! identity. Parents outside the rewritten branch therefore keep observing
//! the original nodes.
//!
//! Rules must be idempotent: re-applying a rule to its own output yields
//! `Ok(None)`.
//!
//! ## Iteration
//!
//! Rules run in registration order; a full pass repeats until no rule
//! reports a change or the iteration cap is reached. The cap exists to turn
//! a non-converging rule combination into a visible warning instead of an
//! infinite loop.

pub mod rules;

use bumpalo::Bump;
use eyre::Result;

use crate::plan::LqpNode;

pub trait OptimizationRule {
    fn name(&self) -> &'static str;

    fn apply<'a>(
        &self,
        plan: &'a LqpNode<'a>,
        arena: &'a Bump,
    ) -> Result<Option<&'a LqpNode<'a>>>;
}

pub struct Optimizer {
    rules: Vec<Box<dyn OptimizationRule + Send + Sync>>,
    max_iterations: usize,
}

impl Optimizer {
    pub fn new() -> Self {
        Self {
            rules: vec![Box::new(rules::SubqueryToJoinRule)],
            max_iterations: 10,
        }
    }

    pub fn with_rules(rules: Vec<Box<dyn OptimizationRule + Send + Sync>>) -> Self {
        Self {
            rules,
            max_iterations: 10,
        }
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn add_rule(&mut self, rule: Box<dyn OptimizationRule + Send + Sync>) {
        self.rules.push(rule);
    }

    pub fn optimize<'a>(
        &self,
        plan: &'a LqpNode<'a>,
        arena: &'a Bump,
    ) -> Result<&'a LqpNode<'a>> {
        let mut current = plan;

        for iteration in 0..self.max_iterations {
            let mut changed = false;

            for rule in &self.rules {
                if let Some(new_plan) = rule.apply(current, arena)? {
                    current = new_plan;
                    changed = true;
                }
            }

            if !changed {
                break;
            }

            if iteration == self.max_iterations - 1 {
                eprintln!(
                    "[warn] optimizer reached max iterations ({}), stopping",
                    self.max_iterations
                );
            }
        }

        Ok(current)
    }
}

impl Default for Optimizer {
    fn default() -> Self {
        Self::new()
    }
}
