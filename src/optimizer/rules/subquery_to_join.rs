//! # Subquery-to-Join Reformulation
//!
//! Rewrites filter predicates that test against a subquery into semi- or
//! anti-joins between the outer plan and an adapted copy of the subquery
//! plan, eliminating per-row subquery re-execution.
//!
//! ## Transformations
//!
//! | Filter shape | Join |
//! |--------------|------|
//! | `x IN (subquery)` | `Semi` on `x = <subquery column>` |
//! | `x NOT IN (subquery)`, uncorrelated only | `AntiNullAsTrue` |
//! | `x <op> (subquery)`, `op ∈ {=, <>, <, <=, >, >=}` | `Semi` on `x <op> <subquery column>` |
//! | `EXISTS (subquery)`, correlated only | `Semi` on the pulled predicates |
//! | `NOT EXISTS (subquery)`, correlated only | `AntiNullAsFalse` |
//!
//! Correlated predicates inside the subquery (`inner.col <op> $n`) are
//! pulled out of the subquery plan and become additional join predicates.
//!
//! ## When the rule declines
//!
//! The rewrite is purely syntactic and applied whenever it is provably
//! safe; there is no cost model. It declines, leaving the plan untouched,
//! when:
//!
//! - the `IN` set is a static list, or the subquery of a `NOT IN` is
//!   correlated (its NULL semantics do not survive a uniform
//!   multi-predicate anti join);
//! - an `EXISTS` subquery is uncorrelated (that filter is a constant);
//! - the outer comparison operand is not a column of the filter's input;
//! - a correlated parameter is used outside a predicate node (projection
//!   list, grouping key, join predicate, sort key);
//! - a correlated predicate sits where it cannot be pulled across (below a
//!   limit, on the null-producing side of an outer join, on the right of a
//!   semi/anti join), or compares with anything but equality below an
//!   aggregate;
//! - no equality predicate is available to lead the join (semi/anti joins
//!   hash on their primary predicate).
//!
//! ## How a rewrite proceeds
//!
//! 1. Classify the filter and derive the join mode plus, for `IN` and
//!    comparison shapes, a base join predicate.
//! 2. Scan the subquery plan for every use of the bound parameters; count
//!    correlated predicate nodes, reject other uses.
//! 3. Walk the subquery plan along safe edges collecting pullable
//!    predicates and synthesizing a join predicate from each; require that
//!    every counted predicate was found.
//! 4. Copy-and-adapt the subquery plan: drop the pulled predicates and
//!    extend aggregates/projections/aliases so the columns the new join
//!    predicates compare against stay visible at the plan root. Everything
//!    above a dropped predicate is freshly allocated; untouched subtrees
//!    are shared, so other consumers of the original plan see no change.
//! 5. Emit the join, an equality predicate leading, and keep rewriting
//!    inside its inputs (the adapted plan may contain further subqueries).

use bumpalo::Bump;
use eyre::{bail, ensure, Result};
use hashbrown::HashMap;
use smallvec::SmallVec;

use crate::expr::{
    visit_expr, Expr, ExprVisit, ParameterId, PredicateCondition, SubqueryExpr,
};
use crate::optimizer::OptimizationRule;
use crate::plan::{
    AggregateNode, AliasNode, JoinMode, JoinNode, LimitNode, LqpNode, PredicateNode,
    ProjectionNode, SortNode, ValidateNode,
};

/// Binds the parameters of the subquery currently being rewritten to their
/// outer expressions. Parameters of enclosing scopes are absent by design.
type ParameterMapping<'a> = HashMap<ParameterId, &'a Expr<'a>>;

/// What the classifier learned about a convertible filter.
struct SubqueryFilterInfo<'a> {
    subquery: SubqueryExpr<'a>,
    join_mode: JoinMode,
    /// Present for `IN` and comparison shapes, absent for `EXISTS`.
    base_predicate: Option<&'a Expr<'a>>,
}

/// Result of copying the subquery plan with the pulled predicates removed.
struct AdaptedPlan<'a> {
    root: &'a LqpNode<'a>,
    /// Columns the pulled join predicates compare against, deduplicated,
    /// guaranteed visible at `root`.
    required_columns: Vec<&'a Expr<'a>>,
}

pub struct SubqueryToJoinRule;

impl OptimizationRule for SubqueryToJoinRule {
    fn name(&self) -> &'static str {
        "subquery_to_join"
    }

    fn apply<'a>(
        &self,
        plan: &'a LqpNode<'a>,
        arena: &'a Bump,
    ) -> Result<Option<&'a LqpNode<'a>>> {
        self.rewrite_plan(plan, arena)
    }
}

impl SubqueryToJoinRule {
    fn rewrite_plan<'a>(
        &self,
        node: &'a LqpNode<'a>,
        arena: &'a Bump,
    ) -> Result<Option<&'a LqpNode<'a>>> {
        if let Some(join) = self.try_rewrite_filter(node, arena)? {
            let rewritten = self.rewrite_inputs(join, arena)?.unwrap_or(join);
            return Ok(Some(rewritten));
        }
        self.rewrite_inputs(node, arena)
    }

    /// Descends into the inputs, reallocating `node` only when one of them
    /// changed. Unchanged subtrees keep their identity.
    fn rewrite_inputs<'a>(
        &self,
        node: &'a LqpNode<'a>,
        arena: &'a Bump,
    ) -> Result<Option<&'a LqpNode<'a>>> {
        match *node {
            LqpNode::StoredTable(_) => Ok(None),

            LqpNode::Predicate(predicate_node) => {
                Ok(self.rewrite_plan(predicate_node.input, arena)?.map(|input| {
                    &*arena.alloc(LqpNode::Predicate(PredicateNode {
                        predicate: predicate_node.predicate,
                        input,
                    }))
                }))
            }

            LqpNode::Join(join_node) => {
                let left = self.rewrite_plan(join_node.left, arena)?;
                let right = self.rewrite_plan(join_node.right, arena)?;
                if left.is_none() && right.is_none() {
                    return Ok(None);
                }
                Ok(Some(arena.alloc(LqpNode::Join(JoinNode {
                    mode: join_node.mode,
                    predicates: join_node.predicates,
                    left: left.unwrap_or(join_node.left),
                    right: right.unwrap_or(join_node.right),
                }))))
            }

            LqpNode::Aggregate(aggregate_node) => {
                Ok(self.rewrite_plan(aggregate_node.input, arena)?.map(|input| {
                    &*arena.alloc(LqpNode::Aggregate(AggregateNode {
                        group_by: aggregate_node.group_by,
                        aggregates: aggregate_node.aggregates,
                        input,
                    }))
                }))
            }

            LqpNode::Projection(projection_node) => {
                Ok(self.rewrite_plan(projection_node.input, arena)?.map(|input| {
                    &*arena.alloc(LqpNode::Projection(ProjectionNode {
                        expressions: projection_node.expressions,
                        input,
                    }))
                }))
            }

            LqpNode::Alias(alias_node) => {
                Ok(self.rewrite_plan(alias_node.input, arena)?.map(|input| {
                    &*arena.alloc(LqpNode::Alias(AliasNode {
                        expressions: alias_node.expressions,
                        aliases: alias_node.aliases,
                        input,
                    }))
                }))
            }

            LqpNode::Sort(sort_node) => {
                Ok(self.rewrite_plan(sort_node.input, arena)?.map(|input| {
                    &*arena.alloc(LqpNode::Sort(SortNode {
                        keys: sort_node.keys,
                        input,
                    }))
                }))
            }

            LqpNode::Validate(validate_node) => {
                Ok(self.rewrite_plan(validate_node.input, arena)?.map(|input| {
                    &*arena.alloc(LqpNode::Validate(ValidateNode { input }))
                }))
            }

            LqpNode::Limit(limit_node) => {
                Ok(self.rewrite_plan(limit_node.input, arena)?.map(|input| {
                    &*arena.alloc(LqpNode::Limit(LimitNode {
                        limit: limit_node.limit,
                        offset: limit_node.offset,
                        input,
                    }))
                }))
            }
        }
    }

    fn try_rewrite_filter<'a>(
        &self,
        node: &'a LqpNode<'a>,
        arena: &'a Bump,
    ) -> Result<Option<&'a LqpNode<'a>>> {
        let LqpNode::Predicate(predicate_node) = node else {
            return Ok(None);
        };
        let Some(info) = extract_subquery_filter_info(predicate_node, arena)? else {
            return Ok(None);
        };

        let mut parameter_mapping = ParameterMapping::default();
        for &(id, outer) in info.subquery.parameters {
            parameter_mapping.insert(id, outer);
        }

        let (blocked, correlated_predicate_count) =
            assess_correlated_parameter_usage(info.subquery.plan, &parameter_mapping);
        if blocked {
            return Ok(None);
        }

        let pullable =
            find_pullable_predicate_nodes(info.subquery.plan, &parameter_mapping, arena);
        ensure!(
            pullable.len() <= correlated_predicate_count,
            "pull-up scan found {} correlated predicates, usage scan counted {}",
            pullable.len(),
            correlated_predicate_count
        );
        if pullable.len() != correlated_predicate_count {
            return Ok(None);
        }

        let adapted = copy_and_adapt_plan(info.subquery.plan, &pullable, arena);

        // Semi/anti joins hash on their primary predicate, so an equality
        // must exist and lead the list.
        let mut join_predicates: SmallVec<[&'a Expr<'a>; 4]> = SmallVec::new();
        let mut found_equality = false;
        if let Some(base) = info.base_predicate {
            join_predicates.push(base);
            found_equality = is_equality(base);
        }
        for &(_, join_predicate) in &pullable {
            join_predicates.push(join_predicate);
            if !found_equality && is_equality(join_predicate) {
                let last = join_predicates.len() - 1;
                join_predicates.swap(0, last);
                found_equality = true;
            }
        }
        if join_predicates.is_empty() || !found_equality {
            return Ok(None);
        }

        Ok(Some(arena.alloc(LqpNode::Join(JoinNode {
            mode: info.join_mode,
            predicates: arena.alloc_slice_copy(&join_predicates),
            left: predicate_node.input,
            right: adapted.root,
        }))))
    }
}

fn is_equality(expr: &Expr<'_>) -> bool {
    matches!(
        expr,
        Expr::Comparison {
            op: PredicateCondition::Equals,
            ..
        }
    )
}

/// Classifies a filter node; returns `None` for every shape the rule does
/// not handle.
fn extract_subquery_filter_info<'a>(
    predicate_node: &PredicateNode<'a>,
    arena: &'a Bump,
) -> Result<Option<SubqueryFilterInfo<'a>>> {
    match *predicate_node.predicate {
        Expr::In {
            value,
            set,
            negated,
        } => {
            // Static lists are not rewritten.
            let Expr::Subquery(subquery) = *set else {
                return Ok(None);
            };
            // NULL semantics of a correlated NOT IN cannot be expressed by
            // an anti join that treats all its predicates uniformly.
            if negated && subquery.is_correlated() {
                return Ok(None);
            }
            if predicate_node.input.find_column_id(value).is_none() {
                return Ok(None);
            }
            let inner_column = single_output_column(&subquery)?;
            let base = &*arena.alloc(Expr::Comparison {
                op: PredicateCondition::Equals,
                left: value,
                right: inner_column,
            });
            Ok(Some(SubqueryFilterInfo {
                subquery,
                join_mode: if negated {
                    JoinMode::AntiNullAsTrue
                } else {
                    JoinMode::Semi
                },
                base_predicate: Some(base),
            }))
        }

        Expr::Comparison { op, left, right } => {
            // Exactly one operand may be a subquery; with the subquery on
            // the left, the comparison flips so the outer column leads.
            let (subquery, outer_operand, op) = match (*left, *right) {
                (Expr::Subquery(_), Expr::Subquery(_)) => return Ok(None),
                (Expr::Subquery(subquery), _) => (subquery, right, op.flip()),
                (_, Expr::Subquery(subquery)) => (subquery, left, op),
                _ => return Ok(None),
            };
            if predicate_node.input.find_column_id(outer_operand).is_none() {
                return Ok(None);
            }
            let inner_column = single_output_column(&subquery)?;
            let base = &*arena.alloc(Expr::Comparison {
                op,
                left: outer_operand,
                right: inner_column,
            });
            Ok(Some(SubqueryFilterInfo {
                subquery,
                join_mode: JoinMode::Semi,
                base_predicate: Some(base),
            }))
        }

        Expr::Exists { subquery, negated } => {
            let Expr::Subquery(subquery) = *subquery else {
                bail!("EXISTS operand is not an embedded subquery plan");
            };
            // An uncorrelated EXISTS filters all-or-nothing; that is a
            // constant, not a join.
            if !subquery.is_correlated() {
                return Ok(None);
            }
            Ok(Some(SubqueryFilterInfo {
                subquery,
                join_mode: if negated {
                    JoinMode::AntiNullAsFalse
                } else {
                    JoinMode::Semi
                },
                base_predicate: None,
            }))
        }

        _ => Ok(None),
    }
}

fn single_output_column<'a>(subquery: &SubqueryExpr<'a>) -> Result<&'a Expr<'a>> {
    let columns = subquery.plan.column_expressions();
    ensure!(
        columns.len() == 1,
        "IN/comparison subquery must produce exactly one column, produces {}",
        columns.len()
    );
    Ok(columns[0])
}

/// True when any expression of `node` contains a parameter bound by the
/// subquery being rewritten. Parameters of enclosing scopes don't count.
fn uses_correlated_parameters<'a>(
    node: &LqpNode<'a>,
    parameter_mapping: &ParameterMapping<'a>,
) -> bool {
    let mut found = false;
    for expression in node.node_expressions() {
        visit_expr(expression, &mut |sub_expression| {
            if found {
                return ExprVisit::SkipOperands;
            }
            if let Expr::CorrelatedParameter(id) = sub_expression {
                if parameter_mapping.contains_key(id) {
                    found = true;
                    return ExprVisit::SkipOperands;
                }
            }
            ExprVisit::VisitOperands
        });
        if found {
            break;
        }
    }
    found
}

/// Scans the whole subquery plan for parameter uses.
///
/// Returns `(blocked, correlated_predicate_count)`. Only standalone
/// predicate nodes can be pulled into a join; a parameter showing up
/// anywhere else blocks the rewrite outright.
fn assess_correlated_parameter_usage<'a>(
    node: &'a LqpNode<'a>,
    parameter_mapping: &ParameterMapping<'a>,
) -> (bool, usize) {
    let mut count = 0;
    if uses_correlated_parameters(node, parameter_mapping) {
        if matches!(node, LqpNode::Predicate(_)) {
            count += 1;
        } else {
            return (true, count);
        }
    }

    for child in [node.left_input(), node.right_input()].into_iter().flatten() {
        let (blocked, child_count) = assess_correlated_parameter_usage(child, parameter_mapping);
        if blocked {
            return (true, count);
        }
        count += child_count;
    }
    (false, count)
}

/// Which inputs of `node` it is safe to pull predicates out of.
///
/// Joins allow their non-null-producing sides, except the right side of
/// semi/anti joins whose columns cannot be preserved. Single-input nodes
/// that commute with filtering allow their input. Everything else (stored
/// tables, limits) stops the recursion.
fn safe_recursion_sides(node: &LqpNode<'_>) -> (bool, bool) {
    match node {
        LqpNode::Join(join_node) => match join_node.mode {
            JoinMode::Inner | JoinMode::Cross => (true, true),
            JoinMode::Left
            | JoinMode::Semi
            | JoinMode::AntiNullAsFalse
            | JoinMode::AntiNullAsTrue => (true, false),
            JoinMode::Right => (false, true),
            JoinMode::FullOuter => (false, false),
        },
        LqpNode::Predicate(_)
        | LqpNode::Aggregate(_)
        | LqpNode::Alias(_)
        | LqpNode::Projection(_)
        | LqpNode::Sort(_)
        | LqpNode::Validate(_) => (true, false),
        LqpNode::StoredTable(_) | LqpNode::Limit(_) => (false, false),
    }
}

/// Turns a correlated predicate into a join predicate, if its shape allows.
///
/// The predicate must be a binary comparison with a bound parameter on
/// exactly one side and a column of the node's input on the other. With the
/// parameter on the right the comparison flips, so the outer expression
/// always ends up as the left operand.
fn try_extract_join_predicate<'a>(
    predicate_node: &PredicateNode<'a>,
    parameter_mapping: &ParameterMapping<'a>,
    is_below_aggregate: bool,
    arena: &'a Bump,
) -> Option<&'a Expr<'a>> {
    let Expr::Comparison { op, left, right } = *predicate_node.predicate else {
        return None;
    };

    let (parameter_id, column_operand, op) = match (*left, *right) {
        (Expr::CorrelatedParameter(id), _) => (id, right, op),
        (_, Expr::CorrelatedParameter(id)) => (id, left, op.flip()),
        _ => return None,
    };

    // Equality predicates survive an aggregate by joining their column into
    // the grouping key; range predicates do not commute with aggregation.
    if is_below_aggregate && !op.is_equality() {
        return None;
    }

    if predicate_node.input.find_column_id(column_operand).is_none() {
        return None;
    }

    // Parameters of enclosing scopes and prepared-statement placeholders
    // are not ours to pull.
    let outer_operand = *parameter_mapping.get(&parameter_id)?;

    Some(arena.alloc(Expr::Comparison {
        op,
        left: outer_operand,
        right: column_operand,
    }))
}

fn find_pullable_predicate_nodes<'a>(
    node: &'a LqpNode<'a>,
    parameter_mapping: &ParameterMapping<'a>,
    arena: &'a Bump,
) -> Vec<(&'a LqpNode<'a>, &'a Expr<'a>)> {
    let mut pullable = Vec::new();
    find_pullable_recursive(node, parameter_mapping, false, arena, &mut pullable);
    pullable
}

fn find_pullable_recursive<'a>(
    node: &'a LqpNode<'a>,
    parameter_mapping: &ParameterMapping<'a>,
    mut is_below_aggregate: bool,
    arena: &'a Bump,
    pullable: &mut Vec<(&'a LqpNode<'a>, &'a Expr<'a>)>,
) {
    match node {
        LqpNode::Predicate(predicate_node) => {
            if let Some(join_predicate) = try_extract_join_predicate(
                predicate_node,
                parameter_mapping,
                is_below_aggregate,
                arena,
            ) {
                pullable.push((node, join_predicate));
            }
        }
        LqpNode::Aggregate(_) => is_below_aggregate = true,
        _ => {}
    }

    let (recurse_left, recurse_right) = safe_recursion_sides(node);
    if recurse_left {
        let left = node
            .left_input()
            .expect("nodes on the pull-up path have a left input");
        find_pullable_recursive(left, parameter_mapping, is_below_aggregate, arena, pullable);
    }
    if recurse_right {
        let right = node.right_input().expect("joins have a right input");
        find_pullable_recursive(right, parameter_mapping, is_below_aggregate, arena, pullable);
    }
}

/// Copies the subquery plan, removing the pulled predicate nodes and
/// keeping the columns their join predicates need visible at the root.
///
/// Recursion follows the same safe sides as the pull-up scan. Everything on
/// the path above a removed predicate is freshly allocated; subtrees the
/// recursion does not enter are shared as-is, so a plan node with consumers
/// outside this subquery keeps its meaning for them.
fn copy_and_adapt_plan<'a>(
    node: &'a LqpNode<'a>,
    pullable: &[(&'a LqpNode<'a>, &'a Expr<'a>)],
    arena: &'a Bump,
) -> AdaptedPlan<'a> {
    let (recurse_left, recurse_right) = safe_recursion_sides(node);

    let mut adapted_left = node.left_input();
    let mut adapted_right = node.right_input();
    let mut required_columns: Vec<&'a Expr<'a>> = Vec::new();
    if recurse_left {
        let left = node
            .left_input()
            .expect("nodes on the pull-up path have a left input");
        let info = copy_and_adapt_plan(left, pullable, arena);
        adapted_left = Some(info.root);
        required_columns = info.required_columns;
    }
    if recurse_right {
        let right = node.right_input().expect("joins have a right input");
        let info = copy_and_adapt_plan(right, pullable, arena);
        adapted_right = Some(info.root);
        required_columns.extend(info.required_columns);
    }

    let root: &'a LqpNode<'a> = match *node {
        LqpNode::Predicate(predicate_node) => {
            let input = adapted_left.expect("predicates have an input");
            match pullable
                .iter()
                .find(|(pulled, _)| std::ptr::eq(*pulled, node))
            {
                Some((_, join_predicate)) => {
                    // The predicate moves into the join; its column operand
                    // must stay visible above every node between here and
                    // the subquery root.
                    let Expr::Comparison {
                        right: inner_column,
                        ..
                    } = **join_predicate
                    else {
                        unreachable!("pulled join predicates are binary comparisons");
                    };
                    if !required_columns
                        .iter()
                        .any(|column| **column == *inner_column)
                    {
                        required_columns.push(inner_column);
                    }
                    input
                }
                None => arena.alloc(LqpNode::Predicate(PredicateNode {
                    predicate: predicate_node.predicate,
                    input,
                })),
            }
        }

        LqpNode::Aggregate(aggregate_node) => {
            // Grouping by a required column makes its value unique per
            // group, which is what lets an equality on it be evaluated on
            // the joined tuple instead.
            let mut group_by = bumpalo::collections::Vec::new_in(arena);
            group_by.extend_from_slice(aggregate_node.group_by);
            for &column in &required_columns {
                if !aggregate_node
                    .group_by
                    .iter()
                    .any(|existing| **existing == *column)
                {
                    group_by.push(column);
                }
            }
            arena.alloc(LqpNode::Aggregate(AggregateNode {
                group_by: group_by.into_bump_slice(),
                aggregates: aggregate_node.aggregates,
                input: adapted_left.expect("aggregates have an input"),
            }))
        }

        LqpNode::Projection(projection_node) => {
            // Existing duplicates are deliberate and stay; only genuinely
            // missing required columns are appended.
            let mut expressions = bumpalo::collections::Vec::new_in(arena);
            expressions.extend_from_slice(projection_node.expressions);
            for &column in &required_columns {
                if !projection_node
                    .expressions
                    .iter()
                    .any(|existing| **existing == *column)
                {
                    expressions.push(column);
                }
            }
            arena.alloc(LqpNode::Projection(ProjectionNode {
                expressions: expressions.into_bump_slice(),
                input: adapted_left.expect("projections have an input"),
            }))
        }

        LqpNode::Alias(alias_node) => {
            let mut expressions = bumpalo::collections::Vec::new_in(arena);
            expressions.extend_from_slice(alias_node.expressions);
            let mut aliases = bumpalo::collections::Vec::new_in(arena);
            aliases.extend_from_slice(alias_node.aliases);
            for &column in &required_columns {
                if !alias_node
                    .expressions
                    .iter()
                    .any(|existing| **existing == *column)
                {
                    expressions.push(column);
                    aliases.push(&*arena.alloc_str(&column.as_column_name()));
                }
            }
            arena.alloc(LqpNode::Alias(AliasNode {
                expressions: expressions.into_bump_slice(),
                aliases: aliases.into_bump_slice(),
                input: adapted_left.expect("aliases have an input"),
            }))
        }

        LqpNode::Sort(sort_node) => arena.alloc(LqpNode::Sort(SortNode {
            keys: sort_node.keys,
            input: adapted_left.expect("sorts have an input"),
        })),

        LqpNode::Validate(_) => arena.alloc(LqpNode::Validate(ValidateNode {
            input: adapted_left.expect("validates have an input"),
        })),

        LqpNode::Join(join_node) => arena.alloc(LqpNode::Join(JoinNode {
            mode: join_node.mode,
            predicates: join_node.predicates,
            left: adapted_left.expect("joins have a left input"),
            right: adapted_right.expect("joins have a right input"),
        })),

        // Terminals stop the recursion and are shared as-is.
        LqpNode::StoredTable(_) | LqpNode::Limit(_) => node,
    };

    AdaptedPlan {
        root,
        required_columns,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::ColumnRef;
    use crate::plan::StoredTableNode;
    use bumpalo::Bump;

    fn table<'a>(arena: &'a Bump, name: &'a str, columns: &[&'a str]) -> &'a LqpNode<'a> {
        let mut column_exprs = bumpalo::collections::Vec::new_in(arena);
        for &column in columns {
            column_exprs.push(&*arena.alloc(Expr::Column(ColumnRef {
                table: name,
                column,
            })));
        }
        arena.alloc(LqpNode::StoredTable(StoredTableNode {
            name,
            column_exprs: column_exprs.into_bump_slice(),
        }))
    }

    fn column<'a>(arena: &'a Bump, table: &'a str, column: &'a str) -> &'a Expr<'a> {
        arena.alloc(Expr::Column(ColumnRef { table, column }))
    }

    fn comparison<'a>(
        arena: &'a Bump,
        op: PredicateCondition,
        left: &'a Expr<'a>,
        right: &'a Expr<'a>,
    ) -> &'a Expr<'a> {
        arena.alloc(Expr::Comparison { op, left, right })
    }

    fn subquery<'a>(
        arena: &'a Bump,
        plan: &'a LqpNode<'a>,
        parameters: &[(ParameterId, &'a Expr<'a>)],
    ) -> &'a Expr<'a> {
        arena.alloc(Expr::Subquery(SubqueryExpr {
            plan,
            parameters: arena.alloc_slice_copy(parameters),
        }))
    }

    #[test]
    fn test_classifier_rejects_static_in_list() {
        let arena = Bump::new();
        let a = table(&arena, "a", &["a"]);
        let a_a = column(&arena, "a", "a");
        let one = &*arena.alloc(Expr::Literal(crate::expr::Literal::Integer(1)));
        let list = &*arena.alloc(Expr::List(arena.alloc_slice_copy(&[one])));
        let predicate_node = PredicateNode {
            predicate: arena.alloc(Expr::In {
                value: a_a,
                set: list,
                negated: false,
            }),
            input: a,
        };
        assert!(extract_subquery_filter_info(&predicate_node, &arena)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_classifier_rejects_correlated_not_in() {
        let arena = Bump::new();
        let a = table(&arena, "a", &["a", "b"]);
        let b = table(&arena, "b", &["a", "b"]);
        let a_a = column(&arena, "a", "a");
        let a_b = column(&arena, "a", "b");
        let b_a = column(&arena, "b", "a");
        let b_b = column(&arena, "b", "b");
        let param = &*arena.alloc(Expr::CorrelatedParameter(ParameterId(0)));

        let inner = &*arena.alloc(LqpNode::Projection(ProjectionNode {
            expressions: arena.alloc_slice_copy(&[b_a]),
            input: arena.alloc(LqpNode::Predicate(PredicateNode {
                predicate: comparison(&arena, PredicateCondition::Equals, b_b, param),
                input: b,
            })),
        }));
        let predicate_node = PredicateNode {
            predicate: arena.alloc(Expr::In {
                value: a_a,
                set: subquery(&arena, inner, &[(ParameterId(0), a_b)]),
                negated: true,
            }),
            input: a,
        };
        assert!(extract_subquery_filter_info(&predicate_node, &arena)
            .unwrap()
            .is_none());

        // The same shape without negation classifies as a semi join.
        let positive = PredicateNode {
            predicate: arena.alloc(Expr::In {
                value: a_a,
                set: subquery(&arena, inner, &[(ParameterId(0), a_b)]),
                negated: false,
            }),
            input: a,
        };
        let info = extract_subquery_filter_info(&positive, &arena)
            .unwrap()
            .unwrap();
        assert_eq!(info.join_mode, JoinMode::Semi);
        assert_eq!(
            info.base_predicate,
            Some(comparison(&arena, PredicateCondition::Equals, a_a, b_a))
        );
    }

    #[test]
    fn test_classifier_rejects_uncorrelated_exists() {
        let arena = Bump::new();
        let a = table(&arena, "a", &["a"]);
        let b = table(&arena, "b", &["a"]);
        let predicate_node = PredicateNode {
            predicate: arena.alloc(Expr::Exists {
                subquery: subquery(&arena, b, &[]),
                negated: false,
            }),
            input: a,
        };
        assert!(extract_subquery_filter_info(&predicate_node, &arena)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_classifier_flips_comparison_with_subquery_on_left() {
        let arena = Bump::new();
        let a = table(&arena, "a", &["a"]);
        let b = table(&arena, "b", &["a"]);
        let a_a = column(&arena, "a", "a");
        let b_a = column(&arena, "b", "a");
        let inner = arena.alloc(LqpNode::Projection(ProjectionNode {
            expressions: arena.alloc_slice_copy(&[b_a]),
            input: b,
        }));
        let predicate_node = PredicateNode {
            predicate: comparison(
                &arena,
                PredicateCondition::LessThan,
                subquery(&arena, inner, &[]),
                a_a,
            ),
            input: a,
        };
        let info = extract_subquery_filter_info(&predicate_node, &arena)
            .unwrap()
            .unwrap();
        assert_eq!(info.join_mode, JoinMode::Semi);
        // (subquery) < a.a becomes a.a > (subquery column)
        assert_eq!(
            info.base_predicate,
            Some(comparison(&arena, PredicateCondition::GreaterThan, a_a, b_a))
        );
    }

    #[test]
    fn test_classifier_rejects_outer_operand_not_in_input() {
        let arena = Bump::new();
        let a = table(&arena, "a", &["a"]);
        let b = table(&arena, "b", &["a"]);
        let c_x = column(&arena, "c", "x");
        let predicate_node = PredicateNode {
            predicate: arena.alloc(Expr::In {
                value: c_x,
                set: subquery(&arena, b, &[]),
                negated: false,
            }),
            input: a,
        };
        assert!(extract_subquery_filter_info(&predicate_node, &arena)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_extract_join_predicate_flips_parameter_on_right() {
        let arena = Bump::new();
        let e = table(&arena, "e", &["a", "b", "c"]);
        let e_c = column(&arena, "e", "c");
        let d_c = column(&arena, "d", "c");
        let param = &*arena.alloc(Expr::CorrelatedParameter(ParameterId(1)));
        let mut mapping = ParameterMapping::default();
        mapping.insert(ParameterId(1), d_c);

        // e.c < $1 pulls up as d.c > e.c
        let predicate_node = PredicateNode {
            predicate: comparison(&arena, PredicateCondition::LessThan, e_c, param),
            input: e,
        };
        let join_predicate =
            try_extract_join_predicate(&predicate_node, &mapping, false, &arena).unwrap();
        assert_eq!(
            join_predicate,
            comparison(&arena, PredicateCondition::GreaterThan, d_c, e_c)
        );
    }

    #[test]
    fn test_extract_join_predicate_below_aggregate_is_equality_only() {
        let arena = Bump::new();
        let e = table(&arena, "e", &["a", "c"]);
        let e_c = column(&arena, "e", "c");
        let d_c = column(&arena, "d", "c");
        let param = &*arena.alloc(Expr::CorrelatedParameter(ParameterId(0)));
        let mut mapping = ParameterMapping::default();
        mapping.insert(ParameterId(0), d_c);

        let range = PredicateNode {
            predicate: comparison(&arena, PredicateCondition::LessThan, e_c, param),
            input: e,
        };
        assert!(try_extract_join_predicate(&range, &mapping, true, &arena).is_none());

        let equality = PredicateNode {
            predicate: comparison(&arena, PredicateCondition::Equals, e_c, param),
            input: e,
        };
        assert!(try_extract_join_predicate(&equality, &mapping, true, &arena).is_some());
    }

    #[test]
    fn test_extract_join_predicate_ignores_foreign_parameters() {
        let arena = Bump::new();
        let e = table(&arena, "e", &["c"]);
        let e_c = column(&arena, "e", "c");
        let param = &*arena.alloc(Expr::CorrelatedParameter(ParameterId(7)));
        let mapping = ParameterMapping::default();

        let predicate_node = PredicateNode {
            predicate: comparison(&arena, PredicateCondition::Equals, e_c, param),
            input: e,
        };
        assert!(try_extract_join_predicate(&predicate_node, &mapping, false, &arena).is_none());
    }

    #[test]
    fn test_assess_blocks_non_predicate_parameter_use() {
        let arena = Bump::new();
        let b = table(&arena, "b", &["a"]);
        let param = &*arena.alloc(Expr::CorrelatedParameter(ParameterId(0)));
        let a_b = column(&arena, "a", "b");
        let mut mapping = ParameterMapping::default();
        mapping.insert(ParameterId(0), a_b);

        // Parameter inside a projection list cannot be pulled.
        let projection = arena.alloc(LqpNode::Projection(ProjectionNode {
            expressions: arena.alloc_slice_copy(&[param]),
            input: b,
        }));
        let (blocked, _) = assess_correlated_parameter_usage(projection, &mapping);
        assert!(blocked);

        // The same parameter inside a predicate counts instead.
        let b_a = column(&arena, "b", "a");
        let filtered = arena.alloc(LqpNode::Predicate(PredicateNode {
            predicate: comparison(&arena, PredicateCondition::Equals, b_a, param),
            input: b,
        }));
        let (blocked, count) = assess_correlated_parameter_usage(filtered, &mapping);
        assert!(!blocked);
        assert_eq!(count, 1);
    }

    #[test]
    fn test_safe_recursion_sides_per_join_mode() {
        let arena = Bump::new();
        let a = table(&arena, "a", &["a"]);
        let b = table(&arena, "b", &["a"]);
        let cases = [
            (JoinMode::Inner, (true, true)),
            (JoinMode::Cross, (true, true)),
            (JoinMode::Left, (true, false)),
            (JoinMode::Semi, (true, false)),
            (JoinMode::AntiNullAsFalse, (true, false)),
            (JoinMode::AntiNullAsTrue, (true, false)),
            (JoinMode::Right, (false, true)),
            (JoinMode::FullOuter, (false, false)),
        ];
        for (mode, expected) in cases {
            let join = LqpNode::Join(JoinNode {
                mode,
                predicates: &[],
                left: a,
                right: b,
            });
            assert_eq!(safe_recursion_sides(&join), expected, "{:?}", mode);
        }

        let limit = LqpNode::Limit(LimitNode {
            limit: Some(1),
            offset: None,
            input: a,
        });
        assert_eq!(safe_recursion_sides(&limit), (false, false));
    }

    #[test]
    fn test_adapt_extends_alias_with_generated_names() {
        let arena = Bump::new();
        let b = table(&arena, "b", &["a", "b"]);
        let b_a = column(&arena, "b", "a");
        let b_b = column(&arena, "b", "b");
        let a_b = column(&arena, "a", "b");
        let param = &*arena.alloc(Expr::CorrelatedParameter(ParameterId(0)));

        let pulled = &*arena.alloc(LqpNode::Predicate(PredicateNode {
            predicate: comparison(&arena, PredicateCondition::Equals, b_b, param),
            input: b,
        }));
        let alias = &*arena.alloc(LqpNode::Alias(AliasNode {
            expressions: arena.alloc_slice_copy(&[b_a]),
            aliases: arena.alloc_slice_copy(&["key"]),
            input: pulled,
        }));

        let join_predicate = comparison(&arena, PredicateCondition::Equals, a_b, b_b);
        let pullable = vec![(pulled, join_predicate)];
        let adapted = copy_and_adapt_plan(alias, &pullable, &arena);

        let LqpNode::Alias(adapted_alias) = adapted.root else {
            panic!("expected alias at the adapted root");
        };
        assert_eq!(adapted_alias.expressions, &[b_a, b_b]);
        assert_eq!(adapted_alias.aliases, &["key", "b.b"]);
        assert!(std::ptr::eq(adapted_alias.input, b));
        assert_eq!(adapted.required_columns, vec![b_b]);
    }
}
