//! # Logical Plan Nodes
//!
//! The relational operators that logical query plans are built from. A plan
//! is a DAG of `LqpNode` values: every node holds its children as
//! `&'a LqpNode<'a>` references into a `bumpalo` arena, so subtrees are
//! freely shared between parents and a rewrite that changes one branch
//! allocates fresh nodes above the change instead of touching the original.
//!
//! ## Operators
//!
//! | Node | Shape | Output columns |
//! |------|-------|----------------|
//! | `StoredTable` | leaf | its declared column list |
//! | `Predicate` | one input, one predicate | pass-through |
//! | `Join` | two inputs, mode + predicate list | left ++ right (left only for semi/anti) |
//! | `Aggregate` | one input, grouping + aggregate lists | group_by ++ aggregates |
//! | `Projection` | one input, expression list | its expressions |
//! | `Alias` | one input, expressions + names | its expressions |
//! | `Sort` | one input, sort keys | pass-through |
//! | `Validate` | one input | pass-through (MVCC visibility filter) |
//! | `Limit` | one input, limit/offset | pass-through |
//!
//! ## Column resolution
//!
//! `column_expressions` computes the expression list a node's output rows
//! consist of; `find_column_id` resolves an expression against that list by
//! structural equality. Resolution respects narrowing: a projection that
//! drops a column makes it unresolvable above the projection, which is
//! exactly the property rewrite rules rely on when they move predicates
//! around.

use smallvec::SmallVec;

use crate::expr::Expr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinMode {
    Inner,
    Cross,
    Left,
    Right,
    FullOuter,
    /// Keeps each left row with at least one match; right columns are gone.
    Semi,
    /// Anti join where a NULL comparison counts as "no match".
    AntiNullAsFalse,
    /// Anti join where a NULL comparison counts as "match" (NOT IN semantics).
    AntiNullAsTrue,
}

impl JoinMode {
    /// Semi and anti joins expose only their left input's columns.
    pub fn discards_right_columns(self) -> bool {
        matches!(
            self,
            JoinMode::Semi | JoinMode::AntiNullAsFalse | JoinMode::AntiNullAsTrue
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StoredTableNode<'a> {
    pub name: &'a str,
    /// Column expressions this table produces, in declaration order.
    pub column_exprs: &'a [&'a Expr<'a>],
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PredicateNode<'a> {
    pub predicate: &'a Expr<'a>,
    pub input: &'a LqpNode<'a>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JoinNode<'a> {
    pub mode: JoinMode,
    /// Join predicates; for semi/anti joins the first must be an equality.
    pub predicates: &'a [&'a Expr<'a>],
    pub left: &'a LqpNode<'a>,
    pub right: &'a LqpNode<'a>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AggregateNode<'a> {
    pub group_by: &'a [&'a Expr<'a>],
    pub aggregates: &'a [&'a Expr<'a>],
    pub input: &'a LqpNode<'a>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectionNode<'a> {
    pub expressions: &'a [&'a Expr<'a>],
    pub input: &'a LqpNode<'a>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AliasNode<'a> {
    pub expressions: &'a [&'a Expr<'a>],
    /// One name per expression.
    pub aliases: &'a [&'a str],
    pub input: &'a LqpNode<'a>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SortKey<'a> {
    pub expr: &'a Expr<'a>,
    pub ascending: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SortNode<'a> {
    pub keys: &'a [SortKey<'a>],
    pub input: &'a LqpNode<'a>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidateNode<'a> {
    pub input: &'a LqpNode<'a>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LimitNode<'a> {
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub input: &'a LqpNode<'a>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LqpNode<'a> {
    StoredTable(StoredTableNode<'a>),
    Predicate(PredicateNode<'a>),
    Join(JoinNode<'a>),
    Aggregate(AggregateNode<'a>),
    Projection(ProjectionNode<'a>),
    Alias(AliasNode<'a>),
    Sort(SortNode<'a>),
    Validate(ValidateNode<'a>),
    Limit(LimitNode<'a>),
}

impl<'a> LqpNode<'a> {
    pub fn left_input(&self) -> Option<&'a LqpNode<'a>> {
        match *self {
            LqpNode::StoredTable(_) => None,
            LqpNode::Predicate(node) => Some(node.input),
            LqpNode::Join(node) => Some(node.left),
            LqpNode::Aggregate(node) => Some(node.input),
            LqpNode::Projection(node) => Some(node.input),
            LqpNode::Alias(node) => Some(node.input),
            LqpNode::Sort(node) => Some(node.input),
            LqpNode::Validate(node) => Some(node.input),
            LqpNode::Limit(node) => Some(node.input),
        }
    }

    pub fn right_input(&self) -> Option<&'a LqpNode<'a>> {
        match *self {
            LqpNode::Join(node) => Some(node.right),
            _ => None,
        }
    }

    /// Every expression tree this node owns and evaluates.
    ///
    /// Stored tables own nothing: their column list describes output, it is
    /// not evaluated.
    pub fn node_expressions(&self) -> SmallVec<[&'a Expr<'a>; 4]> {
        match *self {
            LqpNode::StoredTable(_) | LqpNode::Validate(_) | LqpNode::Limit(_) => SmallVec::new(),
            LqpNode::Predicate(node) => {
                let mut expressions = SmallVec::new();
                expressions.push(node.predicate);
                expressions
            }
            LqpNode::Join(node) => node.predicates.iter().copied().collect(),
            LqpNode::Aggregate(node) => node
                .group_by
                .iter()
                .chain(node.aggregates.iter())
                .copied()
                .collect(),
            LqpNode::Projection(node) => node.expressions.iter().copied().collect(),
            LqpNode::Alias(node) => node.expressions.iter().copied().collect(),
            LqpNode::Sort(node) => node.keys.iter().map(|key| key.expr).collect(),
        }
    }

    /// The expression list a row of this node's output consists of.
    pub fn column_expressions(&self) -> SmallVec<[&'a Expr<'a>; 8]> {
        match *self {
            LqpNode::StoredTable(node) => node.column_exprs.iter().copied().collect(),
            LqpNode::Predicate(node) => node.input.column_expressions(),
            LqpNode::Sort(node) => node.input.column_expressions(),
            LqpNode::Validate(node) => node.input.column_expressions(),
            LqpNode::Limit(node) => node.input.column_expressions(),
            LqpNode::Projection(node) => node.expressions.iter().copied().collect(),
            LqpNode::Alias(node) => node.expressions.iter().copied().collect(),
            LqpNode::Aggregate(node) => node
                .group_by
                .iter()
                .chain(node.aggregates.iter())
                .copied()
                .collect(),
            LqpNode::Join(node) => {
                if node.mode.discards_right_columns() {
                    node.left.column_expressions()
                } else {
                    let mut columns = node.left.column_expressions();
                    columns.extend(node.right.column_expressions());
                    columns
                }
            }
        }
    }

    /// Resolves `expr` to its position in this node's output, if present.
    pub fn find_column_id(&self, expr: &Expr<'a>) -> Option<usize> {
        self.column_expressions()
            .iter()
            .position(|column| **column == *expr)
    }
}
