//! # Expression Trees
//!
//! Arena-allocated expression trees used inside logical query plans: filter
//! predicates, projection lists, grouping keys, and the embedded subquery
//! plans that the reformulation rule rewrites away.
//!
//! ## Design
//!
//! Expressions follow the same memory model as plan nodes: every child is a
//! `&'a Expr<'a>` into a `bumpalo` arena, nodes are `Copy`, and equality is
//! structural. Rewrites never mutate an expression; they allocate a new one.
//!
//! ## Correlated parameters
//!
//! A `CorrelatedParameter` is an opaque placeholder for a column of an
//! enclosing query. It carries no binding by itself; the binding lives in
//! the `Subquery` expression that embeds the plan using the parameter:
//!
//! ```text
//! Subquery {
//!     plan: Predicate(b.b = $0, StoredTable(b)),
//!     parameters: [($0, a.b)],
//! }
//! ```
//!
//! Walking a `Subquery` expression visits its parameter bindings (the outer
//! expressions), never the interior of the embedded plan. Parameters bound
//! by *enclosing* subqueries thus stay opaque to the current scope, which is
//! what makes parameter scoping checks a simple map lookup.

use crate::plan::LqpNode;

/// Identifier of a correlated parameter, assigned by the planner when it
/// binds an outer column into a subquery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParameterId(pub u16);

/// The six binary comparisons joins can evaluate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredicateCondition {
    Equals,
    NotEquals,
    LessThan,
    LessThanEquals,
    GreaterThan,
    GreaterThanEquals,
}

impl PredicateCondition {
    /// The mirrored comparison: `a < b` holds iff `b > a` holds.
    pub fn flip(self) -> Self {
        match self {
            Self::Equals => Self::Equals,
            Self::NotEquals => Self::NotEquals,
            Self::LessThan => Self::GreaterThan,
            Self::LessThanEquals => Self::GreaterThanEquals,
            Self::GreaterThan => Self::LessThan,
            Self::GreaterThanEquals => Self::LessThanEquals,
        }
    }

    pub fn is_equality(self) -> bool {
        matches!(self, Self::Equals)
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::Equals => "=",
            Self::NotEquals => "<>",
            Self::LessThan => "<",
            Self::LessThanEquals => "<=",
            Self::GreaterThan => ">",
            Self::GreaterThanEquals => ">=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunction {
    Count,
    Sum,
    Min,
    Max,
    Avg,
}

impl AggregateFunction {
    pub fn name(self) -> &'static str {
        match self {
            Self::Count => "count",
            Self::Sum => "sum",
            Self::Min => "min",
            Self::Max => "max",
            Self::Avg => "avg",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Literal<'a> {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Text(&'a str),
}

/// A resolved, table-qualified column reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnRef<'a> {
    pub table: &'a str,
    pub column: &'a str,
}

/// An embedded logical plan with its ordered correlated-parameter bindings.
///
/// Each `(ParameterId, outer_expr)` pair binds every occurrence of that
/// parameter inside `plan` to `outer_expr` evaluated against the enclosing
/// query's tuple.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubqueryExpr<'a> {
    pub plan: &'a LqpNode<'a>,
    pub parameters: &'a [(ParameterId, &'a Expr<'a>)],
}

impl<'a> SubqueryExpr<'a> {
    pub fn is_correlated(&self) -> bool {
        !self.parameters.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Expr<'a> {
    Column(ColumnRef<'a>),
    Literal(Literal<'a>),
    CorrelatedParameter(ParameterId),
    Comparison {
        op: PredicateCondition,
        left: &'a Expr<'a>,
        right: &'a Expr<'a>,
    },
    Logical {
        op: LogicalOp,
        left: &'a Expr<'a>,
        right: &'a Expr<'a>,
    },
    /// `value (NOT) IN set`; `set` is either a `Subquery` or a `List`.
    In {
        value: &'a Expr<'a>,
        set: &'a Expr<'a>,
        negated: bool,
    },
    /// `(NOT) EXISTS subquery`; the operand must be a `Subquery`.
    Exists {
        subquery: &'a Expr<'a>,
        negated: bool,
    },
    Subquery(SubqueryExpr<'a>),
    List(&'a [&'a Expr<'a>]),
    /// An aggregate call; `None` argument encodes `count(*)`.
    Aggregate {
        function: AggregateFunction,
        argument: Option<&'a Expr<'a>>,
    },
}

impl<'a> Expr<'a> {
    /// The name this expression gets when an alias list must cover it.
    pub fn as_column_name(&self) -> String {
        match *self {
            Expr::Column(column) => format!("{}.{}", column.table, column.column),
            Expr::Literal(Literal::Null) => "NULL".to_owned(),
            Expr::Literal(Literal::Boolean(value)) => value.to_string(),
            Expr::Literal(Literal::Integer(value)) => value.to_string(),
            Expr::Literal(Literal::Float(value)) => value.to_string(),
            Expr::Literal(Literal::Text(value)) => format!("'{}'", value),
            Expr::CorrelatedParameter(ParameterId(id)) => format!("${}", id),
            Expr::Comparison { op, left, right } => format!(
                "{} {} {}",
                left.as_column_name(),
                op.symbol(),
                right.as_column_name()
            ),
            Expr::Logical { op, left, right } => format!(
                "{} {} {}",
                left.as_column_name(),
                match op {
                    LogicalOp::And => "AND",
                    LogicalOp::Or => "OR",
                },
                right.as_column_name()
            ),
            Expr::In { value, negated, .. } => format!(
                "{}{} IN (...)",
                value.as_column_name(),
                if negated { " NOT" } else { "" }
            ),
            Expr::Exists { negated, .. } => {
                if negated {
                    "NOT EXISTS (...)".to_owned()
                } else {
                    "EXISTS (...)".to_owned()
                }
            }
            Expr::Subquery(_) => "(subquery)".to_owned(),
            Expr::List(_) => "(...)".to_owned(),
            Expr::Aggregate { function, argument } => match argument {
                Some(argument) => format!("{}({})", function.name(), argument.as_column_name()),
                None => format!("{}(*)", function.name()),
            },
        }
    }
}

/// Controls descent during [`visit_expr`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExprVisit {
    VisitOperands,
    SkipOperands,
}

/// Pre-order walk over an expression tree.
///
/// The callback decides per node whether its operands are visited. The
/// operands of a `Subquery` are its parameter bindings; the embedded plan's
/// interior is never entered.
pub fn visit_expr<'a, F>(expr: &'a Expr<'a>, f: &mut F)
where
    F: FnMut(&'a Expr<'a>) -> ExprVisit,
{
    if f(expr) == ExprVisit::SkipOperands {
        return;
    }

    match *expr {
        Expr::Column(_) | Expr::Literal(_) | Expr::CorrelatedParameter(_) => {}
        Expr::Comparison { left, right, .. } | Expr::Logical { left, right, .. } => {
            visit_expr(left, f);
            visit_expr(right, f);
        }
        Expr::In { value, set, .. } => {
            visit_expr(value, f);
            visit_expr(set, f);
        }
        Expr::Exists { subquery, .. } => visit_expr(subquery, f),
        Expr::Subquery(subquery) => {
            for &(_, outer) in subquery.parameters {
                visit_expr(outer, f);
            }
        }
        Expr::List(elements) => {
            for element in elements {
                visit_expr(element, f);
            }
        }
        Expr::Aggregate { argument, .. } => {
            if let Some(argument) = argument {
                visit_expr(argument, f);
            }
        }
    }
}
