//! Optimizer Benchmarks
//!
//! Measures subquery-to-join rule application over hand-built plans.
//!
//! ## Running Benchmarks
//!
//! ```bash
//! cargo bench --bench optimizer
//! ```

use bumpalo::Bump;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rejoin::expr::{ColumnRef, Expr, ParameterId, PredicateCondition, SubqueryExpr};
use rejoin::optimizer::rules::SubqueryToJoinRule;
use rejoin::optimizer::OptimizationRule;
use rejoin::plan::{LqpNode, PredicateNode, ProjectionNode, StoredTableNode};

fn build_correlated_in_plan(arena: &Bump) -> &LqpNode<'_> {
    let mut a_columns = bumpalo::collections::Vec::new_in(arena);
    let mut b_columns = bumpalo::collections::Vec::new_in(arena);
    for column in ["a", "b"] {
        a_columns.push(&*arena.alloc(Expr::Column(ColumnRef { table: "a", column })));
        b_columns.push(&*arena.alloc(Expr::Column(ColumnRef { table: "b", column })));
    }
    let a_a = a_columns[0];
    let a_b = a_columns[1];
    let b_a = b_columns[0];
    let b_b = b_columns[1];
    let a = &*arena.alloc(LqpNode::StoredTable(StoredTableNode {
        name: "a",
        column_exprs: a_columns.into_bump_slice(),
    }));
    let b = &*arena.alloc(LqpNode::StoredTable(StoredTableNode {
        name: "b",
        column_exprs: b_columns.into_bump_slice(),
    }));

    let correlated = arena.alloc(LqpNode::Predicate(PredicateNode {
        predicate: arena.alloc(Expr::Comparison {
            op: PredicateCondition::Equals,
            left: b_b,
            right: arena.alloc(Expr::CorrelatedParameter(ParameterId(0))),
        }),
        input: b,
    }));
    let subquery_plan = arena.alloc(LqpNode::Projection(ProjectionNode {
        expressions: arena.alloc_slice_copy(&[b_a]),
        input: correlated,
    }));
    arena.alloc(LqpNode::Predicate(PredicateNode {
        predicate: arena.alloc(Expr::In {
            value: a_a,
            set: arena.alloc(Expr::Subquery(SubqueryExpr {
                plan: subquery_plan,
                parameters: arena.alloc_slice_copy(&[(ParameterId(0), a_b)]),
            })),
            negated: false,
        }),
        input: a,
    }))
}

fn bench_correlated_in_rewrite(c: &mut Criterion) {
    c.bench_function("subquery_to_join/correlated_in", |bencher| {
        bencher.iter(|| {
            let arena = Bump::new();
            let plan = build_correlated_in_plan(&arena);
            let rewritten = SubqueryToJoinRule.apply(black_box(plan), &arena).unwrap();
            black_box(rewritten.is_some())
        });
    });
}

fn bench_decline_path(c: &mut Criterion) {
    c.bench_function("subquery_to_join/declined_not_in", |bencher| {
        bencher.iter(|| {
            let arena = Bump::new();
            let plan = build_correlated_in_plan(&arena);
            // Same shape negated: the rule declines without allocating.
            let LqpNode::Predicate(node) = plan else {
                unreachable!();
            };
            let Expr::In { value, set, .. } = *node.predicate else {
                unreachable!();
            };
            let negated = arena.alloc(LqpNode::Predicate(PredicateNode {
                predicate: arena.alloc(Expr::In {
                    value,
                    set,
                    negated: true,
                }),
                input: node.input,
            }));
            let rewritten = SubqueryToJoinRule.apply(black_box(negated), &arena).unwrap();
            black_box(rewritten.is_none())
        });
    });
}

criterion_group!(benches, bench_correlated_in_rewrite, bench_decline_path);
criterion_main!(benches);
