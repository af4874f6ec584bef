//! Property-based tests for the universal invariants that must hold
//! regardless of which program or query produced a `Table`/`Graph`, plus a
//! couple of concrete checks for invariants that only make sense against a
//! built `Pkb` (the statement-kind partition and the Follows/Parent
//! ordering rule).

use proptest::prelude::*;
use simple_spa::analyzer::Analyzer;
use simple_spa::graph::Graph;
use simple_spa::table::Table;
use simple_spa::token::TokenizerOptions;

fn arb_edges(max_node: usize, max_edges: usize) -> impl Strategy<Value = Vec<(usize, usize)>> {
    prop::collection::vec((1..=max_node, 1..=max_node), 0..=max_edges)
}

proptest! {
    /// Warshall's algorithm applied twice yields the same edge set as
    /// applied once — a transitive closure is already transitively closed.
    #[test]
    fn transitive_closure_is_idempotent(edges in arb_edges(8, 20)) {
        let mut g = Graph::new(8);
        for (a, b) in &edges {
            let _ = g.insert(*a, *b);
        }
        let once = g.transitive_closure();
        let twice = once.transitive_closure();
        prop_assert_eq!(once.edges().len(), twice.edges().len());
        for (i, j) in once.edges() {
            prop_assert!(twice.get(i, j).unwrap());
        }
    }

    /// Every direct edge survives into the closure.
    #[test]
    fn transitive_closure_contains_every_direct_edge(edges in arb_edges(8, 20)) {
        let mut g = Graph::new(8);
        for (a, b) in &edges {
            let _ = g.insert(*a, *b);
        }
        let tc = g.transitive_closure();
        for (a, b) in &edges {
            prop_assert!(tc.get(*a, *b).unwrap());
        }
    }

    /// Two tables with disjoint column names have no shared key, so their
    /// natural join degrades to a cross product: the result has exactly
    /// `size(a) * size(b)` rows and `arity(a) + arity(b)` columns.
    #[test]
    fn natural_join_without_shared_columns_is_a_cross_product(
        left_values in prop::collection::hash_set("[a-z]{1,3}", 0..5),
        right_values in prop::collection::hash_set("[a-z]{1,3}", 0..5),
    ) {
        let mut left = Table::new(vec!["x".to_string()]).unwrap();
        for v in &left_values {
            left.insert(vec![v.clone()]).unwrap();
        }
        let mut right = Table::new(vec!["y".to_string()]).unwrap();
        for v in &right_values {
            right.insert(vec![v.clone()]).unwrap();
        }

        let joined = left.natural_join(&right).unwrap();
        prop_assert_eq!(joined.size(), left.size() * right.size());
        prop_assert_eq!(joined.header().arity(), 2);
    }

    /// Inserting the same row twice never changes a table's size: rows are
    /// a set, not a multiset.
    #[test]
    fn insert_is_idempotent(values in prop::collection::hash_set("[a-z]{1,4}", 1..8)) {
        let mut t = Table::new(vec!["v".to_string()]).unwrap();
        for v in &values {
            t.insert(vec![v.clone()]).unwrap();
        }
        let size_after_first_pass = t.size();
        for v in &values {
            t.insert(vec![v.clone()]).unwrap();
        }
        prop_assert_eq!(t.size(), size_after_first_pass);
        prop_assert_eq!(t.size(), values.len());
    }
}

#[test]
fn every_statement_belongs_to_exactly_one_kind_table() {
    let analyzer = Analyzer::build(
        r#"procedure p {
            read x;
            print x;
            call q;
            a = x + 1;
            while (x > 0) {
                x = x - 1;
            }
            if (x == 0) then {
                y = 1;
            } else {
                y = 2;
            }
        }
        procedure q {
            z = 1;
        }"#,
        TokenizerOptions::default(),
    )
    .unwrap();
    let pkb = analyzer.pkb();

    let mut covered = std::collections::HashSet::new();
    for kind in all_stmt_kinds() {
        for stmt in pkb.stmts_of_kind(kind) {
            assert!(covered.insert(stmt), "statement {stmt} appears under more than one kind");
        }
    }
    assert_eq!(covered.len(), pkb.statement_count as usize);
    for s in pkb.all_statements() {
        assert!(covered.contains(&s), "statement {s} was not covered by any kind");
    }
}

#[test]
fn follows_and_parent_only_ever_point_forward() {
    let analyzer = Analyzer::build(
        r#"procedure p {
            while (x > 0) {
                y = 1;
                z = 2;
            }
            a = 1;
        }"#,
        TokenizerOptions::default(),
    )
    .unwrap();
    let pkb = analyzer.pkb();

    for table in [&pkb.follows, &pkb.follows_t, &pkb.parent, &pkb.parent_t] {
        for row in table.rows() {
            let a: u32 = row[0].parse().unwrap();
            let b: u32 = row[1].parse().unwrap();
            assert!(a < b, "expected {a} < {b} in {row:?}");
        }
    }
}

fn all_stmt_kinds() -> [simple_spa::simple::ast::StmtKind; 6] {
    use simple_spa::simple::ast::StmtKind;
    [
        StmtKind::Read,
        StmtKind::Print,
        StmtKind::Call,
        StmtKind::Assign,
        StmtKind::While,
        StmtKind::If,
    ]
}
