//! End-to-end scenarios straight out of the analyzer's design document,
//! run through the public `Analyzer` facade rather than any internal API.

use simple_spa::analyzer::Analyzer;
use simple_spa::error::{DesignError, SpaError};
use simple_spa::planner::QueryResult;
use simple_spa::token::TokenizerOptions;

fn build(source: &str) -> Analyzer {
    Analyzer::build(source, TokenizerOptions::default()).expect("pipeline should succeed")
}

fn rows(result: QueryResult) -> Vec<Vec<String>> {
    match result {
        QueryResult::Rows { rows, .. } => rows,
        QueryResult::Boolean(_) => panic!("expected a row result"),
    }
}

#[test]
fn parent_star_chain_of_nested_whiles() {
    let analyzer = build(
        "procedure p { while (x==0) { while (y==0) { while (z==0) { a = 1; } } } }",
    );
    let result = analyzer
        .query("stmt s1, s2; Select <s1, s2> such that Parent*(s1, s2)")
        .unwrap();
    let pairs = rows(result);
    assert_eq!(pairs.len(), 6);
    let expected = [
        ("1", "2"),
        ("1", "3"),
        ("1", "4"),
        ("2", "3"),
        ("2", "4"),
        ("3", "4"),
    ];
    for (a, b) in expected {
        assert!(pairs.iter().any(|r| r == &[a.to_string(), b.to_string()]));
    }
}

#[test]
fn follows_star_chain_of_assigns() {
    let analyzer = build("procedure p { a=1; b=2; c=3; d=4; }");
    let result = analyzer
        .query("stmt s1, s2; Select <s1, s2> such that Follows*(s1, s2)")
        .unwrap();
    assert_eq!(rows(result).len(), 6);
}

#[test]
fn indirect_uses_p_through_calls_chain() {
    let analyzer = build(
        "procedure p1 { call p2; } procedure p2 { call p3; } procedure p3 { print x; }",
    );

    let uses_x = analyzer
        .query(r#"procedure p; Select p such that Uses(p, "x")"#)
        .unwrap();
    let names: Vec<String> = rows(uses_x).into_iter().map(|r| r[0].clone()).collect();
    assert_eq!(names.len(), 3);
    for proc in ["p1", "p2", "p3"] {
        assert!(names.contains(&proc.to_string()));
    }
}

#[test]
fn container_modifies_propagation_with_call_inside() {
    let analyzer = build(
        "procedure p1 { while (c==0) { call p2; } } procedure p2 { x = 5; read y; }",
    );
    let modifies_x = analyzer
        .query(r#"stmt s; Select s such that Modifies(s, "x")"#)
        .unwrap();
    let stmts: Vec<String> = rows(modifies_x).into_iter().map(|r| r[0].clone()).collect();
    for expected in ["1", "2", "3"] {
        assert!(stmts.contains(&expected.to_string()), "missing stmt {expected} modifying x");
    }

    let modifies_y = analyzer
        .query(r#"stmt s; Select s such that Modifies(s, "y")"#)
        .unwrap();
    let stmts: Vec<String> = rows(modifies_y).into_iter().map(|r| r[0].clone()).collect();
    for expected in ["1", "2", "4"] {
        assert!(stmts.contains(&expected.to_string()), "missing stmt {expected} modifying y");
    }

    let modifies_p_x = analyzer
        .query(r#"procedure p; Select p such that Modifies(p, "x")"#)
        .unwrap();
    let procs: Vec<String> = rows(modifies_p_x).into_iter().map(|r| r[0].clone()).collect();
    assert!(procs.contains(&"p1".to_string()));
    assert!(procs.contains(&"p2".to_string()));
}

#[test]
fn cyclic_calls_is_rejected_during_extraction() {
    let result = Analyzer::build(
        "procedure a { call b; } procedure b { call a; }",
        TokenizerOptions::default(),
    );
    match result {
        Err(SpaError::Design(DesignError::CyclicCalls(names))) => {
            assert!(names.contains(&"a".to_string()));
            assert!(names.contains(&"b".to_string()));
        }
        other => panic!("expected CyclicCalls, got {other:?}"),
    }
}

#[test]
fn query_round_trip_against_follows_star() {
    let analyzer = build("procedure p { a=1; b=2; c=3; d=4; }");
    let result = analyzer
        .query("assign a; Select a such that Follows*(1, a)")
        .unwrap();
    let mut values: Vec<String> = rows(result).into_iter().map(|r| r[0].clone()).collect();
    values.sort();
    assert_eq!(values, vec!["2".to_string(), "3".to_string(), "4".to_string()]);
}

#[test]
fn boolean_query_reports_true_and_false() {
    let analyzer = build("procedure p { a = 1; b = a + 1; }");
    assert_eq!(
        analyzer.query("Select BOOLEAN such that Follows(1, 2)").unwrap(),
        QueryResult::Boolean(true)
    );
    assert_eq!(
        analyzer.query("Select BOOLEAN such that Follows(2, 1)").unwrap(),
        QueryResult::Boolean(false)
    );
}

#[test]
fn with_clauses_are_explicitly_rejected() {
    let analyzer = build("procedure p { a = 1; }");
    let err = analyzer.query("assign a; Select a with a = 1").unwrap_err();
    assert!(err.to_string().contains("not supported"));
}
