//! # Design Extractor
//!
//! Runs once, after the parser has finished and handed over a PKB of direct
//! facts. Nine ordered phases, each reading and writing through the PKB:
//! `Parent*`/`Follows*` closures, container propagation of `Uses`/`Modifies`,
//! call-graph validation, `Calls*`, call-chain propagation of `UsesP`/
//! `ModifiesP`, call-statement `Uses`/`Modifies` (plus a second container
//! propagation pass), `Next*`, `Affects`, and `Affects*`.
//!
//! Every derived fact is inserted through the normal
//! [`Table::insert`](crate::table::Table::insert) / `concatenate`, so set
//! semantics eliminate duplicates for free; no phase needs to check whether
//! a fact already exists before adding it.

use crate::error::DesignError;
use crate::graph::Graph;
use crate::pkb::Pkb;
use crate::simple::ast::StmtKind;
use crate::table::Table;
use std::collections::{HashMap, HashSet};
use tracing::debug;

const STMT_KINDS: [StmtKind; 6] = [
    StmtKind::Assign,
    StmtKind::Read,
    StmtKind::Print,
    StmtKind::Call,
    StmtKind::If,
    StmtKind::While,
];

pub fn extract(pkb: &mut Pkb) -> Result<(), DesignError> {
    for kind in STMT_KINDS {
        debug!(kind = kind.as_str(), count = pkb.stmts_of_kind(kind).len(), "statement tally");
    }

    closures_phase(pkb);
    debug!(
        follows_t = pkb.follows_t.size(),
        parent_t = pkb.parent_t.size(),
        "closures_phase complete"
    );
    propagate_container_facts(pkb);
    let (proc_graph, proc_index) = validate_call_graph(pkb)?;
    calls_closure(pkb, &proc_graph, &proc_index);
    propagate_call_chains(pkb, &proc_graph, &proc_index);
    propagate_call_statement_facts(pkb);
    propagate_container_facts(pkb);
    pkb.materialize_next();
    compute_affects(pkb);
    affects_closure(pkb);
    debug!(affects = pkb.affects.size(), affects_t = pkb.affects_t.size(), "affects_closure complete");
    Ok(())
}

fn stmt_graph_from_table(pkb: &Pkb, table: &Table) -> Graph {
    let mut g = Graph::new(pkb.statement_count as usize);
    for row in table.rows() {
        let i: usize = row[0].parse().expect("statement ids are numeric");
        let j: usize = row[1].parse().expect("statement ids are numeric");
        g.insert(i, j).expect("statement ids are within range");
    }
    g
}

fn graph_to_stmt_table(g: &Graph, header: [&str; 2]) -> Table {
    let mut t = Table::new(vec![header[0].to_string(), header[1].to_string()])
        .expect("two-column header is valid");
    for (i, j) in g.edges() {
        let _ = t.insert(vec![i.to_string(), j.to_string()]);
    }
    t
}

/// `a < b` for every direct `Follows`/`Parent` edge is enforced once, at
/// insertion time, by `Pkb::add_follows`/`add_parent`; transitive closure
/// of an already-ordered graph can't introduce a back edge, so the `_t`
/// tables built here need no re-check.
fn closures_phase(pkb: &mut Pkb) {
    let follows_graph = stmt_graph_from_table(pkb, &pkb.follows);
    pkb.follows_t = graph_to_stmt_table(&follows_graph.transitive_closure(), ["s1", "s2"]);

    let parent_graph = stmt_graph_from_table(pkb, &pkb.parent);
    pkb.parent_t = graph_to_stmt_table(&parent_graph.transitive_closure(), ["s1", "s2"]);
}

/// `direct` has header `[s, v]`; `ancestor_t` has header `[s1, s2]` mapping
/// ancestor -> descendant. Returns `direct` unioned with every `(ancestor, v)`
/// reachable from a descendant already in `direct`.
fn propagate_through_containers(direct: &Table, ancestor_t: &Table) -> Table {
    let Ok(joined) = ancestor_t.inner_join(direct, &[(1, 0)]) else {
        return direct.clone();
    };
    let Ok(dropped) = joined.drop_column(1) else {
        return direct.clone();
    };
    let Ok(renamed) = dropped.renamed(vec!["s".to_string(), "v".to_string()]) else {
        return direct.clone();
    };
    direct.concatenate(&renamed).unwrap_or_else(|_| direct.clone())
}

fn propagate_container_facts(pkb: &mut Pkb) {
    pkb.uses_s = propagate_through_containers(&pkb.uses_s, &pkb.parent_t);
    pkb.modifies_s = propagate_through_containers(&pkb.modifies_s, &pkb.parent_t);
}

fn validate_call_graph(pkb: &Pkb) -> Result<(Graph, HashMap<String, usize>), DesignError> {
    let proc_index: HashMap<String, usize> = pkb
        .procedures
        .iter()
        .enumerate()
        .map(|(i, name)| (name.clone(), i + 1))
        .collect();

    let mut g = Graph::new(pkb.procedures.len());
    for row in pkb.calls.rows() {
        let (Some(&i), Some(&j)) = (proc_index.get(&row[0]), proc_index.get(&row[1])) else {
            continue;
        };
        let _ = g.insert(i, j);
    }

    let order = g.topological_order();
    if order.len() < pkb.procedures.len() {
        let on_a_cycle: HashSet<usize> = (1..=pkb.procedures.len())
            .filter(|i| !order.contains(i))
            .collect();
        let mut names: Vec<String> = proc_index
            .iter()
            .filter(|(_, id)| on_a_cycle.contains(id))
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        return Err(DesignError::CyclicCalls(names));
    }

    for (&stmt, callee) in &pkb.call_target {
        if !pkb.procedures.contains(callee) {
            return Err(DesignError::UndeclaredProcedure(callee.clone(), stmt));
        }
    }

    Ok((g, proc_index))
}

fn calls_closure(pkb: &mut Pkb, proc_graph: &Graph, proc_index: &HashMap<String, usize>) {
    let id_to_name: HashMap<usize, String> =
        proc_index.iter().map(|(name, &id)| (id, name.clone())).collect();
    let closure = proc_graph.transitive_closure();
    let mut t = Table::new(vec!["p1".to_string(), "p2".to_string()])
        .expect("two-column header is valid");
    for (i, j) in closure.edges() {
        let _ = t.insert(vec![id_to_name[&i].clone(), id_to_name[&j].clone()]);
    }
    pkb.calls_t = t;
}

fn project_by_procedure(stmt_table: &Table, stmt_proc: &HashMap<u32, String>) -> Table {
    let mut t = Table::new(vec!["p".to_string(), "v".to_string()])
        .expect("two-column header is valid");
    for row in stmt_table.rows() {
        if let Ok(stmt) = row[0].parse::<u32>() {
            if let Some(proc) = stmt_proc.get(&stmt) {
                let _ = t.insert(vec![proc.clone(), row[1].clone()]);
            }
        }
    }
    t
}

fn propagate_call_chains(pkb: &mut Pkb, proc_graph: &Graph, proc_index: &HashMap<String, usize>) {
    let uses_direct = project_by_procedure(&pkb.uses_s, &pkb.stmt_proc);
    let modifies_direct = project_by_procedure(&pkb.modifies_s, &pkb.stmt_proc);

    let mut uses_map: HashMap<String, HashSet<String>> = HashMap::new();
    for row in uses_direct.rows() {
        uses_map.entry(row[0].clone()).or_default().insert(row[1].clone());
    }
    let mut modifies_map: HashMap<String, HashSet<String>> = HashMap::new();
    for row in modifies_direct.rows() {
        modifies_map
            .entry(row[0].clone())
            .or_default()
            .insert(row[1].clone());
    }

    let id_to_name: HashMap<usize, String> =
        proc_index.iter().map(|(name, &id)| (id, name.clone())).collect();

    // Reverse topological order: callees fully resolved before their
    // callers, per the call-graph-not-call-closure propagation the source
    // implementation performs (documented in DESIGN.md).
    for &id in proc_graph.topological_order().iter().rev() {
        let caller = &id_to_name[&id];
        for callee_id in proc_graph.successors(id) {
            let callee = &id_to_name[&callee_id];
            if let Some(vars) = uses_map.get(callee).cloned() {
                uses_map.entry(caller.clone()).or_default().extend(vars);
            }
            if let Some(vars) = modifies_map.get(callee).cloned() {
                modifies_map.entry(caller.clone()).or_default().extend(vars);
            }
        }
    }

    pkb.uses_p = Table::new(vec!["p".to_string(), "v".to_string()]).unwrap();
    for (p, vars) in &uses_map {
        for v in vars {
            let _ = pkb.uses_p.insert(vec![p.clone(), v.clone()]);
        }
    }
    pkb.modifies_p = Table::new(vec!["p".to_string(), "v".to_string()]).unwrap();
    for (p, vars) in &modifies_map {
        for v in vars {
            let _ = pkb.modifies_p.insert(vec![p.clone(), v.clone()]);
        }
    }
}

fn propagate_call_statement_facts(pkb: &mut Pkb) {
    let call_target = pkb.call_target.clone();
    for (&stmt, callee) in &call_target {
        if let Ok(vars) = pkb.uses_p.filter_column_named("p", &[callee.clone()].into()) {
            for row in vars.rows() {
                let _ = pkb.uses_s.insert(vec![stmt.to_string(), row[1].clone()]);
            }
        }
        if let Ok(vars) = pkb
            .modifies_p
            .filter_column_named("p", &[callee.clone()].into())
        {
            for row in vars.rows() {
                let _ = pkb.modifies_s.insert(vec![stmt.to_string(), row[1].clone()]);
            }
        }
    }
}

/// All statements reachable from `a`'s CFG successors on which `v` is
/// neither reassigned nor killed before being recorded as an `Affects` use.
fn affects_from(a: u32, v: &str, pkb: &Pkb) -> Vec<u32> {
    let mut visited = HashSet::new();
    let mut result = Vec::new();
    let mut stack: Vec<u32> = pkb.cfg.successors(a as usize).map(|x| x as u32).collect();

    while let Some(n) = stack.pop() {
        if !visited.insert(n) {
            continue;
        }
        let mut killer = false;
        match pkb.stmt_kind.get(&n) {
            Some(StmtKind::Assign) => {
                if pkb.uses_s.contains(&vec![n.to_string(), v.to_string()]) {
                    result.push(n);
                }
                if pkb.assign_lhs.get(&n).map(String::as_str) == Some(v) {
                    killer = true;
                }
            }
            Some(StmtKind::Read) => {
                if pkb.read_var.get(&n).map(String::as_str) == Some(v) {
                    killer = true;
                }
            }
            Some(StmtKind::Call) => {
                if let Some(callee) = pkb.call_target.get(&n) {
                    if pkb
                        .modifies_p
                        .contains(&vec![callee.clone(), v.to_string()])
                    {
                        killer = true;
                    }
                }
            }
            _ => {}
        }
        if !killer {
            for succ in pkb.cfg.successors(n as usize) {
                stack.push(succ as u32);
            }
        }
    }
    result
}

fn compute_affects(pkb: &mut Pkb) {
    let mut t = Table::new(vec!["s1".to_string(), "s2".to_string()]).unwrap();
    for a in pkb.stmts_of_kind(StmtKind::Assign) {
        let Some(v) = pkb.assign_lhs.get(&a).cloned() else {
            continue;
        };
        for b in affects_from(a, &v, pkb) {
            let _ = t.insert(vec![a.to_string(), b.to_string()]);
        }
    }
    pkb.affects = t;
}

fn affects_closure(pkb: &mut Pkb) {
    let g = stmt_graph_from_table(pkb, &pkb.affects);
    pkb.affects_t = graph_to_stmt_table(&g.transitive_closure(), ["s1", "s2"]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simple::parser::parse_program;
    use crate::token::TokenizerOptions;

    fn build(src: &str) -> Pkb {
        let mut pkb = parse_program(src, TokenizerOptions::default()).unwrap();
        extract(&mut pkb).unwrap();
        pkb
    }

    #[test]
    fn parent_star_chain_of_whiles() {
        let pkb = build(
            "procedure p { while (x==0) { while (y==0) { while (z==0) { a = 1; } } } }",
        );
        assert_eq!(pkb.parent_t.size(), 6);
        for (i, j) in [(1, 2), (1, 3), (1, 4), (2, 3), (2, 4), (3, 4)] {
            assert!(pkb.parent_t.contains(&vec![i.to_string(), j.to_string()]));
        }
    }

    #[test]
    fn follows_star_chain_of_assigns() {
        let pkb = build("procedure p { a=1; b=2; c=3; d=4; }");
        assert_eq!(pkb.follows_t.size(), 6);
    }

    #[test]
    fn indirect_uses_p_through_calls_star() {
        let pkb = build(
            "procedure p1 { call p2; } procedure p2 { call p3; } procedure p3 { print x; }",
        );
        for p in ["p1", "p2", "p3"] {
            assert!(pkb.uses_p.contains(&vec![p.to_string(), "x".to_string()]));
        }
    }

    #[test]
    fn container_uses_propagation_with_call_inside() {
        let pkb = build(
            "procedure p1 { while (c==0) { call p2; } } procedure p2 { x = 5; read y; }",
        );
        let expected = [(1, "x"), (1, "y"), (2, "x"), (2, "y"), (3, "x"), (4, "y")];
        for (s, v) in expected {
            assert!(
                pkb.modifies_s.contains(&vec![s.to_string(), v.to_string()]),
                "missing ModifiesS({s},{v})"
            );
        }
        assert_eq!(pkb.modifies_s.size(), expected.len());
        assert!(pkb.modifies_p.contains(&vec!["p1".to_string(), "x".to_string()]));
        assert!(pkb.modifies_p.contains(&vec!["p1".to_string(), "y".to_string()]));
        assert!(pkb.modifies_p.contains(&vec!["p2".to_string(), "x".to_string()]));
        assert!(pkb.modifies_p.contains(&vec!["p2".to_string(), "y".to_string()]));
    }

    #[test]
    fn cyclic_calls_is_fatal() {
        let mut pkb =
            parse_program("procedure a { call b; } procedure b { call a; }", TokenizerOptions::default())
                .unwrap();
        let err = extract(&mut pkb).unwrap_err();
        assert!(matches!(err, DesignError::CyclicCalls(_)));
    }

    #[test]
    fn affects_on_spa_example_code_5() {
        // A 14-statement CFG with directly-injected facts, matching the
        // worked example ("Example Code 5") the Affects algorithm was
        // validated against: assign/while/if/call statements with a
        // disconnected (13, 14) tail and a call to a procedure ("third")
        // that modifies nothing, so it never acts as a killer.
        use crate::simple::ast::StmtKind::*;
        let mut pkb = Pkb::new(14);
        pkb.procedures = vec!["third".to_string()];

        for (s, kind) in [
            (1, Assign), (2, Assign), (3, While), (4, Assign), (5, Call), (6, Assign),
            (7, If), (8, Assign), (9, Assign), (10, Assign), (11, Assign), (12, Assign),
            (13, Assign), (14, Assign),
        ] {
            pkb.stmt_kind.insert(s, kind);
        }

        for (i, j) in [
            (1, 2), (2, 3), (3, 4), (4, 5), (5, 6), (6, 3), (3, 7), (7, 8), (7, 9), (8, 10),
            (9, 10), (10, 11), (11, 12), (13, 14),
        ] {
            pkb.cfg.insert(i, j).unwrap();
        }

        for (s, v) in [
            (4, "x"), (4, "y"), (6, "i"), (8, "x"), (10, "i"), (10, "x"), (10, "z"), (11, "z"),
            (12, "x"), (12, "y"), (12, "z"), (14, "z"),
        ] {
            let _ = pkb.uses_s.insert(vec![s.to_string(), v.to_string()]);
        }

        for (s, v) in [
            (1, "x"), (2, "i"), (4, "x"), (6, "i"), (8, "x"), (9, "z"), (10, "z"), (11, "y"),
            (12, "x"), (13, "z"), (14, "v"),
        ] {
            pkb.assign_lhs.insert(s, v.to_string());
            let _ = pkb.modifies_s.insert(vec![s.to_string(), v.to_string()]);
        }

        pkb.call_target.insert(5, "third".to_string());

        extract(&mut pkb).unwrap();

        let expected: &[(u32, u32)] = &[
            (1, 4), (1, 8), (1, 10), (1, 12), (2, 6), (2, 10), (4, 4), (4, 8), (4, 10), (4, 12),
            (6, 6), (6, 10), (8, 10), (8, 12), (9, 10), (10, 11), (10, 12), (11, 12), (13, 14),
        ];
        for &(a, b) in expected {
            assert!(
                pkb.affects.contains(&vec![a.to_string(), b.to_string()]),
                "missing Affects({a},{b})"
            );
        }
        assert_eq!(pkb.affects.size(), expected.len());
    }
}
