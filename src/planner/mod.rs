//! # Query Planner / Evaluator
//!
//! Groups a [`Query`]'s clauses by shared synonyms, materializes each
//! clause as a [`Table`] whose header names the synonyms it binds, joins
//! each connected group with a greedy least-estimated-cost order, and
//! projects the joined groups onto the result synonyms. A group's columns
//! are named after the synonyms they bind, so `Table::natural_join` (which
//! joins on matching non-empty column names, or falls back to a cross
//! product) is exactly the join primitive this needs — no separate
//! same-synonym detection logic is required.

use crate::error::{SpaError, TableError};
use crate::pkb::Pkb;
use crate::pql::ast::*;
use crate::table::Table;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryResult {
    Boolean(bool),
    Rows { columns: Vec<String>, rows: Vec<Vec<String>> },
}

fn matches_param(param: &Param, value: &str) -> bool {
    match param {
        Param::Wildcard | Param::Synonym(_) => true,
        Param::Integer(n) => value == n.to_string(),
        Param::QuotedName(name) => value == name,
    }
}

fn binds(param: &Param) -> Option<&str> {
    match param {
        Param::Synonym(name) => Some(name),
        _ => None,
    }
}

/// Filter+project a 2-column PKB relation table into a clause table whose
/// header contains only the positions bound by a synonym.
fn materialize_pair(base: &Table, left: &Param, right: &Param) -> Table {
    let mut header = Vec::new();
    if let Some(name) = binds(left) {
        header.push(name.to_string());
    }
    if let Some(name) = binds(right) {
        header.push(name.to_string());
    }
    if header.is_empty() {
        header.push(String::new());
    }
    let mut t = Table::new(header).expect("non-empty header");
    for row in base.rows() {
        if !matches_param(left, &row[0]) || !matches_param(right, &row[1]) {
            continue;
        }
        let mut out = Vec::new();
        if binds(left).is_some() {
            out.push(row[0].clone());
        }
        if binds(right).is_some() {
            out.push(row[1].clone());
        }
        if out.is_empty() {
            out.push(String::new());
        }
        let _ = t.insert(out);
    }
    t
}

fn contains_token_subsequence(haystack: &str, needle: &str) -> bool {
    let h: Vec<&str> = haystack.split_whitespace().collect();
    let n: Vec<&str> = needle.split_whitespace().collect();
    if n.is_empty() {
        return true;
    }
    if n.len() > h.len() {
        return false;
    }
    h.windows(n.len()).any(|w| w == n.as_slice())
}

fn materialize_rel(pkb: &Pkb, rel: &RelClause, decls: &HashMap<String, DesignEntity>) -> Table {
    let base = match rel.kind {
        RelKind::Follows => if rel.transitive { &pkb.follows_t } else { &pkb.follows },
        RelKind::Parent => if rel.transitive { &pkb.parent_t } else { &pkb.parent },
        RelKind::Calls => if rel.transitive { &pkb.calls_t } else { &pkb.calls },
        RelKind::Next => if rel.transitive { &pkb.next_t } else { &pkb.next },
        RelKind::Affects => if rel.transitive { &pkb.affects_t } else { &pkb.affects },
        RelKind::Uses => uses_table_for(pkb, &rel.left, decls),
        RelKind::Modifies => modifies_table_for(pkb, &rel.left, decls),
    };
    materialize_pair(base, &rel.left, &rel.right)
}

fn is_proc_sided(param: &Param, decls: &HashMap<String, DesignEntity>) -> bool {
    match param {
        Param::QuotedName(_) => true,
        Param::Synonym(name) => decls.get(name) == Some(&DesignEntity::Procedure),
        _ => false,
    }
}

fn uses_table_for<'a>(pkb: &'a Pkb, left: &Param, decls: &HashMap<String, DesignEntity>) -> &'a Table {
    if is_proc_sided(left, decls) {
        &pkb.uses_p
    } else {
        &pkb.uses_s
    }
}

fn modifies_table_for<'a>(
    pkb: &'a Pkb,
    left: &Param,
    decls: &HashMap<String, DesignEntity>,
) -> &'a Table {
    if is_proc_sided(left, decls) {
        &pkb.modifies_p
    } else {
        &pkb.modifies_s
    }
}

fn materialize_pattern(pkb: &Pkb, p: &PatternClause) -> Table {
    match p.entity_kind {
        DesignEntity::Assign => {
            let mut header = vec![p.synonym.clone()];
            if let Some(name) = binds(&p.lhs) {
                header.push(name.to_string());
            }
            let mut t = Table::new(header).expect("non-empty header");
            for row in pkb.pattern_assign.rows() {
                if !matches_param(&p.lhs, &row[1]) {
                    continue;
                }
                let keep = match p.expr.as_ref().unwrap_or(&ExprSpec::Any) {
                    ExprSpec::Any => true,
                    ExprSpec::Exact(postfix) => &row[2] == postfix,
                    ExprSpec::Sub(postfix) => contains_token_subsequence(&row[2], postfix),
                };
                if !keep {
                    continue;
                }
                let mut out = vec![row[0].clone()];
                if binds(&p.lhs).is_some() {
                    out.push(row[1].clone());
                }
                let _ = t.insert(out);
            }
            t
        }
        DesignEntity::If | DesignEntity::While => {
            let source = if p.entity_kind == DesignEntity::If {
                &pkb.pattern_if
            } else {
                &pkb.pattern_while
            };
            let mut header = vec![p.synonym.clone()];
            if let Some(name) = binds(&p.lhs) {
                header.push(name.to_string());
            }
            let mut t = Table::new(header).expect("non-empty header");
            for row in source.rows() {
                if !matches_param(&p.lhs, &row[1]) {
                    continue;
                }
                let mut out = vec![row[0].clone()];
                if binds(&p.lhs).is_some() {
                    out.push(row[1].clone());
                }
                let _ = t.insert(out);
            }
            t
        }
        _ => unreachable!("pattern synonym kind was checked while parsing"),
    }
}

fn clause_synonyms(table: &Table) -> HashSet<String> {
    table
        .header()
        .names()
        .iter()
        .filter(|n| !n.is_empty())
        .cloned()
        .collect()
}

/// Repeatedly join the pair of tables with the smallest estimated cost —
/// product of sizes for a cross product, sizes scaled by shared-column
/// width otherwise — until one table remains.
fn join_group(mut tables: Vec<Table>) -> Result<Table, TableError> {
    while tables.len() > 1 {
        let mut best = (0usize, 1usize, usize::MAX);
        for i in 0..tables.len() {
            for j in (i + 1)..tables.len() {
                let shared = clause_synonyms(&tables[i])
                    .intersection(&clause_synonyms(&tables[j]))
                    .count();
                let cost = if shared == 0 {
                    tables[i].size().saturating_mul(tables[j].size())
                } else {
                    (tables[i].size() + tables[j].size()) * shared
                };
                if cost < best.2 {
                    best = (i, j, cost);
                }
            }
        }
        let (i, j, _) = best;
        let joined = tables[i].natural_join(&tables[j])?;
        tables.remove(j);
        tables[i] = joined;
    }
    Ok(tables.into_iter().next().unwrap_or_else(Table::single_anonymous))
}

fn universe_for(pkb: &Pkb, kind: DesignEntity) -> Vec<String> {
    use crate::simple::ast::StmtKind;
    match kind {
        DesignEntity::Stmt | DesignEntity::ProgLine => {
            pkb.all_statements().iter().map(u32::to_string).collect()
        }
        DesignEntity::Read => pkb.stmts_of_kind(StmtKind::Read).iter().map(u32::to_string).collect(),
        DesignEntity::Print => pkb.stmts_of_kind(StmtKind::Print).iter().map(u32::to_string).collect(),
        DesignEntity::Call => pkb.stmts_of_kind(StmtKind::Call).iter().map(u32::to_string).collect(),
        DesignEntity::While => pkb.stmts_of_kind(StmtKind::While).iter().map(u32::to_string).collect(),
        DesignEntity::If => pkb.stmts_of_kind(StmtKind::If).iter().map(u32::to_string).collect(),
        DesignEntity::Assign => pkb.stmts_of_kind(StmtKind::Assign).iter().map(u32::to_string).collect(),
        DesignEntity::Variable => pkb.variables.iter().cloned().collect(),
        DesignEntity::Constant => pkb.constants.iter().cloned().collect(),
        DesignEntity::Procedure => pkb.procedures.clone(),
    }
}

struct MaterializedClause {
    synonyms: HashSet<String>,
    table: Table,
}

fn materialize_all(pkb: &Pkb, query: &Query) -> Vec<MaterializedClause> {
    query
        .clauses
        .iter()
        .map(|clause| {
            let table = match clause {
                Clause::SuchThat(rel) => materialize_rel(pkb, rel, &query.declarations),
                Clause::Pattern(p) => materialize_pattern(pkb, p),
            };
            MaterializedClause { synonyms: clause_synonyms(&table), table }
        })
        .collect()
}

/// Partition materialized clauses into connected components by shared
/// synonym. Clauses with no synonym at all form their own singleton group.
fn group_by_synonym(clauses: Vec<MaterializedClause>) -> Vec<Vec<Table>> {
    let mut groups: Vec<(HashSet<String>, Vec<Table>)> = Vec::new();
    for mc in clauses {
        if mc.synonyms.is_empty() {
            groups.push((HashSet::new(), vec![mc.table]));
            continue;
        }
        let mut merged_into: Option<usize> = None;
        for (idx, (syns, _)) in groups.iter().enumerate() {
            if !syns.is_empty() && !syns.is_disjoint(&mc.synonyms) {
                merged_into = Some(idx);
                break;
            }
        }
        match merged_into {
            Some(idx) => {
                groups[idx].0.extend(mc.synonyms);
                groups[idx].1.push(mc.table);
            }
            None => groups.push((mc.synonyms, vec![mc.table])),
        }
    }

    // A second pass to merge any groups that became connected transitively
    // through a later clause (e.g. clause A binds {x,y}, clause B binds
    // {y,z} processed after a clause that already merged x elsewhere).
    let mut merged = true;
    while merged {
        merged = false;
        'outer: for i in 0..groups.len() {
            for j in (i + 1)..groups.len() {
                if !groups[i].0.is_empty()
                    && !groups[j].0.is_empty()
                    && !groups[i].0.is_disjoint(&groups[j].0)
                {
                    let (syns_j, tables_j) = groups.remove(j);
                    groups[i].0.extend(syns_j);
                    groups[i].1.extend(tables_j);
                    merged = true;
                    break 'outer;
                }
            }
        }
    }

    groups.into_iter().map(|(_, tables)| tables).collect()
}

pub fn evaluate(pkb: &Pkb, query: &Query) -> Result<QueryResult, SpaError> {
    let materialized = materialize_all(pkb, query);
    let groups = group_by_synonym(materialized);

    let mut joined_groups = Vec::with_capacity(groups.len());
    for group in groups {
        joined_groups.push(join_group(group)?);
    }

    if joined_groups.iter().any(Table::is_empty) {
        return Ok(match &query.result {
            ResultSpec::Boolean => QueryResult::Boolean(false),
            ResultSpec::Tuple(names) => QueryResult::Rows { columns: names.clone(), rows: Vec::new() },
        });
    }

    match &query.result {
        ResultSpec::Boolean => Ok(QueryResult::Boolean(true)),
        ResultSpec::Tuple(names) => {
            // Names sharing a group must be projected together, in one pass,
            // so their correlation within that group's joined rows survives;
            // only names from different groups (or with no clause at all)
            // are independent and may be combined with a cross product.
            let mut clusters: Vec<(Option<usize>, Vec<String>)> = Vec::new();
            for name in names {
                let group_idx = joined_groups
                    .iter()
                    .position(|t| t.header().names().iter().any(|n| n == name));
                match clusters.iter_mut().find(|(g, _)| *g == group_idx && g.is_some()) {
                    Some((_, members)) => members.push(name.clone()),
                    None => clusters.push((group_idx, vec![name.clone()])),
                }
            }

            let mut per_cluster_tables = Vec::with_capacity(clusters.len());
            for (group_idx, members) in &clusters {
                let table = match group_idx {
                    Some(idx) => {
                        let t = &joined_groups[*idx];
                        let indices: Vec<usize> = members
                            .iter()
                            .map(|name| t.header().index_of(name).expect("just matched by name"))
                            .collect();
                        t.columns(&indices)?
                    }
                    None => {
                        let name = &members[0];
                        let kind = query.declarations[name];
                        let mut single = Table::new(vec![name.clone()])?;
                        for value in universe_for(pkb, kind) {
                            single.insert(vec![value])?;
                        }
                        single
                    }
                };
                per_cluster_tables.push(table);
            }

            let mut answer = per_cluster_tables
                .first()
                .cloned()
                .unwrap_or_else(Table::single_anonymous);
            for t in per_cluster_tables.iter().skip(1) {
                answer = answer.cross_join(t)?;
            }

            // Re-order columns to match the Select list, since clustering
            // may have interleaved group order with declaration order.
            let indices: Vec<usize> = names
                .iter()
                .map(|name| answer.header().index_of(name).expect("every name was projected"))
                .collect();
            let answer = answer.columns(&indices)?;

            let rows: Vec<Vec<String>> = answer.rows().cloned().collect();
            Ok(QueryResult::Rows { columns: names.clone(), rows })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::extract;
    use crate::pql::parse_query;
    use crate::simple::parse_program;
    use crate::token::TokenizerOptions;
    use std::collections::HashSet as StdHashSet;

    fn build_pkb(source: &str) -> Pkb {
        let mut pkb = parse_program(source, TokenizerOptions::default()).unwrap();
        extract(&mut pkb).unwrap();
        pkb
    }

    fn rows_set(result: &QueryResult) -> StdHashSet<String> {
        match result {
            QueryResult::Rows { rows, .. } => {
                rows.iter().map(|r| r.join(",")).collect()
            }
            QueryResult::Boolean(_) => panic!("expected a row result"),
        }
    }

    #[test]
    fn follows_star_filtered_by_constant_binds_the_other_side() {
        let pkb = build_pkb(
            r#"procedure p {
                a = 1;
                b = 2;
                c = 3;
                d = 4;
            }"#,
        );
        let query = parse_query("assign a; Select a such that Follows*(1, a)").unwrap();
        let result = evaluate(&pkb, &query).unwrap();
        assert_eq!(
            rows_set(&result),
            ["2", "3", "4"].iter().map(|s| s.to_string()).collect()
        );
    }

    #[test]
    fn boolean_query_short_circuits_on_empty_group() {
        let pkb = build_pkb("procedure p { a = 1; }");
        let query = parse_query("Select BOOLEAN such that Follows(1, 2)").unwrap();
        assert_eq!(evaluate(&pkb, &query).unwrap(), QueryResult::Boolean(false));

        let query_true = parse_query("assign a; Select BOOLEAN such that Follows*(_, a)").unwrap();
        assert_eq!(evaluate(&pkb, &query_true).unwrap(), QueryResult::Boolean(false));
    }

    #[test]
    fn pattern_assign_exact_match_binds_synonym() {
        let pkb = build_pkb(
            r#"procedure p {
                x = y + 1;
                z = y;
            }"#,
        );
        let query = parse_query(r#"assign a; Select a pattern a(_, "y + 1")"#).unwrap();
        let result = evaluate(&pkb, &query).unwrap();
        assert_eq!(rows_set(&result), ["1"].iter().map(|s| s.to_string()).collect());
    }

    #[test]
    fn synonym_never_used_in_a_clause_returns_full_universe() {
        let pkb = build_pkb(
            r#"procedure p {
                a = 1;
                read b;
            }"#,
        );
        let query = parse_query("variable v; Select v").unwrap();
        let result = evaluate(&pkb, &query).unwrap();
        assert_eq!(
            rows_set(&result),
            ["a", "b"].iter().map(|s| s.to_string()).collect()
        );
    }

    #[test]
    fn joins_two_clauses_sharing_a_synonym() {
        let pkb = build_pkb(
            r#"procedure p {
                while (x > 0) {
                    y = x;
                }
            }"#,
        );
        let query = parse_query(
            "assign a; while w; Select a such that Parent(w, a) pattern a(\"y\", _)",
        )
        .unwrap();
        let result = evaluate(&pkb, &query).unwrap();
        assert_eq!(rows_set(&result), ["2"].iter().map(|s| s.to_string()).collect());
    }
}
