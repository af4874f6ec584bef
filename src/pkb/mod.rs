//! # Program Knowledge Base
//!
//! The PKB is the parser's write target and the query planner's read
//! target. It holds two layers of the same facts: fast typed indices
//! (`HashMap`/`HashSet`) built up during parsing and extraction, and the
//! [`Table`](crate::table::Table) views the query planner actually joins
//! against. Keeping both means the extractor's graph algorithms run over
//! plain Rust collections while the planner still only ever sees the
//! string-typed row/column model §4.1 describes.

use crate::error::InvariantViolation;
use crate::graph::Graph;
use crate::simple::ast::StmtKind;
use crate::table::Table;
use std::collections::{BTreeMap, BTreeSet, HashMap};

#[derive(Debug, Clone)]
pub struct Pkb {
    pub statement_count: u32,
    pub procedures: Vec<String>,
    pub variables: BTreeSet<String>,
    pub constants: BTreeSet<String>,

    pub stmt_kind: HashMap<u32, StmtKind>,
    pub stmt_proc: HashMap<u32, String>,
    pub call_target: HashMap<u32, String>,
    pub read_var: HashMap<u32, String>,
    pub print_var: HashMap<u32, String>,
    pub assign_lhs: HashMap<u32, String>,
    pub assign_rhs_postfix: HashMap<u32, String>,

    pub follows: Table,
    pub follows_t: Table,
    pub parent: Table,
    pub parent_t: Table,
    pub calls: Table,
    pub calls_t: Table,
    pub uses_s: Table,
    pub uses_p: Table,
    pub modifies_s: Table,
    pub modifies_p: Table,
    pub pattern_assign: Table,
    pub pattern_if: Table,
    pub pattern_while: Table,
    pub next: Table,
    pub next_t: Table,
    pub affects: Table,
    pub affects_t: Table,

    /// Intra-procedural control-flow graph over dense statement ids
    /// `1..=statement_count`. The source of truth for `Next`/`Next*`;
    /// the `next`/`next_t` tables above are materialized views of it.
    pub cfg: Graph,
}

fn pair_table(left: &str, right: &str) -> Table {
    Table::new(vec![left.to_string(), right.to_string()]).expect("two-column header is valid")
}

impl Pkb {
    pub fn new(statement_count: u32) -> Self {
        Pkb {
            statement_count,
            procedures: Vec::new(),
            variables: BTreeSet::new(),
            constants: BTreeSet::new(),
            stmt_kind: HashMap::new(),
            stmt_proc: HashMap::new(),
            call_target: HashMap::new(),
            read_var: HashMap::new(),
            print_var: HashMap::new(),
            assign_lhs: HashMap::new(),
            assign_rhs_postfix: HashMap::new(),
            cfg: Graph::new(statement_count as usize),
            follows: pair_table("s1", "s2"),
            follows_t: pair_table("s1", "s2"),
            parent: pair_table("s1", "s2"),
            parent_t: pair_table("s1", "s2"),
            calls: pair_table("p1", "p2"),
            calls_t: pair_table("p1", "p2"),
            uses_s: pair_table("s", "v"),
            uses_p: pair_table("p", "v"),
            modifies_s: pair_table("s", "v"),
            modifies_p: pair_table("p", "v"),
            pattern_assign: Table::new(vec!["s".into(), "lhs".into(), "rhs".into()])
                .expect("three-column header is valid"),
            pattern_if: pair_table("s", "v"),
            pattern_while: pair_table("s", "v"),
            next: pair_table("s1", "s2"),
            next_t: pair_table("s1", "s2"),
            affects: pair_table("s1", "s2"),
            affects_t: pair_table("s1", "s2"),
        }
    }

    pub fn kind_of(&self, stmt: u32) -> Option<StmtKind> {
        self.stmt_kind.get(&stmt).copied()
    }

    /// Record a direct `Follows(a, b)` fact. `Follows` only ever relates a
    /// statement to one that comes textually after it in the same
    /// statement list, so `a < b` is required.
    pub fn add_follows(&mut self, a: u32, b: u32) -> Result<(), InvariantViolation> {
        if a >= b {
            return Err(InvariantViolation(format!(
                "Follows({a}, {b}) requires {a} < {b}"
            )));
        }
        let _ = self.follows.insert(vec![a.to_string(), b.to_string()]);
        Ok(())
    }

    /// Record a direct `Parent(a, b)` fact. A container statement's id is
    /// always assigned before any of its body's, so `a < b` is required.
    pub fn add_parent(&mut self, a: u32, b: u32) -> Result<(), InvariantViolation> {
        if a >= b {
            return Err(InvariantViolation(format!(
                "Parent({a}, {b}) requires {a} < {b}"
            )));
        }
        let _ = self.parent.insert(vec![a.to_string(), b.to_string()]);
        Ok(())
    }

    pub fn stmts_of_kind(&self, kind: StmtKind) -> Vec<u32> {
        let mut out: Vec<u32> = self
            .stmt_kind
            .iter()
            .filter(|(_, k)| **k == kind)
            .map(|(s, _)| *s)
            .collect();
        out.sort_unstable();
        out
    }

    pub fn all_statements(&self) -> Vec<u32> {
        (1..=self.statement_count).collect()
    }

    /// `Next`/`Next*` materialized directly from the CFG. Cheap enough to
    /// recompute on demand rather than keep perfectly in sync by hand.
    pub fn materialize_next(&mut self) {
        self.next = pair_table("s1", "s2");
        for (i, j) in self.cfg.edges() {
            let _ = self
                .next
                .insert(vec![i.to_string(), j.to_string()]);
        }
        let closure = self.cfg.transitive_closure();
        self.next_t = pair_table("s1", "s2");
        for (i, j) in closure.edges() {
            let _ = self
                .next_t
                .insert(vec![i.to_string(), j.to_string()]);
        }
    }

    /// Procedure call graph as a plain adjacency map, built from `calls`,
    /// used by the extractor for cycle detection and topological ordering.
    pub fn calls_adjacency(&self) -> BTreeMap<String, Vec<String>> {
        let mut adj: BTreeMap<String, Vec<String>> =
            self.procedures.iter().map(|p| (p.clone(), Vec::new())).collect();
        for row in self.calls.rows() {
            adj.entry(row[0].clone()).or_default().push(row[1].clone());
        }
        adj
    }
}
