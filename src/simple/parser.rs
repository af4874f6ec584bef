//! Recursive-descent SIMPLE parser.
//!
//! Statement numbers are assigned in textual order as the parser walks the
//! token stream; there is no retained syntax tree. Each statement is
//! consumed once and immediately turned into PKB facts: `Follows` and
//! `Parent` from the list/container structure the recursion is already
//! walking, `Uses`/`Modifies` and pattern facts from the statement's own
//! shape, and CFG (`Next`) edges built up alongside `Parent` by tracking
//! each sub-list's entry statement and its "exit points" — the statements
//! after which control falls through to whatever follows the container.
//!
//! An `if`'s exit points are the union of both branches' exit points; a
//! `while`'s only exit point is its own header, since falling out of the
//! loop always passes back through the condition check.

use crate::error::ParseError;
use crate::pkb::Pkb;
use crate::simple::ast::StmtKind;
use crate::simple::cond::parse_cond;
use crate::simple::expr::parse_expr;
use crate::token::{Token, TokenKind, TokenizerOptions};
use std::collections::BTreeSet;

/// A parsed statement's own id plus the statement ids after which control
/// falls through to whatever textually follows it.
struct StmtNode {
    id: u32,
    exits: Vec<u32>,
}

/// A parsed statement list: the ids of its direct members (for `Parent`)
/// and the exit points of the list as a whole (its last member's exits).
struct StmtList {
    ids: Vec<u32>,
    exits: Vec<u32>,
}

struct Builder {
    next_stmt_no: u32,
    stmt_kind: Vec<(u32, StmtKind)>,
    stmt_proc: Vec<(u32, String)>,
    call_target: Vec<(u32, String)>,
    read_var: Vec<(u32, String)>,
    print_var: Vec<(u32, String)>,
    assign_lhs: Vec<(u32, String)>,
    assign_rhs: Vec<(u32, String)>,
    follows: Vec<(u32, u32)>,
    parent: Vec<(u32, u32)>,
    cfg_edges: Vec<(u32, u32)>,
    uses_s: Vec<(u32, String)>,
    modifies_s: Vec<(u32, String)>,
    pattern_assign: Vec<(u32, String, String)>,
    pattern_if: Vec<(u32, String)>,
    pattern_while: Vec<(u32, String)>,
    calls: Vec<(String, String)>,
    variables: BTreeSet<String>,
    constants: BTreeSet<String>,
    procedures: Vec<String>,
}

impl Builder {
    fn new() -> Self {
        Builder {
            next_stmt_no: 1,
            stmt_kind: Vec::new(),
            stmt_proc: Vec::new(),
            call_target: Vec::new(),
            read_var: Vec::new(),
            print_var: Vec::new(),
            assign_lhs: Vec::new(),
            assign_rhs: Vec::new(),
            follows: Vec::new(),
            parent: Vec::new(),
            cfg_edges: Vec::new(),
            uses_s: Vec::new(),
            modifies_s: Vec::new(),
            pattern_assign: Vec::new(),
            pattern_if: Vec::new(),
            pattern_while: Vec::new(),
            calls: Vec::new(),
            variables: BTreeSet::new(),
            constants: BTreeSet::new(),
            procedures: Vec::new(),
        }
    }

    fn fresh_id(&mut self, proc: &str, kind: StmtKind) -> u32 {
        let id = self.next_stmt_no;
        self.next_stmt_no += 1;
        self.stmt_kind.push((id, kind));
        self.stmt_proc.push((id, proc.to_string()));
        id
    }
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    b: Builder,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Result<&'a Token, ParseError> {
        let tok = self.tokens.get(self.pos).ok_or(ParseError::UnexpectedEof {
            expected: "more input".to_string(),
        })?;
        self.pos += 1;
        Ok(tok)
    }

    fn expect_text(&mut self, text: &str) -> Result<(), ParseError> {
        let tok = self.advance()?;
        if tok.text != text {
            return Err(ParseError::UnexpectedToken {
                expected: format!("'{text}'"),
                found: tok.text.clone(),
            });
        }
        Ok(())
    }

    fn expect_identifier(&mut self) -> Result<String, ParseError> {
        let tok = self.advance()?;
        if tok.kind != TokenKind::Identifier {
            return Err(ParseError::UnexpectedToken {
                expected: "an identifier".to_string(),
                found: tok.text.clone(),
            });
        }
        Ok(tok.text.clone())
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    /// Consumes a `(` ... `)` group (paren-depth aware) and returns the
    /// interior tokens, leaving the cursor just past the closing paren.
    fn take_balanced_parens(&mut self) -> Result<&'a [Token], ParseError> {
        self.expect_text("(")?;
        let start = self.pos;
        let mut depth = 1i32;
        while depth > 0 {
            let tok = self.advance()?;
            if tok.is("(") {
                depth += 1;
            } else if tok.is(")") {
                depth -= 1;
            }
        }
        Ok(&self.tokens[start..self.pos - 1])
    }

    /// Consumes tokens up to (and including) the next depth-0 `;`.
    fn take_until_semicolon(&mut self) -> Result<&'a [Token], ParseError> {
        let start = self.pos;
        let mut depth = 0i32;
        loop {
            let tok = self.peek().ok_or(ParseError::UnexpectedEof {
                expected: "';'".to_string(),
            })?;
            if tok.is("(") {
                depth += 1;
            } else if tok.is(")") {
                depth -= 1;
            } else if tok.is(";") && depth == 0 {
                let body = &self.tokens[start..self.pos];
                self.pos += 1;
                return Ok(body);
            }
            self.pos += 1;
        }
    }

    fn parse_program(&mut self) -> Result<(), ParseError> {
        if self.at_end() {
            return Err(ParseError::UnexpectedEof {
                expected: "at least one procedure".to_string(),
            });
        }
        while !self.at_end() {
            self.parse_procedure()?;
        }
        Ok(())
    }

    fn parse_procedure(&mut self) -> Result<(), ParseError> {
        self.expect_text("procedure")?;
        let name = self.expect_identifier()?;
        if self.b.procedures.contains(&name) {
            return Err(ParseError::DuplicateProcedure(name));
        }
        self.b.procedures.push(name.clone());
        self.expect_text("{")?;
        self.parse_stmt_lst(&name)?;
        self.expect_text("}")?;
        Ok(())
    }

    fn parse_stmt_lst(&mut self, proc: &str) -> Result<StmtList, ParseError> {
        let mut nodes = Vec::new();
        loop {
            nodes.push(self.parse_stmt(proc)?);
            match self.peek() {
                Some(tok) if tok.is("}") => break,
                Some(_) => continue,
                None => break,
            }
        }
        if nodes.is_empty() {
            return Err(ParseError::EmptyStatementList);
        }
        for w in nodes.windows(2) {
            self.b.follows.push((w[0].id, w[1].id));
            for &exit in &w[0].exits {
                self.b.cfg_edges.push((exit, w[1].id));
            }
        }
        let ids = nodes.iter().map(|n| n.id).collect();
        let exits = nodes.last().unwrap().exits.clone();
        Ok(StmtList { ids, exits })
    }

    fn parse_stmt(&mut self, proc: &str) -> Result<StmtNode, ParseError> {
        match self.peek() {
            Some(tok) if tok.is("read") => self.parse_read(proc),
            Some(tok) if tok.is("print") => self.parse_print(proc),
            Some(tok) if tok.is("call") => self.parse_call(proc),
            Some(tok) if tok.is("if") => self.parse_if(proc),
            Some(tok) if tok.is("while") => self.parse_while(proc),
            Some(tok) if tok.kind == TokenKind::Identifier => self.parse_assign(proc),
            Some(tok) => Err(ParseError::UnexpectedToken {
                expected: "a statement".to_string(),
                found: tok.text.clone(),
            }),
            None => Err(ParseError::UnexpectedEof {
                expected: "a statement".to_string(),
            }),
        }
    }

    fn parse_read(&mut self, proc: &str) -> Result<StmtNode, ParseError> {
        self.expect_text("read")?;
        let var = self.expect_identifier()?;
        self.expect_text(";")?;
        let id = self.b.fresh_id(proc, StmtKind::Read);
        self.b.read_var.push((id, var.clone()));
        self.b.modifies_s.push((id, var.clone()));
        self.b.variables.insert(var);
        Ok(StmtNode { id, exits: vec![id] })
    }

    fn parse_print(&mut self, proc: &str) -> Result<StmtNode, ParseError> {
        self.expect_text("print")?;
        let var = self.expect_identifier()?;
        self.expect_text(";")?;
        let id = self.b.fresh_id(proc, StmtKind::Print);
        self.b.print_var.push((id, var.clone()));
        self.b.uses_s.push((id, var.clone()));
        self.b.variables.insert(var);
        Ok(StmtNode { id, exits: vec![id] })
    }

    fn parse_call(&mut self, proc: &str) -> Result<StmtNode, ParseError> {
        self.expect_text("call")?;
        let callee = self.expect_identifier()?;
        self.expect_text(";")?;
        let id = self.b.fresh_id(proc, StmtKind::Call);
        self.b.call_target.push((id, callee.clone()));
        self.b.calls.push((proc.to_string(), callee));
        Ok(StmtNode { id, exits: vec![id] })
    }

    fn parse_assign(&mut self, proc: &str) -> Result<StmtNode, ParseError> {
        let var = self.expect_identifier()?;
        self.expect_text("=")?;
        let rhs_tokens = self.take_until_semicolon()?.to_vec();
        let parsed = parse_expr(&rhs_tokens)?;
        let id = self.b.fresh_id(proc, StmtKind::Assign);
        self.b.assign_lhs.push((id, var.clone()));
        self.b.assign_rhs.push((id, parsed.postfix.clone()));
        self.b.modifies_s.push((id, var.clone()));
        for v in &parsed.variables {
            self.b.uses_s.push((id, v.clone()));
        }
        self.b.pattern_assign.push((id, var.clone(), parsed.postfix));
        self.b.variables.insert(var);
        self.b.variables.extend(parsed.variables);
        self.b.constants.extend(parsed.constants);
        Ok(StmtNode { id, exits: vec![id] })
    }

    fn parse_if(&mut self, proc: &str) -> Result<StmtNode, ParseError> {
        self.expect_text("if")?;
        let cond_tokens = self.take_balanced_parens()?.to_vec();
        let vars = parse_cond(&cond_tokens)?;
        let id = self.b.fresh_id(proc, StmtKind::If);
        for v in &vars {
            self.b.pattern_if.push((id, v.clone()));
        }
        self.b.variables.extend(vars);

        self.expect_text("then")?;
        self.expect_text("{")?;
        let then_list = self.parse_stmt_lst(proc)?;
        self.expect_text("}")?;

        self.expect_text("else")?;
        self.expect_text("{")?;
        let else_list = self.parse_stmt_lst(proc)?;
        self.expect_text("}")?;

        for &child in then_list.ids.iter().chain(else_list.ids.iter()) {
            self.b.parent.push((id, child));
        }
        self.b.cfg_edges.push((id, then_list.ids[0]));
        self.b.cfg_edges.push((id, else_list.ids[0]));

        let mut exits = then_list.exits;
        exits.extend(else_list.exits);
        Ok(StmtNode { id, exits })
    }

    fn parse_while(&mut self, proc: &str) -> Result<StmtNode, ParseError> {
        self.expect_text("while")?;
        let cond_tokens = self.take_balanced_parens()?.to_vec();
        let vars = parse_cond(&cond_tokens)?;
        let id = self.b.fresh_id(proc, StmtKind::While);
        for v in &vars {
            self.b.pattern_while.push((id, v.clone()));
        }
        self.b.variables.extend(vars);

        self.expect_text("{")?;
        let body = self.parse_stmt_lst(proc)?;
        self.expect_text("}")?;

        for &child in &body.ids {
            self.b.parent.push((id, child));
        }
        self.b.cfg_edges.push((id, body.ids[0]));
        for &exit in &body.exits {
            self.b.cfg_edges.push((exit, id));
        }

        Ok(StmtNode { id, exits: vec![id] })
    }
}

/// Parse a complete SIMPLE program and return a populated [`Pkb`].
///
/// Direct facts only: `Uses`/`Modifies` for `call` statements and every
/// `*`-suffixed transitive relation are left for the design extractor,
/// which needs the whole-program call graph before it can compute them.
pub fn parse_program(source: &str, options: TokenizerOptions) -> Result<Pkb, ParseError> {
    let tokens = crate::token::tokenize(source, options)?;
    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
        b: Builder::new(),
    };
    parser.parse_program()?;
    if !parser.at_end() {
        let tok = parser.peek().unwrap();
        return Err(ParseError::UnexpectedToken {
            expected: "end of input".to_string(),
            found: tok.text.clone(),
        });
    }

    let b = parser.b;
    let stmt_count = b.next_stmt_no - 1;
    let mut pkb = Pkb::new(stmt_count);

    pkb.procedures = b.procedures;
    pkb.variables = b.variables;
    pkb.constants = b.constants;
    pkb.stmt_kind = b.stmt_kind.into_iter().collect();
    pkb.stmt_proc = b.stmt_proc.into_iter().collect();
    pkb.call_target = b.call_target.into_iter().collect();
    pkb.read_var = b.read_var.into_iter().collect();
    pkb.print_var = b.print_var.into_iter().collect();
    pkb.assign_lhs = b.assign_lhs.into_iter().collect();
    pkb.assign_rhs_postfix = b.assign_rhs.into_iter().collect();

    for (i, j) in &b.cfg_edges {
        pkb.cfg
            .insert(*i as usize, *j as usize)
            .map_err(|_| ParseError::UnexpectedEof {
                expected: "a statement id within range".to_string(),
            })?;
    }
    pkb.materialize_next();

    for (a, bb) in b.follows {
        pkb.add_follows(a, bb)?;
    }
    for (a, c) in b.parent {
        pkb.add_parent(a, c)?;
    }
    for (p, q) in b.calls {
        let _ = pkb.calls.insert(vec![p, q]);
    }
    for (s, v) in b.uses_s {
        let _ = pkb.uses_s.insert(vec![s.to_string(), v]);
    }
    for (s, v) in b.modifies_s {
        let _ = pkb.modifies_s.insert(vec![s.to_string(), v]);
    }
    for (s, lhs, rhs) in b.pattern_assign {
        let _ = pkb.pattern_assign.insert(vec![s.to_string(), lhs, rhs]);
    }
    for (s, v) in b.pattern_if {
        let _ = pkb.pattern_if.insert(vec![s.to_string(), v]);
    }
    for (s, v) in b.pattern_while {
        let _ = pkb.pattern_while.insert(vec![s.to_string(), v]);
    }

    Ok(pkb)
}
