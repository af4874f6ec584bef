//! PQL parser. Semantic validation happens inline, during parsing, rather
//! than as a separate pass: every synonym reference is checked against its
//! declaration — existence, no re-declaration, and entity-kind compatibility
//! with the position it's used in — the moment it's consumed.

use crate::error::QueryParseError;
use crate::pql::ast::*;
use crate::simple::expr::parse_expr;
use crate::token::{tokenize, Token, TokenKind, TokenizerOptions};
use std::collections::HashMap;

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    declarations: HashMap<String, DesignEntity>,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn advance(&mut self) -> Result<&'a Token, QueryParseError> {
        let tok = self
            .tokens
            .get(self.pos)
            .ok_or(QueryParseError::UnexpectedEof {
                expected: "more input".to_string(),
            })?;
        self.pos += 1;
        Ok(tok)
    }

    fn expect_text(&mut self, text: &str) -> Result<(), QueryParseError> {
        let tok = self.advance()?;
        if tok.text != text {
            return Err(QueryParseError::UnexpectedToken {
                expected: format!("'{text}'"),
                found: tok.text.clone(),
            });
        }
        Ok(())
    }

    fn expect_identifier(&mut self) -> Result<String, QueryParseError> {
        let tok = self.advance()?;
        if tok.kind != TokenKind::Identifier {
            return Err(QueryParseError::UnexpectedToken {
                expected: "an identifier".to_string(),
                found: tok.text.clone(),
            });
        }
        Ok(tok.text.clone())
    }

    fn declare(&mut self, name: String, kind: DesignEntity) -> Result<(), QueryParseError> {
        if self.declarations.contains_key(&name) {
            return Err(QueryParseError::DuplicateSynonym { synonym: name });
        }
        self.declarations.insert(name, kind);
        Ok(())
    }

    fn kind_of(&self, name: &str) -> Result<DesignEntity, QueryParseError> {
        self.declarations
            .get(name)
            .copied()
            .ok_or_else(|| QueryParseError::UndeclaredSynonym(name.to_string()))
    }

    fn parse_declarations(&mut self) -> Result<(), QueryParseError> {
        loop {
            let Some(tok) = self.peek() else {
                return Err(QueryParseError::UnexpectedEof {
                    expected: "'Select'".to_string(),
                });
            };
            if tok.is("Select") {
                return Ok(());
            }
            let entity_word = self.expect_identifier()?;
            let kind = DesignEntity::from_keyword(&entity_word)
                .ok_or(QueryParseError::UnknownDesignEntity(entity_word))?;
            loop {
                let name = self.expect_identifier()?;
                self.declare(name, kind)?;
                let tok = self.advance()?;
                if tok.is(";") {
                    break;
                } else if !tok.is(",") {
                    return Err(QueryParseError::UnexpectedToken {
                        expected: "',' or ';'".to_string(),
                        found: tok.text.clone(),
                    });
                }
            }
        }
    }

    fn parse_result(&mut self) -> Result<ResultSpec, QueryParseError> {
        self.expect_text("Select")?;
        let tok = self.advance()?;
        if tok.is("BOOLEAN") && !self.declarations.contains_key("BOOLEAN") {
            return Ok(ResultSpec::Boolean);
        }
        if tok.is("<") {
            let mut names = Vec::new();
            loop {
                let name = self.expect_identifier()?;
                self.kind_of(&name)?;
                names.push(name);
                let next = self.advance()?;
                if next.is(">") {
                    break;
                } else if !next.is(",") {
                    return Err(QueryParseError::UnexpectedToken {
                        expected: "',' or '>'".to_string(),
                        found: next.text.clone(),
                    });
                }
            }
            return Ok(ResultSpec::Tuple(names));
        }
        if tok.kind == TokenKind::Identifier {
            self.kind_of(&tok.text)?;
            return Ok(ResultSpec::Tuple(vec![tok.text.clone()]));
        }
        Err(QueryParseError::UnexpectedToken {
            expected: "a synonym, 'BOOLEAN', or a tuple".to_string(),
            found: tok.text.clone(),
        })
    }

    fn parse_param(&mut self) -> Result<Param, QueryParseError> {
        let tok = self.advance()?;
        if tok.is("_") {
            return Ok(Param::Wildcard);
        }
        if tok.kind == TokenKind::Number {
            let value = tok.text.parse().map_err(|_| QueryParseError::UnexpectedToken {
                expected: "a valid integer".to_string(),
                found: tok.text.clone(),
            })?;
            return Ok(Param::Integer(value));
        }
        if tok.is("\"") {
            let name = self.expect_identifier()?;
            self.expect_text("\"")?;
            return Ok(Param::QuotedName(name));
        }
        if tok.kind == TokenKind::Identifier {
            self.kind_of(&tok.text)?;
            return Ok(Param::Synonym(tok.text.clone()));
        }
        Err(QueryParseError::UnexpectedToken {
            expected: "a synonym, '_', an integer, or a quoted name".to_string(),
            found: tok.text.clone(),
        })
    }

    fn check_stmt_position(&self, param: &Param) -> Result<(), QueryParseError> {
        match param {
            Param::Integer(_) | Param::Wildcard => Ok(()),
            Param::QuotedName(name) => Err(QueryParseError::UnexpectedToken {
                expected: "a statement reference".to_string(),
                found: format!("\"{name}\""),
            }),
            Param::Synonym(name) => {
                let kind = self.kind_of(name)?;
                if kind.is_statement_like() {
                    Ok(())
                } else {
                    Err(QueryParseError::SynonymKindMismatch {
                        synonym: name.clone(),
                        actual: kind,
                        expected: "a statement-like entity",
                    })
                }
            }
        }
    }

    fn check_proc_position(&self, param: &Param) -> Result<(), QueryParseError> {
        match param {
            Param::Wildcard | Param::QuotedName(_) => Ok(()),
            Param::Integer(_) => Err(QueryParseError::UnexpectedToken {
                expected: "a procedure reference".to_string(),
                found: "an integer".to_string(),
            }),
            Param::Synonym(name) => {
                let kind = self.kind_of(name)?;
                if kind == DesignEntity::Procedure {
                    Ok(())
                } else {
                    Err(QueryParseError::SynonymKindMismatch {
                        synonym: name.clone(),
                        actual: kind,
                        expected: "procedure",
                    })
                }
            }
        }
    }

    fn check_var_position(&self, param: &Param) -> Result<(), QueryParseError> {
        match param {
            Param::Wildcard | Param::QuotedName(_) => Ok(()),
            Param::Integer(_) => Err(QueryParseError::UnexpectedToken {
                expected: "a variable reference".to_string(),
                found: "an integer".to_string(),
            }),
            Param::Synonym(name) => {
                let kind = self.kind_of(name)?;
                if kind == DesignEntity::Variable {
                    Ok(())
                } else {
                    Err(QueryParseError::SynonymKindMismatch {
                        synonym: name.clone(),
                        actual: kind,
                        expected: "variable",
                    })
                }
            }
        }
    }

    fn check_uses_left_position(&self, param: &Param) -> Result<(), QueryParseError> {
        match param {
            Param::Integer(_) | Param::Wildcard | Param::QuotedName(_) => Ok(()),
            Param::Synonym(name) => {
                let kind = self.kind_of(name)?;
                if kind.is_statement_like() || kind == DesignEntity::Procedure {
                    Ok(())
                } else {
                    Err(QueryParseError::SynonymKindMismatch {
                        synonym: name.clone(),
                        actual: kind,
                        expected: "a statement or procedure entity",
                    })
                }
            }
        }
    }

    fn parse_rel_clause(&mut self) -> Result<RelClause, QueryParseError> {
        let tok = self.advance()?;
        let kind = match tok.text.as_str() {
            "Follows" => RelKind::Follows,
            "Parent" => RelKind::Parent,
            "Calls" => RelKind::Calls,
            "Next" => RelKind::Next,
            "Affects" => RelKind::Affects,
            "Uses" => RelKind::Uses,
            "Modifies" => RelKind::Modifies,
            _ => {
                return Err(QueryParseError::UnexpectedToken {
                    expected: "a relation name".to_string(),
                    found: tok.text.clone(),
                })
            }
        };

        let transitive = matches!(self.peek(), Some(t) if t.is("*"));
        if transitive {
            self.advance()?;
            if !kind.has_transitive_form() {
                return Err(QueryParseError::NotTransitive(kind.keyword()));
            }
        }

        self.expect_text("(")?;
        let left = self.parse_param()?;
        self.expect_text(",")?;
        let right = self.parse_param()?;
        self.expect_text(")")?;

        match kind {
            RelKind::Follows | RelKind::Parent | RelKind::Next | RelKind::Affects => {
                self.check_stmt_position(&left)?;
                self.check_stmt_position(&right)?;
            }
            RelKind::Calls => {
                self.check_proc_position(&left)?;
                self.check_proc_position(&right)?;
            }
            RelKind::Uses | RelKind::Modifies => {
                self.check_uses_left_position(&left)?;
                self.check_var_position(&right)?;
            }
        }

        Ok(RelClause { kind, transitive, left, right })
    }

    fn parse_quoted_expr(&mut self) -> Result<String, QueryParseError> {
        self.expect_text("\"")?;
        let start = self.pos;
        while self.peek().map(|t| !t.is("\"")).unwrap_or(false) {
            self.pos += 1;
        }
        if self.at_end() {
            return Err(QueryParseError::UnexpectedEof {
                expected: "closing '\"'".to_string(),
            });
        }
        let inner = self.tokens[start..self.pos].to_vec();
        self.pos += 1;
        let parsed = parse_expr(&inner).map_err(|e| QueryParseError::UnexpectedToken {
            expected: "a valid expression".to_string(),
            found: e.to_string(),
        })?;
        Ok(parsed.postfix)
    }

    fn parse_expr_spec(&mut self) -> Result<ExprSpec, QueryParseError> {
        if matches!(self.peek(), Some(t) if t.is("_")) {
            self.advance()?;
            if matches!(self.peek(), Some(t) if t.is("\"")) {
                let postfix = self.parse_quoted_expr()?;
                self.expect_text("_")?;
                return Ok(ExprSpec::Sub(postfix));
            }
            return Ok(ExprSpec::Any);
        }
        let postfix = self.parse_quoted_expr()?;
        Ok(ExprSpec::Exact(postfix))
    }

    fn parse_pattern_clause(&mut self) -> Result<PatternClause, QueryParseError> {
        self.expect_text("pattern")?;
        let synonym = self.expect_identifier()?;
        let entity_kind = self.kind_of(&synonym)?;
        if !matches!(
            entity_kind,
            DesignEntity::Assign | DesignEntity::If | DesignEntity::While
        ) {
            return Err(QueryParseError::SynonymKindMismatch {
                synonym,
                actual: entity_kind,
                expected: "assign, if, or while",
            });
        }

        self.expect_text("(")?;
        let lhs = self.parse_param()?;
        self.check_var_position(&lhs)?;
        self.expect_text(",")?;

        let expr = match entity_kind {
            DesignEntity::Assign => Some(self.parse_expr_spec()?),
            DesignEntity::If => {
                self.expect_text("_")?;
                self.expect_text(",")?;
                self.expect_text("_")?;
                None
            }
            DesignEntity::While => {
                self.expect_text("_")?;
                None
            }
            _ => unreachable!(),
        };
        self.expect_text(")")?;

        Ok(PatternClause { synonym, entity_kind, lhs, expr })
    }

    fn parse_clauses(&mut self) -> Result<Vec<Clause>, QueryParseError> {
        let mut clauses = Vec::new();
        while let Some(tok) = self.peek() {
            if tok.is("such") {
                self.advance()?;
                self.expect_text("that")?;
                clauses.push(Clause::SuchThat(self.parse_rel_clause()?));
            } else if tok.is("pattern") {
                clauses.push(Clause::Pattern(self.parse_pattern_clause()?));
            } else if tok.is("with") {
                return Err(QueryParseError::WithNotSupported);
            } else {
                return Err(QueryParseError::UnexpectedToken {
                    expected: "'such that', 'pattern', or end of query".to_string(),
                    found: tok.text.clone(),
                });
            }
        }
        Ok(clauses)
    }
}

/// Parse a complete PQL query string.
pub fn parse_query(source: &str) -> Result<Query, QueryParseError> {
    let tokens = tokenize(source, TokenizerOptions::default()).map_err(|e| {
        QueryParseError::UnexpectedToken {
            expected: "valid PQL tokens".to_string(),
            found: e.to_string(),
        }
    })?;
    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
        declarations: HashMap::new(),
    };
    parser.parse_declarations()?;
    let result = parser.parse_result()?;
    let clauses = parser.parse_clauses()?;
    if !parser.at_end() {
        let tok = parser.peek().unwrap();
        return Err(QueryParseError::UnexpectedToken {
            expected: "end of query".to_string(),
            found: tok.text.clone(),
        });
    }
    Ok(Query {
        declarations: parser.declarations,
        result,
        clauses,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_select_with_such_that() {
        let q = parse_query("assign a; Select a such that Follows*(1, a)").unwrap();
        assert_eq!(q.result, ResultSpec::Tuple(vec!["a".to_string()]));
        assert_eq!(q.clauses.len(), 1);
        match &q.clauses[0] {
            Clause::SuchThat(rel) => {
                assert_eq!(rel.kind, RelKind::Follows);
                assert!(rel.transitive);
                assert_eq!(rel.left, Param::Integer(1));
                assert_eq!(rel.right, Param::Synonym("a".to_string()));
            }
            _ => panic!("expected a such-that clause"),
        }
    }

    #[test]
    fn boolean_result() {
        let q = parse_query("variable v; Select BOOLEAN such that Modifies(\"main\", v)").unwrap();
        assert_eq!(q.result, ResultSpec::Boolean);
    }

    #[test]
    fn rejects_undeclared_synonym() {
        let err = parse_query("Select a").unwrap_err();
        assert!(matches!(err, QueryParseError::UndeclaredSynonym(_)));
    }

    #[test]
    fn rejects_duplicate_declaration() {
        let err = parse_query("assign a; variable a; Select a").unwrap_err();
        assert!(matches!(err, QueryParseError::DuplicateSynonym { .. }));
    }

    #[test]
    fn rejects_transitive_on_non_transitive_relation() {
        let err = parse_query("variable v; stmt s; Select s such that Uses*(s, v)").unwrap_err();
        assert!(matches!(err, QueryParseError::NotTransitive("Uses")));
    }

    #[test]
    fn rejects_type_mismatched_synonym() {
        let err =
            parse_query("variable v; Select v such that Follows(v, 1)").unwrap_err();
        assert!(matches!(err, QueryParseError::SynonymKindMismatch { .. }));
    }

    #[test]
    fn pattern_assign_with_subexpression() {
        let q = parse_query("assign a; Select a pattern a(_, _\"x + 1\"_)").unwrap();
        match &q.clauses[0] {
            Clause::Pattern(p) => {
                assert_eq!(p.lhs, Param::Wildcard);
                assert_eq!(p.expr, Some(ExprSpec::Sub("x 1 +".to_string())));
            }
            _ => panic!("expected a pattern clause"),
        }
    }

    #[test]
    fn with_clause_is_rejected_explicitly() {
        let err = parse_query("assign a; Select a with a = 1").unwrap_err();
        assert!(matches!(err, QueryParseError::WithNotSupported));
    }
}
