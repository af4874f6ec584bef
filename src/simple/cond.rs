//! Condition sub-parser: consumes the token slice inside an `if`/`while`'s
//! outer parentheses and recognizes the SIMPLE condition grammar:
//!
//! ```text
//! cond_expr : rel_expr
//!           | '!' '(' cond_expr ')'
//!           | '(' cond_expr ')' '&&' '(' cond_expr ')'
//!           | '(' cond_expr ')' '||' '(' cond_expr ')'
//! rel_expr  : rel_factor rel_op rel_factor
//! ```
//!
//! Only the variable names referenced anywhere in the condition are
//! retained — that's all `PatternIf`/`PatternWhile` need.

use crate::error::ParseError;
use crate::simple::expr::parse_expr;
use crate::token::{Token, TokenKind};
use std::collections::BTreeSet;

const REL_OPS: &[&str] = &["<", "<=", ">", ">=", "==", "!="];

/// Parse a condition and return every variable name it references.
pub fn parse_cond(tokens: &[Token]) -> Result<BTreeSet<String>, ParseError> {
    let mut vars = BTreeSet::new();
    parse_cond_expr(tokens, &mut vars)?;
    Ok(vars)
}

fn parse_cond_expr(tokens: &[Token], vars: &mut BTreeSet<String>) -> Result<(), ParseError> {
    if tokens.is_empty() {
        return Err(ParseError::EmptyExpression);
    }

    if tokens[0].is("!") {
        let rest = &tokens[1..];
        let (inner, remainder) = take_parenthesized(rest)?;
        if !remainder.is_empty() {
            return Err(ParseError::UnexpectedToken {
                expected: "end of condition".to_string(),
                found: remainder[0].text.clone(),
            });
        }
        return parse_cond_expr(inner, vars);
    }

    if tokens[0].is("(") {
        let (first, rest) = take_parenthesized(tokens)?;
        if let Some(op_tok) = rest.first() {
            if op_tok.is("&&") || op_tok.is("||") {
                let (second, remainder) = take_parenthesized(&rest[1..])?;
                if !remainder.is_empty() {
                    return Err(ParseError::UnexpectedToken {
                        expected: "end of condition".to_string(),
                        found: remainder[0].text.clone(),
                    });
                }
                parse_cond_expr(first, vars)?;
                parse_cond_expr(second, vars)?;
                return Ok(());
            }
        }
        // A parenthesized rel_expr factor, e.g. `(x + 1) > y` — fall through
        // to rel_expr parsing over the full original slice.
    }

    parse_rel_expr(tokens, vars)
}

/// `tokens[0]` must be `(`. Returns the bracketed interior and whatever
/// follows the matching close paren.
fn take_parenthesized(tokens: &[Token]) -> Result<(&[Token], &[Token]), ParseError> {
    if tokens.first().map(|t| t.is("(")) != Some(true) {
        return Err(ParseError::UnexpectedToken {
            expected: "'('".to_string(),
            found: tokens
                .first()
                .map(|t| t.text.clone())
                .unwrap_or_else(|| "end of input".to_string()),
        });
    }
    let mut depth = 0i32;
    for (i, tok) in tokens.iter().enumerate() {
        if tok.is("(") {
            depth += 1;
        } else if tok.is(")") {
            depth -= 1;
            if depth == 0 {
                return Ok((&tokens[1..i], &tokens[i + 1..]));
            }
        }
    }
    Err(ParseError::MismatchedParentheses)
}

fn parse_rel_expr(tokens: &[Token], vars: &mut BTreeSet<String>) -> Result<(), ParseError> {
    let mut depth = 0i32;
    let mut split = None;
    for (i, tok) in tokens.iter().enumerate() {
        if tok.is("(") {
            depth += 1;
        } else if tok.is(")") {
            depth -= 1;
        } else if depth == 0 && tok.kind == TokenKind::Operator && REL_OPS.contains(&tok.text.as_str()) {
            split = Some(i);
            break;
        }
    }

    let Some(i) = split else {
        return Err(ParseError::UnexpectedEof {
            expected: "a relational operator (<, <=, >, >=, ==, !=)".to_string(),
        });
    };

    let left = parse_expr(&tokens[..i])?;
    let right = parse_expr(&tokens[i + 1..])?;
    vars.extend(left.variables);
    vars.extend(right.variables);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::{tokenize, TokenizerOptions};

    fn vars_of(src: &str) -> BTreeSet<String> {
        let tokens = tokenize(src, TokenizerOptions::default()).unwrap();
        parse_cond(&tokens).unwrap()
    }

    #[test]
    fn bare_relational_expression() {
        let v = vars_of("x > y");
        assert_eq!(v, ["x", "y"].into_iter().map(String::from).collect());
    }

    #[test]
    fn negated_condition() {
        let v = vars_of("!(x == 0)");
        assert_eq!(v, ["x"].into_iter().map(String::from).collect());
    }

    #[test]
    fn conjunction_of_two_conditions() {
        let v = vars_of("(x > 0) && (y < 10)");
        assert_eq!(v, ["x", "y"].into_iter().map(String::from).collect());
    }

    #[test]
    fn disjunction_of_two_conditions() {
        let v = vars_of("(flag == 1) || (count != 0)");
        assert_eq!(
            v,
            ["count", "flag"].into_iter().map(String::from).collect()
        );
    }

    #[test]
    fn nested_boolean_structure() {
        let v = vars_of("((x > 0) && (y > 0)) || (z == 1)");
        assert_eq!(
            v,
            ["x", "y", "z"].into_iter().map(String::from).collect()
        );
    }

    #[test]
    fn rejects_missing_relational_operator() {
        let tokens = tokenize("x + y", TokenizerOptions::default()).unwrap();
        assert!(parse_cond(&tokens).is_err());
    }
}
