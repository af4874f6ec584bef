//! Expression sub-parser: infix token slice -> postfix string + referenced
//! names, via the shunting-yard algorithm. Grounded on the original SPA's
//! `ExprParser`: a precedence table, an operator stack, and a validity pass
//! over the resulting postfix stream that simulates evaluation to catch
//! missing operands and mismatched parentheses.

use crate::error::ParseError;
use crate::token::{Token, TokenKind};
use std::collections::BTreeSet;

/// The result of parsing one arithmetic expression: its postfix form (used
/// for `PatternAssign` sub-expression matching) plus the variable and
/// constant names it references (used for `UsesS`/`UsesP`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedExpr {
    pub postfix: String,
    pub variables: BTreeSet<String>,
    pub constants: BTreeSet<String>,
}

fn precedence(op: &str) -> u8 {
    match op {
        "*" | "/" | "%" => 2,
        "+" | "-" => 1,
        _ => 0,
    }
}

fn is_operator(text: &str) -> bool {
    matches!(text, "+" | "-" | "*" | "/" | "%")
}

/// Parse an infix arithmetic expression (no leading/trailing parens
/// required) into its postfix form via the shunting-yard algorithm.
pub fn parse_expr(tokens: &[Token]) -> Result<ParsedExpr, ParseError> {
    if tokens.is_empty() {
        return Err(ParseError::EmptyExpression);
    }

    let mut output: Vec<Token> = Vec::new();
    let mut operators: Vec<Token> = Vec::new();
    let mut variables = BTreeSet::new();
    let mut constants = BTreeSet::new();

    for tok in tokens {
        match tok.kind {
            TokenKind::Identifier => {
                variables.insert(tok.text.clone());
                output.push(tok.clone());
            }
            TokenKind::Number => {
                constants.insert(tok.text.clone());
                output.push(tok.clone());
            }
            TokenKind::Operator if is_operator(&tok.text) => {
                while let Some(top) = operators.last() {
                    if top.is("(") {
                        break;
                    }
                    if precedence(&top.text) >= precedence(&tok.text) {
                        output.push(operators.pop().unwrap());
                    } else {
                        break;
                    }
                }
                operators.push(tok.clone());
            }
            TokenKind::Delimiter if tok.is("(") => operators.push(tok.clone()),
            TokenKind::Delimiter if tok.is(")") => {
                let mut found_open = false;
                while let Some(top) = operators.pop() {
                    if top.is("(") {
                        found_open = true;
                        break;
                    }
                    output.push(top);
                }
                if !found_open {
                    return Err(ParseError::MismatchedParentheses);
                }
            }
            _ => {
                return Err(ParseError::UnexpectedToken {
                    expected: "identifier, number, operator, or parenthesis".to_string(),
                    found: tok.text.clone(),
                })
            }
        }
    }

    while let Some(top) = operators.pop() {
        if top.is("(") || top.is(")") {
            return Err(ParseError::MismatchedParentheses);
        }
        output.push(top);
    }

    validate_postfix(&output)?;

    let postfix = output
        .iter()
        .map(|t| t.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");

    Ok(ParsedExpr {
        postfix,
        variables,
        constants,
    })
}

/// Simulate evaluation over the postfix stream purely to validate shape:
/// every operator must find two operands already on the stack, and exactly
/// one value must remain once the stream is consumed.
fn validate_postfix(postfix: &[Token]) -> Result<(), ParseError> {
    let mut depth: i64 = 0;
    for tok in postfix {
        if is_operator(&tok.text) {
            if depth < 2 {
                return Err(ParseError::MissingOperand(tok.text.clone()));
            }
            depth -= 1;
        } else {
            depth += 1;
        }
    }
    if depth != 1 {
        return Err(ParseError::MalformedExpression);
    }
    Ok(())
}
