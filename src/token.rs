//! # Tokenizer (external collaborator)
//!
//! The source and query parsers both consume a pre-materialized sequence of
//! tokens rather than a character stream directly. This module is the
//! collaborator that produces that sequence; it is deliberately thin — the
//! hard engineering lives in the parsers that consume it, not here.

use crate::error::TokenError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Identifier,
    Number,
    Operator,
    Delimiter,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>) -> Self {
        Token { kind, text: text.into() }
    }

    pub fn is(&self, text: &str) -> bool {
        self.text == text
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.text)
    }
}

/// Tunable behavior for [`tokenize`], named directly after §6's interface.
#[derive(Debug, Clone, Copy)]
pub struct TokenizerOptions {
    /// Reject numeric literals with a leading zero (e.g. `007`) unless set.
    pub allow_leading_zeroes: bool,
    /// Skip whitespace between tokens. Disabling this is only useful for
    /// tests that want to see whitespace-sensitivity fail loudly.
    pub consume_whitespace: bool,
}

impl Default for TokenizerOptions {
    fn default() -> Self {
        TokenizerOptions {
            allow_leading_zeroes: false,
            consume_whitespace: true,
        }
    }
}

const MULTI_CHAR_OPERATORS: &[&str] = &["==", "!=", "<=", ">=", "&&", "||"];
const SINGLE_CHAR_OPERATORS: &str = "+-*/%=><";
const DELIMITERS: &str = "(){};,_\"";

/// Turn `source` into a flat token sequence. This is intentionally a single
/// eager pass (a "pre-materialized sequence" per §6) rather than a pull
/// iterator — both parsers only ever need a small, boundable lookahead.
pub fn tokenize(source: &str, options: TokenizerOptions) -> Result<Vec<Token>, TokenError> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0usize;

    while i < chars.len() {
        let c = chars[i];

        if c.is_whitespace() {
            if options.consume_whitespace {
                i += 1;
                continue;
            }
            return Err(TokenError::IllegalCharacter(c, i));
        }

        if c.is_ascii_alphabetic() {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            let text: String = chars[start..i].iter().collect();
            tokens.push(Token::new(TokenKind::Identifier, text));
            continue;
        }

        if c.is_ascii_digit() {
            let start = i;
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
            let text: String = chars[start..i].iter().collect();
            if !options.allow_leading_zeroes && text.len() > 1 && text.starts_with('0') {
                return Err(TokenError::LeadingZero(text, start));
            }
            tokens.push(Token::new(TokenKind::Number, text));
            continue;
        }

        if DELIMITERS.contains(c) {
            tokens.push(Token::new(TokenKind::Delimiter, c.to_string()));
            i += 1;
            continue;
        }

        if c == '!' {
            if chars.get(i + 1) == Some(&'=') {
                tokens.push(Token::new(TokenKind::Operator, "!="));
                i += 2;
            } else {
                // A bare '!' is a valid unary operator in conditions, but it
                // must never be confused with the start of '!='.
                tokens.push(Token::new(TokenKind::Operator, "!"));
                i += 1;
            }
            continue;
        }

        if SINGLE_CHAR_OPERATORS.contains(c) || c == '&' || c == '|' {
            let two: String = chars[i..(i + 2).min(chars.len())].iter().collect();
            if let Some(op) = MULTI_CHAR_OPERATORS.iter().find(|&&o| o == two) {
                tokens.push(Token::new(TokenKind::Operator, *op));
                i += 2;
                continue;
            }
            if c == '&' || c == '|' {
                return Err(TokenError::UnterminatedOperator(c, i));
            }
            tokens.push(Token::new(TokenKind::Operator, c.to_string()));
            i += 1;
            continue;
        }

        return Err(TokenError::IllegalCharacter(c, i));
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(tokens: &[Token]) -> Vec<&str> {
        tokens.iter().map(|t| t.text.as_str()).collect()
    }

    #[test]
    fn tokenizes_a_simple_procedure() {
        let tokens = tokenize("procedure p { a = 1; }", TokenizerOptions::default()).unwrap();
        assert_eq!(
            texts(&tokens),
            vec!["procedure", "p", "{", "a", "=", "1", ";", "}"]
        );
    }

    #[test]
    fn rejects_leading_zero_by_default() {
        let result = tokenize("a = 007;", TokenizerOptions::default());
        assert!(matches!(result, Err(TokenError::LeadingZero(_, _))));
    }

    #[test]
    fn allows_leading_zero_when_enabled() {
        let opts = TokenizerOptions {
            allow_leading_zeroes: true,
            ..Default::default()
        };
        let tokens = tokenize("a = 007;", opts).unwrap();
        assert_eq!(texts(&tokens), vec!["a", "=", "007", ";"]);
    }

    #[test]
    fn recognizes_multi_char_operators() {
        let tokens = tokenize("x == y && z != w", TokenizerOptions::default()).unwrap();
        assert_eq!(texts(&tokens), vec!["x", "==", "y", "&&", "z", "!=", "w"]);
    }

    #[test]
    fn rejects_unterminated_ampersand() {
        let result = tokenize("x & y", TokenizerOptions::default());
        assert!(matches!(result, Err(TokenError::UnterminatedOperator('&', _))));
    }

    #[test]
    fn rejects_unknown_characters() {
        let result = tokenize("x = 1 @ 2;", TokenizerOptions::default());
        assert!(matches!(result, Err(TokenError::IllegalCharacter('@', _))));
    }
}
