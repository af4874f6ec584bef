//! Error taxonomy for the analyzer pipeline.
//!
//! Each phase gets its own error enum so a caller can match on exactly what
//! went wrong without string-sniffing a message. [`SpaError`] composes them
//! for callers that just want to propagate whatever the pipeline produced.

use thiserror::Error;

/// Errors raised while turning a character stream into tokens.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("illegal character '{0}' at byte offset {1}")]
    IllegalCharacter(char, usize),

    #[error("unterminated operator '{0}' at byte offset {1}")]
    UnterminatedOperator(char, usize),

    #[error("numeric literal '{0}' has a leading zero at byte offset {1}")]
    LeadingZero(String, usize),
}

/// Errors raised while parsing SIMPLE source into PKB facts.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("tokenization failed: {0}")]
    Token(#[from] TokenError),

    #[error("expected {expected}, found {found}")]
    UnexpectedToken { expected: String, found: String },

    #[error("unexpected end of input, expected {expected}")]
    UnexpectedEof { expected: String },

    #[error("statement list cannot be empty")]
    EmptyStatementList,

    #[error("mismatched parentheses in expression")]
    MismatchedParentheses,

    #[error("expression cannot be empty")]
    EmptyExpression,

    #[error("operator '{0}' is missing an operand")]
    MissingOperand(String),

    #[error("expression has leftover operands with no connecting operator")]
    MalformedExpression,

    #[error("procedure '{0}' is declared more than once")]
    DuplicateProcedure(String),

    #[error(transparent)]
    Invariant(#[from] InvariantViolation),
}

/// Semantic errors found by the design extractor after parsing succeeds.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DesignError {
    #[error("cyclic calls detected among procedures: {0:?}")]
    CyclicCalls(Vec<String>),

    #[error("call to undeclared procedure '{0}' at statement {1}")]
    UndeclaredProcedure(String, u32),
}

/// Errors raised while parsing a PQL query string.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryParseError {
    #[error("expected {expected}, found {found}")]
    UnexpectedToken { expected: String, found: String },

    #[error("unexpected end of query, expected {expected}")]
    UnexpectedEof { expected: String },

    #[error("undeclared synonym '{0}'")]
    UndeclaredSynonym(String),

    #[error("synonym '{synonym}' declared twice")]
    DuplicateSynonym { synonym: String },

    #[error("synonym '{synonym}' has kind {actual:?}, expected one compatible with {expected}")]
    SynonymKindMismatch {
        synonym: String,
        actual: crate::pql::ast::DesignEntity,
        expected: &'static str,
    },

    #[error("'*' is not a valid modifier for relation {0}")]
    NotTransitive(&'static str),

    #[error("unknown design entity '{0}'")]
    UnknownDesignEntity(String),

    #[error("'with' clauses are not supported by this implementation")]
    WithNotSupported,
}

/// Errors raised by [`crate::table::Table`] operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TableError {
    #[error("row arity {actual} does not match header arity {expected}")]
    ArityMismatch { expected: usize, actual: usize },

    #[error("cannot concatenate tables of differing header arity ({a} vs {b})")]
    ConcatenateArityMismatch { a: usize, b: usize },

    #[error("table arity must be positive")]
    NonPositiveArity,

    #[error("header has duplicate non-empty column name '{0}'")]
    DuplicateColumnName(String),

    #[error("no column named '{0}'")]
    UnknownColumn(String),
}

/// Errors raised by [`crate::graph::Graph`] operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("node id {0} is out of bounds for a graph of size {1}")]
    OutOfBounds(usize, usize),
}

/// An internal invariant was violated by the caller. These indicate a bug
/// in the code that called into the PKB or Table, not a malformed input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invariant violated: {0}")]
pub struct InvariantViolation(pub String);

/// Top-level error type threaded through the analyzer's public API.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SpaError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Design(#[from] DesignError),

    #[error(transparent)]
    QueryParse(#[from] QueryParseError),

    #[error(transparent)]
    Table(#[from] TableError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Invariant(#[from] InvariantViolation),
}

pub type SpaResult<T> = Result<T, SpaError>;
