//! The Program Query Language: typed AST and a parser that performs all
//! semantic validation (synonym existence, re-declaration, entity-kind
//! compatibility, transitive-form applicability) inline while parsing.

pub mod ast;
pub mod parser;

pub use ast::*;
pub use parser::parse_query;
