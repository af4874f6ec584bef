//! # Analyzer facade
//!
//! Ties the pipeline's three phases — source parsing, design extraction,
//! query evaluation — behind one type, mirroring how the original engine's
//! top-level struct owns its parsed program and exposes a single `execute`
//! entry point instead of making callers wire the phases together by hand.

use crate::error::SpaError;
use crate::pkb::Pkb;
use crate::planner::{self, QueryResult};
use crate::pql::{parse_query, Query};
use crate::token::TokenizerOptions;
use crate::{extractor, simple};
use tracing::{info, instrument};

/// A program whose facts have been fully extracted and is ready to answer
/// queries. Construction is the only fallible step; every query afterwards
/// only fails if the query string itself doesn't parse.
#[derive(Debug)]
pub struct Analyzer {
    pkb: Pkb,
}

impl Analyzer {
    /// Parse `source` and run the full design extraction pipeline.
    #[instrument(skip(source))]
    pub fn build(source: &str, tokenizer: TokenizerOptions) -> Result<Self, SpaError> {
        let mut pkb = simple::parse_program(source, tokenizer)?;
        info!(
            procedures = pkb.procedures.len(),
            statements = pkb.statement_count,
            "parse_complete"
        );
        extractor::extract(&mut pkb)?;
        info!("design extraction complete");
        Ok(Analyzer { pkb })
    }

    pub fn pkb(&self) -> &Pkb {
        &self.pkb
    }

    /// Parse and evaluate a single PQL query against the built PKB.
    #[instrument(skip(self, query_source))]
    pub fn query(&self, query_source: &str) -> Result<QueryResult, SpaError> {
        let query: Query = parse_query(query_source)?;
        planner::evaluate(&self.pkb, &query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_and_answers_a_query_end_to_end() {
        let analyzer = Analyzer::build(
            r#"procedure main {
                x = 1;
                y = x + 1;
                print y;
            }"#,
            TokenizerOptions::default(),
        )
        .unwrap();

        let result = analyzer.query("assign a; Select a such that Follows(1, a)").unwrap();
        match result {
            QueryResult::Rows { rows, .. } => {
                assert_eq!(rows, vec![vec!["2".to_string()]]);
            }
            QueryResult::Boolean(_) => panic!("expected rows"),
        }
    }

    #[test]
    fn rejects_a_malformed_query_without_touching_the_pkb() {
        let analyzer = Analyzer::build("procedure p { a = 1; }", TokenizerOptions::default()).unwrap();
        assert!(analyzer.query("assign a Select a").is_err());
    }
}
