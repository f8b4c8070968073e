//! Query language: parsing and evaluation against an HCQR index.

pub mod evaluator;
pub mod parser;

pub use evaluator::QueryEvaluator;
pub use parser::{Query, QueryNode, SetOperator, parse_query};
