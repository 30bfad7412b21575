//! Advanced message search
//!
//! Builds the structured filter sent to the backend search endpoint, either
//! directly or from an operator query string.

mod query_parser;

pub use query_parser::{SearchFilter, parse_date, parse_query};
