//! Statement layout parsers. Each turns extracted text into a `ParseResult`.

pub mod ddmm_statement;

pub use ddmm_statement::{StatementLayout, has_date_prefixed_line, parse_statement_text};
