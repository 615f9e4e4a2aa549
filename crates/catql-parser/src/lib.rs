//! SQL frontend for catql.
//!
//! Turns statement text into an AST. Only `SELECT` statements are accepted;
//! constructs the executor cannot run (joins, grouping, ordering) still parse
//! so that the executor can reject them with a precise error.

pub mod ast;
pub mod lexer;
pub mod parser;

pub use ast::*;
pub use lexer::{Lexer, Token};
pub use parser::Parser;

use catql_core::Result;

/// Parse a single statement.
pub fn parse(sql: &str) -> Result<Statement> {
    Parser::new(sql)?.parse()
}
