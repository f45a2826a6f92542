//! Boundproof
//!
//! Static bounds-safety checking for a small imperative language: every
//! array index, slice, narrowing assignment and `assert` must be proved
//! from the facts known at that point in the function.

pub mod ast;
pub mod check;
pub mod config;
pub mod error;
pub mod facts;
pub mod lexer;
pub mod parser;
pub mod prove;
pub mod reasons;

pub use ast::Span;
pub use error::{CompileError, Result};

use check::{CheckReport, Checker};
use config::CheckConfig;

/// Lex, parse and check a whole source file
pub fn check_source(filename: &str, source: &str, config: CheckConfig) -> Result<CheckReport> {
    let tokens = lexer::tokenize(source)?;
    let program = parser::parse(filename, source, tokens)?;
    Ok(Checker::new(config).check_program(&program))
}
