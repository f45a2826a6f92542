//! Parser implementation using lalrpop

use crate::ast::{Expr, ExprRef, Lexeme, Program, Span};
use crate::error::{CompileError, Result};
use crate::lexer::{Token, tokenize};

#[cfg(test)]
mod tests;

lalrpop_util::lalrpop_mod!(
    #[allow(clippy::all)]
    grammar,
    "/parser/grammar.rs"
);

type ParseError = lalrpop_util::ParseError<usize, Token, String>;

fn error_span(e: &ParseError) -> Span {
    match e {
        lalrpop_util::ParseError::InvalidToken { location } => Span::new(*location, *location + 1),
        lalrpop_util::ParseError::UnrecognizedEof { location, .. } => {
            Span::new(*location, *location + 1)
        }
        lalrpop_util::ParseError::UnrecognizedToken { token, .. } => Span::new(token.0, token.2),
        lalrpop_util::ParseError::ExtraToken { token } => Span::new(token.0, token.2),
        lalrpop_util::ParseError::User { .. } => Span::new(0, 1),
    }
}

/// Build an operator node, taking its form from the operand count
fn apply(lexeme: Lexeme, args: Vec<ExprRef>) -> std::result::Result<ExprRef, ParseError> {
    let arity = args.len();
    Expr::apply(lexeme, args).ok_or_else(|| lalrpop_util::ParseError::User {
        error: format!("`{lexeme:?}` takes no {arity}-operand form"),
    })
}

fn chain(
    lexeme: Lexeme,
    first: ExprRef,
    rest: Vec<ExprRef>,
) -> std::result::Result<ExprRef, ParseError> {
    let mut args = Vec::with_capacity(rest.len() + 1);
    args.push(first);
    args.extend(rest);
    apply(lexeme, args)
}

fn token_stream(tokens: Vec<(Token, Span)>) -> impl Iterator<Item = (usize, Token, usize)> {
    tokens
        .into_iter()
        .map(|(tok, span)| (span.start, tok, span.end))
}

/// Parse tokens into AST
pub fn parse(_filename: &str, _source: &str, tokens: Vec<(Token, Span)>) -> Result<Program> {
    grammar::ProgramParser::new()
        .parse(token_stream(tokens))
        .map_err(|e| CompileError::parser(format!("{e}"), error_span(&e)))
}

/// Parse a single expression, as written in an assertion or contract
pub fn parse_expr(source: &str) -> Result<ExprRef> {
    let tokens = tokenize(source)?;
    grammar::ExprParser::new()
        .parse(token_stream(tokens))
        .map_err(|e| CompileError::parser(format!("{e}"), error_span(&e)))
}
