//! Lexer implementation using logos

mod token;

pub use token::Token;

use crate::ast::Span;
use crate::error::{CompileError, Result};
use logos::Logos;

/// Tokenize source code
pub fn tokenize(source: &str) -> Result<Vec<(Token, Span)>> {
    let mut tokens = Vec::new();
    let mut lexer = Token::lexer(source);

    while let Some(result) = lexer.next() {
        let span = Span::new(lexer.span().start, lexer.span().end);
        match result {
            Ok(token) => tokens.push((token, span)),
            Err(_) => {
                return Err(CompileError::lexer(
                    format!("unexpected character: {:?}", lexer.slice()),
                    span,
                ));
            }
        }
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Token> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|(t, _)| t)
            .collect()
    }

    #[test]
    fn test_tokenize_empty() {
        assert!(tokenize("").unwrap().is_empty());
        assert!(tokenize("// only a comment\n").unwrap().is_empty());
    }

    #[test]
    fn test_tokenize_keywords() {
        assert_eq!(
            kinds("func pre post inv var while assert via return"),
            vec![
                Token::Func,
                Token::Pre,
                Token::Post,
                Token::Inv,
                Token::Var,
                Token::While,
                Token::Assert,
                Token::Via,
                Token::Return,
            ]
        );
    }

    #[test]
    fn test_tokenize_integer_literals() {
        assert_eq!(
            kinds("42 1_000 0xFF 0x1_0"),
            vec![
                Token::IntLit(42),
                Token::IntLit(1000),
                Token::IntLit(255),
                Token::IntLit(16),
            ]
        );
    }

    #[test]
    fn test_tokenize_reason_name() {
        let tokens = kinds(r#"via "a < b: a < c; c <= b""#);
        assert_eq!(tokens[0], Token::Via);
        assert_eq!(tokens[1], Token::StrLit("a < b: a < c; c <= b".to_string()));
    }

    #[test]
    fn test_tokenize_longest_match_operators() {
        assert_eq!(
            kinds("&^ & ~+ << <= < .. . += +"),
            vec![
                Token::AmpHat,
                Token::Amp,
                Token::TildePlus,
                Token::LtLt,
                Token::LtEq,
                Token::Lt,
                Token::DotDot,
                Token::Dot,
                Token::PlusEq,
                Token::Plus,
            ]
        );
    }

    #[test]
    fn test_tokenize_refinement() {
        assert_eq!(
            kinds("u32[..100]"),
            vec![
                Token::Ident("u32".to_string()),
                Token::LBracket,
                Token::DotDot,
                Token::IntLit(100),
                Token::RBracket,
            ]
        );
    }

    #[test]
    fn test_tokenize_spans() {
        let tokens = tokenize("a  < b").unwrap();
        assert_eq!(tokens[1].1, Span::new(3, 4));
        assert_eq!(tokens[2].1, Span::new(5, 6));
    }

    #[test]
    fn test_tokenize_rejects_unknown_character() {
        let err = tokenize("x @ y").unwrap_err();
        assert_eq!(err.span(), Some(Span::new(2, 3)));
    }
}
