//! Error types and reporting

use crate::ast::Span;
use crate::check::CheckError;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, CompileError>;

/// Anything that stops a source file from being checked, plus the
/// per-function proof failures once it has been.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("Lexer error at {span:?}: {message}")]
    Lexer { message: String, span: Span },

    #[error("Parser error at {span:?}: {message}")]
    Parser { message: String, span: Span },

    #[error("IO error: {message}")]
    Io { message: String },

    /// Malformed `boundproof.toml`
    #[error("Config error: {message}")]
    Config { message: String },

    #[error("in `{function}`: {error}")]
    Check { function: String, error: CheckError },
}

impl CompileError {
    pub fn lexer(message: impl Into<String>, span: Span) -> Self {
        Self::Lexer {
            message: message.into(),
            span,
        }
    }

    pub fn parser(message: impl Into<String>, span: Span) -> Self {
        Self::Parser {
            message: message.into(),
            span,
        }
    }

    pub fn io_error(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn check(function: impl Into<String>, error: CheckError) -> Self {
        Self::Check {
            function: function.into(),
            error,
        }
    }

    pub fn span(&self) -> Option<Span> {
        match self {
            Self::Lexer { span, .. } | Self::Parser { span, .. } => Some(*span),
            Self::Check { error, .. } => Some(error.span()),
            Self::Io { .. } | Self::Config { .. } => None,
        }
    }

    pub fn message(&self) -> String {
        match self {
            Self::Lexer { message, .. }
            | Self::Parser { message, .. }
            | Self::Io { message }
            | Self::Config { message } => message.clone(),
            Self::Check { error, .. } => error.to_string(),
        }
    }

    fn kind(&self) -> String {
        match self {
            Self::Lexer { .. } => "Lexer error".to_string(),
            Self::Parser { .. } => "Parser error".to_string(),
            Self::Io { .. } => "IO error".to_string(),
            Self::Config { .. } => "Config error".to_string(),
            Self::Check { function, .. } => format!("Proof error in `{function}`"),
        }
    }
}

/// Report error with ariadne
pub fn report_error(filename: &str, source: &str, error: &CompileError) {
    use ariadne::{Color, Label, Report, ReportKind, Source};

    let kind = error.kind();
    let report = if let Some(span) = error.span() {
        Report::build(ReportKind::Error, (filename, span.start..span.end))
            .with_message(kind)
            .with_label(
                Label::new((filename, span.start..span.end))
                    .with_message(error.message())
                    .with_color(Color::Red),
            )
            .finish()
    } else {
        // IO and config errors carry no span
        Report::build(ReportKind::Error, (filename, 0..0))
            .with_message(format!("{kind}: {}", error.message()))
            .finish()
    };

    if report.eprint((filename, Source::from(source))).is_err() {
        eprintln!("{filename}: {error}");
    }
}
