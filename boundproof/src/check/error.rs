//! Per-function checking errors

use thiserror::Error;

use crate::ast::Span;
use crate::prove::{Mismatch, Requirement};

/// The first error found in a function body; checking of that function
/// stops there.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckError {
    #[error("cannot prove {requirement}: `{relation}`")]
    Unprovable {
        requirement: Requirement,
        relation: String,
        span: Span,
    },

    #[error("reason {reason:?} does not apply to `{relation}`: {detail}")]
    ReasonMismatch {
        reason: String,
        relation: String,
        detail: Mismatch,
        span: Span,
    },

    #[error("no reason is named {reason:?}")]
    UnknownReason { reason: String, span: Span },

    #[error("`{inserted}` contradicts the known fact `{existing}`")]
    Inconsistent {
        existing: String,
        inserted: String,
        span: Span,
    },

    #[error("`{expr}` is not a comparison")]
    NotARelation { expr: String, span: Span },

    #[error("unknown variable `{name}`")]
    UnknownVariable { name: String, span: Span },

    #[error("unknown function `{name}`")]
    UnknownFunction { name: String, span: Span },

    #[error("a call to `{function}` must name each of its parameters once")]
    CallArguments { function: String, span: Span },

    #[error("`{target}` cannot be assigned to")]
    NotAssignable { target: String, span: Span },

    #[error("an assertion with a reason must be a single comparison")]
    ReasonArity { span: Span },
}

impl CheckError {
    pub fn span(&self) -> Span {
        match self {
            CheckError::Unprovable { span, .. }
            | CheckError::ReasonMismatch { span, .. }
            | CheckError::UnknownReason { span, .. }
            | CheckError::Inconsistent { span, .. }
            | CheckError::NotARelation { span, .. }
            | CheckError::UnknownVariable { span, .. }
            | CheckError::UnknownFunction { span, .. }
            | CheckError::CallArguments { span, .. }
            | CheckError::NotAssignable { span, .. }
            | CheckError::ReasonArity { span } => *span,
        }
    }
}
