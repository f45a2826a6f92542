//! Named decomposition rules for `assert ... via "reason"(...)`
//!
//! A reason turns one target relation into sub-requirements that are easier
//! for the prover. The table is closed: the name written after `via` must be
//! one of the strings below, character for character.

use std::sync::Arc;

use thiserror::Error;

use crate::ast::{BinaryOp, CallArg, Expr, ExprRef};
use crate::facts::{CmpOp, Relation};

/// Why a reason could not be applied to an assertion
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Mismatch {
    #[error("no reason is named {name:?}")]
    UnknownReason { name: String },

    #[error("reason {reason:?} proves a `{expected}` relation, not `{found}`")]
    Operator {
        reason: &'static str,
        expected: CmpOp,
        found: CmpOp,
    },

    #[error("reason {reason:?} needs the shape {expected}, found `{found}`")]
    Shape {
        reason: &'static str,
        expected: &'static str,
        found: String,
    },

    #[error("reason {reason:?} needs an argument named `{name}`")]
    MissingArgument {
        reason: &'static str,
        name: &'static str,
    },
}

/// Structure the target relation must have
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// `a ? b`
    Plain,
    /// `a ? (b + c)`, with a binary `+`
    SumRhs,
    /// `(a + b) ? c`, with a binary `+`
    SumLhs,
}

impl Shape {
    fn describe(self) -> &'static str {
        match self {
            Shape::Plain => "`a ? b`",
            Shape::SumRhs => "`a ? (b + c)`",
            Shape::SumLhs => "`(a + b) ? c`",
        }
    }

    /// Name the parts of `target`, or `None` when it has another shape
    fn bind(self, target: &Relation) -> Option<Vec<(&'static str, ExprRef)>> {
        let sum = |e: &ExprRef| match e.as_ref() {
            Expr::Binary {
                op: BinaryOp::Add,
                lhs,
                rhs,
            } => Some((Arc::clone(lhs), Arc::clone(rhs))),
            _ => None,
        };
        let bound = match self {
            Shape::Plain => vec![("a", Arc::clone(&target.lhs)), ("b", Arc::clone(&target.rhs))],
            Shape::SumRhs => {
                let (b, c) = sum(&target.rhs)?;
                vec![("a", Arc::clone(&target.lhs)), ("b", b), ("c", c)]
            }
            Shape::SumLhs => {
                let (a, b) = sum(&target.lhs)?;
                vec![("a", a), ("b", b), ("c", Arc::clone(&target.rhs))]
            }
        };
        Some(bound)
    }
}

/// Values a reason's template variables stand for: first the parts of the
/// matched target, then the assertion's named arguments.
pub struct Bindings<'a> {
    reason: &'static str,
    structural: Vec<(&'static str, ExprRef)>,
    args: &'a [CallArg],
}

impl Bindings<'_> {
    pub fn get(&self, name: &'static str) -> Result<ExprRef, Mismatch> {
        self.structural
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, e)| Arc::clone(e))
            .or_else(|| {
                self.args
                    .iter()
                    .find(|arg| arg.name == name)
                    .map(|arg| Arc::clone(&arg.value))
            })
            .ok_or(Mismatch::MissingArgument {
                reason: self.reason,
                name,
            })
    }

    fn rel(&self, lhs: &'static str, op: CmpOp, rhs: &'static str) -> Result<Relation, Mismatch> {
        Ok(Relation::new(self.get(lhs)?, op, self.get(rhs)?))
    }
}

type Generator = fn(&Bindings<'_>) -> Result<Vec<Relation>, Mismatch>;

/// One entry of the reason table
pub struct Reason {
    pub name: &'static str,
    pub op: CmpOp,
    pub shape: Shape,
    generate: Generator,
}

impl std::fmt::Debug for Reason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reason")
            .field("name", &self.name)
            .field("op", &self.op)
            .field("shape", &self.shape)
            .finish()
    }
}

impl Reason {
    /// Match `target` against this reason and produce its sub-requirements,
    /// in the order they are to be proved.
    pub fn decompose(&self, target: &Relation, args: &[CallArg]) -> Result<Vec<Relation>, Mismatch> {
        if target.op != self.op {
            return Err(Mismatch::Operator {
                reason: self.name,
                expected: self.op,
                found: target.op,
            });
        }
        let structural = self.shape.bind(target).ok_or_else(|| Mismatch::Shape {
            reason: self.name,
            expected: self.shape.describe(),
            found: target.to_string(),
        })?;
        (self.generate)(&Bindings {
            reason: self.name,
            structural,
            args,
        })
    }
}

static REASONS: [Reason; 13] = [
    Reason {
        name: "a < b: b > a",
        op: CmpOp::Lt,
        shape: Shape::Plain,
        generate: |m| Ok(vec![m.rel("b", CmpOp::Gt, "a")?]),
    },
    Reason {
        name: "a < b: a < c; c < b",
        op: CmpOp::Lt,
        shape: Shape::Plain,
        generate: |m| Ok(vec![m.rel("a", CmpOp::Lt, "c")?, m.rel("c", CmpOp::Lt, "b")?]),
    },
    Reason {
        name: "a < b: a < c; c == b",
        op: CmpOp::Lt,
        shape: Shape::Plain,
        generate: |m| Ok(vec![m.rel("a", CmpOp::Lt, "c")?, m.rel("c", CmpOp::Eq, "b")?]),
    },
    Reason {
        name: "a < b: a == c; c < b",
        op: CmpOp::Lt,
        shape: Shape::Plain,
        generate: |m| Ok(vec![m.rel("a", CmpOp::Eq, "c")?, m.rel("c", CmpOp::Lt, "b")?]),
    },
    Reason {
        name: "a < b: a < c; c <= b",
        op: CmpOp::Lt,
        shape: Shape::Plain,
        generate: |m| Ok(vec![m.rel("a", CmpOp::Lt, "c")?, m.rel("c", CmpOp::Le, "b")?]),
    },
    Reason {
        name: "a < b: a <= c; c < b",
        op: CmpOp::Lt,
        shape: Shape::Plain,
        generate: |m| Ok(vec![m.rel("a", CmpOp::Le, "c")?, m.rel("c", CmpOp::Lt, "b")?]),
    },
    Reason {
        name: "a <= b: b >= a",
        op: CmpOp::Le,
        shape: Shape::Plain,
        generate: |m| Ok(vec![m.rel("b", CmpOp::Ge, "a")?]),
    },
    Reason {
        name: "a <= b: a <= c; c <= b",
        op: CmpOp::Le,
        shape: Shape::Plain,
        generate: |m| Ok(vec![m.rel("a", CmpOp::Le, "c")?, m.rel("c", CmpOp::Le, "b")?]),
    },
    Reason {
        name: "a <= b: a <= c; c == b",
        op: CmpOp::Le,
        shape: Shape::Plain,
        generate: |m| Ok(vec![m.rel("a", CmpOp::Le, "c")?, m.rel("c", CmpOp::Eq, "b")?]),
    },
    Reason {
        name: "a <= b: a == c; c <= b",
        op: CmpOp::Le,
        shape: Shape::Plain,
        generate: |m| Ok(vec![m.rel("a", CmpOp::Eq, "c")?, m.rel("c", CmpOp::Le, "b")?]),
    },
    Reason {
        name: "a < (b + c): a < c; 0 <= b",
        op: CmpOp::Lt,
        shape: Shape::SumRhs,
        generate: |m| {
            Ok(vec![
                m.rel("a", CmpOp::Lt, "c")?,
                Relation::new(Expr::int(0), CmpOp::Le, m.get("b")?),
            ])
        },
    },
    Reason {
        name: "a < (b + c): a < (b0 + c0); b0 <= b; c0 <= c",
        op: CmpOp::Lt,
        shape: Shape::SumRhs,
        generate: |m| {
            let (b0, c0) = (m.get("b0")?, m.get("c0")?);
            Ok(vec![
                Relation::new(m.get("a")?, CmpOp::Lt, Expr::binary(BinaryOp::Add, b0, c0)),
                m.rel("b0", CmpOp::Le, "b")?,
                m.rel("c0", CmpOp::Le, "c")?,
            ])
        },
    },
    Reason {
        name: "(a + b) <= c: a <= (c - b)",
        op: CmpOp::Le,
        shape: Shape::SumLhs,
        generate: |m| {
            let c_minus_b = Expr::binary(BinaryOp::Sub, m.get("c")?, m.get("b")?);
            Ok(vec![Relation::new(m.get("a")?, CmpOp::Le, c_minus_b)])
        },
    },
];

/// Lookup into the static reason table
pub struct ReasonLibrary;

impl ReasonLibrary {
    pub fn get(name: &str) -> Option<&'static Reason> {
        REASONS.iter().find(|r| r.name == name)
    }

    /// Like [`ReasonLibrary::get`], reporting an unknown name as a mismatch
    pub fn resolve(name: &str) -> Result<&'static Reason, Mismatch> {
        Self::get(name).ok_or_else(|| Mismatch::UnknownReason {
            name: name.to_string(),
        })
    }

    pub fn names() -> impl Iterator<Item = &'static str> {
        REASONS.iter().map(|r| r.name)
    }
}
