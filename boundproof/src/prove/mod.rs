//! Requirement prover
//!
//! Decides whether a relation follows from the facts known at a program
//! point. Strategies are tried in a fixed order and each is bounded, so a
//! proof attempt always terminates:
//!
//! 1. identity: reflexivity, or both sides are constants
//! 2. fact lookup, then a bounded transitive chase over stored facts
//! 3. interval bounds from types, literals and constant facts
//! 4. an explicit reason named by the assertion, whose sub-requirements are
//!    proved with 1-3 only

mod interval;

pub use interval::{Interval, IntervalEval, TypeEnv};
pub use crate::reasons::Mismatch;

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::trace;

use crate::ast::{BinaryOp, CanonicalKey, Expr, ExprRef, ReasonRef, Span, canonical_key};
use crate::check::CheckError;
use crate::config::ProverConfig;
use crate::facts::{CmpOp, FactStore, Orderings, PairKey, Relation};
use crate::reasons::ReasonLibrary;

// ============================================================================
// Outcomes
// ============================================================================

/// Which strategy closed a proof
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Strategy {
    Identity,
    Fact,
    Transitive,
    Interval,
    Reason,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Strategy::Identity => "identity",
            Strategy::Fact => "fact",
            Strategy::Transitive => "transitive",
            Strategy::Interval => "interval",
            Strategy::Reason => "reason",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProofOutcome {
    Proved(Strategy),
    Unproved,
    /// The named reason does not apply; not the same as a failed proof
    ReasonMismatch(Mismatch),
}

impl ProofOutcome {
    pub fn is_proved(&self) -> bool {
        matches!(self, ProofOutcome::Proved(_))
    }
}

/// Why a relation has to hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Requirement {
    IndexInBounds,
    SliceBounds,
    FitsType,
    Assertion,
    InvariantOnEntry,
    InvariantPreserved,
    Postcondition,
    CallPrecondition,
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Requirement::IndexInBounds => "index in bounds",
            Requirement::SliceBounds => "slice bounds",
            Requirement::FitsType => "value fits its type",
            Requirement::Assertion => "assertion",
            Requirement::InvariantOnEntry => "loop invariant on entry",
            Requirement::InvariantPreserved => "loop invariant after the body",
            Requirement::Postcondition => "postcondition",
            Requirement::CallPrecondition => "precondition of the called function",
        };
        f.write_str(text)
    }
}

/// A relation that must be proved at a source location
#[derive(Debug, Clone)]
pub struct Obligation {
    pub relation: Relation,
    pub requirement: Requirement,
    pub span: Span,
}

impl Obligation {
    pub fn new(relation: Relation, requirement: Requirement, span: Span) -> Self {
        Self {
            relation,
            requirement,
            span,
        }
    }
}

// ============================================================================
// Prover
// ============================================================================

/// Proves relations against one fact store and type environment
pub struct Prover<'a> {
    facts: &'a FactStore,
    types: &'a dyn TypeEnv,
    config: ProverConfig,
}

impl<'a> Prover<'a> {
    pub fn new(facts: &'a FactStore, types: &'a dyn TypeEnv, config: ProverConfig) -> Self {
        Self {
            facts,
            types,
            config,
        }
    }

    /// Try to prove `target`. A reason in `hint` must name a table entry
    /// that applies to `target` even when the automatic strategies succeed;
    /// its sub-requirements are only tried when they fail.
    pub fn prove(&self, target: &Relation, hint: Option<&ReasonRef>) -> ProofOutcome {
        let subs = match hint.map(|hint| {
            ReasonLibrary::resolve(&hint.name.node)
                .and_then(|reason| reason.decompose(target, &hint.args))
        }) {
            None => None,
            Some(Ok(subs)) => Some(subs),
            Some(Err(mismatch)) => {
                trace!(%target, %mismatch, "reason does not apply");
                return ProofOutcome::ReasonMismatch(mismatch);
            }
        };

        if let Some(strategy) = self.prove_automatic(target) {
            trace!(%target, %strategy, "proved");
            return ProofOutcome::Proved(strategy);
        }
        let (Some(hint), Some(subs)) = (hint, subs) else {
            trace!(%target, "unproved");
            return ProofOutcome::Unproved;
        };

        for sub in &subs {
            if self.prove_automatic(sub).is_none() {
                trace!(%target, sub = %sub, reason = %hint.name.node, "sub-requirement unproved");
                return ProofOutcome::Unproved;
            }
        }
        trace!(%target, reason = %hint.name.node, "proved by reason");
        ProofOutcome::Proved(Strategy::Reason)
    }

    /// Prove an obligation, turning failure into a diagnostic
    pub fn discharge(
        &self,
        obligation: &Obligation,
        hint: Option<&ReasonRef>,
    ) -> Result<Strategy, CheckError> {
        let relation = &obligation.relation;
        match self.prove(relation, hint) {
            ProofOutcome::Proved(strategy) => Ok(strategy),
            ProofOutcome::Unproved => Err(CheckError::Unprovable {
                requirement: obligation.requirement,
                relation: relation.to_string(),
                span: obligation.span,
            }),
            ProofOutcome::ReasonMismatch(Mismatch::UnknownReason { name }) => {
                Err(CheckError::UnknownReason {
                    reason: name,
                    span: hint.map_or(obligation.span, |h| h.name.span),
                })
            }
            ProofOutcome::ReasonMismatch(detail) => Err(CheckError::ReasonMismatch {
                reason: hint.map(|h| h.name.node.clone()).unwrap_or_default(),
                relation: relation.to_string(),
                detail,
                span: obligation.span,
            }),
        }
    }

    /// Strategies 1-3, without any reason
    fn prove_automatic(&self, target: &Relation) -> Option<Strategy> {
        if self.by_identity(target) {
            return Some(Strategy::Identity);
        }
        let variants = equivalents(target);
        if variants.iter().any(|v| self.facts.lookup(v)) {
            return Some(Strategy::Fact);
        }
        if variants.iter().any(|v| self.chase(v)) {
            return Some(Strategy::Transitive);
        }
        if self.by_interval(target) {
            return Some(Strategy::Interval);
        }
        None
    }

    fn by_identity(&self, target: &Relation) -> bool {
        if let Some(truth) = target.const_truth() {
            return truth;
        }
        let (key, mask, _) = PairKey::of(target);
        key.is_reflexive() && Orderings::EQUAL.is_subset_of(mask)
    }

    fn by_interval(&self, target: &Relation) -> bool {
        let eval = IntervalEval {
            facts: self.facts,
            types: self.types,
        };
        let (Some(a), Some(b)) = (eval.eval(&target.lhs), eval.eval(&target.rhs)) else {
            return false;
        };
        match target.op {
            CmpOp::Lt => a.hi < b.lo,
            CmpOp::Le => a.hi <= b.lo,
            CmpOp::Gt => a.lo > b.hi,
            CmpOp::Ge => a.lo >= b.hi,
            CmpOp::Eq => a.lo == a.hi && b.lo == b.hi && a.lo == b.lo,
            CmpOp::Ne => a.hi < b.lo || b.hi < a.lo,
        }
    }

    // ------------------------------------------------------------------------
    // Transitive chase
    // ------------------------------------------------------------------------

    /// Walk upward from the left side along `<`, `<=` and `==` facts until
    /// the right side is reached.
    fn chase(&self, target: &Relation) -> bool {
        let target = match target.op {
            CmpOp::Gt | CmpOp::Ge => target.flipped(),
            CmpOp::Ne => {
                let below = Relation::new(Arc::clone(&target.lhs), CmpOp::Lt, Arc::clone(&target.rhs));
                let above = Relation::new(Arc::clone(&target.rhs), CmpOp::Lt, Arc::clone(&target.lhs));
                return self.chase(&below) || self.chase(&above);
            }
            _ => target.clone(),
        };
        let goal = Goal {
            op: target.op,
            rhs: &target.rhs,
            rhs_key: canonical_key(&target.rhs),
            rhs_value: target.rhs.const_value(),
        };
        let start = canonical_key(&target.lhs);
        let mut path = vec![start.clone()];
        self.walk(&target.lhs, &start, false, &goal, &mut path)
    }

    fn walk(
        &self,
        x: &ExprRef,
        x_key: &CanonicalKey,
        strict: bool,
        goal: &Goal<'_>,
        path: &mut Vec<CanonicalKey>,
    ) -> bool {
        let used = path.len() - 1;
        let needed = match goal.op {
            CmpOp::Eq => CmpOp::Eq,
            CmpOp::Lt if !strict => CmpOp::Lt,
            _ => CmpOp::Le,
        };

        if used > 0 {
            let last_hop = Relation::new(Arc::clone(x), needed, Arc::clone(goal.rhs));
            if x_key == &goal.rhs_key && needed != CmpOp::Lt {
                return true;
            }
            if goal
                .rhs_value
                .is_some_and(|c| self.closes_by_range(x, needed, c))
            {
                return true;
            }
            if used < self.config.chase_depth && self.facts.lookup(&last_hop) {
                return true;
            }
        }
        if used >= self.config.chase_depth {
            return false;
        }

        let edges: Vec<Relation> = self
            .facts
            .facts_about(x_key)
            .filter(|edge| match goal.op {
                CmpOp::Eq => edge.op == CmpOp::Eq,
                _ => matches!(edge.op, CmpOp::Lt | CmpOp::Le | CmpOp::Eq),
            })
            .take(self.config.chase_fanout)
            .collect();
        for edge in edges {
            let y_key = canonical_key(&edge.rhs);
            if path.contains(&y_key) {
                continue;
            }
            path.push(y_key.clone());
            let found = self.walk(&edge.rhs, &y_key, strict || edge.op == CmpOp::Lt, goal, path);
            path.pop();
            if found {
                return true;
            }
        }
        false
    }

    /// Close a chain against a constant using the range of its last node
    fn closes_by_range(&self, x: &Expr, needed: CmpOp, c: i128) -> bool {
        let eval = IntervalEval {
            facts: self.facts,
            types: self.types,
        };
        let Some(range) = eval.eval(x) else {
            return false;
        };
        match needed {
            CmpOp::Lt => range.hi < c,
            CmpOp::Le => range.hi <= c,
            CmpOp::Eq => range.lo == c && range.hi == c,
            _ => false,
        }
    }
}

/// Right end of a chase
struct Goal<'e> {
    op: CmpOp,
    rhs: &'e ExprRef,
    rhs_key: CanonicalKey,
    rhs_value: Option<i128>,
}

// ============================================================================
// Integer equivalents
// ============================================================================

/// `target` and the forms that say the same over the integers:
/// `a < b`, `(a + 1) <= b` and `a <= (b - 1)` are one relation. `>` and `>=`
/// targets are flipped first.
fn equivalents(target: &Relation) -> Vec<Relation> {
    let base = match target.op {
        CmpOp::Gt | CmpOp::Ge => target.flipped(),
        _ => target.clone(),
    };
    let (a, b) = (&base.lhs, &base.rhs);
    let mut out = Vec::with_capacity(5);
    match base.op {
        CmpOp::Lt => {
            out.push(Relation::new(offset(a, BinaryOp::Add), CmpOp::Le, Arc::clone(b)));
            out.push(Relation::new(Arc::clone(a), CmpOp::Le, offset(b, BinaryOp::Sub)));
            if let Some(c) = strip_offset(b, 1) {
                out.push(Relation::new(Arc::clone(a), CmpOp::Le, c));
            }
            if let Some(c) = strip_offset(a, -1) {
                out.push(Relation::new(c, CmpOp::Le, Arc::clone(b)));
            }
        }
        CmpOp::Le => {
            out.push(Relation::new(offset(a, BinaryOp::Sub), CmpOp::Lt, Arc::clone(b)));
            out.push(Relation::new(Arc::clone(a), CmpOp::Lt, offset(b, BinaryOp::Add)));
            if let Some(c) = strip_offset(b, -1) {
                out.push(Relation::new(Arc::clone(a), CmpOp::Lt, c));
            }
            if let Some(c) = strip_offset(a, 1) {
                out.push(Relation::new(c, CmpOp::Lt, Arc::clone(b)));
            }
        }
        _ => {}
    }
    out.insert(0, base);
    out
}

/// `e + 1` or `e - 1`
fn offset(e: &ExprRef, op: BinaryOp) -> ExprRef {
    Expr::binary(op, Arc::clone(e), Expr::int(1))
}

/// If `e` is `c + k`, `k + c` or `c - (-k)`, return `c`
fn strip_offset(e: &ExprRef, k: i128) -> Option<ExprRef> {
    let Expr::Binary { op, lhs, rhs } = e.as_ref() else {
        return None;
    };
    match op {
        BinaryOp::Add if rhs.const_value() == Some(k) => Some(Arc::clone(lhs)),
        BinaryOp::Add if lhs.const_value() == Some(k) => Some(Arc::clone(rhs)),
        BinaryOp::Sub if rhs.const_value() == k.checked_neg() => Some(Arc::clone(lhs)),
        _ => None,
    }
}
