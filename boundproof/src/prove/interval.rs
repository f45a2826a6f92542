//! Interval bounds derived from types, literals and constant facts
//!
//! All arithmetic is checked: an operation that could overflow `i128`, or
//! whose result range is not known, gives no interval at all.

use std::collections::HashMap;
use std::sync::Arc;

use crate::ast::{AssocOp, BinaryOp, Expr, TypeExpr, UnaryOp, canonical_key};
use crate::facts::FactStore;

/// Declared types of the variables in scope
pub trait TypeEnv {
    fn type_of(&self, name: &str) -> Option<Arc<TypeExpr>>;

    /// Declared result type of a function
    fn result_type(&self, _function: &str) -> Option<Arc<TypeExpr>> {
        None
    }
}

impl TypeEnv for HashMap<String, Arc<TypeExpr>> {
    fn type_of(&self, name: &str) -> Option<Arc<TypeExpr>> {
        self.get(name).cloned()
    }
}

/// Inclusive range `[lo, hi]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    pub lo: i128,
    pub hi: i128,
}

impl Interval {
    pub fn new(lo: i128, hi: i128) -> Self {
        Self { lo, hi }
    }

    pub fn point(v: i128) -> Self {
        Self { lo: v, hi: v }
    }

    fn from_bounds((lo, hi): (i128, i128)) -> Self {
        Self { lo, hi }
    }

    /// Narrow by optional bounds; an empty result keeps `self`
    fn narrow(self, lo: Option<i128>, hi: Option<i128>) -> Self {
        let lo = lo.map_or(self.lo, |l| l.max(self.lo));
        let hi = hi.map_or(self.hi, |h| h.min(self.hi));
        if lo <= hi { Interval { lo, hi } } else { self }
    }

    fn from_corners(values: [Option<i128>; 4]) -> Option<Self> {
        let mut lo = i128::MAX;
        let mut hi = i128::MIN;
        for v in values {
            let v = v?;
            lo = lo.min(v);
            hi = hi.max(v);
        }
        Some(Interval { lo, hi })
    }

    fn add(self, other: Interval) -> Option<Interval> {
        Some(Interval::new(
            self.lo.checked_add(other.lo)?,
            self.hi.checked_add(other.hi)?,
        ))
    }

    fn sub(self, other: Interval) -> Option<Interval> {
        Some(Interval::new(
            self.lo.checked_sub(other.hi)?,
            self.hi.checked_sub(other.lo)?,
        ))
    }

    fn mul(self, other: Interval) -> Option<Interval> {
        Interval::from_corners([
            self.lo.checked_mul(other.lo),
            self.lo.checked_mul(other.hi),
            self.hi.checked_mul(other.lo),
            self.hi.checked_mul(other.hi),
        ])
    }

    fn div(self, other: Interval) -> Option<Interval> {
        if other.lo <= 0 {
            return None;
        }
        Interval::from_corners([
            self.lo.checked_div(other.lo),
            self.lo.checked_div(other.hi),
            self.hi.checked_div(other.lo),
            self.hi.checked_div(other.hi),
        ])
    }

    fn rem(self, other: Interval) -> Option<Interval> {
        if self.lo < 0 || other.lo <= 0 {
            return None;
        }
        Some(Interval::new(0, self.hi.min(other.hi - 1)))
    }

    fn shl(self, other: Interval) -> Option<Interval> {
        if self.lo < 0 || other.lo < 0 || other.hi >= 127 {
            return None;
        }
        let shift = |v: i128, s: i128| {
            let r = v.checked_shl(s as u32)?;
            (r >> s == v).then_some(r)
        };
        Some(Interval::new(shift(self.lo, other.lo)?, shift(self.hi, other.hi)?))
    }

    fn shr(self, other: Interval) -> Option<Interval> {
        if self.lo < 0 || other.lo < 0 {
            return None;
        }
        let shift = |v: i128, s: i128| if s >= 127 { 0 } else { v >> s };
        Some(Interval::new(shift(self.lo, other.hi), shift(self.hi, other.lo)))
    }

    fn bit_and(self, other: Interval) -> Option<Interval> {
        match (self.lo >= 0, other.lo >= 0) {
            (true, true) => Some(Interval::new(0, self.hi.min(other.hi))),
            (true, false) => Some(Interval::new(0, self.hi)),
            (false, true) => Some(Interval::new(0, other.hi)),
            (false, false) => None,
        }
    }

    fn neg(self) -> Option<Interval> {
        Some(Interval::new(self.hi.checked_neg()?, self.lo.checked_neg()?))
    }
}

/// Computes intervals against one fact store and type environment
pub struct IntervalEval<'a> {
    pub facts: &'a FactStore,
    pub types: &'a dyn TypeEnv,
}

impl IntervalEval<'_> {
    /// The range of values `expr` can take, if it is bounded on both sides
    pub fn eval(&self, expr: &Expr) -> Option<Interval> {
        if let Some(v) = expr.const_value() {
            return Some(Interval::point(v));
        }
        let (fact_lo, fact_hi) = self.facts.constant_bounds(&canonical_key(expr));
        if fact_lo.zip(fact_hi).is_some_and(|(lo, hi)| lo > hi) {
            return None;
        }
        match self.structural(expr) {
            Some(interval) => Some(interval.narrow(fact_lo, fact_hi)),
            None => Some(Interval::new(fact_lo?, fact_hi?)),
        }
    }

    fn structural(&self, expr: &Expr) -> Option<Interval> {
        match expr {
            Expr::Ident(name) => self.types.type_of(name)?.range().map(Interval::from_bounds),
            Expr::Unary { op, operand } => {
                let v = self.eval(operand)?;
                match op {
                    UnaryOp::Plus => Some(v),
                    UnaryOp::Neg => v.neg(),
                    UnaryOp::Not => None,
                }
            }
            Expr::Binary { op, lhs, rhs } => {
                let a = self.eval(lhs)?;
                let b = self.eval(rhs)?;
                apply(*op, a, b)
            }
            Expr::Associative { op, args } => {
                if !matches!(op, AssocOp::Add | AssocOp::Mul | AssocOp::BitAnd) {
                    return None;
                }
                let mut values = args.iter().map(|a| self.eval(a));
                let first = values.next()??;
                values.try_fold(first, |acc, v| apply(op.binary_form(), acc, v?))
            }
            Expr::Cast { value, ty } => {
                let range = Interval::from_bounds(ty.range()?);
                match self.eval(value) {
                    Some(v) => Some(range.narrow(Some(v.lo), Some(v.hi))),
                    None => Some(range),
                }
            }
            Expr::Index { base, .. } => {
                let elem = self.static_type(base)?.element()?.range()?;
                Some(Interval::from_bounds(elem))
            }
            Expr::Call { callee, args } => match callee.as_ref() {
                Expr::Ident(function) => {
                    self.types.result_type(function)?.range().map(Interval::from_bounds)
                }
                Expr::Field { base, name } if name == "length" && args.is_empty() => {
                    let ty = self.static_type(base);
                    match ty.as_deref().and_then(TypeExpr::array_len) {
                        Some(n) => Some(Interval::point(n)),
                        None => Some(Interval::new(0, u64::MAX as i128)),
                    }
                }
                _ => None,
            },
            _ => None,
        }
    }

    /// Declared type of a variable, seen through pointers
    fn static_type(&self, expr: &Expr) -> Option<Arc<TypeExpr>> {
        let ty = self.types.type_of(expr.as_ident()?)?;
        match ty.as_ref() {
            TypeExpr::Ptr(inner) => Some(Arc::clone(inner)),
            _ => Some(ty),
        }
    }
}

fn apply(op: BinaryOp, a: Interval, b: Interval) -> Option<Interval> {
    match op {
        BinaryOp::Add => a.add(b),
        BinaryOp::Sub => a.sub(b),
        BinaryOp::Mul => a.mul(b),
        BinaryOp::Div => a.div(b),
        BinaryOp::Rem => a.rem(b),
        BinaryOp::Shl => a.shl(b),
        BinaryOp::Shr => a.shr(b),
        BinaryOp::BitAnd => a.bit_and(b),
        _ => None,
    }
}
