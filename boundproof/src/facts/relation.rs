//! Relations between two integer-valued expressions

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::ast::{BinaryOp, CanonicalKey, Expr, ExprRef, UnaryOp, canonical_key};

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CmpOp {
    Lt, // <
    Le, // <=
    Eq, // ==
    Ge, // >=
    Gt, // >
    Ne, // !=
}

impl CmpOp {
    pub fn from_binary(op: BinaryOp) -> Option<CmpOp> {
        let op = match op {
            BinaryOp::Lt => CmpOp::Lt,
            BinaryOp::Le => CmpOp::Le,
            BinaryOp::Eq => CmpOp::Eq,
            BinaryOp::Ge => CmpOp::Ge,
            BinaryOp::Gt => CmpOp::Gt,
            BinaryOp::Ne => CmpOp::Ne,
            _ => return None,
        };
        Some(op)
    }

    pub fn to_binary(self) -> BinaryOp {
        match self {
            CmpOp::Lt => BinaryOp::Lt,
            CmpOp::Le => BinaryOp::Le,
            CmpOp::Eq => BinaryOp::Eq,
            CmpOp::Ge => BinaryOp::Ge,
            CmpOp::Gt => BinaryOp::Gt,
            CmpOp::Ne => BinaryOp::Ne,
        }
    }

    /// Negate the comparison operator
    pub fn negate(self) -> Self {
        match self {
            CmpOp::Lt => CmpOp::Ge,
            CmpOp::Le => CmpOp::Gt,
            CmpOp::Gt => CmpOp::Le,
            CmpOp::Ge => CmpOp::Lt,
            CmpOp::Eq => CmpOp::Ne,
            CmpOp::Ne => CmpOp::Eq,
        }
    }

    /// Flip the operands (swap lhs and rhs)
    pub fn flip(self) -> Self {
        match self {
            CmpOp::Lt => CmpOp::Gt,
            CmpOp::Le => CmpOp::Ge,
            CmpOp::Gt => CmpOp::Lt,
            CmpOp::Ge => CmpOp::Le,
            CmpOp::Eq => CmpOp::Eq,
            CmpOp::Ne => CmpOp::Ne,
        }
    }

    pub fn is_strict(self) -> bool {
        matches!(self, CmpOp::Lt | CmpOp::Gt)
    }

    pub fn mask(self) -> Orderings {
        match self {
            CmpOp::Lt => Orderings::LESS,
            CmpOp::Le => Orderings::LESS.union(Orderings::EQUAL),
            CmpOp::Eq => Orderings::EQUAL,
            CmpOp::Ge => Orderings::EQUAL.union(Orderings::GREATER),
            CmpOp::Gt => Orderings::GREATER,
            CmpOp::Ne => Orderings::LESS.union(Orderings::GREATER),
        }
    }

    /// The operator allowing exactly `mask`; `None` for the empty and full sets
    pub fn from_mask(mask: Orderings) -> Option<CmpOp> {
        [CmpOp::Lt, CmpOp::Le, CmpOp::Eq, CmpOp::Ge, CmpOp::Gt, CmpOp::Ne]
            .into_iter()
            .find(|op| op.mask() == mask)
    }

    /// Decide the comparison between two known values
    pub fn eval(self, a: i128, b: i128) -> bool {
        match self {
            CmpOp::Lt => a < b,
            CmpOp::Le => a <= b,
            CmpOp::Eq => a == b,
            CmpOp::Ge => a >= b,
            CmpOp::Gt => a > b,
            CmpOp::Ne => a != b,
        }
    }
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_binary().symbol())
    }
}

/// Subset of {less, equal, greater}: the orderings of `lhs` against `rhs`
/// that are still possible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Orderings(u8);

impl Orderings {
    pub const NONE: Orderings = Orderings(0);
    pub const LESS: Orderings = Orderings(0b001);
    pub const EQUAL: Orderings = Orderings(0b010);
    pub const GREATER: Orderings = Orderings(0b100);
    pub const ALL: Orderings = Orderings(0b111);

    pub const fn union(self, other: Orderings) -> Orderings {
        Orderings(self.0 | other.0)
    }

    pub const fn intersect(self, other: Orderings) -> Orderings {
        Orderings(self.0 & other.0)
    }

    pub fn is_subset_of(self, other: Orderings) -> bool {
        self.0 & !other.0 == 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// The same orderings seen from the other side
    pub fn flip(self) -> Orderings {
        let less = self.0 & 0b001;
        let greater = self.0 & 0b100;
        Orderings((self.0 & 0b010) | (less << 2) | (greater >> 2))
    }
}

/// `lhs op rhs`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Relation {
    pub lhs: ExprRef,
    pub op: CmpOp,
    pub rhs: ExprRef,
}

impl Relation {
    pub fn new(lhs: ExprRef, op: CmpOp, rhs: ExprRef) -> Self {
        Self { lhs, op, rhs }
    }

    /// Read a comparison expression as a relation. `not (a < b)` reads as
    /// `a >= b`.
    pub fn from_expr(expr: &ExprRef) -> Option<Relation> {
        match expr.as_ref() {
            Expr::Binary { op, lhs, rhs } => Some(Relation::new(
                Arc::clone(lhs),
                CmpOp::from_binary(*op)?,
                Arc::clone(rhs),
            )),
            Expr::Unary {
                op: UnaryOp::Not,
                operand,
            } => Relation::from_expr(operand).map(|r| r.negated()),
            _ => None,
        }
    }

    pub fn to_expr(&self) -> ExprRef {
        Expr::binary(self.op.to_binary(), Arc::clone(&self.lhs), Arc::clone(&self.rhs))
    }

    /// `b op' a`, with the same meaning
    pub fn flipped(&self) -> Relation {
        Relation::new(Arc::clone(&self.rhs), self.op.flip(), Arc::clone(&self.lhs))
    }

    /// The relation that holds exactly when this one does not
    pub fn negated(&self) -> Relation {
        Relation::new(Arc::clone(&self.lhs), self.op.negate(), Arc::clone(&self.rhs))
    }

    pub fn keys(&self) -> (CanonicalKey, CanonicalKey) {
        (canonical_key(&self.lhs), canonical_key(&self.rhs))
    }

    /// Both sides fold to constants: the relation's truth value
    pub fn const_truth(&self) -> Option<bool> {
        let a = self.lhs.const_value()?;
        let b = self.rhs.const_value()?;
        Some(self.op.eval(a, b))
    }

    /// Move constant offsets onto a constant side: `(i - 1) < 16` becomes
    /// `i < 17`. Relations without a constant side are returned unchanged.
    pub fn fold_offsets(&self) -> Relation {
        let mut out = self.clone();
        loop {
            if let Some(folded) = fold_lhs_offset(&out) {
                out = folded;
            } else if let Some(folded) = fold_lhs_offset(&out.flipped()) {
                out = folded.flipped();
            } else {
                return out;
            }
        }
    }

    /// Does rewriting `variable` change what this relation says?
    pub fn mentions(&self, variable: &str) -> bool {
        self.lhs.mentions(variable) || self.rhs.mentions(variable)
    }
}

/// `(x + k) op c` to `x op (c - k)` and `(x - k) op c` to `x op (c + k)`
fn fold_lhs_offset(relation: &Relation) -> Option<Relation> {
    let c = relation.rhs.const_value()?;
    let Expr::Binary { op, lhs, rhs } = relation.lhs.as_ref() else {
        return None;
    };
    let (x, c) = match op {
        BinaryOp::Add => match (lhs.const_value(), rhs.const_value()) {
            (None, Some(k)) => (lhs, c.checked_sub(k)?),
            (Some(k), None) => (rhs, c.checked_sub(k)?),
            _ => return None,
        },
        BinaryOp::Sub => (lhs, c.checked_add(rhs.const_value()?)?),
        _ => return None,
    };
    Some(Relation::new(Arc::clone(x), relation.op, Expr::int(c)))
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_expr())
    }
}

/// Direction-normalised identity of a relation's two sides: `left <= right`
/// in key order, so `a < b` and `b > a` share one key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PairKey {
    pub left: CanonicalKey,
    pub right: CanonicalKey,
}

impl PairKey {
    /// Normalise `relation`, returning the key and the orderings it allows
    /// of `left` against `right`, and whether the sides were swapped.
    pub fn of(relation: &Relation) -> (PairKey, Orderings, bool) {
        let (lhs, rhs) = relation.keys();
        let mask = relation.op.mask();
        if lhs <= rhs {
            (PairKey { left: lhs, right: rhs }, mask, false)
        } else {
            (PairKey { left: rhs, right: lhs }, mask.flip(), true)
        }
    }

    pub fn is_reflexive(&self) -> bool {
        self.left == self.right
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_expr;

    fn rel(source: &str) -> Relation {
        Relation::from_expr(&parse_expr(source).unwrap()).unwrap()
    }

    #[test]
    fn test_flip_and_negate_are_involutions() {
        for op in [CmpOp::Lt, CmpOp::Le, CmpOp::Eq, CmpOp::Ge, CmpOp::Gt, CmpOp::Ne] {
            assert_eq!(op.flip().flip(), op);
            assert_eq!(op.negate().negate(), op);
            assert_eq!(op.flip().mask(), op.mask().flip());
            assert_eq!(CmpOp::from_mask(op.mask()), Some(op));
        }
        assert_eq!(CmpOp::from_mask(Orderings::ALL), None);
        assert_eq!(CmpOp::from_mask(Orderings::NONE), None);
    }

    #[test]
    fn test_masks_cover_the_six_operators() {
        assert_eq!(CmpOp::Lt.mask().union(CmpOp::Eq.mask()), CmpOp::Le.mask());
        assert!(CmpOp::Lt.mask().is_subset_of(CmpOp::Ne.mask()));
        assert!(!CmpOp::Le.mask().is_subset_of(CmpOp::Lt.mask()));
        assert!(CmpOp::Lt.mask().intersect(CmpOp::Ge.mask()).is_empty());
    }

    #[test]
    fn test_pair_key_normalises_direction() {
        let (k1, m1, _) = PairKey::of(&rel("a < b"));
        let (k2, m2, swapped) = PairKey::of(&rel("b > a"));
        assert_eq!(k1, k2);
        assert_eq!(m1, m2);
        assert!(swapped);
    }

    #[test]
    fn test_pair_key_is_canonical() {
        let (k1, _, _) = PairKey::of(&rel("(x + y) < n"));
        let (k2, _, _) = PairKey::of(&rel("n > (y + x)"));
        assert_eq!(k1, k2);
    }

    #[test]
    fn test_from_expr_reads_negation() {
        let r = rel("not (i < n)");
        assert_eq!(r.op, CmpOp::Ge);
        assert_eq!(r.to_string(), "i >= n");
        assert!(Relation::from_expr(&parse_expr("x + y").unwrap()).is_none());
    }

    #[test]
    fn test_fold_offsets() {
        assert_eq!(rel("(i - 1) < 16").fold_offsets().to_string(), "i < 17");
        assert_eq!(rel("16 > (i + 1)").fold_offsets().to_string(), "15 > i");
        assert_eq!(rel("(2 + i) <= 10").fold_offsets().to_string(), "i <= 8");
        assert_eq!(rel("(i - 1) < n").fold_offsets().to_string(), "(i - 1) < n");
        assert_eq!(rel("((i + 1) - 2) == 5").fold_offsets().to_string(), "i == 6");
    }

    #[test]
    fn test_const_truth() {
        assert_eq!(rel("3 < 4").const_truth(), Some(true));
        assert_eq!(rel("(2 * 8) != 16").const_truth(), Some(false));
        assert_eq!(rel("x < 4").const_truth(), None);
    }
}
