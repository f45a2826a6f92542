//! The set of relations known to hold at a program point

use std::fmt;

use indexmap::IndexMap;
use thiserror::Error;

use super::{CmpOp, Orderings, PairKey, Relation};
use crate::ast::{CanonicalKey, ExprRef};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FactError {
    #[error("`{inserted}` contradicts the known fact `{existing}`")]
    Contradiction { existing: String, inserted: String },
}

/// Outcome of a successful [`FactStore::insert`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inserted {
    /// No fact about this pair existed
    New,
    /// An existing fact was narrowed, e.g. `a <= b` and `a != b` to `a < b`
    Strengthened,
    /// Implied by what was already known
    AlreadyKnown,
}

/// A fact, oriented so that `relation.lhs` is the pair's left key
#[derive(Debug, Clone)]
struct Fact {
    relation: Relation,
}

/// Relations known to hold, keyed by their direction-normalised sides.
///
/// Each pair keeps the orderings still possible between its sides, so
/// inserting `a <= b` then `a != b` leaves `a < b`. Facts hold `Arc` nodes,
/// so cloning the store copies pointers, never trees.
#[derive(Debug, Clone, Default)]
pub struct FactStore {
    facts: IndexMap<PairKey, Fact>,
}

/// Saved state of a [`FactStore`]
#[derive(Debug, Clone, Default)]
pub struct FactSnapshot(IndexMap<PairKey, Fact>);

impl FactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    /// Record `relation` as holding.
    ///
    /// Relations between two constants, and relations of an expression with
    /// itself, are decided on the spot and never stored.
    pub fn insert(&mut self, relation: Relation) -> Result<Inserted, FactError> {
        let contradiction = |existing: String| FactError::Contradiction {
            existing,
            inserted: relation.to_string(),
        };

        if let Some(truth) = relation.const_truth() {
            return if truth {
                Ok(Inserted::AlreadyKnown)
            } else {
                Err(contradiction("constant arithmetic".to_string()))
            };
        }

        let (key, mask, swapped) = PairKey::of(&relation);
        if key.is_reflexive() {
            return if Orderings::EQUAL.is_subset_of(mask) {
                Ok(Inserted::AlreadyKnown)
            } else {
                Err(contradiction("reflexivity".to_string()))
            };
        }

        let (stored, inserted) = match self.facts.get(&key) {
            None => {
                let oriented = if swapped {
                    relation.flipped()
                } else {
                    relation.clone()
                };
                (oriented, Inserted::New)
            }
            Some(existing) => {
                let old = existing.relation.op.mask();
                let narrowed = old.intersect(mask);
                if narrowed == old {
                    return Ok(Inserted::AlreadyKnown);
                }
                let Some(op) = CmpOp::from_mask(narrowed) else {
                    return Err(contradiction(existing.relation.to_string()));
                };
                let mut stored = existing.relation.clone();
                stored.op = op;
                (stored, Inserted::Strengthened)
            }
        };

        if let Some(existing) = self.conflicting_bound(&stored) {
            return Err(contradiction(existing));
        }
        self.facts.insert(key, Fact { relation: stored });
        Ok(inserted)
    }

    /// A bound already known on the non-constant side of `relation` that
    /// leaves it no possible value, e.g. `x <= 4` against `x > 10`
    fn conflicting_bound(&self, relation: &Relation) -> Option<String> {
        let oriented = if relation.rhs.const_value().is_some() {
            relation.clone()
        } else {
            relation.flipped()
        };
        let c = oriented.rhs.const_value()?;
        let (key, _) = oriented.keys();
        let (old_lo, old_hi) = self.constant_bounds(&key);
        let (new_lo, new_hi) = bounds_against(oriented.op, c);
        match (new_lo, old_hi, old_lo, new_hi) {
            (Some(lo), Some(hi), _, _) if lo > hi => Some(format!("{} <= {hi}", oriented.lhs)),
            (_, _, Some(lo), Some(hi)) if lo > hi => Some(format!("{} >= {lo}", oriented.lhs)),
            _ => None,
        }
    }

    /// Drop every fact that mentions `variable`; returns how many were dropped
    pub fn invalidate(&mut self, variable: &str) -> usize {
        self.invalidate_if(|relation| relation.mentions(variable))
    }

    pub fn invalidate_if(&mut self, stale: impl Fn(&Relation) -> bool) -> usize {
        let before = self.facts.len();
        self.facts.retain(|_, fact| !stale(&fact.relation));
        before - self.facts.len()
    }

    /// Re-express the facts about `variable` after it changes: every
    /// occurrence is replaced with `old_value`, written in terms of the new
    /// value, and constant offsets are folded. For `i += 1` that is
    /// `i - 1`, turning `i < 16` into `i < 17`.
    pub fn rewrite(&mut self, variable: &str, old_value: &ExprRef) -> Result<usize, FactError> {
        let (moved, kept): (IndexMap<_, _>, IndexMap<_, _>) = self
            .facts
            .iter()
            .map(|(key, fact)| (key.clone(), fact.clone()))
            .partition(|(_, fact)| fact.relation.mentions(variable));
        let mut next = FactStore { facts: kept };
        for fact in moved.values() {
            let relation = &fact.relation;
            let rewritten = Relation::new(
                relation.lhs.substitute(variable, old_value),
                relation.op,
                relation.rhs.substitute(variable, old_value),
            );
            next.insert(rewritten.fold_offsets())?;
        }
        *self = next;
        Ok(moved.len())
    }

    /// Is `relation` directly implied by a stored fact about the same pair?
    pub fn lookup(&self, relation: &Relation) -> bool {
        let (key, mask, _) = PairKey::of(relation);
        self.facts
            .get(&key)
            .is_some_and(|fact| fact.relation.op.mask().is_subset_of(mask))
    }

    pub fn snapshot(&self) -> FactSnapshot {
        FactSnapshot(self.facts.clone())
    }

    pub fn restore(&mut self, snapshot: FactSnapshot) {
        self.facts = snapshot.0;
    }

    /// Keep what holds on both this path and `other`: the pairs known on
    /// both, each with the weakest of the two relations.
    pub fn merge(&mut self, other: &FactStore) {
        self.facts.retain(|key, fact| {
            let Some(theirs) = other.facts.get(key) else {
                return false;
            };
            let union = fact.relation.op.mask().union(theirs.relation.op.mask());
            match CmpOp::from_mask(union) {
                Some(op) => {
                    fact.relation.op = op;
                    true
                }
                None => false,
            }
        });
    }

    /// Facts with `key` on either side, oriented so `key` is the left side
    pub fn facts_about<'a>(&'a self, key: &'a CanonicalKey) -> impl Iterator<Item = Relation> + 'a {
        self.facts.iter().filter_map(move |(pair, fact)| {
            if &pair.left == key {
                Some(fact.relation.clone())
            } else if &pair.right == key {
                Some(fact.relation.flipped())
            } else {
                None
            }
        })
    }

    /// Tightest constant bounds on `key` implied by facts against constants
    pub fn constant_bounds(&self, key: &CanonicalKey) -> (Option<i128>, Option<i128>) {
        let mut lo: Option<i128> = None;
        let mut hi: Option<i128> = None;
        for relation in self.facts_about(key) {
            let Some(c) = relation.rhs.const_value() else {
                continue;
            };
            let (l, h) = bounds_against(relation.op, c);
            if let Some(l) = l {
                lo = Some(lo.map_or(l, |v| v.max(l)));
            }
            if let Some(h) = h {
                hi = Some(hi.map_or(h, |v| v.min(h)));
            }
        }
        (lo, hi)
    }

    /// Stored relations in insertion order
    pub fn relations(&self) -> impl Iterator<Item = &Relation> {
        self.facts.values().map(|fact| &fact.relation)
    }
}

/// The facts that hold after either of two paths
pub fn intersect(a: &FactStore, b: &FactStore) -> FactStore {
    let mut out = a.clone();
    out.merge(b);
    out
}

impl fmt::Display for FactStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for relation in self.relations() {
            writeln!(f, "{relation}")?;
        }
        Ok(())
    }
}

/// The constant bounds `x op c` puts on `x`
fn bounds_against(op: CmpOp, c: i128) -> (Option<i128>, Option<i128>) {
    match op {
        CmpOp::Lt => (None, c.checked_sub(1)),
        CmpOp::Le => (None, Some(c)),
        CmpOp::Eq => (Some(c), Some(c)),
        CmpOp::Ge => (Some(c), None),
        CmpOp::Gt => (c.checked_add(1), None),
        CmpOp::Ne => (None, None),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::ast::{Expr, canonical_key};
    use crate::parser::parse_expr;

    fn rel(source: &str) -> Relation {
        Relation::from_expr(&parse_expr(source).unwrap()).unwrap()
    }

    fn store(sources: &[&str]) -> FactStore {
        let mut facts = FactStore::new();
        for s in sources {
            facts.insert(rel(s)).unwrap();
        }
        facts
    }

    #[test]
    fn test_insert_and_lookup_both_directions() {
        let facts = store(&["a < b"]);
        assert!(facts.lookup(&rel("a < b")));
        assert!(facts.lookup(&rel("b > a")));
        assert!(facts.lookup(&rel("a <= b")));
        assert!(facts.lookup(&rel("a != b")));
        assert!(!facts.lookup(&rel("a == b")));
        assert!(!facts.lookup(&rel("a > b")));
        assert!(!facts.lookup(&rel("a < c")));
    }

    #[test]
    fn test_insert_weaker_is_noop() {
        let mut facts = store(&["i < n"]);
        assert_eq!(facts.insert(rel("i <= n")).unwrap(), Inserted::AlreadyKnown);
        assert_eq!(facts.insert(rel("n > i")).unwrap(), Inserted::AlreadyKnown);
        assert_eq!(facts.len(), 1);
    }

    #[test]
    fn test_insert_strengthens() {
        let mut facts = store(&["a <= b"]);
        assert_eq!(facts.insert(rel("b != a")).unwrap(), Inserted::Strengthened);
        assert!(facts.lookup(&rel("a < b")));
        assert_eq!(facts.len(), 1);

        let mut facts = store(&["x >= y"]);
        facts.insert(rel("x <= y")).unwrap();
        assert!(facts.lookup(&rel("x == y")));
    }

    #[test]
    fn test_insert_contradiction_is_rejected() {
        let mut facts = store(&["a < b"]);
        let err = facts.insert(rel("a >= b")).unwrap_err();
        assert_eq!(
            err,
            FactError::Contradiction {
                existing: "a < b".to_string(),
                inserted: "a >= b".to_string(),
            }
        );
        // the store is unchanged
        assert!(facts.lookup(&rel("a < b")));

        let mut facts = store(&["a == b"]);
        assert!(facts.insert(rel("b != a")).is_err());
    }

    #[test]
    fn test_insert_constants_and_reflexive() {
        let mut facts = FactStore::new();
        assert_eq!(facts.insert(rel("1 < 2")).unwrap(), Inserted::AlreadyKnown);
        assert!(facts.insert(rel("2 < 1")).is_err());
        assert_eq!(facts.insert(rel("x <= x")).unwrap(), Inserted::AlreadyKnown);
        assert!(facts.insert(rel("x < x")).is_err());
        assert!(facts.is_empty());
    }

    #[test]
    fn test_commutative_sides_share_key() {
        let facts = store(&["(a + b) < n"]);
        assert!(facts.lookup(&rel("(b + a) < n")));
        assert!(facts.lookup(&rel("n > (b + a)")));
    }

    #[test]
    fn test_invalidate_drops_mentions() {
        let mut facts = store(&["i < n", "j < n", "0 <= i", "a[i] < 10"]);
        assert_eq!(facts.invalidate("i"), 3);
        assert!(facts.lookup(&rel("j < n")));
        assert!(!facts.lookup(&rel("i < n")));
        assert_eq!(facts.invalidate("zzz"), 0);
    }

    #[test]
    fn test_invalidate_if() {
        let mut facts = store(&["i < n", "a[i] < 10", "j < a.length()"]);
        let dropped = facts.invalidate_if(|r| r.to_string().contains('['));
        assert_eq!(dropped, 1);
        assert!(facts.lookup(&rel("j < a.length()")));
    }

    #[test]
    fn test_rewrite_shifts_offsets() {
        let mut facts = store(&["i < 16", "i < n", "0 <= i", "j < n"]);
        let old_i = parse_expr("i - 1").unwrap();
        assert_eq!(facts.rewrite("i", &old_i).unwrap(), 3);
        assert!(facts.lookup(&rel("i < 17")));
        assert!(facts.lookup(&rel("(i - 1) < n")));
        assert!(facts.lookup(&rel("1 <= i")));
        assert!(facts.lookup(&rel("j < n")));
        assert!(!facts.lookup(&rel("i < n")));
    }

    #[test]
    fn test_snapshot_restore() {
        let mut facts = store(&["i < n"]);
        let snap = facts.snapshot();
        facts.insert(rel("j < n")).unwrap();
        facts.invalidate("i");
        facts.restore(snap);
        assert!(facts.lookup(&rel("i < n")));
        assert!(!facts.lookup(&rel("j < n")));
    }

    #[test]
    fn test_snapshot_shares_nodes() {
        let facts = store(&["i < n"]);
        let mut copy = FactStore::new();
        copy.restore(facts.snapshot());
        let a = facts.relations().next().unwrap();
        let b = copy.relations().next().unwrap();
        assert!(Arc::ptr_eq(&a.lhs, &b.lhs));
    }

    #[test]
    fn test_conflicting_constant_bounds() {
        let mut facts = store(&["p.n < 5"]);
        let err = facts.insert(rel("p.n > 10")).unwrap_err();
        assert_eq!(
            err,
            FactError::Contradiction {
                existing: "p.n <= 4".to_string(),
                inserted: "p.n > 10".to_string(),
            }
        );
        assert!(facts.insert(rel("10 <= p.n")).is_err());
        assert!(facts.insert(rel("p.n >= 4")).is_ok());
        assert!(facts.lookup(&rel("p.n < 5")));

        let mut facts = store(&["3 <= x"]);
        assert!(facts.insert(rel("x == 2")).is_err());
        assert!(facts.insert(rel("x < 3")).is_err());
        assert!(facts.insert(rel("x == 3")).is_ok());
    }

    #[test]
    fn test_failed_rewrite_leaves_store_unchanged() {
        let mut facts = store(&["i < n", "3 <= j", "i == j"]);
        // `i == j` becomes `0 == j`, which the bound on `j` rules out
        let zero = Expr::int(0);
        assert!(facts.rewrite("i", &zero).is_err());
        assert!(facts.lookup(&rel("i < n")));
        assert!(facts.lookup(&rel("i == j")));
        assert!(facts.lookup(&rel("3 <= j")));
        assert_eq!(facts.len(), 3);
    }

    #[test]
    fn test_merge_keeps_common_weakened() {
        let then_branch = store(&["i < n", "j == 0", "k < 4"]);
        let else_branch = store(&["i == n", "j == 0", "p < 1"]);
        let merged = intersect(&then_branch, &else_branch);
        assert!(merged.lookup(&rel("i <= n")));
        assert!(!merged.lookup(&rel("i < n")));
        assert!(merged.lookup(&rel("j == 0")));
        assert!(!merged.lookup(&rel("k < 4")));
        assert!(!merged.lookup(&rel("p < 1")));
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_merge_drops_uninformative() {
        let a = store(&["x < y"]);
        let b = store(&["x >= y"]);
        assert!(intersect(&a, &b).is_empty());
    }

    #[test]
    fn test_facts_about_orients_key_left() {
        let facts = store(&["a < b", "c > a", "b < c"]);
        let key = canonical_key(&Expr::ident("a"));
        let about: Vec<String> = facts.facts_about(&key).map(|r| r.to_string()).collect();
        assert_eq!(about, vec!["a < b", "a < c"]);
    }

    #[test]
    fn test_constant_bounds() {
        let facts = store(&["x < 10", "x >= 2", "x <= 20", "y != 3"]);
        let x = canonical_key(&Expr::ident("x"));
        assert_eq!(facts.constant_bounds(&x), (Some(2), Some(9)));
        let y = canonical_key(&Expr::ident("y"));
        assert_eq!(facts.constant_bounds(&y), (None, None));
    }

    #[test]
    fn test_display_in_insertion_order() {
        let facts = store(&["i < n", "0 <= i"]);
        assert_eq!(facts.to_string(), "i < n\n0 <= i\n");
    }
}
