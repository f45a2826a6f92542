//! Canonical expression keys
//!
//! Two expressions get the same key when they are identical after sorting
//! the operands of every associative node (and of commutative binary nodes)
//! and folding literal-only arithmetic to its value. Keys are used to index
//! the fact store and to recognise that `a + b` and `b + a` name one value.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::Expr;

/// Deterministic structural key of an expression
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CanonicalKey(Arc<str>);

impl CanonicalKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CanonicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn canonical_key(expr: &Expr) -> CanonicalKey {
    CanonicalKey(canonical_text(expr).into())
}

/// Fully parenthesised, operand-sorted text. Unlike rendering, every
/// operation is wrapped, so the text is unambiguous without a parser.
fn canonical_text(expr: &Expr) -> String {
    if let Some(v) = expr.const_value() {
        return v.to_string();
    }
    match expr {
        Expr::Ident(name) => name.clone(),
        Expr::IntLit(v) => v.to_string(),
        Expr::BoolLit(b) => b.to_string(),
        Expr::Unary { op, operand } => format!("{}{}", op.symbol(), canonical_text(operand)),
        Expr::Binary { op, lhs, rhs } => {
            let mut operands = [canonical_text(lhs), canonical_text(rhs)];
            if op.is_commutative() {
                operands.sort();
            }
            format!("({} {} {})", operands[0], op.symbol(), operands[1])
        }
        Expr::Associative { op, args } => {
            let mut operands: Vec<String> = args.iter().map(|a| canonical_text(a)).collect();
            operands.sort();
            format!("({})", operands.join(&format!(" {} ", op.symbol())))
        }
        Expr::Cast { value, ty } => format!("({} as {ty})", canonical_text(value)),
        Expr::Call { callee, args } => {
            let args: Vec<String> = args
                .iter()
                .map(|a| format!("{}:{}", a.name, canonical_text(&a.value)))
                .collect();
            format!("{}({})", canonical_text(callee), args.join(", "))
        }
        Expr::Index { base, index } => {
            format!("{}[{}]", canonical_text(base), canonical_text(index))
        }
        Expr::Slice { base, lo, hi } => {
            let lo = lo.as_ref().map(|e| canonical_text(e)).unwrap_or_default();
            let hi = hi.as_ref().map(|e| canonical_text(e)).unwrap_or_default();
            format!("{}[{lo}:{hi}]", canonical_text(base))
        }
        Expr::Field { base, name } => format!("{}.{name}", canonical_text(base)),
    }
}
