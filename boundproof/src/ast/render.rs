//! Rendering expressions and types back to surface syntax
//!
//! Parenthesisation follows the tree shape rather than precedence: binary,
//! associative and `as` nodes are wrapped whenever they appear as an operand,
//! a receiver or a unary operand. Index operands, slice bounds, call argument
//! values and array lengths sit between their own delimiters and are never
//! wrapped. The parser accepts exactly this form, so rendering round-trips.

use std::fmt::{self, Display, Formatter, Write};

use super::{CallArg, Expr, Refinement, TypeExpr};

impl Display for Expr {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.write_to(f, false)
    }
}

impl Expr {
    fn write_to(&self, f: &mut Formatter<'_>, parenthesize: bool) -> fmt::Result {
        let wrap = parenthesize && self.is_operation();
        if wrap {
            f.write_char('(')?;
        }
        match self {
            Expr::Ident(name) => f.write_str(name)?,
            Expr::IntLit(v) => write!(f, "{v}")?,
            Expr::BoolLit(b) => write!(f, "{b}")?,
            Expr::Unary { op, operand } => {
                f.write_str(op.symbol())?;
                operand.write_to(f, true)?;
            }
            Expr::Binary { op, lhs, rhs } => {
                lhs.write_to(f, true)?;
                write!(f, " {} ", op.symbol())?;
                rhs.write_to(f, true)?;
            }
            Expr::Associative { op, args } => {
                for (i, arg) in args.iter().enumerate() {
                    if i != 0 {
                        write!(f, " {} ", op.symbol())?;
                    }
                    arg.write_to(f, true)?;
                }
            }
            Expr::Cast { value, ty } => {
                value.write_to(f, true)?;
                write!(f, " as {ty}")?;
            }
            Expr::Call { callee, args } => {
                callee.write_to(f, true)?;
                f.write_char('(')?;
                for (i, arg) in args.iter().enumerate() {
                    if i != 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                f.write_char(')')?;
            }
            Expr::Index { base, index } => {
                base.write_to(f, true)?;
                write!(f, "[{index}]")?;
            }
            Expr::Slice { base, lo, hi } => {
                base.write_to(f, true)?;
                f.write_char('[')?;
                if let Some(lo) = lo {
                    write!(f, "{lo}")?;
                }
                f.write_char(':')?;
                if let Some(hi) = hi {
                    write!(f, "{hi}")?;
                }
                f.write_char(']')?;
            }
            Expr::Field { base, name } => {
                base.write_to(f, true)?;
                write!(f, ".{name}")?;
            }
        }
        if wrap {
            f.write_char(')')?;
        }
        Ok(())
    }
}

impl Display for CallArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.value)
    }
}

impl Display for TypeExpr {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            TypeExpr::Named {
                package,
                name,
                refinement,
            } => {
                if let Some(pkg) = package {
                    write!(f, "{pkg}.")?;
                }
                f.write_str(name)?;
                if let Some(r) = refinement {
                    write!(f, "{r}")?;
                }
                Ok(())
            }
            TypeExpr::Ptr(inner) => write!(f, "ptr {inner}"),
            TypeExpr::Array { len, elem } => write!(f, "[{len}] {elem}"),
            TypeExpr::Slice(elem) => write!(f, "[] {elem}"),
        }
    }
}

impl Display for Refinement {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_char('[')?;
        if let Some(lo) = &self.lo {
            write!(f, "{lo}")?;
        }
        f.write_str("..")?;
        if let Some(hi) = &self.hi {
            write!(f, "{hi}")?;
        }
        f.write_char(']')
    }
}
