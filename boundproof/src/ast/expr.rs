//! Expression AST nodes
//!
//! Nodes are immutable once built and shared through [`ExprRef`]. Every
//! rewrite (substitution, reason-driven construction) allocates new nodes and
//! points at the untouched children instead of copying them.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::TypeExpr;

/// Shared handle to an immutable expression node
pub type ExprRef = Arc<Expr>;

/// Operator lexeme as written in the source, before its form is known
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lexeme {
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    ShiftL,
    ShiftR,
    Amp,
    AmpHat,
    Pipe,
    Hat,
    TildePlus,
    EqEq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
    Not,
}

impl Lexeme {
    pub fn unary_form(self) -> Option<UnaryOp> {
        match self {
            Lexeme::Plus => Some(UnaryOp::Plus),
            Lexeme::Minus => Some(UnaryOp::Neg),
            Lexeme::Not => Some(UnaryOp::Not),
            _ => None,
        }
    }

    pub fn binary_form(self) -> Option<BinaryOp> {
        let op = match self {
            Lexeme::Plus => BinaryOp::Add,
            Lexeme::Minus => BinaryOp::Sub,
            Lexeme::Star => BinaryOp::Mul,
            Lexeme::Slash => BinaryOp::Div,
            Lexeme::Percent => BinaryOp::Rem,
            Lexeme::ShiftL => BinaryOp::Shl,
            Lexeme::ShiftR => BinaryOp::Shr,
            Lexeme::Amp => BinaryOp::BitAnd,
            Lexeme::AmpHat => BinaryOp::BitAndNot,
            Lexeme::Pipe => BinaryOp::BitOr,
            Lexeme::Hat => BinaryOp::BitXor,
            Lexeme::TildePlus => BinaryOp::WrapAdd,
            Lexeme::EqEq => BinaryOp::Eq,
            Lexeme::NotEq => BinaryOp::Ne,
            Lexeme::Lt => BinaryOp::Lt,
            Lexeme::LtEq => BinaryOp::Le,
            Lexeme::Gt => BinaryOp::Gt,
            Lexeme::GtEq => BinaryOp::Ge,
            Lexeme::And => BinaryOp::And,
            Lexeme::Or => BinaryOp::Or,
            Lexeme::Not => return None,
        };
        Some(op)
    }

    pub fn associative_form(self) -> Option<AssocOp> {
        match self {
            Lexeme::Plus => Some(AssocOp::Add),
            Lexeme::Star => Some(AssocOp::Mul),
            Lexeme::Amp => Some(AssocOp::BitAnd),
            Lexeme::Pipe => Some(AssocOp::BitOr),
            Lexeme::Hat => Some(AssocOp::BitXor),
            Lexeme::And => Some(AssocOp::And),
            Lexeme::Or => Some(AssocOp::Or),
            _ => None,
        }
    }
}

/// Unary operator form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    Plus,
    Neg,
    Not,
}

impl UnaryOp {
    /// Surface text; `not` carries its own trailing space
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Plus => "+",
            UnaryOp::Neg => "-",
            UnaryOp::Not => "not ",
        }
    }
}

/// Binary operator form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Shl,
    Shr,
    BitAnd,
    BitAndNot,
    BitOr,
    BitXor,
    /// Modular (wrapping) addition, `~+`
    WrapAdd,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitAndNot => "&^",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::WrapAdd => "~+",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
        }
    }

    /// Operand order does not change the value
    pub fn is_commutative(self) -> bool {
        matches!(
            self,
            BinaryOp::Add
                | BinaryOp::Mul
                | BinaryOp::BitAnd
                | BinaryOp::BitOr
                | BinaryOp::BitXor
                | BinaryOp::WrapAdd
                | BinaryOp::Eq
                | BinaryOp::Ne
                | BinaryOp::And
                | BinaryOp::Or
        )
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
        )
    }
}

/// Associative operator form; always holds three or more operands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssocOp {
    Add,
    Mul,
    BitAnd,
    BitOr,
    BitXor,
    And,
    Or,
}

impl AssocOp {
    /// The two-operand form of the same operator
    pub fn binary_form(self) -> BinaryOp {
        match self {
            AssocOp::Add => BinaryOp::Add,
            AssocOp::Mul => BinaryOp::Mul,
            AssocOp::BitAnd => BinaryOp::BitAnd,
            AssocOp::BitOr => BinaryOp::BitOr,
            AssocOp::BitXor => BinaryOp::BitXor,
            AssocOp::And => BinaryOp::And,
            AssocOp::Or => BinaryOp::Or,
        }
    }

    pub fn symbol(self) -> &'static str {
        self.binary_form().symbol()
    }
}

/// Disambiguated operator identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    Unary(UnaryOp),
    Binary(BinaryOp),
    Associative(AssocOp),
}

impl Operator {
    /// Resolve a lexeme to exactly one form from the number of operands.
    ///
    /// Returns `None` when the lexeme has no form at that arity, such as a
    /// unary `*` or a three-operand `-`.
    pub fn disambiguate(lexeme: Lexeme, arity: usize) -> Option<Operator> {
        match arity {
            1 => lexeme.unary_form().map(Operator::Unary),
            2 => lexeme.binary_form().map(Operator::Binary),
            n if n >= 3 => lexeme.associative_form().map(Operator::Associative),
            _ => None,
        }
    }
}

/// Named call argument: `name:value`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallArg {
    pub name: String,
    pub value: ExprRef,
}

impl CallArg {
    pub fn new(name: impl Into<String>, value: ExprRef) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// Expression
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Expr {
    /// Reference to a resolved declaration
    Ident(String),
    /// Integer literal in the unbounded "ideal integer" domain
    IntLit(i128),
    BoolLit(bool),

    Unary {
        op: UnaryOp,
        operand: ExprRef,
    },
    Binary {
        op: BinaryOp,
        lhs: ExprRef,
        rhs: ExprRef,
    },
    /// Flattened chain of one associative operator, e.g. `a + b + c`
    Associative {
        op: AssocOp,
        args: Vec<ExprRef>,
    },
    /// Numeric conversion: `value as ty`
    Cast {
        value: ExprRef,
        ty: Arc<TypeExpr>,
    },
    /// Call with named arguments, carried apart from index operands
    Call {
        callee: ExprRef,
        args: Vec<CallArg>,
    },
    Index {
        base: ExprRef,
        index: ExprRef,
    },
    Slice {
        base: ExprRef,
        lo: Option<ExprRef>,
        hi: Option<ExprRef>,
    },
    Field {
        base: ExprRef,
        name: String,
    },
}

impl Expr {
    pub fn ident(name: impl Into<String>) -> ExprRef {
        Arc::new(Expr::Ident(name.into()))
    }

    pub fn int(value: i128) -> ExprRef {
        Arc::new(Expr::IntLit(value))
    }

    pub fn bool(value: bool) -> ExprRef {
        Arc::new(Expr::BoolLit(value))
    }

    pub fn unary(op: UnaryOp, operand: ExprRef) -> ExprRef {
        Arc::new(Expr::Unary { op, operand })
    }

    pub fn binary(op: BinaryOp, lhs: ExprRef, rhs: ExprRef) -> ExprRef {
        Arc::new(Expr::Binary { op, lhs, rhs })
    }

    pub fn cast(value: ExprRef, ty: Arc<TypeExpr>) -> ExprRef {
        Arc::new(Expr::Cast { value, ty })
    }

    pub fn call(callee: ExprRef, args: Vec<CallArg>) -> ExprRef {
        Arc::new(Expr::Call { callee, args })
    }

    pub fn index(base: ExprRef, index: ExprRef) -> ExprRef {
        Arc::new(Expr::Index { base, index })
    }

    pub fn slice(base: ExprRef, lo: Option<ExprRef>, hi: Option<ExprRef>) -> ExprRef {
        Arc::new(Expr::Slice { base, lo, hi })
    }

    pub fn field(base: ExprRef, name: impl Into<String>) -> ExprRef {
        Arc::new(Expr::Field {
            base,
            name: name.into(),
        })
    }

    /// Apply a surface operator to its operands, resolving the form from the
    /// operand count.
    pub fn apply(lexeme: Lexeme, mut args: Vec<ExprRef>) -> Option<ExprRef> {
        let node = match Operator::disambiguate(lexeme, args.len())? {
            Operator::Unary(op) => Expr::unary(op, args.pop()?),
            Operator::Binary(op) => {
                let rhs = args.pop()?;
                let lhs = args.pop()?;
                Expr::binary(op, lhs, rhs)
            }
            Operator::Associative(op) => Arc::new(Expr::Associative { op, args }),
        };
        Some(node)
    }

    pub fn as_ident(&self) -> Option<&str> {
        match self {
            Expr::Ident(name) => Some(name),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i128> {
        match self {
            Expr::IntLit(v) => Some(*v),
            _ => None,
        }
    }

    /// Nodes that are wrapped in parentheses when used as an operand
    pub fn is_operation(&self) -> bool {
        matches!(
            self,
            Expr::Binary { .. } | Expr::Associative { .. } | Expr::Cast { .. }
        )
    }

    /// Names of the variables this expression reads. Field names and call
    /// argument names are labels, not variables.
    pub fn free_vars(&self) -> BTreeSet<String> {
        let mut vars = BTreeSet::new();
        self.collect_vars(&mut vars);
        vars
    }

    fn collect_vars(&self, vars: &mut BTreeSet<String>) {
        match self {
            Expr::Ident(name) => {
                vars.insert(name.clone());
            }
            Expr::IntLit(_) | Expr::BoolLit(_) => {}
            Expr::Unary { operand, .. } => operand.collect_vars(vars),
            Expr::Binary { lhs, rhs, .. } => {
                lhs.collect_vars(vars);
                rhs.collect_vars(vars);
            }
            Expr::Associative { args, .. } => {
                for arg in args {
                    arg.collect_vars(vars);
                }
            }
            Expr::Cast { value, .. } => value.collect_vars(vars),
            Expr::Call { callee, args } => {
                callee.collect_vars(vars);
                for arg in args {
                    arg.value.collect_vars(vars);
                }
            }
            Expr::Index { base, index } => {
                base.collect_vars(vars);
                index.collect_vars(vars);
            }
            Expr::Slice { base, lo, hi } => {
                base.collect_vars(vars);
                for bound in [lo, hi].into_iter().flatten() {
                    bound.collect_vars(vars);
                }
            }
            Expr::Field { base, .. } => base.collect_vars(vars),
        }
    }

    pub fn mentions(&self, name: &str) -> bool {
        match self {
            Expr::Ident(n) => n == name,
            Expr::IntLit(_) | Expr::BoolLit(_) => false,
            Expr::Unary { operand, .. } => operand.mentions(name),
            Expr::Binary { lhs, rhs, .. } => lhs.mentions(name) || rhs.mentions(name),
            Expr::Associative { args, .. } => args.iter().any(|a| a.mentions(name)),
            Expr::Cast { value, .. } => value.mentions(name),
            Expr::Call { callee, args } => {
                callee.mentions(name) || args.iter().any(|a| a.value.mentions(name))
            }
            Expr::Index { base, index } => base.mentions(name) || index.mentions(name),
            Expr::Slice { base, lo, hi } => {
                base.mentions(name)
                    || lo.as_ref().is_some_and(|e| e.mentions(name))
                    || hi.as_ref().is_some_and(|e| e.mentions(name))
            }
            Expr::Field { base, .. } => base.mentions(name),
        }
    }

    /// The variable an assignment target writes through: `x`, `x.f`, `x[i]`
    pub fn root_var(&self) -> Option<&str> {
        match self {
            Expr::Ident(name) => Some(name),
            Expr::Field { base, .. } | Expr::Index { base, .. } | Expr::Slice { base, .. } => {
                base.root_var()
            }
            _ => None,
        }
    }

    /// Replace every `Ident(name)` with `replacement`. Subtrees that do not
    /// mention `name` are shared with the original, never copied.
    pub fn substitute(self: &ExprRef, name: &str, replacement: &ExprRef) -> ExprRef {
        self.substitute_all(&[(name, Arc::clone(replacement))])
    }

    /// Replace several names at once; a replacement is never itself rewritten
    pub fn substitute_all(self: &ExprRef, bindings: &[(&str, ExprRef)]) -> ExprRef {
        if !bindings.iter().any(|(name, _)| self.mentions(name)) {
            return Arc::clone(self);
        }
        let sub = |e: &ExprRef| e.substitute_all(bindings);
        let node = match self.as_ref() {
            Expr::Ident(ident) => {
                return bindings
                    .iter()
                    .find(|(name, _)| *name == ident.as_str())
                    .map_or_else(|| Arc::clone(self), |(_, e)| Arc::clone(e));
            }
            Expr::IntLit(_) | Expr::BoolLit(_) => return Arc::clone(self),
            Expr::Unary { op, operand } => Expr::Unary {
                op: *op,
                operand: sub(operand),
            },
            Expr::Binary { op, lhs, rhs } => Expr::Binary {
                op: *op,
                lhs: sub(lhs),
                rhs: sub(rhs),
            },
            Expr::Associative { op, args } => Expr::Associative {
                op: *op,
                args: args.iter().map(sub).collect(),
            },
            Expr::Cast { value, ty } => Expr::Cast {
                value: sub(value),
                ty: Arc::clone(ty),
            },
            Expr::Call { callee, args } => Expr::Call {
                callee: sub(callee),
                args: args
                    .iter()
                    .map(|a| CallArg::new(a.name.clone(), sub(&a.value)))
                    .collect(),
            },
            Expr::Index { base, index } => Expr::Index {
                base: sub(base),
                index: sub(index),
            },
            Expr::Slice { base, lo, hi } => Expr::Slice {
                base: sub(base),
                lo: lo.as_ref().map(sub),
                hi: hi.as_ref().map(sub),
            },
            Expr::Field { base, name: field } => Expr::Field {
                base: sub(base),
                name: field.clone(),
            },
        };
        Arc::new(node)
    }

    /// Fold literal-only arithmetic. Any overflow, division by zero or
    /// non-literal leaf yields `None`.
    pub fn const_value(&self) -> Option<i128> {
        match self {
            Expr::IntLit(v) => Some(*v),
            Expr::Unary { op, operand } => {
                let v = operand.const_value()?;
                match op {
                    UnaryOp::Plus => Some(v),
                    UnaryOp::Neg => v.checked_neg(),
                    UnaryOp::Not => None,
                }
            }
            Expr::Binary { op, lhs, rhs } => {
                fold_binary(*op, lhs.const_value()?, rhs.const_value()?)
            }
            Expr::Associative { op, args } => {
                let mut values = args.iter().map(|a| a.const_value());
                let first = values.next()??;
                values.try_fold(first, |acc, v| fold_binary(op.binary_form(), acc, v?))
            }
            Expr::Cast { value, ty } => {
                let v = value.const_value()?;
                let (lo, hi) = ty.range()?;
                (lo..=hi).contains(&v).then_some(v)
            }
            _ => None,
        }
    }

    /// Split a condition on `and` into its conjuncts
    pub fn conjuncts(self: &ExprRef) -> Vec<ExprRef> {
        match self.as_ref() {
            Expr::Binary {
                op: BinaryOp::And,
                lhs,
                rhs,
            } => {
                let mut out = lhs.conjuncts();
                out.extend(rhs.conjuncts());
                out
            }
            Expr::Associative {
                op: AssocOp::And,
                args,
            } => args.iter().flat_map(|a| a.conjuncts()).collect(),
            _ => vec![Arc::clone(self)],
        }
    }
}

fn fold_binary(op: BinaryOp, a: i128, b: i128) -> Option<i128> {
    match op {
        BinaryOp::Add => a.checked_add(b),
        BinaryOp::Sub => a.checked_sub(b),
        BinaryOp::Mul => a.checked_mul(b),
        BinaryOp::Div => a.checked_div(b),
        BinaryOp::Rem => a.checked_rem(b),
        BinaryOp::Shl => u32::try_from(b).ok().and_then(|s| a.checked_shl(s)).filter(|r| r >> b == a),
        BinaryOp::Shr => u32::try_from(b).ok().and_then(|s| a.checked_shr(s)),
        BinaryOp::BitAnd => Some(a & b),
        BinaryOp::BitAndNot => Some(a & !b),
        BinaryOp::BitOr => Some(a | b),
        BinaryOp::BitXor => Some(a ^ b),
        _ => None,
    }
}
