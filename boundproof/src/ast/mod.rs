//! Abstract Syntax Tree definitions

mod canonical;
mod expr;
mod render;
mod span;
mod types;

pub use canonical::*;
pub use expr::*;
pub use span::*;
pub use types::*;

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// A program is a sequence of function definitions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Program {
    pub funcs: Vec<FuncDef>,
}

/// Function definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FuncDef {
    pub name: Spanned<String>,
    pub params: Vec<Param>,
    pub ret_ty: Option<Arc<TypeExpr>>,
    /// Conditions the caller guarantees
    pub pre: Vec<Spanned<ExprRef>>,
    /// Conditions every `return` must establish; `ret` names the result
    pub post: Vec<Spanned<ExprRef>>,
    pub body: Block,
    pub span: Span,
}

/// Function parameter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Param {
    pub name: Spanned<String>,
    pub ty: Arc<TypeExpr>,
}

/// Contract clause, as parsed before being split into `pre` and `post`
#[derive(Debug, Clone)]
pub enum Contract {
    Pre(Vec<Spanned<ExprRef>>),
    Post(Vec<Spanned<ExprRef>>),
}

pub type Block = Vec<Spanned<Stmt>>;

/// Statement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Stmt {
    /// `var x T = e;` (zero-initialised without `= e`)
    Var {
        name: String,
        ty: Arc<TypeExpr>,
        value: Option<ExprRef>,
    },
    /// `target = e;`, `target += e;`, ...
    Assign {
        target: ExprRef,
        op: AssignOp,
        value: ExprRef,
    },
    /// `assert cond;` or `assert cond via "reason"(name:value, ...);`
    Assert {
        condition: ExprRef,
        reason: Option<ReasonRef>,
    },
    If {
        cond: ExprRef,
        then_body: Block,
        else_body: Option<Block>,
    },
    /// `while cond, inv I, ... { body }`
    While {
        cond: ExprRef,
        invariants: Vec<Spanned<ExprRef>>,
        body: Block,
    },
    Return(Option<ExprRef>),
    Expr(ExprRef),
}

/// A reason named after `via`, with the assertion's named arguments
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasonRef {
    pub name: Spanned<String>,
    pub args: Vec<CallArg>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssignOp {
    Assign,
    AddAssign,
    SubAssign,
    MulAssign,
}

impl AssignOp {
    /// Binary operator applied by a compound assignment
    pub fn binary_op(self) -> Option<BinaryOp> {
        match self {
            AssignOp::Assign => None,
            AssignOp::AddAssign => Some(BinaryOp::Add),
            AssignOp::SubAssign => Some(BinaryOp::Sub),
            AssignOp::MulAssign => Some(BinaryOp::Mul),
        }
    }
}

impl std::fmt::Display for AssignOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssignOp::Assign => write!(f, "="),
            AssignOp::AddAssign => write!(f, "+="),
            AssignOp::SubAssign => write!(f, "-="),
            AssignOp::MulAssign => write!(f, "*="),
        }
    }
}

impl Stmt {
    /// Does control never fall off the end of this statement?
    pub fn terminates(&self) -> bool {
        match self {
            Stmt::Return(_) => true,
            Stmt::If {
                then_body,
                else_body: Some(else_body),
                ..
            } => block_terminates(then_body) && block_terminates(else_body),
            _ => false,
        }
    }

    /// Variables written anywhere inside this statement, nested blocks included
    pub fn collect_writes(&self, out: &mut Writes) {
        match self {
            Stmt::Var { name, .. } => {
                out.vars.insert(name.clone());
            }
            Stmt::Assign { target, .. } => match (target.as_ident(), target.root_var()) {
                (Some(name), _) => {
                    out.vars.insert(name.to_string());
                }
                (None, Some(root)) => {
                    out.elements.insert(root.to_string());
                }
                (None, None) => {}
            },
            Stmt::If {
                then_body,
                else_body,
                ..
            } => {
                for stmt in then_body.iter().chain(else_body.iter().flatten()) {
                    stmt.node.collect_writes(out);
                }
            }
            Stmt::While { body, .. } => {
                for stmt in body {
                    stmt.node.collect_writes(out);
                }
            }
            Stmt::Assert { .. } | Stmt::Return(_) | Stmt::Expr(_) => {}
        }
    }
}

/// Variables written by a block
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Writes {
    /// Replaced as a whole: `x = e`, `x += e`, `var x T`
    pub vars: BTreeSet<String>,
    /// Written through an element or field: `x[i] = e`, `x.f = e`
    pub elements: BTreeSet<String>,
}

impl Writes {
    pub fn of(block: &Block) -> Writes {
        let mut out = Writes::default();
        for stmt in block {
            stmt.node.collect_writes(&mut out);
        }
        out
    }
}

pub fn block_terminates(block: &Block) -> bool {
    block.last().is_some_and(|s| s.node.terminates())
}

impl FuncDef {
    /// Assemble a function from its parsed contract clauses
    pub fn new(
        name: Spanned<String>,
        params: Vec<Param>,
        ret_ty: Option<Arc<TypeExpr>>,
        contracts: Vec<Contract>,
        body: Block,
        span: Span,
    ) -> Self {
        let mut pre = Vec::new();
        let mut post = Vec::new();
        for contract in contracts {
            match contract {
                Contract::Pre(conds) => pre.extend(conds),
                Contract::Post(conds) => post.extend(conds),
            }
        }
        Self {
            name,
            params,
            ret_ty,
            pre,
            post,
            body,
            span,
        }
    }
}
