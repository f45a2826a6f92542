//! Statement walker
//!
//! Threads a [`FactStore`] through each function body. Every statement
//! first has its obligations discharged by the [`Prover`] (indices in
//! bounds, slices well-formed, narrowing conversions in range), then adds
//! the relations it establishes to the store.

mod error;

pub use error::CheckError;

use std::collections::HashMap;
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, trace, warn};

use crate::ast::{
    AssignOp, BinaryOp, Block, CallArg, Expr, ExprRef, FuncDef, Program, ReasonRef, Span, Spanned,
    Stmt, TypeExpr, Writes, block_terminates,
};
use crate::config::{CheckConfig, ProverConfig};
use crate::facts::{CmpOp, FactError, FactStore, Relation, intersect};
use crate::prove::{Obligation, Prover, Requirement, TypeEnv};

type Result<T> = std::result::Result<T, CheckError>;

/// Function definitions by name, for call-site preconditions
type Signatures<'p> = HashMap<&'p str, &'p FuncDef>;

/// Declared types of the variables of one function, and the result types
/// of the functions it can call
#[derive(Debug, Clone, Default)]
pub struct TypeScope {
    vars: HashMap<String, Arc<TypeExpr>>,
    results: HashMap<String, Arc<TypeExpr>>,
}

impl TypeScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare(&mut self, name: impl Into<String>, ty: Arc<TypeExpr>) {
        self.vars.insert(name.into(), ty);
    }

    pub fn declare_result(&mut self, function: impl Into<String>, ty: Arc<TypeExpr>) {
        self.results.insert(function.into(), ty);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }
}

impl TypeEnv for TypeScope {
    fn type_of(&self, name: &str) -> Option<Arc<TypeExpr>> {
        self.vars.get(name).cloned()
    }

    fn result_type(&self, function: &str) -> Option<Arc<TypeExpr>> {
        self.results.get(function).cloned()
    }
}

/// Result of checking one function
#[derive(Debug, Clone)]
pub struct FunctionReport {
    pub name: String,
    /// Obligations discharged before the first error, if any
    pub proved: usize,
    pub errors: Vec<CheckError>,
    /// Facts known at the end of the body, with `dump_facts`
    pub facts: Option<String>,
}

impl FunctionReport {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Results for every function of a program, in source order
#[derive(Debug, Clone, Default)]
pub struct CheckReport {
    pub functions: Vec<FunctionReport>,
}

impl CheckReport {
    pub fn is_ok(&self) -> bool {
        self.functions.iter().all(FunctionReport::is_ok)
    }

    pub fn errors(&self) -> impl Iterator<Item = &CheckError> {
        self.functions.iter().flat_map(|f| f.errors.iter())
    }

    pub fn proved(&self) -> usize {
        self.functions.iter().map(|f| f.proved).sum()
    }
}

/// Bounds checker for whole programs
pub struct Checker {
    config: CheckConfig,
}

impl Checker {
    pub fn new(config: CheckConfig) -> Self {
        Self { config }
    }

    /// Check every function. A failing function does not stop the others.
    pub fn check_program(&self, program: &Program) -> CheckReport {
        let signatures: Signatures<'_> = program
            .funcs
            .iter()
            .map(|f| (f.name.node.as_str(), f))
            .collect();
        let check = |func: &FuncDef| self.check_function(func, &signatures);

        let functions = if self.config.parallel {
            program.funcs.par_iter().map(check).collect()
        } else {
            program.funcs.iter().map(check).collect()
        };
        CheckReport { functions }
    }

    fn check_function(&self, func: &FuncDef, signatures: &Signatures<'_>) -> FunctionReport {
        let name = func.name.node.clone();
        debug!(function = %name, "checking function");

        let mut walker = Walker::new(func, signatures, self.config.prover);
        let errors = match walker.function() {
            Ok(()) => Vec::new(),
            Err(err) => {
                debug!(function = %name, error = %err, "function rejected");
                vec![err]
            }
        };
        debug!(function = %name, proved = walker.proved, "function checked");

        FunctionReport {
            name,
            proved: walker.proved,
            errors,
            facts: self.config.dump_facts.then(|| walker.facts.to_string()),
        }
    }
}

// ============================================================================
// Walker
// ============================================================================

/// State of the check of one function body
struct Walker<'p> {
    func: &'p FuncDef,
    signatures: &'p Signatures<'p>,
    config: ProverConfig,
    facts: FactStore,
    scope: TypeScope,
    proved: usize,
}

impl<'p> Walker<'p> {
    fn new(func: &'p FuncDef, signatures: &'p Signatures<'p>, config: ProverConfig) -> Self {
        let mut scope = TypeScope::new();
        for (name, callee) in signatures {
            if let Some(ty) = &callee.ret_ty {
                scope.declare_result(*name, Arc::clone(ty));
            }
        }
        Self {
            func,
            signatures,
            config,
            facts: FactStore::new(),
            scope,
            proved: 0,
        }
    }

    fn function(&mut self) -> Result<()> {
        let func = self.func;
        for param in &func.params {
            self.scope.declare(param.name.node.clone(), Arc::clone(&param.ty));
        }
        for pre in &func.pre {
            self.check_names(&pre.node, pre.span, false)?;
            self.assume(&pre.node, pre.span)?;
        }
        for post in &func.post {
            self.check_names(&post.node, post.span, true)?;
        }

        self.block(&func.body)?;
        if !block_terminates(&func.body) {
            self.postconditions(None, func.span)?;
        }
        Ok(())
    }

    fn block(&mut self, block: &Block) -> Result<()> {
        for stmt in block {
            self.stmt(&stmt.node, stmt.span)?;
            if stmt.node.terminates() {
                break;
            }
        }
        Ok(())
    }

    fn stmt(&mut self, stmt: &Stmt, span: Span) -> Result<()> {
        match stmt {
            Stmt::Var { name, ty, value } => self.var(name, ty, value.as_ref(), span),
            Stmt::Assign { target, op, value } => self.assign(target, *op, value, span),
            Stmt::Assert { condition, reason } => self.assert(condition, reason.as_ref(), span),
            Stmt::If {
                cond,
                then_body,
                else_body,
            } => self.if_stmt(cond, then_body, else_body.as_ref(), span),
            Stmt::While {
                cond,
                invariants,
                body,
            } => self.while_stmt(cond, invariants, body, span),
            Stmt::Return(value) => self.return_stmt(value.as_ref(), span),
            Stmt::Expr(expr) => self.obligations(expr, span),
        }
    }

    // ------------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------------

    fn var(&mut self, name: &str, ty: &Arc<TypeExpr>, value: Option<&ExprRef>, span: Span) -> Result<()> {
        if let Some(value) = value {
            self.obligations(value, span)?;
            self.fits(value, ty, span)?;
        }
        self.scope.declare(name, Arc::clone(ty));
        self.facts.invalidate(name);

        if ty.range().is_none() {
            return Ok(());
        }
        let initial = match value {
            None => Expr::int(0),
            Some(value) if !value.mentions(name) => Arc::clone(value),
            Some(_) => return Ok(()),
        };
        self.record(Relation::new(Expr::ident(name), CmpOp::Eq, initial), span)
    }

    fn assign(&mut self, target: &ExprRef, op: AssignOp, value: &ExprRef, span: Span) -> Result<()> {
        self.obligations(target, span)?;
        self.obligations(value, span)?;
        let Some(root) = target.root_var() else {
            return Err(CheckError::NotAssignable {
                target: target.to_string(),
                span,
            });
        };

        let new_value = match op.binary_op() {
            Some(bin) => Expr::binary(bin, Arc::clone(target), Arc::clone(value)),
            None => Arc::clone(value),
        };
        if let Some(ty) = self.static_type(target) {
            self.fits(&new_value, &ty, span)?;
        }

        match target.as_ident() {
            Some(var) => self.reassign(var, op, value, span),
            None => {
                let dropped = self.invalidate_contents(root);
                trace!(root, dropped, "element write");
                Ok(())
            }
        }
    }

    /// Update the facts about a variable assigned as a whole
    fn reassign(&mut self, var: &str, op: AssignOp, value: &ExprRef, span: Span) -> Result<()> {
        if let Some(old_value) = inverse_offset(var, op, value) {
            let moved = self
                .facts
                .rewrite(var, &old_value)
                .map_err(|err| inconsistent(err, span))?;
            trace!(var, moved, "offset facts");
            return Ok(());
        }

        let dropped = self.facts.invalidate(var);
        trace!(var, dropped, "invalidated");
        if op == AssignOp::Assign && !value.mentions(var) {
            self.record(Relation::new(Expr::ident(var), CmpOp::Eq, Arc::clone(value)), span)?;
        }
        Ok(())
    }

    fn assert(&mut self, condition: &ExprRef, reason: Option<&ReasonRef>, span: Span) -> Result<()> {
        self.obligations(condition, span)?;
        let relations = relations_of(condition, span)?;
        if reason.is_some() && relations.len() != 1 {
            return Err(CheckError::ReasonArity { span });
        }
        for relation in relations {
            self.require(relation.clone(), Requirement::Assertion, span, reason)?;
            self.record(relation, span)?;
        }
        Ok(())
    }

    fn if_stmt(
        &mut self,
        cond: &ExprRef,
        then_body: &Block,
        else_body: Option<&Block>,
        span: Span,
    ) -> Result<()> {
        self.obligations(cond, span)?;
        let entry = self.facts.snapshot();

        let then_relations: Vec<Relation> = cond
            .conjuncts()
            .iter()
            .filter_map(Relation::from_expr)
            .collect();
        let then_facts = if self.enter_branch(then_relations) {
            self.block(then_body)?;
            (!block_terminates(then_body)).then(|| self.facts.clone())
        } else {
            None
        };

        self.facts.restore(entry);
        let else_relations: Vec<Relation> = single_relation(cond)
            .map(|relation| relation.negated())
            .into_iter()
            .collect();
        let else_falls_through = if self.enter_branch(else_relations) {
            if let Some(else_body) = else_body {
                self.block(else_body)?;
            }
            !else_body.is_some_and(block_terminates)
        } else {
            false
        };

        match (then_facts, else_falls_through) {
            (Some(then_facts), true) => self.facts = self.join(&then_facts, &self.facts),
            (Some(then_facts), false) => self.facts = then_facts,
            (None, _) => {}
        }
        Ok(())
    }

    /// Assume a branch's relations. A branch whose relations contradict the
    /// known facts can never run; it is skipped and leaves the facts alone.
    fn enter_branch(&mut self, relations: Vec<Relation>) -> bool {
        let mut facts = self.facts.clone();
        for relation in relations {
            if let Err(err) = facts.insert(relation) {
                trace!(%err, "unreachable branch");
                return false;
            }
        }
        self.facts = facts;
        true
    }

    fn while_stmt(
        &mut self,
        cond: &ExprRef,
        invariants: &[Spanned<ExprRef>],
        body: &Block,
        span: Span,
    ) -> Result<()> {
        let mut invs = Vec::new();
        for inv in invariants {
            self.check_names(&inv.node, inv.span, false)?;
            for relation in relations_of(&inv.node, inv.span)? {
                invs.push(Spanned::new(relation, inv.span));
            }
        }
        for inv in &invs {
            self.require(inv.node.clone(), Requirement::InvariantOnEntry, inv.span, None)?;
        }

        // Facts about anything the body writes hold on entry only
        let writes = Writes::of(body);
        for var in &writes.vars {
            self.facts.invalidate(var);
        }
        for root in &writes.elements {
            self.invalidate_contents(root);
        }
        let loop_entry = self.facts.snapshot();

        for inv in &invs {
            self.record(inv.node.clone(), inv.span)?;
        }
        // Evaluated before every iteration, so only the loop-head facts apply
        self.obligations(cond, span)?;
        self.assume(cond, span)?;
        self.block(body)?;
        if !block_terminates(body) {
            for inv in &invs {
                self.require(inv.node.clone(), Requirement::InvariantPreserved, inv.span, None)?;
            }
        }

        self.facts.restore(loop_entry);
        for inv in &invs {
            self.record(inv.node.clone(), inv.span)?;
        }
        if let Some(relation) = single_relation(cond) {
            self.record(relation.negated(), span)?;
        }
        Ok(())
    }

    fn return_stmt(&mut self, value: Option<&ExprRef>, span: Span) -> Result<()> {
        if let Some(value) = value {
            self.obligations(value, span)?;
            if let Some(ty) = &self.func.ret_ty {
                self.fits(value, ty, span)?;
            }
        }
        self.postconditions(value, span)
    }

    /// Prove every `post` clause, with `ret` standing for `value`
    fn postconditions(&mut self, value: Option<&ExprRef>, span: Span) -> Result<()> {
        let func = self.func;
        for post in &func.post {
            let cond = match value {
                Some(value) => post.node.substitute("ret", value),
                None => Arc::clone(&post.node),
            };
            for relation in relations_of(&cond, post.span)? {
                self.require(relation, Requirement::Postcondition, span, None)?;
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Obligations
    // ------------------------------------------------------------------------

    /// Discharge what `expr` needs to be evaluated safely
    fn obligations(&mut self, expr: &ExprRef, span: Span) -> Result<()> {
        match expr.as_ref() {
            Expr::Ident(name) => {
                if self.scope.contains(name) {
                    Ok(())
                } else {
                    Err(CheckError::UnknownVariable {
                        name: name.clone(),
                        span,
                    })
                }
            }
            Expr::IntLit(_) | Expr::BoolLit(_) => Ok(()),
            Expr::Unary { operand, .. } => self.obligations(operand, span),
            Expr::Binary { lhs, rhs, .. } => {
                self.obligations(lhs, span)?;
                self.obligations(rhs, span)
            }
            Expr::Associative { args, .. } => args.iter().try_for_each(|a| self.obligations(a, span)),
            Expr::Cast { value, ty } => {
                self.obligations(value, span)?;
                self.fits(value, ty, span)
            }
            Expr::Call { callee, args } => {
                for arg in args {
                    self.obligations(&arg.value, span)?;
                }
                match callee.as_ref() {
                    Expr::Ident(name) => self.call_preconditions(name, args, span),
                    _ => self.obligations(callee, span),
                }
            }
            Expr::Index { base, index } => {
                self.obligations(base, span)?;
                self.obligations(index, span)?;
                let len = self.length_of(base);
                let zero = Expr::int(0);
                self.require(
                    Relation::new(zero, CmpOp::Le, Arc::clone(index)),
                    Requirement::IndexInBounds,
                    span,
                    None,
                )?;
                self.require(
                    Relation::new(Arc::clone(index), CmpOp::Lt, len),
                    Requirement::IndexInBounds,
                    span,
                    None,
                )
            }
            Expr::Slice { base, lo, hi } => {
                self.obligations(base, span)?;
                for bound in [lo, hi].into_iter().flatten() {
                    self.obligations(bound, span)?;
                }
                self.slice_bounds(base, lo.as_ref(), hi.as_ref(), span)
            }
            Expr::Field { base, .. } => self.obligations(base, span),
        }
    }

    /// `0 <= lo`, `lo <= hi` and `hi <= len`, for the bounds written
    fn slice_bounds(
        &mut self,
        base: &ExprRef,
        lo: Option<&ExprRef>,
        hi: Option<&ExprRef>,
        span: Span,
    ) -> Result<()> {
        let len = self.length_of(base);
        let mut required = Vec::new();
        if let Some(lo) = lo {
            required.push(Relation::new(Expr::int(0), CmpOp::Le, Arc::clone(lo)));
        }
        if lo.is_some() || hi.is_some() {
            let lo = lo.map_or_else(|| Expr::int(0), Arc::clone);
            let hi = hi.map_or_else(|| Arc::clone(&len), Arc::clone);
            required.push(Relation::new(lo, CmpOp::Le, hi));
        }
        if let Some(hi) = hi {
            required.push(Relation::new(Arc::clone(hi), CmpOp::Le, len));
        }
        for relation in required {
            self.require(relation, Requirement::SliceBounds, span, None)?;
        }
        Ok(())
    }

    /// The callee's `pre` clauses, with its parameters bound to the arguments
    fn call_preconditions(&mut self, name: &str, args: &[CallArg], span: Span) -> Result<()> {
        let Some(callee) = self.signatures.get(name).copied() else {
            return Err(CheckError::UnknownFunction {
                name: name.to_string(),
                span,
            });
        };
        let bindings: Vec<(&str, ExprRef)> = args
            .iter()
            .map(|arg| (arg.name.as_str(), Arc::clone(&arg.value)))
            .collect();
        let binds_each_param = bindings.len() == callee.params.len()
            && callee
                .params
                .iter()
                .all(|p| bindings.iter().filter(|(n, _)| *n == p.name.node).count() == 1);
        if !binds_each_param {
            return Err(CheckError::CallArguments {
                function: name.to_string(),
                span,
            });
        }

        for pre in &callee.pre {
            let cond = pre.node.substitute_all(&bindings);
            for relation in cond.conjuncts().iter().filter_map(Relation::from_expr) {
                self.require(relation, Requirement::CallPrecondition, span, None)?;
            }
        }
        Ok(())
    }

    /// `value` lies in the range of `ty`, refinements included
    fn fits(&mut self, value: &ExprRef, ty: &TypeExpr, span: Span) -> Result<()> {
        let Some((lo, hi)) = ty.range() else {
            return Ok(());
        };
        let mut required = vec![
            Relation::new(Expr::int(lo), CmpOp::Le, Arc::clone(value)),
            Relation::new(Arc::clone(value), CmpOp::Le, Expr::int(hi)),
        ];
        if let TypeExpr::Named {
            refinement: Some(refinement),
            ..
        } = ty
        {
            if let Some(lo) = refinement.lo.as_ref().filter(|e| e.const_value().is_none()) {
                required.push(Relation::new(Arc::clone(lo), CmpOp::Le, Arc::clone(value)));
            }
            if let Some(hi) = refinement.hi.as_ref().filter(|e| e.const_value().is_none()) {
                required.push(Relation::new(Arc::clone(value), CmpOp::Le, Arc::clone(hi)));
            }
        }
        for relation in required {
            self.require(relation, Requirement::FitsType, span, None)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Facts and proofs
    // ------------------------------------------------------------------------

    fn require(
        &mut self,
        relation: Relation,
        requirement: Requirement,
        span: Span,
        hint: Option<&ReasonRef>,
    ) -> Result<()> {
        let prover = Prover::new(&self.facts, &self.scope, self.config);
        let strategy = prover.discharge(&Obligation::new(relation, requirement, span), hint)?;
        trace!(%requirement, %strategy, "discharged");
        self.proved += 1;
        Ok(())
    }

    fn record(&mut self, relation: Relation, span: Span) -> Result<()> {
        trace!(%relation, "fact");
        self.facts
            .insert(relation)
            .map(|_| ())
            .map_err(|err| inconsistent(err, span))
    }

    /// Record the relations among the conjuncts of a condition known to hold
    fn assume(&mut self, cond: &ExprRef, span: Span) -> Result<()> {
        for conjunct in cond.conjuncts() {
            match Relation::from_expr(&conjunct) {
                Some(relation) => self.record(relation, span)?,
                None => trace!(%conjunct, "not a relation"),
            }
        }
        Ok(())
    }

    /// Facts holding after either of two paths: the pairs known on both,
    /// plus any fact of one path that the other path's facts prove
    fn join(&self, a: &FactStore, b: &FactStore) -> FactStore {
        let mut out = intersect(a, b);
        for (from, other) in [(a, b), (b, a)] {
            let prover = Prover::new(other, &self.scope, self.config);
            for relation in from.relations() {
                if !prover.prove(relation, None).is_proved() {
                    continue;
                }
                if let Err(err) = out.insert(relation.clone()) {
                    trace!(%err, "fact dropped at join");
                }
            }
        }
        out
    }

    fn invalidate_contents(&mut self, root: &str) -> usize {
        self.facts
            .invalidate_if(|r| reads_contents(&r.lhs, root) || reads_contents(&r.rhs, root))
    }

    fn check_names(&self, expr: &Expr, span: Span, allow_ret: bool) -> Result<()> {
        for name in expr.free_vars() {
            let known = self.scope.contains(&name)
                || self.signatures.contains_key(name.as_str())
                || (allow_ret && name == "ret");
            if !known {
                return Err(CheckError::UnknownVariable { name, span });
            }
        }
        Ok(())
    }

    /// Declared type of an lvalue-like expression, seen through pointers
    fn static_type(&self, expr: &Expr) -> Option<Arc<TypeExpr>> {
        let ty = match expr {
            Expr::Ident(name) => self.scope.type_of(name)?,
            Expr::Index { base, .. } => Arc::clone(self.static_type(base)?.element()?),
            Expr::Slice { base, .. } => match self.static_type(base)?.as_ref() {
                TypeExpr::Array { elem, .. } | TypeExpr::Slice(elem) => {
                    Arc::new(TypeExpr::Slice(Arc::clone(elem)))
                }
                _ => return None,
            },
            Expr::Cast { ty, .. } => Arc::clone(ty),
            _ => return None,
        };
        match ty.as_ref() {
            TypeExpr::Ptr(inner) => Some(Arc::clone(inner)),
            _ => Some(ty),
        }
    }

    /// `N` for a `[N] T` array, `base.length()` otherwise
    fn length_of(&self, base: &ExprRef) -> ExprRef {
        match self.static_type(base).as_deref() {
            Some(TypeExpr::Array { len, .. }) => Arc::clone(len),
            _ => Expr::call(Expr::field(Arc::clone(base), "length"), Vec::new()),
        }
    }
}

fn inconsistent(err: FactError, span: Span) -> CheckError {
    warn!(%err, "contradictory fact");
    match err {
        FactError::Contradiction { existing, inserted } => CheckError::Inconsistent {
            existing,
            inserted,
            span,
        },
    }
}

fn relations_of(cond: &ExprRef, span: Span) -> Result<Vec<Relation>> {
    cond.conjuncts()
        .iter()
        .map(|conjunct| {
            Relation::from_expr(conjunct).ok_or_else(|| CheckError::NotARelation {
                expr: conjunct.to_string(),
                span,
            })
        })
        .collect()
}

/// `cond` itself when it is one relation, so that its negation is known
fn single_relation(cond: &ExprRef) -> Option<Relation> {
    match cond.conjuncts().as_slice() {
        [only] => Relation::from_expr(only),
        _ => None,
    }
}

/// For `x += k`, `x -= k` and `x = x + k` with constant `k`: the previous
/// value of `x` in terms of the new one
fn inverse_offset(var: &str, op: AssignOp, value: &ExprRef) -> Option<ExprRef> {
    let (forward, k) = match op {
        AssignOp::AddAssign => (BinaryOp::Add, value.const_value()?),
        AssignOp::SubAssign => (BinaryOp::Sub, value.const_value()?),
        AssignOp::Assign => match value.as_ref() {
            Expr::Binary {
                op: bin @ (BinaryOp::Add | BinaryOp::Sub),
                lhs,
                rhs,
            } if lhs.as_ident() == Some(var) => (*bin, rhs.const_value()?),
            Expr::Binary {
                op: BinaryOp::Add,
                lhs,
                rhs,
            } if rhs.as_ident() == Some(var) => (BinaryOp::Add, lhs.const_value()?),
            _ => return None,
        },
        AssignOp::MulAssign => return None,
    };
    let inverse = match forward {
        BinaryOp::Add => BinaryOp::Sub,
        _ => BinaryOp::Add,
    };
    Some(Expr::binary(inverse, Expr::ident(var), Expr::int(k)))
}

/// Does `expr` read an element or field of `root`? Lengths do not count.
fn reads_contents(expr: &Expr, root: &str) -> bool {
    match expr {
        Expr::Ident(_) | Expr::IntLit(_) | Expr::BoolLit(_) => false,
        Expr::Index { base, index } => {
            base.root_var() == Some(root) || reads_contents(base, root) || reads_contents(index, root)
        }
        Expr::Slice { base, lo, hi } => {
            base.root_var() == Some(root)
                || reads_contents(base, root)
                || [lo, hi].into_iter().flatten().any(|e| reads_contents(e, root))
        }
        Expr::Field { base, .. } => base.root_var() == Some(root) || reads_contents(base, root),
        Expr::Call { callee, args } => {
            let callee_reads = match callee.as_ref() {
                Expr::Field { base, name } if name == "length" => reads_contents(base, root),
                other => reads_contents(other, root),
            };
            callee_reads || args.iter().any(|a| reads_contents(&a.value, root))
        }
        Expr::Unary { operand, .. } => reads_contents(operand, root),
        Expr::Binary { lhs, rhs, .. } => reads_contents(lhs, root) || reads_contents(rhs, root),
        Expr::Associative { args, .. } => args.iter().any(|a| reads_contents(a, root)),
        Expr::Cast { value, .. } => reads_contents(value, root),
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::lexer::tokenize;
    use crate::parser::{parse, parse_expr};

    fn program(source: &str) -> Program {
        let tokens = tokenize(source).unwrap();
        parse("test.bp", source, tokens).unwrap()
    }

    fn check(source: &str) -> CheckReport {
        let config = CheckConfig {
            parallel: false,
            dump_facts: true,
            ..CheckConfig::default()
        };
        Checker::new(config).check_program(&program(source))
    }

    fn check_one(source: &str) -> FunctionReport {
        let mut report = check(source);
        assert_eq!(report.functions.len(), 1);
        report.functions.remove(0)
    }

    fn first_error(source: &str) -> CheckError {
        let report = check_one(source);
        report.errors.into_iter().next().expect("expected an error")
    }

    #[test]
    fn test_index_needs_bounds() {
        let ok = check_one(
            "func get(a [16] u8, i u32) u8 pre i < 16 { return a[i]; }",
        );
        assert!(ok.is_ok(), "{:?}", ok.errors);

        let err = first_error("func get(a [16] u8, i u32) u8 { return a[i]; }");
        assert!(matches!(
            err,
            CheckError::Unprovable {
                requirement: Requirement::IndexInBounds,
                ..
            }
        ));
        assert_eq!(err.to_string(), "cannot prove index in bounds: `i < 16`");
    }

    #[test]
    fn test_slice_length_from_pre() {
        let report = check_one(
            "func get(s [] u8, i u32) u8 pre i < s.length() { return s[i]; }",
        );
        assert!(report.is_ok(), "{:?}", report.errors);

        let err = first_error("func sub(s [] u8, i u32, j u32) { var t [] u8 = s[i:j]; }");
        assert_eq!(err.to_string(), "cannot prove slice bounds: `i <= j`");
    }

    #[test]
    fn test_narrowing_needs_proof() {
        let err = first_error("func f(x u32) u8 { return x as u8; }");
        assert_eq!(err.to_string(), "cannot prove value fits its type: `x <= 255`");

        let report = check_one("func f(x u32) u8 pre x < 200 { return x as u8; }");
        assert!(report.is_ok(), "{:?}", report.errors);
        let report = check_one("func f(x u32) u8 { return (x & 255) as u8; }");
        assert!(report.is_ok(), "{:?}", report.errors);
    }

    #[test]
    fn test_var_records_value() {
        let report = check_one("func f(n u32) { var i u32; var j u32 = n; }");
        assert!(report.is_ok(), "{:?}", report.errors);
        assert_eq!(report.facts.as_deref(), Some("0 == i\nj == n\n"));
    }

    #[test]
    fn test_assignment_invalidates() {
        let err = first_error(
            "func f(a [8] u8, i u32, j u32) u8 pre i < 8 { i = j; return a[i]; }",
        );
        assert!(matches!(err, CheckError::Unprovable { .. }));
    }

    #[test]
    fn test_increment_shifts_facts() {
        let report = check_one(
            "func f(i u32) pre i < 16, 4 <= i {
                i += 1;
                assert i <= 16;
                i -= 2;
                assert i < 15;
                assert 3 <= i;
            }",
        );
        assert!(report.is_ok(), "{:?}", report.errors);
    }

    #[test]
    fn test_element_write_keeps_lengths() {
        let report = check_one(
            "func f(s [] u8, i u32, j u32) pre i < s.length(), j < s.length() {
                s[i] = 0;
                s[j] = 1;
            }",
        );
        assert!(report.is_ok(), "{:?}", report.errors);
    }

    #[test]
    fn test_assert_records_fact() {
        let report = check_one(
            "func f(a u32, b u32, c u32) pre a < b, b < c { assert a < c; assert c > a; }",
        );
        assert!(report.is_ok(), "{:?}", report.errors);

        let err = first_error("func f(x u32) { assert x; }");
        assert!(matches!(err, CheckError::NotARelation { .. }));
    }

    #[test]
    fn test_reason_needs_single_relation() {
        let err = first_error(
            r#"func f(a u32, b u32) pre a < b { assert (a < b) and (a <= b) via "a < b: b > a"; }"#,
        );
        assert!(matches!(err, CheckError::ReasonArity { .. }));
    }

    #[test]
    fn test_if_merges_fall_through_branches() {
        let report = check_one(
            "func f(a [8] u8, i u32) u8 {
                if i < 8 { } else { i = 0; }
                return a[i];
            }",
        );
        assert!(report.is_ok(), "{:?}", report.errors);

        let report = check_one(
            "func f(a [8] u8, i u32) u8 {
                if i >= 8 { return 0; }
                return a[i];
            }",
        );
        assert!(report.is_ok(), "{:?}", report.errors);
    }

    #[test]
    fn test_redundant_guard_skips_dead_branch() {
        let report = check_one(
            "func get(a [8] u8, i u32) u8 pre i < 8 {
                if i < 8 { return a[i]; }
                return 0;
            }",
        );
        assert!(report.is_ok(), "{:?}", report.errors);

        // the dead branch is not checked and adds nothing at the join
        let report = check_one(
            "func get(a [8] u8, i u32, n u32) u8 pre i < 8, i < n {
                if i >= n { return a[n]; }
                if i > 10 { i = 100; }
                return a[i];
            }",
        );
        assert!(report.is_ok(), "{:?}", report.errors);
    }

    #[test]
    fn test_contradicting_preconditions_are_inconsistent() {
        let err = first_error("func f(i u32, n u32) pre i < n, n <= i { }");
        assert_eq!(err.to_string(), "`n <= i` contradicts the known fact `i < n`");
    }

    #[test]
    fn test_branch_facts_do_not_escape() {
        let err = first_error(
            "func f(a [8] u8, i u32) u8 {
                if i < 8 { assert i < 8; }
                return a[i];
            }",
        );
        assert_eq!(err.to_string(), "cannot prove index in bounds: `i < 8`");

        let err = first_error(
            "func f(a [8] u8, i u32, j u32) u8 {
                if j < 4 { i = j; assert i < 8; }
                return a[i];
            }",
        );
        assert_eq!(err.to_string(), "cannot prove index in bounds: `i < 8`");
    }

    #[test]
    fn test_loop_invariant() {
        let report = check_one(
            "func fill(a [16] u8) {
                var i u32 = 0;
                while i < 16, inv i <= 16 {
                    a[i] = 0;
                    i += 1;
                }
                assert i == 16;
            }",
        );
        assert!(report.is_ok(), "{:?}", report.errors);

        let err = first_error(
            "func f(n u32) {
                var i u32 = 0;
                while i < n, inv i <= 8 { i += 1; }
            }",
        );
        assert!(matches!(
            err,
            CheckError::Unprovable {
                requirement: Requirement::InvariantPreserved,
                ..
            }
        ));
    }

    #[test]
    fn test_loop_condition_checked_at_loop_head() {
        let err = first_error(
            "func scan(a [16] u8, j u32) {
                var i u32 = 0;
                while a[i] != 0 { i = j; }
            }",
        );
        assert!(matches!(
            err,
            CheckError::Unprovable {
                requirement: Requirement::IndexInBounds,
                ..
            }
        ));

        let report = check_one(
            "func scan(a [16] u8) {
                var i u32 = 0;
                while a[i] != 0, inv i < 16 { i = 15; }
            }",
        );
        assert!(report.is_ok(), "{:?}", report.errors);
    }

    #[test]
    fn test_postcondition() {
        let report = check_one("func f(x u32) u32 pre x < 10 post ret < 20 { return x + 1; }");
        assert!(report.is_ok(), "{:?}", report.errors);

        let err = first_error("func f(x u32) u32 post ret < 20 { return x; }");
        assert_eq!(err.to_string(), "cannot prove postcondition: `x < 20`");
    }

    #[test]
    fn test_call_preconditions() {
        let report = check(
            "func g(n u32) u32 pre n < 10 { return n; }
             func f(m u32) u32 pre m < 5 { return g(n: m); }
             func h(m u32) u32 { return g(n: m); }
             func k(m u32) u32 { return g(x: m); }",
        );
        assert!(report.functions[0].is_ok());
        assert!(report.functions[1].is_ok(), "{:?}", report.functions[1].errors);
        assert!(matches!(
            report.functions[2].errors[0],
            CheckError::Unprovable {
                requirement: Requirement::CallPrecondition,
                ..
            }
        ));
        assert!(matches!(report.functions[3].errors[0], CheckError::CallArguments { .. }));
    }

    #[test]
    fn test_unknown_names() {
        let err = first_error("func f() { assert y < 3; }");
        assert_eq!(
            err,
            CheckError::UnknownVariable {
                name: "y".to_string(),
                span: Span::new(11, 24),
            }
        );
        assert!(matches!(
            first_error("func f(x u32) { x = nope(a: 1); }"),
            CheckError::UnknownFunction { .. }
        ));
    }

    #[test]
    fn test_inverse_offset() {
        let one = Expr::int(1);
        let render = |op, value: &ExprRef| inverse_offset("i", op, value).map(|e| e.to_string());
        assert_eq!(render(AssignOp::AddAssign, &one), Some("i - 1".to_string()));
        assert_eq!(render(AssignOp::SubAssign, &one), Some("i + 1".to_string()));
        assert_eq!(
            render(AssignOp::Assign, &parse_expr("i + 4").unwrap()),
            Some("i - 4".to_string())
        );
        assert_eq!(render(AssignOp::Assign, &parse_expr("j + 4").unwrap()), None);
        assert_eq!(render(AssignOp::AddAssign, &parse_expr("j").unwrap()), None);
        assert_eq!(render(AssignOp::MulAssign, &one), None);
    }

    #[test]
    fn test_reads_contents() {
        let reads = |s: &str| reads_contents(&parse_expr(s).unwrap(), "a");
        assert!(reads("a[i]"));
        assert!(reads("a[i:j][0]"));
        assert!(reads("x + a.f"));
        assert!(reads("b[a[0]]"));
        assert!(!reads("a.length()"));
        assert!(!reads("i < b[i]"));
    }
}
