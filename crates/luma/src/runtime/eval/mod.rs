// The tree-walking evaluator: a single recursive walker with an explicit
// outcome sum. Statements live here; expressions in expr.rs, operators and
// metamethods in metamethod.rs, calls in call.rs.

pub mod call;
pub mod expr;
pub mod metamethod;

use crate::gc::ScopeId;
use crate::runtime::env::Scope;
use crate::runtime::{Control, ErrorKind, Eval, MetaEvent, RtError, Runtime};
use crate::syntax::ast::{Attrib, Block, Expr, Stmt};
use crate::value::Value;
use smol_str::SmolStr;

impl Runtime {
    // ---- scope lifecycle ----

    pub(crate) fn enter_scope(&self, parent: ScopeId) -> ScopeId {
        let id = self.new_scope(Scope::new(Some(parent)));
        self.with_cur_exec(|e| e.scopes.push(id));
        id
    }

    /// Close a scope on any exit path: runs to-be-closed values in reverse
    /// declaration order, passing the in-flight error (if any) to each
    /// closer. A closer that fails replaces the propagating error.
    pub(crate) fn leave_scope<T>(&self, scope: ScopeId, result: Eval<T>) -> Eval<T> {
        let tbc: Vec<(SmolStr, crate::gc::BindingId)> = {
            let heap = self.state.heap.borrow();
            heap.scope(scope).tbc.clone()
        };
        if tbc.is_empty() {
            self.pop_scope(scope);
            return result;
        }

        // Root in-flight values while closers run.
        let mark = self.stack_mark();
        let mut outcome = result;
        match &outcome {
            Ok(_) => {}
            Err(Control::Return(values)) => {
                for &v in values {
                    self.stack_push(v);
                }
            }
            Err(Control::Error(e)) => self.stack_push(e.value),
            Err(Control::Close(Some(e))) => self.stack_push(e.value),
            Err(_) => {}
        }

        for (name, binding) in tbc.iter().rev() {
            let value = self.state.heap.borrow().binding(*binding).value;
            if !value.is_truthy() {
                continue;
            }
            let err_arg = match &outcome {
                Err(Control::Error(e)) => e.value,
                Err(Control::Close(Some(e))) => e.value,
                _ => Value::Nil,
            };
            let close_result = match self.metamethod(value, MetaEvent::Close) {
                Some(mm) => self.call_value(mm, vec![value, err_arg]).map(|_| ()),
                None => Err(self.error_here(
                    ErrorKind::TypeError,
                    format!("variable '{}' has no '__close' metamethod", name),
                )),
            };
            if let Err(control) = close_result {
                let new_err = match control {
                    Control::Error(e) => e,
                    // A closer itself being torn down; keep unwinding.
                    Control::Close(Some(e)) => e,
                    Control::Close(None) => {
                        // A teardown unwind surfaced inside the closer;
                        // convert this exit into the same unwind.
                        if !matches!(outcome, Err(Control::Close(_))) {
                            outcome = Err(Control::Close(None));
                        }
                        continue;
                    }
                    other => {
                        // Closers cannot break/goto/return outwards.
                        debug_assert!(false, "stray control from closer: {:?}", other);
                        continue;
                    }
                };
                self.stack_push(new_err.value);
                outcome = match outcome {
                    // Keep the teardown marker on close-unwinds.
                    Err(Control::Close(_)) => Err(Control::Close(Some(new_err))),
                    _ => Err(Control::Error(new_err)),
                };
            }
        }

        self.stack_truncate(mark);
        self.pop_scope(scope);
        outcome
    }

    fn pop_scope(&self, scope: ScopeId) {
        self.with_cur_exec(|e| {
            if let Some(pos) = e.scopes.iter().rposition(|&s| s == scope) {
                e.scopes.remove(pos);
            }
        });
    }

    // ---- blocks and statements ----

    /// Execute the statements of `block` in an existing scope. Handles
    /// `goto` landing on labels of this block.
    pub(crate) fn exec_block_in(&self, block: &Block, scope: ScopeId) -> Eval<()> {
        let mut idx = 0;
        while idx < block.stmts.len() {
            match self.exec_stmt(&block.stmts[idx], scope) {
                Ok(()) => idx += 1,
                Err(Control::Goto(label)) => {
                    let target = block.stmts.iter().position(
                        |s| matches!(s, Stmt::Label { name } if *name == label),
                    );
                    match target {
                        Some(pos) => idx = pos + 1,
                        None => return Err(Control::Goto(label)),
                    }
                }
                Err(other) => return Err(other),
            }
        }
        Ok(())
    }

    /// Execute a block in a fresh child scope.
    fn exec_block_scoped(&self, block: &Block, parent: ScopeId) -> Eval<()> {
        let scope = self.enter_scope(parent);
        let result = self.exec_block_in(block, scope);
        self.leave_scope(scope, result)
    }

    pub(crate) fn exec_stmt(&self, stmt: &Stmt, scope: ScopeId) -> Eval<()> {
        match stmt {
            Stmt::Local { names, exprs, span } => {
                self.set_line(span.line);
                let mark = self.stack_mark();
                self.eval_exprs_onto_stack(exprs, scope)?;
                self.adjust_stack(mark, names.len());
                let values = self.stack_peek(mark);
                for ((name, attr), value) in names.iter().zip(values) {
                    match attr {
                        Attrib::None => {
                            self.declare(scope, name, value, false);
                        }
                        Attrib::Const => {
                            self.declare(scope, name, value, true);
                        }
                        Attrib::Close => {
                            self.declare_to_be_closed(scope, name, value)?;
                        }
                    }
                }
                self.stack_truncate(mark);
                Ok(())
            }
            Stmt::Assign {
                targets,
                exprs,
                span,
            } => self.exec_assign(targets, exprs, *span, scope),
            Stmt::Call(expr) => {
                let mark = self.stack_mark();
                self.eval_multi_onto_stack(expr, scope)?;
                self.stack_truncate(mark);
                Ok(())
            }
            Stmt::Do(block) => self.exec_block_scoped(block, scope),
            Stmt::While { cond, body } => loop {
                if !self.eval_expr(cond, scope)?.is_truthy() {
                    return Ok(());
                }
                match self.exec_block_scoped(body, scope) {
                    Ok(()) => {}
                    Err(Control::Break) => return Ok(()),
                    Err(other) => return Err(other),
                }
            },
            Stmt::Repeat { body, cond } => loop {
                // The until-expression sees the body's locals, so the scope
                // stays open until it is evaluated.
                let inner = self.enter_scope(scope);
                let mut finished = false;
                let body_result = self.exec_block_in(body, inner).and_then(|()| {
                    finished = self.eval_expr(cond, inner)?.is_truthy();
                    Ok(())
                });
                match self.leave_scope(inner, body_result) {
                    Ok(()) => {
                        if finished {
                            return Ok(());
                        }
                    }
                    Err(Control::Break) => return Ok(()),
                    Err(other) => return Err(other),
                }
            },
            Stmt::If { arms, orelse } => {
                for (cond, block) in arms {
                    if self.eval_expr(cond, scope)?.is_truthy() {
                        return self.exec_block_scoped(block, scope);
                    }
                }
                if let Some(block) = orelse {
                    return self.exec_block_scoped(block, scope);
                }
                Ok(())
            }
            Stmt::NumericFor {
                var,
                start,
                limit,
                step,
                body,
                span,
            } => self.exec_numeric_for(var, start, limit, step.as_ref(), body, *span, scope),
            Stmt::GenericFor {
                names,
                exprs,
                body,
                span,
            } => self.exec_generic_for(names, exprs, body, *span, scope),
            Stmt::FunctionDecl { target, func, span } => {
                self.set_line(span.line);
                let closure = self.make_closure(func.clone(), scope);
                match target {
                    Expr::Name(name, _) => self.assign_name(scope, name, closure),
                    Expr::Index { obj, key, span } => {
                        let mark = self.stack_mark();
                        let obj_v = self.eval_expr(obj, scope)?;
                        self.stack_push(obj_v);
                        self.stack_push(closure);
                        let key_v = self.eval_expr(key, scope)?;
                        let r = self.set_index_value(obj_v, key_v, closure, *span);
                        self.stack_truncate(mark);
                        r
                    }
                    _ => unreachable!("parser produces only name/index targets"),
                }
            }
            Stmt::LocalFunction { name, func, span } => {
                self.set_line(span.line);
                // Declare first so the closure sees its own binding.
                self.declare(scope, name, Value::Nil, false);
                let closure = self.make_closure(func.clone(), scope);
                self.assign_name(scope, name, closure)
            }
            Stmt::Return { exprs, span } => {
                self.set_line(span.line);
                let mark = self.stack_mark();
                self.eval_exprs_onto_stack(exprs, scope)?;
                Err(Control::Return(self.stack_drain(mark)))
            }
            Stmt::Break { .. } => Err(Control::Break),
            Stmt::Goto { label, .. } => Err(Control::Goto(label.clone())),
            Stmt::Label { .. } => Ok(()),
        }
    }

    fn declare_to_be_closed(&self, scope: ScopeId, name: &SmolStr, value: Value) -> Eval<()> {
        if value.is_truthy() && self.metamethod(value, MetaEvent::Close).is_none() {
            return Err(self.error_here(
                ErrorKind::TypeError,
                format!(
                    "variable '{}' got a non-closable value ({})",
                    name,
                    value.type_name()
                ),
            ));
        }
        let binding = self.declare(scope, name, value, true);
        let mut heap = self.state.heap.borrow_mut();
        heap.scope_mut(scope).tbc.push((name.clone(), binding));
        Ok(())
    }

    fn exec_assign(
        &self,
        targets: &[Expr],
        exprs: &[Expr],
        span: crate::syntax::Span,
        scope: ScopeId,
    ) -> Eval<()> {
        self.set_line(span.line);
        enum Slot {
            Name(SmolStr),
            Index(Value, Value, crate::syntax::Span),
        }
        let mark = self.stack_mark();
        // Target prefixes evaluate once, before any store.
        let mut slots = Vec::with_capacity(targets.len());
        for target in targets {
            match target {
                Expr::Name(name, _) => slots.push(Slot::Name(name.clone())),
                Expr::Index { obj, key, span } => {
                    let obj_v = self.eval_expr(obj, scope)?;
                    self.stack_push(obj_v);
                    let key_v = self.eval_expr(key, scope)?;
                    self.stack_push(key_v);
                    slots.push(Slot::Index(obj_v, key_v, *span));
                }
                _ => unreachable!("parser produces only name/index targets"),
            }
        }
        // All right-hand expressions evaluate before any left-hand store.
        let values_mark = self.stack_mark();
        self.eval_exprs_onto_stack(exprs, scope)?;
        self.adjust_stack(values_mark, targets.len());
        let values = self.stack_peek(values_mark);
        let result = (|| {
            for (slot, value) in slots.iter().zip(values) {
                match slot {
                    Slot::Name(name) => self.assign_name(scope, name, value)?,
                    Slot::Index(obj, key, span) => {
                        self.set_index_value(*obj, *key, value, *span)?
                    }
                }
            }
            Ok(())
        })();
        self.stack_truncate(mark);
        result
    }

    fn exec_numeric_for(
        &self,
        var: &SmolStr,
        start: &Expr,
        limit: &Expr,
        step: Option<&Expr>,
        body: &Block,
        span: crate::syntax::Span,
        scope: ScopeId,
    ) -> Eval<()> {
        self.set_line(span.line);
        let start_v = self.eval_expr(start, scope)?;
        let limit_v = self.eval_expr(limit, scope)?;
        let step_v = match step {
            Some(e) => self.eval_expr(e, scope)?,
            None => Value::Int(1),
        };
        let number = |v: Value, what: &str| -> Eval<Value> {
            match v {
                Value::Int(_) | Value::Float(_) => Ok(v),
                _ => Err(self.error_at(
                    span,
                    ErrorKind::TypeError,
                    format!("'for' {} must be a number", what),
                )),
            }
        };
        let start_v = number(start_v, "initial value")?;
        let limit_v = number(limit_v, "limit")?;
        let step_v = number(step_v, "step")?;

        if let (Value::Int(i0), Value::Int(limit), Value::Int(step)) = (start_v, limit_v, step_v) {
            if step == 0 {
                return Err(self.error_at(
                    span,
                    ErrorKind::ArithError,
                    "'for' step is zero".to_string(),
                ));
            }
            let mut i = i0;
            loop {
                if step > 0 {
                    if i > limit {
                        return Ok(());
                    }
                } else if i < limit {
                    return Ok(());
                }
                match self.run_for_body(var, Value::Int(i), None, body, scope)? {
                    LoopStep::Break => return Ok(()),
                    LoopStep::Continue => {}
                }
                // Integer overflow terminates the loop instead of wrapping.
                match i.checked_add(step) {
                    Some(next) => i = next,
                    None => return Ok(()),
                }
            }
        }

        // Any float operand converts the whole loop to float stepping.
        let mut i = start_v.as_float().unwrap();
        let limit = limit_v.as_float().unwrap();
        let step = step_v.as_float().unwrap();
        if step == 0.0 {
            return Err(self.error_at(
                span,
                ErrorKind::ArithError,
                "'for' step is zero".to_string(),
            ));
        }
        loop {
            if step > 0.0 {
                if !(i <= limit) {
                    return Ok(());
                }
            } else if !(i >= limit) {
                return Ok(());
            }
            match self.run_for_body(var, Value::Float(i), None, body, scope)? {
                LoopStep::Break => return Ok(()),
                LoopStep::Continue => {}
            }
            i += step;
        }
    }

    /// One iteration in a fresh scope: the control variable is a new binding
    /// every time, so closures capture the iteration's value.
    fn run_for_body(
        &self,
        var: &SmolStr,
        value: Value,
        extra: Option<(&[SmolStr], &[Value])>,
        body: &Block,
        parent: ScopeId,
    ) -> Eval<LoopStep> {
        let scope = self.enter_scope(parent);
        self.declare(scope, var, value, false);
        if let Some((names, values)) = extra {
            for (name, v) in names.iter().zip(values.iter().copied()) {
                self.declare(scope, name, v, false);
            }
        }
        let result = self.exec_block_in(body, scope);
        match self.leave_scope(scope, result) {
            Ok(()) => Ok(LoopStep::Continue),
            Err(Control::Break) => Ok(LoopStep::Break),
            Err(other) => Err(other),
        }
    }

    fn exec_generic_for(
        &self,
        names: &[SmolStr],
        exprs: &[Expr],
        body: &Block,
        span: crate::syntax::Span,
        scope: ScopeId,
    ) -> Eval<()> {
        self.set_line(span.line);
        let mark = self.stack_mark();
        self.eval_exprs_onto_stack(exprs, scope)?;
        self.adjust_stack(mark, 4);
        let state = self.stack_get(mark + 1);
        let closer = self.stack_get(mark + 3);
        let iter = self.stack_get(mark);

        // The loop owns a scope so the closing value tears down with it.
        let loop_scope = self.enter_scope(scope);
        let result = (|| -> Eval<()> {
            if closer.is_truthy() {
                self.declare_to_be_closed(loop_scope, &SmolStr::new("(for closer)"), closer)?;
            }
            let mut ctrl = self.stack_get(mark + 2);
            loop {
                let results = self.call_value(iter, vec![state, ctrl])?;
                let first = results.first().copied().unwrap_or(Value::Nil);
                if first.is_nil() {
                    return Ok(());
                }
                ctrl = first;
                // Root the iteration results while the body runs.
                let iter_mark = self.stack_mark();
                for &v in &results {
                    self.stack_push(v);
                }
                let mut values = results;
                values.resize(names.len().max(1), Value::Nil);
                let step = self.run_for_body(
                    &names[0],
                    values[0],
                    Some((&names[1..], &values[1..])),
                    body,
                    loop_scope,
                );
                self.stack_truncate(iter_mark);
                match step? {
                    LoopStep::Break => return Ok(()),
                    LoopStep::Continue => {}
                }
            }
        })();
        let result = self.leave_scope(loop_scope, result);
        self.stack_truncate(mark);
        result
    }

    /// Pad with nils or truncate so exactly `want` values sit above `mark`.
    pub(crate) fn adjust_stack(&self, mark: usize, want: usize) {
        self.with_cur_exec(|e| {
            let have = e.stack.len() - mark;
            if have < want {
                e.stack.resize(mark + want, Value::Nil);
            } else {
                e.stack.truncate(mark + want);
            }
        });
    }

    /// Run `f` with errors converted to `(false, err)` form: the finalizer
    /// path, where failures are logged and discarded.
    pub(crate) fn run_finalizer(&self, finalizer: Value, target: Value) -> Result<(), RtError> {
        match self.call_value(finalizer, vec![target]) {
            Ok(_) => Ok(()),
            Err(Control::Error(e)) => Err(e),
            Err(Control::Close(Some(e))) => Err(e),
            Err(_) => Err(RtError::new(
                ErrorKind::FinalizationError,
                Value::Nil,
            )),
        }
    }
}

enum LoopStep {
    Continue,
    Break,
}
