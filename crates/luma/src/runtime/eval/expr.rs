// Expression evaluation. Single-value contexts go through `eval_expr`;
// multi-value positions (argument lists, return lists, assignment RHS,
// table constructors) stage results on the execution's value stack, which
// doubles as the GC root for temporaries.

use crate::gc::ScopeId;
use crate::runtime::{ErrorKind, Eval, Runtime};
use crate::syntax::ast::{BinOp, Expr, TableItem, UnOp};
use crate::value::Value;

impl Runtime {
    /// Evaluate to exactly one value (multi-value expressions truncate).
    pub(crate) fn eval_expr(&self, expr: &Expr, scope: ScopeId) -> Eval<Value> {
        match expr {
            Expr::Nil(_) => Ok(Value::Nil),
            Expr::True(_) => Ok(Value::Bool(true)),
            Expr::False(_) => Ok(Value::Bool(false)),
            Expr::Int(i, _) => Ok(Value::Int(*i)),
            Expr::Float(f, _) => Ok(Value::Float(*f)),
            Expr::Str(bytes, _) => Ok(self.new_string(bytes)),
            Expr::VarArg(_) => {
                let varargs = self.find_varargs(scope);
                Ok(varargs.first().copied().unwrap_or(Value::Nil))
            }
            Expr::Name(name, _) => Ok(self.lookup_name(scope, name)),
            Expr::Index { obj, key, span } => {
                let mark = self.stack_mark();
                let obj_v = self.eval_expr(obj, scope)?;
                self.stack_push(obj_v);
                let key_v = self.eval_expr(key, scope)?;
                let result = self.index_value(obj_v, key_v, *span);
                self.stack_truncate(mark);
                result
            }
            Expr::Paren(inner) => self.eval_expr(inner, scope),
            Expr::Function(def) => Ok(self.make_closure(def.clone(), scope)),
            Expr::Call { .. } | Expr::MethodCall { .. } => {
                let mark = self.stack_mark();
                self.eval_multi_onto_stack(expr, scope)?;
                let first = self.with_cur_exec(|e| e.stack.get(mark).copied());
                self.stack_truncate(mark);
                Ok(first.unwrap_or(Value::Nil))
            }
            Expr::Table { items, span } => self.eval_table_ctor(items, *span, scope),
            Expr::Binary { op, lhs, rhs, span } => match op {
                BinOp::And => {
                    let left = self.eval_expr(lhs, scope)?;
                    if left.is_truthy() {
                        self.eval_expr(rhs, scope)
                    } else {
                        Ok(left)
                    }
                }
                BinOp::Or => {
                    let left = self.eval_expr(lhs, scope)?;
                    if left.is_truthy() {
                        Ok(left)
                    } else {
                        self.eval_expr(rhs, scope)
                    }
                }
                _ => {
                    let mark = self.stack_mark();
                    let left = self.eval_expr(lhs, scope)?;
                    self.stack_push(left);
                    let right = self.eval_expr(rhs, scope)?;
                    self.stack_push(right);
                    let result = match op {
                        BinOp::Add
                        | BinOp::Sub
                        | BinOp::Mul
                        | BinOp::Div
                        | BinOp::IDiv
                        | BinOp::Mod
                        | BinOp::Pow
                        | BinOp::BAnd
                        | BinOp::BOr
                        | BinOp::BXor
                        | BinOp::Shl
                        | BinOp::Shr => self.arith(*op, left, right, *span),
                        BinOp::Concat => self.concat_values(left, right, *span),
                        BinOp::Eq => self.values_equal(left, right).map(Value::Bool),
                        BinOp::Ne => self
                            .values_equal(left, right)
                            .map(|eq| Value::Bool(!eq)),
                        BinOp::Lt => self.less_than(left, right, *span).map(Value::Bool),
                        BinOp::Le => self.less_equal(left, right, *span).map(Value::Bool),
                        BinOp::Gt => self.less_than(right, left, *span).map(Value::Bool),
                        BinOp::Ge => self.less_equal(right, left, *span).map(Value::Bool),
                        BinOp::And | BinOp::Or => unreachable!(),
                    };
                    self.stack_truncate(mark);
                    result
                }
            },
            Expr::Unary { op, operand, span } => {
                let v = self.eval_expr(operand, scope)?;
                match op {
                    UnOp::Not => Ok(Value::Bool(!v.is_truthy())),
                    UnOp::Len => self.length_of(v, *span),
                    UnOp::Neg | UnOp::BNot => {
                        let mark = self.stack_mark();
                        self.stack_push(v);
                        let r = self.arith_unary(*op, v, *span);
                        self.stack_truncate(mark);
                        r
                    }
                }
            }
        }
    }

    /// Push every result of `expr` onto the value stack (calls and `...`
    /// spread; anything else contributes one value).
    pub(crate) fn eval_multi_onto_stack(&self, expr: &Expr, scope: ScopeId) -> Eval<()> {
        match expr {
            Expr::Call { func, args, span } => {
                self.set_line(span.line);
                let mark = self.stack_mark();
                let callee = self.eval_expr(func, scope)?;
                self.stack_push(callee);
                self.eval_exprs_onto_stack(args, scope)?;
                let call_args = self.stack_peek(mark + 1);
                let results = {
                    let r = self.call_value(callee, call_args);
                    self.stack_truncate(mark);
                    r?
                };
                for v in results {
                    self.stack_push(v);
                }
                Ok(())
            }
            Expr::MethodCall {
                obj,
                method,
                args,
                span,
            } => {
                self.set_line(span.line);
                let mark = self.stack_mark();
                let receiver = self.eval_expr(obj, scope)?;
                self.stack_push(receiver);
                let key = Value::Str(self.intern_name(method));
                let callee = self.index_value(receiver, key, *span)?;
                self.stack_push(callee);
                self.eval_exprs_onto_stack(args, scope)?;
                let mut call_args = self.stack_peek(mark + 2);
                call_args.insert(0, receiver);
                let results = {
                    let r = self.call_value(callee, call_args);
                    self.stack_truncate(mark);
                    r?
                };
                for v in results {
                    self.stack_push(v);
                }
                Ok(())
            }
            Expr::VarArg(_) => {
                for v in self.find_varargs(scope) {
                    self.stack_push(v);
                }
                Ok(())
            }
            other => {
                let v = self.eval_expr(other, scope)?;
                self.stack_push(v);
                Ok(())
            }
        }
    }

    /// Evaluate an expression list with spreading: every expression except
    /// the last contributes exactly one value; the last spreads.
    pub(crate) fn eval_exprs_onto_stack(&self, exprs: &[Expr], scope: ScopeId) -> Eval<()> {
        let Some((last, init)) = exprs.split_last() else {
            return Ok(());
        };
        for e in init {
            let v = self.eval_expr(e, scope)?;
            self.stack_push(v);
        }
        self.eval_multi_onto_stack(last, scope)
    }

    fn eval_table_ctor(
        &self,
        items: &[TableItem],
        span: crate::syntax::Span,
        scope: ScopeId,
    ) -> Eval<Value> {
        let tid = self.new_table();
        let table = Value::Table(tid);
        let mark = self.stack_mark();
        self.stack_push(table);
        let result = (|| -> Eval<()> {
            let mut next_index: i64 = 1;
            for (i, item) in items.iter().enumerate() {
                match item {
                    TableItem::Item(expr) => {
                        let last = i + 1 == items.len();
                        if last && expr.is_multi() {
                            let spread_mark = self.stack_mark();
                            self.eval_multi_onto_stack(expr, scope)?;
                            let values = self.stack_drain(spread_mark);
                            for v in values {
                                self.raw_set(tid, Value::Int(next_index), v).map_err(|m| {
                                    self.error_at(span, ErrorKind::IndexError, m.to_string())
                                })?;
                                next_index += 1;
                            }
                        } else {
                            let v = self.eval_expr(expr, scope)?;
                            self.raw_set(tid, Value::Int(next_index), v).map_err(|m| {
                                self.error_at(span, ErrorKind::IndexError, m.to_string())
                            })?;
                            next_index += 1;
                        }
                    }
                    TableItem::Named(name, expr) => {
                        let key = Value::Str(self.intern_name(name));
                        let v = self.eval_expr(expr, scope)?;
                        self.raw_set(tid, key, v).map_err(|m| {
                            self.error_at(span, ErrorKind::IndexError, m.to_string())
                        })?;
                    }
                    TableItem::Keyed(key_expr, value_expr) => {
                        let key = self.eval_expr(key_expr, scope)?;
                        self.stack_push(key);
                        let v = self.eval_expr(value_expr, scope)?;
                        let set = self.raw_set(tid, key, v).map_err(|m| {
                            self.error_at(span, ErrorKind::IndexError, m.to_string())
                        });
                        self.with_cur_exec(|e| {
                            e.stack.pop();
                        });
                        set?;
                    }
                }
            }
            Ok(())
        })();
        self.stack_truncate(mark);
        result.map(|()| table)
    }
}
