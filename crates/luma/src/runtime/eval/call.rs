// Call machinery: frame push/pop, parameter binding, `__call` resolution,
// protected calls and script-level `error`.

use crate::gc::ScopeId;
use crate::runtime::env::Scope;
use crate::runtime::frame::CallFrame;
use crate::runtime::{Control, ErrorKind, Eval, MetaEvent, RtError, Runtime, MAX_CALL_DEPTH};
use crate::syntax::ast::FuncDef;
use crate::value::{Function, NativeCall, NativeFn, Value};
use smol_str::SmolStr;
use std::rc::Rc;

/// How many `__call` indirections are tolerated before giving up.
const MAX_CALL_CHAIN: usize = 16;

enum ResolvedCallee {
    Native(NativeFn, Vec<Value>, SmolStr),
    Script(Rc<FuncDef>, ScopeId, SmolStr),
}

impl Runtime {
    /// Call any callable value with `args`, returning all results.
    pub(crate) fn call_value(&self, callee: Value, args: Vec<Value>) -> Eval<Vec<Value>> {
        let mut callee = callee;
        let mut args = args;
        let mut hops = 0;
        let fid = loop {
            if let Value::Function(id) = callee {
                break id;
            }
            match self.metamethod(callee, MetaEvent::Call) {
                Some(mm) => {
                    args.insert(0, callee);
                    callee = mm;
                    hops += 1;
                    if hops > MAX_CALL_CHAIN {
                        return Err(self.error_here(
                            ErrorKind::CallError,
                            "'__call' chain too long; possible loop".to_string(),
                        ));
                    }
                }
                None => {
                    return Err(self.error_here(
                        ErrorKind::CallError,
                        format!("attempt to call a {} value", callee.type_name()),
                    ));
                }
            }
        };

        let depth = self.with_cur_exec(|e| e.frames.len());
        if depth >= MAX_CALL_DEPTH {
            return Err(self.error_here(ErrorKind::CallError, "stack overflow".to_string()));
        }

        let resolved = {
            let heap = self.state.heap.borrow();
            match heap.function(fid) {
                Function::Native(n) => {
                    ResolvedCallee::Native(n.f, n.upvalues.clone(), n.name.clone())
                }
                Function::Script(c) => {
                    ResolvedCallee::Script(c.def.clone(), c.env, heap.function(fid).name())
                }
            }
        };

        // Root the callee and its arguments for the duration of the call.
        let mark = self.stack_mark();
        self.stack_push(callee);
        for &a in &args {
            self.stack_push(a);
        }

        let (caller_source, call_line) = self.where_am_i();
        let result = match resolved {
            ResolvedCallee::Native(f, upvalues, name) => {
                self.with_cur_exec(|e| {
                    e.frames.push(CallFrame {
                        name,
                        source: caller_source,
                        call_line,
                        line: call_line,
                        protected: false,
                    })
                });
                let call = NativeCall { args, upvalues };
                let r = f(self, &call);
                self.with_cur_exec(|e| {
                    e.frames.pop();
                });
                r
            }
            ResolvedCallee::Script(def, env, name) => {
                self.with_cur_exec(|e| {
                    e.frames.push(CallFrame {
                        name,
                        source: def.source.clone(),
                        call_line,
                        line: def.span.line,
                        protected: false,
                    })
                });
                let r = self.call_script(&def, env, args);
                self.with_cur_exec(|e| {
                    e.frames.pop();
                });
                r
            }
        };

        self.stack_truncate(mark);
        result
    }

    fn call_script(&self, def: &Rc<FuncDef>, env: ScopeId, mut args: Vec<Value>) -> Eval<Vec<Value>> {
        let varargs = if def.is_vararg {
            if args.len() > def.params.len() {
                Some(args.split_off(def.params.len()))
            } else {
                Some(Vec::new())
            }
        } else {
            None
        };
        let scope = self.new_scope(Scope::function_root(Some(env), varargs));
        self.with_cur_exec(|e| e.scopes.push(scope));
        for (i, param) in def.params.iter().enumerate() {
            let value = args.get(i).copied().unwrap_or(Value::Nil);
            self.declare(scope, param, value, false);
        }
        let body_result = self.exec_block_in(&def.body, scope);
        let outcome = self.leave_scope(scope, body_result);
        self.with_cur_exec(|e| {
            e.scopes.pop();
        });
        match outcome {
            Ok(()) => Ok(Vec::new()),
            Err(Control::Return(values)) => Ok(values),
            Err(other) => Err(other),
        }
    }

    /// pcall: catches only `Error`; coroutine teardown passes through.
    pub(crate) fn protected_call(&self, f: Value, args: Vec<Value>) -> Eval<Vec<Value>> {
        self.with_cur_exec(|e| {
            if let Some(frame) = e.frames.last_mut() {
                frame.protected = true;
            }
        });
        match self.call_value(f, args) {
            Ok(mut values) => {
                let mut out = vec![Value::Bool(true)];
                out.append(&mut values);
                Ok(out)
            }
            Err(Control::Error(err)) => Ok(vec![Value::Bool(false), err.value]),
            Err(other) => Err(other),
        }
    }

    /// xpcall: like pcall but routes the error value through `handler`.
    pub(crate) fn protected_call_with_handler(
        &self,
        f: Value,
        handler: Value,
        args: Vec<Value>,
    ) -> Eval<Vec<Value>> {
        self.with_cur_exec(|e| {
            if let Some(frame) = e.frames.last_mut() {
                frame.protected = true;
            }
        });
        match self.call_value(f, args) {
            Ok(mut values) => {
                let mut out = vec![Value::Bool(true)];
                out.append(&mut values);
                Ok(out)
            }
            Err(Control::Error(err)) => {
                // Root the original error value across the handler call.
                let mark = self.stack_mark();
                self.stack_push(err.value);
                let handled = self.call_value(handler, vec![err.value]);
                self.stack_truncate(mark);
                let result = handled?.first().copied().unwrap_or(Value::Nil);
                Ok(vec![Value::Bool(false), result])
            }
            Err(other) => Err(other),
        }
    }

    /// `error(v, level)`: raise `v`, prefixing "<source>:<line>: " onto
    /// string values when level > 0.
    pub(crate) fn raise(&self, value: Value, level: i64) -> Control {
        let value = if level > 0 {
            if let Value::Str(id) = value {
                // Level 1 is the function that called error(); the innermost
                // frame here is the `error` native itself.
                let located = self.with_cur_exec(|e| {
                    let depth = e.frames.len();
                    let target = depth.checked_sub(1 + level as usize);
                    target.and_then(|i| e.frames.get(i)).map(|f| (f.source.clone(), f.line))
                });
                match located {
                    Some((source, line)) => {
                        let text = self.with_string(id, |b| String::from_utf8_lossy(b).into_owned());
                        self.str_value(&format!("{}:{}: {}", source, line, text))
                    }
                    None => value,
                }
            } else {
                value
            }
        } else {
            value
        };
        let mut err = RtError::new(ErrorKind::RuntimeError, value);
        err.traceback = self.capture_traceback();
        Control::Error(err)
    }
}
