// Callables: script closures (AST body + captured defining scope) and
// native functions exposed by the host or the standard library.

use super::Value;
use crate::gc::ScopeId;
use crate::runtime::{Control, Runtime};
use crate::syntax::ast::FuncDef;
use smol_str::SmolStr;
use std::rc::Rc;

/// Native function: plain fn pointer plus bound upvalues, in the manner of
/// C closures. Most natives ignore `upvalues`.
pub type NativeFn = fn(&Runtime, &NativeCall) -> Result<Vec<Value>, Control>;

pub struct NativeCall {
    pub args: Vec<Value>,
    pub upvalues: Vec<Value>,
}

impl NativeCall {
    #[inline]
    pub fn arg(&self, i: usize) -> Value {
        self.args.get(i).copied().unwrap_or(Value::Nil)
    }

    pub fn arg_count(&self) -> usize {
        self.args.len()
    }
}

pub struct ScriptClosure {
    pub def: Rc<FuncDef>,
    /// Defining frame; free names resolve through it.
    pub env: ScopeId,
}

pub struct NativeFunction {
    pub name: SmolStr,
    pub f: NativeFn,
    pub upvalues: Vec<Value>,
}

pub enum Function {
    Script(ScriptClosure),
    Native(NativeFunction),
}

impl Function {
    pub fn native(name: &str, f: NativeFn) -> Function {
        Function::Native(NativeFunction {
            name: SmolStr::new(name),
            f,
            upvalues: Vec::new(),
        })
    }

    pub fn native_with_upvalues(name: &str, f: NativeFn, upvalues: Vec<Value>) -> Function {
        Function::Native(NativeFunction {
            name: SmolStr::new(name),
            f,
            upvalues,
        })
    }

    /// Best-effort name for traces.
    pub fn name(&self) -> SmolStr {
        match self {
            Function::Script(c) => {
                if c.def.name.is_empty() {
                    SmolStr::new("?")
                } else {
                    c.def.name.clone()
                }
            }
            Function::Native(n) => n.name.clone(),
        }
    }
}
