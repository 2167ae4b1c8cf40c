// Per-execution mutable state: one for the main chunk, one per coroutine.
//
// `stack` is the evaluation stack: multi-value staging (argument lists,
// return lists, assignment right-hand sides) and, importantly, the GC root
// for temporaries held across nested evaluation.

use super::frame::CallFrame;
use crate::gc::{CoroutineId, ScopeId};
use crate::value::Value;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ExecId(pub u32);

pub struct ExecState {
    /// Every scope currently entered, outermost first.
    pub scopes: Vec<ScopeId>,
    /// Call stack, outermost first.
    pub frames: Vec<CallFrame>,
    /// Evaluation stack.
    pub stack: Vec<Value>,
    /// Owning coroutine; None for the main execution.
    pub coro: Option<CoroutineId>,
}

impl ExecState {
    pub fn new(coro: Option<CoroutineId>) -> Self {
        ExecState {
            scopes: Vec::new(),
            frames: Vec::new(),
            stack: Vec::with_capacity(32),
            coro,
        }
    }

    #[inline]
    pub fn mark(&self) -> usize {
        self.stack.len()
    }
}
