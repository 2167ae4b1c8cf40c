// Environment frames and bindings.
//
// A scope is one frame of the chain: name -> binding cell, parent link, and
// the to-be-closed list in declaration order. Bindings are heap objects so
// closures can share them by reference after the declaring frame is gone.

use crate::gc::{BindingId, ScopeId};
use crate::value::Value;
use ahash::RandomState;
use smol_str::SmolStr;
use std::collections::HashMap;

/// One variable cell. `konst` makes it write-once.
#[derive(Debug, Clone, Copy)]
pub struct Binding {
    pub value: Value,
    pub konst: bool,
}

impl Binding {
    pub fn new(value: Value) -> Self {
        Binding {
            value,
            konst: false,
        }
    }

    pub fn constant(value: Value) -> Self {
        Binding { value, konst: true }
    }
}

pub struct Scope {
    pub vars: HashMap<SmolStr, BindingId, RandomState>,
    pub parent: Option<ScopeId>,
    /// To-be-closed bindings in declaration order; teardown runs in reverse.
    pub tbc: Vec<(SmolStr, BindingId)>,
    /// Set on function-body scopes (and the chunk scope): `...` values.
    pub varargs: Option<Vec<Value>>,
    /// Name resolution does not stop here, but vararg lookup does.
    pub function_boundary: bool,
}

impl Scope {
    pub fn new(parent: Option<ScopeId>) -> Self {
        Scope {
            vars: HashMap::with_hasher(RandomState::new()),
            parent,
            tbc: Vec::new(),
            varargs: None,
            function_boundary: false,
        }
    }

    pub fn function_root(parent: Option<ScopeId>, varargs: Option<Vec<Value>>) -> Self {
        Scope {
            vars: HashMap::with_hasher(RandomState::new()),
            parent,
            tbc: Vec::new(),
            varargs,
            function_boundary: true,
        }
    }

    pub fn binding_count(&self) -> usize {
        self.vars.len()
    }
}
