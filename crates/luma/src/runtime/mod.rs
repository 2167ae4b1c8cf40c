// Runtime: the explicit context threaded through evaluation. Owns the heap,
// the collector, every execution state and the global frame. No singletons;
// cloning the handle is cheap and shares the same runtime.

pub mod coroutine;
pub mod env;
pub mod error;
pub mod eval;
pub mod exec;
pub mod frame;

pub use error::{Control, ErrorKind, Eval, LumaError, RtError};
pub use eval::metamethod::MetaEvent;

use crate::gc::{GcEngine, Heap, ScopeId, SlotVec, StringId, TableId, UserdataId};
use crate::syntax::{self, ast};
use crate::value::{
    format_float, Function, NativeFn, ScriptClosure, Table, Userdata, Value,
};
use env::{Binding, Scope};
use exec::{ExecId, ExecState};
use frame::CallFrame;
use smol_str::SmolStr;
use std::cell::{Cell, RefCell};
use std::io::Write;
use std::rc::{Rc, Weak};

/// Calls deeper than this fail with a stack overflow error.
pub const MAX_CALL_DEPTH: usize = 200;

pub struct Runtime {
    pub(crate) state: Rc<RtState>,
}

impl Clone for Runtime {
    fn clone(&self) -> Self {
        Runtime {
            state: self.state.clone(),
        }
    }
}

pub(crate) struct RtState {
    pub heap: RefCell<Heap>,
    pub gc: RefCell<GcEngine>,
    pub execs: RefCell<SlotVec<ExecState>>,
    pub current_exec: Cell<ExecId>,
    pub main_exec: Cell<ExecId>,
    /// Root frame of the environment chain; globals live here.
    pub globals: Cell<ScopeId>,
    /// Runtime-internal table (module cache, preload, search path).
    pub registry: Cell<TableId>,
    /// Shared metatable for all strings (set by the string library).
    pub string_mt: Cell<Option<TableId>>,
    /// Interned metamethod names, indexed by `MetaEvent as usize`.
    pub meta_names: RefCell<Vec<StringId>>,
    pub output: RefCell<Option<Box<dyn Write>>>,
    pub self_ref: RefCell<Weak<RtState>>,
    pub start_time: std::time::Instant,
}

impl RtState {
    /// Rebuild a handle from inside a coroutine stack.
    pub(crate) fn runtime(&self) -> Runtime {
        Runtime {
            state: self
                .self_ref
                .borrow()
                .upgrade()
                .expect("runtime state dropped while executing"),
        }
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Runtime {
    pub fn new() -> Runtime {
        let state = Rc::new(RtState {
            heap: RefCell::new(Heap::new()),
            gc: RefCell::new(GcEngine::new()),
            execs: RefCell::new(SlotVec::new()),
            current_exec: Cell::new(ExecId(0)),
            main_exec: Cell::new(ExecId(0)),
            globals: Cell::new(ScopeId(0)),
            registry: Cell::new(TableId(0)),
            string_mt: Cell::new(None),
            meta_names: RefCell::new(Vec::new()),
            output: RefCell::new(None),
            self_ref: RefCell::new(Weak::new()),
            start_time: std::time::Instant::now(),
        });
        *state.self_ref.borrow_mut() = Rc::downgrade(&state);
        let rt = Runtime { state };
        rt.bootstrap();
        rt
    }

    fn bootstrap(&self) {
        let st = &self.state;
        {
            let mut heap = st.heap.borrow_mut();
            let globals = heap.create_scope(Scope::new(None));
            st.globals.set(globals);
            let registry = heap.create_table(Table::new());
            st.registry.set(registry);
            let mut names = Vec::with_capacity(MetaEvent::COUNT);
            for event in MetaEvent::ALL {
                let (id, _) = heap.create_string(event.name().as_bytes());
                names.push(id);
            }
            *st.meta_names.borrow_mut() = names;
        }
        let main = st
            .execs
            .borrow_mut()
            .insert(ExecState::new(None));
        st.main_exec.set(ExecId(main));
        st.current_exec.set(ExecId(main));
    }

    // ---- exec state access ----

    #[inline]
    pub(crate) fn cur(&self) -> ExecId {
        self.state.current_exec.get()
    }

    pub(crate) fn with_exec<R>(&self, id: ExecId, f: impl FnOnce(&mut ExecState) -> R) -> R {
        let mut execs = self.state.execs.borrow_mut();
        f(execs.get_mut(id.0).expect("stale exec id"))
    }

    pub(crate) fn with_cur_exec<R>(&self, f: impl FnOnce(&mut ExecState) -> R) -> R {
        self.with_exec(self.cur(), f)
    }

    pub(crate) fn new_exec(&self, coro: Option<crate::gc::CoroutineId>) -> ExecId {
        ExecId(self.state.execs.borrow_mut().insert(ExecState::new(coro)))
    }

    pub(crate) fn drop_exec(&self, id: ExecId) {
        self.state.execs.borrow_mut().remove(id.0);
    }

    // Evaluation stack: multi-value staging and GC roots for temporaries.

    #[inline]
    pub(crate) fn stack_mark(&self) -> usize {
        self.with_cur_exec(|e| e.mark())
    }

    #[inline]
    pub(crate) fn stack_push(&self, v: Value) {
        self.with_cur_exec(|e| e.stack.push(v));
    }

    pub(crate) fn stack_truncate(&self, mark: usize) {
        self.with_cur_exec(|e| e.stack.truncate(mark));
    }

    /// Copy the values above `mark` without popping them.
    pub(crate) fn stack_peek(&self, mark: usize) -> Vec<Value> {
        self.with_cur_exec(|e| e.stack[mark..].to_vec())
    }

    /// Pop and return the values above `mark`.
    pub(crate) fn stack_drain(&self, mark: usize) -> Vec<Value> {
        self.with_cur_exec(|e| e.stack.split_off(mark))
    }

    pub(crate) fn stack_get(&self, index: usize) -> Value {
        self.with_cur_exec(|e| e.stack[index])
    }

    pub(crate) fn set_line(&self, line: u32) {
        self.with_cur_exec(|e| {
            if let Some(f) = e.frames.last_mut() {
                f.line = line;
            }
        });
    }

    /// (source, current line) of the innermost frame.
    pub(crate) fn where_am_i(&self) -> (Rc<str>, u32) {
        self.with_cur_exec(|e| match e.frames.last() {
            Some(f) => (f.source.clone(), f.line),
            None => (Rc::from("?"), 0),
        })
    }

    // ---- allocation (every path checks the GC first) ----

    pub(crate) fn maybe_collect(&self) {
        crate::gc::maybe_collect(self);
    }

    pub fn new_string(&self, bytes: &[u8]) -> Value {
        self.maybe_collect();
        let (id, fresh) = self.state.heap.borrow_mut().create_string(bytes);
        if fresh {
            self.track_allocation(crate::gc::GcId::Str(id));
        }
        Value::Str(id)
    }

    pub fn str_value(&self, s: &str) -> Value {
        self.new_string(s.as_bytes())
    }

    pub(crate) fn intern_name(&self, name: &str) -> StringId {
        // Names are tiny and recurring; skip the collector check.
        let (id, fresh) = self.state.heap.borrow_mut().create_string(name.as_bytes());
        if fresh {
            self.track_allocation(crate::gc::GcId::Str(id));
        }
        id
    }

    pub fn new_table(&self) -> TableId {
        self.maybe_collect();
        let id = self.state.heap.borrow_mut().create_table(Table::new());
        self.track_allocation(crate::gc::GcId::Table(id));
        id
    }

    pub(crate) fn new_function(&self, func: Function) -> Value {
        self.maybe_collect();
        let id = self.state.heap.borrow_mut().create_function(func);
        self.track_allocation(crate::gc::GcId::Function(id));
        Value::Function(id)
    }

    pub fn new_native(&self, name: &str, f: NativeFn) -> Value {
        self.new_function(Function::native(name, f))
    }

    pub fn new_userdata(&self, data: Box<dyn std::any::Any>) -> Value {
        self.maybe_collect();
        let id = self
            .state
            .heap
            .borrow_mut()
            .create_userdata(Userdata::new(data));
        self.track_allocation(crate::gc::GcId::Userdata(id));
        Value::Userdata(id)
    }

    pub(crate) fn new_scope(&self, scope: Scope) -> ScopeId {
        self.maybe_collect();
        let id = self.state.heap.borrow_mut().create_scope(scope);
        self.track_allocation(crate::gc::GcId::Scope(id));
        id
    }

    pub(crate) fn new_binding(&self, binding: Binding) -> crate::gc::BindingId {
        // Bindings are allocated while argument values sit in unrooted
        // registers; the collector runs at scope creation instead.
        let id = self.state.heap.borrow_mut().create_binding(binding);
        self.track_allocation(crate::gc::GcId::Binding(id));
        id
    }

    fn track_allocation(&self, id: crate::gc::GcId) {
        let cost = self.state.heap.borrow().credit_cost(id);
        self.state.gc.borrow_mut().track_allocation(cost);
    }

    // ---- heap access helpers ----

    pub(crate) fn with_string<R>(&self, id: StringId, f: impl FnOnce(&[u8]) -> R) -> R {
        let heap = self.state.heap.borrow();
        f(heap.string(id).as_bytes())
    }

    pub fn string_bytes(&self, id: StringId) -> Vec<u8> {
        self.with_string(id, |b| b.to_vec())
    }

    pub fn string_text(&self, id: StringId) -> String {
        self.with_string(id, |b| String::from_utf8_lossy(b).into_owned())
    }

    pub fn raw_get(&self, table: TableId, key: Value) -> Value {
        self.state.heap.borrow().table(table).get(key)
    }

    pub fn raw_set(
        &self,
        table: TableId,
        key: Value,
        value: Value,
    ) -> Result<(), &'static str> {
        self.state
            .heap
            .borrow_mut()
            .table_mut(table)
            .set(key, value)
            .map_err(|e| match e {
                crate::value::KeyError::Nil => "table index is nil",
                crate::value::KeyError::NaN => "table index is NaN",
            })
    }

    /// Raw set with an interned string key; registration helper.
    pub(crate) fn raw_set_field(&self, table: TableId, key: &str, value: Value) {
        let k = Value::Str(self.intern_name(key));
        self.raw_set(table, k, value).expect("string key");
    }

    pub(crate) fn raw_get_field(&self, table: TableId, key: &str) -> Value {
        let k = Value::Str(self.intern_name(key));
        self.raw_get(table, k)
    }

    // ---- environment operations ----

    /// Create a fresh binding in `scope` (shadowing any outer one).
    pub(crate) fn declare(
        &self,
        scope: ScopeId,
        name: &SmolStr,
        value: Value,
        konst: bool,
    ) -> crate::gc::BindingId {
        let binding = self.new_binding(Binding {
            value,
            konst,
        });
        let mut heap = self.state.heap.borrow_mut();
        heap.scope_mut(scope).vars.insert(name.clone(), binding);
        binding
    }

    /// Nearest-binding assignment; falls back to a global in the root frame.
    pub(crate) fn assign_name(&self, scope: ScopeId, name: &SmolStr, value: Value) -> Eval<()> {
        {
            let mut heap = self.state.heap.borrow_mut();
            let mut cursor = Some(scope);
            while let Some(id) = cursor {
                let frame = heap.scope(id);
                if let Some(&binding) = frame.vars.get(name) {
                    if heap.binding(binding).konst {
                        drop(heap);
                        return Err(self.error_here(
                            ErrorKind::ConstViolation,
                            format!("attempt to assign to const variable '{}'", name),
                        ));
                    }
                    heap.binding_mut(binding).value = value;
                    return Ok(());
                }
                cursor = frame.parent;
            }
        }
        // Not declared anywhere: global in the root frame.
        let globals = self.state.globals.get();
        self.declare(globals, name, value, false);
        Ok(())
    }

    /// Name resolution walks the chain; absent names read as nil.
    pub(crate) fn lookup_name(&self, scope: ScopeId, name: &SmolStr) -> Value {
        let heap = self.state.heap.borrow();
        let mut cursor = Some(scope);
        while let Some(id) = cursor {
            let frame = heap.scope(id);
            if let Some(&binding) = frame.vars.get(name) {
                return heap.binding(binding).value;
            }
            cursor = frame.parent;
        }
        Value::Nil
    }

    /// `...` of the nearest enclosing vararg frame.
    pub(crate) fn find_varargs(&self, scope: ScopeId) -> Vec<Value> {
        let heap = self.state.heap.borrow();
        let mut cursor = Some(scope);
        while let Some(id) = cursor {
            let frame = heap.scope(id);
            if frame.function_boundary {
                return frame.varargs.clone().unwrap_or_default();
            }
            cursor = frame.parent;
        }
        Vec::new()
    }

    // ---- metatables ----

    pub(crate) fn metatable_of(&self, v: Value) -> Option<TableId> {
        match v {
            Value::Table(id) => self.state.heap.borrow().table(id).metatable,
            Value::Userdata(id) => self.state.heap.borrow().userdata_ref(id).metatable,
            Value::Str(_) => self.state.string_mt.get(),
            _ => None,
        }
    }

    pub(crate) fn meta_name(&self, event: MetaEvent) -> StringId {
        self.state.meta_names.borrow()[event as usize]
    }

    /// Metamethod lookup: raw read of the value's metatable.
    pub(crate) fn metamethod(&self, v: Value, event: MetaEvent) -> Option<Value> {
        let mt = self.metatable_of(v)?;
        let key = Value::Str(self.meta_name(event));
        let found = self.raw_get(mt, key);
        if found.is_nil() {
            None
        } else {
            Some(found)
        }
    }

    // ---- error construction ----

    /// Build an error raised at the current execution position; exposed so
    /// host natives can fail like any builtin.
    pub fn error_here(&self, kind: ErrorKind, msg: String) -> Control {
        let (source, line) = self.where_am_i();
        let text = if line > 0 {
            format!("{}:{}: {}", source, line, msg)
        } else {
            msg
        };
        let value = self.str_value(&text);
        let mut err = RtError::new(kind, value);
        err.traceback = self.capture_traceback();
        Control::Error(err)
    }

    pub(crate) fn error_at(&self, span: ast::Span, kind: ErrorKind, msg: String) -> Control {
        self.set_line(span.line);
        self.error_here(kind, msg)
    }

    pub(crate) fn capture_traceback(&self) -> Vec<String> {
        self.with_cur_exec(|e| frame::format_traceback(&e.frames))
    }

    /// Human-readable rendering for error messages and `print`.
    pub fn display_value(&self, v: Value) -> String {
        match v {
            Value::Nil => "nil".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => {
                let mut buf = itoa::Buffer::new();
                buf.format(i).to_string()
            }
            Value::Float(f) => format_float(f),
            Value::Str(id) => self.string_text(id),
            Value::Table(id) => format!("table: 0x{:08x}", id.0),
            Value::Function(id) => format!("function: 0x{:08x}", id.0),
            Value::Userdata(id) => format!("userdata: 0x{:08x}", id.0),
            Value::Coroutine(id) => format!("thread: 0x{:08x}", id.0),
        }
    }

    pub(crate) fn error_to_host(&self, e: RtError) -> LumaError {
        LumaError {
            kind: e.kind,
            message: self.display_value(e.value),
            trace: e.traceback,
        }
    }

    pub(crate) fn control_to_host(&self, c: Control) -> LumaError {
        match c {
            Control::Error(e) => self.error_to_host(e),
            Control::Close(Some(e)) => self.error_to_host(e),
            other => LumaError {
                kind: ErrorKind::RuntimeError,
                message: format!("interpreter invariant broken: stray {:?} unwind", other),
                trace: Vec::new(),
            },
        }
    }

    // ---- output sink ----

    pub fn set_writer(&self, w: Box<dyn Write>) {
        *self.state.output.borrow_mut() = Some(w);
    }

    pub(crate) fn write_out(&self, bytes: &[u8]) {
        let mut out = self.state.output.borrow_mut();
        match out.as_mut() {
            Some(w) => {
                let _ = w.write_all(bytes);
            }
            None => {
                let stdout = std::io::stdout();
                let _ = stdout.lock().write_all(bytes);
            }
        }
    }

    // ---- host embedding API ----

    pub fn define_global(&self, name: &str, value: Value) {
        let globals = self.state.globals.get();
        self.declare(globals, &SmolStr::new(name), value, false);
    }

    pub fn global(&self, name: &str) -> Value {
        self.lookup_name(self.state.globals.get(), &SmolStr::new(name))
    }

    /// Expose a native function as a global.
    pub fn expose(&self, name: &str, f: NativeFn) {
        let func = self.new_native(name, f);
        self.define_global(name, func);
    }

    /// Parse and run a chunk; returns the chunk's return values.
    pub fn evaluate(&self, source: &str, script_path: Option<&str>) -> Result<Vec<Value>, LumaError> {
        let name = script_path.unwrap_or("=(eval)");
        let chunk = syntax::parse(source.as_bytes(), name)?;
        self.run_chunk(&chunk, Vec::new())
    }

    /// Run an already-parsed chunk.
    pub fn evaluate_chunk(&self, chunk: &ast::Chunk) -> Result<Vec<Value>, LumaError> {
        self.run_chunk(chunk, Vec::new())
    }

    pub fn run_chunk(
        &self,
        chunk: &ast::Chunk,
        args: Vec<Value>,
    ) -> Result<Vec<Value>, LumaError> {
        match self.exec_chunk(chunk, args) {
            Ok(values) => Ok(values),
            Err(c) => Err(self.control_to_host(c)),
        }
    }

    pub(crate) fn exec_chunk(&self, chunk: &ast::Chunk, args: Vec<Value>) -> Eval<Vec<Value>> {
        let globals = self.state.globals.get();
        let mark = self.stack_mark();
        for &a in &args {
            self.stack_push(a);
        }
        let scope = self.new_scope(Scope::function_root(Some(globals), Some(args)));
        self.with_cur_exec(|e| {
            e.frames.push(CallFrame {
                name: SmolStr::new("main chunk"),
                source: chunk.source.clone(),
                call_line: 0,
                line: 0,
                protected: false,
            });
            e.scopes.push(scope);
        });
        let result = self.exec_block_in(&chunk.block, scope);
        let outcome = self.leave_scope(scope, result);
        self.with_cur_exec(|e| {
            e.frames.pop();
        });
        self.stack_truncate(mark);
        match outcome {
            Ok(()) => Ok(Vec::new()),
            Err(Control::Return(values)) => Ok(values),
            Err(other) => Err(other),
        }
    }

    /// Call a global function or a function value from the host.
    pub fn call(&self, target: Value, args: Vec<Value>) -> Result<Vec<Value>, LumaError> {
        // Root the callee and arguments for the duration of the call.
        let mark = self.stack_mark();
        self.stack_push(target);
        for &a in &args {
            self.stack_push(a);
        }
        let result = self.call_value(target, args);
        self.stack_truncate(mark);
        result.map_err(|c| self.control_to_host(c))
    }

    pub fn call_global(&self, name: &str, args: Vec<Value>) -> Result<Vec<Value>, LumaError> {
        let target = self.global(name);
        self.call(target, args)
    }

    // ---- module search configuration (read by the package library) ----

    pub fn add_search_path(&self, template: &str) {
        let registry = self.state.registry.get();
        let current = self.raw_get_field(registry, "path");
        let joined = match current {
            Value::Str(id) => format!("{};{}", self.string_text(id), template),
            _ => template.to_string(),
        };
        self.set_search_path(&joined);
    }

    pub fn set_search_path(&self, template: &str) {
        let registry = self.state.registry.get();
        let v = self.str_value(template);
        self.raw_set_field(registry, "path", v);
        // Keep the script-visible package.path in step when the library is
        // already open.
        if let Some(pkg) = self.global("package").as_table_id() {
            self.raw_set_field(pkg, "path", v);
        }
    }

    /// Replace the searcher list (a table of functions).
    pub fn set_searchers(&self, searchers: Value) {
        let registry = self.state.registry.get();
        self.raw_set_field(registry, "searchers", searchers);
    }

    // ---- GC controls ----

    pub fn gc_collect(&self) {
        crate::gc::major_collection(self);
    }

    pub fn gc_step(&self, n: usize) {
        crate::gc::step(self, n);
    }

    pub fn gc_stop(&self) {
        self.state.gc.borrow_mut().running = false;
    }

    pub fn gc_restart(&self) {
        self.state.gc.borrow_mut().running = true;
    }

    pub fn gc_credits(&self) -> usize {
        self.state.gc.borrow().credits
    }

    /// Seconds of wall clock since the runtime started.
    pub fn clock(&self) -> f64 {
        self.state.start_time.elapsed().as_secs_f64()
    }

    /// Make a script closure from a parsed definition, capturing `env`.
    pub(crate) fn make_closure(&self, def: Rc<ast::FuncDef>, env: ScopeId) -> Value {
        self.new_function(Function::Script(ScriptClosure { def, env }))
    }

    /// Attach (or clear) a table's metatable, refreshing its weak mode and
    /// the finalizable flag.
    pub fn attach_metatable(&self, table: TableId, mt: Option<TableId>) {
        let weak = match mt {
            Some(m) => {
                let mode = self.raw_get(m, Value::Str(self.meta_name(MetaEvent::Mode)));
                match mode {
                    Value::Str(id) => self.with_string(id, crate::value::WeakMode::from_mode_string),
                    _ => crate::value::WeakMode::None,
                }
            }
            None => crate::value::WeakMode::None,
        };
        let has_gc = match mt {
            Some(m) => !self
                .raw_get(m, Value::Str(self.meta_name(MetaEvent::Gc)))
                .is_nil(),
            None => false,
        };
        let mut heap = self.state.heap.borrow_mut();
        {
            let t = heap.table_mut(table);
            t.metatable = mt;
            t.weak = weak;
        }
        if has_gc {
            if let Some(h) = heap.header_mut(crate::gc::GcId::Table(table)) {
                h.finalizable = true;
            }
        }
    }

    /// Attach a metatable to a userdata value.
    pub fn attach_userdata_metatable(&self, ud: UserdataId, mt: Option<TableId>) {
        let has_gc = match mt {
            Some(m) => !self
                .raw_get(m, Value::Str(self.meta_name(MetaEvent::Gc)))
                .is_nil(),
            None => false,
        };
        let mut heap = self.state.heap.borrow_mut();
        heap.userdata_mut(ud).metatable = mt;
        if has_gc {
            if let Some(h) = heap.header_mut(crate::gc::GcId::Userdata(ud)) {
                h.finalizable = true;
            }
        }
    }
}
