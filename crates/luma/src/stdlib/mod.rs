// Standard library registration.

pub mod basic;
pub mod coroutine;
pub mod math;
pub mod os;
pub mod package;
pub mod string;
pub mod table;

use crate::gc::TableId;
use crate::runtime::{Control, ErrorKind, Runtime};
use crate::value::{NativeCall, NativeFn, Value};

/// A library module: a set of named native functions registered either as a
/// global table or directly into the global frame.
pub struct LibraryModule {
    pub name: &'static str,
    pub entries: Vec<(&'static str, NativeFn)>,
}

impl LibraryModule {
    pub fn new(name: &'static str) -> Self {
        LibraryModule {
            name,
            entries: Vec::new(),
        }
    }

    pub fn with_function(mut self, name: &'static str, f: NativeFn) -> Self {
        self.entries.push((name, f));
        self
    }

    /// Install into the runtime; returns the module table (or None when the
    /// entries went straight into the global frame).
    pub fn install(self, rt: &Runtime) -> Option<TableId> {
        if self.name.is_empty() {
            for (fname, f) in self.entries {
                let func = rt.new_native(fname, f);
                rt.define_global(fname, func);
            }
            None
        } else {
            // Publish the table before filling it so the allocations below
            // cannot collect it.
            let tid = rt.new_table();
            rt.define_global(self.name, Value::Table(tid));
            for (fname, f) in self.entries {
                let func = rt.new_native(fname, f);
                rt.raw_set_field(tid, fname, func);
            }
            Some(tid)
        }
    }
}

#[macro_export]
macro_rules! lib_module {
    ($name:expr, { $($fname:expr => $func:expr),* $(,)? }) => {{
        let mut module = $crate::stdlib::LibraryModule::new($name);
        $(module = module.with_function($fname, $func);)*
        module
    }};
}

/// Open every standard library.
pub fn open_all(rt: &Runtime) {
    basic::register(rt);
    coroutine::register(rt);
    string::register(rt);
    table::register(rt);
    math::register(rt);
    os::register(rt);
    package::register(rt);
}

// ---- argument checking helpers shared by the libraries ----

pub(crate) fn arg_error(
    rt: &Runtime,
    index: usize,
    fname: &str,
    expected: &str,
    got: Value,
) -> Control {
    rt.error_here(
        ErrorKind::TypeError,
        format!(
            "bad argument #{} to '{}' ({} expected, got {})",
            index + 1,
            fname,
            expected,
            got.type_name()
        ),
    )
}

pub(crate) fn check_table(
    rt: &Runtime,
    call: &NativeCall,
    index: usize,
    fname: &str,
) -> Result<TableId, Control> {
    call.arg(index)
        .as_table_id()
        .ok_or_else(|| arg_error(rt, index, fname, "table", call.arg(index)))
}

pub(crate) fn check_int(
    rt: &Runtime,
    call: &NativeCall,
    index: usize,
    fname: &str,
) -> Result<i64, Control> {
    let v = call.arg(index);
    match v.as_integer() {
        Some(i) => Ok(i),
        None => match v {
            Value::Str(id) => {
                let text = rt.string_text(id);
                crate::runtime::eval::metamethod::parse_number(&text)
                    .and_then(|n| n.as_integer())
                    .ok_or_else(|| arg_error(rt, index, fname, "number", v))
            }
            _ => Err(arg_error(rt, index, fname, "number", v)),
        },
    }
}

pub(crate) fn check_number(
    rt: &Runtime,
    call: &NativeCall,
    index: usize,
    fname: &str,
) -> Result<f64, Control> {
    let v = call.arg(index);
    rt.coerce_number(v)
        .and_then(|n| n.as_float())
        .ok_or_else(|| arg_error(rt, index, fname, "number", v))
}

pub(crate) fn check_str(
    rt: &Runtime,
    call: &NativeCall,
    index: usize,
    fname: &str,
) -> Result<Vec<u8>, Control> {
    match call.arg(index) {
        Value::Str(id) => Ok(rt.string_bytes(id)),
        // Numbers convert implicitly in string positions.
        Value::Int(i) => Ok(i.to_string().into_bytes()),
        Value::Float(f) => Ok(crate::value::format_float(f).into_bytes()),
        other => Err(arg_error(rt, index, fname, "string", other)),
    }
}

pub(crate) fn check_function(
    rt: &Runtime,
    call: &NativeCall,
    index: usize,
    fname: &str,
) -> Result<Value, Control> {
    let v = call.arg(index);
    if v.is_function() {
        Ok(v)
    } else {
        Err(arg_error(rt, index, fname, "function", v))
    }
}

pub(crate) fn opt_int(
    rt: &Runtime,
    call: &NativeCall,
    index: usize,
    fname: &str,
    default: i64,
) -> Result<i64, Control> {
    if call.arg(index).is_nil() {
        Ok(default)
    } else {
        check_int(rt, call, index, fname)
    }
}
