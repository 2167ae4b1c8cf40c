// Coroutine library: thin wrappers over the scheduler.

use super::arg_error;
use crate::lib_module;
use crate::runtime::{Control, Runtime};
use crate::value::{Function, NativeCall, Value};

pub fn register(rt: &Runtime) {
    lib_module!("coroutine", {
        "create" => coroutine_create,
        "resume" => coroutine_resume,
        "yield" => coroutine_yield,
        "status" => coroutine_status,
        "running" => coroutine_running,
        "isyieldable" => coroutine_isyieldable,
        "wrap" => coroutine_wrap,
        "close" => coroutine_close,
    })
    .install(rt);
}

fn coroutine_create(rt: &Runtime, call: &NativeCall) -> Result<Vec<Value>, Control> {
    Ok(vec![rt.coro_create(call.arg(0))?])
}

fn coroutine_resume(rt: &Runtime, call: &NativeCall) -> Result<Vec<Value>, Control> {
    let Some(id) = call.arg(0).as_coroutine_id() else {
        return Err(arg_error(rt, 0, "resume", "coroutine", call.arg(0)));
    };
    match rt.coro_resume(id, call.args[1..].to_vec()) {
        Ok(mut values) => {
            let mut out = vec![Value::Bool(true)];
            out.append(&mut values);
            Ok(out)
        }
        Err(e) => Ok(vec![Value::Bool(false), e.value]),
    }
}

fn coroutine_yield(rt: &Runtime, call: &NativeCall) -> Result<Vec<Value>, Control> {
    rt.coro_yield(call.args.clone())
}

fn coroutine_status(rt: &Runtime, call: &NativeCall) -> Result<Vec<Value>, Control> {
    let Some(id) = call.arg(0).as_coroutine_id() else {
        return Err(arg_error(rt, 0, "status", "coroutine", call.arg(0)));
    };
    Ok(vec![rt.str_value(rt.coro_status(id).as_str())])
}

fn coroutine_running(rt: &Runtime, _call: &NativeCall) -> Result<Vec<Value>, Control> {
    match rt.current_coroutine() {
        Some(id) => Ok(vec![Value::Coroutine(id), Value::Bool(false)]),
        None => Ok(vec![Value::Nil, Value::Bool(true)]),
    }
}

fn coroutine_isyieldable(rt: &Runtime, _call: &NativeCall) -> Result<Vec<Value>, Control> {
    Ok(vec![Value::Bool(rt.current_coroutine().is_some())])
}

fn coroutine_wrap(rt: &Runtime, call: &NativeCall) -> Result<Vec<Value>, Control> {
    let co = rt.coro_create(call.arg(0))?;
    // Root the fresh coroutine across the wrapper allocation.
    let mark = rt.stack_mark();
    rt.stack_push(co);
    let wrapper = rt.new_function(Function::native_with_upvalues(
        "wrap",
        wrap_trampoline,
        vec![co],
    ));
    rt.stack_truncate(mark);
    Ok(vec![wrapper])
}

/// Resumes the bound coroutine; unlike `resume`, errors re-raise in the
/// caller.
fn wrap_trampoline(rt: &Runtime, call: &NativeCall) -> Result<Vec<Value>, Control> {
    let id = call.upvalues[0]
        .as_coroutine_id()
        .expect("wrap trampoline bound to a coroutine");
    match rt.coro_resume(id, call.args.clone()) {
        Ok(values) => Ok(values),
        Err(e) => Err(Control::Error(e)),
    }
}

fn coroutine_close(rt: &Runtime, call: &NativeCall) -> Result<Vec<Value>, Control> {
    let Some(id) = call.arg(0).as_coroutine_id() else {
        return Err(arg_error(rt, 0, "close", "coroutine", call.arg(0)));
    };
    match rt.coro_close(id) {
        Ok(()) => Ok(vec![Value::Bool(true)]),
        Err(e) => Ok(vec![Value::Bool(false), e.value]),
    }
}
