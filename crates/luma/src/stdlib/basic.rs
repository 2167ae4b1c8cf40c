// Basic library: the global functions every chunk expects.

use super::{arg_error, check_table, opt_int};
use crate::lib_module;
use crate::runtime::eval::metamethod::parse_number;
use crate::runtime::{Control, ErrorKind, MetaEvent, Runtime};
use crate::value::{NativeCall, Value};

pub fn register(rt: &Runtime) {
    lib_module!("", {
        "print" => lua_print,
        "type" => lua_type,
        "tostring" => lua_tostring,
        "tonumber" => lua_tonumber,
        "ipairs" => lua_ipairs,
        "pairs" => lua_pairs,
        "next" => lua_next,
        "rawget" => lua_rawget,
        "rawset" => lua_rawset,
        "rawequal" => lua_rawequal,
        "rawlen" => lua_rawlen,
        "setmetatable" => lua_setmetatable,
        "getmetatable" => lua_getmetatable,
        "assert" => lua_assert,
        "error" => lua_error,
        "pcall" => lua_pcall,
        "xpcall" => lua_xpcall,
        "select" => lua_select,
        "collectgarbage" => lua_collectgarbage,
    })
    .install(rt);
    let version = rt.str_value("luma 0.3");
    rt.define_global("_VERSION", version);
}

fn lua_print(rt: &Runtime, call: &NativeCall) -> Result<Vec<Value>, Control> {
    let mut line = Vec::new();
    for (i, &v) in call.args.iter().enumerate() {
        if i > 0 {
            line.push(b'\t');
        }
        let s = rt.tostring_value(v)?;
        if let Value::Str(id) = s {
            rt.with_string(id, |b| line.extend_from_slice(b));
        }
    }
    line.push(b'\n');
    rt.write_out(&line);
    Ok(vec![])
}

fn lua_type(rt: &Runtime, call: &NativeCall) -> Result<Vec<Value>, Control> {
    if call.arg_count() == 0 {
        return Err(arg_error(rt, 0, "type", "value", Value::Nil));
    }
    Ok(vec![rt.str_value(call.arg(0).type_name())])
}

fn lua_tostring(rt: &Runtime, call: &NativeCall) -> Result<Vec<Value>, Control> {
    Ok(vec![rt.tostring_value(call.arg(0))?])
}

fn lua_tonumber(rt: &Runtime, call: &NativeCall) -> Result<Vec<Value>, Control> {
    let v = call.arg(0);
    if call.arg(1).is_nil() {
        let result = match v {
            Value::Int(_) | Value::Float(_) => Some(v),
            Value::Str(id) => {
                let text = rt.string_text(id);
                parse_number(&text)
            }
            _ => None,
        };
        return Ok(vec![result.unwrap_or(Value::Nil)]);
    }
    // Explicit base: the subject must be a string of digits in that base.
    let base = super::check_int(rt, call, 1, "tonumber")?;
    if !(2..=36).contains(&base) {
        return Err(arg_error(rt, 1, "tonumber", "base in [2,36]", call.arg(1)));
    }
    let Value::Str(id) = v else {
        return Err(arg_error(rt, 0, "tonumber", "string", v));
    };
    let text = rt.string_text(id);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(vec![Value::Nil]);
    }
    let (negative, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    if digits.is_empty() {
        return Ok(vec![Value::Nil]);
    }
    let mut value: i64 = 0;
    for c in digits.chars() {
        match c.to_digit(base as u32) {
            Some(d) => value = value.wrapping_mul(base).wrapping_add(d as i64),
            None => return Ok(vec![Value::Nil]),
        }
    }
    Ok(vec![Value::Int(if negative { value.wrapping_neg() } else { value })])
}

fn lua_ipairs(rt: &Runtime, call: &NativeCall) -> Result<Vec<Value>, Control> {
    let t = call.arg(0);
    if t.is_nil() {
        return Err(arg_error(rt, 0, "ipairs", "table", t));
    }
    let iter = rt.new_native("ipairs_iterator", ipairs_iterator);
    Ok(vec![iter, t, Value::Int(0)])
}

fn ipairs_iterator(rt: &Runtime, call: &NativeCall) -> Result<Vec<Value>, Control> {
    let t = call.arg(0);
    let i = call.arg(1).as_integer().unwrap_or(0) + 1;
    let v = rt.index_value(t, Value::Int(i), Default::default())?;
    if v.is_nil() {
        Ok(vec![Value::Nil])
    } else {
        Ok(vec![Value::Int(i), v])
    }
}

fn lua_pairs(rt: &Runtime, call: &NativeCall) -> Result<Vec<Value>, Control> {
    let t = call.arg(0);
    if let Some(mm) = rt.metamethod(t, MetaEvent::Pairs) {
        let mut results = rt.call_value(mm, vec![t])?;
        results.resize(3, Value::Nil);
        return Ok(results);
    }
    check_table(rt, call, 0, "pairs")?;
    let iter = rt.new_native("next", lua_next);
    Ok(vec![iter, t, Value::Nil])
}

fn lua_next(rt: &Runtime, call: &NativeCall) -> Result<Vec<Value>, Control> {
    let tid = check_table(rt, call, 0, "next")?;
    let key = call.arg(1);
    let step = {
        let heap = rt.state.heap.borrow();
        heap.table(tid).next(key)
    };
    match step {
        Ok(Some((k, v))) => Ok(vec![k, v]),
        Ok(None) => Ok(vec![Value::Nil]),
        Err(()) => Err(rt.error_here(
            ErrorKind::IndexError,
            "invalid key to 'next'".to_string(),
        )),
    }
}

fn lua_rawget(rt: &Runtime, call: &NativeCall) -> Result<Vec<Value>, Control> {
    let tid = check_table(rt, call, 0, "rawget")?;
    Ok(vec![rt.raw_get(tid, call.arg(1))])
}

fn lua_rawset(rt: &Runtime, call: &NativeCall) -> Result<Vec<Value>, Control> {
    let tid = check_table(rt, call, 0, "rawset")?;
    rt.raw_set(tid, call.arg(1), call.arg(2))
        .map_err(|m| rt.error_here(ErrorKind::IndexError, m.to_string()))?;
    Ok(vec![call.arg(0)])
}

fn lua_rawequal(_rt: &Runtime, call: &NativeCall) -> Result<Vec<Value>, Control> {
    Ok(vec![Value::Bool(call.arg(0).raw_equal(&call.arg(1)))])
}

fn lua_rawlen(rt: &Runtime, call: &NativeCall) -> Result<Vec<Value>, Control> {
    match call.arg(0) {
        Value::Str(id) => Ok(vec![Value::Int(rt.with_string(id, |b| b.len() as i64))]),
        Value::Table(tid) => {
            let border = rt.state.heap.borrow().table(tid).border();
            Ok(vec![Value::Int(border)])
        }
        other => Err(arg_error(rt, 0, "rawlen", "table or string", other)),
    }
}

fn lua_setmetatable(rt: &Runtime, call: &NativeCall) -> Result<Vec<Value>, Control> {
    let tid = check_table(rt, call, 0, "setmetatable")?;
    let mt_arg = call.arg(1);
    let new_mt = match mt_arg {
        Value::Nil => None,
        Value::Table(mt) => Some(mt),
        other => return Err(arg_error(rt, 0, "setmetatable", "nil or table", other)),
    };
    if rt
        .metamethod(Value::Table(tid), MetaEvent::Metatable)
        .is_some()
    {
        return Err(rt.error_here(
            ErrorKind::TypeError,
            "cannot change a protected metatable".to_string(),
        ));
    }
    rt.attach_metatable(tid, new_mt);
    Ok(vec![Value::Table(tid)])
}

fn lua_getmetatable(rt: &Runtime, call: &NativeCall) -> Result<Vec<Value>, Control> {
    let v = call.arg(0);
    if let Some(protected) = rt.metamethod(v, MetaEvent::Metatable) {
        return Ok(vec![protected]);
    }
    Ok(vec![match rt.metatable_of(v) {
        Some(mt) => Value::Table(mt),
        None => Value::Nil,
    }])
}

fn lua_assert(rt: &Runtime, call: &NativeCall) -> Result<Vec<Value>, Control> {
    if call.arg(0).is_truthy() {
        return Ok(call.args.clone());
    }
    let message = call.arg(1);
    if message.is_nil() {
        let v = rt.str_value("assertion failed!");
        Err(rt.raise(v, 1))
    } else {
        Err(rt.raise(message, 0))
    }
}

fn lua_error(rt: &Runtime, call: &NativeCall) -> Result<Vec<Value>, Control> {
    let level = opt_int(rt, call, 1, "error", 1)?;
    Err(rt.raise(call.arg(0), level))
}

fn lua_pcall(rt: &Runtime, call: &NativeCall) -> Result<Vec<Value>, Control> {
    if call.arg_count() == 0 {
        return Err(arg_error(rt, 0, "pcall", "value", Value::Nil));
    }
    let f = call.arg(0);
    let args = call.args[1..].to_vec();
    rt.protected_call(f, args)
}

fn lua_xpcall(rt: &Runtime, call: &NativeCall) -> Result<Vec<Value>, Control> {
    if call.arg_count() < 2 {
        return Err(arg_error(rt, 1, "xpcall", "value", Value::Nil));
    }
    let f = call.arg(0);
    let handler = call.arg(1);
    let args = call.args[2..].to_vec();
    rt.protected_call_with_handler(f, handler, args)
}

fn lua_select(rt: &Runtime, call: &NativeCall) -> Result<Vec<Value>, Control> {
    let selector = call.arg(0);
    if let Value::Str(id) = selector {
        if rt.with_string(id, |b| b == b"#") {
            return Ok(vec![Value::Int(call.arg_count() as i64 - 1)]);
        }
    }
    let n = super::check_int(rt, call, 0, "select")?;
    let rest = &call.args[1..];
    let start = if n > 0 {
        (n - 1) as usize
    } else if n < 0 {
        let back = (-n) as usize;
        if back > rest.len() {
            return Err(arg_error(rt, 0, "select", "index in range", selector));
        }
        rest.len() - back
    } else {
        return Err(arg_error(rt, 0, "select", "index out of range", selector));
    };
    Ok(rest.get(start..).map(|s| s.to_vec()).unwrap_or_default())
}

fn lua_collectgarbage(rt: &Runtime, call: &NativeCall) -> Result<Vec<Value>, Control> {
    let opt = match call.arg(0) {
        Value::Nil => "collect".to_string(),
        Value::Str(id) => rt.string_text(id),
        other => return Err(arg_error(rt, 0, "collectgarbage", "string", other)),
    };
    match opt.as_str() {
        "collect" => {
            rt.gc_collect();
            Ok(vec![Value::Int(0)])
        }
        "count" => Ok(vec![Value::Float(rt.gc_credits() as f64 / 1024.0)]),
        "stop" => {
            rt.gc_stop();
            Ok(vec![Value::Int(0)])
        }
        "restart" => {
            rt.gc_restart();
            Ok(vec![Value::Int(0)])
        }
        "step" => {
            let n = opt_int(rt, call, 1, "collectgarbage", 1)?;
            rt.gc_step(n.max(0) as usize);
            Ok(vec![Value::Bool(true)])
        }
        "isrunning" => Ok(vec![Value::Bool(rt.state.gc.borrow().running)]),
        "generational" => {
            let minor = opt_int(rt, call, 1, "collectgarbage", 0)?;
            let major = opt_int(rt, call, 2, "collectgarbage", 0)?;
            let mut g = rt.state.gc.borrow_mut();
            if minor > 0 {
                g.set_minor_multiplier(minor as u32);
            }
            if major > 0 {
                g.set_major_multiplier(major as u32);
            }
            Ok(vec![rt.str_value("generational")])
        }
        other => Err(rt.error_here(
            ErrorKind::TypeError,
            format!("bad option '{}' to 'collectgarbage'", other),
        )),
    }
}
