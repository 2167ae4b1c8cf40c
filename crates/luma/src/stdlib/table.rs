// Table library.

use super::{arg_error, check_str, check_table, opt_int};
use crate::lib_module;
use crate::runtime::{Control, ErrorKind, Runtime};
use crate::syntax::ast::Span;
use crate::value::{NativeCall, Value};

pub fn register(rt: &Runtime) {
    lib_module!("table", {
        "insert" => table_insert,
        "remove" => table_remove,
        "concat" => table_concat,
        "unpack" => table_unpack,
        "pack" => table_pack,
        "sort" => table_sort,
    })
    .install(rt);
}

fn table_insert(rt: &Runtime, call: &NativeCall) -> Result<Vec<Value>, Control> {
    let tid = check_table(rt, call, 0, "insert")?;
    let len = rt.state.heap.borrow().table(tid).border();
    match call.arg_count() {
        2 => {
            rt.raw_set(tid, Value::Int(len + 1), call.arg(1))
                .map_err(|m| rt.error_here(ErrorKind::IndexError, m.to_string()))?;
        }
        3 => {
            let pos = super::check_int(rt, call, 1, "insert")?;
            if pos < 1 || pos > len + 1 {
                return Err(arg_error(rt, 1, "insert", "position in bounds", call.arg(1)));
            }
            // Shift the tail up.
            let mut i = len;
            while i >= pos {
                let v = rt.raw_get(tid, Value::Int(i));
                rt.raw_set(tid, Value::Int(i + 1), v)
                    .map_err(|m| rt.error_here(ErrorKind::IndexError, m.to_string()))?;
                i -= 1;
            }
            rt.raw_set(tid, Value::Int(pos), call.arg(2))
                .map_err(|m| rt.error_here(ErrorKind::IndexError, m.to_string()))?;
        }
        n => {
            return Err(rt.error_here(
                ErrorKind::TypeError,
                format!("wrong number of arguments to 'insert' (got {})", n),
            ));
        }
    }
    Ok(vec![])
}

fn table_remove(rt: &Runtime, call: &NativeCall) -> Result<Vec<Value>, Control> {
    let tid = check_table(rt, call, 0, "remove")?;
    let len = rt.state.heap.borrow().table(tid).border();
    let pos = opt_int(rt, call, 1, "remove", len)?;
    if len == 0 && call.arg(1).is_nil() {
        return Ok(vec![Value::Nil]);
    }
    if len > 0 && (pos < 1 || pos > len + 1) {
        return Err(arg_error(rt, 1, "remove", "position in bounds", call.arg(1)));
    }
    let removed = rt.raw_get(tid, Value::Int(pos));
    let mut i = pos;
    while i < len {
        let v = rt.raw_get(tid, Value::Int(i + 1));
        rt.raw_set(tid, Value::Int(i), v)
            .map_err(|m| rt.error_here(ErrorKind::IndexError, m.to_string()))?;
        i += 1;
    }
    if pos <= len {
        rt.raw_set(tid, Value::Int(len), Value::Nil)
            .map_err(|m| rt.error_here(ErrorKind::IndexError, m.to_string()))?;
    }
    Ok(vec![removed])
}

fn table_concat(rt: &Runtime, call: &NativeCall) -> Result<Vec<Value>, Control> {
    let tid = check_table(rt, call, 0, "concat")?;
    let sep = if call.arg(1).is_nil() {
        Vec::new()
    } else {
        check_str(rt, call, 1, "concat")?
    };
    let len = rt.state.heap.borrow().table(tid).border();
    let i = opt_int(rt, call, 2, "concat", 1)?;
    let j = opt_int(rt, call, 3, "concat", len)?;
    let mut out: Vec<u8> = Vec::new();
    let mut k = i;
    while k <= j {
        let v = rt.raw_get(tid, Value::Int(k));
        match v {
            Value::Str(id) => rt.with_string(id, |b| out.extend_from_slice(b)),
            Value::Int(n) => {
                let mut buf = itoa::Buffer::new();
                out.extend_from_slice(buf.format(n).as_bytes());
            }
            Value::Float(f) => {
                out.extend_from_slice(crate::value::format_float(f).as_bytes())
            }
            other => {
                return Err(rt.error_here(
                    ErrorKind::TypeError,
                    format!(
                        "invalid value (at index {}) in table for 'concat' ({})",
                        k,
                        other.type_name()
                    ),
                ));
            }
        }
        if k < j {
            out.extend_from_slice(&sep);
        }
        k += 1;
    }
    Ok(vec![rt.new_string(&out)])
}

fn table_unpack(rt: &Runtime, call: &NativeCall) -> Result<Vec<Value>, Control> {
    let tid = check_table(rt, call, 0, "unpack")?;
    let len = rt.state.heap.borrow().table(tid).border();
    let i = opt_int(rt, call, 1, "unpack", 1)?;
    let j = opt_int(rt, call, 2, "unpack", len)?;
    if j.saturating_sub(i) >= 1_000_000 {
        return Err(rt.error_here(
            ErrorKind::TypeError,
            "too many results to unpack".to_string(),
        ));
    }
    let mut out = Vec::new();
    let mut k = i;
    while k <= j {
        out.push(rt.raw_get(tid, Value::Int(k)));
        k += 1;
    }
    Ok(out)
}

fn table_pack(rt: &Runtime, call: &NativeCall) -> Result<Vec<Value>, Control> {
    let tid = rt.new_table();
    // Root the fresh table while the entries allocate nothing, then fill.
    for (i, &v) in call.args.iter().enumerate() {
        rt.raw_set(tid, Value::Int(i as i64 + 1), v)
            .map_err(|m| rt.error_here(ErrorKind::IndexError, m.to_string()))?;
    }
    rt.raw_set_field(tid, "n", Value::Int(call.arg_count() as i64));
    Ok(vec![Value::Table(tid)])
}

fn table_sort(rt: &Runtime, call: &NativeCall) -> Result<Vec<Value>, Control> {
    let tid = check_table(rt, call, 0, "sort")?;
    let comparator = call.arg(1);
    let len = rt.state.heap.borrow().table(tid).border();
    let mut values = Vec::with_capacity(len.max(0) as usize);
    for k in 1..=len {
        values.push(rt.raw_get(tid, Value::Int(k)));
    }
    // Root the values: the comparator can trigger collections.
    let mark = self_root(rt, &values);
    let result = merge_sort(rt, &mut values, comparator);
    rt.stack_truncate(mark);
    result?;
    for (i, v) in values.into_iter().enumerate() {
        rt.raw_set(tid, Value::Int(i as i64 + 1), v)
            .map_err(|m| rt.error_here(ErrorKind::IndexError, m.to_string()))?;
    }
    Ok(vec![])
}

fn self_root(rt: &Runtime, values: &[Value]) -> usize {
    let mark = rt.stack_mark();
    for &v in values {
        rt.stack_push(v);
    }
    mark
}

fn sort_less(rt: &Runtime, comparator: Value, a: Value, b: Value) -> Result<bool, Control> {
    if comparator.is_nil() {
        rt.less_than(a, b, Span::default())
    } else {
        let results = rt.call_value(comparator, vec![a, b])?;
        Ok(results.first().copied().unwrap_or(Value::Nil).is_truthy())
    }
}

fn merge_sort(rt: &Runtime, values: &mut Vec<Value>, comparator: Value) -> Result<(), Control> {
    let n = values.len();
    if n < 2 {
        return Ok(());
    }
    let mid = n / 2;
    let mut right = values.split_off(mid);
    merge_sort(rt, values, comparator)?;
    merge_sort(rt, &mut right, comparator)?;
    let mut merged = Vec::with_capacity(n);
    let (mut i, mut j) = (0, 0);
    while i < values.len() && j < right.len() {
        if sort_less(rt, comparator, right[j], values[i])? {
            merged.push(right[j]);
            j += 1;
        } else {
            merged.push(values[i]);
            i += 1;
        }
    }
    merged.extend_from_slice(&values[i..]);
    merged.extend_from_slice(&right[j..]);
    *values = merged;
    Ok(())
}
