// Math library.

use super::{arg_error, check_int, check_number};
use crate::lib_module;
use crate::runtime::{Control, ErrorKind, Runtime};
use crate::value::{float_to_int_exact, NativeCall, Value};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::cell::RefCell;

thread_local! {
    static RNG: RefCell<StdRng> = RefCell::new(StdRng::seed_from_u64(0x2545F4914F6CDD1D));
}

pub fn register(rt: &Runtime) {
    let table = lib_module!("math", {
        "abs" => math_abs,
        "ceil" => math_ceil,
        "floor" => math_floor,
        "sqrt" => math_sqrt,
        "exp" => math_exp,
        "log" => math_log,
        "sin" => math_sin,
        "cos" => math_cos,
        "tan" => math_tan,
        "fmod" => math_fmod,
        "modf" => math_modf,
        "tointeger" => math_tointeger,
        "type" => math_type,
        "max" => math_max,
        "min" => math_min,
        "random" => math_random,
        "randomseed" => math_randomseed,
    })
    .install(rt)
    .expect("math module table");
    rt.raw_set_field(table, "pi", Value::Float(std::f64::consts::PI));
    rt.raw_set_field(table, "huge", Value::Float(f64::INFINITY));
    rt.raw_set_field(table, "maxinteger", Value::Int(i64::MAX));
    rt.raw_set_field(table, "mininteger", Value::Int(i64::MIN));
}

fn math_abs(rt: &Runtime, call: &NativeCall) -> Result<Vec<Value>, Control> {
    match call.arg(0) {
        Value::Int(i) => Ok(vec![Value::Int(i.wrapping_abs())]),
        Value::Float(f) => Ok(vec![Value::Float(f.abs())]),
        other => Err(arg_error(rt, 0, "abs", "number", other)),
    }
}

fn floor_like(
    rt: &Runtime,
    call: &NativeCall,
    fname: &str,
    f: impl Fn(f64) -> f64,
) -> Result<Vec<Value>, Control> {
    match call.arg(0) {
        v @ Value::Int(_) => Ok(vec![v]),
        Value::Float(x) => {
            let r = f(x);
            match float_to_int_exact(r) {
                Some(i) => Ok(vec![Value::Int(i)]),
                None => Ok(vec![Value::Float(r)]),
            }
        }
        other => Err(arg_error(rt, 0, fname, "number", other)),
    }
}

fn math_ceil(rt: &Runtime, call: &NativeCall) -> Result<Vec<Value>, Control> {
    floor_like(rt, call, "ceil", f64::ceil)
}

fn math_floor(rt: &Runtime, call: &NativeCall) -> Result<Vec<Value>, Control> {
    floor_like(rt, call, "floor", f64::floor)
}

fn math_sqrt(rt: &Runtime, call: &NativeCall) -> Result<Vec<Value>, Control> {
    Ok(vec![Value::Float(check_number(rt, call, 0, "sqrt")?.sqrt())])
}

fn math_exp(rt: &Runtime, call: &NativeCall) -> Result<Vec<Value>, Control> {
    Ok(vec![Value::Float(check_number(rt, call, 0, "exp")?.exp())])
}

fn math_log(rt: &Runtime, call: &NativeCall) -> Result<Vec<Value>, Control> {
    let x = check_number(rt, call, 0, "log")?;
    let result = if call.arg(1).is_nil() {
        x.ln()
    } else {
        let base = check_number(rt, call, 1, "log")?;
        x.log(base)
    };
    Ok(vec![Value::Float(result)])
}

fn math_sin(rt: &Runtime, call: &NativeCall) -> Result<Vec<Value>, Control> {
    Ok(vec![Value::Float(check_number(rt, call, 0, "sin")?.sin())])
}

fn math_cos(rt: &Runtime, call: &NativeCall) -> Result<Vec<Value>, Control> {
    Ok(vec![Value::Float(check_number(rt, call, 0, "cos")?.cos())])
}

fn math_tan(rt: &Runtime, call: &NativeCall) -> Result<Vec<Value>, Control> {
    Ok(vec![Value::Float(check_number(rt, call, 0, "tan")?.tan())])
}

fn math_fmod(rt: &Runtime, call: &NativeCall) -> Result<Vec<Value>, Control> {
    let a = check_number(rt, call, 0, "fmod")?;
    let b = check_number(rt, call, 1, "fmod")?;
    Ok(vec![Value::Float(a % b)])
}

fn math_modf(rt: &Runtime, call: &NativeCall) -> Result<Vec<Value>, Control> {
    let x = check_number(rt, call, 0, "modf")?;
    let int_part = x.trunc();
    let int_value = match float_to_int_exact(int_part) {
        Some(i) => Value::Int(i),
        None => Value::Float(int_part),
    };
    Ok(vec![int_value, Value::Float(x - int_part)])
}

fn math_tointeger(_rt: &Runtime, call: &NativeCall) -> Result<Vec<Value>, Control> {
    Ok(vec![match call.arg(0).as_integer() {
        Some(i) => Value::Int(i),
        None => Value::Nil,
    }])
}

fn math_type(rt: &Runtime, call: &NativeCall) -> Result<Vec<Value>, Control> {
    Ok(vec![match call.arg(0) {
        Value::Int(_) => rt.str_value("integer"),
        Value::Float(_) => rt.str_value("float"),
        _ => Value::Nil,
    }])
}

fn extremum(
    rt: &Runtime,
    call: &NativeCall,
    fname: &str,
    want_greater: bool,
) -> Result<Vec<Value>, Control> {
    if call.arg_count() == 0 {
        return Err(arg_error(rt, 0, fname, "number", Value::Nil));
    }
    let mut best = call.arg(0);
    for i in 1..call.arg_count() {
        let v = call.arg(i);
        let swap = if want_greater {
            rt.less_than(best, v, Default::default())?
        } else {
            rt.less_than(v, best, Default::default())?
        };
        if swap {
            best = v;
        }
    }
    Ok(vec![best])
}

fn math_max(rt: &Runtime, call: &NativeCall) -> Result<Vec<Value>, Control> {
    extremum(rt, call, "max", true)
}

fn math_min(rt: &Runtime, call: &NativeCall) -> Result<Vec<Value>, Control> {
    extremum(rt, call, "min", false)
}

fn math_random(rt: &Runtime, call: &NativeCall) -> Result<Vec<Value>, Control> {
    match call.arg_count() {
        0 => Ok(vec![Value::Float(RNG.with(|r| r.borrow_mut().gen::<f64>()))]),
        1 => {
            let m = check_int(rt, call, 0, "random")?;
            if m < 1 {
                return Err(arg_error(rt, 0, "random", "interval is empty", call.arg(0)));
            }
            Ok(vec![Value::Int(RNG.with(|r| r.borrow_mut().gen_range(1..=m)))])
        }
        _ => {
            let m = check_int(rt, call, 0, "random")?;
            let n = check_int(rt, call, 1, "random")?;
            if m > n {
                return Err(arg_error(rt, 1, "random", "interval is empty", call.arg(1)));
            }
            Ok(vec![Value::Int(RNG.with(|r| r.borrow_mut().gen_range(m..=n)))])
        }
    }
}

fn math_randomseed(rt: &Runtime, call: &NativeCall) -> Result<Vec<Value>, Control> {
    let seed = if call.arg(0).is_nil() {
        0x9E3779B97F4A7C15
    } else {
        check_int(rt, call, 0, "randomseed")? as u64
    };
    RNG.with(|r| *r.borrow_mut() = StdRng::seed_from_u64(seed));
    Ok(vec![])
}
