// String library. Byte-oriented throughout; indices are 1-based and
// negative indices count from the end, as in the reference semantics.
// Pattern matching is deliberately absent.

use super::{arg_error, check_int, check_str, opt_int};
use crate::lib_module;
use crate::runtime::{Control, ErrorKind, Runtime};
use crate::value::{format_float, NativeCall, Value};

pub fn register(rt: &Runtime) {
    let module = lib_module!("string", {
        "len" => string_len,
        "sub" => string_sub,
        "rep" => string_rep,
        "reverse" => string_reverse,
        "upper" => string_upper,
        "lower" => string_lower,
        "byte" => string_byte,
        "char" => string_char,
        "format" => string_format,
    });
    let table = module.install(rt).expect("string module table");
    // All strings share one metatable whose __index is the library itself,
    // so `("x"):upper()` works.
    let mt = rt.new_table();
    rt.raw_set_field(mt, "__index", Value::Table(table));
    rt.state.string_mt.set(Some(mt));
}

/// Resolve a relative index against a length: negative counts from the end,
/// zero clamps to `floor`.
fn rel_index(pos: i64, len: usize, floor: i64) -> i64 {
    if pos >= 0 {
        pos.max(floor)
    } else {
        (len as i64).saturating_add(pos).saturating_add(1).max(floor)
    }
}

fn string_len(rt: &Runtime, call: &NativeCall) -> Result<Vec<Value>, Control> {
    let s = check_str(rt, call, 0, "len")?;
    Ok(vec![Value::Int(s.len() as i64)])
}

fn string_sub(rt: &Runtime, call: &NativeCall) -> Result<Vec<Value>, Control> {
    let s = check_str(rt, call, 0, "sub")?;
    let i = opt_int(rt, call, 1, "sub", 1)?;
    let j = opt_int(rt, call, 2, "sub", -1)?;
    let start = rel_index(i, s.len(), 1);
    let stop = rel_index(j, s.len(), 0).min(s.len() as i64);
    if start > stop {
        return Ok(vec![rt.str_value("")]);
    }
    let slice = &s[(start - 1) as usize..stop as usize];
    Ok(vec![rt.new_string(slice)])
}

fn string_rep(rt: &Runtime, call: &NativeCall) -> Result<Vec<Value>, Control> {
    let s = check_str(rt, call, 0, "rep")?;
    let n = check_int(rt, call, 1, "rep")?;
    let sep = if call.arg(2).is_nil() {
        Vec::new()
    } else {
        check_str(rt, call, 2, "rep")?
    };
    if n <= 0 {
        return Ok(vec![rt.str_value("")]);
    }
    let total = ((s.len() + sep.len()) as i64).saturating_mul(n);
    if total > 64 * 1024 * 1024 {
        return Err(rt.error_here(
            ErrorKind::TypeError,
            "resulting string too large".to_string(),
        ));
    }
    let mut out = Vec::with_capacity(total as usize);
    for i in 0..n {
        if i > 0 {
            out.extend_from_slice(&sep);
        }
        out.extend_from_slice(&s);
    }
    Ok(vec![rt.new_string(&out)])
}

fn string_reverse(rt: &Runtime, call: &NativeCall) -> Result<Vec<Value>, Control> {
    let mut s = check_str(rt, call, 0, "reverse")?;
    s.reverse();
    Ok(vec![rt.new_string(&s)])
}

fn string_upper(rt: &Runtime, call: &NativeCall) -> Result<Vec<Value>, Control> {
    let mut s = check_str(rt, call, 0, "upper")?;
    s.make_ascii_uppercase();
    Ok(vec![rt.new_string(&s)])
}

fn string_lower(rt: &Runtime, call: &NativeCall) -> Result<Vec<Value>, Control> {
    let mut s = check_str(rt, call, 0, "lower")?;
    s.make_ascii_lowercase();
    Ok(vec![rt.new_string(&s)])
}

fn string_byte(rt: &Runtime, call: &NativeCall) -> Result<Vec<Value>, Control> {
    let s = check_str(rt, call, 0, "byte")?;
    let i = opt_int(rt, call, 1, "byte", 1)?;
    let j = opt_int(rt, call, 2, "byte", i)?;
    let start = rel_index(i, s.len(), 1);
    let stop = rel_index(j, s.len(), 0).min(s.len() as i64);
    let mut out = Vec::new();
    let mut k = start;
    while k <= stop {
        out.push(Value::Int(s[(k - 1) as usize] as i64));
        k += 1;
    }
    Ok(out)
}

fn string_char(rt: &Runtime, call: &NativeCall) -> Result<Vec<Value>, Control> {
    let mut out = Vec::with_capacity(call.arg_count());
    for i in 0..call.arg_count() {
        let c = check_int(rt, call, i, "char")?;
        if !(0..=255).contains(&c) {
            return Err(arg_error(rt, i, "char", "value in [0,255]", call.arg(i)));
        }
        out.push(c as u8);
    }
    Ok(vec![rt.new_string(&out)])
}

// ---- string.format ----

struct FormatSpec {
    minus: bool,
    zero: bool,
    plus: bool,
    space: bool,
    alt: bool,
    width: usize,
    precision: Option<usize>,
}

fn pad(spec: &FormatSpec, body: String, numeric: bool) -> String {
    if body.len() >= spec.width {
        return body;
    }
    let fill = spec.width - body.len();
    if spec.minus {
        let mut out = body;
        out.extend(std::iter::repeat(' ').take(fill));
        out
    } else if spec.zero && numeric {
        // Zeros go after any sign.
        let (sign, digits) = match body.strip_prefix(['-', '+']) {
            Some(rest) => (&body[..1], rest),
            None => ("", body.as_str()),
        };
        format!("{}{}{}", sign, "0".repeat(fill), digits)
    } else {
        format!("{}{}", " ".repeat(fill), body)
    }
}

fn sign_prefix(spec: &FormatSpec, negative: bool) -> &'static str {
    if negative {
        ""
    } else if spec.plus {
        "+"
    } else if spec.space {
        " "
    } else {
        ""
    }
}

fn string_format(rt: &Runtime, call: &NativeCall) -> Result<Vec<Value>, Control> {
    let fmt = check_str(rt, call, 0, "format")?;
    let mut out: Vec<u8> = Vec::with_capacity(fmt.len());
    let mut arg_index = 1;
    let mut bytes = fmt.iter().copied().peekable();
    while let Some(c) = bytes.next() {
        if c != b'%' {
            out.push(c);
            continue;
        }
        if bytes.peek() == Some(&b'%') {
            bytes.next();
            out.push(b'%');
            continue;
        }
        let mut spec = FormatSpec {
            minus: false,
            zero: false,
            plus: false,
            space: false,
            alt: false,
            width: 0,
            precision: None,
        };
        while let Some(&f) = bytes.peek() {
            match f {
                b'-' => spec.minus = true,
                b'0' => spec.zero = true,
                b'+' => spec.plus = true,
                b' ' => spec.space = true,
                b'#' => spec.alt = true,
                _ => break,
            }
            bytes.next();
        }
        while let Some(&d) = bytes.peek() {
            if d.is_ascii_digit() {
                spec.width = spec.width * 10 + (d - b'0') as usize;
                bytes.next();
            } else {
                break;
            }
        }
        if bytes.peek() == Some(&b'.') {
            bytes.next();
            let mut p = 0;
            while let Some(&d) = bytes.peek() {
                if d.is_ascii_digit() {
                    p = p * 10 + (d - b'0') as usize;
                    bytes.next();
                } else {
                    break;
                }
            }
            spec.precision = Some(p);
        }
        let Some(conv) = bytes.next() else {
            return Err(rt.error_here(
                ErrorKind::TypeError,
                "invalid format string to 'format'".to_string(),
            ));
        };
        let rendered = match conv {
            b'd' | b'i' => {
                let n = check_int(rt, call, arg_index, "format")?;
                arg_index += 1;
                let body = format!("{}{}", sign_prefix(&spec, n < 0), n);
                pad(&spec, body, true)
            }
            b'u' => {
                let n = check_int(rt, call, arg_index, "format")?;
                arg_index += 1;
                pad(&spec, format!("{}", n as u64), true)
            }
            b'x' => {
                let n = check_int(rt, call, arg_index, "format")?;
                arg_index += 1;
                let body = if spec.alt {
                    format!("0x{:x}", n as u64)
                } else {
                    format!("{:x}", n as u64)
                };
                pad(&spec, body, true)
            }
            b'X' => {
                let n = check_int(rt, call, arg_index, "format")?;
                arg_index += 1;
                let body = if spec.alt {
                    format!("0X{:X}", n as u64)
                } else {
                    format!("{:X}", n as u64)
                };
                pad(&spec, body, true)
            }
            b'o' => {
                let n = check_int(rt, call, arg_index, "format")?;
                arg_index += 1;
                pad(&spec, format!("{:o}", n as u64), true)
            }
            b'c' => {
                let n = check_int(rt, call, arg_index, "format")?;
                arg_index += 1;
                out.push(n as u8);
                String::new()
            }
            b'f' | b'F' => {
                let n = super::check_number(rt, call, arg_index, "format")?;
                arg_index += 1;
                let prec = spec.precision.unwrap_or(6);
                let body = format!("{}{:.*}", sign_prefix(&spec, n < 0.0), prec, n);
                pad(&spec, body, true)
            }
            b'e' | b'E' => {
                let n = super::check_number(rt, call, arg_index, "format")?;
                arg_index += 1;
                let prec = spec.precision.unwrap_or(6);
                let mut body = format!("{:.*e}", prec, n);
                if conv == b'E' {
                    body = body.to_uppercase();
                }
                pad(&spec, body, true)
            }
            b'g' | b'G' => {
                let n = super::check_number(rt, call, arg_index, "format")?;
                arg_index += 1;
                pad(&spec, format_float(n), true)
            }
            b's' => {
                let v = call.arg(arg_index);
                arg_index += 1;
                let s = rt.tostring_value(v)?;
                let mut bytes = match s {
                    Value::Str(id) => rt.string_bytes(id),
                    _ => Vec::new(),
                };
                // Precision counts bytes, like every index in this library.
                if let Some(p) = spec.precision {
                    bytes.truncate(p);
                }
                pad(&spec, String::from_utf8_lossy(&bytes).into_owned(), false)
            }
            b'q' => {
                let s = check_str(rt, call, arg_index, "format")?;
                arg_index += 1;
                let mut quoted = String::from("\"");
                for &b in &s {
                    match b {
                        b'"' => quoted.push_str("\\\""),
                        b'\\' => quoted.push_str("\\\\"),
                        b'\n' => quoted.push_str("\\n"),
                        b'\r' => quoted.push_str("\\r"),
                        0 => quoted.push_str("\\0"),
                        other if other < 32 || other == 127 => {
                            quoted.push_str(&format!("\\{}", other));
                        }
                        other => quoted.push(other as char),
                    }
                }
                quoted.push('"');
                quoted
            }
            other => {
                return Err(rt.error_here(
                    ErrorKind::TypeError,
                    format!(
                        "invalid conversion '%{}' to 'format'",
                        (other as char).escape_default()
                    ),
                ));
            }
        };
        out.extend_from_slice(rendered.as_bytes());
    }
    Ok(vec![rt.new_string(&out)])
}
