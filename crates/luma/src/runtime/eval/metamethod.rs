// Operator semantics and metamethod dispatch.
//
// Every binary operation tries the primitive path first; failing that, the
// metamethod of the left operand, then of the right one.

use crate::runtime::{ErrorKind, Eval, Runtime};
use crate::syntax::ast::{BinOp, Span, UnOp};
use crate::value::{float_to_int_exact, format_float, Value};

/// Metamethod events, in the classic tag-method order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MetaEvent {
    Index = 0,
    NewIndex,
    Gc,
    Mode,
    Len,
    Eq,
    Add,
    Sub,
    Mul,
    Mod,
    Pow,
    Div,
    IDiv,
    BAnd,
    BOr,
    BXor,
    Shl,
    Shr,
    Unm,
    BNot,
    Lt,
    Le,
    Concat,
    Call,
    Close,
    ToString,
    Name,
    Pairs,
    Metatable,
}

impl MetaEvent {
    pub const COUNT: usize = 29;

    pub const ALL: [MetaEvent; Self::COUNT] = [
        MetaEvent::Index,
        MetaEvent::NewIndex,
        MetaEvent::Gc,
        MetaEvent::Mode,
        MetaEvent::Len,
        MetaEvent::Eq,
        MetaEvent::Add,
        MetaEvent::Sub,
        MetaEvent::Mul,
        MetaEvent::Mod,
        MetaEvent::Pow,
        MetaEvent::Div,
        MetaEvent::IDiv,
        MetaEvent::BAnd,
        MetaEvent::BOr,
        MetaEvent::BXor,
        MetaEvent::Shl,
        MetaEvent::Shr,
        MetaEvent::Unm,
        MetaEvent::BNot,
        MetaEvent::Lt,
        MetaEvent::Le,
        MetaEvent::Concat,
        MetaEvent::Call,
        MetaEvent::Close,
        MetaEvent::ToString,
        MetaEvent::Name,
        MetaEvent::Pairs,
        MetaEvent::Metatable,
    ];

    pub fn name(self) -> &'static str {
        match self {
            MetaEvent::Index => "__index",
            MetaEvent::NewIndex => "__newindex",
            MetaEvent::Gc => "__gc",
            MetaEvent::Mode => "__mode",
            MetaEvent::Len => "__len",
            MetaEvent::Eq => "__eq",
            MetaEvent::Add => "__add",
            MetaEvent::Sub => "__sub",
            MetaEvent::Mul => "__mul",
            MetaEvent::Mod => "__mod",
            MetaEvent::Pow => "__pow",
            MetaEvent::Div => "__div",
            MetaEvent::IDiv => "__idiv",
            MetaEvent::BAnd => "__band",
            MetaEvent::BOr => "__bor",
            MetaEvent::BXor => "__bxor",
            MetaEvent::Shl => "__shl",
            MetaEvent::Shr => "__shr",
            MetaEvent::Unm => "__unm",
            MetaEvent::BNot => "__bnot",
            MetaEvent::Lt => "__lt",
            MetaEvent::Le => "__le",
            MetaEvent::Concat => "__concat",
            MetaEvent::Call => "__call",
            MetaEvent::Close => "__close",
            MetaEvent::ToString => "__tostring",
            MetaEvent::Name => "__name",
            MetaEvent::Pairs => "__pairs",
            MetaEvent::Metatable => "__metatable",
        }
    }

    /// Operator name used in error messages ("attempt to perform ...").
    fn op_text(self) -> &'static str {
        match self {
            MetaEvent::Add => "add",
            MetaEvent::Sub => "sub",
            MetaEvent::Mul => "mul",
            MetaEvent::Mod => "mod",
            MetaEvent::Pow => "pow",
            MetaEvent::Div => "div",
            MetaEvent::IDiv => "idiv",
            MetaEvent::BAnd => "band",
            MetaEvent::BOr => "bor",
            MetaEvent::BXor => "bxor",
            MetaEvent::Shl => "shl",
            MetaEvent::Shr => "shr",
            MetaEvent::Unm => "unm",
            MetaEvent::BNot => "bnot",
            other => other.name(),
        }
    }
}

/// Upper bound on `__index`/`__newindex` indirection.
const MAX_INDEX_CHAIN: usize = 100;

impl Runtime {
    /// Number coercion for arithmetic: numbers pass through, numeric strings
    /// convert.
    pub(crate) fn coerce_number(&self, v: Value) -> Option<Value> {
        match v {
            Value::Int(_) | Value::Float(_) => Some(v),
            Value::Str(id) => {
                let text = self.with_string(id, |b| String::from_utf8_lossy(b).into_owned());
                parse_number(text.trim())
            }
            _ => None,
        }
    }

    pub(crate) fn arith(&self, op: BinOp, a: Value, b: Value, span: Span) -> Eval<Value> {
        let event = match op {
            BinOp::Add => MetaEvent::Add,
            BinOp::Sub => MetaEvent::Sub,
            BinOp::Mul => MetaEvent::Mul,
            BinOp::Div => MetaEvent::Div,
            BinOp::IDiv => MetaEvent::IDiv,
            BinOp::Mod => MetaEvent::Mod,
            BinOp::Pow => MetaEvent::Pow,
            BinOp::BAnd => MetaEvent::BAnd,
            BinOp::BOr => MetaEvent::BOr,
            BinOp::BXor => MetaEvent::BXor,
            BinOp::Shl => MetaEvent::Shl,
            BinOp::Shr => MetaEvent::Shr,
            _ => unreachable!("not an arithmetic operator"),
        };

        if matches!(
            op,
            BinOp::BAnd | BinOp::BOr | BinOp::BXor | BinOp::Shl | BinOp::Shr
        ) {
            return self.bitwise(op, event, a, b, span);
        }

        if let (Some(na), Some(nb)) = (self.coerce_number(a), self.coerce_number(b)) {
            return self.arith_numeric(op, na, nb, span);
        }
        self.binary_metamethod(event, a, b, span)
    }

    fn arith_numeric(&self, op: BinOp, a: Value, b: Value, span: Span) -> Eval<Value> {
        use Value::{Float, Int};
        let result = match op {
            BinOp::Add => match (a, b) {
                (Int(x), Int(y)) => Int(x.wrapping_add(y)),
                _ => Float(to_f(a) + to_f(b)),
            },
            BinOp::Sub => match (a, b) {
                (Int(x), Int(y)) => Int(x.wrapping_sub(y)),
                _ => Float(to_f(a) - to_f(b)),
            },
            BinOp::Mul => match (a, b) {
                (Int(x), Int(y)) => Int(x.wrapping_mul(y)),
                _ => Float(to_f(a) * to_f(b)),
            },
            // Division always yields float.
            BinOp::Div => Float(to_f(a) / to_f(b)),
            BinOp::Pow => Float(to_f(a).powf(to_f(b))),
            BinOp::IDiv => match (a, b) {
                (Int(x), Int(y)) => {
                    if y == 0 {
                        return Err(self.error_at(
                            span,
                            ErrorKind::ArithError,
                            "attempt to perform 'n//0'".to_string(),
                        ));
                    }
                    Int(floor_div(x, y))
                }
                _ => Float((to_f(a) / to_f(b)).floor()),
            },
            BinOp::Mod => match (a, b) {
                (Int(x), Int(y)) => {
                    if y == 0 {
                        return Err(self.error_at(
                            span,
                            ErrorKind::ArithError,
                            "attempt to perform 'n%%0'".to_string(),
                        ));
                    }
                    Int(floor_mod(x, y))
                }
                _ => Float(float_mod(to_f(a), to_f(b))),
            },
            _ => unreachable!(),
        };
        Ok(result)
    }

    fn bitwise(&self, op: BinOp, event: MetaEvent, a: Value, b: Value, span: Span) -> Eval<Value> {
        let (ia, ib) = match (self.to_shift_operand(a), self.to_shift_operand(b)) {
            (Some(Ok(x)), Some(Ok(y))) => (x, y),
            (Some(Err(())), _) | (_, Some(Err(()))) => {
                return Err(self.error_at(
                    span,
                    ErrorKind::ArithError,
                    "number has no integer representation".to_string(),
                ));
            }
            _ => return self.binary_metamethod(event, a, b, span),
        };
        let result = match op {
            BinOp::BAnd => ia & ib,
            BinOp::BOr => ia | ib,
            BinOp::BXor => ia ^ ib,
            BinOp::Shl => shift_left(ia, ib),
            BinOp::Shr => shift_left(ia, ib.wrapping_neg()),
            _ => unreachable!(),
        };
        Ok(Value::Int(result))
    }

    /// None: not a number at all (try metamethods). Some(Err): a number with
    /// no integer representation.
    fn to_shift_operand(&self, v: Value) -> Option<Result<i64, ()>> {
        match v {
            Value::Int(i) => Some(Ok(i)),
            Value::Float(f) => Some(float_to_int_exact(f).ok_or(())),
            _ => None,
        }
    }

    pub(crate) fn arith_unary(&self, op: UnOp, v: Value, span: Span) -> Eval<Value> {
        match op {
            UnOp::Neg => {
                if let Some(n) = self.coerce_number(v) {
                    return Ok(match n {
                        Value::Int(i) => Value::Int(i.wrapping_neg()),
                        Value::Float(f) => Value::Float(-f),
                        _ => unreachable!(),
                    });
                }
                self.binary_metamethod(MetaEvent::Unm, v, v, span)
            }
            UnOp::BNot => match self.to_shift_operand(v) {
                Some(Ok(i)) => Ok(Value::Int(!i)),
                Some(Err(())) => Err(self.error_at(
                    span,
                    ErrorKind::ArithError,
                    "number has no integer representation".to_string(),
                )),
                None => self.binary_metamethod(MetaEvent::BNot, v, v, span),
            },
            _ => unreachable!("handled in the expression walker"),
        }
    }

    fn binary_metamethod(&self, event: MetaEvent, a: Value, b: Value, span: Span) -> Eval<Value> {
        let mm = self
            .metamethod(a, event)
            .or_else(|| self.metamethod(b, event));
        match mm {
            Some(f) => {
                let results = self.call_value(f, vec![a, b])?;
                Ok(results.first().copied().unwrap_or(Value::Nil))
            }
            None => {
                let offender = if a.is_number() || (a.is_string() && event == MetaEvent::Concat) {
                    b
                } else {
                    a
                };
                let (kind, msg) = match event {
                    MetaEvent::Concat => (
                        ErrorKind::TypeError,
                        format!("attempt to concatenate a {} value", offender.type_name()),
                    ),
                    _ => (
                        ErrorKind::ArithError,
                        format!(
                            "attempt to perform '{}' on a {} value",
                            event.op_text(),
                            offender.type_name()
                        ),
                    ),
                };
                Err(self.error_at(span, kind, msg))
            }
        }
    }

    // ---- comparison ----

    pub(crate) fn less_than(&self, a: Value, b: Value, span: Span) -> Eval<bool> {
        if a.is_number() && b.is_number() {
            return Ok(num_lt(a, b));
        }
        if let (Value::Str(x), Value::Str(y)) = (a, b) {
            return Ok(self.str_compare(x, y) == std::cmp::Ordering::Less);
        }
        self.order_metamethod(MetaEvent::Lt, a, b, span)
    }

    pub(crate) fn less_equal(&self, a: Value, b: Value, span: Span) -> Eval<bool> {
        if a.is_number() && b.is_number() {
            return Ok(num_le(a, b));
        }
        if let (Value::Str(x), Value::Str(y)) = (a, b) {
            return Ok(self.str_compare(x, y) != std::cmp::Ordering::Greater);
        }
        self.order_metamethod(MetaEvent::Le, a, b, span)
    }

    fn str_compare(&self, a: crate::gc::StringId, b: crate::gc::StringId) -> std::cmp::Ordering {
        if a == b {
            return std::cmp::Ordering::Equal;
        }
        let heap = self.state.heap.borrow();
        heap.string(a).as_bytes().cmp(heap.string(b).as_bytes())
    }

    fn order_metamethod(&self, event: MetaEvent, a: Value, b: Value, span: Span) -> Eval<bool> {
        let mm = self
            .metamethod(a, event)
            .or_else(|| self.metamethod(b, event));
        match mm {
            Some(f) => {
                let results = self.call_value(f, vec![a, b])?;
                Ok(results.first().copied().unwrap_or(Value::Nil).is_truthy())
            }
            None => Err(self.error_at(
                span,
                ErrorKind::TypeError,
                format!(
                    "attempt to compare {} with {}",
                    a.type_name(),
                    b.type_name()
                ),
            )),
        }
    }

    /// `==` including `__eq`: only consulted when both operands are tables or
    /// both are userdata and raw equality failed.
    pub(crate) fn values_equal(&self, a: Value, b: Value) -> Eval<bool> {
        if a.raw_equal(&b) {
            return Ok(true);
        }
        let same_kind = matches!(
            (a, b),
            (Value::Table(_), Value::Table(_)) | (Value::Userdata(_), Value::Userdata(_))
        );
        if !same_kind {
            return Ok(false);
        }
        let mm = self
            .metamethod(a, MetaEvent::Eq)
            .or_else(|| self.metamethod(b, MetaEvent::Eq));
        match mm {
            Some(f) => {
                let results = self.call_value(f, vec![a, b])?;
                Ok(results.first().copied().unwrap_or(Value::Nil).is_truthy())
            }
            None => Ok(false),
        }
    }

    // ---- concat / length ----

    pub(crate) fn concat_values(&self, a: Value, b: Value, span: Span) -> Eval<Value> {
        if concatable(a) && concatable(b) {
            let mut bytes = Vec::new();
            self.push_concat_bytes(&mut bytes, a);
            self.push_concat_bytes(&mut bytes, b);
            return Ok(self.new_string(&bytes));
        }
        self.binary_metamethod(MetaEvent::Concat, a, b, span)
    }

    fn push_concat_bytes(&self, out: &mut Vec<u8>, v: Value) {
        match v {
            Value::Str(id) => self.with_string(id, |b| out.extend_from_slice(b)),
            Value::Int(i) => {
                let mut buf = itoa::Buffer::new();
                out.extend_from_slice(buf.format(i).as_bytes());
            }
            Value::Float(f) => out.extend_from_slice(format_float(f).as_bytes()),
            _ => unreachable!("checked by concatable"),
        }
    }

    pub(crate) fn length_of(&self, v: Value, span: Span) -> Eval<Value> {
        match v {
            Value::Str(id) => Ok(Value::Int(self.with_string(id, |b| b.len() as i64))),
            Value::Table(tid) => {
                // `__len` wins over the primitive border.
                if let Some(mm) = self.metamethod(v, MetaEvent::Len) {
                    let results = self.call_value(mm, vec![v])?;
                    return Ok(results.first().copied().unwrap_or(Value::Nil));
                }
                Ok(Value::Int(self.state.heap.borrow().table(tid).border()))
            }
            other => {
                if let Some(mm) = self.metamethod(other, MetaEvent::Len) {
                    let results = self.call_value(mm, vec![other])?;
                    return Ok(results.first().copied().unwrap_or(Value::Nil));
                }
                Err(self.error_at(
                    span,
                    ErrorKind::TypeError,
                    format!("attempt to get length of a {} value", other.type_name()),
                ))
            }
        }
    }

    // ---- index / newindex ----

    pub(crate) fn index_value(&self, obj: Value, key: Value, span: Span) -> Eval<Value> {
        let mut target = obj;
        for _ in 0..MAX_INDEX_CHAIN {
            if let Value::Table(tid) = target {
                let raw = self.raw_get(tid, key);
                if !raw.is_nil() {
                    return Ok(raw);
                }
                match self.metamethod(target, MetaEvent::Index) {
                    None => return Ok(Value::Nil),
                    Some(handler) if handler.is_function() => {
                        let results = self.call_value(handler, vec![target, key])?;
                        return Ok(results.first().copied().unwrap_or(Value::Nil));
                    }
                    Some(next) => target = next,
                }
            } else {
                match self.metamethod(target, MetaEvent::Index) {
                    None => {
                        return Err(self.error_at(
                            span,
                            ErrorKind::IndexError,
                            format!("attempt to index a {} value", target.type_name()),
                        ));
                    }
                    Some(handler) if handler.is_function() => {
                        let results = self.call_value(handler, vec![target, key])?;
                        return Ok(results.first().copied().unwrap_or(Value::Nil));
                    }
                    Some(next) => target = next,
                }
            }
        }
        Err(self.error_at(
            span,
            ErrorKind::IndexError,
            "loop in gettable".to_string(),
        ))
    }

    pub(crate) fn set_index_value(
        &self,
        obj: Value,
        key: Value,
        value: Value,
        span: Span,
    ) -> Eval<()> {
        let mut target = obj;
        for _ in 0..MAX_INDEX_CHAIN {
            if let Value::Table(tid) = target {
                let raw = self.raw_get(tid, key);
                if !raw.is_nil() {
                    return self
                        .raw_set(tid, key, value)
                        .map_err(|m| self.error_at(span, ErrorKind::IndexError, m.to_string()));
                }
                match self.metamethod(target, MetaEvent::NewIndex) {
                    None => {
                        return self
                            .raw_set(tid, key, value)
                            .map_err(|m| self.error_at(span, ErrorKind::IndexError, m.to_string()));
                    }
                    Some(handler) if handler.is_function() => {
                        self.call_value(handler, vec![target, key, value])?;
                        return Ok(());
                    }
                    Some(next) => target = next,
                }
            } else {
                match self.metamethod(target, MetaEvent::NewIndex) {
                    None => {
                        return Err(self.error_at(
                            span,
                            ErrorKind::IndexError,
                            format!("attempt to index a {} value", target.type_name()),
                        ));
                    }
                    Some(handler) if handler.is_function() => {
                        self.call_value(handler, vec![target, key, value])?;
                        return Ok(());
                    }
                    Some(next) => target = next,
                }
            }
        }
        Err(self.error_at(
            span,
            ErrorKind::IndexError,
            "loop in settable".to_string(),
        ))
    }

    /// `tostring` semantics honouring `__tostring` and `__name`.
    pub(crate) fn tostring_value(&self, v: Value) -> Eval<Value> {
        if let Some(mm) = self.metamethod(v, MetaEvent::ToString) {
            let results = self.call_value(mm, vec![v])?;
            let first = results.first().copied().unwrap_or(Value::Nil);
            if !first.is_string() {
                return Err(self.error_here(
                    ErrorKind::TypeError,
                    "'__tostring' must return a string".to_string(),
                ));
            }
            return Ok(first);
        }
        if let Some(mm) = self.metamethod(v, MetaEvent::Name) {
            if let Value::Str(id) = mm {
                let name = self.string_text(id);
                let rendered = match v {
                    Value::Table(t) => format!("{}: 0x{:08x}", name, t.0),
                    Value::Userdata(u) => format!("{}: 0x{:08x}", name, u.0),
                    _ => self.display_value(v),
                };
                return Ok(self.str_value(&rendered));
            }
        }
        let text = self.display_value(v);
        Ok(self.str_value(&text))
    }
}

fn concatable(v: Value) -> bool {
    matches!(v, Value::Str(_) | Value::Int(_) | Value::Float(_))
}

#[inline]
fn to_f(v: Value) -> f64 {
    v.as_float().expect("numeric operand")
}

/// Lua-style flooring division for integers.
fn floor_div(a: i64, b: i64) -> i64 {
    let q = a.wrapping_div(b);
    let r = a.wrapping_rem(b);
    if r != 0 && (r ^ b) < 0 {
        q - 1
    } else {
        q
    }
}

/// `a - floor(a/b)*b`; the result has the sign of the divisor.
fn floor_mod(a: i64, b: i64) -> i64 {
    let r = a.wrapping_rem(b);
    if r != 0 && (r ^ b) < 0 {
        r + b
    } else {
        r
    }
}

fn float_mod(a: f64, b: f64) -> f64 {
    let r = a % b;
    if r != 0.0 && (r < 0.0) != (b < 0.0) {
        r + b
    } else {
        r
    }
}

/// Logical shift with Lua range semantics: counts >= 64 flush to zero,
/// negative counts reverse direction.
fn shift_left(a: i64, n: i64) -> i64 {
    if n <= -64 || n >= 64 {
        0
    } else if n >= 0 {
        ((a as u64) << n) as i64
    } else {
        ((a as u64) >> (-n)) as i64
    }
}

// Exact mixed int/float ordering; NaN compares false against everything.

fn num_lt(a: Value, b: Value) -> bool {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => x < y,
        (Value::Float(x), Value::Float(y)) => x < y,
        (Value::Int(x), Value::Float(y)) => int_lt_float(x, y),
        (Value::Float(x), Value::Int(y)) => float_lt_int(x, y),
        _ => false,
    }
}

fn num_le(a: Value, b: Value) -> bool {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => x <= y,
        (Value::Float(x), Value::Float(y)) => x <= y,
        (Value::Int(x), Value::Float(y)) => !y.is_nan() && !float_lt_int(y, x),
        (Value::Float(x), Value::Int(y)) => !x.is_nan() && !int_lt_float(y, x),
        _ => false,
    }
}

const TWO_POW_63: f64 = 9_223_372_036_854_775_808.0;

fn int_lt_float(i: i64, f: f64) -> bool {
    if f.is_nan() {
        return false;
    }
    if let Some(fi) = float_to_int_exact(f) {
        return i < fi;
    }
    if f >= TWO_POW_63 {
        return true;
    }
    if f <= -TWO_POW_63 {
        return false;
    }
    // Fractional and in range: i < f iff i < ceil(f).
    let cf = f.ceil();
    if cf >= TWO_POW_63 {
        true
    } else {
        i < cf as i64
    }
}

fn float_lt_int(f: f64, i: i64) -> bool {
    if f.is_nan() {
        return false;
    }
    if let Some(fi) = float_to_int_exact(f) {
        return fi < i;
    }
    if f >= TWO_POW_63 {
        return false;
    }
    if f <= -TWO_POW_63 {
        return true;
    }
    // Fractional and in range: f < i iff floor(f) < i.
    (f.floor() as i64) < i
}

/// Numeric string parsing shared by arithmetic coercion and `tonumber`.
pub(crate) fn parse_number(text: &str) -> Option<Value> {
    let t = text.trim();
    if t.is_empty() {
        return None;
    }
    let (negative, body) = match t.strip_prefix('-') {
        Some(rest) => (true, rest.trim_start()),
        None => (false, t.strip_prefix('+').unwrap_or(t)),
    };
    if let Some(hex) = body
        .strip_prefix("0x")
        .or_else(|| body.strip_prefix("0X"))
    {
        if hex.is_empty() || !hex.bytes().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let mut value: i64 = 0;
        for c in hex.bytes() {
            let d = (c as char).to_digit(16).unwrap() as i64;
            value = value.wrapping_mul(16).wrapping_add(d);
        }
        return Some(Value::Int(if negative { value.wrapping_neg() } else { value }));
    }
    // Only digit/sign/dot/exponent characters form a number; this rejects
    // the "inf"/"nan" spellings the float parser would otherwise accept.
    if !t
        .bytes()
        .all(|c| c.is_ascii_digit() || matches!(c, b'.' | b'e' | b'E' | b'+' | b'-'))
    {
        return None;
    }
    if let Ok(i) = t.parse::<i64>() {
        return Some(Value::Int(i));
    }
    t.parse::<f64>().ok().map(Value::Float)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flooring_integer_ops() {
        assert_eq!(floor_div(7, 2), 3);
        assert_eq!(floor_div(-7, 2), -4);
        assert_eq!(floor_mod(-7, 2), 1);
        assert_eq!(floor_mod(7, -2), -1);
        assert_eq!(floor_mod(-6, 3), 0);
    }

    #[test]
    fn shifts_flush_out_of_range() {
        assert_eq!(shift_left(1, 64), 0);
        assert_eq!(shift_left(1, 3), 8);
        assert_eq!(shift_left(-1, -1), i64::MAX);
        assert_eq!(shift_left(8, -3), 1);
    }

    #[test]
    fn mixed_ordering_is_exact() {
        // 2^63 as a float is above every i64
        assert!(int_lt_float(i64::MAX, TWO_POW_63));
        assert!(!float_lt_int(TWO_POW_63, i64::MAX));
        assert!(int_lt_float(3, 3.5));
        assert!(!int_lt_float(4, 3.5));
        assert!(float_lt_int(3.5, 4));
        assert!(!float_lt_int(3.5, 3));
        assert!(!int_lt_float(1, f64::NAN));
    }

    #[test]
    fn number_parsing() {
        assert!(matches!(parse_number("42"), Some(Value::Int(42))));
        assert!(matches!(parse_number("0x10"), Some(Value::Int(16))));
        assert!(matches!(parse_number("-0x10"), Some(Value::Int(-16))));
        assert!(matches!(parse_number("3.5"), Some(Value::Float(_))));
        assert!(matches!(parse_number("1e3"), Some(Value::Float(_))));
        assert!(parse_number("bad").is_none());
        assert!(parse_number("").is_none());
    }
}
