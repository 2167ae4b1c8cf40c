// Operator semantics: integer/float duality, flooring division, bitwise
// rules, comparison, concatenation, length.

use super::{check, check_fails};
use crate::ErrorKind;

#[test]
fn integer_arithmetic_stays_integer() {
    check(
        r#"
        assert(1 + 2 == 3)
        assert(math.type(1 + 2) == "integer")
        assert(math.type(2^2) == "float")
        assert(math.type(7 / 2) == "float")
        assert(7 / 2 == 3.5)
        assert(7 // 2 == 3)
        assert(math.type(7 // 2) == "integer")
        assert(-7 // 2 == -4)
        assert(7 % 2 == 1)
        assert(-7 % 2 == 1)
        assert(7 % -2 == -1)
        assert(math.type(7.0 // 2) == "float")
        assert(7.0 // 2 == 3.0)
    "#,
    );
}

#[test]
fn integer_overflow_wraps() {
    check(
        r#"
        assert(math.maxinteger + 1 == math.mininteger)
        assert(math.mininteger - 1 == math.maxinteger)
        assert(math.maxinteger * 2 == -2)
    "#,
    );
}

#[test]
fn float_promotion() {
    check(
        r#"
        assert(1 + 0.5 == 1.5)
        assert(math.type(1 + 0.5) == "float")
        assert(1 == 1.0)
        assert(math.type(1) ~= math.type(1.0))
        assert(0.1 + 0.2 ~= 0.3)  -- IEEE-754 doubles
    "#,
    );
}

#[test]
fn division_and_modulo_by_zero() {
    let err = check_fails("return 1 // 0");
    assert_eq!(err.kind, ErrorKind::ArithError);
    let err = check_fails("return 1 % 0");
    assert_eq!(err.kind, ErrorKind::ArithError);
    // Float division by zero is inf, not an error.
    check(
        r#"
        assert(1 / 0 == math.huge)
        assert(-1 / 0 == -math.huge)
        local nan = 0 / 0
        assert(nan ~= nan)
    "#,
    );
}

#[test]
fn string_arith_coercion() {
    check(
        r#"
        assert("10" + 1 == 11)
        assert("2" * "3" == 6)
        assert(-"5" == -5)
    "#,
    );
}

#[test]
fn bitwise_requires_integer_representation() {
    check(
        r#"
        assert(0xF0 & 0x0F == 0)
        assert(0xF0 | 0x0F == 0xFF)
        assert(5 ~ 3 == 6)
        assert(~0 == -1)
        assert(1 << 4 == 16)
        assert(256 >> 4 == 16)
        assert(1 << 64 == 0)
        assert(-1 >> 1 == 0x7FFFFFFFFFFFFFFF)
        assert(3.0 & 1 == 1)  -- exact float converts
    "#,
    );
    let err = check_fails("return 1.5 & 1");
    assert_eq!(err.kind, ErrorKind::ArithError);
    assert!(err.message.contains("no integer representation"));
}

#[test]
fn comparison_rules() {
    check(
        r#"
        assert(1 < 2)
        assert(1 < 1.5)
        assert(2 > 1.5)
        assert(1 <= 1.0)
        assert("a" < "b")
        assert("abc" < "abd")
        assert("Z" < "a")  -- byte order
        assert(not (1 < 0/0))
        assert(not (0/0 <= 1))
        assert(math.maxinteger < math.huge)
        assert(-math.huge < math.mininteger)
    "#,
    );
    let err = check_fails("return 1 < 'x'");
    assert_eq!(err.kind, ErrorKind::TypeError);
}

#[test]
fn equality_rules() {
    check(
        r#"
        assert(1 == 1.0)
        assert("1" ~= 1)
        assert(nil == nil)
        assert(nil ~= false)
        local t = {}
        assert(t == t)
        assert({} ~= {})
    "#,
    );
}

#[test]
fn concatenation() {
    check(
        r#"
        assert("a" .. "b" == "ab")
        assert("n=" .. 5 == "n=5")
        assert(1 .. 2 == "12")
        assert("x" .. 1.5 == "x1.5")
        assert("v" .. 3.0 == "v3")
        -- right associative
        assert("a" .. "b" .. "c" == "abc")
    "#,
    );
    let err = check_fails("return 'a' .. {}");
    assert_eq!(err.kind, ErrorKind::TypeError);
    assert!(err.message.contains("concatenate"));
}

#[test]
fn length_operator() {
    check(
        r#"
        assert(#"" == 0)
        assert(#"abc" == 3)
        assert(#{} == 0)
        assert(#{1, 2, 3} == 3)
        local t = {1, 2, 3}
        t[5] = 5  -- 3 is still a border
        assert(#t == 3 or #t == 5)
    "#,
    );
    let err = check_fails("return #42");
    assert_eq!(err.kind, ErrorKind::TypeError);
}

#[test]
fn short_circuit_and_or() {
    check(
        r#"
        local hits = 0
        local function bump(v) hits = hits + 1; return v end
        assert((false and bump(true)) == false)
        assert(hits == 0)
        assert((true or bump(true)) == true)
        assert(hits == 0)
        assert((nil or "fallback") == "fallback")
        assert((1 and 2) == 2)
        -- 0 and "" are truthy
        assert((0 and "yes") == "yes")
        assert(("" and "yes") == "yes")
    "#,
    );
}

#[test]
fn unary_minus() {
    check(
        r#"
        assert(-(5) == -5)
        assert(-(-5) == 5)
        assert(-(2.5) == -2.5)
        assert(math.type(-5) == "integer")
    "#,
    );
}
