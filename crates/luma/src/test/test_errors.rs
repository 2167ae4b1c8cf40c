// Errors, protected calls, tracebacks.

use super::{check, check_fails, run};
use crate::ErrorKind;

#[test]
fn pcall_catches_and_reports() {
    check(
        r#"
        local ok, err = pcall(function() error("boom") end)
        assert(ok == false)
        assert(type(err) == "string")
        -- level 1 prefixes the caller's position
        assert(err:sub(-4) == "boom")
        assert(#err > 4)

        local ok2, a, b = pcall(function() return 1, 2 end)
        assert(ok2 == true and a == 1 and b == 2)
    "#,
    );
}

#[test]
fn error_values_are_first_class() {
    // Error objects survive pcall untouched.
    check(
        r#"
        local ok, err = pcall(function() error({code = 7}) end)
        assert(ok == false)
        assert(type(err) == "table")
        assert(err.code == 7)
    "#,
    );
}

#[test]
fn error_level_zero_keeps_message_verbatim() {
    check(
        r#"
        local ok, err = pcall(function() error("plain", 0) end)
        assert(err == "plain")
    "#,
    );
}

#[test]
fn xpcall_routes_through_handler() {
    check(
        r#"
        local ok, out = xpcall(function() error("inner") end, function(e)
            return "handled:" .. e:sub(-5)
        end)
        assert(ok == false)
        assert(out == "handled:inner")

        local ok2, v = xpcall(function() return "fine" end, error)
        assert(ok2 == true and v == "fine")
    "#,
    );
}

#[test]
fn nested_pcall_layers() {
    check(
        r#"
        local ok = pcall(function()
            local inner_ok, inner_err = pcall(error, "deep")
            assert(inner_ok == false)
            error("outer")
        end)
        assert(ok == false)
    "#,
    );
}

#[test]
fn uncaught_error_reaches_host() {
    let err = check_fails("error('top level')");
    assert_eq!(err.kind, ErrorKind::RuntimeError);
    assert!(err.message.ends_with("top level"));
    assert!(!err.trace.is_empty());
}

#[test]
fn runtime_error_kinds() {
    assert_eq!(check_fails("return nil + 1").kind, ErrorKind::ArithError);
    assert_eq!(check_fails("local x = nil; return x.y").kind, ErrorKind::IndexError);
    assert_eq!(check_fails("local x = 5; x()").kind, ErrorKind::CallError);
    assert_eq!(check_fails("return {} < {}").kind, ErrorKind::TypeError);
    assert_eq!(check_fails("local t = {} t[nil] = 1").kind, ErrorKind::IndexError);
    assert_eq!(check_fails("local t = {} t[0/0] = 1").kind, ErrorKind::IndexError);
}

#[test]
fn const_violation() {
    let err = check_fails("local x <const> = 5  x = 6");
    assert_eq!(err.kind, ErrorKind::ConstViolation);
    assert!(err.message.contains("attempt to assign to const variable 'x'"));
    // the value is still readable afterwards
    check(
        r#"
        local x <const> = 5
        local ok = pcall(function() x = 6 end)
        assert(ok == false)
        assert(x == 5)
    "#,
    );
}

#[test]
fn stack_overflow_is_caught() {
    check(
        r#"
        local function dive() return dive() end
        local ok, err = pcall(dive)
        assert(ok == false)
        assert(err:sub(-14) == "stack overflow")
    "#,
    );
}

#[test]
fn traceback_folds_recursion() {
    let err = check_fails(
        r#"
        local function rec(n)
            if n == 0 then error("bottom") end
            return rec(n - 1)
        end
        rec(40)
    "#,
    );
    assert!(err.trace.len() <= 12);
    let folded = err
        .trace
        .iter()
        .any(|l| l.contains("repeated") || l.contains("more frames"));
    assert!(folded, "trace should fold or cap: {:?}", err.trace);
}

#[test]
fn errors_in_handlers_propagate() {
    check(
        r#"
        local ok = pcall(function()
            xpcall(function() error("a") end, function() error("b") end)
        end)
        assert(ok == false)
    "#,
    );
}
