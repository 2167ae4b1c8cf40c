// Basic library behavior.

use super::{check, check_fails, run};
use crate::Value;

#[test]
fn type_names() {
    check(
        r#"
        assert(type(nil) == "nil")
        assert(type(true) == "boolean")
        assert(type(42) == "number")
        assert(type(3.14) == "number")
        assert(type("hello") == "string")
        assert(type({}) == "table")
        assert(type(print) == "function")
        assert(type(coroutine.create(function() end)) == "thread")
    "#,
    );
}

#[test]
fn tostring_basics() {
    check(
        r#"
        assert(tostring(123) == "123")
        assert(tostring(1.5) == "1.5")
        assert(tostring(3.0) == "3")
        assert(tostring(true) == "true")
        assert(tostring(nil) == "nil")
        local s = tostring({})
        assert(type(s) == "string")
    "#,
    );
}

#[test]
fn tonumber_basics() {
    check(
        r#"
        assert(tonumber("123") == 123)
        assert(tonumber("3.5") == 3.5)
        assert(tonumber("0x10") == 16)
        assert(tonumber("  7  ") == 7)
        assert(tonumber("FF", 16) == 255)
        assert(tonumber("+FF", 16) == 255)
        assert(tonumber("-10", 16) == -16)
        assert(tonumber("z", 36) == 35)
        -- a bare sign carries no digits
        assert(tonumber("-", 16) == nil)
        assert(tonumber("+", 16) == nil)
        assert(tonumber("invalid") == nil)
        assert(tonumber(42) == 42)
        assert(tonumber({}) == nil)
    "#,
    );
}

#[test]
fn select_counts_and_slices() {
    check(
        r##"
        local function three() return "a", "b", "c" end
        assert(select("#", three()) == 3)
        assert(select("#") == 0)
        assert(select(2, three()) == "b")
        local x, y = select(2, three())
        assert(x == "b" and y == "c")
        assert(select(-1, three()) == "c")
    "##,
    );
}

#[test]
fn assert_passes_values_through() {
    check(
        r#"
        local a, b = assert(1, 2)
        assert(a == 1 and b == 2)
    "#,
    );
    let err = check_fails("assert(false, 'custom message')");
    assert_eq!(err.message, "custom message");
}

#[test]
fn rawget_rawset_bypass_metamethods() {
    check(
        r#"
        local t = setmetatable({}, {
            __index = function() return "shadow" end,
            __newindex = function() error("blocked") end,
        })
        assert(t.missing == "shadow")
        assert(rawget(t, "missing") == nil)
        rawset(t, "k", 1)
        assert(rawget(t, "k") == 1)
    "#,
    );
}

#[test]
fn rawequal_and_rawlen() {
    check(
        r#"
        local t = setmetatable({1, 2}, {
            __eq = function() return true end,
            __len = function() return 99 end,
        })
        local u = setmetatable({}, getmetatable(t))
        assert(t == u)
        assert(not rawequal(t, u))
        assert(rawequal(t, t))
        assert(#t == 99)
        assert(rawlen(t) == 2)
        assert(rawlen("abc") == 3)
    "#,
    );
}

#[test]
fn next_iterates_everything() {
    check(
        r#"
        local t = {10, 20, x = 30}
        local seen = 0
        local k, v = next(t, nil)
        while k ~= nil do
            seen = seen + 1
            k, v = next(t, k)
        end
        assert(seen == 3)
        assert(next({}) == nil)
    "#,
    );
}

#[test]
fn pairs_and_ipairs() {
    check(
        r#"
        local t = {2, 4, 6, stop = true}
        local sum = 0
        for i, v in ipairs(t) do sum = sum + i * v end
        assert(sum == 2 + 8 + 18)
        local count = 0
        for _ in pairs(t) do count = count + 1 end
        assert(count == 4)
    "#,
    );
}

#[test]
fn pairs_metamethod_wins() {
    check(
        r#"
        local t = setmetatable({}, {
            __pairs = function(self)
                local n = 0
                return function()
                    n = n + 1
                    if n <= 2 then return n, n * 10 end
                end, self, nil
            end,
        })
        local total = 0
        for k, v in pairs(t) do total = total + v end
        assert(total == 30)
    "#,
    );
}

#[test]
fn chunk_returns_values_to_host() {
    let values = run("return 1, 'two', 3.5").unwrap();
    assert!(matches!(values[0], Value::Int(1)));
    assert!(matches!(values[2], Value::Float(f) if f == 3.5));
    assert_eq!(values.len(), 3);
}

#[test]
fn version_global_is_set() {
    check(r#"assert(type(_VERSION) == "string")"#);
}
