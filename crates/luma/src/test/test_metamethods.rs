// Metatable dispatch.

use super::{check, check_fails};
use crate::ErrorKind;

#[test]
fn index_function_fallback() {
    // An __index function computes missing keys; rawget stays raw.
    check(
        r#"
        local t = setmetatable({}, {__index = function(_, k) return "k:" .. k end})
        assert(t.foo == "k:foo")
        assert(rawget(t, "foo") == nil)
        t.foo = "present"
        assert(t.foo == "present")
    "#,
    );
}

#[test]
fn index_table_chain() {
    check(
        r#"
        local base = {greet = "hello"}
        local mid = setmetatable({extra = 1}, {__index = base})
        local leaf = setmetatable({}, {__index = mid})
        assert(leaf.greet == "hello")
        assert(leaf.extra == 1)
        assert(leaf.absent == nil)
    "#,
    );
}

#[test]
fn index_chain_loop_detected() {
    let err = check_fails(
        r#"
        local a = {}
        local b = {}
        setmetatable(a, {__index = b})
        setmetatable(b, {__index = a})
        return a.missing
    "#,
    );
    assert_eq!(err.kind, ErrorKind::IndexError);
    assert!(err.message.contains("gettable"));
}

#[test]
fn newindex_function_and_table() {
    check(
        r#"
        local log = {}
        local t = setmetatable({}, {
            __newindex = function(t, k, v) log[#log + 1] = k .. "=" .. v end,
        })
        t.a = 1
        t.b = 2
        assert(rawget(t, "a") == nil)
        assert(#log == 2 and log[1] == "a=1")

        -- __newindex table redirects the store
        local store = {}
        local proxy = setmetatable({}, {__newindex = store})
        proxy.x = 9
        assert(store.x == 9)
        assert(rawget(proxy, "x") == nil)

        -- existing keys assign raw, without the metamethod
        rawset(proxy, "y", 1)
        proxy.y = 2
        assert(rawget(proxy, "y") == 2)
        assert(store.y == nil)
    "#,
    );
}

#[test]
fn arithmetic_metamethods() {
    check(
        r#"
        local mt = {}
        mt.__add = function(a, b) return "add" end
        mt.__mul = function(a, b) return "mul" end
        mt.__unm = function(a) return "unm" end
        local v = setmetatable({}, mt)
        assert(v + 1 == "add")
        assert(1 + v == "add")   -- right operand consulted
        assert(v * v == "mul")
        assert(-v == "unm")
    "#,
    );
    let err = check_fails("return {} + 1");
    assert_eq!(err.kind, ErrorKind::ArithError);
}

#[test]
fn comparison_metamethods() {
    check(
        r#"
        local mt = {
            __lt = function(a, b) return a.rank < b.rank end,
            __le = function(a, b) return a.rank <= b.rank end,
        }
        local lo = setmetatable({rank = 1}, mt)
        local hi = setmetatable({rank = 2}, mt)
        assert(lo < hi)
        assert(lo <= hi)
        assert(hi > lo)   -- swapped operands reuse __lt
        assert(not (hi <= lo))
    "#,
    );
}

#[test]
fn eq_metamethod_requires_same_kind() {
    check(
        r#"
        local mt = {__eq = function() return true end}
        local a = setmetatable({}, mt)
        local b = setmetatable({}, mt)
        assert(a == b)
        assert(a ~= 1)         -- never consulted across kinds
        assert(a ~= "table")
    "#,
    );
}

#[test]
fn concat_and_len_metamethods() {
    check(
        r#"
        local v = setmetatable({}, {
            __concat = function(a, b) return "joined" end,
            __len = function() return 7 end,
        })
        assert(v .. "x" == "joined")
        assert("x" .. v == "joined")
        assert(#v == 7)
    "#,
    );
}

#[test]
fn call_metamethod() {
    check(
        r#"
        local callable = setmetatable({}, {
            __call = function(self, a, b) return a + b end,
        })
        assert(callable(2, 3) == 5)
    "#,
    );
    let err = check_fails("local t = {} t(1)");
    assert_eq!(err.kind, ErrorKind::CallError);
    assert!(err.message.contains("attempt to call a table value"));
}

#[test]
fn tostring_metamethod() {
    check(
        r#"
        local v = setmetatable({}, {__tostring = function() return "custom" end})
        assert(tostring(v) == "custom")
    "#,
    );
}

#[test]
fn metatable_protection() {
    check(
        r#"
        local t = setmetatable({}, {__metatable = "locked"})
        assert(getmetatable(t) == "locked")
        local ok, err = pcall(setmetatable, t, {})
        assert(ok == false)
    "#,
    );
}

#[test]
fn string_methods_via_shared_metatable() {
    check(
        r#"
        assert(("hello"):upper() == "HELLO")
        assert(("hello"):len() == 5)
        assert(("hello"):sub(2, 3) == "el")
        assert(string.rep("ab", 3, "-") == "ab-ab-ab")
    "#,
    );
}

#[test]
fn string_format_precision_counts_bytes() {
    check(
        r#"
        assert(string.format("%.2s", "hello") == "he")
        assert(string.format("%.8s", "hi") == "hi")
        -- precision may split a multi-byte sequence; no error
        local cut = string.format("%.1s", "\xC3\xA9")
        assert(#cut >= 1)
        assert(string.format("%5d", 42) == "   42")
        assert(string.format("%-5d|", 42) == "42   |")
        assert(string.format("%05d", -42) == "-0042")
        assert(string.format("%x", 255) == "ff")
        assert(string.format("%.3f", 1.5) == "1.500")
        assert(string.format("%q", 'a"b') == '"a\\"b"')
    "#,
    );
}
