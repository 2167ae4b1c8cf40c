// Closures and binding capture.

use super::check;

#[test]
fn closures_share_bindings_by_reference() {
    check(
        r#"
        local x = 1
        local f = function() return x end
        x = 2
        assert(f() == 2)
    "#,
    );
}

#[test]
fn two_closures_one_binding() {
    check(
        r#"
        local function make()
            local n = 0
            return function() n = n + 1; return n end,
                   function() return n end
        end
        local bump, read = make()
        bump(); bump()
        assert(read() == 2)
        -- a second pair gets fresh state
        local bump2, read2 = make()
        assert(read2() == 0)
        assert(read() == 2)
    "#,
    );
}

#[test]
fn loop_variable_captured_per_iteration() {
    check(
        r#"
        local fs = {}
        for i = 1, 3 do fs[i] = function() return i end end
        assert(fs[1]() == 1)
        assert(fs[2]() == 2)
        assert(fs[3]() == 3)
    "#,
    );
}

#[test]
fn generic_for_variable_captured_per_iteration() {
    check(
        r#"
        local fs = {}
        for _, v in ipairs({"a", "b"}) do
            fs[#fs + 1] = function() return v end
        end
        assert(fs[1]() == "a")
        assert(fs[2]() == "b")
    "#,
    );
}

#[test]
fn bindings_outlive_their_frame() {
    check(
        r#"
        local f
        do
            local hidden = "captured"
            f = function() return hidden end
        end
        assert(f() == "captured")
    "#,
    );
}

#[test]
fn local_function_sees_itself() {
    check(
        r#"
        local function fact(n)
            if n <= 1 then return 1 end
            return n * fact(n - 1)
        end
        assert(fact(5) == 120)
    "#,
    );
}

#[test]
fn inner_frames_shadow_without_clobbering() {
    check(
        r#"
        local x = "outer"
        local f = function() return x end
        do
            local x = "inner"
            assert(x == "inner")
        end
        assert(f() == "outer")
        assert(x == "outer")
    "#,
    );
}

#[test]
fn assignment_without_declaration_is_global() {
    check(
        r#"
        local function set() implicit_global = 42 end
        set()
        assert(implicit_global == 42)
    "#,
    );
}
