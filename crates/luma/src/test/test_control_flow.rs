// Control flow: conditionals, loops, numeric/generic for, goto, break,
// multi-value plumbing.

use super::{check, check_fails};
use crate::ErrorKind;

#[test]
fn if_elseif_else() {
    check(
        r#"
        local function classify(n)
            if n < 0 then return "neg"
            elseif n == 0 then return "zero"
            else return "pos" end
        end
        assert(classify(-1) == "neg")
        assert(classify(0) == "zero")
        assert(classify(9) == "pos")
    "#,
    );
}

#[test]
fn while_and_repeat() {
    check(
        r#"
        local n, sum = 0, 0
        while n < 5 do n = n + 1; sum = sum + n end
        assert(sum == 15)

        local c = 0
        repeat c = c + 1 until c >= 3
        assert(c == 3)

        -- until sees the body's locals
        local tries = 0
        repeat
            tries = tries + 1
            local done = tries == 2
        until done
        assert(tries == 2)
    "#,
    );
}

#[test]
fn numeric_for_integer() {
    check(
        r#"
        local sum = 0
        for i = 1, 5 do sum = sum + i end
        assert(sum == 15)

        local down = {}
        for i = 3, 1, -1 do down[#down + 1] = i end
        assert(down[1] == 3 and down[3] == 1)

        -- loop expressions evaluate once
        local evals = 0
        local function limit() evals = evals + 1; return 3 end
        for i = 1, limit() do end
        assert(evals == 1)

        -- zero iterations
        local ran = false
        for i = 2, 1 do ran = true end
        assert(not ran)
    "#,
    );
}

#[test]
fn numeric_for_float_step() {
    // Integral floats render without a trailing ".0".
    check(
        r#"
        local out = {}
        for i = 1, 3, 0.5 do out[#out + 1] = tostring(i) end
        assert(table.concat(out, "\n") == "1\n1.5\n2\n2.5\n3")
        -- any float operand converts the control variable to float
        for i = 1, 2, 1.0 do assert(math.type(i) == "float") end
    "#,
    );
}

#[test]
fn numeric_for_step_zero_is_error() {
    let err = check_fails("for i = 1, 3, 0 do end");
    assert_eq!(err.kind, ErrorKind::ArithError);
    assert!(err.message.contains("'for' step is zero"));
}

#[test]
fn numeric_for_integer_overflow_terminates() {
    check(
        r#"
        local n = 0
        for i = math.maxinteger - 2, math.maxinteger do n = n + 1 end
        assert(n == 3)
    "#,
    );
}

#[test]
fn generic_for_iterates() {
    check(
        r#"
        local function range(n)
            local i = 0
            return function()
                i = i + 1
                if i <= n then return i, i * i end
            end
        end
        local keys, squares = 0, 0
        for i, sq in range(4) do
            keys = keys + i
            squares = squares + sq
        end
        assert(keys == 10)
        assert(squares == 30)
    "#,
    );
}

#[test]
fn generic_for_stateless_iterator() {
    check(
        r#"
        local function iter(state, ctrl)
            if ctrl < state then return ctrl + 1 end
        end
        local total = 0
        for i in iter, 5, 0 do total = total + i end
        assert(total == 15)
    "#,
    );
}

#[test]
fn generic_for_closing_value() {
    check(
        r#"
        local closed = false
        local closer = setmetatable({}, { __close = function() closed = true end })
        local function iter(_, ctrl)
            if ctrl < 2 then return ctrl + 1 end
        end
        for i in iter, nil, 0, closer do end
        assert(closed)
    "#,
    );
}

#[test]
fn break_exits_innermost_loop() {
    check(
        r#"
        local log = {}
        for i = 1, 3 do
            for j = 1, 10 do
                if j == 2 then break end
                log[#log + 1] = i .. ":" .. j
            end
        end
        assert(#log == 3)
        assert(log[1] == "1:1" and log[3] == "3:1")
    "#,
    );
}

#[test]
fn goto_forward_and_backward() {
    check(
        r#"
        -- continue idiom
        local evens = {}
        for i = 1, 6 do
            if i % 2 == 1 then goto continue end
            evens[#evens + 1] = i
            ::continue::
        end
        assert(#evens == 3 and evens[3] == 6)

        -- backward jump
        local n = 0
        ::again::
        n = n + 1
        if n < 3 then goto again end
        assert(n == 3)
    "#,
    );
}

#[test]
fn goto_out_of_nested_blocks() {
    check(
        r#"
        local reached = false
        do
            do
                goto out
            end
        end
        error("unreachable")
        ::out::
        reached = true
        assert(reached)
    "#,
    );
}

#[test]
fn multi_value_spreading() {
    check(
        r##"
        local function mv() return 1, 2, 3 end
        local a, b, c = mv()
        assert(a == 1 and b == 2 and c == 3)

        -- only the last expression spreads
        local x, y, z = mv(), 10
        assert(x == 1 and y == 10 and z == nil)

        -- parentheses truncate
        assert((mv()) == 1)
        assert(select("#", (mv())) == 1)

        -- table constructors spread the trailing call
        local t = {mv()}
        assert(#t == 3)
        local u = {mv(), 10}
        assert(#u == 2)

        -- returns spread
        local function fwd() return mv() end
        assert(select("#", fwd()) == 3)
    "##,
    );
}

#[test]
fn assignment_evaluates_rhs_first() {
    check(
        r#"
        local a, b = 1, 2
        a, b = b, a
        assert(a == 2 and b == 1)

        -- index target prefix evaluates once
        local count = 0
        local t = {}
        local function pick() count = count + 1; return t end
        pick().x = 5
        assert(count == 1 and t.x == 5)

        -- multiple assignment pads with nil
        local p, q = 1
        assert(p == 1 and q == nil)
    "#,
    );
}

#[test]
fn vararg_propagation() {
    check(
        r##"
        local function count(...) return select("#", ...) end
        assert(count() == 0)
        assert(count(nil) == 1)
        assert(count(1, 2, 3) == 3)

        local function first(...) return (...) end
        assert(first(7, 8) == 7)

        local function pack_tail(...) return {...} end
        assert(#pack_tail(1, 2) == 2)
    "##,
    );
}
