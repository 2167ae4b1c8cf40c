// Coroutines: the resume/yield protocol, status machine, wrap, close.

use super::{check, run};

#[test]
fn ping_pong_round_trip() {
    // Values flow through yield in both directions.
    check(
        r#"
        local co = coroutine.create(function(a)
            local b = coroutine.yield(a + 1)
            return b * 2
        end)
        local ok1, v1 = coroutine.resume(co, 10)
        assert(ok1 == true and v1 == 11)
        local ok2, v2 = coroutine.resume(co, 5)
        assert(ok2 == true and v2 == 10)
        assert(coroutine.status(co) == "dead")
    "#,
    );
}

#[test]
fn multiple_yield_values() {
    check(
        r#"
        local co = coroutine.create(function()
            local x, y = coroutine.yield(1, 2)
            return x + y
        end)
        local ok, a, b = coroutine.resume(co)
        assert(ok and a == 1 and b == 2)
        local ok2, sum = coroutine.resume(co, 30, 12)
        assert(ok2 and sum == 42)
    "#,
    );
}

#[test]
fn status_transitions() {
    check(
        r#"
        local inner_status
        local co
        co = coroutine.create(function()
            inner_status = coroutine.status(co)
            coroutine.yield()
        end)
        assert(coroutine.status(co) == "suspended")
        coroutine.resume(co)
        assert(inner_status == "running")
        assert(coroutine.status(co) == "suspended")
        coroutine.resume(co)
        assert(coroutine.status(co) == "dead")
    "#,
    );
}

#[test]
fn nested_coroutines_mark_caller_normal() {
    check(
        r#"
        local outer, inner
        local observed
        inner = coroutine.create(function()
            observed = coroutine.status(outer)
            coroutine.yield()
        end)
        outer = coroutine.create(function()
            coroutine.resume(inner)
        end)
        coroutine.resume(outer)
        assert(observed == "normal")
    "#,
    );
}

#[test]
fn resume_dead_or_running_fails_cleanly() {
    check(
        r#"
        local co = coroutine.create(function() end)
        coroutine.resume(co)
        local ok, msg = coroutine.resume(co)
        assert(ok == false)
        assert(msg:sub(-14) == "dead coroutine")

        local self_resume
        local co2
        co2 = coroutine.create(function()
            self_resume = {coroutine.resume(co2)}
        end)
        coroutine.resume(co2)
        assert(self_resume[1] == false)
    "#,
    );
}

#[test]
fn yield_from_main_is_an_error() {
    check(
        r#"
        local ok, err = pcall(coroutine.yield)
        assert(ok == false)
        assert(err:sub(-30) == "yield from outside a coroutine")
    "#,
    );
}

#[test]
fn errors_cross_resume_boundary() {
    check(
        r#"
        local co = coroutine.create(function() error("inside") end)
        local ok, err = coroutine.resume(co)
        assert(ok == false)
        assert(err:sub(-6) == "inside")
        assert(coroutine.status(co) == "dead")
    "#,
    );
}

#[test]
fn pcall_is_yieldable() {
    check(
        r#"
        local co = coroutine.create(function()
            local ok, v = pcall(function()
                return coroutine.yield("mid") .. "!"
            end)
            return ok, v
        end)
        local _, y = coroutine.resume(co)
        assert(y == "mid")
        local _, ok, v = coroutine.resume(co, "back")
        assert(ok == true and v == "back!")
    "#,
    );
}

#[test]
fn wrap_resumes_and_reraises() {
    check(
        r#"
        local gen = coroutine.wrap(function(a)
            local b = coroutine.yield(a * 2)
            return b + 1
        end)
        assert(gen(21) == 42)
        assert(gen(9) == 10)

        local boom = coroutine.wrap(function() error("wrapped") end)
        local ok, err = pcall(boom)
        assert(ok == false)
        assert(err:sub(-7) == "wrapped")
    "#,
    );
}

#[test]
fn close_runs_pending_closers() {
    check(
        r#"
        local closed = false
        local co = coroutine.create(function()
            local x <close> = setmetatable({}, {__close = function() closed = true end})
            coroutine.yield()
            error("never reached")
        end)
        coroutine.resume(co)
        assert(coroutine.status(co) == "suspended")
        local ok = coroutine.close(co)
        assert(ok == true)
        assert(closed == true)
        assert(coroutine.status(co) == "dead")
    "#,
    );
}

#[test]
fn close_bypasses_pcall() {
    check(
        r#"
        local caught = false
        local co = coroutine.create(function()
            pcall(function()
                coroutine.yield()
            end)
            -- only reached if the teardown was wrongly caught by pcall
            caught = true
        end)
        coroutine.resume(co)
        coroutine.close(co)
        assert(caught == false)
        assert(coroutine.status(co) == "dead")
    "#,
    );
}

#[test]
fn close_reports_closer_errors() {
    check(
        r#"
        local co = coroutine.create(function()
            local x <close> = setmetatable({}, {__close = function() error("teardown") end})
            coroutine.yield()
        end)
        coroutine.resume(co)
        local ok, err = coroutine.close(co)
        assert(ok == false)
        assert(err:sub(-8) == "teardown")
    "#,
    );
}

#[test]
fn close_unstarted_coroutine() {
    check(
        r#"
        local co = coroutine.create(function() error("no") end)
        assert(coroutine.close(co) == true)
        assert(coroutine.status(co) == "dead")
    "#,
    );
}

#[test]
fn isyieldable_and_running() {
    check(
        r#"
        assert(coroutine.isyieldable() == false)
        local main_co, is_main = coroutine.running()
        assert(main_co == nil and is_main == true)
        local co = coroutine.create(function()
            assert(coroutine.isyieldable() == true)
            local me, main = coroutine.running()
            assert(main == false)
            return me
        end)
        local ok, me = coroutine.resume(co)
        assert(ok and me == co)
    "#,
    );
}

#[test]
fn deterministic_value_ordering_across_switches() {
    check(
        r#"
        local log = {}
        local producer = coroutine.create(function()
            for i = 1, 3 do
                log[#log + 1] = "produce" .. i
                coroutine.yield(i)
            end
        end)
        for _ = 1, 3 do
            local _, v = coroutine.resume(producer)
            log[#log + 1] = "consume" .. v
        end
        assert(table.concat(log, ",") ==
            "produce1,consume1,produce2,consume2,produce3,consume3")
    "#,
    );
}

#[test]
fn many_coroutines_on_one_thread() {
    let values = run(
        r#"
        local total = 0
        local cos = {}
        for i = 1, 20 do
            cos[i] = coroutine.create(function()
                local acc = 0
                for j = 1, 5 do
                    acc = acc + coroutine.yield()
                end
                return acc
            end)
            coroutine.resume(cos[i])
        end
        for round = 1, 5 do
            for i = 1, 20 do
                local ok, acc = coroutine.resume(cos[i], round)
                if round == 5 then total = total + acc end
            end
        end
        return total
    "#,
    )
    .unwrap();
    assert!(matches!(values[0], crate::Value::Int(300)));
}
