// Garbage collector: weak tables, ephemerons, finalizers, generations.

use super::{check, rt};
use crate::Value;

#[test]
fn weak_values_are_cleared_by_major_cycle() {
    check(
        r#"
        local cache = setmetatable({}, {__mode = "v"})
        cache.alive = {}
        cache.dead = {}
        local keep = cache.alive
        collectgarbage("collect")
        assert(cache.alive == keep)
        assert(cache.dead == nil)
    "#,
    );
}

#[test]
fn weak_entries_survive_minor_cycles() {
    check(
        r#"
        local cache = setmetatable({}, {__mode = "v"})
        cache.entry = {}
        collectgarbage("step")
        -- clearing is observable only after a major cycle
        assert(cache.entry ~= nil)
        collectgarbage("collect")
        assert(cache.entry == nil)
    "#,
    );
}

#[test]
fn weak_keys_keep_strongly_held_entries() {
    check(
        r#"
        local registry = setmetatable({}, {__mode = "k"})
        local key = {}
        registry[key] = "payload"
        registry[{}] = "orphan"
        collectgarbage("collect")
        assert(registry[key] == "payload")
        local count = 0
        for _ in pairs(registry) do count = count + 1 end
        assert(count == 1)
    "#,
    );
}

#[test]
fn ephemeron_value_does_not_keep_its_own_key() {
    check(
        r#"
        local t = setmetatable({}, {__mode = "k"})
        do
            local k = {}
            -- the value references the key; without ephemeron handling this
            -- cycle would keep the entry alive forever
            t[k] = {self_key = k}
        end
        collectgarbage("collect")
        assert(next(t) == nil)
    "#,
    );
}

#[test]
fn ephemeron_chain_converges() {
    check(
        r#"
        local t = setmetatable({}, {__mode = "k"})
        local k1 = {}
        local k2 = {}
        -- k1's value holds k2, whose entry must then survive too
        t[k1] = k2
        t[k2] = "chained"
        k2 = nil
        collectgarbage("collect")
        assert(t[k1] ~= nil)
        assert(t[t[k1]] == "chained")
    "#,
    );
}

#[test]
fn all_weak_tables_clear_either_side() {
    check(
        r#"
        local t = setmetatable({}, {__mode = "kv"})
        local key = {}
        t[key] = {}
        t[{}] = key
        collectgarbage("collect")
        local count = 0
        for _ in pairs(t) do count = count + 1 end
        assert(count == 0)
    "#,
    );
}

#[test]
fn finalizer_runs_once() {
    check(
        r#"
        local runs = 0
        do
            local obj = setmetatable({}, {__gc = function() runs = runs + 1 end})
        end
        collectgarbage("collect")
        assert(runs == 1)
        collectgarbage("collect")
        collectgarbage("collect")
        assert(runs == 1)
    "#,
    );
}

#[test]
fn finalizer_sees_intact_object() {
    check(
        r#"
        local observed
        do
            local obj = setmetatable({payload = "still here"}, {
                __gc = function(self) observed = self.payload end,
            })
        end
        collectgarbage("collect")
        assert(observed == "still here")
    "#,
    );
}

#[test]
fn finalizer_can_resurrect() {
    check(
        r#"
        local limbo
        do
            local obj = setmetatable({}, {__gc = function(self) limbo = self end})
        end
        collectgarbage("collect")
        assert(type(limbo) == "table")
        -- resurrected objects are not finalized again
        local saved = limbo
        limbo = nil
        collectgarbage("collect")
        assert(limbo == nil)
        assert(type(saved) == "table")
    "#,
    );
}

#[test]
fn finalizer_errors_are_swallowed() {
    check(
        r#"
        do
            local obj = setmetatable({}, {__gc = function() error("in finalizer") end})
        end
        collectgarbage("collect")
        -- the mutator continues untroubled
        assert(true)
    "#,
    );
}

#[test]
fn collectgarbage_controls() {
    check(
        r#"
        assert(collectgarbage("isrunning") == true)
        collectgarbage("stop")
        assert(collectgarbage("isrunning") == false)
        collectgarbage("restart")
        assert(collectgarbage("isrunning") == true)
        assert(type(collectgarbage("count")) == "number")
        collectgarbage("step", 2)
        collectgarbage("generational", 150, 500)
    "#,
    );
}

#[test]
fn mass_allocation_survives_automatic_collection() {
    check(
        r#"
        local keep = {}
        for i = 1, 2000 do
            local t = {i, tostring(i), nested = {i}}
            if i % 100 == 0 then keep[#keep + 1] = t end
        end
        assert(#keep == 20)
        for i, t in ipairs(keep) do
            assert(t[1] == i * 100)
            assert(t.nested[1] == i * 100)
            assert(t[2] == tostring(i * 100))
        end
    "#,
    );
}

#[test]
fn survivors_are_promoted() {
    let rt = rt();
    rt.evaluate("keepers = {} for i = 1, 50 do keepers[i] = {i} end", None)
        .unwrap();
    rt.gc_step(1);
    let promoted = rt.state.gc.borrow().stats.objects_promoted;
    assert!(promoted > 0, "minor survivors should move to the old gen");
    rt.gc_step(1);
    // Strings interned by the runtime survive too; just check stats move.
    let stats = rt.state.gc.borrow().stats.clone();
    assert!(stats.minor_collections >= 2);
}

#[test]
fn unreachable_cycles_are_collected() {
    let rt = rt();
    rt.evaluate(
        r#"
        do
            local a, b = {}, {}
            a.peer = b
            b.peer = a
        end
        "#,
        None,
    )
    .unwrap();
    let before = rt.state.heap.borrow().tables.len();
    rt.gc_collect();
    let after = rt.state.heap.borrow().tables.len();
    assert!(after < before, "cycle should be collected: {} -> {}", before, after);
}

#[test]
fn coroutine_objects_are_collected() {
    let rt = rt();
    rt.evaluate(
        r#"
        for i = 1, 5 do
            local co = coroutine.create(function() return i end)
            coroutine.resume(co)
        end
        "#,
        None,
    )
    .unwrap();
    let before = rt.state.heap.borrow().coroutines.len();
    assert!(before >= 1);
    rt.gc_collect();
    let after = rt.state.heap.borrow().coroutines.len();
    assert_eq!(after, 0);
}

#[test]
fn host_roots_survive_collection() {
    let rt = rt();
    let table = rt.new_table();
    rt.define_global("host_table", Value::Table(table));
    let marker = rt.str_value("host marker string payload");
    rt.raw_set(table, Value::Int(1), marker).unwrap();
    rt.gc_collect();
    rt.gc_collect();
    let values = rt
        .evaluate("return host_table[1]", None)
        .unwrap();
    assert!(matches!(values[0], Value::Str(_)));
    let Value::Str(id) = values[0] else { unreachable!() };
    assert_eq!(rt.string_text(id), "host marker string payload");
}
