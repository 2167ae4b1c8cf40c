// Generational garbage collector.
//
// Two generations. Minor collections mark the young generation from the
// roots plus, conservatively, every old object; treating the old generation
// as roots removes the need for a write barrier. Survivors are promoted.
// Major collections mark everything from the true roots, converge ephemerons
// (weak-keys tables), clear weak entries, separate finalizable objects for
// resurrection, sweep, and only then run `__gc` finalizers inside protected
// calls.
//
// Collections run inline at allocation checkpoints while the mutator is
// paused; the scheduler is credit-based (fixed overhead per object plus
// per-entry costs).

mod heap;

pub use heap::{
    BindingId, CoroutineId, FunctionId, GcBox, GcHeader, GcId, Heap, ScopeId, SlotVec, StringId,
    TableId, UserdataId,
};

use crate::runtime::{MetaEvent, Runtime};
use crate::value::{Value, WeakMode};
use tracing::{debug, error, warn};

/// Rounds of ephemeron propagation tolerated before a major collection is
/// declared failed and abandoned.
const EPHEMERON_ROUND_LIMIT: usize = 100;

const MINOR_BASE_FLOOR: usize = 32 * 1024;
const MAJOR_BASE_FLOOR: usize = 256 * 1024;

pub const DEFAULT_MINOR_MULTIPLIER: u32 = 100;
pub const MAX_MINOR_MULTIPLIER: u32 = 200;
pub const DEFAULT_MAJOR_MULTIPLIER: u32 = 100;
pub const MAX_MAJOR_MULTIPLIER: u32 = 1000;

#[derive(Debug, Clone, Default)]
pub struct GcStats {
    pub minor_collections: usize,
    pub major_collections: usize,
    pub objects_freed: usize,
    pub objects_promoted: usize,
    pub finalizers_run: usize,
}

pub struct GcEngine {
    /// stop()/restart(): automatic collection switch.
    pub running: bool,
    /// Reentrancy latch; also held while finalizers run.
    pub in_collection: bool,
    /// Estimated live credits.
    pub credits: usize,
    pub minor_base: usize,
    pub major_base: usize,
    minor_multiplier: u32,
    major_multiplier: u32,
    pub stats: GcStats,
}

impl GcEngine {
    pub fn new() -> Self {
        GcEngine {
            running: true,
            in_collection: false,
            credits: 0,
            minor_base: MINOR_BASE_FLOOR,
            major_base: MAJOR_BASE_FLOOR,
            minor_multiplier: DEFAULT_MINOR_MULTIPLIER,
            major_multiplier: DEFAULT_MAJOR_MULTIPLIER,
            stats: GcStats::default(),
        }
    }

    #[inline]
    pub fn track_allocation(&mut self, cost: usize) {
        self.credits += cost;
    }

    pub fn set_minor_multiplier(&mut self, percent: u32) {
        self.minor_multiplier = percent.min(MAX_MINOR_MULTIPLIER);
    }

    pub fn set_major_multiplier(&mut self, percent: u32) {
        self.major_multiplier = percent.min(MAX_MAJOR_MULTIPLIER);
    }

    pub fn minor_multiplier(&self) -> u32 {
        self.minor_multiplier
    }

    pub fn major_multiplier(&self) -> u32 {
        self.major_multiplier
    }

    fn should_minor(&self) -> bool {
        let base = self.minor_base.max(MINOR_BASE_FLOOR);
        self.credits > base + base * self.minor_multiplier as usize / 100
    }

    fn should_major(&self) -> bool {
        let base = self.major_base.max(MAJOR_BASE_FLOOR);
        self.credits > base + base * self.major_multiplier as usize / 100
    }
}

impl Default for GcEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Allocation checkpoint: run a collection when the credit thresholds say so.
pub(crate) fn maybe_collect(rt: &Runtime) {
    let decision = {
        let g = rt.state.gc.borrow();
        if !g.running || g.in_collection {
            None
        } else if g.should_major() {
            Some(true)
        } else if g.should_minor() {
            Some(false)
        } else {
            None
        }
    };
    match decision {
        Some(true) => major_collection(rt),
        Some(false) => minor_collection(rt),
        None => {}
    }
}

/// Explicit incremental work: `n` minor steps, then a major pass if the
/// major threshold is exceeded.
pub(crate) fn step(rt: &Runtime, n: usize) {
    for _ in 0..n.max(1) {
        minor_collection(rt);
    }
    if rt.state.gc.borrow().should_major() {
        major_collection(rt);
    }
}

/// What a sweep produced; the drops and the finalizer calls happen after the
/// heap borrow is released.
struct Sweep {
    freed: usize,
    promoted: usize,
    machines: Vec<crate::value::CoroMachine>,
    dead_execs: Vec<crate::runtime::exec::ExecId>,
}

pub(crate) fn minor_collection(rt: &Runtime) {
    if !begin_collection(rt) {
        return;
    }
    let (sweep, finalize) = {
        let mut heap = rt.state.heap.borrow_mut();
        clear_marks(&mut heap);
        let mut work = collect_roots(rt);
        // Old objects are roots: no write barrier tracks old-to-young edges.
        for id in heap.all_ids() {
            if heap.header(id).map(|h| h.old).unwrap_or(false) {
                work.push(id);
            }
        }
        mark_all(rt, &mut heap, work, TraversalMode::Strong);
        let finalize = separate_finalizable(rt, &mut heap, true);
        (sweep_unmarked(&mut heap, true), finalize)
    };
    finish_collection(rt, sweep, finalize, false);
}

pub(crate) fn major_collection(rt: &Runtime) {
    if !begin_collection(rt) {
        return;
    }
    let (sweep, finalize) = {
        let mut heap = rt.state.heap.borrow_mut();
        clear_marks(&mut heap);
        let work = collect_roots(rt);
        let mut weak_tables = mark_all(rt, &mut heap, work, TraversalMode::RespectWeak);

        // Ephemeron convergence: a weak-keys entry's value lives only while
        // its key is reachable. Iterate to a fixpoint, bounded; marking new
        // values can reveal further weak tables, which join the next round.
        let mut rounds = 0;
        loop {
            let mut newly = Vec::new();
            for &t in &weak_tables {
                let Some(b) = heap.tables.get(t.0) else { continue };
                if !b.header.marked || !b.data.weak.weak_keys() {
                    continue;
                }
                for (k, v) in b.data.entries() {
                    if is_reachable(&heap, k) {
                        if let Some(vid) = v.gc_id() {
                            if !heap.header(vid).map(|h| h.marked).unwrap_or(true) {
                                newly.push(vid);
                            }
                        }
                    }
                }
            }
            if newly.is_empty() {
                break;
            }
            rounds += 1;
            if rounds > EPHEMERON_ROUND_LIMIT {
                error!(
                    rounds,
                    "ephemeron convergence exceeded the safety limit; abandoning major collection"
                );
                clear_marks(&mut heap);
                drop(heap);
                rt.state.gc.borrow_mut().in_collection = false;
                return;
            }
            let found = mark_all(rt, &mut heap, newly, TraversalMode::RespectWeak);
            weak_tables.extend(found);
        }

        // Clear dead entries of reachable weak tables, before any finalizer
        // can observe them.
        for i in 0..weak_tables.len() {
            let t = weak_tables[i];
            let mut doomed = Vec::new();
            {
                let Some(b) = heap.tables.get(t.0) else { continue };
                if !b.header.marked {
                    continue;
                }
                let mode = b.data.weak;
                for (k, v) in b.data.entries() {
                    let keep = (!mode.weak_keys() || is_reachable(&heap, k))
                        && (!mode.weak_values() || is_reachable(&heap, v));
                    if !keep {
                        doomed.push(k);
                    }
                }
            }
            for k in doomed {
                let _ = heap.table_mut(t).set(k, Value::Nil);
            }
        }

        let finalize = separate_finalizable(rt, &mut heap, false);
        (sweep_unmarked(&mut heap, false), finalize)
    };
    finish_collection(rt, sweep, finalize, true);
}

fn begin_collection(rt: &Runtime) -> bool {
    let mut g = rt.state.gc.borrow_mut();
    if g.in_collection {
        return false;
    }
    g.in_collection = true;
    true
}

fn finish_collection(rt: &Runtime, sweep: Sweep, finalize: Vec<(Value, Value)>, major: bool) {
    let Sweep {
        freed,
        promoted,
        machines,
        dead_execs,
    } = sweep;
    for exec in dead_execs {
        rt.drop_exec(exec);
    }
    drop(machines);

    // Recompute live credits and reset the baselines.
    let credits = {
        let heap = rt.state.heap.borrow();
        heap.all_ids().iter().map(|&id| heap.credit_cost(id)).sum()
    };
    {
        let mut g = rt.state.gc.borrow_mut();
        g.credits = credits;
        g.minor_base = credits;
        if major {
            g.major_base = credits;
            g.stats.major_collections += 1;
        } else {
            g.stats.minor_collections += 1;
        }
        g.stats.objects_freed += freed;
        g.stats.objects_promoted += promoted;
        g.stats.finalizers_run += finalize.len();
    }
    debug!(
        major,
        freed,
        promoted,
        live_credits = credits,
        finalizers = finalize.len(),
        "collection cycle finished"
    );

    // Finalizers are ordinary mutator code, each inside a protected call;
    // errors are reported and discarded. `in_collection` stays up so a
    // finalizer cannot re-enter the collector.
    for (target, finalizer) in finalize {
        if let Err(e) = rt.run_finalizer(finalizer, target) {
            warn!(
                message = %rt.display_value(e.value),
                "error in __gc finalizer (ignored)"
            );
        }
    }
    rt.state.gc.borrow_mut().in_collection = false;
}

fn clear_marks(heap: &mut Heap) {
    for id in heap.all_ids() {
        if let Some(h) = heap.header_mut(id) {
            h.marked = false;
        }
    }
}

/// GC root set: global frame, registry, interned metamethod names, the
/// string metatable, and the main execution (environment chain, call stack,
/// evaluation stack). Coroutine executions are traced through their
/// coroutine objects.
fn collect_roots(rt: &Runtime) -> Vec<GcId> {
    let st = &rt.state;
    let mut roots = Vec::with_capacity(64);
    roots.push(GcId::Scope(st.globals.get()));
    roots.push(GcId::Table(st.registry.get()));
    if let Some(mt) = st.string_mt.get() {
        roots.push(GcId::Table(mt));
    }
    for &name in st.meta_names.borrow().iter() {
        roots.push(GcId::Str(name));
    }
    let execs = st.execs.borrow();
    let main = st.main_exec.get();
    if let Some(e) = execs.get(main.0) {
        push_exec_refs(e, &mut roots);
    }
    roots
}

fn push_exec_refs(e: &crate::runtime::exec::ExecState, out: &mut Vec<GcId>) {
    for &s in &e.scopes {
        out.push(GcId::Scope(s));
    }
    for &v in &e.stack {
        if let Some(id) = v.gc_id() {
            out.push(id);
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum TraversalMode {
    /// Minor collections: weak modes are invisible; clearing is a
    /// major-cycle observable.
    Strong,
    RespectWeak,
}

/// Mark everything reachable from `work`. Returns the weak tables seen
/// (RespectWeak mode only).
fn mark_all(
    rt: &Runtime,
    heap: &mut Heap,
    mut work: Vec<GcId>,
    mode: TraversalMode,
) -> Vec<TableId> {
    let mut weak_tables = Vec::new();
    let mut buf = Vec::new();
    while let Some(id) = work.pop() {
        {
            let Some(h) = heap.header_mut(id) else { continue };
            if h.marked {
                continue;
            }
            h.marked = true;
        }
        buf.clear();
        object_refs(rt, heap, id, mode, &mut buf, &mut weak_tables);
        work.extend_from_slice(&buf);
    }
    weak_tables
}

/// The `references()` enumeration of one object.
fn object_refs(
    rt: &Runtime,
    heap: &Heap,
    id: GcId,
    mode: TraversalMode,
    out: &mut Vec<GcId>,
    weak_tables: &mut Vec<TableId>,
) {
    fn push_value(out: &mut Vec<GcId>, v: Value) {
        if let Some(id) = v.gc_id() {
            out.push(id);
        }
    }
    match id {
        GcId::Str(_) => {}
        GcId::Binding(b) => {
            push_value(out, heap.binding(b).value);
        }
        GcId::Scope(s) => {
            let scope = heap.scope(s);
            if let Some(parent) = scope.parent {
                out.push(GcId::Scope(parent));
            }
            for &binding in scope.vars.values() {
                out.push(GcId::Binding(binding));
            }
            for (_, binding) in &scope.tbc {
                out.push(GcId::Binding(*binding));
            }
            if let Some(varargs) = &scope.varargs {
                for &v in varargs {
                    push_value(out, v);
                }
            }
        }
        GcId::Function(f) => match heap.function(f) {
            crate::value::Function::Script(c) => out.push(GcId::Scope(c.env)),
            crate::value::Function::Native(n) => {
                for &v in &n.upvalues {
                    push_value(out, v);
                }
            }
        },
        GcId::Userdata(u) => {
            if let Some(mt) = heap.userdata_ref(u).metatable {
                out.push(GcId::Table(mt));
            }
        }
        GcId::Coroutine(c) => {
            let co = heap.coroutine(c);
            push_value(out, co.entry);
            for &v in &co.transfer {
                push_value(out, v);
            }
            if let Some(err) = &co.error {
                push_value(out, err.value);
            }
            let execs = rt.state.execs.borrow();
            if let Some(e) = execs.get(co.exec.0) {
                push_exec_refs(e, out);
            }
        }
        GcId::Table(t) => {
            let table = heap.table(t);
            if let Some(mt) = table.metatable {
                out.push(GcId::Table(mt));
            }
            let weak = if mode == TraversalMode::RespectWeak {
                if table.weak != WeakMode::None {
                    weak_tables.push(t);
                }
                table.weak
            } else {
                WeakMode::None
            };
            for (k, v) in table.entries() {
                if !weak.weak_keys() {
                    push_value(out, k);
                }
                if !weak.weak_values() {
                    push_value(out, v);
                }
            }
        }
    }
}

fn is_reachable(heap: &Heap, v: Value) -> bool {
    match v.gc_id() {
        None => true,
        Some(id) => heap.header(id).map(|h| h.marked).unwrap_or(false),
    }
}

/// Separate unreachable objects with a pending `__gc`: flag them finalized,
/// collect (object, finalizer) pairs, and resurrect them, re-marking their
/// whole transitive closure so the finalizer sees intact state.
fn separate_finalizable(rt: &Runtime, heap: &mut Heap, young_only: bool) -> Vec<(Value, Value)> {
    let gc_name = rt.meta_name(MetaEvent::Gc);
    let mut finalize = Vec::new();
    let mut resurrect = Vec::new();
    for id in heap.all_ids() {
        let Some(h) = heap.header(id) else { continue };
        if h.marked || h.finalized || !h.finalizable {
            continue;
        }
        if young_only && h.old {
            continue;
        }
        let Some((target, finalizer)) = lookup_finalizer(heap, id, gc_name) else {
            continue;
        };
        if let Some(h) = heap.header_mut(id) {
            h.finalized = true;
        }
        finalize.push((target, finalizer));
        resurrect.push(id);
    }
    if !resurrect.is_empty() {
        mark_all(rt, heap, resurrect, TraversalMode::Strong);
    }
    finalize
}

fn lookup_finalizer(heap: &Heap, id: GcId, gc_name: StringId) -> Option<(Value, Value)> {
    let (target, mt) = match id {
        GcId::Table(t) => (Value::Table(t), heap.table(t).metatable?),
        GcId::Userdata(u) => (Value::Userdata(u), heap.userdata_ref(u).metatable?),
        _ => return None,
    };
    let finalizer = heap.table(mt).get(Value::Str(gc_name));
    if finalizer.is_nil() {
        None
    } else {
        Some((target, finalizer))
    }
}

/// Free unmarked objects (young only for minor collections), promote marked
/// young survivors, and unmark everything.
fn sweep_unmarked(heap: &mut Heap, young_only: bool) -> Sweep {
    let mut sweep = Sweep {
        freed: 0,
        promoted: 0,
        machines: Vec::new(),
        dead_execs: Vec::new(),
    };
    for id in heap.all_ids() {
        let Some(h) = heap.header(id) else { continue };
        let header = *h;
        if header.marked {
            if let Some(h) = heap.header_mut(id) {
                if !h.old {
                    h.old = true;
                    sweep.promoted += 1;
                }
                h.marked = false;
            }
            continue;
        }
        if young_only && header.old {
            continue;
        }
        free_object(heap, id, &mut sweep);
        sweep.freed += 1;
    }
    heap.shrink_to_fit();
    sweep
}

fn free_object(heap: &mut Heap, id: GcId, sweep: &mut Sweep) {
    match id {
        GcId::Str(s) => heap.remove_string(s),
        GcId::Table(t) => {
            heap.tables.remove(t.0);
        }
        GcId::Function(f) => {
            heap.functions.remove(f.0);
        }
        GcId::Userdata(u) => {
            heap.userdata.remove(u.0);
        }
        GcId::Scope(s) => {
            heap.scopes.remove(s.0);
        }
        GcId::Binding(b) => {
            heap.bindings.remove(b.0);
        }
        GcId::Coroutine(c) => {
            if let Some(mut gone) = heap.coroutines.remove(c.0) {
                if let Some(machine) = gone.data.machine.take() {
                    sweep.machines.push(machine);
                }
                sweep.dead_execs.push(gone.data.exec);
            }
        }
    }
}
