// Heap: slot-based storage with free lists for every runtime object kind.
// References between objects are typed ids, never owning pointers; the GC is
// the sole owner of object lifetimes.

use crate::runtime::env::{Binding, Scope};
use crate::value::{Coroutine, Function, LumaStr, Table, Userdata};
use ahash::RandomState;
use std::collections::HashMap;
use std::hash::{BuildHasher, Hash, Hasher};

/// Slot storage with a free list: O(1) insert, lookup and removal.
pub struct SlotVec<T> {
    slots: Vec<Option<T>>,
    free_list: Vec<u32>,
    count: usize,
}

impl<T> SlotVec<T> {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        SlotVec {
            slots: Vec::with_capacity(capacity),
            free_list: Vec::new(),
            count: 0,
        }
    }

    #[inline]
    pub fn insert(&mut self, value: T) -> u32 {
        self.count += 1;
        if let Some(free) = self.free_list.pop() {
            self.slots[free as usize] = Some(value);
            free
        } else {
            let id = self.slots.len() as u32;
            self.slots.push(Some(value));
            id
        }
    }

    #[inline]
    pub fn get(&self, id: u32) -> Option<&T> {
        self.slots.get(id as usize).and_then(|s| s.as_ref())
    }

    #[inline]
    pub fn get_mut(&mut self, id: u32) -> Option<&mut T> {
        self.slots.get_mut(id as usize).and_then(|s| s.as_mut())
    }

    #[inline]
    pub fn remove(&mut self, id: u32) -> Option<T> {
        let slot = self.slots.get_mut(id as usize)?;
        let value = slot.take()?;
        self.free_list.push(id);
        self.count -= 1;
        Some(value)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Iterate live slot ids.
    pub fn ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_some())
            .map(|(i, _)| i as u32)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|v| (i as u32, v)))
    }

    pub fn shrink_to_fit(&mut self) {
        while let Some(None) = self.slots.last() {
            let removed = self.slots.len() - 1;
            self.slots.pop();
            if let Some(pos) = self.free_list.iter().rposition(|&id| id as usize == removed) {
                self.free_list.swap_remove(pos);
            }
        }
        self.slots.shrink_to_fit();
        self.free_list.shrink_to_fit();
    }
}

impl<T> Default for SlotVec<T> {
    fn default() -> Self {
        Self::new()
    }
}

macro_rules! heap_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
        pub struct $name(pub u32);

        impl $name {
            #[inline]
            pub fn index(self) -> u32 {
                self.0
            }
        }
    };
}

heap_id!(StringId);
heap_id!(TableId);
heap_id!(FunctionId);
heap_id!(UserdataId);
heap_id!(CoroutineId);
heap_id!(
    /// One frame of the environment chain.
    ScopeId
);
heap_id!(
    /// A variable cell; shared by every closure that captured it.
    BindingId
);

/// Unified id for GC bookkeeping.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum GcId {
    Str(StringId),
    Table(TableId),
    Function(FunctionId),
    Userdata(UserdataId),
    Coroutine(CoroutineId),
    Scope(ScopeId),
    Binding(BindingId),
}

/// Per-object GC state: mark bit, generation, finalizer bookkeeping.
#[derive(Clone, Copy, Debug, Default)]
pub struct GcHeader {
    pub marked: bool,
    pub old: bool,
    /// Set when a metatable with `__gc` is attached.
    pub finalizable: bool,
    /// The finalizer has already run; never run it again.
    pub finalized: bool,
}

pub struct GcBox<T> {
    pub header: GcHeader,
    pub data: T,
}

impl<T> GcBox<T> {
    fn new(data: T) -> Self {
        GcBox {
            header: GcHeader::default(),
            data,
        }
    }
}

/// All heap-allocated runtime objects, one arena per kind, plus the string
/// interner. Every string is interned: equal contents always share an id, so
/// string equality is id equality.
pub struct Heap {
    pub strings: SlotVec<GcBox<LumaStr>>,
    pub tables: SlotVec<GcBox<Table>>,
    pub functions: SlotVec<GcBox<Function>>,
    pub userdata: SlotVec<GcBox<Userdata>>,
    pub coroutines: SlotVec<GcBox<Coroutine>>,
    pub scopes: SlotVec<GcBox<Scope>>,
    pub bindings: SlotVec<GcBox<Binding>>,
    intern: HashMap<u64, Vec<StringId>, RandomState>,
    hasher: RandomState,
}

impl Heap {
    pub fn new() -> Self {
        Heap {
            strings: SlotVec::with_capacity(128),
            tables: SlotVec::with_capacity(16),
            functions: SlotVec::with_capacity(64),
            userdata: SlotVec::new(),
            coroutines: SlotVec::new(),
            scopes: SlotVec::with_capacity(64),
            bindings: SlotVec::with_capacity(128),
            intern: HashMap::with_hasher(RandomState::new()),
            hasher: RandomState::new(),
        }
    }

    fn hash_bytes(&self, bytes: &[u8]) -> u64 {
        let mut h = self.hasher.build_hasher();
        bytes.hash(&mut h);
        h.finish()
    }

    /// Create or reuse an interned string.
    pub fn create_string(&mut self, bytes: &[u8]) -> (StringId, bool) {
        let hash = self.hash_bytes(bytes);
        if let Some(bucket) = self.intern.get(&hash) {
            for &id in bucket {
                if let Some(existing) = self.strings.get(id.0) {
                    if existing.data.as_bytes() == bytes {
                        return (id, false);
                    }
                }
            }
        }
        let id = StringId(self.strings.insert(GcBox::new(LumaStr::new(bytes))));
        self.intern.entry(hash).or_default().push(id);
        (id, true)
    }

    #[inline]
    pub fn string(&self, id: StringId) -> &LumaStr {
        &self.strings.get(id.0).expect("stale string id").data
    }

    /// Remove a string (GC only); drops it from the intern table as well.
    pub fn remove_string(&mut self, id: StringId) {
        if let Some(gone) = self.strings.remove(id.0) {
            let hash = self.hash_bytes(gone.data.as_bytes());
            if let Some(bucket) = self.intern.get_mut(&hash) {
                bucket.retain(|&other| other != id);
                if bucket.is_empty() {
                    self.intern.remove(&hash);
                }
            }
        }
    }

    pub fn create_table(&mut self, table: Table) -> TableId {
        TableId(self.tables.insert(GcBox::new(table)))
    }

    #[inline]
    pub fn table(&self, id: TableId) -> &Table {
        &self.tables.get(id.0).expect("stale table id").data
    }

    #[inline]
    pub fn table_mut(&mut self, id: TableId) -> &mut Table {
        &mut self.tables.get_mut(id.0).expect("stale table id").data
    }

    pub fn create_function(&mut self, func: Function) -> FunctionId {
        FunctionId(self.functions.insert(GcBox::new(func)))
    }

    #[inline]
    pub fn function(&self, id: FunctionId) -> &Function {
        &self.functions.get(id.0).expect("stale function id").data
    }

    pub fn create_userdata(&mut self, ud: Userdata) -> UserdataId {
        UserdataId(self.userdata.insert(GcBox::new(ud)))
    }

    #[inline]
    pub fn userdata_ref(&self, id: UserdataId) -> &Userdata {
        &self.userdata.get(id.0).expect("stale userdata id").data
    }

    #[inline]
    pub fn userdata_mut(&mut self, id: UserdataId) -> &mut Userdata {
        &mut self.userdata.get_mut(id.0).expect("stale userdata id").data
    }

    pub fn create_coroutine(&mut self, co: Coroutine) -> CoroutineId {
        CoroutineId(self.coroutines.insert(GcBox::new(co)))
    }

    #[inline]
    pub fn coroutine(&self, id: CoroutineId) -> &Coroutine {
        &self.coroutines.get(id.0).expect("stale coroutine id").data
    }

    #[inline]
    pub fn coroutine_mut(&mut self, id: CoroutineId) -> &mut Coroutine {
        &mut self
            .coroutines
            .get_mut(id.0)
            .expect("stale coroutine id")
            .data
    }

    pub fn create_scope(&mut self, scope: Scope) -> ScopeId {
        ScopeId(self.scopes.insert(GcBox::new(scope)))
    }

    #[inline]
    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes.get(id.0).expect("stale scope id").data
    }

    #[inline]
    pub fn scope_mut(&mut self, id: ScopeId) -> &mut Scope {
        &mut self.scopes.get_mut(id.0).expect("stale scope id").data
    }

    pub fn create_binding(&mut self, binding: Binding) -> BindingId {
        BindingId(self.bindings.insert(GcBox::new(binding)))
    }

    #[inline]
    pub fn binding(&self, id: BindingId) -> &Binding {
        &self.bindings.get(id.0).expect("stale binding id").data
    }

    #[inline]
    pub fn binding_mut(&mut self, id: BindingId) -> &mut Binding {
        &mut self.bindings.get_mut(id.0).expect("stale binding id").data
    }

    pub fn header(&self, id: GcId) -> Option<&GcHeader> {
        match id {
            GcId::Str(i) => self.strings.get(i.0).map(|b| &b.header),
            GcId::Table(i) => self.tables.get(i.0).map(|b| &b.header),
            GcId::Function(i) => self.functions.get(i.0).map(|b| &b.header),
            GcId::Userdata(i) => self.userdata.get(i.0).map(|b| &b.header),
            GcId::Coroutine(i) => self.coroutines.get(i.0).map(|b| &b.header),
            GcId::Scope(i) => self.scopes.get(i.0).map(|b| &b.header),
            GcId::Binding(i) => self.bindings.get(i.0).map(|b| &b.header),
        }
    }

    pub fn header_mut(&mut self, id: GcId) -> Option<&mut GcHeader> {
        match id {
            GcId::Str(i) => self.strings.get_mut(i.0).map(|b| &mut b.header),
            GcId::Table(i) => self.tables.get_mut(i.0).map(|b| &mut b.header),
            GcId::Function(i) => self.functions.get_mut(i.0).map(|b| &mut b.header),
            GcId::Userdata(i) => self.userdata.get_mut(i.0).map(|b| &mut b.header),
            GcId::Coroutine(i) => self.coroutines.get_mut(i.0).map(|b| &mut b.header),
            GcId::Scope(i) => self.scopes.get_mut(i.0).map(|b| &mut b.header),
            GcId::Binding(i) => self.bindings.get_mut(i.0).map(|b| &mut b.header),
        }
    }

    /// Every live object id, across all arenas.
    pub fn all_ids(&self) -> Vec<GcId> {
        let mut out = Vec::with_capacity(self.object_count());
        out.extend(self.strings.ids().map(|i| GcId::Str(StringId(i))));
        out.extend(self.tables.ids().map(|i| GcId::Table(TableId(i))));
        out.extend(self.functions.ids().map(|i| GcId::Function(FunctionId(i))));
        out.extend(self.userdata.ids().map(|i| GcId::Userdata(UserdataId(i))));
        out.extend(
            self.coroutines
                .ids()
                .map(|i| GcId::Coroutine(CoroutineId(i))),
        );
        out.extend(self.scopes.ids().map(|i| GcId::Scope(ScopeId(i))));
        out.extend(self.bindings.ids().map(|i| GcId::Binding(BindingId(i))));
        out
    }

    pub fn object_count(&self) -> usize {
        self.strings.len()
            + self.tables.len()
            + self.functions.len()
            + self.userdata.len()
            + self.coroutines.len()
            + self.scopes.len()
            + self.bindings.len()
    }

    /// Cost estimate in GC credits: a fixed overhead per object plus a
    /// per-entry cost for tables and a per-binding cost for scopes.
    pub fn credit_cost(&self, id: GcId) -> usize {
        const BASE: usize = 16;
        match id {
            GcId::Str(i) => self
                .strings
                .get(i.0)
                .map(|b| BASE + b.data.len())
                .unwrap_or(0),
            GcId::Table(i) => self
                .tables
                .get(i.0)
                .map(|b| BASE + 4 * b.data.entry_count())
                .unwrap_or(0),
            GcId::Scope(i) => self
                .scopes
                .get(i.0)
                .map(|b| BASE + 4 * b.data.binding_count())
                .unwrap_or(0),
            GcId::Coroutine(_) => 4 * BASE,
            _ => BASE,
        }
    }

    /// Reclaim slot storage after a collection.
    pub fn shrink_to_fit(&mut self) {
        self.strings.shrink_to_fit();
        self.tables.shrink_to_fit();
        self.functions.shrink_to_fit();
        self.userdata.shrink_to_fit();
        self.coroutines.shrink_to_fit();
        self.scopes.shrink_to_fit();
        self.bindings.shrink_to_fit();
        self.intern.shrink_to_fit();
    }
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}
