// Table: array part for the dense integer prefix, ordered hash part for
// everything else. The hash part keeps entries in insertion order so `next`
// has a stable cursor even while values are being niled out.

use super::value::{float_to_int_exact, Value};
use crate::gc::{CoroutineId, FunctionId, StringId, TableId, UserdataId};
use ahash::RandomState;
use std::collections::HashMap;

/// Weak mode from the metatable's `__mode` field.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum WeakMode {
    #[default]
    None,
    /// "v"
    Values,
    /// "k"
    Keys,
    /// "kv"
    All,
}

impl WeakMode {
    pub fn from_mode_string(bytes: &[u8]) -> WeakMode {
        let k = bytes.contains(&b'k');
        let v = bytes.contains(&b'v');
        match (k, v) {
            (true, true) => WeakMode::All,
            (true, false) => WeakMode::Keys,
            (false, true) => WeakMode::Values,
            (false, false) => WeakMode::None,
        }
    }

    pub fn weak_keys(self) -> bool {
        matches!(self, WeakMode::Keys | WeakMode::All)
    }

    pub fn weak_values(self) -> bool {
        matches!(self, WeakMode::Values | WeakMode::All)
    }
}

/// Normalised table key. Floats with an exact integer value collapse into
/// integer keys; NaN and nil are rejected before construction.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum TableKey {
    Bool(bool),
    Int(i64),
    Float(u64),
    Str(StringId),
    Table(TableId),
    Function(FunctionId),
    Userdata(UserdataId),
    Coroutine(CoroutineId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyError {
    Nil,
    NaN,
}

impl TableKey {
    pub fn from_value(v: Value) -> Result<TableKey, KeyError> {
        match v {
            Value::Nil => Err(KeyError::Nil),
            Value::Bool(b) => Ok(TableKey::Bool(b)),
            Value::Int(i) => Ok(TableKey::Int(i)),
            Value::Float(f) => {
                if f.is_nan() {
                    Err(KeyError::NaN)
                } else if let Some(i) = float_to_int_exact(f) {
                    Ok(TableKey::Int(i))
                } else {
                    Ok(TableKey::Float(f.to_bits()))
                }
            }
            Value::Str(id) => Ok(TableKey::Str(id)),
            Value::Table(id) => Ok(TableKey::Table(id)),
            Value::Function(id) => Ok(TableKey::Function(id)),
            Value::Userdata(id) => Ok(TableKey::Userdata(id)),
            Value::Coroutine(id) => Ok(TableKey::Coroutine(id)),
        }
    }

    pub fn to_value(self) -> Value {
        match self {
            TableKey::Bool(b) => Value::Bool(b),
            TableKey::Int(i) => Value::Int(i),
            TableKey::Float(bits) => Value::Float(f64::from_bits(bits)),
            TableKey::Str(id) => Value::Str(id),
            TableKey::Table(id) => Value::Table(id),
            TableKey::Function(id) => Value::Function(id),
            TableKey::Userdata(id) => Value::Userdata(id),
            TableKey::Coroutine(id) => Value::Coroutine(id),
        }
    }
}

#[derive(Default)]
struct HashPart {
    index: HashMap<TableKey, u32, RandomState>,
    /// Insertion-ordered; a Nil value marks a dead slot kept for cursors.
    entries: Vec<(TableKey, Value)>,
    dead: usize,
}

impl HashPart {
    fn get(&self, key: &TableKey) -> Value {
        match self.index.get(key) {
            Some(&i) => self.entries[i as usize].1,
            None => Value::Nil,
        }
    }

    fn set(&mut self, key: TableKey, value: Value) {
        if let Some(&i) = self.index.get(&key) {
            let slot = &mut self.entries[i as usize];
            if slot.1.is_nil() && !value.is_nil() {
                self.dead -= 1;
            } else if !slot.1.is_nil() && value.is_nil() {
                self.dead += 1;
            }
            slot.1 = value;
            return;
        }
        if value.is_nil() {
            return;
        }
        self.maybe_compact();
        let i = self.entries.len() as u32;
        self.entries.push((key, value));
        self.index.insert(key, i);
    }

    /// Rebuild when dead slots dominate. Invalidates traversal cursors, as
    /// inserting during traversal does in the reference semantics.
    fn maybe_compact(&mut self) {
        if self.dead <= 32 || self.dead * 2 <= self.entries.len() {
            return;
        }
        self.entries.retain(|(_, v)| !v.is_nil());
        self.index.clear();
        for (i, (k, _)) in self.entries.iter().enumerate() {
            self.index.insert(*k, i as u32);
        }
        self.dead = 0;
    }

    fn live_len(&self) -> usize {
        self.entries.len() - self.dead
    }
}

pub struct Table {
    /// Values for keys 1..=array.len(); may contain interior nils.
    array: Vec<Value>,
    hash: HashPart,
    pub metatable: Option<TableId>,
    pub weak: WeakMode,
}

impl Table {
    pub fn new() -> Self {
        Table {
            array: Vec::new(),
            hash: HashPart::default(),
            metatable: None,
            weak: WeakMode::None,
        }
    }

    pub fn with_capacity(narray: usize) -> Self {
        Table {
            array: Vec::with_capacity(narray),
            hash: HashPart::default(),
            metatable: None,
            weak: WeakMode::None,
        }
    }

    /// Raw read; nil for absent keys (including invalid ones).
    pub fn get(&self, key: Value) -> Value {
        let Ok(key) = TableKey::from_value(key) else {
            return Value::Nil;
        };
        self.get_key(key)
    }

    fn get_key(&self, key: TableKey) -> Value {
        if let TableKey::Int(i) = key {
            if i >= 1 && (i as usize) <= self.array.len() {
                return self.array[i as usize - 1];
            }
        }
        self.hash.get(&key)
    }

    /// Raw write. Errors only on invalid keys.
    pub fn set(&mut self, key: Value, value: Value) -> Result<(), KeyError> {
        let key = TableKey::from_value(key)?;
        self.set_key(key, value);
        Ok(())
    }

    fn set_key(&mut self, key: TableKey, value: Value) {
        if let TableKey::Int(i) = key {
            let len = self.array.len();
            if i >= 1 && (i as usize) <= len {
                self.array[i as usize - 1] = value;
                return;
            }
            if i as usize == len + 1 && i >= 1 {
                if value.is_nil() {
                    return;
                }
                self.array.push(value);
                self.migrate_from_hash();
                return;
            }
        }
        self.hash.set(key, value);
    }

    /// After appending to the array part, pull any directly following integer
    /// keys out of the hash part.
    fn migrate_from_hash(&mut self) {
        loop {
            let next = TableKey::Int(self.array.len() as i64 + 1);
            let v = self.hash.get(&next);
            if v.is_nil() {
                return;
            }
            self.hash.set(next, Value::Nil);
            self.array.push(v);
        }
    }

    /// A border: n >= 0 with t[n] ~= nil and t[n+1] == nil.
    pub fn border(&self) -> i64 {
        let mut n = self.array.len();
        if n > 0 && self.array[n - 1].is_nil() {
            // Binary search for a border inside the array part.
            let mut lo = 0usize; // t[lo] ~= nil (or lo == 0)
            let mut hi = n; // t[hi] == nil
            while hi - lo > 1 {
                let mid = (lo + hi) / 2;
                if self.array[mid - 1].is_nil() {
                    hi = mid;
                } else {
                    lo = mid;
                }
            }
            return lo as i64;
        }
        // Dense array part; extend through the hash part.
        while !self.hash.get(&TableKey::Int(n as i64 + 1)).is_nil() {
            n += 1;
        }
        n as i64
    }

    /// Stateless traversal: `next(nil)` starts, returns None at the end.
    /// Errors (None with a flag would lose information) are signalled with
    /// Err when the key was never in the table.
    pub fn next(&self, key: Value) -> Result<Option<(Value, Value)>, ()> {
        let start = match key {
            Value::Nil => 0,
            _ => {
                let k = TableKey::from_value(key).map_err(|_| ())?;
                if let TableKey::Int(i) = k {
                    if i >= 1 && (i as usize) <= self.array.len() {
                        i as usize
                    } else {
                        return self.next_hash(Some(k));
                    }
                } else {
                    return self.next_hash(Some(k));
                }
            }
        };
        for (offset, v) in self.array[start..].iter().enumerate() {
            if !v.is_nil() {
                let idx = start + offset + 1;
                return Ok(Some((Value::Int(idx as i64), *v)));
            }
        }
        self.next_hash(None)
    }

    fn next_hash(&self, after: Option<TableKey>) -> Result<Option<(Value, Value)>, ()> {
        let start = match after {
            None => 0,
            Some(k) => match self.hash.index.get(&k) {
                Some(&i) => i as usize + 1,
                None => return Err(()),
            },
        };
        for (k, v) in self.hash.entries[start..].iter() {
            if !v.is_nil() {
                return Ok(Some((k.to_value(), *v)));
            }
        }
        Ok(None)
    }

    /// Live entry count estimate, used for GC credits.
    pub fn entry_count(&self) -> usize {
        self.array.len() + self.hash.live_len()
    }

    /// Visit every live entry.
    pub fn entries(&self) -> impl Iterator<Item = (Value, Value)> + '_ {
        let array = self
            .array
            .iter()
            .enumerate()
            .filter(|(_, v)| !v.is_nil())
            .map(|(i, v)| (Value::Int(i as i64 + 1), *v));
        let hash = self
            .hash
            .entries
            .iter()
            .filter(|(_, v)| !v.is_nil())
            .map(|(k, v)| (k.to_value(), *v));
        array.chain(hash)
    }

}

impl Default for Table {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_part_grows_and_migrates() {
        let mut t = Table::new();
        t.set(Value::Int(2), Value::Int(20)).unwrap();
        t.set(Value::Int(1), Value::Int(10)).unwrap();
        // 1 went to the array part, 2 migrates behind it
        assert_eq!(t.border(), 2);
        assert!(matches!(t.get(Value::Int(2)), Value::Int(20)));
    }

    #[test]
    fn float_keys_normalise() {
        let mut t = Table::new();
        t.set(Value::Float(1.0), Value::Int(1)).unwrap();
        assert!(matches!(t.get(Value::Int(1)), Value::Int(1)));
        assert!(t.set(Value::Float(f64::NAN), Value::Int(1)).is_err());
        assert!(t.set(Value::Nil, Value::Int(1)).is_err());
    }

    #[test]
    fn next_walks_array_then_hash() {
        let mut t = Table::new();
        t.set(Value::Int(1), Value::Int(10)).unwrap();
        t.set(Value::Int(2), Value::Int(20)).unwrap();
        t.set(Value::Bool(true), Value::Int(30)).unwrap();
        let mut seen = 0;
        let mut key = Value::Nil;
        while let Some((k, _)) = t.next(key).unwrap() {
            seen += 1;
            key = k;
        }
        assert_eq!(seen, 3);
    }

    #[test]
    fn next_skips_niled_entries() {
        let mut t = Table::new();
        t.set(Value::Bool(true), Value::Int(1)).unwrap();
        t.set(Value::Bool(false), Value::Int(2)).unwrap();
        t.set(Value::Bool(true), Value::Nil).unwrap();
        let first = t.next(Value::Nil).unwrap().unwrap();
        assert!(first.0.raw_equal(&Value::Bool(false)));
    }

    #[test]
    fn border_with_interior_nil() {
        let mut t = Table::new();
        for i in 1..=5 {
            t.set(Value::Int(i), Value::Int(i)).unwrap();
        }
        t.set(Value::Int(5), Value::Nil).unwrap();
        let b = t.border();
        // Any border is acceptable; here only 4 qualifies.
        assert_eq!(b, 4);
    }
}
