use crate::runtime::error::{RuntimeError, RuntimeResult};
use crate::runtime::hash;
use crate::runtime::value::{Heap, ObjId, Value};
use rustc_hash::{FxHashMap, FxHashSet};

pub(crate) const DICT_SEED: u64 = 0x17ae3a7a33c2df17;

/// Reclamation runs no more often than this many operations apart.
const BASE_SWEEP_TARGET: u64 = 10_000;

#[derive(Clone, Copy, Debug)]
struct Entry {
    key: ObjId,
    val: ObjId,
}

/// A dict owns every object it has ever allocated for its entries, listed
/// in `items`. Removal and overwrite only detach entries; the orphaned
/// objects stay alive until the amortized sweep reclaims them.
#[derive(Clone, Debug)]
pub struct Dict {
    buckets: FxHashMap<u64, Vec<Entry>>,
    len: usize,
    items: FxHashSet<ObjId>,
    ops: u64,
    sweep_target: u64,
}

impl Default for Dict {
    fn default() -> Self {
        Self::new()
    }
}

impl Dict {
    pub fn new() -> Self {
        Self {
            buckets: FxHashMap::default(),
            len: 0,
            items: FxHashSet::default(),
            ops: 0,
            sweep_target: BASE_SWEEP_TARGET,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub(crate) fn entries(&self) -> impl Iterator<Item = (ObjId, ObjId)> + '_ {
        self.buckets
            .values()
            .flat_map(|bucket| bucket.iter().map(|entry| (entry.key, entry.val)))
    }

    pub(crate) fn into_items(self) -> FxHashSet<ObjId> {
        self.items
    }

    /// Registers an already-copied key/value pair. Used where the caller
    /// knows the key is absent (deep copies, keys/values snapshots).
    pub(crate) fn insert_copied(&mut self, key_hash: u64, key: ObjId, val: ObjId) {
        self.buckets
            .entry(key_hash)
            .or_default()
            .push(Entry { key, val });
        self.items.insert(key);
        self.items.insert(val);
        self.len += 1;
    }

    fn get_with(&self, heap: &Heap, key_hash: u64, key: ObjId) -> RuntimeResult<Option<ObjId>> {
        if let Some(bucket) = self.buckets.get(&key_hash) {
            for entry in bucket {
                if heap.equal(entry.key, key)? {
                    return Ok(Some(entry.val));
                }
            }
        }
        Ok(None)
    }

    pub(crate) fn structural_eq(&self, other: &Dict, heap: &Heap) -> RuntimeResult<bool> {
        if self.len != other.len {
            return Ok(false);
        }
        for (key, val) in self.entries() {
            let key_hash = heap.hash(key)?;
            match other.get_with(heap, key_hash, key)? {
                Some(other_val) => {
                    if !heap.equal(val, other_val)? {
                        return Ok(false);
                    }
                }
                None => return Ok(false),
            }
        }
        Ok(true)
    }

    /// Per-pair hashes accumulate commutatively so the result does not
    /// depend on bucket iteration order: equal dicts hash equal.
    pub(crate) fn structural_hash(&self, heap: &Heap) -> RuntimeResult<u64> {
        let mut acc: u64 = 0;
        for (key, val) in self.entries() {
            acc = acc.wrapping_add(hash::combine(heap.hash(key)?, heap.hash(val)?));
        }
        Ok(hash::combine(DICT_SEED, acc))
    }

    pub(crate) fn display(&self, heap: &Heap) -> String {
        let mut out = String::from("{");
        for (i, (key, val)) in self.entries().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            out.push_str(&heap.display(key));
            out.push_str(": ");
            out.push_str(&heap.display(val));
        }
        out.push('}');
        out
    }

    #[cfg(test)]
    pub(crate) fn set_sweep_target(&mut self, target: u64) {
        self.sweep_target = target;
    }
}

impl Heap {
    fn expect_dict_receiver(&self, id: ObjId) -> RuntimeResult<()> {
        match self.value(id).ok_or(RuntimeError::DanglingPointer)? {
            Value::Dict(_) => {}
            other => {
                return Err(RuntimeError::Type {
                    expected: "dict",
                    found: other.kind(),
                });
            }
        }
        self.expect_referenceable(id)
    }

    fn take_dict(&mut self, id: ObjId) -> RuntimeResult<Dict> {
        match self.value_mut(id) {
            Some(slot @ Value::Dict(_)) => {
                match std::mem::replace(slot, Value::Dict(Dict::new())) {
                    Value::Dict(dict) => Ok(dict),
                    _ => unreachable!(),
                }
            }
            Some(other) => Err(RuntimeError::Type {
                expected: "dict",
                found: other.kind(),
            }),
            None => Err(RuntimeError::DanglingPointer),
        }
    }

    fn put_dict(&mut self, id: ObjId, dict: Dict) {
        if let Some(slot) = self.value_mut(id) {
            *slot = Value::Dict(dict);
        }
    }

    /// Counts one operation against the dict and, at the threshold, sweeps
    /// every owned object no entry can reach. The next threshold adapts to
    /// the surviving population.
    fn dict_tick(&mut self, id: ObjId) -> RuntimeResult<()> {
        let mut dict = self.take_dict(id)?;
        dict.ops += 1;
        if dict.ops >= dict.sweep_target {
            dict.ops = 0;
            let reachable: FxHashSet<ObjId> = dict
                .entries()
                .flat_map(|(key, val)| [key, val])
                .collect();
            let stale: Vec<ObjId> = dict.items.difference(&reachable).copied().collect();
            for item in stale {
                self.free(item);
            }
            dict.items = reachable;
            dict.sweep_target = BASE_SWEEP_TARGET.max(2 * dict.items.len() as u64);
        }
        self.put_dict(id, dict);
        Ok(())
    }

    /// Inserts a deep copy of the value under a deep copy of the key. An
    /// existing key keeps its stored key object and only the value entry
    /// is redirected; the displaced value waits for the sweep.
    pub fn dict_insert(&mut self, id: ObjId, key: ObjId, val: ObjId) -> RuntimeResult<()> {
        self.expect_dict_receiver(id)?;
        self.dict_tick(id)?;
        // Both copies are taken before the dict is opened, so inserting a
        // dict into itself snapshots the full receiver.
        let val_copy = self.copy(val, true)?;
        let key_copy = self.copy(key, false)?;
        let key_hash = self.hash(key)?;
        let mut dict = self.take_dict(id)?;
        let mut replaced = false;
        if let Some(bucket) = dict.buckets.get_mut(&key_hash) {
            for entry in bucket.iter_mut() {
                if self.equal(entry.key, key)? {
                    entry.val = val_copy;
                    replaced = true;
                    break;
                }
            }
        }
        if replaced {
            self.free(key_copy);
        } else {
            dict.buckets
                .entry(key_hash)
                .or_default()
                .push(Entry {
                    key: key_copy,
                    val: val_copy,
                });
            dict.items.insert(key_copy);
            dict.len += 1;
        }
        dict.items.insert(val_copy);
        self.put_dict(id, dict);
        Ok(())
    }

    /// Looks up the stored value object for a key. The result stays owned
    /// by the dict.
    pub fn dict_access(&mut self, id: ObjId, key: ObjId) -> RuntimeResult<ObjId> {
        self.expect_dict_receiver(id)?;
        self.dict_tick(id)?;
        let key_hash = self.hash(key)?;
        let dict = match self.value(id) {
            Some(Value::Dict(dict)) => dict,
            _ => return Err(RuntimeError::DanglingPointer),
        };
        dict.get_with(self, key_hash, key)?
            .ok_or(RuntimeError::KeyNotFound)
    }

    pub fn dict_present(&mut self, id: ObjId, key: ObjId) -> RuntimeResult<bool> {
        self.expect_dict_receiver(id)?;
        self.dict_tick(id)?;
        let key_hash = self.hash(key)?;
        let dict = match self.value(id) {
            Some(Value::Dict(dict)) => dict,
            _ => return Err(RuntimeError::DanglingPointer),
        };
        Ok(dict.get_with(self, key_hash, key)?.is_some())
    }

    pub fn dict_size(&mut self, id: ObjId) -> RuntimeResult<i64> {
        self.expect_dict_receiver(id)?;
        self.dict_tick(id)?;
        match self.value(id) {
            Some(Value::Dict(dict)) => Ok(dict.len() as i64),
            _ => Err(RuntimeError::DanglingPointer),
        }
    }

    /// Detaches a key's entry; removing an absent key is a no-op. Key and
    /// value objects stay in the owned set until the sweep.
    pub fn dict_remove(&mut self, id: ObjId, key: ObjId) -> RuntimeResult<()> {
        self.expect_dict_receiver(id)?;
        self.dict_tick(id)?;
        let key_hash = self.hash(key)?;
        let mut dict = self.take_dict(id)?;
        if let Some(bucket) = dict.buckets.get_mut(&key_hash) {
            let mut found = None;
            for (i, entry) in bucket.iter().enumerate() {
                if self.equal(entry.key, key)? {
                    found = Some(i);
                    break;
                }
            }
            if let Some(i) = found {
                bucket.remove(i);
                if bucket.is_empty() {
                    dict.buckets.remove(&key_hash);
                }
                dict.len -= 1;
            }
        }
        self.put_dict(id, dict);
        Ok(())
    }

    /// Snapshot dict mapping 0..n to copies of the keys. Index assignment
    /// follows bucket iteration order.
    pub fn dict_keys(&mut self, id: ObjId) -> RuntimeResult<ObjId> {
        self.dict_snapshot(id, true)
    }

    /// Snapshot dict mapping 0..n to copies of the values.
    pub fn dict_values(&mut self, id: ObjId) -> RuntimeResult<ObjId> {
        self.dict_snapshot(id, false)
    }

    fn dict_snapshot(&mut self, id: ObjId, keys: bool) -> RuntimeResult<ObjId> {
        self.expect_dict_receiver(id)?;
        self.dict_tick(id)?;
        let entries: Vec<(ObjId, ObjId)> = match self.value(id) {
            Some(Value::Dict(dict)) => dict.entries().collect(),
            _ => Vec::new(),
        };
        let mut result = Dict::new();
        for (i, (key, val)) in entries.into_iter().enumerate() {
            let index = self.alloc(Value::Int(i as i64), false);
            let index_hash = self.hash(index)?;
            let item = self.copy(if keys { key } else { val }, true)?;
            result.insert_copied(index_hash, index, item);
        }
        Ok(self.alloc(Value::Dict(result), true))
    }

    /// Destroys every owned object and empties the dict.
    pub fn dict_clear(&mut self, id: ObjId) -> RuntimeResult<()> {
        self.expect_dict_receiver(id)?;
        let mut dict = self.take_dict(id)?;
        dict.buckets.clear();
        dict.len = 0;
        let items: Vec<ObjId> = dict.items.drain().collect();
        for item in items {
            self.free(item);
        }
        self.put_dict(id, dict);
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn set_dict_sweep_target(&mut self, id: ObjId, target: u64) {
        if let Some(Value::Dict(dict)) = self.value_mut(id) {
            dict.set_sweep_target(target);
        }
    }
}
