use crate::language::ast::Node;
use crate::runtime::dict::Dict;
use crate::runtime::error::{RuntimeError, RuntimeResult};
use crate::runtime::hash;
use crate::runtime::interpreter::Interpreter;
use std::rc::Rc;

const BOOL_SEED: u64 = 0x997810ba245f42e8;
const CHAR_SEED: u64 = 0x2b5d5602af50d4cb;
const INT_SEED: u64 = 0x8174c17cc45eebb6;
const REAL_SEED: u64 = 0xc16d72a377d599f9;
const STRING_SEED: u64 = 0xed3e324c65d07a7b;
const POINTER_SEED: u64 = 0x682bfe2b82aa8171;
const FUNCTION_SEED: u64 = 0xc3bd184a0ea29f82;

pub type NativeFn = fn(&mut Interpreter) -> RuntimeResult<Option<ObjId>>;

/// A callable: either a shared script body or a host routine. Equality and
/// hashing are by identity of the body / routine address.
#[derive(Clone, Debug)]
pub enum Function {
    Script(Rc<Node>),
    Native(NativeFn),
}

impl Function {
    pub fn same(&self, other: &Function) -> bool {
        match (self, other) {
            (Function::Script(a), Function::Script(b)) => Rc::ptr_eq(a, b),
            (Function::Native(a), Function::Native(b)) => *a as usize == *b as usize,
            _ => false,
        }
    }

    fn addr(&self) -> u64 {
        match self {
            Function::Script(node) => Rc::as_ptr(node) as usize as u64,
            Function::Native(routine) => *routine as usize as u64,
        }
    }
}

#[derive(Clone, Debug)]
pub enum Value {
    Bool(bool),
    Char(char),
    Int(i64),
    Real(f64),
    Str(String),
    Ptr(Option<ObjId>),
    Dict(Dict),
    Func(Function),
}

impl Value {
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Char(_) => "char",
            Value::Int(_) => "int",
            Value::Real(_) => "real",
            Value::Str(_) => "string",
            Value::Ptr(_) => "pointer",
            Value::Dict(_) => "dict",
            Value::Func(_) => "function",
        }
    }
}

/// A numeric operand after kind dispatch.
#[derive(Clone, Copy, Debug)]
pub enum Num {
    Int(i64),
    Real(f64),
}

impl Num {
    pub fn as_real(self) -> f64 {
        match self {
            Num::Int(v) => v as f64,
            Num::Real(v) => v,
        }
    }
}

/// Generation-checked handle into the heap. A freed slot bumps its
/// generation, so handles into it stop resolving instead of aliasing
/// whatever gets allocated there next.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObjId {
    index: u32,
    gen: u32,
}

impl ObjId {
    pub fn bits(self) -> u64 {
        ((self.gen as u64) << 32) | self.index as u64
    }
}

#[derive(Debug)]
struct Slot {
    gen: u32,
    referenceable: bool,
    value: Option<Value>,
}

#[derive(Debug, Default)]
pub struct Heap {
    slots: Vec<Slot>,
    free: Vec<u32>,
}

impl Heap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, value: Value, referenceable: bool) -> ObjId {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            slot.referenceable = referenceable;
            ObjId {
                index,
                gen: slot.gen,
            }
        } else {
            self.slots.push(Slot {
                gen: 0,
                referenceable,
                value: Some(value),
            });
            ObjId {
                index: (self.slots.len() - 1) as u32,
                gen: 0,
            }
        }
    }

    fn slot(&self, id: ObjId) -> Option<&Slot> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.gen == id.gen && slot.value.is_some())
    }

    fn slot_mut(&mut self, id: ObjId) -> Option<&mut Slot> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.gen == id.gen && slot.value.is_some())
    }

    pub fn value(&self, id: ObjId) -> Option<&Value> {
        self.slot(id).and_then(|slot| slot.value.as_ref())
    }

    pub fn value_mut(&mut self, id: ObjId) -> Option<&mut Value> {
        self.slot_mut(id).and_then(|slot| slot.value.as_mut())
    }

    pub fn is_live(&self, id: ObjId) -> bool {
        self.slot(id).is_some()
    }

    pub fn is_referenceable(&self, id: ObjId) -> bool {
        self.slot(id).is_some_and(|slot| slot.referenceable)
    }

    pub fn make_referenceable(&mut self, id: ObjId) {
        if let Some(slot) = self.slot_mut(id) {
            slot.referenceable = true;
        }
    }

    /// Live objects currently in the arena, for leak checks.
    pub fn live_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.value.is_some()).count()
    }

    /// Removes a slot's payload without destroying what it owns.
    fn vacate(&mut self, id: ObjId) -> Option<Value> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.gen != id.gen || slot.value.is_none() {
            return None;
        }
        let value = slot.value.take();
        slot.gen = slot.gen.wrapping_add(1);
        self.free.push(id.index);
        value
    }

    /// Destroys an object, recursively destroying everything a dict owns.
    /// Freeing a dead handle is a no-op.
    pub fn free(&mut self, id: ObjId) {
        if let Some(value) = self.vacate(id) {
            self.drop_value(value);
        }
    }

    fn drop_value(&mut self, value: Value) {
        if let Value::Dict(dict) = value {
            for item in dict.into_items() {
                self.free(item);
            }
        }
    }

    /// Deep copy. Primitives, pointers and functions copy shallowly (a
    /// pointer copy aliases the same target; a function copy shares the
    /// body); dicts copy entry by entry into fresh slots.
    pub fn copy(&mut self, id: ObjId, referenceable: bool) -> RuntimeResult<ObjId> {
        let shallow = match self.value(id).ok_or(RuntimeError::DanglingPointer)? {
            Value::Dict(_) => None,
            other => Some(other.clone()),
        };
        let value = match shallow {
            Some(value) => value,
            None => {
                let entries: Vec<(ObjId, ObjId)> = match self.value(id) {
                    Some(Value::Dict(dict)) => dict.entries().collect(),
                    _ => Vec::new(),
                };
                let mut dict = Dict::new();
                for (key, val) in entries {
                    let key_copy = self.copy(key, false)?;
                    let val_copy = self.copy(val, true)?;
                    let key_hash = self.hash(key_copy)?;
                    dict.insert_copied(key_hash, key_copy, val_copy);
                }
                Value::Dict(dict)
            }
        };
        Ok(self.alloc(value, referenceable))
    }

    /// Replaces the target's payload with a deep copy of the source, in
    /// place: every handle to the target observes the new payload. The copy
    /// is taken before the old payload is destroyed, so a source aliased
    /// into the target survives the swap. The target ends up referenceable.
    pub fn replace_with_copy(&mut self, target: ObjId, source: ObjId) -> RuntimeResult<()> {
        let copy = self.copy(source, true)?;
        let new_value = self.vacate(copy).ok_or(RuntimeError::DanglingPointer)?;
        let old_value = {
            let slot = self.slot_mut(target).ok_or(RuntimeError::DanglingPointer)?;
            slot.referenceable = true;
            slot.value.replace(new_value)
        };
        if let Some(old_value) = old_value {
            self.drop_value(old_value);
        }
        Ok(())
    }

    /// Structural equality. Values of different kinds are never equal.
    pub fn equal(&self, a: ObjId, b: ObjId) -> RuntimeResult<bool> {
        let va = self.value(a).ok_or(RuntimeError::DanglingPointer)?;
        let vb = self.value(b).ok_or(RuntimeError::DanglingPointer)?;
        Ok(match (va, vb) {
            (Value::Bool(x), Value::Bool(y)) => x == y,
            (Value::Char(x), Value::Char(y)) => x == y,
            (Value::Int(x), Value::Int(y)) => x == y,
            (Value::Real(x), Value::Real(y)) => x == y,
            (Value::Str(x), Value::Str(y)) => x == y,
            (Value::Ptr(x), Value::Ptr(y)) => x == y,
            (Value::Dict(x), Value::Dict(y)) => x.structural_eq(y, self)?,
            (Value::Func(x), Value::Func(y)) => x.same(y),
            _ => false,
        })
    }

    /// Structural hash, seeded per kind so equal payloads of different
    /// kinds still hash apart. Agrees with `equal`.
    pub fn hash(&self, id: ObjId) -> RuntimeResult<u64> {
        let value = self.value(id).ok_or(RuntimeError::DanglingPointer)?;
        Ok(match value {
            Value::Bool(b) => hash::combine(BOOL_SEED, *b as u64),
            Value::Char(c) => hash::combine(CHAR_SEED, *c as u64),
            Value::Int(i) => hash::combine(INT_SEED, *i as u64),
            // 0.0 and -0.0 compare equal, so they must hash equal too.
            Value::Real(r) => hash::combine(
                REAL_SEED,
                if *r == 0.0 { 0 } else { r.to_bits() },
            ),
            Value::Str(s) => {
                let mut acc = STRING_SEED;
                for c in s.chars() {
                    acc = hash::combine(acc, c as u64);
                }
                acc
            }
            Value::Ptr(target) => {
                hash::combine(POINTER_SEED, target.map_or(0, ObjId::bits))
            }
            Value::Dict(dict) => dict.structural_hash(self)?,
            Value::Func(func) => hash::combine(FUNCTION_SEED, func.addr()),
        })
    }

    /// Human-readable rendition, as used by the string cast and `print`.
    pub fn display(&self, id: ObjId) -> String {
        match self.value(id) {
            None => "<freed>".to_string(),
            Some(value) => match value {
                Value::Bool(b) => b.to_string(),
                Value::Char(c) => c.to_string(),
                Value::Int(i) => i.to_string(),
                Value::Real(r) => format!("{r:?}"),
                Value::Str(s) => s.clone(),
                Value::Ptr(None) => "0".to_string(),
                Value::Ptr(Some(target)) => target.bits().to_string(),
                Value::Dict(dict) => dict.display(self),
                Value::Func(_) => "function".to_string(),
            },
        }
    }

    /// Resolves a pointer to its target, failing on null and on targets
    /// that have since been destroyed.
    pub fn deref(&self, id: ObjId) -> RuntimeResult<ObjId> {
        match self.value(id).ok_or(RuntimeError::DanglingPointer)? {
            Value::Ptr(None) => Err(RuntimeError::NullDereference),
            Value::Ptr(Some(target)) => {
                if self.is_live(*target) {
                    Ok(*target)
                } else {
                    Err(RuntimeError::DanglingPointer)
                }
            }
            other => Err(RuntimeError::Type {
                expected: "pointer",
                found: other.kind(),
            }),
        }
    }

    pub(crate) fn expect_bool(&self, id: ObjId) -> RuntimeResult<bool> {
        match self.value(id).ok_or(RuntimeError::DanglingPointer)? {
            Value::Bool(b) => Ok(*b),
            other => Err(RuntimeError::Type {
                expected: "bool",
                found: other.kind(),
            }),
        }
    }

    pub(crate) fn expect_int(&self, id: ObjId) -> RuntimeResult<i64> {
        match self.value(id).ok_or(RuntimeError::DanglingPointer)? {
            Value::Int(i) => Ok(*i),
            other => Err(RuntimeError::Type {
                expected: "int",
                found: other.kind(),
            }),
        }
    }

    pub(crate) fn expect_str(&self, id: ObjId) -> RuntimeResult<&str> {
        match self.value(id).ok_or(RuntimeError::DanglingPointer)? {
            Value::Str(s) => Ok(s),
            other => Err(RuntimeError::Type {
                expected: "string",
                found: other.kind(),
            }),
        }
    }

    pub(crate) fn expect_referenceable(&self, id: ObjId) -> RuntimeResult<()> {
        match self.slot(id) {
            None => Err(RuntimeError::DanglingPointer),
            Some(slot) if slot.referenceable => Ok(()),
            Some(_) => Err(RuntimeError::NotReferenceable),
        }
    }

    pub fn number(&self, id: ObjId) -> RuntimeResult<Num> {
        match self.value(id).ok_or(RuntimeError::DanglingPointer)? {
            Value::Int(i) => Ok(Num::Int(*i)),
            Value::Real(r) => Ok(Num::Real(*r)),
            other => Err(RuntimeError::Type {
                expected: "int or real",
                found: other.kind(),
            }),
        }
    }

    // -- casts; each yields a fresh non-referenceable object --

    pub fn cast_bool(&mut self, id: ObjId) -> RuntimeResult<ObjId> {
        let b = match self.value(id).ok_or(RuntimeError::DanglingPointer)? {
            Value::Bool(b) => *b,
            Value::Char(c) => *c != '\0',
            Value::Int(i) => *i != 0,
            Value::Real(r) => *r != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Ptr(target) => target.is_some(),
            Value::Dict(dict) => !dict.is_empty(),
            Value::Func(_) => true,
        };
        Ok(self.alloc(Value::Bool(b), false))
    }

    pub fn cast_char(&mut self, id: ObjId) -> RuntimeResult<ObjId> {
        let c = match self.value(id).ok_or(RuntimeError::DanglingPointer)? {
            Value::Bool(b) => {
                if *b {
                    '\u{1}'
                } else {
                    '\0'
                }
            }
            Value::Char(c) => *c,
            Value::Int(i) => u32::try_from(*i)
                .ok()
                .and_then(char::from_u32)
                .ok_or_else(|| RuntimeError::Conversion {
                    target: "char",
                    text: i.to_string(),
                })?,
            other => {
                return Err(RuntimeError::Type {
                    expected: "bool, char or int",
                    found: other.kind(),
                });
            }
        };
        Ok(self.alloc(Value::Char(c), false))
    }

    pub fn cast_int(&mut self, id: ObjId) -> RuntimeResult<ObjId> {
        let i = match self.value(id).ok_or(RuntimeError::DanglingPointer)? {
            Value::Bool(b) => *b as i64,
            Value::Char(c) => *c as u32 as i64,
            Value::Int(i) => *i,
            Value::Real(r) => *r as i64,
            Value::Str(s) => {
                s.trim()
                    .parse::<i64>()
                    .map_err(|_| RuntimeError::Conversion {
                        target: "int",
                        text: s.clone(),
                    })?
            }
            other => {
                return Err(RuntimeError::Type {
                    expected: "bool, char, int, real or string",
                    found: other.kind(),
                });
            }
        };
        Ok(self.alloc(Value::Int(i), false))
    }

    pub fn cast_real(&mut self, id: ObjId) -> RuntimeResult<ObjId> {
        let r = match self.value(id).ok_or(RuntimeError::DanglingPointer)? {
            Value::Bool(b) => *b as i64 as f64,
            Value::Char(c) => *c as u32 as f64,
            Value::Int(i) => *i as f64,
            Value::Real(r) => *r,
            Value::Str(s) => {
                s.trim()
                    .parse::<f64>()
                    .map_err(|_| RuntimeError::Conversion {
                        target: "real",
                        text: s.clone(),
                    })?
            }
            other => {
                return Err(RuntimeError::Type {
                    expected: "bool, char, int, real or string",
                    found: other.kind(),
                });
            }
        };
        Ok(self.alloc(Value::Real(r), false))
    }

    pub fn cast_string(&mut self, id: ObjId) -> RuntimeResult<ObjId> {
        self.value(id).ok_or(RuntimeError::DanglingPointer)?;
        let text = self.display(id);
        Ok(self.alloc(Value::Str(text), false))
    }

    // -- string operations; receivers must be referenceable, and all
    // positions count characters, not bytes --

    pub fn string_access(&mut self, id: ObjId, index: ObjId) -> RuntimeResult<ObjId> {
        self.expect_str(id)?;
        let pos = self.expect_int(index)?;
        self.expect_referenceable(id)?;
        let c = {
            let s = self.expect_str(id)?;
            let len = s.chars().count();
            if pos < 0 || pos as usize >= len {
                return Err(RuntimeError::Bounds { index: pos, len });
            }
            s.chars()
                .nth(pos as usize)
                .ok_or(RuntimeError::Bounds { index: pos, len })?
        };
        Ok(self.alloc(Value::Char(c), false))
    }

    pub fn string_size(&mut self, id: ObjId) -> RuntimeResult<ObjId> {
        self.expect_str(id)?;
        self.expect_referenceable(id)?;
        let len = self.expect_str(id)?.chars().count() as i64;
        Ok(self.alloc(Value::Int(len), false))
    }

    pub fn string_add_suffix(&mut self, id: ObjId, arg: ObjId) -> RuntimeResult<()> {
        self.expect_str(id)?;
        let suffix = self.expect_str(arg)?.to_string();
        self.expect_referenceable(id)?;
        if let Some(Value::Str(s)) = self.value_mut(id) {
            s.push_str(&suffix);
        }
        Ok(())
    }

    pub fn string_add_prefix(&mut self, id: ObjId, arg: ObjId) -> RuntimeResult<()> {
        self.expect_str(id)?;
        let prefix = self.expect_str(arg)?.to_string();
        self.expect_referenceable(id)?;
        if let Some(Value::Str(s)) = self.value_mut(id) {
            s.insert_str(0, &prefix);
        }
        Ok(())
    }

    pub fn string_remove_suffix(&mut self, id: ObjId, arg: ObjId) -> RuntimeResult<()> {
        self.expect_str(id)?;
        let count = self.expect_int(arg)?;
        self.expect_referenceable(id)?;
        let cut = {
            let s = self.expect_str(id)?;
            let len = s.chars().count();
            if count < 0 || count as usize > len {
                return Err(RuntimeError::Bounds { index: count, len });
            }
            let keep = len - count as usize;
            s.char_indices().nth(keep).map_or(s.len(), |(i, _)| i)
        };
        if let Some(Value::Str(s)) = self.value_mut(id) {
            s.truncate(cut);
        }
        Ok(())
    }

    pub fn string_remove_prefix(&mut self, id: ObjId, arg: ObjId) -> RuntimeResult<()> {
        self.expect_str(id)?;
        let count = self.expect_int(arg)?;
        self.expect_referenceable(id)?;
        let cut = {
            let s = self.expect_str(id)?;
            let len = s.chars().count();
            if count < 0 || count as usize > len {
                return Err(RuntimeError::Bounds { index: count, len });
            }
            s.char_indices()
                .nth(count as usize)
                .map_or(s.len(), |(i, _)| i)
        };
        if let Some(Value::Str(s)) = self.value_mut(id) {
            s.replace_range(..cut, "");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn freed_handles_stop_resolving() {
        let mut heap = Heap::new();
        let id = heap.alloc(Value::Int(5), false);
        assert!(heap.is_live(id));
        heap.free(id);
        assert!(!heap.is_live(id));
        assert!(heap.value(id).is_none());
        // The slot is reused under a new generation; the old handle stays dead.
        let next = heap.alloc(Value::Int(9), false);
        assert!(heap.is_live(next));
        assert!(!heap.is_live(id));
    }

    #[test]
    fn copy_is_independent() {
        let mut heap = Heap::new();
        let original = heap.alloc(Value::Str("abc".into()), true);
        let copy = heap.copy(original, true).expect("copy");
        if let Some(Value::Str(s)) = heap.value_mut(original) {
            s.push('!');
        }
        assert_eq!(heap.display(copy), "abc");
        assert_eq!(heap.display(original), "abc!");
    }

    #[test]
    fn dict_copy_is_deep() {
        let mut heap = Heap::new();
        let dict = heap.alloc(Value::Dict(Dict::new()), true);
        let key = heap.alloc(Value::Str("k".into()), false);
        let val = heap.alloc(Value::Int(1), false);
        heap.dict_insert(dict, key, val).expect("insert");
        let copy = heap.copy(dict, true).expect("copy");

        let val2 = heap.alloc(Value::Int(2), false);
        heap.dict_insert(dict, key, val2).expect("insert");

        let got = heap.dict_access(copy, key).expect("access");
        assert_eq!(heap.expect_int(got), Ok(1));
        let got = heap.dict_access(dict, key).expect("access");
        assert_eq!(heap.expect_int(got), Ok(2));
    }

    #[test]
    fn replace_with_copy_survives_aliasing() {
        let mut heap = Heap::new();
        let dict = heap.alloc(Value::Dict(Dict::new()), true);
        let key = heap.alloc(Value::Int(0), false);
        let val = heap.alloc(Value::Int(7), false);
        heap.dict_insert(dict, key, val).expect("insert");
        let inner = heap.dict_access(dict, key).expect("access");
        // Overwrite the dict with one of its own entries.
        heap.replace_with_copy(dict, inner).expect("replace");
        assert_eq!(heap.expect_int(dict), Ok(7));
        assert!(heap.is_referenceable(dict));
    }

    #[test]
    fn equality_is_kind_strict() {
        let mut heap = Heap::new();
        let int = heap.alloc(Value::Int(1), false);
        let real = heap.alloc(Value::Real(1.0), false);
        let text = heap.alloc(Value::Str("1".into()), false);
        assert_eq!(heap.equal(int, real), Ok(false));
        assert_eq!(heap.equal(int, text), Ok(false));
        assert_eq!(heap.equal(int, int), Ok(true));
    }

    #[test]
    fn negative_zero_hashes_like_zero() {
        let mut heap = Heap::new();
        let pos = heap.alloc(Value::Real(0.0), false);
        let neg = heap.alloc(Value::Real(-0.0), false);
        assert_eq!(heap.equal(pos, neg), Ok(true));
        assert_eq!(heap.hash(pos), heap.hash(neg));
    }

    #[test]
    fn function_identity() {
        fn stub(_: &mut Interpreter) -> RuntimeResult<Option<ObjId>> {
            Ok(None)
        }
        let mut heap = Heap::new();
        let f = heap.alloc(Value::Func(Function::Native(stub)), true);
        let g = heap.copy(f, true).expect("copy");
        assert_eq!(heap.equal(f, g), Ok(true));
        assert_eq!(heap.hash(f), heap.hash(g));
    }

    #[test]
    fn casts_follow_kind_rules() {
        let mut heap = Heap::new();
        let text = heap.alloc(Value::Str(" 42 ".into()), false);
        let as_int = heap.cast_int(text).expect("cast");
        assert_eq!(heap.expect_int(as_int), Ok(42));

        let real = heap.alloc(Value::Real(3.9), false);
        let truncated = heap.cast_int(real).expect("cast");
        assert_eq!(heap.expect_int(truncated), Ok(3));

        let bad = heap.alloc(Value::Str("abc".into()), false);
        assert!(matches!(
            heap.cast_int(bad),
            Err(RuntimeError::Conversion { .. })
        ));

        let ptr = heap.alloc(Value::Ptr(None), false);
        assert!(matches!(heap.cast_int(ptr), Err(RuntimeError::Type { .. })));
        let as_bool = heap.cast_bool(ptr).expect("cast");
        assert_eq!(heap.expect_bool(as_bool), Ok(false));
    }

    #[test]
    fn int_to_char_is_checked() {
        let mut heap = Heap::new();
        let ok = heap.alloc(Value::Int(97), false);
        let c = heap.cast_char(ok).expect("cast");
        assert!(matches!(heap.value(c), Some(Value::Char('a'))));

        let bad = heap.alloc(Value::Int(-1), false);
        assert!(matches!(
            heap.cast_char(bad),
            Err(RuntimeError::Conversion { .. })
        ));
    }

    #[test]
    fn string_ops_count_characters() {
        let mut heap = Heap::new();
        let s = heap.alloc(Value::Str("héllo".into()), true);
        let size = heap.string_size(s).expect("size");
        assert_eq!(heap.expect_int(size), Ok(5));

        let one = heap.alloc(Value::Int(1), false);
        let c = heap.string_access(s, one).expect("access");
        assert!(matches!(heap.value(c), Some(Value::Char('é'))));

        let two = heap.alloc(Value::Int(2), false);
        heap.string_remove_prefix(s, two).expect("remove");
        assert_eq!(heap.display(s), "llo");

        let ten = heap.alloc(Value::Int(10), false);
        assert!(matches!(
            heap.string_remove_suffix(s, ten),
            Err(RuntimeError::Bounds { .. })
        ));
    }

    #[test]
    fn string_receiver_must_be_referenceable() {
        let mut heap = Heap::new();
        let s = heap.alloc(Value::Str("tmp".into()), false);
        assert_eq!(heap.string_size(s), Err(RuntimeError::NotReferenceable));
    }

    #[test]
    fn deref_distinguishes_null_and_dangling() {
        let mut heap = Heap::new();
        let null = heap.alloc(Value::Ptr(None), false);
        assert_eq!(heap.deref(null), Err(RuntimeError::NullDereference));

        let target = heap.alloc(Value::Int(1), true);
        let ptr = heap.alloc(Value::Ptr(Some(target)), false);
        assert_eq!(heap.deref(ptr), Ok(target));
        heap.free(target);
        assert_eq!(heap.deref(ptr), Err(RuntimeError::DanglingPointer));
    }
}
