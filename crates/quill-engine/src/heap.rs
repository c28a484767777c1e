//! Slot-indexed storage for heap-managed values.
//!
//! Every allocation occupies one slot and is addressed by [`ObjectId`].
//! Freed slots go on a free list and are reused by later allocations, so
//! a stale id may observe an empty slot but never a different live value
//! of the same generation. The heap tracks an estimated byte footprint
//! per slot; the estimate is charged on insert, adjusted when property
//! tables grow, and refunded on free. A configured ceiling is enforced
//! by the allocation path in the engine, not here: the heap only answers
//! whether an allocation would exceed it.

use rustc_hash::FxHashMap;

use crate::context::NativeFunction;
use crate::value::{ObjectId, Value};

/// Baseline cost charged per heap slot, in bytes.
pub(crate) const SLOT_OVERHEAD: usize = 64;

/// Cost charged per property table entry, on top of the key length.
pub(crate) const PROPERTY_OVERHEAD: usize = 48;

/// Property table for objects and functions.
pub(crate) type PropertyMap = FxHashMap<String, Value>;

/// Payload of one heap slot.
pub(crate) enum HeapData {
    /// UTF-8 string.
    Str(String),
    /// Raw byte buffer.
    Bytes(Vec<u8>),
    /// Plain object.
    Object(ObjectData),
    /// Callable function object.
    Function(FunctionData),
}

/// Properties and prototype link of a plain object.
#[derive(Default)]
pub(crate) struct ObjectData {
    pub properties: PropertyMap,
    pub prototype: Option<ObjectId>,
}

/// A native function with its own property table.
pub(crate) struct FunctionData {
    pub name: String,
    pub callable: NativeFunction,
    /// True if the function may be invoked through `construct`.
    pub constructor: bool,
    pub properties: PropertyMap,
}

impl HeapData {
    pub(crate) fn size_estimate(&self) -> usize {
        match self {
            HeapData::Str(s) => SLOT_OVERHEAD + s.len(),
            HeapData::Bytes(b) => SLOT_OVERHEAD + b.len(),
            HeapData::Object(o) => SLOT_OVERHEAD + property_table_size(&o.properties),
            HeapData::Function(f) => {
                SLOT_OVERHEAD + f.name.len() + property_table_size(&f.properties)
            }
        }
    }

    /// Push every heap reference held by this payload onto `out`.
    pub(crate) fn trace(&self, out: &mut Vec<ObjectId>) {
        match self {
            HeapData::Str(_) | HeapData::Bytes(_) => {}
            HeapData::Object(o) => {
                out.extend(o.properties.values().filter_map(Value::heap_id));
                if let Some(proto) = o.prototype {
                    out.push(proto);
                }
            }
            HeapData::Function(f) => {
                out.extend(f.properties.values().filter_map(Value::heap_id));
            }
        }
    }
}

fn property_table_size(props: &PropertyMap) -> usize {
    props.keys().map(|k| PROPERTY_OVERHEAD + k.len()).sum()
}

struct HeapCell {
    data: HeapData,
    /// Byte footprint currently charged for this slot.
    size: usize,
    marked: bool,
}

/// Snapshot of heap usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapStats {
    /// Estimated bytes currently allocated.
    pub allocated_bytes: usize,
    /// Number of live heap values.
    pub allocation_count: usize,
    /// Configured ceiling in bytes; 0 means unlimited.
    pub max_heap_bytes: usize,
}

/// The slot arena. One per engine, shared by all contexts.
pub(crate) struct Heap {
    slots: Vec<Option<HeapCell>>,
    free_list: Vec<u32>,
    allocated_bytes: usize,
    live_count: usize,
    /// 0 means unlimited.
    max_heap_bytes: usize,
}

impl Heap {
    pub(crate) fn new() -> Self {
        Heap {
            slots: Vec::new(),
            free_list: Vec::new(),
            allocated_bytes: 0,
            live_count: 0,
            max_heap_bytes: 0,
        }
    }

    pub(crate) fn set_max_heap_bytes(&mut self, bytes: usize) {
        self.max_heap_bytes = bytes;
    }

    pub(crate) fn max_heap_bytes(&self) -> usize {
        self.max_heap_bytes
    }

    pub(crate) fn allocated_bytes(&self) -> usize {
        self.allocated_bytes
    }

    pub(crate) fn allocation_count(&self) -> usize {
        self.live_count
    }

    /// True if charging `additional` bytes would cross the ceiling.
    pub(crate) fn would_exceed(&self, additional: usize) -> bool {
        self.max_heap_bytes != 0 && self.allocated_bytes + additional > self.max_heap_bytes
    }

    /// Store a payload, reusing a free slot when one is available.
    pub(crate) fn insert(&mut self, data: HeapData) -> ObjectId {
        let size = data.size_estimate();
        let cell = HeapCell {
            data,
            size,
            marked: false,
        };
        self.allocated_bytes += size;
        self.live_count += 1;
        match self.free_list.pop() {
            Some(index) => {
                self.slots[index as usize] = Some(cell);
                ObjectId::from_index(index)
            }
            None => {
                self.slots.push(Some(cell));
                ObjectId::from_index((self.slots.len() - 1) as u32)
            }
        }
    }

    pub(crate) fn contains(&self, id: ObjectId) -> bool {
        matches!(self.slots.get(id.index() as usize), Some(Some(_)))
    }

    pub(crate) fn data(&self, id: ObjectId) -> Option<&HeapData> {
        match self.slots.get(id.index() as usize) {
            Some(Some(cell)) => Some(&cell.data),
            _ => None,
        }
    }

    pub(crate) fn data_mut(&mut self, id: ObjectId) -> Option<&mut HeapData> {
        match self.slots.get_mut(id.index() as usize) {
            Some(Some(cell)) => Some(&mut cell.data),
            _ => None,
        }
    }

    /// Charge `delta` additional bytes against a slot, after its property
    /// table grew.
    pub(crate) fn grow(&mut self, id: ObjectId, delta: usize) {
        if let Some(Some(cell)) = self.slots.get_mut(id.index() as usize) {
            cell.size += delta;
            self.allocated_bytes += delta;
        }
    }

    pub(crate) fn clear_marks(&mut self) {
        for slot in self.slots.iter_mut().flatten() {
            slot.marked = false;
        }
    }

    /// Mark a slot live. Returns true if the slot was live and newly
    /// marked, false if it was already marked or empty.
    pub(crate) fn mark(&mut self, id: ObjectId) -> bool {
        match self.slots.get_mut(id.index() as usize) {
            Some(Some(cell)) if !cell.marked => {
                cell.marked = true;
                true
            }
            _ => false,
        }
    }

    /// Free every unmarked slot. Returns `(values freed, bytes freed)`.
    pub(crate) fn sweep_unmarked(&mut self) -> (usize, usize) {
        let mut freed = 0;
        let mut bytes = 0;
        for index in 0..self.slots.len() {
            let dead = matches!(&self.slots[index], Some(cell) if !cell.marked);
            if dead {
                if let Some(cell) = self.slots[index].take() {
                    self.allocated_bytes -= cell.size;
                    self.live_count -= 1;
                    self.free_list.push(index as u32);
                    bytes += cell.size;
                    freed += 1;
                }
            }
        }
        (freed, bytes)
    }

    /// Drop everything. Used when the engine closes.
    pub(crate) fn clear(&mut self) {
        self.slots.clear();
        self.free_list.clear();
        self.allocated_bytes = 0;
        self.live_count = 0;
    }

    pub(crate) fn stats(&self) -> HeapStats {
        HeapStats {
            allocated_bytes: self.allocated_bytes,
            allocation_count: self.live_count,
            max_heap_bytes: self.max_heap_bytes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_read_back() {
        let mut heap = Heap::new();
        let id = heap.insert(HeapData::Str("hello".to_string()));
        assert!(heap.contains(id));
        assert_eq!(heap.allocation_count(), 1);
        match heap.data(id) {
            Some(HeapData::Str(s)) => assert_eq!(s, "hello"),
            _ => panic!("expected a string slot"),
        }
    }

    #[test]
    fn test_byte_accounting_charges_and_refunds() {
        let mut heap = Heap::new();
        assert_eq!(heap.allocated_bytes(), 0);

        let id = heap.insert(HeapData::Bytes(vec![0u8; 100]));
        assert_eq!(heap.allocated_bytes(), SLOT_OVERHEAD + 100);

        // Nothing marked: the sweep frees it and refunds the charge.
        let (freed, bytes) = heap.sweep_unmarked();
        assert_eq!(freed, 1);
        assert_eq!(bytes, SLOT_OVERHEAD + 100);
        assert_eq!(heap.allocated_bytes(), 0);
        assert!(!heap.contains(id));
    }

    #[test]
    fn test_freed_slots_are_reused() {
        let mut heap = Heap::new();
        let first = heap.insert(HeapData::Str("a".to_string()));
        heap.sweep_unmarked();
        let second = heap.insert(HeapData::Str("b".to_string()));
        assert_eq!(first.index(), second.index());
        assert_eq!(heap.allocation_count(), 1);
    }

    #[test]
    fn test_mark_protects_from_sweep() {
        let mut heap = Heap::new();
        let keep = heap.insert(HeapData::Str("keep".to_string()));
        let garbage = heap.insert(HeapData::Str("drop".to_string()));

        heap.clear_marks();
        assert!(heap.mark(keep));
        assert!(!heap.mark(keep), "second mark reports already-marked");

        let (freed, _) = heap.sweep_unmarked();
        assert_eq!(freed, 1);
        assert!(heap.contains(keep));
        assert!(!heap.contains(garbage));
    }

    #[test]
    fn test_would_exceed_respects_unlimited() {
        let mut heap = Heap::new();
        assert!(!heap.would_exceed(usize::MAX / 2));
        heap.set_max_heap_bytes(1024);
        assert!(!heap.would_exceed(1024));
        assert!(heap.would_exceed(1025));
    }

    #[test]
    fn test_grow_adjusts_slot_charge() {
        let mut heap = Heap::new();
        let id = heap.insert(HeapData::Object(ObjectData::default()));
        let before = heap.allocated_bytes();
        heap.grow(id, 50);
        assert_eq!(heap.allocated_bytes(), before + 50);

        // The grown charge is refunded in full on free.
        let (_, bytes) = heap.sweep_unmarked();
        assert_eq!(bytes, before + 50);
        assert_eq!(heap.allocated_bytes(), 0);
    }

    #[test]
    fn test_trace_reports_object_children() {
        let mut heap = Heap::new();
        let proto = heap.insert(HeapData::Str("p".to_string()));
        let child = heap.insert(HeapData::Str("c".to_string()));

        let mut object = ObjectData::default();
        object.properties.insert("x".to_string(), Value::Ref(child));
        object.properties.insert("n".to_string(), Value::Int(1));
        object.prototype = Some(proto);

        let mut out = Vec::new();
        HeapData::Object(object).trace(&mut out);
        assert_eq!(out.len(), 2);
        assert!(out.contains(&proto));
        assert!(out.contains(&child));
    }

    #[test]
    fn test_clear_resets_everything() {
        let mut heap = Heap::new();
        heap.insert(HeapData::Str("x".to_string()));
        heap.insert(HeapData::Bytes(vec![1, 2, 3]));
        heap.clear();
        assert_eq!(heap.allocation_count(), 0);
        assert_eq!(heap.allocated_bytes(), 0);
    }
}
