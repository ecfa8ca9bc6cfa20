//! Object heap
//!
//! Objects are never freed. Slot storage is a fixed array of atomic words
//! allocated from the class's instance slot count; slot accesses take the
//! memory ordering the caller asks for.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use super::value::{ObjRef, Value};
use super::{VmError, VmResult};
use crate::compiler::types::{ClassId, ClassState, ClassTable};

#[derive(Debug)]
struct HeapObject {
    class: ClassId,
    slots: Box<[AtomicU64]>,
}

impl HeapObject {
    fn slot(&self, obj: ObjRef, slot: u16) -> VmResult<&AtomicU64> {
        self.slots
            .get(usize::from(slot))
            .ok_or(VmError::SlotOutOfRange { object: obj, slot })
    }
}

/// Shared heap of objects with atomic slots
pub struct Heap {
    classes: Arc<ClassTable>,
    objects: RwLock<Vec<Arc<HeapObject>>>,
}

impl Heap {
    /// Create an empty heap over a class table
    pub fn new(classes: Arc<ClassTable>) -> Self {
        Self {
            classes,
            objects: RwLock::new(Vec::new()),
        }
    }

    /// The class table
    pub fn classes(&self) -> &Arc<ClassTable> {
        &self.classes
    }

    /// Allocate an instance with all slots null.
    ///
    /// Classes still being defined cannot be instantiated.
    pub fn alloc(&self, class: ClassId) -> VmResult<ObjRef> {
        let info = self
            .classes
            .class_info(class)
            .ok_or_else(|| VmError::UnknownClass(class.to_string()))?;
        if info.state == ClassState::Defining {
            return Err(VmError::TypeNotFinalized(info.name.to_string()));
        }

        let slots = (0..info.instance_slots)
            .map(|_| AtomicU64::new(Value::Null.to_bits()))
            .collect();
        let object = Arc::new(HeapObject { class, slots });

        let mut objects = self.objects.write();
        let obj = ObjRef(objects.len() as u32);
        objects.push(object);
        Ok(obj)
    }

    fn object(&self, obj: ObjRef) -> VmResult<Arc<HeapObject>> {
        self.objects
            .read()
            .get(obj.0 as usize)
            .cloned()
            .ok_or(VmError::InvalidReference(obj))
    }

    /// Class of an object
    pub fn class_of(&self, obj: ObjRef) -> VmResult<ClassId> {
        Ok(self.object(obj)?.class)
    }

    /// Load a slot
    pub fn load(&self, obj: ObjRef, slot: u16, order: Ordering) -> VmResult<Value> {
        let object = self.object(obj)?;
        Ok(Value::from_bits(object.slot(obj, slot)?.load(order)))
    }

    /// Store into a slot
    pub fn store(&self, obj: ObjRef, slot: u16, value: Value, order: Ordering) -> VmResult<()> {
        let object = self.object(obj)?;
        object.slot(obj, slot)?.store(value.to_bits(), order);
        Ok(())
    }

    /// Atomically replace `expected` with `update`; returns the previous value
    pub fn compare_exchange(&self, obj: ObjRef, slot: u16, expected: Value, update: Value) -> VmResult<Value> {
        let object = self.object(obj)?;
        let previous = match object.slot(obj, slot)?.compare_exchange(
            expected.to_bits(),
            update.to_bits(),
            Ordering::SeqCst,
            Ordering::SeqCst,
        ) {
            Ok(bits) | Err(bits) => bits,
        };
        Ok(Value::from_bits(previous))
    }

    /// Number of live objects
    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    /// Whether nothing was allocated
    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }
}
