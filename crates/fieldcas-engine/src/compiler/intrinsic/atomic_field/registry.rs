//! Memoization table for synthesized accessors

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use super::accessor::AccessorType;
use crate::compiler::types::{ClassId, ClassTable, FieldKey};

#[derive(Default)]
struct RegistryInner {
    by_field: FxHashMap<FieldKey, Arc<AccessorType>>,
    by_class: FxHashMap<ClassId, Arc<AccessorType>>,
}

/// Registry of accessor types, one per field of one class table
///
/// Lookup and creation happen in a single critical section, so two threads
/// asking for the same field can never both generate a type. Entries are
/// never removed.
///
/// Keys and accessor classes are ids into the table the registry was created
/// for; every unit and interpreter using the registry works on that table.
pub struct AccessorRegistry {
    classes: Arc<ClassTable>,
    inner: Mutex<RegistryInner>,
    created: AtomicUsize,
}

impl AccessorRegistry {
    /// Create an empty registry for the accessors of `classes`
    pub fn new(classes: Arc<ClassTable>) -> Self {
        Self {
            classes,
            inner: Mutex::new(RegistryInner::default()),
            created: AtomicUsize::new(0),
        }
    }

    /// The class table accessors are defined in
    pub fn classes(&self) -> &Arc<ClassTable> {
        &self.classes
    }

    /// Whether this registry belongs to `classes`
    pub fn is_bound_to(&self, classes: &Arc<ClassTable>) -> bool {
        Arc::ptr_eq(&self.classes, classes)
    }

    /// Return the accessor for `key`, creating it with `create` on a miss.
    ///
    /// `create` runs with the registry locked and must not call back into it.
    pub fn get_or_try_create<E, F>(&self, key: &FieldKey, create: F) -> Result<Arc<AccessorType>, E>
    where
        F: FnOnce() -> Result<Arc<AccessorType>, E>,
    {
        let mut inner = self.inner.lock();
        if let Some(existing) = inner.by_field.get(key) {
            log::trace!("accessor cache hit for {}", existing.name());
            return Ok(existing.clone());
        }

        let accessor = create()?;
        inner.by_field.insert(key.clone(), accessor.clone());
        inner.by_class.insert(accessor.class(), accessor.clone());
        self.created.fetch_add(1, Ordering::Relaxed);
        Ok(accessor)
    }

    /// Look up the accessor for a field
    pub fn get(&self, key: &FieldKey) -> Option<Arc<AccessorType>> {
        self.inner.lock().by_field.get(key).cloned()
    }

    /// Look up an accessor by its nested class
    pub fn by_class(&self, class: ClassId) -> Option<Arc<AccessorType>> {
        self.inner.lock().by_class.get(&class).cloned()
    }

    /// Number of accessors in the table
    pub fn len(&self) -> usize {
        self.inner.lock().by_field.len()
    }

    /// Whether no accessor was created yet
    pub fn is_empty(&self) -> bool {
        self.inner.lock().by_field.is_empty()
    }

    /// Number of accessor types ever generated
    pub fn created_count(&self) -> usize {
        self.created.load(Ordering::Relaxed)
    }
}
