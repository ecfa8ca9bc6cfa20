//! Shared class table
//!
//! Holds every class the pipeline can resolve: builtins, classes loaded from
//! class files and nested types defined by intrinsics. Classes compiled on
//! different threads share one table, so all state sits behind a single
//! `RwLock`.

use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use super::{ClassId, FieldKey, FieldRef, TypeHandle, TypeKind, CLASS_CLASS, OBJECT_CLASS, STRING_CLASS};

/// Error from class table operations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TypeError {
    #[error("Class not found: {0}")]
    ClassNotFound(String),
    #[error("Class already defined: {0}")]
    DuplicateClass(String),
    #[error("Unknown class id {0}")]
    UnknownClassId(ClassId),
    #[error("Class {0} has more than 65535 field slots")]
    TooManySlots(String),
    #[error("Class {name} cannot extend {base}: {reason}")]
    InvalidBase {
        name: String,
        base: String,
        reason: &'static str,
    },
}

/// Visibility of a class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// Visible to everyone
    Public,
    /// Nested, visible only inside its outer class
    NestedPrivate,
}

/// Class attributes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassAttributes {
    /// Visibility
    pub visibility: Visibility,
    /// Whether the class can be extended
    pub sealed: bool,
}

impl Default for ClassAttributes {
    fn default() -> Self {
        Self {
            visibility: Visibility::Public,
            sealed: false,
        }
    }
}

/// Lifecycle of a class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassState {
    /// Loaded; deferred setup may still be pending
    Loaded,
    /// Being generated; not instantiable until finished
    Defining,
    /// Complete and instantiable
    Finished,
}

/// Field declaration used when defining a class
#[derive(Debug, Clone)]
pub struct FieldDef {
    /// Field name
    pub name: String,
    /// Field type
    pub field_type: ClassId,
    /// Static field
    pub is_static: bool,
    /// Volatile field
    pub is_volatile: bool,
}

impl FieldDef {
    /// Plain instance field
    pub fn new(name: impl Into<String>, field_type: ClassId) -> Self {
        Self {
            name: name.into(),
            field_type,
            is_static: false,
            is_volatile: false,
        }
    }

    /// Mark as volatile
    pub fn volatile(mut self) -> Self {
        self.is_volatile = true;
        self
    }

    /// Mark as static
    pub fn as_static(mut self) -> Self {
        self.is_static = true;
        self
    }
}

/// Class declaration
#[derive(Debug, Clone)]
pub struct ClassDef {
    /// Internal name
    pub name: String,
    /// Kind
    pub kind: TypeKind,
    /// Superclass (defaults to the root class for reference types)
    pub super_class: Option<ClassId>,
    /// Declared fields
    pub fields: Vec<FieldDef>,
    /// Attributes
    pub attributes: ClassAttributes,
}

impl ClassDef {
    /// Reference class extending the root class
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: TypeKind::Reference,
            super_class: None,
            fields: Vec::new(),
            attributes: ClassAttributes::default(),
        }
    }

    /// Set the superclass
    pub fn extends(mut self, super_class: ClassId) -> Self {
        self.super_class = Some(super_class);
        self
    }

    /// Set the kind
    pub fn kind(mut self, kind: TypeKind) -> Self {
        self.kind = kind;
        self
    }

    /// Add a field
    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    /// Set the attributes
    pub fn attributes(mut self, attributes: ClassAttributes) -> Self {
        self.attributes = attributes;
        self
    }
}

/// Metadata of a class in the table
#[derive(Debug, Clone)]
pub struct ClassInfo {
    /// Class id
    pub id: ClassId,
    /// Internal name
    pub name: Arc<str>,
    /// Kind
    pub kind: TypeKind,
    /// Signature name
    pub signature: Arc<str>,
    /// Superclass
    pub super_class: Option<ClassId>,
    /// Enclosing class for nested types
    pub outer: Option<ClassId>,
    /// Attributes
    pub attributes: ClassAttributes,
    /// Fields declared directly on this class
    pub fields: Vec<FieldRef>,
    /// Instance slots including inherited ones
    pub instance_slots: u16,
    /// Static slots declared on this class
    pub static_slots: u16,
    /// Lifecycle state
    pub state: ClassState,
}

#[derive(Default)]
struct TableInner {
    classes: Vec<ClassInfo>,
    by_name: FxHashMap<Arc<str>, ClassId>,
}

impl TableInner {
    fn get(&self, id: ClassId) -> Result<&ClassInfo, TypeError> {
        self.classes
            .get(id.0 as usize)
            .ok_or(TypeError::UnknownClassId(id))
    }

    fn insert(
        &mut self,
        def: ClassDef,
        outer: Option<ClassId>,
        state: ClassState,
    ) -> Result<ClassId, TypeError> {
        if self.by_name.contains_key(def.name.as_str()) {
            return Err(TypeError::DuplicateClass(def.name));
        }

        let super_class = match def.kind {
            TypeKind::Reference if def.name != OBJECT_CLASS => {
                Some(def.super_class.map_or_else(|| self.root(), Ok)?)
            }
            _ => def.super_class,
        };

        let mut instance_slots = 0u16;
        if let Some(base) = super_class {
            let base_info = self.get(base)?;
            if base_info.attributes.sealed {
                return Err(TypeError::InvalidBase {
                    name: def.name,
                    base: base_info.name.to_string(),
                    reason: "base class is sealed",
                });
            }
            if base_info.kind != TypeKind::Reference {
                return Err(TypeError::InvalidBase {
                    name: def.name,
                    base: base_info.name.to_string(),
                    reason: "base is not a reference type",
                });
            }
            instance_slots = base_info.instance_slots;
        }

        let id = ClassId(self.classes.len() as u32);
        let mut static_slots = 0u16;
        let mut fields = Vec::with_capacity(def.fields.len());
        for field in &def.fields {
            let signature = self.get(field.field_type)?.signature.clone();
            let counter = if field.is_static {
                &mut static_slots
            } else {
                &mut instance_slots
            };
            let slot = *counter;
            *counter = slot
                .checked_add(1)
                .ok_or_else(|| TypeError::TooManySlots(def.name.clone()))?;
            let key = FieldKey {
                declaring: id,
                name: Arc::from(field.name.as_str()),
                signature,
            };
            fields.push(FieldRef::new(
                key,
                field.field_type,
                field.is_static,
                field.is_volatile,
                slot,
            ));
        }

        let name: Arc<str> = Arc::from(def.name.as_str());
        let signature = match def.kind {
            TypeKind::Primitive => Arc::from(primitive_descriptor(&def.name).unwrap_or("?")),
            _ => Arc::from(format!("L{};", def.name)),
        };

        self.classes.push(ClassInfo {
            id,
            name: name.clone(),
            kind: def.kind,
            signature,
            super_class,
            outer,
            attributes: def.attributes,
            fields,
            instance_slots,
            static_slots,
            state,
        });
        self.by_name.insert(name, id);
        Ok(id)
    }

    fn root(&self) -> Result<ClassId, TypeError> {
        self.by_name
            .get(OBJECT_CLASS)
            .copied()
            .ok_or_else(|| TypeError::ClassNotFound(OBJECT_CLASS.to_string()))
    }
}

fn primitive_descriptor(name: &str) -> Option<&'static str> {
    match name {
        "boolean" => Some("Z"),
        "byte" => Some("B"),
        "char" => Some("C"),
        "short" => Some("S"),
        "int" => Some("I"),
        "long" => Some("J"),
        "float" => Some("F"),
        "double" => Some("D"),
        _ => None,
    }
}

/// Thread-safe table of all classes visible to a compilation
#[derive(Default)]
pub struct ClassTable {
    inner: RwLock<TableInner>,
}

impl ClassTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a table holding the root class, `Class`, `String` and the primitives
    pub fn with_builtins() -> Self {
        let table = Self::new();
        {
            let mut inner = table.inner.write();
            let builtins = [OBJECT_CLASS, CLASS_CLASS, STRING_CLASS];
            for name in builtins {
                inner
                    .insert(ClassDef::new(name), None, ClassState::Finished)
                    .expect("builtin classes are unique");
            }
            for name in ["boolean", "byte", "char", "short", "int", "long", "float", "double"] {
                inner
                    .insert(
                        ClassDef::new(name).kind(TypeKind::Primitive),
                        None,
                        ClassState::Finished,
                    )
                    .expect("builtin classes are unique");
            }
        }
        table
    }

    /// Define a class in the `Loaded` state
    pub fn define_class(&self, def: ClassDef) -> Result<ClassId, TypeError> {
        self.inner.write().insert(def, None, ClassState::Loaded)
    }

    /// Define a nested class `<outer>$<simple_name>` in the `Defining` state
    pub fn define_nested_type(
        &self,
        outer: ClassId,
        simple_name: &str,
        base: ClassId,
        attributes: ClassAttributes,
    ) -> Result<ClassId, TypeError> {
        let mut inner = self.inner.write();
        let name = format!("{}${}", inner.get(outer)?.name, simple_name);
        let def = ClassDef::new(name).extends(base).attributes(attributes);
        inner.insert(def, Some(outer), ClassState::Defining)
    }

    /// Look up a class id by internal name
    pub fn lookup(&self, name: &str) -> Option<ClassId> {
        self.inner.read().by_name.get(name).copied()
    }

    /// Load a class the host configuration requires.
    ///
    /// Failure means the pipeline is misconfigured.
    pub fn load_class_critical(&self, name: &str) -> Result<ClassId, TypeError> {
        self.lookup(name)
            .ok_or_else(|| TypeError::ClassNotFound(name.to_string()))
    }

    /// Resolve a class name to a handle; unknown names are unloadable
    pub fn resolve(&self, name: &str) -> TypeHandle {
        let inner = self.inner.read();
        match inner.by_name.get(name) {
            Some(&id) => {
                let info = &inner.classes[id.0 as usize];
                TypeHandle::loaded(id, info.name.clone(), info.kind, info.signature.clone())
            }
            None => TypeHandle::unloadable(name),
        }
    }

    /// Snapshot of a class's metadata
    pub fn class_info(&self, id: ClassId) -> Option<ClassInfo> {
        self.inner.read().get(id).ok().cloned()
    }

    /// Internal name of a class
    pub fn name(&self, id: ClassId) -> Option<Arc<str>> {
        self.inner.read().get(id).ok().map(|info| info.name.clone())
    }

    /// Lifecycle state of a class
    pub fn state(&self, id: ClassId) -> Option<ClassState> {
        self.inner.read().get(id).ok().map(|info| info.state)
    }

    /// Number of instance slots, inherited included
    pub fn instance_slots(&self, id: ClassId) -> Option<u16> {
        self.inner.read().get(id).ok().map(|info| info.instance_slots)
    }

    /// Find a field by name and signature on `owner` or its superclasses.
    ///
    /// The returned reference names the class that actually declares it.
    pub fn get_field(&self, owner: ClassId, name: &str, signature: &str) -> Option<FieldRef> {
        let inner = self.inner.read();
        let mut current = Some(owner);
        while let Some(id) = current {
            let info = inner.get(id).ok()?;
            if let Some(field) = info
                .fields
                .iter()
                .find(|f| f.name() == name && f.signature() == signature)
            {
                return Some(field.clone());
            }
            current = info.super_class;
        }
        None
    }

    /// Whether a value of class `from` can be stored where `to` is expected
    pub fn is_assignable(&self, from: ClassId, to: ClassId) -> bool {
        let inner = self.inner.read();
        let mut current = Some(from);
        while let Some(id) = current {
            if id == to {
                return true;
            }
            current = match inner.get(id) {
                Ok(info) => info.super_class,
                Err(_) => return false,
            };
        }
        false
    }

    /// Complete a class's deferred setup. Finishing twice is a no-op.
    pub fn finish_class(&self, id: ClassId) -> Result<(), TypeError> {
        let mut inner = self.inner.write();
        let info = inner
            .classes
            .get_mut(id.0 as usize)
            .ok_or(TypeError::UnknownClassId(id))?;
        info.state = ClassState::Finished;
        Ok(())
    }

    /// Number of classes in the table
    pub fn len(&self) -> usize {
        self.inner.read().classes.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.inner.read().classes.is_empty()
    }
}
