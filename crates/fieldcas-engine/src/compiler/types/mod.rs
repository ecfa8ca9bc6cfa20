//! Type and field model
//!
//! Classes known to the pipeline live in a shared [`ClassTable`]. Constant
//! pool class references resolve to [`TypeHandle`]s, and field lookups return
//! [`FieldRef`]s that carry everything an intrinsic needs to decide
//! eligibility and to emit direct field access.

mod field;
mod table;

use std::fmt;
use std::sync::Arc;

pub use field::{FieldKey, FieldRef};
pub use table::{ClassAttributes, ClassDef, ClassInfo, ClassState, ClassTable, FieldDef, TypeError, Visibility};

/// Internal name of the root reference class
pub const OBJECT_CLASS: &str = "java/lang/Object";
/// Internal name of the class-literal type
pub const CLASS_CLASS: &str = "java/lang/Class";
/// Internal name of the string type
pub const STRING_CLASS: &str = "java/lang/String";

/// Index of a class in the [`ClassTable`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId(pub u32);

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "class#{}", self.0)
    }
}

/// Broad classification of a type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// Heap-allocated reference type
    Reference,
    /// Primitive (`I`, `J`, `Z`, ...)
    Primitive,
    /// Non-primitive value type (stored inline, not by reference)
    ValueType,
    /// Named by a constant but not loadable in this unit
    Unloadable,
}

/// Result of resolving a class reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeHandle {
    id: Option<ClassId>,
    name: Arc<str>,
    kind: TypeKind,
    signature: Arc<str>,
}

impl TypeHandle {
    pub(crate) fn loaded(id: ClassId, name: Arc<str>, kind: TypeKind, signature: Arc<str>) -> Self {
        Self { id: Some(id), name, kind, signature }
    }

    /// Handle for a name that does not resolve to a loaded class
    pub fn unloadable(name: &str) -> Self {
        Self {
            id: None,
            name: Arc::from(name),
            kind: TypeKind::Unloadable,
            signature: Arc::from(format!("L{};", name)),
        }
    }

    /// Class id, `None` when unloadable
    pub fn id(&self) -> Option<ClassId> {
        self.id
    }

    /// Internal name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Type kind
    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    /// Signature used for field lookup (`I`, `Lpkg/Name;`)
    pub fn sig_name(&self) -> &str {
        &self.signature
    }

    /// Whether the class could not be loaded
    pub fn is_unloadable(&self) -> bool {
        self.kind == TypeKind::Unloadable
    }

    /// Whether this is a primitive type
    pub fn is_primitive(&self) -> bool {
        self.kind == TypeKind::Primitive
    }

    /// Whether this is a value type that is not a primitive
    pub fn is_non_primitive_value_type(&self) -> bool {
        self.kind == TypeKind::ValueType
    }
}
