//! Resolved field references

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use super::ClassId;

/// Structural identity of a field: declaring class, name and signature
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldKey {
    /// Class that declares the field
    pub declaring: ClassId,
    /// Field name
    pub name: Arc<str>,
    /// Field signature
    pub signature: Arc<str>,
}

#[derive(Debug)]
struct FieldDesc {
    key: FieldKey,
    field_type: ClassId,
    is_static: bool,
    is_volatile: bool,
    slot: u16,
}

/// A resolved field. Immutable and cheap to clone.
///
/// Equality and hashing follow [`FieldKey`].
#[derive(Debug, Clone)]
pub struct FieldRef(Arc<FieldDesc>);

impl FieldRef {
    pub(crate) fn new(
        key: FieldKey,
        field_type: ClassId,
        is_static: bool,
        is_volatile: bool,
        slot: u16,
    ) -> Self {
        Self(Arc::new(FieldDesc {
            key,
            field_type,
            is_static,
            is_volatile,
            slot,
        }))
    }

    /// Identity of this field
    pub fn key(&self) -> &FieldKey {
        &self.0.key
    }

    /// Class that declares the field
    pub fn declaring_type(&self) -> ClassId {
        self.0.key.declaring
    }

    /// Field name
    pub fn name(&self) -> &str {
        &self.0.key.name
    }

    /// Field signature
    pub fn signature(&self) -> &str {
        &self.0.key.signature
    }

    /// Declared field type
    pub fn field_type(&self) -> ClassId {
        self.0.field_type
    }

    /// Whether this is a static field
    pub fn is_static(&self) -> bool {
        self.0.is_static
    }

    /// Whether the field is declared volatile
    pub fn is_volatile(&self) -> bool {
        self.0.is_volatile
    }

    /// Storage slot: instance slot index, or static slot index for static fields
    pub fn slot(&self) -> u16 {
        self.0.slot
    }
}

impl PartialEq for FieldRef {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for FieldRef {}

impl Hash for FieldRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}:{}", self.declaring_type(), self.name(), self.signature())
    }
}
