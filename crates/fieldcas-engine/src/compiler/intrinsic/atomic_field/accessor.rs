//! Synthesized accessor types

use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::compiler::codegen::MethodBody;
use crate::compiler::finish::FinishError;
use crate::compiler::types::{ClassId, ClassTable, FieldRef};

/// Operations an accessor provides
///
/// Call sites dispatch on this closed set instead of looking methods up by
/// name at run time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessorOp {
    /// `compareAndSet(target, expected, update) -> bool`
    CompareAndSet,
    /// `get(target) -> value`
    Get,
    /// `set(target, value)`
    Set,
}

impl AccessorOp {
    /// Every operation, in method-table order
    pub const ALL: [AccessorOp; 3] = [AccessorOp::CompareAndSet, AccessorOp::Get, AccessorOp::Set];

    /// Method name
    pub fn name(self) -> &'static str {
        match self {
            AccessorOp::CompareAndSet => "compareAndSet",
            AccessorOp::Get => "get",
            AccessorOp::Set => "set",
        }
    }

    /// Method descriptor
    pub fn descriptor(self) -> &'static str {
        match self {
            AccessorOp::CompareAndSet => "(Ljava/lang/Object;Ljava/lang/Object;Ljava/lang/Object;)Z",
            AccessorOp::Get => "(Ljava/lang/Object;)Ljava/lang/Object;",
            AccessorOp::Set => "(Ljava/lang/Object;Ljava/lang/Object;)V",
        }
    }

    /// Arguments including the receiver
    pub fn arg_count(self) -> usize {
        match self {
            AccessorOp::CompareAndSet => 4,
            AccessorOp::Get => 2,
            AccessorOp::Set => 3,
        }
    }

    fn index(self) -> usize {
        match self {
            AccessorOp::CompareAndSet => 0,
            AccessorOp::Get => 1,
            AccessorOp::Set => 2,
        }
    }
}

/// A nested type providing atomic access to one field
///
/// Shared by every call site that matches the same field. The type exists in
/// the class table from the moment it is synthesized but is only
/// instantiable once its finish task has run.
#[derive(Debug)]
pub struct AccessorType {
    class: ClassId,
    name: Arc<str>,
    base: ClassId,
    field: FieldRef,
    methods: [MethodBody; 3],
    constructor: MethodBody,
    finalized: OnceCell<()>,
}

impl AccessorType {
    pub(crate) fn new(
        class: ClassId,
        name: Arc<str>,
        base: ClassId,
        field: FieldRef,
        methods: [MethodBody; 3],
        constructor: MethodBody,
    ) -> Self {
        Self {
            class,
            name,
            base,
            field,
            methods,
            constructor,
            finalized: OnceCell::new(),
        }
    }

    /// Class id of the nested type
    pub fn class(&self) -> ClassId {
        self.class
    }

    /// Internal name of the nested type
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Class declaring the target field
    pub fn owner(&self) -> ClassId {
        self.field.declaring_type()
    }

    /// Base intrinsic class
    pub fn base(&self) -> ClassId {
        self.base
    }

    /// Target field
    pub fn field(&self) -> &FieldRef {
        &self.field
    }

    /// Body of an operation
    pub fn method(&self, op: AccessorOp) -> &MethodBody {
        &self.methods[op.index()]
    }

    /// No-argument constructor body
    pub fn constructor(&self) -> &MethodBody {
        &self.constructor
    }

    /// Whether the finish task has run
    pub fn is_finalized(&self) -> bool {
        self.finalized.get().is_some()
    }

    /// Bake the nested type, making it instantiable
    pub(crate) fn create_type(&self, classes: &ClassTable) -> Result<(), FinishError> {
        if self.is_finalized() {
            return Err(FinishError::AlreadyFinalized(self.name.to_string()));
        }
        classes
            .finish_class(self.class)
            .map_err(|source| FinishError::Type {
                task: self.name.to_string(),
                source,
            })?;
        self.finalized
            .set(())
            .map_err(|_| FinishError::AlreadyFinalized(self.name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_op_table() {
        for (i, op) in AccessorOp::ALL.iter().enumerate() {
            assert_eq!(op.index(), i);
        }
        assert_eq!(AccessorOp::CompareAndSet.name(), "compareAndSet");
        assert!(AccessorOp::CompareAndSet.descriptor().ends_with(")Z"));
        assert_eq!(AccessorOp::Set.arg_count(), 3);
    }
}
