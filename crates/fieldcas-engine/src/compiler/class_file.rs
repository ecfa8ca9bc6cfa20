//! Class files as handed to the compiler
//!
//! A class file pairs a loaded class with its constant pool and decoded
//! method bodies. Constant resolution goes through [`ConstantResolver`] so
//! intrinsics never touch the pool layout directly.

use crate::compiler::bytecode::{ConstantPool, ExceptionHandler, Instruction};
use crate::compiler::types::{ClassId, ClassTable, TypeHandle};

/// Resolves constant pool operands to types and strings
pub trait ConstantResolver {
    /// Resolve a class constant. `None` if the entry is missing or not a class.
    fn class_constant(&self, index: u32) -> Option<TypeHandle>;

    /// Resolve a string constant. `None` if the entry is missing or not a string.
    fn string_constant(&self, index: u32) -> Option<&str>;
}

/// A decoded method
#[derive(Debug, Clone)]
pub struct MethodDef {
    /// Method name
    pub name: String,
    /// Method descriptor
    pub descriptor: String,
    /// Static method
    pub is_static: bool,
    /// Normalized instruction stream
    pub code: Vec<Instruction>,
    /// Exception handler table
    pub handlers: Vec<ExceptionHandler>,
}

impl MethodDef {
    /// Create a method with the given body
    pub fn new(name: impl Into<String>, descriptor: impl Into<String>, code: Vec<Instruction>) -> Self {
        Self {
            name: name.into(),
            descriptor: descriptor.into(),
            is_static: false,
            code,
            handlers: Vec::new(),
        }
    }

    /// Mark as static
    pub fn as_static(mut self) -> Self {
        self.is_static = true;
        self
    }

    /// Add an exception handler
    pub fn handler(mut self, handler: ExceptionHandler) -> Self {
        self.handlers.push(handler);
        self
    }
}

/// A class ready for compilation
#[derive(Debug, Clone)]
pub struct ClassFile {
    /// The class being compiled
    pub this_class: ClassId,
    /// Constant pool
    pub constant_pool: ConstantPool,
    /// Methods
    pub methods: Vec<MethodDef>,
}

impl ClassFile {
    /// Create a class file for an already defined class
    pub fn new(this_class: ClassId, constant_pool: ConstantPool) -> Self {
        Self {
            this_class,
            constant_pool,
            methods: Vec::new(),
        }
    }

    /// Add a method
    pub fn method(mut self, method: MethodDef) -> Self {
        self.methods.push(method);
        self
    }

    /// Resolver over this class's pool and the given class table
    pub fn resolver<'a>(&'a self, classes: &'a ClassTable) -> PoolResolver<'a> {
        PoolResolver {
            pool: &self.constant_pool,
            classes,
        }
    }
}

/// [`ConstantResolver`] backed by a constant pool and a class table
pub struct PoolResolver<'a> {
    pool: &'a ConstantPool,
    classes: &'a ClassTable,
}

impl ConstantResolver for PoolResolver<'_> {
    fn class_constant(&self, index: u32) -> Option<TypeHandle> {
        self.pool
            .class_name(index)
            .map(|name| self.classes.resolve(name))
    }

    fn string_constant(&self, index: u32) -> Option<&str> {
        self.pool.string(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::types::STRING_CLASS;

    #[test]
    fn test_resolver() {
        let classes = ClassTable::with_builtins();
        let mut pool = ConstantPool::new();
        let string_idx = pool.add_class(STRING_CLASS);
        let missing_idx = pool.add_class("demo/Missing");
        let name_idx = pool.add_string("next");

        let this = classes.lookup(STRING_CLASS).unwrap();
        let class_file = ClassFile::new(this, pool);
        let resolver = class_file.resolver(&classes);

        assert_eq!(resolver.class_constant(string_idx).unwrap().id(), Some(this));
        assert!(resolver.class_constant(missing_idx).unwrap().is_unloadable());
        assert_eq!(resolver.class_constant(name_idx), None);
        assert_eq!(resolver.string_constant(name_idx), Some("next"));
        assert_eq!(resolver.string_constant(string_idx), None);
    }
}
