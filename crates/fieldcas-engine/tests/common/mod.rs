//! Shared setup for integration tests

#![allow(dead_code)]

use std::sync::Arc;

use fieldcas_engine::compiler::types::{ClassDef, FieldDef, STRING_CLASS};
use fieldcas_engine::{
    AccessorRegistry, ClassFile, ClassId, ClassTable, CompilationUnit, ConstantPool, Instruction,
    IntrinsicConfig, MethodDef, Opcode,
};

/// Class table holding the intrinsic base type and `demo/Item`
pub struct World {
    pub classes: Arc<ClassTable>,
    pub registry: Arc<AccessorRegistry>,
    pub config: IntrinsicConfig,
    pub item: ClassId,
    pub string: ClassId,
}

impl World {
    pub fn new() -> Self {
        Self::with_config(IntrinsicConfig::default())
    }

    pub fn with_config(config: IntrinsicConfig) -> Self {
        let classes = Arc::new(ClassTable::with_builtins());
        classes
            .define_class(ClassDef::new(IntrinsicConfig::default().base_type))
            .unwrap();
        let item = classes.define_class(ClassDef::new("demo/Item")).unwrap();
        let string = classes.lookup(STRING_CLASS).unwrap();
        let registry = Arc::new(AccessorRegistry::new(classes.clone()));
        Self {
            classes,
            registry,
            config,
            item,
            string,
        }
    }

    pub fn unit(&self) -> CompilationUnit {
        CompilationUnit::new(self.registry.clone(), self.config.clone())
    }

    /// Define `name` with `volatile Item next` and `Item plain`
    pub fn define_node(&self, name: &str) -> ClassId {
        self.classes
            .define_class(
                ClassDef::new(name)
                    .field(FieldDef::new("next", self.item).volatile())
                    .field(FieldDef::new("plain", self.item)),
            )
            .unwrap()
    }

    /// Class file for `owner` whose static initializer creates an updater for
    /// `field` and returns it
    pub fn updater_class(&self, owner: ClassId, owner_name: &str, field: &str) -> ClassFile {
        let mut pool = ConstantPool::new();
        let owner_idx = pool.add_class(owner_name);
        let item_idx = pool.add_class("demo/Item");
        let name_idx = pool.add_string(field);
        let factory_idx = pool.add_method_ref(
            self.config.factory_class.as_str(),
            self.config.factory_method.as_str(),
            self.config.factory_descriptor.as_str(),
        );

        let code = vec![
            Instruction::ldc(owner_idx),
            Instruction::ldc(item_idx),
            Instruction::ldc(name_idx),
            Instruction::invoke(Opcode::InvokeStatic, factory_idx),
            Instruction::simple(Opcode::ReturnValue),
        ];
        let descriptor = "()Ljava/util/concurrent/atomic/AtomicReferenceFieldUpdater;";
        ClassFile::new(owner, pool).method(MethodDef::new("updater", descriptor, code).as_static())
    }
}
