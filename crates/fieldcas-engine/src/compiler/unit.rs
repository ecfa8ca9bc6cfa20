//! Compilation unit driver
//!
//! Re-emits every method of a class through a [`CodeEmitter`], modelling the
//! stack effect of ordinary calls from their descriptors and offering each
//! factory call to the atomic field intrinsic. Classes may be compiled from
//! several threads through a shared `&CompilationUnit`; the finish phase runs
//! once, after all of them.

use std::sync::Arc;

use rustc_hash::FxHashSet;

use crate::compiler::bytecode::{
    compute_flags, ConstantPoolError, DescriptorError, MethodDescriptor, Opcode,
};
use crate::compiler::class_file::{ClassFile, ConstantResolver, MethodDef};
use crate::compiler::codegen::{CodeEmitter, EmitError, MethodBody};
use crate::compiler::finish::{FinishError, FinishQueue};
use crate::compiler::intrinsic::atomic_field::{AccessorRegistry, AtomicFieldIntrinsic, IntrinsicError};
use crate::compiler::intrinsic::{detect_intrinsic, IntrinsicKind};
use crate::compiler::types::{ClassId, ClassTable};
use crate::config::IntrinsicConfig;

/// Error compiling a class
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("Constant pool error: {0}")]
    ConstantPool(#[from] ConstantPoolError),
    #[error("Invalid descriptor: {0}")]
    Descriptor(#[from] DescriptorError),
    #[error("Emission failed: {0}")]
    Emit(#[from] EmitError),
    #[error("Intrinsic failed: {0}")]
    Intrinsic(#[from] IntrinsicError),
    #[error("{opcode} at {index} has no constant pool operand")]
    MissingOperand { opcode: Opcode, index: usize },
}

/// A compiled method
#[derive(Debug, Clone)]
pub struct CompiledMethod {
    /// Emitted body
    pub body: MethodBody,
    /// Number of call sites replaced by an intrinsic
    pub intrinsics_applied: usize,
}

/// A compiled class
#[derive(Debug, Clone)]
pub struct CompiledClass {
    /// The compiled class
    pub class: ClassId,
    /// Methods in declaration order
    pub methods: Vec<CompiledMethod>,
}

impl CompiledClass {
    /// Look up a compiled method by name
    pub fn method(&self, name: &str) -> Option<&CompiledMethod> {
        self.methods.iter().find(|m| m.body.name == name)
    }

    /// Total substitutions across all methods
    pub fn intrinsics_applied(&self) -> usize {
        self.methods.iter().map(|m| m.intrinsics_applied).sum()
    }
}

/// State shared by every class compiled in one unit
pub struct CompilationUnit {
    registry: Arc<AccessorRegistry>,
    finish: FinishQueue,
    config: IntrinsicConfig,
}

impl CompilationUnit {
    /// Create a unit compiling against the registry's class table
    ///
    /// The registry may be shared between units of that table; accessors are
    /// then reused across them.
    pub fn new(registry: Arc<AccessorRegistry>, config: IntrinsicConfig) -> Self {
        Self {
            registry,
            finish: FinishQueue::new(),
            config,
        }
    }

    /// The class table
    pub fn classes(&self) -> &Arc<ClassTable> {
        self.registry.classes()
    }

    /// The accessor registry
    pub fn registry(&self) -> &Arc<AccessorRegistry> {
        &self.registry
    }

    /// The intrinsic configuration
    pub fn config(&self) -> &IntrinsicConfig {
        &self.config
    }

    /// Names of finish tasks registered so far
    pub fn pending_finish(&self) -> Vec<String> {
        self.finish.pending()
    }

    /// Compile every method of a class
    pub fn compile_class(&self, class_file: &ClassFile) -> Result<CompiledClass, CompileError> {
        let resolver = class_file.resolver(self.registry.classes());
        let methods = class_file
            .methods
            .iter()
            .map(|method| self.compile_method(class_file, &resolver, method))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(CompiledClass {
            class: class_file.this_class,
            methods,
        })
    }

    fn compile_method<R>(
        &self,
        class_file: &ClassFile,
        resolver: &R,
        method: &MethodDef,
    ) -> Result<CompiledMethod, CompileError>
    where
        R: ConstantResolver + ?Sized,
    {
        let code = &method.code;
        let flags = compute_flags(code, &method.handlers);
        let handler_entries: FxHashSet<u32> = method.handlers.iter().map(|h| h.handler).collect();
        let intrinsic = AtomicFieldIntrinsic::new(&self.registry, &self.finish, &self.config);

        let mut emitter = CodeEmitter::new();
        let mut applied = 0;

        for (index, instr) in code.iter().enumerate() {
            emitter.mark(index as u32);
            if handler_entries.contains(&(index as u32)) {
                // Handlers start with the thrown exception on the stack
                emitter.set_depth(1);
            }

            if !instr.opcode.is_invoke() {
                emitter.emit(instr.clone())?;
                continue;
            }

            let pool_index = instr.pool_index().ok_or(CompileError::MissingOperand {
                opcode: instr.opcode,
                index,
            })?;
            let callee = class_file.constant_pool.method_ref(pool_index)?;

            let kind = detect_intrinsic(&self.config, instr.opcode, callee.class, callee.name, callee.descriptor);
            if kind == Some(IntrinsicKind::AtomicFieldUpdater)
                && intrinsic.try_emit(class_file.this_class, resolver, &mut emitter, code, &flags, index)?
            {
                applied += 1;
                continue;
            }

            let descriptor = MethodDescriptor::parse(callee.descriptor)?;
            let receiver = u16::from(instr.opcode != Opcode::InvokeStatic);
            emitter.emit_with_effect(
                instr.clone(),
                descriptor.arg_count() + receiver,
                u16::from(descriptor.has_return()),
            )?;
        }

        let body = emitter.finish(method.name.as_str(), method.descriptor.as_str(), &method.handlers)?;
        if applied > 0 {
            log::debug!("{}: {} updater factory call(s) replaced", method.name, applied);
        }
        Ok(CompiledMethod {
            body,
            intrinsics_applied: applied,
        })
    }

    /// Run the finish tasks of every accessor generated by this unit
    pub fn finish(self) -> Result<usize, FinishError> {
        self.finish.run_all()
    }
}
