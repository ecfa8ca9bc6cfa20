//! fieldcas Engine
//!
//! This crate provides the atomic field-updater intrinsic of a bytecode
//! compilation pipeline:
//! - **Compiler**: instruction model, class table, code emission, the
//!   intrinsic matcher/synthesizer and the compilation unit driver
//!   (`compiler` module)
//! - **Config**: intrinsic configuration (`config` module)
//! - **VM**: heap and interpreter used to run emitted accessor code (`vm` module)
//!
//! # Example
//!
//! ```rust,ignore
//! use fieldcas_engine::{ClassTable, CompilationUnit, AccessorRegistry, IntrinsicConfig};
//!
//! let classes = Arc::new(ClassTable::with_builtins());
//! let registry = Arc::new(AccessorRegistry::new(classes));
//! let unit = CompilationUnit::new(registry, IntrinsicConfig::default());
//!
//! let compiled = unit.compile_class(&class_file)?;
//! unit.finish()?;
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

// ============================================================================
// Core Modules
// ============================================================================

/// Compiler module: bytecode model, types, emission, intrinsics and driver
pub mod compiler;

/// Intrinsic configuration
pub mod config;

/// VM module: heap and interpreter for emitted code
pub mod vm;

// ============================================================================
// Re-exports from Compiler
// ============================================================================

pub use compiler::{
    // Bytecode
    compute_flags, ConstantPool, ExceptionHandler, Instruction, InstructionFlags, Opcode, Operand,
    // Types
    ClassId, ClassTable, FieldKey, FieldRef, TypeHandle, TypeKind,
    // Class files
    ClassFile, ConstantResolver, MethodDef,
    // Code generation
    CodeEmitter, EmitError, MethodBody,
    // Intrinsics
    AccessorOp, AccessorRegistry, AccessorType, AtomicFieldIntrinsic, IntrinsicError,
    // Finalization
    FinishError, FinishQueue,
    // Driver
    CompilationUnit, CompileError, CompiledClass, CompiledMethod,
};

pub use config::{ConfigError, IntrinsicConfig};

pub use vm::{Heap, Interpreter, ObjRef, Value, VmError};
