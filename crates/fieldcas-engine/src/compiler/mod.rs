//! Compiler module
//!
//! The instruction model the pipeline hands to intrinsics, the class table
//! used for resolution, the code emitter, the atomic field-updater intrinsic
//! and the compilation unit driver that ties them together.

pub mod bytecode;
pub mod class_file;
pub mod codegen;
pub mod finish;
pub mod intrinsic;
pub mod types;
pub mod unit;

pub use bytecode::{
    compute_flags, ConstantPool, ExceptionHandler, Instruction, InstructionFlags, Opcode, Operand,
};
pub use class_file::{ClassFile, ConstantResolver, MethodDef};
pub use codegen::{CodeEmitter, EmitError, MethodBody};
pub use finish::{FinishError, FinishQueue};
pub use intrinsic::atomic_field::{
    AccessorOp, AccessorRegistry, AccessorType, AtomicFieldIntrinsic, IntrinsicError,
};
pub use types::{ClassId, ClassTable, FieldKey, FieldRef, TypeHandle, TypeKind};
pub use unit::{CompilationUnit, CompileError, CompiledClass, CompiledMethod};
