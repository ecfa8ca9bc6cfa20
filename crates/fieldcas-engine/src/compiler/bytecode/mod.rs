//! Normalized Bytecode Definitions
//!
//! This module provides the instruction set shared by decoded method bodies
//! and emitted code, the constant pool, method descriptors and the
//! per-instruction flags computed from control flow.

pub mod constants;
pub mod descriptor;
pub mod flags;
pub mod instruction;
pub mod opcode;

pub use constants::{Constant, ConstantPool, ConstantPoolError};
pub use descriptor::{DescriptorError, MethodDescriptor};
pub use flags::{compute_flags, ExceptionHandler, InstructionFlags};
pub use instruction::{Instruction, Operand};
pub use opcode::Opcode;
