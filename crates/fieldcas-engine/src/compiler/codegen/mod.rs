//! Code generation
//!
//! Instruction emission with an operand-stack model, used both for rewriting
//! method bodies and for building the bodies of synthesized methods.

pub mod emit;

pub use emit::{CodeEmitter, EmitError, MethodBody};
