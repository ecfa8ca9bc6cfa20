//! Accessor Runtime
//!
//! A minimal runtime for executing emitted code:
//! - Heap of objects whose instance slots are atomic words
//! - Interpreter for method bodies produced by the code emitter
//! - Direct dispatch of accessor operations via [`AccessorOp`]
//!
//! [`AccessorOp`]: crate::compiler::AccessorOp

pub mod heap;
pub mod interpreter;
pub mod value;

pub use heap::Heap;
pub use interpreter::Interpreter;
pub use value::{ObjRef, Value};

use crate::compiler::bytecode::Opcode;

/// VM execution errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum VmError {
    /// Value is not an instance of the expected class
    #[error("Cannot cast {found} to {expected}")]
    ClassCast {
        /// Expected class name
        expected: String,
        /// Actual class or value kind
        found: String,
    },

    /// Class is still being defined and cannot be instantiated
    #[error("Type {0} is not finalized")]
    TypeNotFinalized(String),

    /// Class id not present in the class table
    #[error("Unknown class: {0}")]
    UnknownClass(String),

    /// Object reference not present in the heap
    #[error("Invalid object reference {0}")]
    InvalidReference(ObjRef),

    /// Accessor registry belongs to a different class table than the heap
    #[error("Accessor registry is bound to a different class table than the heap")]
    ForeignRegistry,

    /// Object is not an instance of a synthesized accessor
    #[error("Object {0} is not a field accessor")]
    NotAnAccessor(ObjRef),

    /// Null dereference
    #[error("Null reference at {0}")]
    NullReference(Opcode),

    /// Operand stack underflow
    #[error("Stack underflow at {0}")]
    StackUnderflow(Opcode),

    /// Stack entry of the wrong kind for an opcode
    #[error("{opcode} expects {expected}")]
    TypeMismatch {
        /// Executing opcode
        opcode: Opcode,
        /// Expected stack entry kind
        expected: &'static str,
    },

    /// Opcode operand of the wrong shape
    #[error("Malformed operand for {0}")]
    MalformedOperand(Opcode),

    /// Local or argument index out of range
    #[error("Local {0} out of range")]
    LocalOutOfRange(u16),

    /// Slot index out of range for the object
    #[error("Slot {slot} out of range for {object}")]
    SlotOutOfRange {
        /// Object accessed
        object: ObjRef,
        /// Slot index
        slot: u16,
    },

    /// Opcode the accessor runtime does not execute
    #[error("Unsupported opcode: {0}")]
    Unsupported(Opcode),

    /// Wrong number of arguments for an accessor operation
    #[error("{op} expects {expected} argument(s), got {found}")]
    ArgCount {
        /// Operation name
        op: &'static str,
        /// Expected argument count, receiver excluded
        expected: usize,
        /// Supplied argument count
        found: usize,
    },

    /// Execution ran past the end of the method body
    #[error("Fell off the end of {0}")]
    FellOffEnd(String),
}

/// VM execution result
pub type VmResult<T> = Result<T, VmError>;
