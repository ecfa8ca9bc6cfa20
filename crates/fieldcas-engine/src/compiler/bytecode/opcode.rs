//! Normalized opcodes
//!
//! The decoder collapses wide/short forms of the input bytecode into one
//! opcode per operation. Emitted code (call-site rewrites and synthesized
//! accessor bodies) uses the same enumeration, so every code sequence the
//! pipeline handles can be inspected and executed uniformly.

use std::fmt;

/// Normalized opcode enumeration
///
/// Opcodes are organized into categories:
/// - 0x00-0x0F: Stack manipulation & constants
/// - 0x10-0x1F: Locals and arguments
/// - 0x20-0x2F: Field access
/// - 0x30-0x3F: Object creation & casts
/// - 0x40-0x4F: Calls
/// - 0x50-0x5F: Atomics & memory ordering
/// - 0x60-0x6F: Control flow
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    // ===== Stack Manipulation & Constants (0x00-0x0F) =====
    /// No operation
    Nop = 0x00,
    /// Pop top value from stack
    Pop = 0x01,
    /// Duplicate top stack value
    Dup = 0x02,
    /// Push null reference
    AconstNull = 0x03,
    /// Load constant from constant pool (operand: pool index)
    Ldc = 0x04,
    /// Push 32-bit integer constant (operand: i32)
    Iconst = 0x05,

    // ===== Locals and Arguments (0x10-0x1F) =====
    /// Load reference from local variable (operand: local index)
    Aload = 0x10,
    /// Store reference to local variable (operand: local index)
    Astore = 0x11,
    /// Load method argument (operand: argument index, 0 = receiver)
    LoadArg = 0x12,

    // ===== Field Access (0x20-0x2F) =====
    /// Load instance field: pop obj, push obj.field (operand: field)
    GetField = 0x20,
    /// Store instance field: pop value, pop obj (operand: field)
    PutField = 0x21,
    /// Push the address of an instance field: pop obj, push &obj.field
    LoadFieldAddress = 0x22,
    /// Acquire-ordered field load: pop obj, push obj.field
    VolatileLoadField = 0x23,
    /// Release-ordered field store: pop value, pop obj
    VolatileStoreField = 0x24,

    // ===== Object Creation & Casts (0x30-0x3F) =====
    /// Allocate an uninitialized instance (operand: pool index of class)
    New = 0x30,
    /// Allocate and construct with the no-argument constructor (operand: class)
    NewObject = 0x31,
    /// Checked reference cast: pop ref, push ref (operand: class)
    CastClass = 0x32,

    // ===== Calls (0x40-0x4F) =====
    /// Static call (operand: pool index of method ref)
    InvokeStatic = 0x40,
    /// Virtual call (operand: pool index of method ref)
    InvokeVirtual = 0x41,
    /// Non-virtual call: constructors, private and super methods
    InvokeSpecial = 0x42,
    /// Call the base class no-argument constructor: pop this (operand: class)
    CallBaseConstructor = 0x43,

    // ===== Atomics & Memory Ordering (0x50-0x5F) =====
    /// Atomic compare-and-exchange: pop comparand, pop value, pop address,
    /// push previous value (operand: field type)
    CompareExchange = 0x50,
    /// Full memory fence
    MemoryBarrier = 0x51,
    /// Reference/value equality: pop b, pop a, push a == b
    Ceq = 0x52,

    // ===== Control Flow (0x60-0x6F) =====
    /// Unconditional jump (operand: target instruction index)
    Goto = 0x60,
    /// Jump if null: pop value (operand: target instruction index)
    IfNull = 0x61,
    /// Jump if not null: pop value (operand: target instruction index)
    IfNonNull = 0x62,
    /// Return from a void method
    Return = 0x63,
    /// Return top of stack
    ReturnValue = 0x64,
    /// Throw top of stack
    Throw = 0x65,
}

impl Opcode {
    /// Convert a byte to an opcode
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(Self::Nop),
            0x01 => Some(Self::Pop),
            0x02 => Some(Self::Dup),
            0x03 => Some(Self::AconstNull),
            0x04 => Some(Self::Ldc),
            0x05 => Some(Self::Iconst),
            0x10 => Some(Self::Aload),
            0x11 => Some(Self::Astore),
            0x12 => Some(Self::LoadArg),
            0x20 => Some(Self::GetField),
            0x21 => Some(Self::PutField),
            0x22 => Some(Self::LoadFieldAddress),
            0x23 => Some(Self::VolatileLoadField),
            0x24 => Some(Self::VolatileStoreField),
            0x30 => Some(Self::New),
            0x31 => Some(Self::NewObject),
            0x32 => Some(Self::CastClass),
            0x40 => Some(Self::InvokeStatic),
            0x41 => Some(Self::InvokeVirtual),
            0x42 => Some(Self::InvokeSpecial),
            0x43 => Some(Self::CallBaseConstructor),
            0x50 => Some(Self::CompareExchange),
            0x51 => Some(Self::MemoryBarrier),
            0x52 => Some(Self::Ceq),
            0x60 => Some(Self::Goto),
            0x61 => Some(Self::IfNull),
            0x62 => Some(Self::IfNonNull),
            0x63 => Some(Self::Return),
            0x64 => Some(Self::ReturnValue),
            0x65 => Some(Self::Throw),
            _ => None,
        }
    }

    /// Convert opcode to byte
    #[inline]
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Fixed operand-stack effect as `(pops, pushes)`.
    ///
    /// Returns `None` for calls through a method ref, whose effect depends on
    /// the callee descriptor.
    pub fn stack_effect(self) -> Option<(u16, u16)> {
        let effect = match self {
            Self::Nop | Self::MemoryBarrier | Self::Goto | Self::Return => (0, 0),
            Self::Pop | Self::Astore | Self::IfNull | Self::IfNonNull => (1, 0),
            Self::ReturnValue | Self::Throw | Self::CallBaseConstructor => (1, 0),
            Self::Dup => (1, 2),
            Self::AconstNull | Self::Ldc | Self::Iconst => (0, 1),
            Self::Aload | Self::LoadArg | Self::New | Self::NewObject => (0, 1),
            Self::GetField | Self::LoadFieldAddress | Self::VolatileLoadField => (1, 1),
            Self::CastClass => (1, 1),
            Self::PutField | Self::VolatileStoreField => (2, 0),
            Self::Ceq => (2, 1),
            Self::CompareExchange => (3, 1),
            Self::InvokeStatic | Self::InvokeVirtual | Self::InvokeSpecial => return None,
        };
        Some(effect)
    }

    /// Whether this opcode is a jump whose operand names a target instruction
    pub fn is_branch(self) -> bool {
        matches!(self, Self::Goto | Self::IfNull | Self::IfNonNull)
    }

    /// Whether control never falls through to the next instruction
    pub fn is_terminator(self) -> bool {
        matches!(self, Self::Goto | Self::Return | Self::ReturnValue | Self::Throw)
    }

    /// Whether this opcode is a call through a constant-pool method ref
    pub fn is_invoke(self) -> bool {
        matches!(self, Self::InvokeStatic | Self::InvokeVirtual | Self::InvokeSpecial)
    }

    /// Get the opcode mnemonic
    pub fn name(self) -> &'static str {
        match self {
            Self::Nop => "nop",
            Self::Pop => "pop",
            Self::Dup => "dup",
            Self::AconstNull => "aconst_null",
            Self::Ldc => "ldc",
            Self::Iconst => "iconst",
            Self::Aload => "aload",
            Self::Astore => "astore",
            Self::LoadArg => "ldarg",
            Self::GetField => "getfield",
            Self::PutField => "putfield",
            Self::LoadFieldAddress => "ldflda",
            Self::VolatileLoadField => "volatile.ldfld",
            Self::VolatileStoreField => "volatile.stfld",
            Self::New => "new",
            Self::NewObject => "newobj",
            Self::CastClass => "castclass",
            Self::InvokeStatic => "invokestatic",
            Self::InvokeVirtual => "invokevirtual",
            Self::InvokeSpecial => "invokespecial",
            Self::CallBaseConstructor => "call.basector",
            Self::CompareExchange => "cmpxchg",
            Self::MemoryBarrier => "membar",
            Self::Ceq => "ceq",
            Self::Goto => "goto",
            Self::IfNull => "ifnull",
            Self::IfNonNull => "ifnonnull",
            Self::Return => "return",
            Self::ReturnValue => "areturn",
            Self::Throw => "throw",
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_roundtrip_bytes() {
        for byte in 0..=u8::MAX {
            if let Some(op) = Opcode::from_u8(byte) {
                assert_eq!(op.to_u8(), byte);
            }
        }
        assert_eq!(Opcode::from_u8(0xFF), None);
    }

    #[test]
    fn test_stack_effects() {
        assert_eq!(Opcode::Ldc.stack_effect(), Some((0, 1)));
        assert_eq!(Opcode::Pop.stack_effect(), Some((1, 0)));
        assert_eq!(Opcode::CompareExchange.stack_effect(), Some((3, 1)));
        assert_eq!(Opcode::NewObject.stack_effect(), Some((0, 1)));
        assert_eq!(Opcode::InvokeStatic.stack_effect(), None);
    }

    #[test]
    fn test_branch_classification() {
        assert!(Opcode::Goto.is_branch());
        assert!(Opcode::IfNull.is_branch());
        assert!(!Opcode::Return.is_branch());
        assert!(Opcode::Return.is_terminator());
        assert!(!Opcode::IfNonNull.is_terminator());
        assert!(Opcode::InvokeSpecial.is_invoke());
    }
}
