//! Decoded instructions with typed operands

use std::fmt;

use super::opcode::Opcode;
use crate::compiler::types::{ClassId, FieldRef};

/// Typed operand for each instruction format
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// No operand (Pop, Dup, Ceq, Return, etc.)
    None,
    /// Constant pool index (Ldc, New, Invoke*)
    Pool(u32),
    /// Local variable or argument index (Aload, Astore, LoadArg)
    Local(u16),
    /// Immediate integer (Iconst)
    Int(i32),
    /// Branch target as an instruction index (Goto, IfNull, IfNonNull)
    Target(u32),
    /// Resolved class (NewObject, CastClass, CompareExchange, CallBaseConstructor)
    Class(ClassId),
    /// Resolved instance field (GetField, PutField, field address and volatile access)
    Field(FieldRef),
}

/// A single normalized instruction
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    /// The opcode
    pub opcode: Opcode,
    /// The operand
    pub operand: Operand,
}

impl Instruction {
    /// Create an instruction from its parts
    pub fn new(opcode: Opcode, operand: Operand) -> Self {
        Self { opcode, operand }
    }

    /// Create an instruction without operand
    pub fn simple(opcode: Opcode) -> Self {
        Self::new(opcode, Operand::None)
    }

    /// `ldc` of a constant pool entry
    pub fn ldc(index: u32) -> Self {
        Self::new(Opcode::Ldc, Operand::Pool(index))
    }

    /// Call through a constant pool method ref
    pub fn invoke(opcode: Opcode, method_ref: u32) -> Self {
        debug_assert!(opcode.is_invoke());
        Self::new(opcode, Operand::Pool(method_ref))
    }

    /// Jump to an instruction index
    pub fn jump(opcode: Opcode, target: u32) -> Self {
        debug_assert!(opcode.is_branch());
        Self::new(opcode, Operand::Target(target))
    }

    /// Instruction taking a local or argument index
    pub fn local(opcode: Opcode, index: u16) -> Self {
        Self::new(opcode, Operand::Local(index))
    }

    /// Instruction taking a resolved class
    pub fn class(opcode: Opcode, class: ClassId) -> Self {
        Self::new(opcode, Operand::Class(class))
    }

    /// Instruction taking a resolved field
    pub fn field(opcode: Opcode, field: FieldRef) -> Self {
        Self::new(opcode, Operand::Field(field))
    }

    /// Constant pool index, if the operand is one
    pub fn pool_index(&self) -> Option<u32> {
        match self.operand {
            Operand::Pool(index) => Some(index),
            _ => None,
        }
    }

    /// Branch target, if the operand is one
    pub fn target(&self) -> Option<u32> {
        match self.operand {
            Operand::Target(target) => Some(target),
            _ => None,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.operand {
            Operand::None => write!(f, "{}", self.opcode),
            Operand::Pool(index) => write!(f, "{} #{}", self.opcode, index),
            Operand::Local(index) => write!(f, "{} {}", self.opcode, index),
            Operand::Int(value) => write!(f, "{} {}", self.opcode, value),
            Operand::Target(target) => write!(f, "{} @{}", self.opcode, target),
            Operand::Class(class) => write!(f, "{} {}", self.opcode, class),
            Operand::Field(field) => write!(f, "{} {}", self.opcode, field),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operand_accessors() {
        let ldc = Instruction::ldc(7);
        assert_eq!(ldc.pool_index(), Some(7));
        assert_eq!(ldc.target(), None);

        let jump = Instruction::jump(Opcode::Goto, 3);
        assert_eq!(jump.target(), Some(3));
        assert_eq!(jump.pool_index(), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(Instruction::ldc(2).to_string(), "ldc #2");
        assert_eq!(Instruction::jump(Opcode::IfNull, 9).to_string(), "ifnull @9");
        assert_eq!(Instruction::simple(Opcode::Pop).to_string(), "pop");
    }
}
