//! Per-instruction flags derived from control flow
//!
//! A branch target is any instruction control can reach other than by
//! falling through from its textual predecessor: jump targets and
//! exception-handler entries. Peephole intrinsics use the flag to make sure a
//! window of instructions is a single straight-line sequence.

use std::ops::{BitOr, BitOrAssign};

use super::instruction::Instruction;

/// Bit set of instruction properties
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct InstructionFlags(u8);

impl InstructionFlags {
    /// No flags set
    pub const NONE: Self = Self(0);
    /// Control can enter at this instruction from somewhere other than its predecessor
    pub const BRANCH_TARGET: Self = Self(1 << 0);
    /// Instruction is reachable from the method entry
    pub const REACHABLE: Self = Self(1 << 1);

    /// Whether every bit of `other` is set
    #[inline]
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether this instruction is a branch target
    #[inline]
    pub fn is_branch_target(self) -> bool {
        self.contains(Self::BRANCH_TARGET)
    }

    /// Set the bits of `other`
    #[inline]
    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }
}

impl BitOr for InstructionFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for InstructionFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.insert(rhs);
    }
}

/// Exception handler range, as instruction indices
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionHandler {
    /// First protected instruction
    pub start: u32,
    /// One past the last protected instruction
    pub end: u32,
    /// Handler entry instruction
    pub handler: u32,
}

/// Compute flags for every instruction of a method body
///
/// Targets outside the code are ignored; malformed jumps are the verifier's
/// concern.
pub fn compute_flags(code: &[Instruction], handlers: &[ExceptionHandler]) -> Vec<InstructionFlags> {
    let mut flags = vec![InstructionFlags::NONE; code.len()];

    for instr in code {
        if instr.opcode.is_branch() {
            if let Some(target) = instr.target() {
                mark_target(&mut flags, target);
            }
        }
    }
    for handler in handlers {
        mark_target(&mut flags, handler.handler);
    }

    mark_reachable(code, handlers, &mut flags);
    flags
}

fn mark_target(flags: &mut [InstructionFlags], target: u32) {
    if let Some(f) = flags.get_mut(target as usize) {
        f.insert(InstructionFlags::BRANCH_TARGET);
    }
}

/// Worklist walk from the entry and every handler
fn mark_reachable(code: &[Instruction], handlers: &[ExceptionHandler], flags: &mut [InstructionFlags]) {
    let mut worklist: Vec<usize> = Vec::new();
    if !code.is_empty() {
        worklist.push(0);
    }
    worklist.extend(
        handlers
            .iter()
            .map(|h| h.handler as usize)
            .filter(|&h| h < code.len()),
    );

    while let Some(index) = worklist.pop() {
        if flags[index].contains(InstructionFlags::REACHABLE) {
            continue;
        }
        flags[index].insert(InstructionFlags::REACHABLE);

        let instr = &code[index];
        if instr.opcode.is_branch() {
            if let Some(target) = instr.target() {
                if (target as usize) < code.len() {
                    worklist.push(target as usize);
                }
            }
        }
        if !instr.opcode.is_terminator() && index + 1 < code.len() {
            worklist.push(index + 1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::bytecode::Opcode;

    #[test]
    fn test_straight_line_has_no_targets() {
        let code = vec![
            Instruction::ldc(0),
            Instruction::ldc(1),
            Instruction::simple(Opcode::Pop),
            Instruction::simple(Opcode::Return),
        ];
        let flags = compute_flags(&code, &[]);
        assert!(flags.iter().all(|f| !f.is_branch_target()));
        assert!(flags.iter().all(|f| f.contains(InstructionFlags::REACHABLE)));
    }

    #[test]
    fn test_jump_targets_are_marked() {
        let code = vec![
            Instruction::simple(Opcode::AconstNull),
            Instruction::jump(Opcode::IfNull, 3),
            Instruction::simple(Opcode::Nop),
            Instruction::simple(Opcode::Nop),
            Instruction::jump(Opcode::Goto, 1),
        ];
        let flags = compute_flags(&code, &[]);
        assert!(!flags[0].is_branch_target());
        assert!(flags[1].is_branch_target());
        assert!(!flags[2].is_branch_target());
        assert!(flags[3].is_branch_target());
        assert!(!flags[4].is_branch_target());
    }

    #[test]
    fn test_handler_entry_is_marked() {
        let code = vec![
            Instruction::simple(Opcode::Nop),
            Instruction::simple(Opcode::Return),
            Instruction::simple(Opcode::Throw),
        ];
        let handlers = [ExceptionHandler { start: 0, end: 1, handler: 2 }];
        let flags = compute_flags(&code, &handlers);
        assert!(flags[2].is_branch_target());
        assert!(flags[2].contains(InstructionFlags::REACHABLE));
    }

    #[test]
    fn test_dead_code_is_unreachable() {
        let code = vec![
            Instruction::simple(Opcode::Return),
            Instruction::simple(Opcode::Nop),
        ];
        let flags = compute_flags(&code, &[]);
        assert!(flags[0].contains(InstructionFlags::REACHABLE));
        assert!(!flags[1].contains(InstructionFlags::REACHABLE));
    }

    #[test]
    fn test_out_of_range_target_is_ignored() {
        let code = vec![Instruction::jump(Opcode::Goto, 40)];
        let flags = compute_flags(&code, &[]);
        assert_eq!(flags.len(), 1);
        assert!(!flags[0].is_branch_target());
    }
}
