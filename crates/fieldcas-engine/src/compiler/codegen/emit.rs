//! Instruction emitter
//!
//! Tracks the generation-time operand stack so every emitted sequence can be
//! checked for underflow and sized. When re-emitting an existing method,
//! input instruction indices are recorded as labels and branch operands and
//! handler ranges are rewritten to output indices on [`CodeEmitter::finish`].

use rustc_hash::FxHashMap;

use crate::compiler::bytecode::{ExceptionHandler, Instruction, Opcode, Operand};

/// Error during emission
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EmitError {
    #[error("Stack underflow at {opcode}: depth {depth}, needs {needed}")]
    StackUnderflow { opcode: Opcode, depth: u16, needed: u16 },
    #[error("{0} has no fixed stack effect")]
    VariableStackEffect(Opcode),
    #[error("Branch or handler refers to unknown instruction {0}")]
    UndefinedLabel(u32),
}

/// A finished method body
#[derive(Debug, Clone, PartialEq)]
pub struct MethodBody {
    /// Method name
    pub name: String,
    /// Method descriptor
    pub descriptor: String,
    /// Emitted instructions
    pub code: Vec<Instruction>,
    /// Exception handlers in output indices
    pub handlers: Vec<ExceptionHandler>,
    /// Maximum operand stack depth
    pub max_stack: u16,
}

/// Instruction emitter with an operand-stack model
#[derive(Debug, Default)]
pub struct CodeEmitter {
    code: Vec<Instruction>,
    depth: u16,
    max_depth: u16,
    /// Input instruction index -> output instruction index
    labels: FxHashMap<u32, u32>,
    /// Stack depth recorded at each branch, keyed by input target
    branch_depths: FxHashMap<u32, u16>,
    after_terminator: bool,
}

impl CodeEmitter {
    /// Create an empty emitter
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that input instruction `input_index` starts at the current position
    pub fn mark(&mut self, input_index: u32) {
        self.labels.insert(input_index, self.code.len() as u32);
        if self.after_terminator {
            self.depth = self.branch_depths.get(&input_index).copied().unwrap_or(0);
            self.after_terminator = false;
        }
    }

    /// Override the modelled depth, e.g. at a handler entry
    pub fn set_depth(&mut self, depth: u16) {
        self.depth = depth;
        self.max_depth = self.max_depth.max(depth);
        self.after_terminator = false;
    }

    /// Emit an instruction with a fixed stack effect
    pub fn emit(&mut self, instr: Instruction) -> Result<(), EmitError> {
        let (pops, pushes) = instr
            .opcode
            .stack_effect()
            .ok_or(EmitError::VariableStackEffect(instr.opcode))?;
        self.emit_with_effect(instr, pops, pushes)
    }

    /// Emit an instruction with an explicit stack effect
    pub fn emit_with_effect(&mut self, instr: Instruction, pops: u16, pushes: u16) -> Result<(), EmitError> {
        if self.depth < pops {
            return Err(EmitError::StackUnderflow {
                opcode: instr.opcode,
                depth: self.depth,
                needed: pops,
            });
        }
        self.depth -= pops;

        if instr.opcode.is_branch() {
            if let Operand::Target(target) = instr.operand {
                self.branch_depths.entry(target).or_insert(self.depth);
            }
        }

        self.depth += pushes;
        self.max_depth = self.max_depth.max(self.depth);
        self.after_terminator = instr.opcode.is_terminator();
        self.code.push(instr);
        Ok(())
    }

    /// Emit a sequence of fixed-effect instructions
    pub fn emit_all(&mut self, instrs: impl IntoIterator<Item = Instruction>) -> Result<(), EmitError> {
        instrs.into_iter().try_for_each(|instr| self.emit(instr))
    }

    /// Current modelled stack depth
    pub fn depth(&self) -> u16 {
        self.depth
    }

    /// Maximum depth seen so far
    pub fn max_depth(&self) -> u16 {
        self.max_depth
    }

    /// Instructions emitted so far
    pub fn code(&self) -> &[Instruction] {
        &self.code
    }

    /// Finish emission, rewriting branch targets and handler ranges
    pub fn finish(
        mut self,
        name: impl Into<String>,
        descriptor: impl Into<String>,
        handlers: &[ExceptionHandler],
    ) -> Result<MethodBody, EmitError> {
        // Past-the-end label for handler ranges that cover the last instruction
        let end = self.code.len() as u32;
        let input_end = self.labels.keys().max().map_or(0, |&max| max + 1);
        self.labels.entry(input_end).or_insert(end);

        let labels = &self.labels;
        let remap = |index: u32| labels.get(&index).copied().ok_or(EmitError::UndefinedLabel(index));

        for instr in &mut self.code {
            if instr.opcode.is_branch() {
                if let Operand::Target(target) = instr.operand {
                    instr.operand = Operand::Target(remap(target)?);
                }
            }
        }

        let handlers = handlers
            .iter()
            .map(|h| {
                Ok(ExceptionHandler {
                    start: remap(h.start)?,
                    end: remap(h.end)?,
                    handler: remap(h.handler)?,
                })
            })
            .collect::<Result<Vec<_>, EmitError>>()?;

        Ok(MethodBody {
            name: name.into(),
            descriptor: descriptor.into(),
            code: self.code,
            handlers,
            max_stack: self.max_depth,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stack_model() {
        let mut emitter = CodeEmitter::new();
        emitter.emit(Instruction::ldc(0)).unwrap();
        emitter.emit(Instruction::ldc(1)).unwrap();
        assert_eq!(emitter.depth(), 2);

        emitter.emit(Instruction::simple(Opcode::Pop)).unwrap();
        emitter.emit(Instruction::simple(Opcode::Dup)).unwrap();
        assert_eq!(emitter.depth(), 2);
        assert_eq!(emitter.max_depth(), 2);
    }

    #[test]
    fn test_underflow() {
        let mut emitter = CodeEmitter::new();
        let err = emitter.emit(Instruction::simple(Opcode::Pop)).unwrap_err();
        assert_eq!(
            err,
            EmitError::StackUnderflow {
                opcode: Opcode::Pop,
                depth: 0,
                needed: 1
            }
        );
        assert!(emitter.code().is_empty());
    }

    #[test]
    fn test_invoke_needs_explicit_effect() {
        let mut emitter = CodeEmitter::new();
        let err = emitter
            .emit(Instruction::invoke(Opcode::InvokeStatic, 0))
            .unwrap_err();
        assert_eq!(err, EmitError::VariableStackEffect(Opcode::InvokeStatic));

        emitter
            .emit_with_effect(Instruction::invoke(Opcode::InvokeStatic, 0), 0, 1)
            .unwrap();
        assert_eq!(emitter.depth(), 1);
    }

    #[test]
    fn test_branch_remap() {
        // Input: 0 aconst_null, 1 ifnull @3, 2 goto @0, 3 return
        // Output inserts two nops before input 2.
        let mut emitter = CodeEmitter::new();
        emitter.mark(0);
        emitter.emit(Instruction::simple(Opcode::AconstNull)).unwrap();
        emitter.mark(1);
        emitter.emit(Instruction::jump(Opcode::IfNull, 3)).unwrap();
        emitter.mark(2);
        emitter.emit(Instruction::simple(Opcode::Nop)).unwrap();
        emitter.emit(Instruction::simple(Opcode::Nop)).unwrap();
        emitter.emit(Instruction::jump(Opcode::Goto, 0)).unwrap();
        emitter.mark(3);
        emitter.emit(Instruction::simple(Opcode::Return)).unwrap();

        let handlers = [ExceptionHandler { start: 1, end: 4, handler: 3 }];
        let body = emitter.finish("m", "()V", &handlers).unwrap();
        assert_eq!(body.code[1].target(), Some(5));
        assert_eq!(body.code[4].target(), Some(0));
        assert_eq!(
            body.handlers,
            vec![ExceptionHandler { start: 1, end: 6, handler: 5 }]
        );
        assert_eq!(body.max_stack, 1);
    }

    #[test]
    fn test_depth_after_terminator_comes_from_branch() {
        let mut emitter = CodeEmitter::new();
        emitter.mark(0);
        emitter.emit(Instruction::ldc(0)).unwrap();
        emitter.mark(1);
        emitter.emit(Instruction::jump(Opcode::Goto, 3)).unwrap();
        emitter.mark(2);
        assert_eq!(emitter.depth(), 0);
        emitter.emit(Instruction::simple(Opcode::Return)).unwrap();
        emitter.mark(3);
        assert_eq!(emitter.depth(), 1);
    }

    #[test]
    fn test_undefined_label() {
        let mut emitter = CodeEmitter::new();
        emitter.mark(0);
        emitter.emit(Instruction::jump(Opcode::Goto, 9)).unwrap();
        let err = emitter.finish("m", "()V", &[]).unwrap_err();
        assert_eq!(err, EmitError::UndefinedLabel(9));
    }
}
