//! Idiom matcher
//!
//! Recognizes
//!
//! ```text
//! ldc <owner class>
//! ldc <value class>
//! ldc "<field name>"
//! invokestatic newUpdater      <- position
//! ```
//!
//! and checks that the constants name a field the accessor can serve.
//! Matching is speculative: it is attempted at every factory call, has no
//! side effects and never fails with an error.

use crate::compiler::bytecode::{Instruction, InstructionFlags, Opcode};
use crate::compiler::class_file::ConstantResolver;
use crate::compiler::types::{ClassId, ClassTable, FieldRef};

/// Instructions before `position` that belong to the idiom
const WINDOW: usize = 3;

/// Match the idiom ending at `position` and return the target field
pub fn match_idiom<R>(
    this_class: ClassId,
    resolver: &R,
    classes: &ClassTable,
    code: &[Instruction],
    flags: &[InstructionFlags],
    position: usize,
) -> Option<FieldRef>
where
    R: ConstantResolver + ?Sized,
{
    if position < WINDOW || position >= code.len() || position >= flags.len() {
        return None;
    }

    // Control entering mid-window means the loads may not feed this call
    if flags[position - WINDOW..=position]
        .iter()
        .any(|f| f.is_branch_target())
    {
        log::trace!("atomic field idiom at {}: window contains a branch target", position);
        return None;
    }

    let owner_load = &code[position - 3];
    let value_load = &code[position - 2];
    let name_load = &code[position - 1];
    if [owner_load, value_load, name_load]
        .iter()
        .any(|instr| instr.opcode != Opcode::Ldc)
    {
        return None;
    }

    let owner = resolver.class_constant(owner_load.pool_index()?)?;
    let value_type = resolver.class_constant(value_load.pool_index()?)?;
    let field_name = resolver.string_constant(name_load.pool_index()?)?;

    if owner.id() != Some(this_class) {
        log::trace!("atomic field idiom at {}: owner {} is not the compiled class", position, owner.name());
        return None;
    }
    if value_type.is_unloadable() || value_type.is_primitive() || value_type.is_non_primitive_value_type() {
        log::trace!("atomic field idiom at {}: value type {} is not a reference type", position, value_type.name());
        return None;
    }
    let value_class = value_type.id()?;

    let field = classes.get_field(this_class, field_name, value_type.sig_name())?;
    let eligible = !field.is_static()
        && field.is_volatile()
        && field.declaring_type() == this_class
        && field.field_type() == value_class;
    if !eligible {
        log::trace!("atomic field idiom at {}: field {} is not eligible", position, field);
        return None;
    }

    Some(field)
}
