//! Accessor synthesis
//!
//! Generates the nested accessor type for a field and the replacement call
//! site. Generated bodies use direct field access:
//!
//! - `compareAndSet` is one hardware compare-and-exchange on the field slot
//! - `get` is an acquire load
//! - `set` is a release store followed by a full fence, so later writes of
//!   the same thread cannot become visible before it

use std::sync::Arc;

use super::accessor::{AccessorOp, AccessorType};
use super::IntrinsicError;
use crate::compiler::bytecode::{Instruction, Opcode};
use crate::compiler::codegen::{CodeEmitter, EmitError, MethodBody};
use crate::compiler::finish::{FinishError, FinishQueue};
use crate::compiler::types::{ClassAttributes, ClassId, ClassTable, FieldRef, TypeError, Visibility};

/// Generate an accessor type for `field` and register its finish task
pub(super) fn generate(
    classes: &Arc<ClassTable>,
    finish: &FinishQueue,
    base_type: &str,
    field: &FieldRef,
) -> Result<Arc<AccessorType>, IntrinsicError> {
    let base = classes
        .load_class_critical(base_type)
        .map_err(|source| IntrinsicError::BaseTypeMissing {
            name: base_type.to_string(),
            source,
        })?;

    let simple_name = format!("{}{}{}", NAME_PREFIX, field.name(), field.signature().replace('.', "/"));
    let class = define_accessor_class(classes, field.declaring_type(), &simple_name, base)?;
    let name = classes
        .name(class)
        .unwrap_or_else(|| Arc::from(simple_name.as_str()));

    let methods = [
        emit_compare_and_set(field)?,
        emit_get(field)?,
        emit_set(field)?,
    ];
    let constructor = emit_constructor(base)?;

    let accessor = Arc::new(AccessorType::new(
        class,
        name.clone(),
        base,
        field.clone(),
        methods,
        constructor,
    ));
    log::debug!("synthesized accessor {} for field {}", name, field);

    let task_classes = classes.clone();
    let task_accessor = accessor.clone();
    finish.register(format!("finish {}", name), move || {
        task_classes
            .finish_class(base)
            .map_err(|source| FinishError::Type {
                task: task_accessor.name().to_string(),
                source,
            })?;
        task_accessor.create_type(&task_classes)
    });

    Ok(accessor)
}

/// Prefix of accessor type names; `<` cannot appear in a source identifier
const NAME_PREFIX: &str = "__<AtomicField>$";

/// Define the nested accessor class, suffixing the name if the owner already
/// has a class of that name
fn define_accessor_class(
    classes: &ClassTable,
    owner: ClassId,
    simple_name: &str,
    base: ClassId,
) -> Result<ClassId, IntrinsicError> {
    let attributes = ClassAttributes {
        visibility: Visibility::NestedPrivate,
        sealed: true,
    };
    let mut candidate = simple_name.to_string();
    let mut attempt = 0u32;
    loop {
        match classes.define_nested_type(owner, &candidate, base, attributes) {
            Err(TypeError::DuplicateClass(taken)) => {
                log::debug!("accessor name {} taken, retrying", taken);
                attempt += 1;
                candidate = format!("{}${}", simple_name, attempt);
            }
            result => return result.map_err(IntrinsicError::DefineType),
        }
    }
}

fn emit_compare_and_set(field: &FieldRef) -> Result<MethodBody, EmitError> {
    let op = AccessorOp::CompareAndSet;
    let field_type = field.field_type();
    let mut emitter = CodeEmitter::new();
    emitter.emit_all([
        Instruction::local(Opcode::LoadArg, 1),
        Instruction::class(Opcode::CastClass, field.declaring_type()),
        Instruction::field(Opcode::LoadFieldAddress, field.clone()),
        Instruction::local(Opcode::LoadArg, 3),
        Instruction::class(Opcode::CastClass, field_type),
        Instruction::local(Opcode::LoadArg, 2),
        Instruction::class(Opcode::CastClass, field_type),
        Instruction::class(Opcode::CompareExchange, field_type),
        // previous value == expected
        Instruction::local(Opcode::LoadArg, 2),
        Instruction::simple(Opcode::Ceq),
        Instruction::simple(Opcode::ReturnValue),
    ])?;
    emitter.finish(op.name(), op.descriptor(), &[])
}

fn emit_get(field: &FieldRef) -> Result<MethodBody, EmitError> {
    let op = AccessorOp::Get;
    let mut emitter = CodeEmitter::new();
    emitter.emit_all([
        Instruction::local(Opcode::LoadArg, 1),
        Instruction::class(Opcode::CastClass, field.declaring_type()),
        Instruction::field(Opcode::VolatileLoadField, field.clone()),
        Instruction::simple(Opcode::ReturnValue),
    ])?;
    emitter.finish(op.name(), op.descriptor(), &[])
}

fn emit_set(field: &FieldRef) -> Result<MethodBody, EmitError> {
    let op = AccessorOp::Set;
    let mut emitter = CodeEmitter::new();
    emitter.emit_all([
        Instruction::local(Opcode::LoadArg, 1),
        Instruction::class(Opcode::CastClass, field.declaring_type()),
        Instruction::local(Opcode::LoadArg, 2),
        Instruction::class(Opcode::CastClass, field.field_type()),
        Instruction::field(Opcode::VolatileStoreField, field.clone()),
        Instruction::simple(Opcode::MemoryBarrier),
        Instruction::simple(Opcode::Return),
    ])?;
    emitter.finish(op.name(), op.descriptor(), &[])
}

fn emit_constructor(base: ClassId) -> Result<MethodBody, EmitError> {
    let mut emitter = CodeEmitter::new();
    emitter.emit_all([
        Instruction::local(Opcode::LoadArg, 0),
        Instruction::class(Opcode::CallBaseConstructor, base),
        Instruction::simple(Opcode::Return),
    ])?;
    emitter.finish("<init>", "()V", &[])
}

/// Replace the factory call: drop the three constants and construct the accessor
///
/// The net effect on the stack matches the factory call (one reference).
pub fn emit_construction_call(emitter: &mut CodeEmitter, accessor: &AccessorType) -> Result<(), EmitError> {
    emitter.emit_all([
        Instruction::simple(Opcode::Pop),
        Instruction::simple(Opcode::Pop),
        Instruction::simple(Opcode::Pop),
        Instruction::class(Opcode::NewObject, accessor.class()),
    ])
}
