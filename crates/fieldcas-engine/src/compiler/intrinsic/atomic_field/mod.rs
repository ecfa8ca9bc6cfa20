//! Atomic Field-Updater Intrinsic
//!
//! Replaces a reflective `newUpdater(Owner.class, Value.class, "field")`
//! call with construction of a synthesized accessor type whose
//! `compareAndSet`/`get`/`set` operate on the field directly.
//!
//! The substitution only happens when the idiom matches exactly (see
//! [`match_idiom`]). Anything else is left to the ordinary call path, which
//! keeps the reflective semantics.
//!
//! # Lifecycle
//!
//! 1. The unit driver calls [`AtomicFieldIntrinsic::try_emit`] at every
//!    factory call.
//! 2. On a match the registry returns the field's accessor, generating it on
//!    first use. Generation registers a finish task on the unit's
//!    [`FinishQueue`].
//! 3. The call site is rewritten to discard the three constants and
//!    construct the accessor.
//! 4. After code generation, the finish queue bakes the accessor type.

mod accessor;
mod matcher;
mod registry;
mod synthesizer;

use std::sync::Arc;

pub use accessor::{AccessorOp, AccessorType};
pub use matcher::match_idiom;
pub use registry::AccessorRegistry;
pub use synthesizer::emit_construction_call;

use crate::compiler::bytecode::{Instruction, InstructionFlags};
use crate::compiler::class_file::ConstantResolver;
use crate::compiler::codegen::{CodeEmitter, EmitError};
use crate::compiler::finish::FinishQueue;
use crate::compiler::types::{ClassId, ClassTable, FieldRef, TypeError};
use crate::config::IntrinsicConfig;

/// Error raised while applying the intrinsic
///
/// A failed match is not an error; these are only raised once a call site
/// was accepted.
#[derive(Debug, thiserror::Error)]
pub enum IntrinsicError {
    #[error("Intrinsic base type {name} could not be loaded: {source}")]
    BaseTypeMissing {
        name: String,
        #[source]
        source: TypeError,
    },
    #[error("Failed to define accessor type: {0}")]
    DefineType(#[source] TypeError),
    #[error(transparent)]
    Emit(#[from] EmitError),
}

/// The intrinsic, bound to the shared state of one compilation unit
pub struct AtomicFieldIntrinsic<'a> {
    classes: &'a Arc<ClassTable>,
    registry: &'a AccessorRegistry,
    finish: &'a FinishQueue,
    config: &'a IntrinsicConfig,
}

impl<'a> AtomicFieldIntrinsic<'a> {
    /// Bind the intrinsic to a unit's registry and finish queue
    ///
    /// Fields are resolved and accessors defined in the registry's class table.
    pub fn new(registry: &'a AccessorRegistry, finish: &'a FinishQueue, config: &'a IntrinsicConfig) -> Self {
        Self {
            classes: registry.classes(),
            registry,
            finish,
            config,
        }
    }

    /// Return the accessor for `field`, generating it on first request
    pub fn synthesize(&self, field: &FieldRef) -> Result<Arc<AccessorType>, IntrinsicError> {
        self.registry.get_or_try_create(field.key(), || {
            synthesizer::generate(self.classes, self.finish, &self.config.base_type, field)
        })
    }

    /// Try to substitute the factory call at `position`.
    ///
    /// The three constant loads are expected to have been emitted already.
    /// Returns `Ok(false)` without emitting anything if the idiom does not
    /// match; the caller then emits the call unchanged.
    pub fn try_emit<R>(
        &self,
        this_class: ClassId,
        resolver: &R,
        emitter: &mut CodeEmitter,
        code: &[Instruction],
        flags: &[InstructionFlags],
        position: usize,
    ) -> Result<bool, IntrinsicError>
    where
        R: ConstantResolver + ?Sized,
    {
        let field = match match_idiom(this_class, resolver, self.classes, code, flags, position) {
            Some(field) => field,
            None => return Ok(false),
        };

        let accessor = self.synthesize(&field)?;
        emit_construction_call(emitter, &accessor)?;
        log::debug!("replaced updater factory at {} with {}", position, accessor.name());
        Ok(true)
    }
}
