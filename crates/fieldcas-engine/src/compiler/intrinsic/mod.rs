//! Compiler Intrinsics
//!
//! Call sites that the pipeline replaces with specialized code instead of
//! compiling them as ordinary calls.
//!
//! Currently supported intrinsics:
//! - `AtomicReferenceFieldUpdater.newUpdater(Class, Class, String)` with
//!   constant arguments naming a volatile field of the calling class
//!   (`atomic_field` module)

pub mod atomic_field;

pub use atomic_field::AtomicFieldIntrinsic;

use crate::compiler::bytecode::Opcode;
use crate::config::IntrinsicConfig;

/// Intrinsic recognized at a call site
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntrinsicKind {
    /// Reflective atomic field-updater factory
    AtomicFieldUpdater,
}

/// Check whether a call is an intrinsic candidate
///
/// Only the callee is inspected here; whether the arguments allow the
/// substitution is decided by the intrinsic itself.
pub fn detect_intrinsic(
    config: &IntrinsicConfig,
    opcode: Opcode,
    class: &str,
    name: &str,
    descriptor: &str,
) -> Option<IntrinsicKind> {
    if !config.enabled || opcode != Opcode::InvokeStatic {
        return None;
    }
    if config.is_factory(class, name, descriptor) {
        return Some(IntrinsicKind::AtomicFieldUpdater);
    }
    None
}
