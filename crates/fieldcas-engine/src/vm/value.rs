//! Values and their slot encoding
//!
//! Instance slots are single `AtomicU64` words so that compare-and-exchange
//! works on the encoded value. The low two bits tag the kind:
//!
//! | tag | kind | payload |
//! |-----|------|---------|
//! | 0   | null | 0 |
//! | 1   | reference | heap index |
//! | 2   | int  | `i32` bits |
//! | 3   | bool | 0 or 1 |
//!
//! Null encodes as zero, so fresh slots read as null.

use std::fmt;

const TAG_BITS: u32 = 2;
const TAG_MASK: u64 = 0b11;
const TAG_NULL: u64 = 0;
const TAG_REF: u64 = 1;
const TAG_INT: u64 = 2;
const TAG_BOOL: u64 = 3;

/// Reference to a heap object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjRef(pub u32);

impl fmt::Display for ObjRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "obj#{}", self.0)
    }
}

/// A value stored in a slot or passed as an argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Value {
    /// Null reference
    #[default]
    Null,
    /// Object reference; equality is identity
    Ref(ObjRef),
    /// 32-bit integer
    Int(i32),
    /// Boolean
    Bool(bool),
}

impl Value {
    /// Encode into a slot word
    pub fn to_bits(self) -> u64 {
        match self {
            Value::Null => TAG_NULL,
            Value::Ref(obj) => (u64::from(obj.0) << TAG_BITS) | TAG_REF,
            Value::Int(i) => (u64::from(i as u32) << TAG_BITS) | TAG_INT,
            Value::Bool(b) => (u64::from(b) << TAG_BITS) | TAG_BOOL,
        }
    }

    /// Decode a slot word
    pub fn from_bits(bits: u64) -> Self {
        let payload = bits >> TAG_BITS;
        match bits & TAG_MASK {
            TAG_REF => Value::Ref(ObjRef(payload as u32)),
            TAG_INT => Value::Int(payload as u32 as i32),
            TAG_BOOL => Value::Bool(payload != 0),
            _ => Value::Null,
        }
    }

    /// Whether this is the null reference
    pub fn is_null(self) -> bool {
        matches!(self, Value::Null)
    }

    /// The referenced object, if any
    pub fn as_obj(self) -> Option<ObjRef> {
        match self {
            Value::Ref(obj) => Some(obj),
            _ => None,
        }
    }

    /// The boolean payload, if any
    pub fn as_bool(self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(b),
            _ => None,
        }
    }

    /// Short kind name for diagnostics
    pub fn kind_name(self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Ref(_) => "reference",
            Value::Int(_) => "int",
            Value::Bool(_) => "boolean",
        }
    }
}

impl From<ObjRef> for Value {
    fn from(obj: ObjRef) -> Self {
        Value::Ref(obj)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_is_zero() {
        assert_eq!(Value::Null.to_bits(), 0);
        assert_eq!(Value::from_bits(0), Value::Null);
    }

    #[test]
    fn test_encoding_preserves_values() {
        for value in [
            Value::Ref(ObjRef(0)),
            Value::Ref(ObjRef(u32::MAX)),
            Value::Int(-1),
            Value::Int(i32::MIN),
            Value::Bool(true),
            Value::Bool(false),
        ] {
            assert_eq!(Value::from_bits(value.to_bits()), value);
        }
    }

    #[test]
    fn test_distinct_kinds_distinct_bits() {
        assert_ne!(Value::Ref(ObjRef(0)).to_bits(), Value::Null.to_bits());
        assert_ne!(Value::Int(0).to_bits(), Value::Bool(false).to_bits());
    }
}
