//! Constant pool for class files

/// Error accessing the constant pool
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConstantPoolError {
    #[error("Constant pool index {0} out of range")]
    IndexOutOfRange(u32),
    #[error("Constant pool entry {index} is a {found}, expected {expected}")]
    WrongKind {
        index: u32,
        expected: &'static str,
        found: &'static str,
    },
}

/// A constant pool entry
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    /// Class reference by internal name (`pkg/Name`)
    Class(String),
    /// String literal
    String(String),
    /// Integer literal
    Integer(i32),
    /// Method reference
    MethodRef {
        /// Pool index of the owning class entry
        class: u32,
        /// Method name
        name: String,
        /// Method descriptor, e.g. `(Ljava/lang/String;)V`
        descriptor: String,
    },
}

impl Constant {
    fn kind(&self) -> &'static str {
        match self {
            Constant::Class(_) => "class",
            Constant::String(_) => "string",
            Constant::Integer(_) => "integer",
            Constant::MethodRef { .. } => "method ref",
        }
    }
}

/// A resolved view of a method ref entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodRefEntry<'a> {
    /// Internal name of the owning class
    pub class: &'a str,
    /// Method name
    pub name: &'a str,
    /// Method descriptor
    pub descriptor: &'a str,
}

/// Constant pool containing the literal values and symbolic references of a class
#[derive(Debug, Clone, Default)]
pub struct ConstantPool {
    entries: Vec<Constant>,
}

impl ConstantPool {
    /// Create a new empty constant pool
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, constant: Constant) -> u32 {
        let index = self.entries.len();
        self.entries.push(constant);
        index as u32
    }

    /// Add a class reference and return its index
    pub fn add_class(&mut self, name: impl Into<String>) -> u32 {
        self.push(Constant::Class(name.into()))
    }

    /// Add a string constant and return its index
    pub fn add_string(&mut self, s: impl Into<String>) -> u32 {
        self.push(Constant::String(s.into()))
    }

    /// Add an integer constant and return its index
    pub fn add_integer(&mut self, i: i32) -> u32 {
        self.push(Constant::Integer(i))
    }

    /// Add a method ref (and its class entry) and return its index
    pub fn add_method_ref(
        &mut self,
        class: impl Into<String>,
        name: impl Into<String>,
        descriptor: impl Into<String>,
    ) -> u32 {
        let class = self.add_class(class);
        self.push(Constant::MethodRef {
            class,
            name: name.into(),
            descriptor: descriptor.into(),
        })
    }

    /// Get an entry by index
    pub fn get(&self, index: u32) -> Option<&Constant> {
        self.entries.get(index as usize)
    }

    /// Get a class name by index (None if absent or not a class entry)
    pub fn class_name(&self, index: u32) -> Option<&str> {
        match self.get(index)? {
            Constant::Class(name) => Some(name.as_str()),
            _ => None,
        }
    }

    /// Get a string constant by index (None if absent or not a string entry)
    pub fn string(&self, index: u32) -> Option<&str> {
        match self.get(index)? {
            Constant::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Resolve a method ref entry, failing on malformed pools
    pub fn method_ref(&self, index: u32) -> Result<MethodRefEntry<'_>, ConstantPoolError> {
        match self.get(index) {
            None => Err(ConstantPoolError::IndexOutOfRange(index)),
            Some(Constant::MethodRef { class, name, descriptor }) => {
                let class = match self.get(*class) {
                    Some(Constant::Class(name)) => name.as_str(),
                    Some(other) => {
                        return Err(ConstantPoolError::WrongKind {
                            index: *class,
                            expected: "class",
                            found: other.kind(),
                        })
                    }
                    None => return Err(ConstantPoolError::IndexOutOfRange(*class)),
                };
                Ok(MethodRefEntry { class, name, descriptor })
            }
            Some(other) => Err(ConstantPoolError::WrongKind {
                index,
                expected: "method ref",
                found: other.kind(),
            }),
        }
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the pool has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_pool() {
        let mut pool = ConstantPool::new();

        let class_idx = pool.add_class("demo/Node");
        let str_idx = pool.add_string("next");
        let int_idx = pool.add_integer(42);

        assert_eq!(pool.class_name(class_idx), Some("demo/Node"));
        assert_eq!(pool.string(str_idx), Some("next"));
        assert_eq!(pool.get(int_idx), Some(&Constant::Integer(42)));
        assert_eq!(pool.len(), 3);
    }

    #[test]
    fn test_kind_mismatch_is_none() {
        let mut pool = ConstantPool::new();
        let class_idx = pool.add_class("demo/Node");
        let str_idx = pool.add_string("next");

        assert_eq!(pool.string(class_idx), None);
        assert_eq!(pool.class_name(str_idx), None);
        assert_eq!(pool.class_name(99), None);
    }

    #[test]
    fn test_method_ref() {
        let mut pool = ConstantPool::new();
        let idx = pool.add_method_ref("demo/Node", "run", "()V");

        let entry = pool.method_ref(idx).unwrap();
        assert_eq!(entry.class, "demo/Node");
        assert_eq!(entry.name, "run");
        assert_eq!(entry.descriptor, "()V");
    }

    #[test]
    fn test_method_ref_errors() {
        let mut pool = ConstantPool::new();
        let str_idx = pool.add_string("not a method");

        assert_eq!(
            pool.method_ref(str_idx),
            Err(ConstantPoolError::WrongKind {
                index: str_idx,
                expected: "method ref",
                found: "string",
            })
        );
        assert_eq!(pool.method_ref(12), Err(ConstantPoolError::IndexOutOfRange(12)));
    }
}
