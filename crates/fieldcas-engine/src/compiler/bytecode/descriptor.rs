//! Method descriptor parsing
//!
//! Only the shape matters to the pipeline here: how many arguments a call
//! pops and whether it pushes a result.

/// Error parsing a method descriptor
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DescriptorError {
    #[error("Descriptor `{0}` does not start with '('")]
    MissingParameters(String),
    #[error("Descriptor `{descriptor}` has an invalid type at byte {offset}")]
    InvalidType { descriptor: String, offset: usize },
    #[error("Descriptor `{0}` ends unexpectedly")]
    UnexpectedEnd(String),
}

/// Parsed method descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    /// Parameter type signatures in order
    pub params: Vec<String>,
    /// Return type signature, `None` for `V`
    pub returns: Option<String>,
}

impl MethodDescriptor {
    /// Parse a descriptor such as `(Ljava/lang/Class;I)Ljava/lang/Object;`
    pub fn parse(descriptor: &str) -> Result<Self, DescriptorError> {
        let bytes = descriptor.as_bytes();
        if bytes.first() != Some(&b'(') {
            return Err(DescriptorError::MissingParameters(descriptor.to_string()));
        }

        let mut pos = 1;
        let mut params = Vec::new();
        loop {
            match bytes.get(pos) {
                None => return Err(DescriptorError::UnexpectedEnd(descriptor.to_string())),
                Some(b')') => {
                    pos += 1;
                    break;
                }
                Some(_) => {
                    let end = field_type_end(descriptor, pos)?;
                    params.push(descriptor[pos..end].to_string());
                    pos = end;
                }
            }
        }

        let returns = match bytes.get(pos) {
            None => return Err(DescriptorError::UnexpectedEnd(descriptor.to_string())),
            Some(b'V') if pos + 1 == bytes.len() => None,
            Some(_) => {
                let end = field_type_end(descriptor, pos)?;
                if end != bytes.len() {
                    return Err(DescriptorError::InvalidType {
                        descriptor: descriptor.to_string(),
                        offset: end,
                    });
                }
                Some(descriptor[pos..end].to_string())
            }
        };

        Ok(Self { params, returns })
    }

    /// Number of stack slots popped by a static call
    pub fn arg_count(&self) -> u16 {
        self.params.len() as u16
    }

    /// Whether the call pushes a result
    pub fn has_return(&self) -> bool {
        self.returns.is_some()
    }
}

/// Byte offset just past the field type starting at `start`
fn field_type_end(descriptor: &str, start: usize) -> Result<usize, DescriptorError> {
    let bytes = descriptor.as_bytes();
    let mut pos = start;
    while bytes.get(pos) == Some(&b'[') {
        pos += 1;
    }
    match bytes.get(pos) {
        Some(b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z') => Ok(pos + 1),
        Some(b'L') => match descriptor[pos..].find(';') {
            Some(semi) => Ok(pos + semi + 1),
            None => Err(DescriptorError::UnexpectedEnd(descriptor.to_string())),
        },
        Some(_) => Err(DescriptorError::InvalidType {
            descriptor: descriptor.to_string(),
            offset: pos,
        }),
        None => Err(DescriptorError::UnexpectedEnd(descriptor.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_factory_descriptor() {
        let desc = MethodDescriptor::parse(
            "(Ljava/lang/Class;Ljava/lang/Class;Ljava/lang/String;)Ljava/util/concurrent/atomic/AtomicReferenceFieldUpdater;",
        )
        .unwrap();
        assert_eq!(desc.arg_count(), 3);
        assert!(desc.has_return());
        assert_eq!(desc.params[2], "Ljava/lang/String;");
    }

    #[test]
    fn test_parse_void_and_primitives() {
        let desc = MethodDescriptor::parse("(I[JZ)V").unwrap();
        assert_eq!(desc.params, vec!["I", "[J", "Z"]);
        assert_eq!(desc.returns, None);

        let desc = MethodDescriptor::parse("()[Ljava/lang/Object;").unwrap();
        assert_eq!(desc.arg_count(), 0);
        assert_eq!(desc.returns.as_deref(), Some("[Ljava/lang/Object;"));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            MethodDescriptor::parse("V"),
            Err(DescriptorError::MissingParameters(_))
        ));
        assert!(matches!(
            MethodDescriptor::parse("(Ljava/lang/String"),
            Err(DescriptorError::UnexpectedEnd(_))
        ));
        assert!(matches!(
            MethodDescriptor::parse("(Q)V"),
            Err(DescriptorError::InvalidType { offset: 1, .. })
        ));
        assert!(matches!(
            MethodDescriptor::parse("()VV"),
            Err(DescriptorError::InvalidType { .. })
        ));
    }
}
