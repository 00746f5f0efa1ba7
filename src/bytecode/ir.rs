use crate::bytecode::Op;
use serde::{Deserialize, Serialize};

/// A compiled, finalized instruction stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeObject {
    pub ops: Vec<Op>,

    /// Functions defined in this stream, in definition order.
    pub functions: Vec<FunctionInfo>,
}

/// Where a compiled function lives inside its `CodeObject`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionInfo {
    pub name: String,
    /// Index of the first instruction of the function prologue.
    pub entry: usize,
    pub arity: usize,
}

impl CodeObject {
    pub fn new() -> Self {
        Self {
            ops: Vec::new(),
            functions: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn function(&self, name: &str) -> Option<&FunctionInfo> {
        self.functions.iter().find(|f| f.name == name)
    }

    /// Serializes the code object with `postcard`.
    pub fn to_bytes(&self) -> Result<Vec<u8>, postcard::Error> {
        postcard::to_allocvec(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, postcard::Error> {
        postcard::from_bytes(bytes)
    }
}

impl Default for CodeObject {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for CodeObject {
    type Target = [Op];

    fn deref(&self) -> &[Op] {
        &self.ops
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_postcard_preserves_ops_and_functions() {
        let code = CodeObject {
            ops: vec![
                Op::Jmp(4),
                Op::Store("n".to_string()),
                Op::Load("n".to_string()),
                Op::Ret,
                Op::Push(-7),
                Op::Call(1),
                Op::Pop,
            ],
            functions: vec![FunctionInfo {
                name: "id".to_string(),
                entry: 1,
                arity: 1,
            }],
        };

        let bytes = code.to_bytes().unwrap();
        let decoded = CodeObject::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, code);
    }

    #[test]
    fn test_from_bytes_rejects_garbage() {
        assert!(CodeObject::from_bytes(&[0xff, 0xff, 0xff]).is_err());
    }

    #[test]
    fn test_function_lookup() {
        let mut code = CodeObject::new();
        code.functions.push(FunctionInfo {
            name: "f".to_string(),
            entry: 3,
            arity: 0,
        });
        assert_eq!(code.function("f").map(|f| f.entry), Some(3));
        assert!(code.function("g").is_none());
    }
}
