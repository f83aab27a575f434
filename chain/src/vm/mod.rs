//! A small stack-based bytecode interpreter that mutates contract state.
//!
//! Bytecode is a flat byte stream; most opcodes are one byte, but `PushInt`
//! and `PushByte` act on the byte immediately preceding them in the stream
//! rather than taking an explicit operand — that preceding byte is itself
//! just walked over by the instruction pointer as an ordinary (unmatched)
//! byte. The stack pop discipline is FIFO: `Pop` always returns the
//! oldest-pushed value still on the stack, not the most recently pushed one.

use std::collections::HashMap;
use std::fmt;

/// Per-node contract key/value store, keyed and valued by raw bytes.
pub type ContractStore = HashMap<Vec<u8>, Vec<u8>>;

const OP_PUSH_INT: u8 = 0x0a;
const OP_ADD: u8 = 0x0b;
const OP_PUSH_BYTE: u8 = 0x0c;
const OP_PACK: u8 = 0x0d;
const OP_SUB: u8 = 0x0e;
const OP_STORE: u8 = 0x0f;
const OP_MUL: u8 = 0xea;
const OP_GET: u8 = 0xae;
const OP_DIV: u8 = 0xfd;

/// A tagged value living on the VM's operand stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StackValue {
    Int(i64),
    Byte(u8),
    Bytes(Vec<u8>),
}

impl StackValue {
    fn as_int(&self) -> Result<i64, VmError> {
        match self {
            StackValue::Int(v) => Ok(*v),
            other => Err(VmError::TypeMismatch {
                expected: "int64",
                found: other.clone(),
            }),
        }
    }

    fn as_byte(&self) -> Result<u8, VmError> {
        match self {
            StackValue::Byte(v) => Ok(*v),
            other => Err(VmError::TypeMismatch {
                expected: "byte",
                found: other.clone(),
            }),
        }
    }

    fn as_bytes(&self) -> Result<&[u8], VmError> {
        match self {
            StackValue::Bytes(v) => Ok(v),
            other => Err(VmError::TypeMismatch {
                expected: "bytes",
                found: other.clone(),
            }),
        }
    }

    /// Serializes this value the way `Store` does: ints as 8-byte LE,
    /// bytes/byte values verbatim.
    fn to_store_bytes(&self) -> Vec<u8> {
        match self {
            StackValue::Int(v) => v.to_le_bytes().to_vec(),
            StackValue::Byte(v) => vec![*v],
            StackValue::Bytes(v) => v.clone(),
        }
    }
}

/// Errors raised while interpreting a transaction's bytecode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VmError {
    /// An opcode required a value of one tag but the stack held another.
    TypeMismatch {
        expected: &'static str,
        found: StackValue,
    },
    /// An opcode required an operand but the stack was empty.
    StackUnderflow,
    /// `Div` was asked to divide by zero.
    DivisionByZero,
    /// `Get` referenced a key with no entry in the contract store.
    UnknownKey,
}

impl fmt::Display for VmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VmError::TypeMismatch { expected, found } => {
                write!(f, "expected {expected} on stack, found {found:?}")
            }
            VmError::StackUnderflow => write!(f, "stack underflow"),
            VmError::DivisionByZero => write!(f, "division by zero"),
            VmError::UnknownKey => write!(f, "unknown contract store key"),
        }
    }
}

impl std::error::Error for VmError {}

/// FIFO operand stack: `pop` always removes the oldest-pushed value.
#[derive(Default)]
struct Stack {
    data: std::collections::VecDeque<StackValue>,
}

impl Stack {
    fn push(&mut self, value: StackValue) {
        self.data.push_back(value);
    }

    fn pop(&mut self) -> Result<StackValue, VmError> {
        self.data.pop_front().ok_or(VmError::StackUnderflow)
    }
}

/// Executes `code` against `store`, returning whatever values remain on the
/// operand stack when the instruction pointer passes the last byte.
///
/// `code` may be empty, in which case this is a no-op returning an empty
/// stack.
pub fn run(code: &[u8], store: &mut ContractStore) -> Result<Vec<StackValue>, VmError> {
    let mut stack = Stack::default();

    for ip in 0..code.len() {
        let opcode = code[ip];
        match opcode {
            OP_PUSH_INT => {
                let prev = ip.checked_sub(1).map(|i| code[i]).unwrap_or(0);
                stack.push(StackValue::Int(prev as i64));
            }
            OP_PUSH_BYTE => {
                let prev = ip.checked_sub(1).map(|i| code[i]).unwrap_or(0);
                stack.push(StackValue::Byte(prev));
            }
            OP_PACK => {
                let n = stack.pop()?.as_int()?;
                let mut bytes = Vec::with_capacity(n.max(0) as usize);
                for _ in 0..n {
                    bytes.push(stack.pop()?.as_byte()?);
                }
                stack.push(StackValue::Bytes(bytes));
            }
            OP_ADD => {
                let a = stack.pop()?.as_int()?;
                let b = stack.pop()?.as_int()?;
                stack.push(StackValue::Int(a.wrapping_add(b)));
            }
            OP_SUB => {
                let a = stack.pop()?.as_int()?;
                let b = stack.pop()?.as_int()?;
                stack.push(StackValue::Int(a.wrapping_sub(b)));
            }
            OP_MUL => {
                let a = stack.pop()?.as_int()?;
                let b = stack.pop()?.as_int()?;
                stack.push(StackValue::Int(a.wrapping_mul(b)));
            }
            OP_DIV => {
                let a = stack.pop()?.as_int()?;
                let b = stack.pop()?.as_int()?;
                if b == 0 {
                    return Err(VmError::DivisionByZero);
                }
                stack.push(StackValue::Int(a / b));
            }
            OP_STORE => {
                let key = stack.pop()?.as_bytes()?.to_vec();
                let value = stack.pop()?;
                store.insert(key, value.to_store_bytes());
            }
            OP_GET => {
                let key = stack.pop()?.as_bytes()?.to_vec();
                let value = store.get(&key).ok_or(VmError::UnknownKey)?;
                stack.push(StackValue::Bytes(value.clone()));
            }
            _ => {
                // A raw data byte consumed by an adjacent Push* opcode, or
                // otherwise unrecognised; the instruction pointer just
                // walks past it.
            }
        }
    }

    Ok(stack.data.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_code_is_a_no_op() {
        let mut store = ContractStore::new();
        assert_eq!(run(&[], &mut store).unwrap(), Vec::new());
    }

    #[test]
    fn push_int_add() {
        // push 2, push 3, add -> 5
        let code = [0x02, OP_PUSH_INT, 0x03, OP_PUSH_INT, OP_ADD];
        let mut store = ContractStore::new();
        let result = run(&code, &mut store).unwrap();
        assert_eq!(result, vec![StackValue::Int(5)]);
    }

    #[test]
    fn sub_respects_fifo_order() {
        // push 10, push 3, sub -> first popped (10) minus second popped (3) = 7
        let code = [0x0a, OP_PUSH_INT, 0x03, OP_PUSH_INT, OP_SUB];
        let mut store = ContractStore::new();
        let result = run(&code, &mut store).unwrap();
        assert_eq!(result, vec![StackValue::Int(7)]);
    }

    #[test]
    fn div_by_zero_is_vm_error() {
        let code = [0x0a, OP_PUSH_INT, 0x00, OP_PUSH_INT, OP_DIV];
        let mut store = ContractStore::new();
        assert_eq!(run(&code, &mut store).unwrap_err(), VmError::DivisionByZero);
    }

    #[test]
    fn pack_builds_bytes_from_pushed_bytes() {
        // push count 2, push bytes 0x41 0x42, pack -> Bytes([0x41,0x42])
        let code = [
            0x02, OP_PUSH_INT, 0x41, OP_PUSH_BYTE, 0x42, OP_PUSH_BYTE, OP_PACK,
        ];
        let mut store = ContractStore::new();
        let result = run(&code, &mut store).unwrap();
        assert_eq!(result, vec![StackValue::Bytes(vec![0x41, 0x42])]);
    }

    #[test]
    fn store_then_get_round_trips() {
        // key = pack([b'k']); value = 7; store key -> value
        let store_code = [
            0x01, OP_PUSH_INT, b'k', OP_PUSH_BYTE, OP_PACK, // key = [b'k']
            0x07, OP_PUSH_INT, // value 7
            OP_STORE,
        ];
        let mut store = ContractStore::new();
        run(&store_code, &mut store).unwrap();
        assert_eq!(store.get(&b"k"[..]), Some(&7i64.to_le_bytes().to_vec()));

        let get_code = [0x01, OP_PUSH_INT, b'k', OP_PUSH_BYTE, OP_PACK, OP_GET];
        let result = run(&get_code, &mut store).unwrap();
        assert_eq!(result, vec![StackValue::Bytes(7i64.to_le_bytes().to_vec())]);
    }

    #[test]
    fn get_missing_key_is_vm_error() {
        let code = [0x01, OP_PUSH_INT, b'z', OP_PUSH_BYTE, OP_PACK, OP_GET];
        let mut store = ContractStore::new();
        assert_eq!(run(&code, &mut store).unwrap_err(), VmError::UnknownKey);
    }

    #[test]
    fn type_mismatch_on_add_with_bytes_is_vm_error() {
        let code = [0x01, OP_PUSH_BYTE, OP_ADD];
        let mut store = ContractStore::new();
        assert!(matches!(
            run(&code, &mut store).unwrap_err(),
            VmError::TypeMismatch { .. }
        ));
    }
}
