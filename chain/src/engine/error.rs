use std::fmt;

use crate::codec::CodecError;
use crate::vm::VmError;

/// Errors returned by [`crate::engine::Chain::add_block`].
#[derive(Debug)]
pub enum ChainError {
    /// A block already occupies this height.
    AlreadyKnown,
    /// `block.header.height != chain.height + 1`.
    HeightTooHigh,
    /// `block.header.prev_block_hash` does not match the current tip's hash.
    PrevMismatch,
    /// The block's validator signature did not verify.
    BadSignature,
    /// `header.data_hash` does not match the hash of the block's transactions.
    BadDataHash,
    /// A transaction failed verification or native application.
    Tx(TxError),
    /// The embedded VM diverged while applying a transaction.
    Vm(VmError),
}

impl From<TxError> for ChainError {
    fn from(e: TxError) -> Self {
        ChainError::Tx(e)
    }
}

impl From<VmError> for ChainError {
    fn from(e: VmError) -> Self {
        ChainError::Vm(e)
    }
}

impl fmt::Display for ChainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainError::AlreadyKnown => write!(f, "block already known"),
            ChainError::HeightTooHigh => write!(f, "block height does not extend the tip"),
            ChainError::PrevMismatch => write!(f, "prev_block_hash does not match the tip"),
            ChainError::BadSignature => write!(f, "block signature did not verify"),
            ChainError::BadDataHash => write!(f, "data_hash does not match transaction list"),
            ChainError::Tx(e) => write!(f, "{e}"),
            ChainError::Vm(e) => write!(f, "vm error: {e}"),
        }
    }
}

impl std::error::Error for ChainError {}

/// Errors raised while verifying or applying an individual transaction.
#[derive(Debug)]
pub enum TxError {
    /// A transaction's signature failed to verify against `from`.
    BadSignature,
    /// A `Mint` referenced a `collection` hash with no matching registration.
    UnknownCollection,
    /// A native transfer's sender has no account record.
    UnknownAccount,
    /// A native transfer's sender lacks sufficient balance.
    InsufficientBalance,
}

impl fmt::Display for TxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TxError::BadSignature => write!(f, "transaction signature did not verify"),
            TxError::UnknownCollection => write!(f, "mint references an unknown collection"),
            TxError::UnknownAccount => write!(f, "transfer sender has no account"),
            TxError::InsufficientBalance => write!(f, "transfer sender has insufficient balance"),
        }
    }
}

impl std::error::Error for TxError {}

/// Errors raised while decoding a peer frame or stored record.
#[derive(Debug)]
pub enum WireError {
    /// The frame did not decode to a well-formed value.
    Malformed(CodecError),
}

impl From<CodecError> for WireError {
    fn from(e: CodecError) -> Self {
        WireError::Malformed(e)
    }
}

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireError::Malformed(e) => write!(f, "malformed frame: {e}"),
        }
    }
}

impl std::error::Error for WireError {}
