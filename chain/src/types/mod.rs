//! Core domain types used by the chain.
//!
//! This module defines strongly-typed hashes, addresses, account records,
//! and the key/signature wrappers shared across the chain implementation.
//! The goal, as in most of this crate, is to avoid naked byte buffers in
//! public APIs in favour of domain-specific newtypes.

use std::fmt;

use sha2::{Digest, Sha256};

use crate::codec::{CodecError, Decode, Encode};

pub mod account;
pub mod block;
pub mod keys;
pub mod tx;

pub use account::Account;
pub use block::{Block, Header, hash_transactions};
pub use keys::{KeyError, PrivateKey, PublicKey, Signature};
pub use tx::{CollectionPayload, MintPayload, Transaction, TxInner};

/// Length in bytes of a [`Hash`].
pub const HASH_LEN: usize = 32;

/// Length in bytes of an [`Address`].
pub const ADDRESS_LEN: usize = 20;

/// Content-addressed 32-byte SHA-256 digest.
///
/// Used for block and transaction hashes. Equality is byte equality; there
/// is no notion of a "canonical" vs. "alternate" encoding.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Hash(pub [u8; HASH_LEN]);

impl Hash {
    /// The all-zero hash, used as the genesis block's `prev_block_hash`.
    pub const ZERO: Hash = Hash([0u8; HASH_LEN]);

    /// Computes the SHA-256 digest of `bytes`.
    pub fn sha256(bytes: &[u8]) -> Self {
        let digest = Sha256::digest(bytes);
        let mut out = [0u8; HASH_LEN];
        out.copy_from_slice(&digest);
        Hash(out)
    }

    /// Returns `true` if every byte is zero.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; HASH_LEN]
    }

    /// Returns the underlying bytes.
    pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({self})")
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl Encode for Hash {
    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.0);
    }
}

impl Decode for Hash {
    fn decode(input: &[u8]) -> Result<(Self, &[u8]), CodecError> {
        let (bytes, rest) = <[u8; HASH_LEN]>::decode(input)?;
        Ok((Hash(bytes), rest))
    }
}

/// 20-byte account identifier, derived from a public key.
///
/// `Address::from_public_key` takes the last [`ADDRESS_LEN`] bytes of the
/// SHA-256 hash over the key's canonical (compressed SEC1) encoding.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address(pub [u8; ADDRESS_LEN]);

impl Address {
    /// Derives an address from a public key.
    pub fn from_public_key(key: &PublicKey) -> Self {
        let digest = Hash::sha256(&key.to_sec1_bytes());
        let mut out = [0u8; ADDRESS_LEN];
        out.copy_from_slice(&digest.0[HASH_LEN - ADDRESS_LEN..]);
        Address(out)
    }

    /// Returns the underlying bytes.
    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl Encode for Address {
    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.0);
    }
}

impl Decode for Address {
    fn decode(input: &[u8]) -> Result<(Self, &[u8]), CodecError> {
        let (bytes, rest) = <[u8; ADDRESS_LEN]>::decode(input)?;
        Ok((Address(bytes), rest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_zero() {
        assert!(Hash::ZERO.is_zero());
        assert!(!Hash::sha256(b"x").is_zero());
    }

    #[test]
    fn hash_display_is_hex() {
        let h = Hash([0xabu8; HASH_LEN]);
        assert_eq!(h.to_string(), "ab".repeat(HASH_LEN));
    }

    #[test]
    fn address_from_public_key_is_stable() {
        let key = PrivateKey::generate().public_key();
        let a1 = Address::from_public_key(&key);
        let a2 = Address::from_public_key(&key);
        assert_eq!(a1, a2);
    }
}
