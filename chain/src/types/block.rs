//! Block headers and blocks.

use std::sync::OnceLock;

use crate::codec::{self, CodecError, Decode, Encode};
use crate::types::tx::decode_transactions;
use crate::types::{Hash, PrivateKey, PublicKey, Signature, Transaction};

/// Block header.
///
/// Canonical bytes are the deterministic serialization of all five fields
/// in declaration order; the header hash is SHA-256 over those bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Header {
    pub version: u32,
    pub data_hash: Hash,
    pub prev_block_hash: Hash,
    /// Nanoseconds since the Unix epoch.
    pub timestamp: i64,
    pub height: u32,
}

impl Encode for Header {
    fn encode(&self, out: &mut Vec<u8>) {
        self.version.encode(out);
        self.data_hash.encode(out);
        self.prev_block_hash.encode(out);
        self.timestamp.encode(out);
        self.height.encode(out);
    }
}

impl Decode for Header {
    fn decode(input: &[u8]) -> Result<(Self, &[u8]), CodecError> {
        let (version, rest) = u32::decode(input)?;
        let (data_hash, rest) = Hash::decode(rest)?;
        let (prev_block_hash, rest) = Hash::decode(rest)?;
        let (timestamp, rest) = i64::decode(rest)?;
        let (height, rest) = u32::decode(rest)?;
        Ok((
            Header {
                version,
                data_hash,
                prev_block_hash,
                timestamp,
                height,
            },
            rest,
        ))
    }
}

impl Header {
    /// Computes this header's content hash.
    ///
    /// Callers that need a memoized hash bound to a particular block should
    /// use [`Block::hash`] instead; this is a pure, uncached computation
    /// used for comparisons against a candidate header (e.g. `prev_header`).
    pub fn hash(&self) -> Hash {
        Hash::sha256(&self.to_canonical_bytes())
    }
}

/// A block: a header, its transactions, and the validator's signature over
/// the header bytes.
#[derive(Debug)]
pub struct Block {
    pub header: Header,
    pub transactions: Vec<Transaction>,
    pub validator: PublicKey,
    pub signature: Signature,
    hash_cache: OnceLock<Hash>,
}

impl Clone for Block {
    fn clone(&self) -> Self {
        Block {
            header: self.header.clone(),
            transactions: self.transactions.clone(),
            validator: self.validator.clone(),
            signature: self.signature.clone(),
            hash_cache: self
                .hash_cache
                .get()
                .copied()
                .map(OnceLock::from)
                .unwrap_or_default(),
        }
    }
}

impl Block {
    /// Builds a new, unsigned block. `data_hash` on `header` must already be
    /// set to the hash of `transactions`; use [`hash_transactions`] to
    /// compute it.
    pub fn new(
        header: Header,
        transactions: Vec<Transaction>,
        validator: PublicKey,
        signature: Signature,
    ) -> Self {
        Block {
            header,
            transactions,
            validator,
            signature,
            hash_cache: OnceLock::new(),
        }
    }

    /// Returns the memoized hash of this block's header.
    pub fn hash(&self) -> Hash {
        *self.hash_cache.get_or_init(|| self.header.hash())
    }

    /// Verifies the block signature and every transaction signature.
    pub fn verify(&self) -> bool {
        if !self.validator.verify(&self.header.to_canonical_bytes(), &self.signature) {
            return false;
        }
        self.transactions.iter().all(Transaction::verify)
    }
}

impl Encode for Block {
    fn encode(&self, out: &mut Vec<u8>) {
        self.header.encode(out);
        self.transactions.as_slice().encode(out);
        self.validator.encode(out);
        self.signature.encode(out);
    }
}

impl Decode for Block {
    fn decode(input: &[u8]) -> Result<(Self, &[u8]), CodecError> {
        let (header, rest) = Header::decode(input)?;
        let (transactions, rest) = decode_transactions(rest)?;
        let (validator, rest) = PublicKey::decode(rest)?;
        let (signature, rest) = Signature::decode(rest)?;
        Ok((
            Block {
                header,
                transactions,
                validator,
                signature,
                hash_cache: OnceLock::new(),
            },
            rest,
        ))
    }
}

/// Computes the `data_hash` for a transaction list: SHA-256 over the
/// concatenation of each transaction's canonical encoding, in order.
pub fn hash_transactions(transactions: &[Transaction]) -> Hash {
    let mut buf = Vec::new();
    for tx in transactions {
        tx.encode(&mut buf);
    }
    Hash::sha256(&buf)
}

/// Decodes a `u32`-length-prefixed sequence of blocks.
pub fn decode_blocks(input: &[u8]) -> Result<(Vec<Block>, &[u8]), CodecError> {
    codec::decode_vec::<Block>(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TxInner;

    fn genesis_block(validator_key: &PrivateKey) -> Block {
        let transactions = Vec::new();
        let data_hash = hash_transactions(&transactions);
        let header = Header {
            version: 1,
            data_hash,
            prev_block_hash: Hash::ZERO,
            timestamp: 0,
            height: 0,
        };
        let signature = validator_key.sign(&header.to_canonical_bytes());
        Block::new(header, transactions, validator_key.public_key(), signature)
    }

    #[test]
    fn header_hash_is_deterministic() {
        let header = Header {
            version: 1,
            data_hash: Hash::sha256(b"txs"),
            prev_block_hash: Hash::ZERO,
            timestamp: 42,
            height: 3,
        };
        assert_eq!(header.hash(), header.hash());
    }

    #[test]
    fn block_with_valid_signature_verifies() {
        let key = PrivateKey::generate();
        let block = genesis_block(&key);
        assert!(block.verify());
    }

    #[test]
    fn tampering_with_header_breaks_verification() {
        let key = PrivateKey::generate();
        let mut block = genesis_block(&key);
        block.header.height = 99;
        assert!(!block.verify());
    }

    #[test]
    fn data_hash_matches_transactions() {
        let key = PrivateKey::generate();
        let mut tx = Transaction::new(TxInner::None, vec![], key.public_key(), None, 0, 1);
        tx.sign(&key);
        let transactions = vec![tx];
        let data_hash = hash_transactions(&transactions);
        assert_eq!(data_hash, hash_transactions(&transactions));
    }

    #[test]
    fn round_trips_through_codec() {
        let key = PrivateKey::generate();
        let block = genesis_block(&key);
        let bytes = block.to_canonical_bytes();
        let (decoded, rest) = Block::decode(&bytes).unwrap();
        assert!(rest.is_empty());
        assert_eq!(decoded.hash(), block.hash());
    }
}
