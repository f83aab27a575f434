//! Transactions: native transfers, VM invocations, and NFT bookkeeping.

use std::sync::OnceLock;

use crate::codec::{self, CodecError, Decode, Encode};
use crate::types::{Address, Hash, PrivateKey, PublicKey, Signature};

/// Payload of a transaction that registers a new NFT collection.
///
/// The collection is identified, once applied, by the hash of the
/// transaction that carried it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CollectionPayload {
    /// Opaque collection metadata (name, schema, whatever the caller chooses).
    pub metadata: Vec<u8>,
}

impl Encode for CollectionPayload {
    fn encode(&self, out: &mut Vec<u8>) {
        self.metadata.encode(out);
    }
}

impl Decode for CollectionPayload {
    fn decode(input: &[u8]) -> Result<(Self, &[u8]), CodecError> {
        let (metadata, rest) = Vec::<u8>::decode(input)?;
        Ok((CollectionPayload { metadata }, rest))
    }
}

/// Payload of a transaction that mints an item into a previously registered
/// collection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MintPayload {
    /// Hash of the transaction that registered the target collection.
    pub collection: Hash,
    /// Opaque per-item metadata.
    pub metadata: Vec<u8>,
}

impl Encode for MintPayload {
    fn encode(&self, out: &mut Vec<u8>) {
        self.collection.encode(out);
        self.metadata.encode(out);
    }
}

impl Decode for MintPayload {
    fn decode(input: &[u8]) -> Result<(Self, &[u8]), CodecError> {
        let (collection, rest) = Hash::decode(input)?;
        let (metadata, rest) = Vec::<u8>::decode(rest)?;
        Ok((MintPayload { collection, metadata }, rest))
    }
}

/// The NFT-related payload a transaction may carry.
///
/// The source models this as a `type: u8` discriminant plus an
/// `Option<NFTPayload>`; here it is a single tagged sum type, which a Rust
/// reader expects and which makes the `None` / `Collection` / `Mint` arms
/// exhaustive at the type level.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TxInner {
    /// A plain transaction with no NFT side effect.
    None,
    /// Registers a new collection.
    Collection(CollectionPayload),
    /// Mints an item into an existing collection.
    Mint(MintPayload),
}

const TX_INNER_NONE: u8 = 0x00;
const TX_INNER_COLLECTION: u8 = 0x01;
const TX_INNER_MINT: u8 = 0x02;

impl Encode for TxInner {
    fn encode(&self, out: &mut Vec<u8>) {
        match self {
            TxInner::None => out.push(TX_INNER_NONE),
            TxInner::Collection(payload) => {
                out.push(TX_INNER_COLLECTION);
                payload.encode(out);
            }
            TxInner::Mint(payload) => {
                out.push(TX_INNER_MINT);
                payload.encode(out);
            }
        }
    }
}

impl Decode for TxInner {
    fn decode(input: &[u8]) -> Result<(Self, &[u8]), CodecError> {
        let (tag, rest) = u8::decode(input)?;
        match tag {
            TX_INNER_NONE => Ok((TxInner::None, rest)),
            TX_INNER_COLLECTION => {
                let (payload, rest) = CollectionPayload::decode(rest)?;
                Ok((TxInner::Collection(payload), rest))
            }
            TX_INNER_MINT => {
                let (payload, rest) = MintPayload::decode(rest)?;
                Ok((TxInner::Mint(payload), rest))
            }
            other => Err(CodecError::BadTag(other)),
        }
    }
}

/// A signed transaction: a native transfer, a VM invocation, or both.
///
/// `data` holds VM bytecode and may be empty. `to` is `None` when the
/// transaction carries no native transfer. The hash is memoized on first
/// access and is never invalidated, matching the data model's invariant
/// that a transaction is immutable after it is signed.
#[derive(Debug)]
pub struct Transaction {
    pub inner: TxInner,
    pub data: Vec<u8>,
    pub from: PublicKey,
    pub to: Option<PublicKey>,
    pub value: u64,
    pub signature: Option<Signature>,
    pub nonce: i64,
    pub first_seen: i64,
    hash_cache: OnceLock<Hash>,
}

impl Clone for Transaction {
    fn clone(&self) -> Self {
        Transaction {
            inner: self.inner.clone(),
            data: self.data.clone(),
            from: self.from.clone(),
            to: self.to.clone(),
            value: self.value,
            signature: self.signature.clone(),
            nonce: self.nonce,
            first_seen: self.first_seen,
            hash_cache: self
                .hash_cache
                .get()
                .copied()
                .map(OnceLock::from)
                .unwrap_or_default(),
        }
    }
}

impl Transaction {
    /// Builds a new, unsigned transaction.
    pub fn new(
        inner: TxInner,
        data: Vec<u8>,
        from: PublicKey,
        to: Option<PublicKey>,
        value: u64,
        nonce: i64,
    ) -> Self {
        Transaction {
            inner,
            data,
            from,
            to,
            value,
            signature: None,
            nonce,
            first_seen: 0,
            hash_cache: OnceLock::new(),
        }
    }

    /// Canonical bytes used for both hashing and signing: every field
    /// except the signature, `first_seen`, and the cached hash.
    fn signing_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.inner.encode(&mut out);
        self.data.encode(&mut out);
        self.from.encode(&mut out);
        self.to.encode(&mut out);
        self.value.encode(&mut out);
        self.nonce.encode(&mut out);
        out
    }

    /// Signs this transaction with `key`, which must correspond to `from`.
    pub fn sign(&mut self, key: &PrivateKey) {
        let bytes = self.signing_bytes();
        self.signature = Some(key.sign(&bytes));
    }

    /// Verifies the transaction's signature against `from`.
    ///
    /// Returns `false` if no signature is present.
    pub fn verify(&self) -> bool {
        match &self.signature {
            Some(sig) => self.from.verify(&self.signing_bytes(), sig),
            None => false,
        }
    }

    /// Returns the memoized content hash, computing it on first access.
    pub fn hash(&self) -> Hash {
        *self.hash_cache.get_or_init(|| Hash::sha256(&self.signing_bytes()))
    }

    /// Derives the sender's address from `from`.
    pub fn from_address(&self) -> Address {
        Address::from_public_key(&self.from)
    }

    /// Derives the recipient's address, if this transaction carries a transfer.
    pub fn to_address(&self) -> Option<Address> {
        self.to.as_ref().map(Address::from_public_key)
    }
}

impl Encode for Transaction {
    fn encode(&self, out: &mut Vec<u8>) {
        self.inner.encode(out);
        self.data.encode(out);
        self.from.encode(out);
        self.to.encode(out);
        self.value.encode(out);
        self.signature.encode(out);
        self.nonce.encode(out);
        self.first_seen.encode(out);
    }
}

impl Decode for Transaction {
    fn decode(input: &[u8]) -> Result<(Self, &[u8]), CodecError> {
        let (inner, rest) = TxInner::decode(input)?;
        let (data, rest) = Vec::<u8>::decode(rest)?;
        let (from, rest) = PublicKey::decode(rest)?;
        let (to, rest) = Option::<PublicKey>::decode(rest)?;
        let (value, rest) = u64::decode(rest)?;
        let (signature, rest) = Option::<Signature>::decode(rest)?;
        let (nonce, rest) = i64::decode(rest)?;
        let (first_seen, rest) = i64::decode(rest)?;
        Ok((
            Transaction {
                inner,
                data,
                from,
                to,
                value,
                signature,
                nonce,
                first_seen,
                hash_cache: OnceLock::new(),
            },
            rest,
        ))
    }
}

/// Decodes a `u32`-length-prefixed sequence of transactions.
pub fn decode_transactions(input: &[u8]) -> Result<(Vec<Transaction>, &[u8]), CodecError> {
    codec::decode_vec::<Transaction>(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signed_tx(value: u64) -> (PrivateKey, Transaction) {
        let key = PrivateKey::generate();
        let mut tx = Transaction::new(TxInner::None, vec![], key.public_key(), None, value, 1);
        tx.sign(&key);
        (key, tx)
    }

    #[test]
    fn sign_then_verify_succeeds() {
        let (_key, tx) = signed_tx(10);
        assert!(tx.verify());
    }

    #[test]
    fn unsigned_transaction_does_not_verify() {
        let key = PrivateKey::generate();
        let tx = Transaction::new(TxInner::None, vec![], key.public_key(), None, 0, 1);
        assert!(!tx.verify());
    }

    #[test]
    fn hash_is_memoized_and_stable() {
        let (_key, tx) = signed_tx(5);
        let h1 = tx.hash();
        let h2 = tx.hash();
        assert_eq!(h1, h2);
    }

    #[test]
    fn signature_and_first_seen_are_excluded_from_hash() {
        let (key, mut tx) = signed_tx(5);
        let before = tx.hash();
        tx.first_seen = 123;
        tx.signature = None;
        tx.sign(&key);
        assert_eq!(tx.hash(), before);
    }

    #[test]
    fn round_trips_through_codec() {
        let (_key, tx) = signed_tx(42);
        let bytes = tx.to_canonical_bytes();
        let (decoded, rest) = Transaction::decode(&bytes).unwrap();
        assert!(rest.is_empty());
        assert_eq!(decoded.hash(), tx.hash());
        assert_eq!(decoded.value, tx.value);
        assert!(decoded.verify());
    }

    #[test]
    fn mint_requires_collection_hash_round_trips() {
        let key = PrivateKey::generate();
        let inner = TxInner::Mint(MintPayload {
            collection: Hash::sha256(b"some-collection-tx"),
            metadata: b"item #1".to_vec(),
        });
        let mut tx = Transaction::new(inner, vec![], key.public_key(), None, 0, 2);
        tx.sign(&key);
        let bytes = tx.to_canonical_bytes();
        let (decoded, _) = Transaction::decode(&bytes).unwrap();
        assert_eq!(decoded.inner, tx.inner);
    }
}
