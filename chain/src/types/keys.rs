//! ECDSA over NIST P-256 key and signature wrappers.
//!
//! Public keys are carried in compressed SEC1 form, signatures as the
//! `(r, s)` scalar pair. Both are re-encoded canonically via [`Encode`]/
//! [`Decode`] rather than relying on `p256`'s own serialization, so that
//! transaction and block hashes are stable across crate versions.

use p256::ecdsa::signature::{Signer, Verifier};
use p256::ecdsa::{Signature as EcdsaSignature, SigningKey, VerifyingKey};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use rand_core::OsRng;

use crate::codec::{CodecError, Decode, Encode};

/// Number of bytes in a compressed SEC1-encoded P-256 public key.
pub const PUBLIC_KEY_LEN: usize = 33;

/// Number of bytes in a single P-256 scalar (`r` or `s`).
pub const SCALAR_LEN: usize = 32;

/// A P-256 public key, held in compressed SEC1 form.
#[derive(Clone, PartialEq, Eq)]
pub struct PublicKey(VerifyingKey);

impl std::hash::Hash for PublicKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.to_sec1_bytes().hash(state);
    }
}

impl PublicKey {
    /// Returns the compressed SEC1 encoding of this key.
    pub fn to_sec1_bytes(&self) -> [u8; PUBLIC_KEY_LEN] {
        let point = self.0.to_encoded_point(true);
        let mut out = [0u8; PUBLIC_KEY_LEN];
        out.copy_from_slice(point.as_bytes());
        out
    }

    /// Parses a public key from its compressed SEC1 encoding.
    pub fn from_sec1_bytes(bytes: &[u8; PUBLIC_KEY_LEN]) -> Result<Self, KeyError> {
        VerifyingKey::from_sec1_bytes(bytes)
            .map(PublicKey)
            .map_err(|_| KeyError::InvalidPublicKey)
    }

    /// Verifies `signature` over `message` under this public key.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> bool {
        self.0.verify(message, &signature.0).is_ok()
    }
}

impl std::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PublicKey({})", hex::encode(self.to_sec1_bytes()))
    }
}

impl Encode for PublicKey {
    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_sec1_bytes());
    }
}

impl Decode for PublicKey {
    fn decode(input: &[u8]) -> Result<(Self, &[u8]), CodecError> {
        let (bytes, rest) = <[u8; PUBLIC_KEY_LEN]>::decode(input)?;
        let key = PublicKey::from_sec1_bytes(&bytes).map_err(|_| CodecError::BadLength)?;
        Ok((key, rest))
    }
}

/// A P-256 signing (private) key.
///
/// Not `Clone`: a signing key should have exactly one owner.
pub struct PrivateKey(SigningKey);

impl PrivateKey {
    /// Generates a new random signing key.
    pub fn generate() -> Self {
        PrivateKey(SigningKey::random(&mut OsRng))
    }

    /// Derives the corresponding public key.
    pub fn public_key(&self) -> PublicKey {
        PublicKey(*self.0.verifying_key())
    }

    /// Signs `message`, returning a deterministic ECDSA signature (RFC 6979).
    pub fn sign(&self, message: &[u8]) -> Signature {
        let sig: EcdsaSignature = self.0.sign(message);
        Signature(sig)
    }
}

/// An ECDSA signature, encoded as `r` then `s`, each a length-prefixed
/// big-endian scalar. P-256 scalars are always exactly [`SCALAR_LEN`] bytes,
/// so the length prefix is always `32`; it is kept because the spec defines
/// signatures as a length-prefixed pair rather than a bare 64-byte blob.
#[derive(Clone, PartialEq, Eq)]
pub struct Signature(EcdsaSignature);

impl std::fmt::Debug for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Signature({})", hex::encode(self.0.to_bytes()))
    }
}

impl Encode for Signature {
    fn encode(&self, out: &mut Vec<u8>) {
        let bytes = self.0.to_bytes();
        let (r, s) = bytes.split_at(SCALAR_LEN);
        (SCALAR_LEN as u32).encode(out);
        out.extend_from_slice(r);
        (SCALAR_LEN as u32).encode(out);
        out.extend_from_slice(s);
    }
}

impl Decode for Signature {
    fn decode(input: &[u8]) -> Result<(Self, &[u8]), CodecError> {
        let (r_len, rest) = u32::decode(input)?;
        if r_len as usize != SCALAR_LEN {
            return Err(CodecError::BadLength);
        }
        let (r, rest) = <[u8; SCALAR_LEN]>::decode(rest)?;
        let (s_len, rest) = u32::decode(rest)?;
        if s_len as usize != SCALAR_LEN {
            return Err(CodecError::BadLength);
        }
        let (s, rest) = <[u8; SCALAR_LEN]>::decode(rest)?;

        let mut bytes = [0u8; 64];
        bytes[..32].copy_from_slice(&r);
        bytes[32..].copy_from_slice(&s);
        let sig = EcdsaSignature::from_slice(&bytes).map_err(|_| CodecError::BadLength)?;
        Ok((Signature(sig), rest))
    }
}

/// Errors produced by key parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyError {
    /// The supplied bytes do not decode to a valid point on the P-256 curve.
    InvalidPublicKey,
}

impl std::fmt::Display for KeyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyError::InvalidPublicKey => write!(f, "invalid P-256 public key encoding"),
        }
    }
}

impl std::error::Error for KeyError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_verify_round_trips() {
        let key = PrivateKey::generate();
        let pk = key.public_key();
        let sig = key.sign(b"hello chain");
        assert!(pk.verify(b"hello chain", &sig));
        assert!(!pk.verify(b"tampered", &sig));
    }

    #[test]
    fn public_key_sec1_round_trips_through_codec() {
        let key = PrivateKey::generate();
        let pk = key.public_key();
        let bytes = pk.to_canonical_bytes();
        let (decoded, rest) = PublicKey::decode(&bytes).unwrap();
        assert!(rest.is_empty());
        assert_eq!(decoded, pk);
    }

    #[test]
    fn signature_round_trips_through_codec() {
        let key = PrivateKey::generate();
        let sig = key.sign(b"payload");
        let bytes = sig.to_canonical_bytes();
        let (decoded, rest) = Signature::decode(&bytes).unwrap();
        assert!(rest.is_empty());
        assert_eq!(decoded, sig);
    }

    #[test]
    fn different_keys_yield_different_addresses() {
        let a = PrivateKey::generate().public_key();
        let b = PrivateKey::generate().public_key();
        assert_ne!(a.to_sec1_bytes(), b.to_sec1_bytes());
    }
}
