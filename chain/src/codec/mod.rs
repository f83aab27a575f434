//! Canonical binary encoding used for hashing, signing and wire transfer.
//!
//! Every on-chain and on-wire type implements [`Encode`]/[`Decode`] against
//! this module's rules rather than going through `serde`: fixed-width
//! little-endian integers, `u32`-length-prefixed byte strings, inlined
//! fixed-size arrays, one-byte tags for sum types, and a one-byte presence
//! flag for `Option`. The encoding is deterministic: the same logical value
//! always produces the same bytes, which is what lets us hash and sign it.

use std::fmt;

/// Error returned when decoding malformed or truncated input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Fewer bytes were available than the value requires.
    UnexpectedEnd,
    /// A length prefix did not match the remaining input or a size limit.
    BadLength,
    /// A sum-type tag or `Option` flag byte was not one of the known values.
    BadTag(u8),
    /// Trailing bytes remained after decoding a complete, self-contained value.
    TrailingBytes,
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::UnexpectedEnd => write!(f, "unexpected end of input"),
            CodecError::BadLength => write!(f, "length prefix inconsistent with input"),
            CodecError::BadTag(tag) => write!(f, "unrecognised tag byte: 0x{tag:02x}"),
            CodecError::TrailingBytes => write!(f, "trailing bytes after decoded value"),
        }
    }
}

impl std::error::Error for CodecError {}

/// Types with a canonical, deterministic binary encoding.
pub trait Encode {
    /// Appends the canonical encoding of `self` to `out`.
    fn encode(&self, out: &mut Vec<u8>);

    /// Returns the canonical encoding of `self` as an owned buffer.
    fn to_canonical_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode(&mut out);
        out
    }
}

/// Types that can be parsed back out of the canonical binary encoding.
///
/// `decode` returns the parsed value along with whatever input bytes were
/// not consumed, so that callers decoding a sequence of values (for example
/// a transaction list inside a block) can keep calling `decode` on the
/// remainder.
pub trait Decode: Sized {
    fn decode(input: &[u8]) -> Result<(Self, &[u8]), CodecError>;
}

/// Decodes a value and requires that no input bytes remain afterwards.
///
/// Use this at message/record boundaries (a whole `Transaction`, a whole
/// wire `Message`) where trailing garbage indicates a malformed payload.
pub fn decode_exact<T: Decode>(input: &[u8]) -> Result<T, CodecError> {
    let (value, rest) = T::decode(input)?;
    if rest.is_empty() {
        Ok(value)
    } else {
        Err(CodecError::TrailingBytes)
    }
}

impl Encode for u8 {
    fn encode(&self, out: &mut Vec<u8>) {
        out.push(*self);
    }
}

impl Decode for u8 {
    fn decode(input: &[u8]) -> Result<(Self, &[u8]), CodecError> {
        let (byte, rest) = input.split_first().ok_or(CodecError::UnexpectedEnd)?;
        Ok((*byte, rest))
    }
}

impl Encode for u32 {
    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }
}

impl Decode for u32 {
    fn decode(input: &[u8]) -> Result<(Self, &[u8]), CodecError> {
        if input.len() < 4 {
            return Err(CodecError::UnexpectedEnd);
        }
        let (head, rest) = input.split_at(4);
        let mut buf = [0u8; 4];
        buf.copy_from_slice(head);
        Ok((u32::from_le_bytes(buf), rest))
    }
}

impl Encode for u64 {
    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }
}

impl Decode for u64 {
    fn decode(input: &[u8]) -> Result<(Self, &[u8]), CodecError> {
        if input.len() < 8 {
            return Err(CodecError::UnexpectedEnd);
        }
        let (head, rest) = input.split_at(8);
        let mut buf = [0u8; 8];
        buf.copy_from_slice(head);
        Ok((u64::from_le_bytes(buf), rest))
    }
}

impl Encode for i64 {
    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }
}

impl Decode for i64 {
    fn decode(input: &[u8]) -> Result<(Self, &[u8]), CodecError> {
        if input.len() < 8 {
            return Err(CodecError::UnexpectedEnd);
        }
        let (head, rest) = input.split_at(8);
        let mut buf = [0u8; 8];
        buf.copy_from_slice(head);
        Ok((i64::from_le_bytes(buf), rest))
    }
}

impl<const N: usize> Encode for [u8; N] {
    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self);
    }
}

impl<const N: usize> Decode for [u8; N] {
    fn decode(input: &[u8]) -> Result<(Self, &[u8]), CodecError> {
        if input.len() < N {
            return Err(CodecError::UnexpectedEnd);
        }
        let (head, rest) = input.split_at(N);
        let mut buf = [0u8; N];
        buf.copy_from_slice(head);
        Ok((buf, rest))
    }
}

/// `u32`-length-prefixed byte string.
impl Encode for Vec<u8> {
    fn encode(&self, out: &mut Vec<u8>) {
        (self.len() as u32).encode(out);
        out.extend_from_slice(self);
    }
}

impl Decode for Vec<u8> {
    fn decode(input: &[u8]) -> Result<(Self, &[u8]), CodecError> {
        let (len, rest) = u32::decode(input)?;
        let len = len as usize;
        if rest.len() < len {
            return Err(CodecError::BadLength);
        }
        let (head, rest) = rest.split_at(len);
        Ok((head.to_vec(), rest))
    }
}

/// One-byte presence flag (`0x00` = `None`, `0x01` = `Some`) followed by the
/// inner value's encoding when present.
impl<T: Encode> Encode for Option<T> {
    fn encode(&self, out: &mut Vec<u8>) {
        match self {
            None => out.push(0x00),
            Some(value) => {
                out.push(0x01);
                value.encode(out);
            }
        }
    }
}

impl<T: Decode> Decode for Option<T> {
    fn decode(input: &[u8]) -> Result<(Self, &[u8]), CodecError> {
        let (tag, rest) = u8::decode(input)?;
        match tag {
            0x00 => Ok((None, rest)),
            0x01 => {
                let (value, rest) = T::decode(rest)?;
                Ok((Some(value), rest))
            }
            other => Err(CodecError::BadTag(other)),
        }
    }
}

/// `u32`-length-prefixed sequence of canonically-encoded elements.
impl<T: Encode> Encode for [T] {
    fn encode(&self, out: &mut Vec<u8>) {
        (self.len() as u32).encode(out);
        for item in self {
            item.encode(out);
        }
    }
}

pub fn decode_vec<T: Decode>(input: &[u8]) -> Result<(Vec<T>, &[u8]), CodecError> {
    let (len, mut rest) = u32::decode(input)?;
    let mut items = Vec::with_capacity((len as usize).min(1024));
    for _ in 0..len {
        let (item, tail) = T::decode(rest)?;
        items.push(item);
        rest = tail;
    }
    Ok((items, rest))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn u32_round_trips() {
        let mut buf = Vec::new();
        42u32.encode(&mut buf);
        assert_eq!(buf, 42u32.to_le_bytes().to_vec());
        let (value, rest) = u32::decode(&buf).unwrap();
        assert_eq!(value, 42);
        assert!(rest.is_empty());
    }

    #[test]
    fn vec_u8_round_trips_with_length_prefix() {
        let data = vec![1u8, 2, 3, 4, 5];
        let mut buf = Vec::new();
        data.encode(&mut buf);
        assert_eq!(&buf[0..4], &5u32.to_le_bytes());
        let (decoded, rest) = Vec::<u8>::decode(&buf).unwrap();
        assert_eq!(decoded, data);
        assert!(rest.is_empty());
    }

    #[test]
    fn option_round_trips_both_variants() {
        let mut buf = Vec::new();
        None::<u32>.encode(&mut buf);
        assert_eq!(buf, vec![0x00]);
        let (decoded, rest) = Option::<u32>::decode(&buf).unwrap();
        assert_eq!(decoded, None);
        assert!(rest.is_empty());

        let mut buf = Vec::new();
        Some(7u32).encode(&mut buf);
        let (decoded, rest) = Option::<u32>::decode(&buf).unwrap();
        assert_eq!(decoded, Some(7));
        assert!(rest.is_empty());
    }

    #[test]
    fn truncated_input_is_unexpected_end() {
        let buf = vec![1u8, 2, 3];
        assert_eq!(u32::decode(&buf).unwrap_err(), CodecError::UnexpectedEnd);
    }

    #[test]
    fn bad_length_prefix_is_rejected() {
        let mut buf = Vec::new();
        100u32.encode(&mut buf);
        buf.extend_from_slice(&[1, 2, 3]);
        assert_eq!(Vec::<u8>::decode(&buf).unwrap_err(), CodecError::BadLength);
    }

    #[test]
    fn decode_exact_rejects_trailing_bytes() {
        let mut buf = Vec::new();
        5u32.encode(&mut buf);
        buf.push(0xff);
        assert_eq!(
            decode_exact::<u32>(&buf).unwrap_err(),
            CodecError::TrailingBytes
        );
    }
}
